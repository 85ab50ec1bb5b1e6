use thiserror::Error;

use crate::bus::PriorityKind;
use crate::cache::CacheId;
use crate::coherence::{CoherencePolicy, CoherenceState, ProtocolEvent};
use crate::timeq::Cycle;

/// Everything the engine can detect going wrong. None of these are transient: the input is static,
/// so an error means the configuration is unusable or the protocol wiring has a defect.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("invalid cache configuration: {0}")]
    Configuration(String),

    #[error("{policy} has no transition for {event:?} in state {state:?}")]
    ProtocolViolation {
        policy: CoherencePolicy,
        state: CoherenceState,
        event: ProtocolEvent,
    },

    #[error("cache {cache} already has an outstanding bus job")]
    JobAlreadyPending { cache: CacheId },

    #[error("cache {cache} has no block to spare in set {set}")]
    ResourceExhausted { cache: CacheId, set: usize },

    #[error("{kind:?} job in flight for block {active:#010x}, cannot join block {requested:#010x}")]
    CrossAddressConflict {
        kind: PriorityKind,
        active: u32,
        requested: u32,
    },

    #[error("simulation did not finish within {0} cycles")]
    CycleLimit(Cycle),
}

pub type SimResult<T> = Result<T, SimError>;
