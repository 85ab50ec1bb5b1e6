//! Per-block coherence protocols.
//!
//! Every policy is a pure table from (state, event) to a [`Transition`]. The tables never touch a
//! cache or the bus themselves; the bus applies the returned effect. A `None` from a policy table
//! marks a pair the policy defines as unreachable and surfaces as
//! [`SimError::ProtocolViolation`].

mod dragon;
mod mesi;
mod msi;
mod musi;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use log::error;
use phf::phf_map;
use serde::{Deserialize, Deserializer, Serialize};

use crate::bus::BusAction;
use crate::error::{SimError, SimResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CoherenceState {
    Modified,
    Exclusive,
    Shared,
    Invalid,
    SharedClean,
    SharedModified,
}

impl CoherenceState {
    pub fn is_valid(self) -> bool {
        self != CoherenceState::Invalid
    }

    /// Whether dropping a block in this state loses data that memory does not have.
    pub fn write_back_on_evict(self) -> bool {
        matches!(self, CoherenceState::Modified | CoherenceState::SharedModified)
    }

    pub fn is_shared(self) -> bool {
        matches!(
            self,
            CoherenceState::Shared | CoherenceState::SharedClean | CoherenceState::SharedModified
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CoherencePolicy {
    Msi,
    Mesi,
    Musi,
    Dragon,
}

static POLICY_NAMES: phf::Map<&'static str, CoherencePolicy> = phf_map! {
    "msi" => CoherencePolicy::Msi,
    "mesi" => CoherencePolicy::Mesi,
    "musi" => CoherencePolicy::Musi,
    "dragon" => CoherencePolicy::Dragon,
};

impl CoherencePolicy {
    pub const ALL: [CoherencePolicy; 4] = [
        CoherencePolicy::Msi,
        CoherencePolicy::Mesi,
        CoherencePolicy::Musi,
        CoherencePolicy::Dragon,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CoherencePolicy::Msi => "MSI",
            CoherencePolicy::Mesi => "MESI",
            CoherencePolicy::Musi => "MUSI",
            CoherencePolicy::Dragon => "DRAGON",
        }
    }

    /// States a block may legally occupy under this policy.
    pub fn states(self) -> &'static [CoherenceState] {
        match self {
            CoherencePolicy::Msi | CoherencePolicy::Musi => msi::STATES,
            CoherencePolicy::Mesi => mesi::STATES,
            CoherencePolicy::Dragon => dragon::STATES,
        }
    }
}

impl Display for CoherencePolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CoherencePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        POLICY_NAMES
            .get(value.to_ascii_lowercase().as_str())
            .copied()
            .ok_or_else(|| {
                format!(
                    "unsupported coherence policy '{}', expected one of: msi, mesi, musi, dragon",
                    value
                )
            })
    }
}

impl<'de> Deserialize<'de> for CoherencePolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// The five things that can happen to a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolEvent {
    LocalRead,
    LocalWrite,
    RemoteRead,
    /// A sibling completed a BUSRDX (remote write-invalidate).
    RemoteReadExclusive,
    RemoteUpdate,
}

impl ProtocolEvent {
    pub const ALL: [ProtocolEvent; 5] = [
        ProtocolEvent::LocalRead,
        ProtocolEvent::LocalWrite,
        ProtocolEvent::RemoteRead,
        ProtocolEvent::RemoteReadExclusive,
        ProtocolEvent::RemoteUpdate,
    ];
}

/// Final state of a bus transaction, decided when the transaction completes so it can depend on
/// whether any sibling holds the block at that moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    To(CoherenceState),
    BySharing {
        shared: CoherenceState,
        alone: CoherenceState,
    },
}

impl Resolution {
    pub fn resolve(self, siblings_hold: bool) -> CoherenceState {
        match self {
            Resolution::To(state) => state,
            Resolution::BySharing { shared, alone } => {
                if siblings_hold {
                    shared
                } else {
                    alone
                }
            }
        }
    }
}

/// A bus transaction a block asks for, optionally followed by a second one that runs as soon as
/// the first completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobRequest {
    pub action: BusAction,
    pub resolution: Resolution,
    pub then: Option<(BusAction, Resolution)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Stay,
    /// Immediate local transition, no bus time.
    Become(CoherenceState),
    /// Queue a bus transaction; the state is settled on completion.
    Request(JobRequest),
    /// Write the block back to memory, then settle in the given state.
    Flush(CoherenceState),
    /// Notify siblings with a remote write and settle in the given state after a one-word update
    /// slot on the bus.
    Upgrade(CoherenceState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub effect: Effect,
    /// The block lost its copy because of a sibling's write.
    pub invalidates: bool,
    /// A local write completed without any bus transaction.
    pub silent_write: bool,
}

impl Transition {
    fn with(effect: Effect) -> Self {
        Self {
            effect,
            invalidates: false,
            silent_write: false,
        }
    }

    pub fn stay() -> Self {
        Self::with(Effect::Stay)
    }

    pub fn to(state: CoherenceState) -> Self {
        Self::with(Effect::Become(state))
    }

    pub fn request(action: BusAction, resolution: Resolution) -> Self {
        Self::with(Effect::Request(JobRequest {
            action,
            resolution,
            then: None,
        }))
    }

    pub fn chained(
        action: BusAction,
        resolution: Resolution,
        then: (BusAction, Resolution),
    ) -> Self {
        Self::with(Effect::Request(JobRequest {
            action,
            resolution,
            then: Some(then),
        }))
    }

    pub fn flush(state: CoherenceState) -> Self {
        Self::with(Effect::Flush(state))
    }

    pub fn upgrade(state: CoherenceState) -> Self {
        Self::with(Effect::Upgrade(state))
    }

    pub fn invalidate() -> Self {
        Self::to(CoherenceState::Invalid).counting_invalidation()
    }

    pub fn counting_invalidation(mut self) -> Self {
        self.invalidates = true;
        self
    }

    pub fn silent_write(mut self) -> Self {
        self.silent_write = true;
        self
    }
}

/// Look up what `event` does to a block in `state` under `policy`.
pub fn transition(
    policy: CoherencePolicy,
    state: CoherenceState,
    event: ProtocolEvent,
) -> SimResult<Transition> {
    let found = match policy {
        CoherencePolicy::Msi => msi::transition(state, event),
        CoherencePolicy::Mesi => mesi::transition(state, event),
        CoherencePolicy::Musi => musi::transition(state, event),
        CoherencePolicy::Dragon => dragon::transition(state, event),
    };
    found.ok_or_else(|| {
        error!("{} has no transition for {:?} in {:?}", policy, event, state);
        SimError::ProtocolViolation {
            policy,
            state,
            event,
        }
    })
}
