use log::error;
use smallvec::SmallVec;

use crate::bus::{READ_WORD_CYCLES, WRITE_TO_MEM_CYCLES};
use crate::cache::geometry::Address;
use crate::cache::CacheId;
use crate::coherence::CoherenceState;
use crate::error::{SimError, SimResult};
use crate::timeq::{Countdown, Cycle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriorityKind {
    /// Propagate one word to every sharer.
    Update,
    /// Write one block back to memory.
    Flush,
}

/// Order in which in-flight priority jobs claim the bus, ahead of normal arbitration.
pub const PRIORITY_ORDER: [PriorityKind; 2] = [PriorityKind::Update, PriorityKind::Flush];

impl PriorityKind {
    pub fn duration(self) -> Cycle {
        match self {
            PriorityKind::Update => READ_WORD_CYCLES,
            PriorityKind::Flush => WRITE_TO_MEM_CYCLES,
        }
    }
}

/// A joinable priority transaction on one block. Its duration does not depend on how many caches
/// take part; on completion every participant moves to the state it registered.
#[derive(Debug, Clone)]
pub struct PriorityJob {
    kind: PriorityKind,
    target: Address,
    opened_at: Cycle,
    countdown: Countdown,
    participants: SmallVec<[(CacheId, CoherenceState); 4]>,
}

impl PriorityJob {
    pub fn open(kind: PriorityKind, target: Address, now: Cycle) -> Self {
        Self {
            kind,
            target,
            opened_at: now,
            countdown: Countdown::new(kind.duration()),
            participants: SmallVec::new(),
        }
    }

    pub fn kind(&self) -> PriorityKind {
        self.kind
    }

    pub fn target(&self) -> Address {
        self.target
    }

    pub fn opened_at(&self) -> Cycle {
        self.opened_at
    }

    pub fn remaining(&self) -> Cycle {
        self.countdown.remaining()
    }

    pub fn participants(&self) -> &[(CacheId, CoherenceState)] {
        &self.participants
    }

    /// Add a cache, or change the state it will settle in if it already takes part. A different
    /// block is rejected and leaves the job untouched.
    pub fn join(
        &mut self,
        cache: CacheId,
        target: &Address,
        final_state: CoherenceState,
    ) -> SimResult<()> {
        if !self.target.same_block(target) {
            error!(
                "{:?} of {} in flight, rejecting cache {} for {}",
                self.kind, self.target, cache, target
            );
            return Err(SimError::CrossAddressConflict {
                kind: self.kind,
                active: self.target.block_base(),
                requested: target.block_base(),
            });
        }
        match self.participants.iter_mut().find(|(id, _)| *id == cache) {
            Some(entry) => entry.1 = final_state,
            None => self.participants.push((cache, final_state)),
        }
        Ok(())
    }

    pub fn tick(&mut self) -> bool {
        self.countdown.tick()
    }
}
