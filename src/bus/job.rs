use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::cache::geometry::Address;
use crate::cache::CacheId;
use crate::coherence::{CoherenceState, JobRequest, ProtocolEvent, Resolution};
use crate::timeq::{Countdown, Cycle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BusAction {
    BusRd,
    BusRdX,
    BusUpd,
    EvictLru,
}

impl BusAction {
    /// What the other caches observe when a transaction of this kind completes.
    pub fn remote_event(self) -> Option<ProtocolEvent> {
        match self {
            BusAction::BusRd => Some(ProtocolEvent::RemoteRead),
            BusAction::BusRdX => Some(ProtocolEvent::RemoteReadExclusive),
            BusAction::BusUpd => Some(ProtocolEvent::RemoteUpdate),
            BusAction::EvictLru => None,
        }
    }

    pub fn is_write(self) -> bool {
        matches!(self, BusAction::BusRdX | BusAction::BusUpd)
    }
}

impl Display for BusAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BusAction::BusRd => "BUSRD",
            BusAction::BusRdX => "BUSRDX",
            BusAction::BusUpd => "BUSUPD",
            BusAction::EvictLru => "EVICTLRU",
        };
        f.write_str(name)
    }
}

/// One normal bus transaction. The cost is unknown until the bus starts it, because it depends on
/// who holds the block at that moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusJob {
    origin: CacheId,
    target: Address,
    action: BusAction,
    resolution: Resolution,
    created_at: Cycle,
    countdown: Countdown,
    started: bool,
    successor: Option<Box<BusJob>>,
}

impl BusJob {
    pub fn new(
        origin: CacheId,
        target: Address,
        action: BusAction,
        resolution: Resolution,
        created_at: Cycle,
    ) -> Self {
        Self {
            origin,
            target,
            action,
            resolution,
            created_at,
            countdown: Countdown::default(),
            started: false,
            successor: None,
        }
    }

    /// Build the job (and its chained follow-up, if any) a protocol transition asked for. The
    /// follow-up keeps the creation cycle of the first job so that its latency covers the whole
    /// access.
    pub fn from_request(origin: CacheId, target: Address, request: JobRequest, now: Cycle) -> Self {
        let mut job = Self::new(origin, target, request.action, request.resolution, now);
        if let Some((action, resolution)) = request.then {
            job.successor = Some(Box::new(Self::new(origin, target, action, resolution, now)));
        }
        job
    }

    pub fn eviction(origin: CacheId, target: Address, now: Cycle) -> Self {
        Self::new(
            origin,
            target,
            BusAction::EvictLru,
            Resolution::To(CoherenceState::Invalid),
            now,
        )
    }

    pub fn origin(&self) -> CacheId {
        self.origin
    }

    pub fn target(&self) -> Address {
        self.target
    }

    pub fn action(&self) -> BusAction {
        self.action
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn created_at(&self) -> Cycle {
        self.created_at
    }

    pub fn started(&self) -> bool {
        self.started
    }

    pub fn remaining(&self) -> Cycle {
        self.countdown.remaining()
    }

    pub fn start(&mut self, cost: Cycle) {
        self.countdown = Countdown::new(cost);
        self.started = true;
    }

    /// Returns true on the cycle the transaction completes.
    pub fn tick(&mut self) -> bool {
        self.countdown.tick()
    }

    pub fn take_successor(&mut self) -> Option<BusJob> {
        self.successor.take().map(|next| *next)
    }
}
