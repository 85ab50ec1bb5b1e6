//! The shared snooping bus.
//!
//! The bus owns every cache and is the only place where one cache's action reaches another:
//! processors call in for local accesses and evictions, and the bus applies protocol transitions,
//! runs transactions and broadcasts their results. Per cycle it does exactly one thing, in this
//! order:
//!
//! 1. tick the in-flight priority job that comes first in [`PRIORITY_ORDER`], or
//! 2. tick the current normal job, or
//! 3. pick the chained successor of the job that just finished, else arbitrate round-robin, start
//!    the winner and tick its first cycle.

mod arbiter;
mod job;
mod priority;

pub use arbiter::RoundRobin;
pub use job::{BusAction, BusJob};
pub use priority::{PriorityJob, PriorityKind, PRIORITY_ORDER};

use log::debug;
use smallvec::SmallVec;

use crate::cache::geometry::{Address, CacheGeometry, WORD_SIZE};
use crate::cache::{Cache, CacheId};
use crate::coherence::{self, CoherenceState, Effect, ProtocolEvent, Transition};
use crate::error::SimResult;
use crate::stats::BusStats;
use crate::timeq::{span, Cycle};

/// Cycles to fetch a block from memory.
pub const READ_FROM_MEM_CYCLES: Cycle = 100;
/// Cycles to write a block back to memory.
pub const WRITE_TO_MEM_CYCLES: Cycle = 100;
/// Cycles to move one word between caches.
pub const READ_WORD_CYCLES: Cycle = 1;

#[derive(Debug)]
pub struct Bus {
    geometry: CacheGeometry,
    caches: Vec<Cache>,
    current: Option<BusJob>,
    arbiter: RoundRobin,
    updating: Option<PriorityJob>,
    flushing: Option<PriorityJob>,
    stats: BusStats,
}

impl Bus {
    pub fn new(geometry: CacheGeometry) -> Self {
        Self {
            geometry,
            caches: Vec::new(),
            current: None,
            arbiter: RoundRobin::new(),
            updating: None,
            flushing: None,
            stats: BusStats::default(),
        }
    }

    /// Build a fresh cache and attach it. Ids count up from 0 on every bus.
    pub fn attach(&mut self) -> CacheId {
        let id = self.caches.len();
        self.caches.push(Cache::new(id, self.geometry));
        id
    }

    pub fn geometry(&self) -> &CacheGeometry {
        &self.geometry
    }

    pub fn stats(&self) -> &BusStats {
        &self.stats
    }

    pub fn caches(&self) -> &[Cache] {
        &self.caches
    }

    pub fn cache(&self, id: CacheId) -> &Cache {
        &self.caches[id]
    }

    pub fn cache_mut(&mut self, id: CacheId) -> &mut Cache {
        &mut self.caches[id]
    }

    pub fn current_job(&self) -> Option<&BusJob> {
        self.current.as_ref()
    }

    pub fn priority_job(&self, kind: PriorityKind) -> Option<&PriorityJob> {
        match kind {
            PriorityKind::Update => self.updating.as_ref(),
            PriorityKind::Flush => self.flushing.as_ref(),
        }
    }

    fn priority_slot(&mut self, kind: PriorityKind) -> &mut Option<PriorityJob> {
        match kind {
            PriorityKind::Update => &mut self.updating,
            PriorityKind::Flush => &mut self.flushing,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none()
            && self.updating.is_none()
            && self.flushing.is_none()
            && !self.caches.iter().any(Cache::has_pending_job)
    }

    /// Snoop: does any cache other than `local` hold the block?
    pub fn remote_holds(&self, local: CacheId, addr: &Address) -> bool {
        self.caches
            .iter()
            .any(|c| c.id() != local && c.contains(addr))
    }

    /// Perform a processor's load or store on its cache. Returns false when the access has to wait
    /// a cycle because the update slot it needs is taken; nothing is changed in that case.
    pub fn local_access(
        &mut self,
        cache: CacheId,
        addr: Address,
        event: ProtocolEvent,
        now: Cycle,
    ) -> SimResult<bool> {
        let state = self.caches[cache].state_of(&addr);
        let t = coherence::transition(self.geometry.policy(), state, event)?;
        if matches!(t.effect, Effect::Upgrade(_)) && self.updating.is_some() {
            debug!("cache {}: update slot busy, deferring write to {}", cache, addr);
            return Ok(false);
        }
        self.caches[cache].touch(&addr)?;
        if t.silent_write {
            self.stats.record_write_latency(0);
        }
        self.apply(cache, addr, t, now)?;
        Ok(true)
    }

    /// Deliver a remote event to every cache but `origin`.
    pub fn broadcast(
        &mut self,
        origin: CacheId,
        addr: Address,
        event: ProtocolEvent,
        now: Cycle,
    ) -> SimResult<()> {
        let policy = self.geometry.policy();
        for id in 0..self.caches.len() {
            if id == origin {
                continue;
            }
            let state = self.caches[id].state_of(&addr);
            let t = coherence::transition(policy, state, event)?;
            self.apply(id, addr, t, now)?;
        }
        Ok(())
    }

    fn apply(&mut self, cache: CacheId, addr: Address, t: Transition, now: Cycle) -> SimResult<()> {
        if t.invalidates {
            self.stats.record_invalidation();
            self.caches[cache].stats_mut().record_invalidation();
        }
        match t.effect {
            Effect::Stay => Ok(()),
            Effect::Become(state) => self.caches[cache].set_state(&addr, state),
            Effect::Request(request) => {
                let job = BusJob::from_request(cache, addr, request, now);
                self.caches[cache].submit(job)
            }
            Effect::Flush(state) => self.flush(cache, addr, state, now),
            Effect::Upgrade(state) => {
                self.broadcast(cache, addr, ProtocolEvent::RemoteReadExclusive, now)?;
                self.update(cache, addr, state, now)
            }
        }
    }

    /// Write `addr` back to memory from `cache`, which then settles in `final_state`. Joins the
    /// flush already in flight for the same block.
    pub fn flush(
        &mut self,
        cache: CacheId,
        addr: Address,
        final_state: CoherenceState,
        now: Cycle,
    ) -> SimResult<()> {
        self.join_priority(PriorityKind::Flush, cache, addr, final_state, now)?;
        self.caches[cache].begin_flush();
        self.caches[cache].stats_mut().record_flush();
        self.stats.record_flush();
        Ok(())
    }

    /// Propagate one word of `addr` from `cache`, which then settles in `final_state`.
    pub fn update(
        &mut self,
        cache: CacheId,
        addr: Address,
        final_state: CoherenceState,
        now: Cycle,
    ) -> SimResult<()> {
        self.join_priority(PriorityKind::Update, cache, addr, final_state, now)?;
        self.caches[cache].begin_update();
        Ok(())
    }

    fn join_priority(
        &mut self,
        kind: PriorityKind,
        cache: CacheId,
        addr: Address,
        final_state: CoherenceState,
        now: Cycle,
    ) -> SimResult<()> {
        let slot = self.priority_slot(kind);
        match slot {
            Some(job) => {
                job.join(cache, &addr, final_state)?;
                debug!("cache {} joined {:?} of {}", cache, kind, addr);
            }
            None => {
                let mut job = PriorityJob::open(kind, addr, now);
                job.join(cache, &addr, final_state)?;
                debug!("cache {} opened {:?} of {} at cycle {}", cache, kind, addr, now);
                *slot = Some(job);
            }
        }
        Ok(())
    }

    /// Advance the bus by one cycle.
    pub fn tick(&mut self, now: Cycle) -> SimResult<()> {
        for kind in PRIORITY_ORDER {
            if let Some(mut job) = self.priority_slot(kind).take() {
                if job.tick() {
                    self.finish_priority(job, now)?;
                } else {
                    *self.priority_slot(kind) = Some(job);
                }
                return Ok(());
            }
        }

        let Some(mut job) = self.current.take().or_else(|| self.arbitrate()) else {
            return Ok(());
        };
        if !job.started() {
            let cost = self.cost_of(&job);
            job.start(cost);
            debug!(
                "cycle {}: cache {} starts {} {} ({} cycles)",
                now,
                job.origin(),
                job.action(),
                job.target(),
                cost
            );
        }
        if job.tick() {
            self.complete(job, now)
        } else {
            self.current = Some(job);
            Ok(())
        }
    }

    fn arbitrate(&mut self) -> Option<BusJob> {
        let requests: SmallVec<[bool; 8]> =
            self.caches.iter().map(Cache::has_pending_job).collect();
        let granted = self.arbiter.grant(&requests)?;
        self.caches[granted].take_pending()
    }

    fn cost_of(&self, job: &BusJob) -> Cycle {
        match job.action() {
            BusAction::BusRd | BusAction::BusRdX => {
                if self.remote_holds(job.origin(), &job.target()) {
                    self.geometry.words_per_block() as Cycle
                } else {
                    READ_FROM_MEM_CYCLES
                }
            }
            BusAction::BusUpd => READ_WORD_CYCLES,
            BusAction::EvictLru => WRITE_TO_MEM_CYCLES,
        }
    }

    fn bytes_of(&self, action: BusAction) -> u32 {
        match action {
            BusAction::BusUpd => WORD_SIZE,
            BusAction::BusRd | BusAction::BusRdX | BusAction::EvictLru => {
                self.geometry.block_size()
            }
        }
    }

    fn complete(&mut self, mut job: BusJob, now: Cycle) -> SimResult<()> {
        let origin = job.origin();
        let addr = job.target();
        let action = job.action();

        match action.remote_event() {
            Some(event) => {
                self.broadcast(origin, addr, event, now)?;
                let siblings_hold = self.remote_holds(origin, &addr);
                let state = job.resolution().resolve(siblings_hold);
                self.caches[origin].set_state(&addr, state)?;
                debug!(
                    "cycle {}: cache {} finished {} {}, now {:?}",
                    now, origin, action, addr, state
                );
            }
            None => {
                self.caches[origin].finish_eviction(&addr)?;
                debug!("cycle {}: cache {} finished {} {}", now, origin, action, addr);
            }
        }

        let bytes = self.bytes_of(action);
        self.stats.record_transaction(action, bytes);
        if action.is_write() {
            self.stats.record_write_latency(span(job.created_at(), now));
        }

        match job.take_successor() {
            Some(next) => self.current = Some(next),
            None => self.caches[origin].release_bus(),
        }
        Ok(())
    }

    fn finish_priority(&mut self, job: PriorityJob, now: Cycle) -> SimResult<()> {
        let addr = job.target();
        for &(cache, state) in job.participants() {
            self.caches[cache].set_state(&addr, state)?;
            match job.kind() {
                PriorityKind::Update => {
                    self.caches[cache].end_update();
                    self.stats.record_write_latency(span(job.opened_at(), now));
                }
                PriorityKind::Flush => self.caches[cache].end_flush(),
            }
        }
        match job.kind() {
            PriorityKind::Update => self.stats.record_update(WORD_SIZE),
            PriorityKind::Flush => self.stats.record_flush_transfer(self.geometry.block_size()),
        }
        debug!(
            "cycle {}: {:?} of {} done for {} cache(s)",
            now,
            job.kind(),
            addr,
            job.participants().len()
        );
        Ok(())
    }
}
