pub mod geometry;
pub mod set;

use log::{debug, error};

use crate::bus::BusJob;
use crate::coherence::CoherenceState;
use crate::error::{SimError, SimResult};
use crate::stats::CacheStats;
use crate::timeq::Cycle;
use geometry::{Address, CacheGeometry};
use set::CacheSet;

/// Index of a cache on the bus. Ids are dense and assigned per run, starting at 0.
pub type CacheId = usize;

/// A processor's private cache. Owns its sets and at most one bus job; every interaction with
/// other caches goes through the bus.
#[derive(Debug)]
pub struct Cache {
    id: CacheId,
    sets: Vec<CacheSet>,
    pending: Option<BusJob>,
    awaiting_bus: bool,
    flushing: bool,
    updating: bool,
    stats: CacheStats,
}

impl Cache {
    pub fn new(id: CacheId, geometry: CacheGeometry) -> Self {
        let ways = geometry.associativity() as usize;
        let sets = (0..geometry.num_sets()).map(|_| CacheSet::new(ways)).collect();
        Self {
            id,
            sets,
            pending: None,
            awaiting_bus: false,
            flushing: false,
            updating: false,
            stats: CacheStats::default(),
        }
    }

    pub fn id(&self) -> CacheId {
        self.id
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut CacheStats {
        &mut self.stats
    }

    pub fn set(&self, addr: &Address) -> &CacheSet {
        &self.sets[addr.index()]
    }

    fn set_mut(&mut self, addr: &Address) -> &mut CacheSet {
        &mut self.sets[addr.index()]
    }

    fn exhausted(&self, addr: &Address) -> SimError {
        error!("cache {}: no block available in set {} for {}", self.id, addr.index(), addr);
        SimError::ResourceExhausted {
            cache: self.id,
            set: addr.index(),
        }
    }

    pub fn contains(&self, addr: &Address) -> bool {
        self.set(addr).contains(addr)
    }

    pub fn has_block_available_for(&self, addr: &Address) -> bool {
        let set = self.set(addr);
        set.contains(addr) || set.has_invalid()
    }

    pub fn state_of(&self, addr: &Address) -> CoherenceState {
        self.set(addr).state_of(addr)
    }

    /// A blocking cache stalls its processor.
    pub fn is_blocking(&self) -> bool {
        self.awaiting_bus || self.flushing || self.updating
    }

    pub fn awaiting_bus(&self) -> bool {
        self.awaiting_bus
    }

    pub fn flushing(&self) -> bool {
        self.flushing
    }

    pub fn updating(&self) -> bool {
        self.updating
    }

    pub fn touch(&mut self, addr: &Address) -> SimResult<()> {
        match self.set_mut(addr).touch(addr) {
            Some(_) => Ok(()),
            None => Err(self.exhausted(addr)),
        }
    }

    pub fn set_state(&mut self, addr: &Address, state: CoherenceState) -> SimResult<()> {
        match self.set_mut(addr).set_state(addr, state) {
            Some(_) => Ok(()),
            None => Err(self.exhausted(addr)),
        }
    }

    /// Queue a job for arbitration. The cache blocks until the bus releases it.
    pub fn submit(&mut self, job: BusJob) -> SimResult<()> {
        if self.awaiting_bus {
            error!("cache {}: second bus job {:?} while one is outstanding", self.id, job);
            return Err(SimError::JobAlreadyPending { cache: self.id });
        }
        self.pending = Some(job);
        self.awaiting_bus = true;
        Ok(())
    }

    pub fn has_pending_job(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_job(&self) -> Option<&BusJob> {
        self.pending.as_ref()
    }

    pub(crate) fn take_pending(&mut self) -> Option<BusJob> {
        self.pending.take()
    }

    pub(crate) fn release_bus(&mut self) {
        self.awaiting_bus = false;
    }

    pub(crate) fn begin_flush(&mut self) {
        self.flushing = true;
    }

    pub(crate) fn end_flush(&mut self) {
        self.flushing = false;
    }

    pub(crate) fn begin_update(&mut self) {
        self.updating = true;
    }

    pub(crate) fn end_update(&mut self) {
        self.updating = false;
    }

    /// Make room for `addr` in its set. A dirty victim is dropped on the spot and costs no bus
    /// time; a clean one goes through an EVICTLRU job.
    pub fn start_eviction_for(&mut self, addr: &Address, now: Cycle) -> SimResult<()> {
        let id = self.id;
        let set = self.set_mut(addr);
        if set.contains(addr) || set.has_invalid() {
            return Ok(());
        }
        let Some(way) = set.lru() else {
            return Err(self.exhausted(addr));
        };
        if set.blocks()[way].state().write_back_on_evict() {
            let victim = set.evict_lru();
            debug!("cache {}: dropped dirty victim {:?} for {}", id, victim, addr);
            self.stats.record_dirty_eviction();
            return Ok(());
        }
        self.submit(BusJob::eviction(id, *addr, now))
    }

    /// Completion of an EVICTLRU job.
    pub fn finish_eviction(&mut self, addr: &Address) -> SimResult<()> {
        match self.set_mut(addr).evict_lru() {
            Some(victim) => {
                debug!("cache {}: evicted {:?} for {}", self.id, victim, addr);
                self.stats.record_eviction();
                Ok(())
            }
            None => Err(self.exhausted(addr)),
        }
    }
}
