use std::ops::AddAssign;

use serde::Serialize;

use crate::bus::BusAction;
use crate::timeq::Cycle;

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Traffic seen on the bus over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BusStats {
    reads: u64,
    read_exclusives: u64,
    updates: u64,
    flushes: u64,
    evictions: u64,
    transactions: u64,
    invalidations: u64,
    bytes_transferred: u64,
    write_latency_total: u64,
    timed_writes: u64,
}

impl BusStats {
    pub fn reads(&self) -> u64 {
        self.reads
    }

    pub fn read_exclusives(&self) -> u64 {
        self.read_exclusives
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    pub fn transactions(&self) -> u64 {
        self.transactions
    }

    pub fn invalidations(&self) -> u64 {
        self.invalidations
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    pub fn write_latency_total(&self) -> u64 {
        self.write_latency_total
    }

    pub fn timed_writes(&self) -> u64 {
        self.timed_writes
    }

    pub fn average_write_latency(&self) -> f64 {
        ratio(self.write_latency_total, self.timed_writes)
    }

    /// A normal transaction completed.
    pub fn record_transaction(&mut self, action: BusAction, bytes: u32) {
        let counter = match action {
            BusAction::BusRd => &mut self.reads,
            BusAction::BusRdX => &mut self.read_exclusives,
            BusAction::BusUpd => &mut self.updates,
            BusAction::EvictLru => &mut self.evictions,
        };
        *counter = counter.saturating_add(1);
        self.transactions = self.transactions.saturating_add(1);
        self.bytes_transferred = self.bytes_transferred.saturating_add(bytes as u64);
    }

    /// A priority update completed.
    pub fn record_update(&mut self, bytes: u32) {
        self.updates = self.updates.saturating_add(1);
        self.transactions = self.transactions.saturating_add(1);
        self.bytes_transferred = self.bytes_transferred.saturating_add(bytes as u64);
    }

    /// A cache joined a flush.
    pub fn record_flush(&mut self) {
        self.flushes = self.flushes.saturating_add(1);
    }

    /// A flush completed.
    pub fn record_flush_transfer(&mut self, bytes: u32) {
        self.transactions = self.transactions.saturating_add(1);
        self.bytes_transferred = self.bytes_transferred.saturating_add(bytes as u64);
    }

    pub fn record_invalidation(&mut self) {
        self.invalidations = self.invalidations.saturating_add(1);
    }

    pub fn record_write_latency(&mut self, cycles: Cycle) {
        self.write_latency_total = self.write_latency_total.saturating_add(cycles);
        self.timed_writes = self.timed_writes.saturating_add(1);
    }
}

/// Per-processor counters. `cycles` is every cycle the processor was not yet finished; it splits
/// into issue, compute (OTHER countdown) and idle (blocked on the cache) cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProcessorStats {
    id: usize,
    cycles: Cycle,
    compute_cycles: Cycle,
    idle_cycles: Cycle,
    read_hits: u64,
    read_misses: u64,
    write_hits: u64,
    write_misses: u64,
    private_accesses: u64,
    shared_accesses: u64,
}

impl ProcessorStats {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn cycles(&self) -> Cycle {
        self.cycles
    }

    pub fn compute_cycles(&self) -> Cycle {
        self.compute_cycles
    }

    pub fn idle_cycles(&self) -> Cycle {
        self.idle_cycles
    }

    pub fn read_hits(&self) -> u64 {
        self.read_hits
    }

    pub fn read_misses(&self) -> u64 {
        self.read_misses
    }

    pub fn write_hits(&self) -> u64 {
        self.write_hits
    }

    pub fn write_misses(&self) -> u64 {
        self.write_misses
    }

    pub fn private_accesses(&self) -> u64 {
        self.private_accesses
    }

    pub fn shared_accesses(&self) -> u64 {
        self.shared_accesses
    }

    pub fn loads(&self) -> u64 {
        self.read_hits + self.read_misses
    }

    pub fn stores(&self) -> u64 {
        self.write_hits + self.write_misses
    }

    pub fn accesses(&self) -> u64 {
        self.loads() + self.stores()
    }

    pub fn misses(&self) -> u64 {
        self.read_misses + self.write_misses
    }

    pub fn miss_rate(&self) -> f64 {
        ratio(self.misses(), self.accesses())
    }

    pub fn record_cycle(&mut self) {
        self.cycles = self.cycles.saturating_add(1);
    }

    pub fn record_compute_cycle(&mut self) {
        self.record_cycle();
        self.compute_cycles = self.compute_cycles.saturating_add(1);
    }

    pub fn record_idle_cycle(&mut self) {
        self.record_cycle();
        self.idle_cycles = self.idle_cycles.saturating_add(1);
    }

    pub fn record_access(&mut self, write: bool, hit: bool, shared: bool) {
        let counter = match (write, hit) {
            (false, true) => &mut self.read_hits,
            (false, false) => &mut self.read_misses,
            (true, true) => &mut self.write_hits,
            (true, false) => &mut self.write_misses,
        };
        *counter = counter.saturating_add(1);
        if shared {
            self.shared_accesses = self.shared_accesses.saturating_add(1);
        } else {
            self.private_accesses = self.private_accesses.saturating_add(1);
        }
    }
}

impl AddAssign<&ProcessorStats> for ProcessorStats {
    fn add_assign(&mut self, other: &ProcessorStats) {
        // processors run side by side, so the combined run is as long as the slowest
        self.cycles = self.cycles.max(other.cycles);
        self.compute_cycles = self.compute_cycles.saturating_add(other.compute_cycles);
        self.idle_cycles = self.idle_cycles.saturating_add(other.idle_cycles);
        self.read_hits = self.read_hits.saturating_add(other.read_hits);
        self.read_misses = self.read_misses.saturating_add(other.read_misses);
        self.write_hits = self.write_hits.saturating_add(other.write_hits);
        self.write_misses = self.write_misses.saturating_add(other.write_misses);
        self.private_accesses = self.private_accesses.saturating_add(other.private_accesses);
        self.shared_accesses = self.shared_accesses.saturating_add(other.shared_accesses);
    }
}

impl AddAssign<ProcessorStats> for ProcessorStats {
    fn add_assign(&mut self, other: ProcessorStats) {
        *self += &other;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    evictions: u64,
    dirty_evictions: u64,
    invalidations: u64,
    flushes: u64,
}

impl CacheStats {
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    pub fn dirty_evictions(&self) -> u64 {
        self.dirty_evictions
    }

    pub fn invalidations(&self) -> u64 {
        self.invalidations
    }

    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    pub fn record_eviction(&mut self) {
        self.evictions = self.evictions.saturating_add(1);
    }

    pub fn record_dirty_eviction(&mut self) {
        self.dirty_evictions = self.dirty_evictions.saturating_add(1);
    }

    pub fn record_invalidation(&mut self) {
        self.invalidations = self.invalidations.saturating_add(1);
    }

    pub fn record_flush(&mut self) {
        self.flushes = self.flushes.saturating_add(1);
    }
}

impl AddAssign<&CacheStats> for CacheStats {
    fn add_assign(&mut self, other: &CacheStats) {
        self.evictions = self.evictions.saturating_add(other.evictions);
        self.dirty_evictions = self.dirty_evictions.saturating_add(other.dirty_evictions);
        self.invalidations = self.invalidations.saturating_add(other.invalidations);
        self.flushes = self.flushes.saturating_add(other.flushes);
    }
}
