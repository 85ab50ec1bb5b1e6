use std::collections::VecDeque;

use log::debug;

use crate::bus::Bus;
use crate::cache::CacheId;
use crate::coherence::ProtocolEvent;
use crate::error::SimResult;
use crate::sim::trace::{Instruction, InstructionKind};
use crate::stats::ProcessorStats;
use crate::timeq::{Countdown, Cycle};

/// An in-order processor replaying one trace against its private cache. Issues at most one
/// instruction per cycle and stalls while its cache is blocking.
#[derive(Debug)]
pub struct Processor {
    id: usize,
    cache: CacheId,
    instructions: VecDeque<Instruction>,
    countdown: Countdown,
    stats: ProcessorStats,
}

impl Processor {
    pub fn new(id: usize, cache: CacheId, trace: impl IntoIterator<Item = Instruction>) -> Self {
        Self {
            id,
            cache,
            instructions: trace.into_iter().collect(),
            countdown: Countdown::default(),
            stats: ProcessorStats::new(id),
        }
    }

    pub fn stats(&self) -> &ProcessorStats {
        &self.stats
    }

    pub fn finished(&self, bus: &Bus) -> bool {
        self.instructions.is_empty()
            && self.countdown.finished()
            && !bus.cache(self.cache).is_blocking()
    }

    pub fn tick(&mut self, bus: &mut Bus, now: Cycle) -> SimResult<()> {
        if !self.countdown.finished() {
            self.countdown.tick();
            self.stats.record_compute_cycle();
            return Ok(());
        }
        if bus.cache(self.cache).is_blocking() {
            self.stats.record_idle_cycle();
            return Ok(());
        }
        let Some(&instr) = self.instructions.front() else {
            return Ok(());
        };

        let issued = match instr.kind {
            InstructionKind::Other => {
                self.countdown = Countdown::new(instr.value as Cycle);
                self.stats.record_cycle();
                true
            }
            InstructionKind::Invalid => {
                debug!("processor {}: skipping invalid instruction {:?}", self.id, instr);
                self.stats.record_cycle();
                true
            }
            InstructionKind::Load => self.access(bus, instr.value, false, now)?,
            InstructionKind::Store => self.access(bus, instr.value, true, now)?,
        };
        if issued {
            self.instructions.pop_front();
        }
        Ok(())
    }

    // Returns whether the access was performed. When the set is full the instruction stays at the
    // head of the trace and is retried once the eviction has made room.
    fn access(&mut self, bus: &mut Bus, raw: u32, write: bool, now: Cycle) -> SimResult<bool> {
        let addr = bus.geometry().address(raw);
        let cache = bus.cache(self.cache);
        let hit = cache.contains(&addr);
        if !hit && !cache.has_block_available_for(&addr) {
            bus.cache_mut(self.cache).start_eviction_for(&addr, now)?;
            self.stats.record_idle_cycle();
            return Ok(false);
        }

        let shared = bus.remote_holds(self.cache, &addr);
        let event = if write {
            ProtocolEvent::LocalWrite
        } else {
            ProtocolEvent::LocalRead
        };
        if !bus.local_access(self.cache, addr, event, now)? {
            self.stats.record_idle_cycle();
            return Ok(false);
        }
        self.stats.record_access(write, hit, shared);
        self.stats.record_cycle();
        Ok(true)
    }
}
