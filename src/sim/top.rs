use log::{error, info};

use crate::bus::Bus;
use crate::cache::geometry::CacheGeometry;
use crate::error::{SimError, SimResult};
use crate::processor::Processor;
use crate::sim::perf_log::RunReport;
use crate::sim::trace::Instruction;
use crate::timeq::Cycle;

/// The lock-step driver. Owns the bus (and through it every cache) and all processors; each cycle
/// every processor ticks in id order, then the bus ticks once.
#[derive(Debug)]
pub struct MultiProcessor {
    processors: Vec<Processor>,
    bus: Bus,
    cycle: Cycle,
    max_cycles: Option<Cycle>,
}

impl MultiProcessor {
    pub fn new(geometry: CacheGeometry) -> Self {
        Self {
            processors: Vec::new(),
            bus: Bus::new(geometry),
            cycle: 0,
            max_cycles: None,
        }
    }

    pub fn with_max_cycles(mut self, max_cycles: Option<Cycle>) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    /// Add a processor with its own fresh cache.
    pub fn add_processor(&mut self, trace: impl IntoIterator<Item = Instruction>) -> usize {
        let cache = self.bus.attach();
        let id = self.processors.len();
        self.processors.push(Processor::new(id, cache, trace));
        id
    }

    pub fn cycle(&self) -> Cycle {
        self.cycle
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn processors(&self) -> &[Processor] {
        &self.processors
    }

    pub fn finished(&self) -> bool {
        self.processors.iter().all(|p| p.finished(&self.bus))
    }

    pub fn tick_one(&mut self) -> SimResult<()> {
        self.cycle += 1;
        let now = self.cycle;
        for processor in self.processors.iter_mut() {
            processor.tick(&mut self.bus, now)?;
        }
        self.bus.tick(now)
    }

    /// Run until every processor has drained its trace and its cache has gone quiet.
    pub fn run(&mut self) -> SimResult<Cycle> {
        let geometry = *self.bus.geometry();
        info!(
            "running {} on {} processor(s): {}B cache, {}B blocks, {}-way",
            geometry.policy(),
            self.processors.len(),
            geometry.cache_size(),
            geometry.block_size(),
            geometry.associativity()
        );
        while !self.finished() {
            if let Some(limit) = self.max_cycles {
                if self.cycle >= limit {
                    error!("{} run still busy after {} cycles", geometry.policy(), limit);
                    return Err(SimError::CycleLimit(limit));
                }
            }
            self.tick_one()?;
        }
        info!("{} finished after {} cycles", geometry.policy(), self.cycle);
        Ok(self.cycle)
    }

    pub fn report(&self) -> RunReport {
        RunReport::new(
            *self.bus.geometry(),
            self.cycle,
            *self.bus.stats(),
            self.processors.iter().map(|p| *p.stats()).collect(),
            self.bus.caches().iter().map(|c| *c.stats()).collect(),
        )
    }
}

/// Simulate one trace per processor under `geometry` from a clean state.
pub fn run_simulation(
    geometry: CacheGeometry,
    traces: &[Vec<Instruction>],
    max_cycles: Option<Cycle>,
) -> SimResult<RunReport> {
    let mut top = MultiProcessor::new(geometry).with_max_cycles(max_cycles);
    for trace in traces {
        top.add_processor(trace.iter().copied());
    }
    top.run()?;
    Ok(top.report())
}
