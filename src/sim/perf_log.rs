use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

use crate::cache::geometry::CacheGeometry;
use crate::coherence::CoherencePolicy;
use crate::stats::{BusStats, CacheStats, ProcessorStats};
use crate::timeq::Cycle;

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub policy: CoherencePolicy,
    pub geometry: CacheGeometry,
    pub cycles: Cycle,
    pub bus: BusStats,
    pub processors: Vec<ProcessorStats>,
    pub caches: Vec<CacheStats>,
}

impl RunReport {
    pub fn new(
        geometry: CacheGeometry,
        cycles: Cycle,
        bus: BusStats,
        processors: Vec<ProcessorStats>,
        caches: Vec<CacheStats>,
    ) -> Self {
        Self {
            policy: geometry.policy(),
            geometry,
            cycles,
            bus,
            processors,
            caches,
        }
    }

    /// All processors folded into one.
    pub fn summary(&self) -> ProcessorStats {
        let mut total = ProcessorStats::default();
        for p in &self.processors {
            total += p;
        }
        total
    }

    pub fn cache_totals(&self) -> CacheStats {
        let mut total = CacheStats::default();
        for c in &self.caches {
            total += c;
        }
        total
    }

    pub fn render(&self) -> String {
        let g = &self.geometry;
        let bus = &self.bus;
        let caches = self.cache_totals();
        let mut lines = vec![
            format!(
                "== {} | {}B cache, {}B blocks, {}-way, {} sets | {} cycles",
                self.policy,
                g.cache_size(),
                g.block_size(),
                g.associativity(),
                g.num_sets(),
                self.cycles
            ),
            format!(
                "bus: {} transactions ({} rd, {} rdx, {} upd, {} evict), {} flushes, {} invalidations, {} bytes, avg write latency {:.2}",
                bus.transactions(),
                bus.reads(),
                bus.read_exclusives(),
                bus.updates(),
                bus.evictions(),
                bus.flushes(),
                bus.invalidations(),
                bus.bytes_transferred(),
                bus.average_write_latency()
            ),
            format!(
                "caches: {} evictions, {} dirty evictions",
                caches.evictions(),
                caches.dirty_evictions()
            ),
        ];
        lines.extend(
            self.processors
                .iter()
                .map(|p| processor_line(&format!("p{}", p.id()), p)),
        );
        lines.push(processor_line("total", &self.summary()));
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    /// Single space-separated record, for collecting many runs into one table.
    pub fn quiet_line(&self, traces: &str) -> String {
        let g = &self.geometry;
        let total = self.summary();
        [
            self.policy.to_string(),
            traces.to_string(),
            g.cache_size().to_string(),
            g.block_size().to_string(),
            g.associativity().to_string(),
            total.miss_rate().to_string(),
            self.bus.bytes_transferred().to_string(),
            self.bus.invalidations().to_string(),
            self.bus.updates().to_string(),
            total.private_accesses().to_string(),
            total.shared_accesses().to_string(),
            format!("{:.2}", self.bus.average_write_latency()),
            self.cycles.to_string(),
        ]
        .join(" ")
    }

    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("failed to serialize run report")?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }
}

fn processor_line(label: &str, p: &ProcessorStats) -> String {
    format!(
        "{:>6}: {} cycles ({} compute, {} idle), loads {}/{} hit, stores {}/{} hit, miss rate {:.4}, {} private / {} shared",
        label,
        p.cycles(),
        p.compute_cycles(),
        p.idle_cycles(),
        p.read_hits(),
        p.loads(),
        p.write_hits(),
        p.stores(),
        p.miss_rate(),
        p.private_accesses(),
        p.shared_accesses()
    )
}

/// `summary.json` becomes `summary_mesi.json`, so runs of several policies do not overwrite each
/// other.
pub fn policy_path(base: &Path, policy: CoherencePolicy) -> PathBuf {
    let stem = base
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("summary");
    let tag = policy.name().to_ascii_lowercase();
    let file_name = match base.extension().and_then(|s| s.to_str()) {
        Some(ext) => format!("{stem}_{tag}.{ext}"),
        None => format!("{stem}_{tag}"),
    };
    base.with_file_name(file_name)
}

#[cfg(test)]
mod tests {
    use super::policy_path;
    use crate::cache::geometry::CacheGeometry;
    use crate::coherence::CoherencePolicy;
    use crate::sim::top::run_simulation;
    use crate::sim::trace::Instruction;
    use std::path::{Path, PathBuf};

    #[test]
    fn render_has_one_line_per_processor_plus_total() {
        let g = CacheGeometry::configure(64, 16, 1, CoherencePolicy::Mesi).unwrap();
        let traces = vec![vec![Instruction::load(0x0)], vec![Instruction::other(3)]];
        let report = run_simulation(g, &traces, None).unwrap();
        let text = report.render();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[0].starts_with("== MESI | 64B cache"), "{}", lines[0]);
        assert!(lines[0].ends_with("| 100 cycles"), "{}", lines[0]);
        assert!(lines[3].trim_start().starts_with("p0:"));
        assert!(lines[4].trim_start().starts_with("p1:"));
        assert!(lines[5].trim_start().starts_with("total:"));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn policy_path_tags_file_stem() {
        assert_eq!(
            policy_path(Path::new("out/summary.json"), CoherencePolicy::Dragon),
            PathBuf::from("out/summary_dragon.json")
        );
        assert_eq!(
            policy_path(Path::new("report"), CoherencePolicy::Msi),
            PathBuf::from("report_msi")
        );
    }
}
