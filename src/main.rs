use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use log::info;
use toml::Table;

use snoopbus::coherence::CoherencePolicy;
use snoopbus::sim::config::{CacheConfig, Config, SimConfig};
use snoopbus::sim::perf_log::policy_path;
use snoopbus::sim::top::run_simulation;
use snoopbus::sim::trace::{discover_traces, load_trace};

#[derive(Parser)]
#[command(version, about)]
struct SnoopbusArgs {
    #[arg(help = "Path to config.toml")]
    config_path: Option<PathBuf>,
    #[arg(short = 'f', long, num_args = 1.., help = "Trace files, or directories of *.data traces")]
    files: Vec<PathBuf>,
    #[arg(long, help = "Override cache size in bytes")]
    cache_size: Option<u32>,
    #[arg(long, help = "Override block size in bytes")]
    block_size: Option<u32>,
    #[arg(short = 'a', long, help = "Override associativity")]
    associativity: Option<u32>,
    #[arg(short = 'p', long = "policy", help = "Coherence policy (msi, mesi, musi, dragon); repeatable")]
    policies: Vec<CoherencePolicy>,
    #[arg(long, help = "Abort a run that takes longer than this many cycles")]
    max_cycles: Option<u64>,
    #[arg(long, help = "Write a JSON report per policy, tagged with the policy name")]
    summary_json: Option<PathBuf>,
    #[arg(short = 'q', long, help = "Print one line per run")]
    quiet: bool,
}

pub fn main() -> anyhow::Result<()> {
    env_logger::init();

    let argv = SnoopbusArgs::parse();
    let config_table: Table = match &argv.config_path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str(&text).context("cannot parse config toml")?
        }
        None => Table::new(),
    };
    let mut sim_config =
        SimConfig::from_section(config_table.get("sim")).context("invalid [sim] section")?;
    let mut cache_config =
        CacheConfig::from_section(config_table.get("cache")).context("invalid [cache] section")?;

    // override toml configs with argv
    if !argv.files.is_empty() {
        sim_config.traces = argv.files.clone();
    }
    if !argv.policies.is_empty() {
        sim_config.policies = argv.policies.clone();
    }
    sim_config.max_cycles = argv.max_cycles.or(sim_config.max_cycles);
    sim_config.summary_json = argv.summary_json.clone().or(sim_config.summary_json);
    sim_config.quiet |= argv.quiet;
    cache_config.cache_size = argv.cache_size.unwrap_or(cache_config.cache_size);
    cache_config.block_size = argv.block_size.unwrap_or(cache_config.block_size);
    cache_config.associativity = argv.associativity.unwrap_or(cache_config.associativity);

    let Some(&first_policy) = sim_config.policies.first() else {
        bail!("no coherence policy selected");
    };
    let geometry = cache_config.geometry(first_policy)?;

    if sim_config.traces.is_empty() {
        bail!("no input traces, pass --files or set sim.traces");
    }
    let paths = discover_traces(&sim_config.traces)?;
    if paths.is_empty() {
        bail!("no *.data traces found in the given inputs");
    }
    let traces = paths
        .iter()
        .map(|path| load_trace(path))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let trace_label = sim_config
        .traces
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(":");

    for &policy in &sim_config.policies {
        let report = run_simulation(geometry.with_policy(policy), &traces, sim_config.max_cycles)
            .with_context(|| format!("{} run failed", policy))?;
        if sim_config.quiet {
            println!("{}", report.quiet_line(&trace_label));
        } else {
            print!("{}", report.render());
        }
        if let Some(base) = &sim_config.summary_json {
            let path = policy_path(base, policy);
            report.write_json(&path)?;
            info!("wrote {}", path.display());
        }
    }
    Ok(())
}
