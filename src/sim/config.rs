use std::path::PathBuf;

use log::warn;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use toml::Value;

use crate::cache::geometry::CacheGeometry;
use crate::coherence::CoherencePolicy;
use crate::error::SimResult;

/// A config struct loaded from one `[section]` of the config file.
pub trait Config: DeserializeOwned + Default {
    fn from_section(section: Option<&Value>) -> Result<Self, toml::de::Error> {
        match section {
            Some(value) => value.clone().try_into(),
            None => {
                warn!("config section not found");
                Ok(Self::default())
            }
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    /// Trace files, or directories of `*.data` traces. One processor per trace.
    pub traces: Vec<PathBuf>,
    /// Run once per policy, in order.
    pub policies: Vec<CoherencePolicy>,
    pub max_cycles: Option<u64>,
    pub summary_json: Option<PathBuf>,
    pub quiet: bool,
}

impl Config for SimConfig {}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            traces: Vec::new(),
            policies: vec![CoherencePolicy::Msi],
            max_cycles: None,
            summary_json: None,
            quiet: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    pub cache_size: u32,
    pub block_size: u32,
    pub associativity: u32,
}

impl Config for CacheConfig {}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_size: 1024,
            block_size: 16,
            associativity: 1,
        }
    }
}

impl CacheConfig {
    pub fn geometry(&self, policy: CoherencePolicy) -> SimResult<CacheGeometry> {
        CacheGeometry::configure(self.cache_size, self.block_size, self.associativity, policy)
    }
}
