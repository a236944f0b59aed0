use crate::runner::platform_thread_limit;
use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the country table, the snapshots and the output files.
    pub data_dir: PathBuf,
    /// Relative paths resolve against `data_dir`.
    pub country_file: PathBuf,
    pub fresh: bool,
    /// Per-pass thread cap; 0 picks one from the CPU count.
    pub max_threads: usize,
    pub workers: WorkerConfig,
    pub name_search: NameSearchConfig,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    pub newspapers: usize,
    pub tv_channels: usize,
    pub raw_readership: usize,
    pub normalization: usize,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct NameSearchConfig {
    pub result_count: usize,
    /// A publisher must hold strictly more than this share of the results.
    pub share_threshold: f64,
    pub prefer_english: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            country_file: PathBuf::from("Internet_TV_per_country.csv"),
            fresh: false,
            max_threads: 0,
            workers: WorkerConfig::default(),
            name_search: NameSearchConfig::default(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { newspapers: 24, tv_channels: 48, raw_readership: 96, normalization: 128 }
    }
}

impl Default for NameSearchConfig {
    fn default() -> Self {
        Self { result_count: 40, share_threshold: 0.4, prefer_english: false }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading pipeline configuration from: {}", path.display());
        let file = File::open(path).with_context(|| format!("Failed to open configuration file: {}", path.display()))?;
        let config: PipelineConfig = serde_yaml::from_reader(file)
            .with_context(|| format!("Failed to parse configuration YAML from {}", path.display()))?;
        Ok(config)
    }

    pub fn country_path(&self) -> PathBuf {
        self.data_dir.join(&self.country_file)
    }

    pub fn thread_limit(&self) -> usize {
        if self.max_threads == 0 {
            platform_thread_limit()
        } else {
            self.max_threads
        }
    }
}
