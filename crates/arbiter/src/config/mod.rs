//! Judge configuration: sandbox setup, judging policy, and languages.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

pub use crate::config::language::{
    CompileConfig, DEFAULT_SANDBOX_PATH, ExtraFile, FileExtension, Language, RunConfig,
};
use crate::types::{MountConfig, ResourceLimits};

pub mod language;
mod loader;

/// Example configuration embedded at compile time. `arbiter init` writes it
/// out as a starter file, and [`Config::default`] parses it for the shipped
/// language set.
pub const EXAMPLE_CONFIG: &str = include_str!("../../arbiter.example.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid characters in file extension")]
    InvalidFileExtChars,

    #[error("failed to parse config: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Path to the isolate binary (searched on PATH when unset).
    #[serde(default)]
    pub isolate_path: Option<PathBuf>,

    /// Use cgroup memory limiting instead of RLIMIT_AS.
    ///
    /// Required for runtimes that map large virtual address spaces (JVM,
    /// Node, Go); limits actual usage rather than address space.
    #[serde(default)]
    pub cgroup: bool,

    /// Cgroup root for isolate; must match isolate's own `cg_root` setting.
    #[serde(default = "default_cg_root")]
    pub cg_root: PathBuf,

    /// Mounts applied to every sandbox invocation, compilation included.
    #[serde(default)]
    pub sandbox_mounts: Vec<MountConfig>,

    /// Baseline resource limits; per-language and per-request limits
    /// override these field by field.
    #[serde(default)]
    pub default_limits: ResourceLimits,

    /// Judging policy knobs.
    #[serde(default)]
    pub judge: JudgeSettings,

    /// Language configurations keyed by the request's language string.
    #[serde(default)]
    pub languages: HashMap<String, Language>,
}

/// Policy knobs for the judge orchestrator.
#[derive(Debug, Clone, Deserialize)]
pub struct JudgeSettings {
    /// Maximum concurrently judged submissions (sandbox pool size).
    #[serde(default = "default_max_sandboxes")]
    pub max_sandboxes: u32,

    /// First isolate box ID used by the pool.
    #[serde(default)]
    pub box_start_id: u32,

    /// Keep executing test cases after a time/memory/runtime failure and
    /// report a result per test, instead of stopping at the first one.
    #[serde(default)]
    pub run_all_tests: bool,
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self {
            max_sandboxes: default_max_sandboxes(),
            box_start_id: 0,
            run_all_tests: false,
        }
    }
}

impl Config {
    /// Configuration with the embedded language set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration with no languages at all.
    pub fn empty() -> Self {
        Self {
            isolate_path: None,
            cgroup: false,
            cg_root: default_cg_root(),
            sandbox_mounts: Vec::new(),
            default_limits: ResourceLimits::default(),
            judge: JudgeSettings::default(),
            languages: HashMap::new(),
        }
    }

    /// Look up a language by its request key.
    pub fn language(&self, key: &str) -> Option<&Language> {
        self.languages.get(key)
    }

    /// Path to the isolate binary.
    pub fn isolate_binary(&self) -> PathBuf {
        self.isolate_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("isolate"))
    }

    /// Merge request-level limits over the configured defaults.
    pub fn effective_limits(&self, overrides: Option<&ResourceLimits>) -> ResourceLimits {
        match overrides {
            Some(limits) => self.default_limits.with_overrides(limits),
            None => self.default_limits.clone(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_toml(EXAMPLE_CONFIG).expect("embedded default config should be valid")
    }
}

fn default_cg_root() -> PathBuf {
    PathBuf::from("/sys/fs/cgroup/isolate")
}

fn default_max_sandboxes() -> u32 {
    4
}
