//! Configuration loading – `[gateway]`, `[simulation]` and `[[mapping]]`.
//!
//! The file is looked up, in order, at the first command-line argument,
//! `$PVGATE_CONFIG` and `~/.pvgate/config.toml`.  When none exists the
//! built-in [`Config::demo`] is used.

use std::fs;
use std::path::{Path, PathBuf};

use pvgate_core::GatewayConfig;
use serde::{Deserialize, Serialize};

/// Shape of a simulated process variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PvKind {
    /// `f64` scalar.
    Analog,
    /// Two-state enumeration.
    Binary,
    /// Enumeration with more than two states.
    MultiState,
    /// `i32` scalar.
    Long,
    /// `i64` scalar.
    Int64,
}

impl std::fmt::Display for PvKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PvKind::Analog => write!(f, "analog"),
            PvKind::Binary => write!(f, "binary"),
            PvKind::MultiState => write!(f, "multi_state"),
            PvKind::Long => write!(f, "long"),
            PvKind::Int64 => write!(f, "int64"),
        }
    }
}

/// One `[[mapping]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingEntry {
    /// Process-variable name on the remote side.
    pub pv: String,
    /// Canonical node id, e.g. `ns=2;s=Temperature`.
    pub node: String,
    pub kind: PvKind,
    /// Initial value; enumerations use it as the index.
    #[serde(default)]
    pub initial: f64,
    /// Choice labels for `multi_state` (defaults to four generic states).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
}

/// `[simulation]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Drift analog PVs in the background.
    #[serde(default = "default_sim_enabled")]
    pub enabled: bool,
    /// Drift period in milliseconds.
    #[serde(default = "default_sim_period_ms")]
    pub period_ms: u64,
}

fn default_sim_enabled() -> bool {
    true
}
fn default_sim_period_ms() -> u64 {
    500
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            enabled: default_sim_enabled(),
            period_ms: default_sim_period_ms(),
        }
    }
}

/// Whole configuration file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub mapping: Vec<MappingEntry>,
}

impl Config {
    /// Built-in configuration used when no file is found.
    pub fn demo() -> Self {
        let entry = |pv: &str, node: &str, kind, initial| MappingEntry {
            pv: pv.to_string(),
            node: node.to_string(),
            kind,
            initial,
            choices: Vec::new(),
        };
        Self {
            gateway: GatewayConfig {
                worker_count: 2,
                ..GatewayConfig::default()
            },
            simulation: SimulationConfig::default(),
            mapping: vec![
                entry("demo:Temperature", "ns=2;s=Temperature", PvKind::Analog, 21.5),
                entry("demo:Pump:Running", "ns=2;s=PumpRunning", PvKind::Binary, 1.0),
                MappingEntry {
                    choices: vec!["Off".into(), "Low".into(), "High".into()],
                    ..entry("demo:Fan:Speed", "ns=2;s=FanSpeed", PvKind::MultiState, 1.0)
                },
                entry("demo:Counter", "ns=2;i=1001", PvKind::Long, 0.0),
                entry("demo:Uptime", "ns=2;i=1002", PvKind::Int64, 0.0),
            ],
        }
    }
}

/// Default path `~/.pvgate/config.toml`.
pub fn default_config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".pvgate").join("config.toml")
}

/// Pick the config path: explicit argument, then `$PVGATE_CONFIG`, then the default.
pub fn resolve_path(arg: Option<String>) -> PathBuf {
    arg.or_else(|| std::env::var("PVGATE_CONFIG").ok())
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path)
}

/// Load the config from `path` and apply environment overrides.
/// Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    let mut cfg = read_from(path)?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

/// Parse the file at `path` as-is.
pub(crate) fn read_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    toml::from_str(&raw)
        .map(Some)
        .map_err(|e| format!("Failed to parse config: {}", e))
}

/// Apply `PVGATE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `PVGATE_WORKERS` | `gateway.worker_count` |
/// | `PVGATE_QUEUE_CAPACITY` | `gateway.queue_capacity` |
///
/// Values that do not parse as a positive integer are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Some(n) = positive_env("PVGATE_WORKERS") {
        cfg.gateway.worker_count = n;
    }
    if let Some(n) = positive_env("PVGATE_QUEUE_CAPACITY") {
        cfg.gateway.queue_capacity = n;
    }
}

fn positive_env(key: &str) -> Option<usize> {
    std::env::var(key)
        .ok()?
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
}
