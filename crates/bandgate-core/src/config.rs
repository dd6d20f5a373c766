//! Configuration system for bandgate.
//!
//! Resolution order: defaults → config file → environment → positional
//! command-line arguments.
//!
//! Config file location:
//!   1. $BANDGATE_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/bandgate/config.toml
//!   3. ~/.config/bandgate/config.toml

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::qos::{Rate, DEFAULT_RATE_KBPS};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BandgateConfig {
    pub network: NetworkConfig,
    pub qos: QosConfig,
    pub transfer: TransferConfig,
    pub registry: RegistryConfig,
    pub monitor: MonitorConfig,
    pub resources: ResourceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the file server binds to.
    pub bind_addr: String,
    /// File server port.
    pub port: u16,
    /// Listen backlog.
    pub backlog: u32,
    /// Loopback status API port. 0 = disabled.
    pub api_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QosConfig {
    /// Policy file, one `<ip> <rate>` per line.
    pub table_path: PathBuf,
    /// Rate for clients without a policy entry (kB/s).
    pub default_rate: Rate,
    /// Aggregate committed bandwidth the server admits (kB/s).
    pub ceiling: Rate,
}

/// How the transmitter spaces out chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingMode {
    /// Fixed sleep after every chunk, sized to the assigned rate.
    #[default]
    Fixed,
    /// Byte token bucket refilled at the assigned rate.
    TokenBucket,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Bytes read from the source and written per step.
    pub chunk_size: usize,
    pub pacing: PacingMode,
    /// Token bucket burst, in bytes. Ignored by fixed pacing.
    pub burst_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Maximum number of distinct clients tracked.
    pub capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Directory that route targets are resolved against.
    pub root: PathBuf,
    /// URL path → file name.
    pub routes: BTreeMap<String, PathBuf>,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 5000,
            backlog: 10,
            api_port: 5080,
        }
    }
}

impl Default for QosConfig {
    fn default() -> Self {
        Self {
            table_path: PathBuf::from("ips.txt"),
            default_rate: Rate(DEFAULT_RATE_KBPS),
            ceiling: Rate(10_000.0),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: 4096,
            pacing: PacingMode::Fixed,
            burst_bytes: 32 * 1024,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { capacity: 100 }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self { interval_secs: 5 }
    }
}

impl Default for ResourceConfig {
    fn default() -> Self {
        let routes = [
            ("/html", "html_simulado.txt"),
            ("/gato.jpg", "gato.jpg"),
            ("/banda.jpg", "banda.jpg"),
            ("/carro.jpg", "carro.jpg"),
            ("/jogo.jpg", "jogo.jpg"),
        ]
        .into_iter()
        .map(|(path, file)| (path.to_string(), PathBuf::from(file)))
        .collect();

        Self {
            root: PathBuf::from("."),
            routes,
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("bandgate")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid {name} argument: {value:?}")]
    InvalidArgument { name: &'static str, value: String },
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl BandgateConfig {
    /// Load config: file → env vars, on top of defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            BandgateConfig::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("BANDGATE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&BandgateConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply BANDGATE_* overrides. Unparseable values are ignored.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("BANDGATE_NETWORK__BIND_ADDR") {
            self.network.bind_addr = v;
        }
        if let Some(p) = var("BANDGATE_NETWORK__PORT").and_then(|v| v.parse().ok()) {
            self.network.port = p;
        }
        if let Some(p) = var("BANDGATE_NETWORK__API_PORT").and_then(|v| v.parse().ok()) {
            self.network.api_port = p;
        }
        if let Some(v) = var("BANDGATE_QOS__TABLE_PATH") {
            self.qos.table_path = PathBuf::from(v);
        }
        if let Some(r) = var("BANDGATE_QOS__DEFAULT_RATE").and_then(|v| parse_rate(&v)) {
            self.qos.default_rate = r;
        }
        if let Some(r) = var("BANDGATE_QOS__CEILING").and_then(|v| parse_rate(&v)) {
            self.qos.ceiling = r;
        }
        if let Some(v) = var("BANDGATE_TRANSFER__PACING") {
            match v.as_str() {
                "fixed" => self.transfer.pacing = PacingMode::Fixed,
                "token_bucket" => self.transfer.pacing = PacingMode::TokenBucket,
                _ => {}
            }
        }
        if let Some(n) = var("BANDGATE_REGISTRY__CAPACITY").and_then(|v| v.parse().ok()) {
            self.registry.capacity = n;
        }
        if let Some(n) = var("BANDGATE_MONITOR__INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.monitor.interval_secs = n;
        }
        if let Some(v) = var("BANDGATE_RESOURCES__ROOT") {
            self.resources.root = PathBuf::from(v);
        }
    }

    /// Apply positional arguments: `[port] [qos_path] [ceiling]`.
    pub fn apply_args<I>(&mut self, args: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();

        if let Some(port) = args.next() {
            self.network.port = port.parse().map_err(|_| ConfigError::InvalidArgument {
                name: "port",
                value: port.clone(),
            })?;
        }
        if let Some(path) = args.next() {
            self.qos.table_path = PathBuf::from(path);
        }
        if let Some(ceiling) = args.next() {
            self.qos.ceiling = parse_rate(&ceiling).ok_or(ConfigError::InvalidArgument {
                name: "ceiling",
                value: ceiling.clone(),
            })?;
        }
        Ok(())
    }
}

fn parse_rate(s: &str) -> Option<Rate> {
    s.parse::<f64>().ok().and_then(|v| Rate::from_kbps(v).ok())
}
