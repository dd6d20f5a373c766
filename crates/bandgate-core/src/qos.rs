//! QoS policy — per-client rate assignment.
//!
//! The policy file is line oriented:
//!
//!   # ip          rate (kB/s)
//!   10.0.0.2      250
//!   192.168.1.7   4000
//!
//! Lookups are first-match-wins over an ordered, bounded table. Clients
//! without an entry get the default rate. The table is immutable once
//! built and is shared between connection handlers without locking.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Maximum number of entries kept from a policy file.
pub const MAX_QOS_ENTRIES: usize = 100;

/// Rate assigned to clients that have no policy entry.
pub const DEFAULT_RATE_KBPS: f64 = 1000.0;

/// Bytes per kilobyte, as used by every rate in the system.
const KILOBYTE: f64 = 1024.0;

// ── Rate ──────────────────────────────────────────────────────────────────────

/// A byte rate in kilobytes per second. Always finite and positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Rate(pub(crate) f64);

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("rate must be a finite positive number, got {0}")]
pub struct InvalidRate(pub f64);

impl Rate {
    pub fn from_kbps(kbps: f64) -> Result<Self, InvalidRate> {
        if kbps.is_finite() && kbps > 0.0 {
            Ok(Self(kbps))
        } else {
            Err(InvalidRate(kbps))
        }
    }

    pub fn kbps(self) -> f64 {
        self.0
    }

    pub fn bytes_per_sec(self) -> f64 {
        self.0 * KILOBYTE
    }

    /// Wall-clock time needed to move `bytes` at this rate.
    pub fn transmit_time(self, bytes: usize) -> Duration {
        let secs = bytes as f64 / self.bytes_per_sec();
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

impl TryFrom<f64> for Rate {
    type Error = InvalidRate;

    fn try_from(kbps: f64) -> Result<Self, Self::Error> {
        Self::from_kbps(kbps)
    }
}

impl From<Rate> for f64 {
    fn from(rate: Rate) -> f64 {
        rate.0
    }
}

impl std::fmt::Display for Rate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} kB/s", self.0)
    }
}

// ── Table ─────────────────────────────────────────────────────────────────────

/// One policy line.
#[derive(Debug, Clone, Serialize)]
pub struct QosEntry {
    pub ip: IpAddr,
    pub rate: Rate,
}

#[derive(Debug, thiserror::Error)]
pub enum QosError {
    #[error("QoS file not found: {0}")]
    Missing(PathBuf),
    #[error("failed to read QoS file {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
}

/// Immutable IP → rate policy.
#[derive(Debug, Clone)]
pub struct QosTable {
    entries: Vec<QosEntry>,
    default_rate: Rate,
    skipped: usize,
}

impl QosTable {
    /// An empty table: every client gets `default_rate`.
    pub fn new(default_rate: Rate) -> Self {
        Self {
            entries: Vec::new(),
            default_rate,
            skipped: 0,
        }
    }

    /// Parse policy text. Malformed lines are skipped and counted;
    /// entries past [`MAX_QOS_ENTRIES`] are ignored.
    pub fn parse(text: &str, default_rate: Rate) -> Self {
        let mut table = Self::new(default_rate);

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if table.entries.len() >= MAX_QOS_ENTRIES {
                break;
            }
            match parse_line(line) {
                Some(entry) => table.entries.push(entry),
                None => table.skipped += 1,
            }
        }

        table
    }

    /// Read and parse a policy file.
    pub fn load(path: &Path, default_rate: Rate) -> Result<Self, QosError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                QosError::Missing(path.to_path_buf())
            } else {
                QosError::ReadFailed(path.to_path_buf(), e)
            }
        })?;
        Ok(Self::parse(&text, default_rate))
    }

    /// Rate for `ip`, or the default rate when no entry matches.
    pub fn lookup(&self, ip: IpAddr) -> Rate {
        let ip = ip.to_canonical();
        self.entries
            .iter()
            .find(|e| e.ip == ip)
            .map(|e| e.rate)
            .unwrap_or(self.default_rate)
    }

    pub fn default_rate(&self) -> Rate {
        self.default_rate
    }

    pub fn entries(&self) -> &[QosEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of malformed lines dropped while parsing.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

fn parse_line(line: &str) -> Option<QosEntry> {
    let mut fields = line.split_whitespace();
    let ip = fields.next()?.parse::<IpAddr>().ok()?;
    let kbps = fields.next()?.parse::<f64>().ok()?;
    if fields.next().is_some() {
        return None;
    }
    let rate = Rate::from_kbps(kbps).ok()?;
    Some(QosEntry {
        ip: ip.to_canonical(),
        rate,
    })
}
