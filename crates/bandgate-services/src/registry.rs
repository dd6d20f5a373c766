//! Client registry — per-IP request history.
//!
//! One record per client IP, created on the client's first admitted
//! request and kept for the life of the process. The table is bounded:
//! once `capacity` distinct clients are tracked, new clients are still
//! served but leave no history.
//!
//! "RTT" here is the interval between the starts of two consecutive
//! requests from the same client, not a network round-trip time.

use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

use crate::state::ConnectionId;

/// Tracked state for one client.
#[derive(Debug, Clone)]
pub struct ClientRecord {
    pub ip: IpAddr,
    /// Seconds between the last two request starts. 0 for the first request.
    pub last_rtt: f64,
    /// Throughput of the last transfer, in kB/s.
    pub last_bandwidth: f64,
    pub last_request_at: Option<Instant>,
    pub request_count: u64,
    /// Connection that last updated this record.
    pub last_connection: Option<ConnectionId>,
}

impl ClientRecord {
    fn new(ip: IpAddr) -> Self {
        Self {
            ip,
            last_rtt: 0.0,
            last_bandwidth: 0.0,
            last_request_at: None,
            request_count: 0,
            last_connection: None,
        }
    }
}

/// Serializable copy of a record.
#[derive(Debug, Clone, Serialize)]
pub struct ClientSnapshot {
    pub ip: IpAddr,
    pub last_rtt_secs: f64,
    pub last_bandwidth_kbps: f64,
    pub request_count: u64,
    pub last_connection: Option<ConnectionId>,
    pub last_seen_secs: Option<u64>,
}

impl From<&ClientRecord> for ClientSnapshot {
    fn from(r: &ClientRecord) -> Self {
        Self {
            ip: r.ip,
            last_rtt_secs: r.last_rtt,
            last_bandwidth_kbps: r.last_bandwidth,
            request_count: r.request_count,
            last_connection: r.last_connection,
            last_seen_secs: r.last_request_at.map(|t| t.elapsed().as_secs()),
        }
    }
}

/// Stable reference to a tracked client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientHandle {
    ip: IpAddr,
}

impl ClientHandle {
    pub fn ip(&self) -> IpAddr {
        self.ip
    }
}

/// The client registry, shared between handlers, the monitor and the API.
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    records: Arc<DashMap<IpAddr, ClientRecord>>,
    capacity: usize,
    // slots handed out; only ever grows
    allocated: Arc<AtomicUsize>,
}

impl ClientRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            capacity,
            allocated: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Look up the record for `ip`, creating it if there is room.
    /// Returns `None` when the table is full and `ip` is new.
    pub fn find_or_create(&self, ip: IpAddr) -> Option<ClientHandle> {
        let ip = ip.to_canonical();
        if self.records.contains_key(&ip) {
            return Some(ClientHandle { ip });
        }

        let reserved = self
            .allocated
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.capacity).then_some(n + 1)
            });
        if reserved.is_err() {
            // full, unless a concurrent request from the same client got in first
            return self
                .records
                .contains_key(&ip)
                .then_some(ClientHandle { ip });
        }

        match self.records.entry(ip) {
            Entry::Occupied(_) => {
                self.allocated.fetch_sub(1, Ordering::AcqRel);
            }
            Entry::Vacant(slot) => {
                slot.insert(ClientRecord::new(ip));
            }
        }
        Some(ClientHandle { ip })
    }

    /// Record a finished transfer that started at `started`.
    /// Returns the updated record.
    pub fn update(
        &self,
        handle: &ClientHandle,
        started: Instant,
        bandwidth: f64,
        connection: ConnectionId,
    ) -> Option<ClientRecord> {
        let mut record = self.records.get_mut(&handle.ip)?;
        record.last_rtt = match record.last_request_at {
            Some(previous) if record.request_count > 0 => {
                started.saturating_duration_since(previous).as_secs_f64()
            }
            _ => 0.0,
        };
        record.last_bandwidth = bandwidth;
        record.last_request_at = Some(started);
        record.request_count += 1;
        record.last_connection = Some(connection);
        Some(record.clone())
    }

    pub fn get(&self, ip: IpAddr) -> Option<ClientRecord> {
        self.records.get(&ip.to_canonical()).map(|r| r.clone())
    }

    /// Clients with at least one completed request, ordered by IP.
    pub fn snapshot(&self) -> Vec<ClientSnapshot> {
        let mut clients: Vec<ClientSnapshot> = self
            .records
            .iter()
            .filter(|r| r.request_count > 0)
            .map(|r| ClientSnapshot::from(r.value()))
            .collect();
        clients.sort_by_key(|c| c.ip);
        clients
    }

    /// Number of allocated slots.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Throughput in kB/s for `bytes` moved in `elapsed`. Zero if no time passed.
pub fn measure_bandwidth(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        bytes as f64 / 1024.0 / secs
    } else {
        0.0
    }
}
