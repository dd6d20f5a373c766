//! Monitor — periodic report of client history and committed bandwidth.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::admission::{AdmissionController, AdmissionSnapshot};
use crate::registry::{ClientRegistry, ClientSnapshot};

/// Everything the monitor reports, in one copy.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub admission: AdmissionSnapshot,
    pub tracked_clients: usize,
    pub registry_capacity: usize,
    pub clients: Vec<ClientSnapshot>,
}

pub fn snapshot(registry: &ClientRegistry, admission: &AdmissionController) -> StatusSnapshot {
    StatusSnapshot {
        admission: admission.snapshot(),
        tracked_clients: registry.len(),
        registry_capacity: registry.capacity(),
        clients: registry.snapshot(),
    }
}

pub struct Monitor {
    registry: ClientRegistry,
    admission: Arc<AdmissionController>,
    interval: Duration,
    shutdown: broadcast::Receiver<()>,
}

impl Monitor {
    pub fn new(
        registry: ClientRegistry,
        admission: Arc<AdmissionController>,
        interval: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            registry,
            admission,
            interval,
            shutdown,
        }
    }

    /// Report on every tick until shutdown. Returns the number of reports.
    pub async fn run(mut self) -> u64 {
        let mut ticker = tokio::time::interval(self.interval);
        // first tick fires immediately; skip the empty report at startup
        ticker.tick().await;
        let mut reports = 0;

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!(reports, "monitor shutting down");
                    return reports;
                }
                _ = ticker.tick() => {
                    self.report();
                    reports += 1;
                }
            }
        }
    }

    /// Log one report and return what was logged.
    pub fn report(&self) -> StatusSnapshot {
        let snap = snapshot(&self.registry, &self.admission);

        tracing::info!(count = snap.clients.len(), "client history snapshot");
        for c in &snap.clients {
            tracing::info!(
                ip = %c.ip,
                rtt_secs = format_args!("{:.3}", c.last_rtt_secs),
                bandwidth_kbps = format_args!("{:.2}", c.last_bandwidth_kbps),
                requests = c.request_count,
                conn = c.last_connection.map(|id| id.0),
                "  client"
            );
        }
        tracing::info!(
            committed_kbps = format_args!("{:.2}", snap.admission.committed_kbps),
            ceiling_kbps = format_args!("{:.2}", snap.admission.ceiling_kbps),
            active = snap.admission.active,
            "server throughput"
        );

        snap
    }
}
