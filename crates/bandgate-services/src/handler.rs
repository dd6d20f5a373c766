//! Per-connection request handling.
//!
//!   Accepted → Parsed → Admitted → Serving → Completed
//!                 │         │  │       └────→ Failed
//!                 │         │  └─→ NotFound (file unreadable)
//!                 │         └─→ Rejected
//!                 └─→ NotFound (unmapped path)
//!
//! The path is resolved before admission, so an unmapped path never
//! touches the bandwidth budget. The file is opened only after admission;
//! a rejected client never touches it. Once admitted, the reservation is
//! released when the handler returns, whichever way it exits.
//!
//! The client record is looked up only after the transfer, with no await
//! in between, so a handler aborted mid-transfer leaves no record behind.

use std::net::IpAddr;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;

use bandgate_core::http::{self, REQUEST_BUF_SIZE};
use bandgate_core::Rate;

use crate::pacing::pacer_for;
use crate::registry::measure_bandwidth;
use crate::state::{ConnectionId, ServerState};
use crate::transmit::{send_file, ByteSource, TransmitError};

/// How a connection ended.
#[derive(Debug)]
pub enum Outcome {
    /// Nothing readable arrived before the client went away.
    Disconnected,
    /// Path was unmapped, unreadable or missing; answered with 404.
    NotFound { path: String },
    /// The ceiling had no room for the client's rate; closed without a response.
    Rejected { rate: Rate },
    Completed { bytes: u64, elapsed: Duration },
    Failed { error: TransmitError, elapsed: Duration },
}

pub struct ConnectionHandler {
    state: ServerState,
    id: ConnectionId,
    peer: IpAddr,
}

impl ConnectionHandler {
    pub fn new(state: ServerState, id: ConnectionId, peer: IpAddr) -> Self {
        Self {
            state,
            id,
            peer: peer.to_canonical(),
        }
    }

    pub async fn run<S>(self, mut stream: S) -> Outcome
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let outcome = self.serve(&mut stream).await;
        let _ = stream.shutdown().await;
        self.log(&outcome);
        outcome
    }

    async fn serve<S>(&self, stream: &mut S) -> Outcome
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        // ── Accepted → Parsed ────────────────────────────────────────────────
        let mut buf = BytesMut::with_capacity(REQUEST_BUF_SIZE);
        match stream.read_buf(&mut buf).await {
            Ok(0) => return Outcome::Disconnected,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn = %self.id, error = %e, "request read failed");
                return Outcome::Disconnected;
            }
        }

        let Some(request) = http::parse_request_line(&buf) else {
            tracing::debug!(conn = %self.id, peer = %self.peer, "malformed request line");
            return self.not_found(stream, String::new()).await;
        };
        tracing::debug!(
            conn = %self.id,
            peer = %self.peer,
            method = %request.method,
            path = %request.path,
            "request"
        );

        let Some(file) = self.state.resources.resolve(&request.path) else {
            return self.not_found(stream, request.path).await;
        };

        // ── Parsed → Admitted | Rejected ─────────────────────────────────────
        let rate = self.state.qos.lookup(self.peer);
        let Some(admission) = self.state.admission.try_admit(rate) else {
            return Outcome::Rejected { rate };
        };

        let source = match ByteSource::open(&file).await {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!(path = %file.display(), error = %e, "mapped resource unavailable");
                admission.release();
                return self.not_found(stream, request.path).await;
            }
        };

        // ── Serving → Completed | Failed ─────────────────────────────────────
        let transfer = &self.state.transfer;
        let mut pacer = pacer_for(transfer.pacing, admission.rate(), transfer.burst_bytes);
        let started = Instant::now();
        let result = send_file(stream, source, pacer.as_mut(), transfer.chunk_size).await;
        let elapsed = started.elapsed();

        admission.release();

        let bytes = match &result {
            Ok(sent) => *sent,
            Err(e) => e.bytes_sent(),
        };
        match self.state.registry.find_or_create(self.peer) {
            Some(handle) => {
                let bandwidth = measure_bandwidth(bytes, elapsed);
                if let Some(record) =
                    self.state.registry.update(&handle, started, bandwidth, self.id)
                {
                    tracing::info!(
                        ip = %handle.ip(),
                        rtt_secs = format_args!("{:.3}", record.last_rtt),
                        bandwidth_kbps = format_args!("{:.2}", record.last_bandwidth),
                        requests = record.request_count,
                        conn = %self.id,
                        "client updated"
                    );
                }
            }
            None => {
                tracing::debug!(peer = %self.peer, "client registry full, not tracking");
            }
        }

        match result {
            Ok(bytes) => Outcome::Completed { bytes, elapsed },
            Err(error) => Outcome::Failed { error, elapsed },
        }
    }

    async fn not_found<S>(&self, stream: &mut S, path: String) -> Outcome
    where
        S: AsyncWrite + Unpin,
    {
        if let Err(e) = stream.write_all(http::NOT_FOUND).await {
            tracing::debug!(conn = %self.id, error = %e, "failed to send 404");
        }
        Outcome::NotFound { path }
    }

    fn log(&self, outcome: &Outcome) {
        match outcome {
            Outcome::Disconnected => {
                tracing::debug!(conn = %self.id, peer = %self.peer, "client sent no request");
            }
            Outcome::NotFound { path } => {
                tracing::info!(conn = %self.id, peer = %self.peer, path = %path, "not found");
            }
            Outcome::Rejected { rate } => {
                let committed = self.state.admission.committed();
                tracing::info!(
                    conn = %self.id,
                    peer = %self.peer,
                    requested_kbps = rate.kbps(),
                    committed_kbps = committed,
                    ceiling_kbps = self.state.admission.ceiling().kbps(),
                    "rejected: bandwidth ceiling reached"
                );
            }
            Outcome::Completed { bytes, elapsed } => {
                tracing::info!(
                    conn = %self.id,
                    peer = %self.peer,
                    bytes,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "transfer complete"
                );
            }
            Outcome::Failed { error, elapsed } => {
                tracing::warn!(
                    conn = %self.id,
                    peer = %self.peer,
                    error = %error,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "transfer failed"
                );
            }
        }
    }
}
