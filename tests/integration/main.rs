//! bandgate integration test harness.
//!
//! Each test starts a real `Server` on an ephemeral loopback port with
//! its own resource directory, then talks to it over TCP.
//!
//!   cargo test --test integration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use bandgate_core::config::BandgateConfig;
use bandgate_core::{QosTable, Rate};
use bandgate_services::{Server, ServerState};

mod admission;
mod clients;
mod transfer;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const NOT_FOUND: &[u8] = b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n";

/// A running server plus the handles a test needs to inspect and stop it.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: ServerState,
    pub dir: PathBuf,
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<Result<()>>,
}

impl TestServer {
    /// Start a server whose resource root is a fresh temp directory.
    /// `files` are written there and mapped to `/<name>`.
    pub async fn start(
        name: &str,
        ceiling_kbps: f64,
        qos: &str,
        files: &[(&str, usize)],
    ) -> Result<Self> {
        Self::start_with(name, ceiling_kbps, qos, files, |_| {}).await
    }

    pub async fn start_with(
        name: &str,
        ceiling_kbps: f64,
        qos: &str,
        files: &[(&str, usize)],
        tweak: impl FnOnce(&mut BandgateConfig),
    ) -> Result<Self> {
        let dir = std::env::temp_dir().join(format!(
            "bandgate-it-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let mut config = BandgateConfig::default();
        config.qos.ceiling = Rate::from_kbps(ceiling_kbps)?;
        config.resources.root = dir.clone();
        config.resources.routes.clear();
        for (file, len) in files {
            std::fs::write(dir.join(file), pattern(*len))?;
            config
                .resources
                .routes
                .insert(format!("/{file}"), PathBuf::from(file));
        }
        tweak(&mut config);

        let table = QosTable::parse(qos, config.qos.default_rate);
        let state = ServerState::new(table, &config);

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (shutdown, _) = broadcast::channel(1);
        let task = tokio::spawn(Server::new(listener, state.clone(), shutdown.subscribe()).run());

        Ok(Self { addr, state, dir, shutdown, task })
    }

    /// Send one request and read until the server closes the connection.
    pub async fn request(&self, raw: &str) -> Result<Vec<u8>> {
        let mut stream = TcpStream::connect(self.addr).await?;
        stream.write_all(raw.as_bytes()).await?;
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await?;
        Ok(response)
    }

    pub async fn get(&self, path: &str) -> Result<Vec<u8>> {
        self.request(&format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n")).await
    }

    /// Poll until committed bandwidth reaches `kbps`.
    pub async fn wait_for_committed(&self, kbps: f64) -> Result<()> {
        for _ in 0..200 {
            if (self.state.admission.committed() - kbps).abs() < 1e-9 {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        bail!(
            "committed bandwidth never reached {kbps} (now {})",
            self.state.admission.committed()
        )
    }

    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown.send(());
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .context("server did not stop")???;
        let _ = std::fs::remove_dir_all(&self.dir);
        Ok(())
    }
}

/// Deterministic file contents so truncation or reordering shows up.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Split a raw response into header text and body bytes.
pub fn split_response(raw: &[u8]) -> Result<(String, &[u8])> {
    let end = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .context("response has no header terminator")?;
    let head = String::from_utf8_lossy(&raw[..end]).to_string();
    Ok((head, &raw[end + 4..]))
}
