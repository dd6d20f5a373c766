//! Startup helpers — listening socket and QoS policy.

use std::net::{IpAddr, SocketAddr};

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;

use bandgate_core::config::{NetworkConfig, QosConfig};
use bandgate_core::QosTable;

/// Bind the file server socket with address reuse and the configured backlog.
pub fn bind_listener(network: &NetworkConfig) -> Result<TcpListener> {
    let ip: IpAddr = network
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind address {:?}", network.bind_addr))?;
    let addr = SocketAddr::new(ip, network.port);

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .context("failed to create socket")?;
    socket
        .set_reuse_address(true)
        .context("failed to set SO_REUSEADDR")?;
    socket.set_nonblocking(true)?;
    socket
        .bind(&addr.into())
        .with_context(|| format!("failed to bind {addr}"))?;
    let backlog = i32::try_from(network.backlog).unwrap_or(i32::MAX);
    socket
        .listen(backlog)
        .with_context(|| format!("failed to listen on {addr}"))?;

    TcpListener::from_std(socket.into()).context("failed to register listener")
}

/// Load the QoS policy. Never fails: problems are logged and every
/// client falls back to the default rate.
pub fn load_qos(config: &QosConfig) -> QosTable {
    match QosTable::load(&config.table_path, config.default_rate) {
        Ok(table) => {
            if table.skipped() > 0 {
                tracing::warn!(
                    path = %config.table_path.display(),
                    skipped = table.skipped(),
                    "skipped malformed QoS lines"
                );
            }
            tracing::info!(
                path = %config.table_path.display(),
                entries = table.len(),
                "QoS policy loaded"
            );
            table
        }
        Err(e) => {
            tracing::warn!(error = %e, default_rate = %config.default_rate, "using default rate for all clients");
            QosTable::new(config.default_rate)
        }
    }
}
