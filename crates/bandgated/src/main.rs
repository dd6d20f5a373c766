//! bandgated — bandwidth-governed HTTP file server.
//!
//! Usage: bandgated [port] [qos_file] [ceiling_kBps]

use anyhow::{Context, Result};

use bandgate_core::config::BandgateConfig;
use bandgate_services::{Monitor, Server, ServerState};

mod setup;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load config
    if let Err(e) = BandgateConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let mut config = BandgateConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        let mut config = BandgateConfig::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    });
    config
        .apply_args(std::env::args().skip(1))
        .context("invalid command-line arguments")?;

    // Shared state
    let qos = setup::load_qos(&config.qos);
    let state = ServerState::new(qos, &config);
    tracing::info!(
        root = %config.resources.root.display(),
        routes = state.resources.len(),
        "resource map ready"
    );
    for (url, file) in state.resources.routes() {
        tracing::debug!(url, file = %file.display(), "route");
    }

    let listener = setup::bind_listener(&config.network)?;
    tracing::info!(
        addr = %listener.local_addr()?,
        ceiling = %config.qos.ceiling,
        default_rate = %config.qos.default_rate,
        pacing = ?config.transfer.pacing,
        "bandgated listening"
    );

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let mut server_task = tokio::spawn(
        Server::new(listener, state.clone(), shutdown_tx.subscribe()).run(),
    );

    let monitor_task = tokio::spawn(
        Monitor::new(
            state.registry.clone(),
            state.admission.clone(),
            config.monitor.interval(),
            shutdown_tx.subscribe(),
        )
        .run(),
    );

    let api_port = config.network.api_port;
    if api_port != 0 {
        let api_state = bandgate_api::ApiState::from(&state);
        tokio::spawn(async move {
            if let Err(e) = bandgate_api::serve(api_state, api_port).await {
                tracing::error!(error = %e, "status API failed");
            }
        });
    }

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv()  => tracing::info!("shutting down"),
        r = &mut server_task    => tracing::error!("server exited: {:?}", r),
        r = monitor_task        => tracing::error!("monitor exited: {:?}", r),
    }

    if !server_task.is_finished() {
        match server_task.await {
            Ok(Err(e)) => tracing::error!(error = %e, "server stopped with error"),
            Err(e) => tracing::error!(error = %e, "server task failed"),
            Ok(Ok(())) => {}
        }
    }

    Ok(())
}
