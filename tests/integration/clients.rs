use crate::*;

use bandgate_services::monitor;

/// First request records RTT 0; a repeat records the gap between starts.
#[tokio::test]
async fn test_repeat_client_gets_rtt() -> Result<()> {
    let server = TestServer::start("rtt", 10_000.0, "", &[("gato.jpg", 2048)]).await?;
    let ip = "127.0.0.1".parse()?;

    server.get("/gato.jpg").await?;
    let first = server.state.registry.get(ip).context("client not tracked")?;
    assert_eq!(first.request_count, 1);
    assert_eq!(first.last_rtt, 0.0);
    assert!(first.last_bandwidth > 0.0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    server.get("/gato.jpg").await?;
    let second = server.state.registry.get(ip).context("client not tracked")?;
    assert_eq!(second.request_count, 2);
    assert!(second.last_rtt >= 0.2, "rtt was {}", second.last_rtt);
    assert!(second.last_connection > first.last_connection);

    server.stop().await
}

/// Not-found requests never touch the registry.
#[tokio::test]
async fn test_not_found_is_not_tracked() -> Result<()> {
    let server = TestServer::start("untracked", 10_000.0, "", &[("gato.jpg", 16)]).await?;

    server.get("/missing").await?;
    assert!(server.state.registry.is_empty());

    server.stop().await
}

/// The periodic report reflects served clients and idle admission.
#[tokio::test]
async fn test_status_snapshot_after_transfers() -> Result<()> {
    let server = TestServer::start(
        "snapshot",
        500.0,
        "127.0.0.1 125\n",
        &[("banda.jpg", 4096), ("carro.jpg", 8192)],
    )
    .await?;

    server.get("/banda.jpg").await?;
    server.get("/carro.jpg").await?;

    let snap = monitor::snapshot(&server.state.registry, &server.state.admission);
    assert_eq!(snap.admission.committed_kbps, 0.0);
    assert_eq!(snap.admission.ceiling_kbps, 500.0);
    assert_eq!(snap.admission.admitted_total, 2);
    assert_eq!(snap.tracked_clients, 1);
    assert_eq!(snap.clients.len(), 1);
    assert_eq!(snap.clients[0].request_count, 2);

    server.stop().await
}

/// Shutdown stops accepting and returns in-flight bandwidth.
#[tokio::test]
async fn test_shutdown_releases_in_flight() -> Result<()> {
    let server =
        TestServer::start("shutdown", 100.0, "127.0.0.1 4\n", &[("jogo.jpg", 64 * 1024)]).await?;
    let addr = server.addr;
    let state = server.state.clone();

    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(b"GET /jogo.jpg HTTP/1.1\r\n\r\n").await?;
    server.wait_for_committed(4.0).await?;

    server.stop().await?;
    assert_eq!(state.admission.committed(), 0.0);
    assert_eq!(state.admission.snapshot().active, 0);
    // the interrupted transfer never completed, so it left no client record
    assert!(state.registry.is_empty());

    // The listener is gone, so new connections are refused.
    assert!(TcpStream::connect(addr).await.is_err());
    Ok(())
}
