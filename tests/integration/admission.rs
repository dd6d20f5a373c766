use crate::*;

/// A client whose rate alone exceeds the ceiling is closed without a response.
#[tokio::test]
async fn test_rate_above_ceiling_is_rejected() -> Result<()> {
    let server =
        TestServer::start("over", 100.0, "127.0.0.1 200\n", &[("gato.jpg", 4096)]).await?;

    let raw = server.get("/gato.jpg").await?;
    assert!(raw.is_empty(), "rejected client got {} bytes", raw.len());

    let snap = server.state.admission.snapshot();
    assert_eq!(snap.rejected_total, 1);
    assert_eq!(snap.committed_kbps, 0.0);
    assert!(server.state.registry.get("127.0.0.1".parse()?).is_none());

    server.stop().await
}

/// Ceiling 100 with two 60 kB/s clients: the second is rejected while
/// the first is in flight, and admitted again once it finishes.
#[tokio::test]
async fn test_concurrent_transfers_share_ceiling() -> Result<()> {
    let server =
        TestServer::start("shared", 100.0, "127.0.0.1 60\n", &[("carro.jpg", 24 * 1024)]).await?;

    let addr = server.addr;
    let first = tokio::spawn(async move {
        let mut stream = TcpStream::connect(addr).await?;
        stream.write_all(b"GET /carro.jpg HTTP/1.1\r\n\r\n").await?;
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await?;
        anyhow::Ok(response)
    });

    server.wait_for_committed(60.0).await?;
    let second = server.get("/carro.jpg").await?;
    assert!(second.is_empty(), "second client should be rejected");

    let first = first.await??;
    let (_, body) = split_response(&first)?;
    assert_eq!(body.len(), 24 * 1024);

    server.wait_for_committed(0.0).await?;
    let third = server.get("/carro.jpg").await?;
    let (head, _) = split_response(&third)?;
    assert!(head.starts_with("HTTP/1.1 200 OK"));

    let snap = server.state.admission.snapshot();
    assert_eq!(snap.admitted_total, 2);
    assert_eq!(snap.rejected_total, 1);
    assert_eq!(snap.active, 0);

    server.stop().await
}

/// A client that vanishes mid-transfer still gives its bandwidth back.
#[tokio::test]
async fn test_abandoned_transfer_releases_bandwidth() -> Result<()> {
    let server =
        TestServer::start("abandon", 100.0, "127.0.0.1 4\n", &[("jogo.jpg", 64 * 1024)]).await?;

    let mut stream = TcpStream::connect(server.addr).await?;
    stream.write_all(b"GET /jogo.jpg HTTP/1.1\r\n\r\n").await?;
    let mut first = [0u8; 64];
    let n = stream.read(&mut first).await?;
    assert!(n > 0);
    drop(stream);

    // A paced write shortly after the close hits the reset socket.
    for _ in 0..60 {
        if server.state.admission.snapshot().active == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(server.state.admission.snapshot().active, 0);
    assert_eq!(server.state.admission.committed(), 0.0);

    server.stop().await
}
