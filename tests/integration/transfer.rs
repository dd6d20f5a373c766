use crate::*;

/// A mapped resource is served whole with an exact Content-Length.
#[tokio::test]
async fn test_serves_mapped_file() -> Result<()> {
    let server = TestServer::start("serve", 10_000.0, "", &[("carro.jpg", 10_000)]).await?;

    let raw = server.get("/carro.jpg").await?;
    let (head, body) = split_response(&raw)?;
    assert_eq!(head, "HTTP/1.1 200 OK\r\nContent-Length: 10000");
    assert_eq!(body, pattern(10_000).as_slice());

    server.stop().await
}

#[tokio::test]
async fn test_unknown_path_is_404() -> Result<()> {
    let server = TestServer::start("notfound", 10_000.0, "", &[("gato.jpg", 100)]).await?;

    assert_eq!(server.get("/nope.jpg").await?, NOT_FOUND);
    assert_eq!(server.state.admission.snapshot().admitted_total, 0);

    server.stop().await
}

#[tokio::test]
async fn test_malformed_request_is_404() -> Result<()> {
    let server = TestServer::start("malformed", 10_000.0, "", &[("gato.jpg", 100)]).await?;

    assert_eq!(server.request("GARBAGE\r\n\r\n").await?, NOT_FOUND);

    server.stop().await
}

/// A route whose file is missing on disk answers 404 instead of failing.
#[tokio::test]
async fn test_missing_backing_file_is_404() -> Result<()> {
    let server = TestServer::start_with("missing", 10_000.0, "", &[], |config| {
        config
            .resources
            .routes
            .insert("/banda.jpg".to_string(), PathBuf::from("banda.jpg"));
    })
    .await?;

    assert_eq!(server.get("/banda.jpg").await?, NOT_FOUND);
    assert_eq!(server.state.admission.committed(), 0.0);

    server.stop().await
}

/// 16 KiB at 8 kB/s needs about two seconds of pacing.
#[tokio::test]
async fn test_transfer_is_rate_shaped() -> Result<()> {
    let server =
        TestServer::start("shaped", 100.0, "127.0.0.1 8\n", &[("jogo.jpg", 16 * 1024)]).await?;

    let started = std::time::Instant::now();
    let raw = server.get("/jogo.jpg").await?;
    let elapsed = started.elapsed();

    let (_, body) = split_response(&raw)?;
    assert_eq!(body.len(), 16 * 1024);
    assert!(elapsed >= Duration::from_millis(1500), "finished too fast: {elapsed:?}");

    server.stop().await
}

#[tokio::test]
async fn test_token_bucket_pacing_serves_whole_file() -> Result<()> {
    let server = TestServer::start_with(
        "bucket",
        10_000.0,
        "",
        &[("html_simulado.txt", 50_000)],
        |config| config.transfer.pacing = bandgate_core::config::PacingMode::TokenBucket,
    )
    .await?;

    let raw = server.get("/html_simulado.txt").await?;
    let (head, body) = split_response(&raw)?;
    assert!(head.contains("Content-Length: 50000"));
    assert_eq!(body, pattern(50_000).as_slice());

    server.stop().await
}
