//! Rate-shaped file transmission.
//!
//! Writes the 200 header, then the body in fixed-size chunks, sleeping
//! after each chunk for as long as the connection's pacer asks.

use std::path::Path;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use bandgate_core::http;

use crate::pacing::Pacer;

/// A readable body with a length known up front.
#[derive(Debug)]
pub struct ByteSource<R> {
    reader: R,
    len: u64,
}

impl<R> ByteSource<R> {
    pub fn new(reader: R, len: u64) -> Self {
        Self { reader, len }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl ByteSource<tokio::fs::File> {
    /// Open a file on disk; its current size becomes the declared length.
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        Ok(Self::new(file, len))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransmitError {
    #[error("write to client failed after {sent} bytes: {source}")]
    Write {
        sent: u64,
        #[source]
        source: std::io::Error,
    },
    #[error("read from source failed after {sent} bytes: {source}")]
    Read {
        sent: u64,
        #[source]
        source: std::io::Error,
    },
    #[error("source ended after {sent} of {expected} bytes")]
    Truncated { sent: u64, expected: u64 },
}

impl TransmitError {
    /// Body bytes that reached the socket before the failure.
    pub fn bytes_sent(&self) -> u64 {
        match self {
            Self::Write { sent, .. } | Self::Read { sent, .. } | Self::Truncated { sent, .. } => {
                *sent
            }
        }
    }
}

/// Stream `source` to `socket` as an HTTP 200 response.
///
/// Returns the number of body bytes written, always equal to the
/// source's declared length on success. Never writes more than that.
pub async fn send_file<W, R>(
    socket: &mut W,
    source: ByteSource<R>,
    pacer: &mut dyn Pacer,
    chunk_size: usize,
) -> Result<u64, TransmitError>
where
    W: AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    let expected = source.len;
    socket
        .write_all(http::ok_header(expected).as_bytes())
        .await
        .map_err(|source| TransmitError::Write { sent: 0, source })?;

    let mut body = source.reader.take(expected);
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut sent: u64 = 0;

    loop {
        let n = body
            .read(&mut buf)
            .await
            .map_err(|source| TransmitError::Read { sent, source })?;
        if n == 0 {
            break;
        }

        socket
            .write_all(&buf[..n])
            .await
            .map_err(|source| TransmitError::Write { sent, source })?;
        sent += n as u64;

        let delay = pacer.delay_after(n);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    socket
        .flush()
        .await
        .map_err(|source| TransmitError::Write { sent, source })?;

    if sent < expected {
        return Err(TransmitError::Truncated { sent, expected });
    }
    Ok(sent)
}
