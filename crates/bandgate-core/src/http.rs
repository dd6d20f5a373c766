//! Minimal HTTP/1.1 framing.
//!
//! Only the request line is read: `METHOD PATH [VERSION]`. Headers and
//! bodies are ignored and each connection carries exactly one request.

/// Size of the single read used to capture a request.
pub const REQUEST_BUF_SIZE: usize = 4096;

/// Response for paths that do not map to a resource.
pub const NOT_FOUND: &[u8] = b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n";

/// The parts of a request line the server cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub path: String,
}

/// Extract method and path from the first line of a raw request.
///
/// Returns `None` if the line has fewer than two whitespace-separated
/// tokens or is not valid UTF-8.
pub fn parse_request_line(raw: &[u8]) -> Option<RequestLine> {
    let end = raw
        .iter()
        .position(|&b| b == b'\n')
        .unwrap_or(raw.len());
    let line = std::str::from_utf8(&raw[..end]).ok()?;

    let mut tokens = line.split_whitespace();
    let method = tokens.next()?;
    let path = tokens.next()?;

    Some(RequestLine {
        method: method.to_string(),
        path: path.to_string(),
    })
}

/// Status line and headers for a successful transfer of `content_length` bytes.
pub fn ok_header(content_length: u64) -> String {
    format!("HTTP/1.1 200 OK\r\nContent-Length: {content_length}\r\n\r\n")
}
