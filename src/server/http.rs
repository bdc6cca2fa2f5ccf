//! Minimal HTTP/1.1 codec
//!
//! Just enough of HTTP for a browser chat client: one request per
//! connection, `Content-Length` bodies, `Connection: close` responses.
//! Requests framed with `Transfer-Encoding` are refused with 501.
//!
//! ```text
//! GET /api/messages HTTP/1.1\r\n      request line
//! Host: 192.168.1.20:2004\r\n          headers
//! \r\n                                 end of head
//! <Content-Length bytes>               body
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{HttpError, Result};

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Request method
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Other(String),
}

impl Method {
    fn parse(token: &str) -> Self {
        match token {
            "GET" => Method::Get,
            "POST" => Method::Post,
            other => Method::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Other(m) => m,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Size limits applied while reading a request
#[derive(Debug, Clone, Copy)]
pub struct RequestLimits {
    /// Maximum size of request line plus headers
    pub max_head_size: usize,
    /// Maximum body size
    pub max_body_size: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_head_size: 8 * 1024,
            max_body_size: 64 * 1024,
        }
    }
}

/// A parsed HTTP request
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Percent-decoded path, always starting with `/`
    pub path: String,
    /// Decoded query pairs in order of appearance
    pub query: Vec<(String, String)>,
    /// Header names are lowercased
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Request {
    /// First header value with the given (case-insensitive) name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// First query value for `name`; an empty string when the key has no value
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

struct RequestHead {
    method: Method,
    target: String,
    headers: Vec<(String, String)>,
}

/// Read one request from `reader`
pub async fn read_request<R>(reader: &mut R, limits: &RequestLimits) -> Result<Request>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(4096);

    let head_len = loop {
        if let Some(pos) = find_head_end(&buf) {
            break pos;
        }
        if buf.len() > limits.max_head_size {
            return Err(HttpError::HeadTooLarge(limits.max_head_size).into());
        }
        if reader.read_buf(&mut buf).await? == 0 {
            return Err(HttpError::ConnectionClosed.into());
        }
    };

    let head_bytes = buf.split_to(head_len + HEAD_TERMINATOR.len());
    let head_text = std::str::from_utf8(&head_bytes[..head_len])
        .map_err(|_| HttpError::MalformedHeader)?;
    let head = parse_head(head_text)?;

    // A chunked body read as Content-Length would reach the room empty
    if let Some((_, te)) = head.headers.iter().find(|(k, _)| k == "transfer-encoding") {
        return Err(HttpError::UnsupportedTransferEncoding(te.clone()).into());
    }

    let content_length = match head
        .headers
        .iter()
        .find(|(k, _)| k == "content-length")
    {
        Some((_, v)) => v
            .trim()
            .parse::<usize>()
            .map_err(|_| HttpError::InvalidContentLength)?,
        None => 0,
    };
    if content_length > limits.max_body_size {
        return Err(HttpError::BodyTooLarge(limits.max_body_size).into());
    }

    while buf.len() < content_length {
        if reader.read_buf(&mut buf).await? == 0 {
            return Err(HttpError::ConnectionClosed.into());
        }
    }
    // Anything past the declared body is ignored
    let body = buf.split_to(content_length).freeze();

    let (path, query) = split_target(&head.target);

    Ok(Request {
        method: head.method,
        path,
        query,
        headers: head.headers,
        body,
    })
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEAD_TERMINATOR.len())
        .position(|w| w == HEAD_TERMINATOR)
}

fn parse_head(text: &str) -> std::result::Result<RequestHead, HttpError> {
    let mut lines = text.split("\r\n");

    let request_line = lines.next().ok_or(HttpError::MalformedRequestLine)?;
    let mut parts = request_line.split(' ').filter(|p| !p.is_empty());
    let (method, target, version) = match (parts.next(), parts.next(), parts.next(), parts.next())
    {
        (Some(m), Some(t), Some(v), None) => (m, t, v),
        _ => return Err(HttpError::MalformedRequestLine),
    };

    if version != "HTTP/1.1" && version != "HTTP/1.0" {
        return Err(HttpError::UnsupportedVersion(version.to_string()));
    }
    if !target.starts_with('/') {
        return Err(HttpError::MalformedRequestLine);
    }

    let mut headers = Vec::new();
    for line in lines {
        let (name, value) = line.split_once(':').ok_or(HttpError::MalformedHeader)?;
        if name.is_empty() || name.contains(' ') {
            return Err(HttpError::MalformedHeader);
        }
        headers.push((name.to_ascii_lowercase(), value.trim().to_string()));
    }

    Ok(RequestHead {
        method: Method::parse(method),
        target: target.to_string(),
        headers,
    })
}

fn split_target(target: &str) -> (String, Vec<(String, String)>) {
    let (raw_path, raw_query) = match target.split_once('?') {
        Some((p, q)) => (p, q),
        None => (target, ""),
    };

    let query = raw_query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (percent_decode(k, true), percent_decode(v, true))
        })
        .collect();

    (percent_decode(raw_path, false), query)
}

/// Decode `%XX` escapes; `+` becomes a space when `plus_as_space` is set
///
/// Malformed escapes are kept literally. Invalid UTF-8 is replaced.
pub fn percent_decode(input: &str, plus_as_space: bool) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' if plus_as_space => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub code: u16,
    pub reason: &'static str,
}

impl Status {
    pub const OK: Status = Status { code: 200, reason: "OK" };
    pub const NO_CONTENT: Status = Status { code: 204, reason: "No Content" };
    pub const BAD_REQUEST: Status = Status { code: 400, reason: "Bad Request" };
    pub const NOT_FOUND: Status = Status { code: 404, reason: "Not Found" };
    pub const METHOD_NOT_ALLOWED: Status = Status {
        code: 405,
        reason: "Method Not Allowed",
    };
    pub const PAYLOAD_TOO_LARGE: Status = Status {
        code: 413,
        reason: "Payload Too Large",
    };
    pub const HEADERS_TOO_LARGE: Status = Status {
        code: 431,
        reason: "Request Header Fields Too Large",
    };
    pub const INTERNAL_SERVER_ERROR: Status = Status {
        code: 500,
        reason: "Internal Server Error",
    };
    pub const NOT_IMPLEMENTED: Status = Status {
        code: 501,
        reason: "Not Implemented",
    };
}

/// An HTTP response
#[derive(Debug, Clone)]
pub struct Response {
    pub status: Status,
    pub headers: Vec<(&'static str, String)>,
    pub body: Bytes,
}

impl Response {
    /// Response with a status and no body
    pub fn new(status: Status) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// `204 No Content`
    pub fn no_content() -> Self {
        Self::new(Status::NO_CONTENT)
    }

    /// `200 OK` with a typed body
    pub fn ok(content_type: &str, body: impl Into<Bytes>) -> Self {
        Self::new(Status::OK)
            .header("Content-Type", content_type)
            .body(body)
    }

    /// Plain-text response, mostly for errors
    pub fn text(status: Status, message: &str) -> Self {
        Self::new(status)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(message.to_string())
    }

    /// `200 OK` with a JSON body
    pub fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::ok("application/json", body),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response");
                Self::text(Status::INTERNAL_SERVER_ERROR, "serialization failed")
            }
        }
    }

    /// Map a request error to the response sent before closing
    ///
    /// Returns `None` when the peer is already gone.
    pub fn for_error(err: &HttpError) -> Option<Self> {
        let status = match err {
            HttpError::ConnectionClosed => return None,
            HttpError::BodyTooLarge(_) => Status::PAYLOAD_TOO_LARGE,
            HttpError::HeadTooLarge(_) => Status::HEADERS_TOO_LARGE,
            HttpError::UnsupportedTransferEncoding(_) => Status::NOT_IMPLEMENTED,
            _ => Status::BAD_REQUEST,
        };
        Some(Self::text(status, &err.to_string()))
    }

    /// Add a header
    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Set the body
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Serialize status line, headers and body
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(128 + self.body.len());

        buf.put_slice(
            format!("HTTP/1.1 {} {}\r\n", self.status.code, self.status.reason).as_bytes(),
        );
        for (name, value) in &self.headers {
            buf.put_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }
        // 204 must not carry a body or a Content-Length
        if self.status != Status::NO_CONTENT {
            buf.put_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }
        buf.put_slice(b"Connection: close\r\n\r\n");
        if self.status != Status::NO_CONTENT {
            buf.put_slice(&self.body);
        }

        buf.freeze()
    }

    /// Write the encoded response
    pub async fn write_to<W>(&self, writer: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&self.encode()).await?;
        writer.flush().await
    }
}
