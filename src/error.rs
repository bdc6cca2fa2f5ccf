//! Error types
//!
//! The relay core itself never fails: publishing is best-effort and a wait
//! either yields a message or nothing. Errors only arise in the HTTP layer
//! around it.

use std::fmt;
use std::io;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Socket or filesystem error
    Io(io::Error),
    /// Malformed or unsupported HTTP request
    Http(HttpError),
}

/// Errors produced while reading an HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// Request line is not `METHOD TARGET VERSION`
    MalformedRequestLine,
    /// Header line without a colon, or not valid UTF-8
    MalformedHeader,
    /// Anything other than HTTP/1.0 or HTTP/1.1
    UnsupportedVersion(String),
    /// Content-Length is not a number
    InvalidContentLength,
    /// Request head larger than the configured limit
    HeadTooLarge(usize),
    /// Body larger than the configured limit
    BodyTooLarge(usize),
    /// Request framed with Transfer-Encoding instead of Content-Length
    UnsupportedTransferEncoding(String),
    /// Peer closed the connection before a full request arrived
    ConnectionClosed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Http(e) => write!(f, "HTTP error: {}", e),
        }
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpError::MalformedRequestLine => write!(f, "Malformed request line"),
            HttpError::MalformedHeader => write!(f, "Malformed header"),
            HttpError::UnsupportedVersion(v) => write!(f, "Unsupported HTTP version: {}", v),
            HttpError::InvalidContentLength => write!(f, "Invalid Content-Length"),
            HttpError::HeadTooLarge(n) => write!(f, "Request head exceeds {} bytes", n),
            HttpError::BodyTooLarge(n) => write!(f, "Request body exceeds {} bytes", n),
            HttpError::UnsupportedTransferEncoding(te) => {
                write!(f, "Unsupported Transfer-Encoding: {}", te)
            }
            HttpError::ConnectionClosed => write!(f, "Connection closed mid-request"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Http(e) => Some(e),
        }
    }
}

impl std::error::Error for HttpError {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<HttpError> for Error {
    fn from(e: HttpError) -> Self {
        Error::Http(e)
    }
}
