//! Static file serving
//!
//! Serves the chat client (HTML, JS, CSS) from a directory on disk.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;

/// A file loaded from the public directory
#[derive(Debug, Clone)]
pub struct Asset {
    pub body: Bytes,
    pub content_type: &'static str,
}

/// Files under a single root directory
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Canonical request-relative name: `.` segments dropped, parts joined by `/`
    ///
    /// `None` for anything that could escape the root (`..`, absolute
    /// paths, drive prefixes). An empty name normalizes to `""`.
    pub fn normalize(name: &str) -> Option<String> {
        let mut parts = Vec::new();

        for component in Path::new(name).components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str()?),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }

        Some(parts.join("/"))
    }

    /// Map a request-relative name to a path under the root
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let relative = Self::normalize(name)?;
        if relative.is_empty() {
            return None;
        }
        Some(self.root.join(relative))
    }

    /// Read a file; `None` if it does not exist or cannot be read
    pub async fn load(&self, name: &str) -> Option<Asset> {
        let path = self.resolve(name)?;

        match tokio::fs::read(&path).await {
            Ok(data) => Some(Asset {
                body: Bytes::from(data),
                content_type: content_type_for(&path),
            }),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Static file unavailable");
                None
            }
        }
    }
}

/// Content type from the file extension
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") | Some("mjs") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}
