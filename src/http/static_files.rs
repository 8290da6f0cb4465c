//! Static asset serving for non-API `GET` requests.
//!
//! # Responsibilities
//! - Map `/` to `index.html` and resolve other paths under the static root
//! - Refuse paths that would escape the root
//! - Stream the file with a content type derived from its extension
//!
//! # Design Decisions
//! - Missing or unresolvable files answer 404, any other I/O failure 500
//! - Content-Length comes from file metadata; the body is copied, not buffered

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::response::HttpResponse;

/// Resolve a request path to a file under `root`, or `None` if it escapes it.
pub fn resolve(root: &Path, request_path: &str) -> Option<PathBuf> {
    let path = request_path.split(&['?', '#'][..]).next().unwrap_or("");
    let relative = path.trim_start_matches('/');
    let relative = if relative.is_empty() { "index.html" } else { relative };

    let mut resolved = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(resolved)
}

/// Content type by file extension.
pub fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html",
        Some("js") => "application/javascript",
        Some("css") => "text/css",
        _ => "application/octet-stream",
    }
}

/// Write the response for `request_path` to `out`. Returns the status sent.
///
/// Errors are transport failures while writing; lookup failures are
/// answered in-band with 404/500.
pub async fn serve<W>(out: &mut W, root: &Path, request_path: &str) -> std::io::Result<u16>
where
    W: AsyncWrite + Unpin,
{
    let Some(mut path) = resolve(root, request_path) else {
        return write_status(out, 404).await;
    };

    if tokio::fs::metadata(&path).await.map(|m| m.is_dir()).unwrap_or(false) {
        path.push("index.html");
    }

    let mut file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return write_status(out, 404).await,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Static file open failed");
            return write_status(out, 500).await;
        }
    };
    let length = match file.metadata().await {
        Ok(meta) => meta.len(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Static file metadata failed");
            return write_status(out, 500).await;
        }
    };

    let head = HttpResponse::new(200)
        .header("Content-Type", content_type(&path))
        .head_bytes(length);
    out.write_all(&head).await?;
    tokio::io::copy(&mut file, out).await?;
    out.flush().await?;
    Ok(200)
}

async fn write_status<W>(out: &mut W, status: u16) -> std::io::Result<u16>
where
    W: AsyncWrite + Unpin,
{
    out.write_all(&HttpResponse::status_text(status).to_bytes()).await?;
    out.flush().await?;
    Ok(status)
}
