//! Text sources: where raw blobs come from.
//!
//! A source is an infinite, non-restartable stream of [`RawBlob`]s. Static
//! text yields exactly once, a watched file yields whenever its content
//! changes, and a download is fetched once and then behaves like static text.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::stream;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::stage::StageStream;

/// Raw content as read from a source.
pub type RawBlob = String;

/// Stream of raw blobs.
pub type BlobStream = StageStream<RawBlob>;

/// Upper bound on how much content a single read may pull in (100 MiB).
pub const MAX_READ_BYTES: u64 = 100 * 1024 * 1024;

/// How often a watched file is re-read.
pub const FILE_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// A source that yields `text` once.
pub fn static_text(text: impl Into<String>) -> Result<BlobStream> {
    let text = text.into();
    if text.is_empty() {
        return Err(Error::config("no text given"));
    }
    Ok(Box::pin(stream::once(async move { text })))
}

/// Watch `path`, yielding its content whenever it changes.
///
/// The file must be readable now; later read failures are logged and the
/// tick is skipped.
pub async fn watch_file(path: impl Into<PathBuf>, poll_interval: Duration) -> Result<BlobStream> {
    let path = path.into();
    if let Err(e) = tokio::fs::File::open(&path).await {
        return Err(Error::unavailable(format!("{}: {e}", path.display())));
    }
    info!(path = %path.display(), ?poll_interval, "Watching file");

    let stream = async_stream::stream! {
        let mut last = Vec::new();
        loop {
            match read_capped(&path).await {
                Ok(content) if content != last => {
                    debug!(path = %path.display(), bytes = content.len(), "File content changed");
                    let blob = String::from_utf8_lossy(&content).into_owned();
                    last = content;
                    yield blob;
                }
                Ok(_) => trace!(path = %path.display(), "File unchanged"),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to read file"),
            }
            tokio::time::sleep(poll_interval).await;
        }
    };
    Ok(Box::pin(stream))
}

/// Fetch `url` once and serve the body as static text.
pub async fn download(url: &str) -> Result<BlobStream> {
    download_capped(url, MAX_READ_BYTES).await
}

async fn download_capped(url: &str, limit: u64) -> Result<BlobStream> {
    info!(%url, "Downloading content");
    let mut response = reqwest::get(url).await?.error_for_status()?;

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() as u64 + chunk.len() as u64 > limit {
            return Err(Error::unavailable(format!(
                "response from {url} exceeds {limit} bytes"
            )));
        }
        body.extend_from_slice(&chunk);
    }
    if body.is_empty() {
        return Err(Error::unavailable(format!("empty response from {url}")));
    }
    debug!(%url, bytes = body.len(), "Download complete");

    static_text(String::from_utf8_lossy(&body).into_owned())
}

async fn read_capped(path: &Path) -> Result<Vec<u8>> {
    let file = tokio::fs::File::open(path).await?;
    let mut content = Vec::new();
    file.take(MAX_READ_BYTES + 1)
        .read_to_end(&mut content)
        .await?;
    if content.len() as u64 > MAX_READ_BYTES {
        return Err(Error::unavailable(format!(
            "{} exceeds {MAX_READ_BYTES} bytes",
            path.display()
        )));
    }
    Ok(content)
}
