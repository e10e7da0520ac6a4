//! Streaming downloads of driver packages

use super::metadata::sanitize_file_name;
use super::{DriverRegistry, InstallResult};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

/// HTTP client shared by channel listing and downloads
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("emuctl/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(15))
        .build()
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("{0}")]
    Request(#[from] reqwest::Error),
    #[error("server answered HTTP {0}")]
    Status(u16),
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Bytes written on success
pub type DownloadStatus = Result<u64, DownloadError>;

/// Download could not produce an archive to install
#[derive(Debug, Error)]
#[error("Failed to import {name}: {source}")]
pub struct ImportError {
    pub name: String,
    #[source]
    pub source: DownloadError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub downloaded: u64,
    /// 0 when the server did not announce a length
    pub total: u64,
}

impl DownloadProgress {
    pub fn fraction(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some((self.downloaded as f64 / self.total as f64).min(1.0))
    }

    pub fn percent(&self) -> Option<u8> {
        self.fraction().map(|f| (f * 100.0).floor() as u8)
    }
}

/// Running byte count of one download
#[derive(Debug, Default)]
pub struct ProgressCounter {
    downloaded: u64,
    total: u64,
}

impl ProgressCounter {
    pub fn new(total: u64) -> Self {
        Self {
            downloaded: 0,
            total,
        }
    }

    pub fn advance(&mut self, chunk_len: usize) -> DownloadProgress {
        self.downloaded = self.downloaded.saturating_add(chunk_len as u64);
        self.snapshot()
    }

    pub fn snapshot(&self) -> DownloadProgress {
        DownloadProgress {
            downloaded: self.downloaded,
            total: self.total,
        }
    }
}

/// Stream `url` into `dest`, reporting `(downloaded, total)` after every chunk
pub async fn download_asset<F>(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    mut progress: F,
) -> DownloadStatus
where
    F: FnMut(u64, u64),
{
    debug!("Downloading {} to {}", url, dest.display());
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Status(status.as_u16()));
    }

    let mut counter = ProgressCounter::new(response.content_length().unwrap_or(0));
    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        let snapshot = counter.advance(chunk.len());
        progress(snapshot.downloaded, snapshot.total);
    }
    file.flush().await?;

    let downloaded = counter.snapshot().downloaded;
    debug!("Downloaded {} bytes from {}", downloaded, url);
    Ok(downloaded)
}

/// Download a channel package into the cache and install it
///
/// The cached archive is removed whatever the outcome.
pub async fn download_and_install<F>(
    registry: &DriverRegistry,
    client: &reqwest::Client,
    url: &str,
    name: &str,
    progress: F,
) -> Result<InstallResult, ImportError>
where
    F: FnMut(u64, u64),
{
    let archive = registry
        .config()
        .cache_dir
        .join(format!("{}.zip", sanitize_file_name(name)));

    let downloaded = download_asset(client, url, &archive, progress).await;

    let outcome = match downloaded {
        Ok(bytes) => {
            info!("⬇️  Downloaded {} ({} bytes)", name, bytes);
            Ok(registry.install_async(archive.clone()).await)
        }
        Err(source) => Err(ImportError {
            name: name.to_string(),
            source,
        }),
    };

    if let Err(e) = tokio::fs::remove_file(&archive).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", archive.display(), e);
        }
    }
    outcome
}
