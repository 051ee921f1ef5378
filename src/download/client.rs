//! Streaming fetch of the resolved document to a local path.
//!
//! The [`Fetcher`] checks the target path, streams the response body through
//! a chunk-sized buffer and verifies the byte count against `Content-Length`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::error::DownloadError;

/// Default write buffer size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Target paths at or above this many characters are rejected.
const MAX_PATH_CHARS: usize = 250;

/// Options of one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Write buffer size in bytes.
    pub chunk_size: usize,
    /// Resolve the target but write nothing.
    pub dry_run: bool,
    /// Draw a progress bar on stderr.
    pub show_progress: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            dry_run: false,
            show_progress: true,
        }
    }
}

/// Successful result of [`Fetcher::fetch_to_path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The file was written completely.
    Written {
        /// Path of the written file.
        path: PathBuf,
        /// Bytes written.
        bytes: u64,
    },
    /// Dry run: nothing was requested or written.
    DryRun(PathBuf),
}

impl FetchOutcome {
    /// Target path of the fetch.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Written { path, .. } | Self::DryRun(path) => path,
        }
    }
}

/// Downloads one URL to one local path.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    options: FetchOptions,
}

impl Fetcher {
    /// Creates a fetcher around a download client.
    #[must_use]
    pub fn new(client: Client, options: FetchOptions) -> Self {
        Self { client, options }
    }

    /// Fetches `url` into `path`, overwriting an existing file.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::PathTooLong`] or
    /// [`DownloadError::TargetIsDirectory`] for unusable targets, network and
    /// status errors for failed requests, [`DownloadError::Io`] for write
    /// failures and [`DownloadError::Integrity`] when fewer or more bytes
    /// arrive than announced.
    #[instrument(skip(self, path), fields(url = %url, path = %path.display()))]
    pub async fn fetch_to_path(&self, url: &str, path: &Path) -> Result<FetchOutcome, DownloadError> {
        check_target(path)?;

        if self.options.dry_run {
            info!("dry run; skipping download");
            return Ok(FetchOutcome::DryRun(path.to_path_buf()));
        }

        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::from_reqwest(url, e))?;
        let status = response.status().as_u16();
        if status != 200 {
            return Err(DownloadError::http_status(url, status));
        }

        let content_length = response.content_length();
        match content_length {
            Some(size) => info!(bytes = size, "file size"),
            None => info!("file size not known"),
        }

        let mut file = File::create(path)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        let progress = self.progress_bar(content_length);
        let stream_result = stream_to_file(
            &mut file,
            response,
            url,
            path,
            self.options.chunk_size,
            &progress,
        )
        .await;
        progress.finish_and_clear();

        let bytes = match stream_result {
            Ok(bytes) => bytes,
            Err(error) => {
                debug!("cleaning up partial file after error");
                let _ = tokio::fs::remove_file(path).await;
                return Err(error);
            }
        };

        if let Some(expected) = content_length
            && expected != bytes
        {
            return Err(DownloadError::integrity(path, expected, bytes));
        }

        info!(bytes, "download done");
        Ok(FetchOutcome::Written {
            path: path.to_path_buf(),
            bytes,
        })
    }

    fn progress_bar(&self, content_length: Option<u64>) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }
        match content_length {
            Some(total) => {
                let bar = ProgressBar::new(total);
                bar.set_style(
                    ProgressStyle::with_template(
                        "{bar:40} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                bar
            }
            None => {
                let spinner = ProgressBar::new_spinner();
                spinner.set_style(
                    ProgressStyle::with_template("{spinner} downloaded {bytes}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                spinner.enable_steady_tick(Duration::from_millis(100));
                spinner
            }
        }
    }
}

/// Rejects over-long and directory targets; warns before overwriting a file.
fn check_target(path: &Path) -> Result<(), DownloadError> {
    let length = path.to_string_lossy().chars().count();
    if length >= MAX_PATH_CHARS {
        return Err(DownloadError::path_too_long(path, length));
    }
    if path.is_dir() {
        return Err(DownloadError::target_is_directory(path));
    }
    if path.is_file() {
        warn!(path = %path.display(), "target path already exists; file will be overwritten");
    }
    Ok(())
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(
    file: &mut File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
    chunk_size: usize,
    progress: &ProgressBar,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::with_capacity(chunk_size.max(1), file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::from_reqwest(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
        progress.set_position(bytes_written);
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}
