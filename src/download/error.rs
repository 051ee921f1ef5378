//! Error types for the download module.
//!
//! Every variant maps to the `OutputError` exit kind: the document was
//! resolved but could not be written to disk intact.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while fetching the resolved file.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Any status other than 200.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error during download (create file, write, etc.)
    #[error("IO error writing to {path}: {source}; suggestion: Check that the directory is writable")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// Downloaded file size does not match expected server content length.
    #[error(
        "download of {path} ended with {actual_bytes} bytes, expected {expected_bytes}; file may be corrupt"
    )]
    Integrity {
        /// Download path that failed verification.
        path: PathBuf,
        /// Expected size in bytes.
        expected_bytes: u64,
        /// Actual size in bytes.
        actual_bytes: u64,
    },

    /// Target path is at or above the length limit.
    #[error("target download path is too long ({length} characters): {path}; suggestion: Use a shorter --output name or --dir")]
    PathTooLong {
        /// The rejected path.
        path: PathBuf,
        /// Its length in characters.
        length: usize,
    },

    /// Target path exists as a directory.
    #[error("target path {path} already exists as a directory; suggestion: Choose another --output name")]
    TargetIsDirectory {
        /// The rejected path.
        path: PathBuf,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an integrity mismatch error.
    pub fn integrity(path: impl Into<PathBuf>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::Integrity {
            path: path.into(),
            expected_bytes,
            actual_bytes,
        }
    }

    /// Creates a path-too-long error.
    pub fn path_too_long(path: impl Into<PathBuf>, length: usize) -> Self {
        Self::PathTooLong {
            path: path.into(),
            length,
        }
    }

    /// Creates a target-is-directory error.
    pub fn target_is_directory(path: impl Into<PathBuf>) -> Self {
        Self::TargetIsDirectory { path: path.into() }
    }

    /// Maps a reqwest error to `Timeout` or `Network`.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::timeout(url)
        } else {
            Self::network(url, source)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_http_status_display() {
        let err = DownloadError::http_status("https://example.com/a.pdf", 404);
        let msg = err.to_string();
        assert!(msg.contains("404"));
        assert!(msg.contains("https://example.com/a.pdf"));
    }

    #[test]
    fn test_download_error_io_has_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = DownloadError::io("/tmp/x.pdf", io_err);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("; suggestion: "));
    }

    #[test]
    fn test_download_error_integrity_display() {
        let err = DownloadError::integrity("/tmp/x.pdf", 100, 40);
        let msg = err.to_string();
        assert!(msg.contains("40 bytes"));
        assert!(msg.contains("expected 100"));
    }

    #[test]
    fn test_download_error_path_checks_display() {
        let err = DownloadError::path_too_long("/a/very/long", 260);
        assert!(err.to_string().contains("too long (260 characters)"));
        let err = DownloadError::target_is_directory("/tmp");
        assert!(err.to_string().contains("already exists as a directory"));
    }
}
