//! Local file fetch: streaming the resolved document to disk.
//!
//! # Features
//!
//! - Streaming downloads through a chunk-sized write buffer
//! - Path checks (length limit, directory targets, overwrite warning)
//! - Dry-run mode that reports success without any request or write
//! - `Content-Length` verification
//!
//! # Example
//!
//! ```no_run
//! use shdl_core::download::{FetchOptions, Fetcher};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = Fetcher::new(reqwest::Client::new(), FetchOptions::default());
//! let outcome = fetcher
//!     .fetch_to_path("https://example.com/paper.pdf", Path::new("./paper.pdf"))
//!     .await?;
//! println!("Saved: {}", outcome.path().display());
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod filename;

pub use client::{DEFAULT_CHUNK_SIZE, FetchOptions, FetchOutcome, Fetcher};
pub use error::DownloadError;
pub use filename::output_path;
