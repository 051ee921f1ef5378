//! shdl core library
//!
//! Resolves a document identifier (DOI, arXiv ID, PMID, or a JSTOR, IEEE or
//! ScienceDirect reference) to a direct file URL through mirror sites, and
//! builds descriptive filenames from the document's metadata.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`resolver`] - Repository handlers, dispatcher and mirror link scraping
//! - [`naming`] - Filename sanitization and the autoname template
//! - [`download`] - Streaming fetch of the resolved file to disk

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod naming;
pub mod resolver;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use download::{DownloadError, FetchOptions, FetchOutcome, Fetcher};
pub use naming::{AutonameError, autoname};
pub use resolver::{
    Author, HandlerRegistry, Metadata, MetadataOutcome, RepoHandler, RepoKind, Resolution,
    ResolveError, ResolverContext,
};
