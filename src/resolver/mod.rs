//! Identifier resolution pipeline for turning a raw query into a download URL.
//!
//! Every supported repository gets a [`RepoHandler`] that runs the same
//! three-stage protocol: identifier extraction, metadata extraction and
//! download-link extraction. The handlers share one [`ResolverContext`]
//! (HTTP client, endpoint bases, DOI mirror resolver) built from the run
//! configuration.
//!
//! # Architecture
//!
//! - [`RepoHandler`] - Async trait implemented by each repository handler
//! - [`HandlerRegistry`] - Fixed-order dispatcher with DOI fallback
//! - [`MetadataOutcome`] - Found / Incomplete / Unavailable result of metadata extraction
//! - [`DoiMirrorResolver`] - Mirror probing + link scraping shared by DOI-derived handlers
//! - [`DoiHandler`], [`ArxivHandler`], [`JstorHandler`], [`ScienceDirectHandler`],
//!   [`IeeeHandler`], [`PmidHandler`] - concrete repositories
//!
//! # Example
//!
//! ```no_run
//! use shdl_core::resolver::{Endpoints, HandlerRegistry, HttpSettings, ResolverContext};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ctx = ResolverContext::new(&HttpSettings::default(), Endpoints::default())?;
//! let registry = HandlerRegistry::new(ctx);
//! let mirrors = vec!["https://mirror.example".to_string()];
//! let resolution = registry.resolve("10.1000/182", None, &mirrors).await?;
//! println!("Download URL: {}", resolution.download_url);
//! # Ok(())
//! # }
//! ```

mod arxiv;
mod doi;
mod error;
mod http_client;
mod ieee;
mod jstor;
mod mirror;
mod pubmed;
mod registry;
mod ris;
mod sciencedirect;
pub(crate) mod utils;

pub use arxiv::ArxivHandler;
pub use doi::DoiHandler;
pub use error::ResolveError;
pub use http_client::{
    DEFAULT_TIMEOUT_SECS, HttpSettings, build_download_http_client, build_resolver_http_client,
    expand_proxy_alias,
};
pub use ieee::IeeeHandler;
pub use jstor::JstorHandler;
pub use mirror::{DoiMirrorResolver, DownloadLink, MirrorQuery, extract_candidate_links};
pub use pubmed::PmidHandler;
pub use registry::{HandlerRegistry, Resolution};
pub use sciencedirect::ScienceDirectHandler;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use tracing::{debug, warn};

/// One author of a document, in publication order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    /// Given name(s), possibly already abbreviated.
    pub given: String,
    /// Family name.
    pub family: String,
}

impl Author {
    /// Creates an author from given and family names.
    #[must_use]
    pub fn new(given: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            given: given.into().trim().to_string(),
            family: family.into().trim().to_string(),
        }
    }

    /// Splits `Given Names Family` on the last space.
    #[must_use]
    pub fn from_given_first(name: &str) -> Self {
        match name.trim().rsplit_once(' ') {
            Some((given, family)) => Self::new(given, family),
            None => Self::new("", name),
        }
    }

    /// Splits `Family, Given Names` on the last `", "`.
    #[must_use]
    pub fn from_family_first(name: &str) -> Self {
        match name.trim().rsplit_once(", ") {
            Some((family, given)) => Self::new(given, family),
            None => Self::new("", name),
        }
    }
}

/// Bibliographic record of the resolved document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Authors in publication order.
    pub authors: Vec<Author>,
    /// Title with markup stripped.
    pub title: String,
    /// Four-digit year, empty when unknown.
    pub year: String,
    /// Repository display name.
    pub repo: String,
    /// Resolved identifier.
    pub id: String,
}

/// Result of the metadata stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataOutcome {
    /// Metadata was parsed successfully.
    Found(Metadata),
    /// A valid response arrived but required fields were missing.
    Incomplete,
    /// Fetching failed or the response did not pass the validity check.
    Unavailable,
}

impl MetadataOutcome {
    /// Returns the metadata when found.
    #[must_use]
    pub fn metadata(&self) -> Option<&Metadata> {
        match self {
            Self::Found(metadata) => Some(metadata),
            Self::Incomplete | Self::Unavailable => None,
        }
    }
}

/// Raw HTTP response captured for validation and parsing.
#[derive(Debug, Clone, Default)]
pub struct MetaResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` header value, empty when absent.
    pub content_type: String,
    /// `Content-Length` header value when present.
    pub content_length: Option<u64>,
    /// URL after redirects.
    pub final_url: String,
    /// Response body decoded as text.
    pub body: String,
}

impl MetaResponse {
    /// Reads status, headers and body from a reqwest response.
    pub async fn read(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let final_url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        debug!(status, content_type = %content_type, final_url = %final_url, "metadata response received");
        Self {
            status,
            content_type,
            content_length,
            final_url,
            body,
        }
    }

    /// Sends `request` and reads the response; transport failures are logged and yield `None`.
    pub async fn fetch(request: reqwest::RequestBuilder) -> Option<Self> {
        match request.send().await {
            Ok(response) => Some(Self::read(response).await),
            Err(error) => {
                warn!(error = %error, "metadata request failed");
                None
            }
        }
    }

    /// Returns true when the content type starts with `prefix` (case-insensitive).
    #[must_use]
    pub fn content_type_starts_with(&self, prefix: &str) -> bool {
        self.content_type
            .trim()
            .to_ascii_lowercase()
            .starts_with(&prefix.to_ascii_lowercase())
    }

    /// Returns the media type without parameters, lower-cased.
    #[must_use]
    pub fn media_type(&self) -> String {
        self.content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }
}

/// Repository types known to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepoKind {
    Doi,
    Arxiv,
    Jstor,
    ScienceDirect,
    Ieee,
    Pmid,
}

impl RepoKind {
    /// Dispatch order: first match wins.
    pub const REGISTERED: [Self; 6] = [
        Self::Doi,
        Self::Arxiv,
        Self::Jstor,
        Self::ScienceDirect,
        Self::Ieee,
        Self::Pmid,
    ];

    /// Stable display name of the repository.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Doi => "DOI",
            Self::Arxiv => "arXiv",
            Self::Jstor => "JSTOR",
            Self::ScienceDirect => "ScienceDirect",
            Self::Ieee => "IEEE",
            Self::Pmid => "PMID",
        }
    }

    /// Applies this repository's identifier pattern to a trimmed raw query.
    #[must_use]
    pub fn get_identifier(self, raw_query: &str) -> Option<String> {
        let query = raw_query.trim();
        match self {
            Self::Doi => doi::get_identifier(query),
            Self::Arxiv => arxiv::get_identifier(query),
            Self::Jstor => jstor::get_identifier(query),
            Self::ScienceDirect => sciencedirect::get_identifier(query),
            Self::Ieee => ieee::get_identifier(query),
            Self::Pmid => pubmed::get_identifier(query),
        }
    }

    /// Returns true when the raw query matches this repository's pattern.
    #[must_use]
    pub fn is_query_valid(self, raw_query: &str) -> bool {
        self.get_identifier(raw_query).is_some()
    }
}

impl fmt::Display for RepoKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for RepoKind {
    type Err = ResolveError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "doi" => Ok(Self::Doi),
            "arxiv" => Ok(Self::Arxiv),
            "jstor" => Ok(Self::Jstor),
            "sciencedirect" | "scidir" => Ok(Self::ScienceDirect),
            "ieee" => Ok(Self::Ieee),
            "pmid" | "pubmed" => Ok(Self::Pmid),
            _ => Err(ResolveError::unknown_repo_type(value)),
        }
    }
}

/// Endpoint bases for every metadata service; overridable for tests.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// DOI content negotiation base (`https://doi.org`).
    pub doi_base: String,
    /// arXiv export API query endpoint.
    pub arxiv_api: String,
    /// Built-in arXiv PDF mirror.
    pub arxiv_pdf_mirror: String,
    /// JSTOR site base.
    pub jstor_base: String,
    /// IEEE Xplore site base.
    pub ieee_base: String,
    /// ScienceDirect site base.
    pub sciencedirect_base: String,
    /// NCBI e-utilities base.
    pub eutils_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            doi_base: "https://doi.org".to_string(),
            arxiv_api: "http://export.arxiv.org/api/query".to_string(),
            arxiv_pdf_mirror: "https://arxiv.org/pdf/".to_string(),
            jstor_base: "https://www.jstor.org".to_string(),
            ieee_base: "https://ieeexplore.ieee.org".to_string(),
            sciencedirect_base: "https://www.sciencedirect.com".to_string(),
            eutils_base: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string(),
        }
    }
}

/// Shared state handed to every handler of a run.
#[derive(Debug, Clone)]
pub struct ResolverContext {
    /// Client used for metadata requests and mirror queries.
    pub client: Client,
    /// Metadata endpoint bases.
    pub endpoints: Endpoints,
    /// Mirror probing and link extraction.
    pub mirror: DoiMirrorResolver,
}

impl ResolverContext {
    /// Builds the context from HTTP settings and endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when the HTTP client cannot be constructed,
    /// typically because of an invalid proxy URL.
    pub fn new(settings: &HttpSettings, endpoints: Endpoints) -> Result<Arc<Self>, ResolveError> {
        let client = build_resolver_http_client(settings)?;
        Ok(Arc::new(Self::with_client(client, endpoints)))
    }

    /// Builds the context around an existing client.
    #[must_use]
    pub fn with_client(client: Client, endpoints: Endpoints) -> Self {
        Self {
            mirror: DoiMirrorResolver::new(client.clone()),
            client,
            endpoints,
        }
    }
}

/// Contract every repository handler implements.
///
/// A handler instance owns the identifier and the metadata response of one
/// resolution. Stages run in order: [`extract_metadata`](Self::extract_metadata)
/// first, then [`get_download_url`](Self::get_download_url) once per mirror.
///
/// # Object Safety
///
/// Uses `async_trait` so the registry can hand out `Box<dyn RepoHandler>`.
#[async_trait]
pub trait RepoHandler: Send + Sync {
    /// Repository type of this handler.
    fn kind(&self) -> RepoKind;

    /// Stable display name ("DOI", "arXiv", ...).
    fn repo_name(&self) -> &'static str {
        self.kind().display_name()
    }

    /// Identifier extracted from the raw query.
    fn identifier(&self) -> &str;

    /// Issues the metadata request(s). Transport failures yield `None`.
    async fn get_metadata_response(&self) -> Option<MetaResponse>;

    /// Repository-specific acceptance check; run before any parsing.
    fn is_meta_query_response_valid(&self, response: &MetaResponse) -> bool;

    /// Fetches, validates and parses metadata, keeping the response for later stages.
    async fn extract_metadata(&mut self) -> MetadataOutcome;

    /// Mirrors this handler always uses instead of configured ones.
    fn builtin_mirrors(&self) -> Option<Vec<String>> {
        None
    }

    /// Derives a download link through one mirror; `None` means the mirror gave nothing usable.
    async fn get_download_url(&self, mirror_link: &str) -> Option<DownloadLink>;
}

/// Stamps repository name and identifier on a parsed record.
pub(crate) fn finish_metadata(
    kind: RepoKind,
    identifier: &str,
    authors: Vec<Author>,
    title: &str,
    year: &str,
) -> MetadataOutcome {
    let title = crate::naming::convert_math_symbols(title)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if title.is_empty() || authors.is_empty() {
        debug!(repo = kind.display_name(), "citation record incomplete");
        return MetadataOutcome::Incomplete;
    }
    MetadataOutcome::Found(Metadata {
        authors,
        title,
        year: year.to_string(),
        repo: kind.display_name().to_string(),
        id: identifier.to_string(),
    })
}
