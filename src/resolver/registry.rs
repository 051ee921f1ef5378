//! Handler dispatch and the resolution loop.
//!
//! The [`HandlerRegistry`] picks the first repository whose identifier
//! pattern matches the query, runs the metadata stage, then walks the mirror
//! list in order until one mirror yields a download link.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{
    ArxivHandler, DoiHandler, DownloadLink, IeeeHandler, JstorHandler, MetadataOutcome, PmidHandler,
    RepoHandler, RepoKind, ResolveError, ResolverContext, ScienceDirectHandler,
};

/// Outcome of a full resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Display name of the repository that handled the query.
    pub repo_name: &'static str,
    /// Identifier the handler resolved.
    pub identifier: String,
    /// Result of the metadata stage.
    pub metadata: MetadataOutcome,
    /// Direct file URL found through the first working mirror.
    pub download_url: String,
    /// Every link that mirror's page offered, in page order.
    pub link_candidates: Vec<String>,
}

/// Fixed-order dispatcher over the registered repository types.
pub struct HandlerRegistry {
    ctx: Arc<ResolverContext>,
    order: Vec<RepoKind>,
}

impl HandlerRegistry {
    /// Creates a registry over every registered repository, in dispatch order.
    #[must_use]
    pub fn new(ctx: Arc<ResolverContext>) -> Self {
        Self {
            ctx,
            order: RepoKind::REGISTERED.to_vec(),
        }
    }

    /// Returns the first repository whose pattern matches, with its identifier.
    #[must_use]
    pub fn detect(&self, raw_query: &str) -> Option<(RepoKind, String)> {
        self.order.iter().find_map(|kind| {
            let identifier = kind.get_identifier(raw_query);
            if identifier.is_none() {
                debug!(repo = kind.display_name(), "failed parsing identifier as this type");
            }
            identifier.map(|id| (*kind, id))
        })
    }

    /// Builds the handler for `raw_query`.
    ///
    /// With `forced` set, the trimmed query is used verbatim as that
    /// repository's identifier. Otherwise unmatched queries fall back to a
    /// DOI handler seeded with the stripped input.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::QueryInvalid`] when even the DOI fallback
    /// cannot extract an identifier (e.g. an empty query).
    #[tracing::instrument(skip(self))]
    pub fn dispatch(
        &self,
        raw_query: &str,
        forced: Option<RepoKind>,
    ) -> Result<Box<dyn RepoHandler>, ResolveError> {
        let query = raw_query.trim();
        let (kind, identifier) = if let Some(kind) = forced {
            if query.is_empty() {
                return Err(ResolveError::query_invalid(raw_query));
            }
            debug!(repo = kind.display_name(), "repository type forced");
            (kind, query.to_string())
        } else if let Some(found) = self.detect(query) {
            found
        } else {
            info!("query matches no repository pattern; treating it as a DOI");
            let identifier = RepoKind::Doi
                .get_identifier(&format!("doi: {query}"))
                .ok_or_else(|| ResolveError::query_invalid(raw_query))?;
            (RepoKind::Doi, identifier)
        };

        info!(repo = kind.display_name(), identifier = %identifier, "identifier resolved");
        Ok(self.build_handler(kind, identifier))
    }

    fn build_handler(&self, kind: RepoKind, identifier: String) -> Box<dyn RepoHandler> {
        let ctx = Arc::clone(&self.ctx);
        match kind {
            RepoKind::Doi => Box::new(DoiHandler::new(ctx, identifier)),
            RepoKind::Arxiv => Box::new(ArxivHandler::new(ctx, identifier)),
            RepoKind::Jstor => Box::new(JstorHandler::new(ctx, identifier)),
            RepoKind::ScienceDirect => Box::new(ScienceDirectHandler::new(ctx, &identifier)),
            RepoKind::Ieee => Box::new(IeeeHandler::new(ctx, identifier)),
            RepoKind::Pmid => Box::new(PmidHandler::new(ctx, identifier)),
        }
    }

    /// Runs dispatch, metadata extraction and the mirror scan.
    ///
    /// Metadata failures are logged and carried in the result; they never
    /// abort the run.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::QueryInvalid`] for unusable queries,
    /// [`ResolveError::NoMirrorConfigured`] when the handler has no built-in
    /// mirror and `mirrors` is empty, and [`ResolveError::FileNotFound`] when
    /// every mirror was tried without a link.
    #[tracing::instrument(skip(self, mirrors), fields(mirror_count = mirrors.len()))]
    pub async fn resolve(
        &self,
        raw_query: &str,
        forced: Option<RepoKind>,
        mirrors: &[String],
    ) -> Result<Resolution, ResolveError> {
        let mut handler = self.dispatch(raw_query, forced)?;

        let metadata = handler.extract_metadata().await;
        match &metadata {
            MetadataOutcome::Found(found) => {
                debug!(title = %found.title, authors = found.authors.len(), "metadata extracted");
            }
            MetadataOutcome::Incomplete => {
                warn!(repo = handler.repo_name(), "citation record incomplete; autoname unavailable");
            }
            MetadataOutcome::Unavailable => {
                warn!(repo = handler.repo_name(), "metadata unavailable; autoname unavailable");
            }
        }

        let link = Self::scan_mirrors(handler.as_ref(), mirrors).await?;
        Ok(Resolution {
            repo_name: handler.repo_name(),
            identifier: handler.identifier().to_string(),
            metadata,
            download_url: link.url,
            link_candidates: link.candidates,
        })
    }

    /// Tries each mirror in order; the first link wins and later mirrors are not contacted.
    async fn scan_mirrors(
        handler: &dyn RepoHandler,
        configured: &[String],
    ) -> Result<DownloadLink, ResolveError> {
        let mirrors = handler
            .builtin_mirrors()
            .unwrap_or_else(|| configured.to_vec());
        if mirrors.is_empty() {
            return Err(ResolveError::no_mirror(handler.repo_name(), handler.identifier()));
        }

        for (index, mirror) in mirrors.iter().enumerate() {
            debug!(mirror = %mirror, attempt = index + 1, "trying mirror");
            if let Some(link) = handler.get_download_url(mirror).await {
                info!(
                    mirror = %mirror,
                    url = %link.url,
                    candidates = link.candidates.len(),
                    "download link found"
                );
                return Ok(link);
            }
            info!(mirror = %mirror, "mirror gave no download link");
        }
        Err(ResolveError::file_not_found(handler.identifier(), mirrors.len()))
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.order.iter().map(|kind| kind.display_name()).collect();
        f.debug_struct("HandlerRegistry")
            .field("handlers", &names)
            .finish_non_exhaustive()
    }
}
