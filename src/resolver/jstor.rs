//! JSTOR handler: RIS citation export plus DOI-mirror download.
//!
//! The RIS strategy is also used by [`super::DoiHandler`] when a DOI
//! redirects to `jstor.org`.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info};

use super::mirror::{DownloadLink, MirrorQuery};
use super::ris::RisRecord;
use super::utils::compile_static_regex;
use super::{
    Author, MetaResponse, MetadataOutcome, RepoHandler, RepoKind, ResolverContext, finish_metadata,
};

const RIS_CONTENT_TYPE: &str = "application/x-research-info-systems";

/// Stable URL prefix used as mirror identifier when the record has no DOI.
const STABLE_URL_PREFIX: &str = "https://www.jstor.org/stable/";

static JSTOR_QUERY_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r"(?i)^(?:https?://)?(?:www\.)?jstor(?:\.org/stable/|:)?\s*(.+)$")
});

/// Extracts a JSTOR stable identifier from a trimmed query.
pub(super) fn get_identifier(query: &str) -> Option<String> {
    let id = JSTOR_QUERY_RE.captures(query)?.get(1)?.as_str().trim();
    (!id.is_empty()).then(|| id.to_string())
}

/// Requests the RIS citation export for a stable identifier.
pub(super) async fn fetch_ris(ctx: &ResolverContext, stable_id: &str) -> Option<MetaResponse> {
    let url = format!(
        "{}/citation/ris/{stable_id}",
        ctx.endpoints.jstor_base.trim_end_matches('/')
    );
    debug!(url = %url, "fetching JSTOR RIS export");
    MetaResponse::fetch(ctx.client.get(url)).await
}

/// Accepts a 200 response carrying the RIS media type.
pub(super) fn is_ris_response_valid(response: &MetaResponse) -> bool {
    response.status == 200 && response.content_type_starts_with(RIS_CONTENT_TYPE)
}

/// Parses a JSTOR RIS record (`AU  - Family, Given`).
pub(super) fn parse_ris_metadata(
    kind: RepoKind,
    identifier: &str,
    response: &MetaResponse,
) -> MetadataOutcome {
    let record = RisRecord::parse(&response.body);
    let authors: Vec<Author> = record
        .all("AU")
        .into_iter()
        .map(Author::from_family_first)
        .collect();
    finish_metadata(
        kind,
        identifier,
        authors,
        record.title().unwrap_or_default(),
        &record.year(),
    )
}

/// Handler for `jstor:` identifiers and `jstor.org/stable/` URLs.
#[derive(Debug)]
pub struct JstorHandler {
    ctx: Arc<ResolverContext>,
    identifier: String,
    response: Option<MetaResponse>,
}

impl JstorHandler {
    /// Creates a handler for an already extracted identifier.
    #[must_use]
    pub fn new(ctx: Arc<ResolverContext>, identifier: String) -> Self {
        Self {
            ctx,
            identifier,
            response: None,
        }
    }

    /// Mirror identifier: the record's first `DO` line, else the stable URL.
    fn mirror_identifier(&self) -> String {
        let doi = self
            .response
            .as_ref()
            .filter(|response| is_ris_response_valid(response))
            .and_then(|response| {
                RisRecord::parse(&response.body)
                    .first("DO")
                    .map(str::to_string)
            });
        match doi {
            Some(doi) => {
                info!(doi = %doi, "document has DOI; using it to query mirror");
                doi
            }
            None => format!("{STABLE_URL_PREFIX}{}", self.identifier),
        }
    }
}

#[async_trait]
impl RepoHandler for JstorHandler {
    fn kind(&self) -> RepoKind {
        RepoKind::Jstor
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn get_metadata_response(&self) -> Option<MetaResponse> {
        fetch_ris(&self.ctx, &self.identifier).await
    }

    fn is_meta_query_response_valid(&self, response: &MetaResponse) -> bool {
        is_ris_response_valid(response)
    }

    async fn extract_metadata(&mut self) -> MetadataOutcome {
        self.response = self.get_metadata_response().await;
        match self.response.as_ref() {
            Some(response) if self.is_meta_query_response_valid(response) => {
                parse_ris_metadata(self.kind(), &self.identifier, response)
            }
            _ => {
                info!(repo = self.repo_name(), "response is not a valid JSTOR response");
                MetadataOutcome::Unavailable
            }
        }
    }

    async fn get_download_url(&self, mirror_link: &str) -> Option<DownloadLink> {
        self.ctx
            .mirror
            .get_download_url(mirror_link, MirrorQuery::Get(self.mirror_identifier()))
            .await
    }
}
