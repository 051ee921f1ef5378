//! IEEE Xplore handler: RIS from the citation REST endpoint plus DOI-mirror download.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::REFERER;
use serde::Deserialize;
use tracing::{debug, info};

use super::mirror::{DownloadLink, MirrorQuery};
use super::ris::RisRecord;
use super::utils::compile_static_regex;
use super::{
    Author, MetaResponse, MetadataOutcome, RepoHandler, RepoKind, ResolverContext, finish_metadata,
};

const DOCUMENT_URL_PREFIX: &str = "https://ieeexplore.ieee.org/document/";

static IEEE_QUERY_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r"(?i)^(?:https?://)?(?:ieeexplore\.)?ieee(?:\.org/document/|:|/)?\s*(\d+)/?$",
    )
});

/// Extracts a numeric IEEE document id from a trimmed query.
pub(super) fn get_identifier(query: &str) -> Option<String> {
    Some(IEEE_QUERY_RE.captures(query)?.get(1)?.as_str().to_string())
}

/// Body of the citation endpoint: RIS text wrapped in JSON.
#[derive(Debug, Deserialize)]
struct CitationPayload {
    #[serde(default)]
    data: String,
}

fn ris_from_payload(body: &str) -> Option<RisRecord> {
    match serde_json::from_str::<CitationPayload>(body) {
        Ok(payload) => Some(RisRecord::parse(&payload.data)),
        Err(error) => {
            debug!(error = %error, "IEEE citation payload did not parse");
            None
        }
    }
}

/// Handler for `ieee:` identifiers and `ieeexplore.ieee.org/document/` URLs.
#[derive(Debug)]
pub struct IeeeHandler {
    ctx: Arc<ResolverContext>,
    identifier: String,
    response: Option<MetaResponse>,
}

impl IeeeHandler {
    /// Creates a handler for an already extracted document id.
    #[must_use]
    pub fn new(ctx: Arc<ResolverContext>, identifier: String) -> Self {
        Self {
            ctx,
            identifier,
            response: None,
        }
    }

    /// Mirror identifier: the record's `DO` line, else the document page URL.
    fn mirror_identifier(&self) -> String {
        let doi = self
            .response
            .as_ref()
            .filter(|response| self.is_meta_query_response_valid(response))
            .and_then(|response| ris_from_payload(&response.body))
            .and_then(|record| record.first("DO").map(str::to_string));
        match doi {
            Some(doi) => {
                info!(doi = %doi, "document has DOI; using it to query mirror");
                doi
            }
            None => format!("{DOCUMENT_URL_PREFIX}{}", self.identifier),
        }
    }
}

#[async_trait]
impl RepoHandler for IeeeHandler {
    fn kind(&self) -> RepoKind {
        RepoKind::Ieee
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn get_metadata_response(&self) -> Option<MetaResponse> {
        let base = self.ctx.endpoints.ieee_base.trim_end_matches('/');
        let url = format!(
            "{base}/rest/search/citation/format?recordIds={}&download-format=download-ris&lite=true",
            self.identifier
        );
        let referer = format!("{base}/document/{}", self.identifier);
        debug!(url = %url, "fetching IEEE citation");
        MetaResponse::fetch(self.ctx.client.get(url).header(REFERER, referer)).await
    }

    fn is_meta_query_response_valid(&self, response: &MetaResponse) -> bool {
        response.status == 200
            && response.content_length != Some(0)
            && !response.body.trim().is_empty()
    }

    async fn extract_metadata(&mut self) -> MetadataOutcome {
        self.response = self.get_metadata_response().await;
        let Some(response) = self
            .response
            .as_ref()
            .filter(|response| self.is_meta_query_response_valid(response))
        else {
            info!(repo = self.repo_name(), "response is not a valid IEEE response");
            return MetadataOutcome::Unavailable;
        };

        let Some(record) = ris_from_payload(&response.body) else {
            return MetadataOutcome::Incomplete;
        };
        let authors: Vec<Author> = record
            .all("AU")
            .into_iter()
            .map(Author::from_given_first)
            .collect();
        finish_metadata(
            self.kind(),
            &self.identifier,
            authors,
            record.title().unwrap_or_default(),
            &record.year(),
        )
    }

    async fn get_download_url(&self, mirror_link: &str) -> Option<DownloadLink> {
        self.ctx
            .mirror
            .get_download_url(mirror_link, MirrorQuery::Get(self.mirror_identifier()))
            .await
    }
}
