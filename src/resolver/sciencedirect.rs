//! `ScienceDirect` handler: SDFE RIS citation export plus DOI-mirror download.
//!
//! Identifiers have the form `{type}/{id}` (e.g. `pii/S0000000000000000`);
//! a bare id is assumed to be a PII.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};

use super::mirror::{DownloadLink, MirrorQuery};
use super::ris::RisRecord;
use super::utils::compile_static_regex;
use super::{
    Author, MetaResponse, MetadataOutcome, RepoHandler, RepoKind, ResolverContext, doi,
    finish_metadata,
};

const RIS_CONTENT_TYPE: &str = "application/x-research-info-systems";
const DEFAULT_DOC_TYPE: &str = "pii";
const ARTICLE_URL_PREFIX: &str = "https://www.sciencedirect.com/science/article/";

static SCIDIR_QUERY_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r"(?i)^(?:https?://)?(?:www\.)?sci(?:ence)?dir(?:ect)?(?:\.com/science/article/|:|/)\s*((?:.+?/)?\s*.+)$",
    )
});

static SKIPPED_PATH_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?i)^(?:abs|am)/"));

/// Extracts a `{type}/{id}` identifier from a trimmed query.
pub(super) fn get_identifier(query: &str) -> Option<String> {
    let raw = SCIDIR_QUERY_RE.captures(query)?.get(1)?.as_str().trim();
    let id = SKIPPED_PATH_PREFIX_RE.replace(raw, "");
    (!id.is_empty()).then(|| id.into_owned())
}

/// Splits `{type}/{id}`, assuming a PII when no type is given.
fn split_doc_type(identifier: &str) -> (String, String) {
    match identifier.split_once('/') {
        Some((doc_type, id)) => (doc_type.trim().to_string(), id.trim().to_string()),
        None => {
            warn!(identifier, "cannot decide identifier type; assuming it is a PII");
            (DEFAULT_DOC_TYPE.to_string(), identifier.trim().to_string())
        }
    }
}

/// Handler for `sciencedirect:` identifiers and article URLs.
#[derive(Debug)]
pub struct ScienceDirectHandler {
    ctx: Arc<ResolverContext>,
    doc_type: String,
    identifier: String,
    response: Option<MetaResponse>,
}

impl ScienceDirectHandler {
    /// Creates a handler for an already extracted `{type}/{id}` identifier.
    #[must_use]
    pub fn new(ctx: Arc<ResolverContext>, identifier: &str) -> Self {
        let (doc_type, identifier) = split_doc_type(identifier);
        debug!(doc_type = %doc_type, identifier = %identifier, "discovered identifier type");
        Self {
            ctx,
            doc_type,
            identifier,
            response: None,
        }
    }

    /// Mirror identifier: `DO` line (URL prefix stripped), else `UR`, else the article URL.
    fn mirror_identifier(&self) -> String {
        let record = self
            .response
            .as_ref()
            .filter(|response| self.is_meta_query_response_valid(response))
            .map(|response| RisRecord::parse(&response.body))
            .unwrap_or_default();

        if let Some(raw_doi) = record.first("DO") {
            let doi = doi::get_identifier(raw_doi).unwrap_or_else(|| raw_doi.to_string());
            info!(doi = %doi, "document has DOI; using it to query mirror");
            return doi;
        }
        if let Some(url) = record.first("UR") {
            return url.to_string();
        }
        format!("{ARTICLE_URL_PREFIX}{}/{}", self.doc_type, self.identifier)
    }
}

#[async_trait]
impl RepoHandler for ScienceDirectHandler {
    fn kind(&self) -> RepoKind {
        RepoKind::ScienceDirect
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn get_metadata_response(&self) -> Option<MetaResponse> {
        let url = format!(
            "{}/sdfe/arp/cite?{}={}&format=application%2Fx-research-info-systems&withabstract=false",
            self.ctx.endpoints.sciencedirect_base.trim_end_matches('/'),
            urlencoding::encode(&self.doc_type),
            urlencoding::encode(&self.identifier),
        );
        debug!(url = %url, "fetching ScienceDirect RIS export");
        MetaResponse::fetch(self.ctx.client.get(url)).await
    }

    fn is_meta_query_response_valid(&self, response: &MetaResponse) -> bool {
        response.status == 200 && response.content_type_starts_with(RIS_CONTENT_TYPE)
    }

    async fn extract_metadata(&mut self) -> MetadataOutcome {
        self.response = self.get_metadata_response().await;
        let Some(response) = self
            .response
            .as_ref()
            .filter(|response| self.is_meta_query_response_valid(response))
        else {
            info!(repo = self.repo_name(), "response is not a valid ScienceDirect response");
            return MetadataOutcome::Unavailable;
        };

        let record = RisRecord::parse(&response.body);
        let authors: Vec<Author> = record
            .all("AU")
            .into_iter()
            .map(Author::from_family_first)
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
