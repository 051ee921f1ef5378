//! PubMed handler: NCBI e-utilities summary metadata plus mirror download.
//!
//! When the summary lists a DOI the mirror is queried with it; otherwise the
//! PMID is posted to the mirror as a `request` form field.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info};

use super::mirror::{DownloadLink, MirrorQuery};
use super::utils::compile_static_regex;
use super::{
    Author, MetaResponse, MetadataOutcome, RepoHandler, RepoKind, ResolverContext, finish_metadata,
};

static PMID_QUERY_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r"(?i)^(?:https?://)?(?:(?:pubmed|www)\.ncbi\.nlm\.nih\.gov(?:/pubmed)?|pmid:?)\s*/?(\d+)/?$",
    )
});

/// Extracts a numeric PMID from a trimmed query.
pub(super) fn get_identifier(query: &str) -> Option<String> {
    Some(PMID_QUERY_RE.captures(query)?.get(1)?.as_str().to_string())
}

/// Summary record of one PMID, reduced to what the pipeline needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PubmedSummary {
    title: String,
    authors: Vec<Author>,
    year: String,
    doi: Option<String>,
}

/// Reads `result[uids[0]]` of an esummary JSON body.
fn parse_summary(body: &str) -> Option<PubmedSummary> {
    let root: Value = serde_json::from_str(body).ok()?;
    let result = &root["result"];
    let uid = result["uids"][0].as_str()?;
    let record = &result[uid];
    if !record.is_object() {
        return None;
    }

    let title = record["title"]
        .as_str()
        .unwrap_or_default()
        .trim_matches(|c: char| matches!(c, ' ' | '\'' | '"' | '.'))
        .to_string();

    let authors = record["authors"]
        .as_array()
        .map(|authors| {
            authors
                .iter()
                .filter(|author| author["authtype"].as_str() == Some("Author"))
                .filter_map(|author| author["name"].as_str())
                .map(author_from_medline_name)
                .collect()
        })
        .unwrap_or_default();

    let year = record["pubdate"]
        .as_str()
        .unwrap_or_default()
        .chars()
        .take(4)
        .collect();

    let doi = record["articleids"].as_array().and_then(|ids| {
        ids.iter()
            .find(|id| id["idtype"].as_str() == Some("doi"))
            .and_then(|id| id["value"].as_str())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    });

    Some(PubmedSummary {
        title,
        authors,
        year,
        doi,
    })
}

/// Splits a MEDLINE display name (`Smith AB`) into family and initials.
fn author_from_medline_name(name: &str) -> Author {
    match name.trim().rsplit_once(' ') {
        Some((family, initials))
            if initials.len() > 1 && initials.chars().all(|c| c.is_ascii_uppercase()) =>
        {
            let spaced: Vec<String> = initials.chars().map(String::from).collect();
            Author::new(spaced.join(" "), family)
        }
        Some((family, given)) => Author::new(given, family),
        None => Author::new("", name),
    }
}

/// Handler for `pmid:` identifiers and PubMed URLs.
#[derive(Debug)]
pub struct PmidHandler {
    ctx: Arc<ResolverContext>,
    identifier: String,
    summary: Option<PubmedSummary>,
}

impl PmidHandler {
    /// Creates a handler for an already extracted PMID.
    #[must_use]
    pub fn new(ctx: Arc<ResolverContext>, identifier: String) -> Self {
        Self {
            ctx,
            identifier,
            summary: None,
        }
    }

    fn mirror_query(&self) -> MirrorQuery {
        match self.summary.as_ref().and_then(|summary| summary.doi.clone()) {
            Some(doi) => {
                info!(doi = %doi, "document has DOI; using it to query mirror");
                MirrorQuery::Get(doi)
            }
            None => MirrorQuery::PostRequest(self.identifier.clone()),
        }
    }
}

#[async_trait]
impl RepoHandler for PmidHandler {
    fn kind(&self) -> RepoKind {
        RepoKind::Pmid
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn get_metadata_response(&self) -> Option<MetaResponse> {
        let url = format!(
            "{}/esummary.fcgi?db=pubmed&id={}&retmode=json",
            self.ctx.endpoints.eutils_base.trim_end_matches('/'),
            self.identifier
        );
        debug!(url = %url, "fetching PubMed summary");
        MetaResponse::fetch(self.ctx.client.get(url)).await
    }

    fn is_meta_query_response_valid(&self, response: &MetaResponse) -> bool {
        response.status == 200 && response.content_type_starts_with("application/json")
    }

    async fn extract_metadata(&mut self) -> MetadataOutcome {
        let response = match self.get_metadata_response().await {
            Some(response) if self.is_meta_query_response_valid(&response) => response,
            _ => {
                info!(repo = self.repo_name(), "response is not a valid PMID response");
                return MetadataOutcome::Unavailable;
            }
        };

        self.summary = parse_summary(&response.body);
        match self.summary.as_ref() {
            Some(summary) => finish_metadata(
                self.kind(),
                &self.identifier,
                summary.authors.clone(),
                &summary.title,
                &summary.year,
            ),
            None => MetadataOutcome::Incomplete,
        }
    }

    async fn get_download_url(&self, mirror_link: &str) -> Option<DownloadLink> {
        self.ctx
            .mirror
            .get_download_url(mirror_link, self.mirror_query())
            .await
    }
}
