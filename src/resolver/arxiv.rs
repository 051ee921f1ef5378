//! arXiv handler: Atom export API metadata and the built-in PDF mirror.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use tracing::{debug, info};
use url::Url;

use super::mirror::DownloadLink;
use super::utils::compile_static_regex;
use super::{
    Author, MetaResponse, MetadataOutcome, RepoHandler, RepoKind, ResolverContext, finish_metadata,
};

/// Marker the export API puts in error feeds.
const API_ERROR_MARKER: &str = "http://arxiv.org/api/errors";

static ARXIV_QUERY_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r"(?i)^(?:https?://)?(?:www\.)?arxiv(?:\.org/(?:abs|pdf)/|:)?\s*(.+?)(?:\.pdf)?$",
    )
});

/// Extracts an arXiv identifier from a trimmed query.
pub(super) fn get_identifier(query: &str) -> Option<String> {
    let id = ARXIV_QUERY_RE.captures(query)?.get(1)?.as_str().trim();
    (!id.is_empty()).then(|| id.to_string())
}

/// Handler for `arxiv:` identifiers and `arxiv.org/abs|pdf/` URLs.
#[derive(Debug)]
pub struct ArxivHandler {
    ctx: Arc<ResolverContext>,
    identifier: String,
}

impl ArxivHandler {
    /// Creates a handler for an already extracted identifier.
    #[must_use]
    pub fn new(ctx: Arc<ResolverContext>, identifier: String) -> Self {
        Self { ctx, identifier }
    }
}

#[async_trait]
impl RepoHandler for ArxivHandler {
    fn kind(&self) -> RepoKind {
        RepoKind::Arxiv
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn get_metadata_response(&self) -> Option<MetaResponse> {
        let url = format!(
            "{}?id_list={}",
            self.ctx.endpoints.arxiv_api,
            urlencoding::encode(&self.identifier)
        );
        debug!(url = %url, "fetching arXiv Atom metadata");
        MetaResponse::fetch(self.ctx.client.get(url)).await
    }

    fn is_meta_query_response_valid(&self, response: &MetaResponse) -> bool {
        response.status == 200 && !response.body.contains(API_ERROR_MARKER)
    }

    async fn extract_metadata(&mut self) -> MetadataOutcome {
        match self.get_metadata_response().await {
            Some(response) if self.is_meta_query_response_valid(&response) => {
                parse_atom_entry(&self.identifier, &response.body)
            }
            _ => {
                info!(repo = self.repo_name(), "response is not a valid arXiv response");
                MetadataOutcome::Unavailable
            }
        }
    }

    fn builtin_mirrors(&self) -> Option<Vec<String>> {
        Some(vec![self.ctx.endpoints.arxiv_pdf_mirror.clone()])
    }

    async fn get_download_url(&self, mirror_link: &str) -> Option<DownloadLink> {
        let base = Url::parse(mirror_link).ok()?;
        base.join(&format!("{}.pdf", self.identifier))
            .ok()
            .map(|url| DownloadLink::single(url.to_string()))
    }
}

/// Parses the first `<entry>` of an Atom feed.
fn parse_atom_entry(identifier: &str, xml: &str) -> MetadataOutcome {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut in_entry = false;
    let mut in_author = false;
    let mut current = String::new();
    let mut title = String::new();
    let mut authors = Vec::new();
    let mut published = String::new();
    let mut updated = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                current = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match current.as_str() {
                    "entry" => in_entry = true,
                    "author" if in_entry => in_author = true,
                    _ => {}
                }
            }
            Ok(Event::Text(e)) if in_entry => {
                let text = e.unescape().unwrap_or_default();
                match current.as_str() {
                    "title" if !in_author => title.push_str(&text),
                    "name" if in_author => authors.push(Author::from_given_first(&text)),
                    "published" => published = text.into_owned(),
                    "updated" => updated = text.into_owned(),
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                match e.local_name().as_ref() {
                    b"entry" => break,
                    b"author" => in_author = false,
                    _ => {}
                }
                current.clear();
            }
            Ok(Event::Eof) => break,
            Err(error) => {
                debug!(error = %error, "arXiv Atom feed did not parse");
                return MetadataOutcome::Incomplete;
            }
            Ok(_) => {}
        }
        buf.clear();
    }

    let date = if published.is_empty() { &updated } else { &published };
    let year: String = date.chars().take(4).collect();
    finish_metadata(RepoKind::Arxiv, identifier, authors, &title, &year)
}
