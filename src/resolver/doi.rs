//! DOI handler: CSL-JSON content negotiation with host-specific fallbacks.
//!
//! When the CSL-JSON record lacks required fields the DOI is followed to its
//! landing page and the final host picks an alternate strategy:
//!
//! | Host | Strategy |
//! |---|---|
//! | `jstor.org` | JSTOR RIS export |
//! | `aimsciences.org` | AIMS XML citation export |
//! | `royalsocietypublishing.org` | `dc.*` meta tags of the landing page |

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use reqwest::header::ACCEPT;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use super::mirror::{DownloadLink, MirrorQuery};
use super::utils::{
    compile_static_regex, extract_meta_value, extract_meta_values, extract_year_from_str,
    host_is_within, parse_host_or_fallback,
};
use super::{
    Author, MetaResponse, MetadataOutcome, RepoHandler, RepoKind, ResolverContext, finish_metadata,
    jstor,
};

/// Media type requested from the DOI resolver.
pub(super) const CSL_JSON: &str = "application/vnd.citationstyles.csl+json";

static DOI_QUERY_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(
        r"(?i)^(?:(?:https?://)?(?:dx\.|www\.)?doi(?:\.org/|:|/)\s*(.+)|(10\.\d{4,9}/.+))$",
    )
});

static DC_TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?i)<meta\s+name="dc\.Title"\s+content="([^"]*)""#)
});

static DC_CREATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?i)<meta\s+name="dc\.Creator"\s+content="([^"]*)""#)
});

static DC_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?i)<meta\s+name="dc\.Date"\s+content="([^"]*)""#)
});

/// Extracts a DOI from a trimmed query (`doi:`, `doi.org/` URL or bare `10.x/...`).
pub(super) fn get_identifier(query: &str) -> Option<String> {
    let caps = DOI_QUERY_RE.captures(query)?;
    let id = caps.get(1).or_else(|| caps.get(2))?.as_str().trim();
    (!id.is_empty()).then(|| id.to_string())
}

/// Alternate metadata source chosen by the DOI's landing host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AlternateSource {
    Jstor,
    Aims,
    RoyalSociety,
}

impl AlternateSource {
    fn for_host(host: &str) -> Option<Self> {
        if host_is_within(host, "jstor.org") {
            Some(Self::Jstor)
        } else if host_is_within(host, "aimsciences.org") {
            Some(Self::Aims)
        } else if host_is_within(host, "royalsocietypublishing.org") {
            Some(Self::RoyalSociety)
        } else {
            None
        }
    }
}

/// Handler for DOIs; also the dispatcher's fallback for unrecognized queries.
#[derive(Debug)]
pub struct DoiHandler {
    ctx: Arc<ResolverContext>,
    identifier: String,
    response: Option<MetaResponse>,
}

impl DoiHandler {
    /// Creates a handler for an already extracted DOI.
    #[must_use]
    pub fn new(ctx: Arc<ResolverContext>, identifier: String) -> Self {
        Self {
            ctx,
            identifier,
            response: None,
        }
    }

    fn doi_url(&self) -> String {
        format!(
            "{}/{}",
            self.ctx.endpoints.doi_base.trim_end_matches('/'),
            self.identifier
        )
    }

    /// Follows the DOI to its landing page and tries the host's strategy.
    async fn alternate_metadata(&self) -> MetadataOutcome {
        let Some(landing) = MetaResponse::fetch(self.ctx.client.get(self.doi_url())).await else {
            return MetadataOutcome::Unavailable;
        };
        self.metadata_from_landing(&landing).await
    }

    /// Picks the alternate strategy from the landing page's final host.
    async fn metadata_from_landing(&self, landing: &MetaResponse) -> MetadataOutcome {
        let host = parse_host_or_fallback(&landing.final_url);
        let Some(source) = AlternateSource::for_host(&host) else {
            warn!(host = %host, "no alternate metadata strategy for DOI landing host");
            return MetadataOutcome::Unavailable;
        };
        info!(host = %host, ?source, "trying alternate metadata strategy");

        match source {
            AlternateSource::Jstor => {
                let stable_id = jstor_stable_id(&landing.final_url)
                    .unwrap_or_else(|| self.identifier.clone());
                match jstor::fetch_ris(&self.ctx, &stable_id).await {
                    Some(response) if jstor::is_ris_response_valid(&response) => {
                        jstor::parse_ris_metadata(RepoKind::Doi, &self.identifier, &response)
                    }
                    _ => MetadataOutcome::Unavailable,
                }
            }
            AlternateSource::Aims => {
                let Some(export_url) = aims_export_url(&landing.final_url, &self.identifier)
                else {
                    return MetadataOutcome::Unavailable;
                };
                match MetaResponse::fetch(self.ctx.client.get(export_url)).await {
                    Some(response) if response.status == 200 && !response.body.is_empty() => {
                        let (authors, title, year) = parse_jats_citation(&response.body);
                        finish_metadata(RepoKind::Doi, &self.identifier, authors, &title, &year)
                    }
                    _ => MetadataOutcome::Unavailable,
                }
            }
            AlternateSource::RoyalSociety => {
                if landing.status != 200 {
                    return MetadataOutcome::Unavailable;
                }
                let (authors, title, year) = parse_dc_meta_tags(&landing.body);
                finish_metadata(RepoKind::Doi, &self.identifier, authors, &title, &year)
            }
        }
    }
}

#[async_trait]
impl RepoHandler for DoiHandler {
    fn kind(&self) -> RepoKind {
        RepoKind::Doi
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn get_metadata_response(&self) -> Option<MetaResponse> {
        debug!(identifier = %self.identifier, "fetching CSL-JSON metadata");
        MetaResponse::fetch(self.ctx.client.get(self.doi_url()).header(ACCEPT, CSL_JSON)).await
    }

    fn is_meta_query_response_valid(&self, response: &MetaResponse) -> bool {
        response.status == 200 && response.media_type() == CSL_JSON
    }

    async fn extract_metadata(&mut self) -> MetadataOutcome {
        self.response = self.get_metadata_response().await;
        let outcome = match self.response.as_ref() {
            Some(response) if self.is_meta_query_response_valid(response) => {
                parse_csl_json(&self.identifier, &response.body)
            }
            other => {
                info!(
                    status = other.map(|r| r.status),
                    "response is not a valid DOI response"
                );
                return MetadataOutcome::Unavailable;
            }
        };
        match outcome {
            MetadataOutcome::Incomplete => self.alternate_metadata().await,
            found @ (MetadataOutcome::Found(_) | MetadataOutcome::Unavailable) => found,
        }
    }

    async fn get_download_url(&self, mirror_link: &str) -> Option<DownloadLink> {
        self.ctx
            .mirror
            .get_download_url(mirror_link, MirrorQuery::Get(self.identifier.clone()))
            .await
    }
}

/// Parses a CSL-JSON record; unparsable JSON counts as incomplete.
fn parse_csl_json(identifier: &str, body: &str) -> MetadataOutcome {
    let record: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(error) => {
            debug!(error = %error, "CSL-JSON body did not parse");
            return MetadataOutcome::Incomplete;
        }
    };

    let title = match &record["title"] {
        Value::String(title) => title.clone(),
        Value::Array(titles) => titles
            .iter()
            .find_map(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    };

    let authors: Vec<Author> = record["author"]
        .as_array()
        .map(|authors| {
            authors
                .iter()
                .filter_map(|author| {
                    let family = author["family"]
                        .as_str()
                        .or_else(|| author["literal"].as_str())?;
                    let given = author["given"].as_str().unwrap_or_default();
                    Some(Author::new(given, family))
                })
                .collect()
        })
        .unwrap_or_default();

    let year = ["issued", "published-print", "published-online"]
        .iter()
        .find_map(|key| date_parts_year(&record[*key]))
        .unwrap_or_default();

    finish_metadata(RepoKind::Doi, identifier, authors, &title, &year)
}

fn date_parts_year(date: &Value) -> Option<String> {
    match &date["date-parts"][0][0] {
        Value::Number(year) => Some(year.to_string()),
        Value::String(year) if !year.is_empty() => Some(year.clone()),
        _ => None,
    }
}

fn jstor_stable_id(final_url: &str) -> Option<String> {
    let url = Url::parse(final_url).ok()?;
    let (_, id) = url.path().split_once("/stable/")?;
    let id = id.trim_matches('/');
    (!id.is_empty()).then(|| id.to_string())
}

fn aims_export_url(final_url: &str, doi: &str) -> Option<String> {
    let url = Url::parse(final_url).ok()?;
    let host = url.host_str()?;
    Some(format!(
        "{}://{host}/article/exportCitation?doi={}&format=xml",
        url.scheme(),
        urlencoding::encode(doi)
    ))
}

/// Extracts authors, title and year from the landing page's `dc.*` meta tags.
fn parse_dc_meta_tags(html: &str) -> (Vec<Author>, String, String) {
    let title = extract_meta_value(html, &DC_TITLE_RE).unwrap_or_default();
    let authors = extract_meta_values(html, &DC_CREATOR_RE)
        .iter()
        .map(|name| Author::from_given_first(name))
        .collect();
    let year = extract_meta_value(html, &DC_DATE_RE)
        .and_then(|date| extract_year_from_str(&date))
        .unwrap_or_default();
    (authors, title, year)
}

/// Extracts authors, title and year from a JATS-style citation export.
fn parse_jats_citation(xml: &str) -> (Vec<Author>, String, String) {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut authors = Vec::new();
    let mut title = String::new();
    let mut year = String::new();

    let mut current = String::new();
    let mut in_title = false;
    let mut title_done = false;
    let mut in_contrib = false;
    let mut surname = String::new();
    let mut given = String::new();
    let mut full_name = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                current = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match current.as_str() {
                    "article-title" | "title" if !title_done => in_title = true,
                    "contrib" => {
                        in_contrib = true;
                        surname.clear();
                        given.clear();
                        full_name.clear();
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                let raw = e.unescape().unwrap_or_default();
                let text = raw.trim();
                if in_title {
                    title.push_str(&raw);
                } else if !text.is_empty() {
                    match current.as_str() {
                        "surname" if in_contrib => surname = text.to_string(),
                        "given-names" if in_contrib => given = text.to_string(),
                        "name" | "string-name" if in_contrib => full_name = text.to_string(),
                        "year" if !in_contrib && year.is_empty() => year = text.to_string(),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                match e.local_name().as_ref() {
                    b"article-title" | b"title" if in_title => {
                        in_title = false;
                        title_done = true;
                    }
                    b"contrib" => {
                        in_contrib = false;
                        if !surname.is_empty() {
                            authors.push(Author::new(given.as_str(), surname.as_str()));
                        } else if !full_name.is_empty() {
                            authors.push(Author::from_given_first(&full_name));
                        }
                    }
                    _ => {}
                }
                current.clear();
            }
            Ok(Event::Eof) => break,
            Err(error) => {
                debug!(error = %error, "citation export XML did not parse");
                break;
            }
            Ok(_) => {}
        }
        buf.clear();
    }

    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    (authors, title, year)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::resolver::Endpoints;

    fn handler() -> DoiHandler {
        let ctx = ResolverContext::with_client(reqwest::Client::new(), Endpoints::default());
        DoiHandler::new(Arc::new(ctx), "10.1000/182".to_string())
    }

    #[test]
    fn test_doi_get_identifier_surface_forms() {
        for query in [
            "10.1000/182",
            "doi:10.1000/182",
            "DOI: 10.1000/182",
            "https://doi.org/10.1000/182",
            "http://dx.doi.org/10.1000/182",
            "doi.org/10.1000/182",
            "https://www.doi.org/10.1000/182",
        ] {
            assert_eq!(get_identifier(query).as_deref(), Some("10.1000/182"), "{query}");
        }
    }

    #[test]
    fn test_doi_get_identifier_rejects_non_doi() {
        assert_eq!(get_identifier("arxiv:2101.00001"), None);
        assert_eq!(get_identifier("banana"), None);
        assert_eq!(get_identifier("prefix 10.1000/182"), None);
    }

    #[test]
    fn test_doi_validity_requires_csl_media_type() {
        let handler = handler();
        let ok = MetaResponse {
            status: 200,
            content_type: "application/vnd.citationstyles.csl+json; charset=utf-8".to_string(),
            ..MetaResponse::default()
        };
        assert!(handler.is_meta_query_response_valid(&ok));

        let html = MetaResponse {
            content_type: "text/html".to_string(),
            ..ok.clone()
        };
        assert!(!handler.is_meta_query_response_valid(&html));

        let missing = MetaResponse { status: 404, ..ok };
        assert!(!handler.is_meta_query_response_valid(&missing));
    }

    #[test]
    fn test_parse_csl_json_end_to_end_record() {
        let body = r#"{"author":[{"given":"A","family":"Smith"}],"title":"A Study of <i>X</i>"}"#;
        let outcome = parse_csl_json("10.1000/182", body);
        let metadata = outcome.metadata().unwrap();
        assert_eq!(metadata.authors, vec![Author::new("A", "Smith")]);
        assert_eq!(metadata.title, "A Study of X");
        assert_eq!(metadata.year, "");
        assert_eq!(metadata.repo, "DOI");
        assert_eq!(metadata.id, "10.1000/182");
    }

    #[test]
    fn test_parse_csl_json_year_and_array_title() {
        let body = r#"{
            "author":[{"given":"Ada","family":"Lovelace"},{"literal":"The Consortium"}],
            "title":["Notes on the Engine"],
            "issued":{"date-parts":[[1843, 9]]}
        }"#;
        let metadata = parse_csl_json("10.1/x", body).metadata().cloned().unwrap();
        assert_eq!(metadata.title, "Notes on the Engine");
        assert_eq!(metadata.year, "1843");
        assert_eq!(metadata.authors[1], Author::new("", "The Consortium"));
    }

    #[test]
    fn test_parse_csl_json_falls_back_to_published_print() {
        let body = r#"{"author":[{"family":"X"}],"title":"T","issued":{"date-parts":[[null]]},"published-print":{"date-parts":[[2001]]}}"#;
        assert_eq!(
            parse_csl_json("10.1/x", body).metadata().unwrap().year,
            "2001"
        );
    }

    #[test]
    fn test_parse_csl_json_incomplete_cases() {
        assert_eq!(parse_csl_json("10.1/x", "not json"), MetadataOutcome::Incomplete);
        assert_eq!(
            parse_csl_json("10.1/x", r#"{"title":"No authors"}"#),
            MetadataOutcome::Incomplete
        );
        assert_eq!(
            parse_csl_json("10.1/x", r#"{"author":[{"family":"Smith"}]}"#),
            MetadataOutcome::Incomplete
        );
    }

    #[test]
    fn test_alternate_source_for_host() {
        assert_eq!(AlternateSource::for_host("www.jstor.org"), Some(AlternateSource::Jstor));
        assert_eq!(AlternateSource::for_host("aimsciences.org"), Some(AlternateSource::Aims));
        assert_eq!(
            AlternateSource::for_host("royalsocietypublishing.org"),
            Some(AlternateSource::RoyalSociety)
        );
        assert_eq!(AlternateSource::for_host("example.com"), None);
    }

    #[tokio::test]
    async fn test_metadata_from_landing_royal_society_page() {
        let landing = MetaResponse {
            status: 200,
            final_url: "https://royalsocietypublishing.org/doi/10.1098/rsta.1.0001".to_string(),
            body: r#"<meta name="dc.Title" content="Philosophical &amp; Natural Notes">
                <meta name="dc.Creator" content="Robert Hooke">
                <meta name="dc.Date" content="1965-03-06">"#
                .to_string(),
            ..MetaResponse::default()
        };
        let metadata = handler().metadata_from_landing(&landing).await;
        let metadata = metadata.metadata().unwrap();
        assert_eq!(metadata.title, "Philosophical & Natural Notes");
        assert_eq!(metadata.authors, vec![Author::new("Robert", "Hooke")]);
        assert_eq!(metadata.year, "1965");
        assert_eq!(metadata.repo, "DOI");
        assert_eq!(metadata.id, "10.1000/182");
    }

    #[tokio::test]
    async fn test_metadata_from_landing_unknown_host_is_unavailable() {
        let landing = MetaResponse {
            status: 200,
            final_url: "https://publisher.example/article/182".to_string(),
            body: r#"<meta name="dc.Title" content="Ignored">"#.to_string(),
            ..MetaResponse::default()
        };
        assert_eq!(
            handler().metadata_from_landing(&landing).await,
            MetadataOutcome::Unavailable
        );
    }

    #[tokio::test]
    async fn test_metadata_from_landing_royal_society_error_page_is_unavailable() {
        let landing = MetaResponse {
            status: 403,
            final_url: "https://royalsocietypublishing.org/doi/10.1098/x".to_string(),
            ..MetaResponse::default()
        };
        assert_eq!(
            handler().metadata_from_landing(&landing).await,
            MetadataOutcome::Unavailable
        );
    }

    #[test]
    fn test_jstor_stable_id_from_landing_url() {
        assert_eq!(
            jstor_stable_id("https://www.jstor.org/stable/10.2307/1234?seq=1").as_deref(),
            Some("10.2307/1234")
        );
        assert_eq!(jstor_stable_id("https://www.jstor.org/action/doBasicSearch"), None);
    }

    #[test]
    fn test_aims_export_url_uses_landing_host() {
        assert_eq!(
            aims_export_url("https://www.aimsciences.org/article/doi/10.3934/x", "10.3934/x")
                .as_deref(),
            Some("https://www.aimsciences.org/article/exportCitation?doi=10.3934%2Fx&format=xml")
        );
    }

    #[test]
    fn test_parse_dc_meta_tags() {
        let html = r#"<head>
            <meta name="dc.Title" content="On the Motion of Things">
            <meta name="dc.Creator" content="Isaac Newton">
            <meta name="dc.Creator" content="Edmond Halley">
            <meta name="dc.Date" content="1687-07-05">
        </head>"#;
        let (authors, title, year) = parse_dc_meta_tags(html);
        assert_eq!(title, "On the Motion of Things");
        assert_eq!(
            authors,
            vec![Author::new("Isaac", "Newton"), Author::new("Edmond", "Halley")]
        );
        assert_eq!(year, "1687");
    }

    #[test]
    fn test_parse_jats_citation() {
        let xml = r#"<?xml version="1.0"?>
            <article><front><article-meta>
              <title-group><article-title>Stability of <italic>n</italic>-body systems</article-title></title-group>
              <contrib-group>
                <contrib contrib-type="author"><name><surname>Poincare</surname><given-names>Henri</given-names></name></contrib>
                <contrib contrib-type="author"><string-name>Sofia Kovalevskaya</string-name></contrib>
              </contrib-group>
              <pub-date><year>1890</year></pub-date>
            </article-meta></front></article>"#;
        let (authors, title, year) = parse_jats_citation(xml);
        assert_eq!(title, "Stability of n-body systems");
        assert_eq!(
            authors,
            vec![Author::new("Henri", "Poincare"), Author::new("Sofia", "Kovalevskaya")]
        );
        assert_eq!(year, "1890");
    }
}
