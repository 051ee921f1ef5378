//! DOI mirror resolution: mirror probing, document-page query and link scraping.
//!
//! Every handler except arXiv derives its download link through
//! [`DoiMirrorResolver`], passing the identifier it wants the mirror to look
//! up (its own identifier or a DOI discovered in its metadata).

use std::sync::LazyLock;

use regex::Regex;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info, warn};
use url::Url;

use super::MetaResponse;
use super::utils::{absolutize_url, compile_static_regex};

/// Marker every candidate line must contain.
const DOWNLOAD_MARKER: &str = "download=true";

/// Inline redirect script embedded in mirror document pages.
static DOWNLOAD_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"location\.href=.?'(.+?)\?.*?download=true"));

/// How the document page is requested from a mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorQuery {
    /// `GET {mirror}/{identifier}`.
    Get(String),
    /// `POST {mirror}` with form field `request={identifier}`.
    PostRequest(String),
}

impl MirrorQuery {
    fn identifier(&self) -> &str {
        match self {
            Self::Get(id) | Self::PostRequest(id) => id,
        }
    }
}

/// Link chosen from a mirror page, with every candidate the page offered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadLink {
    /// Link used for the download.
    pub url: String,
    /// Every link found, in page order; the first one is `url`.
    pub candidates: Vec<String>,
}

impl DownloadLink {
    /// A link that had no competing candidates.
    #[must_use]
    pub fn single(url: String) -> Self {
        Self {
            candidates: vec![url.clone()],
            url,
        }
    }

    /// True when the page offered more than one link.
    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        self.candidates.len() > 1
    }
}

/// Probes mirrors and scrapes download links from their document pages.
#[derive(Debug, Clone)]
pub struct DoiMirrorResolver {
    client: Client,
}

impl DoiMirrorResolver {
    /// Creates a resolver sharing the run's HTTP client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Derives a download URL for `query` through `mirror_link`.
    ///
    /// Returns `None` when the mirror is down, answers with something other
    /// than a non-empty HTML page, or the page has no download link. Never
    /// fails; the caller moves on to the next mirror.
    #[tracing::instrument(skip(self), fields(mirror = %mirror_link))]
    pub async fn get_download_url(
        &self,
        mirror_link: &str,
        query: MirrorQuery,
    ) -> Option<DownloadLink> {
        if !self.probe(mirror_link).await {
            return None;
        }

        let request = match &query {
            MirrorQuery::Get(id) => {
                let url = format!("{}/{id}", mirror_link.trim_end_matches('/'));
                debug!(url = %url, "querying mirror document page");
                self.client.get(url)
            }
            MirrorQuery::PostRequest(id) => {
                debug!(identifier = %id, "posting identifier to mirror");
                self.client
                    .post(mirror_link)
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(format!("request={}", urlencoding::encode(id)))
            }
        };

        let response = match request.send().await {
            Ok(response) => MetaResponse::read(response).await,
            Err(error) => {
                warn!(error = %error, "mirror query failed");
                return None;
            }
        };

        if !response.content_type_starts_with("text/html") || response.body.trim().is_empty() {
            info!(
                identifier = query.identifier(),
                content_type = %response.content_type,
                "mirror returned no result"
            );
            return None;
        }

        let candidates = extract_candidate_links(&response.body, mirror_link);
        let Some(first) = candidates.first().cloned() else {
            info!(identifier = query.identifier(), "no download link on mirror page");
            return None;
        };
        let link = DownloadLink {
            url: first,
            candidates,
        };
        if link.is_ambiguous() {
            warn!(
                count = link.candidates.len(),
                candidates = ?link.candidates,
                "multiple download links found; using the first"
            );
        }
        Some(link)
    }

    /// Returns true when the mirror answers its base URL with 200.
    async fn probe(&self, mirror_link: &str) -> bool {
        match self.client.get(mirror_link).send().await {
            Ok(response) if response.status().as_u16() == 200 => true,
            Ok(response) => {
                warn!(status = response.status().as_u16(), "mirror is not reachable");
                false
            }
            Err(error) => {
                warn!(error = %error, "mirror is not reachable");
                false
            }
        }
    }
}

/// Scans every `download=true` line of a mirror page for redirect links.
///
/// Candidates keep page order. Each one is unescaped, made absolute against
/// `mirror_link` and stripped of its fragment.
#[must_use]
pub fn extract_candidate_links(body: &str, mirror_link: &str) -> Vec<String> {
    let base = Url::parse(mirror_link).ok();
    body.lines()
        .filter(|line| line.contains(DOWNLOAD_MARKER))
        .filter_map(|line| DOWNLOAD_LINK_RE.captures(line))
        .filter_map(|caps| normalize_link(&caps[1], base.as_ref()))
        .collect()
}

fn normalize_link(raw: &str, base: Option<&Url>) -> Option<String> {
    let unescaped = raw.replace("\\/", "/").replace("\\\\", "\\");
    let link = unescaped.trim();
    if link.is_empty() {
        return None;
    }

    let absolute = if link.starts_with("//") || link.contains("://") {
        base.map_or_else(|| Some(format!("https:{link}")), |base| absolutize_url(link, base))?
    } else if link.starts_with('/') {
        absolutize_url(link, base?)?
    } else {
        format!("https://{link}")
    };

    let without_fragment = absolute
        .split_once('#')
        .map_or(absolute.as_str(), |(before, _)| before);
    Some(without_fragment.to_string())
}
