//! Default User-Agent string shared by every HTTP client of a run.
//!
//! Mirror sites and publisher pages commonly reject non-browser agents, so
//! the default mimics a desktop Firefox release. `--useragent` or the
//! `useragent` config key replaces it.

const FIREFOX_78_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:78.0) Gecko/20100101 Firefox/78.0";

/// Default User-Agent header value.
#[must_use]
pub(crate) fn default_user_agent() -> &'static str {
    FIREFOX_78_UA
}
