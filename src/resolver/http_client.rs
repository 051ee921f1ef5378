//! Shared HTTP client construction policy.
//!
//! This module centralizes networking defaults so metadata lookups, mirror
//! queries and file downloads stay consistent on timeout, user-agent,
//! compression, proxy and cookie handling.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use reqwest::{Client, ClientBuilder, Proxy};
use tracing::{debug, warn};

use crate::user_agent;

use super::ResolveError;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const TOR_PROXY: &str = "socks5h://127.0.0.1:9050";
const TOR_BROWSER_PROXY: &str = "socks5h://127.0.0.1:9150";

/// Network settings shared by every client of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    /// User-Agent header sent with every request.
    pub user_agent: String,
    /// Proxy URL; `None` connects directly.
    pub proxy: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: user_agent::default_user_agent().to_string(),
            proxy: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Expands proxy shorthands: `tor`, `tbb`, and `nop` (no proxy).
#[must_use]
pub fn expand_proxy_alias(raw: &str) -> Option<String> {
    match raw.trim() {
        "" | "nop" => None,
        "tor" => Some(TOR_PROXY.to_string()),
        "tbb" => Some(TOR_BROWSER_PROXY.to_string()),
        other => Some(other.to_string()),
    }
}

/// Builds the client used for metadata requests and mirror queries.
///
/// # Errors
///
/// Returns [`ResolveError::ClientSetup`] when the proxy URL is invalid or
/// client construction fails.
pub fn build_resolver_http_client(settings: &HttpSettings) -> Result<Client, ResolveError> {
    build_client(settings, TimeoutMode::Total)
}

/// Builds the client used for streaming the document to disk.
///
/// The timeout applies per read so large files are not cut off.
///
/// # Errors
///
/// Returns [`ResolveError::ClientSetup`] when the proxy URL is invalid or
/// client construction fails.
pub fn build_download_http_client(settings: &HttpSettings) -> Result<Client, ResolveError> {
    build_client(settings, TimeoutMode::PerRead)
}

#[derive(Debug, Clone, Copy)]
enum TimeoutMode {
    Total,
    PerRead,
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn build_client(settings: &HttpSettings, mode: TimeoutMode) -> Result<Client, ResolveError> {
    debug!(proxy = ?settings.proxy, timeout_secs = settings.timeout_secs, ?mode, "building HTTP client");
    match try_build_client(settings, mode, false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // Some sandboxed environments panic when querying system proxy
            // settings; retry without the system lookup.
            warn!("HTTP client hit system proxy panic; using env-proxy fallback builder");
            match try_build_client(settings, mode, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Panic) => Err(ResolveError::client_setup(
                    "HTTP client construction panicked while initializing networking",
                )),
                Err(BuildClientFailure::Build(error)) => Err(ResolveError::client_setup(
                    &format!("HTTP client construction failed: {error}"),
                )),
            }
        }
        Err(BuildClientFailure::Build(error)) => Err(ResolveError::client_setup(&format!(
            "HTTP client construction failed: {error}"
        ))),
    }
}

fn try_build_client(
    settings: &HttpSettings,
    mode: TimeoutMode,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    catch_unwind(AssertUnwindSafe(|| {
        let mut builder = base_builder(settings, mode);
        if let Some(proxy) = settings.proxy.as_deref() {
            let proxy = Proxy::all(proxy).map_err(BuildClientFailure::Build)?;
            builder = builder.proxy(proxy);
        } else if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_builder(settings: &HttpSettings, mode: TimeoutMode) -> ClientBuilder {
    let timeout = Duration::from_secs(settings.timeout_secs.max(1));
    let builder = Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(timeout))
        .user_agent(settings.user_agent.clone())
        .cookie_store(true)
        .gzip(true);
    match mode {
        TimeoutMode::Total => builder.timeout(timeout),
        TimeoutMode::PerRead => builder.read_timeout(timeout),
    }
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = env_proxy_for_scheme("https")
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = env_proxy_for_scheme("http")
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    match scheme {
        "https" => find_first_proxy_var(&["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"]),
        "http" => find_first_proxy_var(&["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"]),
        _ => None,
    }
}

fn find_first_proxy_var(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
