//! Configuration lifecycle: load the config file, merge CLI overrides and
//! validate the result into one [`RunConfig`].
//!
//! Precedence is CLI value, then config file, then built-in default. Mirrors
//! given on the command line replace the config file's mirror list.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::debug;

use shdl_core::download::DEFAULT_CHUNK_SIZE;
use shdl_core::naming::DEFAULT_AUTONAME_FORMAT;
use shdl_core::resolver::{DEFAULT_TIMEOUT_SECS, HttpSettings, RepoKind, expand_proxy_alias};

use crate::app::config_file::{self, FileConfig};
use crate::cli::Args;

/// Everything one run needs, built once and passed by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunConfig {
    /// Percent-decoded query.
    pub(crate) query: String,
    pub(crate) repo_type: Option<RepoKind>,
    /// Normalized mirror bases, in try order.
    pub(crate) mirrors: Vec<String>,
    /// Expanded proxy URL; `None` connects directly.
    pub(crate) proxy: Option<String>,
    pub(crate) output: Option<String>,
    pub(crate) dir: PathBuf,
    pub(crate) chunk_size: usize,
    pub(crate) user_agent: String,
    pub(crate) autoname: bool,
    pub(crate) autoformat: String,
    pub(crate) dry_run: bool,
    pub(crate) piping: bool,
    pub(crate) timeout_secs: u64,
    pub(crate) network_check: bool,
}

impl RunConfig {
    /// Network settings for the resolver and download clients.
    pub(crate) fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            user_agent: self.user_agent.clone(),
            proxy: self.proxy.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

/// Loads the config file named by `--config` (or the default one).
///
/// An empty `--config` disables loading; a missing default file is not an
/// error.
///
/// # Errors
///
/// Fails when the file cannot be read or parsed. Callers report the
/// failure and continue with command-line values.
pub(crate) fn load_file_config(args: &Args) -> Result<Option<FileConfig>> {
    match args.config.as_deref() {
        Some("") => {
            debug!("config file loading disabled");
            Ok(None)
        }
        Some(path) => config_file::load_file_config(Path::new(path)).map(Some),
        None => config_file::load_default_file_config(),
    }
}

/// Merges CLI args over file values and validates the result.
///
/// # Errors
///
/// Fails when the download directory does not exist or a numeric value
/// does not fit the platform.
pub(crate) fn resolve_config(args: &Args, file: Option<&FileConfig>) -> Result<RunConfig> {
    let file = file.cloned().unwrap_or_default();

    let raw_mirrors = if args.mirrors.is_empty() {
        file.mirrors
    } else {
        args.mirrors.clone()
    };
    let mirrors = raw_mirrors
        .iter()
        .map(|mirror| normalize_mirror(mirror))
        .filter(|mirror| !mirror.is_empty())
        .collect();

    let proxy = args
        .proxy
        .as_deref()
        .or(file.proxy.as_deref())
        .and_then(expand_proxy_alias);

    let dir = args
        .dir
        .clone()
        .or(file.dir)
        .map_or_else(|| PathBuf::from("."), |dir| expand_home(&dir));
    if !dir.is_dir() {
        bail!(
            "download directory '{}' does not exist or is not a directory",
            dir.display()
        );
    }

    let chunk_size = match args.chunk.or(file.chunk) {
        Some(chunk) => usize::try_from(chunk).context("chunk size out of range")?,
        None => DEFAULT_CHUNK_SIZE,
    };

    let query = urlencoding::decode(&args.identifier)
        .map_or_else(|_| args.identifier.clone(), std::borrow::Cow::into_owned);

    Ok(RunConfig {
        query,
        repo_type: args.repo_type,
        mirrors,
        proxy,
        output: args.output.clone(),
        dir,
        chunk_size,
        user_agent: args
            .user_agent
            .clone()
            .or(file.user_agent)
            .unwrap_or_else(|| HttpSettings::default().user_agent),
        autoname: args.autoname || file.autoname.unwrap_or(false),
        autoformat: args
            .autoformat
            .clone()
            .or(file.autoformat)
            .unwrap_or_else(|| DEFAULT_AUTONAME_FORMAT.to_string()),
        dry_run: args.dry_run,
        piping: args.piping,
        timeout_secs: args
            .timeout
            .or(file.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS),
        network_check: !args.no_network_check,
    })
}

/// Trims the mirror and forces `https://` when it has no scheme.
pub(crate) fn normalize_mirror(raw: &str) -> String {
    let mirror = raw.trim();
    if mirror.is_empty() || mirror.contains("://") {
        mirror.to_string()
    } else {
        format!("https://{}", mirror.trim_start_matches('/'))
    }
}

/// Expands a leading `~` to `$HOME`.
fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME").filter(|home| !home.is_empty()) {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}
