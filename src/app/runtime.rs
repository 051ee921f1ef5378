//! One run of the pipeline: config, connectivity probe, resolution, naming
//! and the file fetch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, info, warn};

use shdl_core::download::{FetchOptions, FetchOutcome, Fetcher, output_path};
use shdl_core::naming::autoname;
use shdl_core::resolver::{
    Endpoints, HandlerRegistry, Resolution, ResolverContext, build_download_http_client,
    build_resolver_http_client,
};

use crate::app::config_manager::{self, RunConfig};
use crate::app::exit_handler::{ProcessExit, RunFailure, report_failure};
use crate::app::terminal;
use crate::cli::Args;

const CONNECTIVITY_PROBE_URL: &str = "https://example.com/";

/// Runs the whole pipeline for parsed CLI args and returns the exit kind.
pub(crate) async fn run(args: Args) -> ProcessExit {
    let loaded = config_manager::load_file_config(&args);

    let file_no_color = loaded
        .as_ref()
        .ok()
        .and_then(Option::as_ref)
        .and_then(|cfg| cfg.no_color)
        .unwrap_or(false);
    let default_level = terminal::resolve_default_log_level(args.verbose, args.piping);
    let no_color = terminal::is_no_color_requested(args.no_color || file_no_color);
    terminal::init_tracing(default_level, args.piping, no_color);

    let file_config = match loaded {
        Ok(cfg) => cfg,
        Err(error) => {
            warn!(error = format!("{error:#}"), "ignoring config file; using command-line values");
            None
        }
    };

    let config = match config_manager::resolve_config(&args, file_config.as_ref()) {
        Ok(config) => config,
        Err(error) => {
            let failure = RunFailure::new(ProcessExit::ArgInvalid, error);
            report_failure(&failure, args.piping);
            return failure.exit;
        }
    };
    debug!(?config, "run configuration resolved");

    match run_with_config(&config, Endpoints::default()).await {
        Ok(path) => {
            if config.piping {
                println!("{}", path.display());
            }
            ProcessExit::Success
        }
        Err(failure) => {
            report_failure(&failure, config.piping);
            failure.exit
        }
    }
}

/// Resolves and fetches the document; returns the absolute target path.
pub(crate) async fn run_with_config(
    config: &RunConfig,
    endpoints: Endpoints,
) -> Result<PathBuf, RunFailure> {
    let settings = config.http_settings();
    let client = build_resolver_http_client(&settings)?;

    if config.network_check {
        check_connectivity(&client).await?;
    }

    let ctx = Arc::new(ResolverContext::with_client(client, endpoints));
    let registry = HandlerRegistry::new(ctx);
    let resolution = registry
        .resolve(&config.query, config.repo_type, &config.mirrors)
        .await?;
    info!(
        repo = resolution.repo_name,
        identifier = %resolution.identifier,
        url = %resolution.download_url,
        "document resolved"
    );

    let stem = choose_stem(config, &resolution);
    let target = output_path(&config.dir, stem.as_deref(), &resolution.download_url);

    let fetcher = Fetcher::new(
        build_download_http_client(&settings)?,
        FetchOptions {
            chunk_size: config.chunk_size,
            dry_run: config.dry_run,
            show_progress: !config.piping,
        },
    );
    let outcome = fetcher
        .fetch_to_path(&resolution.download_url, &target)
        .await?;
    match &outcome {
        FetchOutcome::Written { path, bytes } => {
            info!(path = %path.display(), bytes, "document saved");
        }
        FetchOutcome::DryRun(path) => info!(path = %path.display(), "dry run complete"),
    }

    Ok(absolute_path(outcome.path()))
}

async fn check_connectivity(client: &reqwest::Client) -> Result<(), RunFailure> {
    debug!(url = CONNECTIVITY_PROBE_URL, "checking network connectivity");
    client
        .get(CONNECTIVITY_PROBE_URL)
        .send()
        .await
        .map(|_| ())
        .map_err(|error| {
            RunFailure::new(
                ProcessExit::NetworkError,
                anyhow!("network check failed ({error}); check the connection or proxy, or pass --no-network-check"),
            )
        })
}

/// `--output` first, then the autoname when enabled and metadata exists.
/// `None` lets the download URL's filename stand.
fn choose_stem(config: &RunConfig, resolution: &Resolution) -> Option<String> {
    if let Some(output) = &config.output {
        return Some(output.clone());
    }
    if !config.autoname {
        return None;
    }
    let Some(metadata) = resolution.metadata.metadata() else {
        warn!("no metadata available for autoname; keeping the remote filename");
        return None;
    };
    match autoname(metadata, &config.autoformat) {
        Ok(name) => Some(name),
        Err(error) => {
            warn!(%error, "autoname failed; keeping the remote filename");
            None
        }
    }
}

fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
