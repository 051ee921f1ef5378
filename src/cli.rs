//! CLI argument definitions using clap derive macros.
//!
//! Options that the config file can also set are `Option`s here so the
//! merge can tell an explicit command-line value from an absent one.

use std::path::PathBuf;

use clap::Parser;

use shdl_core::resolver::RepoKind;

/// Resolve a paper identifier through mirror sites and download the document.
///
/// IDENTIFIER may be a DOI, an arXiv ID, a PMID, or a JSTOR, IEEE or
/// ScienceDirect URL or ID. Anything unrecognized is tried as a DOI.
#[derive(Parser, Debug)]
#[command(name = "shdl")]
#[command(author, version, about)]
pub struct Args {
    /// Identifier or URL of the document (percent-encoding is decoded)
    #[arg(value_name = "IDENTIFIER")]
    pub identifier: String,

    /// Mirror base URL; repeat to try several in order
    #[arg(short = 'm', long = "mirror", value_name = "URL")]
    pub mirrors: Vec<String>,

    /// Proxy for all requests (`tor`, `tbb` and `nop` are shorthands)
    #[arg(short = 'p', long, value_name = "URL")]
    pub proxy: Option<String>,

    /// Output filename stem; the extension follows the download URL
    #[arg(short = 'o', long, value_name = "STEM")]
    pub output: Option<String>,

    /// Download directory (must exist)
    #[arg(short = 'd', long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Write buffer size in bytes
    #[arg(long, value_name = "BYTES", value_parser = clap::value_parser!(u64).range(1..))]
    pub chunk: Option<u64>,

    /// User-Agent header for every request
    #[arg(long = "useragent", value_name = "UA")]
    pub user_agent: Option<String>,

    /// Name the file from the document's metadata
    #[arg(long)]
    pub autoname: bool,

    /// Template for --autoname, e.g. "[{authors}, {repo} {identifier}]{title}"
    #[arg(long, value_name = "FMT")]
    pub autoformat: Option<String>,

    /// Skip detection and treat IDENTIFIER as a bare identifier of this repository
    /// (doi, arxiv, jstor, ieee, pmid, sciencedirect)
    #[arg(long = "type", value_name = "REPO")]
    pub repo_type: Option<RepoKind>,

    /// Resolve everything but write nothing
    #[arg(long = "dryrun")]
    pub dry_run: bool,

    /// Silence logs and print only the absolute output path on success
    #[arg(long)]
    pub piping: bool,

    /// Disable ANSI colours
    #[arg(long = "nocolor")]
    pub no_color: bool,

    /// Config file path; an empty value disables config loading
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: Option<u64>,

    /// Skip the connectivity probe before resolving
    #[arg(long)]
    pub no_network_check: bool,

    /// Increase output verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_minimal_args_parse() {
        let args = Args::try_parse_from(["shdl", "10.1000/182"]).unwrap();
        assert_eq!(args.identifier, "10.1000/182");
        assert!(args.mirrors.is_empty());
        assert!(args.proxy.is_none());
        assert!(args.chunk.is_none());
        assert!(!args.autoname);
        assert!(!args.dry_run);
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn test_cli_identifier_is_required() {
        let err = Args::try_parse_from(["shdl"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_mirror_flag_repeats_in_order() {
        let args = Args::try_parse_from([
            "shdl",
            "-m",
            "https://m1.example",
            "--mirror",
            "m2.example",
            "10.1000/182",
        ])
        .unwrap();
        assert_eq!(args.mirrors, vec!["https://m1.example", "m2.example"]);
    }

    #[test]
    fn test_cli_all_options_parse() {
        let args = Args::try_parse_from([
            "shdl",
            "-p",
            "tor",
            "-o",
            "paper",
            "-d",
            "/tmp",
            "--chunk",
            "4096",
            "--useragent",
            "UA/1.0",
            "--autoname",
            "--autoformat",
            "{title}",
            "--dryrun",
            "--piping",
            "--nocolor",
            "--config",
            "",
            "--timeout",
            "5",
            "--no-network-check",
            "-vv",
            "pmid:31452104",
        ])
        .unwrap();
        assert_eq!(args.proxy.as_deref(), Some("tor"));
        assert_eq!(args.output.as_deref(), Some("paper"));
        assert_eq!(args.dir, Some(PathBuf::from("/tmp")));
        assert_eq!(args.chunk, Some(4096));
        assert_eq!(args.user_agent.as_deref(), Some("UA/1.0"));
        assert!(args.autoname);
        assert_eq!(args.autoformat.as_deref(), Some("{title}"));
        assert!(args.dry_run && args.piping && args.no_color && args.no_network_check);
        assert_eq!(args.config.as_deref(), Some(""));
        assert_eq!(args.timeout, Some(5));
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_type_accepts_registered_names_only() {
        let args = Args::try_parse_from(["shdl", "--type", "arxiv", "2101.00001"]).unwrap();
        assert_eq!(args.repo_type, Some(RepoKind::Arxiv));

        let args = Args::try_parse_from(["shdl", "--type", "sciencedirect", "S01"]).unwrap();
        assert_eq!(args.repo_type, Some(RepoKind::ScienceDirect));

        let err = Args::try_parse_from(["shdl", "--type", "scopus", "x"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_rejects_non_numeric_chunk() {
        let err = Args::try_parse_from(["shdl", "--chunk", "big", "x"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        let err = Args::try_parse_from(["shdl", "--chunk", "0", "x"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["shdl", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["shdl", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
