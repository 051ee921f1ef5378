//! Error types for resolver operations.
//!
//! This module defines structured errors for identifier resolution,
//! following the What/Why/Fix pattern used across the project.
//! Metadata failures are not errors; they surface as
//! [`MetadataOutcome`](super::MetadataOutcome) variants instead.

use thiserror::Error;

/// Fatal errors of the resolution pipeline.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// No handler recognized the query, not even as a bare DOI.
    #[error("query '{input}' is not a recognizable identifier; suggestion: {suggestion}")]
    QueryInvalid {
        /// The raw query.
        input: String,
        /// How to fix the issue
        suggestion: String,
    },

    /// The repository needs a mirror but none is configured.
    #[error("no mirror configured for {repo} identifier '{identifier}'; suggestion: {suggestion}")]
    NoMirrorConfigured {
        /// Repository display name.
        repo: String,
        /// The resolved identifier.
        identifier: String,
        /// How to fix the issue
        suggestion: String,
    },

    /// Every mirror was tried and none produced a download link.
    #[error(
        "no download link found for '{identifier}': tried {tried_count} mirror(s); suggestion: Check the identifier or try a different mirror"
    )]
    FileNotFound {
        /// The resolved identifier.
        identifier: String,
        /// Number of mirrors that were tried.
        tried_count: usize,
    },

    /// `--type` named a repository that is not registered.
    #[error("unknown repository type '{name}'; suggestion: {suggestion}")]
    UnknownRepoType {
        /// The unrecognized name.
        name: String,
        /// How to fix the issue
        suggestion: String,
    },

    /// HTTP client could not be built (usually a malformed proxy URL).
    #[error("HTTP client setup failed: {reason}; suggestion: {suggestion}")]
    ClientSetup {
        /// Why construction failed
        reason: String,
        /// How to fix the issue
        suggestion: String,
    },
}

impl ResolveError {
    /// Creates a `QueryInvalid` error.
    #[must_use]
    pub fn query_invalid(input: &str) -> Self {
        Self::QueryInvalid {
            input: input.to_string(),
            suggestion: "Pass a DOI, arXiv ID, PMID, or a JSTOR/IEEE/ScienceDirect URL or ID"
                .to_string(),
        }
    }

    /// Creates a `NoMirrorConfigured` error.
    #[must_use]
    pub fn no_mirror(repo: &str, identifier: &str) -> Self {
        Self::NoMirrorConfigured {
            repo: repo.to_string(),
            identifier: identifier.to_string(),
            suggestion: "Add a mirror with --mirror <URL> or a `mirror=` line in the config file"
                .to_string(),
        }
    }

    /// Creates a `FileNotFound` error.
    #[must_use]
    pub fn file_not_found(identifier: &str, tried_count: usize) -> Self {
        Self::FileNotFound {
            identifier: identifier.to_string(),
            tried_count,
        }
    }

    /// Creates an `UnknownRepoType` error.
    #[must_use]
    pub fn unknown_repo_type(name: &str) -> Self {
        Self::UnknownRepoType {
            name: name.to_string(),
            suggestion: "Use one of: doi, arxiv, jstor, ieee, pmid, sciencedirect".to_string(),
        }
    }

    /// Creates a `ClientSetup` error.
    #[must_use]
    pub fn client_setup(reason: &str) -> Self {
        Self::ClientSetup {
            reason: reason.to_string(),
            suggestion: "Check the proxy URL (e.g. socks5h://127.0.0.1:9050, or tor / tbb / nop)"
                .to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_error_query_invalid_message() {
        let err = ResolveError::query_invalid("   ");
        let msg = err.to_string();
        assert!(msg.contains("not a recognizable identifier"));
        assert!(msg.contains("; suggestion: "), "should have suggestion");
    }

    #[test]
    fn test_resolve_error_no_mirror_message() {
        let err = ResolveError::no_mirror("DOI", "10.1000/182");
        let msg = err.to_string();
        assert!(msg.contains("DOI"), "should contain repo");
        assert!(msg.contains("10.1000/182"), "should contain identifier");
        assert!(msg.contains("--mirror"), "suggestion should mention --mirror");
    }

    #[test]
    fn test_resolve_error_file_not_found_message() {
        let err = ResolveError::file_not_found("10.1000/182", 3);
        let msg = err.to_string();
        assert!(msg.contains("3 mirror(s)"), "should contain tried count");
        assert!(msg.contains("10.1000/182"), "should contain identifier");
    }

    #[test]
    fn test_resolve_error_unknown_repo_type_message() {
        let err = ResolveError::unknown_repo_type("scopus");
        let msg = err.to_string();
        assert!(msg.contains("scopus"));
        assert!(msg.contains("sciencedirect"), "should list accepted names");
    }

    #[test]
    fn test_resolve_error_clone() {
        let err = ResolveError::client_setup("bad proxy");
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
