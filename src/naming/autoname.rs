//! Autoname template rendering.
//!
//! Templates use `{placeholder}` fields; `{{` and `}}` produce literal braces.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use super::text::{authors_to_string, sanitize_filename, title_case, upper_first};
use crate::resolver::Metadata;
use crate::resolver::utils::compile_static_regex;

/// Default template used when none is configured.
pub const DEFAULT_AUTONAME_FORMAT: &str = "[{authors}, {repo} {identifier}]{title}";

/// Author list length cap used by the `authors80` placeholder.
const AUTHORS_CUTOFF_CHARS: usize = 80;

const ET_AL: &str = ", et al.";

/// Every placeholder an autoname template may reference.
pub const PLACEHOLDERS: [&str; 12] = [
    "repo",
    "authors",
    "authorEtAl",
    "authors80",
    "authorFamily",
    "authorFamilyCamel",
    "title",
    "title_",
    "titleCamel",
    "identifier",
    "year",
    "year2",
];

static TITLE_WORD_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"[ ,\-]+"));

/// Errors raised while rendering an autoname template.
///
/// Both variants are recoverable; callers fall back to the remote filename.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AutonameError {
    /// The template references a field outside [`PLACEHOLDERS`].
    #[error("unknown autoname placeholder '{{{name}}}'; suggestion: use one of: {}", PLACEHOLDERS.join(", "))]
    UnknownPlaceholder {
        /// Placeholder name as written in the template.
        name: String,
    },

    /// The template itself is malformed.
    #[error("invalid autoname template '{template}': {reason}")]
    InvalidTemplate {
        /// The offending template.
        template: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl AutonameError {
    fn invalid(template: &str, reason: &str) -> Self {
        Self::InvalidTemplate {
            template: template.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Builds a sanitized filename stem from metadata and a template.
///
/// # Errors
///
/// Returns [`AutonameError::UnknownPlaceholder`] for fields outside
/// [`PLACEHOLDERS`] and [`AutonameError::InvalidTemplate`] for unbalanced
/// braces, positional or formatted fields, or an empty result.
pub fn autoname(metadata: &Metadata, template: &str) -> Result<String, AutonameError> {
    let fields = placeholder_values(metadata);
    debug!(?fields, "available autoname fields (not sanitized)");

    let rendered = render_template(template, &fields)?;
    let sanitized = sanitize_filename(&rendered);
    if sanitized.is_empty() {
        return Err(AutonameError::invalid(template, "template produced an empty filename"));
    }
    Ok(sanitized)
}

/// Computes the value of every placeholder for `metadata`.
#[must_use]
pub fn placeholder_values(metadata: &Metadata) -> BTreeMap<&'static str, String> {
    let authors = &metadata.authors;
    let doc_title = title_case(&metadata.title);
    let title_words: Vec<String> = TITLE_WORD_SPLIT_RE
        .split(&doc_title)
        .filter(|word| !word.is_empty())
        .map(upper_first)
        .collect();

    let mut author_et_al = authors_to_string(&authors[..authors.len().min(3)]);
    if authors.len() > 3 {
        author_et_al.push_str(ET_AL);
    }

    let year2 = metadata
        .year
        .char_indices()
        .rev()
        .nth(1)
        .map_or_else(|| metadata.year.clone(), |(index, _)| metadata.year[index..].to_string());

    BTreeMap::from([
        ("repo", metadata.repo.to_lowercase()),
        ("authors", authors_to_string(authors)),
        ("authorEtAl", author_et_al),
        ("authors80", authors_cutoff(metadata)),
        (
            "authorFamily",
            authors
                .iter()
                .map(|author| author.family.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        ),
        (
            "authorFamilyCamel",
            authors.iter().map(|author| upper_first(&author.family)).collect(),
        ),
        ("title", doc_title.clone()),
        ("title_", title_words.join("_")),
        ("titleCamel", title_words.concat()),
        ("identifier", metadata.id.replace('/', "@")),
        ("year", metadata.year.clone()),
        ("year2", year2),
    ])
}

/// Greedily appends authors while the list stays within the cutoff.
fn authors_cutoff(metadata: &Metadata) -> String {
    let Some((first, rest)) = metadata.authors.split_first() else {
        return String::new();
    };
    let mut cutoff = authors_to_string(std::slice::from_ref(first));
    for author in rest {
        let proposed = format!(
            "{cutoff}, {}",
            authors_to_string(std::slice::from_ref(author))
        );
        if proposed.chars().count() > AUTHORS_CUTOFF_CHARS {
            cutoff.push_str(ET_AL);
            break;
        }
        cutoff = proposed;
    }
    cutoff
}

fn render_template(
    template: &str,
    fields: &BTreeMap<&'static str, String>,
) -> Result<String, AutonameError> {
    let mut out = String::with_capacity(template.len() * 2);
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => {
                            return Err(AutonameError::invalid(template, "unbalanced '{'"));
                        }
                        Some(other) => name.push(other),
                    }
                }
                if name.is_empty() {
                    return Err(AutonameError::invalid(
                        template,
                        "empty placeholder '{}' is not allowed",
                    ));
                }
                if name.contains([':', '!', '.', '[']) {
                    return Err(AutonameError::invalid(
                        template,
                        "format specifiers and field access are not supported",
                    ));
                }
                let value = fields
                    .get(name.as_str())
                    .ok_or(AutonameError::UnknownPlaceholder { name })?;
                out.push_str(value);
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(AutonameError::invalid(template, "single '}' encountered")),
            other => out.push(other),
        }
    }

    Ok(out)
}
