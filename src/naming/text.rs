//! String transforms used to build human-readable filenames from metadata.
//!
//! All functions here are pure; they never touch the network or filesystem.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::resolver::Author;
use crate::resolver::utils::compile_static_regex;

/// Characters that are illegal in filenames on at least one supported platform.
const ILLEGAL_FILENAME_CHARS: [char; 9] = ['/', '<', '>', ':', '"', '\\', '|', '?', '*'];

/// Mojibake of a UTF-8 right single quote decoded as Windows-1252.
const MOJIBAKE_APOSTROPHE: &str = "\u{e2}\u{20ac}\u{2122}";

static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"</?.+?>"));
static TITLE_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"[ \-]\b"));

/// Lower-cased inside titles unless they open the title.
const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "did", "do", "does", "doing", "don", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "here", "how", "if", "in", "into", "is",
    "just", "more", "most", "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or",
    "other", "out", "over", "own", "s", "same", "should", "so", "some", "such", "t", "than",
    "that", "the", "then", "there", "these", "this", "those", "through", "to", "too", "under",
    "until", "up", "very", "was", "were", "what", "when", "where", "which", "while", "who",
    "whom", "why", "will", "with", "without",
];

/// Turns an arbitrary string into a filename-safe ASCII string.
///
/// The text is NFKD-normalized first so compatibility forms such as `／`
/// decompose before the check. Illegal characters then become spaces,
/// anything outside ASCII is dropped and whitespace runs collapse to a single
/// space. Applying it twice yields the same result as applying it once.
#[must_use]
pub fn sanitize_filename(proposed: &str) -> String {
    let ascii: String = proposed
        .replace(MOJIBAKE_APOSTROPHE, "'")
        .nfkd()
        .map(|c| if ILLEGAL_FILENAME_CHARS.contains(&c) { ' ' } else { c })
        .filter(char::is_ascii)
        .collect();
    ascii.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Formats authors as `G. Family, G. H. Family`.
#[must_use]
pub fn authors_to_string(authors: &[Author]) -> String {
    authors
        .iter()
        .map(format_author)
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_author(author: &Author) -> String {
    let initials = abbreviate_given_name(&sanitize_filename(&author.given));
    let family = sanitize_filename(&author.family);
    if initials.is_empty() {
        family
    } else {
        format!("{initials} {family}")
    }
}

/// Abbreviates every alphabetic run of a given name to its first letter plus `.`.
///
/// Separators are preserved (`Jean-Luc` -> `J.-L.`), and a `.` that already
/// follows a run is absorbed so `J.` stays `J.`.
fn abbreviate_given_name(given: &str) -> String {
    let mut out = String::with_capacity(given.len());
    let mut chars = given.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_alphabetic() {
            out.push(c);
            out.push('.');
            while chars.peek().is_some_and(|next| next.is_alphabetic()) {
                chars.next();
            }
            if chars.peek() == Some(&'.') {
                chars.next();
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Unescapes HTML entities, strips markup tags and spells out math symbols.
///
/// `α ≤ β` becomes `α  Less-Than Or Equal To β`; only characters of the
/// Unicode "math symbol" category are expanded.
#[must_use]
pub fn convert_math_symbols(raw_title: &str) -> String {
    let unescaped = html_escape::decode_html_entities(raw_title);
    let stripped = HTML_TAG_RE.replace_all(&unescaped, "");
    let mut out = String::with_capacity(stripped.len());
    for c in stripped.chars() {
        match unicode_names2::name(c) {
            Some(name) if !c.is_ascii() && is_math_symbol(c) => {
                out.push(' ');
                out.push_str(&title_case_name(&name.to_string()));
            }
            _ => out.push(c),
        }
    }
    out
}

/// Title-cases a sanitized title.
///
/// The first word is capitalized unless it is already all caps; later words
/// are lower-cased when they are stopwords, kept when all caps and
/// capitalized otherwise. Single-word titles are returned sanitized but
/// otherwise untouched.
#[must_use]
pub fn title_case(raw_title: &str) -> String {
    let sanitized = sanitize_filename(raw_title);
    let tokens = split_keeping_separators(&sanitized);
    if tokens.len() <= 1 {
        return sanitized;
    }

    let mut out = String::with_capacity(sanitized.len());
    for (index, token) in tokens.iter().enumerate() {
        if index == 0 {
            if is_all_caps(token) {
                out.push_str(token);
            } else {
                out.push_str(&capitalize(token));
            }
            continue;
        }
        let lower = token.to_lowercase();
        if STOPWORDS.contains(&lower.as_str()) {
            out.push_str(&lower);
        } else if is_all_caps(token) {
            out.push_str(token);
        } else {
            out.push_str(&capitalize(token));
        }
    }
    out
}

fn split_keeping_separators(value: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut last = 0;
    for found in TITLE_SPLIT_RE.find_iter(value) {
        tokens.push(&value[last..found.start()]);
        tokens.push(found.as_str());
        last = found.end();
    }
    tokens.push(&value[last..]);
    tokens
}

/// Upper-cases the first character and lower-cases the rest.
#[must_use]
pub(crate) fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Upper-cases only the first character, leaving the rest as-is.
#[must_use]
pub(crate) fn upper_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn is_all_caps(word: &str) -> bool {
    word.chars().any(char::is_alphabetic) && !word.chars().any(char::is_lowercase)
}

/// Capitalizes each letter that follows a non-letter, lower-cases the others.
fn title_case_name(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut previous_is_letter = false;
    for c in value.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(c);
            previous_is_letter = false;
        }
    }
    out
}

/// Returns true for characters in the Unicode `Sm` (math symbol) category.
fn is_math_symbol(c: char) -> bool {
    matches!(
        u32::from(c),
        0x00AC
            | 0x00B1
            | 0x00D7
            | 0x00F7
            | 0x03F6
            | 0x0606..=0x0608
            | 0x2044
            | 0x2052
            | 0x207A..=0x207C
            | 0x208A..=0x208C
            | 0x2118
            | 0x2140..=0x2144
            | 0x214B
            | 0x2190..=0x2194
            | 0x219A..=0x219B
            | 0x21A0
            | 0x21A3
            | 0x21A6
            | 0x21AE
            | 0x21CE..=0x21CF
            | 0x21D2
            | 0x21D4
            | 0x21F4..=0x22FF
            | 0x2320..=0x2321
            | 0x237C
            | 0x239B..=0x23B3
            | 0x23DC..=0x23E1
            | 0x25B7
            | 0x25C1
            | 0x25F8..=0x25FF
            | 0x266F
            | 0x27C0..=0x27C4
            | 0x27C7..=0x27E5
            | 0x27F0..=0x27FF
            | 0x2900..=0x2982
            | 0x2999..=0x29D7
            | 0x29DC..=0x29FB
            | 0x29FE..=0x2AFF
            | 0x2B30..=0x2B44
            | 0x2B47..=0x2B4C
            | 0xFB29
            | 0xFE62
            | 0xFE64..=0xFE66
            | 0xFF0B
            | 0xFF1C..=0xFF1E
            | 0xFF5C
            | 0xFF5E
            | 0xFFE2
            | 0xFFE9..=0xFFEC
            | 0x1D6C1
            | 0x1D6DB
            | 0x1D6FB
            | 0x1D715
            | 0x1D735
            | 0x1D74F
            | 0x1D76F
            | 0x1D789
            | 0x1D7A9
            | 0x1D7C3
            | 0x1EEF0..=0x1EEF1
    )
}
