//! Output filename derivation from download URLs.

use std::path::{Path, PathBuf};

use url::Url;

/// Stem used when the download URL has no usable last path segment.
const FALLBACK_STEM: &str = "download";

fn last_segment(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    let decoded = urlencoding::decode(segment)
        .map_or_else(|_| segment.to_string(), std::borrow::Cow::into_owned);
    (!decoded.is_empty()).then_some(decoded)
}

/// Extension of the URL's last path segment, without the dot.
pub(crate) fn extension_from_url(url: &str) -> Option<String> {
    let segment = last_segment(url)?;
    let dot_index = segment.rfind('.')?;
    let ext = &segment[dot_index + 1..];
    if ext.is_empty() || ext.len() > 12 || dot_index == 0 {
        return None;
    }
    Some(ext.to_string())
}

/// Last path segment of the URL without its extension.
pub(crate) fn remote_stem(url: &str) -> Option<String> {
    let segment = last_segment(url)?;
    let stem = match segment.rfind('.') {
        Some(index) if index > 0 => &segment[..index],
        _ => segment.as_str(),
    };
    let stem = stem.replace(['/', '\\'], "_");
    (!stem.trim().is_empty()).then_some(stem)
}

/// `stem` plus the URL's extension, when it has one.
pub(crate) fn output_filename(stem: &str, url: &str) -> String {
    let stem = if stem.trim().is_empty() {
        FALLBACK_STEM
    } else {
        stem
    };
    match extension_from_url(url) {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem.to_string(),
    }
}

/// Joins the output directory with the derived filename.
#[must_use]
pub fn output_path(dir: &Path, stem: Option<&str>, url: &str) -> PathBuf {
    let stem = stem
        .map(str::to_string)
        .or_else(|| remote_stem(url))
        .unwrap_or_else(|| FALLBACK_STEM.to_string());
    dir.join(output_filename(&stem, url))
}
