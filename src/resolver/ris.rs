//! Minimal RIS citation parser shared by JSTOR, ScienceDirect and IEEE.

use std::sync::LazyLock;

use regex::Regex;

use super::utils::{compile_static_regex, extract_year_from_str};

static RIS_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"^([A-Z][A-Z0-9])  -\s?(.*)$"));

/// Tagged lines of one RIS record, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct RisRecord {
    entries: Vec<(String, String)>,
}

impl RisRecord {
    /// Parses every `TAG  - value` line; other lines are ignored.
    pub(crate) fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .filter_map(|line| {
                let caps = RIS_LINE_RE.captures(line.trim_end_matches('\r'))?;
                Some((caps[1].to_string(), caps[2].trim().to_string()))
            })
            .collect();
        Self { entries }
    }

    /// First non-empty value for `tag`.
    pub(crate) fn first(&self, tag: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(t, v)| t == tag && !v.is_empty())
            .map(|(_, v)| v.as_str())
    }

    /// Every non-empty value for `tag`.
    pub(crate) fn all(&self, tag: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(t, v)| t == tag && !v.is_empty())
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Title from `TI`, falling back to `T1`.
    pub(crate) fn title(&self) -> Option<&str> {
        self.first("TI").or_else(|| self.first("T1"))
    }

    /// Four-digit year from `PY`, `Y1` or `DA`; empty when none carries one.
    pub(crate) fn year(&self) -> String {
        ["PY", "Y1", "DA"]
            .iter()
            .filter_map(|tag| self.first(tag))
            .find_map(extract_year_from_str)
            .unwrap_or_default()
    }
}
