//! Config file loading for CLI defaults.
//!
//! The file is line-oriented `key=value`; `#` starts a comment and keys are
//! case-insensitive. Boolean keys may appear bare (`autoname`) to mean true.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::debug;

/// Values a config file can supply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct FileConfig {
    pub(crate) proxy: Option<String>,
    /// Appended in file order.
    pub(crate) mirrors: Vec<String>,
    pub(crate) dir: Option<PathBuf>,
    pub(crate) chunk: Option<u64>,
    pub(crate) user_agent: Option<String>,
    pub(crate) autoformat: Option<String>,
    pub(crate) timeout_secs: Option<u64>,
    pub(crate) autoname: Option<bool>,
    pub(crate) no_color: Option<bool>,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/shdl/config`, when that file exists
/// 2. `$HOME/.shdlconfig`
#[must_use]
pub(crate) fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        let candidate = PathBuf::from(xdg_config_home).join("shdl").join("config");
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(PathBuf::from(home).join(".shdlconfig"))
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config from the default path; a missing file yields `None`.
pub(crate) fn load_default_file_config() -> Result<Option<FileConfig>> {
    let Some(path) = resolve_default_config_path() else {
        return Ok(None);
    };
    if !path.is_file() {
        debug!(path = %path.display(), "no config file at default path");
        return Ok(None);
    }
    load_file_config(&path).map(Some)
}

/// Reads and parses the config file at `path`.
pub(crate) fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

pub(crate) fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        let line_number = line_index + 1;

        let (raw_key, value) = match line.split_once('=') {
            Some((key, value)) => (key, Some(value.trim())),
            None => (line, None),
        };
        let key = raw_key.trim().to_ascii_lowercase();

        match key.as_str() {
            "autoname" => {
                let parsed = parse_flag(value)
                    .with_context(|| format!("Invalid `autoname` value on line {line_number}"))?;
                cfg.autoname = Some(parsed);
            }
            "nocolor" => {
                let parsed = parse_flag(value)
                    .with_context(|| format!("Invalid `nocolor` value on line {line_number}"))?;
                cfg.no_color = Some(parsed);
            }
            "chunk" => {
                let parsed = require_value(value)
                    .and_then(parse_positive_integer)
                    .with_context(|| format!("Invalid `chunk` value on line {line_number}"))?;
                cfg.chunk = Some(parsed);
            }
            "timeout" => {
                let parsed = require_value(value)
                    .and_then(parse_positive_integer)
                    .with_context(|| format!("Invalid `timeout` value on line {line_number}"))?;
                cfg.timeout_secs = Some(parsed);
            }
            "proxy" | "mirror" | "dir" | "useragent" | "autoformat" => {
                let parsed = require_value(value)
                    .map(unquote)
                    .with_context(|| format!("Invalid `{key}` value on line {line_number}"))?;
                match key.as_str() {
                    "proxy" => cfg.proxy = Some(parsed),
                    "mirror" => cfg.mirrors.push(parsed),
                    "dir" => cfg.dir = Some(PathBuf::from(parsed)),
                    "useragent" => cfg.user_agent = Some(parsed),
                    _ => cfg.autoformat = Some(parsed),
                }
            }
            unknown => {
                debug!(key = unknown, line = line_number, "ignoring unknown config key");
            }
        }
    }
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn require_value(value: Option<&str>) -> Result<&str> {
    match value {
        Some(value) if !value.is_empty() => Ok(value),
        _ => bail!("Expected key=value"),
    }
}

/// Strips one pair of surrounding double quotes, if present.
fn unquote(value: &str) -> String {
    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}

fn parse_positive_integer(raw_value: &str) -> Result<u64> {
    let value = raw_value.trim().parse::<u64>()?;
    if value == 0 {
        bail!("Expected a positive integer");
    }
    Ok(value)
}

fn parse_flag(value: Option<&str>) -> Result<bool> {
    match value {
        None => Ok(true),
        Some(raw) => parse_boolean(raw),
    }
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim().to_ascii_lowercase().as_str() {
        "" | "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_config_all_keys() {
        let raw = r#"
# shdl defaults
proxy = tor
mirror=https://m1.example
MIRROR = m2.example   # trailing comment
dir=~/papers
chunk=4096
useragent="Mozilla/5.0 (X11)"
autoformat = {title} ({year})
timeout=12
autoname
nocolor=false
"#;
        let cfg = parse_config_str(raw).unwrap();
        assert_eq!(cfg.proxy.as_deref(), Some("tor"));
        assert_eq!(cfg.mirrors, vec!["https://m1.example", "m2.example"]);
        assert_eq!(cfg.dir, Some(PathBuf::from("~/papers")));
        assert_eq!(cfg.chunk, Some(4096));
        assert_eq!(cfg.user_agent.as_deref(), Some("Mozilla/5.0 (X11)"));
        assert_eq!(cfg.autoformat.as_deref(), Some("{title} ({year})"));
        assert_eq!(cfg.timeout_secs, Some(12));
        assert_eq!(cfg.autoname, Some(true));
        assert_eq!(cfg.no_color, Some(false));
    }

    #[test]
    fn test_parse_config_empty_and_comments_only() {
        let cfg = parse_config_str("\n# nothing here\n   \n").unwrap();
        assert_eq!(cfg, FileConfig::default());
    }

    #[test]
    fn test_parse_config_ignores_unknown_keys() {
        let cfg = parse_config_str("color=blue\nchunk=10\n").unwrap();
        assert_eq!(cfg.chunk, Some(10));
    }

    #[test]
    fn test_parse_config_rejects_non_integer_chunk() {
        let err = parse_config_str("chunk=lots\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 1"), "{err:#}");
        assert!(parse_config_str("chunk=0\n").is_err());
        assert!(parse_config_str("timeout=-3\n").is_err());
    }

    #[test]
    fn test_parse_config_rejects_bad_boolean_and_missing_value() {
        assert!(parse_config_str("autoname=maybe\n").is_err());
        assert!(parse_config_str("proxy=\n").is_err());
        assert!(parse_config_str("mirror\n").is_err());
    }

    #[test]
    fn test_strip_inline_comment_respects_quotes() {
        assert_eq!(strip_inline_comment("a=1 # c"), "a=1 ");
        assert_eq!(strip_inline_comment(r#"ua="x#y" # c"#), r#"ua="x#y" "#);
    }

    #[test]
    fn test_load_file_config_reads_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config");
        fs::write(&path, "mirror=https://m.example\n").unwrap();
        let cfg = load_file_config(&path).unwrap();
        assert_eq!(cfg.mirrors, vec!["https://m.example"]);

        let err = load_file_config(&dir.path().join("missing")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
