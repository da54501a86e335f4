//! Merge configuration (`vtmerge.toml`).
//!
//! Every field has a default and a missing file means "all defaults", so a
//! repository with no configuration behaves exactly like
//! [`MergeOptions::default`](crate::merge::MergeOptions).
//!
//! ```toml
//! [merge]
//! concurrency = 4
//! keep_schema_conflicts = false
//! strict_primary_keys = false
//! reverify_all_constraints = false
//! ```

use std::fmt;
use std::path::Path;

use serde::Deserialize;

/// Default file name looked up by the CLI.
pub const CONFIG_FILE: &str = "vtmerge.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VtmergeConfig {
    /// Merge settings.
    #[serde(default)]
    pub merge: MergeConfig,
}

// ---------------------------------------------------------------------------
// MergeConfig
// ---------------------------------------------------------------------------

/// Merge behaviour settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeConfig {
    /// Upper bound on tables merged in parallel. Must be at least 1.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Record schema conflicts and skip the table instead of aborting the
    /// whole merge.
    #[serde(default)]
    pub keep_schema_conflicts: bool,

    /// Treat a primary-key change on either side as a fatal error instead of
    /// a warning that skips the table.
    #[serde(default)]
    pub strict_primary_keys: bool,

    /// Re-check every constraint on every row after a merge instead of only
    /// rows the merge touched.
    #[serde(default)]
    pub reverify_all_constraints: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            keep_schema_conflicts: false,
            strict_primary_keys: false,
            reverify_all_constraints: false,
        }
    }
}

const fn default_concurrency() -> usize {
    4
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading a configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<std::path::PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl VtmergeConfig {
    /// Load configuration from a TOML file.
    ///
    /// - If the file does not exist, returns all defaults (not an error).
    /// - If the file exists but contains invalid TOML, unknown fields, or a
    ///   zero concurrency, returns a [`ConfigError`].
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found) or parse errors.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML, unknown fields, or
    /// `concurrency = 0`.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })?;
        if cfg.merge.concurrency == 0 {
            return Err(ConfigError {
                path: None,
                message: "merge.concurrency must be at least 1".to_owned(),
            });
        }
        Ok(cfg)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_all_fields() {
        let cfg = VtmergeConfig::default();
        assert_eq!(cfg.merge.concurrency, 4);
        assert!(!cfg.merge.keep_schema_conflicts);
        assert!(!cfg.merge.strict_primary_keys);
        assert!(!cfg.merge.reverify_all_constraints);
    }

    #[test]
    fn parse_empty_string() {
        let cfg = VtmergeConfig::parse("").unwrap();
        assert_eq!(cfg, VtmergeConfig::default());
    }

    #[test]
    fn parse_full_config() {
        let cfg = VtmergeConfig::parse(
            r"
[merge]
concurrency = 1
keep_schema_conflicts = true
strict_primary_keys = true
reverify_all_constraints = true
",
        )
        .unwrap();
        assert_eq!(cfg.merge.concurrency, 1);
        assert!(cfg.merge.keep_schema_conflicts);
        assert!(cfg.merge.strict_primary_keys);
        assert!(cfg.merge.reverify_all_constraints);
    }

    #[test]
    fn parse_partial_config_uses_defaults() {
        let cfg = VtmergeConfig::parse("[merge]\nkeep_schema_conflicts = true\n").unwrap();
        assert_eq!(cfg.merge.concurrency, 4);
        assert!(cfg.merge.keep_schema_conflicts);
    }

    #[test]
    fn parse_rejects_unknown_nested_field() {
        let err = VtmergeConfig::parse("[merge]\nsquash = true\n").unwrap_err();
        assert!(
            err.message.contains("unknown field"),
            "error should mention unknown field: {}",
            err.message
        );
    }

    #[test]
    fn parse_includes_line_number_on_error() {
        let err = VtmergeConfig::parse("[merge]\nconcurrency = \"many\"\n").unwrap_err();
        assert!(err.message.contains("line"), "{}", err.message);
    }

    #[test]
    fn parse_rejects_zero_concurrency() {
        let err = VtmergeConfig::parse("[merge]\nconcurrency = 0\n").unwrap_err();
        assert!(err.message.contains("at least 1"));
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let cfg = VtmergeConfig::load(Path::new("/nonexistent/vtmerge.toml")).unwrap();
        assert_eq!(cfg, VtmergeConfig::default());
    }

    #[test]
    fn load_invalid_file_shows_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "not valid [[[toml").unwrap();
        let err = VtmergeConfig::load(&path).unwrap_err();
        assert_eq!(err.path.as_deref(), Some(path.as_path()));
        assert!(err.to_string().starts_with(&path.display().to_string()));
    }

    #[test]
    fn load_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[merge]\nconcurrency = 2\n").unwrap();
        assert_eq!(VtmergeConfig::load(&path).unwrap().merge.concurrency, 2);
    }
}
