//! Configuration handling for change-gate.
//!
//! This module provides configuration loading and validation,
//! supporting `change-gate.toml` files, a per-user fallback, and
//! sensible defaults. Command-line flags override whatever is loaded here.

use crate::core::check::CheckDefinition;
use crate::core::error::{Error, Result};
use crate::core::git::{DiffRange, DEFAULT_DIFF_FILTER};
use crate::core::runner::GateMode;
use crate::presets;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "change-gate.toml";

/// Directory under the user config dir holding the fallback config.
const USER_CONFIG_DIR: &str = "change-gate";

/// File name of the per-user fallback config.
const USER_CONFIG_FILE: &str = "config.toml";

/// Letters `git diff --diff-filter` accepts.
const DIFF_FILTER_LETTERS: &str = "ACDMRTUXB";

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Gate settings.
    pub gate: GateConfig,
    /// Tool versions and cache locations handed to every check.
    pub toolchain: ToolchainConfig,
    /// Checks, in the order they run.
    pub checks: Vec<CheckDefinition>,
}

impl Config {
    /// Loads configuration from the default location.
    pub fn load() -> Result<Self> {
        let path = Self::find_config_file()?;
        Self::load_from(&path)
    }

    /// Loads configuration or returns defaults if not found.
    pub fn load_or_default() -> Result<Self> {
        match Self::find_config_file() {
            Ok(path) => Self::load_from(&path),
            Err(Error::ConfigNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io("read config", e))?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), checks = config.checks.len(), "Loaded configuration");
        Ok(config)
    }

    /// Parses and validates configuration text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::config_parse_with_source("Failed to parse TOML", e))?;

        config.validate()?;

        Ok(config)
    }

    /// Finds the configuration file.
    ///
    /// Searches up the directory tree from the working directory, then falls
    /// back to the per-user configuration directory.
    pub fn find_config_file() -> Result<PathBuf> {
        let cwd = std::env::current_dir().map_err(|e| Error::io("get current dir", e))?;

        let mut current = cwd.as_path();
        loop {
            let config_path = current.join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Ok(config_path);
            }

            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }

        if let Some(user_path) = Self::user_config_path() {
            if user_path.exists() {
                return Ok(user_path);
            }
        }

        Err(Error::ConfigNotFound {
            path: cwd.join(CONFIG_FILE_NAME),
        })
    }

    /// Path of the per-user configuration file, if the platform has one.
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(USER_CONFIG_DIR).join(USER_CONFIG_FILE))
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if let Some(ref timeout) = self.gate.timeout {
            if parse_timeout(timeout).is_none() {
                return Err(Error::config_invalid(
                    "gate.timeout",
                    format!("Invalid duration: {timeout}"),
                ));
            }
        }

        if self.gate.head.trim().is_empty() {
            return Err(Error::config_invalid("gate.head", "must not be empty"));
        }

        validate_diff_filter(&self.gate.diff_filter)?;

        if self.gate.batch_size == Some(0) {
            return Err(Error::config_invalid(
                "gate.batch_size",
                "must be at least 1",
            ));
        }

        validate_env("toolchain.env", &self.toolchain.env)?;
        validate_checks(&self.checks)
    }

    /// Generates default configuration as a string.
    #[must_use]
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    /// Generates configuration for a specific preset.
    #[must_use]
    pub fn for_preset(preset: &str) -> Self {
        Self {
            checks: presets::checks(preset),
            ..Self::default()
        }
    }

    /// Parsed gate timeout.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.gate.timeout.as_deref().and_then(parse_timeout)
    }
}

/// Gate settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    /// Baseline revision for scoped runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    /// Revision under test.
    pub head: String,
    /// Which file set checks are scoped to.
    pub mode: GateMode,
    /// Wall-clock budget for the whole run (`"600"`, `"10m"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    /// How base and head are compared.
    pub diff_range: DiffRange,
    /// `git diff --diff-filter` letters.
    pub diff_filter: String,
    /// Maximum paths per invocation of a scoped check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            base: None,
            head: "HEAD".to_string(),
            mode: GateMode::default(),
            timeout: None,
            diff_range: DiffRange::default(),
            diff_filter: DEFAULT_DIFF_FILTER.to_string(),
            batch_size: None,
        }
    }
}

/// Tool versions and cache locations.
///
/// These are the only ambient settings the gate knows about. They reach the
/// checks as environment variables so tool wrappers can pick them up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolchainConfig {
    /// Exported as `CGATE_PYTHON_VERSION`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python_version: Option<String>,
    /// Exported as `CGATE_NODE_VERSION`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_version: Option<String>,
    /// Exported as `CGATE_CACHE_DIR`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    /// Extra variables exported verbatim.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl ToolchainConfig {
    /// Environment variables every check receives.
    #[must_use]
    pub fn exported_env(&self) -> Vec<(String, String)> {
        let mut env = Vec::new();
        if let Some(ref v) = self.python_version {
            env.push(("CGATE_PYTHON_VERSION".to_string(), v.clone()));
        }
        if let Some(ref v) = self.node_version {
            env.push(("CGATE_NODE_VERSION".to_string(), v.clone()));
        }
        if let Some(ref dir) = self.cache_dir {
            env.push(("CGATE_CACHE_DIR".to_string(), dir.display().to_string()));
        }
        env.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }
}

/// Parses a timeout given as plain seconds (`"90"`) or a humantime string
/// (`"1m30s"`).
#[must_use]
pub fn parse_timeout(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).ok()
}

fn validate_diff_filter(filter: &str) -> Result<()> {
    if filter.is_empty() {
        return Err(Error::config_invalid("gate.diff_filter", "must not be empty"));
    }
    if let Some(bad) = filter
        .chars()
        .find(|c| !DIFF_FILTER_LETTERS.contains(c.to_ascii_uppercase()))
    {
        return Err(Error::config_invalid(
            "gate.diff_filter",
            format!("Unknown status letter '{bad}', expected any of {DIFF_FILTER_LETTERS}"),
        ));
    }
    Ok(())
}

fn validate_env(field: &str, env: &BTreeMap<String, String>) -> Result<()> {
    if let Some(key) = env.keys().find(|k| k.is_empty() || k.contains('=')) {
        return Err(Error::config_invalid(
            field,
            format!("Invalid variable name: '{key}'"),
        ));
    }
    Ok(())
}

fn validate_checks(checks: &[CheckDefinition]) -> Result<()> {
    let mut seen = HashSet::new();

    for check in checks {
        if check.name.trim().is_empty() {
            return Err(Error::config_invalid("checks.name", "must not be empty"));
        }
        if !seen.insert(check.name.as_str()) {
            return Err(Error::config_invalid(
                format!("checks.{}", check.name),
                "Duplicate check name",
            ));
        }
        if check.run.trim().is_empty() {
            return Err(Error::config_invalid(
                format!("checks.{}.run", check.name),
                "must not be empty",
            ));
        }
        check.include_patterns()?;
        validate_env(&format!("checks.{}.env", check.name), &check.env)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::check::CheckMode;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.gate.head, "HEAD");
        assert_eq!(config.gate.mode, GateMode::ScopedToChanges);
        assert_eq!(config.gate.diff_range, DiffRange::MergeBase);
        assert_eq!(config.gate.diff_filter, "ACMR");
        assert!(config.checks.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_toml(
            r#"
[gate]
base = "origin/main"
mode = "full-tree"
timeout = "10m"
diff_range = "direct"
batch_size = 50

[toolchain]
python_version = "3.9"
cache_dir = "/tmp/cache"
env = { PIP_DISABLE_PIP_VERSION_CHECK = "1" }

[[checks]]
name = "pre-commit"
run = "pre-commit run --files"
include = ["*.py"]

[[checks]]
name = "coverage"
run = "pytest --cov"
mode = "full"
"#,
        )
        .expect("parse config");

        assert_eq!(config.gate.base.as_deref(), Some("origin/main"));
        assert_eq!(config.gate.mode, GateMode::FullTree);
        assert_eq!(config.gate.diff_range, DiffRange::Direct);
        assert_eq!(config.gate.batch_size, Some(50));
        assert_eq!(config.timeout(), Some(Duration::from_secs(600)));
        assert_eq!(config.checks.len(), 2);
        assert_eq!(config.checks[0].mode, CheckMode::Scoped);
        assert_eq!(config.checks[1].mode, CheckMode::Full);
    }

    #[test]
    fn test_checks_keep_declaration_order() {
        let config = Config::from_toml(
            r#"
[[checks]]
name = "zeta"
run = "true"

[[checks]]
name = "alpha"
run = "true"
"#,
        )
        .expect("parse config");

        let names: Vec<_> = config.checks.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha"]);
    }

    #[test]
    fn test_unknown_toolchain_option_rejected() {
        let result = Config::from_toml(
            r#"
[toolchain]
ruby_version = "3.2"
"#,
        );
        assert!(matches!(result, Err(Error::ConfigParse { .. })));
    }

    #[test]
    fn test_unknown_section_rejected() {
        assert!(Config::from_toml("[human]\nchecks = []\n").is_err());
    }

    #[rstest]
    #[case("[gate]\ntimeout = \"soon\"\n", "gate.timeout")]
    #[case("[gate]\nhead = \"\"\n", "gate.head")]
    #[case("[gate]\ndiff_filter = \"AQ\"\n", "gate.diff_filter")]
    #[case("[gate]\nbatch_size = 0\n", "gate.batch_size")]
    #[case("[[checks]]\nname = \"a\"\nrun = \"\"\n", "checks.a.run")]
    #[case(
        "[[checks]]\nname = \"a\"\nrun = \"x\"\n[[checks]]\nname = \"a\"\nrun = \"y\"\n",
        "checks.a"
    )]
    #[case("[[checks]]\nname = \"a\"\nrun = \"x\"\ninclude = [\"[\"]\n", "checks.a.include")]
    #[case("[toolchain]\nenv = { \"A=B\" = \"1\" }\n", "toolchain.env")]
    fn test_invalid_config(#[case] toml: &str, #[case] expected_field: &str) {
        let err = Config::from_toml(toml).expect_err("should be invalid");
        assert!(
            matches!(&err, Error::ConfigInvalid { field, .. } if field == expected_field),
            "unexpected error: {err:?}"
        );
    }

    #[rstest]
    #[case("90", Some(Duration::from_secs(90)))]
    #[case(" 1 ", Some(Duration::from_secs(1)))]
    #[case("1m30s", Some(Duration::from_secs(90)))]
    #[case("2h", Some(Duration::from_secs(7200)))]
    #[case("0", Some(Duration::ZERO))]
    #[case("", None)]
    #[case("-5", None)]
    #[case("soon", None)]
    fn test_parse_timeout(#[case] input: &str, #[case] expected: Option<Duration>) {
        assert_eq!(parse_timeout(input), expected);
    }

    #[test]
    fn test_toolchain_exported_env() {
        let mut toolchain = ToolchainConfig {
            python_version: Some("3.9".to_string()),
            node_version: None,
            cache_dir: Some(PathBuf::from("/tmp/cache")),
            env: BTreeMap::new(),
        };
        toolchain.env.insert("FOO".to_string(), "bar".to_string());

        assert_eq!(
            toolchain.exported_env(),
            vec![
                ("CGATE_PYTHON_VERSION".to_string(), "3.9".to_string()),
                ("CGATE_CACHE_DIR".to_string(), "/tmp/cache".to_string()),
                ("FOO".to_string(), "bar".to_string()),
            ]
        );
    }

    #[test]
    fn test_preset_python() {
        let config = Config::for_preset("python");
        assert!(config.checks.iter().any(|c| c.name == "pre-commit"));
        assert!(config
            .checks
            .iter()
            .any(|c| c.name == "coverage" && c.mode == CheckMode::Full));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_preset_has_no_checks() {
        assert!(Config::for_preset("cobol").checks.is_empty());
    }

    #[test]
    fn test_default_toml_round_trips() {
        let toml = Config::default_toml();
        assert!(toml.contains("[gate]"));
        let parsed = Config::from_toml(&toml).expect("parse generated config");
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_preset_toml_round_trips() {
        let config = Config::for_preset("rust");
        let toml = toml::to_string_pretty(&config).expect("serialize");
        let parsed = Config::from_toml(&toml).expect("parse generated config");
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_from_file() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[gate]\nbase = \"main\"\n").expect("write config");

        let config = Config::load_from(&path).expect("load");
        assert_eq!(config.gate.base.as_deref(), Some("main"));
    }

    #[test]
    fn test_load_from_missing_file() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let result = Config::load_from(&temp.path().join("nope.toml"));
        assert!(matches!(result, Err(Error::Io { .. })));
    }
}
