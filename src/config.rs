//! Engine configuration, loaded from TOML and overridden from the command line.

use crate::error::ConfigError;
use crate::script::ScriptOptions;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Command line of the prover bridge, split shell-style.
    pub prover: String,
    /// Per-sentence timeout passed to the prover; 0 disables it.
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub log_filter: Option<String>,
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prover: String::new(),
            timeout_secs: 0,
            poll_interval_ms: 50,
            log_filter: None,
            log_file: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn prover_command(&self) -> Result<Vec<String>, ConfigError> {
        let words = shlex::split(&self.prover)
            .ok_or_else(|| ConfigError::BadCommand(self.prover.clone()))?;
        if words.is_empty() {
            return Err(ConfigError::EmptyCommand);
        }
        Ok(words)
    }

    pub fn script_options(&self) -> ScriptOptions {
        ScriptOptions {
            timeout: (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs)),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.script_options(), ScriptOptions::default());
    }

    #[test]
    fn test_parse_full() {
        let config = Config::parse(
            r#"
prover = "coq-bridge --quiet 'my dir/_CoqProject'"
timeout_secs = 30
poll_interval_ms = 10
log_filter = "proof_stepper=debug"
"#,
        )
        .unwrap();

        assert_eq!(
            config.prover_command().unwrap(),
            ["coq-bridge", "--quiet", "my dir/_CoqProject"]
        );
        let options = config.script_options();
        assert_eq!(options.timeout, Some(Duration::from_secs(30)));
        assert_eq!(options.poll_interval, Duration::from_millis(10));
        assert_eq!(config.log_filter.as_deref(), Some("proof_stepper=debug"));
    }

    #[test]
    fn test_bad_prover_commands() {
        let empty = Config::default();
        assert!(matches!(empty.prover_command(), Err(ConfigError::EmptyCommand)));

        let unbalanced = Config {
            prover: "bridge 'oops".to_string(),
            ..Config::default()
        };
        assert!(matches!(unbalanced.prover_command(), Err(ConfigError::BadCommand(_))));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(Config::parse("timeout_secs = \"soon\"").is_err());
    }
}
