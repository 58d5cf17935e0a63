//! Detection engine settings and TOML configuration parsing.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DetectError, Result};
use crate::rules::FileRuleSource;

/// Engine configuration, loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Path to the stateless rules JSON file.
    #[serde(default = "default_stateless_rules_path")]
    pub stateless_rules_path: PathBuf,

    /// Path to the single-endpoint correlation rules JSON file.
    #[serde(default = "default_correlation_rules_path")]
    pub correlation_rules_path: PathBuf,

    /// Path to the multi-endpoint chain rules JSON file.
    #[serde(default = "default_chain_rules_path")]
    pub chain_rules_path: PathBuf,

    /// Largest window the retention store is pruned to, in seconds. Must
    /// cover the largest `window_seconds` any active rule references.
    #[serde(default = "default_max_retention_seconds")]
    pub max_retention_seconds: u64,

    /// Capacity of the pipeline input channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_stateless_rules_path() -> PathBuf {
    PathBuf::from("rules/default_rules.json")
}

fn default_correlation_rules_path() -> PathBuf {
    PathBuf::from("rules/correlation_rules.json")
}

fn default_chain_rules_path() -> PathBuf {
    PathBuf::from("rules/chain_rules.json")
}

fn default_max_retention_seconds() -> u64 {
    1800
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            stateless_rules_path: default_stateless_rules_path(),
            correlation_rules_path: default_correlation_rules_path(),
            chain_rules_path: default_chain_rules_path(),
            max_retention_seconds: default_max_retention_seconds(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl DetectionConfig {
    /// Load configuration from a TOML file. Absent keys take defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| DetectError::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| DetectError::Config(format!("cannot parse {}: {e}", path.display())))
    }

    /// A file-backed rule source over the configured rule paths.
    pub fn file_source(&self) -> FileRuleSource {
        FileRuleSource::new(
            &self.stateless_rules_path,
            &self.correlation_rules_path,
            &self.chain_rules_path,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_sensible() {
        let config = DetectionConfig::default();
        assert_eq!(config.max_retention_seconds, 1800);
        assert_eq!(config.channel_capacity, 256);
        assert_eq!(
            config.stateless_rules_path,
            PathBuf::from("rules/default_rules.json")
        );
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(
            br#"
stateless_rules_path = "/etc/vigil/rules.json"
max_retention_seconds = 3600
"#,
        )
        .unwrap();
        f.flush().unwrap();

        let config = DetectionConfig::load(f.path()).unwrap();
        assert_eq!(
            config.stateless_rules_path,
            PathBuf::from("/etc/vigil/rules.json")
        );
        assert_eq!(config.max_retention_seconds, 3600);
        assert_eq!(config.channel_capacity, 256);
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"max_retention_seconds = {{{").unwrap();
        f.flush().unwrap();
        let err = DetectionConfig::load(f.path()).unwrap_err();
        assert!(matches!(err, DetectError::Config(_)));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = DetectionConfig::load(Path::new("/nonexistent/vigil.toml")).unwrap_err();
        assert!(matches!(err, DetectError::Config(_)));
    }
}
