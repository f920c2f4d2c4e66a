//! Configuration surface for the module preparer.
//!
//! Values only — how they arrive (harness options, a JSON file for the CLI)
//! is the caller's business. Module paths and install arguments are fixed at
//! configuration time and immutable for the run.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{PrepError, Result};

/// Default per-module install timeout in seconds (5 minutes).
const DEFAULT_INSTALL_TIMEOUT_SECS: u64 = 300;

fn default_install_timeout_secs() -> u64 {
    DEFAULT_INSTALL_TIMEOUT_SECS
}

/// Configuration for one [`KernelModulePreparer`](crate::preparer::KernelModulePreparer) run.
///
/// Install arguments apply uniformly to every configured module path, in
/// configured order: later entries combine with earlier ones, they never
/// replace them. Two paths may resolve to the same display name; they are
/// processed independently and the later configuration wins on the shared
/// bookkeeping entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparerConfig {
    /// Filesystem paths of the `.ko` artifacts to install, in install order.
    pub module_paths: Vec<String>,

    /// Arguments appended to each install command (free-form `key=value`
    /// strings), in configured order.
    #[serde(default)]
    pub install_args: Vec<String>,

    /// Timeout applied to each module installation, in seconds.
    #[serde(default = "default_install_timeout_secs")]
    pub install_timeout_secs: u64,
}

impl PreparerConfig {
    /// Create a configuration with the given module paths and no install args.
    pub fn new(module_paths: Vec<String>) -> Self {
        Self {
            module_paths,
            install_args: Vec::new(),
            install_timeout_secs: DEFAULT_INSTALL_TIMEOUT_SECS,
        }
    }

    /// The per-module install timeout as a [`Duration`].
    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }

    /// Save configuration to a JSON file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize configuration to JSON")?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;
        Ok(())
    }

    /// Load configuration from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;
        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// `Config` if no module paths are configured, or a path is empty or
    /// ends with a path separator (no file name to derive the module name
    /// from), or the timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.module_paths.is_empty() {
            return Err(PrepError::config("at least one module path is required"));
        }
        for path in &self.module_paths {
            if path.trim().is_empty() {
                return Err(PrepError::config("module path must not be empty"));
            }
            if path.ends_with('/') || path.ends_with('\\') {
                return Err(PrepError::config(format!(
                    "module path '{}' must not end with a path separator",
                    path
                )));
            }
        }
        if self.install_timeout_secs == 0 {
            return Err(PrepError::config("install timeout must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> PreparerConfig {
        PreparerConfig {
            module_paths: vec!["/data/kunit.ko".to_string()],
            install_args: vec!["enable=1".to_string()],
            install_timeout_secs: 300,
        }
    }

    #[test]
    fn test_validate_accepts_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_path_list() {
        let config = PreparerConfig::new(Vec::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_trailing_separator() {
        let config = PreparerConfig::new(vec!["/data/mods/".to_string()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_path() {
        let config = PreparerConfig::new(vec!["  ".to_string()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = valid_config();
        config.install_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_defaults_apply_when_fields_omitted() {
        let config: PreparerConfig =
            serde_json::from_str(r#"{"module_paths": ["/data/kunit.ko"]}"#).unwrap();
        assert!(config.install_args.is_empty());
        assert_eq!(config.install_timeout_secs, 300);
        assert_eq!(config.install_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prep.json");

        let config = valid_config();
        config.save_to_file(&path).expect("save");
        let loaded = PreparerConfig::load_from_file(&path).expect("load");

        assert_eq!(loaded.module_paths, config.module_paths);
        assert_eq!(loaded.install_args, config.install_args);
        assert_eq!(loaded.install_timeout_secs, config.install_timeout_secs);
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").expect("write");
        assert!(PreparerConfig::load_from_file(&path).is_err());
    }
}
