//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Optional TOML config file passed on the command line
//! 3. Environment variables: `CATGRAPH_*` prefix

use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::code::CanonProfile;
use crate::errors::{CompileError, CompileResult};

/// Compiler settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Canonical code rendering: "compact" ("CS137") or "spaced" ("CS 137").
    pub profile: String,
    /// Bound on one external structured-extraction call.
    pub extractor_timeout_ms: u64,
    /// Worker threads for per-record parsing; 0 uses the pool default.
    pub workers: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            profile: "compact".to_string(),
            extractor_timeout_ms: 10_000,
            workers: 0,
        }
    }
}

impl Settings {
    /// Load settings with layered precedence.
    pub fn load(config_file: Option<&Path>) -> CompileResult<Self> {
        let mut builder = Config::builder()
            .set_default("profile", "compact")
            .map_err(cfg_err)?
            .set_default("extractor_timeout_ms", 10_000i64)
            .map_err(cfg_err)?
            .set_default("workers", 0i64)
            .map_err(cfg_err)?;

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }

        let cfg = builder
            .add_source(Environment::with_prefix("CATGRAPH"))
            .build()
            .map_err(cfg_err)?;

        let settings: Settings = cfg.try_deserialize().map_err(cfg_err)?;
        settings.canon_profile()?;
        Ok(settings)
    }

    /// Parse the configured canonicalization profile.
    pub fn canon_profile(&self) -> CompileResult<CanonProfile> {
        match self.profile.to_lowercase().as_str() {
            "compact" => Ok(CanonProfile::Compact),
            "spaced" => Ok(CanonProfile::Spaced),
            other => Err(CompileError::Config(format!(
                "unknown canonicalization profile: {:?} (expected \"compact\" or \"spaced\")",
                other
            ))),
        }
    }
}

fn cfg_err(e: config::ConfigError) -> CompileError {
    CompileError::Config(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.profile, "compact");
        assert_eq!(settings.extractor_timeout_ms, 10_000);
        assert_eq!(settings.canon_profile().unwrap(), CanonProfile::Compact);
    }

    #[test]
    fn test_unknown_profile_rejected() {
        let settings = Settings {
            profile: "fancy".to_string(),
            ..Default::default()
        };
        assert!(settings.canon_profile().is_err());
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catgraph.toml");
        std::fs::write(&path, "profile = \"spaced\"\nworkers = 4\n").unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.canon_profile().unwrap(), CanonProfile::Spaced);
        assert_eq!(settings.workers, 4);
        // Untouched keys keep their defaults
        assert_eq!(settings.extractor_timeout_ms, 10_000);
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");
        assert!(Settings::load(Some(&path)).is_err());
    }
}
