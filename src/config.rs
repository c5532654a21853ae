use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::token::Algorithm;

/// TOTP parameters used when a record does not carry its own.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct OtpDefaults {
    pub digits: u32, // 6
    pub period: u64, // 30 seconds
    pub algorithm: Algorithm, // SHA1
}

impl Default for OtpDefaults {
    fn default() -> Self {
        OtpDefaults {
            digits: 6,
            period: 30,
            algorithm: Algorithm::Sha1,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub defaults: OtpDefaults,
    /// Leave `algorithm`/`digits`/`period` out of the URI when they equal
    /// the standard TOTP values. Applies to every token of a run.
    pub omit_default_params: bool,
}

impl Config {
    /// Load from `explicit` if given, else from the user config file if it
    /// exists, else fall back to built-in defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => match config_path() {
                Some(path) if path.is_file() => Self::load_from(&path),
                _ => Ok(Config::default()),
            },
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let cfg: Config = serde_json::from_str(&data)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        tracing::debug!("loaded config from {}", path.display());
        Ok(cfg)
    }
}

/// `~/.config/authy2otp/config.json` or the platform equivalent
pub fn config_path() -> Option<PathBuf> {
    let mut dir = dirs::config_dir()?;
    dir.push("authy2otp");
    Some(dir.join("config.json"))
}
