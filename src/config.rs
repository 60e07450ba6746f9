// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration loader and validator.
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "podsync.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub database_url: String,
    pub fetch: Fetch,
    pub schedule: Schedule,
}

/// Feed fetching settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Fetch {
    pub timeout_secs: u64,
    pub user_agent: String,
}

/// Recurring sweep settings used by `watch`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Schedule {
    pub interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://podsync.db".to_string(),
            fetch: Fetch::default(),
            schedule: Schedule::default(),
        }
    }
}

impl Default for Fetch {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("podsync/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
        }
    }
}

impl Fetch {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Schedule {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `podsync.yaml` in the current working directory,
///   falling back to defaults when that file does not exist.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let cfg = match path {
        Some(path) => parse(&fs::read_to_string(path)?)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                parse(&fs::read_to_string(default_path)?)?
            } else {
                Config::default()
            }
        }
    };
    validate(&cfg)?;
    Ok(cfg)
}

fn parse(content: &str) -> Result<Config, ConfigError> {
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.database_url.trim().is_empty() {
        return Err(ConfigError::Invalid("database_url must be non-empty"));
    }
    if cfg.fetch.timeout_secs == 0 {
        return Err(ConfigError::Invalid("fetch.timeout_secs must be > 0"));
    }
    if cfg.fetch.user_agent.trim().is_empty() {
        return Err(ConfigError::Invalid("fetch.user_agent must be non-empty"));
    }
    if cfg.schedule.interval_secs == 0 {
        return Err(ConfigError::Invalid("schedule.interval_secs must be > 0"));
    }
    Ok(())
}

/// Example configuration file contents.
pub fn example() -> &'static str {
    r#"database_url: "sqlite://podsync.db"
fetch:
  timeout_secs: 30
  user_agent: "podsync"
schedule:
  interval_secs: 3600
"#
}
