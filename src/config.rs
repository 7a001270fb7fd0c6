//! User configuration, read once at startup from
//! `~/.config/steptrace/config.toml`. Command-line flags win over the file.

use crate::session::autostep::AUTO_STEP_DELAY;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SERVER: &str = "127.0.0.1:8080";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Trace server address, `host:port`.
    pub server: Option<String>,
    /// Delay between automatic steps, in milliseconds.
    pub auto_step_delay_ms: Option<u64>,
}

impl Config {
    fn path() -> Option<PathBuf> {
        Some(
            home::home_dir()?
                .join(".config")
                .join("steptrace")
                .join("config.toml"),
        )
    }

    /// Read the config file if there is one; a missing file means defaults.
    pub fn load() -> anyhow::Result<Self> {
        let Some(path) = Self::path() else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn server(&self) -> &str {
        self.server.as_deref().unwrap_or(DEFAULT_SERVER)
    }

    pub fn auto_step_delay(&self) -> Duration {
        self.auto_step_delay_ms
            .map_or(AUTO_STEP_DELAY, Duration::from_millis)
    }
}
