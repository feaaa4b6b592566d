use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono_tz::Tz;

use crate::models::Config;

pub fn load_config(path: &Path) -> Result<Config> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let config: Config =
        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(config)
}

impl Config {
    /// The campus timezone in which recurring windows become dates.
    pub fn tz(&self) -> Result<Tz> {
        Tz::from_str(&self.api.timezone)
            .map_err(|_| anyhow::anyhow!("Unknown timezone in config: {}", self.api.timezone))
    }
}
