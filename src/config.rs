use std::{io::BufReader, path::Path};

use anyhow::{anyhow, Context, Error};
use chrono_tz::Tz;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// IANA zone the care home's wall clock runs in, e.g. `US/Central`.
    pub timezone: String,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open config file: {}", path.to_string_lossy()))?;
        let config: EngineConfig = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse config file: {}", path.to_string_lossy()))?;
        config.time_zone()?;
        Ok(config)
    }

    pub fn time_zone(&self) -> Result<Tz, Error> {
        self.timezone
            .parse::<Tz>()
            .map_err(|err| anyhow!("unknown time zone {:?}: {}", self.timezone, err))
    }
}
