use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};

#[derive(Debug, PartialEq, Eq, Deserialize, Default, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

#[derive(Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
#[serde(default)]
pub struct Config {
    /// Number of competing consumers on the inbound delivery channel.
    pub workers: usize,
    /// How often each worker hands its local table to the collector, in ms.
    pub aggregate_interval_ms: u64,
    /// How often the collector derives and broadcasts a snapshot, in ms.
    pub snapshot_interval_ms: u64,
    /// How often the file sink appends the latest snapshot, in ms.
    pub persist_interval_ms: u64,
    /// Path of the line-delimited JSON output file. The file sink is only
    /// wired up when this is set.
    pub output: Option<String>,
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            workers: 2,
            aggregate_interval_ms: 1000,
            snapshot_interval_ms: 1000,
            persist_interval_ms: 60_000,
            output: None,
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    #[must_use]
    pub fn aggregate_interval(&self) -> Duration {
        Duration::from_millis(self.aggregate_interval_ms)
    }

    #[must_use]
    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_millis(self.snapshot_interval_ms)
    }

    #[must_use]
    pub fn persist_interval(&self) -> Duration {
        Duration::from_millis(self.persist_interval_ms)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    ParseError(String),
    UnsupportedField(String),
}

pub fn get_config(config_directory: &Path) -> Result<Config, ConfigError> {
    let path = config_directory.join("brokerstat.yaml");
    let figment = Figment::new()
        .merge(Yaml::file(path))
        .merge(Env::prefixed("BROKERSTAT_"));

    let config: Config = figment.extract().map_err(|err| match err.kind {
        figment::error::Kind::UnknownField(field, _) => ConfigError::UnsupportedField(field),
        _ => ConfigError::ParseError(err.to_string()),
    })?;

    if config.workers == 0 {
        return Err(ConfigError::ParseError(
            "workers must be at least 1".to_string(),
        ));
    }

    Ok(config)
}
