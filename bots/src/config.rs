//! Command line options and experiment parameters.

use crate::error::{ConfigError, ResolveError};
use crate::game::{GameArchitecture, ServerlessGame, StaticGame};
use crate::network::NetworkSettings;
use crate::walk::WalkSettings;
use clap::Parser;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Benchmark a game server with simulated players", long_about = None)]
pub struct Options {
    /// Game server host
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    pub host: String,

    /// Game server port
    #[arg(short, long, default_value = "25565")]
    pub port: u16,

    /// Experiment to run
    #[arg(short, long)]
    pub experiment: u32,

    /// Experiment parameter, repeatable: -E bots=10 -E duration=60
    #[arg(short = 'E', value_name = "KEY=VALUE", value_parser = parse_param)]
    pub params: Vec<(String, String)>,

    /// Experiment ticks per second
    #[arg(long, default_value = "20")]
    pub tick_rate: u32,

    /// Naming service URL; each bot asks it for a game node instead of using --host
    #[arg(long)]
    pub naming_service: Option<String>,

    /// Path search timeout in milliseconds, 0 waits forever
    #[arg(long, default_value = "6000")]
    pub path_timeout: u64,

    /// Upper bound on path searches running at the same time
    #[arg(long, default_value = "64")]
    pub max_path_searches: usize,

    /// Seconds to wait for the server to accept a bot
    #[arg(long, default_value = "10")]
    pub join_timeout: u64,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

impl Options {
    pub fn experiment_params(&self) -> ExperimentParams {
        self.params.iter().cloned().collect()
    }

    pub fn tick_interval(&self) -> Result<Duration, ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::invalid(
                "tick-rate",
                "0",
                "a positive number of ticks per second",
            ));
        }
        Ok(Duration::from_nanos(1_000_000_000 / u64::from(self.tick_rate)))
    }

    pub fn walk_settings(&self) -> WalkSettings {
        WalkSettings::default().with_timeout(Duration::from_millis(self.path_timeout))
    }

    pub fn network_settings(&self) -> NetworkSettings {
        NetworkSettings {
            join_timeout: Duration::from_secs(self.join_timeout),
            ..NetworkSettings::default()
        }
    }

    /// The naming service when one is configured, otherwise the fixed server.
    pub async fn game_architecture(&self) -> Result<Arc<dyn GameArchitecture>, ResolveError> {
        if let Some(url) = &self.naming_service {
            return Ok(Arc::new(ServerlessGame::new(url.clone())));
        }

        let address = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await?
            .next()
            .ok_or_else(|| ResolveError::UnknownHost {
                host: self.host.clone(),
                port: self.port,
            })?;
        Ok(Arc::new(StaticGame::new(address)))
    }
}

/// Flat string map handed to an experiment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExperimentParams {
    values: HashMap<String, String>,
}

impl ExperimentParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn int(&self, key: &str) -> Result<i64, ConfigError> {
        self.require(key, "an integer")
    }

    pub fn int_or(&self, key: &str, default: i64) -> Result<i64, ConfigError> {
        self.parse_or(key, default, "an integer")
    }

    pub fn count(&self, key: &str) -> Result<u32, ConfigError> {
        self.require(key, "a non-negative integer")
    }

    pub fn count_or(&self, key: &str, default: u32) -> Result<u32, ConfigError> {
        self.parse_or(key, default, "a non-negative integer")
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) if raw.eq_ignore_ascii_case("true") => Ok(true),
            Some(raw) if raw.eq_ignore_ascii_case("false") => Ok(false),
            Some(raw) => Err(ConfigError::invalid(key, raw, "true or false")),
        }
    }

    fn require<T: FromStr>(&self, key: &str, expected: &'static str) -> Result<T, ConfigError> {
        let raw = self
            .get(key)
            .ok_or_else(|| ConfigError::Missing(key.to_string()))?;
        raw.trim()
            .parse()
            .map_err(|_| ConfigError::invalid(key, raw, expected))
    }

    fn parse_or<T: FromStr>(
        &self,
        key: &str,
        default: T,
        expected: &'static str,
    ) -> Result<T, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(_) => self.require(key, expected),
        }
    }
}

impl FromIterator<(String, String)> for ExperimentParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
