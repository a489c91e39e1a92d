//! Process configuration, loaded once before the scheduler starts.
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML
//! file, then `RECORDER__*` environment variables (`__` separates nesting,
//! e.g. `RECORDER__STORAGE__BACKEND=sqlite`). The Postgres URL may also come
//! from `DATABASE_URL`, so credentials never have to live in the file.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;

use crate::collector::scheduler::ShutdownPolicy;
use crate::collector::{InstrumentTarget, TargetError};
use crate::market_data::adapters::okx::DEFAULT_BASE_URL;
use crate::persist::Destination;

pub const DEFAULT_CONFIG_PATH: &str = "config/recorder.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),
    #[error("config file {0} does not exist")]
    MissingFile(PathBuf),
    #[error("no instruments configured")]
    NoInstruments,
    #[error("interval_secs must be greater than zero")]
    ZeroInterval,
    #[error("instrument #{index} ({instrument_id:?}): {source}")]
    Target {
        index: usize,
        instrument_id: String,
        #[source]
        source: TargetError,
    },
    #[error("invalid metrics_addr {0:?}")]
    MetricsAddr(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Seconds between scheduled cycles.
    pub interval_secs: u64,
    /// Levels per side for instruments that don't set their own depth.
    pub default_depth: usize,
    /// How long shutdown waits for in-flight cycles. Zero abandons them at once.
    pub shutdown_grace_secs: u64,
    pub log_filter: String,
    /// Prometheus listener, only used with the `metrics-exporter` feature.
    pub metrics_addr: Option<String>,
    pub provider: ProviderConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub instruments: Vec<InstrumentConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Postgres connection string; falls back to `DATABASE_URL`.
    pub url: Option<String>,
    pub sqlite_path: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl StorageConfig {
    pub fn database_url(&self) -> Option<String> {
        self.url
            .clone()
            .filter(|u| !u.is_empty())
            .or_else(|| std::env::var("DATABASE_URL").ok().filter(|u| !u.is_empty()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentConfig {
    pub instrument_id: String,
    pub destination: String,
    pub depth: Option<usize>,
}

impl AppConfig {
    /// Load from `path` (must exist) or from the default path when present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) if !p.exists() => return Err(ConfigError::MissingFile(p.to_path_buf())),
            Some(p) => Some(p.to_path_buf()),
            None => Some(PathBuf::from(DEFAULT_CONFIG_PATH)).filter(|p| p.exists()),
        };

        let mut builder = Self::defaults()?;
        if let Some(file) = file {
            builder = builder.add_source(File::from(file));
        }
        builder = builder.add_source(Environment::with_prefix("RECORDER").separator("__"));

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Parse a TOML document on top of the defaults, ignoring the environment.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let cfg = Self::defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Ok(cfg.try_deserialize()?)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Ok(Config::builder()
            .set_default("interval_secs", 60)?
            .set_default("default_depth", 5)?
            .set_default("shutdown_grace_secs", 15)?
            .set_default("log_filter", "info")?
            .set_default("provider.base_url", DEFAULT_BASE_URL)?
            .set_default("provider.timeout_secs", 10)?
            .set_default("storage.backend", "postgres")?
            .set_default("storage.sqlite_path", "book-recorder.sqlite")?
            .set_default("storage.max_connections", 8)?
            .set_default("storage.acquire_timeout_secs", 10)?)
    }

    pub fn interval(&self) -> Result<Duration, ConfigError> {
        match self.interval_secs {
            0 => Err(ConfigError::ZeroInterval),
            secs => Ok(Duration::from_secs(secs)),
        }
    }

    pub fn shutdown_policy(&self) -> ShutdownPolicy {
        match self.shutdown_grace_secs {
            0 => ShutdownPolicy::Abandon,
            secs => ShutdownPolicy::Drain { grace: Duration::from_secs(secs) },
        }
    }

    pub fn metrics_addr(&self) -> Result<Option<SocketAddr>, ConfigError> {
        self.metrics_addr
            .as_deref()
            .map(|raw| raw.parse().map_err(|_| ConfigError::MetricsAddr(raw.to_string())))
            .transpose()
    }

    /// Validate and freeze the instrument list.
    pub fn targets(&self) -> Result<Vec<InstrumentTarget>, ConfigError> {
        if self.instruments.is_empty() {
            return Err(ConfigError::NoInstruments);
        }
        self.instruments
            .iter()
            .enumerate()
            .map(|(index, inst)| {
                InstrumentTarget::new(
                    &inst.instrument_id,
                    &inst.destination,
                    inst.depth.unwrap_or(self.default_depth),
                )
                .map_err(|source| ConfigError::Target {
                    index,
                    instrument_id: inst.instrument_id.clone(),
                    source,
                })
            })
            .collect()
    }
}

/// Distinct destinations, each needing its schema ensured once.
pub fn distinct_destinations(targets: &[InstrumentTarget]) -> BTreeSet<Destination> {
    targets.iter().map(|t| t.destination.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        interval_secs = 30
        default_depth = 10

        [storage]
        backend = "sqlite"
        sqlite_path = ":memory:"

        [[instruments]]
        instrument_id = "BTC-USDT"
        destination = "okx_prices_btc"

        [[instruments]]
        instrument_id = "ETH-USDT"
        destination = "okx_prices_eth"
        depth = 3
    "#;

    #[test]
    fn test_sample_config() {
        let cfg = AppConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(cfg.interval().unwrap(), Duration::from_secs(30));
        assert_eq!(cfg.storage.backend, StorageBackend::Sqlite);
        assert_eq!(cfg.provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.provider.timeout_secs, 10);
        assert_eq!(cfg.shutdown_policy(), ShutdownPolicy::Drain { grace: Duration::from_secs(15) });

        let targets = cfg.targets().unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].depth, 10);
        assert_eq!(targets[1].depth, 3);
        assert_eq!(targets[1].destination.as_str(), "okx_prices_eth");
    }

    #[test]
    fn test_shipped_config_parses() {
        let cfg = AppConfig::from_toml(include_str!("../config/recorder.toml")).unwrap();
        assert_eq!(cfg.storage.backend, StorageBackend::Postgres);
        assert_eq!(cfg.targets().unwrap().len(), 4);
    }

    #[test]
    fn test_no_instruments() {
        let cfg = AppConfig::from_toml("interval_secs = 5").unwrap();
        assert!(matches!(cfg.targets(), Err(ConfigError::NoInstruments)));
    }

    #[test]
    fn test_zero_interval_and_grace() {
        let cfg = AppConfig::from_toml("interval_secs = 0\nshutdown_grace_secs = 0").unwrap();
        assert!(matches!(cfg.interval(), Err(ConfigError::ZeroInterval)));
        assert_eq!(cfg.shutdown_policy(), ShutdownPolicy::Abandon);
    }

    #[test]
    fn test_bad_target_is_reported_with_index() {
        let cfg = AppConfig::from_toml(
            r#"
            [[instruments]]
            instrument_id = "BTC-USDT"
            destination = "okx-prices-btc"
            "#,
        )
        .unwrap();
        match cfg.targets() {
            Err(ConfigError::Target { index, instrument_id, .. }) => {
                assert_eq!(index, 0);
                assert_eq!(instrument_id, "BTC-USDT");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_metrics_addr() {
        let mut cfg = AppConfig::from_toml("").unwrap();
        assert_eq!(cfg.metrics_addr().unwrap(), None);
        cfg.metrics_addr = Some("0.0.0.0:9000".into());
        assert_eq!(cfg.metrics_addr().unwrap(), Some("0.0.0.0:9000".parse().unwrap()));
        cfg.metrics_addr = Some("nope".into());
        assert!(cfg.metrics_addr().is_err());
    }

    #[test]
    fn test_distinct_destinations() {
        let targets = vec![
            InstrumentTarget::new("BTC-USDT", "book_levels", 5).unwrap(),
            InstrumentTarget::new("ETH-USDT", "book_levels", 5).unwrap(),
            InstrumentTarget::new("SOL-USDT", "okx_prices_sol", 5).unwrap(),
        ];
        assert_eq!(distinct_destinations(&targets).len(), 2);
    }
}
