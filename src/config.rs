//! Process configuration.
//!
//! Every option can be given as a flag or through the environment; flags
//! win. Nothing here touches the network or disk, so parsing is cheap to
//! test with [`Config::try_parse_from`](clap::Parser::try_parse_from).

use crate::storage::{
    NamespacedStore, StoreBuilder, SweepSchedule, TouchConfig, DEFAULT_TOUCH_TTL,
};
use clap::Parser;
use std::time::Duration;

/// StashKV server configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "stashkv", version, about = "Namespaced TTL key-value store over HTTP")]
pub struct Config {
    /// Host to bind to
    #[arg(long, env = "HOST", default_value = crate::DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = crate::DEFAULT_PORT)]
    pub port: u16,

    /// Durable backing store (e.g. `sqlite://data/stash.db`). In-memory when unset.
    #[arg(long, env = "STORAGE_URI")]
    pub storage_uri: Option<String>,

    /// Record lifetime in milliseconds. Records never expire when unset or 0.
    #[arg(
        long = "storage-ttl",
        env = "STORAGE_TTL",
        value_parser = clap::value_parser!(u64).range(0..=i64::MAX as u64)
    )]
    pub storage_ttl_ms: Option<u64>,

    /// Refresh expiry with a single SQL update instead of read + rewrite
    #[arg(long, env = "ENABLE_SQL_TOUCH", default_value_t = false)]
    pub enable_sql_touch: bool,

    /// Run the scheduled expiry sweeper (durable mode only)
    #[arg(long, env = "ENABLE_TTL_SWEEPER", default_value_t = false)]
    pub enable_ttl_sweeper: bool,

    /// Hour of day (UTC) for the daily sweep
    #[arg(
        long,
        env = "TTL_SWEEP_HOUR",
        default_value_t = 4,
        value_parser = clap::value_parser!(u32).range(0..24)
    )]
    pub ttl_sweep_hour: u32,

    /// Sweep at a fixed interval instead of daily
    #[arg(long, env = "TTL_SWEEP_INTERVAL_SECS")]
    pub ttl_sweep_interval_secs: Option<u64>,

    /// Largest accepted request body
    #[arg(long, env = "MAX_PAYLOAD_BYTES", default_value_t = crate::DEFAULT_MAX_PAYLOAD)]
    pub max_payload_bytes: usize,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Delete expired records once, print the count and exit
    #[arg(long)]
    pub sweep_once: bool,
}

impl Config {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Configured record lifetime; a TTL of 0 means records never expire.
    pub fn storage_ttl(&self) -> Option<Duration> {
        self.storage_ttl_ms
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis)
    }

    /// Touch refreshes to the store TTL, or one day when none is set.
    pub fn touch_config(&self) -> TouchConfig {
        TouchConfig {
            enabled: self.enable_sql_touch,
            ttl: self.storage_ttl().unwrap_or(DEFAULT_TOUCH_TTL),
        }
    }

    pub fn sweep_schedule(&self) -> SweepSchedule {
        match self.ttl_sweep_interval_secs {
            Some(secs) => SweepSchedule::Every(Duration::from_secs(secs.max(1))),
            None => SweepSchedule::Daily {
                hour: self.ttl_sweep_hour,
                minute: 0,
            },
        }
    }

    /// A store builder with backend, TTL and touch settings applied.
    pub fn store_builder(&self) -> StoreBuilder {
        let builder = NamespacedStore::builder()
            .ttl_opt(self.storage_ttl())
            .touch(self.touch_config());

        match &self.storage_uri {
            Some(uri) => builder.durable(uri.clone()),
            None => builder.memory(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["stashkv"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_flag_overrides() {
        let config = parse(&[
            "--host",
            "0.0.0.0",
            "--port",
            "9000",
            "--storage-uri",
            "sqlite://data/stash.db",
            "--storage-ttl",
            "60000",
            "--enable-sql-touch",
        ]);

        assert_eq!(config.bind_address(), "0.0.0.0:9000");
        assert_eq!(config.storage_uri.as_deref(), Some("sqlite://data/stash.db"));
        assert_eq!(config.storage_ttl(), Some(Duration::from_secs(60)));
        assert_eq!(
            config.touch_config(),
            TouchConfig::enabled(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_touch_ttl_defaults_to_one_day() {
        let config = parse(&["--enable-sql-touch"]);
        assert_eq!(config.touch_config().ttl, Duration::from_millis(86_400_000));
    }

    #[test]
    fn test_sweep_schedule() {
        let config = parse(&["--ttl-sweep-hour", "2"]);
        assert_eq!(
            config.sweep_schedule(),
            SweepSchedule::Daily { hour: 2, minute: 0 }
        );

        let config = parse(&["--ttl-sweep-interval-secs", "300"]);
        assert_eq!(
            config.sweep_schedule(),
            SweepSchedule::Every(Duration::from_secs(300))
        );
    }

    #[test]
    fn test_rejects_invalid_sweep_hour() {
        assert!(Config::try_parse_from(["stashkv", "--ttl-sweep-hour", "24"]).is_err());
    }

    #[test]
    fn test_zero_ttl_disables_expiry() {
        let config = parse(&["--storage-ttl", "0", "--enable-sql-touch"]);

        assert_eq!(config.storage_ttl(), None);
        assert_eq!(config.touch_config().ttl, DEFAULT_TOUCH_TTL);
    }

    #[test]
    fn test_ttl_bounded_to_epoch_millis() {
        let config = parse(&["--storage-ttl", "9223372036854775807"]);
        assert_eq!(
            config.storage_ttl(),
            Some(Duration::from_millis(i64::MAX as u64))
        );

        assert!(
            Config::try_parse_from(["stashkv", "--storage-ttl", "9223372036854775808"]).is_err()
        );
    }

    #[tokio::test]
    async fn test_store_builder_without_uri_is_in_memory() {
        let config = parse(&["--storage-ttl", "1000"]);
        let store = config.store_builder().build().await;

        assert!(!store.is_durable());
        assert_eq!(store.ttl(), Some(Duration::from_secs(1)));
    }
}
