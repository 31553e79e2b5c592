//! Agent configuration (environment variables)

use anyhow::{Context, Result};
use deferq_core::application::constants::{DEFAULT_MAX_RETRIES, DEFAULT_STORE_KEY};
use deferq_core::domain::QueueConfig;
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "~/.deferq/queue.db";
const DEFAULT_DELIVERY_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_PROBE_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_PROBE_INTERVAL_MS: u64 = 5_000;
const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub db_path: String,
    pub store_key: String,
    pub max_retries: u32,
    pub delivery_url: String,
    pub probe_addr: String,
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
    pub request_timeout: Duration,
}

impl AgentConfig {
    /// Load from `DEFERQ_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup (tests pass a map)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup("DEFERQ_DB_PATH")
            .unwrap_or_else(|| shellexpand::tilde(DEFAULT_DB_PATH).into_owned());

        Ok(Self {
            db_path,
            store_key: lookup("DEFERQ_STORE_KEY").unwrap_or_else(|| DEFAULT_STORE_KEY.to_string()),
            max_retries: parse_or(&lookup, "DEFERQ_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            delivery_url: lookup("DEFERQ_DELIVERY_URL")
                .unwrap_or_else(|| DEFAULT_DELIVERY_URL.to_string()),
            probe_addr: lookup("DEFERQ_PROBE_ADDR").unwrap_or_else(|| DEFAULT_PROBE_ADDR.to_string()),
            probe_interval: Duration::from_millis(parse_or(
                &lookup,
                "DEFERQ_PROBE_INTERVAL_MS",
                DEFAULT_PROBE_INTERVAL_MS,
            )?),
            probe_timeout: Duration::from_millis(parse_or(
                &lookup,
                "DEFERQ_PROBE_TIMEOUT_MS",
                DEFAULT_PROBE_TIMEOUT_MS,
            )?),
            request_timeout: Duration::from_millis(parse_or(
                &lookup,
                "DEFERQ_REQUEST_TIMEOUT_MS",
                DEFAULT_REQUEST_TIMEOUT_MS,
            )?),
        })
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig::new(self.store_key.clone(), self.max_retries)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(default),
    }
}
