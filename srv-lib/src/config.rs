use log::warn;
use std::env::var;
use std::str::FromStr;
use std::time::Duration;

use crate::ttl::{DEFAULT_MAX_VALIDITY, MAX_VALIDITY_CEILING};

pub const MAX_SIZE: usize = 1024 * 1024 * 5 + 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Redis,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(format!("unknown store {other:?}")),
        }
    }
}

/// Knobs the paste service itself cares about.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub store_timeout: Duration,
    pub max_validity: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(2),
            max_validity: DEFAULT_MAX_VALIDITY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    pub base_path: String,
    pub store: StoreKind,
    pub redis_url: String,
    pub max_size: usize,
    pub sweep_interval: Duration,
    pub service: ServiceConfig,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |name: &str| {
            lookup(name).and_then(|v| {
                let v = v.trim().to_string();
                if v.is_empty() { None } else { Some((name.to_string(), v)) }
            })
        };

        let port = parsed("PORT")
            .and_then(|(n, v)| or_warn(&n, v.parse::<u16>()))
            .unwrap_or(8080);

        let store = parsed("STORE")
            .and_then(|(n, v)| or_warn(&n, v.parse::<StoreKind>()))
            .unwrap_or(StoreKind::Memory);

        let max_size = parsed("MAX_SIZE")
            .and_then(|(n, v)| or_warn(&n, v.parse::<usize>()))
            .unwrap_or(MAX_SIZE);

        let store_timeout = parsed("STORE_TIMEOUT_MS")
            .and_then(|(n, v)| or_warn(&n, v.parse::<u64>()))
            .filter(|ms| *ms > 0)
            .map_or(Duration::from_secs(2), Duration::from_millis);

        let max_validity = parsed("MAX_TTL")
            .and_then(|(n, v)| or_warn(&n, humantime::parse_duration(&v)))
            .filter(|d| !d.is_zero())
            .map_or(DEFAULT_MAX_VALIDITY, |d| d.min(MAX_VALIDITY_CEILING));

        let sweep_interval = parsed("SWEEP_INTERVAL_SECS")
            .and_then(|(n, v)| or_warn(&n, v.parse::<u64>()))
            .filter(|s| *s > 0)
            .map_or(Duration::from_secs(60), Duration::from_secs);

        Self {
            address: parsed("ADDRESS").map_or("127.0.0.1".to_string(), |(_, v)| v),
            port,
            base_path: parsed("BASE_PATH").map_or(String::new(), |(_, v)| normalize_base_path(&v)),
            store,
            redis_url: parsed("REDIS_URL").map_or("redis://127.0.0.1/".to_string(), |(_, v)| v),
            max_size,
            sweep_interval,
            service: ServiceConfig {
                store_timeout,
                max_validity,
            },
        }
    }
}

fn or_warn<T, E: std::fmt::Display>(name: &str, result: Result<T, E>) -> Option<T> {
    result
        .inspect_err(|e| warn!("Ignoring invalid {name}: {e}"))
        .ok()
}

/// `"paste/"` and `"/paste"` both become `"/paste"`; empty stays empty.
pub fn normalize_base_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
