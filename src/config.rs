use std::time::Duration;

use anyhow::{bail, Context};

/// Which record store backs the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres { database_url: String },
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreBackend,
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
    /// Upper bound on one conditional-write round trip.
    pub store_timeout: Duration,
    /// Read-to-write window of the unguarded (v1) stock endpoint.
    pub unguarded_delay: Duration,
    pub seed_on_start: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup (the process env in production, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let backend = lookup("STORE_BACKEND").unwrap_or_else(|| "postgres".to_string());
        let store = match backend.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => StoreBackend::Postgres {
                database_url: lookup("DATABASE_URL")
                    .context("DATABASE_URL must be set when STORE_BACKEND=postgres")?,
            },
            "memory" | "mem" => StoreBackend::Memory,
            other => bail!("STORE_BACKEND must be `postgres` or `memory`, got `{}`", other),
        };

        Ok(Self {
            store,
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: lookup("PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            max_connections: lookup("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|| "20".to_string())
                .parse()
                .context("DB_MAX_CONNECTIONS must be a valid number")?,
            store_timeout: Duration::from_millis(
                lookup("STORE_TIMEOUT_MS")
                    .unwrap_or_else(|| "2000".to_string())
                    .parse()
                    .context("STORE_TIMEOUT_MS must be a number of milliseconds")?,
            ),
            unguarded_delay: Duration::from_millis(
                lookup("UNGUARDED_DELAY_MS")
                    .unwrap_or_else(|| "100".to_string())
                    .parse()
                    .context("UNGUARDED_DELAY_MS must be a number of milliseconds")?,
            ),
            seed_on_start: parse_flag(lookup("SEED_ON_START").as_deref(), true)
                .context("SEED_ON_START must be true or false")?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_flag(raw: Option<&str>, default: bool) -> anyhow::Result<bool> {
    match raw.map(|s| s.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => bail!("unrecognised flag value `{}`", v),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_require_database_url() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn postgres_defaults() {
        let cfg = Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://x/y")])).unwrap();
        assert_eq!(
            cfg.store,
            StoreBackend::Postgres { database_url: "postgres://x/y".to_string() }
        );
        assert_eq!(cfg.bind_addr(), "127.0.0.1:3000");
        assert_eq!(cfg.max_connections, 20);
        assert_eq!(cfg.store_timeout, Duration::from_millis(2000));
        assert_eq!(cfg.unguarded_delay, Duration::from_millis(100));
        assert!(cfg.seed_on_start);
    }

    #[test]
    fn memory_backend_with_overrides() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("STORE_BACKEND", "Memory"),
            ("PORT", "8080"),
            ("STORE_TIMEOUT_MS", "250"),
            ("UNGUARDED_DELAY_MS", "0"),
            ("SEED_ON_START", "off"),
        ]))
        .unwrap();
        assert_eq!(cfg.store, StoreBackend::Memory);
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.store_timeout, Duration::from_millis(250));
        assert_eq!(cfg.unguarded_delay, Duration::ZERO);
        assert!(!cfg.seed_on_start);
    }

    #[test]
    fn rejects_unknown_backend_and_bad_numbers() {
        assert!(Config::from_lookup(lookup_from(&[("STORE_BACKEND", "redis")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[
            ("STORE_BACKEND", "memory"),
            ("PORT", "not-a-port"),
        ]))
        .is_err());
        assert!(Config::from_lookup(lookup_from(&[
            ("STORE_BACKEND", "memory"),
            ("SEED_ON_START", "maybe"),
        ]))
        .is_err());
    }
}
