//! Server configuration read from environment variables.
//!
//! * `RIGHTS_DATABASE_URL`: Postgres connection string (required)
//! * `RIGHTS_JWT_SECRET`: JWT HMAC secret (required)
//! * `RIGHTS_METRIC_SERVICE_URL`: base URL of the metric catalog service (required)
//! * `RIGHTS_BIND_ADDR`: listen address (default `0.0.0.0:4200`)
//! * `RIGHTS_DB_POOL_SIZE`: max pooled connections (default 10)
//! * `RIGHTS_METRIC_TIMEOUT_MS`: metric catalog request timeout (default 5000)

use std::time::Duration;

use anyhow::{anyhow, Context};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub metric_service_url: String,
    pub bind_addr: String,
    pub db_pool_size: u32,
    pub metric_timeout: Duration,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| get(key).ok_or_else(|| anyhow!("{key} must be set"));

        let db_pool_size = match get("RIGHTS_DB_POOL_SIZE") {
            Some(v) => v
                .parse()
                .with_context(|| format!("RIGHTS_DB_POOL_SIZE is not a number: {v}"))?,
            None => 10,
        };
        let metric_timeout_ms: u64 = match get("RIGHTS_METRIC_TIMEOUT_MS") {
            Some(v) => v
                .parse()
                .with_context(|| format!("RIGHTS_METRIC_TIMEOUT_MS is not a number: {v}"))?,
            None => 5000,
        };

        Ok(Self {
            database_url: required("RIGHTS_DATABASE_URL")?,
            jwt_secret: required("RIGHTS_JWT_SECRET")?,
            metric_service_url: required("RIGHTS_METRIC_SERVICE_URL")?,
            bind_addr: get("RIGHTS_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:4200".into()),
            db_pool_size,
            metric_timeout: Duration::from_millis(metric_timeout_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("RIGHTS_DATABASE_URL", "postgresql:///rights"),
        ("RIGHTS_JWT_SECRET", "secret"),
        ("RIGHTS_METRIC_SERVICE_URL", "http://metrics:8080"),
    ];

    #[test]
    fn defaults_apply() {
        let cfg = ServerConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:4200");
        assert_eq!(cfg.db_pool_size, 10);
        assert_eq!(cfg.metric_timeout, Duration::from_millis(5000));
    }

    #[test]
    fn missing_secret_is_an_error() {
        let err = ServerConfig::from_lookup(lookup(&[
            ("RIGHTS_DATABASE_URL", "postgresql:///rights"),
            ("RIGHTS_JWT_SECRET", "  "),
            ("RIGHTS_METRIC_SERVICE_URL", "http://metrics:8080"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("RIGHTS_JWT_SECRET"));
    }

    #[test]
    fn bad_pool_size_is_an_error() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RIGHTS_DB_POOL_SIZE", "many"));
        assert!(ServerConfig::from_lookup(lookup(&pairs)).is_err());
    }
}
