//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use inventory::ReservationPolicy;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; the in-memory store is
///   used when unset
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `REDIS_URL`: Redis server holding the stock counters and product
///   cache; an in-process store is used when unset
/// - `COUNTER_TIMEOUT_MS`: counter store call timeout (default: `50`)
/// - `DURABLE_TIMEOUT_MS`: durable store call timeout (default: `5000`)
/// - `PRODUCT_CACHE_TTL_SECS`: product detail cache lifetime (default: `300`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub redis_url: Option<String>,
    pub counter_timeout_ms: u64,
    pub durable_timeout_ms: u64,
    pub product_cache_ttl_secs: u64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`. Unparseable values fall back to
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(lookup("PORT"), defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            database_max_connections: parse_or(
                lookup("DATABASE_MAX_CONNECTIONS"),
                defaults.database_max_connections,
            ),
            redis_url: lookup("REDIS_URL").filter(|url| !url.is_empty()),
            counter_timeout_ms: parse_or(lookup("COUNTER_TIMEOUT_MS"), defaults.counter_timeout_ms),
            durable_timeout_ms: parse_or(lookup("DURABLE_TIMEOUT_MS"), defaults.durable_timeout_ms),
            product_cache_ttl_secs: parse_or(
                lookup("PRODUCT_CACHE_TTL_SECS"),
                defaults.product_cache_ttl_secs,
            ),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the store timeouts and cache lifetime for the inventory services.
    pub fn policy(&self) -> ReservationPolicy {
        ReservationPolicy::default()
            .with_counter_timeout(Duration::from_millis(self.counter_timeout_ms))
            .with_durable_timeout(Duration::from_millis(self.durable_timeout_ms))
            .with_detail_ttl(Duration::from_secs(self.product_cache_ttl_secs))
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: 10,
            redis_url: None,
            counter_timeout_ms: 50,
            durable_timeout_ms: 5000,
            product_cache_ttl_secs: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.database_url, None);
        assert_eq!(config.redis_url, None);
        assert_eq!(config.policy(), ReservationPolicy::default());
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        assert_eq!(from_pairs(&[]), Config::default());
    }

    #[test]
    fn test_reads_variables() {
        let config = from_pairs(&[
            ("PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("REDIS_URL", "redis://cache:6379"),
            ("COUNTER_TIMEOUT_MS", "20"),
            ("DURABLE_TIMEOUT_MS", "1500"),
            ("PRODUCT_CACHE_TTL_SECS", "60"),
        ]);

        assert_eq!(config.port, 8080);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/shop")
        );
        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379"));
        let policy = config.policy();
        assert_eq!(policy.counter_timeout, Duration::from_millis(20));
        assert_eq!(policy.durable_timeout, Duration::from_millis(1500));
        assert_eq!(policy.detail_ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_empty_urls_select_in_process_backends() {
        let config = from_pairs(&[("DATABASE_URL", ""), ("REDIS_URL", "")]);
        assert_eq!(config.database_url, None);
        assert_eq!(config.redis_url, None);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_pairs(&[("PORT", "http"), ("COUNTER_TIMEOUT_MS", "-1")]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.counter_timeout_ms, 50);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }
}
