//! Configuration types for resource-loader

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration for [`ResourceLoader`](crate::ResourceLoader)
///
/// Fields are organized into sub-configs:
/// - [`cache`](CacheConfig): in-memory cache sizing
/// - [`http`](HttpConfig): HTTP client behaviour (timeouts, redirects)
///
/// The callback delivery context is not part of this struct because it is a
/// runtime object; see [`Delivery`](crate::Delivery).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// In-memory cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,
}

impl Config {
    /// Check the configuration for values the loader cannot work with
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the offending key if:
    /// - `http.user_agent` is empty
    /// - `http.connect_timeout` or `http.request_timeout` is zero
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(Error::Config {
                message: "user agent must not be empty".to_string(),
                key: Some("http.user_agent".to_string()),
            });
        }
        if self.http.connect_timeout.is_zero() {
            return Err(Error::Config {
                message: "connect timeout must be greater than zero".to_string(),
                key: Some("http.connect_timeout".to_string()),
            });
        }
        if self.http.request_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::Config {
                message: "request timeout must be greater than zero".to_string(),
                key: Some("http.request_timeout".to_string()),
            });
        }
        Ok(())
    }
}

/// In-memory cache configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of payload bytes kept in memory (default: 2 MiB)
    ///
    /// Zero disables caching of anything but empty payloads.
    #[serde(default = "default_cache_capacity")]
    pub capacity_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity_bytes: default_cache_capacity(),
        }
    }
}

/// HTTP client configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpConfig {
    /// Total time allowed for one request including the body (None = no limit)
    #[serde(default, with = "optional_duration_serde")]
    pub request_timeout: Option<Duration>,

    /// Time allowed to establish a connection (default: 30 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum number of redirects followed by one transfer (default: 10)
    ///
    /// Zero makes every redirect fail with
    /// [`Error::TooManyRedirects`](crate::Error::TooManyRedirects).
    ///
    /// A 3xx response without a `Location` header, such as `304 Not Modified`,
    /// is not followed and fails with
    /// [`Error::InvalidRedirect`](crate::Error::InvalidRedirect).
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: None,
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
            max_redirects: default_max_redirects(),
        }
    }
}

fn default_cache_capacity() -> usize {
    2048 * 1024
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_max_redirects() -> usize {
    10
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.cache.capacity_bytes, 2 * 1024 * 1024);
        assert_eq!(config.http.max_redirects, 10);
        assert_eq!(config.http.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.http.request_timeout, None);
        assert!(config.http.user_agent.starts_with("resource-loader/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_json_deserializes_to_defaults() {
        let config: Config = serde_json::from_str("{}").expect("deserialize failed");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_json_keeps_remaining_defaults() {
        let json = r#"{
            "cache": { "capacity_bytes": 4096 },
            "http": { "request_timeout": 15, "max_redirects": 3 }
        }"#;
        let config: Config = serde_json::from_str(json).expect("deserialize failed");

        assert_eq!(config.cache.capacity_bytes, 4096);
        assert_eq!(config.http.request_timeout, Some(Duration::from_secs(15)));
        assert_eq!(config.http.max_redirects, 3);
        assert_eq!(config.http.connect_timeout, Duration::from_secs(30));
    }

    #[test]
    fn serialization_round_trips_durations_as_seconds() {
        let mut config = Config::default();
        config.http.request_timeout = Some(Duration::from_secs(90));

        let json = serde_json::to_value(&config).expect("serialize failed");
        assert_eq!(json["http"]["request_timeout"], 90);
        assert_eq!(json["http"]["connect_timeout"], 30);

        let back: Config = serde_json::from_value(json).expect("deserialize failed");
        assert_eq!(back, config);
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.http.user_agent = "   ".to_string();

        match config.validate() {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("http.user_agent"));
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_zero_timeouts() {
        let mut config = Config::default();
        config.http.connect_timeout = Duration::ZERO;
        assert!(matches!(
            config.validate(),
            Err(Error::Config { key: Some(k), .. }) if k == "http.connect_timeout"
        ));

        let mut config = Config::default();
        config.http.request_timeout = Some(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(Error::Config { key: Some(k), .. }) if k == "http.request_timeout"
        ));
    }

    #[test]
    fn zero_redirects_and_zero_capacity_are_valid() {
        let mut config = Config::default();
        config.http.max_redirects = 0;
        config.cache.capacity_bytes = 0;
        assert!(config.validate().is_ok());
    }
}
