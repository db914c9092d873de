//! Cache configuration.
//!
//! Defaults match a small interactive session: ten resident documents, each
//! kept for five minutes after its last use. The global registry reads
//! overrides from the environment:
//!
//! | Variable                    | Meaning                               |
//! |-----------------------------|---------------------------------------|
//! | `SHEETCACHE_CACHE_SIZE`     | capacity, in handles (> 0)            |
//! | `SHEETCACHE_CACHE_TTL`      | time-to-live in seconds, may be fractional |
//! | `SHEETCACHE_SAVE_ON_EVICT`  | `true`, `1` or `yes` to save dirty handles on eviction |
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::common::{Error, Result};

pub const DEFAULT_CAPACITY: usize = 10;
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

pub const ENV_CACHE_SIZE: &str = "SHEETCACHE_CACHE_SIZE";
pub const ENV_CACHE_TTL: &str = "SHEETCACHE_CACHE_TTL";
pub const ENV_SAVE_ON_EVICT: &str = "SHEETCACHE_SAVE_ON_EVICT";

/// TTLs below this are allowed but almost always a mistake.
const SHORT_TTL_WARNING: Duration = Duration::from_secs(60);

/// Eviction policy of a [`HandleCache`](super::HandleCache).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheConfig {
    /// Maximum number of resident handles.
    pub capacity: usize,
    /// Idle time after which a handle is discarded.
    #[serde(serialize_with = "serialize_secs")]
    pub ttl: Duration,
    /// Save dirty, writable handles when they are evicted for room.
    pub save_on_evict: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            ttl: DEFAULT_TTL,
            save_on_evict: false,
        }
    }
}

impl CacheConfig {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            save_on_evict: false,
        }
    }

    pub fn with_save_on_evict(mut self, save_on_evict: bool) -> Self {
        self.save_on_evict = save_on_evict;
        self
    }

    /// Check the configuration before it is applied to a cache.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::invalid_operation("cache capacity must be greater than 0"));
        }
        Ok(())
    }

    /// Read the configuration from the process environment.
    ///
    /// Never fails: unusable values are logged and replaced by defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_CACHE_SIZE) {
            match raw.trim().parse::<usize>() {
                Ok(0) => {
                    tracing::warn!(var = ENV_CACHE_SIZE, "cache capacity 0 is not allowed, using 1");
                    config.capacity = 1;
                },
                Ok(capacity) => config.capacity = capacity,
                Err(_) => tracing::warn!(
                    var = ENV_CACHE_SIZE,
                    value = %raw,
                    default = DEFAULT_CAPACITY,
                    "invalid cache capacity, using default"
                ),
            }
        }

        if let Some(raw) = lookup(ENV_CACHE_TTL) {
            match fast_float2::parse::<f64, _>(raw.trim()) {
                Ok(secs) => match ttl_from_secs(secs) {
                    Ok(ttl) => config.ttl = ttl,
                    Err(_) => tracing::warn!(
                        var = ENV_CACHE_TTL,
                        value = %raw,
                        "cache TTL must be finite and not negative, using default"
                    ),
                },
                Err(_) => tracing::warn!(
                    var = ENV_CACHE_TTL,
                    value = %raw,
                    "invalid cache TTL, using default"
                ),
            }
        }

        if let Some(raw) = lookup(ENV_SAVE_ON_EVICT) {
            config.save_on_evict = matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "yes"
            );
        }

        if config.ttl < SHORT_TTL_WARNING {
            tracing::warn!(
                ttl_seconds = config.ttl.as_secs_f64(),
                "cache TTL under one minute, documents will be reloaded often"
            );
        }

        config
    }
}

/// Convert a TTL in seconds, rejecting negative and non-finite values.
pub fn ttl_from_secs(secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(Error::invalid_operation(format!(
            "cache TTL must be a finite number of seconds >= 0, got {}",
            secs
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| Error::invalid_operation(format!("cache TTL {}s: {}", secs, e)))
}

fn serialize_secs<S: Serializer>(ttl: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(ttl.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CacheConfig::from_lookup(lookup(&[]));
        assert_eq!(config, CacheConfig::default());
        assert_eq!(config.capacity, 10);
        assert_eq!(config.ttl, Duration::from_secs(300));
        assert!(!config.save_on_evict);
    }

    #[test]
    fn test_overrides() {
        let config = CacheConfig::from_lookup(lookup(&[
            (ENV_CACHE_SIZE, " 25 "),
            (ENV_CACHE_TTL, "90.5"),
            (ENV_SAVE_ON_EVICT, "Yes"),
        ]));
        assert_eq!(config.capacity, 25);
        assert_eq!(config.ttl, Duration::from_millis(90_500));
        assert!(config.save_on_evict);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = CacheConfig::from_lookup(lookup(&[
            (ENV_CACHE_SIZE, "lots"),
            (ENV_CACHE_TTL, "-5"),
            (ENV_SAVE_ON_EVICT, "sometimes"),
        ]));
        assert_eq!(config, CacheConfig::default());

        let config = CacheConfig::from_lookup(lookup(&[(ENV_CACHE_TTL, "forever")]));
        assert_eq!(config.ttl, DEFAULT_TTL);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let config = CacheConfig::from_lookup(lookup(&[(ENV_CACHE_SIZE, "0")]));
        assert_eq!(config.capacity, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_short_ttl_is_accepted() {
        let config = CacheConfig::from_lookup(lookup(&[(ENV_CACHE_TTL, "0")]));
        assert_eq!(config.ttl, Duration::ZERO);
    }

    #[test]
    fn test_validate() {
        assert!(CacheConfig::default().validate().is_ok());
        let err = CacheConfig::new(0, DEFAULT_TTL).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
    }

    #[test]
    fn test_ttl_from_secs() {
        assert_eq!(ttl_from_secs(1.5).unwrap(), Duration::from_millis(1500));
        assert_eq!(ttl_from_secs(0.0).unwrap(), Duration::ZERO);
        assert!(ttl_from_secs(-0.1).is_err());
        assert!(ttl_from_secs(f64::NAN).is_err());
        assert!(ttl_from_secs(f64::INFINITY).is_err());
    }
}
