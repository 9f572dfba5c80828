//! # Cache Configuration
//!
//! Environment-aware configuration for the result cache. Different
//! environments get different cache behaviors: rapid expiration in tests,
//! moderate retention in development, longer retention in production.

use crate::cache::entry::ExpirationPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::info;

/// Configuration for result cache behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Master switch; a disabled cache is a pass-through
    pub enabled: bool,
    /// TTL used by [`CacheConfig::default_policy`], in seconds
    pub default_ttl_seconds: u64,
    /// Interval between background expiration sweeps, in seconds
    pub cleanup_interval_seconds: u64,
}

impl Default for CacheConfig {
    /// Default configuration suitable for production
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl_seconds: 300,
            cleanup_interval_seconds: 300,
        }
    }
}

impl CacheConfig {
    /// Configuration with caching turned off entirely
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Test-optimized configuration with rapid expiration
    pub fn for_test() -> Self {
        Self {
            enabled: true,
            default_ttl_seconds: 5,
            cleanup_interval_seconds: 10,
        }
    }

    /// Development-optimized configuration
    pub fn for_development() -> Self {
        Self {
            enabled: true,
            default_ttl_seconds: 60,
            cleanup_interval_seconds: 60,
        }
    }

    /// Load configuration from the environment or use defaults
    pub fn from_environment() -> Self {
        let environment = env::var("QUERYKIT_ENV")
            .or_else(|_| env::var("RUST_ENV"))
            .unwrap_or_else(|_| "production".to_string());

        let config = match environment.as_str() {
            "test" => {
                info!("Loading test cache configuration (rapid expiration)");
                Self::for_test()
            }
            "development" => {
                info!("Loading development cache configuration");
                Self::for_development()
            }
            _ => {
                info!("Loading production cache configuration");
                Self::default()
            }
        };

        config.with_env_overrides()
    }

    /// Apply environment variable overrides to configuration
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(enabled) = env::var("QUERYKIT_CACHE_ENABLED") {
            self.enabled = enabled.parse().unwrap_or(self.enabled);
            info!("Cache enabled override: {}", self.enabled);
        }

        if let Ok(ttl) = env::var("QUERYKIT_CACHE_TTL_SECONDS") {
            if let Ok(seconds) = ttl.parse::<u64>() {
                self.default_ttl_seconds = seconds;
                info!("Cache TTL override: {}s", seconds);
            }
        }

        if let Ok(interval) = env::var("QUERYKIT_CACHE_CLEANUP_INTERVAL_SECONDS") {
            if let Ok(seconds) = interval.parse::<u64>() {
                self.cleanup_interval_seconds = seconds;
                info!("Cache cleanup interval override: {}s", seconds);
            }
        }

        self
    }

    /// Check if caching is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Get default TTL as Duration
    pub fn ttl_duration(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }

    /// Get cleanup interval as Duration
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds)
    }

    /// The expiration policy entries get when the caller has no opinion:
    /// a sliding window over the configured default TTL.
    pub fn default_policy(&self) -> ExpirationPolicy {
        ExpirationPolicy::SlidingTtl(self.ttl_duration())
    }
}
