// HybridDB
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Runtime configuration for the hybrid query core

use crate::cache::item::CacheOptions;
use crate::error::{HybridError, HybridResult};
use crate::query::types::duration_millis;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Result cache sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryCacheConfig {
    /// Maximum number of cached results
    pub max_entries: usize,

    /// Time-to-live of a cached result
    #[serde(with = "duration_millis")]
    pub ttl: Duration,
}

impl Default for QueryCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            ttl: Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Number of executions kept in the history window
    pub history_size: usize,

    /// Executions strictly slower than this are reported as slow
    #[serde(with = "duration_millis")]
    pub slow_query_threshold: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            history_size: 1000,
            slow_query_threshold: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PruningConfig {
    pub enabled: bool,

    /// Delay between two pruning passes
    #[serde(with = "duration_millis")]
    pub interval: Duration,

    /// Upper bound for pruning a single cache
    #[serde(with = "duration_millis")]
    pub pass_timeout: Duration,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(30),
            pass_timeout: Duration::from_secs(2),
        }
    }
}

/// Configuration of the hybrid query runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridConfig {
    pub query_cache: QueryCacheConfig,
    pub monitor: MonitorConfig,

    /// Fast payload tier, bounded by item count
    pub memory_tier: CacheOptions,

    /// Slow payload tier, bounded by bytes; disabled while `disk_path` is unset
    pub disk_tier: CacheOptions,

    /// Copy lower-tier hits into faster tiers
    pub warm_upper_levels: bool,

    pub pruning: PruningConfig,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            query_cache: QueryCacheConfig::default(),
            monitor: MonitorConfig::default(),
            memory_tier: CacheOptions::memory(10_000, Duration::from_secs(10 * 60)),
            disk_tier: CacheOptions {
                disk_path: None,
                ..CacheOptions::disk(PathBuf::new(), 256 * 1024 * 1024, Duration::from_secs(60 * 60))
            },
            warm_upper_levels: true,
            pruning: PruningConfig::default(),
        }
    }
}

impl HybridConfig {
    /// Load configuration from `HYBRIDDB_*` environment variables.
    ///
    /// Unset or unparsable variables keep their default value.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`HybridConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |name: &str, default| parse_or(&lookup, name, default);
        let millis = |name: &str, default: Duration| Duration::from_millis(parse_or(&lookup, name, default.as_millis() as u64));

        Self {
            query_cache: QueryCacheConfig {
                max_entries: parsed("HYBRIDDB_QUERY_CACHE_MAX_ENTRIES", defaults.query_cache.max_entries as u64) as usize,
                ttl: millis("HYBRIDDB_QUERY_CACHE_TTL_MS", defaults.query_cache.ttl),
            },
            monitor: MonitorConfig {
                history_size: parsed("HYBRIDDB_HISTORY_SIZE", defaults.monitor.history_size as u64) as usize,
                slow_query_threshold: millis("HYBRIDDB_SLOW_QUERY_MS", defaults.monitor.slow_query_threshold),
            },
            memory_tier: CacheOptions {
                max_size: parsed("HYBRIDDB_MEMORY_TIER_MAX_ITEMS", defaults.memory_tier.max_size),
                ttl: millis("HYBRIDDB_MEMORY_TIER_TTL_MS", defaults.memory_tier.ttl),
                ..defaults.memory_tier
            },
            disk_tier: CacheOptions {
                max_size: parsed("HYBRIDDB_DISK_TIER_MAX_BYTES", defaults.disk_tier.max_size),
                ttl: millis("HYBRIDDB_DISK_TIER_TTL_MS", defaults.disk_tier.ttl),
                disk_path: lookup("HYBRIDDB_DISK_TIER_PATH").filter(|path| !path.trim().is_empty()).map(PathBuf::from),
                ..defaults.disk_tier
            },
            warm_upper_levels: parse_or(&lookup, "HYBRIDDB_WARM_UPPER_LEVELS", defaults.warm_upper_levels),
            pruning: PruningConfig {
                enabled: parse_or(&lookup, "HYBRIDDB_PRUNING_ENABLED", defaults.pruning.enabled),
                interval: millis("HYBRIDDB_PRUNING_INTERVAL_MS", defaults.pruning.interval),
                pass_timeout: millis("HYBRIDDB_PRUNING_TIMEOUT_MS", defaults.pruning.pass_timeout),
            },
        }
    }

    pub fn validate(&self) -> HybridResult<()> {
        let checks = [
            (self.query_cache.max_entries == 0, "query_cache.max_entries must be positive"),
            (self.monitor.history_size == 0, "monitor.history_size must be positive"),
            (self.memory_tier.max_size == 0, "memory_tier.max_size must be positive"),
            (self.disk_tier.max_size == 0, "disk_tier.max_size must be positive"),
            (self.pruning.enabled && self.pruning.interval.is_zero(), "pruning.interval must be positive"),
            (self.pruning.enabled && self.pruning.pass_timeout.is_zero(), "pruning.pass_timeout must be positive"),
        ];
        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, message)) => Err(HybridError::Configuration(message.to_string())),
            None => Ok(()),
        }
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(name).and_then(|value| value.trim().parse().ok()).unwrap_or(default)
}
