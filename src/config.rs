//! Engine configuration.
//!
//! Connection strings and file paths are supplied by the caller when a
//! backend is opened; only tuning knobs live here.
use serde::de::Error;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Rule used by the emulated backend to compare unit boxes with the query box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxMatch {
    /// A unit is a candidate only when its whole box lies inside the query
    /// box. Units straddling the query edge are missed.
    #[default]
    Contained,
    /// A unit is a candidate when its box overlaps the query box at all.
    Intersecting,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub pool: PoolConfig,

    /// Upper bound on rows returned by one attribute-row query.
    #[serde(default = "Config::default_row_limit")]
    pub row_limit: usize,

    /// Page size used when an id listing does not name a limit.
    #[serde(default = "Config::default_id_limit")]
    pub default_id_limit: usize,

    #[serde(default)]
    pub box_match: BoxMatch,

    /// Spatial reference of the native backend's geometry column.
    #[serde(default = "Config::default_srid")]
    pub srid: i32,
}

/// Connection pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    /// Maximum number of pooled connections.
    #[serde(default = "PoolConfig::default_max_size")]
    pub max_size: u32,

    /// How long a query waits for a free connection before failing.
    #[serde(default = "PoolConfig::default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

impl PoolConfig {
    const fn default_max_size() -> u32 {
        8
    }

    const fn default_acquire_timeout_ms() -> u64 {
        5_000
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: Self::default_max_size(),
            acquire_timeout_ms: Self::default_acquire_timeout_ms(),
        }
    }
}

impl Config {
    const fn default_row_limit() -> usize {
        500
    }

    const fn default_id_limit() -> usize {
        10_000
    }

    /// NAD83, the datum TIGER/Line shapefiles ship in.
    const fn default_srid() -> i32 {
        4269
    }

    pub fn with_pool_size(mut self, max_size: u32) -> Self {
        assert!(max_size > 0, "Pool size must be greater than zero");

        if max_size > 256 {
            log::warn!(
                "Pool size of {} is very large; every connection is held open for the \
                lifetime of the backend.",
                max_size
            );
        }

        self.pool.max_size = max_size;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.pool.acquire_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_row_limit(mut self, row_limit: usize) -> Self {
        assert!(row_limit > 0, "Row limit must be greater than zero");
        self.row_limit = row_limit;
        self
    }

    pub fn with_default_id_limit(mut self, limit: usize) -> Self {
        self.default_id_limit = limit;
        self
    }

    pub fn with_box_match(mut self, rule: BoxMatch) -> Self {
        self.box_match = rule;
        self
    }

    pub fn with_srid(mut self, srid: i32) -> Self {
        self.srid = srid;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.pool.max_size == 0 {
            return Err("Pool size must be greater than zero".to_string());
        }

        if self.pool.acquire_timeout_ms == 0 {
            return Err("Acquire timeout must be greater than zero".to_string());
        }

        if self.row_limit == 0 {
            return Err("Row limit must be greater than zero".to_string());
        }

        if self.srid <= 0 {
            return Err(format!("SRID must be positive, got {}", self.srid));
        }

        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let config: Config = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            row_limit: Self::default_row_limit(),
            default_id_limit: Self::default_id_limit(),
            box_match: BoxMatch::default(),
            srid: Self::default_srid(),
        }
    }
}
