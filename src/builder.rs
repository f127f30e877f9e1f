//! Database builder for flexible configuration
//!
//! This module provides a builder pattern for opening a [`CensusDb`] over
//! either backend. The caller picks the backend once, at startup.

use crate::config::Config;
use crate::db::CensusDb;
use crate::error::{CensusError, Result};
use crate::storage::StorageBackend;
use crate::storage::backends::SqliteBackend;
#[cfg(feature = "postgres")]
use crate::storage::backends::PostgisBackend;
use std::path::PathBuf;

/// Where the dataset lives.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Sqlite(PathBuf),
    #[cfg(feature = "postgres")]
    Postgres(String),
}

/// Builder for a [`CensusDb`] with a chosen backend and settings.
#[derive(Debug, Default)]
pub struct DBBuilder {
    source: Option<Source>,
    config: Config,
}

impl DBBuilder {
    /// Create a new builder with the default configuration and no backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the read-only SQLite file at `path` (emulated spatial support).
    pub fn sqlite<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.source = Some(Source::Sqlite(path.into()));
        self
    }

    /// Use a PostGIS database (native spatial support).
    #[cfg(feature = "postgres")]
    pub fn postgres(mut self, url: impl Into<String>) -> Self {
        self.source = Some(Source::Postgres(url.into()));
        self
    }

    /// Set the engine configuration (pool sizing, limits, box rule).
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Validate the configuration, open the backend and wrap it.
    pub fn build(self) -> Result<CensusDb> {
        self.config.validate().map_err(CensusError::Config)?;

        let backend: Box<dyn StorageBackend> = match self.source {
            Some(Source::Sqlite(path)) => Box::new(SqliteBackend::open(path, &self.config)?),
            #[cfg(feature = "postgres")]
            Some(Source::Postgres(url)) => Box::new(PostgisBackend::connect(&url, &self.config)?),
            None => {
                return Err(CensusError::Config(
                    "no backend selected; call sqlite() or postgres() first".to_string(),
                ));
            }
        };

        Ok(CensusDb::from_boxed(backend, self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use std::time::Duration;

    #[test]
    fn test_builder_default() {
        let builder = DBBuilder::new();
        assert!(builder.source.is_none());
        assert_eq!(builder.config.row_limit, 500);
    }

    #[test]
    fn test_builder_without_backend_fails() {
        let err = DBBuilder::new().build().unwrap_err();
        assert!(matches!(err, CensusError::Config(_)));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let config = Config {
            pool: PoolConfig {
                max_size: 0,
                acquire_timeout_ms: 10,
            },
            ..Config::default()
        };
        let err = DBBuilder::new()
            .sqlite("/nonexistent/census.sqlite")
            .config(config)
            .build()
            .unwrap_err();
        assert!(matches!(err, CensusError::Config(_)));
    }

    #[test]
    fn test_builder_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = DBBuilder::new()
            .sqlite(dir.path().join("missing.sqlite"))
            .config(Config::default().with_acquire_timeout(Duration::from_millis(50)))
            .build()
            .unwrap_err();
        assert!(matches!(err, CensusError::BackendUnavailable(_)));
        assert!(!err.is_bad_input());
    }

    #[test]
    fn test_last_source_wins() {
        let builder = DBBuilder::new().sqlite("a.sqlite").sqlite("b.sqlite");
        assert_eq!(builder.source, Some(Source::Sqlite(PathBuf::from("b.sqlite"))));
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn test_builder_rejects_bad_postgres_url() {
        let err = DBBuilder::new()
            .postgres("postgres://host:notaport/db")
            .build()
            .unwrap_err();
        assert!(matches!(err, CensusError::Config(_)));
    }
}
