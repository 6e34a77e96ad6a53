//! # Node Configuration
//!
//! Explicit configuration handed to [`LocalNode::bootstrap`](crate::LocalNode::bootstrap).
//! Nothing is read from global state; `from_json_file` and `from_env` are
//! helpers for building the value.

use serde::{Deserialize, Serialize};
use shared_bus::DEFAULT_CHANNEL_CAPACITY;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Complete local node configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node home directory (`config/genesis.json` lives under it).
    pub home: PathBuf,
    /// Transaction indexing.
    pub tx_index: TxIndexConfig,
    /// Event bus sizing.
    pub event_bus: EventBusConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

/// Which transaction indexer to run.
///
/// Config files and environment overrides share one parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IndexerKind {
    /// Key-value indexer.
    #[default]
    Kv,
    /// Indexing disabled.
    Null,
}

impl FromStr for IndexerKind {
    type Err = std::convert::Infallible;

    /// `"kv"` selects the keyed indexer; anything else disables indexing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s.trim().eq_ignore_ascii_case("kv") {
            IndexerKind::Kv
        } else {
            IndexerKind::Null
        })
    }
}

impl From<String> for IndexerKind {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl From<IndexerKind> for String {
    fn from(kind: IndexerKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for IndexerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexerKind::Kv => f.write_str("kv"),
            IndexerKind::Null => f.write_str("null"),
        }
    }
}

/// Transaction indexing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TxIndexConfig {
    pub indexer: IndexerKind,
}

/// Event bus configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventBusConfig {
    /// Events buffered per subscriber before it is considered lagging.
    pub capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (trace, debug, info, warn, error, or an env-filter
    /// expression).
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("event_bus.capacity must be at least 1")]
    ZeroBusCapacity,

    #[error("logging.level must not be empty")]
    EmptyLogLevel,
}

impl NodeConfig {
    /// Defaults rooted at `home`.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            ..Self::default()
        }
    }

    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `QC_HOME`: Node home (default: current directory)
    /// - `QC_TX_INDEXER`: `kv` or anything else for null (default: kv)
    /// - `QC_EVENT_BUS_CAPACITY`: Bus buffer per subscriber (default: 1000)
    /// - `QC_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `QC_JSON_LOGS`: Enable JSON logs (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            home: env::var("QC_HOME").map(PathBuf::from).unwrap_or(defaults.home),

            tx_index: TxIndexConfig {
                indexer: env::var("QC_TX_INDEXER")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.tx_index.indexer),
            },

            event_bus: EventBusConfig {
                capacity: env::var("QC_EVENT_BUS_CAPACITY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.event_bus.capacity),
            },

            logging: LoggingConfig {
                level: env::var("QC_LOG_LEVEL")
                    .or_else(|_| env::var("RUST_LOG"))
                    .unwrap_or(defaults.logging.level),
                json: env::var("QC_JSON_LOGS")
                    .map(|v| v.to_lowercase() == "true" || v == "1")
                    .unwrap_or(defaults.logging.json),
            },
        }
    }

    /// Reject values the node cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_bus.capacity == 0 {
            return Err(ConfigError::ZeroBusCapacity);
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::EmptyLogLevel);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.tx_index.indexer, IndexerKind::Kv);
        assert_eq!(config.event_bus.capacity, 1000);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_indexer_kind_parse() {
        assert_eq!("kv".parse::<IndexerKind>(), Ok(IndexerKind::Kv));
        assert_eq!("KV".parse::<IndexerKind>(), Ok(IndexerKind::Kv));
        assert_eq!("null".parse::<IndexerKind>(), Ok(IndexerKind::Null));
        assert_eq!("psql".parse::<IndexerKind>(), Ok(IndexerKind::Null));
        assert_eq!("".parse::<IndexerKind>(), Ok(IndexerKind::Null));
    }

    #[test]
    fn test_from_json_file_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.json");
        std::fs::write(
            &path,
            br#"{"home":"/var/node","tx_index":{"indexer":"null"}}"#,
        )
        .unwrap();

        let config = NodeConfig::from_json_file(&path).unwrap();
        assert_eq!(config.home, PathBuf::from("/var/node"));
        assert_eq!(config.tx_index.indexer, IndexerKind::Null);
        assert_eq!(config.event_bus, EventBusConfig::default());
    }

    #[test]
    fn test_indexer_kind_file_matches_env_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.json");
        for (raw, expected) in [
            ("psql", IndexerKind::Null),
            ("", IndexerKind::Null),
            ("KV", IndexerKind::Kv),
            (" kv ", IndexerKind::Kv),
        ] {
            let json = format!(r#"{{"tx_index":{{"indexer":"{raw}"}}}}"#);
            std::fs::write(&path, json).unwrap();
            let config = NodeConfig::from_json_file(&path).unwrap();
            assert_eq!(config.tx_index.indexer, expected, "indexer {raw:?}");
            assert_eq!(raw.parse::<IndexerKind>(), Ok(expected));
        }

        let out = serde_json::to_string(&TxIndexConfig::default()).unwrap();
        assert_eq!(out, r#"{"indexer":"kv"}"#);
    }

    #[test]
    fn test_from_json_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            NodeConfig::from_json_file(&dir.path().join("missing.json")),
            Err(ConfigError::Io { .. })
        ));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, b"{not json").unwrap();
        assert!(matches!(
            NodeConfig::from_json_file(&bad),
            Err(ConfigError::Parse { .. })
        ));

        let zero = dir.path().join("zero.json");
        std::fs::write(&zero, br#"{"event_bus":{"capacity":0}}"#).unwrap();
        assert!(matches!(
            NodeConfig::from_json_file(&zero),
            Err(ConfigError::ZeroBusCapacity)
        ));
    }

    #[test]
    fn test_with_home() {
        let config = NodeConfig::with_home("/tmp/qc");
        assert_eq!(config.home, PathBuf::from("/tmp/qc"));
        assert_eq!(config.tx_index, TxIndexConfig::default());
    }
}
