//! # Genesis Providers
//!
//! Static and file-backed sources of the genesis document.

use crate::domain::errors::GenesisError;
use crate::ports::outbound::GenesisProvider;
use shared_types::GenesisDoc;
use std::path::{Path, PathBuf};

/// Serves a genesis document held in memory.
pub struct StaticGenesisProvider {
    doc: GenesisDoc,
}

impl StaticGenesisProvider {
    pub fn new(doc: GenesisDoc) -> Self {
        Self { doc }
    }
}

impl GenesisProvider for StaticGenesisProvider {
    fn genesis_doc(&self) -> Result<GenesisDoc, GenesisError> {
        self.doc
            .validate()
            .map_err(|e| GenesisError::Invalid(e.to_string()))?;
        Ok(self.doc.clone())
    }
}

/// Reads `<home>/config/genesis.json` (or any given path).
pub struct JsonFileGenesisProvider {
    path: PathBuf,
}

impl JsonFileGenesisProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Provider for the conventional location under a node home.
    pub fn in_home(home: &Path) -> Self {
        Self::new(home.join("config").join("genesis.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl GenesisProvider for JsonFileGenesisProvider {
    fn genesis_doc(&self) -> Result<GenesisDoc, GenesisError> {
        let bytes = std::fs::read(&self.path).map_err(|e| GenesisError::Io {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;
        GenesisDoc::from_json(&bytes).map_err(|e| GenesisError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_static_provider_validates() {
        let ok = StaticGenesisProvider::new(GenesisDoc {
            chain_id: "local-1".into(),
            initial_height: 1,
            ..Default::default()
        });
        assert_eq!(ok.genesis_doc().unwrap().chain_id, "local-1");

        let bad = StaticGenesisProvider::new(GenesisDoc::default());
        assert!(matches!(bad.genesis_doc(), Err(GenesisError::Invalid(_))));
    }

    #[test]
    fn test_json_file_provider() {
        let home = tempfile::tempdir().unwrap();
        fs::create_dir_all(home.path().join("config")).unwrap();
        fs::write(
            home.path().join("config/genesis.json"),
            br#"{"genesis_time":"2024-01-01T00:00:00Z","chain_id":"file-chain","initial_height":5}"#,
        )
        .unwrap();

        let provider = JsonFileGenesisProvider::in_home(home.path());
        let doc = provider.genesis_doc().unwrap();
        assert_eq!(doc.chain_id, "file-chain");
        assert_eq!(doc.initial_height, 5);
    }

    #[test]
    fn test_json_file_provider_missing_file() {
        let provider = JsonFileGenesisProvider::new("/nonexistent/genesis.json");
        assert!(matches!(provider.genesis_doc(), Err(GenesisError::Io { .. })));
    }
}
