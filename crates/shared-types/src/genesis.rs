//! # Genesis Document
//!
//! The chain's genesis document as loaded once at node bootstrap.

use serde::{Deserialize, Serialize};

use crate::entities::{Address, ConsensusParams, Height};
use crate::errors::DecodeError;

/// A validator listed in the genesis document.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenesisValidator {
    pub address: Address,
    pub pub_key: Vec<u8>,
    pub power: i64,
    pub name: String,
}

/// The genesis document of a chain.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GenesisDoc {
    /// RFC 3339 genesis time.
    pub genesis_time: String,
    pub chain_id: String,
    #[serde(default = "default_initial_height")]
    pub initial_height: Height,
    #[serde(default)]
    pub consensus_params: Option<ConsensusParams>,
    #[serde(default)]
    pub validators: Vec<GenesisValidator>,
    #[serde(default)]
    pub app_hash: String,
    #[serde(default)]
    pub app_state: serde_json::Value,
}

fn default_initial_height() -> Height {
    1
}

impl GenesisDoc {
    /// Parse and validate a JSON genesis document.
    pub fn from_json(bytes: &[u8]) -> Result<Self, DecodeError> {
        let doc: Self = serde_json::from_slice(bytes)?;
        doc.validate()?;
        Ok(doc)
    }

    /// Basic sanity checks on a genesis document.
    pub fn validate(&self) -> Result<(), DecodeError> {
        if self.chain_id.trim().is_empty() {
            return Err(DecodeError::Json("genesis doc must include chain_id".into()));
        }
        if self.initial_height < 1 {
            return Err(DecodeError::Json(format!(
                "initial_height must be at least 1, got {}",
                self.initial_height
            )));
        }
        if let Some(v) = self.validators.iter().find(|v| v.power <= 0) {
            return Err(DecodeError::Json(format!(
                "genesis validator {} has non-positive power {}",
                v.name, v.power
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_from_json_defaults() {
        let doc =
            GenesisDoc::from_json(br#"{"genesis_time":"2024-01-01T00:00:00Z","chain_id":"local-1"}"#)
                .unwrap();
        assert_eq!(doc.chain_id, "local-1");
        assert_eq!(doc.initial_height, 1);
        assert!(doc.validators.is_empty());
    }

    #[test]
    fn test_genesis_requires_chain_id() {
        let err = GenesisDoc::from_json(br#"{"genesis_time":"","chain_id":"  "}"#).unwrap_err();
        assert!(err.to_string().contains("chain_id"));
    }

    #[test]
    fn test_genesis_rejects_malformed_json() {
        assert!(matches!(
            GenesisDoc::from_json(b"{not json"),
            Err(DecodeError::Json(_))
        ));
    }
}
