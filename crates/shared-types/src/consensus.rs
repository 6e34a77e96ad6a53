//! # Consensus Round State
//!
//! Public representation of the consensus engine's progress toward the next
//! block. The engine hands out a JSON snapshot; this module decodes it.

use serde::{Deserialize, Serialize};

use crate::entities::Height;
use crate::errors::DecodeError;

/// Proposer of the current round.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoundProposer {
    /// Hex-encoded validator address.
    pub address: String,
    /// Position in the validator set.
    pub index: i32,
}

/// Simplified round state snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoundStateSimple {
    /// `"<height>/<round>/<step>"`.
    #[serde(rename = "height/round/step")]
    pub height_round_step: String,
    pub start_time: String,
    #[serde(default)]
    pub proposal_block_hash: String,
    #[serde(default)]
    pub locked_block_hash: String,
    #[serde(default)]
    pub valid_block_hash: String,
    #[serde(default)]
    pub height_vote_set: serde_json::Value,
    #[serde(default)]
    pub proposer: RoundProposer,
}

impl RoundStateSimple {
    /// Decode a JSON snapshot.
    pub fn from_json(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encode as a JSON snapshot.
    pub fn to_json(&self) -> Result<Vec<u8>, DecodeError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Split `height/round/step` into its parts.
    #[must_use]
    pub fn parts(&self) -> Option<(Height, i32, u8)> {
        let mut it = self.height_round_step.split('/');
        let height = it.next()?.parse().ok()?;
        let round = it.next()?.parse().ok()?;
        let step = it.next()?.parse().ok()?;
        if it.next().is_some() {
            return None;
        }
        Some((height, round, step))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_state_from_json() {
        let json = br#"{
            "height/round/step": "12/0/3",
            "start_time": "2024-01-01T00:00:00Z",
            "proposal_block_hash": "AB",
            "proposer": {"address": "00FF", "index": 2}
        }"#;
        let state = RoundStateSimple::from_json(json).unwrap();
        assert_eq!(state.parts(), Some((12, 0, 3)));
        assert_eq!(state.proposer.index, 2);
        assert_eq!(state.locked_block_hash, "");
    }

    #[test]
    fn test_round_state_rejects_garbage() {
        assert!(RoundStateSimple::from_json(b"[1,2").is_err());
    }

    #[test]
    fn test_parts_rejects_malformed() {
        let state = RoundStateSimple {
            height_round_step: "12/x/3".to_string(),
            ..Default::default()
        };
        assert_eq!(state.parts(), None);
    }
}
