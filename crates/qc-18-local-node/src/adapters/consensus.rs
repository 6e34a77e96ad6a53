//! Consensus reader serving the latest round-state snapshot it was handed.

use crate::domain::errors::ConsensusError;
use crate::ports::outbound::ConsensusReader;
use parking_lot::RwLock;
use shared_types::RoundStateSimple;

/// Holds the most recent JSON round-state snapshot pushed by the engine.
#[derive(Default)]
pub struct SnapshotConsensusReader {
    snapshot: RwLock<Option<Vec<u8>>>,
}

impl SnapshotConsensusReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot with raw JSON bytes.
    pub fn set_snapshot(&self, bytes: Vec<u8>) {
        *self.snapshot.write() = Some(bytes);
    }

    /// Replace the snapshot with an encoded round state.
    pub fn set_round_state(&self, state: &RoundStateSimple) -> Result<(), ConsensusError> {
        let bytes = state
            .to_json()
            .map_err(|e| ConsensusError::Unavailable(e.to_string()))?;
        self.set_snapshot(bytes);
        Ok(())
    }
}

impl ConsensusReader for SnapshotConsensusReader {
    fn round_state_snapshot(&self) -> Result<Vec<u8>, ConsensusError> {
        self.snapshot
            .read()
            .clone()
            .ok_or_else(|| ConsensusError::Unavailable("no round state published yet".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_roundtrip_through_reader() {
        let reader = SnapshotConsensusReader::new();
        assert!(reader.round_state_snapshot().is_err());

        let state = RoundStateSimple {
            height_round_step: "7/0/1".into(),
            ..Default::default()
        };
        reader.set_round_state(&state).unwrap();
        let bytes = reader.round_state_snapshot().unwrap();
        assert_eq!(RoundStateSimple::from_json(&bytes).unwrap(), state);
    }
}
