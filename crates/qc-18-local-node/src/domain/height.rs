//! # Height Resolution
//!
//! Resolves an optional requested height against the chain's live bounds.

use crate::domain::errors::QueryError;
use shared_types::Height;

/// Resolve `requested` against `[base, latest]`.
///
/// Absent means latest. Checks run in a fixed order: non-positive, above
/// latest, below the pruning floor.
pub fn resolve_height(
    latest: Height,
    base: Height,
    requested: Option<Height>,
) -> Result<Height, QueryError> {
    let Some(height) = requested else {
        return Ok(latest);
    };
    if height <= 0 {
        return Err(QueryError::InvalidHeight { height });
    }
    if height > latest {
        return Err(QueryError::HeightOutOfRange {
            requested: height,
            latest,
        });
    }
    if height < base {
        return Err(QueryError::HeightPruned {
            requested: height,
            base,
        });
    }
    Ok(height)
}
