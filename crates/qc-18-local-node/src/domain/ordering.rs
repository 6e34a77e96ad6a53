//! # Search Ordering
//!
//! Deterministic ordering of transaction search hits by chain position.

use crate::domain::errors::QueryError;
use shared_types::IndexedTx;
use std::cmp::Reverse;
use std::str::FromStr;

/// Sort direction for search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    #[default]
    Asc,
    Desc,
}

impl OrderBy {
    /// Parse `""`, `"asc"` or `"desc"`. Empty means ascending.
    pub fn parse(s: &str) -> Result<Self, QueryError> {
        match s {
            "" | "asc" => Ok(OrderBy::Asc),
            "desc" => Ok(OrderBy::Desc),
            other => Err(QueryError::InvalidOrderBy {
                given: other.to_string(),
            }),
        }
    }
}

impl FromStr for OrderBy {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Sort hits by `(height, index)` in the given direction.
pub fn sort_hits(hits: &mut [IndexedTx], order: OrderBy) {
    match order {
        OrderBy::Asc => hits.sort_by_key(IndexedTx::position),
        OrderBy::Desc => hits.sort_by_key(|tx| Reverse(tx.position())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hit(height: i64, index: u32) -> IndexedTx {
        IndexedTx {
            height,
            index,
            ..Default::default()
        }
    }

    fn positions(hits: &[IndexedTx]) -> Vec<(i64, u32)> {
        hits.iter().map(IndexedTx::position).collect()
    }

    #[test]
    fn test_parse() {
        assert_eq!(OrderBy::parse(""), Ok(OrderBy::Asc));
        assert_eq!(OrderBy::parse("asc"), Ok(OrderBy::Asc));
        assert_eq!(OrderBy::parse("desc"), Ok(OrderBy::Desc));
        assert_eq!(
            OrderBy::parse("bogus"),
            Err(QueryError::InvalidOrderBy {
                given: "bogus".to_string()
            })
        );
        assert!(OrderBy::parse("DESC").is_err());
    }

    #[test]
    fn test_sort_breaks_ties_by_index() {
        let mut hits = vec![hit(5, 1), hit(3, 2), hit(5, 0), hit(3, 0)];

        sort_hits(&mut hits, OrderBy::Asc);
        assert_eq!(positions(&hits), vec![(3, 0), (3, 2), (5, 0), (5, 1)]);

        sort_hits(&mut hits, OrderBy::Desc);
        assert_eq!(positions(&hits), vec![(5, 1), (5, 0), (3, 2), (3, 0)]);
    }

    proptest! {
        #[test]
        fn test_sort_is_idempotent_and_ordered(
            raw in proptest::collection::vec((1i64..20, 0u32..10), 0..50),
            desc in any::<bool>(),
        ) {
            let order = if desc { OrderBy::Desc } else { OrderBy::Asc };
            let mut hits: Vec<_> = raw.iter().map(|(h, i)| hit(*h, *i)).collect();
            sort_hits(&mut hits, order);
            let once = positions(&hits);
            sort_hits(&mut hits, order);
            prop_assert_eq!(&once, &positions(&hits));

            for pair in once.windows(2) {
                match order {
                    OrderBy::Asc => prop_assert!(pair[0] <= pair[1]),
                    OrderBy::Desc => prop_assert!(pair[0] >= pair[1]),
                }
            }
        }
    }
}
