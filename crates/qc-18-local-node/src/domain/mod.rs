//! # Domain Layer
//!
//! Pure query logic: height resolution, pagination, search ordering, result
//! values and errors. No I/O.

pub mod entities;
pub mod errors;
pub mod height;
pub mod ordering;
pub mod pagination;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use height::resolve_height;
pub use ordering::{sort_hits, OrderBy};
pub use pagination::{
    compute_skip, normalize_per_page, page_count, page_len, resolve_page, DEFAULT_PER_PAGE,
    MAX_PER_PAGE,
};
pub use value_objects::NodeState;
