//! # Shared Types Crate
//!
//! This crate contains the chain value objects shared by the event bus and
//! the local node query facade.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: Blocks, transactions, execution results and
//!   validator sets are defined once here.
//! - **Canonical Encoding**: Raw transaction bytes are the `bincode` encoding
//!   of [`Transaction`]; a transaction hash is SHA-256 over those bytes.
//! - **Read-Only Facade**: The facade never constructs these values itself;
//!   storage, indexers and consensus produce them.

pub mod consensus;
pub mod entities;
pub mod errors;
pub mod genesis;

pub use consensus::*;
pub use entities::*;
pub use errors::*;
pub use genesis::*;
