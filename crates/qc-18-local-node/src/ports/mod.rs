//! # Ports
//!
//! - `inbound` - the query API this crate exposes
//! - `outbound` - the collaborators it depends on

pub mod inbound;
pub mod outbound;
