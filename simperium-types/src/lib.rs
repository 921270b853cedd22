//! Core type definitions for the Simperium client.
//!
//! This crate defines the identifiers that flow through the change protocol:
//! - Client ids tagging every write made by one client session
//! - Change ids (ccids) making each individual write idempotent
//! - Change versions (cv), the opaque cursor into a bucket's change history

mod cursor;
mod ids;

pub use cursor::ChangeVersion;
pub use ids::{ChangeId, ClientId, CLIENT_ID_PREFIX};

/// Errors from parsing identifiers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid change id: {0}")]
    InvalidChangeId(String),

    #[error("empty identifier")]
    Empty,
}
