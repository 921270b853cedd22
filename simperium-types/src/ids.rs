//! Identifier types for change origin and idempotency.
//!
//! Both ids are random UUIDv4 values rendered in their 32-character hex form,
//! which is what the service expects on the wire.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Prefix marking client ids generated by this library.
pub const CLIENT_ID_PREFIX: &str = "rs-";

/// Session-scoped identifier for the origin of a set of changes.
///
/// Generated once per bucket client and held for its lifetime. The service
/// echoes it back on every change, which lets a poller skip its own writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Generates a fresh client id.
    #[must_use]
    pub fn new() -> Self {
        Self(format!("{CLIENT_ID_PREFIX}{}", Uuid::new_v4().simple()))
    }

    /// Returns the id as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ClientId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ClientId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl FromStr for ClientId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(Error::Empty);
        }
        Ok(Self(s.to_string()))
    }
}

/// Per-write change identifier ("ccid").
///
/// The service treats a resubmitted `(item, ccid)` pair as a no-op, so a
/// caller retrying a write must reuse the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeId(String);

impl ChangeId {
    /// Generates a fresh 128-bit random change id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Returns the id as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses a change id, accepting any non-empty token.
    ///
    /// Ids minted elsewhere are not required to be UUIDs, only non-empty and
    /// free of whitespace.
    pub fn parse(s: &str) -> Result<Self, Error> {
        if s.is_empty() {
            return Err(Error::Empty);
        }
        if s.chars().any(char::is_whitespace) {
            return Err(Error::InvalidChangeId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl Default for ChangeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ChangeId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
