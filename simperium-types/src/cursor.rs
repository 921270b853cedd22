//! Change-version cursor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque position in a bucket's change history.
///
/// Only ever handed back to the service verbatim; the client never orders or
/// inspects it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeVersion(String);

impl ChangeVersion {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ChangeVersion {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ChangeVersion {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
