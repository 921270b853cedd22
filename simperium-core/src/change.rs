//! Change records exchanged with the change feed.

use crate::diff::Diff;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use simperium_types::{ChangeId, ChangeVersion, ClientId};

/// What a change does to its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Operation {
    #[default]
    #[serde(rename = "M")]
    Modify,
    #[serde(rename = "-")]
    Remove,
}

/// A change submitted by this client.
///
/// Built once per write and never altered afterwards; the bucket it targets
/// is carried by the endpoint path rather than the record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRecord {
    /// Item id.
    pub id: String,
    /// Operation.
    pub o: Operation,
    /// Field diff.
    pub v: Diff,
    /// Change id, unique per submission.
    pub ccid: ChangeId,
    /// Version the diff was computed against, for optimistic concurrency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sv: Option<u64>,
}

impl ChangeRecord {
    /// A modify record with a freshly generated ccid.
    pub fn modify(id: impl Into<String>, diff: Diff) -> Self {
        Self {
            id: id.into(),
            o: Operation::Modify,
            v: diff,
            ccid: ChangeId::new(),
            sv: None,
        }
    }

    pub fn with_source_version(mut self, version: u64) -> Self {
        self.sv = Some(version);
        self
    }
}

/// A change as reported by the service, from a poll or a bulk submission.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Change {
    /// Item id.
    pub id: String,
    #[serde(default)]
    pub o: Operation,
    /// Raw diff as sent by the service.
    #[serde(default)]
    pub v: Value,
    /// Client that originated the change.
    #[serde(default)]
    pub clientid: Option<ClientId>,
    /// Cursor to resume polling after this change.
    #[serde(default)]
    pub cv: Option<ChangeVersion>,
    /// Version the document reached.
    #[serde(default)]
    pub ev: Option<u64>,
    /// Version the change was applied to.
    #[serde(default)]
    pub sv: Option<u64>,
    /// Change ids folded into this change.
    #[serde(default)]
    pub ccids: Vec<ChangeId>,
    /// Document data, when requested.
    #[serde(default)]
    pub d: Option<Value>,
    /// Author, when requested.
    #[serde(default)]
    pub username: Option<String>,
    /// Per-change error code, set when the service rejected this change.
    #[serde(default)]
    pub error: Option<u16>,
    /// Fields this client does not model, kept as sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Change {
    /// True when the service reported a per-change failure.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Whether this change was submitted under `ccid`.
    pub fn has_ccid(&self, ccid: &ChangeId) -> bool {
        self.ccids.contains(ccid)
    }
}

/// Cursor to resume from after consuming `changes`: the last change carrying
/// a cv.
pub fn last_cv(changes: &[Change]) -> Option<&ChangeVersion> {
    changes.iter().rev().find_map(|c| c.cv.as_ref())
}
