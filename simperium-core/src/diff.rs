//! Field-level diff operations.
//!
//! The client never merges diffs; it only builds the degenerate
//! empty-to-document diff used when creating items in bulk.

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// One operation on a single field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    /// Set the field to a value it did not previously hold.
    Add(Value),
    /// Drop the field.
    Remove,
    /// Overwrite the field's value.
    Replace(Value),
}

impl FieldOp {
    /// The wire opcode.
    pub fn code(&self) -> &'static str {
        match self {
            FieldOp::Add(_) => "+",
            FieldOp::Remove => "-",
            FieldOp::Replace(_) => "r",
        }
    }
}

impl Serialize for FieldOp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldOp::Add(value) | FieldOp::Replace(value) => {
                let mut op = serializer.serialize_struct("FieldOp", 2)?;
                op.serialize_field("o", self.code())?;
                op.serialize_field("v", value)?;
                op.end()
            }
            FieldOp::Remove => {
                let mut op = serializer.serialize_struct("FieldOp", 1)?;
                op.serialize_field("o", self.code())?;
                op.end()
            }
        }
    }
}

/// An operation bound to the field it applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDiff {
    pub field: String,
    pub op: FieldOp,
}

/// Ordered set of field operations.
///
/// Serialized as a JSON object keyed by field name, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diff(Vec<FieldDiff>);

impl Diff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, op: FieldOp) {
        self.0.push(FieldDiff {
            field: field.into(),
            op,
        });
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDiff> {
        self.0.iter()
    }
}

impl Serialize for Diff {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for entry in &self.0 {
            map.serialize_entry(&entry.field, &entry.op)?;
        }
        map.end()
    }
}

/// Encodes `document` as a diff against an empty object: one `Add` per field,
/// in the document's own field order.
pub fn encode_create(document: &Map<String, Value>) -> Diff {
    let mut diff = Diff::new();
    for (field, value) in document {
        diff.push(field.clone(), FieldOp::Add(value.clone()));
    }
    diff
}
