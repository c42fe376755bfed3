//! Realtime change messages
//!
//! Change-data events pushed by the backend when rows of a table are
//! inserted, updated or deleted. Clients treat them as a hint to reconcile,
//! never as authoritative state.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{Collection, RecordId};

/// Row-level change type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 3] = [Self::Insert, Self::Update, Self::Delete];
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Insert => write!(f, "INSERT"),
            ChangeKind::Update => write!(f, "UPDATE"),
            ChangeKind::Delete => write!(f, "DELETE"),
        }
    }
}

/// A single change notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub kind: ChangeKind,
    /// New row for inserts and updates
    pub record: Option<serde_json::Value>,
    /// Primary key of the affected row, when known
    pub record_id: Option<RecordId>,
}

impl ChangeEvent {
    pub fn new(collection: Collection, kind: ChangeKind) -> Self {
        Self {
            collection,
            kind,
            record: None,
            record_id: None,
        }
    }

    pub fn with_record(mut self, record: serde_json::Value) -> Self {
        self.record_id = record.get("id").and_then(serde_json::Value::as_i64);
        self.record = Some(record);
        self
    }

    pub fn with_record_id(mut self, id: RecordId) -> Self {
        self.record_id = Some(id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_event_picks_up_record_id() {
        let event = ChangeEvent::new(Collection::Restaurants, ChangeKind::Insert)
            .with_record(serde_json::json!({ "id": 42, "name": "Noma" }));
        assert_eq!(event.record_id, Some(42));
        assert_eq!(event.kind.to_string(), "INSERT");
    }

    #[test]
    fn test_change_kind_wire_format() {
        let json = serde_json::to_string(&ChangeKind::Delete).unwrap();
        assert_eq!(json, "\"DELETE\"");
    }
}
