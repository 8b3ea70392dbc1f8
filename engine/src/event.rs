//! Change events from the source database's replication stream.

use crate::{error::Result, Error, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeAction::Insert => write!(f, "insert"),
            ChangeAction::Update => write!(f, "update"),
            ChangeAction::Delete => write!(f, "delete"),
        }
    }
}

/// One row-level change notification.
///
/// `Data` normally carries the JSON-encoded row as a string; an inline JSON
/// object is accepted too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "Action")]
    pub action: ChangeAction,
    #[serde(rename = "Data", default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ChangeEvent {
    /// Create an event carrying `row` as JSON-encoded data.
    pub fn new(action: ChangeAction, row: &Row) -> Self {
        Self {
            action,
            data: Some(Value::String(Value::Object(row.clone()).to_string())),
        }
    }

    /// Parse an event from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::InvalidEvent(e.to_string()))
    }

    /// Decode the source-row snapshot.
    ///
    /// Returns `Ok(None)` when the event carries no data at all, and
    /// `Err(InvalidEvent)` when the data cannot be decoded into an object.
    pub fn payload(&self) -> Result<Option<Row>> {
        match &self.data {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
            Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(row)) => Ok(Some(row)),
                Ok(Value::Null) => Ok(None),
                Ok(other) => Err(Error::InvalidEvent(format!(
                    "data is not an object: {}",
                    other
                ))),
                Err(e) => Err(Error::InvalidEvent(e.to_string())),
            },
            Some(Value::Object(row)) => Ok(Some(row.clone())),
            Some(other) => Err(Error::InvalidEvent(format!(
                "data is not an object: {}",
                other
            ))),
        }
    }
}
