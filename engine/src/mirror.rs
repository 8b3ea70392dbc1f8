//! Mirror planning.
//!
//! Decides what a change event must do to the mirror table. The decision is
//! made fresh for every event from the current mirror row, which makes
//! redelivery of an already-applied event a no-op:
//!
//! | action        | state             | transition        |
//! |---------------|-------------------|-------------------|
//! | insert/update | `New`             | `InsertMirror`    |
//! | insert/update | `ExistsDifferent` | `UpdateMirror`    |
//! | insert/update | `ExistsEqual`     | `Noop`            |
//! | delete        | exists            | `DeleteMirror`    |
//! | delete        | `New`             | `DeleteMissing`   |

use crate::{
    error::Result,
    format::{text_value, truthy_text},
    ChangeAction, Error, ResourceSchema, Row,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mirror table columns written from a source row.
pub mod columns {
    pub const EXTERNAL_ID: &str = "external_id";
    pub const TITLE: &str = "title";
    pub const EMAIL: &str = "email";
    pub const PHONE: &str = "phone";
    pub const IS_ACTIVE: &str = "is_active";
    pub const ACCOUNT_TYPE_ID: &str = "account_type_id";
    pub const SOURCE_TABLE: &str = "source_table";
    pub const SOURCE_ID: &str = "source_id";
}

/// Source row field holding the source id.
pub const SOURCE_ID_FIELD: &str = "id";

/// Source `is_active` value that marks an active row.
pub const SOURCE_ACTIVE_VALUE: &str = "2";

/// State of the mirror for one source id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MirrorState {
    /// No mirror row for the source id
    New,
    /// Mirror row present and every compared column matches
    ExistsEqual,
    /// Mirror row present with at least one differing column
    ExistsDifferent,
}

impl MirrorState {
    pub fn exists(&self) -> bool {
        !matches!(self, MirrorState::New)
    }
}

/// What to do with the mirror for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Transition {
    InsertMirror,
    UpdateMirror,
    DeleteMirror,
    /// Mirror already reflects the source row
    Noop,
    /// Delete for a source id that has no mirror row; reported as failed
    DeleteMissing,
}

impl Transition {
    /// Whether the transition writes to the mirror.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Transition::InsertMirror | Transition::UpdateMirror | Transition::DeleteMirror
        )
    }
}

/// Pick the transition for `action` given the current mirror state.
pub fn plan(action: ChangeAction, state: MirrorState) -> Transition {
    match (action, state) {
        (ChangeAction::Insert | ChangeAction::Update, MirrorState::New) => Transition::InsertMirror,
        (ChangeAction::Insert | ChangeAction::Update, MirrorState::ExistsDifferent) => {
            Transition::UpdateMirror
        }
        (ChangeAction::Insert | ChangeAction::Update, MirrorState::ExistsEqual) => Transition::Noop,
        (ChangeAction::Delete, MirrorState::New) => Transition::DeleteMissing,
        (ChangeAction::Delete, _) => Transition::DeleteMirror,
    }
}

/// Source id of a row, if present.
pub fn source_id(row: &Row) -> Option<String> {
    truthy_text(row.get(SOURCE_ID_FIELD))
}

/// Mirror column values derived from one source row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountProjection {
    pub external_id: Option<String>,
    pub title: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_active: i64,
    pub source_id: Value,
}

impl AccountProjection {
    /// Project a source row onto mirror columns.
    ///
    /// The external id is the source `uid`, suffixed with `_<mailbox_id>` when
    /// the row has a mailbox.
    pub fn from_source(row: &Row) -> Result<Self> {
        if source_id(row).is_none() {
            return Err(Error::InvalidData("source row has no id".into()));
        }

        let uid = truthy_text(row.get("uid"));
        let external_id = match (uid, truthy_text(row.get("mailbox_id"))) {
            (Some(uid), Some(mailbox)) => Some(format!("{}_{}", uid, mailbox)),
            (uid, _) => uid,
        };

        // the source column is text; the number 2 does not count
        let is_active = match row.get("is_active") {
            Some(Value::String(v)) if v == SOURCE_ACTIVE_VALUE => 1,
            _ => 0,
        };

        Ok(Self {
            external_id,
            title: truthy_text(row.get("name")),
            email: truthy_text(row.get("email")),
            phone: truthy_text(row.get("mobile")),
            is_active,
            source_id: row[SOURCE_ID_FIELD].clone(),
        })
    }

    /// Projected values keyed by mirror column.
    pub fn columns(&self) -> Row {
        let text = |v: &Option<String>| v.clone().map(Value::String).unwrap_or(Value::Null);

        let mut row = Row::new();
        row.insert(columns::EXTERNAL_ID.into(), text(&self.external_id));
        row.insert(columns::TITLE.into(), text(&self.title));
        row.insert(columns::EMAIL.into(), text(&self.email));
        row.insert(columns::PHONE.into(), text(&self.phone));
        row.insert(columns::IS_ACTIVE.into(), Value::from(self.is_active));
        row.insert(columns::SOURCE_ID.into(), self.source_id.clone());
        row
    }
}

/// Compare a source row with its mirror row.
///
/// Every schema property aliased into `mirror_table` and not excluded from
/// comparison is checked. The expected value is the projected column value
/// when the projection writes that column, otherwise the raw source value.
/// Values are equal when their text forms are identical.
pub fn classify(
    source: &Row,
    mirror: Option<&Row>,
    schema: &ResourceSchema,
    mirror_table: &str,
) -> MirrorState {
    let Some(mirror) = mirror else {
        return MirrorState::New;
    };

    let projected = AccountProjection::from_source(source)
        .map(|p| p.columns())
        .unwrap_or_default();

    let differs = schema
        .comparable_aliases(mirror_table)
        .into_iter()
        .any(|(field, column)| {
            let expected = projected.get(column).or_else(|| source.get(field));
            let actual = mirror.get(column);
            expected.and_then(text_value) != actual.and_then(text_value)
        });

    if differs {
        MirrorState::ExistsDifferent
    } else {
        MirrorState::ExistsEqual
    }
}
