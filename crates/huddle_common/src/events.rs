use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tables of the remote store that emit change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Projects,
    ProjectMembers,
    Tasks,
    Notes,
    ChatMessages,
    MentorRequests,
    UserLimits,
}

/// Kind of row change reported by the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// One change notification delivered on a subscription stream.
///
/// `new_row` carries the full row for inserts and updates when the remote
/// side provides it; deletes carry only the row id. The payload stays as
/// raw JSON here so that the engine's per-entity-set decoders own the typed
/// interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub op: ChangeOp,
    pub row_id: String,
    #[serde(default)]
    pub new_row: Option<Value>,
}
