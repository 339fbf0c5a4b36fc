//! Durable audit-trail records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    snapshot::{Change, Snapshot},
    types::{ChangeLogId, EntityKey, ModelId, ModelType, UserId},
};

/// One persisted, field-level change set of a tracked entity.
///
/// Entries are append-only; only `reverted_at`/`reverted_by` are ever
/// written after insert, and only once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLogEntry {
    /// Row id.
    pub id: ChangeLogId,
    /// Entity type.
    pub model_type: ModelType,
    /// Entity id.
    pub model_id: ModelId,
    /// Diff computed at save time.
    pub changes: Vec<Change>,
    /// State before the update.
    pub old_data: Snapshot,
    /// State written by the update.
    pub new_data: Snapshot,
    /// Operator who saved.
    pub changed_by: UserId,
    /// Insert time.
    pub created_at: DateTime<Utc>,
    /// When the entry was rolled back, if ever.
    pub reverted_at: Option<DateTime<Utc>>,
    /// Who rolled it back.
    pub reverted_by: Option<UserId>,
}

impl ChangeLogEntry {
    /// Key of the entity this entry describes.
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.model_type, self.model_id)
    }

    /// True once the entry has been used for a rollback.
    pub fn is_reverted(&self) -> bool {
        self.reverted_at.is_some()
    }
}

/// Insert payload for a [`ChangeLogEntry`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewChangeLogEntry {
    /// Entity the update was applied to.
    pub key: EntityKey,
    /// Non-empty diff of the update.
    pub changes: Vec<Change>,
    /// State before the update.
    pub old_data: Snapshot,
    /// State after the update.
    pub new_data: Snapshot,
    /// Operator who saved.
    pub changed_by: UserId,
}
