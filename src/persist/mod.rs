//! Persistence seams: the durable change log and the entity write path.

/// SQLite implementation of both stores.
pub mod sqlite;

use crate::{
    changelog::{ChangeLogEntry, NewChangeLogEntry},
    snapshot::Snapshot,
    types::{ChangeLogId, EntityKey, ModelType, UserId},
};

/// Failures of the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON column could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// No change log entry with this id.
    #[error("change log entry {0} not found")]
    EntryNotFound(ChangeLogId),

    /// The entry was rolled back before; reversion is single-use.
    #[error("change log entry {0} was already reverted")]
    AlreadyReverted(ChangeLogId),

    /// The entity does not exist in the backing store.
    #[error("entity {0} not found")]
    UnknownEntity(EntityKey),
}

/// Result alias for persistence calls.
pub type PersistResult<T> = Result<T, PersistError>;

/// Append-only audit trail of tracked updates.
pub trait ChangeLogStore: Send {
    /// Inserts one entry and returns it with its id and timestamp.
    fn record(&mut self, entry: NewChangeLogEntry) -> PersistResult<ChangeLogEntry>;

    /// Stamps `reverted_at`/`reverted_by` once.
    ///
    /// Fails with [`PersistError::AlreadyReverted`] and leaves the row
    /// untouched if it was stamped before.
    fn mark_reverted(&mut self, id: ChangeLogId, reverted_by: UserId) -> PersistResult<ChangeLogEntry>;

    /// Entries for `model_type`, newest first.
    fn list_for_model(&self, model_type: ModelType) -> PersistResult<Vec<ChangeLogEntry>>;

    /// Single entry by id.
    fn get(&self, id: ChangeLogId) -> PersistResult<Option<ChangeLogEntry>>;
}

/// Read and write path for the tracked entities themselves.
pub trait EntityStore: Send {
    /// Current editable values of `key`, in its model type's snapshot shape.
    fn load(&self, key: EntityKey) -> PersistResult<Snapshot>;

    /// Writes the fields present in `data` back to `key`.
    fn apply(&mut self, key: EntityKey, data: &Snapshot) -> PersistResult<()>;
}

/// A store serving both the change log and the entities.
pub trait Backend: ChangeLogStore + EntityStore {}

impl<T: ChangeLogStore + EntityStore> Backend for T {}
