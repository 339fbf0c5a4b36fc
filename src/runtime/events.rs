//! Runtime event stream payloads.

use crate::types::{ChangeLogId, EntityKey, SessionId};

/// Events emitted from the undo service loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoEvent {
    /// An entity was written through the service.
    EntityUpdated {
        /// Updated entity.
        key: EntityKey,
        /// Number of changed fields.
        changes: usize,
    },
    /// Undo state was stored for an entity.
    StateSaved {
        /// Owning session.
        session: SessionId,
        /// Entity.
        key: EntityKey,
    },
    /// A session undo was applied and consumed.
    Restored {
        /// Owning session.
        session: SessionId,
        /// Entity.
        key: EntityKey,
    },
    /// A session undo was discarded without applying it.
    Dismissed {
        /// Owning session.
        session: SessionId,
        /// Entity.
        key: EntityKey,
    },
    /// A change log entry was written.
    EntryLogged {
        /// New entry id.
        id: ChangeLogId,
    },
    /// A change log entry was used to roll an entity back.
    EntryReverted {
        /// Entry id.
        id: ChangeLogId,
        /// Entity rolled back.
        key: EntityKey,
    },
    /// Idle sessions were dropped.
    SessionsPurged {
        /// How many.
        count: usize,
    },
}
