//! In-memory, session-scoped undo state.

/// Session-partitioned undo store.
pub mod store;
