//! Session-scoped undo and durable change tracking for CMS entities.
//!
//! Every tracked save is diffed field by field, written to an append-only
//! change log and kept as a single-level undo record for the operator's
//! session.
//!
//! # Examples
//!
//! In-memory usage with [`core::store::UndoStore`]:
//! ```
//! use cms_undo::{
//!     core::store::UndoStore,
//!     snapshot::Snapshot,
//!     types::{EntityKey, ModelType, SessionId, SETTINGS_ID},
//! };
//!
//! let mut store = UndoStore::default();
//! let session = SessionId::new("s1");
//! let key = EntityKey::new(ModelType::Settings, SETTINGS_ID);
//!
//! let old = Snapshot::from_fields([("contact_email", "a@x.com")]);
//! let new = Snapshot::from_fields([("contact_email", "b@x.com")]);
//! assert!(store.save_state(&session, key, old, &new, 7));
//!
//! let meta = store.undo_meta(&session, key).expect("meta");
//! assert_eq!(meta.changes[0].label, "Contact Email");
//! ```
//!
//! Runtime usage with the SQLite backend:
//! ```no_run
//! use cms_undo::{
//!     core::store::UndoStore,
//!     persist::sqlite::SqliteBackend,
//!     runtime::handle::{spawn_undo_service, RuntimeConfig},
//!     snapshot::Snapshot,
//!     types::{EntityKey, ModelType, Operator, SessionId, SETTINGS_ID},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let backend = SqliteBackend::open("cms.db").expect("open sqlite");
//! let handle = spawn_undo_service(UndoStore::default(), Box::new(backend), RuntimeConfig::default());
//! let operator = Operator::new(SessionId::new("s1"), 7);
//! let key = EntityKey::new(ModelType::Settings, SETTINGS_ID);
//! let outcome = handle
//!     .apply_update(&operator, key, Snapshot::from_fields([("contact_email", "b@x.com")]))
//!     .await
//!     .expect("update");
//! assert!(outcome.undo_meta.is_some());
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```
#![warn(missing_docs)]

/// Durable change log records.
pub mod changelog;
/// Environment-driven service configuration.
pub mod config;
/// Session-partitioned undo store.
pub mod core;
/// Field-level diff strategies and labels.
pub mod diff;
/// axum routes over the runtime handle.
pub mod http;
/// Persistence abstraction and SQLite implementation.
pub mod persist;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Snapshots, changes and value normalization.
pub mod snapshot;
/// Shared primitive types and enums.
pub mod types;
