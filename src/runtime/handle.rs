//! Single-writer undo service task and its client handle.

use std::sync::Arc;

use serde::Serialize;
use tokio::{
    sync::{Mutex, broadcast, mpsc, oneshot},
    time::{Duration, MissedTickBehavior},
};

use crate::{
    changelog::{ChangeLogEntry, NewChangeLogEntry},
    core::store::{UndoMeta, UndoStore},
    persist::{Backend, PersistError, PersistResult},
    snapshot::{Change, Snapshot},
    types::{ChangeLogId, EntityKey, ModelType, Operator, SessionId, UserId},
};

use super::events::UndoEvent;

/// Runtime-level errors.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Persistence layer failure.
    #[error(transparent)]
    Persist(#[from] PersistError),
    /// Service task is gone.
    #[error("undo service is not running")]
    ChannelClosed,
    /// Blocking persistence task panicked or was cancelled.
    #[error("blocking task failed: {0}")]
    Join(String),
}

/// Runtime tuning knobs.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Bounded command queue size.
    pub command_queue_bound: usize,
    /// Broadcast event buffer size.
    pub event_capacity: usize,
    /// Period of the expired-session sweep.
    pub purge_interval: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_queue_bound: 256,
            event_capacity: 1024,
            purge_interval: Duration::from_secs(300),
        }
    }
}

/// Result of pushing an update through change tracking.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    /// Fields that changed; empty when the update was a no-op.
    pub changes: Vec<Change>,
    /// Undo availability after the update.
    pub undo_meta: Option<UndoMeta>,
    /// Change log entry id; `None` when nothing changed or the log write failed.
    pub entry_id: Option<ChangeLogId>,
}

impl UpdateOutcome {
    fn unchanged() -> Self {
        Self {
            changes: Vec::new(),
            undo_meta: None,
            entry_id: None,
        }
    }
}

/// Result of a restore request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The stored snapshot was written back and the undo record consumed.
    Restored {
        /// Number of fields the undone save had changed.
        changes: usize,
    },
    /// No undo record for this key in this session.
    NothingToRestore,
}

type SharedBackend = Arc<Mutex<Box<dyn Backend>>>;

/// Cloneable client handle for the undo service task.
#[derive(Clone)]
pub struct UndoServiceHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<UndoEvent>,
}

enum Command {
    SaveState {
        operator: Operator,
        key: EntityKey,
        old: Snapshot,
        new: Snapshot,
        resp: oneshot::Sender<bool>,
    },
    UndoMeta {
        session: SessionId,
        key: EntityKey,
        resp: oneshot::Sender<Option<UndoMeta>>,
    },
    OldData {
        session: SessionId,
        key: EntityKey,
        resp: oneshot::Sender<Option<Snapshot>>,
    },
    Clear {
        session: SessionId,
        key: EntityKey,
        resp: oneshot::Sender<bool>,
    },
    EndSession {
        session: SessionId,
        resp: oneshot::Sender<usize>,
    },
    PurgeExpired {
        resp: oneshot::Sender<usize>,
    },
    Load {
        key: EntityKey,
        resp: oneshot::Sender<Result<Snapshot, RuntimeError>>,
    },
    TrackUpdate {
        operator: Operator,
        key: EntityKey,
        old: Snapshot,
        new: Snapshot,
        resp: oneshot::Sender<UpdateOutcome>,
    },
    ApplyUpdate {
        operator: Operator,
        key: EntityKey,
        new: Snapshot,
        resp: oneshot::Sender<Result<UpdateOutcome, RuntimeError>>,
    },
    Restore {
        operator: Operator,
        key: EntityKey,
        resp: oneshot::Sender<Result<RestoreOutcome, RuntimeError>>,
    },
    Dismiss {
        operator: Operator,
        key: EntityKey,
        resp: oneshot::Sender<()>,
    },
    Record {
        entry: NewChangeLogEntry,
        resp: oneshot::Sender<Result<ChangeLogEntry, RuntimeError>>,
    },
    MarkReverted {
        id: ChangeLogId,
        reverted_by: UserId,
        resp: oneshot::Sender<Result<ChangeLogEntry, RuntimeError>>,
    },
    ListForModel {
        model_type: ModelType,
        resp: oneshot::Sender<Result<Vec<ChangeLogEntry>, RuntimeError>>,
    },
    GetEntry {
        id: ChangeLogId,
        resp: oneshot::Sender<Result<Option<ChangeLogEntry>, RuntimeError>>,
    },
    RevertEntry {
        operator: Operator,
        id: ChangeLogId,
        resp: oneshot::Sender<Result<ChangeLogEntry, RuntimeError>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Starts the single-writer undo service task.
///
/// The task owns `store` and `backend`; every operation goes through the
/// returned handle, so saves to the same key are applied in arrival order.
pub fn spawn_undo_service(
    store: UndoStore,
    backend: Box<dyn Backend>,
    config: RuntimeConfig,
) -> UndoServiceHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound.max(1));
    let (events_tx, _) = broadcast::channel::<UndoEvent>(config.event_capacity.max(1));

    let events_tx_loop = events_tx.clone();
    let backend: SharedBackend = Arc::new(Mutex::new(backend));

    tokio::spawn(async move {
        let mut store = store;
        let mut purge = tokio::time::interval(config.purge_interval.max(Duration::from_secs(1)));
        purge.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break; };
                    if handle_command(cmd, &mut store, &backend, &events_tx_loop).await {
                        break;
                    }
                }
                _ = purge.tick() => {
                    let count = store.purge_expired();
                    if count > 0 {
                        tracing::debug!(count, "purged expired undo sessions");
                        let _ = events_tx_loop.send(UndoEvent::SessionsPurged { count });
                    }
                }
            }
        }
        tracing::debug!("undo service stopped");
    });

    UndoServiceHandle { cmd_tx, events_tx }
}

impl UndoServiceHandle {
    /// Subscribes to runtime events.
    pub fn subscribe(&self) -> broadcast::Receiver<UndoEvent> {
        self.events_tx.subscribe()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Keeps `old` as the undo state of `key` when it differs from `new`.
    pub async fn save_state(
        &self,
        operator: &Operator,
        key: EntityKey,
        old: Snapshot,
        new: Snapshot,
    ) -> Result<bool, RuntimeError> {
        let operator = operator.clone();
        self.request(|resp| Command::SaveState {
            operator,
            key,
            old,
            new,
            resp,
        })
        .await
    }

    /// Undo availability of `key` for `session`.
    pub async fn undo_meta(
        &self,
        session: &SessionId,
        key: EntityKey,
    ) -> Result<Option<UndoMeta>, RuntimeError> {
        let session = session.clone();
        self.request(|resp| Command::UndoMeta { session, key, resp })
            .await
    }

    /// Stored pre-change snapshot of `key` for `session`.
    pub async fn old_data(
        &self,
        session: &SessionId,
        key: EntityKey,
    ) -> Result<Option<Snapshot>, RuntimeError> {
        let session = session.clone();
        self.request(|resp| Command::OldData { session, key, resp })
            .await
    }

    /// Drops the undo record of `key` without emitting an event.
    pub async fn clear(&self, session: &SessionId, key: EntityKey) -> Result<bool, RuntimeError> {
        let session = session.clone();
        self.request(|resp| Command::Clear { session, key, resp })
            .await
    }

    /// Forgets all undo state of a session (logout).
    pub async fn end_session(&self, session: &SessionId) -> Result<usize, RuntimeError> {
        let session = session.clone();
        self.request(|resp| Command::EndSession { session, resp })
            .await
    }

    /// Drops idle sessions now instead of waiting for the next sweep.
    pub async fn purge_expired(&self) -> Result<usize, RuntimeError> {
        self.request(|resp| Command::PurgeExpired { resp }).await
    }

    /// Current values of an entity, as a snapshot.
    pub async fn load(&self, key: EntityKey) -> Result<Snapshot, RuntimeError> {
        self.request(|resp| Command::Load { key, resp }).await?
    }

    /// Records an update the caller already persisted.
    ///
    /// Writes the change log and then the undo state. A failed log write is
    /// logged and does not prevent the undo save.
    pub async fn track_update(
        &self,
        operator: &Operator,
        key: EntityKey,
        old: Snapshot,
        new: Snapshot,
    ) -> Result<UpdateOutcome, RuntimeError> {
        let operator = operator.clone();
        self.request(|resp| Command::TrackUpdate {
            operator,
            key,
            old,
            new,
            resp,
        })
        .await
    }

    /// Loads the current state, writes `new`, then tracks the difference.
    pub async fn apply_update(
        &self,
        operator: &Operator,
        key: EntityKey,
        new: Snapshot,
    ) -> Result<UpdateOutcome, RuntimeError> {
        let operator = operator.clone();
        self.request(|resp| Command::ApplyUpdate {
            operator,
            key,
            new,
            resp,
        })
        .await?
    }

    /// Writes back the fields the last save changed and consumes the undo record.
    pub async fn restore(
        &self,
        operator: &Operator,
        key: EntityKey,
    ) -> Result<RestoreOutcome, RuntimeError> {
        let operator = operator.clone();
        self.request(|resp| Command::Restore { operator, key, resp })
            .await?
    }

    /// Discards the undo record without applying it.
    pub async fn dismiss(&self, operator: &Operator, key: EntityKey) -> Result<(), RuntimeError> {
        let operator = operator.clone();
        self.request(|resp| Command::Dismiss { operator, key, resp })
            .await
    }

    /// Writes a change log entry directly.
    pub async fn record(&self, entry: NewChangeLogEntry) -> Result<ChangeLogEntry, RuntimeError> {
        self.request(|resp| Command::Record { entry, resp }).await?
    }

    /// Stamps a change log entry as reverted without touching the entity.
    pub async fn mark_reverted(
        &self,
        id: ChangeLogId,
        reverted_by: UserId,
    ) -> Result<ChangeLogEntry, RuntimeError> {
        self.request(|resp| Command::MarkReverted {
            id,
            reverted_by,
            resp,
        })
        .await?
    }

    /// Change log entries for `model_type`, newest first.
    pub async fn list_for_model(
        &self,
        model_type: ModelType,
    ) -> Result<Vec<ChangeLogEntry>, RuntimeError> {
        self.request(|resp| Command::ListForModel { model_type, resp })
            .await?
    }

    /// Single change log entry by id.
    pub async fn get_entry(&self, id: ChangeLogId) -> Result<Option<ChangeLogEntry>, RuntimeError> {
        self.request(|resp| Command::GetEntry { id, resp }).await?
    }

    /// Rolls back the fields a change log entry changed and stamps the entry
    /// as reverted. Fields the entry did not touch keep their current values,
    /// and every session's undo record for the entity is dropped. A second
    /// revert of the same entry fails with [`PersistError::AlreadyReverted`].
    pub async fn revert_entry(
        &self,
        operator: &Operator,
        id: ChangeLogId,
    ) -> Result<ChangeLogEntry, RuntimeError> {
        let operator = operator.clone();
        self.request(|resp| Command::RevertEntry { operator, id, resp })
            .await?
    }

    /// Stops the service loop.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Shutdown { resp }).await
    }
}

async fn handle_command(
    cmd: Command,
    store: &mut UndoStore,
    backend: &SharedBackend,
    events_tx: &broadcast::Sender<UndoEvent>,
) -> bool {
    match cmd {
        Command::SaveState {
            operator,
            key,
            old,
            new,
            resp,
        } => {
            let saved = store.save_state(&operator.session, key, old, &new, operator.user_id);
            if saved {
                let _ = events_tx.send(UndoEvent::StateSaved {
                    session: operator.session,
                    key,
                });
            }
            let _ = resp.send(saved);
        }
        Command::UndoMeta { session, key, resp } => {
            let _ = resp.send(store.undo_meta(&session, key));
        }
        Command::OldData { session, key, resp } => {
            let _ = resp.send(store.old_data(&session, key));
        }
        Command::Clear { session, key, resp } => {
            let _ = resp.send(store.clear(&session, key));
        }
        Command::EndSession { session, resp } => {
            let _ = resp.send(store.end_session(&session));
        }
        Command::PurgeExpired { resp } => {
            let _ = resp.send(store.purge_expired());
        }
        Command::Load { key, resp } => {
            let _ = resp.send(with_backend(backend, move |b| b.load(key)).await);
        }
        Command::TrackUpdate {
            operator,
            key,
            old,
            new,
            resp,
        } => {
            let out = track(store, backend, events_tx, &operator, key, old, new).await;
            let _ = resp.send(out);
        }
        Command::ApplyUpdate {
            operator,
            key,
            new,
            resp,
        } => {
            let out = apply_update(store, backend, events_tx, &operator, key, new).await;
            let _ = resp.send(out);
        }
        Command::Restore {
            operator,
            key,
            resp,
        } => {
            let out = restore(store, backend, events_tx, &operator, key).await;
            let _ = resp.send(out);
        }
        Command::Dismiss {
            operator,
            key,
            resp,
        } => {
            if store.clear(&operator.session, key) {
                tracing::debug!(entity = %key, session = %operator.session, "undo dismissed");
                let _ = events_tx.send(UndoEvent::Dismissed {
                    session: operator.session,
                    key,
                });
            }
            let _ = resp.send(());
        }
        Command::Record { entry, resp } => {
            let out = with_backend(backend, move |b| b.record(entry)).await;
            if let Ok(entry) = &out {
                let _ = events_tx.send(UndoEvent::EntryLogged { id: entry.id });
            }
            let _ = resp.send(out);
        }
        Command::MarkReverted {
            id,
            reverted_by,
            resp,
        } => {
            let out = with_backend(backend, move |b| b.mark_reverted(id, reverted_by)).await;
            let _ = resp.send(out);
        }
        Command::ListForModel { model_type, resp } => {
            let out = with_backend(backend, move |b| b.list_for_model(model_type)).await;
            let _ = resp.send(out);
        }
        Command::GetEntry { id, resp } => {
            let out = with_backend(backend, move |b| b.get(id)).await;
            let _ = resp.send(out);
        }
        Command::RevertEntry { operator, id, resp } => {
            let out = revert_entry(store, backend, events_tx, &operator, id).await;
            let _ = resp.send(out);
        }
        Command::Shutdown { resp } => {
            let _ = resp.send(());
            return true;
        }
    }

    false
}

async fn track(
    store: &mut UndoStore,
    backend: &SharedBackend,
    events_tx: &broadcast::Sender<UndoEvent>,
    operator: &Operator,
    key: EntityKey,
    old: Snapshot,
    new: Snapshot,
) -> UpdateOutcome {
    let changes = store.engine().diff(key.model_type, &old, &new);
    if changes.is_empty() {
        tracing::debug!(entity = %key, "update changed nothing");
        return UpdateOutcome::unchanged();
    }

    let entry = NewChangeLogEntry {
        key,
        changes: changes.clone(),
        old_data: old.clone(),
        new_data: new,
        changed_by: operator.user_id,
    };
    let entry_id = match with_backend(backend, move |b| b.record(entry)).await {
        Ok(entry) => {
            let _ = events_tx.send(UndoEvent::EntryLogged { id: entry.id });
            Some(entry.id)
        }
        Err(err) => {
            tracing::warn!(entity = %key, error = %err, "change log write failed, continuing");
            None
        }
    };

    store.save_changes(&operator.session, key, old, changes.clone(), operator.user_id);
    tracing::debug!(
        entity = %key,
        session = %operator.session,
        changes = changes.len(),
        "undo state saved"
    );
    let _ = events_tx.send(UndoEvent::StateSaved {
        session: operator.session.clone(),
        key,
    });

    UpdateOutcome {
        undo_meta: store.undo_meta(&operator.session, key),
        changes,
        entry_id,
    }
}

async fn apply_update(
    store: &mut UndoStore,
    backend: &SharedBackend,
    events_tx: &broadcast::Sender<UndoEvent>,
    operator: &Operator,
    key: EntityKey,
    new: Snapshot,
) -> Result<UpdateOutcome, RuntimeError> {
    let old = with_backend(backend, move |b| b.load(key)).await?;
    let saved = with_backend(backend, move |b| {
        b.apply(key, &new)?;
        b.load(key)
    })
    .await?;

    let outcome = track(store, backend, events_tx, operator, key, old, saved).await;
    let _ = events_tx.send(UndoEvent::EntityUpdated {
        key,
        changes: outcome.changes.len(),
    });
    Ok(outcome)
}

async fn restore(
    store: &mut UndoStore,
    backend: &SharedBackend,
    events_tx: &broadcast::Sender<UndoEvent>,
    operator: &Operator,
    key: EntityKey,
) -> Result<RestoreOutcome, RuntimeError> {
    let Some(record) = store.record(&operator.session, key).cloned() else {
        return Ok(RestoreOutcome::NothingToRestore);
    };
    let changes = record.changes.len();
    let old = record
        .old_data
        .restricted_to(key.model_type.shape(), &record.changes);

    with_backend(backend, move |b| b.apply(key, &old)).await?;
    store.clear(&operator.session, key);

    tracing::info!(entity = %key, user_id = operator.user_id, "undo restored");
    let _ = events_tx.send(UndoEvent::Restored {
        session: operator.session.clone(),
        key,
    });
    Ok(RestoreOutcome::Restored { changes })
}

async fn revert_entry(
    store: &mut UndoStore,
    backend: &SharedBackend,
    events_tx: &broadcast::Sender<UndoEvent>,
    operator: &Operator,
    id: ChangeLogId,
) -> Result<ChangeLogEntry, RuntimeError> {
    let entry = with_backend(backend, move |b| b.get(id))
        .await?
        .ok_or(PersistError::EntryNotFound(id))?;
    if entry.is_reverted() {
        return Err(PersistError::AlreadyReverted(id).into());
    }

    let key = entry.key();
    let old = entry
        .old_data
        .restricted_to(key.model_type.shape(), &entry.changes);
    with_backend(backend, move |b| b.apply(key, &old)).await?;

    let user_id = operator.user_id;
    let reverted = with_backend(backend, move |b| b.mark_reverted(id, user_id)).await?;

    // Pending undo records of this entity no longer describe its state.
    let dropped = store.forget_key(key);
    tracing::info!(entry_id = id, entity = %key, user_id, dropped, "change log entry reverted");
    let _ = events_tx.send(UndoEvent::EntryReverted { id, key });
    Ok(reverted)
}

async fn with_backend<T, F>(backend: &SharedBackend, f: F) -> Result<T, RuntimeError>
where
    T: Send + 'static,
    F: FnOnce(&mut dyn Backend) -> PersistResult<T> + Send + 'static,
{
    let backend = Arc::clone(backend);
    tokio::task::spawn_blocking(move || {
        let mut guard = backend.blocking_lock();
        f(&mut **guard)
    })
    .await
    .map_err(|e| RuntimeError::Join(e.to_string()))?
    .map_err(RuntimeError::from)
}
