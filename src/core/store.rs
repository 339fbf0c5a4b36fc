use chrono::{DateTime, TimeDelta, Utc};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::{
    diff::DiffEngine,
    snapshot::{Change, Snapshot},
    types::{EntityKey, SessionId, UserId},
};

/// Session lifetime used when none is configured.
pub const DEFAULT_SESSION_LIFETIME_MINUTES: i64 = 120;

/// Pre-change state of one entity, kept so the last save can be reversed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoRecord {
    /// Entity the record belongs to.
    pub key: EntityKey,
    /// Snapshot taken before the save.
    pub old_data: Snapshot,
    /// Diff of the save, as shown to the operator.
    pub changes: Vec<Change>,
    /// Time of the save.
    pub saved_at: DateTime<Utc>,
    /// Operator who saved.
    pub saved_by: UserId,
}

/// What the admin UI needs to offer an undo button.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoMeta {
    /// Always `true`; absence of undo is expressed by no meta at all.
    pub available: bool,
    /// Time of the save.
    pub saved_at: DateTime<Utc>,
    /// Operator who saved.
    pub saved_by: UserId,
    /// Fields the undo would restore.
    pub changes: Vec<Change>,
}

impl From<&UndoRecord> for UndoMeta {
    fn from(rec: &UndoRecord) -> Self {
        Self {
            available: true,
            saved_at: rec.saved_at,
            saved_by: rec.saved_by,
            changes: rec.changes.clone(),
        }
    }
}

#[derive(Debug)]
struct SessionSlot {
    records: HashMap<EntityKey, UndoRecord>,
    last_active: DateTime<Utc>,
}

impl SessionSlot {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            records: HashMap::new(),
            last_active: now,
        }
    }
}

/// Single-level undo state, partitioned by operator session.
///
/// Each session holds at most one [`UndoRecord`] per [`EntityKey`]; a newer
/// save for the same key replaces the older one. A session that has not
/// written for longer than its lifetime is treated as gone.
#[derive(Debug)]
pub struct UndoStore {
    engine: DiffEngine,
    lifetime: TimeDelta,
    sessions: HashMap<SessionId, SessionSlot>,
}

impl Default for UndoStore {
    fn default() -> Self {
        Self::new(DiffEngine::default())
    }
}

impl UndoStore {
    /// Empty store using `engine` and the default session lifetime.
    pub fn new(engine: DiffEngine) -> Self {
        Self {
            engine,
            lifetime: TimeDelta::minutes(DEFAULT_SESSION_LIFETIME_MINUTES),
            sessions: HashMap::new(),
        }
    }

    /// Overrides how long an idle session keeps its records.
    pub fn with_session_lifetime(mut self, lifetime: TimeDelta) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Diff engine used by [`UndoStore::save_state`].
    pub fn engine(&self) -> &DiffEngine {
        &self.engine
    }

    /// Diffs `old` against `new` and keeps `old` for undo when anything changed.
    ///
    /// Returns `false`, without touching stored state, when the diff is empty.
    pub fn save_state(
        &mut self,
        session: &SessionId,
        key: EntityKey,
        old: Snapshot,
        new: &Snapshot,
        saved_by: UserId,
    ) -> bool {
        self.save_state_at(session, key, old, new, saved_by, Utc::now())
    }

    /// [`UndoStore::save_state`] at an explicit time.
    pub fn save_state_at(
        &mut self,
        session: &SessionId,
        key: EntityKey,
        old: Snapshot,
        new: &Snapshot,
        saved_by: UserId,
        now: DateTime<Utc>,
    ) -> bool {
        let changes = self.engine.diff(key.model_type, &old, new);
        self.save_changes_at(session, key, old, changes, saved_by, now)
    }

    /// Stores an already computed diff; empty `changes` is a no-op returning `false`.
    pub fn save_changes(
        &mut self,
        session: &SessionId,
        key: EntityKey,
        old: Snapshot,
        changes: Vec<Change>,
        saved_by: UserId,
    ) -> bool {
        self.save_changes_at(session, key, old, changes, saved_by, Utc::now())
    }

    /// [`UndoStore::save_changes`] at an explicit time.
    /// 
    /// Saving into an expired session discards its old records first.
    pub fn save_changes_at(
        &mut self,
        session: &SessionId,
        key: EntityKey,
        old: Snapshot,
        changes: Vec<Change>,
        saved_by: UserId,
        now: DateTime<Utc>,
    ) -> bool {
        if changes.is_empty() {
            return false;
        }

        let lifetime = self.lifetime;
        let slot = self
            .sessions
            .entry(session.clone())
            .or_insert_with(|| SessionSlot::new(now));
        if !is_live(slot, lifetime, now) {
            *slot = SessionSlot::new(now);
        }
        slot.last_active = now;
        slot.records.insert(
            key,
            UndoRecord {
                key,
                old_data: old,
                changes,
                saved_at: now,
                saved_by,
            },
        );
        true
    }

    /// Undo availability for `key`; reading never consumes or refreshes it.
    pub fn undo_meta(&self, session: &SessionId, key: EntityKey) -> Option<UndoMeta> {
        self.undo_meta_at(session, key, Utc::now())
    }

    /// [`UndoStore::undo_meta`] at an explicit time.
    pub fn undo_meta_at(
        &self,
        session: &SessionId,
        key: EntityKey,
        now: DateTime<Utc>,
    ) -> Option<UndoMeta> {
        self.record_at(session, key, now).map(UndoMeta::from)
    }

    /// Stored pre-change snapshot for `key`, if any.
    pub fn old_data(&self, session: &SessionId, key: EntityKey) -> Option<Snapshot> {
        self.old_data_at(session, key, Utc::now())
    }

    /// [`UndoStore::old_data`] at an explicit time.
    pub fn old_data_at(
        &self,
        session: &SessionId,
        key: EntityKey,
        now: DateTime<Utc>,
    ) -> Option<Snapshot> {
        self.record_at(session, key, now)
            .map(|rec| rec.old_data.clone())
    }

    /// Full undo record for `key`, if the session is live.
    pub fn record(&self, session: &SessionId, key: EntityKey) -> Option<&UndoRecord> {
        self.record_at(session, key, Utc::now())
    }

    /// [`UndoStore::record`] at an explicit time.
    pub fn record_at(
        &self,
        session: &SessionId,
        key: EntityKey,
        now: DateTime<Utc>,
    ) -> Option<&UndoRecord> {
        let slot = self.sessions.get(session)?;
        if !is_live(slot, self.lifetime, now) {
            return None;
        }
        slot.records.get(&key)
    }

    /// Removes the record for `key`. Clearing an absent record does nothing.
    pub fn clear(&mut self, session: &SessionId, key: EntityKey) -> bool {
        self.sessions
            .get_mut(session)
            .and_then(|slot| slot.records.remove(&key))
            .is_some()
    }

    /// Removes the record for `key` from every session, returning how many went.
    pub fn forget_key(&mut self, key: EntityKey) -> usize {
        self.sessions
            .values_mut()
            .filter_map(|slot| slot.records.remove(&key))
            .count()
    }

    /// Drops every record of `session`, returning how many there were.
    pub fn end_session(&mut self, session: &SessionId) -> usize {
        self.sessions
            .remove(session)
            .map(|slot| slot.records.len())
            .unwrap_or(0)
    }

    /// Drops sessions idle past their lifetime, returning how many went.
    pub fn purge_expired(&mut self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    /// [`UndoStore::purge_expired`] at an explicit time.
    pub fn purge_expired_at(&mut self, now: DateTime<Utc>) -> usize {
        let lifetime = self.lifetime;
        let before = self.sessions.len();
        self.sessions.retain(|_, slot| is_live(slot, lifetime, now));
        before - self.sessions.len()
    }

    /// Number of sessions holding state, expired ones included until purged.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Number of records held for `session`.
    pub fn record_count(&self, session: &SessionId) -> usize {
        self.sessions
            .get(session)
            .map(|slot| slot.records.len())
            .unwrap_or(0)
    }
}

fn is_live(slot: &SessionSlot, lifetime: TimeDelta, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(slot.last_active) <= lifetime
}
