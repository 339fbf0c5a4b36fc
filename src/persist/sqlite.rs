//! SQLite-backed change log and entity store.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, types::Type};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    changelog::{ChangeLogEntry, NewChangeLogEntry},
    snapshot::{ContentGroup, Snapshot, normalize_value},
    types::{ChangeLogId, EntityKey, ModelId, ModelType, SETTINGS_ID, UserId},
};

use super::{ChangeLogStore, EntityStore, PersistError, PersistResult};

const ENTRY_COLUMNS: &str = "id, model_type, model_id, changes, old_data, new_data, changed_by, \
     created_at_ms, reverted_at_ms, reverted_by";

/// SQLite implementation of [`ChangeLogStore`] and [`EntityStore`].
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    /// Opens or creates a database at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory database.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self { conn })
    }

    /// Creates or replaces one global setting.
    pub fn upsert_setting(&mut self, key: &str, value: &str) -> PersistResult<()> {
        self.conn.execute(
            "INSERT INTO settings(key, value, updated_at_ms) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at_ms = excluded.updated_at_ms",
            params![key, value, Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    /// Adds a localized content row to `page_id`, returning its id.
    pub fn insert_content_row(
        &mut self,
        page_id: ModelId,
        label: &str,
        content_en: &str,
        content_ar: &str,
    ) -> PersistResult<ModelId> {
        let sort_order: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM site_contents WHERE page_id = ?1",
            params![page_id],
            |row| row.get(0),
        )?;
        self.conn.execute(
            "INSERT INTO site_contents(page_id, sort_order, label, content_en, content_ar, updated_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                page_id,
                sort_order,
                label,
                content_en,
                content_ar,
                Utc::now().timestamp_millis()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn load_settings(&self) -> PersistResult<Snapshot> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM settings ORDER BY key ASC")?;
        let rows = stmt.query_map([], |row| {
            let key: String = row.get(0)?;
            let value: Option<String> = row.get(1)?;
            Ok((key, value.map_or(Value::Null, Value::String)))
        })?;

        let mut out = Snapshot::new();
        for row in rows {
            let (key, value) = row?;
            out.insert(key, value);
        }
        Ok(out)
    }

    fn load_page(&self, key: EntityKey) -> PersistResult<Snapshot> {
        let mut stmt = self.conn.prepare(
            "SELECT id, label, content_en, content_ar FROM site_contents
             WHERE page_id = ?1 ORDER BY sort_order ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![key.model_id], |row| {
            let id: i64 = row.get(0)?;
            let label: String = row.get(1)?;
            let en: Option<String> = row.get(2)?;
            let ar: Option<String> = row.get(3)?;
            Ok((
                id,
                ContentGroup::new(label, en.unwrap_or_default(), ar.unwrap_or_default()),
            ))
        })?;

        let mut groups = Vec::new();
        for row in rows {
            groups.push(row?);
        }
        if groups.is_empty() {
            return Err(PersistError::UnknownEntity(key));
        }
        Ok(Snapshot::from_groups(groups))
    }

    fn apply_settings(&mut self, data: &Snapshot) -> PersistResult<()> {
        let now = Utc::now().timestamp_millis();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO settings(key, value, updated_at_ms) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at_ms = excluded.updated_at_ms",
            )?;
            for (key, value) in data.iter() {
                stmt.execute(params![key, normalize_value(Some(value)), now])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn apply_page(&mut self, key: EntityKey, data: &Snapshot) -> PersistResult<()> {
        let now = Utc::now().timestamp_millis();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE site_contents
                 SET content_en = COALESCE(?1, content_en),
                     content_ar = COALESCE(?2, content_ar),
                     updated_at_ms = ?3
                 WHERE id = ?4 AND page_id = ?5",
            )?;
            for (row_id, value) in data.iter() {
                let Ok(row_id) = row_id.parse::<i64>() else {
                    tracing::warn!(entity = %key, row_id = %row_id, "skipping non-numeric content row id");
                    continue;
                };
                let Value::Object(fields) = value else {
                    tracing::warn!(entity = %key, row_id, "skipping malformed content row");
                    continue;
                };
                let en = fields.get("content_en").map(|v| normalize_value(Some(v)));
                let ar = fields.get("content_ar").map(|v| normalize_value(Some(v)));
                let updated = stmt.execute(params![en, ar, now, row_id, key.model_id])?;
                if updated == 0 {
                    tracing::warn!(entity = %key, row_id, "content row is not part of this page");
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl ChangeLogStore for SqliteBackend {
    fn record(&mut self, entry: NewChangeLogEntry) -> PersistResult<ChangeLogEntry> {
        let created_at = Utc::now();
        self.conn.execute(
            "INSERT INTO change_logs(model_type, model_id, changes, old_data, new_data, changed_by, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.key.model_type.as_str(),
                entry.key.model_id,
                serde_json::to_string(&entry.changes)?,
                serde_json::to_string(&entry.old_data)?,
                serde_json::to_string(&entry.new_data)?,
                entry.changed_by,
                created_at.timestamp_millis(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();

        Ok(ChangeLogEntry {
            id,
            model_type: entry.key.model_type,
            model_id: entry.key.model_id,
            changes: entry.changes,
            old_data: entry.old_data,
            new_data: entry.new_data,
            changed_by: entry.changed_by,
            created_at: truncate_to_millis(created_at),
            reverted_at: None,
            reverted_by: None,
        })
    }

    fn mark_reverted(&mut self, id: ChangeLogId, reverted_by: UserId) -> PersistResult<ChangeLogEntry> {
        let updated = self.conn.execute(
            "UPDATE change_logs SET reverted_at_ms = ?1, reverted_by = ?2
             WHERE id = ?3 AND reverted_at_ms IS NULL",
            params![Utc::now().timestamp_millis(), reverted_by, id],
        )?;
        if updated == 0 {
            return match self.get(id)? {
                Some(_) => Err(PersistError::AlreadyReverted(id)),
                None => Err(PersistError::EntryNotFound(id)),
            };
        }
        self.get(id)?.ok_or(PersistError::EntryNotFound(id))
    }

    fn list_for_model(&self, model_type: ModelType) -> PersistResult<Vec<ChangeLogEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM change_logs WHERE model_type = ?1
             ORDER BY created_at_ms DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![model_type.as_str()], entry_from_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn get(&self, id: ChangeLogId) -> PersistResult<Option<ChangeLogEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM change_logs WHERE id = ?1"),
                params![id],
                entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }
}

impl EntityStore for SqliteBackend {
    fn load(&self, key: EntityKey) -> PersistResult<Snapshot> {
        match key.model_type {
            ModelType::Settings if key.model_id == SETTINGS_ID => self.load_settings(),
            ModelType::Settings => Err(PersistError::UnknownEntity(key)),
            ModelType::SiteContent => self.load_page(key),
        }
    }

    fn apply(&mut self, key: EntityKey, data: &Snapshot) -> PersistResult<()> {
        match key.model_type {
            ModelType::Settings if key.model_id == SETTINGS_ID => self.apply_settings(data),
            ModelType::Settings => Err(PersistError::UnknownEntity(key)),
            ModelType::SiteContent => self.apply_page(key, data),
        }
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<ChangeLogEntry> {
    let model_type: String = row.get(1)?;
    let model_type = model_type
        .parse::<ModelType>()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(err)))?;
    let reverted_at: Option<i64> = row.get(8)?;

    Ok(ChangeLogEntry {
        id: row.get(0)?,
        model_type,
        model_id: row.get(2)?,
        changes: json_column(row, 3)?,
        old_data: json_column(row, 4)?,
        new_data: json_column(row, 5)?,
        changed_by: row.get(6)?,
        created_at: millis_column(row.get(7)?, 7)?,
        reverted_at: reverted_at.map(|ms| millis_column(ms, 8)).transpose()?,
        reverted_by: row.get(9)?,
    })
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn millis_column(ms: i64, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            Box::new(std::io::Error::other(format!("timestamp out of range: {ms}"))),
        )
    })
}

fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}
