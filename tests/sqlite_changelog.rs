use serde_json::json;
use tempfile::TempDir;

use cms_undo::{
    changelog::NewChangeLogEntry,
    diff::DiffEngine,
    persist::{ChangeLogStore, EntityStore, PersistError, sqlite::SqliteBackend},
    snapshot::{ContentGroup, Snapshot},
    types::{EntityKey, ModelType, SETTINGS_ID},
};

fn settings_key() -> EntityKey {
    EntityKey::new(ModelType::Settings, SETTINGS_ID)
}

fn entry(key: EntityKey, old: Snapshot, new: Snapshot, by: i64) -> NewChangeLogEntry {
    let changes = DiffEngine::default().diff(key.model_type, &old, &new);
    NewChangeLogEntry {
        key,
        changes,
        old_data: old,
        new_data: new,
        changed_by: by,
    }
}

#[test]
fn entries_survive_reopen_newest_first() {
    let tmp = TempDir::new().expect("tmp");
    let db_path = tmp.path().join("cms.db");

    {
        let mut db = SqliteBackend::open(&db_path).expect("open");
        for (i, (old, new)) in [("a@x.com", "b@x.com"), ("b@x.com", "c@x.com")].into_iter().enumerate() {
            let e = entry(
                settings_key(),
                Snapshot::from_fields([("contact_email", old)]),
                Snapshot::from_fields([("contact_email", new)]),
                i as i64 + 1,
            );
            db.record(e).expect("record");
        }
        db.record(entry(
            EntityKey::new(ModelType::SiteContent, 2),
            Snapshot::from_groups([(9, ContentGroup::new("Hero", "a", "ب"))]),
            Snapshot::from_groups([(9, ContentGroup::new("Hero", "b", "ب"))]),
            1,
        ))
        .expect("record page");
    }

    let db = SqliteBackend::open(&db_path).expect("reopen");
    let settings = db.list_for_model(ModelType::Settings).expect("list");
    assert_eq!(settings.len(), 2);
    assert_eq!(settings[0].changes[0].new, "c@x.com");
    assert_eq!(settings[0].changed_by, 2);
    assert_eq!(settings[1].changes[0].new, "b@x.com");
    assert!(settings.iter().all(|e| e.reverted_at.is_none()));

    let pages = db.list_for_model(ModelType::SiteContent).expect("list pages");
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].model_id, 2);
    assert_eq!(pages[0].changes[0].field, "9_content_en");
    assert_eq!(pages[0].old_data.group("9").content_en, "a");
}

#[test]
fn record_returns_what_get_reads_back() {
    let mut db = SqliteBackend::open_in_memory().expect("open");
    let created = db
        .record(entry(
            settings_key(),
            Snapshot::from_fields([("youtube_url", json!(null))]),
            Snapshot::from_fields([("youtube_url", "https://youtube.com/steel")]),
            3,
        ))
        .expect("record");

    let loaded = db.get(created.id).expect("get").expect("present");
    assert_eq!(loaded, created);
    assert_eq!(loaded.changes[0].label, "YouTube URL");
    assert!(db.get(created.id + 100).expect("get").is_none());
}

#[test]
fn revert_is_single_use_and_leaves_entry_untouched() {
    let mut db = SqliteBackend::open_in_memory().expect("open");
    let created = db
        .record(entry(
            settings_key(),
            Snapshot::from_fields([("contact_phone", "1")]),
            Snapshot::from_fields([("contact_phone", "2")]),
            1,
        ))
        .expect("record");

    let reverted = db.mark_reverted(created.id, 9).expect("revert");
    assert!(reverted.is_reverted());
    assert_eq!(reverted.reverted_by, Some(9));

    let err = db.mark_reverted(created.id, 10).expect_err("second revert");
    assert!(matches!(err, PersistError::AlreadyReverted(id) if id == created.id));

    let after = db.get(created.id).expect("get").expect("present");
    assert_eq!(after.reverted_by, Some(9));
    assert_eq!(after.reverted_at, reverted.reverted_at);

    let missing = db.mark_reverted(999, 1).expect_err("missing");
    assert!(matches!(missing, PersistError::EntryNotFound(999)));
}

#[test]
fn settings_load_and_apply_present_fields_only() {
    let mut db = SqliteBackend::open_in_memory().expect("open");
    db.upsert_setting("contact_email", "a@x.com").expect("seed");
    db.upsert_setting("site_name_en", "Steel Co").expect("seed");

    db.apply(settings_key(), &Snapshot::from_fields([("contact_email", "b@x.com")]))
        .expect("apply");

    let snap = db.load(settings_key()).expect("load");
    assert_eq!(snap.text("contact_email"), "b@x.com");
    assert_eq!(snap.text("site_name_en"), "Steel Co");

    let other = EntityKey::new(ModelType::Settings, 2);
    assert!(matches!(db.load(other), Err(PersistError::UnknownEntity(_))));
}

#[test]
fn page_apply_updates_content_of_own_rows_only() {
    let mut db = SqliteBackend::open_in_memory().expect("open");
    let hero = db
        .insert_content_row(1, "Hero Title", "Welcome", "مرحبا")
        .expect("seed");
    let foreign = db.insert_content_row(2, "Footer", "Bye", "وداعا").expect("seed");
    let page = EntityKey::new(ModelType::SiteContent, 1);

    let mut update = Snapshot::new();
    update.insert(hero.to_string(), json!({ "label": "Renamed", "content_en": "Welcome!" }));
    update.insert(foreign.to_string(), json!({ "content_en": "Hijack" }));
    db.apply(page, &update).expect("apply");

    let group = db.load(page).expect("load").group(&hero.to_string());
    assert_eq!(group, ContentGroup::new("Hero Title", "Welcome!", "مرحبا"));

    let footer = db
        .load(EntityKey::new(ModelType::SiteContent, 2))
        .expect("load footer")
        .group(&foreign.to_string());
    assert_eq!(footer.content_en, "Bye");

    assert!(matches!(
        db.load(EntityKey::new(ModelType::SiteContent, 77)),
        Err(PersistError::UnknownEntity(_))
    ));
}
