use proptest::prelude::*;

use cms_undo::{
    core::store::UndoStore,
    diff::DiffEngine,
    snapshot::{ContentGroup, Snapshot, truncate_for_display},
    types::{EntityKey, ModelType, SessionId, SETTINGS_ID},
};

const FIELDS: [&str; 5] = [
    "contact_email",
    "contact_phone",
    "address_en",
    "address_ar",
    "youtube_url",
];

fn flat_values() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z0-9 @.]{0,120}", FIELDS.len())
}

fn flat(values: &[String]) -> Snapshot {
    FIELDS
        .iter()
        .zip(values)
        .map(|(f, v)| (*f, v.clone()))
        .collect()
}

proptest! {
    #[test]
    fn identical_snapshots_never_diff(values in flat_values()) {
        let engine = DiffEngine::default();
        let snap = flat(&values);
        prop_assert!(engine.diff(ModelType::Settings, &snap, &snap).is_empty());
    }

    #[test]
    fn single_field_edit_gives_single_change(
        values in flat_values(),
        idx in 0usize..FIELDS.len(),
        suffix in "[A-Z]{1,5}",
    ) {
        let engine = DiffEngine::default();
        let old = flat(&values);
        let mut edited = values.clone();
        edited[idx].push_str(&suffix);
        let new = flat(&edited);

        let changes = engine.diff(ModelType::Settings, &old, &new);
        prop_assert_eq!(changes.len(), 1);
        prop_assert_eq!(changes[0].field.as_str(), FIELDS[idx]);
        prop_assert_eq!(&changes[0].old, &truncate_for_display(&values[idx], 80));
        prop_assert_eq!(&changes[0].new, &truncate_for_display(&edited[idx], 80));
    }

    #[test]
    fn displayed_values_never_exceed_limit_plus_ellipsis(
        old in "[a-z]{0,200}",
        new in "[a-z]{0,200}",
    ) {
        let engine = DiffEngine::default();
        let changes = engine.diff(
            ModelType::Settings,
            &Snapshot::from_fields([("address_en", old)]),
            &Snapshot::from_fields([("address_en", new)]),
        );
        for change in changes {
            prop_assert!(change.old.chars().count() <= 83);
            prop_assert!(change.new.chars().count() <= 83);
        }
    }

    #[test]
    fn bilingual_changes_count_edited_languages(
        rows in prop::collection::vec(("[a-z]{0,10}", "[a-z]{0,10}", any::<bool>(), any::<bool>()), 1..12),
    ) {
        let engine = DiffEngine::default();
        let old = Snapshot::from_groups(rows.iter().enumerate().map(|(i, (en, ar, _, _))| {
            (i, ContentGroup::new(format!("Row {i}"), en.clone(), ar.clone()))
        }));
        let new = Snapshot::from_groups(rows.iter().enumerate().map(|(i, (en, ar, edit_en, edit_ar))| {
            let en = if *edit_en { format!("{en}!") } else { en.clone() };
            let ar = if *edit_ar { format!("{ar}!") } else { ar.clone() };
            (i, ContentGroup::new(format!("Row {i}"), en, ar))
        }));

        let expected = rows
            .iter()
            .map(|(_, _, e, a)| usize::from(*e) + usize::from(*a))
            .sum::<usize>();
        prop_assert_eq!(engine.diff(ModelType::SiteContent, &old, &new).len(), expected);
    }

    #[test]
    fn last_save_wins_and_meta_matches_diff(saves in prop::collection::vec(flat_values(), 1..8)) {
        let mut store = UndoStore::default();
        let session = SessionId::new("prop");
        let key = EntityKey::new(ModelType::Settings, SETTINGS_ID);

        let mut current = flat(&vec![String::new(); FIELDS.len()]);
        let mut expected = None;
        for values in saves {
            let next = flat(&values);
            let changes = store.engine().diff(ModelType::Settings, &current, &next);
            let saved = store.save_state(&session, key, current.clone(), &next, 1);
            prop_assert_eq!(saved, !changes.is_empty());
            if saved {
                expected = Some((current.clone(), changes));
            }
            current = next;
        }

        match expected {
            Some((old, changes)) => {
                let meta = store.undo_meta(&session, key).expect("meta");
                prop_assert_eq!(meta.changes, changes);
                prop_assert_eq!(store.old_data(&session, key), Some(old));
            }
            None => prop_assert!(store.undo_meta(&session, key).is_none()),
        }
        prop_assert!(store.record_count(&session) <= 1);
    }
}
