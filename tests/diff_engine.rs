use serde_json::json;

use cms_undo::{
    diff::{DiffEngine, LabelConfig},
    snapshot::{ContentGroup, Snapshot},
    types::ModelType,
};

#[test]
fn settings_contact_email_change_is_labelled() {
    let engine = DiffEngine::default();
    let old = Snapshot::from_fields([("contact_email", "a@x.com"), ("site_name_en", "Steel")]);
    let new = Snapshot::from_fields([("contact_email", "b@x.com"), ("site_name_en", "Steel")]);

    let changes = engine.diff(ModelType::Settings, &old, &new);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].field, "contact_email");
    assert_eq!(changes[0].label, "Contact Email");
    assert_eq!(changes[0].old, "a@x.com");
    assert_eq!(changes[0].new, "b@x.com");
}

#[test]
fn values_equal_after_stringification_produce_no_changes() {
    let engine = DiffEngine::default();
    let old = Snapshot::from_fields([
        ("count", json!(5)),
        ("flag", json!(null)),
        ("enabled", json!(true)),
    ]);
    let new = Snapshot::from_fields([
        ("count", json!("5")),
        ("flag", json!("")),
        ("enabled", json!("1")),
    ]);

    assert!(engine.diff(ModelType::Settings, &old, &new).is_empty());
}

#[test]
fn unlabelled_field_gets_humanized_label() {
    let engine = DiffEngine::default();
    let old = Snapshot::from_fields([("footer_note", "a")]);
    let new = Snapshot::from_fields([("footer_note", "b")]);

    let changes = engine.diff(ModelType::Settings, &old, &new);
    assert_eq!(changes[0].label, "Footer Note");
}

#[test]
fn custom_labels_take_precedence() {
    let mut labels = LabelConfig::builtin();
    labels.set(ModelType::Settings, "contact_email", "Sales Inbox");
    let engine = DiffEngine::new(labels);

    let old = Snapshot::from_fields([("contact_email", "a@x.com")]);
    let new = Snapshot::from_fields([("contact_email", "b@x.com")]);
    assert_eq!(engine.diff(ModelType::Settings, &old, &new)[0].label, "Sales Inbox");
}

#[test]
fn long_values_are_cut_only_for_display() {
    let engine = DiffEngine::default();
    let base = "x".repeat(80);
    let old = Snapshot::from_fields([("meta_description_en", format!("{base}A"))]);
    let new = Snapshot::from_fields([("meta_description_en", format!("{base}B"))]);

    let changes = engine.diff(ModelType::Settings, &old, &new);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].old, format!("{base}..."));
    assert_eq!(changes[0].new, format!("{base}..."));
}

#[test]
fn display_limit_is_configurable() {
    let engine = DiffEngine::default().with_display_limit(3);
    let old = Snapshot::from_fields([("address_en", "abcdef")]);
    let new = Snapshot::from_fields([("address_en", "abcxyz")]);

    let changes = engine.diff(ModelType::Settings, &old, &new);
    assert_eq!(changes[0].old, "abc...");
    assert_eq!(changes[0].new, "abc...");
}

#[test]
fn hero_title_english_edit_yields_single_change() {
    let engine = DiffEngine::default();
    let old = Snapshot::from_groups([(5, ContentGroup::new("Hero Title", "Welcome", "مرحبا"))]);
    let new = Snapshot::from_groups([(5, ContentGroup::new("Hero Title", "Welcome!", "مرحبا"))]);

    let changes = engine.diff(ModelType::SiteContent, &old, &new);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].field, "5_content_en");
    assert_eq!(changes[0].label, "Hero Title (EN)");
    assert_eq!(changes[0].old, "Welcome");
    assert_eq!(changes[0].new, "Welcome!");
}

#[test]
fn arabic_only_edit_is_reported_for_that_language() {
    let engine = DiffEngine::default();
    let old = Snapshot::from_groups([
        (7, ContentGroup::new("About", "About us", "من نحن")),
        (8, ContentGroup::new("Vision", "Vision", "رؤيتنا")),
    ]);
    let new = Snapshot::from_groups([
        (7, ContentGroup::new("About", "About us", "عن الشركة")),
        (8, ContentGroup::new("Vision", "Vision", "رؤيتنا")),
    ]);

    let changes = engine.diff(ModelType::SiteContent, &old, &new);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].field, "7_content_ar");
    assert!(changes[0].label.ends_with(" (AR)"));
}

#[test]
fn both_languages_edited_give_two_changes_in_order() {
    let engine = DiffEngine::default();
    let old = Snapshot::from_groups([(2, ContentGroup::new("Intro", "a", "ب"))]);
    let new = Snapshot::from_groups([(2, ContentGroup::new("Intro", "b", "ت"))]);

    let fields: Vec<_> = engine
        .diff(ModelType::SiteContent, &old, &new)
        .into_iter()
        .map(|c| c.field)
        .collect();
    assert_eq!(fields, ["2_content_en", "2_content_ar"]);
}

#[test]
fn rows_only_in_old_are_ignored() {
    let engine = DiffEngine::default();
    let old = Snapshot::from_groups([
        (1, ContentGroup::new("A", "a", "")),
        (2, ContentGroup::new("B", "b", "")),
    ]);
    let new = Snapshot::from_groups([(1, ContentGroup::new("A", "a", ""))]);

    assert!(engine.diff(ModelType::SiteContent, &old, &new).is_empty());
}
