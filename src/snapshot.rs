//! Record snapshots, bilingual content groups and field-level changes.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::types::DiffShape;

/// Display cap for `Change::old` / `Change::new`, in characters.
pub const DEFAULT_DISPLAY_LIMIT: usize = 80;
/// Marker appended to values cut at the display limit.
pub const ELLIPSIS: &str = "...";

/// Point-in-time capture of an entity's editable fields.
///
/// Flat records map field names to scalars. Bilingual batches map row ids to
/// `{ label, content_en, content_ar }` objects. Keys keep insertion order so
/// changes come out in form order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(IndexMap<String, Value>);

impl Snapshot {
    /// Empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flat snapshot from `(field, value)` pairs.
    pub fn from_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Bilingual snapshot from `(row id, group)` pairs.
    pub fn from_groups<I, K>(groups: I) -> Self
    where
        I: IntoIterator<Item = (K, ContentGroup)>,
        K: ToString,
    {
        Self(
            groups
                .into_iter()
                .map(|(id, group)| (id.to_string(), group.to_value()))
                .collect(),
        )
    }

    /// Inserts or replaces one entry.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Raw value under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// True when `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Normalized text of a flat field; absent fields read as `""`.
    pub fn text(&self, key: &str) -> String {
        normalize_value(self.get(key))
    }

    /// Bilingual group stored under row `id`; absent or malformed reads as empty.
    pub fn group(&self, id: &str) -> ContentGroup {
        ContentGroup::from_value(self.get(id))
    }

    /// Only the values `changes` touched, in the shape an entity write expects.
    ///
    /// Flat fields keep their stored value (`null` when absent). Bilingual
    /// changes `{id}_content_en`/`{id}_content_ar` become a row object holding
    /// just the named languages. Fields not in `changes` are left out, so
    /// writing the result back leaves later edits to other fields alone.
    pub fn restricted_to(&self, shape: DiffShape, changes: &[Change]) -> Snapshot {
        match shape {
            DiffShape::Flat => changes
                .iter()
                .map(|c| {
                    let value = self.get(&c.field).cloned().unwrap_or(Value::Null);
                    (c.field.clone(), value)
                })
                .collect(),
            DiffShape::BilingualById => {
                let mut rows: IndexMap<String, Map<String, Value>> = IndexMap::new();
                for (id, column) in changes.iter().filter_map(|c| split_content_field(&c.field)) {
                    let group = self.group(id);
                    let text = match column {
                        CONTENT_EN => group.content_en,
                        _ => group.content_ar,
                    };
                    rows.entry(id.to_string())
                        .or_default()
                        .insert(column.to_string(), Value::String(text));
                }
                rows.into_iter()
                    .map(|(id, row)| (id, Value::Object(row)))
                    .collect()
            }
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Snapshot {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self::from_fields(iter)
    }
}

/// One localized content row: display label plus English and Arabic text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContentGroup {
    /// Admin-facing label of the row.
    #[serde(default)]
    pub label: String,
    /// English text.
    #[serde(default)]
    pub content_en: String,
    /// Arabic text.
    #[serde(default)]
    pub content_ar: String,
}

impl ContentGroup {
    /// Builds a group.
    pub fn new(
        label: impl Into<String>,
        content_en: impl Into<String>,
        content_ar: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            content_en: content_en.into(),
            content_ar: content_ar.into(),
        }
    }

    /// Reads a group leniently: missing members and non-object values become `""`.
    pub fn from_value(value: Option<&Value>) -> Self {
        let Some(Value::Object(obj)) = value else {
            return Self::default();
        };
        Self {
            label: normalize_value(obj.get("label")),
            content_en: normalize_value(obj.get("content_en")),
            content_ar: normalize_value(obj.get("content_ar")),
        }
    }

    fn to_value(&self) -> Value {
        serde_json::json!({
            "label": self.label,
            "content_en": self.content_en,
            "content_ar": self.content_ar,
        })
    }
}

/// One field-level difference between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// Field identifier (`contact_email`, `7_content_ar`, ...).
    pub field: String,
    /// Human-readable label.
    pub label: String,
    /// Previous value, cut for display.
    pub old: String,
    /// New value, cut for display.
    pub new: String,
}

impl Change {
    /// Compares full normalized values and, only when they differ, builds a
    /// change with both sides cut to `limit` characters.
    pub fn between(
        field: impl Into<String>,
        label: impl Into<String>,
        old: &str,
        new: &str,
        limit: usize,
    ) -> Option<Self> {
        if old == new {
            return None;
        }
        Some(Self {
            field: field.into(),
            label: label.into(),
            old: truncate_for_display(old, limit),
            new: truncate_for_display(new, limit),
        })
    }
}

const CONTENT_EN: &str = "content_en";
const CONTENT_AR: &str = "content_ar";

/// Splits `"{id}_content_en"` into `("{id}", "content_en")`.
fn split_content_field(field: &str) -> Option<(&str, &'static str)> {
    [CONTENT_EN, CONTENT_AR].into_iter().find_map(|column| {
        field
            .strip_suffix(column)
            .and_then(|rest| rest.strip_suffix('_'))
            .filter(|id| !id.is_empty())
            .map(|id| (id, column))
    })
}

/// Coerces a snapshot value to the string a form field would hold.
///
/// `null`/absent and `false` become `""`, `true` becomes `"1"`, integral
/// floats lose their fraction, containers become compact JSON.
pub fn normalize_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(true)) => "1".to_string(),
        Some(Value::Bool(false)) => String::new(),
        Some(Value::Number(n)) => format_number(n),
        Some(other) => other.to_string(),
    }
}

fn format_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// Keeps the first `limit` characters and appends [`ELLIPSIS`] when cut.
pub fn truncate_for_display(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => format!("{}{ELLIPSIS}", &text[..byte_idx]),
        None => text.to_string(),
    }
}
