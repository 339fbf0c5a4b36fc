use std::{path::Path, sync::LazyLock};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::{config::ConfigError, types::ModelType};

static NO_LABELS: LazyLock<FieldLabels> = LazyLock::new(FieldLabels::default);

/// Field key to display label for one model type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldLabels(HashMap<String, String>);

impl FieldLabels {
    /// Configured label for `field`, or its [`humanize`]d form.
    pub fn resolve(&self, field: &str) -> String {
        self.0
            .get(field)
            .cloned()
            .unwrap_or_else(|| humanize(field))
    }

    /// Sets the label for `field`.
    pub fn insert(&mut self, field: impl Into<String>, label: impl Into<String>) {
        self.0.insert(field.into(), label.into());
    }

    /// Number of configured labels.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nothing is configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldLabels {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Label tables for every tracked model type, loaded once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelConfig {
    models: HashMap<ModelType, FieldLabels>,
}

impl LabelConfig {
    /// Labels shipped with the admin panel.
    pub fn builtin() -> Self {
        let settings: FieldLabels = [
            ("site_name_en", "Site Name (English)"),
            ("site_name_ar", "Site Name (Arabic)"),
            ("contact_email", "Contact Email"),
            ("contact_phone", "Contact Phone"),
            ("whatsapp_number", "WhatsApp Number"),
            ("address_en", "Address (English)"),
            ("address_ar", "Address (Arabic)"),
            ("working_hours_en", "Working Hours (English)"),
            ("working_hours_ar", "Working Hours (Arabic)"),
            ("facebook_url", "Facebook URL"),
            ("linkedin_url", "LinkedIn URL"),
            ("instagram_url", "Instagram URL"),
            ("youtube_url", "YouTube URL"),
            ("google_maps_url", "Google Maps URL"),
            ("meta_description_en", "Meta Description (English)"),
            ("meta_description_ar", "Meta Description (Arabic)"),
        ]
        .into_iter()
        .collect();

        let mut models = HashMap::new();
        models.insert(ModelType::Settings, settings);
        // Rows carry their own labels.
        models.insert(ModelType::SiteContent, FieldLabels::default());
        Self { models }
    }

    /// Built-in labels overlaid with a JSON file of the form
    /// `{ "settings": { "field": "Label" } }`.
    pub fn builtin_with_overrides(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let overrides: HashMap<ModelType, HashMap<String, String>> = serde_json::from_str(&raw)?;

        let mut config = Self::builtin();
        for (model_type, fields) in overrides {
            for (field, label) in fields {
                config.set(model_type, field, label);
            }
        }
        Ok(config)
    }

    /// Sets one label.
    pub fn set(&mut self, model_type: ModelType, field: impl Into<String>, label: impl Into<String>) {
        self.models.entry(model_type).or_default().insert(field, label);
    }

    /// Labels for `model_type`; empty when none are configured.
    pub fn for_model(&self, model_type: ModelType) -> &FieldLabels {
        self.models.get(&model_type).unwrap_or(&*NO_LABELS)
    }
}

/// Fallback label: underscores become spaces and each word starts upper-case.
pub fn humanize(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut word_start = true;
    for ch in field.chars() {
        if ch == '_' || ch == ' ' {
            out.push(' ');
            word_start = true;
        } else if word_start {
            out.extend(ch.to_uppercase());
            word_start = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn humanize_title_cases_words() {
        assert_eq!(humanize("contact_email"), "Contact Email");
        assert_eq!(humanize("hero_cta_url"), "Hero Cta Url");
        assert_eq!(humanize("already Spaced"), "Already Spaced");
        assert_eq!(humanize(""), "");
    }

    #[test]
    fn configured_labels_win_over_fallback() {
        let config = LabelConfig::builtin();
        let settings = config.for_model(ModelType::Settings);
        assert_eq!(settings.resolve("linkedin_url"), "LinkedIn URL");
        assert_eq!(settings.resolve("footer_note"), "Footer Note");
    }

    #[test]
    fn overrides_file_merges_over_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.json");
        std::fs::write(
            &path,
            r#"{ "settings": { "contact_email": "Sales Inbox", "fax": "Fax Line" } }"#,
        )
        .unwrap();

        let config = LabelConfig::builtin_with_overrides(&path).unwrap();
        let settings = config.for_model(ModelType::Settings);
        assert_eq!(settings.resolve("contact_email"), "Sales Inbox");
        assert_eq!(settings.resolve("fax"), "Fax Line");
        assert_eq!(settings.resolve("youtube_url"), "YouTube URL");
    }

    #[test]
    fn unknown_model_in_overrides_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.json");
        std::fs::write(&path, r#"{ "products": { "name": "Name" } }"#).unwrap();
        assert!(matches!(
            LabelConfig::builtin_with_overrides(&path),
            Err(ConfigError::Json(_))
        ));
    }
}
