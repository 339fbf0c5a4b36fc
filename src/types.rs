//! Shared primitive IDs, tracked model types and composite keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Database identifier of a tracked entity.
pub type ModelId = i64;
/// Identifier of an admin operator.
pub type UserId = i64;
/// Change log row identifier.
pub type ChangeLogId = i64;

/// Entity id under which the global settings singleton is tracked.
pub const SETTINGS_ID: ModelId = 1;

/// Shape of the snapshots captured for a model type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffShape {
    /// Field name to scalar value.
    Flat,
    /// Row id to `{ label, content_en, content_ar }` group.
    BilingualById,
}

/// Entity types whose updates are tracked for undo and audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Global site settings (contact details, social links, site names).
    Settings,
    /// Localized page content rows edited as a batch per page.
    SiteContent,
}

impl ModelType {
    /// Every tracked model type.
    pub const ALL: [ModelType; 2] = [ModelType::Settings, ModelType::SiteContent];

    /// Stable tag used in storage and URLs.
    pub fn as_str(self) -> &'static str {
        match self {
            ModelType::Settings => "settings",
            ModelType::SiteContent => "site_content",
        }
    }

    /// Snapshot shape diffed for this model type.
    pub fn shape(self) -> DiffShape {
        match self {
            ModelType::Settings => DiffShape::Flat,
            ModelType::SiteContent => DiffShape::BilingualById,
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a tag does not name a tracked model type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown model type: {0}")]
pub struct UnknownModelType(pub String);

impl FromStr for ModelType {
    type Err = UnknownModelType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelType::ALL
            .into_iter()
            .find(|mt| mt.as_str() == s)
            .ok_or_else(|| UnknownModelType(s.to_string()))
    }
}

/// Composite `(model type, model id)` key for one tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityKey {
    /// Entity type.
    pub model_type: ModelType,
    /// Entity id within its type.
    pub model_id: ModelId,
}

impl EntityKey {
    /// Builds a key.
    pub const fn new(model_type: ModelType, model_id: ModelId) -> Self {
        Self {
            model_type,
            model_id,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.model_type, self.model_id)
    }
}

/// Opaque identifier of an operator's login session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps a session token.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrowed token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The operator performing a request: whose session and which user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    /// Session the undo state belongs to.
    pub session: SessionId,
    /// Acting admin user.
    pub user_id: UserId,
}

impl Operator {
    /// Builds an operator context.
    pub fn new(session: SessionId, user_id: UserId) -> Self {
        Self { session, user_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_type_tags_round_trip() {
        for mt in ModelType::ALL {
            assert_eq!(mt.as_str().parse::<ModelType>(), Ok(mt));
            assert_eq!(
                serde_json::to_string(&mt).unwrap(),
                format!("\"{}\"", mt.as_str())
            );
        }
        assert!("products".parse::<ModelType>().is_err());
    }

    #[test]
    fn keys_with_equal_ids_differ_by_type() {
        let a = EntityKey::new(ModelType::Settings, 1);
        let b = EntityKey::new(ModelType::SiteContent, 1);
        assert_ne!(a, b);
    }
}
