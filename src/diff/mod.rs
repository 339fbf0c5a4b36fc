//! Field-level diffing of snapshots.
//!
//! A [`DiffEngine`] picks a [`DiffStrategy`] by the model type's
//! [`DiffShape`] and returns the list of changed fields. The engine is pure:
//! no I/O, same inputs give the same output, and an empty result means
//! there is nothing worth undoing.

/// Bilingual-by-id strategy.
pub mod bilingual;
/// Flat key/value strategy.
pub mod flat;
/// Per-model field label table.
pub mod labels;

use crate::{
    snapshot::{Change, DEFAULT_DISPLAY_LIMIT, Snapshot},
    types::{DiffShape, ModelType},
};

pub use bilingual::BilingualByIdDiff;
pub use flat::FlatDiff;
pub use labels::{FieldLabels, LabelConfig};

/// Inputs a strategy needs besides the two snapshots.
#[derive(Debug, Clone, Copy)]
pub struct DiffContext<'a> {
    /// Labels configured for the model type being diffed.
    pub labels: &'a FieldLabels,
    /// Character cap applied to displayed values.
    pub display_limit: usize,
}

/// One way of comparing two snapshots of the same shape.
pub trait DiffStrategy: Send + Sync {
    /// Returns one [`Change`] per differing field, in `new` key order.
    fn diff(&self, ctx: DiffContext<'_>, old: &Snapshot, new: &Snapshot) -> Vec<Change>;
}

static FLAT: FlatDiff = FlatDiff;
static BILINGUAL: BilingualByIdDiff = BilingualByIdDiff;

/// Strategy implementing `shape`.
pub fn strategy_for(shape: DiffShape) -> &'static dyn DiffStrategy {
    match shape {
        DiffShape::Flat => &FLAT,
        DiffShape::BilingualById => &BILINGUAL,
    }
}

/// Label-aware diff entry point shared by the undo store and the change log.
#[derive(Debug, Clone)]
pub struct DiffEngine {
    labels: LabelConfig,
    display_limit: usize,
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new(LabelConfig::builtin())
    }
}

impl DiffEngine {
    /// Engine with the given labels and the default display limit.
    pub fn new(labels: LabelConfig) -> Self {
        Self {
            labels,
            display_limit: DEFAULT_DISPLAY_LIMIT,
        }
    }

    /// Overrides the display limit.
    pub fn with_display_limit(mut self, limit: usize) -> Self {
        self.display_limit = limit;
        self
    }

    /// Configured label table.
    pub fn labels(&self) -> &LabelConfig {
        &self.labels
    }

    /// Configured display limit.
    pub fn display_limit(&self) -> usize {
        self.display_limit
    }

    /// Computes the changes from `old` to `new` for `model_type`.
    pub fn diff(&self, model_type: ModelType, old: &Snapshot, new: &Snapshot) -> Vec<Change> {
        let ctx = DiffContext {
            labels: self.labels.for_model(model_type),
            display_limit: self.display_limit,
        };
        strategy_for(model_type.shape()).diff(ctx, old, new)
    }
}
