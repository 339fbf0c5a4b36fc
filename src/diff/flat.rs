use crate::snapshot::{Change, Snapshot};

use super::{DiffContext, DiffStrategy};

/// Compares flat records field by field.
///
/// Only keys present in `new` are considered; a key missing from `old` reads
/// as the empty string.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatDiff;

impl DiffStrategy for FlatDiff {
    fn diff(&self, ctx: DiffContext<'_>, old: &Snapshot, new: &Snapshot) -> Vec<Change> {
        new.keys()
            .filter_map(|field| {
                let before = old.text(field);
                let after = new.text(field);
                Change::between(
                    field.as_str(),
                    ctx.labels.resolve(field),
                    &before,
                    &after,
                    ctx.display_limit,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::diff::FieldLabels;

    fn ctx(labels: &FieldLabels) -> DiffContext<'_> {
        DiffContext {
            labels,
            display_limit: 80,
        }
    }

    #[test]
    fn keys_only_in_old_are_ignored() {
        let labels = FieldLabels::default();
        let old = Snapshot::from_fields([("a", "1"), ("b", "2")]);
        let new = Snapshot::from_fields([("a", "1")]);
        assert!(FlatDiff.diff(ctx(&labels), &old, &new).is_empty());
    }

    #[test]
    fn keys_only_in_new_compare_against_empty() {
        let labels = FieldLabels::default();
        let old = Snapshot::new();
        let new = Snapshot::from_fields([("whatsapp_number", json!("+20 100")), ("fax", json!(null))]);
        let changes = FlatDiff.diff(ctx(&labels), &old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, "whatsapp_number");
        assert_eq!(changes[0].label, "Whatsapp Number");
        assert_eq!(changes[0].old, "");
    }
}
