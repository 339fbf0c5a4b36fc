use crate::snapshot::{Change, Snapshot};

use super::{DiffContext, DiffStrategy};

/// Compares batches of localized rows keyed by row id.
///
/// English and Arabic are checked independently, so editing one language
/// yields exactly one change for that row.
#[derive(Debug, Clone, Copy, Default)]
pub struct BilingualByIdDiff;

impl DiffStrategy for BilingualByIdDiff {
    fn diff(&self, ctx: DiffContext<'_>, old: &Snapshot, new: &Snapshot) -> Vec<Change> {
        let mut out = Vec::new();
        for id in new.keys() {
            let before = old.group(id);
            let after = new.group(id);

            let label = [after.label.as_str(), before.label.as_str()]
                .into_iter()
                .find(|l| !l.is_empty())
                .unwrap_or(id.as_str());

            let langs = [
                ("content_en", "EN", &before.content_en, &after.content_en),
                ("content_ar", "AR", &before.content_ar, &after.content_ar),
            ];
            for (column, tag, was, now) in langs {
                if let Some(change) = Change::between(
                    format!("{id}_{column}"),
                    format!("{label} ({tag})"),
                    was,
                    now,
                    ctx.display_limit,
                ) {
                    out.push(change);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{diff::FieldLabels, snapshot::ContentGroup};

    #[test]
    fn label_falls_back_to_old_group_then_id() {
        let labels = FieldLabels::default();
        let ctx = DiffContext {
            labels: &labels,
            display_limit: 80,
        };
        let old = Snapshot::from_groups([(3, ContentGroup::new("Mission", "a", "ب"))]);
        let new = Snapshot::from_fields([
            ("3", json!({ "content_en": "b", "content_ar": "ب" })),
            ("4", json!({ "content_en": "new" })),
        ]);

        let changes = BilingualByIdDiff.diff(ctx, &old, &new);
        let labels: Vec<_> = changes.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, ["Mission (EN)", "4 (EN)"]);
    }
}
