use crate::prelude::{ConfigError, ConfigResult};
use crate::record::{FieldGroup, SourceKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Which source wins when two sources report the same field.
///
/// Each field group resolves against its override list if one is configured,
/// otherwise against `default_order`. Sources missing from the list rank after
/// every listed source, in [`SourceKind`] order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergePolicy {
    pub default_order: Vec<SourceKind>,
    pub overrides: BTreeMap<FieldGroup, Vec<SourceKind>>,
    /// Numeric values closer than this are not reported as collisions.
    pub collision_tolerance: f64,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            default_order: vec![
                SourceKind::Primary,
                SourceKind::GunData,
                SourceKind::SourceTiming,
                SourceKind::Comparison,
                SourceKind::Report,
            ],
            overrides: BTreeMap::new(),
            collision_tolerance: 1e-6,
        }
    }
}

impl MergePolicy {
    pub fn order_for(&self, group: FieldGroup) -> &[SourceKind] {
        self.overrides
            .get(&group)
            .map(Vec::as_slice)
            .unwrap_or(&self.default_order)
    }

    /// Lower rank wins.
    pub fn rank(&self, group: FieldGroup, source: SourceKind) -> usize {
        let order = self.order_for(group);
        order
            .iter()
            .position(|candidate| *candidate == source)
            .unwrap_or_else(|| {
                order.len()
                    + SourceKind::ALL
                        .iter()
                        .position(|candidate| *candidate == source)
                        .unwrap_or(SourceKind::ALL.len())
            })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let lists = std::iter::once(("merge.default_order".to_string(), &self.default_order)).chain(
            self.overrides
                .iter()
                .map(|(group, order)| (format!("merge.overrides.{:?}", group), order)),
        );
        for (name, order) in lists {
            let unique: BTreeSet<_> = order.iter().collect();
            if unique.len() != order.len() {
                return Err(ConfigError::InvalidValue {
                    name,
                    reason: "a source may appear only once".to_string(),
                });
            }
        }
        if !(self.collision_tolerance.is_finite() && self.collision_tolerance >= 0.0) {
            return Err(ConfigError::InvalidValue {
                name: "merge.collision_tolerance".to_string(),
                reason: "must be a non-negative number".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_outranks_everything_by_default() {
        let policy = MergePolicy::default();
        for source in SourceKind::ALL {
            assert!(
                policy.rank(FieldGroup::Position, SourceKind::Primary)
                    <= policy.rank(FieldGroup::Position, source)
            );
        }
    }

    #[test]
    fn override_changes_one_group_only() {
        let mut policy = MergePolicy::default();
        policy.overrides.insert(
            FieldGroup::Position,
            vec![SourceKind::Report, SourceKind::Comparison],
        );
        assert!(
            policy.rank(FieldGroup::Position, SourceKind::Report)
                < policy.rank(FieldGroup::Position, SourceKind::Comparison)
        );
        assert!(
            policy.rank(FieldGroup::Sti, SourceKind::Comparison)
                < policy.rank(FieldGroup::Sti, SourceKind::Report)
        );
        // Unlisted sources fall behind the listed ones.
        assert!(
            policy.rank(FieldGroup::Position, SourceKind::Primary)
                > policy.rank(FieldGroup::Position, SourceKind::Comparison)
        );
    }

    #[test]
    fn duplicate_sources_are_rejected() {
        let mut policy = MergePolicy::default();
        policy.default_order.push(SourceKind::Primary);
        assert!(policy.validate().is_err());
    }
}
