//! Tenant identity reconciliation.
//!
//! Tenant names from the three override categories are merged with the
//! metadata catalog in three steps:
//!
//! 1. Union the tenant IDs per tenant name across categories.
//! 2. Enrich each bucket from the first of its IDs, in tie-break order, that
//!    has a catalog entry. That entry is then consumed.
//! 3. Unconsumed catalog entries with both `name` and `is_internal` become
//!    tenants of their own.
//!
//! Enrichment only overrides fields; it never removes IDs.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::obs;
use crate::tenants::catalog::TenantMetadata;
use crate::tenants::overrides::OverrideSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    /// Every known tenant ID, sorted.
    pub ids: Vec<String>,
    pub name: String,
    pub is_internal: bool,
    pub note: String,
}

/// Chooses which ID's metadata wins when several IDs of one tenant have a
/// catalog entry. Sorts `ids` so the preferred candidate comes first.
pub trait MetadataTieBreak: fmt::Debug + Send + Sync {
    fn order(&self, ids: &mut [&str]);
}

/// Lexicographically lowest ID first.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowestIdFirst;

impl MetadataTieBreak for LowestIdFirst {
    fn order(&self, ids: &mut [&str]) {
        ids.sort_unstable();
    }
}

#[derive(Debug, Clone)]
pub struct TenantReconciler {
    tie_break: Arc<dyn MetadataTieBreak>,
}

impl Default for TenantReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl TenantReconciler {
    pub fn new() -> Self {
        Self {
            tie_break: Arc::new(LowestIdFirst),
        }
    }

    pub fn with_tie_break(tie_break: impl MetadataTieBreak + 'static) -> Self {
        Self {
            tie_break: Arc::new(tie_break),
        }
    }

    /// Build the tenant registry, ordered by name then first ID.
    pub fn reconcile(&self, overrides: &OverrideSet, metadata: &[TenantMetadata]) -> Vec<Tenant> {
        let mut by_id: HashMap<&str, &TenantMetadata> = HashMap::new();
        for entry in metadata {
            by_id.entry(entry.id.as_str()).or_insert(entry);
        }
        let mut consumed: HashSet<&str> = HashSet::new();
        let mut tenants = Vec::new();

        for (name, ids) in overrides.tenant_ids() {
            let mut candidates: Vec<&str> = ids
                .iter()
                .map(String::as_str)
                .filter(|id| by_id.contains_key(id))
                .collect();
            self.tie_break.order(&mut candidates);

            let mut tenant = Tenant {
                ids: ids.iter().cloned().collect(),
                name: name.clone(),
                is_internal: true,
                note: String::new(),
            };
            if let Some(&chosen) = candidates.first() {
                if candidates.len() > 1 {
                    let all: Vec<String> = candidates.iter().map(|id| id.to_string()).collect();
                    obs::emit_tenant_metadata_ambiguous(&name, chosen, &all);
                }
                let entry = by_id[chosen];
                if let Some(meta_name) = &entry.name {
                    tenant.name = meta_name.clone();
                }
                if let Some(is_internal) = entry.is_internal {
                    tenant.is_internal = is_internal;
                }
                if let Some(note) = &entry.note {
                    tenant.note = note.clone();
                }
                consumed.insert(entry.id.as_str());
            }
            tenants.push(tenant);
        }

        for entry in metadata {
            if !consumed.insert(entry.id.as_str()) {
                continue;
            }
            if let (Some(name), Some(is_internal)) = (&entry.name, entry.is_internal) {
                tenants.push(Tenant {
                    ids: vec![entry.id.clone()],
                    name: name.clone(),
                    is_internal,
                    note: entry.note.clone().unwrap_or_default(),
                });
            }
        }

        tenants.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.ids.cmp(&b.ids)));
        tenants
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenants::overrides::{ConsolePropertyOverride, LimitOverride};

    fn limit(id: &str) -> LimitOverride {
        LimitOverride {
            tenant_id: id.to_string(),
            limit_name: None,
            value: serde_json::Value::Null,
            regions: vec![],
        }
    }

    fn console(id: &str) -> ConsolePropertyOverride {
        ConsolePropertyOverride {
            tenant_id: id.to_string(),
            property_name: None,
            value: serde_json::Value::Null,
        }
    }

    fn meta(id: &str, name: Option<&str>, is_internal: Option<bool>) -> TenantMetadata {
        TenantMetadata {
            id: id.to_string(),
            name: name.map(str::to_string),
            is_internal,
            note: None,
        }
    }

    #[test]
    fn test_defaults_without_metadata() {
        let mut overrides = OverrideSet::default();
        overrides.limits.insert("acme".into(), vec![limit("b"), limit("a")]);
        let tenants = TenantReconciler::new().reconcile(&overrides, &[]);
        assert_eq!(
            tenants,
            vec![Tenant {
                ids: vec!["a".into(), "b".into()],
                name: "acme".into(),
                is_internal: true,
                note: String::new(),
            }]
        );
    }

    #[test]
    fn test_enrichment_keeps_all_ids() {
        let mut overrides = OverrideSet::default();
        overrides.limits.insert("acme".into(), vec![limit("a")]);
        overrides
            .console_properties
            .insert("acme".into(), vec![console("b")]);
        let catalog = vec![TenantMetadata {
            note: Some("design partner".into()),
            ..meta("b", Some("Acme Corp"), Some(false))
        }];
        let tenants = TenantReconciler::new().reconcile(&overrides, &catalog);
        assert_eq!(tenants.len(), 1);
        assert_eq!(tenants[0].ids, vec!["a", "b"]);
        assert_eq!(tenants[0].name, "Acme Corp");
        assert!(!tenants[0].is_internal);
        assert_eq!(tenants[0].note, "design partner");
    }

    #[test]
    fn test_partial_metadata_only_overrides_present_fields() {
        let mut overrides = OverrideSet::default();
        overrides.limits.insert("acme".into(), vec![limit("a")]);
        let tenants =
            TenantReconciler::new().reconcile(&overrides, &[meta("a", None, Some(false))]);
        assert_eq!(tenants[0].name, "acme");
        assert!(!tenants[0].is_internal);
    }

    #[test]
    fn test_lowest_id_wins_tie_break() {
        let mut overrides = OverrideSet::default();
        overrides
            .limits
            .insert("acme".into(), vec![limit("z"), limit("m")]);
        let catalog = vec![
            meta("z", Some("From Z"), Some(true)),
            meta("m", Some("From M"), Some(true)),
        ];
        let tenants = TenantReconciler::new().reconcile(&overrides, &catalog);
        // "z" was not consumed but has both fields, so it becomes an orphan tenant
        let names: Vec<_> = tenants.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["From M", "From Z"]);
        assert_eq!(tenants[0].ids, vec!["m", "z"]);
        assert_eq!(tenants[1].ids, vec!["z"]);
    }

    #[derive(Debug)]
    struct HighestIdFirst;

    impl MetadataTieBreak for HighestIdFirst {
        fn order(&self, ids: &mut [&str]) {
            ids.sort_unstable_by(|a, b| b.cmp(a));
        }
    }

    #[test]
    fn test_custom_tie_break() {
        let mut overrides = OverrideSet::default();
        overrides
            .limits
            .insert("acme".into(), vec![limit("m"), limit("z")]);
        let catalog = vec![
            meta("z", Some("From Z"), None),
            meta("m", Some("From M"), None),
        ];
        let tenants = TenantReconciler::with_tie_break(HighestIdFirst).reconcile(&overrides, &catalog);
        assert_eq!(tenants.len(), 1);
        assert_eq!(tenants[0].name, "From Z");
    }

    #[test]
    fn test_orphans_need_name_and_flag() {
        let catalog = vec![
            meta("o1", Some("Orphan"), Some(false)),
            meta("o2", Some("No flag"), None),
            meta("o3", None, Some(true)),
        ];
        let tenants = TenantReconciler::new().reconcile(&OverrideSet::default(), &catalog);
        assert_eq!(tenants.len(), 1);
        assert_eq!(tenants[0].ids, vec!["o1"]);
        assert!(!tenants[0].is_internal);
    }
}
