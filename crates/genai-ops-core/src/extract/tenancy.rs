//! Service tenancies declared as `<realm>_<suffix>` values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::resolver::ResolutionResult;
use crate::value::{DynamicValue, ValueMap};

/// Resolved names that hold lookup tables rather than tenancies.
const NON_TENANCY_NAMES: [&str; 2] = ["tenancy_name_mapping", "region_groups"];
const GROUP_PREFIX: &str = "group_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTenancy {
    pub realm: String,
    pub name: String,
    pub home_region: String,
    pub regions: Vec<String>,
    pub environment: String,
}

/// Realm prefix of a declaration name: everything before the first `_`.
pub fn realm_of(name: &str) -> &str {
    name.split_once('_').map_or(name, |(realm, _)| realm)
}

fn is_tenancy_declaration(name: &str) -> bool {
    !NON_TENANCY_NAMES.contains(&name) && !name.starts_with(GROUP_PREFIX)
}

/// Every tenancy in `result`, merged by `(realm, tenancy_name)` and ordered
/// by realm then name.
///
/// Entries sharing a key contribute their regions to the first entry seen;
/// the merged region list is sorted.
pub fn extract_service_tenancies(result: &ResolutionResult) -> Vec<ServiceTenancy> {
    let mut merged: BTreeMap<(String, String), ServiceTenancy> = BTreeMap::new();

    for (decl_name, value) in &result.values {
        if !is_tenancy_declaration(decl_name) {
            continue;
        }
        let Some(fields) = value.as_object() else {
            continue;
        };
        let Some(name) = fields.get("tenancy_name").and_then(DynamicValue::as_str) else {
            continue;
        };
        let realm = realm_of(decl_name).to_string();
        let regions = string_list(fields, "regions");

        merged
            .entry((realm.clone(), name.to_string()))
            .and_modify(|existing| existing.regions.extend(regions.iter().cloned()))
            .or_insert_with(|| ServiceTenancy {
                realm,
                name: name.to_string(),
                home_region: string_field(fields, "home_region"),
                regions,
                environment: string_field(fields, "environment"),
            });
    }

    merged
        .into_values()
        .map(|mut tenancy| {
            tenancy.regions.sort();
            tenancy
        })
        .collect()
}

fn string_field(fields: &ValueMap, key: &str) -> String {
    fields
        .get(key)
        .and_then(DynamicValue::as_str)
        .unwrap_or_default()
        .to_string()
}

fn string_list(fields: &ValueMap, key: &str) -> Vec<String> {
    fields
        .get(key)
        .and_then(DynamicValue::as_list)
        .map(|items| {
            items
                .iter()
                .filter_map(DynamicValue::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenancy(name: &str, home: &str, regions: &[&str]) -> DynamicValue {
        DynamicValue::object([
            ("tenancy_name", DynamicValue::from(name)),
            ("home_region", DynamicValue::from(home)),
            ("regions", DynamicValue::from(regions.to_vec())),
            ("environment", DynamicValue::from("prod")),
        ])
    }

    #[test]
    fn test_realm_prefix() {
        assert_eq!(realm_of("oc1_genai"), "oc1");
        assert_eq!(realm_of("oc1_genai_dev"), "oc1");
        assert_eq!(realm_of("standalone"), "standalone");
    }

    #[test]
    fn test_denylist_and_merge() {
        let mut result = ResolutionResult::default();
        let values = &mut result.values;
        values.insert("oc1_a".into(), tenancy("genai", "us-phoenix-1", &["us-phoenix-1"]));
        values.insert("oc1_b".into(), tenancy("genai", "us-phoenix-1", &["eu-frankfurt-1", "us-ashburn-1"]));
        values.insert("oc2_a".into(), tenancy("genai", "us-langley-1", &["us-langley-1"]));
        values.insert("tenancy_name_mapping".into(), tenancy("mapping", "x", &[]));
        values.insert("region_groups".into(), tenancy("groups", "x", &[]));
        values.insert("group_west".into(), tenancy("west", "x", &[]));
        values.insert("oc1_nameless".into(), DynamicValue::object([("home_region", DynamicValue::from("x"))]));
        values.insert("oc1_scalar".into(), DynamicValue::from(3_i64));

        let tenancies = extract_service_tenancies(&result);
        assert_eq!(tenancies.len(), 2);
        assert_eq!(tenancies[0].realm, "oc1");
        assert_eq!(
            tenancies[0].regions,
            vec!["eu-frankfurt-1", "us-ashburn-1", "us-phoenix-1"]
        );
        assert_eq!(tenancies[0].home_region, "us-phoenix-1");
        assert_eq!(tenancies[1].realm, "oc2");
    }
}
