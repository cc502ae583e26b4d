//! GPU node pools from the pool configuration maps.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigResult;
use crate::extract::required_object;
use crate::resolver::ResolutionResult;
use crate::value::{DynamicValue, ValueMap};

const DEFAULT_CAPACITY_TYPE: &str = "on-demand";
const AD_MARKER: &str = "-AD-";

/// The three pool configuration maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolSource {
    InstancePools,
    ClusterNetworks,
    NodePools,
}

impl PoolSource {
    pub const ALL: [PoolSource; 3] = [
        PoolSource::InstancePools,
        PoolSource::ClusterNetworks,
        PoolSource::NodePools,
    ];

    /// Top-level declaration holding this source's pools.
    pub fn declaration_name(self) -> &'static str {
        match self {
            PoolSource::InstancePools => "env_instance_pools_config",
            PoolSource::ClusterNetworks => "env_cluster_networks_config",
            PoolSource::NodePools => "env_nodepools_config",
        }
    }

    /// Only node pools are managed by the Kubernetes control plane.
    pub fn is_oke_managed(self) -> bool {
        matches!(self, PoolSource::NodePools)
    }
}

impl fmt::Display for PoolSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.declaration_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuPool {
    pub name: String,
    pub shape: String,
    pub size: i64,
    pub capacity_type: String,
    pub availability_domain: String,
    pub is_oke_managed: bool,
}

/// Pools of one source whose shape names a GPU, ordered by name.
pub fn extract_gpu_pools(result: &ResolutionResult, source: PoolSource) -> ConfigResult<Vec<GpuPool>> {
    let pools = required_object(result, source.declaration_name())?;
    let mut out: Vec<GpuPool> = pools
        .iter()
        .filter_map(|(name, attrs)| pool_from(name, attrs, source))
        .collect();
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

/// Pools of all three sources, ordered by name.
///
/// Every source must be resolved; an environment without pools of some kind
/// declares that source as an empty object.
pub fn extract_all_gpu_pools(result: &ResolutionResult) -> ConfigResult<Vec<GpuPool>> {
    let mut out = Vec::new();
    for source in PoolSource::ALL {
        out.extend(extract_gpu_pools(result, source)?);
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

fn pool_from(name: &str, attrs: &DynamicValue, source: PoolSource) -> Option<GpuPool> {
    let Some(attrs) = attrs.as_object() else {
        debug!(pool = name, source = %source, found = attrs.type_name(), "skipping non-object pool entry");
        return None;
    };
    let shape = attrs.get("shape").and_then(DynamicValue::as_str)?;
    if !shape.contains("GPU") {
        return None;
    }
    Some(GpuPool {
        name: name.to_string(),
        shape: shape.to_string(),
        size: pool_size(attrs),
        capacity_type: attrs
            .get("capacity_type")
            .and_then(DynamicValue::as_str)
            .unwrap_or(DEFAULT_CAPACITY_TYPE)
            .to_string(),
        availability_domain: parse_availability_domain(attrs.get("placement_logical_ad")),
        is_oke_managed: source.is_oke_managed(),
    })
}

fn pool_size(attrs: &ValueMap) -> i64 {
    attrs
        .get("size")
        .or_else(|| attrs.get("node_pool_size"))
        .and_then(DynamicValue::as_f64)
        .map(|n| n.trunc() as i64)
        .unwrap_or_default()
}

/// Normalise a `placement_logical_ad` value.
///
/// A plain string is kept as written. For a list, the first element is used
/// when it is a string naming an availability domain, e.g. `phx-AD-2` becomes
/// `AD-2`. Anything else yields an empty string.
pub fn parse_availability_domain(value: Option<&DynamicValue>) -> String {
    match value {
        Some(DynamicValue::String(s)) => s.clone(),
        Some(DynamicValue::List(items)) => items
            .first()
            .and_then(DynamicValue::as_str)
            .and_then(|first| {
                first
                    .rfind(AD_MARKER)
                    .map(|at| format!("AD-{}", &first[at + AD_MARKER.len()..]))
            })
            .unwrap_or_default(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    fn pool(attrs: &[(&str, DynamicValue)]) -> DynamicValue {
        DynamicValue::object(attrs.iter().cloned())
    }

    fn result_with(name: &str, value: DynamicValue) -> ResolutionResult {
        let mut result = ResolutionResult::default();
        result.values.insert(name.to_string(), value);
        result
    }

    #[test]
    fn test_only_gpu_shapes_are_kept() {
        let result = result_with(
            "env_instance_pools_config",
            DynamicValue::object([
                ("cpu", pool(&[("shape", "VM.Standard.E4.Flex".into())])),
                ("lower", pool(&[("shape", "bm.gpu.a10".into())])),
                ("gpu", pool(&[("shape", "BM.GPU.H100.8".into()), ("size", 2.9.into())])),
                ("junk", DynamicValue::from("not a pool")),
            ]),
        );
        let pools = extract_gpu_pools(&result, PoolSource::InstancePools).unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].name, "gpu");
        assert_eq!(pools[0].size, 2);
        assert_eq!(pools[0].capacity_type, "on-demand");
        assert!(!pools[0].is_oke_managed);
    }

    #[test]
    fn test_node_pools_are_oke_managed_and_use_node_pool_size() {
        let result = result_with(
            "env_nodepools_config",
            DynamicValue::object([(
                "np1",
                pool(&[
                    ("shape", "BM.GPU.A100-v2.8".into()),
                    ("node_pool_size", 3_i64.into()),
                    ("capacity_type", "reserved".into()),
                ]),
            )]),
        );
        let pools = extract_gpu_pools(&result, PoolSource::NodePools).unwrap();
        assert!(pools[0].is_oke_managed);
        assert_eq!(pools[0].size, 3);
        assert_eq!(pools[0].capacity_type, "reserved");
    }

    #[test]
    fn test_availability_domain_parsing() {
        let list = |items: &[&str]| DynamicValue::from(items.to_vec());
        assert_eq!(parse_availability_domain(Some(&list(&["phx-AD-2"]))), "AD-2");
        assert_eq!(
            parse_availability_domain(Some(&list(&["synthetic:PHX-AD-1", "phx-AD-3"]))),
            "AD-1"
        );
        assert_eq!(parse_availability_domain(Some(&"all".into())), "all");
        assert_eq!(parse_availability_domain(Some(&list(&["nowhere"]))), "");
        let mixed = DynamicValue::List(vec![1_i64.into(), "phx-AD-2".into()]);
        assert_eq!(parse_availability_domain(Some(&mixed)), "");
        assert_eq!(parse_availability_domain(Some(&3_i64.into())), "");
        assert_eq!(parse_availability_domain(None), "");
    }

    #[test]
    fn test_missing_source_is_not_resolved() {
        let result = ResolutionResult::default();
        let err = extract_gpu_pools(&result, PoolSource::ClusterNetworks).unwrap_err();
        assert_eq!(
            err.to_string(),
            "config `env_cluster_networks_config` not resolved"
        );
    }

    #[test]
    fn test_unresolved_source_fails_all_pools() {
        let result = result_with(
            "env_instance_pools_config",
            DynamicValue::object([("p1", pool(&[("shape", "BM.GPU.A10".into())]))]),
        );
        let err = extract_all_gpu_pools(&result).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NotResolved { ref name } if name == "env_cluster_networks_config"
        ));
    }

    #[test]
    fn test_all_sources_merge_in_name_order() {
        let mut result = result_with(
            "env_nodepools_config",
            DynamicValue::object([("b", pool(&[("shape", "BM.GPU4.8".into())]))]),
        );
        result.values.insert(
            "env_cluster_networks_config".to_string(),
            DynamicValue::object([("a", pool(&[("shape", "BM.GPU.H100.8".into())]))]),
        );
        result.values.insert(
            "env_instance_pools_config".to_string(),
            DynamicValue::Object(ValueMap::new()),
        );
        let pools = extract_all_gpu_pools(&result).unwrap();
        let names: Vec<_> = pools.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(!pools[0].is_oke_managed);
        assert!(pools[1].is_oke_managed);
    }
}
