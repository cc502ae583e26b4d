//! Fixpoint resolver properties: monotonicity, order independence,
//! termination on cycles, and the node-pool scenario end to end.

use genai_ops_core::{
    extract_all_gpu_pools, extract_gpu_pools, ByName, CancellationToken, ConfigError, Declaration,
    DeclarationSet, DynamicValue, Environment, GpuPool, PoolSource, Resolver, SchedulingOrder,
    UnresolvedReason,
};
use tempfile::TempDir;

fn env() -> Environment {
    Environment::new("oc1", "phx", "prod")
}

const CHAIN: &str = r#"
locals {
  region_label = upper(var.region)
  prefix       = "${local.execution_target.realm}-${local.region_label}"
  pool_names   = [for n in ["a", "b"] : "${local.prefix}-${n}"]
  all_names    = concat(local.pool_names, [local.prefix])
  name_count   = length(local.all_names)
}
"#;

#[derive(Debug)]
struct ReverseName;

impl SchedulingOrder for ReverseName {
    fn sort(&self, pending: &mut [&Declaration]) {
        pending.sort_by(|a, b| b.name.cmp(&a.name));
    }
}

#[test]
fn test_scheduling_order_does_not_change_result() {
    let set = DeclarationSet::from_sources([("main.tf", CHAIN)]).unwrap();
    let default = Resolver::new().resolve(&set, &env());
    let by_name = Resolver::new().with_order(ByName).resolve(&set, &env());
    let reversed = Resolver::new().with_order(ReverseName).resolve(&set, &env());

    assert!(default.is_complete());
    assert_eq!(default.values, by_name.values);
    assert_eq!(default.values, reversed.values);
    assert_eq!(default.get("name_count"), Some(&DynamicValue::Number(3.0)));
    assert_eq!(
        default.get("pool_names"),
        Some(&DynamicValue::from(vec!["oc1-PHX-a", "oc1-PHX-b"]))
    );
}

#[test]
fn test_source_order_does_not_change_result() {
    let split_a = "locals {\n  a = local.b\n}\n";
    let split_b = "locals {\n  b = \"x\"\n}\n";
    let forward = DeclarationSet::from_sources([("1.tf", split_a), ("2.tf", split_b)]).unwrap();
    let backward = DeclarationSet::from_sources([("1.tf", split_b), ("2.tf", split_a)]).unwrap();
    assert_eq!(
        Resolver::new().resolve(&forward, &env()).values,
        Resolver::new().resolve(&backward, &env()).values
    );
}

#[test]
fn test_adding_declarations_never_removes_resolved_values() {
    let base = DeclarationSet::from_sources([("main.tf", CHAIN)]).unwrap();
    let grown = DeclarationSet::from_sources([
        ("main.tf", CHAIN),
        (
            "extra.tf",
            "locals {\n  waiting = local.never_declared\n  broken = lookup(1)\n}\n",
        ),
    ])
    .unwrap();

    let before = Resolver::new().resolve(&base, &env());
    let after = Resolver::new().resolve(&grown, &env());
    for (name, value) in &before.values {
        assert_eq!(after.get(name), Some(value), "{name} changed");
    }
    assert_eq!(after.unresolved.len(), 2);
}

#[test]
fn test_resolved_count_never_decreases_across_passes() {
    let set = DeclarationSet::from_sources([("main.tf", CHAIN)]).unwrap();
    let result = Resolver::new().with_order(ReverseName).resolve(&set, &env());
    let mut resolved_so_far = 0;
    let mut last_pending = set.len();
    for pass in &result.passes {
        resolved_so_far += pass.resolved;
        assert!(pass.pending <= last_pending);
        last_pending = pass.pending;
    }
    assert_eq!(resolved_so_far, result.values.len());
}

#[test]
fn test_two_cycle_terminates_within_bound() {
    let set = DeclarationSet::from_sources([("main.tf", "locals {\n  a = b\n  b = a\n}\n")])
        .unwrap();
    let result = Resolver::new().resolve(&set, &env());
    assert!(result.values.is_empty());
    assert!(result.iterations <= 2);
    assert_eq!(result.unresolved.len(), 2);

    let set = DeclarationSet::from_sources([(
        "main.tf",
        "locals {\n  a = local.b\n  b = local.a\n}\n",
    )])
    .unwrap();
    let result = Resolver::new().resolve(&set, &env());
    assert!(result.iterations <= 2);
    assert!(result
        .unresolved
        .iter()
        .all(|d| matches!(d.reason, UnresolvedReason::Cyclic { .. })));
}

#[test]
fn test_nodepool_scenario_end_to_end() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("data.tf"),
        r#"
data "oci_identity_availability_domains" "ads" {
  compartment_id = local.execution_target.tenancy_ocid
}
"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("pools.tf"),
        r#"
locals {
  env_nodepools_config = {
    h100 = {
      shape                = local.gpu_shape
      node_pool_size       = local.sizes[var.environment]
      placement_logical_ad = local.ad_names
    }
    system = {
      shape          = "VM.Standard.E4.Flex"
      node_pool_size = 3
    }
  }
  ad_names  = [for ad in data.oci_identity_availability_domains.ads.availability_domains : ad.name]
  gpu_shape = "BM.GPU.H100.8"
  sizes     = { prod = 4, dev = 1 }
}
"#,
    )
    .unwrap();

    let result = Resolver::new()
        .resolve_directory(dir.path(), &env(), &CancellationToken::new())
        .unwrap();
    assert!(result.is_complete(), "{:?}", result.unresolved);
    assert!(result.fingerprint.is_some());

    let pools = extract_gpu_pools(&result, PoolSource::NodePools).unwrap();
    assert_eq!(pools.len(), 1);
    let pool = &pools[0];
    assert_eq!(pool.name, "h100");
    assert_eq!(pool.shape, "BM.GPU.H100.8");
    assert_eq!(pool.size, 4);
    assert_eq!(pool.availability_domain, "AD-1");
    assert_eq!(pool.capacity_type, "on-demand");
    assert!(pool.is_oke_managed);
}

#[test]
fn test_instance_pool_with_empty_sibling_sources() {
    let set = DeclarationSet::from_sources([(
        "pools.tf",
        r#"
locals {
  env_instance_pools_config   = { pool1 = { shape = "GPU", size = 2 } }
  env_cluster_networks_config = {}
  env_nodepools_config        = {}
}
"#,
    )])
    .unwrap();
    let result = Resolver::new().resolve(&set, &env());
    assert!(result.is_complete());

    let pools = extract_all_gpu_pools(&result).unwrap();
    assert_eq!(
        pools,
        vec![GpuPool {
            name: "pool1".into(),
            shape: "GPU".into(),
            size: 2,
            capacity_type: "on-demand".into(),
            availability_domain: String::new(),
            is_oke_managed: false,
        }]
    );
}

#[test]
fn test_unconverged_pool_source_fails_extraction() {
    let set = DeclarationSet::from_sources([(
        "pools.tf",
        r#"
locals {
  env_instance_pools_config   = { p1 = { shape = "BM.GPU.A10" } }
  env_cluster_networks_config = {}
  env_nodepools_config        = { p2 = { shape = local.typo } }
}
"#,
    )])
    .unwrap();
    let result = Resolver::new().resolve(&set, &env());
    assert_eq!(result.unresolved.len(), 1);

    match extract_all_gpu_pools(&result).unwrap_err() {
        ConfigError::NotResolved { name } => assert_eq!(name, "env_nodepools_config"),
        other => panic!("expected not-resolved error, got {other:?}"),
    }
}
