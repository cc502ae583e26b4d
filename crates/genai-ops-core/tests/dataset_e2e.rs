//! Dataset assembly over a complete configuration repository on disk.

use std::path::Path;
use std::sync::Arc;

use genai_ops_core::{
    CancellationToken, ConfigError, DatasetLoader, Environment, RepoLayout, StaticCatalogSource,
    TenantMetadata,
};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

fn repo() -> TempDir {
    let root = TempDir::new().unwrap();
    let dir = root.path();
    write(
        dir,
        "environments/prod/oc1/us-phoenix-1/gpu_pools/main.tf",
        r#"
locals {
  env_nodepools_config = {
    h100 = {
      shape                = "BM.GPU.H100.8"
      node_pool_size       = 2
      placement_logical_ad = ["phx-AD-2"]
    }
  }
  env_instance_pools_config = {
    inference = { shape = "BM.GPU.A10.4", size = var.environment == "prod" ? 6 : 1 }
  }
  env_cluster_networks_config = {}
  dangling = local.nowhere
}
"#,
    );
    write(
        dir,
        "shared/model_artifacts/models.tf",
        r#"
locals {
  all_models_map = {
    llama3 = { "trt-10" = { "BM.GPU.H100.8" = { "8Gpu" = "llama3-h100x8" } } }
  }
}
"#,
    );
    write(
        dir,
        "shared/service_tenancies/tenancies.tf",
        r#"
locals {
  oc1_genai = {
    tenancy_name = "genai"
    home_region  = "us-phoenix-1"
    regions      = ["us-phoenix-1"]
    environment  = "prod"
  }
  oc2_genai = {
    tenancy_name = "genai-gov"
    home_region  = "us-langley-1"
    regions      = ["us-langley-1"]
    environment  = "prod"
  }
}
"#,
    );
    write(
        dir,
        "tenancy_overrides/oc1/limits/limits.json",
        r#"{"acme": [{"tenant_id": "t-1", "limit_name": "gpu", "value": 8}]}"#,
    );
    write(
        dir,
        "tenant_catalog.yaml",
        "- id: t-1\n  name: Acme\n  isInternal: false\n",
    );
    root
}

fn env() -> Environment {
    Environment::new("oc1", "us-phoenix-1", "prod")
}

#[tokio::test]
async fn test_dataset_assembles_every_entity() {
    let root = repo();
    let dataset = DatasetLoader::new(root.path(), RepoLayout::default())
        .load(&env(), &CancellationToken::new())
        .await
        .unwrap();

    let pools: Vec<_> = dataset
        .gpu_pools
        .iter()
        .map(|p| (p.name.as_str(), p.size, p.availability_domain.as_str()))
        .collect();
    assert_eq!(pools, vec![("h100", 2, "AD-2"), ("inference", 6, "")]);

    assert_eq!(dataset.model_artifacts.len(), 1);
    assert_eq!(dataset.model_artifacts[0].gpu_count, 8);

    assert_eq!(dataset.service_tenancies.len(), 1);
    assert_eq!(dataset.service_tenancies[0].name, "genai");

    assert_eq!(dataset.tenants.len(), 1);
    assert_eq!(dataset.tenants[0].name, "Acme");
    assert!(!dataset.tenants[0].is_internal);

    assert_eq!(dataset.fingerprints.len(), 3);
    assert_eq!(dataset.diagnostics.len(), 1);
    assert_eq!(dataset.diagnostics[0].name, "dangling");
}

#[tokio::test]
async fn test_injected_catalog_replaces_file() {
    let root = repo();
    let catalog = StaticCatalogSource::new(vec![TenantMetadata {
        id: "t-1".into(),
        name: Some("Acme Injected".into()),
        is_internal: None,
        note: None,
    }]);
    let dataset = DatasetLoader::new(root.path(), RepoLayout::default())
        .with_catalog(Arc::new(catalog))
        .load(&env(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(dataset.tenants[0].name, "Acme Injected");
    assert!(dataset.tenants[0].is_internal);
}

#[tokio::test]
async fn test_missing_default_catalog_is_empty() {
    let root = repo();
    std::fs::remove_file(root.path().join("tenant_catalog.yaml")).unwrap();
    let dataset = DatasetLoader::new(root.path(), RepoLayout::default())
        .load(&env(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(dataset.tenants[0].name, "acme");
}

#[tokio::test]
async fn test_parse_error_in_any_directory_is_fatal() {
    let root = repo();
    write(root.path(), "shared/model_artifacts/zz_broken.tf", "locals {\n  x = \n");
    let err = DatasetLoader::new(root.path(), RepoLayout::default())
        .load(&env(), &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        ConfigError::Parse { path, .. } => assert!(path.ends_with("zz_broken.tf")),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_dataset_serializes_to_json() {
    let root = repo();
    let dataset = DatasetLoader::new(root.path(), RepoLayout::default())
        .load(&env(), &CancellationToken::new())
        .await
        .unwrap();
    let json = serde_json::to_value(&dataset).unwrap();
    assert_eq!(json["environment"]["type"], "prod");
    assert_eq!(json["diagnostics"][0]["reason"], "waiting_on");
}
