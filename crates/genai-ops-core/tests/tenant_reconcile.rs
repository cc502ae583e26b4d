//! Tenant reconciliation from override files and a catalog source.

use std::path::Path;

use genai_ops_core::{
    load_override_set, StaticCatalogSource, TenantCatalogSource, TenantMetadata, TenantReconciler,
};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

fn fixture() -> TempDir {
    let root = TempDir::new().unwrap();
    write(
        root.path(),
        "oc1/limits/gpu.json",
        r#"{"x": [{"tenant_id": "id1", "limit_name": "h100-count", "value": 16}]}"#,
    );
    write(
        root.path(),
        "oc1/console_properties/ui.yaml",
        "x:\n  - tenantId: id2\n    property_name: playground\n    value: true\n",
    );
    write(
        root.path(),
        "oc1/properties/flags.yml",
        "y:\n  - tenant_id: id3\n    property_name: dedicated\n    value: on\n    regions: [us-phoenix-1]\n",
    );
    write(
        root.path(),
        "oc2/limits/other.json",
        r#"{"z": [{"tenant_id": "id9"}]}"#,
    );
    root
}

#[test]
fn test_tenant_ids_are_unioned_per_name() {
    let root = fixture();
    let overrides = load_override_set(root.path(), "oc1").unwrap();
    let tenants = TenantReconciler::new().reconcile(&overrides, &[]);

    assert_eq!(tenants.len(), 2);
    assert_eq!(tenants[0].name, "x");
    assert_eq!(tenants[0].ids, vec!["id1", "id2"]);
    assert!(tenants[0].is_internal);
    assert_eq!(tenants[1].name, "y");
    assert_eq!(tenants[1].ids, vec!["id3"]);
}

#[tokio::test]
async fn test_catalog_enrichment_and_orphans() {
    let root = fixture();
    let overrides = load_override_set(root.path(), "oc1").unwrap();
    let catalog = StaticCatalogSource::new(vec![
        TenantMetadata {
            id: "id2".into(),
            name: Some("Xylo Labs".into()),
            is_internal: Some(false),
            note: Some("external pilot".into()),
        },
        TenantMetadata {
            id: "id7".into(),
            name: Some("Quiet Corp".into()),
            is_internal: Some(false),
            note: None,
        },
        TenantMetadata::new("id8"),
    ]);
    let metadata = catalog.fetch().await.unwrap();
    let tenants = TenantReconciler::new().reconcile(&overrides, &metadata);

    let names: Vec<_> = tenants.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Quiet Corp", "Xylo Labs", "y"]);

    let xylo = &tenants[1];
    assert_eq!(xylo.ids, vec!["id1", "id2"]);
    assert!(!xylo.is_internal);
    assert_eq!(xylo.note, "external pilot");

    // enrichment never drops IDs contributed by overrides
    let total_ids: usize = tenants.iter().map(|t| t.ids.len()).sum();
    assert_eq!(total_ids, 4);
}

#[test]
fn test_realms_are_isolated() {
    let root = fixture();
    let overrides = load_override_set(root.path(), "oc2").unwrap();
    let tenants = TenantReconciler::new().reconcile(&overrides, &[]);
    assert_eq!(tenants.len(), 1);
    assert_eq!(tenants[0].ids, vec!["id9"]);
}
