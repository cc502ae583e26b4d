//! Tenant identity: override datasets, the metadata catalog and their
//! reconciliation into one registry.

pub mod catalog;
pub mod overrides;
pub mod reconcile;

pub use catalog::{FileCatalogSource, StaticCatalogSource, TenantCatalogSource, TenantMetadata};
pub use overrides::{
    load_override_set, load_overrides, ConsolePropertyOverride, LimitOverride, OverrideCategory,
    OverrideMap, OverrideSet, PropertyOverride, TenancyOverride,
};
pub use reconcile::{LowestIdFirst, MetadataTieBreak, Tenant, TenantReconciler};
