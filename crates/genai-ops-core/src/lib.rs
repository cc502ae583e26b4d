//! genai-ops core library
//!
//! Resolves declarative GPU infrastructure configuration into typed entities
//! and reconciles tenant identity across override datasets.

pub mod cancellation;
pub mod collector;
pub mod dataset;
pub mod environment;
pub mod error;
pub mod eval;
pub mod extract;
pub mod layout;
pub mod metrics;
pub mod obs;
pub mod resolver;
pub mod telemetry;
pub mod tenants;
pub mod value;

pub use cancellation::CancellationToken;
pub use collector::{
    collect_declarations, Declaration, DeclarationKind, DeclarationSet, SourceFingerprint,
};
pub use dataset::{Dataset, DatasetLoader};
pub use environment::Environment;
pub use error::{ConfigError, ConfigResult, EvalError, EvalResult};
pub use eval::{evaluate, DataSourceRef, EvaluationContext, FunctionRegistry, Namespace, Reference};
pub use extract::{
    extract_all_gpu_pools, extract_gpu_pools, extract_model_artifacts, extract_service_tenancies,
    parse_availability_domain, parse_gpu_count, GpuPool, ModelArtifact, PoolSource,
    ServiceTenancy,
};
pub use layout::RepoLayout;
pub use resolver::{
    ByName, Diagnostic, FewestReferencesFirst, PassSummary, ResolutionResult, Resolver,
    SchedulingOrder, UnresolvedReason, DEFAULT_MAX_ITERATIONS,
};
pub use tenants::{
    load_override_set, load_overrides, ConsolePropertyOverride, FileCatalogSource, LimitOverride,
    LowestIdFirst, MetadataTieBreak, OverrideCategory, OverrideSet, PropertyOverride,
    StaticCatalogSource, Tenant, TenantCatalogSource, TenantMetadata, TenantReconciler,
};
pub use value::{DynamicValue, ValueMap};
