//! One-shot assembly of every resolved entity for an [`Environment`].
//!
//! [`DatasetLoader::load`] resolves the three configuration directories on
//! blocking worker threads while the override tree is read and the tenant
//! catalog is fetched. Each resolution owns its own context.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinSet;

use crate::cancellation::CancellationToken;
use crate::collector::SourceFingerprint;
use crate::environment::Environment;
use crate::error::{ConfigError, ConfigResult};
use crate::extract::{
    extract_all_gpu_pools, extract_model_artifacts, extract_service_tenancies, GpuPool,
    ModelArtifact, ServiceTenancy,
};
use crate::layout::RepoLayout;
use crate::obs;
use crate::resolver::{Diagnostic, ResolutionResult, Resolver};
use crate::tenants::{load_override_set, Tenant, TenantCatalogSource, TenantReconciler};

/// Everything known about one environment.
#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    pub environment: Environment,
    pub gpu_pools: Vec<GpuPool>,
    pub model_artifacts: Vec<ModelArtifact>,
    /// Service tenancies of the environment's realm only.
    pub service_tenancies: Vec<ServiceTenancy>,
    pub tenants: Vec<Tenant>,
    /// Source fingerprints of the resolved directories.
    pub fingerprints: Vec<SourceFingerprint>,
    /// Unresolved declarations across all directories.
    pub diagnostics: Vec<Diagnostic>,
    pub loaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
enum Source {
    GpuPools,
    ModelArtifacts,
    ServiceTenancies,
}

/// Builds [`Dataset`]s from a configuration repository.
pub struct DatasetLoader {
    root: PathBuf,
    layout: RepoLayout,
    resolver: Resolver,
    reconciler: TenantReconciler,
    catalog: Option<Arc<dyn TenantCatalogSource>>,
}

impl DatasetLoader {
    pub fn new(root: impl Into<PathBuf>, layout: RepoLayout) -> Self {
        Self {
            root: root.into(),
            layout,
            resolver: Resolver::new(),
            reconciler: TenantReconciler::new(),
            catalog: None,
        }
    }

    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_reconciler(mut self, reconciler: TenantReconciler) -> Self {
        self.reconciler = reconciler;
        self
    }

    /// Use `catalog` instead of the layout's catalog file.
    pub fn with_catalog(mut self, catalog: Arc<dyn TenantCatalogSource>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> &RepoLayout {
        &self.layout
    }

    /// Resolve, extract and reconcile everything for `env`.
    pub async fn load(&self, env: &Environment, cancel: &CancellationToken) -> ConfigResult<Dataset> {
        cancel.check()?;
        let started = Instant::now();

        let mut resolutions = JoinSet::new();
        for (source, dir) in [
            (Source::GpuPools, self.layout.gpu_pools_dir(&self.root, env)),
            (Source::ModelArtifacts, self.layout.model_artifacts_dir(&self.root, env)),
            (Source::ServiceTenancies, self.layout.service_tenancies_dir(&self.root, env)),
        ] {
            let resolver = self.resolver.clone();
            let env = env.clone();
            let cancel = cancel.clone();
            resolutions.spawn_blocking(move || {
                resolver
                    .resolve_directory(&dir, &env, &cancel)
                    .map(|result| (source, result))
            });
        }

        let overrides_root = self.layout.tenancy_overrides_root(&self.root, env);
        let realm = env.realm.clone();
        let overrides =
            tokio::task::spawn_blocking(move || load_override_set(&overrides_root, &realm));

        let catalog: Arc<dyn TenantCatalogSource> = match &self.catalog {
            Some(catalog) => Arc::clone(catalog),
            None => Arc::new(self.layout.catalog_source(&self.root, env)),
        };
        let metadata = catalog.fetch().await?;

        let mut pools = None;
        let mut models = None;
        let mut tenancies = None;
        while let Some(joined) = resolutions.join_next().await {
            let (source, result) =
                joined.map_err(|e| ConfigError::Task(format!("resolution task join error: {e}")))??;
            match source {
                Source::GpuPools => pools = Some(result),
                Source::ModelArtifacts => models = Some(result),
                Source::ServiceTenancies => tenancies = Some(result),
            }
        }
        let overrides = overrides
            .await
            .map_err(|e| ConfigError::Task(format!("override load task join error: {e}")))??;

        let pools = take(pools, "gpu pools")?;
        let models = take(models, "model artifacts")?;
        let tenancies = take(tenancies, "service tenancies")?;

        let gpu_pools = extract_all_gpu_pools(&pools)?;
        let model_artifacts = extract_model_artifacts(&models)?;
        let service_tenancies: Vec<ServiceTenancy> = extract_service_tenancies(&tenancies)
            .into_iter()
            .filter(|t| t.realm == env.realm)
            .collect();
        let tenants = self.reconciler.reconcile(&overrides, &metadata);

        let mut fingerprints = Vec::new();
        let mut diagnostics = Vec::new();
        for result in [pools, models, tenancies] {
            fingerprints.extend(result.fingerprint);
            diagnostics.extend(result.unresolved);
        }

        obs::emit_dataset_loaded(
            env,
            started.elapsed().as_millis() as u64,
            gpu_pools.len(),
            tenants.len(),
            diagnostics.len(),
        );

        Ok(Dataset {
            environment: env.clone(),
            gpu_pools,
            model_artifacts,
            service_tenancies,
            tenants,
            fingerprints,
            diagnostics,
            loaded_at: Utc::now(),
        })
    }
}

fn take(slot: Option<ResolutionResult>, what: &str) -> ConfigResult<ResolutionResult> {
    slot.ok_or_else(|| ConfigError::Task(format!("missing {what} resolution")))
}
