//! Where configuration lives inside a configuration repository.
//!
//! Paths are templates relative to the repository root. `{realm}`,
//! `{region}` and `{env}` expand from the [`Environment`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::environment::Environment;
use crate::error::{ConfigError, ConfigResult};
use crate::tenants::FileCatalogSource;

const DEFAULT_TENANT_CATALOG: &str = "tenant_catalog.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepoLayout {
    pub gpu_pools: String,
    pub model_artifacts: String,
    pub service_tenancies: String,
    pub tenancy_overrides: String,
    /// Explicit catalog path. When unset, `tenant_catalog.yaml` is used if
    /// it exists.
    pub tenant_catalog: Option<String>,
}

impl Default for RepoLayout {
    fn default() -> Self {
        Self {
            gpu_pools: "environments/{env}/{realm}/{region}/gpu_pools".to_string(),
            model_artifacts: "shared/model_artifacts".to_string(),
            service_tenancies: "shared/service_tenancies".to_string(),
            tenancy_overrides: "tenancy_overrides".to_string(),
            tenant_catalog: None,
        }
    }
}

impl RepoLayout {
    /// Read a YAML layout file. Omitted fields keep their defaults.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        serde_yaml::from_str(&text).map_err(|e| ConfigError::Layout {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// The file at `path` if given, otherwise the defaults.
    pub fn load_or_default(path: Option<&Path>) -> ConfigResult<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    pub fn gpu_pools_dir(&self, root: &Path, env: &Environment) -> PathBuf {
        root.join(expand(&self.gpu_pools, env))
    }

    pub fn model_artifacts_dir(&self, root: &Path, env: &Environment) -> PathBuf {
        root.join(expand(&self.model_artifacts, env))
    }

    pub fn service_tenancies_dir(&self, root: &Path, env: &Environment) -> PathBuf {
        root.join(expand(&self.service_tenancies, env))
    }

    /// Root of the override tree; realm directories sit below it.
    pub fn tenancy_overrides_root(&self, root: &Path, env: &Environment) -> PathBuf {
        root.join(expand(&self.tenancy_overrides, env))
    }

    pub fn catalog_source(&self, root: &Path, env: &Environment) -> FileCatalogSource {
        match &self.tenant_catalog {
            Some(template) => FileCatalogSource::new(root.join(expand(template, env))),
            None => FileCatalogSource::optional(root.join(DEFAULT_TENANT_CATALOG)),
        }
    }
}

/// Substitute `{realm}`, `{region}` and `{env}`.
pub fn expand(template: &str, env: &Environment) -> String {
    template
        .replace("{realm}", &env.realm)
        .replace("{region}", &env.region)
        .replace("{env}", &env.env_type)
}
