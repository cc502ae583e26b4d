//! Tenant metadata catalog sources.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::tenants::overrides::DataFormat;

/// One catalog entry. Only `id` is mandatory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantMetadata {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "isInternal")]
    pub is_internal: Option<bool>,
    #[serde(default)]
    pub note: Option<String>,
}

impl TenantMetadata {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            is_internal: None,
            note: None,
        }
    }
}

/// Injectable source of tenant metadata.
///
/// Implement this to plug in a remote catalog service or test stubs.
#[async_trait]
pub trait TenantCatalogSource: Send + Sync {
    async fn fetch(&self) -> ConfigResult<Vec<TenantMetadata>>;
}

/// Catalog stored as a JSON or YAML list on disk.
#[derive(Debug, Clone)]
pub struct FileCatalogSource {
    path: PathBuf,
    required: bool,
}

impl FileCatalogSource {
    /// A catalog file that must exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            required: true,
        }
    }

    /// A catalog file whose absence means an empty catalog.
    pub fn optional(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            required: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TenantCatalogSource for FileCatalogSource {
    async fn fetch(&self) -> ConfigResult<Vec<TenantMetadata>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !self.required => {
                tracing::debug!(path = %self.path.display(), "no tenant catalog, using empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(ConfigError::io(&self.path, e)),
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let format = DataFormat::from_path(&self.path).ok_or_else(|| ConfigError::CatalogLoad {
            path: self.path.clone(),
            reason: "expected a .json, .yaml or .yml file".to_string(),
        })?;
        format.parse(&text).map_err(|reason| ConfigError::CatalogLoad {
            path: self.path.clone(),
            reason,
        })
    }
}

/// In-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalogSource {
    entries: Vec<TenantMetadata>,
}

impl StaticCatalogSource {
    pub fn new(entries: Vec<TenantMetadata>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl TenantCatalogSource for StaticCatalogSource {
    async fn fetch(&self) -> ConfigResult<Vec<TenantMetadata>> {
        Ok(self.entries.clone())
    }
}
