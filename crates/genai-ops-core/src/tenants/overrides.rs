//! Per-tenant override datasets.
//!
//! Each category lives under `<root>/<realm>/<category>/` as JSON or YAML
//! files that map a tenant name to a list of records.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collector::list_files;
use crate::error::{ConfigError, ConfigResult};

/// The three override categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideCategory {
    Limits,
    ConsoleProperties,
    Properties,
}

impl OverrideCategory {
    /// Directory name under the realm directory.
    pub fn dir_name(self) -> &'static str {
        match self {
            OverrideCategory::Limits => "limits",
            OverrideCategory::ConsoleProperties => "console_properties",
            OverrideCategory::Properties => "properties",
        }
    }
}

impl fmt::Display for OverrideCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// A record of one override category. Every record names a tenant ID.
pub trait TenancyOverride: DeserializeOwned + Send + 'static {
    const CATEGORY: OverrideCategory;

    fn tenant_id(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitOverride {
    #[serde(alias = "tenantId")]
    pub tenant_id: String,
    #[serde(default, alias = "limitName")]
    pub limit_name: Option<String>,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub regions: Vec<String>,
}

impl TenancyOverride for LimitOverride {
    const CATEGORY: OverrideCategory = OverrideCategory::Limits;

    fn tenant_id(&self) -> &str {
        &self.tenant_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolePropertyOverride {
    #[serde(alias = "tenantId")]
    pub tenant_id: String,
    #[serde(default, alias = "propertyName")]
    pub property_name: Option<String>,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl TenancyOverride for ConsolePropertyOverride {
    const CATEGORY: OverrideCategory = OverrideCategory::ConsoleProperties;

    fn tenant_id(&self) -> &str {
        &self.tenant_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyOverride {
    #[serde(alias = "tenantId")]
    pub tenant_id: String,
    #[serde(default, alias = "propertyName")]
    pub property_name: Option<String>,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub regions: Vec<String>,
}

impl TenancyOverride for PropertyOverride {
    const CATEGORY: OverrideCategory = OverrideCategory::Properties;

    fn tenant_id(&self) -> &str {
        &self.tenant_id
    }
}

/// Tenant name → records of one category.
pub type OverrideMap<T> = BTreeMap<String, Vec<T>>;

/// All three categories for one realm.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverrideSet {
    pub limits: OverrideMap<LimitOverride>,
    pub console_properties: OverrideMap<ConsolePropertyOverride>,
    pub properties: OverrideMap<PropertyOverride>,
}

impl OverrideSet {
    /// Tenant name → every tenant ID any category mentions for it.
    pub fn tenant_ids(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut buckets: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        collect_ids(&self.limits, &mut buckets);
        collect_ids(&self.console_properties, &mut buckets);
        collect_ids(&self.properties, &mut buckets);
        buckets
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty() && self.console_properties.is_empty() && self.properties.is_empty()
    }
}

fn collect_ids<T: TenancyOverride>(
    map: &OverrideMap<T>,
    buckets: &mut BTreeMap<String, BTreeSet<String>>,
) {
    for (tenant, records) in map {
        let ids = buckets.entry(tenant.clone()).or_default();
        ids.extend(records.iter().map(|r| r.tenant_id().to_string()));
    }
}

/// Load one category for `realm`. A missing directory yields an empty map.
pub fn load_overrides<T: TenancyOverride>(root: &Path, realm: &str) -> ConfigResult<OverrideMap<T>> {
    let dir = root.join(realm).join(T::CATEGORY.dir_name());
    if !dir.is_dir() {
        debug!(dir = %dir.display(), category = %T::CATEGORY, "override directory absent");
        return Ok(OverrideMap::new());
    }

    let mut files = list_files(&dir, |path| DataFormat::from_path(path).is_some())?;
    files.sort();

    let mut out = OverrideMap::new();
    for path in &files {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        if text.trim().is_empty() {
            continue;
        }
        let parsed: OverrideMap<T> = DataFormat::from_path(path)
            .map(|format| format.parse(&text))
            .unwrap_or_else(|| Err("unsupported file extension".to_string()))
            .map_err(|reason| ConfigError::OverrideLoad {
                path: path.clone(),
                reason,
            })?;
        for (tenant, mut records) in parsed {
            out.entry(tenant).or_insert_with(Vec::new).append(&mut records);
        }
    }
    debug!(category = %T::CATEGORY, files = files.len(), tenants = out.len(), "overrides loaded");
    Ok(out)
}

/// Load all three categories for `realm`.
pub fn load_override_set(root: &Path, realm: &str) -> ConfigResult<OverrideSet> {
    Ok(OverrideSet {
        limits: load_overrides(root, realm)?,
        console_properties: load_overrides(root, realm)?,
        properties: load_overrides(root, realm)?,
    })
}

/// Structured file formats accepted for data files, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DataFormat {
    Json,
    Yaml,
}

impl DataFormat {
    pub(crate) fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Some(DataFormat::Json),
            Some("yaml") | Some("yml") => Some(DataFormat::Yaml),
            _ => None,
        }
    }

    pub(crate) fn parse<T: DeserializeOwned>(self, text: &str) -> Result<T, String> {
        match self {
            DataFormat::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
            DataFormat::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string()),
        }
    }
}
