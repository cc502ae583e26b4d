//! Evaluation context: the `local`, `var` and `data` namespaces.
//!
//! A context is an immutable version. [`EvaluationContext::with_local`]
//! consumes one version and returns the next; versions that are still held
//! elsewhere keep their contents.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::environment::Environment;
use crate::value::{DynamicValue, ValueMap};

/// Name of the synthetic root object seeded into `local`.
pub const EXECUTION_TARGET: &str = "execution_target";

/// Data source type standing in for the availability-domain lookup.
pub const AVAILABILITY_DOMAINS_DATA: &str = "oci_identity_availability_domains";
/// Data source type standing in for the object-storage namespace lookup.
pub const OBJECT_STORAGE_NAMESPACE_DATA: &str = "oci_objectstorage_namespace";

const DEFAULT_AD_INSTANCE: &str = "ads";
const DEFAULT_NAMESPACE_INSTANCE: &str = "ns";

/// The three addressable namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Local,
    Var,
    Data,
}

impl Namespace {
    /// Namespace named by a reference root, if any.
    pub fn from_root(root: &str) -> Option<Self> {
        match root {
            "local" => Some(Namespace::Local),
            "var" => Some(Namespace::Var),
            "data" => Some(Namespace::Data),
            _ => None,
        }
    }
}

/// A `data "<type>" "<name>"` block declared in configuration source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataSourceRef {
    pub kind: String,
    pub name: String,
}

impl DataSourceRef {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

/// One version of the evaluation environment.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    local: Arc<ValueMap>,
    var: Arc<ValueMap>,
    data: Arc<ValueMap>,
    version: u64,
}

impl EvaluationContext {
    /// Seed a fresh context for `env`.
    ///
    /// `data_sources` are the data blocks the configuration declares; the two
    /// well-known lookup types get synthetic objects under every declared
    /// instance name plus the default names `ads` and `ns`. Other data types
    /// stay absent, so references to them never resolve.
    pub fn seed(env: &Environment, data_sources: &[DataSourceRef]) -> Self {
        let mut local = ValueMap::new();
        local.insert(EXECUTION_TARGET.to_string(), execution_target(env));

        let mut var = ValueMap::new();
        var.insert("region".to_string(), DynamicValue::string(&env.region));
        var.insert("environment".to_string(), DynamicValue::string(&env.env_type));

        let mut ad_instances = ValueMap::new();
        let mut ns_instances = ValueMap::new();
        ad_instances.insert(DEFAULT_AD_INSTANCE.to_string(), availability_domains(env));
        ns_instances.insert(
            DEFAULT_NAMESPACE_INSTANCE.to_string(),
            object_storage_namespace(env),
        );
        for source in data_sources {
            match source.kind.as_str() {
                AVAILABILITY_DOMAINS_DATA => {
                    ad_instances.insert(source.name.clone(), availability_domains(env));
                }
                OBJECT_STORAGE_NAMESPACE_DATA => {
                    ns_instances.insert(source.name.clone(), object_storage_namespace(env));
                }
                _ => {}
            }
        }

        let mut data = ValueMap::new();
        data.insert(
            AVAILABILITY_DOMAINS_DATA.to_string(),
            DynamicValue::Object(ad_instances),
        );
        data.insert(
            OBJECT_STORAGE_NAMESPACE_DATA.to_string(),
            DynamicValue::Object(ns_instances),
        );

        Self {
            local: Arc::new(local),
            var: Arc::new(var),
            data: Arc::new(data),
            version: 0,
        }
    }

    /// Commit a resolved value, producing the next context version.
    pub fn with_local(mut self, name: impl Into<String>, value: DynamicValue) -> Self {
        Arc::make_mut(&mut self.local).insert(name.into(), value);
        self.version += 1;
        self
    }

    /// Monotonic version counter; bumps once per commit.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn namespace(&self, namespace: Namespace) -> &ValueMap {
        match namespace {
            Namespace::Local => &self.local,
            Namespace::Var => &self.var,
            Namespace::Data => &self.data,
        }
    }

    pub fn lookup(&self, namespace: Namespace, name: &str) -> Option<&DynamicValue> {
        self.namespace(namespace).get(name)
    }

    pub fn local(&self, name: &str) -> Option<&DynamicValue> {
        self.lookup(Namespace::Local, name)
    }
}

fn execution_target(env: &Environment) -> DynamicValue {
    DynamicValue::object([
        ("realm", DynamicValue::string(&env.realm)),
        (
            "region",
            DynamicValue::object([
                ("public_name", DynamicValue::string(env.public_region_name())),
                (
                    "realm_domain_component",
                    DynamicValue::string(env.realm_domain()),
                ),
            ]),
        ),
        (
            "tenancy_ocid",
            DynamicValue::string(env.placeholder_tenancy_ocid()),
        ),
        (
            "additional_locals",
            DynamicValue::object([("environment", DynamicValue::string(&env.env_type))]),
        ),
    ])
}

fn availability_domains(env: &Environment) -> DynamicValue {
    DynamicValue::object([(
        "availability_domains",
        DynamicValue::List(vec![DynamicValue::object([
            (
                "name",
                DynamicValue::string(format!("synthetic:{}-AD-1", env.region.to_uppercase())),
            ),
            ("id", DynamicValue::string("synthetic-ad-1")),
        ])]),
    )])
}

fn object_storage_namespace(env: &Environment) -> DynamicValue {
    let namespace = format!("synthetic-{}-namespace", env.realm);
    DynamicValue::object([
        ("namespace", DynamicValue::string(namespace.clone())),
        ("id", DynamicValue::string(namespace)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Environment {
        Environment::new("oc1", "phx", "prod")
    }

    #[test]
    fn test_seed_has_single_local_entry() {
        let ctx = EvaluationContext::seed(&env(), &[]);
        assert_eq!(ctx.namespace(Namespace::Local).len(), 1);
        let target = ctx.local(EXECUTION_TARGET).unwrap();
        assert_eq!(target.get("realm").and_then(|v| v.as_str()), Some("oc1"));
        assert_eq!(
            target
                .get("additional_locals")
                .and_then(|v| v.get("environment"))
                .and_then(|v| v.as_str()),
            Some("prod")
        );
    }

    #[test]
    fn test_var_carries_region_and_type() {
        let ctx = EvaluationContext::seed(&env(), &[]);
        assert_eq!(
            ctx.lookup(Namespace::Var, "region").and_then(|v| v.as_str()),
            Some("phx")
        );
        assert_eq!(
            ctx.lookup(Namespace::Var, "environment")
                .and_then(|v| v.as_str()),
            Some("prod")
        );
    }

    #[test]
    fn test_declared_data_instances_are_seeded() {
        let ctx = EvaluationContext::seed(
            &env(),
            &[
                DataSourceRef::new(AVAILABILITY_DOMAINS_DATA, "this"),
                DataSourceRef::new("oci_core_images", "gpu"),
            ],
        );
        let ads = ctx.lookup(Namespace::Data, AVAILABILITY_DOMAINS_DATA).unwrap();
        assert!(ads.get("this").is_some());
        assert!(ads.get("ads").is_some());
        assert!(ctx.lookup(Namespace::Data, "oci_core_images").is_none());
    }

    #[test]
    fn test_with_local_leaves_previous_version_untouched() {
        let base = EvaluationContext::seed(&env(), &[]);
        let next = base.clone().with_local("a", DynamicValue::from(1_i64));
        assert!(base.local("a").is_none());
        assert_eq!(next.local("a"), Some(&DynamicValue::Number(1.0)));
        assert_eq!(next.version(), base.version() + 1);
    }
}
