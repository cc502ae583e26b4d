//! Deployment context a resolution runs against.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Realm, region and environment type of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Environment {
    pub realm: String,
    pub region: String,
    /// Environment type, e.g. `dev`, `preprod`, `prod`.
    #[serde(rename = "type")]
    pub env_type: String,
}

impl Environment {
    pub fn new(
        realm: impl Into<String>,
        region: impl Into<String>,
        env_type: impl Into<String>,
    ) -> Self {
        Self {
            realm: realm.into(),
            region: region.into(),
            env_type: env_type.into(),
        }
    }

    /// Public region name seeded into the execution target.
    ///
    /// Regions already given in public form (`us-phoenix-1`) are kept; short
    /// region keys get a synthetic public name.
    pub fn public_region_name(&self) -> String {
        if self.region.contains('-') {
            self.region.clone()
        } else {
            format!("{}-synthetic-1", self.region)
        }
    }

    /// Synthetic domain component for the realm.
    pub fn realm_domain(&self) -> String {
        format!("{}.oci.synthetic", self.realm)
    }

    /// Placeholder tenancy identifier; never a real OCID.
    pub fn placeholder_tenancy_ocid(&self) -> String {
        format!("ocid1.tenancy.{}..synthetic", self.realm)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.realm, self.region, self.env_type)
    }
}
