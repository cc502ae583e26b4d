//! Domain extractors over a [`ResolutionResult`].
//!
//! Each extractor reads well-known top-level values and turns them into typed
//! entities. A missing required value is [`ConfigError::NotResolved`]; a value
//! that is not an object is [`ConfigError::UnexpectedShape`]. Malformed
//! entries inside an otherwise valid value are skipped.

pub mod gpu_pool;
pub mod model_artifact;
pub mod tenancy;

pub use gpu_pool::{extract_all_gpu_pools, extract_gpu_pools, parse_availability_domain, GpuPool, PoolSource};
pub use model_artifact::{extract_model_artifacts, parse_gpu_count, ModelArtifact, MODELS_DECLARATION};
pub use tenancy::{extract_service_tenancies, realm_of, ServiceTenancy};

use crate::error::{ConfigError, ConfigResult};
use crate::resolver::ResolutionResult;
use crate::value::{DynamicValue, ValueMap};

static EMPTY: ValueMap = ValueMap::new();

/// The object value of a required declaration. `null` reads as empty.
pub(crate) fn required_object<'a>(
    result: &'a ResolutionResult,
    name: &str,
) -> ConfigResult<&'a ValueMap> {
    match result.require(name)? {
        DynamicValue::Object(members) => Ok(members),
        DynamicValue::Null => Ok(&EMPTY),
        other => Err(ConfigError::UnexpectedShape {
            name: name.to_string(),
            expected: "object",
            found: other.type_name(),
        }),
    }
}
