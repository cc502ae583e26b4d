//! Model-to-hardware artifact mappings from `all_models_map`.
//!
//! The map nests four levels deep:
//! model name → TensorRT version → GPU shape → `"<n>Gpu"` → artifact name.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigResult;
use crate::extract::required_object;
use crate::resolver::ResolutionResult;

pub const MODELS_DECLARATION: &str = "all_models_map";

const GPU_SUFFIX: &str = "Gpu";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model_name: String,
    pub tensorrt_version: String,
    pub gpu_shape: String,
    pub gpu_count: u32,
    pub artifact_name: String,
}

/// Every artifact leaf of `all_models_map`, in key-path order.
pub fn extract_model_artifacts(result: &ResolutionResult) -> ConfigResult<Vec<ModelArtifact>> {
    let models = required_object(result, MODELS_DECLARATION)?;
    let mut out = Vec::new();
    for (model_name, versions) in models {
        let Some(versions) = versions.as_object() else {
            continue;
        };
        for (tensorrt_version, shapes) in versions {
            let Some(shapes) = shapes.as_object() else {
                continue;
            };
            for (gpu_shape, counts) in shapes {
                let Some(counts) = counts.as_object() else {
                    continue;
                };
                for (count_key, artifact) in counts {
                    let Some(artifact_name) = artifact.as_str() else {
                        continue;
                    };
                    out.push(ModelArtifact {
                        model_name: model_name.clone(),
                        tensorrt_version: tensorrt_version.clone(),
                        gpu_shape: gpu_shape.clone(),
                        gpu_count: parse_gpu_count(count_key),
                        artifact_name: artifact_name.to_string(),
                    });
                }
            }
        }
    }
    Ok(out)
}

/// `"4Gpu"` → 4. Anything without a numeric prefix counts as 0.
pub fn parse_gpu_count(key: &str) -> u32 {
    let parsed = key
        .strip_suffix(GPU_SUFFIX)
        .and_then(|prefix| prefix.parse::<u32>().ok());
    match parsed {
        Some(count) => count,
        None => {
            debug!(key = %key, "gpu count key has no numeric prefix, using 0");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DynamicValue;

    #[test]
    fn test_gpu_count_parsing() {
        assert_eq!(parse_gpu_count("4Gpu"), 4);
        assert_eq!(parse_gpu_count("16Gpu"), 16);
        assert_eq!(parse_gpu_count("Gpu"), 0);
        assert_eq!(parse_gpu_count("abcGpu"), 0);
        assert_eq!(parse_gpu_count("4"), 0);
    }

    #[test]
    fn test_four_level_walk_skips_malformed_levels() {
        let map = DynamicValue::object([
            (
                "llama3-70b",
                DynamicValue::object([(
                    "trt-10.1",
                    DynamicValue::object([(
                        "BM.GPU.H100.8",
                        DynamicValue::object([
                            ("8Gpu", DynamicValue::from("llama3-70b-h100x8")),
                            ("4Gpu", DynamicValue::from("llama3-70b-h100x4")),
                            ("broken", DynamicValue::from(1_i64)),
                        ]),
                    )]),
                )]),
            ),
            ("stray", DynamicValue::from("not a map")),
        ]);
        let mut result = ResolutionResult::default();
        result.values.insert(MODELS_DECLARATION.to_string(), map);

        let artifacts = extract_model_artifacts(&result).unwrap();
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].gpu_count, 4);
        assert_eq!(artifacts[0].artifact_name, "llama3-70b-h100x4");
        assert_eq!(artifacts[1].gpu_count, 8);
        assert_eq!(artifacts[1].gpu_shape, "BM.GPU.H100.8");
        assert_eq!(artifacts[1].tensorrt_version, "trt-10.1");
    }
}
