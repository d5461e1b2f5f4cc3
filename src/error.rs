// Setup failures that are detected by the renderer itself rather than
// reported by a Vulkan call. Vulkan call failures travel as `vk::Result`
// wrapped in `anyhow` context.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Failed to find GPUs with Vulkan support")]
    NoGpu,

    #[error("Failed to find a suitable GPU")]
    NoSuitableGpu,

    #[error("Validation layer {0} requested, but not available")]
    MissingLayer(String),

    #[error("Required extension {0} is not available")]
    MissingExtension(String),

    #[error("Failed to open shader file {path:?}")]
    ShaderNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Shader file {path:?} is not valid SPIR-V")]
    InvalidShader {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
