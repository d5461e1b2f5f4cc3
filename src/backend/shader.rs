// Shader module loading and management
//
// Vulkan consumes SPIR-V bytecode. Compiled shaders are read from disk at
// startup and wrapped in short-lived shader modules.

use anyhow::{Context, Result};
use ash::vk;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use super::Device;
use crate::error::SetupError;

/// Read a compiled SPIR-V binary into 32-bit words.
pub fn load_spirv<P: AsRef<Path>>(path: P) -> Result<Vec<u32>, SetupError> {
    let path = path.as_ref();

    let file = File::open(path).map_err(|source| SetupError::ShaderNotFound {
        path: path.to_path_buf(),
        source,
    })?;

    // read_spv takes care of word alignment and byte order
    let code = ash::util::read_spv(&mut BufReader::new(file)).map_err(|source| {
        SetupError::InvalidShader {
            path: path.to_path_buf(),
            source,
        }
    })?;

    log::debug!("Loaded {:?} ({} bytes)", path, code.len() * 4);
    Ok(code)
}

/// Shader module, destroyed as soon as it goes out of scope.
///
/// Only needed until the pipeline is created; the pipeline keeps its own
/// compiled copy.
pub struct ShaderModule<'a> {
    pub module: vk::ShaderModule,
    device: &'a Device,
}

impl<'a> ShaderModule<'a> {
    pub fn new(device: &'a Device, code: &[u32]) -> Result<Self> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(code);

        let module = unsafe { device.device.create_shader_module(&create_info, None) }
            .context("Failed to create shader module")?;

        Ok(Self { module, device })
    }

    pub fn from_file<P: AsRef<Path>>(device: &'a Device, path: P) -> Result<Self> {
        let code = load_spirv(path)?;
        Self::new(device, &code)
    }
}

impl Drop for ShaderModule<'_> {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_shader_module(self.module, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    fn temp_file(name: &str, bytes: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("hello-triangle-{}-{}", std::process::id(), name));
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn missing_file_is_shader_not_found() {
        let err = load_spirv("shaders/definitely_missing.spv").unwrap_err();
        assert!(matches!(err, SetupError::ShaderNotFound { .. }));
    }

    #[test]
    fn reads_little_endian_words() {
        let words = [SPIRV_MAGIC, 0x0001_0000, 42];
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        let path = temp_file("words.spv", &bytes);

        let code = load_spirv(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(code, words);
    }

    #[test]
    fn truncated_file_is_invalid() {
        let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.push(0);
        let path = temp_file("truncated.spv", &bytes);

        let err = load_spirv(&path).unwrap_err();
        std::fs::remove_file(&path).ok();

        assert!(matches!(err, SetupError::InvalidShader { .. }));
    }
}
