//! SPIR-V shader modules

use std::ffi::CStr;
use std::path::Path;

use ash::{vk, Device};

use super::{api, VulkanError, VulkanResult};

/// Entry point every stage uses
pub const ENTRY_POINT: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

/// Shader module wrapper with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create shader module from SPIR-V bytecode
    ///
    /// The bytes are re-read into `u32` words, so any alignment is accepted.
    pub fn from_bytes(device: &Device, bytes: &[u8]) -> VulkanResult<Self> {
        let code = ash::util::read_spv(&mut std::io::Cursor::new(bytes))
            .map_err(|e| VulkanError::Shader(format!("invalid SPIR-V: {}", e)))?;

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);

        let module =
            unsafe { device.create_shader_module(&create_info, None) }.map_err(api("vkCreateShaderModule"))?;

        Ok(Self {
            device: device.clone(),
            module,
        })
    }

    /// Load shader from SPIR-V file
    pub fn from_file<P: AsRef<Path>>(device: &Device, path: P) -> VulkanResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| VulkanError::Shader(format!("failed to read {}: {}", path.display(), e)))?;

        let module = Self::from_bytes(device, &bytes).map_err(|e| match e {
            VulkanError::Shader(reason) => VulkanError::Shader(format!("{}: {}", path.display(), reason)),
            other => other,
        })?;

        log::debug!("Loaded shader {}", path.display());
        Ok(module)
    }

    /// Get shader module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Stage description for pipeline creation
    pub fn stage_info(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(ENTRY_POINT)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}
