use std::{
    ffi::CStr,
    path::{Path, PathBuf},
    rc::Rc,
};

use ash::vk;

use crate::{
    error::{GfxError, GfxResult},
    foundation::{debug_messenger::DebugType, device::GfxDevice},
};

/// 从 spv 文件创建的 shader module，只在创建 pipeline 期间存活
pub struct GfxShaderModule {
    handle: vk::ShaderModule,
    device: Rc<GfxDevice>,
}

impl GfxShaderModule {
    /// # param
    /// * path - spv shader 文件路径
    pub fn new(device: Rc<GfxDevice>, path: &Path) -> GfxResult<Self> {
        let shader_load_err = |source: std::io::Error| GfxError::ShaderLoad {
            path: path.display().to_string(),
            source,
        };
        let mut file = std::fs::File::open(path).map_err(shader_load_err)?;
        let shader_code = ash::util::read_spv(&mut file).map_err(shader_load_err)?;

        let shader_module_info = vk::ShaderModuleCreateInfo::default().code(&shader_code);
        let handle = unsafe { device.create_shader_module(&shader_module_info, None)? };

        let shader_module = Self { handle, device };
        shader_module.device.set_debug_name(&shader_module, path.display().to_string());
        Ok(shader_module)
    }

    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.handle
    }
}
impl Drop for GfxShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.handle, None);
        }
    }
}
impl DebugType for GfxShaderModule {
    fn debug_type_name() -> &'static str {
        "GfxShaderModule"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

#[derive(Clone, Debug)]
pub struct GfxShaderStageInfo {
    pub stage: vk::ShaderStageFlags,
    pub entry_point: &'static CStr,
    pub path: PathBuf,
}
