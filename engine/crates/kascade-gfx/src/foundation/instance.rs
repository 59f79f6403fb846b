use std::{
    ffi::{CStr, CString, c_char},
    rc::Rc,
};

use ash::vk;
use itertools::Itertools;

use crate::{
    error::{GfxError, GfxResult},
    foundation::debug_messenger::GfxDebugMsger,
};

/// Vulkan instance 以及加载它的 entry
///
/// 所有 instance 级别的对象（surface、debug messenger、device）都持有 `Rc<GfxInstance>`，
/// 因此 instance 会在它们全部销毁之后才销毁
pub struct GfxInstance {
    pub(crate) ash_instance: ash::Instance,
    validation_enabled: bool,

    /// vk 基础函数的接口
    ///
    /// 在 drop 之后，会卸载 dll，因此需要确保该字段最后 drop
    pub(crate) vk_entry: ash::Entry,
}

// new & init
impl GfxInstance {
    /// 设置所需的 layers 和 extensions，创建 vk instance
    ///
    /// - `display_handle`: 用于查询创建 surface 所需的 instance extensions，`None` 表示不需要 present
    /// - `enable_validation`: 尝试开启 `VK_LAYER_KHRONOS_validation`，不可用时只输出警告
    pub fn new(
        app_name: &str,
        display_handle: Option<raw_window_handle::RawDisplayHandle>,
        enable_validation: bool,
    ) -> GfxResult<Rc<Self>> {
        let _span = tracy_client::span!("GfxInstance::new");

        let vk_entry = unsafe { ash::Entry::load() }?;

        let app_name = CString::new(app_name)
            .map_err(|_| GfxError::InvalidArgument(format!("app name contains nul: {app_name:?}")))?;
        let app_info = vk::ApplicationInfo::default()
            .api_version(vk::API_VERSION_1_3) // 版本过低时，有些函数无法正确加载
            .application_name(app_name.as_c_str())
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"Kascade")
            .engine_version(vk::make_api_version(0, 1, 0, 0));

        let mut required_exts = match display_handle {
            Some(display_handle) => ash_window::enumerate_required_extensions(display_handle)?
                .iter()
                .map(|ext| unsafe { CStr::from_ptr(*ext) })
                .collect_vec(),
            None => Vec::new(),
        };
        // debug messenger 以及为 vulkan object 设置 debug name
        required_exts.push(ash::ext::debug_utils::NAME);

        let enabled_extensions = Self::get_extensions(&vk_entry, &required_exts)?;
        let mut enabled_extensions_str = String::new();
        for ext in &enabled_extensions {
            enabled_extensions_str.push_str(&format!("\n\t{:?}", unsafe { CStr::from_ptr(*ext) }));
        }
        log::info!("instance extensions: {}", enabled_extensions_str);

        let enabled_layers = if enable_validation { Self::get_validation_layers(&vk_entry)? } else { Vec::new() };
        let validation_enabled = !enabled_layers.is_empty();
        log::info!("validation layer enabled: {}", validation_enabled);

        let mut instance_ci = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&enabled_extensions)
            .enabled_layer_names(&enabled_layers);

        // 让 instance 的创建与销毁过程也能输出 validation 信息
        let mut debug_utils_messenger_ci = GfxDebugMsger::debug_utils_messenger_ci();
        if validation_enabled {
            instance_ci = instance_ci.push_next(&mut debug_utils_messenger_ci);
        }

        let ash_instance = unsafe { vk_entry.create_instance(&instance_ci, None)? };

        Ok(Rc::new(Self {
            ash_instance,
            validation_enabled,
            vk_entry,
        }))
    }
}

// getters
impl GfxInstance {
    #[inline]
    pub fn ash_instance(&self) -> &ash::Instance {
        &self.ash_instance
    }

    #[inline]
    pub fn vk_instance(&self) -> vk::Instance {
        self.ash_instance.handle()
    }

    #[inline]
    pub fn entry(&self) -> &ash::Entry {
        &self.vk_entry
    }

    #[inline]
    pub fn validation_enabled(&self) -> bool {
        self.validation_enabled
    }
}

// 构造过程
impl GfxInstance {
    /// instance 所需的，且受支持的 extension；有任意一个不支持时返回错误
    fn get_extensions(vk_entry: &ash::Entry, required_exts: &[&'static CStr]) -> GfxResult<Vec<*const c_char>> {
        let all_ext_props = unsafe { vk_entry.enumerate_instance_extension_properties(None)? };

        let mut enabled = Vec::with_capacity(required_exts.len());
        for ext in required_exts.iter().unique() {
            let supported = all_ext_props
                .iter()
                .any(|supported_ext| *ext == unsafe { CStr::from_ptr(supported_ext.extension_name.as_ptr()) });
            if !supported {
                return Err(GfxError::MissingExtension(format!("{ext:?}")));
            }
            enabled.push(ext.as_ptr());
        }

        Ok(enabled)
    }

    fn get_validation_layers(vk_entry: &ash::Entry) -> GfxResult<Vec<*const c_char>> {
        const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

        let all_layer_props = unsafe { vk_entry.enumerate_instance_layer_properties()? };
        let supported = all_layer_props
            .iter()
            .any(|layer| VALIDATION_LAYER == unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) });

        if supported {
            Ok(vec![VALIDATION_LAYER.as_ptr()])
        } else {
            log::warn!("{:?} is not installed, validation is disabled", VALIDATION_LAYER);
            Ok(Vec::new())
        }
    }
}

impl Drop for GfxInstance {
    fn drop(&mut self) {
        log::info!("destroying instance");
        unsafe {
            self.ash_instance.destroy_instance(None);
        }
    }
}
