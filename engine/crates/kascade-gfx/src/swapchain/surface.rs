use std::rc::Rc;

use ash::vk;

use crate::{error::GfxResult, foundation::instance::GfxInstance};

/// 窗口对应的 vk::SurfaceKHR
///
/// 需要在选择 physical device 之前创建，用于检查 queue family 的 present 能力
pub struct GfxSurface {
    pub(crate) handle: vk::SurfaceKHR,
    pub(crate) pf: ash::khr::surface::Instance,

    _instance: Rc<GfxInstance>,
}

impl GfxSurface {
    pub fn new(
        instance: Rc<GfxInstance>,
        raw_display_handle: raw_window_handle::RawDisplayHandle,
        raw_window_handle: raw_window_handle::RawWindowHandle,
    ) -> GfxResult<Rc<Self>> {
        let surface_pf = ash::khr::surface::Instance::new(&instance.vk_entry, &instance.ash_instance);

        let surface = unsafe {
            ash_window::create_surface(
                &instance.vk_entry,
                &instance.ash_instance,
                raw_display_handle,
                raw_window_handle,
                None,
            )?
        };

        Ok(Rc::new(GfxSurface {
            handle: surface,
            pf: surface_pf,
            _instance: instance,
        }))
    }
}

// getters
impl GfxSurface {
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// 实时获取 surface capabilities，窗口尺寸变化后会改变
    pub fn capabilities(&self, pdevice: vk::PhysicalDevice) -> GfxResult<vk::SurfaceCapabilitiesKHR> {
        Ok(unsafe { self.pf.get_physical_device_surface_capabilities(pdevice, self.handle)? })
    }

    pub fn formats(&self, pdevice: vk::PhysicalDevice) -> GfxResult<Vec<vk::SurfaceFormatKHR>> {
        Ok(unsafe { self.pf.get_physical_device_surface_formats(pdevice, self.handle)? })
    }

    pub fn present_modes(&self, pdevice: vk::PhysicalDevice) -> GfxResult<Vec<vk::PresentModeKHR>> {
        Ok(unsafe { self.pf.get_physical_device_surface_present_modes(pdevice, self.handle)? })
    }

    pub fn supports_present(&self, pdevice: vk::PhysicalDevice, queue_family_index: u32) -> GfxResult<bool> {
        Ok(unsafe { self.pf.get_physical_device_surface_support(pdevice, queue_family_index, self.handle)? })
    }
}

impl Drop for GfxSurface {
    fn drop(&mut self) {
        log::info!("destroying surface");
        unsafe { self.pf.destroy_surface(self.handle, None) }
    }
}
