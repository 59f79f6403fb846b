use std::rc::Rc;

use ash::vk;

use crate::{
    error::GfxResult,
    foundation::{debug_messenger::DebugType, device::GfxDevice},
};

pub struct GfxRenderPass {
    handle: vk::RenderPass,
    device: Rc<GfxDevice>,
}

impl GfxRenderPass {
    pub fn new(device: Rc<GfxDevice>, create_info: &vk::RenderPassCreateInfo, name: &str) -> GfxResult<Self> {
        let handle = unsafe { device.create_render_pass(create_info, None)? };
        let render_pass = Self { handle, device };
        render_pass.device.set_debug_name(&render_pass, name);
        Ok(render_pass)
    }

    #[inline]
    pub fn handle(&self) -> vk::RenderPass {
        self.handle
    }
}
impl Drop for GfxRenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_render_pass(self.handle, None);
        }
    }
}
impl DebugType for GfxRenderPass {
    fn debug_type_name() -> &'static str {
        "GfxRenderPass"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}

/// 与 swapchain image 一一对应，交换链重建时一起重建
pub struct GfxFramebuffer {
    handle: vk::Framebuffer,
    extent: vk::Extent2D,
    device: Rc<GfxDevice>,
}

impl GfxFramebuffer {
    pub fn new(
        device: Rc<GfxDevice>,
        render_pass: &GfxRenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
        name: &str,
    ) -> GfxResult<Self> {
        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass.handle())
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);
        let handle = unsafe { device.create_framebuffer(&create_info, None)? };
        let framebuffer = Self { handle, extent, device };
        framebuffer.device.set_debug_name(&framebuffer, name);
        Ok(framebuffer)
    }

    #[inline]
    pub fn handle(&self) -> vk::Framebuffer {
        self.handle
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}
impl Drop for GfxFramebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.handle, None);
        }
    }
}
impl DebugType for GfxFramebuffer {
    fn debug_type_name() -> &'static str {
        "GfxFramebuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
