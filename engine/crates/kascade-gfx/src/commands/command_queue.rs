use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use crate::{
    commands::{fence::GfxFence, submit_info::GfxSubmitInfo},
    error::GfxResult,
    foundation::{debug_messenger::DebugType, device::GfxDevice, physical_device::GfxQueueFamily},
};

/// queue 随 device 一起销毁，无需手动释放
pub struct GfxQueue {
    pub(crate) vk_queue: vk::Queue,
    pub(crate) queue_family: GfxQueueFamily,
    pub(crate) device: Rc<GfxDevice>,
}
impl DebugType for GfxQueue {
    fn debug_type_name() -> &'static str {
        "GfxQueue"
    }
    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_queue
    }
}

// new
impl GfxQueue {
    pub fn new(device: Rc<GfxDevice>, queue_family: GfxQueueFamily, queue_index: u32) -> Self {
        let vk_queue = unsafe { device.get_device_queue(queue_family.queue_family_index, queue_index) };
        let queue = Self {
            vk_queue,
            queue_family,
            device,
        };
        queue.device.set_debug_name(&queue, &queue.queue_family.name);
        queue
    }
}

// getter
impl GfxQueue {
    #[inline]
    pub fn queue_family(&self) -> &GfxQueueFamily {
        &self.queue_family
    }

    #[inline]
    pub fn handle(&self) -> vk::Queue {
        self.vk_queue
    }
}

// tools
impl GfxQueue {
    /// 提交失败（包括 device lost）都是致命错误，不做重试
    pub fn submit(&self, batches: &[GfxSubmitInfo], fence: Option<&GfxFence>) -> GfxResult<()> {
        // batches 的存在是有必要的，submit_infos 引用的 batches 的内存
        let batches = batches.iter().map(|b| b.submit_info()).collect_vec();
        unsafe {
            self.device.queue_submit2(self.vk_queue, &batches, fence.map_or(vk::Fence::null(), |f| f.handle()))?;
        }
        Ok(())
    }

    /// 按 Vulkan 规范，vkQueueWaitIdle 应该和 Fence 效率相同
    #[inline]
    pub fn wait_idle(&self) -> GfxResult<()> {
        unsafe { self.device.queue_wait_idle(self.vk_queue)? };
        Ok(())
    }
}
