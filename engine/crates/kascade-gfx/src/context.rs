use std::rc::Rc;

use ash::vk;

use crate::{
    commands::{
        command_buffer::GfxCommandBuffer, command_pool::GfxCommandPool, command_queue::GfxQueue,
        submit_info::GfxSubmitInfo,
    },
    error::GfxResult,
    foundation::{
        allocator::GfxAllocator, debug_messenger::GfxDebugMsger, device::GfxDevice, instance::GfxInstance,
        physical_device::GfxPhysicalDevice,
    },
    swapchain::surface::GfxSurface,
};

/// GFX 层的入口，持有 device、allocator 以及 graphics queue
///
/// 字段按照销毁顺序声明：command pool 最先销毁，instance 最后销毁
pub struct GfxContext {
    /// 用于 one time submit 的临时 command buffer
    temp_command_pool: GfxCommandPool,
    gfx_queue: GfxQueue,

    allocator: Rc<GfxAllocator>,
    device: Rc<GfxDevice>,
    physical_device: GfxPhysicalDevice,

    _debug_msger: Option<GfxDebugMsger>,
    instance: Rc<GfxInstance>,
}

// new & init
impl GfxContext {
    /// surface 用于选择可以 present 的 queue family；`None` 用于不需要窗口的场景（例如 GPU 测试）
    pub fn new(instance: Rc<GfxInstance>, surface: Option<&GfxSurface>) -> GfxResult<Self> {
        let _span = tracy_client::span!("GfxContext::new");

        let debug_msger = if instance.validation_enabled() { Some(GfxDebugMsger::new(&instance)?) } else { None };

        let physical_device = GfxPhysicalDevice::select(&instance, surface)?;
        log::info!("gfx queue's queue family:\n{:#?}", physical_device.gfx_queue_family);

        let device = GfxDevice::new(instance.clone(), &physical_device)?;
        let allocator = GfxAllocator::new(device.clone(), &physical_device)?;
        let gfx_queue = GfxQueue::new(device.clone(), physical_device.gfx_queue_family.clone(), 0);

        let temp_command_pool = GfxCommandPool::new(
            device.clone(),
            physical_device.gfx_queue_family.clone(),
            vk::CommandPoolCreateFlags::TRANSIENT,
            "one-time",
        )?;

        Ok(Self {
            temp_command_pool,
            gfx_queue,
            allocator,
            device,
            physical_device,
            _debug_msger: debug_msger,
            instance,
        })
    }
}

// getters
impl GfxContext {
    #[inline]
    pub fn device(&self) -> &Rc<GfxDevice> {
        &self.device
    }

    #[inline]
    pub fn allocator(&self) -> &Rc<GfxAllocator> {
        &self.allocator
    }

    #[inline]
    pub fn gfx_queue(&self) -> &GfxQueue {
        &self.gfx_queue
    }

    #[inline]
    pub fn physical_device(&self) -> &GfxPhysicalDevice {
        &self.physical_device
    }

    #[inline]
    pub fn instance(&self) -> &Rc<GfxInstance> {
        &self.instance
    }
}

// tools
impl GfxContext {
    /// 录制并同步执行一次性的命令
    ///
    /// allocate -> begin(ONE_TIME_SUBMIT) -> record -> end -> submit -> queue wait idle -> free，
    /// 返回之后 `func` 中引用的所有资源（例如 staging buffer）都可以安全销毁
    pub fn one_time_exec<F, R>(&self, func: F, name: impl AsRef<str>) -> GfxResult<R>
    where
        F: FnOnce(&GfxCommandBuffer) -> R,
    {
        let _span = tracy_client::span!("one_time_exec");

        let command_buffer =
            GfxCommandBuffer::new(&self.temp_command_pool, &format!("one-time-{}", name.as_ref()))?;

        let result: GfxResult<R> = (|| {
            command_buffer.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, name.as_ref())?;
            let result = func(&command_buffer);
            command_buffer.end()?;

            self.gfx_queue.submit(&[GfxSubmitInfo::new(&[&command_buffer])], None)?;
            self.gfx_queue.wait_idle()?;
            Ok(result)
        })();

        command_buffer.free();
        result
    }

    /// 在候选列表中找到第一个支持 `features` 的 format
    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> Option<vk::Format> {
        candidates.iter().copied().find(|format| {
            let props = self.format_properties(*format);
            match tiling {
                vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
                _ => props.optimal_tiling_features.contains(features),
            }
        })
    }

    /// blit 生成 mipmap 需要 optimal tiling 下支持 linear filter
    pub fn format_supports_linear_blit(&self, format: vk::Format) -> bool {
        self.format_properties(format)
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
    }

    /// 在 framebuffer color 和 depth 同时支持的范围内，不超过 `requested` 的最大采样数
    pub fn max_usable_sample_count(&self, requested: u32) -> vk::SampleCountFlags {
        let limits = self.physical_device.limits();
        let counts = limits.framebuffer_color_sample_counts & limits.framebuffer_depth_sample_counts;
        [64, 32, 16, 8, 4, 2]
            .into_iter()
            .filter(|n| *n <= requested)
            .map(vk::SampleCountFlags::from_raw)
            .find(|flag| counts.contains(*flag))
            .unwrap_or(vk::SampleCountFlags::TYPE_1)
    }

    #[inline]
    pub fn wait_idle(&self) -> GfxResult<()> {
        self.device.wait_idle()
    }

    fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance
                .ash_instance()
                .get_physical_device_format_properties(self.physical_device.vk_handle(), format)
        }
    }
}

impl Drop for GfxContext {
    fn drop(&mut self) {
        // 确保所有提交的工作都已经完成，之后才能按字段顺序销毁
        if let Err(e) = self.device.wait_idle() {
            log::error!("failed to wait device idle before destroying context: {}", e);
        }
    }
}
