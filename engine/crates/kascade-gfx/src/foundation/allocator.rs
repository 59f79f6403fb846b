use std::{ops::Deref, rc::Rc};

use ash::vk;

use crate::{
    error::GfxResult,
    foundation::{device::GfxDevice, physical_device::GfxPhysicalDevice, physical_device::find_memory_type},
};

/// VMA 的封装
///
/// buffer 和 image 的内存由 [`find_memory_type`] 决定 memory type，
/// 然后交给 VMA 在这个唯一的 memory type 上分配
pub struct GfxAllocator {
    /// 必须先于 device 销毁，因此放在第一个字段
    inner: vk_mem::Allocator,

    mem_props: vk::PhysicalDeviceMemoryProperties,
    device: Rc<GfxDevice>,
}

impl GfxAllocator {
    /// 由于 vma 的生命周期设定：需要引用 Instance 以及 Device，
    /// 这里通过持有 `Rc<GfxDevice>`（其内部持有 `Rc<GfxInstance>`）来保证
    pub fn new(device: Rc<GfxDevice>, pdevice: &GfxPhysicalDevice) -> GfxResult<Rc<Self>> {
        let mut vma_ci = vk_mem::AllocatorCreateInfo::new(
            device.instance().ash_instance(),
            &device.device,
            pdevice.vk_handle(),
        );
        vma_ci.vulkan_api_version = vk::API_VERSION_1_3;

        let inner = unsafe { vk_mem::Allocator::new(vma_ci)? };

        Ok(Rc::new(Self {
            inner,
            mem_props: *pdevice.mem_props(),
            device,
        }))
    }
}

// getters
impl GfxAllocator {
    #[inline]
    pub fn device(&self) -> &Rc<GfxDevice> {
        &self.device
    }

    #[inline]
    pub fn mem_props(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.mem_props
    }
}

// tools
impl GfxAllocator {
    #[inline]
    pub fn find_memory_type(&self, type_bits: u32, required_flags: vk::MemoryPropertyFlags) -> GfxResult<u32> {
        find_memory_type(&self.mem_props, type_bits, required_flags)
    }

    /// 限制在单个 memory type 上的分配参数
    #[inline]
    pub(crate) fn single_type_alloc_info(
        memory_type_index: u32,
        required_flags: vk::MemoryPropertyFlags,
    ) -> vk_mem::AllocationCreateInfo {
        vk_mem::AllocationCreateInfo {
            memory_type_bits: 1 << memory_type_index,
            required_flags,
            ..Default::default()
        }
    }
}

impl Deref for GfxAllocator {
    type Target = vk_mem::Allocator;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
