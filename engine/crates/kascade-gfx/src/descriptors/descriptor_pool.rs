use std::rc::Rc;

use ash::vk;

use crate::{
    descriptors::descriptor::GfxDescriptorSetLayout,
    error::GfxResult,
    foundation::{debug_messenger::DebugType, device::GfxDevice},
};

/// 描述符池
///
/// 分配出的 descriptor set 跟随 pool 一起销毁
pub struct GfxDescriptorPool {
    handle: vk::DescriptorPool,
    device: Rc<GfxDevice>,
    name: String,
}
impl GfxDescriptorPool {
    pub fn new(
        device: Rc<GfxDevice>,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
        name: &str,
    ) -> GfxResult<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::default().max_sets(max_sets).pool_sizes(pool_sizes);
        let handle = unsafe { device.create_descriptor_pool(&create_info, None)? };
        let pool = Self {
            handle,
            device,
            name: name.to_string(),
        };
        pool.device.set_debug_name(&pool, name);
        Ok(pool)
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.handle
    }

    /// 每个 layout 分配一个 descriptor set
    pub fn allocate(&self, layouts: &[&GfxDescriptorSetLayout], name: &str) -> GfxResult<Vec<vk::DescriptorSet>> {
        let layouts = layouts.iter().map(|l| l.handle()).collect::<Vec<_>>();
        let alloc_info = vk::DescriptorSetAllocateInfo::default().descriptor_pool(self.handle).set_layouts(&layouts);
        let sets = unsafe { self.device.allocate_descriptor_sets(&alloc_info)? };
        for (idx, set) in sets.iter().enumerate() {
            self.device.set_object_debug_name(*set, format!("{}-{}", name, idx));
        }
        Ok(sets)
    }

    pub fn write(&self, writes: &[vk::WriteDescriptorSet]) {
        unsafe {
            self.device.update_descriptor_sets(writes, &[]);
        }
    }
}
impl Drop for GfxDescriptorPool {
    fn drop(&mut self) {
        log::info!("destroying descriptor pool: {}", self.name);
        unsafe { self.device.destroy_descriptor_pool(self.handle, None) };
    }
}
impl DebugType for GfxDescriptorPool {
    fn debug_type_name() -> &'static str {
        "GfxDescriptorPool"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
