use std::rc::Rc;

use ash::vk;
use vk_mem::Alloc;

use crate::{
    error::{GfxError, GfxResult},
    foundation::{allocator::GfxAllocator, debug_messenger::DebugType},
};

/// Vulkan 格式相关的工具类
pub struct VulkanFormatUtils;
impl VulkanFormatUtils {
    /// 计算指定 Vulkan 格式下每个像素需要的字节数
    ///
    /// 只支持纹理上传会用到的非压缩 color format
    pub fn pixel_size_in_bytes(format: vk::Format) -> GfxResult<usize> {
        // 按 Vulkan 规范中的 format 顺序，区间两端都包含
        const BYTE_4_FORMAT: [(vk::Format, vk::Format); 2] = [
            (vk::Format::R8G8B8A8_UNORM, vk::Format::B8G8R8A8_SRGB),
            (vk::Format::R32_UINT, vk::Format::R32_SFLOAT),
        ];
        const BYTE_8_FORMAT: [(vk::Format, vk::Format); 1] =
            [(vk::Format::R16G16B16A16_UNORM, vk::Format::R16G16B16A16_SFLOAT)];
        const BYTE_16_FORMAT: [(vk::Format, vk::Format); 1] =
            [(vk::Format::R32G32B32A32_UINT, vk::Format::R32G32B32A32_SFLOAT)];

        let is_in_format_region = |format: vk::Format, regions: &[(vk::Format, vk::Format)]| {
            let n = format.as_raw();
            regions.iter().any(|(begin, end)| begin.as_raw() <= n && n <= end.as_raw())
        };

        match format {
            f if is_in_format_region(f, &BYTE_4_FORMAT) => Ok(4),
            f if is_in_format_region(f, &BYTE_8_FORMAT) => Ok(8),
            f if is_in_format_region(f, &BYTE_16_FORMAT) => Ok(16),
            _ => Err(GfxError::InvalidArgument(format!("unsupported pixel format: {:?}", format))),
        }
    }
}

pub struct GfxImageCreateInfo {
    inner: vk::ImageCreateInfo<'static>,
}
impl GfxImageCreateInfo {
    #[inline]
    pub fn new_image_2d_info(extent: vk::Extent2D, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        Self {
            inner: vk::ImageCreateInfo {
                image_type: vk::ImageType::TYPE_2D,
                format,
                extent: extent.into(),
                mip_levels: 1,
                array_layers: 1,
                samples: vk::SampleCountFlags::TYPE_1,
                tiling: vk::ImageTiling::OPTIMAL,
                usage,
                sharing_mode: vk::SharingMode::EXCLUSIVE,
                // Vulkan 规范要求这里只能是 UNDEFINED 或者 PREINITIALIZED
                initial_layout: vk::ImageLayout::UNDEFINED,
                ..Default::default()
            },
        }
    }

    #[inline]
    pub fn as_info(&self) -> &vk::ImageCreateInfo<'static> {
        &self.inner
    }

    // builder
    #[inline]
    pub fn mip_levels(mut self, mip_levels: u32) -> Self {
        self.inner.mip_levels = mip_levels;
        self
    }

    #[inline]
    pub fn array_layers(mut self, array_layers: u32) -> Self {
        self.inner.array_layers = array_layers;
        self
    }

    #[inline]
    pub fn samples(mut self, samples: vk::SampleCountFlags) -> Self {
        self.inner.samples = samples;
        self
    }

    #[inline]
    pub fn tiling(mut self, tiling: vk::ImageTiling) -> Self {
        self.inner.tiling = tiling;
        self
    }

    /// 例如 cubemap 需要 CUBE_COMPATIBLE
    #[inline]
    pub fn flags(mut self, flags: vk::ImageCreateFlags) -> Self {
        self.inner.flags = flags;
        self
    }
}

/// 由 VMA 分配内存的 image，在 drop 时销毁
pub struct GfxImage {
    handle: vk::Image,
    allocation: vk_mem::Allocation,

    extent: vk::Extent3D,
    format: vk::Format,
    mip_levels: u32,
    array_layers: u32,

    name: String,

    allocator: Rc<GfxAllocator>,
}
// getter
impl GfxImage {
    #[inline]
    pub fn width(&self) -> u32 {
        self.extent.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.extent.height
    }

    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.handle
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    #[inline]
    pub fn array_layers(&self) -> u32 {
        self.array_layers
    }
}
// new & init
impl GfxImage {
    /// 与 [`crate::resources::buffer::GfxBuffer::new`] 相同的分配流程：
    /// 先创建 vk::Image，再找到唯一的 memory type，最后分配并绑定
    pub fn new(
        allocator: &Rc<GfxAllocator>,
        image_info: &GfxImageCreateInfo,
        mem_flags: vk::MemoryPropertyFlags,
        debug_name: &str,
    ) -> GfxResult<Self> {
        let device = allocator.device();
        let info = image_info.as_info();
        if info.extent.width == 0 || info.extent.height == 0 || info.mip_levels == 0 || info.array_layers == 0 {
            return Err(GfxError::InvalidArgument(format!("image {} has an empty extent", debug_name)));
        }

        let image = unsafe { device.create_image(info, None) }.map_err(GfxError::DeviceResourceExhausted)?;
        let destroy_image = || unsafe { device.destroy_image(image, None) };

        let mem_req = unsafe { device.get_image_memory_requirements(image) };
        let memory_type_index = match allocator.find_memory_type(mem_req.memory_type_bits, mem_flags) {
            Ok(idx) => idx,
            Err(e) => {
                destroy_image();
                return Err(e);
            }
        };

        let alloc_ci = GfxAllocator::single_type_alloc_info(memory_type_index, mem_flags);
        let mut allocation = match unsafe { allocator.allocate_memory(&mem_req, &alloc_ci) } {
            Ok(allocation) => allocation,
            Err(e) => {
                destroy_image();
                return Err(GfxError::DeviceResourceExhausted(e));
            }
        };
        if let Err(e) = unsafe { allocator.bind_image_memory(&mut allocation, image) } {
            unsafe { allocator.free_memory(&mut allocation) };
            destroy_image();
            return Err(GfxError::DeviceResourceExhausted(e));
        }

        let image = Self {
            handle: image,
            allocation,
            extent: info.extent,
            format: info.format,
            mip_levels: info.mip_levels,
            array_layers: info.array_layers,
            name: debug_name.to_string(),
            allocator: allocator.clone(),
        };
        device.set_debug_name(&image, debug_name);
        Ok(image)
    }
}
impl DebugType for GfxImage {
    fn debug_type_name() -> &'static str {
        "GfxImage"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
impl Drop for GfxImage {
    fn drop(&mut self) {
        log::debug!("destroying GfxImage: {}", self.name);
        unsafe {
            self.allocator.device().destroy_image(self.handle, None);
            self.allocator.free_memory(&mut self.allocation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_size() {
        assert_eq!(VulkanFormatUtils::pixel_size_in_bytes(vk::Format::R8G8B8A8_UNORM).unwrap(), 4);
        assert_eq!(VulkanFormatUtils::pixel_size_in_bytes(vk::Format::R8G8B8A8_SRGB).unwrap(), 4);
        assert_eq!(VulkanFormatUtils::pixel_size_in_bytes(vk::Format::B8G8R8A8_SRGB).unwrap(), 4);
        assert_eq!(VulkanFormatUtils::pixel_size_in_bytes(vk::Format::R16G16B16A16_SFLOAT).unwrap(), 8);
        assert_eq!(VulkanFormatUtils::pixel_size_in_bytes(vk::Format::R32G32B32A32_SFLOAT).unwrap(), 16);
        assert!(VulkanFormatUtils::pixel_size_in_bytes(vk::Format::BC7_SRGB_BLOCK).is_err());
    }

    #[test]
    fn test_create_info_builder() {
        let info = GfxImageCreateInfo::new_image_2d_info(
            vk::Extent2D { width: 64, height: 64 },
            vk::Format::R8G8B8A8_SRGB,
            vk::ImageUsageFlags::SAMPLED,
        )
        .mip_levels(7)
        .array_layers(6)
        .flags(vk::ImageCreateFlags::CUBE_COMPATIBLE);

        let inner = info.as_info();
        assert_eq!(inner.mip_levels, 7);
        assert_eq!(inner.array_layers, 6);
        assert_eq!(inner.extent.depth, 1);
        assert!(inner.flags.contains(vk::ImageCreateFlags::CUBE_COMPATIBLE));
        assert_eq!(inner.initial_layout, vk::ImageLayout::UNDEFINED);
    }
}
