use std::{ptr, rc::Rc};

use ash::vk;
use vk_mem::Alloc;

use crate::{
    error::{GfxError, GfxResult},
    foundation::{allocator::GfxAllocator, debug_messenger::DebugType},
};

/// buffer 以及它独占的一块内存
///
/// memory type 由 [`GfxAllocator::find_memory_type`] 决定，绑定在 offset 0；
/// host visible 的 buffer 在创建时就 map，直到 drop 才 unmap
pub struct GfxBuffer {
    handle: vk::Buffer,
    allocation: vk_mem::Allocation,

    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    mem_flags: vk::MemoryPropertyFlags,

    /// 在初始化阶段写死
    map_ptr: Option<*mut u8>,

    debug_name: String,

    allocator: Rc<GfxAllocator>,
}
impl DebugType for GfxBuffer {
    fn debug_type_name() -> &'static str {
        "GfxBuffer"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.handle
    }
}
impl Drop for GfxBuffer {
    fn drop(&mut self) {
        unsafe {
            if self.map_ptr.is_some() {
                self.allocator.unmap_memory(&mut self.allocation);
            }
            self.allocator.device().destroy_buffer(self.handle, None);
            self.allocator.free_memory(&mut self.allocation);
        }
    }
}
// init
impl GfxBuffer {
    /// # 步骤
    /// 1. 创建 vk::Buffer
    /// 2. 根据 memory requirements 以及 `mem_flags` 找到唯一的 memory type
    /// 3. 通过 VMA 在这个 memory type 上分配，然后绑定在 offset 0
    ///
    /// 任何一步失败都会释放已经创建的对象，并返回 [`GfxError::DeviceResourceExhausted`]
    /// 或者 [`GfxError::NoSuitableMemoryType`]
    pub fn new(
        allocator: &Rc<GfxAllocator>,
        buffer_size: vk::DeviceSize,
        buffer_usage: vk::BufferUsageFlags,
        mem_flags: vk::MemoryPropertyFlags,
        name: impl AsRef<str>,
    ) -> GfxResult<Self> {
        if buffer_size == 0 {
            return Err(GfxError::InvalidArgument(format!("buffer {} has zero size", name.as_ref())));
        }

        let device = allocator.device();
        let buffer_ci = vk::BufferCreateInfo::default()
            .size(buffer_size)
            .usage(buffer_usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { device.create_buffer(&buffer_ci, None) }.map_err(GfxError::DeviceResourceExhausted)?;

        let destroy_buffer = || unsafe { device.destroy_buffer(buffer, None) };

        let mem_req = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_type_index = match allocator.find_memory_type(mem_req.memory_type_bits, mem_flags) {
            Ok(idx) => idx,
            Err(e) => {
                destroy_buffer();
                return Err(e);
            }
        };

        let alloc_ci = GfxAllocator::single_type_alloc_info(memory_type_index, mem_flags);
        let mut allocation = match unsafe { allocator.allocate_memory(&mem_req, &alloc_ci) } {
            Ok(allocation) => allocation,
            Err(e) => {
                destroy_buffer();
                return Err(GfxError::DeviceResourceExhausted(e));
            }
        };

        let bind_and_map = |allocation: &mut vk_mem::Allocation| -> GfxResult<Option<*mut u8>> {
            unsafe {
                allocator.bind_buffer_memory(allocation, buffer).map_err(GfxError::DeviceResourceExhausted)?;
                if mem_flags.contains(vk::MemoryPropertyFlags::HOST_VISIBLE) {
                    Ok(Some(allocator.map_memory(allocation).map_err(GfxError::DeviceResourceExhausted)?))
                } else {
                    Ok(None)
                }
            }
        };
        let map_ptr = match bind_and_map(&mut allocation) {
            Ok(map_ptr) => map_ptr,
            Err(e) => {
                unsafe { allocator.free_memory(&mut allocation) };
                destroy_buffer();
                return Err(e);
            }
        };

        device.set_object_debug_name(buffer, format!("GfxBuffer::{}", name.as_ref()));
        Ok(Self {
            handle: buffer,
            allocation,
            size: buffer_size,
            usage: buffer_usage,
            mem_flags,
            map_ptr,
            debug_name: name.as_ref().to_string(),
            allocator: allocator.clone(),
        })
    }

    /// host visible + host coherent，只用于 transfer src
    #[inline]
    pub fn new_stage_buffer(
        allocator: &Rc<GfxAllocator>,
        size: vk::DeviceSize,
        debug_name: impl AsRef<str>,
    ) -> GfxResult<Self> {
        Self::new(
            allocator,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            debug_name,
        )
    }
}
// getter
impl GfxBuffer {
    #[inline]
    pub fn vk_buffer(&self) -> vk::Buffer {
        self.handle
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    #[inline]
    pub fn usage(&self) -> vk::BufferUsageFlags {
        self.usage
    }

    #[inline]
    pub fn mem_flags(&self) -> vk::MemoryPropertyFlags {
        self.mem_flags
    }

    #[inline]
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    #[inline]
    pub fn is_mapped(&self) -> bool {
        self.map_ptr.is_some()
    }
}
// tools
impl GfxBuffer {
    fn mapped_ptr(&self) -> GfxResult<*mut u8> {
        self.map_ptr
            .ok_or_else(|| GfxError::InvalidArgument(format!("buffer {} is not host visible", self.debug_name)))
    }

    /// 通过 mem map 的方式将 data 写入到 buffer 的起始位置
    pub fn write_by_mmap<T: bytemuck::Pod>(&self, data: &[T]) -> GfxResult<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.len() as vk::DeviceSize > self.size {
            return Err(GfxError::InvalidArgument(format!(
                "write {} bytes into buffer {} of {} bytes",
                bytes.len(),
                self.debug_name,
                self.size
            )));
        }

        let dst = self.mapped_ptr()?;
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
        }
        if !self.mem_flags.contains(vk::MemoryPropertyFlags::HOST_COHERENT) {
            self.allocator
                .flush_allocation(&self.allocation, 0, bytes.len() as vk::DeviceSize)
                .map_err(GfxError::Vk)?;
        }
        Ok(())
    }

    /// 读取 host visible buffer 的全部内容
    pub fn read_by_mmap(&self) -> GfxResult<Vec<u8>> {
        let src = self.mapped_ptr()?;
        if !self.mem_flags.contains(vk::MemoryPropertyFlags::HOST_COHERENT) {
            self.allocator.invalidate_allocation(&self.allocation, 0, self.size).map_err(GfxError::Vk)?;
        }
        let mut bytes = vec![0u8; self.size as usize];
        unsafe {
            ptr::copy_nonoverlapping(src as *const u8, bytes.as_mut_ptr(), bytes.len());
        }
        Ok(bytes)
    }
}
