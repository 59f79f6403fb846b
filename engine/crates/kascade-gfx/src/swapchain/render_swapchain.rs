use std::rc::Rc;

use ash::vk;
use ash::vk::Handle;

use crate::{
    commands::{command_queue::GfxQueue, semaphore::GfxSemaphore},
    context::GfxContext,
    error::{GfxError, GfxResult},
    foundation::device::GfxDevice,
    resources::image_view::{GfxImageView, GfxImageViewDesc},
    swapchain::surface::GfxSurface,
};

/// acquire 的结果；out-of-date 不是错误，由调用方重建交换链
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired { index: u32, suboptimal: bool },
    OutOfDate,
}

/// present 的结果；Suboptimal 与 OutOfDate 都需要重建交换链
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}
impl PresentOutcome {
    #[inline]
    pub fn needs_recreate(self) -> bool {
        !matches!(self, PresentOutcome::Presented)
    }
}

pub struct GfxSwapchain {
    handle: vk::SwapchainKHR,

    images: Vec<vk::Image>,
    image_views: Vec<GfxImageView>,

    surface_format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,

    surface: Rc<GfxSurface>,
    device: Rc<GfxDevice>,
}

// new & init
impl GfxSwapchain {
    pub fn new(ctx: &GfxContext, surface: Rc<GfxSurface>, window_physical_extent: vk::Extent2D) -> GfxResult<Self> {
        let mut swapchain = Self {
            handle: vk::SwapchainKHR::null(),
            images: Vec::new(),
            image_views: Vec::new(),
            surface_format: vk::SurfaceFormatKHR::default(),
            present_mode: vk::PresentModeKHR::FIFO,
            extent: vk::Extent2D::default(),
            surface,
            device: ctx.device().clone(),
        };
        swapchain.create(window_physical_extent)?;
        Ok(swapchain)
    }

    /// 交换链重建：等待 device idle，销毁旧的 image view 与 swapchain，再按当前 surface 能力重建
    ///
    /// 调用方需要保证 `window_physical_extent` 不为 0（窗口最小化时应先等待）
    pub fn recreate(&mut self, window_physical_extent: vk::Extent2D) -> GfxResult<()> {
        let _span = tracy_client::span!("GfxSwapchain::recreate");

        self.device.wait_idle()?;
        self.destroy_resources();
        self.create(window_physical_extent)
    }

    fn create(&mut self, window_physical_extent: vk::Extent2D) -> GfxResult<()> {
        let pdevice = self.device.physical_device();
        let surface_capabilities = self.surface.capabilities(pdevice)?;
        let surface_format = choose_surface_format(&self.surface.formats(pdevice)?)
            .ok_or_else(|| GfxError::InvalidArgument("surface reports no format".to_string()))?;
        let present_mode = choose_present_mode(&self.surface.present_modes(pdevice)?);

        // 如果 surface_capabilities.current_extent 包含特殊值 0xFFFFFFFF，则表示可以自己设置交换链的 extent
        let extent = calculate_swapchain_extent(&surface_capabilities, window_physical_extent);
        let image_count = choose_image_count(&surface_capabilities);
        log::info!(
            "create swapchain:
            surface current extent: {}x{}, min extent: {}x{}, max extent: {}x{}
            window physical extent: {}x{}
            final swapchain extent: {}x{}, format: {:?}, present mode: {:?}, image count: {}",
            surface_capabilities.current_extent.width,
            surface_capabilities.current_extent.height,
            surface_capabilities.min_image_extent.width,
            surface_capabilities.min_image_extent.height,
            surface_capabilities.max_image_extent.width,
            surface_capabilities.max_image_extent.height,
            window_physical_extent.width,
            window_physical_extent.height,
            extent.width,
            extent.height,
            surface_format.format,
            present_mode,
            image_count,
        );

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface.handle())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(surface_capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .clipped(true);

        let handle = unsafe { self.device.swapchain.create_swapchain(&create_info, None)? };
        self.device.set_object_debug_name(handle, "GfxSwapchain::main");
        // 先记录 handle，后续失败时由 drop 负责销毁
        self.handle = handle;

        self.images = unsafe { self.device.swapchain.get_swapchain_images(handle)? };
        self.image_views = self
            .images
            .iter()
            .enumerate()
            .map(|(idx, image)| {
                GfxImageView::new(
                    self.device.clone(),
                    *image,
                    GfxImageViewDesc::new_2d(surface_format.format, vk::ImageAspectFlags::COLOR),
                    format!("swapchain-{}", idx),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.surface_format = surface_format;
        self.present_mode = present_mode;
        self.extent = extent;

        Ok(())
    }
}

// getters
impl GfxSwapchain {
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.surface_format.format
    }

    #[inline]
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn image_views(&self) -> &[GfxImageView] {
        &self.image_views
    }
}

// update
impl GfxSwapchain {
    /// 没有超时，一直等到有可用的 image
    pub fn acquire_next_image(&self, semaphore: &GfxSemaphore) -> GfxResult<AcquireOutcome> {
        let result = unsafe {
            self.device.swapchain.acquire_next_image(self.handle, u64::MAX, semaphore.handle(), vk::Fence::null())
        };

        match result {
            Ok((index, suboptimal)) => {
                if suboptimal {
                    log::warn!("swapchain acquire image index {} is not optimal", index);
                }
                Ok(AcquireOutcome::Acquired { index, suboptimal })
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("swapchain is out of date when acquire next image");
                Ok(AcquireOutcome::OutOfDate)
            }
            Err(e) => Err(GfxError::Vk(e)),
        }
    }

    pub fn present(&self, queue: &GfxQueue, image_index: u32, wait: &GfxSemaphore) -> GfxResult<PresentOutcome> {
        let wait_semaphores = [wait.handle()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .image_indices(&image_indices)
            .swapchains(std::slice::from_ref(&self.handle));

        let result = unsafe { self.device.swapchain.queue_present(queue.handle(), &present_info) };
        match result {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => {
                log::warn!("swapchain present image index {} is not optimal", image_index);
                Ok(PresentOutcome::Suboptimal)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::warn!("swapchain is out of date when present image");
                Ok(PresentOutcome::OutOfDate)
            }
            Err(e) => Err(GfxError::Vk(e)),
        }
    }
}

// destroy
impl GfxSwapchain {
    fn destroy_resources(&mut self) {
        // image view 引用 swapchain image，需要先销毁
        self.image_views.clear();
        self.images.clear();
        if !self.handle.is_null() {
            unsafe {
                self.device.swapchain.destroy_swapchain(self.handle, None);
            }
            self.handle = vk::SwapchainKHR::null();
        }
    }
}
impl Drop for GfxSwapchain {
    fn drop(&mut self) {
        self.destroy_resources();
    }
}

/// 优先 B8G8R8A8_SRGB + SRGB_NONLINEAR，否则使用第一个
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .or_else(|| formats.first())
        .copied()
}

/// 优先 MAILBOX，否则使用一定支持的 FIFO
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    present_modes
        .iter()
        .copied()
        .find(|mode| *mode == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// min + 1，max_image_count == 0 表示不限制 image 数量
pub fn choose_image_count(surface_capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = surface_capabilities.min_image_count + 1;
    if surface_capabilities.max_image_count == 0 {
        desired
    } else {
        desired.min(surface_capabilities.max_image_count)
    }
}

/// 确定 window 的 extent 尺寸
///
/// 如果 surface_capabilities.current_extent 包含特殊值 0xFFFFFFFF，则表示可以自己设置交换链的 extent
pub fn calculate_swapchain_extent(
    surface_capabilities: &vk::SurfaceCapabilitiesKHR,
    window_physical_extent: vk::Extent2D,
) -> vk::Extent2D {
    let surface_extent = surface_capabilities.current_extent;
    if surface_extent.width == 0xFFFFFFFF || surface_extent.height == 0xFFFFFFFF {
        let width = window_physical_extent
            .width
            .clamp(surface_capabilities.min_image_extent.width, surface_capabilities.max_image_extent.width);
        let height = window_physical_extent
            .height
            .clamp(surface_capabilities.min_image_extent.height, surface_capabilities.max_image_extent.height);
        vk::Extent2D { width, height }
    } else {
        surface_extent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(current: (u32, u32), min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: min.0,
                height: min.1,
            },
            max_image_extent: vk::Extent2D {
                width: max.0,
                height: max.1,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_extent_uses_current_extent() {
        let caps = caps((800, 600), (1, 1), (4096, 4096));
        let extent = calculate_swapchain_extent(&caps, vk::Extent2D { width: 1500, height: 1200 });
        assert_eq!(extent, vk::Extent2D { width: 800, height: 600 });
    }

    #[test]
    fn test_extent_sentinel_clamps_window_size() {
        let caps = caps((0xFFFFFFFF, 0xFFFFFFFF), (100, 100), (1024, 1024));

        let extent = calculate_swapchain_extent(&caps, vk::Extent2D { width: 1500, height: 50 });
        assert_eq!(extent, vk::Extent2D { width: 1024, height: 100 });

        let extent = calculate_swapchain_extent(&caps, vk::Extent2D { width: 640, height: 480 });
        assert_eq!(extent, vk::Extent2D { width: 640, height: 480 });
    }

    #[test]
    fn test_choose_surface_format() {
        let preferred = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let other = vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };

        assert_eq!(choose_surface_format(&[other, preferred]), Some(preferred));
        assert_eq!(choose_surface_format(&[other]), Some(other));
        assert_eq!(choose_surface_format(&[]), None);
    }

    #[test]
    fn test_choose_present_mode() {
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX]),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO]),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(choose_present_mode(&[]), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_choose_image_count() {
        let mut caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&caps), 3);

        caps.max_image_count = 2;
        assert_eq!(choose_image_count(&caps), 2);

        caps.max_image_count = 8;
        assert_eq!(choose_image_count(&caps), 3);
    }

    #[test]
    fn test_present_outcome_needs_recreate() {
        assert!(!PresentOutcome::Presented.needs_recreate());
        assert!(PresentOutcome::Suboptimal.needs_recreate());
        assert!(PresentOutcome::OutOfDate.needs_recreate());
    }
}
