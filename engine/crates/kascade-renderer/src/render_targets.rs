use ash::vk;
use kascade_gfx::{
    context::GfxContext,
    pipelines::render_pass::{GfxFramebuffer, GfxRenderPass},
    resources::{
        image::{GfxImage, GfxImageCreateInfo},
        image_view::{GfxImageView, GfxImageViewDesc},
    },
    swapchain::render_swapchain::GfxSwapchain,
};

use crate::error::{RendererError, RendererResult};

/// 依次尝试的 depth format
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] =
    [vk::Format::D32_SFLOAT, vk::Format::D32_SFLOAT_S8_UINT, vk::Format::D24_UNORM_S8_UINT];

pub fn find_depth_format(ctx: &GfxContext) -> RendererResult<vk::Format> {
    ctx.find_supported_format(
        &DEPTH_FORMAT_CANDIDATES,
        vk::ImageTiling::OPTIMAL,
        vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
    )
    .ok_or(RendererError::NoDepthFormat)
}

#[inline]
pub fn has_stencil(format: vk::Format) -> bool {
    matches!(format, vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT)
}

/// render pass 的 attachment
///
/// - 不使用 MSAA：0 = swapchain color，1 = depth
/// - 使用 MSAA：0 = msaa color，1 = depth，2 = swapchain resolve
pub fn attachment_descriptions(
    color_format: vk::Format,
    depth_format: vk::Format,
    samples: vk::SampleCountFlags,
) -> Vec<vk::AttachmentDescription> {
    let msaa = samples != vk::SampleCountFlags::TYPE_1;

    let color = vk::AttachmentDescription::default()
        .format(color_format)
        .samples(samples)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(if msaa { vk::AttachmentStoreOp::DONT_CARE } else { vk::AttachmentStoreOp::STORE })
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(if msaa {
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
        } else {
            vk::ImageLayout::PRESENT_SRC_KHR
        });

    let depth = vk::AttachmentDescription::default()
        .format(depth_format)
        .samples(samples)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::DONT_CARE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

    let mut attachments = vec![color, depth];
    if msaa {
        attachments.push(
            vk::AttachmentDescription::default()
                .format(color_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::DONT_CARE)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
        );
    }
    attachments
}

pub fn create_render_pass(
    ctx: &GfxContext,
    color_format: vk::Format,
    depth_format: vk::Format,
    samples: vk::SampleCountFlags,
) -> RendererResult<GfxRenderPass> {
    let attachments = attachment_descriptions(color_format, depth_format, samples);

    let color_ref = [vk::AttachmentReference::default().attachment(0).layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];
    let depth_ref =
        vk::AttachmentReference::default().attachment(1).layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
    let resolve_ref = [vk::AttachmentReference::default().attachment(2).layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];

    let mut subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_ref)
        .depth_stencil_attachment(&depth_ref);
    if attachments.len() == 3 {
        subpass = subpass.resolve_attachments(&resolve_ref);
    }
    let subpasses = [subpass];

    // 等待 acquire 的 semaphore 之后才能写入 color，上一帧的 depth 写入完成之后才能清除 depth
    let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
    let dependencies = [vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(stages | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS)
        .src_access_mask(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
        .dst_stage_mask(stages)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)];

    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);
    Ok(GfxRenderPass::new(ctx.device().clone(), &create_info, "gltf-render-pass")?)
}

/// image 与它的 view，view 先于 image 销毁
pub struct Attachment<V = GfxImageView, I = GfxImage> {
    view: V,
    _image: I,
}

impl<V, I> Attachment<V, I> {
    #[inline]
    pub fn new(image: I, view: V) -> Self {
        Self { view, _image: image }
    }

    #[inline]
    pub fn view(&self) -> &V {
        &self.view
    }
}

/// 与 swapchain 尺寸相关的所有对象，swapchain 重建时整体重建
///
/// framebuffer 引用了附件和 swapchain 的 image view，必须最先销毁
pub struct RenderTargets {
    framebuffers: Vec<GfxFramebuffer>,

    depth: Attachment,

    /// 只在 MSAA 时存在
    msaa_color: Option<Attachment>,
}

// new & init
impl RenderTargets {
    pub fn new(
        ctx: &GfxContext,
        swapchain: &GfxSwapchain,
        render_pass: &GfxRenderPass,
        depth_format: vk::Format,
        samples: vk::SampleCountFlags,
    ) -> RendererResult<Self> {
        let _span = tracy_client::span!("RenderTargets::new");

        let extent = swapchain.extent();
        let device = ctx.device();

        let depth_info = GfxImageCreateInfo::new_image_2d_info(
            extent,
            depth_format,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        )
        .samples(samples);
        let depth_image = GfxImage::new(ctx.allocator(), &depth_info, vk::MemoryPropertyFlags::DEVICE_LOCAL, "depth")?;
        let depth_aspect = if has_stencil(depth_format) {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        } else {
            vk::ImageAspectFlags::DEPTH
        };
        let depth_view = GfxImageView::new(
            device.clone(),
            depth_image.handle(),
            GfxImageViewDesc::new_2d(depth_format, depth_aspect),
            "depth",
        )?;
        let depth = Attachment::new(depth_image, depth_view);

        let msaa_color = if samples != vk::SampleCountFlags::TYPE_1 {
            let info = GfxImageCreateInfo::new_image_2d_info(
                extent,
                swapchain.format(),
                vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSIENT_ATTACHMENT,
            )
            .samples(samples);
            let image = GfxImage::new(ctx.allocator(), &info, vk::MemoryPropertyFlags::DEVICE_LOCAL, "msaa-color")?;
            let view = GfxImageView::new(
                device.clone(),
                image.handle(),
                GfxImageViewDesc::new_2d(swapchain.format(), vk::ImageAspectFlags::COLOR),
                "msaa-color",
            )?;
            Some(Attachment::new(image, view))
        } else {
            None
        };

        let framebuffers = swapchain
            .image_views()
            .iter()
            .enumerate()
            .map(|(idx, swapchain_view)| {
                let attachments = match &msaa_color {
                    Some(msaa) => vec![msaa.view().handle(), depth.view().handle(), swapchain_view.handle()],
                    None => vec![swapchain_view.handle(), depth.view().handle()],
                };
                GfxFramebuffer::new(device.clone(), render_pass, &attachments, extent, &format!("framebuffer-{}", idx))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            framebuffers,
            depth,
            msaa_color,
        })
    }
}

// getters
impl RenderTargets {
    #[inline]
    pub fn framebuffer(&self, image_index: u32) -> &GfxFramebuffer {
        &self.framebuffers[image_index as usize]
    }

    #[inline]
    pub fn is_multisampled(&self) -> bool {
        self.msaa_color.is_some()
    }
}

/// color 与 depth 的 clear value，顺序与 attachment 一致
pub fn clear_values(clear_color: [f32; 4], multisampled: bool) -> Vec<vk::ClearValue> {
    let mut values = vec![
        vk::ClearValue {
            color: vk::ClearColorValue { float32: clear_color },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
        },
    ];
    if multisampled {
        // resolve attachment 的 load op 为 DONT_CARE，clear value 只用来占位
        values.push(vk::ClearValue::default());
    }
    values
}
