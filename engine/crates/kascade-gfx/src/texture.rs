use ash::vk;
use itertools::Itertools;

use crate::{
    commands::{barrier::GfxImageBarrier, command_buffer::GfxCommandBuffer},
    context::GfxContext,
    error::{GfxError, GfxResult},
    resources::{
        image::{GfxImage, GfxImageCreateInfo, VulkanFormatUtils},
        image_view::{GfxImageView, GfxImageViewDesc},
    },
    sampler::{GfxSampler, GfxSamplerDesc},
    transfer,
};

/// 纹理的种类：普通的 2D 纹理，或者 6 个 layer 组成的 cubemap
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureKind {
    Plane,
    Cube,
}
impl TextureKind {
    #[inline]
    pub fn layer_count(self) -> u32 {
        match self {
            TextureKind::Plane => 1,
            TextureKind::Cube => 6,
        }
    }

    #[inline]
    pub fn view_type(self) -> vk::ImageViewType {
        match self {
            TextureKind::Plane => vk::ImageViewType::TYPE_2D,
            TextureKind::Cube => vk::ImageViewType::CUBE,
        }
    }

    #[inline]
    pub fn create_flags(self) -> vk::ImageCreateFlags {
        match self {
            TextureKind::Plane => vk::ImageCreateFlags::empty(),
            TextureKind::Cube => vk::ImageCreateFlags::CUBE_COMPATIBLE,
        }
    }
}

/// mipmap 的层数：floor(log2(max(w, h))) + 1，不需要 mipmap 时为 1
#[inline]
pub fn mip_levels(width: u32, height: u32, mipmapped: bool) -> u32 {
    if !mipmapped {
        return 1;
    }
    u32::BITS - width.max(height).max(1).leading_zeros()
}

/// 第 `level` 层 mip 的尺寸，每个维度最小为 1
#[inline]
pub fn mip_extent(width: u32, height: u32, level: u32) -> (u32, u32) {
    let shift = |v: u32| v.checked_shr(level).unwrap_or(0).max(1);
    (shift(width), shift(height))
}

/// device local 的 image + view + sampler
///
/// cubemap 和 2D 纹理共用同一套创建流程，由 [`TextureKind`] 决定 layer 数量与 view 类型
pub struct GfxTexture {
    // view 和 sampler 需要先于 image 销毁
    sampler: GfxSampler,
    view: GfxImageView,
    image: GfxImage,

    kind: TextureKind,
    mip_levels: u32,
}

// new & init
impl GfxTexture {
    /// 根据 RGBA 像素创建 2D 纹理
    #[allow(clippy::too_many_arguments)]
    pub fn new_2d(
        ctx: &GfxContext,
        pixels: &[u8],
        width: u32,
        height: u32,
        format: vk::Format,
        mipmapped: bool,
        sampler_desc: &GfxSamplerDesc,
        name: &str,
    ) -> GfxResult<Self> {
        Self::new_with_layers(ctx, TextureKind::Plane, &[pixels], width, height, format, mipmapped, sampler_desc, name)
    }

    /// 根据 6 个 face 的像素创建 cubemap
    ///
    /// face 的顺序为 +X, -X, +Y, -Y, +Z, -Z，所有 face 的尺寸必须相同
    pub fn new_cube(
        ctx: &GfxContext,
        faces: [&[u8]; 6],
        size: u32,
        format: vk::Format,
        mipmapped: bool,
        sampler_desc: &GfxSamplerDesc,
        name: &str,
    ) -> GfxResult<Self> {
        Self::new_with_layers(ctx, TextureKind::Cube, &faces, size, size, format, mipmapped, sampler_desc, name)
    }

    /// # 步骤
    /// 1. 整个 image（所有 mip 与 layer）Undefined -> TransferDst
    /// 2. 每个 layer 通过各自的 staging buffer 拷贝到 mip 0
    /// 3. 每个 layer 独立执行 blit chain，最终所有 mip 都处于 ShaderReadOnly
    #[allow(clippy::too_many_arguments)]
    fn new_with_layers(
        ctx: &GfxContext,
        kind: TextureKind,
        layers: &[&[u8]],
        width: u32,
        height: u32,
        format: vk::Format,
        mipmapped: bool,
        sampler_desc: &GfxSamplerDesc,
        name: &str,
    ) -> GfxResult<Self> {
        let _span = tracy_client::span!("GfxTexture::new");

        if layers.len() as u32 != kind.layer_count() {
            return Err(GfxError::InvalidArgument(format!(
                "texture {} expects {} layers, got {}",
                name,
                kind.layer_count(),
                layers.len()
            )));
        }
        let expected_size = VulkanFormatUtils::pixel_size_in_bytes(format)? * width as usize * height as usize;
        if let Some((idx, layer)) = layers.iter().find_position(|layer| layer.len() != expected_size) {
            return Err(GfxError::InvalidArgument(format!(
                "texture {} layer {} has {} bytes, expected {} ({}x{} {:?})",
                name,
                idx,
                layer.len(),
                expected_size,
                width,
                height,
                format
            )));
        }

        let mip_levels = mip_levels(width, height, mipmapped);
        if mip_levels > 1 && !ctx.format_supports_linear_blit(format) {
            return Err(GfxError::UnsupportedBlitFormat(format));
        }

        let mut usage = vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED;
        if mip_levels > 1 {
            usage |= vk::ImageUsageFlags::TRANSFER_SRC;
        }
        let image_info = GfxImageCreateInfo::new_image_2d_info(vk::Extent2D { width, height }, format, usage)
            .mip_levels(mip_levels)
            .array_layers(kind.layer_count())
            .flags(kind.create_flags());
        let image = GfxImage::new(ctx.allocator(), &image_info, vk::MemoryPropertyFlags::DEVICE_LOCAL, name)?;

        // 1. 所有 mip 与 layer 都转换到 TransferDst
        ctx.one_time_exec(
            |cmd| {
                let barrier = GfxImageBarrier::new()
                    .image(image.handle())
                    .image_aspect_flag(vk::ImageAspectFlags::COLOR)
                    .mip_range(0, mip_levels)
                    .layer_range(0, kind.layer_count())
                    .src_mask(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::empty())
                    .dst_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
                    .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
                cmd.image_memory_barrier(vk::DependencyFlags::empty(), std::slice::from_ref(&barrier));
            },
            format!("{}-to-transfer-dst", name),
        )?;

        // 2. 每个 layer 使用独立的 staging buffer
        for (layer_idx, pixels) in layers.iter().enumerate() {
            let stage_buffer = transfer::create_staging_buffer(ctx, *pixels, format!("{}-layer{}", name, layer_idx))?;
            ctx.one_time_exec(
                |cmd| {
                    let region = vk::BufferImageCopy2::default()
                        .buffer_offset(0)
                        .buffer_row_length(0)
                        .buffer_image_height(0)
                        .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                        .image_extent(vk::Extent3D { width, height, depth: 1 })
                        .image_subresource(vk::ImageSubresourceLayers {
                            aspect_mask: vk::ImageAspectFlags::COLOR,
                            mip_level: 0,
                            base_array_layer: layer_idx as u32,
                            layer_count: 1,
                        });
                    cmd.cmd_copy_buffer_to_image(
                        &vk::CopyBufferToImageInfo2::default()
                            .src_buffer(stage_buffer.vk_buffer())
                            .dst_image(image.handle())
                            .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                            .regions(std::slice::from_ref(&region)),
                    );
                },
                format!("{}-copy-layer{}", name, layer_idx),
            )?;
        }

        // 3. blit chain
        ctx.one_time_exec(
            |cmd| {
                for layer in 0..kind.layer_count() {
                    record_mip_chain(cmd, image.handle(), width, height, mip_levels, layer);
                }
            },
            format!("{}-mipmap", name),
        )?;

        let view = GfxImageView::new(
            ctx.device().clone(),
            image.handle(),
            GfxImageViewDesc::new(
                format,
                kind.view_type(),
                vk::ImageAspectFlags::COLOR,
                (0, mip_levels),
                (0, kind.layer_count()),
            ),
            name,
        )?;
        let sampler = GfxSampler::new(ctx.device().clone(), sampler_desc, name)?;

        log::debug!("texture {} created: {}x{} {:?}, {:?}, {} mips", name, width, height, format, kind, mip_levels);
        Ok(Self {
            sampler,
            view,
            image,
            kind,
            mip_levels,
        })
    }
}

// getters
impl GfxTexture {
    #[inline]
    pub fn image(&self) -> &GfxImage {
        &self.image
    }

    #[inline]
    pub fn view(&self) -> &GfxImageView {
        &self.view
    }

    #[inline]
    pub fn sampler(&self) -> &GfxSampler {
        &self.sampler
    }

    #[inline]
    pub fn kind(&self) -> TextureKind {
        self.kind
    }

    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    /// 用于写入 combined image sampler 的 descriptor
    #[inline]
    pub fn descriptor_info(&self) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo {
            sampler: self.sampler.handle(),
            image_view: self.view.handle(),
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }
}

/// 单个 layer 的 mipmap 生成
///
/// 进入时所有 mip 处于 TransferDst：
/// - level i-1: TransferDst -> TransferSrc，blit 到 level i（线性过滤），然后 TransferSrc -> ShaderReadOnly
/// - 最后一个 level 没有下一级，直接 TransferDst -> ShaderReadOnly
fn record_mip_chain(cmd: &GfxCommandBuffer, image: vk::Image, width: u32, height: u32, mip_levels: u32, layer: u32) {
    let level_barrier = |level: u32| {
        GfxImageBarrier::new()
            .image(image)
            .image_aspect_flag(vk::ImageAspectFlags::COLOR)
            .mip_range(level, 1)
            .layer_range(layer, 1)
    };

    for level in 1..mip_levels {
        let src = level - 1;
        let to_src = level_barrier(src)
            .src_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
            .dst_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_READ)
            .layout_transfer(vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
        cmd.image_memory_barrier(vk::DependencyFlags::empty(), std::slice::from_ref(&to_src));

        let (src_w, src_h) = mip_extent(width, height, src);
        let (dst_w, dst_h) = mip_extent(width, height, level);
        let region = vk::ImageBlit2::default()
            .src_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: src,
                base_array_layer: layer,
                layer_count: 1,
            })
            .src_offsets([
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D {
                    x: src_w as i32,
                    y: src_h as i32,
                    z: 1,
                },
            ])
            .dst_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: level,
                base_array_layer: layer,
                layer_count: 1,
            })
            .dst_offsets([
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D {
                    x: dst_w as i32,
                    y: dst_h as i32,
                    z: 1,
                },
            ]);
        cmd.cmd_blit_image(
            &vk::BlitImageInfo2::default()
                .src_image(image)
                .src_image_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
                .dst_image(image)
                .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .regions(std::slice::from_ref(&region))
                .filter(vk::Filter::LINEAR),
        );

        let to_read = level_barrier(src)
            .src_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_READ)
            .dst_mask(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_READ)
            .layout_transfer(vk::ImageLayout::TRANSFER_SRC_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        cmd.image_memory_barrier(vk::DependencyFlags::empty(), std::slice::from_ref(&to_read));
    }

    let last = level_barrier(mip_levels - 1)
        .src_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
        .dst_mask(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_READ)
        .layout_transfer(vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    cmd.image_memory_barrier(vk::DependencyFlags::empty(), std::slice::from_ref(&last));
}
