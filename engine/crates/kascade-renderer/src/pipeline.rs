use std::{path::Path, rc::Rc};

use ash::vk;
use kascade_gfx::{
    foundation::device::GfxDevice,
    pipelines::{
        graphics_pipeline::{GfxGraphicsPipeline, GfxGraphicsPipelineCreateInfo, GfxPipelineLayout},
        render_pass::GfxRenderPass,
    },
    resources::layout::GfxVertexLayout,
};
use kascade_scene::vertex::GltfVertex;

use crate::{draw_list::PushConstants, error::RendererResult};

/// vertex 与 fragment 都需要 node 和 material 的下标
pub fn push_constant_range() -> vk::PushConstantRange {
    vk::PushConstantRange::default()
        .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
        .offset(0)
        .size(size_of::<PushConstants>() as u32)
}

/// src alpha / one minus src alpha
pub fn alpha_blend_state() -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::default()
        .blend_enable(true)
        .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
        .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
        .color_blend_op(vk::BlendOp::ADD)
        .src_alpha_blend_factor(vk::BlendFactor::ONE)
        .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
        .alpha_blend_op(vk::BlendOp::ADD)
        .color_write_mask(vk::ColorComponentFlags::RGBA)
}

pub fn gltf_pipeline_info(
    vertex_shader: &Path,
    fragment_shader: &Path,
    samples: vk::SampleCountFlags,
) -> GfxGraphicsPipelineCreateInfo {
    let mut info = GfxGraphicsPipelineCreateInfo::default();
    info.vertex_shader_stage(vertex_shader, c"main")
        .fragment_shader_stage(fragment_shader, c"main")
        .vertex_binding(GltfVertex::vertex_input_bindings())
        .vertex_attribute(GltfVertex::vertex_input_attributes())
        .cull_mode(vk::CullModeFlags::BACK, vk::FrontFace::COUNTER_CLOCKWISE)
        .depth_test(true, true, vk::CompareOp::LESS)
        .msaa_sample(samples)
        .color_blend(vec![alpha_blend_state()]);
    info
}

pub struct GltfPipeline {
    pipeline: GfxGraphicsPipeline,
    layout: Rc<GfxPipelineLayout>,
}

impl GltfPipeline {
    pub fn new(
        device: &Rc<GfxDevice>,
        set_layouts: &[vk::DescriptorSetLayout],
        render_pass: &GfxRenderPass,
        vertex_shader: &Path,
        fragment_shader: &Path,
        samples: vk::SampleCountFlags,
    ) -> RendererResult<Self> {
        let layout = Rc::new(GfxPipelineLayout::new(
            device.clone(),
            set_layouts,
            &[push_constant_range()],
            "gltf-pipeline-layout",
        )?);

        let info = gltf_pipeline_info(vertex_shader, fragment_shader, samples);
        let pipeline =
            GfxGraphicsPipeline::new(device.clone(), &info, layout.clone(), render_pass.handle(), "gltf-pipeline")?;

        Ok(Self { pipeline, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline.handle()
    }

    #[inline]
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout.handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_constant_range() {
        let range = push_constant_range();
        assert_eq!(range.size, 8);
        assert_eq!(range.offset, 0);
        assert!(range.stage_flags.contains(vk::ShaderStageFlags::FRAGMENT));
    }

    #[test]
    fn test_gltf_pipeline_info() {
        let info = gltf_pipeline_info(
            Path::new("shader/spv/gltf.vert.spv"),
            Path::new("shader/spv/gltf.frag.spv"),
            vk::SampleCountFlags::TYPE_1,
        );
        assert_eq!(info.shader_stages().len(), 2);
        assert_eq!(info.shader_stages()[0].stage, vk::ShaderStageFlags::VERTEX);
        assert_eq!(info.rasterize_state().cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(info.depth_stencil_state().depth_compare_op, vk::CompareOp::LESS);

        let blend = info.color_blend_states();
        assert_eq!(blend.len(), 1);
        assert_eq!(blend[0].blend_enable, vk::TRUE);
        assert_eq!(blend[0].src_color_blend_factor, vk::BlendFactor::SRC_ALPHA);
        assert_eq!(blend[0].dst_color_blend_factor, vk::BlendFactor::ONE_MINUS_SRC_ALPHA);
    }
}
