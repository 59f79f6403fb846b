use std::{path::PathBuf, rc::Rc};

use ash::vk;
use kascade_crate_tools::app_config::KascadeConfig;
use kascade_gfx::{
    basic::color::LabelColor,
    commands::{command_pool::GfxCommandPool, submit_info::GfxSubmitInfo},
    context::GfxContext,
    frame::{FrameConfig, FrameCounter, FrameSlot, SlotEvent, SlotState},
    pipelines::render_pass::GfxRenderPass,
    swapchain::{
        render_swapchain::{AcquireOutcome, GfxSwapchain, PresentOutcome},
        surface::GfxSurface,
    },
    texture::GfxTexture,
};
use kascade_scene::{loader::GltfLoader, model::GltfModel};

use crate::{
    descriptors::SceneDescriptors,
    draw_list::{DrawItem, build_model_draw_list},
    environment,
    error::{RendererError, RendererResult},
    frame_loop::{self, FrameResult, FrameTarget},
    pipeline::GltfPipeline,
    render_targets::{self, RenderTargets},
    timer::Timer,
    uniforms::{Camera, FrameUniforms, aspect_ratio},
};

/// 渲染器需要的配置，从 [`KascadeConfig`] 中提取
#[derive(Clone, Debug)]
pub struct RendererConfig {
    pub frame: FrameConfig,
    pub msaa_samples: u32,
    pub max_textures: u32,
    pub clear_color: [f32; 4],

    pub gltf_path: PathBuf,
    pub cubemap_dir: PathBuf,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
}

impl RendererConfig {
    pub fn from_config(config: &KascadeConfig) -> RendererResult<Self> {
        Ok(Self {
            frame: FrameConfig::new(config.render.frames_in_flight)?,
            msaa_samples: config.render.msaa_samples,
            max_textures: config.render.max_textures,
            clear_color: config.render.clear_color,
            gltf_path: config.gltf_path(),
            cubemap_dir: config.cubemap_dir(),
            vertex_shader: config.vertex_shader_path(),
            fragment_shader: config.fragment_shader_path(),
        })
    }
}

/// 绘制一个 glTF 模型
///
/// 字段按照销毁顺序声明，ctx 最后销毁
pub struct Renderer {
    slots: Vec<FrameSlot>,
    _command_pool: GfxCommandPool,

    pipeline: GltfPipeline,
    descriptors: SceneDescriptors,
    /// 重建 swapchain 期间为 None
    targets: Option<RenderTargets>,
    render_pass: GfxRenderPass,

    _environment: GfxTexture,
    _fallback_texture: GfxTexture,
    model: GltfModel,
    /// 层级在加载之后不变，只需要构建一次
    draw_list: Vec<DrawItem>,

    swapchain: GfxSwapchain,
    /// 窗口的 framebuffer 尺寸（物理像素）
    window_extent: vk::Extent2D,

    depth_format: vk::Format,
    samples: vk::SampleCountFlags,
    clear_color: [f32; 4],

    camera: Camera,
    timer: Timer,
    counter: FrameCounter,

    ctx: Rc<GfxContext>,
}

// new & init
impl Renderer {
    pub fn new(
        ctx: Rc<GfxContext>,
        surface: Rc<GfxSurface>,
        window_extent: vk::Extent2D,
        config: &RendererConfig,
    ) -> RendererResult<Self> {
        let _span = tracy_client::span!("Renderer::new");

        let model = GltfLoader::load(&ctx, &config.gltf_path)?;
        let draw_list = build_model_draw_list(&model);
        log::info!(
            "model {}: {} nodes, {} materials, {}/{} textures, {} draws",
            model.name(),
            model.nodes().len(),
            model.materials().len(),
            model.loaded_texture_count(),
            model.textures().len(),
            draw_list.len()
        );

        let environment = environment::load_environment(&ctx, &config.cubemap_dir)?;
        let fallback_texture = environment::white_texture(&ctx)?;

        let swapchain = GfxSwapchain::new(&ctx, surface, window_extent)?;

        let samples = ctx.max_usable_sample_count(config.msaa_samples);
        if samples.as_raw() != config.msaa_samples {
            log::warn!("msaa {} is not supported, use {:?}", config.msaa_samples, samples);
        }
        let depth_format = render_targets::find_depth_format(&ctx)?;
        let render_pass = render_targets::create_render_pass(&ctx, swapchain.format(), depth_format, samples)?;
        let targets = RenderTargets::new(&ctx, &swapchain, &render_pass, depth_format, samples)?;

        let descriptors = SceneDescriptors::new(
            ctx.device(),
            ctx.allocator(),
            &model,
            &environment,
            &fallback_texture,
            config.frame.frames_in_flight,
            config.max_textures,
        )?;
        let pipeline = GltfPipeline::new(
            ctx.device(),
            &descriptors.layout_handles(),
            &render_pass,
            &config.vertex_shader,
            &config.fragment_shader,
            samples,
        )?;

        // 每帧 reset 单个 command buffer
        let command_pool = GfxCommandPool::new(
            ctx.device().clone(),
            ctx.gfx_queue().queue_family().clone(),
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            "frame-command-pool",
        )?;
        let slots = FrameSlot::create_slots(ctx.device(), &command_pool, config.frame)?;

        Ok(Self {
            slots,
            _command_pool: command_pool,
            pipeline,
            descriptors,
            targets: Some(targets),
            render_pass,
            _environment: environment,
            _fallback_texture: fallback_texture,
            model,
            draw_list,
            swapchain,
            window_extent,
            depth_format,
            samples,
            clear_color: config.clear_color,
            camera: Camera::default(),
            timer: Timer::default(),
            counter: FrameCounter::new(0, config.frame),
            ctx,
        })
    }
}

// getters
impl Renderer {
    #[inline]
    pub fn model(&self) -> &GltfModel {
        &self.model
    }
}

// update
impl Renderer {
    /// 窗口尺寸变化时调用，真正的重建发生在下一次 [`Self::render_frame`]
    pub fn set_window_extent(&mut self, extent: vk::Extent2D) {
        self.window_extent = extent;
    }

    /// `resized` 由窗口设置，需要重建时由本函数清除
    pub fn render_frame(&mut self, resized: &mut bool) -> RendererResult<FrameResult> {
        let _span = tracy_client::span!("Renderer::render_frame");
        self.timer.tick();

        let mut counter = self.counter;
        let result = frame_loop::run_frame(self, &mut counter, resized);
        self.counter = counter;

        if matches!(result, Ok(FrameResult::Rendered)) {
            tracy_client::frame_mark();
        }
        result
    }

    fn record(&self, slot: usize, image_index: u32) -> RendererResult<()> {
        let _span = tracy_client::span!("Renderer::record");

        let targets = self.targets.as_ref().ok_or(RendererError::MissingRenderTargets)?;
        let cmd = &self.slots[slot].cmd;
        let extent = self.swapchain.extent();

        cmd.reset()?;
        cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, &self.counter.frame_name())?;
        cmd.begin_label("gltf-pass", LabelColor::COLOR_PASS);

        let clear_values = render_targets::clear_values(self.clear_color, targets.is_multisampled());
        let render_area = vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent,
        };
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass.handle())
            .framebuffer(targets.framebuffer(image_index).handle())
            .render_area(render_area)
            .clear_values(&clear_values);
        cmd.cmd_begin_render_pass(&begin_info);

        cmd.cmd_set_viewport(
            0,
            &[vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            }],
        );
        cmd.cmd_set_scissor(0, &[render_area]);

        cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, self.pipeline.handle());
        cmd.bind_descriptor_sets(
            vk::PipelineBindPoint::GRAPHICS,
            self.pipeline.layout(),
            0,
            self.descriptors.sets(slot),
        );

        let meshes = self.model.meshes();
        for draw in &self.draw_list {
            let primitive = &meshes[draw.mesh].primitives[draw.primitive];

            cmd.cmd_push_constants(
                self.pipeline.layout(),
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                0,
                bytemuck::bytes_of(&draw.push_constants()),
            );
            cmd.cmd_bind_vertex_buffers(0, &[primitive.vertex_buffer.vk_buffer()], &[0]);
            cmd.cmd_bind_index_buffer_u32(&primitive.index_buffer, 0);
            cmd.draw_indexed(primitive.index_count, 0, 1, 0, 0);
        }

        cmd.cmd_end_render_pass();
        cmd.end_label();
        cmd.end()?;
        Ok(())
    }
}

impl FrameTarget for Renderer {
    fn is_minimized(&self) -> bool {
        self.window_extent.width == 0 || self.window_extent.height == 0
    }

    fn wait_slot(&mut self, slot: usize) -> RendererResult<()> {
        let _span = tracy_client::span!("wait_slot");
        self.slots[slot].in_flight.wait()?;
        Ok(())
    }

    fn slot_transition(&mut self, slot: usize, event: SlotEvent) -> RendererResult<SlotState> {
        Ok(self.slots[slot].transition(event)?)
    }

    fn acquire(&mut self, slot: usize) -> RendererResult<AcquireOutcome> {
        Ok(self.swapchain.acquire_next_image(&self.slots[slot].image_available)?)
    }

    fn destroy_targets(&mut self) -> RendererResult<()> {
        // framebuffer 可能仍被 in-flight 的 command buffer 使用
        self.ctx.wait_idle()?;
        self.targets = None;
        Ok(())
    }

    fn recreate_swapchain(&mut self) -> RendererResult<()> {
        let _span = tracy_client::span!("recreate_swapchain");

        self.swapchain.recreate(self.window_extent)?;
        log::info!("swapchain recreated: {}x{}", self.swapchain.extent().width, self.swapchain.extent().height);
        Ok(())
    }

    fn create_targets(&mut self) -> RendererResult<()> {
        self.targets =
            Some(RenderTargets::new(&self.ctx, &self.swapchain, &self.render_pass, self.depth_format, self.samples)?);
        Ok(())
    }

    fn record_and_submit(&mut self, slot: usize, image_index: u32) -> RendererResult<()> {
        let _span = tracy_client::span!("record_and_submit");

        let extent = self.swapchain.extent();
        let uniforms =
            FrameUniforms::compute(&self.camera, aspect_ratio(extent.width, extent.height), self.timer.total_time_s());
        self.descriptors.update_uniforms(slot, &uniforms)?;
        self.model.update_transforms()?;

        self.record(slot, image_index)?;

        // 只有确定会提交之后才 reset fence，否则下一次 wait 会永远阻塞
        let frame_slot = &self.slots[slot];
        frame_slot.in_flight.reset()?;
        let submit_info = GfxSubmitInfo::new(&[&frame_slot.cmd])
            .wait(&frame_slot.image_available, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
            .signal(&frame_slot.render_finished, vk::PipelineStageFlags2::ALL_COMMANDS);
        self.ctx.gfx_queue().submit(&[submit_info], Some(&frame_slot.in_flight))?;
        Ok(())
    }

    fn present(&mut self, slot: usize, image_index: u32) -> RendererResult<PresentOutcome> {
        Ok(self.swapchain.present(self.ctx.gfx_queue(), image_index, &self.slots[slot].render_finished)?)
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        log::info!("destroying renderer after {} frames", self.counter.frame_id());
        if let Err(e) = self.ctx.wait_idle() {
            log::error!("failed to wait device idle before destroying renderer: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_default() {
        let config = RendererConfig::from_config(&KascadeConfig::default()).unwrap();
        assert_eq!(config.frame.frames_in_flight, 2);
        assert_eq!(config.max_textures, 32);
        assert_eq!(config.clear_color, [0.22, 0.22, 0.22, 1.0]);
        assert!(config.vertex_shader.ends_with("gltf.vert.spv"));
    }

    #[test]
    fn test_config_rejects_zero_frames() {
        let mut config = KascadeConfig::default();
        config.render.frames_in_flight = 0;
        assert!(RendererConfig::from_config(&config).is_err());
    }
}
