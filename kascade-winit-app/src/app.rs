use std::rc::Rc;

use anyhow::Context;
use ash::vk;
use kascade_crate_tools::app_config::KascadeConfig;
use kascade_gfx::{context::GfxContext, foundation::instance::GfxInstance, swapchain::surface::GfxSurface};
use kascade_renderer::renderer::{Renderer, RendererConfig};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

/// 窗口以及依赖窗口的渲染对象
///
/// renderer 先于 window 销毁，surface 引用的窗口句柄在此期间一直有效
struct RenderState {
    renderer: Renderer,
    window: Window,
}

pub struct WinitApp {
    config: KascadeConfig,
    state: Option<RenderState>,

    /// 窗口尺寸变化，由 renderer 在下一帧处理并清除
    resized: bool,
    /// 初始化或者渲染过程中的致命错误，退出 event loop 之后返回
    error: Option<anyhow::Error>,
}

// 总的 main 函数
impl WinitApp {
    pub fn run(config: KascadeConfig) -> anyhow::Result<()> {
        let event_loop = EventLoop::new().context("failed to create event loop")?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = Self {
            config,
            state: None,
            resized: false,
            error: None,
        };
        event_loop.run_app(&mut app).context("event loop failed")?;
        log::info!("end run.");

        // renderer 的 drop 会等待 device idle
        app.state = None;
        match app.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// new & init
impl WinitApp {
    fn init_render_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<RenderState> {
        let _span = tracy_client::span!("init_render_state");

        let window_attr = Window::default_attributes()
            .with_title(self.config.window.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(self.config.window.width, self.config.window.height));
        let window = event_loop.create_window(window_attr).context("failed to create window")?;

        let display_handle = window.display_handle().context("no display handle")?.as_raw();
        let window_handle = window.window_handle().context("no window handle")?.as_raw();

        let instance = GfxInstance::new(&self.config.window.title, Some(display_handle), self.config.render.validation)
            .context("failed to create vulkan instance")?;
        let surface =
            GfxSurface::new(instance.clone(), display_handle, window_handle).context("failed to create surface")?;
        let ctx = Rc::new(GfxContext::new(instance, Some(&surface)).context("failed to create gfx context")?);

        let renderer_config = RendererConfig::from_config(&self.config)?;
        let renderer = Renderer::new(ctx, surface, physical_extent(window.inner_size()), &renderer_config)
            .with_context(|| format!("failed to create renderer for {:?}", renderer_config.gltf_path))?;
        window.set_title(&format!("{} - {}", self.config.window.title, renderer.model().name()));

        Ok(RenderState { renderer, window })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        self.error = Some(error);
        event_loop.exit();
    }
}

fn physical_extent(size: PhysicalSize<u32>) -> vk::Extent2D {
    vk::Extent2D {
        width: size.width,
        height: size.height,
    }
}

// 各种 winit 的事件处理
impl ApplicationHandler for WinitApp {
    // 建议在这里创建 window 和 Renderer
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        log::info!("winit event: resumed");
        if self.state.is_some() {
            return;
        }

        match self.init_render_state(event_loop) {
            Ok(state) => self.state = Some(state),
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(state) = self.state.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                state.renderer.set_window_extent(physical_extent(size));
                self.resized = true;
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = state.renderer.render_frame(&mut self.resized) {
                    self.fail(event_loop, anyhow::Error::new(e).context("failed to render frame"));
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        log::warn!("winit event: suspended");
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        log::info!("loop exiting");
    }
}
