use kascade_gfx::error::GfxError;
use kascade_scene::error::SceneError;

#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error(transparent)]
    Gfx(#[from] GfxError),

    #[error(transparent)]
    Scene(#[from] SceneError),

    /// descriptor pool 按固定的纹理数量创建
    #[error("model has {count} textures, but at most {max} are supported")]
    TooManyTextures { count: usize, max: usize },

    #[error("no supported depth format")]
    NoDepthFormat,

    /// 上一次重建 swapchain 失败，framebuffer 不可用
    #[error("render targets are not available")]
    MissingRenderTargets,

    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// cubemap 的 face 缺失或者尺寸不一致
    #[error("invalid environment map: {0}")]
    Environment(String),
}

pub type RendererResult<T> = Result<T, RendererError>;
