use std::path::{Path, PathBuf};

use ash::vk;
use itertools::Itertools;
use kascade_gfx::{
    context::GfxContext,
    error::{GfxError, GfxResult},
    sampler::GfxSamplerDesc,
    texture::GfxTexture,
};

use crate::error::{RendererError, RendererResult};

/// cubemap 的 face 文件名（不含扩展名），顺序与 layer 顺序一致：+X, -X, +Y, -Y, +Z, -Z
pub const CUBE_FACE_NAMES: [&str; 6] = ["px", "nx", "py", "ny", "pz", "nz"];
const FACE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// 找不到环境贴图时使用的颜色
const NEUTRAL_GREY: [u8; 4] = [128, 128, 128, 255];
const WHITE: [u8; 4] = [255, 255, 255, 255];

/// 在目录中找到 6 个 face 的文件，任意一个缺失则返回 None
pub fn find_face_paths(dir: &Path) -> Option<[PathBuf; 6]> {
    let paths = CUBE_FACE_NAMES
        .iter()
        .map(|face| FACE_EXTENSIONS.iter().map(|ext| dir.join(format!("{}.{}", face, ext))).find(|p| p.is_file()))
        .collect::<Option<Vec<_>>>()?;
    paths.try_into().ok()
}

/// 所有 face 必须是相同尺寸的正方形
pub fn validate_face_sizes(sizes: &[(u32, u32)]) -> RendererResult<u32> {
    let Some(&(width, height)) = sizes.first() else {
        return Err(RendererError::Environment("no cube faces".to_string()));
    };
    if width == 0 || width != height {
        return Err(RendererError::Environment(format!("face size {}x{} is not a square", width, height)));
    }
    if !sizes.iter().all_equal() {
        return Err(RendererError::Environment(format!("face sizes differ: {:?}", sizes)));
    }
    Ok(width)
}

/// 读取 6 个 face 并转换为 RGBA8
fn load_faces(paths: &[PathBuf; 6]) -> RendererResult<(u32, Vec<Vec<u8>>)> {
    let images = paths
        .iter()
        .map(|path| {
            log::info!("load cube face: {:?}", path);
            image::open(path).map(|img| img.to_rgba8())
        })
        .collect::<Result<Vec<_>, _>>()?;

    let sizes = images.iter().map(|img| img.dimensions()).collect_vec();
    let size = validate_face_sizes(&sizes)?;
    Ok((size, images.into_iter().map(|img| img.into_raw()).collect()))
}

/// 优先生成 mipmap，format 不支持 blit 时退回到单个 mip
fn new_cube_texture(ctx: &GfxContext, faces: &[Vec<u8>], size: u32, name: &str) -> GfxResult<GfxTexture> {
    let faces: [&[u8]; 6] = std::array::from_fn(|i| faces[i].as_slice());
    let format = vk::Format::R8G8B8A8_SRGB;
    let sampler = GfxSamplerDesc::clamp_to_edge();
    match GfxTexture::new_cube(ctx, faces, size, format, true, &sampler, name) {
        Err(GfxError::UnsupportedBlitFormat(format)) => {
            log::warn!("cubemap {}: {:?} can not be blitted, upload without mipmaps", name, format);
            GfxTexture::new_cube(ctx, faces, size, format, false, &sampler, name)
        }
        other => other,
    }
}

/// 1x1 的灰色 cubemap，保证 set 3 始终有效
pub fn neutral_cube(ctx: &GfxContext) -> GfxResult<GfxTexture> {
    let faces = vec![NEUTRAL_GREY.to_vec(); 6];
    new_cube_texture(ctx, &faces, 1, "env-neutral")
}

/// 加载环境 cubemap
///
/// 目录不存在、face 缺失或者图片无法解码时只输出警告，使用 [`neutral_cube`]
pub fn load_environment(ctx: &GfxContext, dir: &Path) -> GfxResult<GfxTexture> {
    let _span = tracy_client::span!("load_environment");

    let Some(paths) = find_face_paths(dir) else {
        log::warn!("cubemap faces not found in {:?}, use neutral environment", dir);
        return neutral_cube(ctx);
    };

    match load_faces(&paths) {
        Ok((size, faces)) => new_cube_texture(ctx, &faces, size, "env-cubemap"),
        Err(e) => {
            log::warn!("failed to load cubemap from {:?}: {}, use neutral environment", dir, e);
            neutral_cube(ctx)
        }
    }
}

/// 1x1 的白色纹理，填充 texture 数组中没有使用的位置
pub fn white_texture(ctx: &GfxContext) -> GfxResult<GfxTexture> {
    GfxTexture::new_2d(ctx, &WHITE, 1, 1, vk::Format::R8G8B8A8_UNORM, false, &GfxSamplerDesc::default(), "white")
}
