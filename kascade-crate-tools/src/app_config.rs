use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::resource::KascadePath;

/// `kascade.toml` 的完整内容
///
/// 每个字段都有默认值，配置文件中只需要写出需要覆盖的部分
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KascadeConfig {
    pub window: WindowConfig,
    pub scene: SceneConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    /// 初始窗口大小（逻辑像素）
    pub width: u32,
    pub height: u32,
}
impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Kascade".to_string(),
            width: 1500,
            height: 1200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// gltf / glb 文件，相对路径基于工作区根目录
    pub gltf_path: String,
    /// 包含 px/nx/py/ny/pz/nz 六张图片的目录
    pub cubemap_dir: String,
}
impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            gltf_path: "assets/models/ABeautifulGame/glTF/ABeautifulGame.gltf".to_string(),
            cubemap_dir: "assets/textures/Cubemaps/CloudySky".to_string(),
        }
    }
}

/// `shader/glsl/scene.glsl` 中 `textures[]` 的长度，descriptor set layout 必须与之一致
pub const SHADER_TEXTURE_ARRAY_SIZE: u32 = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// 同时在 GPU 上执行的帧数
    pub frames_in_flight: usize,
    /// 1 表示不使用 MSAA
    pub msaa_samples: u32,
    /// 单个模型最多可以绑定的 texture 数量，只能是 [`SHADER_TEXTURE_ARRAY_SIZE`]
    pub max_textures: u32,
    pub clear_color: [f32; 4],
    pub vertex_shader: String,
    pub fragment_shader: String,
    /// 是否开启 validation messenger
    pub validation: bool,
}
impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            msaa_samples: 1,
            max_textures: SHADER_TEXTURE_ARRAY_SIZE,
            clear_color: [0.22, 0.22, 0.22, 1.0],
            vertex_shader: "shader/spv/gltf.vert.spv".to_string(),
            fragment_shader: "shader/spv/gltf.frag.spv".to_string(),
            validation: cfg!(debug_assertions),
        }
    }
}

impl KascadeConfig {
    /// 从 TOML 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).with_context(|| format!("读取配置文件失败: {:?}", path.as_ref()))?;
        Self::from_toml_str(&content).with_context(|| format!("解析 TOML 配置失败: {:?}", path.as_ref()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: KascadeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 读取工作区根目录下的 `kascade.toml`，文件不存在时使用默认配置
    ///
    /// 之后应用环境变量 `KASCADE_SCENE` 和 `KASCADE_CUBEMAP` 的覆盖
    pub fn load_or_default() -> anyhow::Result<Self> {
        let path = KascadePath::config_path();
        let mut config = if path.is_file() {
            log::info!("load config from {:?}", path);
            Self::from_file(&path)?
        } else {
            log::info!("config file {:?} not found, use default config", path);
            Self::default()
        };

        if let Ok(scene) = std::env::var("KASCADE_SCENE") {
            config.scene.gltf_path = scene;
        }
        if let Ok(cubemap) = std::env::var("KASCADE_CUBEMAP") {
            config.scene.cubemap_dir = cubemap;
        }

        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.render.frames_in_flight > 0, "frames_in_flight must be at least 1");
        anyhow::ensure!(
            self.render.msaa_samples.is_power_of_two() && self.render.msaa_samples <= 64,
            "msaa_samples must be a power of two no larger than 64, got {}",
            self.render.msaa_samples
        );
        anyhow::ensure!(
            self.render.max_textures == SHADER_TEXTURE_ARRAY_SIZE,
            "max_textures must match the shader texture array size {}, got {}",
            SHADER_TEXTURE_ARRAY_SIZE,
            self.render.max_textures
        );
        Ok(())
    }
}
// 路径
impl KascadeConfig {
    #[inline]
    pub fn gltf_path(&self) -> PathBuf {
        KascadePath::resolve(&self.scene.gltf_path)
    }

    #[inline]
    pub fn cubemap_dir(&self) -> PathBuf {
        KascadePath::resolve(&self.scene.cubemap_dir)
    }

    #[inline]
    pub fn vertex_shader_path(&self) -> PathBuf {
        KascadePath::resolve(&self.render.vertex_shader)
    }

    #[inline]
    pub fn fragment_shader_path(&self) -> PathBuf {
        KascadePath::resolve(&self.render.fragment_shader)
    }
}
