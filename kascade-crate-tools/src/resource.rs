use std::{
    env,
    path::{Path, PathBuf},
};

/// 统一资源路径管理
///
/// 所有路径基于工作区根目录（通过 `CARGO_MANIFEST_DIR` 推导）。
/// 可以通过环境变量 `KASCADE_ROOT` 覆盖工作区根目录，便于在 cargo 之外运行。
///
/// # 使用示例
/// ```ignore
/// let model = KascadePath::assets_path("models/Box/Box.gltf"); // assets/models/Box/Box.gltf
/// let shader = KascadePath::shader_path("gltf.vert");           // shader/spv/gltf.vert.spv
/// ```
pub struct KascadePath {}
// 核心路径
impl KascadePath {
    /// 获取工作区根目录
    pub fn workspace_path() -> PathBuf {
        if let Ok(root) = env::var("KASCADE_ROOT") {
            return PathBuf::from(root);
        }
        // 本 crate 位于工作区根目录下的一级目录
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        manifest_dir.parent().unwrap_or(manifest_dir).to_path_buf()
    }

    /// 相对路径基于工作区根目录解析，绝对路径原样返回
    pub fn resolve(path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() { path.to_path_buf() } else { Self::workspace_path().join(path) }
    }
}
// 根目录下
impl KascadePath {
    /// 获取 `assets/` 目录下的文件路径
    pub fn assets_path(filename: &str) -> PathBuf {
        Self::workspace_path().join("assets").join(filename)
    }

    /// 获取 `shader/spv/` 目录下编译好的 SPIR-V 路径
    pub fn shader_path(filename: &str) -> PathBuf {
        Self::shader_build_path().join(format!("{filename}.spv"))
    }

    /// GLSL 源码目录 `shader/glsl/`
    pub fn shader_src_path() -> PathBuf {
        Self::workspace_path().join("shader").join("glsl")
    }

    /// 编译输出目录 `shader/spv/`
    pub fn shader_build_path() -> PathBuf {
        Self::workspace_path().join("shader").join("spv")
    }

    /// 工作区根目录下的 `kascade.toml`
    pub fn config_path() -> PathBuf {
        Self::workspace_path().join("kascade.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_keeps_absolute_path() {
        let abs = if cfg!(windows) { PathBuf::from("C:\\scene.gltf") } else { PathBuf::from("/tmp/scene.gltf") };
        assert_eq!(KascadePath::resolve(&abs), abs);
    }

    #[test]
    fn test_shader_path_appends_spv() {
        let path = KascadePath::shader_path("gltf.frag");
        assert!(path.ends_with("shader/spv/gltf.frag.spv"));
    }
}
