use std::path::{Path, PathBuf};

use anyhow::Context;

/// Shader 的执行阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl ShaderStage {
    /// 根据扩展名判断，不是入口的文件返回 None
    pub fn from_file_name(name: &str) -> Option<Self> {
        match name.rsplit('.').next()? {
            "vert" => Some(Self::Vertex),
            "frag" => Some(Self::Fragment),
            "comp" => Some(Self::Compute),
            _ => None,
        }
    }

    /// glslc 的 `-fshader-stage` 参数
    pub fn glslc_name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
            Self::Compute => "compute",
        }
    }
}

/// 一个具体的编译任务
#[derive(Debug)]
pub struct ShaderCompileTask {
    pub shader_path: PathBuf,
    pub output_path: PathBuf,
    pub stage: ShaderStage,
}

impl ShaderCompileTask {
    /// 输出路径保持与源码目录相同的相对结构，文件名追加 `.spv`
    pub fn new(shader_path: &Path, src_root: &Path, build_root: &Path) -> Option<Self> {
        let stage = ShaderStage::from_file_name(shader_path.file_name()?.to_str()?)?;
        let relative_path = shader_path.strip_prefix(src_root).ok()?;

        let mut output_path = build_root.join(relative_path);
        let mut file_name = output_path.file_name()?.to_os_string();
        file_name.push(".spv");
        output_path.set_file_name(file_name);

        Some(Self {
            shader_path: shader_path.to_path_buf(),
            output_path,
            stage,
        })
    }

    pub fn compile(&self, include_dir: &Path) -> anyhow::Result<()> {
        if let Some(parent) = self.output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let output = std::process::Command::new("glslc")
            .arg(format!("-I{}", include_dir.display()))
            .arg(format!("-fshader-stage={}", self.stage.glslc_name()))
            .args(["-g", "--target-env=vulkan1.3", "-o"])
            .arg(&self.output_path)
            .arg(&self.shader_path)
            .output()
            .context("failed to execute glslc, is the Vulkan SDK installed?")?;

        if !output.stdout.is_empty() {
            log::info!("stdout: {}", String::from_utf8_lossy(&output.stdout));
        }
        anyhow::ensure!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_from_file_name() {
        assert_eq!(ShaderStage::from_file_name("gltf.vert"), Some(ShaderStage::Vertex));
        assert_eq!(ShaderStage::from_file_name("gltf.frag"), Some(ShaderStage::Fragment));
        assert_eq!(ShaderStage::from_file_name("scene.glsl"), None);
        assert_eq!(ShaderStage::from_file_name("README"), None);
    }

    #[test]
    fn test_output_path() {
        let task = ShaderCompileTask::new(
            Path::new("/ws/shader/glsl/pbr/gltf.frag"),
            Path::new("/ws/shader/glsl"),
            Path::new("/ws/shader/spv"),
        )
        .unwrap();
        assert_eq!(task.output_path, PathBuf::from("/ws/shader/spv/pbr/gltf.frag.spv"));
        assert_eq!(task.stage, ShaderStage::Fragment);

        // 不在源码目录下
        assert!(ShaderCompileTask::new(Path::new("/other/a.vert"), Path::new("/ws/shader/glsl"), Path::new("/ws/spv")).is_none());
    }
}
