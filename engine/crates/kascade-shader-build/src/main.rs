//! Shader 编译工具
//!
//! 使用 glslc (来自 Vulkan SDK) 将 `shader/glsl` 下的入口 shader 编译为 SPIR-V，输出到 `shader/spv`。
//! 被 include 的文件（例如 `.glsl`）不是入口，不会单独编译。

mod task;

use kascade_crate_tools::{init_log::init_log, resource::KascadePath};
use rayon::prelude::*;
use task::ShaderCompileTask;

fn main() -> anyhow::Result<()> {
    init_log();

    let src_path = KascadePath::shader_src_path();
    let build_path = KascadePath::shader_build_path();
    log::info!("shader source path: {:?}", src_path);
    log::info!("shader output path: {:?}", build_path);

    std::fs::create_dir_all(&build_path)?;

    let tasks = walkdir::WalkDir::new(&src_path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| ShaderCompileTask::new(entry.path(), &src_path, &build_path))
        .collect::<Vec<_>>();

    // 并行编译，收集所有失败的 shader
    let failed = tasks
        .par_iter()
        .filter_map(|task| {
            log::info!("compiling shader: {:?}", task.shader_path);
            task.compile(&src_path).err().map(|e| (task, e))
        })
        .collect::<Vec<_>>();

    for (task, e) in &failed {
        log::error!("failed to compile {:?}: {:#}", task.shader_path, e);
    }
    anyhow::ensure!(failed.is_empty(), "{} of {} shaders failed to compile", failed.len(), tasks.len());

    log::info!("shader compilation completed: {} shaders", tasks.len());
    Ok(())
}
