use anyhow::Context;
use kascade_crate_tools::{app_config::KascadeConfig, init_log::init_log};

mod app;

fn main() -> anyhow::Result<()> {
    init_log();
    let _tracy = tracy_client::Client::start();

    let mut config = KascadeConfig::load_or_default().context("failed to load config")?;
    // 第一个参数可以覆盖场景路径
    if let Some(scene) = std::env::args().nth(1) {
        // 命令行中的相对路径基于当前目录
        let scene = std::path::absolute(&scene).with_context(|| format!("invalid scene path: {}", scene))?;
        config.scene.gltf_path = scene.to_string_lossy().into_owned();
    }
    log::info!("scene: {:?}", config.gltf_path());

    let result = app::WinitApp::run(config);
    if let Err(e) = &result {
        log::error!("kascade exits with error: {:#}", e);
    }
    result
}
