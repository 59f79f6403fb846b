//! Kascade 工具集
//!
//! 提供日志初始化、资源路径管理以及 app 配置的读取。
//!
//! # KascadePath
//! 基于工作区根目录的统一路径管理，避免硬编码相对路径。
//!
//! # KascadeConfig
//! 从 `kascade.toml` 读取运行配置，文件缺失时使用默认值。

pub mod app_config;
pub mod init_log;
pub mod resource;
