//! Vulkan GFX 抽象层
//!
//! 提供对 Vulkan API 的封装：instance/device 的创建、基于 VMA 的 buffer 与 image、
//! staging 上传、纹理与 mipmap、交换链以及 frames in flight 的同步。
//!
//! 不使用全局单例：每个资源都持有创建它的 `Rc<GfxDevice>`（buffer/image 持有 `Rc<GfxAllocator>`），
//! 在 `Drop` 中释放，因此 device 一定在最后一个依赖它的资源之后销毁。

pub mod basic;
pub mod commands;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod foundation;
pub mod frame;
pub mod pipelines;
pub mod resources;
pub mod sampler;
pub mod swapchain;
pub mod texture;
pub mod transfer;
