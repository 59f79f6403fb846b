//! 帧渲染器
//!
//! 每一帧：等待 slot 的 fence -> acquire -> 更新 UBO 与 transform -> 录制并提交 -> present。
//! 帧的控制流在 [`frame_loop::run_frame`] 中，与具体的 GPU 对象通过 [`frame_loop::FrameTarget`] 隔离。

pub mod descriptors;
pub mod draw_list;
pub mod environment;
pub mod error;
pub mod frame_loop;
pub mod pipeline;
pub mod render_targets;
pub mod renderer;
pub mod timer;
pub mod uniforms;
