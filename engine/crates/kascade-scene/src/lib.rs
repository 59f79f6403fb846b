//! glTF 场景
//!
//! 节点以扁平的 `Vec` 存放，父子关系只使用下标；world matrix 缓存在单独的 [`node::WorldMatrixCache`] 中。

pub mod error;
pub mod loader;
pub mod material;
pub mod mesh;
pub mod model;
pub mod node;
pub mod vertex;
