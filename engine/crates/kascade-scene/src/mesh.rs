use ash::vk;
use kascade_gfx::{context::GfxContext, resources::buffer::GfxBuffer, transfer};

use crate::{
    error::{SceneError, SceneResult},
    vertex::GltfVertex,
};

/// 上传之前的 primitive 数据
#[derive(Clone, Debug)]
pub struct PrimitiveData {
    pub vertices: Vec<GltfVertex>,
    pub indices: Vec<u32>,
    pub material: Option<usize>,
}

impl PrimitiveData {
    /// 空的顶点或者索引都是错误，不会产生一个不绘制任何东西的 primitive
    pub fn new(
        mesh: usize,
        primitive: usize,
        vertices: Vec<GltfVertex>,
        indices: Vec<u32>,
        material: Option<usize>,
    ) -> SceneResult<Self> {
        if vertices.is_empty() || indices.is_empty() {
            return Err(SceneError::EmptyPrimitive { mesh, primitive });
        }
        Ok(Self {
            vertices,
            indices,
            material,
        })
    }
}

/// 一个 primitive 对应一次 indexed draw
pub struct GltfPrimitive {
    pub vertex_buffer: GfxBuffer,
    pub index_buffer: GfxBuffer,
    pub vertex_count: u32,
    pub index_count: u32,
    /// None 表示使用默认材质
    pub material: Option<usize>,
}

impl GltfPrimitive {
    pub fn upload(ctx: &GfxContext, data: &PrimitiveData, name: &str) -> SceneResult<Self> {
        let vertex_buffer = transfer::upload_to_device(
            ctx,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            data.vertices.as_slice(),
            format!("{}-vertex", name),
        )?;
        let index_buffer =
            transfer::upload_to_device(ctx, vk::BufferUsageFlags::INDEX_BUFFER, data.indices.as_slice(), format!("{}-index", name))?;

        Ok(Self {
            vertex_buffer,
            index_buffer,
            vertex_count: data.vertices.len() as u32,
            index_count: data.indices.len() as u32,
            material: data.material,
        })
    }
}

pub struct GltfMesh {
    pub name: String,
    /// 插入顺序即绘制顺序
    pub primitives: Vec<GltfPrimitive>,
    /// morph target 的权重，只保存，不参与计算
    pub weights: Option<Vec<f32>>,
}
