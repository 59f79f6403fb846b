use std::rc::Rc;

use ash::vk;
use glam::Mat4;
use itertools::Itertools;
use kascade_gfx::{foundation::allocator::GfxAllocator, resources::buffer::GfxBuffer, texture::GfxTexture};

use crate::{
    error::SceneResult,
    material::{GltfMaterial, MaterialData},
    mesh::GltfMesh,
    node::{SceneNode, WorldMatrixCache},
};

/// 加载完成的 glTF 模型
///
/// 节点表本身不可变，world matrix 保存在 `world_cache` 中；
/// material 与 transform 以 storage buffer 的形式常驻 GPU（host visible，持久映射）
pub struct GltfModel {
    name: String,

    nodes: Vec<SceneNode>,
    roots: Vec<usize>,
    meshes: Vec<GltfMesh>,

    materials: Vec<GltfMaterial>,
    /// primitive 没有指定材质时使用的材质下标
    default_material: usize,

    /// 按 glTF texture 下标存放，加载失败的纹理为 None
    textures: Vec<Option<GfxTexture>>,

    world_cache: WorldMatrixCache,

    material_buffer: GfxBuffer,
    transform_buffer: GfxBuffer,
}

/// 创建模型所需的 CPU 侧数据以及已经上传的 mesh 和纹理
pub struct GltfModelParts {
    pub name: String,
    pub nodes: Vec<SceneNode>,
    pub roots: Vec<usize>,
    pub meshes: Vec<GltfMesh>,
    pub materials: Vec<GltfMaterial>,
    pub default_material: usize,
    pub textures: Vec<Option<GfxTexture>>,
}

// new & init
impl GltfModel {
    pub fn new(allocator: &Rc<GfxAllocator>, parts: GltfModelParts) -> SceneResult<Self> {
        let GltfModelParts {
            name,
            nodes,
            roots,
            meshes,
            materials,
            default_material,
            textures,
        } = parts;

        let storage_flags = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;

        let material_data = materials.iter().map(GltfMaterial::gpu_data).collect_vec();
        let material_buffer = GfxBuffer::new(
            allocator,
            size_of_val(material_data.as_slice()).max(size_of::<MaterialData>()) as vk::DeviceSize,
            vk::BufferUsageFlags::STORAGE_BUFFER,
            storage_flags,
            format!("{}-materials", name),
        )?;
        material_buffer.write_by_mmap(&material_data)?;

        // 没有节点时仍然保留一个矩阵，保证 descriptor 有效
        let transform_buffer = GfxBuffer::new(
            allocator,
            (nodes.len().max(1) * size_of::<Mat4>()) as vk::DeviceSize,
            vk::BufferUsageFlags::STORAGE_BUFFER,
            storage_flags,
            format!("{}-transforms", name),
        )?;
        transform_buffer.write_by_mmap(&vec![Mat4::IDENTITY; nodes.len().max(1)])?;

        let world_cache = WorldMatrixCache::new(nodes.len());
        let mut model = Self {
            name,
            nodes,
            roots,
            meshes,
            materials,
            default_material,
            textures,
            world_cache,
            material_buffer,
            transform_buffer,
        };
        model.update_transforms()?;

        log::info!(
            "model {} created: {} nodes, {} roots, {} meshes, {} materials, {} textures",
            model.name,
            model.nodes.len(),
            model.roots.len(),
            model.meshes.len(),
            model.materials.len(),
            model.loaded_texture_count()
        );
        Ok(model)
    }
}

// getters
impl GltfModel {
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    #[inline]
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    #[inline]
    pub fn meshes(&self) -> &[GltfMesh] {
        &self.meshes
    }

    #[inline]
    pub fn materials(&self) -> &[GltfMaterial] {
        &self.materials
    }

    #[inline]
    pub fn default_material(&self) -> usize {
        self.default_material
    }

    #[inline]
    pub fn textures(&self) -> &[Option<GfxTexture>] {
        &self.textures
    }

    pub fn loaded_texture_count(&self) -> usize {
        self.textures.iter().flatten().count()
    }

    #[inline]
    pub fn material_buffer(&self) -> &GfxBuffer {
        &self.material_buffer
    }

    #[inline]
    pub fn transform_buffer(&self) -> &GfxBuffer {
        &self.transform_buffer
    }

    /// 缓存中的 world matrix，dirty 时会重新计算
    pub fn world_matrix(&mut self, node: usize) -> Mat4 {
        self.world_cache.world_matrix(&self.nodes, node)
    }
}

// update
impl GltfModel {
    /// 标记所有节点为 dirty，重新计算后写入 transform buffer
    pub fn update_transforms(&mut self) -> SceneResult<()> {
        let _span = tracy_client::span!("GltfModel::update_transforms");

        if self.nodes.is_empty() {
            return Ok(());
        }
        self.world_cache.mark_all_dirty();
        let matrices = self.world_cache.refresh_all(&self.nodes);
        self.transform_buffer.write_by_mmap(matrices)?;
        Ok(())
    }
}
