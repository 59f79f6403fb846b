use std::mem::offset_of;

use ash::vk;
use glam::{Vec2, Vec3};
use kascade_gfx::resources::layout::GfxVertexLayout;

/// glTF primitive 展开之后的顶点（AoS）
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GltfVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv0: [f32; 2],
    pub uv1: [f32; 2],
    pub color: [f32; 4],
    /// w 表示 bitangent 的方向
    pub tangent: [f32; 4],
    pub joints: [u32; 4],
    pub weights: [f32; 4],
}

impl GltfVertex {
    pub const DEFAULT_NORMAL: [f32; 3] = [0.0, 0.0, 1.0];
    pub const DEFAULT_UV: [f32; 2] = [0.0, 0.0];
    pub const DEFAULT_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
    pub const DEFAULT_TANGENT: [f32; 4] = [1.0, 0.0, 0.0, 1.0];

    pub fn with_position(position: [f32; 3]) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }
}

impl Default for GltfVertex {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            normal: Self::DEFAULT_NORMAL,
            uv0: Self::DEFAULT_UV,
            uv1: Self::DEFAULT_UV,
            color: Self::DEFAULT_COLOR,
            tangent: Self::DEFAULT_TANGENT,
            joints: [0; 4],
            weights: [0.0; 4],
        }
    }
}

impl GfxVertexLayout for GltfVertex {
    fn vertex_input_bindings() -> Vec<vk::VertexInputBindingDescription> {
        vec![vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<GltfVertex>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }]
    }

    fn vertex_input_attributes() -> Vec<vk::VertexInputAttributeDescription> {
        let attr = |location: u32, format: vk::Format, offset: usize| vk::VertexInputAttributeDescription {
            binding: 0,
            location,
            format,
            offset: offset as u32,
        };
        vec![
            attr(0, vk::Format::R32G32B32_SFLOAT, offset_of!(GltfVertex, position)),
            attr(1, vk::Format::R32G32B32_SFLOAT, offset_of!(GltfVertex, normal)),
            attr(2, vk::Format::R32G32_SFLOAT, offset_of!(GltfVertex, uv0)),
            attr(3, vk::Format::R32G32_SFLOAT, offset_of!(GltfVertex, uv1)),
            attr(4, vk::Format::R32G32B32A32_SFLOAT, offset_of!(GltfVertex, color)),
            attr(5, vk::Format::R32G32B32A32_SFLOAT, offset_of!(GltfVertex, tangent)),
            attr(6, vk::Format::R32G32B32A32_UINT, offset_of!(GltfVertex, joints)),
            attr(7, vk::Format::R32G32B32A32_SFLOAT, offset_of!(GltfVertex, weights)),
        ]
    }
}

/// 根据 position、normal、uv0 计算 tangent
///
/// 逐三角形累加 tangent/bitangent，再对 normal 做 Gram-Schmidt 正交化，w 为手性。
/// uv 退化的三角形不参与累加；最终无法确定 tangent 的顶点保持默认值。
pub fn generate_tangents(vertices: &mut [GltfVertex], indices: &[u32]) {
    let mut tangents = vec![Vec3::ZERO; vertices.len()];
    let mut bitangents = vec![Vec3::ZERO; vertices.len()];

    for tri in indices.chunks_exact(3) {
        let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if i0 >= vertices.len() || i1 >= vertices.len() || i2 >= vertices.len() {
            continue;
        }

        let p0 = Vec3::from(vertices[i0].position);
        let e1 = Vec3::from(vertices[i1].position) - p0;
        let e2 = Vec3::from(vertices[i2].position) - p0;

        let uv0 = Vec2::from(vertices[i0].uv0);
        let duv1 = Vec2::from(vertices[i1].uv0) - uv0;
        let duv2 = Vec2::from(vertices[i2].uv0) - uv0;

        let det = duv1.x * duv2.y - duv2.x * duv1.y;
        if det.abs() < f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let t = (e1 * duv2.y - e2 * duv1.y) * r;
        let b = (e2 * duv1.x - e1 * duv2.x) * r;

        for i in [i0, i1, i2] {
            tangents[i] += t;
            bitangents[i] += b;
        }
    }

    for ((vertex, t), b) in vertices.iter_mut().zip(tangents).zip(bitangents) {
        let n = Vec3::from(vertex.normal);
        let t = (t - n * n.dot(t)).normalize_or_zero();
        if t == Vec3::ZERO {
            continue;
        }
        let w = if n.cross(t).dot(b) < 0.0 { -1.0 } else { 1.0 };
        vertex.tangent = t.extend(w).to_array();
    }
}
