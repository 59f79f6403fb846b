//! glTF 的加载
//!
//! gltf 的格式，参考 https://www.khronos.org/files/gltf20-reference-guide.pdf
//!
//! 解析部分都是不依赖 GPU 的纯函数，[`GltfLoader`] 只负责把它们串起来并上传数据

use std::path::{Path, PathBuf};

use ash::vk;
use glam::{Mat4, Quat, Vec3, Vec4};
use itertools::Itertools;
use kascade_gfx::{
    context::GfxContext,
    error::GfxError,
    sampler::GfxSamplerDesc,
    texture::GfxTexture,
};

use crate::{
    error::{SceneError, SceneResult},
    material::{GltfMaterial, TextureSlot},
    mesh::{GltfMesh, GltfPrimitive, PrimitiveData},
    model::{GltfModel, GltfModelParts},
    node::{NodeTransform, SceneNode, link_parents},
    vertex::{GltfVertex, generate_tangents},
};

/// 导入 gltf 格式的模型
///
/// 支持 mesh、材质、纹理与节点层级；skin、camera 只保存引用，动画不支持
pub struct GltfLoader<'a> {
    ctx: &'a GfxContext,

    name: String,
    document: gltf::Document,
    buffers: Vec<gltf::buffer::Data>,
    /// 外部资源相对于该目录解析
    base_dir: Option<PathBuf>,
}

// new & init
impl<'a> GltfLoader<'a> {
    /// 从 gltf/glb 文件中载入模型，文本还是二进制由 gltf 根据文件内容决定
    pub fn load(ctx: &'a GfxContext, path: &Path) -> SceneResult<GltfModel> {
        let _span = tracy_client::span!("GltfLoader::load");
        log::info!("loading gltf: {:?}", path);

        let gltf::Gltf { document, blob } = gltf::Gltf::open(path)?;
        let base_dir = path.parent().map(Path::to_path_buf);
        let buffers = gltf::import_buffers(&document, base_dir.as_deref(), blob)?;

        let name = path.file_stem().map_or_else(|| "gltf".to_string(), |s| s.to_string_lossy().into_owned());
        let loader = Self {
            ctx,
            name,
            document,
            buffers,
            base_dir,
        };
        loader.build_model()
    }

    /// 加载内存中的 glb 或者只包含 data uri 的 gltf
    pub fn load_slice(ctx: &'a GfxContext, bytes: &[u8], name: &str) -> SceneResult<GltfModel> {
        let _span = tracy_client::span!("GltfLoader::load_slice");

        let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(bytes)?;
        let buffers = gltf::import_buffers(&document, None, blob)?;
        let loader = Self {
            ctx,
            name: name.to_string(),
            document,
            buffers,
            base_dir: None,
        };
        loader.build_model()
    }
}

// build
impl GltfLoader<'_> {
    fn build_model(self) -> SceneResult<GltfModel> {
        // 纹理的格式取决于它被材质如何引用，所以需要在加载纹理之前扫描所有材质
        let mut materials = self.document.materials().map(|m| read_material(&m)).collect_vec();
        let srgb_flags = classify_texture_color_spaces(&materials, self.document.textures().len());

        let textures = self.load_textures(&srgb_flags)?;
        for material in &mut materials {
            material.drop_missing_textures(|idx| textures.get(idx).is_some_and(Option::is_some));
        }

        let primitives = self.read_meshes()?;
        let any_missing_material = primitives.iter().flatten().any(|p| p.material.is_none());
        let default_material = resolve_default_material(&mut materials, any_missing_material);

        let meshes = self.upload_meshes(primitives)?;

        let nodes = read_nodes(&self.document)?;
        let roots = resolve_roots(&self.document, &nodes);

        GltfModel::new(
            self.ctx.allocator(),
            GltfModelParts {
                name: self.name,
                nodes,
                roots,
                meshes,
                materials,
                default_material,
                textures,
            },
        )
    }

    /// 按 glTF texture 下标加载所有纹理；图片缺失或者解码失败时只输出警告
    fn load_textures(&self, srgb_flags: &[bool]) -> SceneResult<Vec<Option<GfxTexture>>> {
        let _span = tracy_client::span!("GltfLoader::load_textures");

        self.document
            .textures()
            .map(|texture| -> SceneResult<Option<GfxTexture>> {
                let idx = texture.index();
                let image = texture.source();
                let data = match gltf::image::Data::from_source(image.source(), self.base_dir.as_deref(), &self.buffers)
                {
                    Ok(data) => data,
                    Err(e) => {
                        log::warn!("texture {}: failed to load image {}: {}", idx, image.index(), e);
                        return Ok(None);
                    }
                };

                let (width, height) = (data.width, data.height);
                let Some(pixels) = to_rgba8(data.pixels, data.format, width, height) else {
                    log::warn!("texture {}: unsupported image format {:?}", idx, data.format);
                    return Ok(None);
                };

                let srgb = srgb_flags.get(idx).copied().unwrap_or(false);
                let format = if srgb { vk::Format::R8G8B8A8_SRGB } else { vk::Format::R8G8B8A8_UNORM };
                let sampler = texture.sampler();
                let sampler_desc =
                    sampler_desc(sampler.mag_filter(), sampler.min_filter(), sampler.wrap_s(), sampler.wrap_t());
                let name = format!("{}-tex-{}", self.name, idx);

                let texture = match GfxTexture::new_2d(
                    self.ctx,
                    &pixels,
                    width,
                    height,
                    format,
                    true,
                    &sampler_desc,
                    &name,
                ) {
                    Err(GfxError::UnsupportedBlitFormat(format)) => {
                        log::warn!("texture {}: {:?} can not be blitted, upload without mipmaps", idx, format);
                        GfxTexture::new_2d(self.ctx, &pixels, width, height, format, false, &sampler_desc, &name)?
                    }
                    other => other?,
                };
                Ok(Some(texture))
            })
            .collect()
    }

    /// 外层按 mesh，内层按 primitive；不是三角形的 primitive 为 None
    fn read_meshes(&self) -> SceneResult<Vec<Vec<Option<PrimitiveData>>>> {
        let _span = tracy_client::span!("GltfLoader::read_meshes");

        self.document
            .meshes()
            .map(|mesh| mesh.primitives().map(|primitive| read_primitive(&mesh, &primitive, &self.buffers)).collect())
            .collect()
    }

    fn upload_meshes(&self, primitives: Vec<Vec<Option<PrimitiveData>>>) -> SceneResult<Vec<GltfMesh>> {
        let _span = tracy_client::span!("GltfLoader::upload_meshes");

        self.document
            .meshes()
            .zip(primitives)
            .map(|(mesh, primitives)| -> SceneResult<GltfMesh> {
                let mesh_name = mesh.name().map_or_else(|| format!("mesh-{}", mesh.index()), str::to_string);
                let primitives = primitives
                    .iter()
                    .enumerate()
                    .filter_map(|(prim_idx, data)| data.as_ref().map(|data| (prim_idx, data)))
                    .map(|(prim_idx, data)| {
                        GltfPrimitive::upload(self.ctx, data, &format!("{}-{}-{}", self.name, mesh_name, prim_idx))
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(GltfMesh {
                    name: mesh_name,
                    primitives,
                    weights: mesh.weights().map(<[f32]>::to_vec),
                })
            })
            .collect()
    }
}

/// 创建材质对象
///
/// gltf 中一个 material 的组成
/// ```json
/// {
///     "pbrMetallicRoughness": {
///         "baseColorTexture": {},
///         "baseColorFactor": [f32; 4],
///         "metallicRoughnessTexture": {},
///         "metallicFactor": f32,
///         "roughnessFactor": f32,
///     },
///     "normalTexture": {},
///     "occlusionTexture": {},
///     "emissiveTexture": {},
///     "emissiveFactor": [f32; 3]
/// }
/// ```
pub fn read_material(material: &gltf::Material) -> GltfMaterial {
    let pbr = material.pbr_metallic_roughness();
    let slot = |info: gltf::texture::Info| TextureSlot {
        texture: info.texture().index(),
        tex_coord: info.tex_coord(),
    };
    let defaults = GltfMaterial::default();

    GltfMaterial {
        name: material
            .name()
            .map(str::to_string)
            .or_else(|| material.index().map(|i| format!("material-{}", i)))
            .unwrap_or(defaults.name),
        base_color_factor: Vec4::from_array(pbr.base_color_factor()),
        emissive_factor: Vec3::from_array(material.emissive_factor()),
        metallic_factor: pbr.metallic_factor(),
        roughness_factor: pbr.roughness_factor(),
        normal_scale: material.normal_texture().map_or(defaults.normal_scale, |t| t.scale()),
        occlusion_strength: material.occlusion_texture().map_or(defaults.occlusion_strength, |t| t.strength()),
        alpha_cutoff: material.alpha_cutoff().unwrap_or(defaults.alpha_cutoff),
        alpha_mode: material.alpha_mode().into(),
        double_sided: material.double_sided(),
        base_color_texture: pbr.base_color_texture().map(slot),
        metallic_roughness_texture: pbr.metallic_roughness_texture().map(slot),
        normal_texture: material.normal_texture().map(|t| TextureSlot {
            texture: t.texture().index(),
            tex_coord: t.tex_coord(),
        }),
        occlusion_texture: material.occlusion_texture().map(|t| TextureSlot {
            texture: t.texture().index(),
            tex_coord: t.tex_coord(),
        }),
        emissive_texture: material.emissive_texture().map(slot),
    }
}

/// 每个纹理是否按 sRGB 解码：base color 与 emissive 为 sRGB，其余为线性
///
/// 同一个纹理同时被两种方式引用时，sRGB 优先
pub fn classify_texture_color_spaces(materials: &[GltfMaterial], texture_cnt: usize) -> Vec<bool> {
    let mut srgb = vec![false; texture_cnt];
    for (slot, is_srgb) in materials.iter().flat_map(GltfMaterial::texture_refs) {
        if is_srgb {
            if let Some(flag) = srgb.get_mut(slot.texture) {
                *flag = true;
            }
        }
    }
    srgb
}

/// 返回默认材质的下标
///
/// 文件中没有材质时合成一个放在 0 号；否则只有存在未指定材质的 primitive 时才追加在末尾
pub fn resolve_default_material(materials: &mut Vec<GltfMaterial>, any_missing: bool) -> usize {
    if materials.is_empty() {
        materials.push(GltfMaterial::default());
        return 0;
    }
    if any_missing {
        materials.push(GltfMaterial::default());
        return materials.len() - 1;
    }
    0
}

/// 采样器的映射；mipmap 固定为 LINEAR，各向异性为 16
pub fn sampler_desc(
    mag_filter: Option<gltf::texture::MagFilter>,
    min_filter: Option<gltf::texture::MinFilter>,
    wrap_s: gltf::texture::WrappingMode,
    wrap_t: gltf::texture::WrappingMode,
) -> GfxSamplerDesc {
    use gltf::texture::{MagFilter, MinFilter, WrappingMode};

    let mag_filter = match mag_filter {
        Some(MagFilter::Nearest) => vk::Filter::NEAREST,
        Some(MagFilter::Linear) | None => vk::Filter::LINEAR,
    };
    let min_filter = match min_filter {
        Some(MinFilter::Nearest | MinFilter::NearestMipmapNearest | MinFilter::NearestMipmapLinear) => {
            vk::Filter::NEAREST
        }
        Some(MinFilter::Linear | MinFilter::LinearMipmapNearest | MinFilter::LinearMipmapLinear) | None => {
            vk::Filter::LINEAR
        }
    };
    let wrap = |mode: WrappingMode| match mode {
        WrappingMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        WrappingMode::MirroredRepeat => vk::SamplerAddressMode::MIRRORED_REPEAT,
        WrappingMode::Repeat => vk::SamplerAddressMode::REPEAT,
    };

    GfxSamplerDesc {
        mag_filter,
        min_filter,
        address_mode_u: wrap(wrap_s),
        address_mode_v: wrap(wrap_t),
        address_mode_w: vk::SamplerAddressMode::REPEAT,
        max_anisotropy: 16,
        mipmap_mode: vk::SamplerMipmapMode::LINEAR,
    }
}

/// 将 gltf 解码出的像素转换为 RGBA8
pub fn to_rgba8(pixels: Vec<u8>, format: gltf::image::Format, width: u32, height: u32) -> Option<Vec<u8>> {
    use gltf::image::Format;
    use image::{DynamicImage, ImageBuffer};

    fn to_u16(bytes: &[u8]) -> Vec<u16> {
        bytes.chunks_exact(2).map(|c| u16::from_ne_bytes([c[0], c[1]])).collect()
    }
    fn to_f32(bytes: &[u8]) -> Vec<f32> {
        bytes.chunks_exact(4).map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]])).collect()
    }

    #[allow(unreachable_patterns)]
    let image = match format {
        Format::R8G8B8A8 => {
            return (pixels.len() == (width * height * 4) as usize).then_some(pixels);
        }
        Format::R8 => DynamicImage::ImageLuma8(ImageBuffer::from_raw(width, height, pixels)?),
        Format::R8G8 => DynamicImage::ImageLumaA8(ImageBuffer::from_raw(width, height, pixels)?),
        Format::R8G8B8 => DynamicImage::ImageRgb8(ImageBuffer::from_raw(width, height, pixels)?),
        Format::R16 => DynamicImage::ImageLuma16(ImageBuffer::from_raw(width, height, to_u16(&pixels))?),
        Format::R16G16 => DynamicImage::ImageLumaA16(ImageBuffer::from_raw(width, height, to_u16(&pixels))?),
        Format::R16G16B16 => DynamicImage::ImageRgb16(ImageBuffer::from_raw(width, height, to_u16(&pixels))?),
        Format::R16G16B16A16 => DynamicImage::ImageRgba16(ImageBuffer::from_raw(width, height, to_u16(&pixels))?),
        Format::R32G32B32FLOAT => DynamicImage::ImageRgb32F(ImageBuffer::from_raw(width, height, to_f32(&pixels))?),
        Format::R32G32B32A32FLOAT => {
            DynamicImage::ImageRgba32F(ImageBuffer::from_raw(width, height, to_f32(&pixels))?)
        }
        _ => return None,
    };
    Some(image.to_rgba8().into_raw())
}

/// 读取一个 primitive 的顶点与索引
///
/// 只支持三角形，其它拓扑输出警告并返回 None
pub fn read_primitive(
    mesh: &gltf::Mesh,
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
) -> SceneResult<Option<PrimitiveData>> {
    let (mesh_idx, prim_idx) = (mesh.index(), primitive.index());
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        log::warn!(
            "mesh {} primitive {}: mode {:?} is not supported, skipped",
            mesh_idx,
            prim_idx,
            primitive.mode()
        );
        return Ok(None);
    }

    if let Some(accessor) = primitive.indices() {
        use gltf::accessor::{DataType, Dimensions};
        let valid_type = matches!(accessor.data_type(), DataType::U8 | DataType::U16 | DataType::U32);
        if !valid_type || accessor.dimensions() != Dimensions::Scalar {
            return Err(SceneError::UnsupportedIndexType(format!(
                "{:?} {:?}",
                accessor.data_type(),
                accessor.dimensions()
            )));
        }
    }

    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| &data[..]));

    let mut vertices = reader
        .read_positions()
        .ok_or(SceneError::MissingRequiredAttribute {
            mesh: mesh_idx,
            primitive: prim_idx,
            attribute: "POSITION",
        })?
        .map(GltfVertex::with_position)
        .collect_vec();

    let has_normals = match reader.read_normals() {
        Some(normals) => {
            vertices.iter_mut().zip(normals).for_each(|(v, n)| v.normal = n);
            true
        }
        None => false,
    };
    let has_uv0 = match reader.read_tex_coords(0) {
        Some(uvs) => {
            vertices.iter_mut().zip(uvs.into_f32()).for_each(|(v, uv)| v.uv0 = uv);
            true
        }
        None => false,
    };
    if let Some(uvs) = reader.read_tex_coords(1) {
        vertices.iter_mut().zip(uvs.into_f32()).for_each(|(v, uv)| v.uv1 = uv);
    }
    // vec3 的颜色 alpha 补 1
    if let Some(colors) = reader.read_colors(0) {
        vertices.iter_mut().zip(colors.into_rgba_f32()).for_each(|(v, c)| v.color = c);
    }
    let has_tangents = match reader.read_tangents() {
        Some(tangents) => {
            vertices.iter_mut().zip(tangents).for_each(|(v, t)| v.tangent = t);
            true
        }
        None => false,
    };
    // u8 与 u16 都会被展开
    if let Some(joints) = reader.read_joints(0) {
        vertices.iter_mut().zip(joints.into_u16()).for_each(|(v, j)| v.joints = j.map(u32::from));
    }
    if let Some(weights) = reader.read_weights(0) {
        vertices.iter_mut().zip(weights.into_f32()).for_each(|(v, w)| v.weights = w);
    }

    let indices = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect_vec(),
        None => (0..vertices.len() as u32).collect_vec(),
    };
    if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
        return Err(SceneError::Parse(format!(
            "mesh {} primitive {}: index {} out of range ({} vertices)",
            mesh_idx,
            prim_idx,
            bad,
            vertices.len()
        )));
    }

    if !has_tangents && has_normals && has_uv0 {
        generate_tangents(&mut vertices, &indices);
    }

    PrimitiveData::new(mesh_idx, prim_idx, vertices, indices, primitive.material().index()).map(Some)
}

/// 两遍读取节点：先创建所有节点，再根据 children 回填 parent
///
/// ```json
/// {
///     "children": ...,
///
///     // transform 以 matrix 形式整体指定，或者分别指定
///     "matrix": ...,
///     "translation": ...,
///     "rotation": ...,
///     "scale": ...,
///
///     "mesh": 4,
///     "camera": 5,
///     "skin": 6,
/// }
/// ```
pub fn read_nodes(document: &gltf::Document) -> SceneResult<Vec<SceneNode>> {
    let mut nodes = document
        .nodes()
        .map(|node| {
            // gltf 这个库使用 column major 的方式存放矩阵（每个元素相当于矩阵的一列）
            let transform = match node.transform() {
                gltf::scene::Transform::Matrix { matrix } => NodeTransform::Matrix(Mat4::from_cols_array_2d(&matrix)),
                gltf::scene::Transform::Decomposed {
                    translation,
                    rotation,
                    scale,
                } => NodeTransform::Trs {
                    translation: Vec3::from_array(translation),
                    rotation: Quat::from_array(rotation),
                    scale: Vec3::from_array(scale),
                },
            };

            SceneNode {
                index: node.index(),
                name: node.name().map_or_else(|| format!("node-{}", node.index()), str::to_string),
                mesh: node.mesh().map(|m| m.index()),
                skin: node.skin().map(|s| s.index()),
                camera: node.camera().map(|c| c.index()),
                transform,
                children: node.children().map(|c| c.index()).collect(),
                parent: None,
            }
        })
        .collect_vec();

    link_parents(&mut nodes)?;
    Ok(nodes)
}

/// 默认场景的根节点；没有默认场景时使用 0 号场景；没有场景时使用所有没有 parent 的节点
pub fn resolve_roots(document: &gltf::Document, nodes: &[SceneNode]) -> Vec<usize> {
    match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => scene.nodes().map(|n| n.index()).filter(|&i| nodes[i].parent.is_none()).collect(),
        None => nodes.iter().filter(|n| n.parent.is_none()).map(|n| n.index).collect(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::node::WorldMatrixCache;

    /// 把 json 与 bin 组装成 glb
    pub(crate) fn glb(json: &str, bin: &[u8]) -> Vec<u8> {
        let mut json = json.as_bytes().to_vec();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let mut bin = bin.to_vec();
        while bin.len() % 4 != 0 {
            bin.push(0);
        }

        let total = 12 + 8 + json.len() + 8 + bin.len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(b"glTF");
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(&0x4E4F534Au32.to_le_bytes());
        out.extend_from_slice(&json);
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(&0x004E4942u32.to_le_bytes());
        out.extend_from_slice(&bin);
        out
    }

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        bytemuck::cast_slice(values).to_vec()
    }

    /// 1 个根节点，1 个带 mesh 的子节点（translation (1,0,0)），三角形没有材质
    pub(crate) fn root_child_glb() -> Vec<u8> {
        let json = r#"{
            "asset": {"version": "2.0"},
            "scene": 0,
            "scenes": [{"nodes": [0]}],
            "nodes": [
                {"name": "root", "children": [1]},
                {"name": "child", "translation": [1.0, 0.0, 0.0], "mesh": 0}
            ],
            "meshes": [{"primitives": [{"attributes": {"POSITION": 0}, "indices": 1}]}],
            "buffers": [{"byteLength": 44}],
            "bufferViews": [
                {"buffer": 0, "byteOffset": 0, "byteLength": 36},
                {"buffer": 0, "byteOffset": 36, "byteLength": 6}
            ],
            "accessors": [
                {"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                 "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]},
                {"bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR"}
            ]
        }"#;
        let mut bin = f32_bytes(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        for i in [0u16, 1, 2] {
            bin.extend_from_slice(&i.to_le_bytes());
        }
        glb(json, &bin)
    }

    fn root_child_doc() -> (gltf::Document, Vec<gltf::buffer::Data>) {
        let (document, buffers, _) = gltf::import_slice(root_child_glb()).unwrap();
        (document, buffers)
    }

    /// 没有索引，带 NORMAL/TEXCOORD_0/COLOR_0(vec3)/JOINTS_0(u8)/WEIGHTS_0，以及一个 LINES primitive
    fn attributes_doc() -> (gltf::Document, Vec<gltf::buffer::Data>) {
        let json = r#"{
            "asset": {"version": "2.0"},
            "nodes": [{"mesh": 0}],
            "materials": [{
                "pbrMetallicRoughness": {"baseColorFactor": [1.0, 0.0, 0.0, 1.0], "metallicFactor": 0.25},
                "emissiveFactor": [1.0, 1.0, 1.0],
                "alphaMode": "MASK",
                "alphaCutoff": 0.3,
                "doubleSided": true
            }],
            "meshes": [{"primitives": [
                {"attributes": {"POSITION": 0, "NORMAL": 1, "TEXCOORD_0": 2, "COLOR_0": 3,
                                "JOINTS_0": 4, "WEIGHTS_0": 5}, "material": 0},
                {"attributes": {"POSITION": 0}, "mode": 1}
            ]}],
            "buffers": [{"byteLength": 192}],
            "bufferViews": [
                {"buffer": 0, "byteOffset": 0, "byteLength": 36},
                {"buffer": 0, "byteOffset": 36, "byteLength": 36},
                {"buffer": 0, "byteOffset": 72, "byteLength": 24},
                {"buffer": 0, "byteOffset": 96, "byteLength": 36},
                {"buffer": 0, "byteOffset": 132, "byteLength": 12},
                {"buffer": 0, "byteOffset": 144, "byteLength": 48}
            ],
            "accessors": [
                {"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                 "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]},
                {"bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC3"},
                {"bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC2"},
                {"bufferView": 3, "componentType": 5126, "count": 3, "type": "VEC3"},
                {"bufferView": 4, "componentType": 5121, "count": 3, "type": "VEC4"},
                {"bufferView": 5, "componentType": 5126, "count": 3, "type": "VEC4"}
            ]
        }"#;
        let mut bin = f32_bytes(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        bin.extend(f32_bytes(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]));
        bin.extend(f32_bytes(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0]));
        bin.extend(f32_bytes(&[0.5, 0.5, 0.5, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]));
        bin.extend_from_slice(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]);
        bin.extend(f32_bytes(&[1.0, 0.0, 0.0, 0.0, 0.5, 0.5, 0.0, 0.0, 0.25, 0.25, 0.25, 0.25]));
        let (document, buffers, _) = gltf::import_slice(glb(json, &bin)).unwrap();
        (document, buffers)
    }

    /// JOINTS_0 为 u16，第一个 primitive 使用 u32 索引，第二个 primitive 的 u32 索引越界
    fn wide_types_doc() -> (gltf::Document, Vec<gltf::buffer::Data>) {
        let json = r#"{
            "asset": {"version": "2.0"},
            "nodes": [{"mesh": 0}],
            "meshes": [{"primitives": [
                {"attributes": {"POSITION": 0, "JOINTS_0": 1}, "indices": 2},
                {"attributes": {"POSITION": 0}, "indices": 3}
            ]}],
            "buffers": [{"byteLength": 84}],
            "bufferViews": [
                {"buffer": 0, "byteOffset": 0, "byteLength": 36},
                {"buffer": 0, "byteOffset": 36, "byteLength": 24},
                {"buffer": 0, "byteOffset": 60, "byteLength": 12},
                {"buffer": 0, "byteOffset": 72, "byteLength": 12}
            ],
            "accessors": [
                {"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                 "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]},
                {"bufferView": 1, "componentType": 5123, "count": 3, "type": "VEC4"},
                {"bufferView": 2, "componentType": 5125, "count": 3, "type": "SCALAR"},
                {"bufferView": 3, "componentType": 5125, "count": 3, "type": "SCALAR"}
            ]
        }"#;
        let mut bin = f32_bytes(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        for j in [300u16, 1, 2, 3, 4, 5, 6, 7, 65535, 0, 0, 1000] {
            bin.extend_from_slice(&j.to_le_bytes());
        }
        for i in [2u32, 1, 0, 0, 1, 70000] {
            bin.extend_from_slice(&i.to_le_bytes());
        }
        let (document, buffers, _) = gltf::import_slice(glb(json, &bin)).unwrap();
        (document, buffers)
    }

    /// primitive 只有 NORMAL，没有 POSITION
    fn no_position_glb() -> Vec<u8> {
        let json = r#"{
            "asset": {"version": "2.0"},
            "nodes": [{"mesh": 0}],
            "meshes": [{"primitives": [{"attributes": {"NORMAL": 0}}]}],
            "buffers": [{"byteLength": 36}],
            "bufferViews": [{"buffer": 0, "byteOffset": 0, "byteLength": 36}],
            "accessors": [{"bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3"}]
        }"#;
        glb(json, &f32_bytes(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0]))
    }

    #[test]
    fn test_read_primitive_positions_and_indices() {
        let (doc, buffers) = root_child_doc();
        let mesh = doc.meshes().next().unwrap();
        let primitive = mesh.primitives().next().unwrap();
        let data = read_primitive(&mesh, &primitive, &buffers).unwrap().unwrap();

        assert_eq!(data.vertices.len(), 3);
        assert_eq!(data.indices, vec![0, 1, 2]);
        assert_eq!(data.material, None);
        assert_eq!(data.vertices[1].position, [1.0, 0.0, 0.0]);
        // 缺失的属性使用默认值
        assert_eq!(data.vertices[1].normal, GltfVertex::DEFAULT_NORMAL);
        assert_eq!(data.vertices[1].color, GltfVertex::DEFAULT_COLOR);
        assert_eq!(data.vertices[1].tangent, GltfVertex::DEFAULT_TANGENT);
    }

    #[test]
    fn test_read_primitive_optional_attributes() {
        let (doc, buffers) = attributes_doc();
        let mesh = doc.meshes().next().unwrap();
        let mut primitives = mesh.primitives();

        let data = read_primitive(&mesh, &primitives.next().unwrap(), &buffers).unwrap().unwrap();
        // 没有索引时生成 0..n
        assert_eq!(data.indices, vec![0, 1, 2]);
        assert_eq!(data.material, Some(0));

        let v = &data.vertices[1];
        assert_eq!(v.uv0, [1.0, 0.0]);
        assert_eq!(v.color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(v.joints, [4, 5, 6, 7]);
        assert_eq!(v.weights, [0.5, 0.5, 0.0, 0.0]);
        // 有 normal 和 uv0 时生成 tangent
        assert!((v.tangent[0] - 1.0).abs() < 1e-5);
        assert_eq!(v.tangent[3], 1.0);

        // LINES 被跳过
        assert!(read_primitive(&mesh, &primitives.next().unwrap(), &buffers).unwrap().is_none());
    }

    #[test]
    fn test_read_primitive_u16_joints_and_u32_indices() {
        let (doc, buffers) = wide_types_doc();
        let mesh = doc.meshes().next().unwrap();
        let mut primitives = mesh.primitives();

        let data = read_primitive(&mesh, &primitives.next().unwrap(), &buffers).unwrap().unwrap();
        assert_eq!(data.indices, vec![2, 1, 0]);
        assert_eq!(data.vertices[0].joints, [300, 1, 2, 3]);
        assert_eq!(data.vertices[2].joints, [65535, 0, 0, 1000]);
        // 没有 WEIGHTS_0 时保持默认值
        assert_eq!(data.vertices[0].weights, GltfVertex::default().weights);

        let err = read_primitive(&mesh, &primitives.next().unwrap(), &buffers).unwrap_err();
        assert!(matches!(err, SceneError::Parse(msg) if msg.contains("70000")));
    }

    #[test]
    fn test_read_primitive_missing_position() {
        let bytes = no_position_glb();
        // 校验过的导入在 gltf 层就会失败
        let err: SceneError = gltf::Gltf::from_slice(&bytes).unwrap_err().into();
        assert!(matches!(err, SceneError::Parse(_)));

        let gltf::Gltf { document, blob } = gltf::Gltf::from_slice_without_validation(&bytes).unwrap();
        let buffers = gltf::import_buffers(&document, None, blob).unwrap();
        let mesh = document.meshes().next().unwrap();
        let primitive = mesh.primitives().next().unwrap();

        let err = read_primitive(&mesh, &primitive, &buffers).unwrap_err();
        assert!(matches!(
            err,
            SceneError::MissingRequiredAttribute {
                mesh: 0,
                primitive: 0,
                attribute: "POSITION"
            }
        ));
    }

    #[test]
    fn test_read_material_overrides_defaults() {
        let (doc, _) = attributes_doc();
        let material = read_material(&doc.materials().next().unwrap());
        assert_eq!(material.base_color_factor, Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(material.metallic_factor, 0.25);
        assert_eq!(material.roughness_factor, 1.0);
        assert_eq!(material.emissive_factor, Vec3::ONE);
        assert_eq!(material.alpha_mode, crate::material::AlphaMode::Mask);
        assert_eq!(material.alpha_cutoff, 0.3);
        assert!(material.double_sided);
        assert!(!material.has_base_color_texture());
    }

    #[test]
    fn test_nodes_two_pass_and_world_matrices() {
        let (doc, _) = root_child_doc();
        let nodes = read_nodes(&doc).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].parent, None);
        assert_eq!(nodes[1].parent, Some(0));
        assert_eq!(nodes[1].mesh, Some(0));
        assert_eq!(nodes[0].mesh, None);
        assert_eq!(resolve_roots(&doc, &nodes), vec![0]);

        let mut cache = WorldMatrixCache::new(nodes.len());
        assert_eq!(cache.world_matrix(&nodes, 0), Mat4::IDENTITY);
        assert_eq!(cache.world_matrix(&nodes, 1), Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_roots_without_scene() {
        let (doc, _) = attributes_doc();
        let nodes = read_nodes(&doc).unwrap();
        assert_eq!(resolve_roots(&doc, &nodes), vec![0]);
    }

    #[test]
    fn test_default_material_resolution() {
        let mut empty = vec![];
        assert_eq!(resolve_default_material(&mut empty, true), 0);
        assert_eq!(empty.len(), 1);

        let mut some = vec![GltfMaterial::default(), GltfMaterial::default()];
        assert_eq!(resolve_default_material(&mut some, false), 0);
        assert_eq!(some.len(), 2);
        assert_eq!(resolve_default_material(&mut some, true), 2);
        assert_eq!(some.len(), 3);
    }

    #[test]
    fn test_classify_color_spaces() {
        let slot = |texture| {
            Some(TextureSlot {
                texture,
                tex_coord: 0,
            })
        };
        let materials = vec![
            GltfMaterial {
                base_color_texture: slot(0),
                normal_texture: slot(1),
                ..Default::default()
            },
            GltfMaterial {
                emissive_texture: slot(2),
                metallic_roughness_texture: slot(0),
                ..Default::default()
            },
        ];
        assert_eq!(classify_texture_color_spaces(&materials, 4), vec![true, false, true, false]);
    }

    #[test]
    fn test_sampler_mapping() {
        use gltf::texture::{MagFilter, MinFilter, WrappingMode};

        let desc = sampler_desc(None, None, WrappingMode::Repeat, WrappingMode::Repeat);
        assert_eq!(desc, GfxSamplerDesc::default());

        let desc = sampler_desc(
            Some(MagFilter::Nearest),
            Some(MinFilter::NearestMipmapLinear),
            WrappingMode::ClampToEdge,
            WrappingMode::MirroredRepeat,
        );
        assert_eq!(desc.mag_filter, vk::Filter::NEAREST);
        assert_eq!(desc.min_filter, vk::Filter::NEAREST);
        assert_eq!(desc.address_mode_u, vk::SamplerAddressMode::CLAMP_TO_EDGE);
        assert_eq!(desc.address_mode_v, vk::SamplerAddressMode::MIRRORED_REPEAT);
        assert_eq!(desc.mipmap_mode, vk::SamplerMipmapMode::LINEAR);
        assert_eq!(desc.max_anisotropy, 16);
    }

    #[test]
    fn test_to_rgba8() {
        let rgb = to_rgba8(vec![10, 20, 30, 40, 50, 60], gltf::image::Format::R8G8B8, 2, 1).unwrap();
        assert_eq!(rgb, vec![10, 20, 30, 255, 40, 50, 60, 255]);

        let rgba = vec![1, 2, 3, 4];
        assert_eq!(to_rgba8(rgba.clone(), gltf::image::Format::R8G8B8A8, 1, 1), Some(rgba));

        // 像素数量与尺寸不一致
        assert_eq!(to_rgba8(vec![1, 2, 3], gltf::image::Format::R8G8B8, 2, 2), None);
    }

    /// 需要可用的 vulkan 设备
    #[test]
    #[ignore]
    fn test_load_root_child_model() {
        use kascade_gfx::foundation::instance::GfxInstance;

        let _client = tracy_client::Client::start();
        let instance = GfxInstance::new("kascade-scene-test", None, false).unwrap();
        let ctx = GfxContext::new(instance, None).unwrap();

        let mut model = GltfLoader::load_slice(&ctx, &root_child_glb(), "root-child").unwrap();
        assert_eq!(model.roots(), &[0]);
        assert_eq!(model.materials().len(), 1);
        assert_eq!(model.default_material(), 0);
        assert_eq!(model.meshes()[0].primitives[0].index_count, 3);
        assert_eq!(model.world_matrix(1), Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)));
        assert_eq!(model.material_buffer().size(), 96);
        assert_eq!(model.transform_buffer().size(), 2 * 64);
    }
}
