use crate::node::gpu_index;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}
impl AlphaMode {
    #[inline]
    pub fn gpu_value(self) -> u32 {
        match self {
            AlphaMode::Opaque => 0,
            AlphaMode::Mask => 1,
            AlphaMode::Blend => 2,
        }
    }
}
impl From<gltf::material::AlphaMode> for AlphaMode {
    fn from(mode: gltf::material::AlphaMode) -> Self {
        match mode {
            gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
            gltf::material::AlphaMode::Mask => AlphaMode::Mask,
            gltf::material::AlphaMode::Blend => AlphaMode::Blend,
        }
    }
}

/// 材质对纹理的引用：纹理下标与 UV set
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureSlot {
    pub texture: usize,
    pub tex_coord: u32,
}

/// CPU 侧的 PBR metallic-roughness 材质
#[derive(Clone, Debug, PartialEq)]
pub struct GltfMaterial {
    pub name: String,

    pub base_color_factor: glam::Vec4,
    pub emissive_factor: glam::Vec3,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub normal_scale: f32,
    pub occlusion_strength: f32,
    pub alpha_cutoff: f32,
    pub alpha_mode: AlphaMode,
    pub double_sided: bool,

    pub base_color_texture: Option<TextureSlot>,
    /// metallic 位于 B 通道，roughness 位于 G 通道
    pub metallic_roughness_texture: Option<TextureSlot>,
    pub normal_texture: Option<TextureSlot>,
    pub occlusion_texture: Option<TextureSlot>,
    pub emissive_texture: Option<TextureSlot>,
}

impl Default for GltfMaterial {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color_factor: glam::Vec4::ONE,
            emissive_factor: glam::Vec3::ZERO,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            normal_scale: 1.0,
            occlusion_strength: 1.0,
            alpha_cutoff: 0.5,
            alpha_mode: AlphaMode::Opaque,
            double_sided: false,
            base_color_texture: None,
            metallic_roughness_texture: None,
            normal_texture: None,
            occlusion_texture: None,
            emissive_texture: None,
        }
    }
}

impl GltfMaterial {
    #[inline]
    pub fn has_base_color_texture(&self) -> bool {
        self.base_color_texture.is_some()
    }

    /// 所有被引用的纹理，以及它是否需要按 sRGB 解码
    pub fn texture_refs(&self) -> impl Iterator<Item = (TextureSlot, bool)> + '_ {
        [
            (self.base_color_texture, true),
            (self.emissive_texture, true),
            (self.metallic_roughness_texture, false),
            (self.normal_texture, false),
            (self.occlusion_texture, false),
        ]
        .into_iter()
        .filter_map(|(slot, srgb)| slot.map(|slot| (slot, srgb)))
    }

    /// 纹理加载失败时，把对应的引用置空
    pub fn drop_missing_textures(&mut self, is_loaded: impl Fn(usize) -> bool) {
        for slot in [
            &mut self.base_color_texture,
            &mut self.metallic_roughness_texture,
            &mut self.normal_texture,
            &mut self.occlusion_texture,
            &mut self.emissive_texture,
        ] {
            if let Some(s) = *slot {
                if !is_loaded(s.texture) {
                    log::warn!("material {} references unloaded texture {}", self.name, s.texture);
                    *slot = None;
                }
            }
        }
    }

    pub fn gpu_data(&self) -> MaterialData {
        let slots = [
            self.base_color_texture,
            self.metallic_roughness_texture,
            self.normal_texture,
            self.occlusion_texture,
            self.emissive_texture,
        ];
        let tex_coord_mask = slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some_and(|s| s.tex_coord == 1))
            .fold(0u32, |mask, (bit, _)| mask | (1 << bit));

        MaterialData {
            base_color_factor: self.base_color_factor.to_array(),
            emissive_factor: self.emissive_factor.extend(0.0).to_array(),
            metallic_factor: self.metallic_factor,
            roughness_factor: self.roughness_factor,
            normal_scale: self.normal_scale,
            occlusion_strength: self.occlusion_strength,
            alpha_cutoff: self.alpha_cutoff,
            alpha_mode: self.alpha_mode.gpu_value(),
            double_sided: self.double_sided as u32,
            _padding0: 0,
            base_color_texture: gpu_index(self.base_color_texture.map(|s| s.texture)),
            metallic_roughness_texture: gpu_index(self.metallic_roughness_texture.map(|s| s.texture)),
            normal_texture: gpu_index(self.normal_texture.map(|s| s.texture)),
            occlusion_texture: gpu_index(self.occlusion_texture.map(|s| s.texture)),
            emissive_texture: gpu_index(self.emissive_texture.map(|s| s.texture)),
            tex_coord_mask,
            _padding1: [0; 2],
        }
    }
}

/// 材质在 storage buffer 中的布局（std430），与 shader 中的 `Material` 对应
///
/// 没有纹理时下标为 -1；`tex_coord_mask` 的第 i 位表示第 i 个纹理使用 UV1，
/// 顺序为 base color, metallic-roughness, normal, occlusion, emissive
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialData {
    pub base_color_factor: [f32; 4],
    /// w 没有使用
    pub emissive_factor: [f32; 4],

    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub normal_scale: f32,
    pub occlusion_strength: f32,

    pub alpha_cutoff: f32,
    pub alpha_mode: u32,
    pub double_sided: u32,
    pub _padding0: u32,

    pub base_color_texture: i32,
    pub metallic_roughness_texture: i32,
    pub normal_texture: i32,
    pub occlusion_texture: i32,

    pub emissive_texture: i32,
    pub tex_coord_mask: u32,
    pub _padding1: [u32; 2],
}

impl MaterialData {
    #[inline]
    pub fn has_base_color_texture(&self) -> bool {
        self.base_color_texture >= 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_material() {
        let m = GltfMaterial::default();
        assert_eq!(m.base_color_factor, glam::Vec4::ONE);
        assert_eq!(m.emissive_factor, glam::Vec3::ZERO);
        assert_eq!(m.metallic_factor, 1.0);
        assert_eq!(m.roughness_factor, 1.0);
        assert_eq!(m.alpha_cutoff, 0.5);
        assert_eq!(m.alpha_mode, AlphaMode::Opaque);
        assert!(!m.double_sided);
        assert!(!m.has_base_color_texture());
        assert_eq!(m.texture_refs().count(), 0);
    }

    #[test]
    fn test_material_data_layout() {
        assert_eq!(size_of::<MaterialData>(), 96);
        assert_eq!(std::mem::offset_of!(MaterialData, metallic_factor), 32);
        assert_eq!(std::mem::offset_of!(MaterialData, alpha_cutoff), 48);
        assert_eq!(std::mem::offset_of!(MaterialData, base_color_texture), 64);
        assert_eq!(std::mem::offset_of!(MaterialData, emissive_texture), 80);
    }

    #[test]
    fn test_has_base_color_texture_sentinel() {
        let mut data = GltfMaterial::default().gpu_data();
        assert_eq!(data.base_color_texture, -1);
        assert!(!data.has_base_color_texture());

        data.base_color_texture = 0;
        assert!(data.has_base_color_texture());
        data.base_color_texture = 5;
        assert!(data.has_base_color_texture());
    }

    #[test]
    fn test_gpu_data_textures() {
        let m = GltfMaterial {
            base_color_texture: Some(TextureSlot {
                texture: 2,
                tex_coord: 0,
            }),
            normal_texture: Some(TextureSlot {
                texture: 4,
                tex_coord: 1,
            }),
            alpha_mode: AlphaMode::Blend,
            double_sided: true,
            ..Default::default()
        };
        let data = m.gpu_data();
        assert_eq!(data.base_color_texture, 2);
        assert_eq!(data.normal_texture, 4);
        assert_eq!(data.metallic_roughness_texture, -1);
        assert_eq!(data.tex_coord_mask, 0b100);
        assert_eq!(data.alpha_mode, 2);
        assert_eq!(data.double_sided, 1);
    }

    #[test]
    fn test_texture_refs_color_space() {
        let slot = |texture| {
            Some(TextureSlot {
                texture,
                tex_coord: 0,
            })
        };
        let m = GltfMaterial {
            base_color_texture: slot(0),
            emissive_texture: slot(1),
            normal_texture: slot(2),
            ..Default::default()
        };
        let refs = m.texture_refs().map(|(s, srgb)| (s.texture, srgb)).collect::<Vec<_>>();
        assert_eq!(refs, vec![(0, true), (1, true), (2, false)]);
    }

    #[test]
    fn test_drop_missing_textures() {
        let mut m = GltfMaterial {
            base_color_texture: Some(TextureSlot {
                texture: 0,
                tex_coord: 0,
            }),
            occlusion_texture: Some(TextureSlot {
                texture: 1,
                tex_coord: 0,
            }),
            ..Default::default()
        };
        m.drop_missing_textures(|idx| idx == 0);
        assert!(m.has_base_color_texture());
        assert_eq!(m.occlusion_texture, None);
    }
}
