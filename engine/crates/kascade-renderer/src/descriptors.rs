use std::rc::Rc;

use ash::vk;
use itertools::Itertools;
use kascade_gfx::{
    descriptors::{
        descriptor::{GfxDescriptorSetLayout, count_pool_sizes},
        descriptor_pool::GfxDescriptorPool,
    },
    foundation::{allocator::GfxAllocator, device::GfxDevice},
    resources::buffer::GfxBuffer,
    texture::GfxTexture,
};
use kascade_scene::model::GltfModel;

use crate::{
    error::{RendererError, RendererResult},
    uniforms::FrameUniforms,
};

/// set 0：每帧的 uniform buffer
pub fn frame_set_bindings() -> Vec<vk::DescriptorSetLayoutBinding<'static>> {
    vec![
        vk::DescriptorSetLayoutBinding::default()
            .binding(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT),
    ]
}

/// set 1：transform 与 material 的 storage buffer
pub fn scene_set_bindings() -> Vec<vk::DescriptorSetLayoutBinding<'static>> {
    vec![
        vk::DescriptorSetLayoutBinding::default()
            .binding(0)
            .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::VERTEX),
        vk::DescriptorSetLayoutBinding::default()
            .binding(1)
            .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::FRAGMENT),
    ]
}

/// set 2：模型的所有纹理
pub fn texture_set_bindings(max_textures: u32) -> Vec<vk::DescriptorSetLayoutBinding<'static>> {
    vec![
        vk::DescriptorSetLayoutBinding::default()
            .binding(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(max_textures)
            .stage_flags(vk::ShaderStageFlags::FRAGMENT),
    ]
}

/// set 3：环境 cubemap
pub fn environment_set_bindings() -> Vec<vk::DescriptorSetLayoutBinding<'static>> {
    vec![
        vk::DescriptorSetLayoutBinding::default()
            .binding(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1)
            .stage_flags(vk::ShaderStageFlags::FRAGMENT),
    ]
}

/// 按 texture 数组的位置给出 image info，缺失的纹理使用 fallback
pub fn texture_array_infos(
    textures: &[Option<vk::DescriptorImageInfo>],
    fallback: vk::DescriptorImageInfo,
    max_textures: u32,
) -> RendererResult<Vec<vk::DescriptorImageInfo>> {
    if textures.len() > max_textures as usize {
        return Err(RendererError::TooManyTextures {
            count: textures.len(),
            max: max_textures as usize,
        });
    }

    Ok((0..max_textures as usize)
        .map(|idx| textures.get(idx).copied().flatten().unwrap_or(fallback))
        .collect())
}

/// 4 个 descriptor set layout 以及每帧一份的 descriptor set
pub struct SceneDescriptors {
    /// 按 frame slot 索引，每个元素是 set 0..=3
    sets: Vec<[vk::DescriptorSet; 4]>,
    uniform_buffers: Vec<GfxBuffer>,

    // pool 先于 layout 销毁
    _pool: GfxDescriptorPool,
    layouts: [GfxDescriptorSetLayout; 4],
}

// new & init
impl SceneDescriptors {
    pub fn new(
        device: &Rc<GfxDevice>,
        allocator: &Rc<GfxAllocator>,
        model: &GltfModel,
        environment: &GfxTexture,
        fallback: &GfxTexture,
        frames_in_flight: usize,
        max_textures: u32,
    ) -> RendererResult<Self> {
        let _span = tracy_client::span!("SceneDescriptors::new");

        let texture_infos = model.textures().iter().map(|t| t.as_ref().map(GfxTexture::descriptor_info)).collect_vec();
        let texture_infos = texture_array_infos(&texture_infos, fallback.descriptor_info(), max_textures)?;

        let layouts = [
            GfxDescriptorSetLayout::new(device.clone(), frame_set_bindings(), "frame-set-layout")?,
            GfxDescriptorSetLayout::new(device.clone(), scene_set_bindings(), "scene-set-layout")?,
            GfxDescriptorSetLayout::new(device.clone(), texture_set_bindings(max_textures), "texture-set-layout")?,
            GfxDescriptorSetLayout::new(device.clone(), environment_set_bindings(), "environment-set-layout")?,
        ];

        let frame_cnt = frames_in_flight as u32;
        let pool_sizes = count_pool_sizes(layouts.iter().flat_map(|l| l.bindings()), frame_cnt);
        let pool = GfxDescriptorPool::new(device.clone(), 4 * frame_cnt, &pool_sizes, "scene-descriptor-pool")?;

        let uniform_buffers = (0..frames_in_flight)
            .map(|idx| {
                GfxBuffer::new(
                    allocator,
                    size_of::<FrameUniforms>() as vk::DeviceSize,
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                    vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
                    format!("frame-uniform-{}", idx),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let layout_refs = layouts.each_ref();
        let sets = uniform_buffers
            .iter()
            .enumerate()
            .map(|(idx, ubo)| -> RendererResult<[vk::DescriptorSet; 4]> {
                let sets = pool.allocate(&layout_refs, &format!("scene-set-{}", idx))?;
                let sets: [vk::DescriptorSet; 4] = [sets[0], sets[1], sets[2], sets[3]];
                Self::write_sets(&pool, &sets, ubo, model, &texture_infos, environment);
                Ok(sets)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            sets,
            uniform_buffers,
            _pool: pool,
            layouts,
        })
    }

    fn write_sets(
        pool: &GfxDescriptorPool,
        sets: &[vk::DescriptorSet; 4],
        ubo: &GfxBuffer,
        model: &GltfModel,
        texture_infos: &[vk::DescriptorImageInfo],
        environment: &GfxTexture,
    ) {
        let whole = |buffer: &GfxBuffer| {
            [vk::DescriptorBufferInfo::default().buffer(buffer.vk_buffer()).offset(0).range(vk::WHOLE_SIZE)]
        };
        let ubo_info = whole(ubo);
        let transform_info = whole(model.transform_buffer());
        let material_info = whole(model.material_buffer());
        let env_info = [environment.descriptor_info()];

        let writes = [
            vk::WriteDescriptorSet::default()
                .dst_set(sets[0])
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(&ubo_info),
            vk::WriteDescriptorSet::default()
                .dst_set(sets[1])
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                .buffer_info(&transform_info),
            vk::WriteDescriptorSet::default()
                .dst_set(sets[1])
                .dst_binding(1)
                .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                .buffer_info(&material_info),
            vk::WriteDescriptorSet::default()
                .dst_set(sets[2])
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(texture_infos),
            vk::WriteDescriptorSet::default()
                .dst_set(sets[3])
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(&env_info),
        ];
        pool.write(&writes);
    }
}

// getters
impl SceneDescriptors {
    #[inline]
    pub fn sets(&self, slot: usize) -> &[vk::DescriptorSet; 4] {
        &self.sets[slot]
    }

    pub fn layout_handles(&self) -> [vk::DescriptorSetLayout; 4] {
        self.layouts.each_ref().map(GfxDescriptorSetLayout::handle)
    }
}

// update
impl SceneDescriptors {
    pub fn update_uniforms(&self, slot: usize, uniforms: &FrameUniforms) -> RendererResult<()> {
        self.uniform_buffers[slot].write_by_mmap(std::slice::from_ref(uniforms))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_bindings() {
        let frame = frame_set_bindings();
        assert_eq!(frame[0].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert!(frame[0].stage_flags.contains(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT));

        let scene = scene_set_bindings();
        assert_eq!(scene.len(), 2);
        assert_eq!(scene[0].stage_flags, vk::ShaderStageFlags::VERTEX);
        assert_eq!(scene[1].binding, 1);
        assert_eq!(scene[1].stage_flags, vk::ShaderStageFlags::FRAGMENT);

        assert_eq!(texture_set_bindings(32)[0].descriptor_count, 32);
        assert_eq!(environment_set_bindings()[0].descriptor_type, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
    }

    #[test]
    fn test_pool_sizes_for_two_frames() {
        let bindings = [frame_set_bindings(), scene_set_bindings(), texture_set_bindings(32), environment_set_bindings()];
        let sizes = count_pool_sizes(bindings.iter().flatten(), 2);

        let count_of = |ty| sizes.iter().find(|s| s.ty == ty).map(|s| s.descriptor_count);
        assert_eq!(count_of(vk::DescriptorType::UNIFORM_BUFFER), Some(2));
        assert_eq!(count_of(vk::DescriptorType::STORAGE_BUFFER), Some(4));
        assert_eq!(count_of(vk::DescriptorType::COMBINED_IMAGE_SAMPLER), Some(66));
    }

    #[test]
    fn test_texture_array_fallback() {
        use ash::vk::Handle;

        let info = |raw: u64| vk::DescriptorImageInfo {
            sampler: vk::Sampler::from_raw(raw),
            ..Default::default()
        };
        let fallback = info(99);

        let infos = texture_array_infos(&[Some(info(1)), None, Some(info(3))], fallback, 4).unwrap();
        assert_eq!(infos.len(), 4);
        assert_eq!(infos[0].sampler.as_raw(), 1);
        assert_eq!(infos[1].sampler.as_raw(), 99);
        assert_eq!(infos[2].sampler.as_raw(), 3);
        assert_eq!(infos[3].sampler.as_raw(), 99);
    }

    #[test]
    fn test_too_many_textures() {
        let textures = vec![None; 33];
        let result = texture_array_infos(&textures, vk::DescriptorImageInfo::default(), 32);
        assert!(matches!(result, Err(RendererError::TooManyTextures { count: 33, max: 32 })));
    }
}
