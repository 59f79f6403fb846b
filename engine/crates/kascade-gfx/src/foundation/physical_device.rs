use std::ffi::CStr;

use ash::vk;
use itertools::Itertools;

use crate::{
    error::{GfxError, GfxResult},
    foundation::{debug_messenger::DebugType, instance::GfxInstance},
    swapchain::surface::GfxSurface,
};

#[derive(Clone, Debug)]
pub struct GfxQueueFamily {
    pub name: String,
    pub queue_family_index: u32,
    pub queue_flags: vk::QueueFlags,
    pub queue_count: u32,
}

/// 表示一张物理显卡
pub struct GfxPhysicalDevice {
    pub(crate) vk_handle: vk::PhysicalDevice,

    /// 当前 gpu 的基础属性
    pub(crate) basic_props: vk::PhysicalDeviceProperties,

    pub(crate) mem_props: vk::PhysicalDeviceMemoryProperties,

    /// 同时支持 graphics 以及 present 的 queue family
    pub(crate) gfx_queue_family: GfxQueueFamily,
}

impl GfxPhysicalDevice {
    /// 选择一张可以渲染到 surface 的显卡
    ///
    /// 优先选择独立显卡，如果没有则选择第一个可用的显卡。
    /// 可用的条件：支持 swapchain extension、sampler anisotropy、synchronization2，
    /// 并且存在同时支持 GRAPHICS 和 present 的 queue family（`surface` 为 `None` 时不检查 present）
    pub fn select(instance: &GfxInstance, surface: Option<&GfxSurface>) -> GfxResult<Self> {
        let _span = tracy_client::span!("GfxPhysicalDevice::select");

        let pdevices = unsafe { instance.ash_instance.enumerate_physical_devices()? };
        pdevices
            .into_iter()
            .filter_map(|pdevice| match Self::new(pdevice, instance, surface) {
                Ok(candidate) => candidate,
                Err(e) => {
                    log::warn!("failed to query physical device {:?}: {}", pdevice, e);
                    None
                }
            })
            .collect_vec()
            .into_iter()
            // 优先使用独立显卡
            .find_or_first(GfxPhysicalDevice::is_discrete_gpu)
            .ok_or_else(|| GfxError::NoSuitableDevice("no gpu supports graphics + present + swapchain".to_string()))
    }

    /// # return
    /// 不满足要求时返回 `Ok(None)`
    fn new(
        pdevice: vk::PhysicalDevice,
        instance: &GfxInstance,
        surface: Option<&GfxSurface>,
    ) -> GfxResult<Option<Self>> {
        let ash_instance = &instance.ash_instance;
        unsafe {
            let basic_props = ash_instance.get_physical_device_properties(pdevice);
            let physical_device_name = CStr::from_ptr(basic_props.device_name.as_ptr());
            log::info!("found gpu: {:?}, type: {:?}", physical_device_name, basic_props.device_type);

            // swapchain extension
            let device_extensions = ash_instance.enumerate_device_extension_properties(pdevice)?;
            let swapchain_supported = device_extensions
                .iter()
                .any(|ext| CStr::from_ptr(ext.extension_name.as_ptr()) == ash::khr::swapchain::NAME);
            if !swapchain_supported {
                log::info!("skip gpu {:?}: swapchain extension is not supported", physical_device_name);
                return Ok(None);
            }

            // features
            let mut sync2_features = vk::PhysicalDeviceSynchronization2Features::default();
            let mut features2 = vk::PhysicalDeviceFeatures2::default().push_next(&mut sync2_features);
            ash_instance.get_physical_device_features2(pdevice, &mut features2);
            let basic_features = features2.features;
            if basic_features.sampler_anisotropy != vk::TRUE || sync2_features.synchronization2 != vk::TRUE {
                log::info!("skip gpu {:?}: sampler anisotropy or synchronization2 is missing", physical_device_name);
                return Ok(None);
            }

            // 找到所有的队列信息
            let queue_family_props = ash_instance.get_physical_device_queue_family_properties(pdevice);
            log::debug!("physical device: queue family props:\n{:#?}", queue_family_props);

            let Some(family_index) = select_queue_family(&queue_family_props, |family_index| {
                surface.is_none_or(|surface| surface.supports_present(pdevice, family_index).unwrap_or(false))
            }) else {
                log::info!("skip gpu {:?}: no graphics queue can present to the surface", physical_device_name);
                return Ok(None);
            };
            let family_props = queue_family_props[family_index as usize];

            Ok(Some(Self {
                vk_handle: pdevice,
                basic_props,
                mem_props: ash_instance.get_physical_device_memory_properties(pdevice),
                gfx_queue_family: GfxQueueFamily {
                    name: "gfx".to_string(),
                    queue_family_index: family_index,
                    queue_flags: family_props.queue_flags,
                    queue_count: family_props.queue_count,
                },
            }))
        }
    }
}

// getters
impl GfxPhysicalDevice {
    #[inline]
    pub fn vk_handle(&self) -> vk::PhysicalDevice {
        self.vk_handle
    }

    #[inline]
    pub fn mem_props(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.mem_props
    }

    #[inline]
    pub fn limits(&self) -> &vk::PhysicalDeviceLimits {
        &self.basic_props.limits
    }

    #[inline]
    pub fn gfx_queue_family(&self) -> &GfxQueueFamily {
        &self.gfx_queue_family
    }

    #[inline]
    /// 当前 gpu 是否是独立显卡
    pub fn is_discrete_gpu(&self) -> bool {
        self.basic_props.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
    }
}

impl DebugType for GfxPhysicalDevice {
    fn debug_type_name() -> &'static str {
        "GfxPhysicalDevice"
    }

    fn vk_handle(&self) -> impl vk::Handle {
        self.vk_handle
    }
}

/// 第一个支持 GRAPHICS 且可以 present 的 queue family
pub fn select_queue_family(
    queue_family_props: &[vk::QueueFamilyProperties],
    mut can_present: impl FnMut(u32) -> bool,
) -> Option<u32> {
    queue_family_props
        .iter()
        .enumerate()
        .filter(|(_, props)| props.queue_flags.contains(vk::QueueFlags::GRAPHICS) && props.queue_count > 0)
        .map(|(family_idx, _)| family_idx as u32)
        .find(|family_idx| can_present(*family_idx))
}

/// 找到第一个满足 `type_bits` 约束，并且包含 `required_flags` 的 memory type
///
/// 没有满足条件的 memory type 时返回 [`GfxError::NoSuitableMemoryType`]，调用方应当放弃资源创建
pub fn find_memory_type(
    mem_props: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required_flags: vk::MemoryPropertyFlags,
) -> GfxResult<u32> {
    let type_count = (mem_props.memory_type_count as usize).min(vk::MAX_MEMORY_TYPES);
    mem_props.memory_types[..type_count]
        .iter()
        .enumerate()
        .find(|(idx, memory_type)| type_bits & (1u32 << idx) != 0 && memory_type.property_flags.contains(required_flags))
        .map(|(idx, _)| idx as u32)
        .ok_or(GfxError::NoSuitableMemoryType {
            type_bits,
            flags: required_flags,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_props(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (idx, flags) in types.iter().enumerate() {
            props.memory_types[idx] = vk::MemoryType {
                property_flags: *flags,
                heap_index: 0,
            };
        }
        props
    }

    #[test]
    fn test_find_memory_type_first_match() {
        let props = mem_props(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::HOST_VISIBLE
                | vk::MemoryPropertyFlags::HOST_COHERENT
                | vk::MemoryPropertyFlags::HOST_CACHED,
        ]);

        let idx = find_memory_type(
            &props,
            0b111,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .unwrap();
        assert_eq!(idx, 1);

        let idx = find_memory_type(&props, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap();
        assert_eq!(idx, 0);
    }

    #[test]
    fn test_find_memory_type_respects_type_bits() {
        let props = mem_props(&[
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
        ]);

        // 只允许第 1 个
        let idx = find_memory_type(&props, 0b10, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap();
        assert_eq!(idx, 1);
    }

    #[test]
    fn test_find_memory_type_none() {
        let props = mem_props(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);

        let result = find_memory_type(&props, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE);
        assert!(matches!(result, Err(GfxError::NoSuitableMemoryType { type_bits: 0b1, .. })));

        // type bits 为空时永远无法满足
        let result = find_memory_type(&props, 0, vk::MemoryPropertyFlags::empty());
        assert!(result.is_err());
    }

    #[test]
    fn test_select_queue_family() {
        let families = [
            vk::QueueFamilyProperties {
                queue_flags: vk::QueueFlags::TRANSFER,
                queue_count: 1,
                ..Default::default()
            },
            vk::QueueFamilyProperties {
                queue_flags: vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE,
                queue_count: 1,
                ..Default::default()
            },
            vk::QueueFamilyProperties {
                queue_flags: vk::QueueFlags::GRAPHICS,
                queue_count: 1,
                ..Default::default()
            },
        ];

        assert_eq!(select_queue_family(&families, |_| true), Some(1));
        // family 1 不能 present
        assert_eq!(select_queue_family(&families, |idx| idx != 1), Some(2));
        assert_eq!(select_queue_family(&families, |_| false), None);
    }
}
