use ash::vk;

/// GFX 层的所有错误
///
/// 除了交换链的 out-of-date / suboptimal（由 [`crate::swapchain`] 以返回值表示）之外，
/// 这里的错误都被视为致命错误，直接向上传递，不做重试
#[derive(Debug, thiserror::Error)]
pub enum GfxError {
    #[error("failed to load vulkan entry: {0}")]
    EntryLoad(#[from] ash::LoadingError),

    #[error("no memory type matches type bits {type_bits:#b} with flags {flags:?}")]
    NoSuitableMemoryType {
        type_bits: u32,
        flags: vk::MemoryPropertyFlags,
    },

    #[error("device resource exhausted: {0}")]
    DeviceResourceExhausted(vk::Result),

    #[error("format {0:?} does not support linear filtered blit")]
    UnsupportedBlitFormat(vk::Format),

    #[error("no suitable physical device: {0}")]
    NoSuitableDevice(String),

    #[error("required extension or layer is missing: {0}")]
    MissingExtension(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("vulkan call failed: {0}")]
    Vk(#[from] vk::Result),

    #[error("failed to load shader {path}: {source}")]
    ShaderLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type GfxResult<T> = Result<T, GfxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vk_result_converts() {
        fn fails() -> GfxResult<()> {
            Err::<(), _>(vk::Result::ERROR_DEVICE_LOST)?;
            Ok(())
        }
        assert!(matches!(fails(), Err(GfxError::Vk(vk::Result::ERROR_DEVICE_LOST))));
    }

    #[test]
    fn test_memory_type_message() {
        let err = GfxError::NoSuitableMemoryType {
            type_bits: 0b101,
            flags: vk::MemoryPropertyFlags::HOST_VISIBLE,
        };
        assert!(err.to_string().contains("0b101"));
    }
}
