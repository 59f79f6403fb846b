//! staging buffer 上传协议
//!
//! 所有 device local 的资源（vertex/index buffer、纹理、cubemap 的每一个 face）都通过这里上传：
//! host visible + host coherent 的 staging buffer -> 一次性的 command buffer 执行 copy -> 等待 queue idle。
//! 上传是同步的，函数返回时 staging buffer 已经可以销毁。

use ash::vk;

use crate::{
    basic::color::LabelColor,
    context::GfxContext,
    error::{GfxError, GfxResult},
    resources::buffer::GfxBuffer,
};

/// 创建 staging buffer 并写入 data
pub fn create_staging_buffer<T: bytemuck::Pod>(
    ctx: &GfxContext,
    data: &[T],
    name: impl AsRef<str>,
) -> GfxResult<GfxBuffer> {
    let size = size_of_val(data) as vk::DeviceSize;
    let stage_buffer = GfxBuffer::new_stage_buffer(ctx.allocator(), size, format!("{}-stage", name.as_ref()))?;
    stage_buffer.write_by_mmap(data)?;
    Ok(stage_buffer)
}

/// 将 data 上传到一个新的 device local buffer 中
///
/// buffer 的 usage 为 `dst_usage | TRANSFER_DST`
pub fn upload_to_device<T: bytemuck::Pod>(
    ctx: &GfxContext,
    dst_usage: vk::BufferUsageFlags,
    data: &[T],
    name: impl AsRef<str>,
) -> GfxResult<GfxBuffer> {
    let _span = tracy_client::span!("upload_to_device");
    let name = name.as_ref();
    if data.is_empty() {
        return Err(GfxError::InvalidArgument(format!("upload empty data to {}", name)));
    }

    let size = size_of_val(data) as vk::DeviceSize;
    let stage_buffer = create_staging_buffer(ctx, data, name)?;
    let dst_buffer = GfxBuffer::new(
        ctx.allocator(),
        size,
        dst_usage | vk::BufferUsageFlags::TRANSFER_DST,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
        name,
    )?;

    ctx.one_time_exec(
        |cmd| {
            cmd.begin_label(&format!("upload-{}", name), LabelColor::COLOR_UPLOAD);
            cmd.cmd_copy_buffer(&stage_buffer, &dst_buffer, &[vk::BufferCopy::default().size(size)]);
            cmd.end_label();
        },
        format!("upload-{}", name),
    )?;

    log::debug!("uploaded {} bytes to {}", size, name);
    Ok(dst_buffer)
}

/// 调试用的回读路径：将 device buffer 复制到 host visible buffer 后返回全部字节
///
/// `buffer` 需要带有 TRANSFER_SRC usage
pub fn read_back(ctx: &GfxContext, buffer: &GfxBuffer) -> GfxResult<Vec<u8>> {
    let _span = tracy_client::span!("read_back");
    if buffer.is_mapped() {
        return buffer.read_by_mmap();
    }
    if !buffer.usage().contains(vk::BufferUsageFlags::TRANSFER_SRC) {
        return Err(GfxError::InvalidArgument(format!(
            "buffer {} can not be read back without TRANSFER_SRC usage",
            buffer.debug_name()
        )));
    }

    let readback_buffer = GfxBuffer::new(
        ctx.allocator(),
        buffer.size(),
        vk::BufferUsageFlags::TRANSFER_DST,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        format!("{}-readback", buffer.debug_name()),
    )?;

    ctx.one_time_exec(
        |cmd| {
            cmd.cmd_copy_buffer(buffer, &readback_buffer, &[vk::BufferCopy::default().size(buffer.size())]);
        },
        format!("readback-{}", buffer.debug_name()),
    )?;

    readback_buffer.read_by_mmap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::instance::GfxInstance;

    /// 需要可用的 vulkan 设备
    #[test]
    #[ignore]
    fn test_upload_round_trip() {
        let _client = tracy_client::Client::start();
        let instance = GfxInstance::new("kascade-gfx-test", None, false).unwrap();
        let ctx = GfxContext::new(instance, None).unwrap();

        let data: Vec<u32> = (0..1024).map(|i| i * 7 + 3).collect();
        let buffer = upload_to_device(
            &ctx,
            vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_SRC,
            &data,
            "round-trip",
        )
        .unwrap();

        let bytes = read_back(&ctx, &buffer).unwrap();
        assert_eq!(bytes.as_slice(), bytemuck::cast_slice::<u32, u8>(&data));
    }

    #[test]
    #[ignore]
    fn test_upload_empty_fails() {
        let _client = tracy_client::Client::start();
        let instance = GfxInstance::new("kascade-gfx-test", None, false).unwrap();
        let ctx = GfxContext::new(instance, None).unwrap();

        let data: [u32; 0] = [];
        let result = upload_to_device(&ctx, vk::BufferUsageFlags::INDEX_BUFFER, &data, "empty");
        assert!(matches!(result, Err(GfxError::InvalidArgument(_))));
    }
}
