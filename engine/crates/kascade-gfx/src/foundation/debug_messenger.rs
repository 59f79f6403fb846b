use std::{ffi::CStr, rc::Rc};

use ash::vk;

use crate::{error::GfxResult, foundation::instance::GfxInstance};

/// validation layer 的消息回调，只有开启 validation 时才会创建
pub struct GfxDebugMsger {
    loader: ash::ext::debug_utils::Instance,
    handle: vk::DebugUtilsMessengerEXT,

    _instance: Rc<GfxInstance>,
}

impl GfxDebugMsger {
    pub fn new(instance: &Rc<GfxInstance>) -> GfxResult<Self> {
        let loader = ash::ext::debug_utils::Instance::new(&instance.vk_entry, &instance.ash_instance);

        let create_info = Self::debug_utils_messenger_ci();
        let handle = unsafe { loader.create_debug_utils_messenger(&create_info, None)? };

        Ok(Self {
            loader,
            handle,
            _instance: instance.clone(),
        })
    }
}

impl Drop for GfxDebugMsger {
    fn drop(&mut self) {
        log::info!("destroying debug messenger");
        unsafe {
            self.loader.destroy_debug_utils_messenger(self.handle, None);
        }
    }
}

/// validation layer 的消息是 json，其中 `MainMessage` 字段带有换行符，需要单独输出
///
/// # return
/// (除去 MainMessage 之后的 json，MainMessage)；不是 json 时原样返回
fn split_main_message(msg: &str) -> (String, String) {
    let mut json_value = serde_json::from_str::<serde_json::Value>(msg);
    let Some(json_obj) = json_value.as_mut().ok().and_then(|v| v.as_object_mut()) else {
        return (msg.to_string(), String::new());
    };

    let main_msg = json_obj
        .remove("MainMessage")
        .and_then(|value| value.as_str().map(str::to_string))
        .unwrap_or_default();
    let rest = serde_json::to_string_pretty(&json_obj).unwrap_or_else(|_| msg.to_string());

    (rest, main_msg)
}

/// debug messenger 的回调函数
/// # Safety
unsafe extern "system" fn vk_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    let callback_data = unsafe { *p_callback_data };

    let msg = if callback_data.p_message.is_null() {
        std::borrow::Cow::from("")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };

    let (total_msg, main_msg) = split_main_message(msg.as_ref());
    let format_msg = format!("[{:?}]\n{}\n{}\n", message_type, total_msg, main_msg);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::error!("{}", format_msg),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::warn!("{}", format_msg),
        _ => log::info!("{}", format_msg),
    };

    // 只有 layer developer 才需要返回 True
    vk::FALSE
}

// 构造过程辅助函数
impl GfxDebugMsger {
    /// 同时用于 instance 创建时的 p_next 以及独立的 messenger
    pub fn debug_utils_messenger_ci() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
        vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(vk_debug_callback))
    }
}

/// 可以设置 debug name 的 vulkan 对象
pub trait DebugType {
    fn debug_type_name() -> &'static str;
    fn vk_handle(&self) -> impl vk::Handle;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_main_message_from_json() {
        let (rest, main) = split_main_message(r#"{"MainMessage":"line1\nline2","MessageID":42}"#);
        assert_eq!(main, "line1\nline2");
        assert!(rest.contains("MessageID"));
        assert!(!rest.contains("MainMessage"));
    }

    #[test]
    fn test_split_main_message_plain_text() {
        let (rest, main) = split_main_message("Validation Error: something");
        assert_eq!(rest, "Validation Error: something");
        assert!(main.is_empty());
    }
}
