//! Vulkan Debug Messenger - routes validation layer messages into the
//! engine logger
//!
//! Registered only when validation is enabled in the renderer config.

use ash::vk;
use meridian_3d_engine::{engine_debug, engine_error, engine_info, engine_warn};
use std::ffi::CStr;

/// Messenger create info used both for the persistent messenger and for
/// instance create/destroy coverage via the pNext chain.
pub(crate) fn messenger_create_info<'a>() -> vk::DebugUtilsMessengerCreateInfoEXT<'a> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(vulkan_debug_callback))
}

/// Vulkan debug messenger callback
///
/// Called by the validation layers; forwards each message to the engine
/// logger at the matching severity.
pub unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    let callback_data = unsafe { *p_callback_data };
    let message_id_name = if callback_data.p_message_id_name.is_null() {
        "Unknown"
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message_id_name) }
            .to_str()
            .unwrap_or("Invalid UTF-8")
    };
    let message = if callback_data.p_message.is_null() {
        "No message"
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message) }
            .to_str()
            .unwrap_or("Invalid UTF-8")
    };

    let type_str = if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    };

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        engine_error!(
            "meridian3d::vulkan::validation",
            "[{}] {}: {}",
            type_str,
            message_id_name,
            message
        );
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        engine_warn!(
            "meridian3d::vulkan::validation",
            "[{}] {}: {}",
            type_str,
            message_id_name,
            message
        );
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        engine_info!(
            "meridian3d::vulkan::validation",
            "[{}] {}: {}",
            type_str,
            message_id_name,
            message
        );
    } else {
        engine_debug!(
            "meridian3d::vulkan::validation",
            "[{}] {}: {}",
            type_str,
            message_id_name,
            message
        );
    }

    // Never abort the Vulkan call that triggered the message
    vk::FALSE
}
