// SPDX-License-Identifier: CEPL-1.0
use ash::ext::debug_utils;
use ash::{vk, Entry, Instance};
use std::ffi::CStr;
use tracing::{error, info, trace, warn};

use crate::error::{check, VkCallError};

pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

pub(crate) fn validation_layer_supported(entry: &Entry) -> bool {
    let layers = match unsafe { entry.enumerate_instance_layer_properties() } {
        Ok(layers) => layers,
        Err(e) => {
            warn!("vkEnumerateInstanceLayerProperties failed: {e:?}");
            return false;
        }
    };

    let found = layers
        .iter()
        .any(|l| l.layer_name_as_c_str() == Ok(VALIDATION_LAYER));
    if found {
        info!("validation layer supported");
    } else {
        warn!(
            "validation layer not found: {}",
            VALIDATION_LAYER.to_string_lossy()
        );
    }
    found
}

/// Maps a validation message severity to the tracing level it is logged at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MessageLevel {
    Error,
    Warn,
    Info,
    Trace,
}

pub(crate) fn message_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> MessageLevel {
    use vk::DebugUtilsMessageSeverityFlagsEXT as S;
    if severity.contains(S::ERROR) {
        MessageLevel::Error
    } else if severity.contains(S::WARNING) {
        MessageLevel::Warn
    } else if severity.contains(S::INFO) {
        MessageLevel::Info
    } else {
        MessageLevel::Trace
    }
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if data.is_null() || (*data).p_message.is_null() {
        return vk::FALSE;
    }
    let msg = CStr::from_ptr((*data).p_message).to_string_lossy();
    match message_level(severity) {
        MessageLevel::Error => error!("[vulkan] {msg}"),
        MessageLevel::Warn => warn!("[vulkan] {msg}"),
        MessageLevel::Info => info!("[vulkan] {msg}"),
        MessageLevel::Trace => trace!("[vulkan] {msg}"),
    }
    // never abort the call that triggered the message
    vk::FALSE
}

/// Also chained into instance creation so create/destroy are covered.
pub(crate) fn messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT {
        s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
        message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
            | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
            | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        pfn_user_callback: Some(debug_callback),
        ..Default::default()
    }
}

pub(crate) struct DebugMessenger {
    loader: debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    pub(crate) fn new(entry: &Entry, instance: &Instance) -> Result<Self, VkCallError> {
        let loader = debug_utils::Instance::new(entry, instance);
        let ci = messenger_create_info();
        let messenger = check("vkCreateDebugUtilsMessengerEXT", unsafe {
            loader.create_debug_utils_messenger(&ci, None)
        })?;
        Ok(Self { loader, messenger })
    }

    /// Must run before the instance is destroyed.
    pub(crate) unsafe fn destroy(&self) {
        self.loader
            .destroy_debug_utils_messenger(self.messenger, None);
    }
}
