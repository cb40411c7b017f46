// SPDX-License-Identifier: CEPL-1.0
use ash::khr::swapchain;
use ash::vk;
use std::ffi::CStr;
use tracing::debug;

/// Device extensions the renderer cannot run without.
pub fn required_device_extensions() -> Vec<&'static CStr> {
    vec![swapchain::NAME]
}

pub(crate) fn extension_names(props: &[vk::ExtensionProperties]) -> Vec<String> {
    props
        .iter()
        .filter_map(|p| p.extension_name_as_c_str().ok())
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
}

pub fn has_extensions(available: &[String], required: &[&CStr]) -> bool {
    required.iter().all(|req| {
        let req = req.to_string_lossy();
        available.iter().any(|a| *a == req)
    })
}

pub(crate) fn requires_swapchain(required: &[&CStr]) -> bool {
    required.contains(&swapchain::NAME)
}

pub(crate) fn log_device_extensions(props: &[vk::ExtensionProperties]) {
    debug!("device supports {} extensions:", props.len());
    for p in props {
        if let Ok(name) = p.extension_name_as_c_str() {
            debug!("  - {} (spec {})", name.to_string_lossy(), p.spec_version);
        }
    }
}
