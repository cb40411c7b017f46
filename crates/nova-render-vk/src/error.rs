// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use raw_window_handle::HandleError;
use thiserror::Error;
use tracing::error;

/// A rejected Vulkan call, tagged with the entry point that failed.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("{call} failed: {result}")]
pub struct VkCallError {
    pub call: &'static str,
    pub result: vk::Result,
}

pub(crate) fn fail(call: &'static str, result: vk::Result) -> VkCallError {
    error!("{call} failed: {result:?}");
    VkCallError { call, result }
}

/// Logs a failed call and converts it into a typed error.
pub(crate) fn check<T>(call: &'static str, result: Result<T, vk::Result>) -> Result<T, VkCallError> {
    result.map_err(|result| fail(call, result))
}

/// Bring-up failures of the instance/surface/device chain.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("native window handle unavailable: {0}")]
    Handle(#[from] HandleError),
    #[error(transparent)]
    Vk(#[from] VkCallError),
    #[error("no suitable GPU found ({0})")]
    NoSuitableAdapter(String),
    #[error("logical device requested before an adapter was selected")]
    NoAdapter,
}

#[derive(Debug, Error)]
pub enum SwapchainError {
    /// The window has a zero-sized drawable area; retry once it is restored.
    #[error("window is minimized")]
    Minimized,
    #[error("surface reports no formats or present modes")]
    NoSurfaceSupport,
    #[error("presentation engine returned no images")]
    NoImages,
    #[error(transparent)]
    Vk(#[from] VkCallError),
}

impl SwapchainError {
    /// Conditions the frame loop skips over instead of reporting.
    pub fn is_transient(&self) -> bool {
        matches!(self, SwapchainError::Minimized)
    }
}
