// SPDX-License-Identifier: CEPL-1.0
//! Vulkan backend: device bring-up, the swapchain and a triple-buffered frame
//! loop recording secondary command buffers in parallel.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use nova_render::{RenderSize, RenderWindow, Renderer, RendererDesc};

pub mod commands;
pub mod debug;
pub mod device;
pub mod error;
pub mod extensions;
pub mod frame;
pub mod ops;
pub mod swapchain;
pub mod sync;

#[cfg(test)]
mod fake;

pub use ash::vk;
pub use device::GraphicsDevice;
pub use error::{DeviceError, SwapchainError, VkCallError};
pub use frame::{
    BandRecorder, FrameDesc, FrameOrchestrator, FramePhase, RecordContext, SecondaryRecorder,
    UiInitInfo, UiOverlay,
};
pub use ops::DeviceOps;
pub use sync::FRAMES_IN_FLIGHT;

pub struct VkRenderer {
    // owns the device; its Drop releases frame objects before the device field drops
    frames: FrameOrchestrator<GraphicsDevice>,
    window: Arc<dyn RenderWindow>,
}

impl VkRenderer {
    /// Installs the UI overlay; it receives fresh init info after every recreation.
    pub fn set_overlay(&mut self, overlay: Box<dyn UiOverlay>) -> Result<()> {
        self.frames
            .set_overlay(overlay)
            .context("installing UI overlay")
    }

    pub fn set_scene_recorder(&mut self, recorder: Arc<dyn SecondaryRecorder>) {
        self.frames.set_scene_recorder(recorder);
    }
}

impl Renderer for VkRenderer {
    fn new(window: Arc<dyn RenderWindow>, desc: &RendererDesc) -> Result<Self> {
        let device = GraphicsDevice::new(&*window, desc.validation)
            .context("Vulkan device bring-up")?;

        let size = window.pixel_size();
        let frames = FrameOrchestrator::new(
            device,
            &FrameDesc {
                extent: vk::Extent2D {
                    width: size.width,
                    height: size.height,
                },
                vsync: desc.vsync,
                secondary_slots: desc.secondary_slots,
                clear_color: desc.clear_color,
            },
        )
        .context("swapchain creation")?;

        let sc = frames.swapchain();
        info!(
            "Vulkan renderer ready ({}x{}, {} images, {} frames in flight, {} worker slots)",
            sc.extent().width,
            sc.extent().height,
            sc.image_count(),
            FRAMES_IN_FLIGHT,
            sc.current_commands().worker_count()
        );
        Ok(Self { frames, window })
    }

    fn resize(&mut self, size: RenderSize) -> Result<()> {
        self.frames.resize(size);
        Ok(())
    }

    fn begin_frame(&mut self) -> Result<()> {
        self.frames
            .begin_frame(self.window.state())
            .context("begin_frame")
    }

    fn render(&mut self) -> Result<()> {
        self.frames.render().context("render")
    }

    fn draw_ui(&mut self) {
        self.frames.draw_ui();
    }

    fn end_frame(&mut self) -> Result<()> {
        self.frames.end_frame().context("end_frame")
    }

    fn frame_active(&self) -> bool {
        self.frames.frame_active()
    }

    fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.frames.set_clear_color(rgba);
    }

    fn set_vsync(&mut self, on: bool) {
        self.frames.set_vsync(on);
    }
}
