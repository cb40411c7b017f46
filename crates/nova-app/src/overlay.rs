// SPDX-License-Identifier: CEPL-1.0
use nova_render_vk::ops::DeviceOps;
use nova_render_vk::{vk, UiInitInfo, UiOverlay};
use tracing::debug;

const BAR_HEIGHT: u32 = 24;
const BAR_COLOR: [f32; 4] = [0.10, 0.12, 0.18, 1.0];

/// Status strip along the top edge, clamped to the surface.
pub fn status_bar_rect(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent: vk::Extent2D {
            width: extent.width,
            height: BAR_HEIGHT.min(extent.height),
        },
    }
}

/// Minimal overlay standing in for an immediate-mode UI: records one clear
/// into the secondary buffer the frame lends it.
#[derive(Default)]
pub struct HudOverlay {
    cmd: Option<vk::CommandBuffer>,
}

impl UiOverlay for HudOverlay {
    fn set_init_info(&mut self, info: &UiInitInfo) {
        debug!(
            "hud: {} images (min {}), render pass {:?}",
            info.image_count, info.min_image_count, info.render_pass
        );
    }

    fn set_command_buffer(&mut self, cmd: Option<vk::CommandBuffer>) {
        self.cmd = cmd;
    }

    fn draw(&mut self, device: &dyn DeviceOps, extent: vk::Extent2D) {
        let Some(cmd) = self.cmd else {
            return;
        };
        let rect = status_bar_rect(extent);
        if rect.extent.width == 0 || rect.extent.height == 0 {
            return;
        }
        device.cmd_clear_rect(cmd, rect, BAR_COLOR);
    }
}
