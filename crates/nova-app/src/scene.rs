// SPDX-License-Identifier: CEPL-1.0
use nova_render_vk::{vk, RecordContext, SecondaryRecorder};

/// Column `worker` of `workers` equal-width columns; the last one takes the remainder.
pub fn column_rect(extent: vk::Extent2D, worker: usize, workers: usize) -> Option<vk::Rect2D> {
    if workers == 0 || worker >= workers || extent.width == 0 || extent.height == 0 {
        return None;
    }
    let width = (extent.width / workers as u32).max(1);
    let x = width * worker as u32;
    if x >= extent.width {
        return None;
    }
    let width = if worker + 1 == workers {
        extent.width - x
    } else {
        width.min(extent.width - x)
    };
    Some(vk::Rect2D {
        offset: vk::Offset2D { x: x as i32, y: 0 },
        extent: vk::Extent2D {
            width,
            height: extent.height,
        },
    })
}

/// Demo scene: each worker thread clears its own vertical column, darkening
/// left to right from the clear color.
#[derive(Clone, Copy, Debug, Default)]
pub struct ColumnScene;

impl SecondaryRecorder for ColumnScene {
    fn record(&self, ctx: &RecordContext<'_>) {
        let Some(rect) = column_rect(ctx.extent, ctx.worker, ctx.workers) else {
            return;
        };
        let shade = 1.0 - 0.15 * ctx.worker as f32;
        let [r, g, b, a] = ctx.clear_color;
        let color = [
            (r * shade).max(0.0),
            (g * shade).max(0.0),
            (b * shade + 0.05).clamp(0.0, 1.0),
            a,
        ];
        ctx.device.cmd_clear_rect(ctx.cmd, rect, color);
    }
}
