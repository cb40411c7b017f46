// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Backend picked once at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphicsApi {
    OpenGl,
    Vulkan,
}

impl fmt::Display for GraphicsApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphicsApi::OpenGl => f.write_str("gl"),
            GraphicsApi::Vulkan => f.write_str("vk"),
        }
    }
}

/// What a backend needs from the window it draws into.
///
/// The display handle also decides which instance extensions a surface needs.
pub trait RenderWindow: HasWindowHandle + HasDisplayHandle + Send + Sync {
    /// Drawable size in physical pixels, queried fresh every call.
    fn pixel_size(&self) -> RenderSize;
    fn is_minimized(&self) -> bool;

    fn state(&self) -> WindowState {
        WindowState {
            size: self.pixel_size(),
            minimized: self.is_minimized(),
        }
    }
}

/// Snapshot of the window taken at the top of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowState {
    pub size: RenderSize,
    pub minimized: bool,
}

impl WindowState {
    /// Zero-sized windows are treated like minimized ones.
    pub fn should_skip(&self) -> bool {
        self.minimized || self.size.is_empty()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RendererDesc {
    pub size: RenderSize,
    pub vsync: bool,
    pub clear_color: [f32; 4],
    /// Enables API debug layers where the backend has them.
    pub validation: bool,
    /// Secondary recording slots per frame; the last one belongs to the UI overlay.
    pub secondary_slots: usize,
}

impl Default for RendererDesc {
    fn default() -> Self {
        Self {
            size: RenderSize::new(1280, 720),
            vsync: true,
            clear_color: [0.02, 0.02, 0.04, 1.0],
            validation: cfg!(debug_assertions),
            secondary_slots: 4,
        }
    }
}

pub trait Renderer {
    fn new(window: Arc<dyn RenderWindow>, desc: &RendererDesc) -> Result<Self>
    where
        Self: Sized;

    fn resize(&mut self, size: RenderSize) -> Result<()>;
    fn update(&mut self, _dt: f32) {}

    fn begin_frame(&mut self) -> Result<()>;
    fn render(&mut self) -> Result<()>;
    /// Overlay recording point between `render` and `end_frame`.
    fn draw_ui(&mut self) {}
    fn end_frame(&mut self) -> Result<()>;

    /// True between a successful `begin_frame` and the matching `end_frame`.
    fn frame_active(&self) -> bool;

    fn set_clear_color(&mut self, rgba: [f32; 4]);
    fn set_vsync(&mut self, _on: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_dimension_is_empty() {
        assert!(RenderSize::new(0, 720).is_empty());
        assert!(RenderSize::new(1280, 0).is_empty());
        assert!(!RenderSize::new(1, 1).is_empty());
    }

    #[test]
    fn minimized_or_empty_windows_skip() {
        let visible = WindowState {
            size: RenderSize::new(800, 600),
            minimized: false,
        };
        assert!(!visible.should_skip());
        assert!(WindowState { minimized: true, ..visible }.should_skip());
        assert!(WindowState {
            size: RenderSize::new(800, 0),
            ..visible
        }
        .should_skip());
    }

    #[test]
    fn api_names_match_cli_values() {
        assert_eq!(GraphicsApi::OpenGl.to_string(), "gl");
        assert_eq!(GraphicsApi::Vulkan.to_string(), "vk");
    }
}
