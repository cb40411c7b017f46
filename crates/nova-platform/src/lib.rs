// SPDX-License-Identifier: CEPL-1.0
pub use winit;

use anyhow::{Context, Result};
use nova_render::{GraphicsApi, RenderSize, RenderWindow};
use winit::dpi::PhysicalSize;
use winit::raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use tracing::info;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowAttributes};

#[derive(Clone, Debug, PartialEq)]
pub struct WindowDesc {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
    pub vsync: bool,
    pub api: GraphicsApi,
}

impl Default for WindowDesc {
    fn default() -> Self {
        Self {
            title: "Nova Engine".to_owned(),
            width: 1280,
            height: 720,
            resizable: true,
            vsync: true,
            api: GraphicsApi::Vulkan,
        }
    }
}

impl WindowDesc {
    pub fn attributes(&self) -> WindowAttributes {
        Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(PhysicalSize::new(self.width.max(1), self.height.max(1)))
            .with_resizable(self.resizable)
    }
}

/// The winit window as seen by the renderers.
pub struct PlatformWindow {
    window: Window,
}

impl PlatformWindow {
    pub fn new(window: Window) -> Self {
        Self { window }
    }

    pub fn create(event_loop: &ActiveEventLoop, desc: &WindowDesc) -> Result<Self> {
        let window = event_loop
            .create_window(desc.attributes())
            .with_context(|| format!("creating window '{}'", desc.title))?;
        let size = window.inner_size();
        info!(
            "window '{}' created at {}x{} (scale {:.2})",
            desc.title,
            size.width,
            size.height,
            window.scale_factor()
        );
        Ok(Self::new(window))
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }
}

impl HasWindowHandle for PlatformWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.window.window_handle()
    }
}

impl HasDisplayHandle for PlatformWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.window.display_handle()
    }
}

impl RenderWindow for PlatformWindow {
    fn pixel_size(&self) -> RenderSize {
        let size = self.window.inner_size();
        RenderSize::new(size.width, size.height)
    }

    fn is_minimized(&self) -> bool {
        // Not every platform can tell; a zero-size surface covers the rest.
        self.window.is_minimized().unwrap_or(false)
    }
}
