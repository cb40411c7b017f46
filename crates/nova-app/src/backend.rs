// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use nova_render::{GraphicsApi, RenderWindow, Renderer, RendererDesc};
use nova_render_gl::GlRenderer;
use nova_render_vk::VkRenderer;
use std::sync::Arc;
use tracing::info;

use crate::overlay::HudOverlay;
use crate::scene::ColumnScene;

/// The renderer picked once at startup.
pub enum Backend {
    Gl(Box<GlRenderer>),
    Vk(Box<VkRenderer>),
}

impl Backend {
    pub fn create(
        api: GraphicsApi,
        window: Arc<dyn RenderWindow>,
        desc: &RendererDesc,
    ) -> Result<Self> {
        let backend = match api {
            GraphicsApi::OpenGl => {
                Backend::Gl(Box::new(GlRenderer::new(window, desc).context("GL init")?))
            }
            GraphicsApi::Vulkan => {
                let mut vk = VkRenderer::new(window, desc).context("Vulkan init")?;
                vk.set_overlay(Box::new(HudOverlay::default()))?;
                vk.set_scene_recorder(Arc::new(ColumnScene));
                Backend::Vk(Box::new(vk))
            }
        };
        info!("backend = {api}");
        Ok(backend)
    }

    pub fn api(&self) -> GraphicsApi {
        match self {
            Backend::Gl(_) => GraphicsApi::OpenGl,
            Backend::Vk(_) => GraphicsApi::Vulkan,
        }
    }

    pub fn renderer(&mut self) -> &mut dyn Renderer {
        match self {
            Backend::Gl(r) => r.as_mut(),
            Backend::Vk(r) => r.as_mut(),
        }
    }
}
