// SPDX-License-Identifier: CEPL-1.0
use clap::ValueEnum;
use nova_platform::WindowDesc;
use nova_render::{GraphicsApi, RenderSize, RendererDesc};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info, warn};

/// Backend names as written on the command line and in `nova.toml`.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ApiChoice {
    Gl,
    #[default]
    Vk,
}

impl From<ApiChoice> for GraphicsApi {
    fn from(api: ApiChoice) -> Self {
        match api {
            ApiChoice::Gl => GraphicsApi::OpenGl,
            ApiChoice::Vk => GraphicsApi::Vulkan,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
    pub vsync: bool,
    pub api: ApiChoice,
}

impl Default for WindowCfg {
    fn default() -> Self {
        let desc = WindowDesc::default();
        Self {
            title: desc.title,
            width: desc.width,
            height: desc.height,
            resizable: desc.resizable,
            vsync: desc.vsync,
            api: ApiChoice::Vk,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderCfg {
    pub clear_color: [f32; 4],
    /// Includes the UI overlay's slot.
    pub secondary_slots: usize,
    pub validation: bool,
}

impl Default for RenderCfg {
    fn default() -> Self {
        let desc = RendererDesc::default();
        Self {
            clear_color: desc.clear_color,
            secondary_slots: desc.secondary_slots,
            validation: desc.validation,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppCfg {
    pub window: WindowCfg,
    pub render: RenderCfg,
}

impl AppCfg {
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// A missing file yields defaults; an unreadable or malformed one is
    /// reported and also yields defaults.
    pub fn load(path: &Path) -> Self {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no config at {}, using defaults", path.display());
                return Self::default();
            }
            Err(e) => {
                warn!("cannot read {}: {e}; using defaults", path.display());
                return Self::default();
            }
        };

        match Self::parse(&text) {
            Ok(cfg) => {
                info!("config loaded from {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("malformed {}: {e}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Command-line values win over the file.
    pub fn apply_overrides(&mut self, api: Option<ApiChoice>, validation: bool) {
        if let Some(api) = api {
            self.window.api = api;
        }
        if validation {
            self.render.validation = true;
        }
    }

    pub fn api(&self) -> GraphicsApi {
        self.window.api.into()
    }

    pub fn window_desc(&self) -> WindowDesc {
        WindowDesc {
            title: self.window.title.clone(),
            width: self.window.width,
            height: self.window.height,
            resizable: self.window.resizable,
            vsync: self.window.vsync,
            api: self.api(),
        }
    }

    pub fn renderer_desc(&self, size: RenderSize) -> RendererDesc {
        RendererDesc {
            size,
            vsync: self.window.vsync,
            clear_color: self.render.clear_color,
            validation: self.render.validation,
            secondary_slots: self.render.secondary_slots,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = AppCfg::parse("").unwrap();
        assert_eq!(cfg, AppCfg::default());
        assert_eq!(cfg.window.title, "Nova Engine");
        assert_eq!(cfg.render.secondary_slots, 4);
        assert_eq!(cfg.api(), GraphicsApi::Vulkan);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = AppCfg::parse(
            r#"
            [window]
            title = "sandbox"
            api = "gl"
            vsync = false

            [render]
            clear_color = [1.0, 0.0, 0.0, 1.0]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.window.title, "sandbox");
        assert_eq!(cfg.window.width, 1280);
        assert!(!cfg.window.vsync);
        assert_eq!(cfg.api(), GraphicsApi::OpenGl);
        assert_eq!(cfg.render.clear_color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(cfg.render.secondary_slots, 4);
    }

    #[test]
    fn malformed_text_is_an_error() {
        assert!(AppCfg::parse("[window\nwidth = ").is_err());
        assert!(AppCfg::parse("[window]\napi = \"metal\"").is_err());
    }

    #[test]
    fn missing_or_malformed_files_fall_back() {
        let dir = std::env::temp_dir().join(format!("nova-cfg-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        assert_eq!(AppCfg::load(&dir.join("absent.toml")), AppCfg::default());

        let bad = dir.join("bad.toml");
        fs::write(&bad, "render = 3 = 4").unwrap();
        assert_eq!(AppCfg::load(&bad), AppCfg::default());

        let good = dir.join("good.toml");
        fs::write(&good, "[render]\nsecondary_slots = 2\n").unwrap();
        assert_eq!(AppCfg::load(&good).render.secondary_slots, 2);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn cli_overrides_file() {
        let mut cfg = AppCfg::parse("[window]\napi = \"gl\"\n[render]\nvalidation = false").unwrap();
        cfg.apply_overrides(None, false);
        assert_eq!(cfg.api(), GraphicsApi::OpenGl);
        assert!(!cfg.render.validation);

        cfg.apply_overrides(Some(ApiChoice::Vk), true);
        assert_eq!(cfg.api(), GraphicsApi::Vulkan);
        assert!(cfg.render.validation);
    }

    #[test]
    fn descriptors_carry_config_values() {
        let cfg = AppCfg::parse("[window]\nwidth = 640\nheight = 480\nvsync = false").unwrap();
        let win = cfg.window_desc();
        assert_eq!((win.width, win.height), (640, 480));
        let desc = cfg.renderer_desc(RenderSize::new(640, 480));
        assert!(!desc.vsync);
        assert_eq!(desc.size, RenderSize::new(640, 480));
        assert_eq!(desc.secondary_slots, cfg.render.secondary_slots);
    }
}
