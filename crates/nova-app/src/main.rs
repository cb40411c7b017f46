// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use anyhow::Result;
use clap::Parser;
use nova_core::{init_tracing, FrameClock};
use nova_platform::PlatformWindow;
use nova_render::{RenderSize, RenderWindow, Renderer};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use nova_platform::winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::WindowId,
};

mod backend;
mod config;
mod overlay;
mod scene;

use backend::Backend;
use config::{ApiChoice, AppCfg};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Renderer backend; overrides `window.api` from the config file
    #[arg(long, value_enum)]
    backend: Option<ApiChoice>,
    #[arg(long, default_value = "nova.toml")]
    config: PathBuf,
    /// Enable API validation layers
    #[arg(long)]
    validation: bool,
}

/// One pass of the frame protocol. Returns whether a frame was presented.
fn drive_frame(r: &mut dyn Renderer, dt: f32) -> Result<bool> {
    r.update(dt);
    r.begin_frame()?;
    if !r.frame_active() {
        return Ok(false);
    }
    r.render()?;
    r.draw_ui();
    r.end_frame()?;
    Ok(true)
}

struct App {
    cfg: AppCfg,
    // backend is declared first so it drops before the window it renders to
    backend: Option<Backend>,
    window: Option<Arc<PlatformWindow>>,
    clock: FrameClock,
    exiting: bool,
}

impl App {
    fn new(cfg: AppCfg) -> Self {
        Self {
            cfg,
            backend: None,
            window: None,
            clock: FrameClock::new(),
            exiting: false,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let desc = self.cfg.window_desc();
        let window = Arc::new(PlatformWindow::create(event_loop, &desc)?);
        let size = window.pixel_size();
        let render_desc = self.cfg.renderer_desc(size);
        let render_window: Arc<dyn RenderWindow> = window.clone();

        let backend = Backend::create(desc.api, render_window, &render_desc)?;
        info!(
            "window {}x{}, vsync {}",
            size.width, size.height, render_desc.vsync
        );

        self.backend = Some(backend);
        self.window = Some(window);
        Ok(())
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.exiting = true;
        self.backend = None;
        self.window = None;
        event_loop.exit();
    }

    fn redraw(&mut self) {
        let dt = self.clock.tick();
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        match drive_frame(backend.renderer(), dt) {
            Ok(true) => self.clock.frame_presented(),
            Ok(false) => {}
            Err(e) => warn!("frame dropped: {e:#}"),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.init(event_loop) {
                error!("startup failed: {e:#}");
                self.shutdown(event_loop);
                return;
            }
        }

        event_loop.set_control_flow(if self.cfg.window.vsync {
            ControlFlow::Wait
        } else {
            ControlFlow::Poll
        });
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            if window_id != window.window().id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.shutdown(event_loop);
            }

            WindowEvent::Resized(new_size) => {
                let size = RenderSize::new(new_size.width, new_size.height);
                info!("Resized → {}x{}", size.width, size.height);
                if let Some(backend) = self.backend.as_mut() {
                    if let Err(e) = backend.renderer().resize(size) {
                        warn!("resize failed: {e:#}");
                    }
                }
                if let Some(w) = &self.window {
                    w.request_redraw();
                }
            }

            WindowEvent::RedrawRequested => {
                if !self.exiting {
                    self.redraw();
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exiting {
            return;
        }
        let Some(window) = &self.window else {
            return;
        };

        if window.state().should_skip() {
            // nothing to draw; sleep until the window comes back
            event_loop.set_control_flow(ControlFlow::Wait);
            self.clock.reset_count();
            return;
        }
        event_loop.set_control_flow(if self.cfg.window.vsync {
            ControlFlow::Wait
        } else {
            ControlFlow::Poll
        });
        window.request_redraw();

        if let Some(fps) = self.clock.take_fps() {
            let api = self.backend.as_ref().map(Backend::api);
            match api {
                Some(api) => info!("[{api}] fps ~ {fps}"),
                None => info!("fps ~ {fps}"),
            }
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut cfg = AppCfg::load(&args.config);
    cfg.apply_overrides(args.backend, args.validation);

    let event_loop: EventLoop<()> = EventLoop::new()?;
    let mut app = App::new(cfg);
    event_loop.run_app(&mut app)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use nova_render::RendererDesc;

    #[derive(Default)]
    struct Scripted {
        calls: Vec<&'static str>,
        skip: bool,
        fail_render: bool,
        active: bool,
    }

    impl Renderer for Scripted {
        fn new(_window: Arc<dyn RenderWindow>, _desc: &RendererDesc) -> Result<Self> {
            Ok(Self::default())
        }

        fn resize(&mut self, _size: RenderSize) -> Result<()> {
            Ok(())
        }

        fn update(&mut self, _dt: f32) {
            self.calls.push("update");
        }

        fn begin_frame(&mut self) -> Result<()> {
            self.calls.push("begin");
            self.active = !self.skip;
            Ok(())
        }

        fn render(&mut self) -> Result<()> {
            self.calls.push("render");
            if self.fail_render {
                self.active = false;
                return Err(anyhow!("worker failed"));
            }
            Ok(())
        }

        fn draw_ui(&mut self) {
            self.calls.push("ui");
        }

        fn end_frame(&mut self) -> Result<()> {
            self.calls.push("end");
            self.active = false;
            Ok(())
        }

        fn frame_active(&self) -> bool {
            self.active
        }

        fn set_clear_color(&mut self, _rgba: [f32; 4]) {}
    }

    #[test]
    fn full_frame_runs_every_phase_in_order() {
        let mut r = Scripted::default();
        assert!(drive_frame(&mut r, 0.016).unwrap());
        assert_eq!(r.calls, ["update", "begin", "render", "ui", "end"]);
    }

    #[test]
    fn skipped_frame_stops_after_begin() {
        let mut r = Scripted {
            skip: true,
            ..Scripted::default()
        };
        assert!(!drive_frame(&mut r, 0.016).unwrap());
        assert_eq!(r.calls, ["update", "begin"]);
    }

    #[test]
    fn render_failure_drops_the_frame() {
        let mut r = Scripted {
            fail_render: true,
            ..Scripted::default()
        };
        assert!(drive_frame(&mut r, 0.016).is_err());
        assert_eq!(r.calls, ["update", "begin", "render"]);
        assert!(!r.frame_active());
    }

    #[test]
    fn cli_parses_backend_and_flags() {
        let args = Args::parse_from(["nova", "--backend", "gl", "--validation"]);
        assert_eq!(args.backend, Some(ApiChoice::Gl));
        assert!(args.validation);
        assert_eq!(args.config, PathBuf::from("nova.toml"));

        let args = Args::parse_from(["nova", "--config", "alt.toml"]);
        assert_eq!(args.backend, None);
        assert_eq!(args.config, PathBuf::from("alt.toml"));
    }
}
