// SPDX-License-Identifier: CEPL-1.0
use anyhow::{anyhow, Context, Result};
use glow::HasContext as _;
use nova_render::{RenderSize, RenderWindow, Renderer, RendererDesc};
use raw_window_handle::RawWindowHandle;
use std::sync::Arc;
use tracing::{debug, info};

use glutin::{
    config::ConfigTemplateBuilder,
    context::{
        ContextApi, ContextAttributesBuilder, NotCurrentContext, PossiblyCurrentContext, Version,
    },
    display::{Display, DisplayApiPreference},
    prelude::*,
    surface::{Surface, SurfaceAttributesBuilder, SwapInterval, WindowSurface},
};

use std::ffi::CString;
use std::num::NonZeroU32;

/// Immediate OpenGL backend: no swapchain, no frames in flight.
pub struct GlRenderer {
    window: Arc<dyn RenderWindow>,
    context: PossiblyCurrentContext,
    surface: Surface<WindowSurface>,
    gl: glow::Context,
    size: RenderSize,
    clear: [f32; 4],
    program: glow::Program,
    vao: glow::VertexArray,
    vsync: bool,
    frame_active: bool,
}

fn non_zero(v: u32) -> NonZeroU32 {
    NonZeroU32::new(v).unwrap_or(NonZeroU32::MIN)
}

fn compile_program(gl: &glow::Context) -> Result<glow::Program> {
    unsafe {
        let vs = gl
            .create_shader(glow::VERTEX_SHADER)
            .map_err(anyhow::Error::msg)?;
        let fs = gl
            .create_shader(glow::FRAGMENT_SHADER)
            .map_err(anyhow::Error::msg)?;

        let vert_src = r#"#version 330 core
        out vec3 vColor;
        void main() {
          vec2 pos[3] = vec2[3](
            vec2( 0.0,  0.6),
            vec2(-0.5, -0.4),
            vec2( 0.5, -0.4)
          );
          vec3 col[3] = vec3[3](
            vec3(1,0,0),
            vec3(0,1,0),
            vec3(0,0,1)
          );
          gl_Position = vec4(pos[gl_VertexID], 0.0, 1.0);
          vColor = col[gl_VertexID];
        }"#;

        let frag_src = r#"#version 330 core
        in vec3 vColor;
        out vec4 outColor;
        void main(){ outColor = vec4(vColor, 1.0); }"#;

        gl.shader_source(vs, vert_src);
        gl.compile_shader(vs);
        if !gl.get_shader_compile_status(vs) {
            return Err(anyhow!("GL vert compile: {}", gl.get_shader_info_log(vs)));
        }

        gl.shader_source(fs, frag_src);
        gl.compile_shader(fs);
        if !gl.get_shader_compile_status(fs) {
            return Err(anyhow!("GL frag compile: {}", gl.get_shader_info_log(fs)));
        }

        let program = gl.create_program().map_err(anyhow::Error::msg)?;
        gl.attach_shader(program, vs);
        gl.attach_shader(program, fs);
        gl.link_program(program);
        if !gl.get_program_link_status(program) {
            return Err(anyhow!("GL link: {}", gl.get_program_info_log(program)));
        }

        gl.detach_shader(program, vs);
        gl.detach_shader(program, fs);
        gl.delete_shader(vs);
        gl.delete_shader(fs);

        Ok(program)
    }
}

fn swap_interval(vsync: bool) -> SwapInterval {
    if vsync {
        SwapInterval::Wait(NonZeroU32::MIN)
    } else {
        SwapInterval::DontWait
    }
}

impl GlRenderer {
    fn make_current(
        display: &Display,
        window_handle: RawWindowHandle,
        size: RenderSize,
    ) -> Result<(
        PossiblyCurrentContext,
        Surface<WindowSurface>,
        glow::Context,
    )> {
        let template = ConfigTemplateBuilder::new().build();
        let mut configs = unsafe { display.find_configs(template) }.context("find_configs")?;
        let config = configs.next().ok_or_else(|| anyhow!("no GL configs"))?;

        let sattrs = SurfaceAttributesBuilder::<WindowSurface>::new().build(
            window_handle,
            non_zero(size.width),
            non_zero(size.height),
        );
        let surface = unsafe { display.create_window_surface(&config, &sattrs) }
            .context("create_window_surface")?;
        let ctx_attrs = ContextAttributesBuilder::new()
            .with_context_api(ContextApi::OpenGl(Some(Version::new(3, 3))))
            .build(Some(window_handle));
        let not_current: NotCurrentContext =
            unsafe { display.create_context(&config, &ctx_attrs) }.context("create_context")?;

        let context = not_current.make_current(&surface).context("make_current")?;

        let gl = unsafe {
            glow::Context::from_loader_function(|s| match CString::new(s) {
                Ok(name) => display.get_proc_address(&name) as *const _,
                Err(_) => std::ptr::null(),
            })
        };

        Ok((context, surface, gl))
    }
}

impl Renderer for GlRenderer {
    fn new(window: Arc<dyn RenderWindow>, desc: &RendererDesc) -> Result<Self> {
        let wh = window
            .window_handle()
            .map_err(|e| anyhow!("{e}"))?
            .as_raw();
        let dh = window
            .display_handle()
            .map_err(|e| anyhow!("{e}"))?
            .as_raw();

        let display =
            unsafe { Display::new(dh, DisplayApiPreference::Egl) }.context("Display::new")?;

        let (context, surface, gl) = Self::make_current(&display, wh, desc.size)?;
        let program = compile_program(&gl)?;
        let vao = unsafe { gl.create_vertex_array().map_err(anyhow::Error::msg)? };

        unsafe {
            gl.enable(glow::FRAMEBUFFER_SRGB);
            gl.enable(glow::CULL_FACE);
            gl.front_face(glow::CCW);
            gl.cull_face(glow::BACK);
            gl.disable(glow::DEPTH_TEST);
        }

        let _ = surface.set_swap_interval(&context, swap_interval(desc.vsync));
        info!("GL context ready ({}x{})", desc.size.width, desc.size.height);

        Ok(Self {
            window,
            context,
            surface,
            gl,
            size: desc.size,
            clear: desc.clear_color,
            program,
            vao,
            vsync: desc.vsync,
            frame_active: false,
        })
    }

    fn resize(&mut self, size: RenderSize) -> Result<()> {
        self.size = size;
        if size.is_empty() {
            return Ok(());
        }

        self.surface
            .resize(&self.context, non_zero(size.width), non_zero(size.height));
        Ok(())
    }

    fn begin_frame(&mut self) -> Result<()> {
        self.frame_active = false;
        if self.window.state().should_skip() || self.size.is_empty() {
            debug!("gl: window minimized, frame skipped");
            return Ok(());
        }

        unsafe {
            self.gl
                .viewport(0, 0, self.size.width as i32, self.size.height as i32);
            self.gl
                .clear_color(self.clear[0], self.clear[1], self.clear[2], self.clear[3]);
            self.gl.clear(glow::COLOR_BUFFER_BIT);
        }
        self.frame_active = true;
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        if !self.frame_active {
            return Ok(());
        }

        unsafe {
            self.gl.use_program(Some(self.program));
            self.gl.bind_vertex_array(Some(self.vao));
            self.gl.draw_arrays(glow::TRIANGLES, 0, 3);
            self.gl.bind_vertex_array(None);
            self.gl.use_program(None);
        }
        Ok(())
    }

    fn end_frame(&mut self) -> Result<()> {
        if !self.frame_active {
            return Ok(());
        }
        self.frame_active = false;

        self.surface
            .swap_buffers(&self.context)
            .context("swap_buffers")?;
        Ok(())
    }

    fn frame_active(&self) -> bool {
        self.frame_active
    }

    fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear = rgba;
    }

    fn set_vsync(&mut self, on: bool) {
        self.vsync = on;
        let _ = self
            .surface
            .set_swap_interval(&self.context, swap_interval(self.vsync));
    }
}

impl Drop for GlRenderer {
    fn drop(&mut self) {
        unsafe {
            self.gl.delete_vertex_array(self.vao);
            self.gl.delete_program(self.program);
        }
    }
}
