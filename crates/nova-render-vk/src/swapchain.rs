// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use tracing::{debug, info, warn};

use crate::commands::FrameCommands;
use crate::error::{check, fail, SwapchainError};
use crate::ops::{DeviceOps, SubmitDesc, SurfaceSupport, SwapchainDesc};
use crate::sync::{FrameSync, ImagesInFlight, FRAMES_IN_FLIGHT};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainConfig {
    pub graphics_family: u32,
    pub present_family: u32,
    pub present_queue: vk::Queue,
    pub vsync: bool,
    /// Secondary buffers per frame slot, overlay included.
    pub secondary_slots: usize,
}

/// A presentable image with the view and framebuffer built on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapchainFrame {
    /// Owned by the chain, never destroyed here.
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub framebuffer: vk::Framebuffer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquire {
    Acquired(u32),
    /// The chain no longer matches the surface; recreate before drawing.
    OutOfDate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Present {
    Presented,
    NeedsRecreate,
}

// Info only
fn format_name(f: vk::Format) -> &'static str {
    match f {
        vk::Format::B8G8R8A8_SRGB => "B8G8R8A8_SRGB",
        vk::Format::R8G8B8A8_SRGB => "R8G8B8A8_SRGB",
        vk::Format::B8G8R8A8_UNORM => "B8G8R8A8_UNORM",
        vk::Format::R8G8B8A8_UNORM => "R8G8B8A8_UNORM",
        _ => "OTHER",
    }
}

fn present_mode_name(m: vk::PresentModeKHR) -> &'static str {
    match m {
        vk::PresentModeKHR::FIFO => "FIFO",
        vk::PresentModeKHR::MAILBOX => "MAILBOX",
        vk::PresentModeKHR::IMMEDIATE => "IMMEDIATE",
        vk::PresentModeKHR::FIFO_RELAXED => "FIFO_RELAXED",
        _ => "OTHER",
    }
}

/// Caller guarantees `formats` is non-empty.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    [vk::Format::B8G8R8A8_SRGB, vk::Format::R8G8B8A8_SRGB]
        .into_iter()
        .find_map(|want| {
            formats.iter().copied().find(|f| {
                f.format == want && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
        })
        .or_else(|| formats.first().copied())
        .unwrap_or_default()
}

/// FIFO is the only mode every driver must expose.
pub fn choose_present_mode(modes: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    let order: &[vk::PresentModeKHR] = if vsync {
        &[vk::PresentModeKHR::MAILBOX]
    } else {
        &[vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::MAILBOX]
    };
    order
        .iter()
        .copied()
        .find(|m| modes.contains(m))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, window: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: window
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: window
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// At least one image per frame in flight; a zero maximum means unbounded.
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let want = caps.min_image_count.max(FRAMES_IN_FLIGHT as u32);
    if caps.max_image_count > 0 {
        want.min(caps.max_image_count)
    } else {
        want
    }
}

fn is_zero(extent: vk::Extent2D) -> bool {
    extent.width == 0 || extent.height == 0
}

/// The presentable chain plus everything sized by it.
///
/// Sync objects and command resources are created once and survive
/// recreation; views, framebuffers, the render pass and the images-in-flight
/// table are rebuilt with the chain.
pub struct Swapchain {
    cfg: SwapchainConfig,

    handle: vk::SwapchainKHR,
    format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
    min_image_count: u32,
    render_pass: vk::RenderPass,
    frames: Vec<SwapchainFrame>,
    images_in_flight: ImagesInFlight,

    sync: Vec<FrameSync>,
    commands: Vec<FrameCommands>,

    current_frame: usize,
    image_index: u32,
    resized: bool,
    destroyed: bool,
}

impl Swapchain {
    pub fn create(
        device: &dyn DeviceOps,
        cfg: SwapchainConfig,
        window_extent: vk::Extent2D,
    ) -> Result<Self, SwapchainError> {
        let mut sc = Swapchain {
            cfg,
            handle: vk::SwapchainKHR::null(),
            format: vk::SurfaceFormatKHR::default(),
            present_mode: vk::PresentModeKHR::FIFO,
            extent: vk::Extent2D::default(),
            min_image_count: 0,
            render_pass: vk::RenderPass::null(),
            frames: Vec::new(),
            images_in_flight: ImagesInFlight::default(),
            sync: Vec::with_capacity(FRAMES_IN_FLIGHT),
            commands: Vec::with_capacity(FRAMES_IN_FLIGHT),
            current_frame: 0,
            image_index: 0,
            resized: false,
            destroyed: false,
        };

        if let Err(e) = sc.build(device, window_extent) {
            sc.destroy(device);
            return Err(e);
        }
        Ok(sc)
    }

    fn build(&mut self, device: &dyn DeviceOps, window_extent: vk::Extent2D) -> Result<(), SwapchainError> {
        self.build_chain(device, window_extent)?;
        for _ in 0..FRAMES_IN_FLIGHT {
            self.sync.push(FrameSync::create(device)?);
            self.commands.push(FrameCommands::create(
                device,
                self.cfg.graphics_family,
                self.cfg.secondary_slots,
            )?);
        }
        Ok(())
    }

    /// Chain, views, render pass and framebuffers. Partial results are left
    /// in `self` so `teardown_chain` can release them on failure.
    fn build_chain(
        &mut self,
        device: &dyn DeviceOps,
        window_extent: vk::Extent2D,
    ) -> Result<(), SwapchainError> {
        let SurfaceSupport {
            capabilities: caps,
            formats,
            present_modes,
        } = check(
            "vkGetPhysicalDeviceSurfaceCapabilitiesKHR",
            device.surface_support(),
        )?;
        if formats.is_empty() || present_modes.is_empty() {
            return Err(SwapchainError::NoSurfaceSupport);
        }

        let format = choose_surface_format(&formats);
        let present_mode = choose_present_mode(&present_modes, self.cfg.vsync);
        let extent = choose_extent(&caps, window_extent);
        if is_zero(extent) {
            return Err(SwapchainError::Minimized);
        }

        let queue_families = if self.cfg.graphics_family == self.cfg.present_family {
            vec![self.cfg.graphics_family]
        } else {
            vec![self.cfg.graphics_family, self.cfg.present_family]
        };

        let desc = SwapchainDesc {
            min_image_count: choose_image_count(&caps),
            format,
            extent,
            present_mode,
            pre_transform: caps.current_transform,
            queue_families,
        };

        self.handle = check("vkCreateSwapchainKHR", device.create_swapchain(&desc))?;
        self.format = format;
        self.present_mode = present_mode;
        self.extent = extent;
        self.min_image_count = desc.min_image_count;

        let images = check("vkGetSwapchainImagesKHR", device.swapchain_images(self.handle))?;
        if images.is_empty() {
            return Err(SwapchainError::NoImages);
        }

        self.render_pass = check("vkCreateRenderPass", device.create_render_pass(format.format))?;

        for image in images {
            let view = check(
                "vkCreateImageView",
                device.create_image_view(image, format.format),
            )?;
            let framebuffer = match check(
                "vkCreateFramebuffer",
                device.create_framebuffer(self.render_pass, view, extent),
            ) {
                Ok(fb) => fb,
                Err(e) => {
                    device.destroy_image_view(view);
                    return Err(e.into());
                }
            };
            self.frames.push(SwapchainFrame {
                image,
                view,
                framebuffer,
            });
        }
        self.images_in_flight = ImagesInFlight::new(self.frames.len());

        info!(
            "swapchain ready: {}x{}, {} images, format {}, {}",
            extent.width,
            extent.height,
            self.frames.len(),
            format_name(format.format),
            present_mode_name(present_mode)
        );
        Ok(())
    }

    fn teardown_chain(&mut self, device: &dyn DeviceOps) {
        for frame in self.frames.drain(..) {
            device.destroy_framebuffer(frame.framebuffer);
            device.destroy_image_view(frame.view);
        }
        if self.render_pass != vk::RenderPass::null() {
            device.destroy_render_pass(self.render_pass);
            self.render_pass = vk::RenderPass::null();
        }
        self.images_in_flight.clear();
        if self.handle != vk::SwapchainKHR::null() {
            device.destroy_swapchain(self.handle);
            self.handle = vk::SwapchainKHR::null();
        }
    }

    /// Waits for the current slot, then acquires the next image into it.
    pub fn acquire_next_image(&mut self, device: &dyn DeviceOps) -> Result<Acquire, SwapchainError> {
        if self.handle == vk::SwapchainKHR::null() {
            return Ok(Acquire::OutOfDate);
        }
        let sync = self.sync[self.current_frame];

        // Never skipped: the slot's command buffers may still be executing.
        check("vkWaitForFences", device.wait_fence(sync.in_flight))?;

        let index = match device.acquire_next_image(self.handle, sync.image_available) {
            Ok((index, _suboptimal)) => index,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("acquire: swapchain out of date");
                return Ok(Acquire::OutOfDate);
            }
            Err(e) => return Err(fail("vkAcquireNextImageKHR", e).into()),
        };

        // More images than slots: an image can come back while another slot's work on it is pending.
        if let Some(fence) = self.images_in_flight.get(index as usize) {
            check("vkWaitForFences", device.wait_fence(fence))?;
        }
        self.images_in_flight.stamp(index as usize, sync.in_flight);
        check("vkResetFences", device.reset_fence(sync.in_flight))?;

        self.image_index = index;
        Ok(Acquire::Acquired(index))
    }

    /// Presents and moves to the next slot whatever the outcome.
    pub fn present(&mut self, device: &dyn DeviceOps, image_index: u32) -> Result<Present, SwapchainError> {
        let sync = self.sync[self.current_frame];
        let result = device.queue_present(
            self.cfg.present_queue,
            self.handle,
            image_index,
            sync.render_finished,
        );
        self.current_frame = (self.current_frame + 1) % FRAMES_IN_FLIGHT;

        match result {
            Ok(suboptimal) if suboptimal || self.resized => Ok(Present::NeedsRecreate),
            Ok(_) => Ok(Present::Presented),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Present::NeedsRecreate),
            Err(e) => Err(fail("vkQueuePresentKHR", e).into()),
        }
    }

    /// Rebuilds the chain for a new window size. A zero extent changes nothing.
    pub fn recreate(&mut self, device: &dyn DeviceOps, extent: vk::Extent2D) -> Result<(), SwapchainError> {
        if is_zero(extent) {
            info!(
                "swapchain recreation skipped: window is {}x{}",
                extent.width, extent.height
            );
            return Err(SwapchainError::Minimized);
        }

        self.resized = false;
        check("vkDeviceWaitIdle", device.device_wait_idle())?;
        self.teardown_chain(device);

        if let Err(e) = self.build_chain(device, extent) {
            self.teardown_chain(device);
            return Err(e);
        }
        Ok(())
    }

    /// Signals the slot fence after an acquire whose frame never reached submit,
    /// consuming the image-available semaphore on the way.
    pub fn abandon_frame(&mut self, device: &dyn DeviceOps, queue: vk::Queue) -> Result<(), SwapchainError> {
        let sync = self.sync[self.current_frame];
        let submit = SubmitDesc {
            command_buffer: None,
            wait: Some((sync.image_available, vk::PipelineStageFlags::BOTTOM_OF_PIPE)),
            signal: None,
            fence: sync.in_flight,
        };
        check("vkQueueSubmit", device.queue_submit(queue, &submit))?;
        Ok(())
    }

    pub fn set_vsync(&mut self, on: bool) {
        if self.cfg.vsync != on {
            self.cfg.vsync = on;
            self.resized = true;
        }
    }

    pub fn destroy(&mut self, device: &dyn DeviceOps) {
        if self.destroyed {
            return;
        }
        if let Err(e) = device.device_wait_idle() {
            warn!("vkDeviceWaitIdle during swapchain teardown: {e:?}");
        }
        for cmds in &mut self.commands {
            cmds.destroy(device);
        }
        self.commands.clear();
        for sync in &mut self.sync {
            sync.destroy(device);
        }
        self.sync.clear();
        self.teardown_chain(device);
        self.destroyed = true;
    }

    // --- accessors ---

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn framebuffer(&self, image: usize) -> Option<vk::Framebuffer> {
        self.frames.get(image).map(|f| f.framebuffer)
    }

    pub fn frames(&self) -> &[SwapchainFrame] {
        &self.frames
    }

    pub fn current_sync(&self) -> FrameSync {
        self.sync[self.current_frame]
    }

    pub fn commands(&self, slot: usize) -> &FrameCommands {
        &self.commands[slot]
    }

    pub fn current_commands(&self) -> &FrameCommands {
        &self.commands[self.current_frame]
    }

    pub fn current_commands_mut(&mut self) -> &mut FrameCommands {
        &mut self.commands[self.current_frame]
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn image_index(&self) -> u32 {
        self.image_index
    }

    pub fn image_count(&self) -> usize {
        self.frames.len()
    }

    pub fn min_image_count(&self) -> u32 {
        self.min_image_count
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub fn images_in_flight(&self) -> &ImagesInFlight {
        &self.images_in_flight
    }

    pub fn is_resized(&self) -> bool {
        self.resized
    }

    pub fn set_resized(&mut self, resized: bool) {
        self.resized = resized;
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }
}
