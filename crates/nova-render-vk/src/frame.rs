// SPDX-License-Identifier: CEPL-1.0
use ash::vk;
use nova_render::{RenderSize, WindowState};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::commands::CommandSlot;
use crate::error::{check, SwapchainError};
use crate::ops::{DeviceOps, Inheritance, SubmitDesc};
use crate::swapchain::{Acquire, Present, Swapchain, SwapchainConfig};

/// Where the frame loop currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FramePhase {
    Idle,
    Acquiring,
    Recording,
    Submitted,
}

/// Everything an immediate-mode UI renderer needs to build its GPU backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UiInitInfo {
    pub instance: vk::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: vk::Device,
    pub queue_family: u32,
    pub queue: vk::Queue,
    pub descriptor_pool: vk::DescriptorPool,
    pub min_image_count: u32,
    pub image_count: u32,
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
    pub sample_count: vk::SampleCountFlags,
}

/// UI layer drawn on top of the scene.
///
/// The overlay is lent one secondary buffer per frame, already begun inside
/// the render pass. It records into it without calling begin/end and must
/// not keep the handle once it is cleared.
pub trait UiOverlay: Send {
    /// Sent when the overlay is installed and again after every recreation.
    fn set_init_info(&mut self, info: &UiInitInfo);
    fn set_command_buffer(&mut self, cmd: Option<vk::CommandBuffer>);
    /// Must skip recording when no buffer is lent.
    fn draw(&mut self, device: &dyn DeviceOps, extent: vk::Extent2D);
}

/// What a worker thread sees while recording its secondary buffer.
pub struct RecordContext<'a> {
    pub device: &'a dyn DeviceOps,
    pub cmd: vk::CommandBuffer,
    pub worker: usize,
    pub workers: usize,
    pub extent: vk::Extent2D,
    pub clear_color: [f32; 4],
}

/// Engine-side recording callback, called once per worker buffer per frame,
/// each call on its own thread.
pub trait SecondaryRecorder: Send + Sync {
    fn record(&self, ctx: &RecordContext<'_>);
}

/// Clears one horizontal band per worker, tinted from the clear color.
#[derive(Clone, Copy, Debug, Default)]
pub struct BandRecorder;

impl SecondaryRecorder for BandRecorder {
    fn record(&self, ctx: &RecordContext<'_>) {
        if ctx.workers == 0 || ctx.extent.height == 0 {
            return;
        }
        let band = (ctx.extent.height / ctx.workers as u32).max(1);
        let y = band * ctx.worker as u32;
        if y >= ctx.extent.height {
            return;
        }
        let rect = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: y as i32 },
            extent: vk::Extent2D {
                width: ctx.extent.width,
                height: band.min(ctx.extent.height - y),
            },
        };
        let lift = 0.08 * (ctx.worker as f32 + 1.0);
        let [r, g, b, a] = ctx.clear_color;
        let color = [
            (r + lift).min(1.0),
            (g + lift).min(1.0),
            (b + lift * 1.5).min(1.0),
            a,
        ];
        ctx.device.cmd_clear_rect(ctx.cmd, rect, color);
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FrameDesc {
    pub extent: vk::Extent2D,
    pub vsync: bool,
    pub secondary_slots: usize,
    pub clear_color: [f32; 4],
}

/// Frame-wide values every worker records against.
#[derive(Clone, Copy, Debug)]
struct WorkerTarget {
    inheritance: Inheritance,
    extent: vk::Extent2D,
    clear_color: [f32; 4],
    workers: usize,
}

/// Records one worker buffer. Runs on a scoped thread that owns `slot`.
fn record_worker(
    device: &dyn DeviceOps,
    recorder: &dyn SecondaryRecorder,
    slot: &mut CommandSlot,
    worker: usize,
    target: WorkerTarget,
) -> Result<vk::CommandBuffer, SwapchainError> {
    let cmd = slot.buffer();
    check("vkResetCommandBuffer", device.reset_command_buffer(cmd))?;
    check(
        "vkBeginCommandBuffer",
        device.begin_secondary(cmd, &target.inheritance),
    )?;
    device.cmd_set_viewport_scissor(cmd, target.extent);
    recorder.record(&RecordContext {
        device,
        cmd,
        worker,
        workers: target.workers,
        extent: target.extent,
        clear_color: target.clear_color,
    });
    check("vkEndCommandBuffer", device.end_command_buffer(cmd))?;
    Ok(cmd)
}

/// The Vulkan frame state machine: acquire, record, submit, present.
pub struct FrameOrchestrator<D: DeviceOps> {
    device: D,
    swapchain: Swapchain,
    graphics_queue: vk::Queue,

    phase: FramePhase,
    frame_active: bool,
    image_index: u32,
    resize_pending: bool,
    clear_color: [f32; 4],

    overlay: Option<Box<dyn UiOverlay>>,
    descriptor_pool: vk::DescriptorPool,
    recorder: Arc<dyn SecondaryRecorder>,
    destroyed: bool,
}

impl<D: DeviceOps> FrameOrchestrator<D> {
    pub fn new(device: D, desc: &FrameDesc) -> Result<Self, SwapchainError> {
        let handles = device.handles();
        let cfg = SwapchainConfig {
            graphics_family: handles.graphics_family,
            present_family: handles.present_family,
            present_queue: handles.present_queue,
            vsync: desc.vsync,
            secondary_slots: desc.secondary_slots,
        };
        let swapchain = Swapchain::create(&device, cfg, desc.extent)?;

        Ok(Self {
            device,
            swapchain,
            graphics_queue: handles.graphics_queue,
            phase: FramePhase::Idle,
            frame_active: false,
            image_index: 0,
            resize_pending: false,
            clear_color: desc.clear_color,
            overlay: None,
            descriptor_pool: vk::DescriptorPool::null(),
            recorder: Arc::new(BandRecorder),
            destroyed: false,
        })
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn frame_active(&self) -> bool {
        self.frame_active
    }

    pub fn resize_pending(&self) -> bool {
        self.resize_pending
    }

    fn inheritance(&self) -> Inheritance {
        Inheritance {
            render_pass: self.swapchain.render_pass(),
            subpass: 0,
            framebuffer: self
                .swapchain
                .framebuffer(self.image_index as usize)
                .unwrap_or_default(),
        }
    }

    fn ui_init_info(&self) -> UiInitInfo {
        let handles = self.device.handles();
        UiInitInfo {
            instance: handles.instance,
            physical_device: handles.physical_device,
            device: handles.device,
            queue_family: handles.graphics_family,
            queue: handles.graphics_queue,
            descriptor_pool: self.descriptor_pool,
            min_image_count: self.swapchain.min_image_count(),
            image_count: self.swapchain.image_count() as u32,
            render_pass: self.swapchain.render_pass(),
            subpass: 0,
            sample_count: vk::SampleCountFlags::TYPE_1,
        }
    }

    /// Installs the UI overlay and hands it its init info.
    pub fn set_overlay(&mut self, mut overlay: Box<dyn UiOverlay>) -> Result<(), SwapchainError> {
        if self.descriptor_pool == vk::DescriptorPool::null() {
            self.descriptor_pool =
                check("vkCreateDescriptorPool", self.device.create_descriptor_pool())?;
        }
        overlay.set_command_buffer(None);
        overlay.set_init_info(&self.ui_init_info());
        self.overlay = Some(overlay);
        Ok(())
    }

    pub fn set_scene_recorder(&mut self, recorder: Arc<dyn SecondaryRecorder>) {
        self.recorder = recorder;
    }

    pub fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear_color = rgba;
    }

    pub fn set_vsync(&mut self, on: bool) {
        self.swapchain.set_vsync(on);
    }

    /// Deferred: the chain is rebuilt at the top of the next `begin_frame`.
    pub fn resize(&mut self, size: RenderSize) {
        debug!("resize to {}x{} deferred", size.width, size.height);
        self.resize_pending = true;
    }

    /// Returns whether a usable chain exists afterwards.
    fn recreate(&mut self, size: RenderSize) -> Result<bool, SwapchainError> {
        let extent = vk::Extent2D {
            width: size.width,
            height: size.height,
        };
        match self.swapchain.recreate(&self.device, extent) {
            Ok(()) => {
                self.resize_pending = false;
                if self.overlay.is_some() {
                    let info = self.ui_init_info();
                    if let Some(overlay) = self.overlay.as_mut() {
                        overlay.set_init_info(&info);
                    }
                }
                Ok(true)
            }
            Err(e) if e.is_transient() => Ok(false),
            Err(e) => {
                // retried next tick
                self.resize_pending = true;
                Err(e)
            }
        }
    }

    /// Drops a frame after its image was acquired so the slot fence still signals.
    /// The image itself is only handed back by rebuilding the chain, so that is
    /// flagged for the next tick.
    fn abandon(&mut self) {
        self.frame_active = false;
        self.phase = FramePhase::Idle;
        self.resize_pending = true;
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.set_command_buffer(None);
        }
        if let Err(e) = self.swapchain.abandon_frame(&self.device, self.graphics_queue) {
            error!("could not release frame slot: {e}");
        }
    }

    pub fn begin_frame(&mut self, window: WindowState) -> Result<(), SwapchainError> {
        self.frame_active = false;
        self.phase = FramePhase::Idle;
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.set_command_buffer(None);
        }

        if window.should_skip() {
            debug!("window minimized, frame skipped");
            return Ok(());
        }

        if (self.resize_pending || self.swapchain.is_resized()) && !self.recreate(window.size)? {
            return Ok(());
        }

        self.phase = FramePhase::Acquiring;
        let image_index = match self.swapchain.acquire_next_image(&self.device) {
            Ok(Acquire::Acquired(index)) => index,
            Ok(Acquire::OutOfDate) => {
                self.phase = FramePhase::Idle;
                self.recreate(window.size)?;
                return Ok(());
            }
            Err(e) => {
                self.phase = FramePhase::Idle;
                self.resize_pending = true;
                return Err(e);
            }
        };
        self.image_index = image_index;

        if let Err(e) = self.open_frame() {
            self.abandon();
            return Err(e);
        }

        self.phase = FramePhase::Recording;
        self.frame_active = true;
        Ok(())
    }

    /// Primary + render pass + the overlay's secondary.
    fn open_frame(&mut self) -> Result<(), SwapchainError> {
        let extent = self.swapchain.extent();
        let inheritance = self.inheritance();
        let commands = self.swapchain.current_commands();
        let primary = commands.primary();
        let ui = commands.ui();
        let d = &self.device;

        check("vkResetCommandBuffer", d.reset_command_buffer(primary))?;
        check("vkBeginCommandBuffer", d.begin_primary(primary))?;
        d.cmd_begin_render_pass(
            primary,
            inheritance.render_pass,
            inheritance.framebuffer,
            extent,
            self.clear_color,
            vk::SubpassContents::SECONDARY_COMMAND_BUFFERS,
        );

        check("vkResetCommandBuffer", d.reset_command_buffer(ui))?;
        check("vkBeginCommandBuffer", d.begin_secondary(ui, &inheritance))?;
        d.cmd_set_viewport_scissor(ui, extent);

        if let Some(overlay) = self.overlay.as_mut() {
            overlay.set_command_buffer(Some(ui));
        }
        Ok(())
    }

    /// Records every worker secondary on its own scoped thread and executes them in one batch.
    pub fn render(&mut self) -> Result<(), SwapchainError> {
        if !self.frame_active {
            return Ok(());
        }

        let primary = self.swapchain.current_commands().primary();
        let mut target = WorkerTarget {
            inheritance: self.inheritance(),
            extent: self.swapchain.extent(),
            clear_color: self.clear_color,
            workers: 0,
        };

        let device: &dyn DeviceOps = &self.device;
        let recorder: &dyn SecondaryRecorder = &*self.recorder;
        let workers = self.swapchain.current_commands_mut().workers_mut();
        target.workers = workers.len();
        if workers.is_empty() {
            return Ok(());
        }

        let results: Vec<Result<vk::CommandBuffer, SwapchainError>> = std::thread::scope(|s| {
            let handles: Vec<_> = workers
                .iter_mut()
                .enumerate()
                .map(|(worker, slot)| {
                    s.spawn(move || record_worker(device, recorder, slot, worker, target))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        });

        let secondaries = match results.into_iter().collect::<Result<Vec<_>, _>>() {
            Ok(cmds) => cmds,
            Err(e) => {
                self.abandon();
                return Err(e);
            }
        };
        self.device.cmd_execute_commands(primary, &secondaries);
        Ok(())
    }

    /// Lets the overlay record into the buffer lent in `begin_frame`.
    pub fn draw_ui(&mut self) {
        if !self.frame_active {
            return;
        }
        let extent = self.swapchain.extent();
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.draw(&self.device, extent);
        }
    }

    pub fn end_frame(&mut self) -> Result<(), SwapchainError> {
        if !self.frame_active {
            return Ok(());
        }
        self.frame_active = false;
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.set_command_buffer(None);
        }

        if let Err(e) = self.close_and_submit() {
            self.abandon();
            return Err(e);
        }
        // stays here until the next begin_frame
        self.phase = FramePhase::Submitted;

        match self.swapchain.present(&self.device, self.image_index) {
            Ok(Present::Presented) => Ok(()),
            Ok(Present::NeedsRecreate) => {
                debug!("present asked for recreation");
                self.resize_pending = true;
                Ok(())
            }
            Err(e) => {
                self.resize_pending = true;
                Err(e)
            }
        }
    }

    fn close_and_submit(&mut self) -> Result<(), SwapchainError> {
        let commands = self.swapchain.current_commands();
        let primary = commands.primary();
        let ui = commands.ui();
        let sync = self.swapchain.current_sync();
        let d = &self.device;

        check("vkEndCommandBuffer", d.end_command_buffer(ui))?;
        d.cmd_execute_commands(primary, &[ui]);
        d.cmd_end_render_pass(primary);
        check("vkEndCommandBuffer", d.end_command_buffer(primary))?;

        let submit = SubmitDesc {
            command_buffer: Some(primary),
            wait: Some((
                sync.image_available,
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            )),
            signal: Some(sync.render_finished),
            fence: sync.in_flight,
        };
        check("vkQueueSubmit", d.queue_submit(self.graphics_queue, &submit))?;
        Ok(())
    }

    /// Idempotent. The device itself is left to its owner.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        if let Some(mut overlay) = self.overlay.take() {
            overlay.set_command_buffer(None);
        }
        self.swapchain.destroy(&self.device);
        if self.descriptor_pool != vk::DescriptorPool::null() {
            self.device.destroy_descriptor_pool(self.descriptor_pool);
            self.descriptor_pool = vk::DescriptorPool::null();
        }
        self.destroyed = true;
        info!("frame resources destroyed");
    }
}

impl<D: DeviceOps> Drop for FrameOrchestrator<D> {
    fn drop(&mut self) {
        self.destroy();
    }
}
