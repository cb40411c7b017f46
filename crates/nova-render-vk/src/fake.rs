// SPDX-License-Identifier: CEPL-1.0
//! Test double for [`DeviceOps`]: hands out counted handles, models fence
//! states and records misuse a real driver would punish.

use ash::vk::{self, Handle};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::thread::ThreadId;

use crate::ops::{DeviceHandles, DeviceOps, Inheritance, SubmitDesc, SurfaceSupport, SwapchainDesc, VkResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FenceState {
    Signaled,
    Unsignaled,
    /// Submitted work not yet observed by a wait.
    Pending,
}

#[derive(Default)]
struct State {
    next_handle: u64,

    fences: HashMap<vk::Fence, FenceState>,
    semaphores: HashSet<vk::Semaphore>,
    views: HashSet<vk::ImageView>,
    framebuffers: HashSet<vk::Framebuffer>,
    render_passes: HashSet<vk::RenderPass>,
    swapchains: HashMap<vk::SwapchainKHR, Vec<vk::Image>>,
    pools: HashMap<vk::CommandPool, vk::CommandPoolCreateFlags>,
    buffers: HashMap<vk::CommandBuffer, vk::CommandPool>,
    descriptor_pools: HashSet<vk::DescriptorPool>,

    support: SurfaceSupport,
    image_count: u32,
    acquire_order: Vec<u32>,
    acquire_cursor: usize,
    out_of_date_acquires: u32,
    acquire_error: Option<vk::Result>,
    present_error: Option<vk::Result>,
    suboptimal_present: bool,
    submit_error: Option<vk::Result>,
    secondary_begin_error: Option<vk::Result>,
    last_swapchain: Option<SwapchainDesc>,

    acquired: Option<u32>,
    /// Images handed to the app and not yet presented, per live swapchain.
    held: HashMap<vk::SwapchainKHR, HashSet<u32>>,
    image_fences: HashMap<u32, vk::Fence>,
    buffer_fences: HashMap<vk::CommandBuffer, vk::Fence>,
    executed: HashMap<vk::CommandBuffer, Vec<vk::CommandBuffer>>,
    submitted_fences: HashSet<vk::Fence>,
    secondary_threads: HashMap<vk::CommandBuffer, ThreadId>,
    inheritances: Vec<Inheritance>,

    acquire_calls: usize,
    present_calls: usize,
    submit_calls: usize,
    empty_submits: usize,
    execute_batches: Vec<usize>,
    clear_rects: usize,
    violations: Vec<String>,
}

impl State {
    fn next<H: Handle>(&mut self) -> H {
        self.next_handle += 1;
        H::from_raw(self.next_handle)
    }
}

pub struct FakeDevice {
    state: Mutex<State>,
}

impl FakeDevice {
    pub fn new(image_count: u32) -> Self {
        let support = SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 8,
                current_extent: vk::Extent2D {
                    width: 800,
                    height: 600,
                },
                min_image_extent: vk::Extent2D {
                    width: 1,
                    height: 1,
                },
                max_image_extent: vk::Extent2D {
                    width: 4096,
                    height: 4096,
                },
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        };
        Self {
            state: Mutex::new(State {
                support,
                image_count,
                ..State::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    // --- scripting ---

    pub fn set_image_count(&self, n: u32) {
        self.state().image_count = n;
    }

    pub fn set_acquire_order(&self, order: Vec<u32>) {
        let mut s = self.state();
        s.acquire_order = order;
        s.acquire_cursor = 0;
    }

    pub fn set_surface_extent(&self, width: u32, height: u32) {
        self.state().support.capabilities.current_extent = vk::Extent2D { width, height };
    }

    pub fn set_support(&self, support: SurfaceSupport) {
        self.state().support = support;
    }

    pub fn fail_acquires_out_of_date(&self, count: u32) {
        self.state().out_of_date_acquires = count;
    }

    pub fn fail_next_acquire(&self, result: vk::Result) {
        self.state().acquire_error = Some(result);
    }

    pub fn fail_next_present(&self, result: vk::Result) {
        self.state().present_error = Some(result);
    }

    pub fn suboptimal_next_present(&self) {
        self.state().suboptimal_present = true;
    }

    pub fn fail_next_submit(&self, result: vk::Result) {
        self.state().submit_error = Some(result);
    }

    pub fn fail_next_secondary_begin(&self, result: vk::Result) {
        self.state().secondary_begin_error = Some(result);
    }

    // --- inspection ---

    /// Acquired images not yet returned by a present or a swapchain destroy.
    pub fn held_images(&self) -> usize {
        self.state().held.values().map(HashSet::len).sum()
    }

    pub fn fence_state(&self, fence: vk::Fence) -> Option<FenceState> {
        self.state().fences.get(&fence).copied()
    }

    pub fn fence_signaled(&self, fence: vk::Fence) -> bool {
        self.fence_state(fence) == Some(FenceState::Signaled)
    }

    /// Every handle the device still owns; images belong to their swapchain.
    pub fn live_objects(&self) -> usize {
        let s = self.state();
        s.fences.len()
            + s.semaphores.len()
            + s.views.len()
            + s.framebuffers.len()
            + s.render_passes.len()
            + s.swapchains.len()
            + s.pools.len()
            + s.descriptor_pools.len()
    }

    pub fn live_command_pools(&self) -> usize {
        self.state().pools.len()
    }

    pub fn live_swapchains(&self) -> usize {
        self.state().swapchains.len()
    }

    pub fn live_views(&self) -> usize {
        self.state().views.len()
    }

    pub fn live_framebuffers(&self) -> usize {
        self.state().framebuffers.len()
    }

    pub fn live_render_passes(&self) -> usize {
        self.state().render_passes.len()
    }

    pub fn pool_flags(&self) -> Vec<vk::CommandPoolCreateFlags> {
        self.state().pools.values().copied().collect()
    }

    pub fn last_swapchain(&self) -> Option<SwapchainDesc> {
        self.state().last_swapchain.clone()
    }

    pub fn acquire_calls(&self) -> usize {
        self.state().acquire_calls
    }

    pub fn present_calls(&self) -> usize {
        self.state().present_calls
    }

    pub fn submit_calls(&self) -> usize {
        self.state().submit_calls
    }

    pub fn empty_submits(&self) -> usize {
        self.state().empty_submits
    }

    /// Secondary counts of each `cmd_execute_commands` call.
    pub fn execute_batches(&self) -> Vec<usize> {
        self.state().execute_batches.clone()
    }

    pub fn clear_rects(&self) -> usize {
        self.state().clear_rects
    }

    pub fn submitted_fences(&self) -> HashSet<vk::Fence> {
        self.state().submitted_fences.clone()
    }

    pub fn secondary_thread(&self, cmd: vk::CommandBuffer) -> Option<ThreadId> {
        self.state().secondary_threads.get(&cmd).copied()
    }

    pub fn inheritances(&self) -> Vec<Inheritance> {
        self.state().inheritances.clone()
    }

    pub fn violations(&self) -> Vec<String> {
        self.state().violations.clone()
    }
}

impl DeviceOps for FakeDevice {
    fn handles(&self) -> DeviceHandles {
        DeviceHandles {
            graphics_queue: vk::Queue::from_raw(0xA),
            present_queue: vk::Queue::from_raw(0xA),
            ..DeviceHandles::default()
        }
    }

    fn surface_support(&self) -> VkResult<SurfaceSupport> {
        Ok(self.state().support.clone())
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR> {
        let mut s = self.state();
        let count = s.image_count.max(desc.min_image_count);
        let images: Vec<vk::Image> = (0..count).map(|_| s.next()).collect();
        let sc = s.next();
        s.swapchains.insert(sc, images);
        s.last_swapchain = Some(desc.clone());
        s.image_fences.clear();
        Ok(sc)
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        self.state()
            .swapchains
            .get(&swapchain)
            .cloned()
            .ok_or(vk::Result::ERROR_SURFACE_LOST_KHR)
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        let mut s = self.state();
        s.held.remove(&swapchain);
        if s.swapchains.remove(&swapchain).is_none() {
            s.violations.push(format!("destroy of unknown swapchain {swapchain:?}"));
        }
    }

    fn create_image_view(&self, _image: vk::Image, _format: vk::Format) -> VkResult<vk::ImageView> {
        let mut s = self.state();
        let v = s.next();
        s.views.insert(v);
        Ok(v)
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        self.state().views.remove(&view);
    }

    fn create_render_pass(&self, _format: vk::Format) -> VkResult<vk::RenderPass> {
        let mut s = self.state();
        let rp = s.next();
        s.render_passes.insert(rp);
        Ok(rp)
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        self.state().render_passes.remove(&render_pass);
    }

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        _extent: vk::Extent2D,
    ) -> VkResult<vk::Framebuffer> {
        let mut s = self.state();
        if !s.render_passes.contains(&render_pass) || !s.views.contains(&view) {
            s.violations.push("framebuffer over dead render pass or view".into());
        }
        let fb = s.next();
        s.framebuffers.insert(fb);
        Ok(fb)
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        self.state().framebuffers.remove(&framebuffer);
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        let mut s = self.state();
        let sem = s.next();
        s.semaphores.insert(sem);
        Ok(sem)
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.state().semaphores.remove(&semaphore);
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let mut s = self.state();
        let f = s.next();
        let state = if signaled {
            FenceState::Signaled
        } else {
            FenceState::Unsignaled
        };
        s.fences.insert(f, state);
        Ok(f)
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        let mut s = self.state();
        if s.fences.remove(&fence) == Some(FenceState::Pending) {
            s.violations.push(format!("fence {fence:?} destroyed while pending"));
        }
    }

    fn wait_fence(&self, fence: vk::Fence) -> VkResult<()> {
        let mut s = self.state();
        match s.fences.get(&fence).copied() {
            Some(FenceState::Pending) | Some(FenceState::Signaled) => {
                s.fences.insert(fence, FenceState::Signaled);
                Ok(())
            }
            Some(FenceState::Unsignaled) => {
                s.violations
                    .push(format!("wait on unsignaled fence {fence:?} with no pending work"));
                Err(vk::Result::TIMEOUT)
            }
            None => {
                s.violations.push(format!("wait on unknown fence {fence:?}"));
                Err(vk::Result::ERROR_UNKNOWN)
            }
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        let mut s = self.state();
        if s.fences.get(&fence) == Some(&FenceState::Pending) {
            s.violations.push(format!("reset of pending fence {fence:?}"));
        }
        s.fences.insert(fence, FenceState::Unsignaled);
        Ok(())
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        let mut s = self.state();
        s.acquire_calls += 1;
        if s.out_of_date_acquires > 0 {
            s.out_of_date_acquires -= 1;
            return Err(vk::Result::ERROR_OUT_OF_DATE_KHR);
        }
        if let Some(err) = s.acquire_error.take() {
            return Err(err);
        }
        if !s.semaphores.contains(&signal) {
            s.violations.push("acquire with unknown semaphore".into());
        }
        let count = match s.swapchains.get(&swapchain) {
            Some(images) => images.len(),
            None => {
                s.violations.push("acquire from unknown swapchain".into());
                return Err(vk::Result::ERROR_SURFACE_LOST_KHR);
            }
        };

        let cursor = s.acquire_cursor;
        s.acquire_cursor += 1;
        let index = if s.acquire_order.is_empty() {
            (cursor % count) as u32
        } else {
            s.acquire_order[cursor % s.acquire_order.len()]
        };
        if !s.held.entry(swapchain).or_default().insert(index) {
            s.violations
                .push(format!("image {index} acquired again before it was presented"));
        }
        s.acquired = Some(index);
        Ok((index, false))
    }

    fn queue_present(
        &self,
        _queue: vk::Queue,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        _wait: vk::Semaphore,
    ) -> VkResult<bool> {
        let mut s = self.state();
        s.present_calls += 1;
        if !s.swapchains.contains_key(&swapchain) {
            s.violations.push("present to unknown swapchain".into());
        }
        // the image goes back to the engine even when present reports an error
        let released = s
            .held
            .get_mut(&swapchain)
            .is_some_and(|held| held.remove(&image_index));
        if !released {
            s.violations
                .push(format!("present of image {image_index} that was never acquired"));
        }
        if let Some(err) = s.present_error.take() {
            return Err(err);
        }
        Ok(std::mem::take(&mut s.suboptimal_present))
    }

    fn queue_submit(&self, _queue: vk::Queue, submit: &SubmitDesc) -> VkResult<()> {
        let mut s = self.state();
        if let Some(err) = s.submit_error.take() {
            return Err(err);
        }
        s.submit_calls += 1;

        match s.fences.get(&submit.fence).copied() {
            Some(FenceState::Unsignaled) => {}
            Some(other) => s
                .violations
                .push(format!("submit with fence {:?} in state {other:?}", submit.fence)),
            None if submit.fence != vk::Fence::null() => {
                s.violations.push("submit with unknown fence".into())
            }
            None => {}
        }

        match submit.command_buffer {
            Some(cmd) => {
                if let Some(image) = s.acquired.take() {
                    if let Some(prev) = s.image_fences.get(&image).copied() {
                        if s.fences.get(&prev) == Some(&FenceState::Pending) {
                            s.violations.push(format!(
                                "image {image} reused while fence {prev:?} is pending"
                            ));
                        }
                    }
                    s.image_fences.insert(image, submit.fence);
                }
                let mut touched = vec![cmd];
                touched.extend(s.executed.get(&cmd).cloned().unwrap_or_default());
                for buf in touched {
                    s.buffer_fences.insert(buf, submit.fence);
                }
                s.submitted_fences.insert(submit.fence);
            }
            None => s.empty_submits += 1,
        }

        if submit.fence != vk::Fence::null() {
            s.fences.insert(submit.fence, FenceState::Pending);
        }
        Ok(())
    }

    fn create_command_pool(
        &self,
        _family: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> VkResult<vk::CommandPool> {
        let mut s = self.state();
        let pool = s.next();
        s.pools.insert(pool, flags);
        Ok(pool)
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        let mut s = self.state();
        s.pools.remove(&pool);
        s.buffers.retain(|_, p| *p != pool);
    }

    fn allocate_command_buffer(
        &self,
        pool: vk::CommandPool,
        _level: vk::CommandBufferLevel,
    ) -> VkResult<vk::CommandBuffer> {
        let mut s = self.state();
        if !s.pools.contains_key(&pool) {
            return Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        }
        let cmd = s.next();
        s.buffers.insert(cmd, pool);
        Ok(cmd)
    }

    fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        let mut s = self.state();
        if let Some(fence) = s.buffer_fences.get(&cmd).copied() {
            if s.fences.get(&fence) == Some(&FenceState::Pending) {
                s.violations
                    .push(format!("command buffer {cmd:?} reset while in flight"));
            }
        }
        s.executed.remove(&cmd);
        Ok(())
    }

    fn begin_primary(&self, _cmd: vk::CommandBuffer) -> VkResult<()> {
        Ok(())
    }

    fn begin_secondary(&self, cmd: vk::CommandBuffer, inheritance: &Inheritance) -> VkResult<()> {
        let mut s = self.state();
        if let Some(err) = s.secondary_begin_error.take() {
            return Err(err);
        }
        s.secondary_threads
            .insert(cmd, std::thread::current().id());
        s.inheritances.push(*inheritance);
        Ok(())
    }

    fn end_command_buffer(&self, _cmd: vk::CommandBuffer) -> VkResult<()> {
        Ok(())
    }

    fn cmd_begin_render_pass(
        &self,
        _cmd: vk::CommandBuffer,
        _render_pass: vk::RenderPass,
        _framebuffer: vk::Framebuffer,
        _extent: vk::Extent2D,
        _clear: [f32; 4],
        contents: vk::SubpassContents,
    ) {
        if contents != vk::SubpassContents::SECONDARY_COMMAND_BUFFERS {
            self.state()
                .violations
                .push("render pass begun with inline contents".into());
        }
    }

    fn cmd_end_render_pass(&self, _cmd: vk::CommandBuffer) {}

    fn cmd_execute_commands(&self, primary: vk::CommandBuffer, secondaries: &[vk::CommandBuffer]) {
        let mut s = self.state();
        s.executed
            .entry(primary)
            .or_default()
            .extend_from_slice(secondaries);
        s.execute_batches.push(secondaries.len());
    }

    fn cmd_set_viewport_scissor(&self, _cmd: vk::CommandBuffer, _extent: vk::Extent2D) {}

    fn cmd_clear_rect(&self, _cmd: vk::CommandBuffer, _rect: vk::Rect2D, _color: [f32; 4]) {
        self.state().clear_rects += 1;
    }

    fn create_descriptor_pool(&self) -> VkResult<vk::DescriptorPool> {
        let mut s = self.state();
        let pool = s.next();
        s.descriptor_pools.insert(pool);
        Ok(pool)
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        self.state().descriptor_pools.remove(&pool);
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        let mut s = self.state();
        for state in s.fences.values_mut() {
            if *state == FenceState::Pending {
                *state = FenceState::Signaled;
            }
        }
        Ok(())
    }
}
