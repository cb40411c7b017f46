// SPDX-License-Identifier: CEPL-1.0
//! Every device and WSI call the swapchain and the frame loop make.
//!
//! `GraphicsDevice` implements this over ash; tests use an in-crate fake
//! that tracks fence states and object lifetimes. Handles passed in must
//! have been created through the same implementation.

use ash::vk;

pub type VkResult<T> = Result<T, vk::Result>;

/// Raw handles shared with collaborators such as the UI overlay.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeviceHandles {
    pub instance: vk::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: vk::Device,
    pub graphics_family: u32,
    pub graphics_queue: vk::Queue,
    pub present_family: u32,
    pub present_queue: vk::Queue,
}

#[derive(Clone, Debug, Default)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

#[derive(Clone, Debug)]
pub struct SwapchainDesc {
    pub min_image_count: u32,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    /// One family means exclusive ownership, two distinct families concurrent sharing.
    pub queue_families: Vec<u32>,
}

/// Render pass state a secondary buffer continues.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Inheritance {
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
    pub framebuffer: vk::Framebuffer,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SubmitDesc {
    /// `None` submits no work; the fence and semaphores still signal.
    pub command_buffer: Option<vk::CommandBuffer>,
    pub wait: Option<(vk::Semaphore, vk::PipelineStageFlags)>,
    pub signal: Option<vk::Semaphore>,
    pub fence: vk::Fence,
}

pub trait DeviceOps: Send + Sync {
    fn handles(&self) -> DeviceHandles;

    fn surface_support(&self) -> VkResult<SurfaceSupport>;

    fn create_swapchain(&self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR>;
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;
    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);

    fn create_image_view(&self, image: vk::Image, format: vk::Format) -> VkResult<vk::ImageView>;
    fn destroy_image_view(&self, view: vk::ImageView);

    /// Single color attachment, cleared on load and left in present layout.
    fn create_render_pass(&self, format: vk::Format) -> VkResult<vk::RenderPass>;
    fn destroy_render_pass(&self, render_pass: vk::RenderPass);

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> VkResult<vk::Framebuffer>;
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    fn create_semaphore(&self) -> VkResult<vk::Semaphore>;
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence>;
    fn destroy_fence(&self, fence: vk::Fence);
    /// Blocks without a timeout.
    fn wait_fence(&self, fence: vk::Fence) -> VkResult<()>;
    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()>;

    /// Returns the image index and whether the chain is suboptimal.
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)>;
    /// Returns whether the chain is suboptimal.
    fn queue_present(
        &self,
        queue: vk::Queue,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> VkResult<bool>;
    fn queue_submit(&self, queue: vk::Queue, submit: &SubmitDesc) -> VkResult<()>;

    fn create_command_pool(
        &self,
        family: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> VkResult<vk::CommandPool>;
    /// Frees every buffer allocated from the pool.
    fn destroy_command_pool(&self, pool: vk::CommandPool);
    fn allocate_command_buffer(
        &self,
        pool: vk::CommandPool,
        level: vk::CommandBufferLevel,
    ) -> VkResult<vk::CommandBuffer>;
    fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()>;
    fn begin_primary(&self, cmd: vk::CommandBuffer) -> VkResult<()>;
    fn begin_secondary(&self, cmd: vk::CommandBuffer, inheritance: &Inheritance) -> VkResult<()>;
    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()>;

    fn cmd_begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear: [f32; 4],
        contents: vk::SubpassContents,
    );
    fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer);
    fn cmd_execute_commands(&self, primary: vk::CommandBuffer, secondaries: &[vk::CommandBuffer]);
    fn cmd_set_viewport_scissor(&self, cmd: vk::CommandBuffer, extent: vk::Extent2D);
    /// Clears a rectangle of color attachment 0 inside the active subpass.
    fn cmd_clear_rect(&self, cmd: vk::CommandBuffer, rect: vk::Rect2D, color: [f32; 4]);

    /// Pool sized for an immediate-mode UI renderer's font and texture sets.
    fn create_descriptor_pool(&self) -> VkResult<vk::DescriptorPool>;
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);

    fn device_wait_idle(&self) -> VkResult<()>;
}
