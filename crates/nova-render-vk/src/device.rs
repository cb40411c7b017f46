// SPDX-License-Identifier: CEPL-1.0
//! Instance, surface, adapter and logical device bring-up.
//!
//! STRICT ORDER: instance (with WSI + optional debug exts), surface from that
//! instance, adapter queried against that surface, then the device. Teardown
//! runs the other way round.

use ash::khr::{surface, swapchain};
use ash::{vk, Entry, Instance};
use nova_render::RenderWindow;
use raw_window_handle::RawDisplayHandle;
use std::ffi::{c_void, CStr};
use tracing::{debug, info};

use crate::debug::{messenger_create_info, validation_layer_supported, DebugMessenger, VALIDATION_LAYER};
use crate::error::{check, DeviceError};
use crate::extensions::{
    extension_names, has_extensions, log_device_extensions, required_device_extensions,
    requires_swapchain,
};
use crate::ops::{
    DeviceHandles, DeviceOps, Inheritance, SubmitDesc, SurfaceSupport, SwapchainDesc, VkResult,
};

const APP_NAME: &CStr = c"Nova";
const ENGINE_NAME: &CStr = c"Nova Core";

/// What adapter selection needs to know about one queue family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueFamilyInfo {
    pub flags: vk::QueueFlags,
    pub queue_count: u32,
    /// Can present to the window surface.
    pub present: bool,
}

#[derive(Clone, Debug)]
pub struct AdapterInfo {
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub max_image_dimension_2d: u32,
    pub queue_families: Vec<QueueFamilyInfo>,
    pub extensions: Vec<String>,
    pub surface_format_count: usize,
    pub present_mode_count: usize,
}

impl AdapterInfo {
    /// Ranks lexicographically: any discrete GPU beats any other type, then
    /// the larger 2D image limit wins.
    pub fn score(&self) -> (bool, u32) {
        (
            self.device_type == vk::PhysicalDeviceType::DISCRETE_GPU,
            self.max_image_dimension_2d,
        )
    }

    pub fn is_suitable(&self, required: &[&CStr]) -> bool {
        let families = select_queue_families(&self.queue_families);
        if families.graphics.is_none() || families.present.is_none() {
            return false;
        }
        if !has_extensions(&self.extensions, required) {
            return false;
        }
        if requires_swapchain(required) {
            return self.surface_format_count > 0 && self.present_mode_count > 0;
        }
        true
    }
}

/// Family picks before fallbacks are applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
    pub compute: Option<u32>,
    pub transfer: Option<u32>,
}

impl QueueFamilyIndices {
    /// Compute and transfer fall back to the graphics family.
    pub fn resolve(&self) -> Option<QueueFamilies> {
        let graphics = self.graphics?;
        Some(QueueFamilies {
            graphics,
            present: self.present?,
            compute: self.compute.unwrap_or(graphics),
            transfer: self.transfer.unwrap_or(graphics),
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
    pub compute: u32,
    pub transfer: u32,
}

impl QueueFamilies {
    /// Distinct families in role order; one queue-create-info each.
    pub fn unique(&self) -> Vec<u32> {
        let mut out = Vec::with_capacity(4);
        for family in [self.graphics, self.present, self.compute, self.transfer] {
            if !out.contains(&family) {
                out.push(family);
            }
        }
        out
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AdapterSelection {
    pub physical_device: vk::PhysicalDevice,
    pub families: QueueFamilies,
    pub properties: vk::PhysicalDeviceProperties,
    pub features: vk::PhysicalDeviceFeatures,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Queues {
    pub graphics: vk::Queue,
    pub present: vk::Queue,
    pub compute: vk::Queue,
    pub transfer: vk::Queue,
}

fn find_family(families: &[QueueFamilyInfo], pred: impl Fn(&QueueFamilyInfo) -> bool) -> Option<u32> {
    families
        .iter()
        .position(|f| f.queue_count > 0 && pred(f))
        .map(|i| i as u32)
}

/// Present prefers the graphics family so a single queue can do both.
/// Compute prefers a family without graphics, transfer one with neither.
pub fn select_queue_families(families: &[QueueFamilyInfo]) -> QueueFamilyIndices {
    use vk::QueueFlags as Q;

    let graphics = find_family(families, |f| f.flags.contains(Q::GRAPHICS));
    let present = graphics
        .filter(|&g| families[g as usize].present)
        .or_else(|| find_family(families, |f| f.present));
    let compute = find_family(families, |f| {
        f.flags.contains(Q::COMPUTE) && !f.flags.contains(Q::GRAPHICS)
    })
    .or_else(|| find_family(families, |f| f.flags.contains(Q::COMPUTE)));
    let transfer = find_family(families, |f| {
        f.flags.contains(Q::TRANSFER) && !f.flags.intersects(Q::GRAPHICS | Q::COMPUTE)
    })
    .or_else(|| find_family(families, |f| f.flags.contains(Q::TRANSFER)));

    QueueFamilyIndices {
        graphics,
        present,
        compute,
        transfer,
    }
}

/// Index of the highest-scoring suitable adapter; the first one wins ties.
pub fn pick_best_adapter(adapters: &[AdapterInfo], required: &[&CStr]) -> Option<usize> {
    let mut best: Option<(usize, (bool, u32))> = None;
    for (i, adapter) in adapters.iter().enumerate() {
        if !adapter.is_suitable(required) {
            debug!("adapter '{}' is not suitable", adapter.name);
            continue;
        }
        let score = adapter.score();
        debug!(
            "adapter '{}' scored discrete={} max_dim={}",
            adapter.name, score.0, score.1
        );
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i)
}

/// Returns the instance and whether validation ended up enabled.
unsafe fn create_instance(
    entry: &Entry,
    display: RawDisplayHandle,
    validation: bool,
) -> Result<(Instance, bool), DeviceError> {
    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: APP_NAME.as_ptr(),
        application_version: vk::make_api_version(0, 0, 1, 0),
        p_engine_name: ENGINE_NAME.as_ptr(),
        engine_version: vk::make_api_version(0, 0, 1, 0),
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    let ext_slice = check(
        "vkEnumerateInstanceExtensionProperties",
        ash_window::enumerate_required_extensions(display),
    )?;
    let mut extensions = ext_slice.to_vec();

    let validation = validation && validation_layer_supported(entry);
    let layers = [VALIDATION_LAYER.as_ptr()];
    let debug_ci = messenger_create_info();
    if validation {
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
    }

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_next: if validation {
            &debug_ci as *const vk::DebugUtilsMessengerCreateInfoEXT as *const c_void
        } else {
            std::ptr::null()
        },
        p_application_info: &app_info,
        enabled_layer_count: if validation { layers.len() as u32 } else { 0 },
        pp_enabled_layer_names: if validation { layers.as_ptr() } else { std::ptr::null() },
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        ..Default::default()
    };

    let instance = check("vkCreateInstance", entry.create_instance(&create_info, None))?;
    info!(
        "Vulkan instance created ({} extensions, validation {})",
        extensions.len(),
        if validation { "on" } else { "off" }
    );
    Ok((instance, validation))
}

unsafe fn queue_family_infos(
    instance: &Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
    phys: vk::PhysicalDevice,
) -> Vec<QueueFamilyInfo> {
    instance
        .get_physical_device_queue_family_properties(phys)
        .iter()
        .enumerate()
        .map(|(i, q)| QueueFamilyInfo {
            flags: q.queue_flags,
            queue_count: q.queue_count,
            present: surface_loader
                .get_physical_device_surface_support(phys, i as u32, surface)
                .unwrap_or(false),
        })
        .collect()
}

unsafe fn adapter_info(
    instance: &Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
    phys: vk::PhysicalDevice,
) -> Result<(AdapterInfo, Vec<vk::ExtensionProperties>), DeviceError> {
    let props = instance.get_physical_device_properties(phys);
    let ext_props = check(
        "vkEnumerateDeviceExtensionProperties",
        instance.enumerate_device_extension_properties(phys),
    )?;
    let name = props
        .device_name_as_c_str()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "<unnamed>".to_owned());

    let info = AdapterInfo {
        name,
        device_type: props.device_type,
        max_image_dimension_2d: props.limits.max_image_dimension2_d,
        queue_families: queue_family_infos(instance, surface_loader, surface, phys),
        extensions: extension_names(&ext_props),
        surface_format_count: surface_loader
            .get_physical_device_surface_formats(phys, surface)
            .map(|f| f.len())
            .unwrap_or(0),
        present_mode_count: surface_loader
            .get_physical_device_surface_present_modes(phys, surface)
            .map(|m| m.len())
            .unwrap_or(0),
    };
    Ok((info, ext_props))
}

unsafe fn pick_physical_device(
    instance: &Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
    required: &[&CStr],
) -> Result<AdapterSelection, DeviceError> {
    let devices = check("vkEnumeratePhysicalDevices", instance.enumerate_physical_devices())?;
    if devices.is_empty() {
        return Err(DeviceError::NoSuitableAdapter(
            "no Vulkan-capable adapters present".to_owned(),
        ));
    }

    let mut adapters = Vec::with_capacity(devices.len());
    let mut ext_lists = Vec::with_capacity(devices.len());
    for &phys in &devices {
        let (info, exts) = adapter_info(instance, surface_loader, surface, phys)?;
        adapters.push(info);
        ext_lists.push(exts);
    }

    let Some(best) = pick_best_adapter(&adapters, required) else {
        let names: Vec<&str> = adapters.iter().map(|a| a.name.as_str()).collect();
        return Err(DeviceError::NoSuitableAdapter(format!(
            "checked [{}]; none offers graphics and present queues plus {}",
            names.join(", "),
            required
                .iter()
                .map(|r| r.to_string_lossy())
                .collect::<Vec<_>>()
                .join(", ")
        )));
    };

    let adapter = &adapters[best];
    let phys = devices[best];
    let families = select_queue_families(&adapter.queue_families)
        .resolve()
        .ok_or_else(|| DeviceError::NoSuitableAdapter(adapter.name.clone()))?;

    info!("selected GPU: {}", adapter.name);
    info!(
        "queue families: graphics={} present={} compute={} transfer={}",
        families.graphics, families.present, families.compute, families.transfer
    );
    for (i, f) in adapter.queue_families.iter().enumerate() {
        debug!(
            "  family {i}: {:?} x{} present={}",
            f.flags, f.queue_count, f.present
        );
    }
    log_device_extensions(&ext_lists[best]);

    Ok(AdapterSelection {
        physical_device: phys,
        families,
        properties: instance.get_physical_device_properties(phys),
        features: instance.get_physical_device_features(phys),
        memory_properties: instance.get_physical_device_memory_properties(phys),
    })
}

unsafe fn create_logical_device(
    instance: &Instance,
    selection: &AdapterSelection,
    required: &[&CStr],
) -> Result<(ash::Device, Queues), DeviceError> {
    if selection.physical_device == vk::PhysicalDevice::null() {
        return Err(DeviceError::NoAdapter);
    }

    let priorities = [1.0_f32];
    let queue_infos: Vec<vk::DeviceQueueCreateInfo> = selection
        .families
        .unique()
        .into_iter()
        .map(|family| vk::DeviceQueueCreateInfo {
            s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
            queue_family_index: family,
            queue_count: 1,
            p_queue_priorities: priorities.as_ptr(),
            ..Default::default()
        })
        .collect();

    let ext_ptrs: Vec<*const std::ffi::c_char> = required.iter().map(|e| e.as_ptr()).collect();
    let features = vk::PhysicalDeviceFeatures::default();

    let dinfo = vk::DeviceCreateInfo {
        s_type: vk::StructureType::DEVICE_CREATE_INFO,
        queue_create_info_count: queue_infos.len() as u32,
        p_queue_create_infos: queue_infos.as_ptr(),
        enabled_extension_count: ext_ptrs.len() as u32,
        pp_enabled_extension_names: ext_ptrs.as_ptr(),
        p_enabled_features: &features,
        ..Default::default()
    };

    let device = check(
        "vkCreateDevice",
        instance.create_device(selection.physical_device, &dinfo, None),
    )?;
    let f = selection.families;
    let queues = Queues {
        graphics: device.get_device_queue(f.graphics, 0),
        present: device.get_device_queue(f.present, 0),
        compute: device.get_device_queue(f.compute, 0),
        transfer: device.get_device_queue(f.transfer, 0),
    };
    info!("logical device created ({} queue families)", queue_infos.len());
    Ok((device, queues))
}

/// Instance-level objects. Owns nothing device-scoped.
struct InstanceChain {
    _entry: Entry,
    instance: Instance,
    debug: Option<DebugMessenger>,
    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,
}

impl InstanceChain {
    unsafe fn new(window: &dyn RenderWindow, validation: bool) -> Result<Self, DeviceError> {
        let dh = window.display_handle()?.as_raw();
        let wh = window.window_handle()?.as_raw();

        let entry = Entry::linked();
        let (instance, validation) = create_instance(&entry, dh, validation)?;

        let debug = if validation {
            match DebugMessenger::new(&entry, &instance) {
                Ok(m) => Some(m),
                Err(e) => {
                    instance.destroy_instance(None);
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        let surface_loader = surface::Instance::new(&entry, &instance);
        let surface = match check(
            "vkCreateSurfaceKHR",
            ash_window::create_surface(&entry, &instance, dh, wh, None),
        ) {
            Ok(s) => s,
            Err(e) => {
                if let Some(m) = &debug {
                    m.destroy();
                }
                instance.destroy_instance(None);
                return Err(e.into());
            }
        };

        Ok(Self {
            _entry: entry,
            instance,
            debug,
            surface_loader,
            surface,
        })
    }

    unsafe fn destroy(&mut self) {
        if let Some(m) = self.debug.take() {
            m.destroy();
        }
        self.surface_loader.destroy_surface(self.surface, None);
        self.surface = vk::SurfaceKHR::null();
        self.instance.destroy_instance(None);
    }
}

/// Owns the Vulkan instance, surface, adapter choice and logical device.
pub struct GraphicsDevice {
    chain: InstanceChain,
    selection: AdapterSelection,
    device: ash::Device,
    swapchain_loader: swapchain::Device,
    queues: Queues,
    destroyed: bool,
}

impl GraphicsDevice {
    pub fn new(window: &dyn RenderWindow, validation: bool) -> Result<Self, DeviceError> {
        let required = required_device_extensions();
        unsafe {
            let mut chain = InstanceChain::new(window, validation)?;
            let built = pick_physical_device(
                &chain.instance,
                &chain.surface_loader,
                chain.surface,
                &required,
            )
            .and_then(|selection| {
                let (device, queues) = create_logical_device(&chain.instance, &selection, &required)?;
                Ok((selection, device, queues))
            });
            let (selection, device, queues) = match built {
                Ok(v) => v,
                Err(e) => {
                    chain.destroy();
                    return Err(e);
                }
            };

            let swapchain_loader = swapchain::Device::new(&chain.instance, &device);
            Ok(Self {
                chain,
                selection,
                device,
                swapchain_loader,
                queues,
                destroyed: false,
            })
        }
    }

    /// The caller guarantees the device is idle and every child object is gone.
    /// Idempotent; no other method may be called afterwards.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        unsafe {
            self.device.destroy_device(None);
            self.chain.destroy();
        }
        self.selection = AdapterSelection::default();
        self.queues = Queues::default();
        self.destroyed = true;
        info!("graphics device destroyed");
    }
}

impl Drop for GraphicsDevice {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl DeviceOps for GraphicsDevice {
    fn handles(&self) -> DeviceHandles {
        DeviceHandles {
            instance: self.chain.instance.handle(),
            physical_device: self.selection.physical_device,
            device: self.device.handle(),
            graphics_family: self.selection.families.graphics,
            graphics_queue: self.queues.graphics,
            present_family: self.selection.families.present,
            present_queue: self.queues.present,
        }
    }

    fn surface_support(&self) -> VkResult<SurfaceSupport> {
        let phys = self.selection.physical_device;
        let surf = self.chain.surface;
        let loader = &self.chain.surface_loader;
        unsafe {
            Ok(SurfaceSupport {
                capabilities: loader.get_physical_device_surface_capabilities(phys, surf)?,
                formats: loader.get_physical_device_surface_formats(phys, surf)?,
                present_modes: loader.get_physical_device_surface_present_modes(phys, surf)?,
            })
        }
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR> {
        let concurrent = desc.queue_families.len() > 1;
        let info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: self.chain.surface,
            min_image_count: desc.min_image_count,
            image_format: desc.format.format,
            image_color_space: desc.format.color_space,
            image_extent: desc.extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST,
            image_sharing_mode: if concurrent {
                vk::SharingMode::CONCURRENT
            } else {
                vk::SharingMode::EXCLUSIVE
            },
            queue_family_index_count: if concurrent { desc.queue_families.len() as u32 } else { 0 },
            p_queue_family_indices: if concurrent {
                desc.queue_families.as_ptr()
            } else {
                std::ptr::null()
            },
            pre_transform: desc.pre_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode: desc.present_mode,
            clipped: vk::TRUE,
            ..Default::default()
        };
        unsafe { self.swapchain_loader.create_swapchain(&info, None) }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) }
    }

    fn create_image_view(&self, image: vk::Image, format: vk::Format) -> VkResult<vk::ImageView> {
        let info = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };
        unsafe { self.device.create_image_view(&info, None) }
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(view, None) }
    }

    fn create_render_pass(&self, format: vk::Format) -> VkResult<vk::RenderPass> {
        let color_att = vk::AttachmentDescription {
            format,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            ..Default::default()
        };
        let att_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };
        let subpass = vk::SubpassDescription {
            pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
            color_attachment_count: 1,
            p_color_attachments: &att_ref,
            ..Default::default()
        };
        // image-available is waited at color output; order the layout change after it
        let dependency = vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            src_access_mask: vk::AccessFlags::empty(),
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            ..Default::default()
        };
        let info = vk::RenderPassCreateInfo {
            s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
            attachment_count: 1,
            p_attachments: &color_att,
            subpass_count: 1,
            p_subpasses: &subpass,
            dependency_count: 1,
            p_dependencies: &dependency,
            ..Default::default()
        };
        unsafe { self.device.create_render_pass(&info, None) }
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        unsafe { self.device.destroy_render_pass(render_pass, None) }
    }

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> VkResult<vk::Framebuffer> {
        let info = vk::FramebufferCreateInfo {
            s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
            render_pass,
            attachment_count: 1,
            p_attachments: &view,
            width: extent.width,
            height: extent.height,
            layers: 1,
            ..Default::default()
        };
        unsafe { self.device.create_framebuffer(&info, None) }
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.device.destroy_framebuffer(framebuffer, None) }
    }

    fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        let info = vk::SemaphoreCreateInfo {
            s_type: vk::StructureType::SEMAPHORE_CREATE_INFO,
            ..Default::default()
        };
        unsafe { self.device.create_semaphore(&info, None) }
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device.destroy_semaphore(semaphore, None) }
    }

    fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let info = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: if signaled {
                vk::FenceCreateFlags::SIGNALED
            } else {
                vk::FenceCreateFlags::empty()
            },
            ..Default::default()
        };
        unsafe { self.device.create_fence(&info, None) }
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device.destroy_fence(fence, None) }
    }

    fn wait_fence(&self, fence: vk::Fence) -> VkResult<()> {
        unsafe { self.device.wait_for_fences(&[fence], true, u64::MAX) }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        unsafe { self.device.reset_fences(&[fence]) }
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        unsafe {
            self.swapchain_loader
                .acquire_next_image(swapchain, u64::MAX, signal, vk::Fence::null())
        }
    }

    fn queue_present(
        &self,
        queue: vk::Queue,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> VkResult<bool> {
        let info = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &wait,
            swapchain_count: 1,
            p_swapchains: &swapchain,
            p_image_indices: &image_index,
            ..Default::default()
        };
        unsafe { self.swapchain_loader.queue_present(queue, &info) }
    }

    fn queue_submit(&self, queue: vk::Queue, submit: &SubmitDesc) -> VkResult<()> {
        let cmds = submit.command_buffer;
        let wait_sems = submit.wait.map(|(sem, _)| sem);
        let wait_stages = submit.wait.map(|(_, stage)| stage);
        let signal = submit.signal;

        let info = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: wait_sems.as_slice().len() as u32,
            p_wait_semaphores: wait_sems.as_slice().as_ptr(),
            p_wait_dst_stage_mask: wait_stages.as_slice().as_ptr(),
            command_buffer_count: cmds.as_slice().len() as u32,
            p_command_buffers: cmds.as_slice().as_ptr(),
            signal_semaphore_count: signal.as_slice().len() as u32,
            p_signal_semaphores: signal.as_slice().as_ptr(),
            ..Default::default()
        };
        unsafe {
            self.device
                .queue_submit(queue, std::slice::from_ref(&info), submit.fence)
        }
    }

    fn create_command_pool(
        &self,
        family: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> VkResult<vk::CommandPool> {
        let info = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            flags,
            queue_family_index: family,
            ..Default::default()
        };
        unsafe { self.device.create_command_pool(&info, None) }
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe { self.device.destroy_command_pool(pool, None) }
    }

    fn allocate_command_buffer(
        &self,
        pool: vk::CommandPool,
        level: vk::CommandBufferLevel,
    ) -> VkResult<vk::CommandBuffer> {
        let info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: pool,
            level,
            command_buffer_count: 1,
            ..Default::default()
        };
        let mut bufs = unsafe { self.device.allocate_command_buffers(&info)? };
        bufs.pop().ok_or(vk::Result::ERROR_UNKNOWN)
    }

    fn reset_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        unsafe {
            self.device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
        }
    }

    fn begin_primary(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        let info = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            ..Default::default()
        };
        unsafe { self.device.begin_command_buffer(cmd, &info) }
    }

    fn begin_secondary(&self, cmd: vk::CommandBuffer, inheritance: &Inheritance) -> VkResult<()> {
        let inherit = vk::CommandBufferInheritanceInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_INHERITANCE_INFO,
            render_pass: inheritance.render_pass,
            subpass: inheritance.subpass,
            framebuffer: inheritance.framebuffer,
            ..Default::default()
        };
        let info = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            flags: vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE
                | vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            p_inheritance_info: &inherit,
            ..Default::default()
        };
        unsafe { self.device.begin_command_buffer(cmd, &info) }
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> VkResult<()> {
        unsafe { self.device.end_command_buffer(cmd) }
    }

    fn cmd_begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear: [f32; 4],
        contents: vk::SubpassContents,
    ) {
        let clears = [vk::ClearValue {
            color: vk::ClearColorValue { float32: clear },
        }];
        let info = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass,
            framebuffer,
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            },
            clear_value_count: clears.len() as u32,
            p_clear_values: clears.as_ptr(),
            ..Default::default()
        };
        unsafe { self.device.cmd_begin_render_pass(cmd, &info, contents) }
    }

    fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer) {
        unsafe { self.device.cmd_end_render_pass(cmd) }
    }

    fn cmd_execute_commands(&self, primary: vk::CommandBuffer, secondaries: &[vk::CommandBuffer]) {
        if secondaries.is_empty() {
            return;
        }
        unsafe { self.device.cmd_execute_commands(primary, secondaries) }
    }

    fn cmd_set_viewport_scissor(&self, cmd: vk::CommandBuffer, extent: vk::Extent2D) {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        unsafe {
            self.device.cmd_set_viewport(cmd, 0, &[viewport]);
            self.device.cmd_set_scissor(cmd, 0, &[scissor]);
        }
    }

    fn cmd_clear_rect(&self, cmd: vk::CommandBuffer, rect: vk::Rect2D, color: [f32; 4]) {
        let attachment = vk::ClearAttachment {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            color_attachment: 0,
            clear_value: vk::ClearValue {
                color: vk::ClearColorValue { float32: color },
            },
        };
        let clear_rect = vk::ClearRect {
            rect,
            base_array_layer: 0,
            layer_count: 1,
        };
        unsafe {
            self.device
                .cmd_clear_attachments(cmd, &[attachment], &[clear_rect])
        }
    }

    fn create_descriptor_pool(&self) -> VkResult<vk::DescriptorPool> {
        const PER_TYPE: u32 = 1000;
        let sizes = [
            vk::DescriptorType::SAMPLER,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            vk::DescriptorType::SAMPLED_IMAGE,
            vk::DescriptorType::STORAGE_IMAGE,
            vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
            vk::DescriptorType::STORAGE_TEXEL_BUFFER,
            vk::DescriptorType::UNIFORM_BUFFER,
            vk::DescriptorType::STORAGE_BUFFER,
            vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
            vk::DescriptorType::INPUT_ATTACHMENT,
        ]
        .map(|ty| vk::DescriptorPoolSize {
            ty,
            descriptor_count: PER_TYPE,
        });
        let info = vk::DescriptorPoolCreateInfo {
            s_type: vk::StructureType::DESCRIPTOR_POOL_CREATE_INFO,
            flags: vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET,
            max_sets: PER_TYPE * sizes.len() as u32,
            pool_size_count: sizes.len() as u32,
            p_pool_sizes: sizes.as_ptr(),
            ..Default::default()
        };
        unsafe { self.device.create_descriptor_pool(&info, None) }
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        unsafe { self.device.destroy_descriptor_pool(pool, None) }
    }

    fn device_wait_idle(&self) -> VkResult<()> {
        unsafe { self.device.device_wait_idle() }
    }
}
