// SPDX-License-Identifier: CEPL-1.0
use ash::vk;

use crate::error::{check, SwapchainError};
use crate::ops::DeviceOps;

/// Frames the CPU may record ahead of the GPU.
pub const FRAMES_IN_FLIGHT: usize = 3;

/// Per-slot synchronization. The fence starts signaled so the first wait is a no-op.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight: vk::Fence,
}

impl FrameSync {
    pub fn create(device: &dyn DeviceOps) -> Result<Self, SwapchainError> {
        let mut sync = FrameSync::default();
        let built = (|| -> Result<(), SwapchainError> {
            sync.image_available = check("vkCreateSemaphore", device.create_semaphore())?;
            sync.render_finished = check("vkCreateSemaphore", device.create_semaphore())?;
            sync.in_flight = check("vkCreateFence", device.create_fence(true))?;
            Ok(())
        })();

        match built {
            Ok(()) => Ok(sync),
            Err(e) => {
                sync.destroy(device);
                Err(e)
            }
        }
    }

    /// Destroys whatever was created; null handles are skipped.
    pub fn destroy(&mut self, device: &dyn DeviceOps) {
        if self.in_flight != vk::Fence::null() {
            device.destroy_fence(self.in_flight);
        }
        for sem in [self.image_available, self.render_finished] {
            if sem != vk::Semaphore::null() {
                device.destroy_semaphore(sem);
            }
        }
        *self = FrameSync::default();
    }
}

/// Slot fence that last used each swapchain image (null = never submitted).
#[derive(Clone, Debug, Default)]
pub struct ImagesInFlight {
    fences: Vec<vk::Fence>,
}

impl ImagesInFlight {
    pub fn new(image_count: usize) -> Self {
        Self {
            fences: vec![vk::Fence::null(); image_count],
        }
    }

    pub fn get(&self, image: usize) -> Option<vk::Fence> {
        self.fences
            .get(image)
            .copied()
            .filter(|f| *f != vk::Fence::null())
    }

    pub fn stamp(&mut self, image: usize, fence: vk::Fence) {
        if let Some(slot) = self.fences.get_mut(image) {
            *slot = fence;
        }
    }

    pub fn clear(&mut self) {
        self.fences.clear();
    }

    pub fn len(&self) -> usize {
        self.fences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }

    pub fn fences(&self) -> &[vk::Fence] {
        &self.fences
    }
}
