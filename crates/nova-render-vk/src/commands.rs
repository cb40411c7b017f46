// SPDX-License-Identifier: CEPL-1.0
use ash::vk;

use crate::error::{check, SwapchainError};
use crate::ops::DeviceOps;

/// A command pool with the one buffer allocated from it.
///
/// Recording threads get a `&mut CommandSlot`, so a pool can never be
/// touched by two threads at once.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CommandSlot {
    pool: vk::CommandPool,
    buffer: vk::CommandBuffer,
}

impl CommandSlot {
    pub fn create(
        device: &dyn DeviceOps,
        family: u32,
        level: vk::CommandBufferLevel,
    ) -> Result<Self, SwapchainError> {
        let flags = if level == vk::CommandBufferLevel::PRIMARY {
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER
        } else {
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER | vk::CommandPoolCreateFlags::TRANSIENT
        };

        let pool = check(
            "vkCreateCommandPool",
            device.create_command_pool(family, flags),
        )?;
        match check(
            "vkAllocateCommandBuffers",
            device.allocate_command_buffer(pool, level),
        ) {
            Ok(buffer) => Ok(Self { pool, buffer }),
            Err(e) => {
                device.destroy_command_pool(pool);
                Err(e.into())
            }
        }
    }

    pub fn buffer(&self) -> vk::CommandBuffer {
        self.buffer
    }

    pub fn destroy(&mut self, device: &dyn DeviceOps) {
        if self.pool != vk::CommandPool::null() {
            device.destroy_command_pool(self.pool);
        }
        *self = CommandSlot::default();
    }
}

/// Recording resources of one frame slot.
///
/// The last secondary belongs to the UI overlay; the rest are worker slots.
#[derive(Debug, Default)]
pub struct FrameCommands {
    primary: CommandSlot,
    secondaries: Vec<CommandSlot>,
}

impl FrameCommands {
    /// `secondary_slots` is raised to one so the overlay always has a buffer.
    pub fn create(
        device: &dyn DeviceOps,
        family: u32,
        secondary_slots: usize,
    ) -> Result<Self, SwapchainError> {
        let mut frame = FrameCommands::default();
        let built = (|| -> Result<(), SwapchainError> {
            frame.primary = CommandSlot::create(device, family, vk::CommandBufferLevel::PRIMARY)?;
            for _ in 0..secondary_slots.max(1) {
                frame.secondaries.push(CommandSlot::create(
                    device,
                    family,
                    vk::CommandBufferLevel::SECONDARY,
                )?);
            }
            Ok(())
        })();

        match built {
            Ok(()) => Ok(frame),
            Err(e) => {
                frame.destroy(device);
                Err(e)
            }
        }
    }

    pub fn primary(&self) -> vk::CommandBuffer {
        self.primary.buffer()
    }

    pub fn secondary(&self, index: usize) -> Option<vk::CommandBuffer> {
        self.secondaries.get(index).map(CommandSlot::buffer)
    }

    pub fn ui(&self) -> vk::CommandBuffer {
        self.secondaries
            .last()
            .map(CommandSlot::buffer)
            .unwrap_or_default()
    }

    pub fn worker_count(&self) -> usize {
        self.secondaries.len().saturating_sub(1)
    }

    pub fn workers_mut(&mut self) -> &mut [CommandSlot] {
        let n = self.worker_count();
        &mut self.secondaries[..n]
    }

    pub fn destroy(&mut self, device: &dyn DeviceOps) {
        self.primary.destroy(device);
        for slot in &mut self.secondaries {
            slot.destroy(device);
        }
        self.secondaries.clear();
    }
}
