//! FrameScheduler - frames-in-flight pacing and per-frame resources
//!
//! Owns the per-slot command buffers, sync primitives and persistently
//! mapped uniform buffers, and drives the wait / acquire / record / submit
//! / present cycle. The CPU never runs more than MAX_FRAMES_IN_FLIGHT
//! frames ahead of the GPU.

use meridian_3d_engine::meridian3d::model::{DrawRange, UniformBufferObject};
use meridian_3d_engine::meridian3d::{Error, Result};
use meridian_3d_engine::{engine_err, engine_error};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_materials::MaterialStore;
use crate::vulkan_pipeline::Pipeline;
use crate::vulkan_recorder::CommandRecorder;
use crate::vulkan_resources::{Buffer, GeometryBuffers, ResourceFactory};
use crate::vulkan_swapchain::SwapchainManager;

/// Number of frames the CPU may record ahead of the GPU
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Next frame slot after `current`, wrapping at the frames-in-flight count.
pub(crate) fn next_frame_slot(current: usize) -> usize {
    (current + 1) % MAX_FRAMES_IN_FLIGHT
}

/// What happened to the frame that was just driven
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was submitted and queued for presentation
    Presented,
    /// The surface no longer matches the swapchain; the caller must
    /// rebuild before the next frame
    RebuildNeeded,
}

/// Frames-in-flight scheduler
pub struct FrameScheduler {
    ctx: Arc<GpuContext>,
    command_pool: vk::CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
    image_available: Vec<vk::Semaphore>,
    render_finished: Vec<vk::Semaphore>,
    in_flight_fences: Vec<vk::Fence>,
    uniform_buffers: Vec<Buffer>,
    current_frame: usize,
}

impl FrameScheduler {
    /// Allocate the per-slot command buffers, semaphores, fences and
    /// persistently mapped uniform buffers.
    ///
    /// Fences start signaled so the first wait on each slot returns
    /// immediately.
    pub fn new(ctx: Arc<GpuContext>, factory: &ResourceFactory) -> Result<Self> {
        unsafe {
            let pool_info = vk::CommandPoolCreateInfo::default()
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
                .queue_family_index(ctx.graphics_queue_family);
            let command_pool = ctx
                .device
                .create_command_pool(&pool_info, None)
                .map_err(|e| {
                    engine_err!(
                        "meridian3d::vulkan",
                        "Failed to create frame command pool: {:?}",
                        e
                    )
                })?;

            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(MAX_FRAMES_IN_FLIGHT as u32);
            let command_buffers =
                ctx.device.allocate_command_buffers(&alloc_info).map_err(|e| {
                    ctx.device.destroy_command_pool(command_pool, None);
                    engine_err!(
                        "meridian3d::vulkan",
                        "Failed to allocate frame command buffers: {:?}",
                        e
                    )
                })?;

            let semaphore_info = vk::SemaphoreCreateInfo::default();
            let fence_info =
                vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);

            let mut image_available = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
            let mut render_finished = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
            let mut in_flight_fences = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
            let mut uniform_buffers = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);

            for _ in 0..MAX_FRAMES_IN_FLIGHT {
                image_available.push(
                    ctx.device
                        .create_semaphore(&semaphore_info, None)
                        .map_err(|e| {
                            engine_err!(
                                "meridian3d::vulkan",
                                "Failed to create semaphore: {:?}",
                                e
                            )
                        })?,
                );
                render_finished.push(
                    ctx.device
                        .create_semaphore(&semaphore_info, None)
                        .map_err(|e| {
                            engine_err!(
                                "meridian3d::vulkan",
                                "Failed to create semaphore: {:?}",
                                e
                            )
                        })?,
                );
                in_flight_fences.push(ctx.device.create_fence(&fence_info, None).map_err(
                    |e| {
                        engine_err!("meridian3d::vulkan", "Failed to create fence: {:?}", e)
                    },
                )?);

                let mut buffer = factory.create_buffer(
                    std::mem::size_of::<UniformBufferObject>() as vk::DeviceSize,
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                    vk::MemoryPropertyFlags::HOST_VISIBLE
                        | vk::MemoryPropertyFlags::HOST_COHERENT,
                )?;
                buffer.map()?;
                uniform_buffers.push(buffer);
            }

            Ok(Self {
                ctx,
                command_pool,
                command_buffers,
                image_available,
                render_finished,
                in_flight_fences,
                uniform_buffers,
                current_frame: 0,
            })
        }
    }

    /// The per-frame uniform buffers, indexed by frame slot. Material
    /// descriptor sets bind these at construction.
    pub fn uniform_buffers(&self) -> &[Buffer] {
        &self.uniform_buffers
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Drive one frame through the wait / acquire / record / submit /
    /// present cycle.
    ///
    /// When acquisition reports the surface out of date, nothing has been
    /// submitted: the fence stays signaled, the frame slot does not
    /// advance, and the caller rebuilds and retries the same slot. When
    /// presentation reports it, the frame was already submitted, so the
    /// slot advances before the rebuild request is returned.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_frame(
        &mut self,
        swapchain: &SwapchainManager,
        recorder: &CommandRecorder,
        pipeline: &Pipeline,
        geometry: &GeometryBuffers,
        materials: &MaterialStore,
        draws: &[DrawRange],
        ubo: &UniformBufferObject,
    ) -> Result<FrameOutcome> {
        let frame = self.current_frame;
        unsafe {
            self.ctx
                .device
                .wait_for_fences(&[self.in_flight_fences[frame]], true, u64::MAX)
                .map_err(|e| {
                    engine_err!("meridian3d::vulkan", "Failed to wait for fence: {:?}", e)
                })?;

            let acquired = match swapchain.acquire_next_image(self.image_available[frame]) {
                Ok(acquired) => acquired,
                Err(Error::SurfaceOutOfDate) => return Ok(FrameOutcome::RebuildNeeded),
                Err(e) => return Err(e),
            };

            // Only reset once we know work will be submitted this frame
            self.ctx
                .device
                .reset_fences(&[self.in_flight_fences[frame]])
                .map_err(|e| {
                    engine_err!("meridian3d::vulkan", "Failed to reset fence: {:?}", e)
                })?;

            self.uniform_buffers[frame].write(0, bytemuck::bytes_of(ubo))?;

            let command_buffer = self.command_buffers[frame];
            self.ctx
                .device
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| {
                    engine_err!(
                        "meridian3d::vulkan",
                        "Failed to reset command buffer: {:?}",
                        e
                    )
                })?;

            recorder.record(
                command_buffer,
                swapchain.framebuffer(acquired.image_index),
                swapchain.extent(),
                pipeline,
                geometry,
                materials,
                draws,
                frame,
            )?;

            let wait_semaphores = [self.image_available[frame]];
            let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
            let command_buffers = [command_buffer];
            let signal_semaphores = [self.render_finished[frame]];

            let submit_info = vk::SubmitInfo::default()
                .wait_semaphores(&wait_semaphores)
                .wait_dst_stage_mask(&wait_stages)
                .command_buffers(&command_buffers)
                .signal_semaphores(&signal_semaphores);

            self.ctx
                .device
                .queue_submit(
                    self.ctx.graphics_queue,
                    &[submit_info],
                    self.in_flight_fences[frame],
                )
                .map_err(|e| {
                    engine_error!(
                        "meridian3d::vulkan",
                        "Failed to submit frame command buffer: {:?}",
                        e
                    );
                    Error::Backend(format!("Failed to submit frame command buffer: {:?}", e))
                })?;

            let present_result =
                swapchain.present(acquired.image_index, self.render_finished[frame]);

            // The frame was submitted regardless of how presentation went,
            // so the slot always advances from here on.
            self.current_frame = next_frame_slot(self.current_frame);

            match present_result {
                Ok(suboptimal) => {
                    if suboptimal || acquired.suboptimal {
                        Ok(FrameOutcome::RebuildNeeded)
                    } else {
                        Ok(FrameOutcome::Presented)
                    }
                }
                Err(Error::SurfaceOutOfDate) => Ok(FrameOutcome::RebuildNeeded),
                Err(e) => Err(e),
            }
        }
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        self.ctx.wait_idle();
        unsafe {
            for i in 0..MAX_FRAMES_IN_FLIGHT {
                self.ctx.device.destroy_semaphore(self.image_available[i], None);
                self.ctx.device.destroy_semaphore(self.render_finished[i], None);
                self.ctx.device.destroy_fence(self.in_flight_fences[i], None);
            }
            // Uniform buffers unmap and free themselves on drop
            self.ctx.device.destroy_command_pool(self.command_pool, None);
        }
    }
}
