//! TransferExecutor - synchronous one-shot command execution
//!
//! Staged uploads, layout transitions and mip-chain generation all run
//! through the same protocol: record into a disposable command buffer from
//! the transient transfer pool, submit to the graphics queue, and block
//! until the queue drains. Intentionally fully synchronous; these paths run
//! during setup and asset loading, never inside the frame loop.

use meridian_3d_engine::meridian3d::{Error, Result};
use meridian_3d_engine::{engine_bail, engine_err, engine_error, engine_trace};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_resources::{Buffer, ResourceFactory};

/// Number of mip levels for a base image of `width` x `height`:
/// `floor(log2(max(width, height))) + 1`, minimum 1.
pub(crate) fn mip_level_count(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    32 - largest.leading_zeros()
}

/// Dimension of mip level `level` for a base dimension `base`:
/// successive floor-halving, clamped to 1.
pub(crate) fn mip_dimension(base: u32, level: u32) -> u32 {
    (base >> level).max(1)
}

/// Whether a depth format carries a stencil component (affects the aspect
/// mask used when transitioning depth attachments).
pub(crate) fn has_stencil_component(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT
    )
}

/// Access-mask/stage pairs for a known image layout transition, keyed on
/// `(old_layout, new_layout)`. Returns `None` for pairs the backend never
/// performs, so callers fail loudly instead of guessing barriers.
pub(crate) fn layout_transition_masks(
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> Option<(
    vk::AccessFlags,
    vk::AccessFlags,
    vk::PipelineStageFlags,
    vk::PipelineStageFlags,
)> {
    match (old_layout, new_layout) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => Some((
            vk::AccessFlags::empty(),
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::TRANSFER,
        )),
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => {
            Some((
                vk::AccessFlags::TRANSFER_WRITE,
                vk::AccessFlags::SHADER_READ,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
            ))
        }
        (
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ) => Some((
            vk::AccessFlags::empty(),
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )),
        _ => None,
    }
}

/// Executor for one-shot, synchronous command sequences
pub struct TransferExecutor {
    ctx: Arc<GpuContext>,
}

impl TransferExecutor {
    pub fn new(ctx: Arc<GpuContext>) -> Self {
        Self { ctx }
    }

    /// Record commands via `record_fn` into a disposable command buffer,
    /// submit to the graphics queue and block until the queue is idle.
    pub fn run_once<F>(&self, record_fn: F) -> Result<()>
    where
        F: FnOnce(vk::CommandBuffer) -> Result<()>,
    {
        unsafe {
            let allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(self.ctx.transfer_command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffer = self
                .ctx
                .device
                .allocate_command_buffers(&allocate_info)
                .map_err(|e| {
                    engine_err!(
                        "meridian3d::vulkan",
                        "Failed to allocate transfer command buffer: {:?}",
                        e
                    )
                })?[0];

            let free = |cb: vk::CommandBuffer| {
                self.ctx
                    .device
                    .free_command_buffers(self.ctx.transfer_command_pool, &[cb]);
            };

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

            if let Err(e) = self
                .ctx
                .device
                .begin_command_buffer(command_buffer, &begin_info)
            {
                free(command_buffer);
                return Err(engine_err!(
                    "meridian3d::vulkan",
                    "Failed to begin transfer command buffer: {:?}",
                    e
                ));
            }

            if let Err(e) = record_fn(command_buffer) {
                free(command_buffer);
                return Err(e);
            }

            if let Err(e) = self.ctx.device.end_command_buffer(command_buffer) {
                free(command_buffer);
                return Err(engine_err!(
                    "meridian3d::vulkan",
                    "Failed to end transfer command buffer: {:?}",
                    e
                ));
            }

            let command_buffers = [command_buffer];
            let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);

            let submit_result = self
                .ctx
                .device
                .queue_submit(self.ctx.graphics_queue, &[submit_info], vk::Fence::null())
                .and_then(|_| self.ctx.device.queue_wait_idle(self.ctx.graphics_queue));

            free(command_buffer);

            submit_result.map_err(|e| {
                engine_err!(
                    "meridian3d::vulkan",
                    "Transfer submission failed: {:?}",
                    e
                )
            })
        }
    }

    /// Upload `data` into a new device-local buffer through a host-visible
    /// staging buffer. The staging buffer is released before returning; it
    /// has no further owner once the copy completes.
    pub fn upload_buffer(
        &self,
        factory: &ResourceFactory,
        data: &[u8],
        usage: vk::BufferUsageFlags,
    ) -> Result<Buffer> {
        let size = data.len() as vk::DeviceSize;
        if size == 0 {
            engine_bail!("meridian3d::vulkan", "Refusing to upload an empty buffer");
        }

        let mut staging = factory.create_buffer(
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.map()?;
        staging.write(0, data)?;

        let destination = factory.create_buffer(
            size,
            vk::BufferUsageFlags::TRANSFER_DST | usage,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        self.copy_buffer(&staging, &destination, size)?;
        engine_trace!(
            "meridian3d::vulkan",
            "Uploaded {} bytes to device-local buffer",
            size
        );

        Ok(destination)
    }

    /// Copy `size` bytes from `src` to `dst`.
    pub fn copy_buffer(&self, src: &Buffer, dst: &Buffer, size: vk::DeviceSize) -> Result<()> {
        self.run_once(|cb| {
            let region = vk::BufferCopy::default().size(size);
            unsafe {
                self.ctx
                    .device
                    .cmd_copy_buffer(cb, src.buffer, dst.buffer, &[region]);
            }
            Ok(())
        })
    }

    /// Copy a tightly packed buffer into mip level 0 of a color image.
    pub fn copy_buffer_to_image(
        &self,
        buffer: &Buffer,
        image: vk::Image,
        width: u32,
        height: u32,
    ) -> Result<()> {
        self.run_once(|cb| {
            let region = vk::BufferImageCopy::default()
                .buffer_offset(0)
                .buffer_row_length(0)
                .buffer_image_height(0)
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                .image_extent(vk::Extent3D {
                    width,
                    height,
                    depth: 1,
                });

            unsafe {
                self.ctx.device.cmd_copy_buffer_to_image(
                    cb,
                    buffer.buffer,
                    image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );
            }
            Ok(())
        })
    }

    /// Transition all `mip_levels` levels of `image` between two known
    /// layouts using the fixed transition table.
    pub fn transition_image_layout(
        &self,
        image: vk::Image,
        format: vk::Format,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
        mip_levels: u32,
    ) -> Result<()> {
        let (src_access, dst_access, src_stage, dst_stage) =
            layout_transition_masks(old_layout, new_layout).ok_or_else(|| {
                engine_err!(
                    "meridian3d::vulkan",
                    "Unsupported layout transition {:?} -> {:?}",
                    old_layout,
                    new_layout
                )
            })?;

        let aspect_mask = if new_layout == vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL {
            if has_stencil_component(format) {
                vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
            } else {
                vk::ImageAspectFlags::DEPTH
            }
        } else {
            vk::ImageAspectFlags::COLOR
        };

        self.run_once(|cb| {
            let barrier = vk::ImageMemoryBarrier::default()
                .old_layout(old_layout)
                .new_layout(new_layout)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask,
                    base_mip_level: 0,
                    level_count: mip_levels,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .src_access_mask(src_access)
                .dst_access_mask(dst_access);

            unsafe {
                self.ctx.device.cmd_pipeline_barrier(
                    cb,
                    src_stage,
                    dst_stage,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[barrier],
                );
            }
            Ok(())
        })
    }

    /// Fill mip levels 1..`mip_levels` of `image` by successive halving
    /// blits, transitioning each source level to shader-read-only once its
    /// successor is written. The image must be in TRANSFER_DST_OPTIMAL for
    /// all levels on entry; every level is SHADER_READ_ONLY_OPTIMAL on exit.
    pub fn generate_mipmaps(
        &self,
        image: vk::Image,
        format: vk::Format,
        width: u32,
        height: u32,
        mip_levels: u32,
    ) -> Result<()> {
        // The blit chain needs linear filtering on the sampled format.
        let props = unsafe {
            self.ctx
                .instance
                .get_physical_device_format_properties(self.ctx.physical_device, format)
        };
        if !props
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
        {
            engine_error!(
                "meridian3d::vulkan",
                "Format {:?} does not support linear blit filtering",
                format
            );
            return Err(Error::UnsupportedBlit(format!(
                "Format {:?} does not support linear blit filtering",
                format
            )));
        }

        self.run_once(|cb| {
            unsafe {
                for mip in 1..mip_levels {
                    let src_mip = mip - 1;
                    let src_width = mip_dimension(width, src_mip);
                    let src_height = mip_dimension(height, src_mip);
                    let dst_width = mip_dimension(width, mip);
                    let dst_height = mip_dimension(height, mip);

                    // Source level: TRANSFER_DST -> TRANSFER_SRC
                    let barrier_src = vk::ImageMemoryBarrier::default()
                        .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                        .new_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
                        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .image(image)
                        .subresource_range(vk::ImageSubresourceRange {
                            aspect_mask: vk::ImageAspectFlags::COLOR,
                            base_mip_level: src_mip,
                            level_count: 1,
                            base_array_layer: 0,
                            layer_count: 1,
                        })
                        .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                        .dst_access_mask(vk::AccessFlags::TRANSFER_READ);

                    self.ctx.device.cmd_pipeline_barrier(
                        cb,
                        vk::PipelineStageFlags::TRANSFER,
                        vk::PipelineStageFlags::TRANSFER,
                        vk::DependencyFlags::empty(),
                        &[],
                        &[],
                        &[barrier_src],
                    );

                    let blit = vk::ImageBlit::default()
                        .src_subresource(vk::ImageSubresourceLayers {
                            aspect_mask: vk::ImageAspectFlags::COLOR,
                            mip_level: src_mip,
                            base_array_layer: 0,
                            layer_count: 1,
                        })
                        .src_offsets([
                            vk::Offset3D { x: 0, y: 0, z: 0 },
                            vk::Offset3D {
                                x: src_width as i32,
                                y: src_height as i32,
                                z: 1,
                            },
                        ])
                        .dst_subresource(vk::ImageSubresourceLayers {
                            aspect_mask: vk::ImageAspectFlags::COLOR,
                            mip_level: mip,
                            base_array_layer: 0,
                            layer_count: 1,
                        })
                        .dst_offsets([
                            vk::Offset3D { x: 0, y: 0, z: 0 },
                            vk::Offset3D {
                                x: dst_width as i32,
                                y: dst_height as i32,
                                z: 1,
                            },
                        ]);

                    self.ctx.device.cmd_blit_image(
                        cb,
                        image,
                        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                        image,
                        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                        &[blit],
                        vk::Filter::LINEAR,
                    );

                    // Source level is final: TRANSFER_SRC -> SHADER_READ_ONLY
                    let barrier_final = vk::ImageMemoryBarrier::default()
                        .old_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
                        .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                        .image(image)
                        .subresource_range(vk::ImageSubresourceRange {
                            aspect_mask: vk::ImageAspectFlags::COLOR,
                            base_mip_level: src_mip,
                            level_count: 1,
                            base_array_layer: 0,
                            layer_count: 1,
                        })
                        .src_access_mask(vk::AccessFlags::TRANSFER_READ)
                        .dst_access_mask(vk::AccessFlags::SHADER_READ);

                    self.ctx.device.cmd_pipeline_barrier(
                        cb,
                        vk::PipelineStageFlags::TRANSFER,
                        vk::PipelineStageFlags::FRAGMENT_SHADER,
                        vk::DependencyFlags::empty(),
                        &[],
                        &[],
                        &[barrier_final],
                    );
                }

                // Last level was only ever a blit destination.
                let barrier_last = vk::ImageMemoryBarrier::default()
                    .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                    .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(image)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: mip_levels - 1,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    })
                    .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                    .dst_access_mask(vk::AccessFlags::SHADER_READ);

                self.ctx.device.cmd_pipeline_barrier(
                    cb,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::FRAGMENT_SHADER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[barrier_last],
                );
            }
            Ok(())
        })
    }
}
