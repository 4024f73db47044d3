//! CommandRecorder - records one frame's draw commands
//!
//! Translates the loaded model's draw ranges into a render pass instance:
//! clear, bind pipeline and geometry, then one indexed draw per range with
//! that range's material descriptor set.

use meridian_3d_engine::meridian3d::model::DrawRange;
use meridian_3d_engine::meridian3d::Result;
use meridian_3d_engine::engine_err;
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_materials::MaterialStore;
use crate::vulkan_pipeline::Pipeline;
use crate::vulkan_resources::GeometryBuffers;

/// Records frame command buffers
pub struct CommandRecorder {
    ctx: Arc<GpuContext>,
    clear_color: [f32; 4],
}

impl CommandRecorder {
    pub fn new(ctx: Arc<GpuContext>, clear_color: [f32; 4]) -> Self {
        Self { ctx, clear_color }
    }

    /// Record the full frame into `command_buffer`. The buffer must have
    /// been reset (or be fresh) before this is called.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        command_buffer: vk::CommandBuffer,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        pipeline: &Pipeline,
        geometry: &GeometryBuffers,
        materials: &MaterialStore,
        draws: &[DrawRange],
        frame_index: usize,
    ) -> Result<()> {
        unsafe {
            let begin_info = vk::CommandBufferBeginInfo::default();
            self.ctx
                .device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(|e| {
                    engine_err!(
                        "meridian3d::vulkan",
                        "Failed to begin command buffer: {:?}",
                        e
                    )
                })?;

            let clear_values = [
                vk::ClearValue {
                    color: vk::ClearColorValue {
                        float32: self.clear_color,
                    },
                },
                vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue {
                        depth: 1.0,
                        stencil: 0,
                    },
                },
            ];

            let render_pass_begin = vk::RenderPassBeginInfo::default()
                .render_pass(pipeline.render_pass)
                .framebuffer(framebuffer)
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent,
                })
                .clear_values(&clear_values);

            self.ctx.device.cmd_begin_render_pass(
                command_buffer,
                &render_pass_begin,
                vk::SubpassContents::INLINE,
            );

            self.ctx.device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline.pipeline,
            );

            // Viewport and scissor are dynamic pipeline state
            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            self.ctx
                .device
                .cmd_set_viewport(command_buffer, 0, &[viewport]);

            let scissor = vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            };
            self.ctx.device.cmd_set_scissor(command_buffer, 0, &[scissor]);

            self.ctx.device.cmd_bind_vertex_buffers(
                command_buffer,
                0,
                &[geometry.vertex_buffer.buffer],
                &[0],
            );
            self.ctx.device.cmd_bind_index_buffer(
                command_buffer,
                geometry.index_buffer.buffer,
                0,
                vk::IndexType::UINT32,
            );

            for draw in draws {
                let descriptor_set = materials.descriptor_set(draw.texture, frame_index)?;
                self.ctx.device.cmd_bind_descriptor_sets(
                    command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    pipeline.pipeline_layout,
                    0,
                    &[descriptor_set],
                    &[],
                );
                self.ctx.device.cmd_draw_indexed(
                    command_buffer,
                    draw.index_count,
                    1,
                    draw.first_index,
                    0,
                    0,
                );
            }

            self.ctx.device.cmd_end_render_pass(command_buffer);

            self.ctx
                .device
                .end_command_buffer(command_buffer)
                .map_err(|e| {
                    engine_err!(
                        "meridian3d::vulkan",
                        "Failed to end command buffer: {:?}",
                        e
                    )
                })?;

            Ok(())
        }
    }
}
