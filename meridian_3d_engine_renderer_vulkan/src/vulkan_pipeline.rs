//! Pipeline - render pass, descriptor set layout and graphics pipeline
//!
//! All three are keyed only to the surface format, depth format and sample
//! count, none of which change on resize, so a swapchain rebuild leaves
//! this module untouched.

use meridian_3d_engine::meridian3d::model::Vertex;
use meridian_3d_engine::meridian3d::Result;
use meridian_3d_engine::engine_err;
use ash::vk;
use std::ffi::CStr;
use std::mem::offset_of;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;

const SHADER_ENTRY_POINT: &CStr = c"main";

/// Vertex binding description: one interleaved binding at rate VERTEX.
pub(crate) fn vertex_binding_description() -> vk::VertexInputBindingDescription {
    vk::VertexInputBindingDescription {
        binding: 0,
        stride: std::mem::size_of::<Vertex>() as u32,
        input_rate: vk::VertexInputRate::VERTEX,
    }
}

/// Vertex attribute descriptions: position, color, texture coordinates.
pub(crate) fn vertex_attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
    [
        vk::VertexInputAttributeDescription {
            location: 0,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: offset_of!(Vertex, position) as u32,
        },
        vk::VertexInputAttributeDescription {
            location: 1,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: offset_of!(Vertex, color) as u32,
        },
        vk::VertexInputAttributeDescription {
            location: 2,
            binding: 0,
            format: vk::Format::R32G32_SFLOAT,
            offset: offset_of!(Vertex, tex_coord) as u32,
        },
    ]
}

/// Graphics pipeline and the objects it is built against
pub struct Pipeline {
    ctx: Arc<GpuContext>,
    /// Render pass (crate-visible, framebuffers and recording need it)
    pub(crate) render_pass: vk::RenderPass,
    /// Set layout for the uniform buffer + combined image sampler pair
    pub(crate) descriptor_set_layout: vk::DescriptorSetLayout,
    /// Pipeline layout (accessed internally for descriptor set binding)
    pub(crate) pipeline_layout: vk::PipelineLayout,
    /// Vulkan graphics pipeline
    pub(crate) pipeline: vk::Pipeline,
}

impl Pipeline {
    /// Build the render pass, descriptor set layout, pipeline layout and
    /// graphics pipeline from precompiled SPIR-V.
    ///
    /// Viewport and scissor are dynamic so the pipeline survives resizes.
    pub fn new(
        ctx: Arc<GpuContext>,
        color_format: vk::Format,
        depth_format: vk::Format,
        msaa_samples: vk::SampleCountFlags,
        vert_spv: &[u32],
        frag_spv: &[u32],
    ) -> Result<Self> {
        let render_pass = Self::create_render_pass(&ctx, color_format, depth_format, msaa_samples)?;
        let descriptor_set_layout = Self::create_descriptor_set_layout(&ctx)?;

        unsafe {
            let set_layouts = [descriptor_set_layout];
            let layout_create_info =
                vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
            let pipeline_layout = ctx
                .device
                .create_pipeline_layout(&layout_create_info, None)
                .map_err(|e| {
                    engine_err!(
                        "meridian3d::vulkan",
                        "Failed to create pipeline layout: {:?}",
                        e
                    )
                })?;

            let vert_module = Self::create_shader_module(&ctx, vert_spv)?;
            let frag_module = Self::create_shader_module(&ctx, frag_spv)?;

            let shader_stages = [
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(vk::ShaderStageFlags::VERTEX)
                    .module(vert_module)
                    .name(SHADER_ENTRY_POINT),
                vk::PipelineShaderStageCreateInfo::default()
                    .stage(vk::ShaderStageFlags::FRAGMENT)
                    .module(frag_module)
                    .name(SHADER_ENTRY_POINT),
            ];

            let vertex_bindings = [vertex_binding_description()];
            let vertex_attributes = vertex_attribute_descriptions();
            let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::default()
                .vertex_binding_descriptions(&vertex_bindings)
                .vertex_attribute_descriptions(&vertex_attributes);

            let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::default()
                .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
                .primitive_restart_enable(false);

            // Viewport state (dynamic)
            let viewports = [vk::Viewport::default()];
            let scissors = [vk::Rect2D::default()];
            let viewport_state = vk::PipelineViewportStateCreateInfo::default()
                .viewports(&viewports)
                .scissors(&scissors);

            let rasterization_state = vk::PipelineRasterizationStateCreateInfo::default()
                .depth_clamp_enable(false)
                .rasterizer_discard_enable(false)
                .polygon_mode(vk::PolygonMode::FILL)
                .line_width(1.0)
                .cull_mode(vk::CullModeFlags::BACK)
                .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
                .depth_bias_enable(false);

            let multisample_state = vk::PipelineMultisampleStateCreateInfo::default()
                .sample_shading_enable(false)
                .rasterization_samples(msaa_samples);

            let depth_stencil_state = vk::PipelineDepthStencilStateCreateInfo::default()
                .depth_test_enable(true)
                .depth_write_enable(true)
                .depth_compare_op(vk::CompareOp::LESS)
                .depth_bounds_test_enable(false)
                .stencil_test_enable(false);

            let color_blend_attachment = vk::PipelineColorBlendAttachmentState::default()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(false);

            let color_blend_state = vk::PipelineColorBlendStateCreateInfo::default()
                .logic_op_enable(false)
                .attachments(std::slice::from_ref(&color_blend_attachment));

            let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
            let dynamic_state =
                vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

            let pipeline_create_info = vk::GraphicsPipelineCreateInfo::default()
                .stages(&shader_stages)
                .vertex_input_state(&vertex_input_state)
                .input_assembly_state(&input_assembly_state)
                .viewport_state(&viewport_state)
                .rasterization_state(&rasterization_state)
                .multisample_state(&multisample_state)
                .depth_stencil_state(&depth_stencil_state)
                .color_blend_state(&color_blend_state)
                .dynamic_state(&dynamic_state)
                .layout(pipeline_layout)
                .render_pass(render_pass)
                .subpass(0);

            let pipelines = ctx
                .device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_create_info], None)
                .map_err(|e| {
                    engine_err!(
                        "meridian3d::vulkan",
                        "Failed to create graphics pipeline: {:?}",
                        e.1
                    )
                });

            // Shader modules are only needed during pipeline creation
            ctx.device.destroy_shader_module(vert_module, None);
            ctx.device.destroy_shader_module(frag_module, None);

            let pipeline = pipelines?[0];

            Ok(Self {
                ctx,
                render_pass,
                descriptor_set_layout,
                pipeline_layout,
                pipeline,
            })
        }
    }

    /// Render pass with a color attachment, a depth attachment and, when
    /// multisampling, a single-sample resolve attachment for presentation.
    fn create_render_pass(
        ctx: &GpuContext,
        color_format: vk::Format,
        depth_format: vk::Format,
        msaa_samples: vk::SampleCountFlags,
    ) -> Result<vk::RenderPass> {
        let multisampled = msaa_samples != vk::SampleCountFlags::TYPE_1;

        // A multisampled color attachment cannot be presented, so its final
        // layout stays COLOR_ATTACHMENT_OPTIMAL and the resolve target takes
        // PRESENT_SRC instead.
        let color_attachment = vk::AttachmentDescription::default()
            .format(color_format)
            .samples(msaa_samples)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(if multisampled {
                vk::AttachmentStoreOp::DONT_CARE
            } else {
                vk::AttachmentStoreOp::STORE
            })
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(if multisampled {
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
            } else {
                vk::ImageLayout::PRESENT_SRC_KHR
            });

        let depth_attachment = vk::AttachmentDescription::default()
            .format(depth_format)
            .samples(msaa_samples)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

        let resolve_attachment = vk::AttachmentDescription::default()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::DONT_CARE)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

        let attachments: Vec<vk::AttachmentDescription> = if multisampled {
            vec![color_attachment, depth_attachment, resolve_attachment]
        } else {
            vec![color_attachment, depth_attachment]
        };

        let color_ref = vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };
        let resolve_ref = vk::AttachmentReference {
            attachment: 2,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        };

        let color_refs = [color_ref];
        let resolve_refs = [resolve_ref];
        let mut subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .depth_stencil_attachment(&depth_ref);
        if multisampled {
            subpass = subpass.resolve_attachments(&resolve_refs);
        }

        let dependency = vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            )
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            )
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            );

        let subpasses = [subpass];
        let dependencies = [dependency];
        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        unsafe {
            ctx.device.create_render_pass(&create_info, None).map_err(|e| {
                engine_err!("meridian3d::vulkan", "Failed to create render pass: {:?}", e)
            })
        }
    }

    /// Set layout: uniform buffer at binding 0 (vertex stage), combined
    /// image sampler at binding 1 (fragment stage).
    fn create_descriptor_set_layout(ctx: &GpuContext) -> Result<vk::DescriptorSetLayout> {
        let bindings = [
            vk::DescriptorSetLayoutBinding::default()
                .binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::VERTEX),
            vk::DescriptorSetLayoutBinding::default()
                .binding(1)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::FRAGMENT),
        ];

        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);

        unsafe {
            ctx.device
                .create_descriptor_set_layout(&create_info, None)
                .map_err(|e| {
                    engine_err!(
                        "meridian3d::vulkan",
                        "Failed to create descriptor set layout: {:?}",
                        e
                    )
                })
        }
    }

    fn create_shader_module(ctx: &GpuContext, code: &[u32]) -> Result<vk::ShaderModule> {
        let create_info = vk::ShaderModuleCreateInfo::default().code(code);
        unsafe {
            ctx.device.create_shader_module(&create_info, None).map_err(|e| {
                engine_err!(
                    "meridian3d::vulkan",
                    "Failed to create shader module: {:?}",
                    e
                )
            })
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            // Destroy pipeline
            self.ctx.device.destroy_pipeline(self.pipeline, None);
            // Destroy pipeline layout
            self.ctx
                .device
                .destroy_pipeline_layout(self.pipeline_layout, None);
            // Destroy descriptor set layout
            self.ctx
                .device
                .destroy_descriptor_set_layout(self.descriptor_set_layout, None);
            // Destroy render pass
            self.ctx.device.destroy_render_pass(self.render_pass, None);
        }
    }
}
