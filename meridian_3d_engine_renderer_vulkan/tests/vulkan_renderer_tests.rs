//! Integration tests for the Vulkan backend
//!
//! These tests exercise the context, resource and swapchain layers against
//! a real device. All tests require a GPU and are marked with #[ignore].
//!
//! Run with: cargo test --test vulkan_renderer_tests -- --ignored

use meridian_3d_engine::meridian3d::model::{ImageData, ImageDecoder, UniformBufferObject};
use meridian_3d_engine::meridian3d::{Config, Result};
use meridian_3d_engine_renderer_vulkan::ash::vk;
use meridian_3d_engine_renderer_vulkan::{
    MaterialStore, ResourceFactory, SwapchainManager, TransferExecutor, VulkanRenderer,
    MAX_FRAMES_IN_FLIGHT,
};
use std::path::Path;
use std::sync::Arc;
use winit::event_loop::EventLoop;
use winit::window::Window;

/// Helper to create a hidden test window for Vulkan
#[allow(deprecated)]
fn create_test_window() -> (Window, EventLoop<()>) {
    let event_loop = EventLoop::new().unwrap();
    let window_attrs = Window::default_attributes()
        .with_title("Meridian3D Vulkan Test")
        .with_inner_size(winit::dpi::LogicalSize::new(800, 600))
        .with_visible(false);
    let window = event_loop.create_window(window_attrs).unwrap();
    (window, event_loop)
}

fn test_config() -> Config {
    Config {
        enable_validation: false,
        ..Config::default()
    }
}

/// A trivial render pass compatible with the non-multisampled framebuffer
/// layout, for rebuild tests that do not need a pipeline.
fn create_test_render_pass(
    device: &ash::Device,
    color_format: vk::Format,
    depth_format: vk::Format,
) -> vk::RenderPass {
    let attachments = [
        vk::AttachmentDescription::default()
            .format(color_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
        vk::AttachmentDescription::default()
            .format(depth_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
    ];
    let color_refs = [vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];
    let depth_ref = vk::AttachmentReference {
        attachment: 1,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };
    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)
        .depth_stencil_attachment(&depth_ref)];
    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses);

    unsafe { device.create_render_pass(&create_info, None).unwrap() }
}

// ============================================================================
// CONTEXT TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_context_creation() {
    let (window, _event_loop) = create_test_window();
    let ctx = VulkanRenderer::create_context(&window, &test_config()).unwrap();

    assert!(ctx.memory_properties.memory_type_count > 0);
    ctx.wait_idle();
}

// ============================================================================
// RESOURCE TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_upload_buffer_device_local() {
    let (window, _event_loop) = create_test_window();
    let ctx = VulkanRenderer::create_context(&window, &test_config()).unwrap();
    let factory = ResourceFactory::new(Arc::clone(&ctx));
    let transfer = TransferExecutor::new(Arc::clone(&ctx));

    let data: Vec<u8> = (0..=255).collect();
    let buffer = transfer
        .upload_buffer(&factory, &data, vk::BufferUsageFlags::VERTEX_BUFFER)
        .unwrap();

    assert_eq!(buffer.size, 256);
}

#[test]
#[ignore] // Requires GPU
fn test_empty_upload_is_rejected() {
    let (window, _event_loop) = create_test_window();
    let ctx = VulkanRenderer::create_context(&window, &test_config()).unwrap();
    let factory = ResourceFactory::new(Arc::clone(&ctx));
    let transfer = TransferExecutor::new(Arc::clone(&ctx));

    assert!(transfer
        .upload_buffer(&factory, &[], vk::BufferUsageFlags::VERTEX_BUFFER)
        .is_err());
}

#[test]
#[ignore] // Requires GPU
fn test_texture_upload_with_mip_generation() {
    let (window, _event_loop) = create_test_window();
    let ctx = VulkanRenderer::create_context(&window, &test_config()).unwrap();
    let factory = ResourceFactory::new(Arc::clone(&ctx));
    let transfer = TransferExecutor::new(Arc::clone(&ctx));

    let width = 64u32;
    let height = 64u32;
    let mip_levels = 7; // floor(log2(64)) + 1
    let pixels = vec![0x80u8; (width * height * 4) as usize];

    let mut staging = factory
        .create_buffer(
            pixels.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .unwrap();
    staging.map().unwrap();
    staging.write(0, &pixels).unwrap();

    let image = factory
        .create_image(
            width,
            height,
            mip_levels,
            vk::SampleCountFlags::TYPE_1,
            vk::Format::R8G8B8A8_SRGB,
            vk::ImageTiling::OPTIMAL,
            vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST
                | vk::ImageUsageFlags::SAMPLED,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )
        .unwrap();

    transfer
        .transition_image_layout(
            image.image,
            vk::Format::R8G8B8A8_SRGB,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            mip_levels,
        )
        .unwrap();
    transfer
        .copy_buffer_to_image(&staging, image.image, width, height)
        .unwrap();
    transfer
        .generate_mipmaps(
            image.image,
            vk::Format::R8G8B8A8_SRGB,
            width,
            height,
            mip_levels,
        )
        .unwrap();

    assert_eq!(image.mip_levels, mip_levels);
}

// ============================================================================
// SWAPCHAIN TESTS
// ============================================================================

#[test]
#[ignore] // Requires GPU
fn test_swapchain_creation() {
    let (window, _event_loop) = create_test_window();
    let ctx = VulkanRenderer::create_context(&window, &test_config()).unwrap();
    let factory = ResourceFactory::new(Arc::clone(&ctx));

    let swapchain = SwapchainManager::new(
        Arc::clone(&ctx),
        &factory,
        vk::Extent2D {
            width: 800,
            height: 600,
        },
        vk::SampleCountFlags::TYPE_1,
    )
    .unwrap();

    // At least double buffered, and a known color format
    assert!(swapchain.image_count() >= 2);
    assert_ne!(swapchain.format(), vk::Format::UNDEFINED);
}

#[test]
#[ignore] // Requires GPU
fn test_swapchain_rebuild_is_stable() {
    let (window, _event_loop) = create_test_window();
    let ctx = VulkanRenderer::create_context(&window, &test_config()).unwrap();
    let factory = ResourceFactory::new(Arc::clone(&ctx));

    let mut swapchain = SwapchainManager::new(
        Arc::clone(&ctx),
        &factory,
        vk::Extent2D {
            width: 800,
            height: 600,
        },
        vk::SampleCountFlags::TYPE_1,
    )
    .unwrap();
    let render_pass =
        create_test_render_pass(&ctx.device, swapchain.format(), swapchain.depth_format());
    swapchain.create_framebuffers(render_pass).unwrap();

    let format = swapchain.format();
    let count = swapchain.image_count();

    swapchain
        .rebuild(
            &factory,
            render_pass,
            vk::Extent2D {
                width: 640,
                height: 480,
            },
        )
        .unwrap();

    // Rebuilding keeps the format and image count for the same surface
    assert_eq!(swapchain.format(), format);
    assert_eq!(swapchain.image_count(), count);

    drop(swapchain);
    unsafe { ctx.device.destroy_render_pass(render_pass, None) };
}

// ============================================================================
// Materials
// ============================================================================

/// Decoder producing a solid-gray 512x512 RGBA image, whatever the path.
struct FlatGrayDecoder;

impl ImageDecoder for FlatGrayDecoder {
    fn decode(&self, _path: &Path) -> Result<ImageData> {
        Ok(ImageData {
            width: 512,
            height: 512,
            pixels: vec![128; 512 * 512 * 4],
        })
    }
}

/// Descriptor set layout matching the material bindings: a uniform buffer
/// in the vertex stage and a combined image sampler in the fragment stage.
fn create_material_set_layout(device: &ash::Device) -> vk::DescriptorSetLayout {
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
        device
            .create_descriptor_set_layout(&create_info, None)
            .unwrap()
    }
}

#[test]
#[ignore] // Requires GPU
fn test_material_store_loads_texture_and_dedups_by_path() {
    let (window, _event_loop) = create_test_window();
    let ctx = VulkanRenderer::create_context(&window, &test_config()).unwrap();
    let factory = ResourceFactory::new(Arc::clone(&ctx));
    let transfer = TransferExecutor::new(Arc::clone(&ctx));

    let layout = create_material_set_layout(&ctx.device);
    let uniform_buffers = (0..MAX_FRAMES_IN_FLIGHT)
        .map(|_| {
            factory
                .create_buffer(
                    std::mem::size_of::<UniformBufferObject>() as vk::DeviceSize,
                    vk::BufferUsageFlags::UNIFORM_BUFFER,
                    vk::MemoryPropertyFlags::HOST_VISIBLE
                        | vk::MemoryPropertyFlags::HOST_COHERENT,
                )
                .unwrap()
        })
        .collect::<Vec<_>>();

    let mut store =
        MaterialStore::new(Arc::clone(&ctx), 2, MAX_FRAMES_IN_FLIGHT as u32).unwrap();

    let path = Path::new("flat_gray.test");
    let first = store
        .get_or_load(
            path,
            &FlatGrayDecoder,
            &factory,
            &transfer,
            layout,
            &uniform_buffers,
        )
        .unwrap();

    // Staged upload, layout transitions and mip generation all succeeded;
    // a 512x512 source yields a full 10-level chain
    assert_eq!(store.len(), 1);
    assert_eq!(store.material(first).unwrap().mip_levels(), 10);

    // Every frame slot got a descriptor set
    for frame in 0..MAX_FRAMES_IN_FLIGHT {
        assert_ne!(
            store.descriptor_set(first, frame).unwrap(),
            vk::DescriptorSet::null()
        );
    }

    // Loading the same path again reuses the existing material
    let again = store
        .get_or_load(
            path,
            &FlatGrayDecoder,
            &factory,
            &transfer,
            layout,
            &uniform_buffers,
        )
        .unwrap();
    assert_eq!(again, first);
    assert_eq!(store.len(), 1);

    drop(store);
    drop(uniform_buffers);
    unsafe { ctx.device.destroy_descriptor_set_layout(layout, None) };
}
