//! VulkanRenderer - top-level renderer wiring every subsystem together
//!
//! Creates the instance, picks a suitable physical device, builds the
//! logical device and shared GpuContext, then constructs the swapchain,
//! pipeline, frame scheduler and material store. Drives the per-frame
//! loop and owns surface-loss recovery.

use meridian_3d_engine::meridian3d::model::{
    DrawRange, ImageDecoder, ModelSource, UniformBufferObject,
};
use meridian_3d_engine::meridian3d::{Config, Error, Result};
use meridian_3d_engine::{engine_error, engine_info};
use meridian_3d_engine::glam::{Mat4, Vec3};
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::sync::Arc;

use crate::debug;
use crate::vulkan_context::GpuContext;
use crate::vulkan_frame::{FrameOutcome, FrameScheduler, MAX_FRAMES_IN_FLIGHT};
use crate::vulkan_materials::MaterialStore;
use crate::vulkan_pipeline::Pipeline;
use crate::vulkan_recorder::CommandRecorder;
use crate::vulkan_resources::{GeometryBuffers, ResourceFactory};
use crate::vulkan_swapchain::SwapchainManager;
use crate::vulkan_transfer::TransferExecutor;

/// Whether the drawable area is zero (minimized window); frames are
/// skipped entirely until a non-zero extent is observed.
pub(crate) fn extent_suspended(extent: vk::Extent2D) -> bool {
    extent.width == 0 || extent.height == 0
}

/// Highest sample count supported by both color and depth framebuffers.
pub(crate) fn pick_max_sample_count(
    color_counts: vk::SampleCountFlags,
    depth_counts: vk::SampleCountFlags,
) -> vk::SampleCountFlags {
    let counts = color_counts & depth_counts;
    for candidate in [
        vk::SampleCountFlags::TYPE_64,
        vk::SampleCountFlags::TYPE_32,
        vk::SampleCountFlags::TYPE_16,
        vk::SampleCountFlags::TYPE_8,
        vk::SampleCountFlags::TYPE_4,
        vk::SampleCountFlags::TYPE_2,
    ] {
        if counts.contains(candidate) {
            return candidate;
        }
    }
    vk::SampleCountFlags::TYPE_1
}

/// Vulkan renderer
pub struct VulkanRenderer {
    scheduler: FrameScheduler,
    recorder: CommandRecorder,
    materials: MaterialStore,
    geometry: GeometryBuffers,
    draws: Vec<DrawRange>,
    swapchain: SwapchainManager,
    pipeline: Pipeline,
    factory: ResourceFactory,
    ctx: Arc<GpuContext>,
    framebuffer_resized: bool,
}

impl VulkanRenderer {
    /// Create the renderer for `window`, load the model from
    /// `model_source` and upload its geometry and textures.
    ///
    /// `vert_spv` / `frag_spv` are precompiled SPIR-V words for the
    /// uniform-buffer + textured vertex/fragment pair the pipeline expects.
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(
        window: &W,
        config: Config,
        model_source: &dyn ModelSource,
        decoder: &dyn ImageDecoder,
        vert_spv: &[u32],
        frag_spv: &[u32],
        desired_extent: vk::Extent2D,
    ) -> Result<Self> {
        let ctx = Self::create_context(window, &config)?;
        let factory = ResourceFactory::new(Arc::clone(&ctx));
        let transfer = TransferExecutor::new(Arc::clone(&ctx));

        let msaa_samples = if config.enable_msaa {
            let properties = unsafe {
                ctx.instance
                    .get_physical_device_properties(ctx.physical_device)
            };
            pick_max_sample_count(
                properties.limits.framebuffer_color_sample_counts,
                properties.limits.framebuffer_depth_sample_counts,
            )
        } else {
            vk::SampleCountFlags::TYPE_1
        };
        engine_info!(
            "meridian3d::vulkan",
            "Multisampling: {:?}",
            msaa_samples
        );

        let mut swapchain =
            SwapchainManager::new(Arc::clone(&ctx), &factory, desired_extent, msaa_samples)?;
        let pipeline = Pipeline::new(
            Arc::clone(&ctx),
            swapchain.format(),
            swapchain.depth_format(),
            msaa_samples,
            vert_spv,
            frag_spv,
        )?;
        swapchain.create_framebuffers(pipeline.render_pass)?;

        let scheduler = FrameScheduler::new(Arc::clone(&ctx), &factory)?;
        let recorder = CommandRecorder::new(Arc::clone(&ctx), config.clear_color);

        let model = model_source.load()?;
        model.validate()?;
        let geometry = GeometryBuffers::upload(&factory, &transfer, &model)?;

        let mut materials = MaterialStore::new(
            Arc::clone(&ctx),
            model.texture_paths.len() as u32,
            MAX_FRAMES_IN_FLIGHT as u32,
        )?;

        // Textures may repeat in the path list; the store deduplicates, so
        // draw ranges are remapped from path index to material index.
        let mut material_indices = Vec::with_capacity(model.texture_paths.len());
        for path in &model.texture_paths {
            material_indices.push(materials.get_or_load(
                path,
                decoder,
                &factory,
                &transfer,
                pipeline.descriptor_set_layout,
                scheduler.uniform_buffers(),
            )?);
        }
        let draws = model
            .draws
            .iter()
            .map(|draw| DrawRange {
                texture: material_indices[draw.texture],
                first_index: draw.first_index,
                index_count: draw.index_count,
            })
            .collect();

        engine_info!(
            "meridian3d::vulkan",
            "Renderer ready: {} indices, {} materials, {} swapchain images",
            geometry.index_count,
            materials.len(),
            swapchain.image_count()
        );

        Ok(Self {
            scheduler,
            recorder,
            materials,
            geometry,
            draws,
            swapchain,
            pipeline,
            factory,
            ctx,
            framebuffer_resized: false,
        })
    }

    /// Instance, surface, physical device selection and logical device.
    ///
    /// Public for tools and tests that drive the resource layer without a
    /// full renderer.
    pub fn create_context<W: HasDisplayHandle + HasWindowHandle>(
        window: &W,
        config: &Config,
    ) -> Result<Arc<GpuContext>> {
        unsafe {
            let entry = ash::Entry::load().map_err(|e| {
                engine_error!(
                    "meridian3d::vulkan",
                    "Failed to load Vulkan library: {:?}",
                    e
                );
                Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
            })?;

            let app_name = std::ffi::CString::new(config.app_name.as_str())
                .unwrap_or_else(|_| std::ffi::CString::default());
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"Meridian3D")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let display_handle = window.display_handle().map_err(|e| {
                engine_error!("meridian3d::vulkan", "Failed to get display handle: {}", e);
                Error::InitializationFailed(format!("Failed to get display handle: {}", e))
            })?;
            let mut extension_names =
                ash_window::enumerate_required_extensions(display_handle.as_raw())
                    .map_err(|e| {
                        engine_error!(
                            "meridian3d::vulkan",
                            "Failed to get required extensions: {}",
                            e
                        );
                        Error::InitializationFailed(format!(
                            "Failed to get required extensions: {}",
                            e
                        ))
                    })?
                    .to_vec();

            // Validation is requested, not required: fall back silently
            // when the layer is not installed.
            let validation = config.enable_validation
                && Self::validation_layer_available(&entry);
            if config.enable_validation && !validation {
                engine_info!(
                    "meridian3d::vulkan",
                    "Validation requested but VK_LAYER_KHRONOS_validation is not installed"
                );
            }

            if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
            }
            let layer_names = if validation {
                vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
            } else {
                vec![]
            };

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry.create_instance(&create_info, None).map_err(|e| {
                engine_error!(
                    "meridian3d::vulkan",
                    "Failed to create Vulkan instance: {:?}",
                    e
                );
                Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
            })?;

            let (debug_utils_loader, debug_messenger) = if validation {
                let debug_utils = ash::ext::debug_utils::Instance::new(&entry, &instance);
                let debug_info = debug::messenger_create_info();
                let messenger = debug_utils
                    .create_debug_utils_messenger(&debug_info, None)
                    .map_err(|e| {
                        engine_error!(
                            "meridian3d::vulkan",
                            "Failed to create debug messenger: {:?}",
                            e
                        );
                        Error::InitializationFailed(format!(
                            "Failed to create debug messenger: {:?}",
                            e
                        ))
                    })?;
                (Some(debug_utils), Some(messenger))
            } else {
                (None, None)
            };

            let window_handle = window.window_handle().map_err(|e| {
                engine_error!("meridian3d::vulkan", "Failed to get window handle: {}", e);
                Error::InitializationFailed(format!("Failed to get window handle: {}", e))
            })?;
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| {
                engine_error!("meridian3d::vulkan", "Failed to create surface: {:?}", e);
                Error::InitializationFailed(format!("Failed to create surface: {:?}", e))
            })?;
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            let physical_devices = instance.enumerate_physical_devices().map_err(|e| {
                engine_error!(
                    "meridian3d::vulkan",
                    "Failed to enumerate physical devices: {:?}",
                    e
                );
                Error::InitializationFailed(format!(
                    "Failed to enumerate physical devices: {:?}",
                    e
                ))
            })?;

            let mut selected = None;
            for physical_device in physical_devices {
                if let Some(families) = Self::device_suitable(
                    &instance,
                    physical_device,
                    &surface_loader,
                    surface,
                ) {
                    selected = Some((physical_device, families));
                    break;
                }
            }
            let (physical_device, (graphics_family, present_family)) =
                selected.ok_or_else(|| {
                    engine_error!("meridian3d::vulkan", "No suitable GPU found");
                    Error::InitializationFailed("No suitable GPU found".to_string())
                })?;

            let properties = instance.get_physical_device_properties(physical_device);
            let device_name = properties
                .device_name_as_c_str()
                .ok()
                .and_then(|n| n.to_str().ok())
                .unwrap_or("unknown");
            engine_info!("meridian3d::vulkan", "Selected GPU: {}", device_name);

            let queue_priorities = [1.0];
            let queue_create_infos = if graphics_family == present_family {
                vec![vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(graphics_family)
                    .queue_priorities(&queue_priorities)]
            } else {
                vec![
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(graphics_family)
                        .queue_priorities(&queue_priorities),
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(present_family)
                        .queue_priorities(&queue_priorities),
                ]
            };

            let device_extension_names = vec![ash::khr::swapchain::NAME.as_ptr()];
            let device_features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(true);

            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .enabled_features(&device_features);

            let device = instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| {
                    engine_error!(
                        "meridian3d::vulkan",
                        "Failed to create logical device: {:?}",
                        e
                    );
                    Error::InitializationFailed(format!("Failed to create device: {:?}", e))
                })?;

            let graphics_queue = device.get_device_queue(graphics_family, 0);
            let present_queue = device.get_device_queue(present_family, 0);

            // Transient pool for one-shot transfer command buffers
            let transfer_pool_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(graphics_family)
                .flags(vk::CommandPoolCreateFlags::TRANSIENT);
            let transfer_command_pool = device
                .create_command_pool(&transfer_pool_info, None)
                .map_err(|e| {
                    engine_error!(
                        "meridian3d::vulkan",
                        "Failed to create transfer command pool: {:?}",
                        e
                    );
                    Error::InitializationFailed(format!(
                        "Failed to create transfer command pool: {:?}",
                        e
                    ))
                })?;

            Ok(GpuContext::new(
                entry,
                instance,
                physical_device,
                device,
                graphics_queue,
                graphics_family,
                present_queue,
                surface,
                surface_loader,
                transfer_command_pool,
                debug_utils_loader,
                debug_messenger,
            ))
        }
    }

    fn validation_layer_available(entry: &ash::Entry) -> bool {
        unsafe {
            entry
                .enumerate_instance_layer_properties()
                .map(|layers| {
                    layers.iter().any(|layer| {
                        layer
                            .layer_name_as_c_str()
                            .map(|name| name == c"VK_LAYER_KHRONOS_validation")
                            .unwrap_or(false)
                    })
                })
                .unwrap_or(false)
        }
    }

    /// Check whether `physical_device` can drive this renderer: graphics
    /// and present queues, the swapchain extension, at least one surface
    /// format and present mode, and anisotropic filtering.
    ///
    /// Returns the (graphics, present) queue family indices when suitable.
    fn device_suitable(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Option<(u32, u32)> {
        unsafe {
            let queue_families =
                instance.get_physical_device_queue_family_properties(physical_device);
            let graphics_family = queue_families
                .iter()
                .enumerate()
                .find(|(_, qf)| qf.queue_flags.contains(vk::QueueFlags::GRAPHICS))
                .map(|(i, _)| i as u32)?;
            let present_family = (0..queue_families.len() as u32).find(|&i| {
                surface_loader
                    .get_physical_device_surface_support(physical_device, i, surface)
                    .unwrap_or(false)
            })?;

            let extensions = instance
                .enumerate_device_extension_properties(physical_device)
                .ok()?;
            let has_swapchain = extensions.iter().any(|ext| {
                ext.extension_name_as_c_str()
                    .map(|name| name == ash::khr::swapchain::NAME)
                    .unwrap_or(false)
            });
            if !has_swapchain {
                return None;
            }

            let formats = surface_loader
                .get_physical_device_surface_formats(physical_device, surface)
                .ok()?;
            let present_modes = surface_loader
                .get_physical_device_surface_present_modes(physical_device, surface)
                .ok()?;
            if formats.is_empty() || present_modes.is_empty() {
                return None;
            }

            let features = instance.get_physical_device_features(physical_device);
            if features.sampler_anisotropy == vk::FALSE {
                return None;
            }

            Some((graphics_family, present_family))
        }
    }

    /// Flag that the window was resized; the swapchain is rebuilt at the
    /// start of the next frame.
    pub fn mark_resized(&mut self) {
        self.framebuffer_resized = true;
    }

    /// Render one frame.
    ///
    /// `window_extent` is the current drawable size; a zero-area extent
    /// (minimized window) skips the frame entirely. `elapsed_secs` drives
    /// the model rotation.
    pub fn render(&mut self, window_extent: vk::Extent2D, elapsed_secs: f32) -> Result<()> {
        if extent_suspended(window_extent) {
            return Ok(());
        }

        if self.framebuffer_resized {
            self.framebuffer_resized = false;
            self.swapchain
                .rebuild(&self.factory, self.pipeline.render_pass, window_extent)?;
        }

        let extent = self.swapchain.extent();
        let ubo = Self::build_ubo(extent, elapsed_secs);

        let outcome = self.scheduler.draw_frame(
            &self.swapchain,
            &self.recorder,
            &self.pipeline,
            &self.geometry,
            &self.materials,
            &self.draws,
            &ubo,
        )?;

        if outcome == FrameOutcome::RebuildNeeded {
            self.swapchain
                .rebuild(&self.factory, self.pipeline.render_pass, window_extent)?;
        }

        Ok(())
    }

    /// Model rotation around Z, fixed look-at camera, perspective
    /// projection with Y flipped for Vulkan clip space.
    fn build_ubo(extent: vk::Extent2D, elapsed_secs: f32) -> UniformBufferObject {
        let model = Mat4::from_rotation_z(elapsed_secs * 90.0_f32.to_radians());
        let view = Mat4::look_at_rh(
            Vec3::new(2.0, 2.0, 2.0),
            Vec3::ZERO,
            Vec3::new(0.0, 0.0, 1.0),
        );
        let mut proj = Mat4::perspective_rh(
            45.0_f32.to_radians(),
            extent.width as f32 / extent.height as f32,
            0.1,
            10.0,
        );
        proj.y_axis.y *= -1.0;
        UniformBufferObject { model, view, proj }
    }

    /// Block until the GPU is idle. Call before dropping the renderer when
    /// the event loop may still deliver frames.
    pub fn wait_idle(&self) {
        self.ctx.wait_idle();
    }

    /// Number of images in the current swapchain.
    pub fn swapchain_image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    /// Surface format of the current swapchain.
    pub fn swapchain_format(&self) -> vk::Format {
        self.swapchain.format()
    }

    /// Number of loaded materials.
    pub fn material_count(&self) -> usize {
        self.materials.len()
    }
}
