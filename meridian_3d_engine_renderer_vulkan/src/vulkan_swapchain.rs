//! SwapchainManager - presentable image chain and dependent attachments
//!
//! Owns the swapchain, one view per image, the depth attachment, the
//! optional multisample color attachment and the framebuffers. The render
//! pass and pipeline are format-compatible across rebuilds and are NOT
//! owned here; `rebuild()` tears down and recreates everything else without
//! touching them.

use meridian_3d_engine::meridian3d::{Error, Result};
use meridian_3d_engine::{engine_debug, engine_err, engine_error, engine_info};
use ash::vk;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_resources::{Image, ResourceFactory};

/// Candidate depth formats, probed in order.
const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Choose the swap surface format: prefer B8G8R8A8_SRGB with the sRGB
/// nonlinear colorspace, otherwise fall back to the first supported entry.
pub(crate) fn choose_surface_format(
    available: &[vk::SurfaceFormatKHR],
) -> vk::SurfaceFormatKHR {
    available
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .copied()
        .unwrap_or(available[0])
}

/// Choose the present mode: prefer low-latency triple-buffered MAILBOX,
/// fall back to the universally supported FIFO.
pub(crate) fn choose_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if available.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Choose the swap extent: the surface's fixed extent when it reports one,
/// otherwise the desired extent clamped into the capability bounds.
pub(crate) fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: desired.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: desired.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// Choose the image count: one above the minimum for pipelining, clamped to
/// the maximum when the surface reports a bound (0 means unbounded).
pub(crate) fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

/// Result of acquiring the next presentable image
pub struct AcquiredImage {
    pub image_index: u32,
    /// The surface still works but no longer matches optimally; the caller
    /// should rebuild after presenting this frame.
    pub suboptimal: bool,
}

/// Vulkan swapchain manager
pub struct SwapchainManager {
    ctx: Arc<GpuContext>,

    swapchain_loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::Format,
    extent: vk::Extent2D,

    msaa_samples: vk::SampleCountFlags,
    depth_format: vk::Format,
    depth_image: Option<Image>,
    depth_view: vk::ImageView,
    color_image: Option<Image>,
    color_view: vk::ImageView,

    framebuffers: Vec<vk::Framebuffer>,
}

impl SwapchainManager {
    /// Create the swapchain, its image views and the dependent attachments.
    ///
    /// Framebuffers are created separately once a render pass exists, via
    /// [`SwapchainManager::create_framebuffers`].
    pub fn new(
        ctx: Arc<GpuContext>,
        factory: &ResourceFactory,
        desired_extent: vk::Extent2D,
        msaa_samples: vk::SampleCountFlags,
    ) -> Result<Self> {
        let swapchain_loader = ash::khr::swapchain::Device::new(&ctx.instance, &ctx.device);
        let depth_format = factory.find_supported_format(
            &DEPTH_FORMAT_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;

        let mut manager = Self {
            ctx,
            swapchain_loader,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            image_views: Vec::new(),
            format: vk::Format::UNDEFINED,
            extent: vk::Extent2D::default(),
            msaa_samples,
            depth_format,
            depth_image: None,
            depth_view: vk::ImageView::null(),
            color_image: None,
            color_view: vk::ImageView::null(),
            framebuffers: Vec::new(),
        };

        manager.create_chain(desired_extent)?;
        manager.create_attachments(factory)?;
        Ok(manager)
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn framebuffer(&self, image_index: u32) -> vk::Framebuffer {
        self.framebuffers[image_index as usize]
    }

    /// Create the presentable image chain and one view per image.
    fn create_chain(&mut self, desired_extent: vk::Extent2D) -> Result<()> {
        unsafe {
            let capabilities = self
                .ctx
                .surface_loader
                .get_physical_device_surface_capabilities(
                    self.ctx.physical_device,
                    self.ctx.surface,
                )
                .map_err(|e| {
                    engine_error!(
                        "meridian3d::vulkan",
                        "Failed to get surface capabilities: {:?}",
                        e
                    );
                    Error::InitializationFailed(format!(
                        "Failed to get surface capabilities: {:?}",
                        e
                    ))
                })?;

            let formats = self
                .ctx
                .surface_loader
                .get_physical_device_surface_formats(self.ctx.physical_device, self.ctx.surface)
                .map_err(|e| {
                    engine_err!(
                        "meridian3d::vulkan",
                        "Failed to query surface formats: {:?}",
                        e
                    )
                })?;

            let present_modes = self
                .ctx
                .surface_loader
                .get_physical_device_surface_present_modes(
                    self.ctx.physical_device,
                    self.ctx.surface,
                )
                .map_err(|e| {
                    engine_err!(
                        "meridian3d::vulkan",
                        "Failed to query surface present modes: {:?}",
                        e
                    )
                })?;

            let surface_format = choose_surface_format(&formats);
            let present_mode = choose_present_mode(&present_modes);
            let extent = choose_extent(&capabilities, desired_extent);
            let image_count = choose_image_count(&capabilities);

            let create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(self.ctx.surface)
                .min_image_count(image_count)
                .image_format(surface_format.format)
                .image_color_space(surface_format.color_space)
                .image_extent(extent)
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
                .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
                .pre_transform(capabilities.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(present_mode)
                .clipped(true);

            let swapchain = self
                .swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(|e| {
                    engine_error!("meridian3d::vulkan", "Failed to create swapchain: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create swapchain: {:?}", e))
                })?;

            let images = self
                .swapchain_loader
                .get_swapchain_images(swapchain)
                .map_err(|e| {
                    engine_err!(
                        "meridian3d::vulkan",
                        "Failed to get swapchain images: {:?}",
                        e
                    )
                })?;

            let mut image_views = Vec::with_capacity(images.len());
            for &image in &images {
                let view_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(surface_format.format)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });
                image_views.push(self.ctx.device.create_image_view(&view_info, None).map_err(
                    |e| {
                        engine_err!(
                            "meridian3d::vulkan",
                            "Failed to create swapchain image view: {:?}",
                            e
                        )
                    },
                )?);
            }

            engine_info!(
                "meridian3d::vulkan",
                "Swapchain created: {} images, {:?}, {}x{}, {:?}",
                images.len(),
                surface_format.format,
                extent.width,
                extent.height,
                present_mode
            );

            self.swapchain = swapchain;
            self.images = images;
            self.image_views = image_views;
            self.format = surface_format.format;
            self.extent = extent;
            Ok(())
        }
    }

    /// Build the depth attachment and, when multisampling is enabled, the
    /// multisample color attachment, both sized to the current extent.
    fn create_attachments(&mut self, factory: &ResourceFactory) -> Result<()> {
        let depth_image = factory.create_image(
            self.extent.width,
            self.extent.height,
            1,
            self.msaa_samples,
            self.depth_format,
            vk::ImageTiling::OPTIMAL,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        let depth_view = factory.create_image_view(
            depth_image.image,
            self.depth_format,
            vk::ImageAspectFlags::DEPTH,
            1,
        )?;
        self.depth_image = Some(depth_image);
        self.depth_view = depth_view;

        if self.msaa_samples != vk::SampleCountFlags::TYPE_1 {
            let color_image = factory.create_image(
                self.extent.width,
                self.extent.height,
                1,
                self.msaa_samples,
                self.format,
                vk::ImageTiling::OPTIMAL,
                vk::ImageUsageFlags::TRANSIENT_ATTACHMENT | vk::ImageUsageFlags::COLOR_ATTACHMENT,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
            )?;
            let color_view = factory.create_image_view(
                color_image.image,
                self.format,
                vk::ImageAspectFlags::COLOR,
                1,
            )?;
            self.color_image = Some(color_image);
            self.color_view = color_view;
        }

        Ok(())
    }

    /// Create one framebuffer per swapchain image against `render_pass`.
    ///
    /// Attachment order matches the render pass built by the pipeline:
    /// `[msaa color, depth, resolve target]` when multisampling, otherwise
    /// `[swapchain image, depth]`.
    pub fn create_framebuffers(&mut self, render_pass: vk::RenderPass) -> Result<()> {
        for &view in &self.image_views {
            let attachments = if self.msaa_samples != vk::SampleCountFlags::TYPE_1 {
                vec![self.color_view, self.depth_view, view]
            } else {
                vec![view, self.depth_view]
            };

            let create_info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(self.extent.width)
                .height(self.extent.height)
                .layers(1);

            let framebuffer = unsafe {
                self.ctx
                    .device
                    .create_framebuffer(&create_info, None)
                    .map_err(|e| {
                        engine_err!(
                            "meridian3d::vulkan",
                            "Failed to create framebuffer: {:?}",
                            e
                        )
                    })?
            };
            self.framebuffers.push(framebuffer);
        }
        Ok(())
    }

    /// Acquire the next presentable image, signaling `semaphore` when the
    /// image becomes available.
    ///
    /// Returns `Error::SurfaceOutOfDate` when the chain must be rebuilt
    /// before anything can be rendered.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<AcquiredImage> {
        unsafe {
            match self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            ) {
                Ok((image_index, suboptimal)) => Ok(AcquiredImage {
                    image_index,
                    suboptimal,
                }),
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(Error::SurfaceOutOfDate),
                Err(e) => Err(engine_err!(
                    "meridian3d::vulkan",
                    "Failed to acquire next swapchain image: {:?}",
                    e
                )),
            }
        }
    }

    /// Present `image_index` on the present queue, waiting on `wait_semaphore`.
    ///
    /// Returns `Ok(true)` when the surface reported suboptimal and
    /// `Error::SurfaceOutOfDate` when it must be rebuilt.
    pub fn present(&self, image_index: u32, wait_semaphore: vk::Semaphore) -> Result<bool> {
        unsafe {
            let swapchains = [self.swapchain];
            let image_indices = [image_index];
            let wait_semaphores = [wait_semaphore];

            let present_info = vk::PresentInfoKHR::default()
                .wait_semaphores(&wait_semaphores)
                .swapchains(&swapchains)
                .image_indices(&image_indices);

            match self
                .swapchain_loader
                .queue_present(self.ctx.present_queue, &present_info)
            {
                Ok(suboptimal) => Ok(suboptimal),
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(Error::SurfaceOutOfDate),
                Err(e) => Err(engine_err!(
                    "meridian3d::vulkan",
                    "Failed to present swapchain image: {:?}",
                    e
                )),
            }
        }
    }

    /// Release the framebuffers, attachments, image views and the chain
    /// itself. The render pass and pipeline are untouched. Idempotent.
    ///
    /// The caller must guarantee no in-flight submission still references
    /// these resources (device idle or all fences signaled).
    pub fn teardown(&mut self) {
        unsafe {
            for framebuffer in self.framebuffers.drain(..) {
                self.ctx.device.destroy_framebuffer(framebuffer, None);
            }

            if self.color_view != vk::ImageView::null() {
                self.ctx.device.destroy_image_view(self.color_view, None);
                self.color_view = vk::ImageView::null();
            }
            self.color_image = None;

            if self.depth_view != vk::ImageView::null() {
                self.ctx.device.destroy_image_view(self.depth_view, None);
                self.depth_view = vk::ImageView::null();
            }
            self.depth_image = None;

            for view in self.image_views.drain(..) {
                self.ctx.device.destroy_image_view(view, None);
            }
            self.images.clear();

            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
                self.swapchain = vk::SwapchainKHR::null();
            }
        }
    }

    /// Tear down and recreate the chain, attachments and framebuffers for a
    /// new surface state. Waits for device idle first so no in-flight
    /// submission still references the old resources.
    pub fn rebuild(
        &mut self,
        factory: &ResourceFactory,
        render_pass: vk::RenderPass,
        desired_extent: vk::Extent2D,
    ) -> Result<()> {
        engine_debug!(
            "meridian3d::vulkan",
            "Rebuilding swapchain for {}x{}",
            desired_extent.width,
            desired_extent.height
        );

        self.ctx.wait_idle();
        self.teardown();
        self.create_chain(desired_extent)?;
        self.create_attachments(factory)?;
        self.create_framebuffers(render_pass)?;
        Ok(())
    }
}

impl Drop for SwapchainManager {
    fn drop(&mut self) {
        self.ctx.wait_idle();
        self.teardown();
    }
}
