//! GpuContext - Shared GPU state for all Vulkan objects
//!
//! Contains everything needed for GPU operations:
//! - Device for Vulkan API calls
//! - Cached physical-device memory properties for memory-type selection
//! - Queues for command submission and presentation
//! - Transient command pool for one-shot transfer operations

use ash::vk;
use std::sync::Arc;

/// Shared GPU context for all Vulkan resources.
///
/// This struct is shared (via `Arc`) by every GPU resource (buffers, images,
/// the swapchain, pipelines) to avoid duplicating device/queue references in
/// each resource. The last `Arc` to drop tears down the device, the debug
/// messenger, the surface and the instance, in that order, so resources can
/// always rely on the device being alive in their own `Drop` impls.
pub struct GpuContext {
    /// Vulkan entry point (kept alive for the loaders)
    _entry: ash::Entry,

    /// Vulkan instance
    pub instance: ash::Instance,

    /// Physical device
    pub physical_device: vk::PhysicalDevice,

    /// Vulkan logical device
    pub device: ash::Device,

    /// Cached memory properties, queried once at device creation
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,

    /// Graphics queue for command submission
    pub graphics_queue: vk::Queue,

    /// Graphics queue family index
    pub graphics_queue_family: u32,

    /// Present queue (may be the same as the graphics queue)
    pub present_queue: vk::Queue,

    /// Window surface
    pub surface: vk::SurfaceKHR,

    /// Surface loader for capability queries
    pub surface_loader: ash::khr::surface::Instance,

    /// Transient command pool for one-shot transfer command buffers
    pub transfer_command_pool: vk::CommandPool,

    /// Debug utils loader (when validation is enabled)
    pub(crate) debug_utils_loader: Option<ash::ext::debug_utils::Instance>,

    /// Debug messenger handle (when validation is enabled)
    pub(crate) debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl GpuContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        entry: ash::Entry,
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        graphics_queue: vk::Queue,
        graphics_queue_family: u32,
        present_queue: vk::Queue,
        surface: vk::SurfaceKHR,
        surface_loader: ash::khr::surface::Instance,
        transfer_command_pool: vk::CommandPool,
        debug_utils_loader: Option<ash::ext::debug_utils::Instance>,
        debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    ) -> Arc<Self> {
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };

        Arc::new(Self {
            _entry: entry,
            instance,
            physical_device,
            device,
            memory_properties,
            graphics_queue,
            graphics_queue_family,
            present_queue,
            surface,
            surface_loader,
            transfer_command_pool,
            debug_utils_loader,
            debug_messenger,
        })
    }

    /// Block until every queue on the device has finished executing.
    ///
    /// Called before any swapchain rebuild and before shutdown so nothing is
    /// destroyed while an in-flight submission still references it.
    pub fn wait_idle(&self) {
        unsafe {
            self.device.device_wait_idle().ok();
        }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            self.device
                .destroy_command_pool(self.transfer_command_pool, None);
            self.device.destroy_device(None);

            if let (Some(loader), Some(messenger)) =
                (&self.debug_utils_loader, self.debug_messenger)
            {
                loader.destroy_debug_utils_messenger(messenger, None);
            }

            self.surface_loader.destroy_surface(self.surface, None);
            self.instance.destroy_instance(None);
        }
    }
}
