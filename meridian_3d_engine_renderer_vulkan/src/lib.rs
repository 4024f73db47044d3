/*!
# Meridian3D - Vulkan Renderer Backend

Vulkan implementation of the Meridian3D rendering engine.

This crate provides a Vulkan backend built on the Ash bindings: swapchain
lifecycle, frames-in-flight pacing, staged resource uploads with GPU mip
generation, and per-material descriptor sets.
*/

mod debug;
mod vulkan;
mod vulkan_context;
mod vulkan_frame;
mod vulkan_materials;
mod vulkan_pipeline;
mod vulkan_recorder;
mod vulkan_resources;
mod vulkan_swapchain;
mod vulkan_transfer;

pub use vulkan::VulkanRenderer;
pub use vulkan_context::GpuContext;
pub use vulkan_frame::{FrameOutcome, FrameScheduler, MAX_FRAMES_IN_FLIGHT};
pub use vulkan_materials::{Material, MaterialStore};
pub use vulkan_recorder::CommandRecorder;
pub use vulkan_resources::{Buffer, GeometryBuffers, Image, ResourceFactory};
pub use vulkan_swapchain::{AcquiredImage, SwapchainManager};
pub use vulkan_transfer::TransferExecutor;

// Re-export ash so callers can name vk types without a separate dependency
pub use ash;

#[cfg(test)]
mod vulkan_resources_tests;
#[cfg(test)]
mod vulkan_swapchain_tests;
#[cfg(test)]
mod vulkan_tests;
#[cfg(test)]
mod vulkan_transfer_tests;
