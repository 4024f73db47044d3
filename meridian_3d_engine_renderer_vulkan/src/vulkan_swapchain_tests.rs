//! Unit tests for swapchain selection helpers
//!
//! Tests the pure format, present mode, extent and image count choices
//! without requiring a GPU or surface.

use ash::vk;

use crate::vulkan_swapchain::{
    choose_extent, choose_image_count, choose_present_mode, choose_surface_format,
};

fn capabilities(
    current: vk::Extent2D,
    min_extent: vk::Extent2D,
    max_extent: vk::Extent2D,
    min_images: u32,
    max_images: u32,
) -> vk::SurfaceCapabilitiesKHR {
    vk::SurfaceCapabilitiesKHR {
        current_extent: current,
        min_image_extent: min_extent,
        max_image_extent: max_extent,
        min_image_count: min_images,
        max_image_count: max_images,
        ..Default::default()
    }
}

// ============================================================================
// SURFACE FORMAT TESTS
// ============================================================================

#[test]
fn test_surface_format_prefers_bgra_srgb() {
    let available = [
        vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        },
        vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        },
    ];

    let chosen = choose_surface_format(&available);
    assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
    assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
}

#[test]
fn test_surface_format_requires_matching_colorspace() {
    // The right format in the wrong colorspace does not win
    let available = [
        vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        },
        vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        },
    ];

    let chosen = choose_surface_format(&available);
    assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
}

#[test]
fn test_surface_format_falls_back_to_first() {
    let available = [
        vk::SurfaceFormatKHR {
            format: vk::Format::R16G16B16A16_SFLOAT,
            color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        },
        vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        },
    ];

    let chosen = choose_surface_format(&available);
    assert_eq!(chosen.format, vk::Format::R16G16B16A16_SFLOAT);
}

// ============================================================================
// PRESENT MODE TESTS
// ============================================================================

#[test]
fn test_present_mode_prefers_mailbox() {
    let available = [
        vk::PresentModeKHR::FIFO,
        vk::PresentModeKHR::MAILBOX,
        vk::PresentModeKHR::IMMEDIATE,
    ];
    assert_eq!(choose_present_mode(&available), vk::PresentModeKHR::MAILBOX);
}

#[test]
fn test_present_mode_falls_back_to_fifo() {
    let available = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
    assert_eq!(choose_present_mode(&available), vk::PresentModeKHR::FIFO);
}

// ============================================================================
// EXTENT TESTS
// ============================================================================

#[test]
fn test_extent_uses_surface_fixed_extent() {
    let caps = capabilities(
        vk::Extent2D {
            width: 800,
            height: 600,
        },
        vk::Extent2D {
            width: 1,
            height: 1,
        },
        vk::Extent2D {
            width: 4096,
            height: 4096,
        },
        2,
        0,
    );

    let extent = choose_extent(
        &caps,
        vk::Extent2D {
            width: 1920,
            height: 1080,
        },
    );
    assert_eq!(extent.width, 800);
    assert_eq!(extent.height, 600);
}

#[test]
fn test_extent_clamps_when_surface_is_flexible() {
    // current_extent of u32::MAX means the window size decides
    let caps = capabilities(
        vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        },
        vk::Extent2D {
            width: 200,
            height: 200,
        },
        vk::Extent2D {
            width: 1000,
            height: 1000,
        },
        2,
        0,
    );

    let too_big = choose_extent(
        &caps,
        vk::Extent2D {
            width: 5000,
            height: 50,
        },
    );
    assert_eq!(too_big.width, 1000);
    assert_eq!(too_big.height, 200);

    let in_range = choose_extent(
        &caps,
        vk::Extent2D {
            width: 640,
            height: 480,
        },
    );
    assert_eq!(in_range.width, 640);
    assert_eq!(in_range.height, 480);
}

// ============================================================================
// IMAGE COUNT TESTS
// ============================================================================

#[test]
fn test_image_count_one_above_minimum() {
    let caps = capabilities(
        vk::Extent2D::default(),
        vk::Extent2D::default(),
        vk::Extent2D::default(),
        2,
        0,
    );
    // Unbounded maximum: min + 1
    assert_eq!(choose_image_count(&caps), 3);
}

#[test]
fn test_image_count_clamped_to_maximum() {
    let caps = capabilities(
        vk::Extent2D::default(),
        vk::Extent2D::default(),
        vk::Extent2D::default(),
        3,
        3,
    );
    assert_eq!(choose_image_count(&caps), 3);
}

#[test]
fn test_image_count_maximum_above_request() {
    let caps = capabilities(
        vk::Extent2D::default(),
        vk::Extent2D::default(),
        vk::Extent2D::default(),
        2,
        8,
    );
    assert_eq!(choose_image_count(&caps), 3);
}
