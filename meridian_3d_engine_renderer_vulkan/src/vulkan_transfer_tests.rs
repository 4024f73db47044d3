//! Unit tests for transfer helpers
//!
//! Tests the pure mip-chain and barrier-selection functions without
//! requiring a GPU.

use ash::vk;

use crate::vulkan_transfer::{
    has_stencil_component, layout_transition_masks, mip_dimension, mip_level_count,
};

// ============================================================================
// MIP CHAIN TESTS
// ============================================================================

#[test]
fn test_mip_level_count_power_of_two() {
    assert_eq!(mip_level_count(512, 512), 10);
    assert_eq!(mip_level_count(1024, 1024), 11);
    assert_eq!(mip_level_count(1, 1), 1);
}

#[test]
fn test_mip_level_count_uses_larger_dimension() {
    assert_eq!(mip_level_count(512, 1), 10);
    assert_eq!(mip_level_count(1, 512), 10);
    assert_eq!(mip_level_count(1024, 512), 11);
}

#[test]
fn test_mip_level_count_non_power_of_two() {
    // floor(log2(1000)) + 1 = 9 + 1
    assert_eq!(mip_level_count(1000, 600), 10);
    // floor(log2(3)) + 1 = 1 + 1
    assert_eq!(mip_level_count(3, 2), 2);
}

#[test]
fn test_mip_level_count_zero_clamps_to_one_level() {
    assert_eq!(mip_level_count(0, 0), 1);
}

#[test]
fn test_mip_dimension_halves_and_clamps() {
    assert_eq!(mip_dimension(512, 0), 512);
    assert_eq!(mip_dimension(512, 1), 256);
    assert_eq!(mip_dimension(512, 9), 1);
    // Past the bottom of the chain the dimension stays 1
    assert_eq!(mip_dimension(512, 12), 1);
}

#[test]
fn test_mip_dimension_odd_sizes_floor() {
    assert_eq!(mip_dimension(5, 1), 2);
    assert_eq!(mip_dimension(5, 2), 1);
}

// ============================================================================
// LAYOUT TRANSITION TESTS
// ============================================================================

#[test]
fn test_transition_undefined_to_transfer_dst() {
    let (src_access, dst_access, src_stage, dst_stage) = layout_transition_masks(
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    )
    .unwrap();

    assert_eq!(src_access, vk::AccessFlags::empty());
    assert_eq!(dst_access, vk::AccessFlags::TRANSFER_WRITE);
    assert_eq!(src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
    assert_eq!(dst_stage, vk::PipelineStageFlags::TRANSFER);
}

#[test]
fn test_transition_transfer_dst_to_shader_read() {
    let (src_access, dst_access, src_stage, dst_stage) = layout_transition_masks(
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    )
    .unwrap();

    assert_eq!(src_access, vk::AccessFlags::TRANSFER_WRITE);
    assert_eq!(dst_access, vk::AccessFlags::SHADER_READ);
    assert_eq!(src_stage, vk::PipelineStageFlags::TRANSFER);
    assert_eq!(dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
}

#[test]
fn test_transition_undefined_to_depth_attachment() {
    let (_, dst_access, _, dst_stage) = layout_transition_masks(
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    )
    .unwrap();

    assert!(dst_access.contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));
    assert_eq!(dst_stage, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS);
}

#[test]
fn test_transition_unknown_pair_is_rejected() {
    assert!(layout_transition_masks(
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    )
    .is_none());
    assert!(layout_transition_masks(
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::PRESENT_SRC_KHR,
    )
    .is_none());
}

// ============================================================================
// STENCIL COMPONENT TESTS
// ============================================================================

#[test]
fn test_stencil_component_detection() {
    assert!(has_stencil_component(vk::Format::D32_SFLOAT_S8_UINT));
    assert!(has_stencil_component(vk::Format::D24_UNORM_S8_UINT));
    assert!(!has_stencil_component(vk::Format::D32_SFLOAT));
    assert!(!has_stencil_component(vk::Format::R8G8B8A8_SRGB));
}
