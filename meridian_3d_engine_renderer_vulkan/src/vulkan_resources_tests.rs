//! Unit tests for memory-type selection
//!
//! Builds `vk::PhysicalDeviceMemoryProperties` by hand to exercise the
//! selection logic without a GPU.

use ash::vk;

use crate::vulkan_resources::select_memory_type;

fn memory_properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
    let mut props = vk::PhysicalDeviceMemoryProperties {
        memory_type_count: types.len() as u32,
        ..Default::default()
    };
    for (i, &flags) in types.iter().enumerate() {
        props.memory_types[i] = vk::MemoryType {
            property_flags: flags,
            heap_index: 0,
        };
    }
    props
}

#[test]
fn test_select_memory_type_exact_match() {
    let props = memory_properties(&[
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    ]);

    let index = select_memory_type(
        &props,
        0b11,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    );
    assert_eq!(index, Some(1));
}

#[test]
fn test_select_memory_type_superset_is_acceptable() {
    // A type with more flags than required still satisfies the request
    let props = memory_properties(&[
        vk::MemoryPropertyFlags::DEVICE_LOCAL
            | vk::MemoryPropertyFlags::HOST_VISIBLE
            | vk::MemoryPropertyFlags::HOST_COHERENT,
    ]);

    let index = select_memory_type(&props, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE);
    assert_eq!(index, Some(0));
}

#[test]
fn test_select_memory_type_respects_type_bits() {
    // Both types have the right flags but only bit 1 is allowed
    let props = memory_properties(&[
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    ]);

    let index = select_memory_type(&props, 0b10, vk::MemoryPropertyFlags::DEVICE_LOCAL);
    assert_eq!(index, Some(1));
}

#[test]
fn test_select_memory_type_partial_flags_rejected() {
    // HOST_VISIBLE alone must not satisfy HOST_VISIBLE | HOST_COHERENT
    let props = memory_properties(&[vk::MemoryPropertyFlags::HOST_VISIBLE]);

    let index = select_memory_type(
        &props,
        0b1,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    );
    assert_eq!(index, None);
}

#[test]
fn test_select_memory_type_no_match_is_none() {
    let props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);

    let index = select_memory_type(&props, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE);
    assert_eq!(index, None);
}

#[test]
fn test_select_memory_type_picks_first_eligible() {
    let props = memory_properties(&[
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    ]);

    let index = select_memory_type(&props, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL);
    assert_eq!(index, Some(0));
}
