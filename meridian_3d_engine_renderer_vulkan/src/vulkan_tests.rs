//! Unit tests for sample count selection and frame-loop suspension

use ash::vk;

use crate::vulkan::{extent_suspended, pick_max_sample_count};

#[test]
fn test_sample_count_highest_common() {
    let color = vk::SampleCountFlags::TYPE_1
        | vk::SampleCountFlags::TYPE_2
        | vk::SampleCountFlags::TYPE_4
        | vk::SampleCountFlags::TYPE_8;
    let depth = vk::SampleCountFlags::TYPE_1
        | vk::SampleCountFlags::TYPE_2
        | vk::SampleCountFlags::TYPE_4;

    // Depth caps the choice at 4x
    assert_eq!(
        pick_max_sample_count(color, depth),
        vk::SampleCountFlags::TYPE_4
    );
}

#[test]
fn test_sample_count_full_range() {
    let all = vk::SampleCountFlags::TYPE_1
        | vk::SampleCountFlags::TYPE_2
        | vk::SampleCountFlags::TYPE_4
        | vk::SampleCountFlags::TYPE_8
        | vk::SampleCountFlags::TYPE_16
        | vk::SampleCountFlags::TYPE_32
        | vk::SampleCountFlags::TYPE_64;

    assert_eq!(
        pick_max_sample_count(all, all),
        vk::SampleCountFlags::TYPE_64
    );
}

#[test]
fn test_sample_count_falls_back_to_single() {
    assert_eq!(
        pick_max_sample_count(vk::SampleCountFlags::TYPE_1, vk::SampleCountFlags::TYPE_1),
        vk::SampleCountFlags::TYPE_1
    );
    // Disjoint sets also degrade to single sampling
    assert_eq!(
        pick_max_sample_count(vk::SampleCountFlags::TYPE_4, vk::SampleCountFlags::TYPE_2),
        vk::SampleCountFlags::TYPE_1
    );
}

#[test]
fn test_zero_area_extent_suspends_frames() {
    // A minimized window reports zero in one or both dimensions
    assert!(extent_suspended(vk::Extent2D {
        width: 0,
        height: 0
    }));
    assert!(extent_suspended(vk::Extent2D {
        width: 1280,
        height: 0
    }));
    assert!(extent_suspended(vk::Extent2D {
        width: 0,
        height: 720
    }));
}

#[test]
fn test_nonzero_extent_resumes_frames() {
    assert!(!extent_suspended(vk::Extent2D {
        width: 1,
        height: 1
    }));
    assert!(!extent_suspended(vk::Extent2D {
        width: 1280,
        height: 720
    }));
}
