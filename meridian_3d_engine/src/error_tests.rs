//! Unit tests for error.rs
//!
//! Tests Display formatting, the recoverability split and trait impls.

use crate::error::{Error, Result};

// ============================================================================
// DISPLAY TESTS
// ============================================================================

#[test]
fn test_error_display_initialization_failed() {
    let err = Error::InitializationFailed("no Vulkan-capable GPU".to_string());
    assert_eq!(
        err.to_string(),
        "Initialization failed: no Vulkan-capable GPU"
    );
}

#[test]
fn test_error_display_resource() {
    let err = Error::Resource("no compatible memory type".to_string());
    assert_eq!(err.to_string(), "Resource error: no compatible memory type");
}

#[test]
fn test_error_display_unsupported_format() {
    let err = Error::UnsupportedFormat("no depth format candidate".to_string());
    assert_eq!(
        err.to_string(),
        "Unsupported format: no depth format candidate"
    );
}

#[test]
fn test_error_display_unsupported_blit() {
    let err = Error::UnsupportedBlit("R8G8B8A8_SRGB".to_string());
    assert_eq!(err.to_string(), "Unsupported blit: R8G8B8A8_SRGB");
}

#[test]
fn test_error_display_surface_out_of_date() {
    assert_eq!(Error::SurfaceOutOfDate.to_string(), "Surface out of date");
}

#[test]
fn test_error_display_descriptor_pool_exhausted() {
    let err = Error::DescriptorPoolExhausted("8 sets requested".to_string());
    assert_eq!(
        err.to_string(),
        "Descriptor pool exhausted: 8 sets requested"
    );
}

// ============================================================================
// RECOVERABILITY TESTS
// ============================================================================

#[test]
fn test_only_surface_out_of_date_is_recoverable() {
    assert!(Error::SurfaceOutOfDate.is_recoverable());

    assert!(!Error::InitializationFailed("x".to_string()).is_recoverable());
    assert!(!Error::Resource("x".to_string()).is_recoverable());
    assert!(!Error::UnsupportedFormat("x".to_string()).is_recoverable());
    assert!(!Error::UnsupportedBlit("x".to_string()).is_recoverable());
    assert!(!Error::DescriptorPoolExhausted("x".to_string()).is_recoverable());
    assert!(!Error::Backend("x".to_string()).is_recoverable());
}

// ============================================================================
// TRAIT TESTS
// ============================================================================

#[test]
fn test_error_implements_std_error() {
    let err: Box<dyn std::error::Error> = Box::new(Error::SurfaceOutOfDate);
    assert_eq!(err.to_string(), "Surface out of date");
}

#[test]
fn test_error_propagates_with_question_mark() {
    fn inner() -> Result<()> {
        Err(Error::Backend("queue submit failed".to_string()))
    }
    fn outer() -> Result<()> {
        inner()?;
        Ok(())
    }
    assert!(matches!(outer(), Err(Error::Backend(_))));
}

#[test]
fn test_error_is_cloneable() {
    let err = Error::Resource("staging".to_string());
    let clone = err.clone();
    assert_eq!(err.to_string(), clone.to_string());
}
