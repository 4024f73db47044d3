//! Error types for the Meridian3D engine
//!
//! This module defines the error taxonomy shared by the engine core and
//! the rendering backends: resource allocation, device capability gaps,
//! surface lifetime events and descriptor pool exhaustion.

use std::fmt;

/// Result type for Meridian3D engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Meridian3D engine errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Initialization failed (engine, backend, subsystems) — fatal, aborts startup
    InitializationFailed(String),

    /// GPU resource allocation or memory-type selection failed — fatal
    Resource(String),

    /// No candidate format satisfies the requested tiling/features — fatal
    UnsupportedFormat(String),

    /// The device cannot blit the format with linear filtering — fatal
    UnsupportedBlit(String),

    /// The presentation surface no longer matches the swapchain — recoverable,
    /// the frame loop rebuilds the swapchain and continues
    SurfaceOutOfDate,

    /// The fixed-size descriptor pool ran out of sets — fatal, pool sizing is
    /// derived from the material count known at startup
    DescriptorPoolExhausted(String),

    /// Unexpected backend error (any Vulkan result without a recovery path)
    Backend(String),
}

impl Error {
    /// Whether the frame loop can recover from this error by rebuilding the
    /// swapchain instead of terminating.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::SurfaceOutOfDate)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::Resource(msg) => write!(f, "Resource error: {}", msg),
            Error::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            Error::UnsupportedBlit(msg) => write!(f, "Unsupported blit: {}", msg),
            Error::SurfaceOutOfDate => write!(f, "Surface out of date"),
            Error::DescriptorPoolExhausted(msg) => write!(f, "Descriptor pool exhausted: {}", msg),
            Error::Backend(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
