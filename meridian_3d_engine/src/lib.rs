/*!
# Meridian 3D Engine

Core types for the Meridian 3D rendering engine.

This crate holds everything the rendering backend does not need Vulkan for:
the error taxonomy, the logging system, renderer configuration, and the
capability interfaces (model loading, image decoding) through which scene
data reaches the engine. The Vulkan backend lives in
`meridian_3d_engine_renderer_vulkan`; a runnable application wires both
together (see `meridian3d_demo`).

## Architecture

- **Error / Result**: single error enum shared across the workspace
- **log**: Logger trait + colored DefaultLogger + engine_* macros
- **Config**: runtime renderer configuration (validation, MSAA, clear color)
- **ModelSource / ImageDecoder**: constructor-injected capability traits
*/

// Internal modules
mod config;
mod error;
pub mod log;
pub mod model;

#[cfg(test)]
mod error_tests;
#[cfg(test)]
mod log_tests;

// Main meridian3d namespace module
pub mod meridian3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Renderer configuration
    pub use crate::config::Config;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{set_logger, DefaultLogger, LogEntry, LogSeverity, Logger};
    }

    // Model/image capability interfaces and data types
    pub mod model {
        pub use crate::model::*;
    }
}

// Re-export math library at crate root
pub use glam;
