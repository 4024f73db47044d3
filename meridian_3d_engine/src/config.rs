//! Renderer configuration
//!
//! All toggles are plain runtime values read once at startup. Validation
//! layer support in particular is a runtime decision, not a compile-time
//! feature: release builds can still opt in for diagnosis.

/// Renderer configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Enable validation/debug layers
    pub enable_validation: bool,

    /// Application name
    pub app_name: String,

    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),

    /// Render multisampled at the maximum sample count the device supports
    pub enable_msaa: bool,

    /// Background clear color (RGBA)
    pub clear_color: [f32; 4],
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_validation: cfg!(debug_assertions),
            app_name: "Meridian3D Application".to_string(),
            app_version: (1, 0, 0),
            enable_msaa: true,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}
