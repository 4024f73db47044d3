//! Model-loading and image-decoding capability interfaces
//!
//! The engine never parses scene files itself. A `ModelSource` supplies
//! vertex/index data and the texture paths it references, invoked once at
//! startup before the frame loop begins. An `ImageDecoder` turns a texture
//! path into raw RGBA8 pixels; the default implementation uses the `image`
//! crate.

use std::path::{Path, PathBuf};

use glam::{Mat4, Vec2, Vec3};

use crate::error::{Error, Result};
use crate::engine_debug;

/// A single vertex: position, color and texture coordinate
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub color: Vec3,
    pub tex_coord: Vec2,
}

/// Per-frame uniform data: model/view/projection matrices
///
/// Written every frame through a persistently mapped buffer, never read back.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct UniformBufferObject {
    pub model: Mat4,
    pub view: Mat4,
    pub proj: Mat4,
}

/// A contiguous range of the index buffer drawn with one material
///
/// `texture` indexes into [`ModelData::texture_paths`]. Ranges partition the
/// index buffer; the recorder binds the range's material descriptor set and
/// issues one indexed draw per range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawRange {
    pub texture: usize,
    pub first_index: u32,
    pub index_count: u32,
}

/// Geometry and material references supplied by a [`ModelSource`]
#[derive(Debug, Clone, Default)]
pub struct ModelData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub texture_paths: Vec<PathBuf>,
    pub draws: Vec<DrawRange>,
}

impl ModelData {
    /// Check internal consistency: index values in range, draw ranges inside
    /// the index buffer, texture references valid.
    pub fn validate(&self) -> Result<()> {
        if self.vertices.is_empty() || self.indices.is_empty() {
            return Err(Error::InitializationFailed(
                "Model source supplied no geometry".to_string(),
            ));
        }
        let vertex_count = self.vertices.len() as u32;
        if let Some(&bad) = self.indices.iter().find(|&&i| i >= vertex_count) {
            return Err(Error::InitializationFailed(format!(
                "Index {} out of range (vertex count: {})",
                bad, vertex_count
            )));
        }
        for draw in &self.draws {
            let end = draw.first_index as u64 + draw.index_count as u64;
            if end > self.indices.len() as u64 {
                return Err(Error::InitializationFailed(format!(
                    "Draw range [{}, {}) exceeds index count {}",
                    draw.first_index,
                    end,
                    self.indices.len()
                )));
            }
            if draw.texture >= self.texture_paths.len() {
                return Err(Error::InitializationFailed(format!(
                    "Draw range references texture {} but only {} paths were supplied",
                    draw.texture,
                    self.texture_paths.len()
                )));
            }
        }
        Ok(())
    }
}

/// Capability interface supplying geometry to the renderer
///
/// Implementations parse OBJ files, generate procedural meshes, etc. The
/// engine only calls [`ModelSource::load`] once, during setup.
pub trait ModelSource {
    fn load(&self) -> Result<ModelData>;
}

/// Decoded RGBA8 pixel data
#[derive(Debug, Clone)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA8, `width * height * 4` bytes
    pub pixels: Vec<u8>,
}

/// Capability interface turning a texture path into pixels
pub trait ImageDecoder {
    fn decode(&self, path: &Path) -> Result<ImageData>;
}

/// Default [`ImageDecoder`] reading files from disk with the `image` crate
pub struct FileImageDecoder;

impl ImageDecoder for FileImageDecoder {
    fn decode(&self, path: &Path) -> Result<ImageData> {
        let decoded = image::open(path)
            .map_err(|e| {
                Error::InitializationFailed(format!(
                    "Failed to decode texture {}: {}",
                    path.display(),
                    e
                ))
            })?
            .to_rgba8();

        let (width, height) = decoded.dimensions();
        engine_debug!(
            "meridian3d::model",
            "Decoded texture {} ({}x{})",
            path.display(),
            width,
            height
        );

        Ok(ImageData {
            width,
            height,
            pixels: decoded.into_raw(),
        })
    }
}
