//! Meridian3D demo: a spinning textured cube over a floor quad.
//!
//! Geometry is generated in process and textures are procedural
//! checkerboards, so the only on-disk assets are the compiled shaders.
//! Compile them once with glslc before running:
//!
//! ```sh
//! glslc shaders/shader.vert -o shaders/shader.vert.spv
//! glslc shaders/shader.frag -o shaders/shader.frag.spv
//! cargo run -p meridian3d_demo
//! ```

use meridian_3d_engine::engine_info;
use meridian_3d_engine::glam::{Vec2, Vec3};
use meridian_3d_engine::meridian3d::model::{
    DrawRange, ImageData, ImageDecoder, ModelData, ModelSource, Vertex,
};
use meridian_3d_engine::meridian3d::{Config, Error, Result};
use meridian_3d_engine_renderer_vulkan::ash::{self, vk};
use meridian_3d_engine_renderer_vulkan::VulkanRenderer;
use std::path::{Path, PathBuf};
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

/// Procedurally generated cube above a floor quad, one texture each.
struct DemoScene;

impl ModelSource for DemoScene {
    fn load(&self) -> Result<ModelData> {
        let mut vertices = Vec::new();
        let mut indices = Vec::new();

        // Cube: 6 faces, 4 vertices each, with per-face texture coords
        let faces: [([Vec3; 4], Vec3); 6] = [
            // +Z (top)
            (
                [
                    Vec3::new(-0.5, -0.5, 0.5),
                    Vec3::new(0.5, -0.5, 0.5),
                    Vec3::new(0.5, 0.5, 0.5),
                    Vec3::new(-0.5, 0.5, 0.5),
                ],
                Vec3::new(1.0, 1.0, 1.0),
            ),
            // -Z (bottom)
            (
                [
                    Vec3::new(-0.5, 0.5, -0.5),
                    Vec3::new(0.5, 0.5, -0.5),
                    Vec3::new(0.5, -0.5, -0.5),
                    Vec3::new(-0.5, -0.5, -0.5),
                ],
                Vec3::new(0.7, 0.7, 0.7),
            ),
            // +X
            (
                [
                    Vec3::new(0.5, -0.5, -0.5),
                    Vec3::new(0.5, 0.5, -0.5),
                    Vec3::new(0.5, 0.5, 0.5),
                    Vec3::new(0.5, -0.5, 0.5),
                ],
                Vec3::new(1.0, 0.8, 0.8),
            ),
            // -X
            (
                [
                    Vec3::new(-0.5, 0.5, -0.5),
                    Vec3::new(-0.5, -0.5, -0.5),
                    Vec3::new(-0.5, -0.5, 0.5),
                    Vec3::new(-0.5, 0.5, 0.5),
                ],
                Vec3::new(0.8, 1.0, 0.8),
            ),
            // +Y
            (
                [
                    Vec3::new(0.5, 0.5, -0.5),
                    Vec3::new(-0.5, 0.5, -0.5),
                    Vec3::new(-0.5, 0.5, 0.5),
                    Vec3::new(0.5, 0.5, 0.5),
                ],
                Vec3::new(0.8, 0.8, 1.0),
            ),
            // -Y
            (
                [
                    Vec3::new(-0.5, -0.5, -0.5),
                    Vec3::new(0.5, -0.5, -0.5),
                    Vec3::new(0.5, -0.5, 0.5),
                    Vec3::new(-0.5, -0.5, 0.5),
                ],
                Vec3::new(1.0, 1.0, 0.8),
            ),
        ];
        let uvs = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        for (corners, color) in faces {
            let base = vertices.len() as u32;
            for (corner, uv) in corners.into_iter().zip(uvs) {
                vertices.push(Vertex {
                    position: corner,
                    color,
                    tex_coord: uv,
                });
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }
        let cube_index_count = indices.len() as u32;

        // Floor quad under the cube, tiled 4x
        let floor_base = vertices.len() as u32;
        let floor_corners = [
            Vec3::new(-2.0, -2.0, -0.7),
            Vec3::new(2.0, -2.0, -0.7),
            Vec3::new(2.0, 2.0, -0.7),
            Vec3::new(-2.0, 2.0, -0.7),
        ];
        let floor_uvs = [
            Vec2::new(0.0, 0.0),
            Vec2::new(4.0, 0.0),
            Vec2::new(4.0, 4.0),
            Vec2::new(0.0, 4.0),
        ];
        for (corner, uv) in floor_corners.into_iter().zip(floor_uvs) {
            vertices.push(Vertex {
                position: corner,
                color: Vec3::new(0.9, 0.9, 0.9),
                tex_coord: uv,
            });
        }
        indices.extend_from_slice(&[
            floor_base,
            floor_base + 1,
            floor_base + 2,
            floor_base + 2,
            floor_base + 3,
            floor_base,
        ]);
        let floor_index_count = indices.len() as u32 - cube_index_count;

        Ok(ModelData {
            vertices,
            indices,
            texture_paths: vec![
                PathBuf::from("checker_16.procedural"),
                PathBuf::from("checker_64.procedural"),
            ],
            draws: vec![
                DrawRange {
                    texture: 0,
                    first_index: 0,
                    index_count: cube_index_count,
                },
                DrawRange {
                    texture: 1,
                    first_index: cube_index_count,
                    index_count: floor_index_count,
                },
            ],
        })
    }
}

/// Decodes `checker_<cell>.procedural` pseudo-paths into 512x512
/// checkerboards with the named cell size.
struct CheckerDecoder;

impl ImageDecoder for CheckerDecoder {
    fn decode(&self, path: &Path) -> Result<ImageData> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::Resource(format!("Bad texture path: {}", path.display())))?;
        let cell: u32 = stem
            .strip_prefix("checker_")
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::Resource(format!("Unknown demo texture: {}", stem)))?;

        let size = 512u32;
        let mut pixels = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let on = ((x / cell) + (y / cell)) % 2 == 0;
                let v = if on { 0xE0 } else { 0x30 };
                pixels.extend_from_slice(&[v, v, v, 0xFF]);
            }
        }

        Ok(ImageData {
            width: size,
            height: size,
            pixels,
        })
    }
}

fn load_spirv(path: &Path) -> Result<Vec<u32>> {
    let mut file = std::fs::File::open(path).map_err(|e| {
        Error::InitializationFailed(format!(
            "Cannot open shader {} ({}); compile the demo shaders with glslc first",
            path.display(),
            e
        ))
    })?;
    ash::util::read_spv(&mut file)
        .map_err(|e| Error::InitializationFailed(format!("Invalid SPIR-V {}: {}", path.display(), e)))
}

struct DemoApp {
    window: Option<Window>,
    renderer: Option<VulkanRenderer>,
    start: Instant,
}

impl DemoApp {
    fn new() -> Self {
        Self {
            window: None,
            renderer: None,
            start: Instant::now(),
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = event_loop
            .create_window(
                Window::default_attributes()
                    .with_title("Meridian3D Demo")
                    .with_inner_size(winit::dpi::LogicalSize::new(1280, 720)),
            )
            .map_err(|e| {
                Error::InitializationFailed(format!("Failed to create window: {}", e))
            })?;

        let shader_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("shaders");
        let vert_spv = load_spirv(&shader_dir.join("shader.vert.spv"))?;
        let frag_spv = load_spirv(&shader_dir.join("shader.frag.spv"))?;

        let size = window.inner_size();
        let config = Config {
            app_name: "Meridian3D Demo".to_string(),
            ..Config::default()
        };
        let renderer = VulkanRenderer::new(
            &window,
            config,
            &DemoScene,
            &CheckerDecoder,
            &vert_spv,
            &frag_spv,
            vk::Extent2D {
                width: size.width,
                height: size.height,
            },
        )?;

        engine_info!("meridian3d::demo", "Renderer initialized");
        self.window = Some(window);
        self.renderer = Some(renderer);
        Ok(())
    }
}

impl ApplicationHandler for DemoApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_none() {
            if let Err(e) = self.init(event_loop) {
                eprintln!("Failed to initialize: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(renderer) = &self.renderer {
                    renderer.wait_idle();
                }
                event_loop.exit();
            }
            WindowEvent::Resized(_) => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.mark_resized();
                }
            }
            WindowEvent::RedrawRequested => {
                let (Some(window), Some(renderer)) = (&self.window, &mut self.renderer) else {
                    return;
                };
                let size = window.inner_size();
                let extent = vk::Extent2D {
                    width: size.width,
                    height: size.height,
                };
                let elapsed = self.start.elapsed().as_secs_f32();
                if let Err(e) = renderer.render(extent, elapsed) {
                    eprintln!("Render error: {}", e);
                    event_loop.exit();
                    return;
                }
                window.request_redraw();
            }
            _ => {}
        }
    }
}

fn main() {
    let event_loop = match EventLoop::new() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            eprintln!("Failed to create event loop: {}", e);
            std::process::exit(1);
        }
    };
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = DemoApp::new();
    if let Err(e) = event_loop.run_app(&mut app) {
        eprintln!("Event loop error: {}", e);
        std::process::exit(1);
    }
}
