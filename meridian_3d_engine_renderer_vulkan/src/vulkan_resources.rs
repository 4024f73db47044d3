//! ResourceFactory - allocation and binding of device-memory-backed objects
//!
//! Every buffer and image in the backend goes through the same two-step
//! protocol: create the object, query its memory requirements, select a
//! memory type whose property flags are a superset of the request and whose
//! type bit is set in the requirements mask, then allocate and bind. The
//! returned wrappers release the object and its memory when dropped.

use meridian_3d_engine::meridian3d::{Error, Result};
use meridian_3d_engine::meridian3d::model::ModelData;
use meridian_3d_engine::{engine_err, engine_error};
use ash::vk;
use std::ffi::c_void;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_transfer::TransferExecutor;

/// Select a memory type index for the given requirements.
///
/// The chosen index always has its bit set in `type_bits` and its property
/// flags contain all of `required`. Returns `None` when no type matches, so
/// the caller fails deterministically instead of binding the wrong heap.
pub(crate) fn select_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..memory_properties.memory_type_count).find(|&index| {
        let type_matches = type_bits & (1 << index) != 0;
        let flags = memory_properties.memory_types[index as usize].property_flags;
        type_matches && flags.contains(required)
    })
}

/// A device-memory-backed buffer.
///
/// Ownership is exclusive to whoever holds the value; dropping it unmaps,
/// destroys the buffer and frees its memory.
pub struct Buffer {
    ctx: Arc<GpuContext>,
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
    mapped: Option<*mut c_void>,
}

impl Buffer {
    /// Persistently map the buffer's memory for the lifetime of the buffer.
    ///
    /// Used for the per-frame uniform buffers, which are written every frame
    /// through this mapping and never unmapped until shutdown.
    pub fn map(&mut self) -> Result<()> {
        if self.mapped.is_some() {
            return Ok(());
        }
        unsafe {
            let ptr = self
                .ctx
                .device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(|e| {
                    engine_error!("meridian3d::vulkan", "Failed to map buffer memory: {:?}", e);
                    Error::Resource(format!("Failed to map buffer memory: {:?}", e))
                })?;
            self.mapped = Some(ptr);
        }
        Ok(())
    }

    /// Write `data` at `offset` through the persistent mapping.
    ///
    /// Callers guarantee the GPU is not reading this region (the frame
    /// scheduler enforces that with its per-slot fence).
    pub fn write(&self, offset: usize, data: &[u8]) -> Result<()> {
        let ptr = self.mapped.ok_or_else(|| {
            engine_err!("meridian3d::vulkan", "Buffer written before being mapped")
        })?;
        if offset + data.len() > self.size as usize {
            return Err(engine_err!(
                "meridian3d::vulkan",
                "Buffer write of {} bytes at offset {} exceeds size {}",
                data.len(),
                offset,
                self.size
            ));
        }
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                (ptr as *mut u8).add(offset),
                data.len(),
            );
        }
        Ok(())
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            if self.mapped.take().is_some() {
                self.ctx.device.unmap_memory(self.memory);
            }
            self.ctx.device.destroy_buffer(self.buffer, None);
            self.ctx.device.free_memory(self.memory, None);
        }
    }
}

/// A device-memory-backed image. Views are owned by the component that
/// created them; the image and its memory are released on drop.
pub struct Image {
    ctx: Arc<GpuContext>,
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub format: vk::Format,
    pub mip_levels: u32,
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_image(self.image, None);
            self.ctx.device.free_memory(self.memory, None);
        }
    }
}

/// Factory for device-memory-backed objects
pub struct ResourceFactory {
    ctx: Arc<GpuContext>,
}

impl ResourceFactory {
    pub fn new(ctx: Arc<GpuContext>) -> Self {
        Self { ctx }
    }

    /// Select a memory type index from the cached device memory properties.
    pub fn find_memory_type(
        &self,
        type_bits: u32,
        required: vk::MemoryPropertyFlags,
    ) -> Result<u32> {
        select_memory_type(&self.ctx.memory_properties, type_bits, required).ok_or_else(|| {
            engine_error!(
                "meridian3d::vulkan",
                "No memory type matches bits {:#x} with properties {:?}",
                type_bits,
                required
            );
            Error::Resource(format!(
                "No memory type matches bits {:#x} with properties {:?}",
                type_bits, required
            ))
        })
    }

    /// Create a buffer and bind freshly allocated memory to it.
    pub fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<Buffer> {
        unsafe {
            let create_info = vk::BufferCreateInfo::default()
                .size(size)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let buffer = self
                .ctx
                .device
                .create_buffer(&create_info, None)
                .map_err(|e| engine_err!("meridian3d::vulkan", "Failed to create buffer: {:?}", e))?;

            let requirements = self.ctx.device.get_buffer_memory_requirements(buffer);
            let memory_type = match self.find_memory_type(requirements.memory_type_bits, properties)
            {
                Ok(index) => index,
                Err(e) => {
                    self.ctx.device.destroy_buffer(buffer, None);
                    return Err(e);
                }
            };

            let alloc_info = vk::MemoryAllocateInfo::default()
                .allocation_size(requirements.size)
                .memory_type_index(memory_type);

            let memory = match self.ctx.device.allocate_memory(&alloc_info, None) {
                Ok(memory) => memory,
                Err(e) => {
                    self.ctx.device.destroy_buffer(buffer, None);
                    engine_error!(
                        "meridian3d::vulkan",
                        "Failed to allocate {} bytes of buffer memory: {:?}",
                        requirements.size,
                        e
                    );
                    return Err(Error::Resource(format!(
                        "Failed to allocate buffer memory: {:?}",
                        e
                    )));
                }
            };

            self.ctx
                .device
                .bind_buffer_memory(buffer, memory, 0)
                .map_err(|e| {
                    engine_err!("meridian3d::vulkan", "Failed to bind buffer memory: {:?}", e)
                })?;

            Ok(Buffer {
                ctx: Arc::clone(&self.ctx),
                buffer,
                memory,
                size,
                mapped: None,
            })
        }
    }

    /// Create a 2D image and bind freshly allocated memory to it.
    #[allow(clippy::too_many_arguments)]
    pub fn create_image(
        &self,
        width: u32,
        height: u32,
        mip_levels: u32,
        samples: vk::SampleCountFlags,
        format: vk::Format,
        tiling: vk::ImageTiling,
        usage: vk::ImageUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<Image> {
        unsafe {
            let create_info = vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .extent(vk::Extent3D {
                    width,
                    height,
                    depth: 1,
                })
                .mip_levels(mip_levels)
                .array_layers(1)
                .format(format)
                .tiling(tiling)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .usage(usage)
                .samples(samples)
                .sharing_mode(vk::SharingMode::EXCLUSIVE);

            let image = self
                .ctx
                .device
                .create_image(&create_info, None)
                .map_err(|e| engine_err!("meridian3d::vulkan", "Failed to create image: {:?}", e))?;

            let requirements = self.ctx.device.get_image_memory_requirements(image);
            let memory_type = match self.find_memory_type(requirements.memory_type_bits, properties)
            {
                Ok(index) => index,
                Err(e) => {
                    self.ctx.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            let alloc_info = vk::MemoryAllocateInfo::default()
                .allocation_size(requirements.size)
                .memory_type_index(memory_type);

            let memory = match self.ctx.device.allocate_memory(&alloc_info, None) {
                Ok(memory) => memory,
                Err(e) => {
                    self.ctx.device.destroy_image(image, None);
                    engine_error!(
                        "meridian3d::vulkan",
                        "Failed to allocate {} bytes of image memory ({}x{}): {:?}",
                        requirements.size,
                        width,
                        height,
                        e
                    );
                    return Err(Error::Resource(format!(
                        "Failed to allocate image memory: {:?}",
                        e
                    )));
                }
            };

            self.ctx
                .device
                .bind_image_memory(image, memory, 0)
                .map_err(|e| {
                    engine_err!("meridian3d::vulkan", "Failed to bind image memory: {:?}", e)
                })?;

            Ok(Image {
                ctx: Arc::clone(&self.ctx),
                image,
                memory,
                format,
                mip_levels,
            })
        }
    }

    /// Create a 2D image view over `mip_levels` levels of `image`.
    pub fn create_image_view(
        &self,
        image: vk::Image,
        format: vk::Format,
        aspect_mask: vk::ImageAspectFlags,
        mip_levels: u32,
    ) -> Result<vk::ImageView> {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask,
                base_mip_level: 0,
                level_count: mip_levels,
                base_array_layer: 0,
                layer_count: 1,
            });

        unsafe {
            self.ctx
                .device
                .create_image_view(&create_info, None)
                .map_err(|e| {
                    engine_err!("meridian3d::vulkan", "Failed to create image view: {:?}", e)
                })
        }
    }

    /// Return the first candidate format whose properties satisfy the
    /// requested tiling and feature flags.
    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> Result<vk::Format> {
        for &format in candidates {
            let props = unsafe {
                self.ctx
                    .instance
                    .get_physical_device_format_properties(self.ctx.physical_device, format)
            };
            let supported = match tiling {
                vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
                _ => props.optimal_tiling_features.contains(features),
            };
            if supported {
                return Ok(format);
            }
        }

        engine_error!(
            "meridian3d::vulkan",
            "No candidate in {:?} supports tiling {:?} with features {:?}",
            candidates,
            tiling,
            features
        );
        Err(Error::UnsupportedFormat(format!(
            "No candidate in {:?} supports tiling {:?} with features {:?}",
            candidates, tiling, features
        )))
    }
}

/// Device-local vertex and index buffers for the loaded model
pub struct GeometryBuffers {
    pub vertex_buffer: Buffer,
    pub index_buffer: Buffer,
    pub index_count: u32,
}

impl GeometryBuffers {
    /// Stage and upload the model's vertex and index data to device-local
    /// memory. The staging buffers are released as soon as each copy
    /// completes.
    pub fn upload(
        factory: &ResourceFactory,
        transfer: &TransferExecutor,
        model: &ModelData,
    ) -> Result<Self> {
        let vertex_buffer = transfer.upload_buffer(
            factory,
            bytemuck::cast_slice(&model.vertices),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        let index_buffer = transfer.upload_buffer(
            factory,
            bytemuck::cast_slice(&model.indices),
            vk::BufferUsageFlags::INDEX_BUFFER,
        )?;

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: model.indices.len() as u32,
        })
    }
}
