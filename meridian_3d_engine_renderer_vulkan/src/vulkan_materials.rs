//! MaterialStore - textures, samplers and their descriptor sets
//!
//! Each material owns a mipmapped texture image, a view, a sampler and one
//! descriptor set per frame in flight. The descriptor pool is sized once at
//! construction; loading past capacity fails with a descriptor pool error
//! rather than growing the pool.

use meridian_3d_engine::meridian3d::model::ImageDecoder;
use meridian_3d_engine::meridian3d::{Error, Result};
use meridian_3d_engine::{engine_err, engine_info};
use ash::vk;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_resources::{Buffer, Image, ResourceFactory};
use crate::vulkan_transfer::{mip_level_count, TransferExecutor};

/// Descriptor pool sizes for `capacity` materials across `frames` in-flight
/// slots. Every set consumes one uniform buffer descriptor and one combined
/// image sampler descriptor, so both pools get `capacity * frames`.
pub(crate) fn descriptor_pool_sizes(capacity: u32, frames: u32) -> [vk::DescriptorPoolSize; 2] {
    [
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: capacity * frames,
        },
        vk::DescriptorPoolSize {
            ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            descriptor_count: capacity * frames,
        },
    ]
}

/// A loaded texture with its per-frame descriptor sets
pub struct Material {
    /// Held for its Drop; the view and sets below reference it
    _image: Image,
    view: vk::ImageView,
    sampler: vk::Sampler,
    mip_levels: u32,
    descriptor_sets: Vec<vk::DescriptorSet>,
}

impl Material {
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }
}

/// Texture and descriptor set store, deduplicated by source path
pub struct MaterialStore {
    ctx: Arc<GpuContext>,
    descriptor_pool: vk::DescriptorPool,
    frames_in_flight: u32,
    materials: Vec<Material>,
    by_path: HashMap<PathBuf, usize>,
}

impl MaterialStore {
    /// Create the store with a descriptor pool sized for `capacity`
    /// materials times `frames_in_flight` sets each.
    pub fn new(ctx: Arc<GpuContext>, capacity: u32, frames_in_flight: u32) -> Result<Self> {
        let pool_sizes = descriptor_pool_sizes(capacity, frames_in_flight);
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .pool_sizes(&pool_sizes)
            .max_sets(capacity * frames_in_flight);

        let descriptor_pool = unsafe {
            ctx.device
                .create_descriptor_pool(&create_info, None)
                .map_err(|e| {
                    engine_err!(
                        "meridian3d::vulkan",
                        "Failed to create descriptor pool: {:?}",
                        e
                    )
                })?
        };

        Ok(Self {
            ctx,
            descriptor_pool,
            frames_in_flight,
            materials: Vec::new(),
            by_path: HashMap::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn material(&self, material_index: usize) -> Option<&Material> {
        self.materials.get(material_index)
    }

    /// Descriptor set for `material_index` in frame slot `frame_index`.
    pub fn descriptor_set(
        &self,
        material_index: usize,
        frame_index: usize,
    ) -> Result<vk::DescriptorSet> {
        self.materials
            .get(material_index)
            .and_then(|m| m.descriptor_sets.get(frame_index))
            .copied()
            .ok_or_else(|| {
                Error::Resource(format!(
                    "No descriptor set for material {} frame {}",
                    material_index, frame_index
                ))
            })
    }

    /// Load the texture at `path`, or return the index of the already
    /// loaded material when the same path was seen before.
    ///
    /// `uniform_buffers` holds one per-frame uniform buffer; each new
    /// material's sets bind its frame's buffer at binding 0 and the
    /// texture sampler at binding 1.
    pub fn get_or_load(
        &mut self,
        path: &Path,
        decoder: &dyn ImageDecoder,
        factory: &ResourceFactory,
        transfer: &TransferExecutor,
        layout: vk::DescriptorSetLayout,
        uniform_buffers: &[Buffer],
    ) -> Result<usize> {
        if let Some(&index) = self.by_path.get(path) {
            return Ok(index);
        }

        let image_data = decoder.decode(path)?;
        let mip_levels = mip_level_count(image_data.width, image_data.height);

        let image = self.upload_texture(factory, transfer, &image_data, mip_levels)?;
        let view = factory.create_image_view(
            image.image,
            vk::Format::R8G8B8A8_SRGB,
            vk::ImageAspectFlags::COLOR,
            mip_levels,
        )?;
        let sampler = self.create_sampler(mip_levels)?;
        let descriptor_sets =
            self.allocate_descriptor_sets(layout, view, sampler, uniform_buffers)?;

        engine_info!(
            "meridian3d::vulkan",
            "Material loaded: {} ({}x{}, {} mip levels)",
            path.display(),
            image_data.width,
            image_data.height,
            mip_levels
        );

        let index = self.materials.len();
        self.materials.push(Material {
            _image: image,
            view,
            sampler,
            mip_levels,
            descriptor_sets,
        });
        self.by_path.insert(path.to_path_buf(), index);
        Ok(index)
    }

    /// Stage pixels, copy into a device-local image, then generate the full
    /// mip chain on the GPU. The blit pass leaves every level in
    /// SHADER_READ_ONLY_OPTIMAL.
    fn upload_texture(
        &self,
        factory: &ResourceFactory,
        transfer: &TransferExecutor,
        image_data: &meridian_3d_engine::meridian3d::model::ImageData,
        mip_levels: u32,
    ) -> Result<Image> {
        let size = image_data.pixels.len() as vk::DeviceSize;
        let mut staging = factory.create_buffer(
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        staging.map()?;
        staging.write(0, &image_data.pixels)?;

        let image = factory.create_image(
            image_data.width,
            image_data.height,
            mip_levels,
            vk::SampleCountFlags::TYPE_1,
            vk::Format::R8G8B8A8_SRGB,
            vk::ImageTiling::OPTIMAL,
            vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST
                | vk::ImageUsageFlags::SAMPLED,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        transfer.transition_image_layout(
            image.image,
            vk::Format::R8G8B8A8_SRGB,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            mip_levels,
        )?;
        transfer.copy_buffer_to_image(
            &staging,
            image.image,
            image_data.width,
            image_data.height,
        )?;
        transfer.generate_mipmaps(
            image.image,
            vk::Format::R8G8B8A8_SRGB,
            image_data.width,
            image_data.height,
            mip_levels,
        )?;

        Ok(image)
    }

    /// Anisotropic trilinear sampler spanning the full mip chain.
    fn create_sampler(&self, mip_levels: u32) -> Result<vk::Sampler> {
        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(true)
            .max_anisotropy(16.0)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(mip_levels as f32);

        unsafe {
            self.ctx
                .device
                .create_sampler(&create_info, None)
                .map_err(|e| {
                    engine_err!("meridian3d::vulkan", "Failed to create sampler: {:?}", e)
                })
        }
    }

    /// Allocate and write one descriptor set per frame slot.
    fn allocate_descriptor_sets(
        &self,
        layout: vk::DescriptorSetLayout,
        view: vk::ImageView,
        sampler: vk::Sampler,
        uniform_buffers: &[Buffer],
    ) -> Result<Vec<vk::DescriptorSet>> {
        let layouts = vec![layout; self.frames_in_flight as usize];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.descriptor_pool)
            .set_layouts(&layouts);

        let sets = unsafe {
            match self.ctx.device.allocate_descriptor_sets(&alloc_info) {
                Ok(sets) => sets,
                Err(
                    e @ (vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL),
                ) => {
                    return Err(Error::DescriptorPoolExhausted(format!(
                        "Descriptor pool cannot hold another material: {:?}",
                        e
                    )));
                }
                Err(e) => {
                    return Err(engine_err!(
                        "meridian3d::vulkan",
                        "Failed to allocate descriptor sets: {:?}",
                        e
                    ));
                }
            }
        };

        for (frame, &set) in sets.iter().enumerate() {
            let buffer_info = vk::DescriptorBufferInfo::default()
                .buffer(uniform_buffers[frame].buffer)
                .offset(0)
                .range(vk::WHOLE_SIZE);
            let image_info = vk::DescriptorImageInfo::default()
                .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .image_view(view)
                .sampler(sampler);

            let writes = [
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(std::slice::from_ref(&buffer_info)),
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(1)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(std::slice::from_ref(&image_info)),
            ];

            unsafe {
                self.ctx.device.update_descriptor_sets(&writes, &[]);
            }
        }

        Ok(sets)
    }
}

impl Drop for MaterialStore {
    fn drop(&mut self) {
        unsafe {
            for material in &self.materials {
                // Destroy sampler
                self.ctx.device.destroy_sampler(material.sampler, None);
                // Destroy image view (the image frees itself)
                self.ctx.device.destroy_image_view(material.view, None);
            }
            // Destroying the pool frees all sets allocated from it
            self.ctx
                .device
                .destroy_descriptor_pool(self.descriptor_pool, None);
        }
    }
}
