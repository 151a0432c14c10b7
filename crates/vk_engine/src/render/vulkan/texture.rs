//! Sampled RGBA8 textures: the mesh texture and the GUI font atlas

use ash::{vk, Device};

use super::image::DeviceImage;
use super::transfer::{TransferDevice, VulkanTransfer, STAGING_PROPERTIES};
use super::transitions::record_layout_transition;
use super::{api, VulkanResult};
use crate::assets::image::ImageData;

/// Format of uploaded textures
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// Sampler wrapper with RAII cleanup
pub struct Sampler {
    device: Device,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Linear filtering with `address_mode` on every axis; anisotropic when
    /// `max_anisotropy` is set
    pub fn linear(
        device: &Device,
        address_mode: vk::SamplerAddressMode,
        max_anisotropy: Option<f32>,
    ) -> VulkanResult<Self> {
        let sampler_create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(address_mode)
            .address_mode_v(address_mode)
            .address_mode_w(address_mode)
            .anisotropy_enable(max_anisotropy.is_some())
            .max_anisotropy(max_anisotropy.unwrap_or(1.0))
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR);

        let sampler = unsafe { device.create_sampler(&sampler_create_info, None) }.map_err(api("vkCreateSampler"))?;

        Ok(Self {
            device: device.clone(),
            sampler,
        })
    }

    /// Sampler handle
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}

/// Device-local texture ready for sampling in the fragment stage
pub struct Texture {
    sampler: Sampler,
    image: DeviceImage,
}

impl Texture {
    /// Stage `data` into a new image and leave it in SHADER_READ_ONLY layout
    ///
    /// Sampled with repeat addressing and anisotropy when the device has it.
    pub fn upload(transfer: &mut VulkanTransfer<'_>, data: &ImageData) -> VulkanResult<Self> {
        let physical = transfer.context().physical_device();
        let max_anisotropy = (physical.features.sampler_anisotropy == vk::TRUE)
            .then_some(physical.properties.limits.max_sampler_anisotropy);
        Self::upload_with(transfer, data, vk::SamplerAddressMode::REPEAT, max_anisotropy)
    }

    /// Like [`Texture::upload`] but clamped to the edge, for atlases
    pub fn upload_clamped(transfer: &mut VulkanTransfer<'_>, data: &ImageData) -> VulkanResult<Self> {
        Self::upload_with(transfer, data, vk::SamplerAddressMode::CLAMP_TO_EDGE, None)
    }

    fn upload_with(
        transfer: &mut VulkanTransfer<'_>,
        data: &ImageData,
        address_mode: vk::SamplerAddressMode,
        max_anisotropy: Option<f32>,
    ) -> VulkanResult<Self> {
        let context = transfer.context();
        let extent = vk::Extent2D {
            width: data.width(),
            height: data.height(),
        };

        let staging = transfer.create_buffer(
            data.device_size(),
            vk::BufferUsageFlags::TRANSFER_SRC,
            STAGING_PROPERTIES,
        )?;
        transfer.write_buffer(&staging, data.pixels())?;

        let image = DeviceImage::new(
            context,
            extent,
            TEXTURE_FORMAT,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            vk::ImageAspectFlags::COLOR,
        )?;

        transfer
            .command_pool()
            .submit_one_time(context.graphics_queue(), |recorder| {
                record_layout_transition(
                    recorder,
                    image.handle(),
                    TEXTURE_FORMAT,
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                )?;
                recorder.copy_buffer_to_image(staging.handle(), image.handle(), extent);
                record_layout_transition(
                    recorder,
                    image.handle(),
                    TEXTURE_FORMAT,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                )
            })?;
        drop(staging);

        let sampler = Sampler::linear(context.device(), address_mode, max_anisotropy)?;

        log::debug!(
            "Uploaded texture {}x{} ({} bytes)",
            extent.width,
            extent.height,
            image.memory_size()
        );
        Ok(Self { sampler, image })
    }

    /// Image view bound at the sampler binding
    pub fn view(&self) -> vk::ImageView {
        self.image.view()
    }

    /// Sampler handle
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler.handle()
    }
}
