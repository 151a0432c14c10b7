//! Device images, image views and the depth attachment

use ash::{vk, Device};

use super::commands::CommandPool;
use super::memory::DeviceMemory;
use super::transitions::{aspect_mask, record_layout_transition};
use super::{api, VulkanContext, VulkanError, VulkanResult};

/// Depth formats in order of preference
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// First candidate whose optimal-tiling features include depth attachment use
pub fn choose_depth_format<F>(candidates: &[vk::Format], mut properties_of: F) -> VulkanResult<vk::Format>
where
    F: FnMut(vk::Format) -> vk::FormatProperties,
{
    candidates
        .iter()
        .copied()
        .find(|&format| {
            properties_of(format)
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })
        .ok_or_else(|| VulkanError::InitializationFailed("no supported depth format".to_string()))
}

/// Image view wrapper with RAII cleanup
pub struct ImageView {
    device: Device,
    view: vk::ImageView,
}

impl ImageView {
    /// 2D view of mip 0, layer 0
    pub fn new(device: &Device, image: vk::Image, format: vk::Format, aspect: vk::ImageAspectFlags) -> VulkanResult<Self> {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = unsafe { device.create_image_view(&create_info, None) }.map_err(api("vkCreateImageView"))?;

        Ok(Self {
            device: device.clone(),
            view,
        })
    }

    /// View handle
    pub fn handle(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for ImageView {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
        }
    }
}

struct RawImage {
    device: Device,
    image: vk::Image,
}

impl Drop for RawImage {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image(self.image, None);
        }
    }
}

/// Device-local 2D image with its own memory and a view
///
/// Fields drop view first, then image, then memory.
pub struct DeviceImage {
    view: ImageView,
    image: RawImage,
    memory: DeviceMemory,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl DeviceImage {
    /// Create an optimally tiled single-mip image in UNDEFINED layout
    pub fn new(
        context: &VulkanContext,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        aspect: vk::ImageAspectFlags,
    ) -> VulkanResult<Self> {
        let device = context.device();
        let image_create_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);

        let image = RawImage {
            device: device.clone(),
            image: unsafe { device.create_image(&image_create_info, None) }.map_err(api("vkCreateImage"))?,
        };

        let requirements = unsafe { device.get_image_memory_requirements(image.image) };
        let memory = DeviceMemory::allocate(
            device,
            &context.physical_device().memory_properties,
            requirements,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        unsafe { device.bind_image_memory(image.image, memory.handle(), 0) }.map_err(api("vkBindImageMemory"))?;

        let view = ImageView::new(device, image.image, format, aspect)?;

        Ok(Self {
            view,
            image,
            memory,
            format,
            extent,
        })
    }

    /// Image handle
    pub fn handle(&self) -> vk::Image {
        self.image.image
    }

    /// View handle
    pub fn view(&self) -> vk::ImageView {
        self.view.handle()
    }

    /// Pixel format
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Size in pixels
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Size of the backing allocation
    pub fn memory_size(&self) -> vk::DeviceSize {
        self.memory.size()
    }
}

/// Depth attachment shared by all framebuffers of a swapchain
pub struct DepthImage {
    image: DeviceImage,
}

impl DepthImage {
    /// Create a depth image of `extent` and move it to the attachment layout
    pub fn new(context: &VulkanContext, command_pool: &CommandPool, extent: vk::Extent2D) -> VulkanResult<Self> {
        let physical = context.physical_device().device;
        let format = choose_depth_format(&DEPTH_FORMAT_CANDIDATES, |format| unsafe {
            context
                .instance()
                .get_physical_device_format_properties(physical, format)
        })?;

        let layout = vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL;
        let image = DeviceImage::new(
            context,
            extent,
            format,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            aspect_mask(format, layout),
        )?;

        command_pool.submit_one_time(context.graphics_queue(), |recorder| {
            record_layout_transition(recorder, image.handle(), format, vk::ImageLayout::UNDEFINED, layout)
        })?;

        log::debug!("Created depth image {:?} {}x{}", format, extent.width, extent.height);
        Ok(Self { image })
    }

    /// Depth format in use
    pub fn format(&self) -> vk::Format {
        self.image.format()
    }

    /// View bound into every framebuffer
    pub fn view(&self) -> vk::ImageView {
        self.image.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supports(formats: &'static [vk::Format]) -> impl FnMut(vk::Format) -> vk::FormatProperties {
        move |format| vk::FormatProperties {
            optimal_tiling_features: if formats.contains(&format) {
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
            } else {
                vk::FormatFeatureFlags::empty()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_prefers_d32() {
        let format = choose_depth_format(&DEPTH_FORMAT_CANDIDATES, supports(&[
            vk::Format::D24_UNORM_S8_UINT,
            vk::Format::D32_SFLOAT,
        ]))
        .unwrap();
        assert_eq!(format, vk::Format::D32_SFLOAT);
    }

    #[test]
    fn test_falls_through_candidates() {
        let format =
            choose_depth_format(&DEPTH_FORMAT_CANDIDATES, supports(&[vk::Format::D24_UNORM_S8_UINT])).unwrap();
        assert_eq!(format, vk::Format::D24_UNORM_S8_UINT);
    }

    #[test]
    fn test_no_depth_format() {
        assert!(choose_depth_format(&DEPTH_FORMAT_CANDIDATES, supports(&[])).is_err());
    }
}
