//! Swapchain negotiation and lifetime
//!
//! Negotiation is split into pure functions over what the surface reports,
//! so the same surface support and window size always produce the same
//! settings. [`Swapchain`] owns the chain, one color view per image and,
//! once a render pass exists, one framebuffer per image.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::vk;

use super::framebuffer::Framebuffer;
use super::image::ImageView;
use super::{api, VulkanContext, VulkanError, VulkanResult};

/// Surface formats in order of preference, all paired with SRGB_NONLINEAR
pub const PREFERRED_SURFACE_FORMATS: [vk::Format; 4] = [
    vk::Format::B8G8R8A8_UNORM,
    vk::Format::R8G8B8A8_UNORM,
    vk::Format::B8G8R8_UNORM,
    vk::Format::R8G8B8_UNORM,
];

/// What the surface supports on the selected adapter
#[derive(Debug, Clone)]
pub struct SwapchainSupport {
    /// Image count, extent and transform limits
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported format and color space pairs
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    /// Query capabilities, formats and present modes
    pub fn query(context: &VulkanContext) -> VulkanResult<Self> {
        let loader = context.surface_loader();
        let device = context.physical_device().device;
        let surface = context.surface();

        unsafe {
            Ok(Self {
                capabilities: loader
                    .get_physical_device_surface_capabilities(device, surface)
                    .map_err(api("vkGetPhysicalDeviceSurfaceCapabilitiesKHR"))?,
                formats: loader
                    .get_physical_device_surface_formats(device, surface)
                    .map_err(api("vkGetPhysicalDeviceSurfaceFormatsKHR"))?,
                present_modes: loader
                    .get_physical_device_surface_present_modes(device, surface)
                    .map_err(api("vkGetPhysicalDeviceSurfacePresentModesKHR"))?,
            })
        }
    }
}

/// Pick the surface format
///
/// A lone `UNDEFINED` entry means the surface takes any format.
pub fn choose_surface_format(available: &[vk::SurfaceFormatKHR]) -> VulkanResult<vk::SurfaceFormatKHR> {
    let first = available
        .first()
        .copied()
        .ok_or_else(|| VulkanError::InitializationFailed("surface reports no formats".to_string()))?;

    if available.len() == 1 && first.format == vk::Format::UNDEFINED {
        return Ok(vk::SurfaceFormatKHR {
            format: PREFERRED_SURFACE_FORMATS[0],
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        });
    }

    let preferred = PREFERRED_SURFACE_FORMATS.iter().find_map(|&format| {
        available
            .iter()
            .find(|sf| sf.format == format && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
            .copied()
    });

    Ok(preferred.unwrap_or(first))
}

/// MAILBOX when offered, FIFO otherwise
pub fn choose_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    available
        .iter()
        .copied()
        .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Image extent for a window of `window_size` pixels
///
/// Returns `None` while the window or the surface has zero area.
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, window_size: (u32, u32)) -> Option<vk::Extent2D> {
    let (width, height) = window_size;
    if width == 0 || height == 0 {
        return None;
    }

    let extent = if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
            height: height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
        }
    };

    (extent.width > 0 && extent.height > 0).then_some(extent)
}

/// One image more than the minimum, capped when the surface has a maximum
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

/// Everything needed to create a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainSettings {
    /// Image format and color space
    pub surface_format: vk::SurfaceFormatKHR,
    /// Presentation mode
    pub present_mode: vk::PresentModeKHR,
    /// Image size in pixels
    pub extent: vk::Extent2D,
    /// Minimum number of images requested
    pub image_count: u32,
    /// Surface transform applied on present
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainSettings {
    /// Negotiate settings; `Ok(None)` while there is nothing to present into
    pub fn negotiate(support: &SwapchainSupport, window_size: (u32, u32)) -> VulkanResult<Option<Self>> {
        let Some(extent) = choose_extent(&support.capabilities, window_size) else {
            return Ok(None);
        };

        Ok(Some(Self {
            surface_format: choose_surface_format(&support.formats)?,
            present_mode: choose_present_mode(&support.present_modes),
            extent,
            image_count: choose_image_count(&support.capabilities),
            pre_transform: support.capabilities.current_transform,
        }))
    }
}

/// Swapchain management wrapper with RAII cleanup
pub struct Swapchain {
    loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<ImageView>,
    framebuffers: Vec<Framebuffer>,
    settings: SwapchainSettings,
}

impl Swapchain {
    /// Create a chain, handing `old` to the driver for resource reuse
    ///
    /// The old chain stays valid until the caller drops it.
    pub fn new(context: &VulkanContext, settings: SwapchainSettings, old: Option<&Swapchain>) -> VulkanResult<Self> {
        let families = context.queue_families();
        let family_indices = [families.graphics, families.present];
        let old_swapchain = old.map_or_else(vk::SwapchainKHR::null, |chain| chain.swapchain);

        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(context.surface())
            .min_image_count(settings.image_count)
            .image_format(settings.surface_format.format)
            .image_color_space(settings.surface_format.color_space)
            .image_extent(settings.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(settings.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(settings.present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        create_info = if families.is_split() {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let loader = context.swapchain_loader().clone();
        let swapchain =
            unsafe { loader.create_swapchain(&create_info, None) }.map_err(api("vkCreateSwapchainKHR"))?;

        // From here on `chain` owns the handle, so an error below releases it
        let mut chain = Self {
            loader,
            swapchain,
            images: Vec::new(),
            image_views: Vec::new(),
            framebuffers: Vec::new(),
            settings,
        };

        chain.images = unsafe { chain.loader.get_swapchain_images(swapchain) }
            .map_err(api("vkGetSwapchainImagesKHR"))?;

        for &image in &chain.images {
            let view = ImageView::new(
                context.device(),
                image,
                settings.surface_format.format,
                vk::ImageAspectFlags::COLOR,
            )?;
            chain.image_views.push(view);
        }

        log::info!(
            "Swapchain created: {:?} {:?}, {:?}, {}x{}, {} images",
            settings.surface_format.format,
            settings.surface_format.color_space,
            settings.present_mode,
            settings.extent.width,
            settings.extent.height,
            chain.images.len()
        );

        Ok(chain)
    }

    /// Build one framebuffer per image: color view then the shared depth view
    pub fn create_framebuffers(
        &mut self,
        context: &VulkanContext,
        render_pass: vk::RenderPass,
        depth_view: vk::ImageView,
    ) -> VulkanResult<()> {
        self.clear_framebuffers();

        let framebuffers = self
            .image_views
            .iter()
            .map(|view| {
                Framebuffer::new(
                    context.device(),
                    render_pass,
                    &[view.handle(), depth_view],
                    self.settings.extent,
                )
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        self.framebuffers = framebuffers;
        Ok(())
    }

    /// Destroy the framebuffers, keeping the chain and views
    pub fn clear_framebuffers(&mut self) {
        self.framebuffers.clear();
    }

    /// Acquire the next image, signaling `semaphore` when it is ready
    ///
    /// `Ok(None)` means the chain is out of date or suboptimal and must be
    /// rebuilt before drawing.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> VulkanResult<Option<u32>> {
        let result =
            unsafe { self.loader.acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null()) };

        match result {
            Ok((index, false)) => Ok(Some(index)),
            Ok((_, true)) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(None),
            Err(error) => Err(VulkanError::Api {
                call: "vkAcquireNextImageKHR",
                result: error,
            }),
        }
    }

    /// Queue `image_index` for presentation once `wait` is signaled
    ///
    /// Returns `false` when the chain needs a rebuild.
    pub fn present(&self, queue: vk::Queue, image_index: u32, wait: vk::Semaphore) -> VulkanResult<bool> {
        let wait_semaphores = [wait];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.loader.queue_present(queue, &present_info) } {
            Ok(false) => Ok(true),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(false),
            Err(error) => Err(VulkanError::Api {
                call: "vkQueuePresentKHR",
                result: error,
            }),
        }
    }

    /// Framebuffer for `image_index`
    pub fn framebuffer(&self, image_index: u32) -> VulkanResult<vk::Framebuffer> {
        self.framebuffers
            .get(image_index as usize)
            .map(Framebuffer::handle)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("no framebuffer for swapchain image {}", image_index),
            })
    }

    /// Number of presentable images
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Negotiated settings
    pub fn settings(&self) -> &SwapchainSettings {
        &self.settings
    }

    /// Get swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.settings.extent
    }

    /// Color format of the images
    pub fn format(&self) -> vk::Format {
        self.settings.surface_format.format
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.framebuffers.clear();
        self.image_views.clear();
        unsafe {
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(current: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 3,
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D { width: 64, height: 64 },
            max_image_extent: vk::Extent2D { width: 4096, height: 2048 },
            ..Default::default()
        }
    }

    fn surface_format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    fn support(present_modes: Vec<vk::PresentModeKHR>) -> SwapchainSupport {
        SwapchainSupport {
            capabilities: capabilities((u32::MAX, u32::MAX)),
            formats: vec![surface_format(vk::Format::R8G8B8A8_UNORM)],
            present_modes,
        }
    }

    #[test]
    fn test_fifo_only_surface_gets_fifo() {
        assert_eq!(choose_present_mode(&[vk::PresentModeKHR::FIFO]), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_mailbox_preferred() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn test_extent_clamped_into_surface_range() {
        let caps = capabilities((u32::MAX, u32::MAX));

        assert_eq!(
            choose_extent(&caps, (10_000, 10)),
            Some(vk::Extent2D { width: 4096, height: 64 })
        );
        assert_eq!(
            choose_extent(&caps, (800, 600)),
            Some(vk::Extent2D { width: 800, height: 600 })
        );
    }

    #[test]
    fn test_fixed_current_extent_wins() {
        let caps = capabilities((1024, 768));
        assert_eq!(
            choose_extent(&caps, (800, 600)),
            Some(vk::Extent2D { width: 1024, height: 768 })
        );
    }

    #[test]
    fn test_zero_window_size_has_no_extent() {
        let caps = capabilities((u32::MAX, u32::MAX));
        assert_eq!(choose_extent(&caps, (0, 0)), None);
        assert_eq!(choose_extent(&caps, (800, 0)), None);
        assert_eq!(choose_extent(&capabilities((0, 0)), (800, 600)), None);
    }

    #[test]
    fn test_image_count_capped() {
        assert_eq!(choose_image_count(&capabilities((1, 1))), 3);

        let mut caps = capabilities((1, 1));
        caps.min_image_count = 3;
        assert_eq!(choose_image_count(&caps), 3);

        caps.max_image_count = 0;
        assert_eq!(choose_image_count(&caps), 4);
    }

    #[test]
    fn test_format_preference_order() {
        let available = [
            surface_format(vk::Format::R8G8B8_UNORM),
            surface_format(vk::Format::R8G8B8A8_UNORM),
            surface_format(vk::Format::B8G8R8A8_UNORM),
        ];
        assert_eq!(choose_surface_format(&available).unwrap().format, vk::Format::B8G8R8A8_UNORM);

        let fallback = [surface_format(vk::Format::A2B10G10R10_UNORM_PACK32)];
        assert_eq!(choose_surface_format(&fallback).unwrap(), fallback[0]);
    }

    #[test]
    fn test_wrong_color_space_not_preferred() {
        let available = [
            surface_format(vk::Format::R16G16B16A16_SFLOAT),
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
            },
        ];
        assert_eq!(choose_surface_format(&available).unwrap(), available[0]);
    }

    #[test]
    fn test_undefined_format_accepts_first_preference() {
        let chosen = choose_surface_format(&[surface_format(vk::Format::UNDEFINED)]).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn test_no_formats_is_an_error() {
        assert!(choose_surface_format(&[]).is_err());
    }

    #[test]
    fn test_negotiation_is_repeatable() {
        let support = support(vec![vk::PresentModeKHR::FIFO]);

        let first = SwapchainSettings::negotiate(&support, (800, 600)).unwrap();
        let second = SwapchainSettings::negotiate(&support, (800, 600)).unwrap();

        assert_eq!(first, second);
        let settings = first.unwrap();
        assert_eq!(settings.extent, vk::Extent2D { width: 800, height: 600 });
        assert_eq!(settings.present_mode, vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_negotiation_suspended_when_minimized() {
        let support = support(vec![vk::PresentModeKHR::FIFO]);
        assert_eq!(SwapchainSettings::negotiate(&support, (0, 0)).unwrap(), None);
    }
}
