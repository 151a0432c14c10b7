//! Vulkan context management
//!
//! Owns the instance, surface, chosen adapter, logical device and queues,
//! plus the descriptor pool and mesh descriptor set layout every other
//! component borrows. Construction order is instance, surface, adapter,
//! device, descriptors; `Drop` tears them down in reverse.

use std::collections::HashSet;
use std::ffi::{CStr, CString};

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};
use thiserror::Error;

use super::descriptor::{mesh_layout_builder, DescriptorPool, DescriptorSetLayout};

const VALIDATION_LAYER: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_KHRONOS_validation\0") };

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// No physical device could be enumerated
    #[error("No Vulkan adapter found")]
    NoAdapter,

    /// The adapter lacks a required queue family
    #[error("No {0} queue family found")]
    QueueFamilyNotFound(&'static str),

    /// No memory type matches the filter and property flags
    #[error("No suitable memory type (filter {type_filter:#b}, required {required:?})")]
    NoSuitableMemoryType {
        /// Bitmask of acceptable memory type indices
        type_filter: u32,
        /// Property flags that had to be present
        required: vk::MemoryPropertyFlags,
    },

    /// Layout pair missing from the transition table
    #[error("Unsupported layout transition {old:?} -> {new:?}")]
    UnsupportedLayoutTransition {
        /// Current layout
        old: vk::ImageLayout,
        /// Requested layout
        new: vk::ImageLayout,
    },

    /// A Vulkan call returned an error code
    #[error("{call} failed: {result:?}")]
    Api {
        /// Name of the failing entry point
        call: &'static str,
        /// Result code reported by the driver
        result: vk::Result,
    },

    /// Shader binary could not be read or compiled into a module
    #[error("Shader error: {0}")]
    Shader(String),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Map a raw `vk::Result` into [`VulkanError::Api`] tagged with the call name
pub fn api(call: &'static str) -> impl Fn(vk::Result) -> VulkanError {
    move |result| VulkanError::Api { call, result }
}

/// Source of a presentation surface, normally the application window
pub trait SurfaceProvider {
    /// Instance extensions the windowing system needs
    fn required_instance_extensions(&self) -> VulkanResult<Vec<String>>;

    /// Create a surface for `instance`; the caller owns the result
    fn create_surface(&mut self, instance: &Instance) -> VulkanResult<vk::SurfaceKHR>;

    /// Current framebuffer size in pixels; `(0, 0)` while minimized
    fn framebuffer_size(&self) -> (u32, u32);
}

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    entry: Entry,
    instance: Instance,
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create the instance, with the validation layer and a log-backed
    /// debug messenger when `enable_validation` is set and the layer exists
    pub fn new(required_extensions: &[String], app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {}", e)))?;

        let app_name_cstr = CString::new(app_name)
            .map_err(|_| VulkanError::InitializationFailed("application name contains NUL".to_string()))?;
        let engine_name_cstr = CString::new("vk_engine")
            .map_err(|_| VulkanError::InitializationFailed("engine name contains NUL".to_string()))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name_cstr)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let cstr_extensions = required_extensions
            .iter()
            .map(|ext| CString::new(ext.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| VulkanError::InitializationFailed("extension name contains NUL".to_string()))?;
        let mut extensions: Vec<*const std::os::raw::c_char> =
            cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();

        let use_validation = enable_validation && Self::validation_layer_available(&entry);
        if enable_validation && !use_validation {
            log::warn!("Validation requested but {:?} is not installed", VALIDATION_LAYER);
        }

        let mut layer_names = Vec::new();
        if use_validation {
            layer_names.push(VALIDATION_LAYER.as_ptr());
            extensions.push(DebugUtils::name().as_ptr());
        }

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);

        let instance = unsafe { entry.create_instance(&create_info, None) }.map_err(api("vkCreateInstance"))?;

        let debug = if use_validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            match Self::setup_debug_messenger(&debug_utils) {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        log::info!("Created Vulkan instance (validation: {})", use_validation);
        Ok(Self { entry, instance, debug })
    }

    fn validation_layer_available(entry: &Entry) -> bool {
        entry
            .enumerate_instance_layer_properties()
            .map(|layers| {
                layers.iter().any(|layer| {
                    let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
                    name == VALIDATION_LAYER
                })
            })
            .unwrap_or(false)
    }

    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .map_err(api("vkCreateDebugUtilsMessengerEXT"))
    }

    /// Vulkan entry point
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Vulkan instance
    pub fn instance(&self) -> &Instance {
        &self.instance
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Presentation surface with its extension loader
pub struct SurfaceHandle {
    loader: Surface,
    surface: vk::SurfaceKHR,
}

impl SurfaceHandle {
    /// Ask `provider` for a surface on `instance`
    pub fn new(instance: &VulkanInstance, provider: &mut dyn SurfaceProvider) -> VulkanResult<Self> {
        let loader = Surface::new(instance.entry(), instance.instance());
        let surface = provider.create_surface(instance.instance())?;
        Ok(Self { loader, surface })
    }

    /// Surface handle
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Surface extension loader
    pub fn loader(&self) -> &Surface {
        &self.loader
    }
}

impl Drop for SurfaceHandle {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.surface, None);
        }
    }
}

/// What adapter selection needs to know about one physical device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterCandidate {
    /// Reported device type
    pub device_type: vk::PhysicalDeviceType,
    /// Whether geometry shaders are supported
    pub geometry_shader: bool,
}

/// Pick the first discrete adapter with geometry shaders, else the first adapter
pub fn select_adapter(candidates: &[AdapterCandidate]) -> VulkanResult<usize> {
    if candidates.is_empty() {
        return Err(VulkanError::NoAdapter);
    }

    Ok(candidates
        .iter()
        .position(|candidate| {
            candidate.device_type == vk::PhysicalDeviceType::DISCRETE_GPU && candidate.geometry_shader
        })
        .unwrap_or(0))
}

/// Graphics and present queue family indices; may be equal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Family used for graphics and transfer work
    pub graphics: u32,
    /// Family used for presentation
    pub present: u32,
}

impl QueueFamilyIndices {
    /// Distinct family indices, graphics first
    pub fn unique(&self) -> Vec<u32> {
        if self.graphics == self.present {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }

    /// Whether graphics and present run on different families
    pub fn is_split(&self) -> bool {
        self.graphics != self.present
    }
}

/// Scan queue families in order, recording the first graphics family and
/// the first family able to present; the scan stops once both are known
pub fn find_queue_families<F>(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: F,
) -> VulkanResult<QueueFamilyIndices>
where
    F: FnMut(u32) -> VulkanResult<bool>,
{
    let mut graphics = None;
    let mut present = None;

    for (index, family) in (0u32..).zip(families.iter()) {
        if family.queue_count == 0 {
            continue;
        }
        if graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            graphics = Some(index);
        }
        if present.is_none() && supports_present(index)? {
            present = Some(index);
        }
        if graphics.is_some() && present.is_some() {
            break;
        }
    }

    Ok(QueueFamilyIndices {
        graphics: graphics.ok_or(VulkanError::QueueFamilyNotFound("graphics"))?,
        present: present.ok_or(VulkanError::QueueFamilyNotFound("present"))?,
    })
}

/// Selected physical device and what we learned about it
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Supported device features
    pub features: vk::PhysicalDeviceFeatures,
    /// Memory heaps and types
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Resolved queue families
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    /// Enumerate adapters, select one and resolve its queue families
    pub fn select(instance: &Instance, surface: &SurfaceHandle) -> VulkanResult<Self> {
        let devices = unsafe { instance.enumerate_physical_devices() }
            .map_err(api("vkEnumeratePhysicalDevices"))?;

        let candidates: Vec<AdapterCandidate> = devices
            .iter()
            .map(|&device| {
                let properties = unsafe { instance.get_physical_device_properties(device) };
                let features = unsafe { instance.get_physical_device_features(device) };
                AdapterCandidate {
                    device_type: properties.device_type,
                    geometry_shader: features.geometry_shader == vk::TRUE,
                }
            })
            .collect();

        let device = devices[select_adapter(&candidates)?];
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };
        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let queue_families = find_queue_families(&families, |index| unsafe {
            surface
                .loader()
                .get_physical_device_surface_support(device, index, surface.handle())
                .map_err(api("vkGetPhysicalDeviceSurfaceSupportKHR"))
        })?;

        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) };
        log::info!(
            "Selected GPU: {} ({:?}), graphics family {}, present family {}",
            name.to_string_lossy(),
            properties.device_type,
            queue_families.graphics,
            queue_families.present
        );

        Ok(Self {
            device,
            properties,
            features,
            memory_properties,
            queue_families,
        })
    }
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    device: Device,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create the device with one queue per distinct family and the swapchain extension
    pub fn new(instance: &Instance, physical: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let priorities = [1.0f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = physical
            .queue_families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];

        let device_features = vk::PhysicalDeviceFeatures::builder()
            .sampler_anisotropy(physical.features.sampler_anisotropy == vk::TRUE)
            .build();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features);

        let device = unsafe { instance.create_device(physical.device, &create_info, None) }
            .map_err(api("vkCreateDevice"))?;

        let graphics_queue = unsafe { device.get_device_queue(physical.queue_families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(physical.queue_families.present, 0) };
        let swapchain_loader = SwapchainLoader::new(instance, &device);

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            swapchain_loader,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

/// Main Vulkan context that owns all core Vulkan resources
///
/// Field order is drop order.
pub struct VulkanContext {
    descriptor_set_layout: DescriptorSetLayout,
    descriptor_pool: DescriptorPool,
    device: LogicalDevice,
    physical_device: PhysicalDeviceInfo,
    surface: SurfaceHandle,
    instance: VulkanInstance,
}

impl VulkanContext {
    /// Create instance, surface, device and descriptor resources for `provider`
    pub fn new(provider: &mut dyn SurfaceProvider, app_name: &str, enable_validation: bool) -> VulkanResult<Self> {
        let extensions = provider.required_instance_extensions()?;
        let instance = VulkanInstance::new(&extensions, app_name, enable_validation)?;
        let surface = SurfaceHandle::new(&instance, provider)?;
        let physical_device = PhysicalDeviceInfo::select(instance.instance(), &surface)?;
        let device = LogicalDevice::new(instance.instance(), &physical_device)?;
        let descriptor_pool = DescriptorPool::new(&device.device)?;
        let descriptor_set_layout = mesh_layout_builder().build(&device.device)?;

        Ok(Self {
            descriptor_set_layout,
            descriptor_pool,
            device,
            physical_device,
            surface,
            instance,
        })
    }

    /// Get a reference to the Vulkan instance
    pub fn instance(&self) -> &Instance {
        self.instance.instance()
    }

    /// Get the logical device
    pub fn device(&self) -> &Device {
        &self.device.device
    }

    /// Get the physical device info
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// Queue family indices
    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.physical_device.queue_families
    }

    /// Get the graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    /// Get the present queue
    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    /// Surface handle
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface.handle()
    }

    /// Surface extension loader
    pub fn surface_loader(&self) -> &Surface {
        self.surface.loader()
    }

    /// Swapchain extension loader
    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.device.swapchain_loader
    }

    /// Shared descriptor pool
    pub fn descriptor_pool(&self) -> &DescriptorPool {
        &self.descriptor_pool
    }

    /// Mesh descriptor set layout
    pub fn descriptor_set_layout(&self) -> &DescriptorSetLayout {
        &self.descriptor_set_layout
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device.device_wait_idle() }.map_err(api("vkDeviceWaitIdle"))
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device.device_wait_idle();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn adapter(device_type: vk::PhysicalDeviceType, geometry_shader: bool) -> AdapterCandidate {
        AdapterCandidate {
            device_type,
            geometry_shader,
        }
    }

    #[test]
    fn test_no_adapters_is_fatal() {
        assert!(matches!(select_adapter(&[]), Err(VulkanError::NoAdapter)));
    }

    #[test]
    fn test_prefers_discrete_with_geometry_shader() {
        let candidates = [
            adapter(vk::PhysicalDeviceType::INTEGRATED_GPU, true),
            adapter(vk::PhysicalDeviceType::DISCRETE_GPU, false),
            adapter(vk::PhysicalDeviceType::DISCRETE_GPU, true),
        ];
        assert_eq!(select_adapter(&candidates).unwrap(), 2);
    }

    #[test]
    fn test_falls_back_to_first_adapter() {
        let candidates = [
            adapter(vk::PhysicalDeviceType::CPU, false),
            adapter(vk::PhysicalDeviceType::INTEGRATED_GPU, true),
        ];
        assert_eq!(select_adapter(&candidates).unwrap(), 0);
    }

    #[test]
    fn test_first_family_serving_both() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let indices = find_queue_families(&families, |_| Ok(true)).unwrap();
        assert_eq!(indices, QueueFamilyIndices { graphics: 0, present: 0 });
        assert_eq!(indices.unique(), vec![0]);
        assert!(!indices.is_split());
    }

    #[test]
    fn test_scan_stops_once_both_known() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let mut queried = Vec::new();
        let indices = find_queue_families(&families, |index| {
            queried.push(index);
            Ok(index == 0)
        })
        .unwrap();

        assert_eq!(indices, QueueFamilyIndices { graphics: 1, present: 0 });
        // Present was known after family 0, so only family 0 was queried
        assert_eq!(queried, vec![0]);
    }

    #[test]
    fn test_split_families_deduplicate_to_two() {
        let families = [family(vk::QueueFlags::GRAPHICS), family(vk::QueueFlags::TRANSFER)];
        let indices = find_queue_families(&families, |index| Ok(index == 1)).unwrap();
        assert_eq!(indices, QueueFamilyIndices { graphics: 0, present: 1 });
        assert_eq!(indices.unique(), vec![0, 1]);
        assert!(indices.is_split());
    }

    #[test]
    fn test_missing_present_family() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let result = find_queue_families(&families, |_| Ok(false));
        assert!(matches!(result, Err(VulkanError::QueueFamilyNotFound("present"))));
    }

    #[test]
    fn test_missing_graphics_family() {
        let families = [family(vk::QueueFlags::COMPUTE)];
        let result = find_queue_families(&families, |_| Ok(true));
        assert!(matches!(result, Err(VulkanError::QueueFamilyNotFound("graphics"))));
    }

    #[test]
    fn test_present_query_errors_propagate() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let surface_lost = api("vkGetPhysicalDeviceSurfaceSupportKHR");
        let result = find_queue_families(&families, |_| Err(surface_lost(vk::Result::ERROR_SURFACE_LOST_KHR)));
        assert!(matches!(
            result,
            Err(VulkanError::Api {
                call: "vkGetPhysicalDeviceSurfaceSupportKHR",
                ..
            })
        ));
    }
}
