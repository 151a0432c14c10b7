//! Descriptor set layouts, the shared descriptor pool and set updates
//!
//! The pool holds 1000 descriptors of every type so the GUI overlay can
//! allocate its own sets from it alongside the renderer's per-frame sets.

use ash::{vk, Device};

use super::{api, VulkanResult};

/// Descriptors reserved per descriptor type
pub const DESCRIPTORS_PER_TYPE: u32 = 1000;

const POOLED_TYPES: [vk::DescriptorType; 11] = [
    vk::DescriptorType::SAMPLER,
    vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    vk::DescriptorType::SAMPLED_IMAGE,
    vk::DescriptorType::STORAGE_IMAGE,
    vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
    vk::DescriptorType::STORAGE_TEXEL_BUFFER,
    vk::DescriptorType::UNIFORM_BUFFER,
    vk::DescriptorType::STORAGE_BUFFER,
    vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
    vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
    vk::DescriptorType::INPUT_ATTACHMENT,
];

/// Binding slot of the model/view/projection uniform buffer
pub const UNIFORM_BINDING: u32 = 0;
/// Binding slot of the texture sampler
pub const SAMPLER_BINDING: u32 = 1;

/// Descriptor set layout builder
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Create a new descriptor set layout builder
    pub fn new() -> Self {
        Self { bindings: Vec::new() }
    }

    /// Add a uniform buffer binding
    pub fn add_uniform_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::UNIFORM_BUFFER, stage_flags)
    }

    /// Add a combined image sampler binding
    pub fn add_combined_image_sampler(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add(binding, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, stage_flags)
    }

    fn add(mut self, binding: u32, ty: vk::DescriptorType, stage_flags: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(ty)
                .descriptor_count(1)
                .stage_flags(stage_flags)
                .build(),
        );
        self
    }

    /// Bindings collected so far
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }

    /// Build the descriptor set layout
    pub fn build(self, device: &Device) -> VulkanResult<DescriptorSetLayout> {
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&self.bindings);

        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None) }
            .map_err(api("vkCreateDescriptorSetLayout"))?;

        Ok(DescriptorSetLayout {
            layout,
            device: device.clone(),
        })
    }
}

impl Default for DescriptorSetLayoutBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Layout used by the mesh pipeline: uniform buffer for the vertex stage,
/// combined image sampler for the fragment stage
pub fn mesh_layout_builder() -> DescriptorSetLayoutBuilder {
    DescriptorSetLayoutBuilder::new()
        .add_uniform_buffer(UNIFORM_BINDING, vk::ShaderStageFlags::VERTEX)
        .add_combined_image_sampler(SAMPLER_BINDING, vk::ShaderStageFlags::FRAGMENT)
}

/// Binding slot of the GUI font atlas in the overlay's own set
pub const OVERLAY_FONT_BINDING: u32 = 0;

/// Layout used by the GUI overlay: the font atlas for the fragment stage
pub fn overlay_layout_builder() -> DescriptorSetLayoutBuilder {
    DescriptorSetLayoutBuilder::new().add_combined_image_sampler(OVERLAY_FONT_BINDING, vk::ShaderStageFlags::FRAGMENT)
}

/// Descriptor set layout wrapper with automatic cleanup
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    device: Device,
}

impl DescriptorSetLayout {
    /// Get the Vulkan descriptor set layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Pool sizes for every descriptor type the pool serves
pub fn pool_sizes() -> Vec<vk::DescriptorPoolSize> {
    POOLED_TYPES
        .iter()
        .map(|&ty| vk::DescriptorPoolSize {
            ty,
            descriptor_count: DESCRIPTORS_PER_TYPE,
        })
        .collect()
}

/// Descriptor pool for allocating descriptor sets
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    device: Device,
}

impl DescriptorPool {
    /// Create the shared pool; individual sets may be freed
    pub fn new(device: &Device) -> VulkanResult<Self> {
        let sizes = pool_sizes();
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(DESCRIPTORS_PER_TYPE * POOLED_TYPES.len() as u32)
            .pool_sizes(&sizes);

        let pool = unsafe { device.create_descriptor_pool(&pool_info, None) }
            .map_err(api("vkCreateDescriptorPool"))?;

        Ok(Self {
            pool,
            device: device.clone(),
        })
    }

    /// Allocate one set per entry of `layouts`
    pub fn allocate(&self, layouts: &[vk::DescriptorSetLayout]) -> VulkanResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);

        unsafe { self.device.allocate_descriptor_sets(&alloc_info) }
            .map_err(api("vkAllocateDescriptorSets"))
    }

    /// Return sets to the pool
    pub fn free(&self, sets: &[vk::DescriptorSet]) -> VulkanResult<()> {
        if sets.is_empty() {
            return Ok(());
        }
        unsafe { self.device.free_descriptor_sets(self.pool, sets) }
            .map_err(api("vkFreeDescriptorSets"))
    }

    /// Get the pool handle
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// Point a mesh descriptor set at its uniform buffer and the texture
pub fn write_mesh_set(
    device: &Device,
    set: vk::DescriptorSet,
    uniform_buffer: vk::Buffer,
    uniform_range: vk::DeviceSize,
    image_view: vk::ImageView,
    sampler: vk::Sampler,
) {
    let buffer_info = [vk::DescriptorBufferInfo {
        buffer: uniform_buffer,
        offset: 0,
        range: uniform_range,
    }];
    let image_info = [vk::DescriptorImageInfo {
        sampler,
        image_view,
        image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    }];

    let writes = [
        vk::WriteDescriptorSet::builder()
            .dst_set(set)
            .dst_binding(UNIFORM_BINDING)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&buffer_info)
            .build(),
        vk::WriteDescriptorSet::builder()
            .dst_set(set)
            .dst_binding(SAMPLER_BINDING)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&image_info)
            .build(),
    ];

    unsafe {
        device.update_descriptor_sets(&writes, &[]);
    }
}

/// Point a sampler binding of `set` at a texture
pub fn write_image_set(
    device: &Device,
    set: vk::DescriptorSet,
    binding: u32,
    image_view: vk::ImageView,
    sampler: vk::Sampler,
) {
    let image_info = [vk::DescriptorImageInfo {
        sampler,
        image_view,
        image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    }];

    let write = vk::WriteDescriptorSet::builder()
        .dst_set(set)
        .dst_binding(binding)
        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
        .image_info(&image_info)
        .build();

    unsafe {
        device.update_descriptor_sets(&[write], &[]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_layout_bindings() {
        let builder = mesh_layout_builder();
        let bindings = builder.bindings();

        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].binding, UNIFORM_BINDING);
        assert_eq!(bindings[0].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(bindings[0].stage_flags, vk::ShaderStageFlags::VERTEX);
        assert_eq!(bindings[1].binding, SAMPLER_BINDING);
        assert_eq!(bindings[1].descriptor_type, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(bindings[1].stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn test_overlay_layout_has_only_the_atlas() {
        let builder = overlay_layout_builder();
        let bindings = builder.bindings();

        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].binding, OVERLAY_FONT_BINDING);
        assert_eq!(bindings[0].descriptor_type, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(bindings[0].stage_flags, vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn test_pool_covers_every_type() {
        let sizes = pool_sizes();
        assert_eq!(sizes.len(), 11);
        assert!(sizes.iter().all(|size| size.descriptor_count == DESCRIPTORS_PER_TYPE));
        assert!(sizes.iter().any(|size| size.ty == vk::DescriptorType::COMBINED_IMAGE_SAMPLER));
    }
}
