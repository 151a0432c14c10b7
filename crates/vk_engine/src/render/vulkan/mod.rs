//! Vulkan backend
//!
//! RAII wrappers over the `ash` handles the renderer needs, plus the pure
//! selection and negotiation logic they are built from.

pub mod buffer;
pub mod commands;
pub mod context;
pub mod descriptor;
pub mod framebuffer;
pub mod image;
pub mod memory;
pub mod pipeline;
pub mod render_pass;
pub mod render_process;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod transfer;
pub mod transitions;
pub mod uniform;
pub mod vertex_layout;

// Re-export commonly used types
pub use buffer::Buffer;
pub use commands::{CommandPool, CommandRecorder};
pub use context::{api, SurfaceProvider, VulkanContext, VulkanError, VulkanResult};
pub use descriptor::{DescriptorPool, DescriptorSetLayout};
pub use image::DepthImage;
pub use render_process::{RenderProcess, TargetDescription};
pub use swapchain::{Swapchain, SwapchainSettings, SwapchainSupport};
pub use sync::{Fence, FrameSlot, Semaphore};
pub use texture::Texture;
pub use transfer::{MeshBuffers, TransferDevice, VulkanTransfer};
pub use uniform::{UniformBufferObject, UniformBuffers};
