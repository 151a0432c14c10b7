//! Host-to-device uploads through staging buffers
//!
//! [`upload_via_staging`] is written against [`TransferDevice`] so the
//! staging protocol (host-visible write, device copy, staging release) is
//! independent of a live GPU. [`VulkanTransfer`] is the real device.

use ash::vk;

use super::buffer::Buffer;
use super::commands::CommandPool;
use super::{VulkanContext, VulkanError, VulkanResult};
use crate::render::mesh::Mesh;

/// Memory properties of a staging buffer
pub const STAGING_PROPERTIES: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
    vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
);

/// Minimal device surface needed to stage an upload
pub trait TransferDevice {
    /// Buffer type; dropping it releases the buffer and its memory
    type Buffer;

    /// Create a buffer with its own memory
    fn create_buffer(
        &mut self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self::Buffer>;

    /// Map, copy `data` and unmap a host-visible buffer
    fn write_buffer(&mut self, buffer: &Self::Buffer, data: &[u8]) -> VulkanResult<()>;

    /// Copy `size` bytes on the device and wait for completion
    fn copy_buffer(&mut self, src: &Self::Buffer, dst: &Self::Buffer, size: vk::DeviceSize) -> VulkanResult<()>;
}

/// Upload `data` into a new device-local buffer with the given usage
///
/// The staging buffer is dropped before returning.
pub fn upload_via_staging<D: TransferDevice>(
    device: &mut D,
    data: &[u8],
    usage: vk::BufferUsageFlags,
) -> VulkanResult<D::Buffer> {
    if data.is_empty() {
        return Err(VulkanError::InvalidOperation {
            reason: "cannot stage an empty upload".to_string(),
        });
    }
    let size = data.len() as vk::DeviceSize;

    let staging = device.create_buffer(size, vk::BufferUsageFlags::TRANSFER_SRC, STAGING_PROPERTIES)?;
    device.write_buffer(&staging, data)?;

    let destination = device.create_buffer(
        size,
        usage | vk::BufferUsageFlags::TRANSFER_DST,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;
    device.copy_buffer(&staging, &destination, size)?;

    drop(staging);
    Ok(destination)
}

/// Staging transfers on the graphics queue
pub struct VulkanTransfer<'a> {
    context: &'a VulkanContext,
    command_pool: &'a CommandPool,
}

impl<'a> VulkanTransfer<'a> {
    /// Use `command_pool` (graphics family) for one-time copy commands
    pub fn new(context: &'a VulkanContext, command_pool: &'a CommandPool) -> Self {
        Self { context, command_pool }
    }

    /// Context the transfers run on
    pub fn context(&self) -> &'a VulkanContext {
        self.context
    }

    /// Pool used for one-time commands
    pub fn command_pool(&self) -> &'a CommandPool {
        self.command_pool
    }
}

impl TransferDevice for VulkanTransfer<'_> {
    type Buffer = Buffer;

    fn create_buffer(
        &mut self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Buffer> {
        Buffer::new(self.context, size, usage, properties)
    }

    fn write_buffer(&mut self, buffer: &Buffer, data: &[u8]) -> VulkanResult<()> {
        buffer.write_bytes(data)
    }

    fn copy_buffer(&mut self, src: &Buffer, dst: &Buffer, size: vk::DeviceSize) -> VulkanResult<()> {
        self.command_pool
            .submit_one_time(self.context.graphics_queue(), |recorder| {
                recorder.copy_buffer(src.handle(), dst.handle(), size);
                Ok(())
            })
    }
}

/// Device-local vertex and index buffers of one mesh
pub struct MeshBuffers {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
}

impl MeshBuffers {
    /// Stage both arrays of `mesh` into device-local memory
    pub fn upload(transfer: &mut VulkanTransfer<'_>, mesh: &Mesh) -> VulkanResult<Self> {
        let vertex_buffer =
            upload_via_staging(transfer, mesh.vertex_bytes(), vk::BufferUsageFlags::VERTEX_BUFFER)?;
        let index_buffer = upload_via_staging(transfer, mesh.index_bytes(), vk::BufferUsageFlags::INDEX_BUFFER)?;

        log::info!(
            "Uploaded mesh: {} vertices ({} bytes), {} indices",
            mesh.vertices().len(),
            vertex_buffer.size(),
            mesh.index_count()
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.index_count(),
        })
    }

    /// Vertex buffer handle
    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer.handle()
    }

    /// Index buffer handle
    pub fn index_buffer(&self) -> vk::Buffer {
        self.index_buffer.handle()
    }

    /// Number of indices to draw
    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    struct Ledger {
        live: usize,
        released: Vec<(vk::BufferUsageFlags, vk::MemoryPropertyFlags)>,
        copies: usize,
    }

    struct FakeBuffer {
        bytes: RefCell<Vec<u8>>,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
        ledger: Rc<RefCell<Ledger>>,
    }

    impl Drop for FakeBuffer {
        fn drop(&mut self) {
            let mut ledger = self.ledger.borrow_mut();
            ledger.live -= 1;
            ledger.released.push((self.usage, self.properties));
        }
    }

    #[derive(Default)]
    struct FakeDevice {
        ledger: Rc<RefCell<Ledger>>,
        fail_copy: bool,
    }

    impl TransferDevice for FakeDevice {
        type Buffer = FakeBuffer;

        fn create_buffer(
            &mut self,
            size: vk::DeviceSize,
            usage: vk::BufferUsageFlags,
            properties: vk::MemoryPropertyFlags,
        ) -> VulkanResult<FakeBuffer> {
            self.ledger.borrow_mut().live += 1;
            Ok(FakeBuffer {
                bytes: RefCell::new(vec![0; size as usize]),
                usage,
                properties,
                ledger: Rc::clone(&self.ledger),
            })
        }

        fn write_buffer(&mut self, buffer: &FakeBuffer, data: &[u8]) -> VulkanResult<()> {
            assert!(buffer.properties.contains(vk::MemoryPropertyFlags::HOST_VISIBLE));
            buffer.bytes.borrow_mut()[..data.len()].copy_from_slice(data);
            Ok(())
        }

        fn copy_buffer(&mut self, src: &FakeBuffer, dst: &FakeBuffer, size: vk::DeviceSize) -> VulkanResult<()> {
            if self.fail_copy {
                return Err(VulkanError::Api {
                    call: "vkQueueSubmit",
                    result: vk::Result::ERROR_DEVICE_LOST,
                });
            }
            let size = size as usize;
            dst.bytes.borrow_mut()[..size].copy_from_slice(&src.bytes.borrow()[..size]);
            self.ledger.borrow_mut().copies += 1;
            Ok(())
        }
    }

    #[test]
    fn test_staged_bytes_arrive_intact() {
        let mut device = FakeDevice::default();
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();

        let buffer = upload_via_staging(&mut device, &data, vk::BufferUsageFlags::VERTEX_BUFFER).unwrap();

        assert_eq!(*buffer.bytes.borrow(), data);
        assert_eq!(device.ledger.borrow().copies, 1);
    }

    #[test]
    fn test_destination_is_device_local_with_transfer_dst() {
        let mut device = FakeDevice::default();
        let buffer = upload_via_staging(&mut device, &[1, 2, 3, 4], vk::BufferUsageFlags::INDEX_BUFFER).unwrap();

        assert_eq!(buffer.properties, vk::MemoryPropertyFlags::DEVICE_LOCAL);
        assert!(buffer.usage.contains(vk::BufferUsageFlags::INDEX_BUFFER));
        assert!(buffer.usage.contains(vk::BufferUsageFlags::TRANSFER_DST));
    }

    #[test]
    fn test_staging_released_after_upload() {
        let mut device = FakeDevice::default();
        let _buffer = upload_via_staging(&mut device, &[9; 64], vk::BufferUsageFlags::VERTEX_BUFFER).unwrap();

        let ledger = device.ledger.borrow();
        assert_eq!(ledger.live, 1);
        assert_eq!(
            ledger.released,
            vec![(vk::BufferUsageFlags::TRANSFER_SRC, STAGING_PROPERTIES)]
        );
    }

    #[test]
    fn test_failed_copy_releases_everything() {
        let mut device = FakeDevice {
            fail_copy: true,
            ..Default::default()
        };
        let result = upload_via_staging(&mut device, &[1; 16], vk::BufferUsageFlags::VERTEX_BUFFER);

        assert!(matches!(result, Err(VulkanError::Api { .. })));
        assert_eq!(device.ledger.borrow().live, 0);
    }

    #[test]
    fn test_empty_upload_rejected() {
        let mut device = FakeDevice::default();
        let result = upload_via_staging(&mut device, &[], vk::BufferUsageFlags::VERTEX_BUFFER);
        assert!(matches!(result, Err(VulkanError::InvalidOperation { .. })));
        assert_eq!(device.ledger.borrow().live, 0);
    }
}
