//! GPU buffer resource.

use super::DeviceLink;
use crate::handle::BufferHandle;
use crate::types::{BufferDescriptor, BufferUsage};

/// A device-resident buffer.
///
/// Buffers are created by [`GpuDevice::create_buffer`](crate::GpuDevice::create_buffer).
/// Pass [`handle`](Self::handle) or the helper constructors of
/// [`BufferRegion`](crate::BufferRegion) and [`BufferBinding`](crate::BufferBinding)
/// to copy and binding calls.
///
/// # Example
///
/// ```ignore
/// let buffer = device.create_buffer(&BufferDescriptor::new(1024, BufferUsage::VERTEX))?;
/// println!("Buffer size: {}", buffer.size());
/// ```
pub struct Buffer {
    link: DeviceLink,
    handle: BufferHandle,
    descriptor: BufferDescriptor,
}

impl Buffer {
    pub(crate) fn new(link: DeviceLink, handle: BufferHandle, descriptor: BufferDescriptor) -> Self {
        Self {
            link,
            handle,
            descriptor,
        }
    }

    /// Non-owning handle. Stale once the buffer is released.
    pub fn handle(&self) -> BufferHandle {
        self.handle
    }

    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.descriptor.size
    }

    pub fn usage(&self) -> BufferUsage {
        self.descriptor.usage
    }

    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    /// Set the debug name shown by graphics debuggers.
    pub fn set_name(&mut self, name: &str) {
        self.descriptor.label = Some(name.to_owned());
        if let Some(device) = self.link.device() {
            device.backend().set_buffer_name(self.handle, name);
        }
    }

    pub fn is_released(&self) -> bool {
        self.link.is_released()
    }

    /// Release the buffer. Further calls do nothing.
    pub fn release(&mut self) {
        let handle = self.handle;
        if self.link.release(|backend| backend.release_buffer(handle)) {
            log::trace!("Buffer: released {:?} {handle:?}", self.descriptor.label);
        }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("handle", &self.handle)
            .field("size", &self.descriptor.size)
            .field("usage", &self.descriptor.usage)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

static_assertions::assert_impl_all!(Buffer: Send, Sync);
static_assertions::assert_not_impl_any!(Buffer: Clone);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::RawHandle;

    fn detached(size: u64) -> Buffer {
        Buffer::new(
            DeviceLink::detached(),
            BufferHandle::from_raw(RawHandle::new(0, 0)),
            BufferDescriptor::new(size, BufferUsage::VERTEX),
        )
    }

    #[test]
    fn test_buffer_debug() {
        let buffer = detached(1024);
        let debug = format!("{:?}", buffer);
        assert!(debug.contains("Buffer"));
        assert!(debug.contains("1024"));
    }

    #[test]
    fn test_buffer_release_without_device() {
        let mut buffer = detached(2048);
        assert_eq!(buffer.size(), 2048);
        buffer.set_name("verts");
        assert_eq!(buffer.label(), Some("verts"));
        buffer.release();
        buffer.release();
        assert!(buffer.is_released());
    }
}
