//! Host-visible staging buffers.

use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use bytemuck::Pod;

use super::DeviceLink;
use crate::backend::MappedMemory;
use crate::device::DeviceShared;
use crate::error::GpuError;
use crate::handle::TransferBufferHandle;
use crate::types::{TransferBufferDescriptor, TransferBufferUsage};

/// Staging memory for uploads to and downloads from the GPU.
///
/// Write upload data through [`map`](Self::map) (or [`write`](Self::write)),
/// then copy it in a [`CopyPass`](crate::CopyPass). Downloads land here once the
/// submission that recorded them has completed.
///
/// # Example
///
/// ```ignore
/// let mut staging = device.create_transfer_buffer(&TransferBufferDescriptor::upload(64))?;
/// staging.write(0, &[1.0f32, 2.0, 3.0, 4.0], true)?;
///
/// let mut cmd = device.acquire_command_buffer()?;
/// let mut copy = cmd.begin_copy_pass();
/// copy.upload_to_buffer(
///     &TransferBufferLocation::new(&staging, 0),
///     &BufferRegion::new(&vertices, 0, 16),
///     false,
/// );
/// copy.end();
/// cmd.submit()?;
/// ```
pub struct TransferBuffer {
    link: DeviceLink,
    handle: TransferBufferHandle,
    descriptor: TransferBufferDescriptor,
}

impl TransferBuffer {
    pub(crate) fn new(
        link: DeviceLink,
        handle: TransferBufferHandle,
        descriptor: TransferBufferDescriptor,
    ) -> Self {
        Self {
            link,
            handle,
            descriptor,
        }
    }

    pub fn handle(&self) -> TransferBufferHandle {
        self.handle
    }

    pub fn descriptor(&self) -> &TransferBufferDescriptor {
        &self.descriptor
    }

    pub fn size(&self) -> u64 {
        self.descriptor.size
    }

    pub fn usage(&self) -> TransferBufferUsage {
        self.descriptor.usage
    }

    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    /// Map the buffer for host access.
    ///
    /// With `cycle` set, a buffer still referenced by submitted work is given
    /// fresh memory instead of waiting; the previous contents stay with that
    /// work. Without it, the call blocks until the work has completed. The
    /// mapping is released when the returned guard is dropped.
    pub fn map(&mut self, cycle: bool) -> Result<TransferBufferMapping<'_>, GpuError> {
        let device = self.link.device().ok_or(GpuError::DeviceDestroyed)?;
        let memory = device.backend().map_transfer_buffer(self.handle, cycle)?;
        Ok(TransferBufferMapping {
            device,
            handle: self.handle,
            memory,
            _buffer: PhantomData,
        })
    }

    /// Copy `data` into the buffer at byte `offset`.
    pub fn write<T: Pod>(&mut self, offset: u64, data: &[T], cycle: bool) -> Result<(), GpuError> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let range = self.byte_range(offset, bytes.len())?;
        let mut mapping = self.map(cycle)?;
        mapping[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Read `count` values starting at byte `offset`.
    ///
    /// Waits for submitted work that references this buffer, so downloads
    /// recorded before the call are visible.
    pub fn read<T: Pod>(&mut self, offset: u64, count: usize) -> Result<Vec<T>, GpuError> {
        let range = self.byte_range(offset, count * std::mem::size_of::<T>())?;
        let mapping = self.map(false)?;
        Ok(mapping[range]
            .chunks_exact(std::mem::size_of::<T>().max(1))
            .take(count)
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    fn byte_range(&self, offset: u64, len: usize) -> Result<std::ops::Range<usize>, GpuError> {
        let end = offset.checked_add(len as u64).filter(|&end| end <= self.descriptor.size);
        match end {
            Some(end) => Ok(offset as usize..end as usize),
            None => Err(GpuError::InvalidParameter(format!(
                "{len} bytes at offset {offset} exceed transfer buffer of {} bytes",
                self.descriptor.size
            ))),
        }
    }

    pub fn is_released(&self) -> bool {
        self.link.is_released()
    }

    /// Release the buffer. Further calls do nothing.
    pub fn release(&mut self) {
        let handle = self.handle;
        if self.link.release(|backend| backend.release_transfer_buffer(handle)) {
            log::trace!("TransferBuffer: released {:?} {handle:?}", self.descriptor.label);
        }
    }
}

impl Drop for TransferBuffer {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for TransferBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferBuffer")
            .field("handle", &self.handle)
            .field("size", &self.descriptor.size)
            .field("usage", &self.descriptor.usage)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

/// Host view of a mapped [`TransferBuffer`]. Unmaps on drop.
///
/// Holds the transfer buffer mutably borrowed, so a buffer cannot be mapped
/// twice or released while mapped.
pub struct TransferBufferMapping<'a> {
    device: Arc<DeviceShared>,
    handle: TransferBufferHandle,
    memory: MappedMemory,
    _buffer: PhantomData<&'a mut TransferBuffer>,
}

impl Deref for TransferBufferMapping<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: the backend keeps the memory valid and unaliased until unmap,
        // which only happens in Drop.
        unsafe { std::slice::from_raw_parts(self.memory.as_ptr(), self.memory.len()) }
    }
}

impl DerefMut for TransferBufferMapping<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: as for `deref`; `&mut self` makes this the only view.
        unsafe { std::slice::from_raw_parts_mut(self.memory.as_ptr(), self.memory.len()) }
    }
}

impl Drop for TransferBufferMapping<'_> {
    fn drop(&mut self) {
        self.device.backend().unmap_transfer_buffer(self.handle);
    }
}

impl std::fmt::Debug for TransferBufferMapping<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferBufferMapping")
            .field("handle", &self.handle)
            .field("len", &self.memory.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(TransferBuffer: Send, Sync);
