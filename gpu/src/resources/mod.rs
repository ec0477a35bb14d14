//! GPU resources.
//!
//! This module contains the owning resource types created by [`GpuDevice`]:
//! - [`Buffer`] - device-resident memory
//! - [`TransferBuffer`] - host-visible staging memory, mapped through [`TransferBufferMapping`]
//! - [`Texture`] - images, including cube and 3D textures
//! - [`Sampler`], [`Shader`], [`GraphicsPipeline`], [`ComputePipeline`]
//! - [`Fence`] - completion signal of one submission
//!
//! Each resource owns exactly one backend object. It is released by
//! `release()` or on drop, whichever comes first; releasing twice is a no-op.
//! Resources hold a weak reference back to their device, so a resource that
//! outlives its device releases nothing.
//!
//! [`GpuDevice`]: crate::GpuDevice

mod buffer;
mod fence;
mod pipeline;
mod sampler;
mod shader;
mod texture;
mod transfer_buffer;

use std::sync::{Arc, Weak};

pub use buffer::Buffer;
pub use fence::Fence;
pub use pipeline::{ComputePipeline, GraphicsPipeline};
pub use sampler::Sampler;
pub use shader::Shader;
pub use texture::Texture;
pub use transfer_buffer::{TransferBuffer, TransferBufferMapping};

use crate::backend::GpuBackend;
use crate::device::DeviceShared;

/// Link from an owning resource back to the device that created it.
pub(crate) struct DeviceLink {
    device: Weak<DeviceShared>,
    released: bool,
}

impl DeviceLink {
    pub(crate) fn new(device: &Arc<DeviceShared>) -> Self {
        Self {
            device: Arc::downgrade(device),
            released: false,
        }
    }

    /// A link to no device, for resources built in tests.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self {
            device: Weak::new(),
            released: false,
        }
    }

    pub(crate) fn is_released(&self) -> bool {
        self.released
    }

    /// The device, unless the resource was released or the device is gone.
    pub(crate) fn device(&self) -> Option<Arc<DeviceShared>> {
        if self.released {
            return None;
        }
        self.device.upgrade().filter(|device| !device.is_destroyed())
    }

    /// Release the backend object once. Returns whether `release` ran.
    pub(crate) fn release(&mut self, release: impl FnOnce(&dyn GpuBackend)) -> bool {
        let device = self.device();
        if self.released {
            return false;
        }
        self.released = true;
        match device {
            Some(device) => {
                release(device.backend());
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for DeviceLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceLink")
            .field("released", &self.released)
            .field("device_alive", &(self.device.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_release_is_idempotent() {
        let mut link = DeviceLink::detached();
        assert!(!link.release(|_| unreachable!()));
        assert!(link.is_released());
        assert!(!link.release(|_| unreachable!()));
    }
}
