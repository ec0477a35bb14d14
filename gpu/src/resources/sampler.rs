//! Texture sampler resource.

use super::DeviceLink;
use crate::handle::SamplerHandle;
use crate::types::SamplerDescriptor;

/// A texture sampler, created by [`GpuDevice::create_sampler`](crate::GpuDevice::create_sampler).
pub struct Sampler {
    link: DeviceLink,
    handle: SamplerHandle,
    descriptor: SamplerDescriptor,
}

impl Sampler {
    pub(crate) fn new(link: DeviceLink, handle: SamplerHandle, descriptor: SamplerDescriptor) -> Self {
        Self {
            link,
            handle,
            descriptor,
        }
    }

    pub fn handle(&self) -> SamplerHandle {
        self.handle
    }

    pub fn descriptor(&self) -> &SamplerDescriptor {
        &self.descriptor
    }

    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    pub fn is_released(&self) -> bool {
        self.link.is_released()
    }

    pub fn release(&mut self) {
        let handle = self.handle;
        if self.link.release(|backend| backend.release_sampler(handle)) {
            log::trace!("Sampler: released {:?} {handle:?}", self.descriptor.label);
        }
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("handle", &self.handle)
            .field("min_filter", &self.descriptor.min_filter)
            .field("mag_filter", &self.descriptor.mag_filter)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

static_assertions::assert_impl_all!(Sampler: Send, Sync);
