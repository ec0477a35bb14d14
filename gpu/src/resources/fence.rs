//! Submission fences.

use super::DeviceLink;
use crate::error::GpuError;
use crate::handle::FenceHandle;

/// Signalled when the submission that produced it has finished executing.
///
/// Returned by [`CommandBuffer::submit_and_acquire_fence`](crate::CommandBuffer::submit_and_acquire_fence).
/// Fences hold a backend slot until released, so release them once waited on.
pub struct Fence {
    link: DeviceLink,
    handle: FenceHandle,
}

impl Fence {
    pub(crate) fn new(link: DeviceLink, handle: FenceHandle) -> Self {
        Self { link, handle }
    }

    pub fn handle(&self) -> FenceHandle {
        self.handle
    }

    /// Whether the submission has completed.
    ///
    /// A released fence, or one whose device was destroyed, reports `true`.
    pub fn query(&self) -> bool {
        match self.link.device() {
            Some(device) => device.backend().query_fence(self.handle),
            None => true,
        }
    }

    /// Block until the submission has completed.
    pub fn wait(&self) -> Result<(), GpuError> {
        lumen_core::profile_function!();
        match self.link.device() {
            Some(device) => device.backend().wait_for_fences(&[self.handle], true),
            None => Ok(()),
        }
    }

    pub fn is_released(&self) -> bool {
        self.link.is_released()
    }

    /// Release the fence. Further calls do nothing.
    pub fn release(&mut self) {
        let handle = self.handle;
        self.link.release(|backend| backend.release_fence(handle));
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Fence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fence")
            .field("handle", &self.handle)
            .field("released", &self.link.is_released())
            .finish()
    }
}

static_assertions::assert_impl_all!(Fence: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::RawHandle;

    #[test]
    fn test_released_fence_is_signaled() {
        let mut fence = Fence::new(DeviceLink::detached(), FenceHandle::from_raw(RawHandle::new(0, 0)));
        fence.release();
        assert!(fence.query());
        assert!(fence.wait().is_ok());
    }
}
