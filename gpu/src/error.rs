//! GPU error types.

use std::fmt;

/// Errors returned by fallible GPU operations.
///
/// Every failing call reports its own error value; there is no side channel
/// holding a "last error" for the current thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuError {
    /// Failed to create the device or backend.
    InitializationFailed(String),
    /// Failed to create a resource.
    ResourceCreationFailed(String),
    /// A requested feature is not supported.
    FeatureNotSupported(String),
    /// An invalid parameter was provided.
    InvalidParameter(String),
    /// The operation is not valid in the object's current state.
    InvalidState(String),
    /// Out of GPU memory.
    OutOfMemory,
    /// A fixed-size pool (command buffers, handles) is exhausted.
    ResourceExhausted(String),
    /// The GPU device was lost.
    DeviceLost,
    /// The device has already been destroyed.
    DeviceDestroyed,
    /// The window has not been claimed by this device.
    WindowNotClaimed,
    /// The swapchain is out of date and was recreated; retry the acquire.
    SwapchainOutOfDate,
    /// An internal error occurred.
    Internal(String),
}

impl GpuError {
    /// Whether swapchain-dependent state must be rebuilt before retrying.
    pub fn requires_swapchain_recreation(&self) -> bool {
        matches!(self, Self::SwapchainOutOfDate)
    }

    /// Whether the device is unusable after this error.
    pub fn is_device_lost(&self) -> bool {
        matches!(self, Self::DeviceLost | Self::DeviceDestroyed)
    }
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitializationFailed(msg) => write!(f, "initialization failed: {msg}"),
            Self::ResourceCreationFailed(msg) => write!(f, "resource creation failed: {msg}"),
            Self::FeatureNotSupported(msg) => write!(f, "feature not supported: {msg}"),
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
            Self::InvalidState(msg) => write!(f, "invalid state: {msg}"),
            Self::OutOfMemory => write!(f, "out of GPU memory"),
            Self::ResourceExhausted(msg) => write!(f, "resources exhausted: {msg}"),
            Self::DeviceLost => write!(f, "GPU device lost"),
            Self::DeviceDestroyed => write!(f, "GPU device already destroyed"),
            Self::WindowNotClaimed => write!(f, "window is not claimed by this device"),
            Self::SwapchainOutOfDate => write!(f, "swapchain out of date, needs recreation"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for GpuError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GpuError::OutOfMemory;
        assert_eq!(err.to_string(), "out of GPU memory");

        let err = GpuError::InitializationFailed("no driver named vulkan".to_string());
        assert_eq!(
            err.to_string(),
            "initialization failed: no driver named vulkan"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(GpuError::SwapchainOutOfDate.requires_swapchain_recreation());
        assert!(!GpuError::WindowNotClaimed.requires_swapchain_recreation());
        assert!(GpuError::DeviceDestroyed.is_device_lost());
        assert!(!GpuError::OutOfMemory.is_device_lost());
    }
}
