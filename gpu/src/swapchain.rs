//! Presentation surfaces and swapchain types.
//!
//! Windows are owned by the windowing system; the GPU layer only sees an
//! opaque [`WindowId`]. A window must be claimed by a device
//! ([`GpuDevice::claim_window`](crate::GpuDevice::claim_window)) before a command
//! buffer can acquire its swapchain textures.
//!
//! # Example
//!
//! ```ignore
//! device.claim_window(window)?;
//! device.set_swapchain_parameters(window, SwapchainComposition::Sdr, PresentMode::Vsync)?;
//!
//! // In render loop:
//! let mut cmd = device.acquire_command_buffer()?;
//! if let Some(frame) = cmd.wait_and_acquire_swapchain_texture(window)? {
//!     let target = ColorTargetInfo::new(&frame).with_clear(Color::BLACK);
//!     let pass = cmd.begin_render_pass(&[target], None)?;
//!     // ... draw ...
//!     pass.end();
//! }
//! cmd.submit()?;
//! ```

use std::num::NonZeroU64;

use crate::handle::TextureHandle;
use crate::types::TextureFormat;

/// Opaque identifier of a presentation surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(NonZeroU64);

impl WindowId {
    /// Wrap a windowing-system identifier. Returns `None` for zero.
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    /// The windowing-system identifier.
    pub fn raw(&self) -> u64 {
        self.0.get()
    }
}

/// Color space and encoding of presented images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SwapchainComposition {
    /// 8-bit sRGB-encoded (non-linear) values.
    #[default]
    Sdr,
    /// 8-bit values written in linear space and sRGB-encoded on store.
    SdrLinear,
    /// 16-bit float extended linear sRGB.
    HdrExtendedLinear,
    /// 10-bit HDR10 with ST.2084 transfer.
    Hdr10St2084,
}

/// Presentation mode for the swapchain.
///
/// Controls how frames are synchronized with the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PresentMode {
    /// VSync enabled. No tearing, but may have higher latency.
    #[default]
    Vsync,
    /// No synchronization. May cause tearing but has lowest latency.
    Immediate,
    /// Replace the queued image instead of waiting. Low latency without tearing.
    Mailbox,
}

/// A swapchain image acquired by a command buffer.
///
/// Valid as a render target only within the command buffer that acquired it;
/// it is presented when that command buffer is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwapchainTexture {
    pub window: WindowId,
    pub texture: TextureHandle,
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_id_rejects_zero() {
        assert!(WindowId::from_raw(0).is_none());
        assert_eq!(WindowId::from_raw(42).map(|w| w.raw()), Some(42));
    }
}
