//! GPU texture resource.

use super::DeviceLink;
use crate::handle::TextureHandle;
use crate::types::{SampleCount, TextureDescriptor, TextureFormat, TextureType, TextureUsage};

/// A GPU texture.
///
/// Textures are created by [`GpuDevice::create_texture`](crate::GpuDevice::create_texture).
/// Swapchain images are not `Texture`s; they are borrowed per command buffer
/// as [`SwapchainTexture`](crate::SwapchainTexture).
///
/// # Example
///
/// ```ignore
/// let texture = device.create_texture(&TextureDescriptor::new_2d(
///     1920,
///     1080,
///     TextureFormat::Rgba8Unorm,
///     TextureUsage::SAMPLER | TextureUsage::COLOR_TARGET,
/// ))?;
/// ```
pub struct Texture {
    link: DeviceLink,
    handle: TextureHandle,
    descriptor: TextureDescriptor,
}

impl Texture {
    pub(crate) fn new(
        link: DeviceLink,
        handle: TextureHandle,
        descriptor: TextureDescriptor,
    ) -> Self {
        Self {
            link,
            handle,
            descriptor,
        }
    }

    /// Non-owning handle. Stale once the texture is released.
    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    pub fn texture_type(&self) -> TextureType {
        self.descriptor.texture_type
    }

    pub fn width(&self) -> u32 {
        self.descriptor.width
    }

    pub fn height(&self) -> u32 {
        self.descriptor.height
    }

    /// Layer count, or depth for 3D textures.
    pub fn layer_count_or_depth(&self) -> u32 {
        self.descriptor.layer_count_or_depth
    }

    pub fn num_levels(&self) -> u32 {
        self.descriptor.num_levels
    }

    pub fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    pub fn usage(&self) -> TextureUsage {
        self.descriptor.usage
    }

    pub fn sample_count(&self) -> SampleCount {
        self.descriptor.sample_count
    }

    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    /// Set the debug name shown by graphics debuggers.
    pub fn set_name(&mut self, name: &str) {
        self.descriptor.label = Some(name.to_owned());
        if let Some(device) = self.link.device() {
            device.backend().set_texture_name(self.handle, name);
        }
    }

    pub fn is_released(&self) -> bool {
        self.link.is_released()
    }

    /// Release the texture. Further calls do nothing.
    pub fn release(&mut self) {
        let handle = self.handle;
        if self.link.release(|backend| backend.release_texture(handle)) {
            log::trace!("Texture: released {:?} {handle:?}", self.descriptor.label);
        }
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("handle", &self.handle)
            .field("type", &self.descriptor.texture_type)
            .field("size", &(self.descriptor.width, self.descriptor.height, self.descriptor.layer_count_or_depth))
            .field("format", &self.descriptor.format)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

static_assertions::assert_impl_all!(Texture: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::RawHandle;

    #[test]
    fn test_texture_accessors() {
        let desc = TextureDescriptor::new_2d(256, 128, TextureFormat::Rgba8Unorm, TextureUsage::SAMPLER)
            .with_mip_levels(3);
        let texture = Texture::new(
            DeviceLink::detached(),
            TextureHandle::from_raw(RawHandle::new(1, 0)),
            desc,
        );
        assert_eq!(texture.width(), 256);
        assert_eq!(texture.height(), 128);
        assert_eq!(texture.num_levels(), 3);
        assert_eq!(texture.layer_count_or_depth(), 1);
        assert_eq!(texture.format(), TextureFormat::Rgba8Unorm);
        assert!(format!("{texture:?}").contains("256"));
    }
}
