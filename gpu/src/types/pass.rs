//! Render and compute pass target and binding descriptors.

use super::{
    BufferUsage, Color, LoadOp, SampleCount, StoreOp, TextureFormat, TextureType, TextureUsage,
};
use crate::handle::{BufferHandle, SamplerHandle, TextureHandle};
use crate::resources::{Buffer, Sampler, Texture};
use crate::swapchain::{SwapchainTexture, WindowId};

/// A texture used as a render pass attachment.
///
/// Carries the properties pass validation needs so a pass can be checked when
/// it begins, before anything reaches the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTarget {
    pub texture: TextureHandle,
    pub texture_type: TextureType,
    pub format: TextureFormat,
    pub usage: TextureUsage,
    pub width: u32,
    pub height: u32,
    pub layer_count_or_depth: u32,
    pub num_levels: u32,
    pub sample_count: SampleCount,
    /// Set for swapchain images.
    pub window: Option<WindowId>,
}

impl RenderTarget {
    /// Width and height of a mip level.
    pub fn level_size(&self, level: u32) -> (u32, u32) {
        ((self.width >> level).max(1), (self.height >> level).max(1))
    }
}

impl From<&Texture> for RenderTarget {
    fn from(texture: &Texture) -> Self {
        let desc = texture.descriptor();
        Self {
            texture: texture.handle(),
            texture_type: desc.texture_type,
            format: desc.format,
            usage: desc.usage,
            width: desc.width,
            height: desc.height,
            layer_count_or_depth: desc.layer_count_or_depth,
            num_levels: desc.num_levels,
            sample_count: desc.sample_count,
            window: None,
        }
    }
}

impl From<&SwapchainTexture> for RenderTarget {
    fn from(frame: &SwapchainTexture) -> Self {
        Self {
            texture: frame.texture,
            texture_type: TextureType::TwoD,
            format: frame.format,
            usage: TextureUsage::COLOR_TARGET,
            width: frame.width,
            height: frame.height,
            layer_count_or_depth: 1,
            num_levels: 1,
            sample_count: SampleCount::One,
            window: Some(frame.window),
        }
    }
}

/// A color attachment of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorTargetInfo {
    pub target: RenderTarget,
    pub mip_level: u32,
    pub layer_or_depth_plane: u32,
    pub clear_color: Color,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    /// Single-sample texture receiving the resolve of a multisampled target.
    pub resolve_target: Option<RenderTarget>,
    pub resolve_mip_level: u32,
    pub resolve_layer: u32,
    /// Cycle the target if it is still in use by earlier submissions.
    pub cycle: bool,
    pub cycle_resolve_texture: bool,
}

impl ColorTargetInfo {
    /// Load and store mip level 0, layer 0 of the target.
    pub fn new(target: impl Into<RenderTarget>) -> Self {
        Self {
            target: target.into(),
            mip_level: 0,
            layer_or_depth_plane: 0,
            clear_color: Color::TRANSPARENT,
            load_op: LoadOp::Load,
            store_op: StoreOp::Store,
            resolve_target: None,
            resolve_mip_level: 0,
            resolve_layer: 0,
            cycle: false,
            cycle_resolve_texture: false,
        }
    }

    /// Clear the target to `color` when the pass begins.
    pub fn with_clear(mut self, color: Color) -> Self {
        self.load_op = LoadOp::Clear;
        self.clear_color = color;
        self
    }

    pub fn with_store_op(mut self, store_op: StoreOp) -> Self {
        self.store_op = store_op;
        self
    }

    /// Resolve into `resolve_target` when the pass ends.
    pub fn with_resolve(mut self, resolve_target: impl Into<RenderTarget>) -> Self {
        self.resolve_target = Some(resolve_target.into());
        self.store_op = StoreOp::Resolve;
        self
    }

    pub fn with_subresource(mut self, mip_level: u32, layer_or_depth_plane: u32) -> Self {
        self.mip_level = mip_level;
        self.layer_or_depth_plane = layer_or_depth_plane;
        self
    }

    pub fn with_cycle(mut self, cycle: bool) -> Self {
        self.cycle = cycle;
        self
    }
}

/// The depth/stencil attachment of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStencilTargetInfo {
    pub target: RenderTarget,
    pub clear_depth: f32,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    pub clear_stencil: u8,
    pub cycle: bool,
}

impl DepthStencilTargetInfo {
    /// Clear depth to 1.0 and stencil to 0, keep the results.
    pub fn new(target: impl Into<RenderTarget>) -> Self {
        Self {
            target: target.into(),
            clear_depth: 1.0,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
            stencil_load_op: LoadOp::Clear,
            stencil_store_op: StoreOp::Store,
            clear_stencil: 0,
            cycle: false,
        }
    }

    pub fn with_clear_depth(mut self, depth: f32) -> Self {
        self.load_op = LoadOp::Clear;
        self.clear_depth = depth;
        self
    }

    pub fn with_load_op(mut self, load_op: LoadOp) -> Self {
        self.load_op = load_op;
        self
    }
}

/// A texture and sampler bound together for shader sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureSamplerBinding {
    pub texture: TextureHandle,
    pub sampler: SamplerHandle,
}

impl TextureSamplerBinding {
    pub fn new(texture: &Texture, sampler: &Sampler) -> Self {
        Self {
            texture: texture.handle(),
            sampler: sampler.handle(),
        }
    }
}

/// A texture subresource written by a compute pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageTextureReadWriteBinding {
    pub texture: TextureHandle,
    pub usage: TextureUsage,
    pub mip_level: u32,
    pub layer: u32,
    pub cycle: bool,
}

impl StorageTextureReadWriteBinding {
    pub fn new(texture: &Texture, mip_level: u32, layer: u32) -> Self {
        Self {
            texture: texture.handle(),
            usage: texture.usage(),
            mip_level,
            layer,
            cycle: false,
        }
    }
}

/// A buffer written by a compute pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageBufferReadWriteBinding {
    pub buffer: BufferHandle,
    pub usage: BufferUsage,
    pub cycle: bool,
}

impl StorageBufferReadWriteBinding {
    pub fn new(buffer: &Buffer) -> Self {
        Self {
            buffer: buffer.handle(),
            usage: buffer.usage(),
            cycle: false,
        }
    }
}
