//! Texture types and descriptors.

use bitflags::bitflags;

use super::{Color, FlipMode, LoadOp};
use crate::handle::TextureHandle;
use crate::resources::Texture;
use lumen_core::sampler::FilterMode;

/// Texture format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum TextureFormat {
    // 8-bit formats
    /// 8-bit red channel, unsigned normalized.
    R8Unorm,
    /// 8-bit red channel, signed normalized.
    R8Snorm,
    /// 8-bit red channel, unsigned integer.
    R8Uint,
    /// 8-bit red channel, signed integer.
    R8Sint,

    // 16-bit formats
    /// 16-bit red channel, unsigned normalized.
    R16Unorm,
    /// 16-bit red channel, float.
    R16Float,
    /// 8-bit RG channels, unsigned normalized.
    Rg8Unorm,

    // 32-bit formats
    /// 32-bit red channel, float.
    R32Float,
    /// 32-bit red channel, unsigned integer.
    R32Uint,
    /// 16-bit RG channels, float.
    Rg16Float,
    /// 8-bit RGBA channels, unsigned normalized.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA channels, sRGB.
    Rgba8UnormSrgb,
    /// 8-bit BGRA channels, unsigned normalized.
    Bgra8Unorm,
    /// 8-bit BGRA channels, sRGB.
    Bgra8UnormSrgb,

    // 64-bit formats
    /// 16-bit RGBA channels, float.
    Rgba16Float,
    /// 32-bit RG channels, float.
    Rg32Float,

    // 128-bit formats
    /// 32-bit RGBA channels, float.
    Rgba32Float,

    // Depth/stencil formats
    /// 16-bit depth.
    Depth16Unorm,
    /// 24-bit depth.
    Depth24Unorm,
    /// 24-bit depth with 8-bit stencil.
    Depth24UnormStencil8,
    /// 32-bit depth, float.
    Depth32Float,
    /// 32-bit depth float with 8-bit stencil.
    Depth32FloatStencil8,
}

impl TextureFormat {
    /// Returns true if this is a depth or stencil format.
    pub fn is_depth_stencil(&self) -> bool {
        matches!(
            self,
            Self::Depth16Unorm
                | Self::Depth24Unorm
                | Self::Depth24UnormStencil8
                | Self::Depth32Float
                | Self::Depth32FloatStencil8
        )
    }

    /// Returns true if this format has a stencil component.
    pub fn has_stencil(&self) -> bool {
        matches!(self, Self::Depth24UnormStencil8 | Self::Depth32FloatStencil8)
    }

    /// Returns true for sRGB-encoded color formats.
    pub fn is_srgb(&self) -> bool {
        matches!(self, Self::Rgba8UnormSrgb | Self::Bgra8UnormSrgb)
    }

    /// Returns the size in bytes per pixel/block.
    pub fn block_size(&self) -> u32 {
        match self {
            Self::R8Unorm | Self::R8Snorm | Self::R8Uint | Self::R8Sint => 1,
            Self::R16Unorm | Self::R16Float | Self::Rg8Unorm | Self::Depth16Unorm => 2,
            Self::R32Float
            | Self::R32Uint
            | Self::Rg16Float
            | Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Bgra8UnormSrgb
            | Self::Depth24Unorm
            | Self::Depth24UnormStencil8
            | Self::Depth32Float => 4,
            Self::Rgba16Float | Self::Rg32Float | Self::Depth32FloatStencil8 => 8,
            Self::Rgba32Float => 16,
        }
    }

    /// Bytes needed for a tightly packed `width x height x depth` region.
    pub fn calculate_size(&self, width: u32, height: u32, depth: u32) -> u64 {
        self.block_size() as u64 * width as u64 * height as u64 * depth as u64
    }
}

/// Dimensionality of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureType {
    #[default]
    TwoD,
    TwoDArray,
    ThreeD,
    Cube,
    CubeArray,
}

impl TextureType {
    /// Whether `layer_count_or_depth` is a depth (3D) rather than a layer count.
    pub fn is_volume(&self) -> bool {
        matches!(self, Self::ThreeD)
    }
}

bitflags! {
    /// Usage flags for textures.
    ///
    /// Every texture can be the source or destination of copy pass operations.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Texture can be sampled in a shader.
        const SAMPLER = 1 << 0;
        /// Texture can be a color target of a render pass.
        const COLOR_TARGET = 1 << 1;
        /// Texture can be the depth/stencil target of a render pass.
        const DEPTH_STENCIL_TARGET = 1 << 2;
        /// Texture can be read by graphics shaders as a storage texture.
        const GRAPHICS_STORAGE_READ = 1 << 3;
        /// Texture can be read by compute shaders as a storage texture.
        const COMPUTE_STORAGE_READ = 1 << 4;
        /// Texture can be written by compute shaders.
        const COMPUTE_STORAGE_WRITE = 1 << 5;
        /// Texture can be read and written by the same compute shader.
        const COMPUTE_STORAGE_SIMULTANEOUS_READ_WRITE = 1 << 6;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Multisample count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleCount {
    #[default]
    One,
    Two,
    Four,
    Eight,
}

impl SampleCount {
    pub fn count(&self) -> u32 {
        match self {
            Self::One => 1,
            Self::Two => 2,
            Self::Four => 4,
            Self::Eight => 8,
        }
    }

    pub fn is_multisampled(&self) -> bool {
        *self != Self::One
    }
}

/// Descriptor for creating a texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Debug label for the texture.
    pub label: Option<String>,
    pub texture_type: TextureType,
    pub format: TextureFormat,
    pub usage: TextureUsage,
    pub width: u32,
    pub height: u32,
    /// Array layer count, or depth for 3D textures. Cube textures use 6 per cube.
    pub layer_count_or_depth: u32,
    /// Mip level count.
    pub num_levels: u32,
    pub sample_count: SampleCount,
}

impl TextureDescriptor {
    /// Create a new 2D texture descriptor.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            label: None,
            texture_type: TextureType::TwoD,
            format,
            usage,
            width,
            height,
            layer_count_or_depth: 1,
            num_levels: 1,
            sample_count: SampleCount::One,
        }
    }

    /// Create a new 2D array texture descriptor.
    pub fn new_2d_array(
        width: u32,
        height: u32,
        layers: u32,
        format: TextureFormat,
        usage: TextureUsage,
    ) -> Self {
        Self {
            texture_type: TextureType::TwoDArray,
            layer_count_or_depth: layers,
            ..Self::new_2d(width, height, format, usage)
        }
    }

    /// Create a new 3D texture descriptor.
    pub fn new_3d(
        width: u32,
        height: u32,
        depth: u32,
        format: TextureFormat,
        usage: TextureUsage,
    ) -> Self {
        Self {
            texture_type: TextureType::ThreeD,
            layer_count_or_depth: depth,
            ..Self::new_2d(width, height, format, usage)
        }
    }

    /// Create a new cube texture descriptor.
    pub fn new_cube(size: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            texture_type: TextureType::Cube,
            layer_count_or_depth: 6,
            ..Self::new_2d(size, size, format, usage)
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the mip level count.
    pub fn with_mip_levels(mut self, count: u32) -> Self {
        self.num_levels = count;
        self
    }

    /// Set the sample count for multisampling.
    pub fn with_sample_count(mut self, count: SampleCount) -> Self {
        self.sample_count = count;
        self
    }

    /// Number of array layers (1 for 3D textures).
    pub fn array_layers(&self) -> u32 {
        if self.texture_type.is_volume() {
            1
        } else {
            self.layer_count_or_depth
        }
    }

    /// Width, height and depth of a mip level.
    pub fn level_extent(&self, level: u32) -> (u32, u32, u32) {
        let shrink = |v: u32| (v >> level).max(1);
        let depth = if self.texture_type.is_volume() {
            shrink(self.layer_count_or_depth)
        } else {
            1
        };
        (shrink(self.width), shrink(self.height), depth)
    }

    /// Largest mip chain length for the base extent.
    pub fn max_mip_levels(&self) -> u32 {
        let largest = if self.texture_type.is_volume() {
            self.width.max(self.height).max(self.layer_count_or_depth)
        } else {
            self.width.max(self.height)
        };
        32 - largest.max(1).leading_zeros()
    }
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self::new_2d(1, 1, TextureFormat::default(), TextureUsage::empty())
    }
}

/// A box inside one subresource of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureRegion {
    pub texture: TextureHandle,
    pub mip_level: u32,
    pub layer: u32,
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl TextureRegion {
    /// The whole of mip level 0, layer 0.
    pub fn whole(texture: &Texture) -> Self {
        let (width, height, depth) = texture.descriptor().level_extent(0);
        Self {
            texture: texture.handle(),
            mip_level: 0,
            layer: 0,
            x: 0,
            y: 0,
            z: 0,
            width,
            height,
            depth,
        }
    }

    /// The whole of a given mip level and layer.
    pub fn level(texture: &Texture, mip_level: u32, layer: u32) -> Self {
        let (width, height, depth) = texture.descriptor().level_extent(mip_level);
        Self {
            mip_level,
            layer,
            width,
            height,
            depth,
            ..Self::whole(texture)
        }
    }
}

/// A texel position inside one subresource of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureLocation {
    pub texture: TextureHandle,
    pub mip_level: u32,
    pub layer: u32,
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl TextureLocation {
    /// Origin of mip level 0, layer 0.
    pub fn origin(texture: &Texture) -> Self {
        Self {
            texture: texture.handle(),
            mip_level: 0,
            layer: 0,
            x: 0,
            y: 0,
            z: 0,
        }
    }
}

/// A 2D rectangle of one subresource, used by blits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlitRegion {
    pub texture: TextureHandle,
    pub mip_level: u32,
    pub layer_or_depth_plane: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BlitRegion {
    /// The whole of a given mip level and layer.
    pub fn level(texture: &Texture, mip_level: u32, layer_or_depth_plane: u32) -> Self {
        let (width, height, _) = texture.descriptor().level_extent(mip_level);
        Self {
            texture: texture.handle(),
            mip_level,
            layer_or_depth_plane,
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Parameters for a scaled texture copy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlitInfo {
    pub source: BlitRegion,
    pub destination: BlitRegion,
    pub load_op: LoadOp,
    pub clear_color: Color,
    pub flip_mode: FlipMode,
    pub filter: FilterMode,
    pub cycle: bool,
}

impl BlitInfo {
    pub fn new(source: BlitRegion, destination: BlitRegion) -> Self {
        Self {
            source,
            destination,
            load_op: LoadOp::Load,
            clear_color: Color::TRANSPARENT,
            flip_mode: FlipMode::None,
            filter: FilterMode::Nearest,
            cycle: false,
        }
    }

    pub fn with_flip(mut self, flip_mode: FlipMode) -> Self {
        self.flip_mode = flip_mode;
        self
    }

    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_clear(mut self, color: Color) -> Self {
        self.load_op = LoadOp::Clear;
        self.clear_color = color;
        self
    }
}
