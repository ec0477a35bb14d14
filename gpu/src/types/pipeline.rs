//! Graphics and compute pipeline descriptors.

use bitflags::bitflags;

use super::{SampleCount, ShaderFormat, TextureFormat};
use crate::handle::ShaderHandle;
use crate::resources::Shader;
use lumen_core::sampler::CompareFunction;

// ============================================================================
// Vertex input
// ============================================================================

/// Format of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexElementFormat {
    /// Single 32-bit float.
    Float,
    /// Two 32-bit floats.
    Float2,
    /// Three 32-bit floats.
    Float3,
    /// Four 32-bit floats.
    Float4,
    /// Single 32-bit signed integer.
    Int,
    /// Two 32-bit signed integers.
    Int2,
    /// Three 32-bit signed integers.
    Int3,
    /// Four 32-bit signed integers.
    Int4,
    /// Single 32-bit unsigned integer.
    Uint,
    /// Two 32-bit unsigned integers.
    Uint2,
    /// Three 32-bit unsigned integers.
    Uint3,
    /// Four 32-bit unsigned integers.
    Uint4,
    /// Four 8-bit unsigned integers (normalized to 0.0-1.0).
    Unorm8x4,
    /// Four 8-bit signed integers (normalized to -1.0-1.0).
    Snorm8x4,
}

impl VertexElementFormat {
    /// Size in bytes of this format.
    pub fn size(&self) -> u32 {
        match self {
            Self::Float | Self::Int | Self::Uint => 4,
            Self::Float2 | Self::Int2 | Self::Uint2 => 8,
            Self::Float3 | Self::Int3 | Self::Uint3 => 12,
            Self::Float4 | Self::Int4 | Self::Uint4 => 16,
            Self::Unorm8x4 | Self::Snorm8x4 => 4,
        }
    }
}

/// How a vertex buffer advances: per-vertex or per-instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexInputRate {
    #[default]
    Vertex,
    Instance,
}

/// Describes one vertex buffer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexBufferDescription {
    /// Binding slot the buffer is bound to.
    pub slot: u32,
    /// Stride in bytes between consecutive elements.
    pub pitch: u32,
    pub input_rate: VertexInputRate,
}

impl VertexBufferDescription {
    pub fn new(slot: u32, pitch: u32) -> Self {
        Self {
            slot,
            pitch,
            input_rate: VertexInputRate::Vertex,
        }
    }

    /// Create a per-instance buffer description.
    pub fn per_instance(slot: u32, pitch: u32) -> Self {
        Self {
            input_rate: VertexInputRate::Instance,
            ..Self::new(slot, pitch)
        }
    }
}

/// A single vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Shader input location.
    pub location: u32,
    /// Slot of the vertex buffer this attribute reads from.
    pub buffer_slot: u32,
    pub format: VertexElementFormat,
    /// Byte offset within a vertex.
    pub offset: u32,
}

impl VertexAttribute {
    pub fn new(location: u32, buffer_slot: u32, format: VertexElementFormat, offset: u32) -> Self {
        Self {
            location,
            buffer_slot,
            format,
            offset,
        }
    }
}

/// Vertex buffers and attributes consumed by a graphics pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VertexInputState {
    pub buffers: Vec<VertexBufferDescription>,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexInputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buffer(mut self, buffer: VertexBufferDescription) -> Self {
        self.buffers.push(buffer);
        self
    }

    pub fn with_attribute(mut self, attribute: VertexAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Number of vertex buffer slots that must be bound to draw.
    pub fn required_buffer_slots(&self) -> u32 {
        self.buffers.iter().map(|b| b.slot + 1).max().unwrap_or(0)
    }
}

// ============================================================================
// Rasterizer / multisample / depth-stencil
// ============================================================================

/// Primitive topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveType {
    #[default]
    TriangleList,
    TriangleStrip,
    LineList,
    LineStrip,
    PointList,
}

/// Polygon fill mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FillMode {
    #[default]
    Fill,
    Line,
}

/// Face culling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    #[default]
    None,
    Front,
    Back,
}

/// Winding order of front-facing triangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    #[default]
    CounterClockwise,
    Clockwise,
}

/// Rasterizer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RasterizerState {
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub depth_bias_constant_factor: f32,
    pub depth_bias_clamp: f32,
    pub depth_bias_slope_factor: f32,
    pub enable_depth_bias: bool,
    pub enable_depth_clip: bool,
}

/// Multisample configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MultisampleState {
    pub sample_count: SampleCount,
    pub sample_mask: u32,
    pub enable_mask: bool,
}

/// Operation applied to the stencil buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOp {
    #[default]
    Keep,
    Zero,
    Replace,
    IncrementAndClamp,
    DecrementAndClamp,
    Invert,
    IncrementAndWrap,
    DecrementAndWrap,
}

/// Stencil behaviour for one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StencilOpState {
    pub fail_op: StencilOp,
    pub pass_op: StencilOp,
    pub depth_fail_op: StencilOp,
    pub compare_op: CompareFunction,
}

/// Depth and stencil test configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DepthStencilState {
    pub compare_op: CompareFunction,
    pub back_stencil_state: StencilOpState,
    pub front_stencil_state: StencilOpState,
    pub compare_mask: u8,
    pub write_mask: u8,
    pub enable_depth_test: bool,
    pub enable_depth_write: bool,
    pub enable_stencil_test: bool,
}

impl DepthStencilState {
    /// Standard less-than depth test with writes enabled.
    pub fn depth_less() -> Self {
        Self {
            compare_op: CompareFunction::Less,
            enable_depth_test: true,
            enable_depth_write: true,
            ..Default::default()
        }
    }
}

// ============================================================================
// Blending
// ============================================================================

/// Blend factor for blending operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendFactor {
    /// 0.0
    #[default]
    Zero,
    /// 1.0
    One,
    /// Source color
    SrcColor,
    /// 1 - source color
    OneMinusSrcColor,
    /// Destination color
    DstColor,
    /// 1 - destination color
    OneMinusDstColor,
    /// Source alpha
    SrcAlpha,
    /// 1 - source alpha
    OneMinusSrcAlpha,
    /// Destination alpha
    DstAlpha,
    /// 1 - destination alpha
    OneMinusDstAlpha,
    /// Blend constant
    ConstantColor,
    /// 1 - blend constant
    OneMinusConstantColor,
    /// min(source alpha, 1 - destination alpha)
    SrcAlphaSaturate,
}

/// Blend operation for combining colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendOp {
    /// source + destination
    #[default]
    Add,
    /// source - destination
    Subtract,
    /// destination - source
    ReverseSubtract,
    /// min(source, destination)
    Min,
    /// max(source, destination)
    Max,
}

bitflags! {
    /// Color channels written by a color target.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorComponents: u8 {
        const R = 1 << 0;
        const G = 1 << 1;
        const B = 1 << 2;
        const A = 1 << 3;
    }
}

impl Default for ColorComponents {
    fn default() -> Self {
        Self::all()
    }
}

/// Blend configuration of one color target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorTargetBlendState {
    pub src_color_blendfactor: BlendFactor,
    pub dst_color_blendfactor: BlendFactor,
    pub color_blend_op: BlendOp,
    pub src_alpha_blendfactor: BlendFactor,
    pub dst_alpha_blendfactor: BlendFactor,
    pub alpha_blend_op: BlendOp,
    pub color_write_mask: ColorComponents,
    pub enable_blend: bool,
}

impl Default for ColorTargetBlendState {
    fn default() -> Self {
        Self {
            src_color_blendfactor: BlendFactor::One,
            dst_color_blendfactor: BlendFactor::Zero,
            color_blend_op: BlendOp::Add,
            src_alpha_blendfactor: BlendFactor::One,
            dst_alpha_blendfactor: BlendFactor::Zero,
            alpha_blend_op: BlendOp::Add,
            color_write_mask: ColorComponents::all(),
            enable_blend: false,
        }
    }
}

impl ColorTargetBlendState {
    /// Standard alpha blending (src over dst).
    pub fn alpha_blending() -> Self {
        Self {
            src_color_blendfactor: BlendFactor::SrcAlpha,
            dst_color_blendfactor: BlendFactor::OneMinusSrcAlpha,
            src_alpha_blendfactor: BlendFactor::SrcAlpha,
            dst_alpha_blendfactor: BlendFactor::OneMinusSrcAlpha,
            enable_blend: true,
            ..Default::default()
        }
    }

    /// Premultiplied alpha blending.
    pub fn premultiplied_alpha() -> Self {
        Self {
            src_color_blendfactor: BlendFactor::One,
            dst_color_blendfactor: BlendFactor::OneMinusSrcAlpha,
            src_alpha_blendfactor: BlendFactor::One,
            dst_alpha_blendfactor: BlendFactor::OneMinusSrcAlpha,
            enable_blend: true,
            ..Default::default()
        }
    }
}

/// Format and blending of one color target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorTargetDescription {
    pub format: TextureFormat,
    pub blend_state: ColorTargetBlendState,
}

impl ColorTargetDescription {
    pub fn new(format: TextureFormat) -> Self {
        Self {
            format,
            blend_state: ColorTargetBlendState::default(),
        }
    }

    pub fn with_blend(mut self, blend_state: ColorTargetBlendState) -> Self {
        self.blend_state = blend_state;
        self
    }
}

/// Render target formats a graphics pipeline is compatible with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct GraphicsPipelineTargetInfo {
    pub color_target_descriptions: Vec<ColorTargetDescription>,
    pub depth_stencil_format: Option<TextureFormat>,
}

// ============================================================================
// Pipelines
// ============================================================================

/// Descriptor for creating a graphics pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsPipelineDescriptor {
    pub label: Option<String>,
    pub vertex_shader: ShaderHandle,
    pub fragment_shader: ShaderHandle,
    pub vertex_input_state: VertexInputState,
    pub primitive_type: PrimitiveType,
    pub rasterizer_state: RasterizerState,
    pub multisample_state: MultisampleState,
    pub depth_stencil_state: DepthStencilState,
    pub target_info: GraphicsPipelineTargetInfo,
}

impl GraphicsPipelineDescriptor {
    /// Pipeline with default fixed-function state and no targets.
    pub fn new(vertex_shader: &Shader, fragment_shader: &Shader) -> Self {
        Self {
            label: None,
            vertex_shader: vertex_shader.handle(),
            fragment_shader: fragment_shader.handle(),
            vertex_input_state: VertexInputState::default(),
            primitive_type: PrimitiveType::TriangleList,
            rasterizer_state: RasterizerState::default(),
            multisample_state: MultisampleState::default(),
            depth_stencil_state: DepthStencilState::default(),
            target_info: GraphicsPipelineTargetInfo::default(),
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_vertex_input(mut self, state: VertexInputState) -> Self {
        self.vertex_input_state = state;
        self
    }

    pub fn with_primitive_type(mut self, primitive_type: PrimitiveType) -> Self {
        self.primitive_type = primitive_type;
        self
    }

    pub fn with_color_target(mut self, target: ColorTargetDescription) -> Self {
        self.target_info.color_target_descriptions.push(target);
        self
    }

    pub fn with_depth_stencil(mut self, format: TextureFormat, state: DepthStencilState) -> Self {
        self.target_info.depth_stencil_format = Some(format);
        self.depth_stencil_state = state;
        self
    }

    pub fn with_sample_count(mut self, sample_count: SampleCount) -> Self {
        self.multisample_state.sample_count = sample_count;
        self
    }
}

/// Descriptor for creating a compute pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComputePipelineDescriptor {
    pub label: Option<String>,
    pub code: Vec<u8>,
    pub entry_point: String,
    /// Exactly one format bit.
    pub format: ShaderFormat,
    pub num_samplers: u32,
    pub num_readonly_storage_textures: u32,
    pub num_readonly_storage_buffers: u32,
    pub num_readwrite_storage_textures: u32,
    pub num_readwrite_storage_buffers: u32,
    pub num_uniform_buffers: u32,
    pub threadcount_x: u32,
    pub threadcount_y: u32,
    pub threadcount_z: u32,
}

impl ComputePipelineDescriptor {
    pub fn new(format: ShaderFormat, code: impl Into<Vec<u8>>, entry_point: impl Into<String>) -> Self {
        Self {
            label: None,
            code: code.into(),
            entry_point: entry_point.into(),
            format,
            num_samplers: 0,
            num_readonly_storage_textures: 0,
            num_readonly_storage_buffers: 0,
            num_readwrite_storage_textures: 0,
            num_readwrite_storage_buffers: 0,
            num_uniform_buffers: 0,
            threadcount_x: 1,
            threadcount_y: 1,
            threadcount_z: 1,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_threadcount(mut self, x: u32, y: u32, z: u32) -> Self {
        self.threadcount_x = x;
        self.threadcount_y = y;
        self.threadcount_z = z;
        self
    }

    pub fn with_readwrite_storage(mut self, textures: u32, buffers: u32) -> Self {
        self.num_readwrite_storage_textures = textures;
        self.num_readwrite_storage_buffers = buffers;
        self
    }

    pub fn with_readonly_storage(mut self, textures: u32, buffers: u32) -> Self {
        self.num_readonly_storage_textures = textures;
        self.num_readonly_storage_buffers = buffers;
        self
    }

    pub fn with_samplers(mut self, count: u32) -> Self {
        self.num_samplers = count;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_buffer_slots() {
        let state = VertexInputState::new()
            .with_buffer(VertexBufferDescription::new(0, 12))
            .with_buffer(VertexBufferDescription::per_instance(2, 16));
        assert_eq!(state.required_buffer_slots(), 3);
        assert_eq!(VertexInputState::new().required_buffer_slots(), 0);
    }

    #[test]
    fn test_vertex_format_sizes() {
        assert_eq!(VertexElementFormat::Float3.size(), 12);
        assert_eq!(VertexElementFormat::Unorm8x4.size(), 4);
    }
}
