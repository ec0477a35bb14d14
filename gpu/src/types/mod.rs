//! Common types and descriptors for GPU resources.
//!
//! This module contains format enums, usage flags, descriptor structs and the
//! plain-data location/region types used by copy passes and bindings.

mod buffer;
mod common;
mod pass;
mod pipeline;
mod sampler;
mod shader;
mod texture;
mod transfer;

pub use buffer::{
    BufferBinding, BufferDescriptor, BufferLocation, BufferRegion, BufferUsage,
    DispatchIndirectArgs, DrawIndexedIndirectArgs, DrawIndirectArgs, IndexElementSize,
};
pub use common::{Color, FlipMode, LoadOp, Rect, StoreOp, Viewport};
pub use pass::{
    ColorTargetInfo, DepthStencilTargetInfo, RenderTarget, StorageBufferReadWriteBinding,
    StorageTextureReadWriteBinding, TextureSamplerBinding,
};
pub use pipeline::{
    BlendFactor, BlendOp, ColorComponents, ColorTargetBlendState, ColorTargetDescription,
    ComputePipelineDescriptor, CullMode, DepthStencilState, FillMode, FrontFace,
    GraphicsPipelineDescriptor, GraphicsPipelineTargetInfo, MultisampleState, PrimitiveType,
    RasterizerState, StencilOp, StencilOpState, VertexAttribute, VertexBufferDescription,
    VertexElementFormat, VertexInputRate, VertexInputState,
};
pub use sampler::{AddressMode, CompareFunction, FilterMode, MipmapMode, SamplerDescriptor};
pub use shader::{ShaderDescriptor, ShaderFormat, ShaderStage};
pub use texture::{
    BlitInfo, BlitRegion, SampleCount, TextureDescriptor, TextureFormat, TextureLocation,
    TextureRegion, TextureType, TextureUsage,
};
pub use transfer::{
    TextureTransferInfo, TransferBufferDescriptor, TransferBufferLocation, TransferBufferUsage,
};
