//! # Lumen GPU
//!
//! Typed GPU command submission for the Lumen engine.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`GpuDevice`] - Device creation, resource factories, windows and synchronization
//! - [`CommandBuffer`] - Recording and one-shot submission of GPU work
//! - [`RenderPass`], [`ComputePass`], [`CopyPass`] - Scoped pass recording
//! - [`resources`] - Owning buffers, textures, samplers, shaders, pipelines and fences
//! - [`GpuBackend`] - Trait for backend implementations, with [`DummyBackend`]
//!   executing copy work on the CPU
//!
//! ## Example
//!
//! ```
//! use lumen_gpu::{
//!     BufferDescriptor, BufferRegion, BufferUsage, GpuDevice, ShaderFormat,
//!     TransferBufferDescriptor, TransferBufferLocation,
//! };
//!
//! let device = GpuDevice::create(ShaderFormat::SPIRV, false, None)?;
//! let buffer = device.create_buffer(&BufferDescriptor::new(16, BufferUsage::VERTEX))?;
//! let mut upload = device.create_transfer_buffer(&TransferBufferDescriptor::upload(16))?;
//! let mut download = device.create_transfer_buffer(&TransferBufferDescriptor::download(16))?;
//! upload.write(0, &[1.0f32, 2.0, 3.0, 4.0], false)?;
//!
//! let mut cmd = device.acquire_command_buffer()?;
//! {
//!     let mut copy = cmd.begin_copy_pass();
//!     copy.upload_to_buffer(
//!         &TransferBufferLocation::new(&upload, 0),
//!         &BufferRegion::whole(&buffer),
//!         false,
//!     );
//!     copy.download_from_buffer(
//!         &BufferRegion::whole(&buffer),
//!         &TransferBufferLocation::new(&download, 0),
//!     );
//! }
//! cmd.submit_and_acquire_fence()?.wait()?;
//!
//! assert_eq!(download.read::<f32>(0, 4)?, vec![1.0, 2.0, 3.0, 4.0]);
//! # Ok::<(), lumen_gpu::GpuError>(())
//! ```

pub mod backend;
pub mod command_buffer;
pub mod commands;
pub mod device;
pub mod error;
pub mod handle;
pub mod limits;
pub mod pass;
pub mod resources;
pub mod swapchain;
pub mod types;

// Re-export main types for convenience
pub use backend::{
    DummyBackend, DummyConfig, ExecutionStats, GpuBackend, MappedMemory, available_drivers,
    supports_shader_formats,
};
pub use command_buffer::CommandBuffer;
pub use commands::{Command, CommandList, PipelineStage};
pub use device::{DeviceDescriptor, GpuDevice};
pub use error::GpuError;
pub use handle::{
    BufferHandle, CommandBufferHandle, ComputePipelineHandle, FenceHandle,
    GraphicsPipelineHandle, RawHandle, SamplerHandle, ShaderHandle, TextureHandle,
    TransferBufferHandle,
};
pub use pass::{BindingSlots, ComputePass, CopyPass, RenderPass};
pub use resources::{
    Buffer, ComputePipeline, Fence, GraphicsPipeline, Sampler, Shader, Texture, TransferBuffer,
    TransferBufferMapping,
};
pub use swapchain::{PresentMode, SwapchainComposition, SwapchainTexture, WindowId};
pub use types::*;

/// GPU library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_dummy_is_available() {
        assert!(available_drivers().contains(&backend::dummy::DRIVER_NAME));
        assert!(supports_shader_formats(ShaderFormat::SPIRV, None));
    }
}
