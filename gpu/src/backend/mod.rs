//! GPU backend abstraction layer.
//!
//! This module provides a trait-based abstraction over the native graphics
//! runtime. The device, command buffers and passes only talk to a
//! [`GpuBackend`]; a backend owns the actual resources and executes submitted
//! [`CommandList`]s.
//!
//! # Available Backends
//!
//! - `dummy`: CPU backend that keeps resource contents in host memory, runs
//!   copy work for real and validates draws and dispatches
//!
//! # Architecture
//!
//! Each backend implements the [`GpuBackend`] trait, which provides:
//! - Resource creation and release through typed handles
//! - Transfer buffer mapping
//! - Window claiming and swapchain configuration
//! - Command buffer acquisition, submission and cancellation
//! - Fences and idle waits

pub mod dummy;

use std::any::Any;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::commands::CommandList;
use crate::device::DeviceDescriptor;
use crate::error::GpuError;
use crate::handle::{
    BufferHandle, CommandBufferHandle, ComputePipelineHandle, FenceHandle,
    GraphicsPipelineHandle, SamplerHandle, ShaderHandle, TextureHandle, TransferBufferHandle,
};
use crate::swapchain::{PresentMode, SwapchainComposition, SwapchainTexture, WindowId};
use crate::types::{
    BufferDescriptor, ComputePipelineDescriptor, GraphicsPipelineDescriptor, SampleCount,
    SamplerDescriptor, ShaderDescriptor, ShaderFormat, TextureDescriptor, TextureFormat,
    TextureType, TextureUsage, TransferBufferDescriptor,
};

pub use dummy::{DummyBackend, DummyConfig, ExecutionStats};

/// Host-visible memory returned by [`GpuBackend::map_transfer_buffer`].
///
/// The pointer stays valid until the transfer buffer is unmapped. A backend
/// may attach an owner that keeps the allocation alive even if the transfer
/// buffer or device goes away first.
pub struct MappedMemory {
    ptr: NonNull<u8>,
    len: usize,
    _owner: Option<Arc<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for MappedMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedMemory")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

// SAFETY: the mapping is exclusively owned by whoever mapped the transfer
// buffer; the backend does not touch the memory until it is unmapped.
unsafe impl Send for MappedMemory {}

impl MappedMemory {
    /// Wrap a mapped region.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `len` bytes until the
    /// transfer buffer it belongs to is unmapped, and nothing else may access
    /// that memory in the meantime.
    pub unsafe fn new(ptr: NonNull<u8>, len: usize) -> Self {
        Self {
            ptr,
            len,
            _owner: None,
        }
    }

    /// Keep `owner` alive for as long as the mapping exists.
    pub fn with_owner(mut self, owner: Arc<dyn Any + Send + Sync>) -> Self {
        self._owner = Some(owner);
        self
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// GPU backend trait for abstracting different graphics runtimes.
///
/// Release functions accept unknown or stale handles and ignore them.
pub trait GpuBackend: Send + Sync + 'static {
    /// Driver name, as accepted by [`create_backend`].
    fn name(&self) -> &'static str;

    /// Shader formats this backend accepts.
    fn shader_formats(&self) -> ShaderFormat;

    // Resources

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferHandle, GpuError>;
    fn release_buffer(&self, buffer: BufferHandle);
    fn set_buffer_name(&self, buffer: BufferHandle, name: &str);

    fn create_transfer_buffer(
        &self,
        descriptor: &TransferBufferDescriptor,
    ) -> Result<TransferBufferHandle, GpuError>;
    fn release_transfer_buffer(&self, transfer_buffer: TransferBufferHandle);

    /// Map a transfer buffer for host access.
    ///
    /// With `cycle` set, a buffer still used by pending submissions gets a
    /// fresh backing allocation instead of blocking. Mapping a buffer that is
    /// already mapped fails with [`GpuError::InvalidState`].
    fn map_transfer_buffer(
        &self,
        transfer_buffer: TransferBufferHandle,
        cycle: bool,
    ) -> Result<MappedMemory, GpuError>;
    fn unmap_transfer_buffer(&self, transfer_buffer: TransferBufferHandle);

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureHandle, GpuError>;
    fn release_texture(&self, texture: TextureHandle);
    fn set_texture_name(&self, texture: TextureHandle, name: &str);

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerHandle, GpuError>;
    fn release_sampler(&self, sampler: SamplerHandle);

    fn create_shader(&self, descriptor: &ShaderDescriptor) -> Result<ShaderHandle, GpuError>;
    fn release_shader(&self, shader: ShaderHandle);

    fn create_graphics_pipeline(
        &self,
        descriptor: &GraphicsPipelineDescriptor,
    ) -> Result<GraphicsPipelineHandle, GpuError>;
    fn release_graphics_pipeline(&self, pipeline: GraphicsPipelineHandle);

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<ComputePipelineHandle, GpuError>;
    fn release_compute_pipeline(&self, pipeline: ComputePipelineHandle);

    // Format queries

    fn texture_supports_format(
        &self,
        format: TextureFormat,
        texture_type: TextureType,
        usage: TextureUsage,
    ) -> bool;
    fn texture_supports_sample_count(&self, format: TextureFormat, sample_count: SampleCount)
    -> bool;

    // Windows and swapchains

    fn claim_window(&self, window: WindowId) -> Result<(), GpuError>;
    fn release_window(&self, window: WindowId);
    fn is_window_claimed(&self, window: WindowId) -> bool;
    fn window_supports_swapchain_composition(
        &self,
        window: WindowId,
        composition: SwapchainComposition,
    ) -> bool;
    fn window_supports_present_mode(&self, window: WindowId, present_mode: PresentMode) -> bool;
    fn set_swapchain_parameters(
        &self,
        window: WindowId,
        composition: SwapchainComposition,
        present_mode: PresentMode,
    ) -> Result<(), GpuError>;
    fn set_allowed_frames_in_flight(&self, frames: u32) -> Result<(), GpuError>;
    fn swapchain_texture_format(&self, window: WindowId) -> Result<TextureFormat, GpuError>;
    fn wait_for_swapchain(&self, window: WindowId) -> Result<(), GpuError>;

    // Command buffers

    fn acquire_command_buffer(&self) -> Result<CommandBufferHandle, GpuError>;

    /// Acquire the next swapchain image of `window` for `command_buffer`.
    ///
    /// Returns `Ok(None)` when too many frames are in flight and `wait` is
    /// false (or waiting could never succeed).
    fn acquire_swapchain_texture(
        &self,
        command_buffer: CommandBufferHandle,
        window: WindowId,
        wait: bool,
    ) -> Result<Option<SwapchainTexture>, GpuError>;

    /// Queue recorded work. Returns a fence when `signal_fence` is set.
    fn submit(
        &self,
        command_buffer: CommandBufferHandle,
        commands: CommandList,
        signal_fence: bool,
    ) -> Result<Option<FenceHandle>, GpuError>;

    /// Discard a command buffer without executing it.
    fn cancel(&self, command_buffer: CommandBufferHandle) -> Result<(), GpuError>;

    // Synchronization

    /// Whether the submission behind `fence` has completed.
    fn query_fence(&self, fence: FenceHandle) -> bool;
    fn wait_for_fences(&self, fences: &[FenceHandle], wait_all: bool) -> Result<(), GpuError>;
    fn release_fence(&self, fence: FenceHandle);
    fn wait_for_idle(&self) -> Result<(), GpuError>;

    // Lifetime

    /// Number of live application-created resources.
    fn live_resource_count(&self) -> usize;

    /// Wait for outstanding work and free every backend object.
    fn destroy(&self);
}

/// Names of the drivers compiled into this crate, in preference order.
pub fn available_drivers() -> &'static [&'static str] {
    &[dummy::DRIVER_NAME]
}

/// Whether a driver accepts at least one of `formats`.
///
/// With `name` unset, any available driver counts.
pub fn supports_shader_formats(formats: ShaderFormat, name: Option<&str>) -> bool {
    available_drivers()
        .iter()
        .filter(|driver| name.is_none_or(|n| n.eq_ignore_ascii_case(driver)))
        .any(|driver| driver_shader_formats(driver).intersects(formats))
}

fn driver_shader_formats(driver: &str) -> ShaderFormat {
    match driver {
        dummy::DRIVER_NAME => DummyConfig::default().shader_formats,
        _ => ShaderFormat::empty(),
    }
}

/// Selects and creates a backend matching `descriptor`.
pub fn create_backend(descriptor: &DeviceDescriptor) -> Result<Arc<dyn GpuBackend>, GpuError> {
    if let Some(name) = descriptor.driver.as_deref()
        && !available_drivers()
            .iter()
            .any(|driver| driver.eq_ignore_ascii_case(name))
    {
        return Err(GpuError::InitializationFailed(format!(
            "no driver named {name:?}, available: {:?}",
            available_drivers()
        )));
    }

    if !supports_shader_formats(descriptor.shader_formats, descriptor.driver.as_deref()) {
        return Err(GpuError::InitializationFailed(format!(
            "no driver accepts shader formats {:?}",
            descriptor.shader_formats
        )));
    }

    log::info!("Using dummy backend");
    let config = DummyConfig {
        debug_mode: descriptor.debug_mode,
        ..DummyConfig::default()
    };
    Ok(Arc::new(DummyBackend::with_config(config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_drivers() {
        assert_eq!(available_drivers(), &["dummy"]);
    }

    #[test]
    fn test_supports_shader_formats() {
        assert!(supports_shader_formats(ShaderFormat::SPIRV, None));
        assert!(supports_shader_formats(ShaderFormat::SPIRV, Some("dummy")));
        assert!(!supports_shader_formats(ShaderFormat::SPIRV, Some("vulkan")));
        assert!(!supports_shader_formats(ShaderFormat::METALLIB, None));
    }

    #[test]
    fn test_create_backend_unknown_driver() {
        let desc = DeviceDescriptor::new(ShaderFormat::SPIRV).with_driver("metal");
        let err = create_backend(&desc).err();
        assert!(matches!(err, Some(GpuError::InitializationFailed(_))));
    }

    #[test]
    fn test_create_backend_no_format_overlap() {
        let desc = DeviceDescriptor::new(ShaderFormat::DXBC);
        let err = create_backend(&desc).err();
        assert!(matches!(err, Some(GpuError::InitializationFailed(_))));
    }
}
