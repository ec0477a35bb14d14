//! GPU device.
//!
//! The [`GpuDevice`] is the entry point of the crate: it selects a backend,
//! claims windows, creates resources and hands out command buffers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use lumen_core::properties::PropertyBag;

use crate::backend::{self, GpuBackend};
use crate::command_buffer::CommandBuffer;
use crate::error::GpuError;
use crate::limits::FRAMES_IN_FLIGHT_RANGE;
use crate::resources::{
    Buffer, ComputePipeline, DeviceLink, Fence, GraphicsPipeline, Sampler, Shader, Texture,
    TransferBuffer,
};
use crate::swapchain::{PresentMode, SwapchainComposition, WindowId};
use crate::types::{
    BufferDescriptor, ComputePipelineDescriptor, GraphicsPipelineDescriptor, SampleCount,
    SamplerDescriptor, ShaderDescriptor, ShaderFormat, TextureDescriptor, TextureFormat,
    TextureType, TextureUsage, TransferBufferDescriptor,
};

/// Property keys read by [`DeviceDescriptor::from_properties`].
pub mod props {
    /// Enable backend validation logging. Boolean, default `true`.
    pub const DEBUG_MODE: &str = "gpu.device.create.debugmode";
    /// Prefer an integrated or low-power adapter. Boolean, default `false`.
    pub const PREFER_LOW_POWER: &str = "gpu.device.create.preferlowpower";
    /// Driver name. String, default: first available driver.
    pub const NAME: &str = "gpu.device.create.name";
    pub const SHADERS_PRIVATE: &str = "gpu.device.create.shaders.private";
    pub const SHADERS_SPIRV: &str = "gpu.device.create.shaders.spirv";
    pub const SHADERS_DXBC: &str = "gpu.device.create.shaders.dxbc";
    pub const SHADERS_DXIL: &str = "gpu.device.create.shaders.dxil";
    pub const SHADERS_MSL: &str = "gpu.device.create.shaders.msl";
    pub const SHADERS_METALLIB: &str = "gpu.device.create.shaders.metallib";
}

/// Parameters for creating a [`GpuDevice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Shader formats the application can provide. At least one must be
    /// accepted by the selected driver.
    pub shader_formats: ShaderFormat,
    /// Log backend validation failures at error level.
    pub debug_mode: bool,
    /// Driver to use, matched case-insensitively. `None` picks the first
    /// available driver that accepts `shader_formats`.
    pub driver: Option<String>,
    /// Adapter preference. Drivers with a single adapter log it and carry on.
    pub prefer_low_power: bool,
}

impl DeviceDescriptor {
    pub fn new(shader_formats: ShaderFormat) -> Self {
        Self {
            shader_formats,
            debug_mode: true,
            driver: None,
            prefer_low_power: false,
        }
    }

    pub fn with_debug_mode(mut self, debug_mode: bool) -> Self {
        self.debug_mode = debug_mode;
        self
    }

    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    pub fn with_low_power(mut self, prefer_low_power: bool) -> Self {
        self.prefer_low_power = prefer_low_power;
        self
    }

    /// Build a descriptor from the [`props`] keys of a property bag.
    pub fn from_properties(properties: &PropertyBag) -> Self {
        let formats = [
            (props::SHADERS_PRIVATE, ShaderFormat::PRIVATE),
            (props::SHADERS_SPIRV, ShaderFormat::SPIRV),
            (props::SHADERS_DXBC, ShaderFormat::DXBC),
            (props::SHADERS_DXIL, ShaderFormat::DXIL),
            (props::SHADERS_MSL, ShaderFormat::MSL),
            (props::SHADERS_METALLIB, ShaderFormat::METALLIB),
        ]
        .into_iter()
        .filter(|(key, _)| properties.get_bool(key, false))
        .fold(ShaderFormat::empty(), |acc, (_, format)| acc | format);

        Self {
            shader_formats: formats,
            debug_mode: properties.get_bool(props::DEBUG_MODE, true),
            driver: properties.get_string(props::NAME).map(str::to_owned),
            prefer_low_power: properties.get_bool(props::PREFER_LOW_POWER, false),
        }
    }
}

/// State shared between a device and the resources it created.
pub(crate) struct DeviceShared {
    backend: Arc<dyn GpuBackend>,
    descriptor: DeviceDescriptor,
    destroyed: AtomicBool,
}

impl DeviceShared {
    pub(crate) fn backend(&self) -> &dyn GpuBackend {
        self.backend.as_ref()
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    pub(crate) fn debug_mode(&self) -> bool {
        self.descriptor.debug_mode
    }
}

/// A logical GPU device.
///
/// The device owns the backend. Resources it creates are owned by the caller
/// and keep a weak link back, so they may be dropped in any order relative to
/// the device.
///
/// # Thread Safety
///
/// `GpuDevice` is `Send + Sync`. Resource creation and submission may happen
/// from any thread; each [`CommandBuffer`] is recorded by one thread.
///
/// # Example
///
/// ```ignore
/// let device = GpuDevice::create(ShaderFormat::SPIRV, true, None)?;
///
/// let buffer = device.create_buffer(&BufferDescriptor::new(1024, BufferUsage::VERTEX))?;
/// let texture = device.create_texture(&TextureDescriptor::new_2d(
///     1920,
///     1080,
///     TextureFormat::Rgba8Unorm,
///     TextureUsage::COLOR_TARGET,
/// ))?;
/// ```
pub struct GpuDevice {
    shared: Arc<DeviceShared>,
}

impl GpuDevice {
    /// Create a device on the named driver, or the first one accepting
    /// `shader_formats`.
    ///
    /// # Errors
    ///
    /// [`GpuError::InitializationFailed`] when the driver is unknown or accepts
    /// none of `shader_formats`.
    pub fn create(
        shader_formats: ShaderFormat,
        debug_mode: bool,
        driver: Option<&str>,
    ) -> Result<Self, GpuError> {
        let mut descriptor = DeviceDescriptor::new(shader_formats).with_debug_mode(debug_mode);
        descriptor.driver = driver.map(str::to_owned);
        Self::create_with_descriptor(&descriptor)
    }

    /// Create a device configured by the [`props`] keys of a property bag.
    pub fn create_with_properties(properties: &PropertyBag) -> Result<Self, GpuError> {
        Self::create_with_descriptor(&DeviceDescriptor::from_properties(properties))
    }

    pub fn create_with_descriptor(descriptor: &DeviceDescriptor) -> Result<Self, GpuError> {
        let backend = backend::create_backend(descriptor)?;
        Self::with_backend(backend, descriptor)
    }

    /// Create a device on an existing backend.
    ///
    /// The descriptor's driver name is ignored; its shader formats must still
    /// overlap the backend's.
    pub fn with_backend(
        backend: Arc<dyn GpuBackend>,
        descriptor: &DeviceDescriptor,
    ) -> Result<Self, GpuError> {
        if !backend.shader_formats().intersects(descriptor.shader_formats) {
            return Err(GpuError::InitializationFailed(format!(
                "driver {} accepts {:?}, requested {:?}",
                backend.name(),
                backend.shader_formats(),
                descriptor.shader_formats
            )));
        }
        log::info!(
            "GpuDevice: created on {} driver (debug mode: {}, low power: {})",
            backend.name(),
            descriptor.debug_mode,
            descriptor.prefer_low_power
        );
        Ok(Self {
            shared: Arc::new(DeviceShared {
                backend,
                descriptor: descriptor.clone(),
                destroyed: AtomicBool::new(false),
            }),
        })
    }

    pub(crate) fn shared(&self) -> &Arc<DeviceShared> {
        &self.shared
    }

    fn backend(&self) -> Result<&dyn GpuBackend, GpuError> {
        if self.shared.is_destroyed() {
            return Err(GpuError::DeviceDestroyed);
        }
        Ok(self.shared.backend())
    }

    fn link(&self) -> DeviceLink {
        DeviceLink::new(&self.shared)
    }

    /// Name of the driver behind this device.
    pub fn driver(&self) -> &'static str {
        self.shared.backend.name()
    }

    /// Shader formats accepted by [`create_shader`](Self::create_shader).
    pub fn shader_formats(&self) -> ShaderFormat {
        self.shared.backend.shader_formats()
    }

    pub fn debug_mode(&self) -> bool {
        self.shared.debug_mode()
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.shared.descriptor
    }

    pub fn is_destroyed(&self) -> bool {
        self.shared.is_destroyed()
    }

    // ---------------------------------------------------------------------
    // Windows
    // ---------------------------------------------------------------------

    /// Claim a window for presentation with the default SDR/VSync swapchain.
    pub fn claim_window(&self, window: WindowId) -> Result<(), GpuError> {
        self.backend()?.claim_window(window)
    }

    /// Release a claimed window. Waits for work presenting to it.
    pub fn release_window(&self, window: WindowId) {
        if let Ok(backend) = self.backend() {
            backend.release_window(window);
        }
    }

    pub fn is_window_claimed(&self, window: WindowId) -> bool {
        self.backend()
            .is_ok_and(|backend| backend.is_window_claimed(window))
    }

    pub fn window_supports_swapchain_composition(
        &self,
        window: WindowId,
        composition: SwapchainComposition,
    ) -> bool {
        self.backend().is_ok_and(|backend| {
            backend.window_supports_swapchain_composition(window, composition)
        })
    }

    pub fn window_supports_present_mode(&self, window: WindowId, present_mode: PresentMode) -> bool {
        self.backend()
            .is_ok_and(|backend| backend.window_supports_present_mode(window, present_mode))
    }

    /// Change the composition and present mode of a claimed window.
    ///
    /// # Errors
    ///
    /// [`GpuError::WindowNotClaimed`] for an unclaimed window,
    /// [`GpuError::FeatureNotSupported`] for an unsupported combination.
    pub fn set_swapchain_parameters(
        &self,
        window: WindowId,
        composition: SwapchainComposition,
        present_mode: PresentMode,
    ) -> Result<(), GpuError> {
        let backend = self.backend()?;
        backend.set_swapchain_parameters(window, composition, present_mode)?;
        log::debug!(
            "GpuDevice: window {} swapchain set to {composition:?}/{present_mode:?}",
            window.raw()
        );
        Ok(())
    }

    /// Limit the swapchain images acquired and not yet presented, per window.
    pub fn set_allowed_frames_in_flight(&self, frames: u32) -> Result<(), GpuError> {
        if !FRAMES_IN_FLIGHT_RANGE.contains(&frames) {
            return Err(GpuError::InvalidParameter(format!(
                "allowed frames in flight must be in {FRAMES_IN_FLIGHT_RANGE:?}, got {frames}"
            )));
        }
        self.backend()?.set_allowed_frames_in_flight(frames)
    }

    pub fn swapchain_texture_format(&self, window: WindowId) -> Result<TextureFormat, GpuError> {
        self.backend()?.swapchain_texture_format(window)
    }

    /// Block until a swapchain image of `window` can be acquired.
    pub fn wait_for_swapchain(&self, window: WindowId) -> Result<(), GpuError> {
        self.backend()?.wait_for_swapchain(window)
    }

    // ---------------------------------------------------------------------
    // Format queries
    // ---------------------------------------------------------------------

    pub fn texture_supports_format(
        &self,
        format: TextureFormat,
        texture_type: TextureType,
        usage: TextureUsage,
    ) -> bool {
        self.backend()
            .is_ok_and(|backend| backend.texture_supports_format(format, texture_type, usage))
    }

    pub fn texture_supports_sample_count(&self, format: TextureFormat, sample_count: SampleCount) -> bool {
        self.backend()
            .is_ok_and(|backend| backend.texture_supports_sample_count(format, sample_count))
    }

    // ---------------------------------------------------------------------
    // Resources
    // ---------------------------------------------------------------------

    /// Create a GPU buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the size is zero or the backend is out of memory.
    pub fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<Buffer, GpuError> {
        let handle = self.backend()?.create_buffer(descriptor)?;
        log::trace!(
            "GpuDevice: created buffer {:?}, size={}",
            descriptor.label,
            descriptor.size
        );
        Ok(Buffer::new(self.link(), handle, descriptor.clone()))
    }

    pub fn create_transfer_buffer(
        &self,
        descriptor: &TransferBufferDescriptor,
    ) -> Result<TransferBuffer, GpuError> {
        let handle = self.backend()?.create_transfer_buffer(descriptor)?;
        log::trace!(
            "GpuDevice: created transfer buffer {:?}, size={}",
            descriptor.label,
            descriptor.size
        );
        Ok(TransferBuffer::new(self.link(), handle, descriptor.clone()))
    }

    /// Create a GPU texture.
    ///
    /// # Errors
    ///
    /// Returns an error for zero dimensions, too many mip levels, a
    /// format/usage combination the backend does not support, or when the
    /// backend is out of memory.
    pub fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<Texture, GpuError> {
        let handle = self.backend()?.create_texture(descriptor)?;
        log::trace!(
            "GpuDevice: created texture {:?}, size={}x{}x{}",
            descriptor.label,
            descriptor.width,
            descriptor.height,
            descriptor.layer_count_or_depth
        );
        Ok(Texture::new(self.link(), handle, descriptor.clone()))
    }

    pub fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<Sampler, GpuError> {
        let handle = self.backend()?.create_sampler(descriptor)?;
        log::trace!("GpuDevice: created sampler {:?}", descriptor.label);
        Ok(Sampler::new(self.link(), handle, descriptor.clone()))
    }

    pub fn create_shader(&self, descriptor: &ShaderDescriptor) -> Result<Shader, GpuError> {
        let handle = self.backend()?.create_shader(descriptor)?;
        log::trace!(
            "GpuDevice: created {:?} shader {:?}",
            descriptor.stage,
            descriptor.label
        );
        Ok(Shader::new(
            self.link(),
            handle,
            descriptor.stage,
            descriptor.format,
            descriptor.entry_point.clone(),
            descriptor.label.clone(),
        ))
    }

    pub fn create_graphics_pipeline(
        &self,
        descriptor: &GraphicsPipelineDescriptor,
    ) -> Result<GraphicsPipeline, GpuError> {
        let handle = self.backend()?.create_graphics_pipeline(descriptor)?;
        log::trace!("GpuDevice: created graphics pipeline {:?}", descriptor.label);
        Ok(GraphicsPipeline::new(self.link(), handle, descriptor.clone()))
    }

    pub fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<ComputePipeline, GpuError> {
        let handle = self.backend()?.create_compute_pipeline(descriptor)?;
        log::trace!("GpuDevice: created compute pipeline {:?}", descriptor.label);
        Ok(ComputePipeline::new(self.link(), handle, descriptor.clone()))
    }

    /// Start recording a command buffer.
    ///
    /// # Errors
    ///
    /// [`GpuError::ResourceExhausted`] when too many command buffers are
    /// recording at once.
    pub fn acquire_command_buffer(&self) -> Result<CommandBuffer<'_>, GpuError> {
        let handle = self.backend()?.acquire_command_buffer()?;
        Ok(CommandBuffer::new(self, handle))
    }

    // ---------------------------------------------------------------------
    // Synchronization
    // ---------------------------------------------------------------------

    /// Block until every submitted command buffer has completed.
    pub fn wait_for_idle(&self) -> Result<(), GpuError> {
        lumen_core::profile_function!();
        self.backend()?.wait_for_idle()
    }

    /// Block until all (`wait_all`) or any of `fences` are signalled.
    pub fn wait_for_fences(&self, fences: &[&Fence], wait_all: bool) -> Result<(), GpuError> {
        lumen_core::profile_function!();
        let backend = self.backend()?;
        let handles: Vec<_> = fences
            .iter()
            .filter(|fence| !fence.is_released())
            .map(|fence| fence.handle())
            .collect();
        if handles.len() < fences.len() && !wait_all {
            // A released fence counts as signalled.
            return Ok(());
        }
        backend.wait_for_fences(&handles, wait_all)
    }

    /// Wait for outstanding work and tear down the backend.
    ///
    /// A suspended backend queue is resumed first, so queued submissions
    /// still run.
    ///
    /// Resources still alive afterwards release nothing when dropped. Calling
    /// this twice is harmless; it also runs on drop.
    pub fn destroy(&mut self) {
        if self.shared.destroyed.load(Ordering::Acquire) {
            return;
        }
        let backend = self.shared.backend();
        let live = backend.live_resource_count();
        if live > 0 {
            log::warn!("GpuDevice: destroyed with {live} resource(s) still alive");
        }
        self.shared.destroyed.store(true, Ordering::Release);
        backend.destroy();
        lumen_core::profile_message!("gpu device destroyed");
        log::info!("GpuDevice: destroyed");
    }
}

impl Drop for GpuDevice {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for GpuDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuDevice")
            .field("driver", &self.driver())
            .field("debug_mode", &self.debug_mode())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

static_assertions::assert_impl_all!(GpuDevice: Send, Sync);
static_assertions::assert_not_impl_any!(GpuDevice: Clone);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BufferUsage;

    #[test]
    fn test_descriptor_from_properties() {
        let mut properties = PropertyBag::new();
        properties
            .set_bool(props::SHADERS_SPIRV, true)
            .set_bool(props::SHADERS_MSL, true)
            .set_bool(props::DEBUG_MODE, false)
            .set_string(props::NAME, "dummy");

        let desc = DeviceDescriptor::from_properties(&properties);
        assert_eq!(desc.shader_formats, ShaderFormat::SPIRV | ShaderFormat::MSL);
        assert!(!desc.debug_mode);
        assert_eq!(desc.driver.as_deref(), Some("dummy"));
        assert!(!desc.prefer_low_power);
    }

    #[test]
    fn test_descriptor_defaults() {
        let desc = DeviceDescriptor::from_properties(&PropertyBag::new());
        assert!(desc.shader_formats.is_empty());
        assert!(desc.debug_mode);
        assert!(desc.driver.is_none());
    }

    #[test]
    fn test_create_device() {
        let device = GpuDevice::create(ShaderFormat::SPIRV, true, Some("DUMMY")).unwrap();
        assert_eq!(device.driver(), "dummy");
        assert!(device.shader_formats().contains(ShaderFormat::SPIRV));
        assert!(device.debug_mode());
    }

    #[test]
    fn test_low_power_preference_is_accepted() {
        let mut properties = PropertyBag::new();
        properties
            .set_bool(props::SHADERS_SPIRV, true)
            .set_bool(props::PREFER_LOW_POWER, true);
        let device = GpuDevice::create_with_properties(&properties).unwrap();
        assert!(device.descriptor().prefer_low_power);
        assert_eq!(device.driver(), "dummy");
    }

    #[test]
    fn test_create_without_formats_fails() {
        let result = GpuDevice::create_with_properties(&PropertyBag::new());
        assert!(matches!(result, Err(GpuError::InitializationFailed(_))));
    }

    #[test]
    fn test_destroyed_device_rejects_factories() {
        let mut device = GpuDevice::create(ShaderFormat::SPIRV, false, None).unwrap();
        let mut buffer = device
            .create_buffer(&BufferDescriptor::new(64, BufferUsage::VERTEX))
            .unwrap();
        device.destroy();
        device.destroy();
        assert!(device.is_destroyed());
        assert!(matches!(
            device.create_buffer(&BufferDescriptor::new(64, BufferUsage::VERTEX)),
            Err(GpuError::DeviceDestroyed)
        ));
        assert!(matches!(device.acquire_command_buffer(), Err(GpuError::DeviceDestroyed)));
        // Releasing after destroy is a no-op.
        buffer.release();
        assert!(buffer.is_released());
    }

    #[test]
    fn test_frames_in_flight_range() {
        let device = GpuDevice::create(ShaderFormat::SPIRV, false, None).unwrap();
        assert!(device.set_allowed_frames_in_flight(0).is_err());
        assert!(device.set_allowed_frames_in_flight(4).is_err());
        assert!(device.set_allowed_frames_in_flight(3).is_ok());
    }
}
