//! Common utilities for GPU integration tests.
//!
//! This module provides shared test infrastructure: backend selection, a
//! device wrapper and helpers for the resources most tests need.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use lumen_gpu::{
    Buffer, BufferDescriptor, BufferRegion, BufferUsage, ColorTargetDescription,
    DeviceDescriptor, DummyBackend, DummyConfig, GpuDevice, GraphicsPipeline,
    GraphicsPipelineDescriptor, ShaderDescriptor, ShaderFormat, ShaderStage, Texture,
    TextureDescriptor, TextureFormat, TextureUsage, TransferBuffer, TransferBufferDescriptor,
    TransferBufferLocation,
};

/// Initialize logging once per test binary.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Backend Enumeration
// ============================================================================

/// Backend configurations the integration tests run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Dummy backend executing submissions as soon as they are queued.
    Dummy,
    /// Dummy backend delaying every submission, to exercise waits.
    DelayedDummy,
}

impl Backend {
    pub fn config(&self) -> DummyConfig {
        match self {
            Backend::Dummy => DummyConfig::default(),
            Backend::DelayedDummy => DummyConfig {
                submit_latency: Duration::from_millis(5),
                ..DummyConfig::default()
            },
        }
    }
}

// ============================================================================
// Test Context
// ============================================================================

/// A device plus a second handle to its dummy backend.
///
/// The backend handle gives tests access to simulated windows, execution
/// statistics and queue suspension.
pub struct TestContext {
    pub backend: DummyBackend,
    pub device: GpuDevice,
}

impl TestContext {
    pub fn new(backend: Backend) -> Self {
        Self::with_config(backend.config())
    }

    pub fn with_config(config: DummyConfig) -> Self {
        init_logging();
        let backend = DummyBackend::with_config(config);
        let device = GpuDevice::with_backend(
            Arc::new(backend.clone()),
            &DeviceDescriptor::new(ShaderFormat::SPIRV).with_debug_mode(true),
        )
        .expect("Failed to create device");
        Self { backend, device }
    }

    pub fn create_buffer(&self, size: u64, usage: BufferUsage) -> Buffer {
        self.device
            .create_buffer(&BufferDescriptor::new(size, usage))
            .expect("Failed to create buffer")
    }

    /// Create a transfer buffer holding `data`.
    pub fn create_upload(&self, data: &[u8]) -> TransferBuffer {
        let mut upload = self
            .device
            .create_transfer_buffer(&TransferBufferDescriptor::upload(data.len() as u64))
            .expect("Failed to create upload buffer");
        upload.write(0, data, false).expect("Failed to fill upload buffer");
        upload
    }

    pub fn create_download(&self, size: u64) -> TransferBuffer {
        self.device
            .create_transfer_buffer(&TransferBufferDescriptor::download(size))
            .expect("Failed to create download buffer")
    }

    pub fn create_color_target(&self, width: u32, height: u32) -> Texture {
        self.device
            .create_texture(&TextureDescriptor::new_2d(
                width,
                height,
                TextureFormat::Rgba8Unorm,
                TextureUsage::COLOR_TARGET | TextureUsage::SAMPLER,
            ))
            .expect("Failed to create color target")
    }

    /// A pipeline with no vertex input rendering to one `format` target.
    pub fn create_pipeline(&self, format: TextureFormat) -> GraphicsPipeline {
        let vertex = self
            .device
            .create_shader(&ShaderDescriptor::new(
                ShaderStage::Vertex,
                ShaderFormat::SPIRV,
                SPIRV_STUB,
                "main",
            ))
            .expect("Failed to create vertex shader");
        let fragment = self
            .device
            .create_shader(&ShaderDescriptor::new(
                ShaderStage::Fragment,
                ShaderFormat::SPIRV,
                SPIRV_STUB,
                "main",
            ))
            .expect("Failed to create fragment shader");
        self.device
            .create_graphics_pipeline(
                &GraphicsPipelineDescriptor::new(&vertex, &fragment)
                    .with_color_target(ColorTargetDescription::new(format)),
            )
            .expect("Failed to create pipeline")
    }

    /// Upload `data` into `buffer` and wait for completion.
    pub fn upload_buffer(&self, buffer: &Buffer, data: &[u8]) {
        let upload = self.create_upload(data);
        let mut cmd = self.device.acquire_command_buffer().unwrap();
        cmd.begin_copy_pass().upload_to_buffer(
            &TransferBufferLocation::new(&upload, 0),
            &BufferRegion::new(buffer, 0, data.len() as u64),
            false,
        );
        cmd.submit_and_acquire_fence().unwrap().wait().unwrap();
    }

    /// Read back `size` bytes of `buffer`.
    pub fn read_buffer(&self, buffer: &Buffer, size: u64) -> Vec<u8> {
        let mut download = self.create_download(size);
        let mut cmd = self.device.acquire_command_buffer().unwrap();
        cmd.begin_copy_pass().download_from_buffer(
            &BufferRegion::new(buffer, 0, size),
            &TransferBufferLocation::new(&download, 0),
        );
        cmd.submit_and_acquire_fence().unwrap().wait().unwrap();
        download.read::<u8>(0, size as usize).unwrap()
    }
}

/// Bytes standing in for compiled shader code.
pub const SPIRV_STUB: &[u8] = &[0x03, 0x02, 0x23, 0x07, 0x00, 0x00, 0x01, 0x00];

/// Generate a deterministic byte pattern.
pub fn generate_test_pattern(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}
