//! Shader types and descriptors.

use bitflags::bitflags;

bitflags! {
    /// Shader bytecode formats.
    ///
    /// A device is created with the set of formats the application can provide;
    /// device creation fails when the driver accepts none of them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderFormat: u32 {
        /// Driver-specific private format.
        const PRIVATE = 1 << 0;
        /// SPIR-V for Vulkan.
        const SPIRV = 1 << 1;
        /// DXBC shader model 5.1 for D3D12.
        const DXBC = 1 << 2;
        /// DXIL shader model 6.0 for D3D12.
        const DXIL = 1 << 3;
        /// Metal shading language source.
        const MSL = 1 << 4;
        /// Precompiled Metal library.
        const METALLIB = 1 << 5;
    }
}

impl Default for ShaderFormat {
    fn default() -> Self {
        Self::empty()
    }
}

/// Graphics shader stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// Descriptor for creating a graphics shader.
///
/// The resource counts describe what the shader expects to have bound; draws
/// with fewer bindings than declared fail validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderDescriptor {
    pub label: Option<String>,
    pub code: Vec<u8>,
    pub entry_point: String,
    /// Exactly one format bit.
    pub format: ShaderFormat,
    pub stage: ShaderStage,
    pub num_samplers: u32,
    pub num_storage_textures: u32,
    pub num_storage_buffers: u32,
    pub num_uniform_buffers: u32,
}

impl ShaderDescriptor {
    pub fn new(
        stage: ShaderStage,
        format: ShaderFormat,
        code: impl Into<Vec<u8>>,
        entry_point: impl Into<String>,
    ) -> Self {
        Self {
            label: None,
            code: code.into(),
            entry_point: entry_point.into(),
            format,
            stage,
            num_samplers: 0,
            num_storage_textures: 0,
            num_storage_buffers: 0,
            num_uniform_buffers: 0,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the number of bound resources the shader reads.
    pub fn with_resources(
        mut self,
        samplers: u32,
        storage_textures: u32,
        storage_buffers: u32,
        uniform_buffers: u32,
    ) -> Self {
        self.num_samplers = samplers;
        self.num_storage_textures = storage_textures;
        self.num_storage_buffers = storage_buffers;
        self.num_uniform_buffers = uniform_buffers;
        self
    }
}
