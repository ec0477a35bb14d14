//! Buffer types and descriptors.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

use crate::handle::BufferHandle;
use crate::resources::Buffer;

bitflags! {
    /// Usage flags for device buffers.
    ///
    /// Every buffer can be the source or destination of copy pass operations;
    /// these flags only describe how shaders and fixed-function stages see it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be bound as a vertex buffer.
        const VERTEX = 1 << 0;
        /// Buffer can be bound as an index buffer.
        const INDEX = 1 << 1;
        /// Buffer holds indirect draw or dispatch arguments.
        const INDIRECT = 1 << 2;
        /// Buffer can be read by graphics shaders as a storage buffer.
        const GRAPHICS_STORAGE_READ = 1 << 3;
        /// Buffer can be read by compute shaders as a storage buffer.
        const COMPUTE_STORAGE_READ = 1 << 4;
        /// Buffer can be written by compute shaders.
        const COMPUTE_STORAGE_WRITE = 1 << 5;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Usage flags.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// Create a new buffer descriptor.
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A byte range inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferRegion {
    pub buffer: BufferHandle,
    pub offset: u64,
    pub size: u64,
}

impl BufferRegion {
    pub fn new(buffer: &Buffer, offset: u64, size: u64) -> Self {
        Self {
            buffer: buffer.handle(),
            offset,
            size,
        }
    }

    /// The whole buffer.
    pub fn whole(buffer: &Buffer) -> Self {
        Self::new(buffer, 0, buffer.size())
    }

    /// Exclusive end offset, or `None` on overflow.
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }
}

/// A byte offset inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferLocation {
    pub buffer: BufferHandle,
    pub offset: u64,
}

impl BufferLocation {
    pub fn new(buffer: &Buffer, offset: u64) -> Self {
        Self {
            buffer: buffer.handle(),
            offset,
        }
    }
}

/// A vertex or index buffer binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferBinding {
    pub buffer: BufferHandle,
    pub offset: u64,
}

impl BufferBinding {
    pub fn new(buffer: &Buffer, offset: u64) -> Self {
        Self {
            buffer: buffer.handle(),
            offset,
        }
    }
}

/// Width of the elements in an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexElementSize {
    Sixteen,
    #[default]
    ThirtyTwo,
}

impl IndexElementSize {
    /// Size of one index in bytes.
    pub fn byte_size(&self) -> u64 {
        match self {
            Self::Sixteen => 2,
            Self::ThirtyTwo => 4,
        }
    }
}

// ============================================================================
// Indirect Drawing Arguments
// ============================================================================

/// Arguments for a non-indexed indirect draw call.
///
/// The buffer containing these arguments must have [`BufferUsage::INDIRECT`].
///
/// # Memory Layout
///
/// - Total size: 16 bytes
/// - Alignment: 4 bytes
///
/// # Example
///
/// ```
/// use lumen_gpu::DrawIndirectArgs;
///
/// let args = DrawIndirectArgs::new(36, 100).with_first_instance(4);
/// assert_eq!(bytemuck::bytes_of(&args).len(), 16);
/// ```
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct DrawIndirectArgs {
    /// Number of vertices to draw.
    pub vertex_count: u32,
    /// Number of instances to draw.
    pub instance_count: u32,
    /// Index of the first vertex to draw.
    pub first_vertex: u32,
    /// Instance ID of the first instance to draw.
    pub first_instance: u32,
}

impl DrawIndirectArgs {
    /// Size of the struct in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Create new indirect draw arguments.
    pub fn new(vertex_count: u32, instance_count: u32) -> Self {
        Self {
            vertex_count,
            instance_count,
            first_vertex: 0,
            first_instance: 0,
        }
    }

    /// Set the first vertex index.
    pub fn with_first_vertex(mut self, first_vertex: u32) -> Self {
        self.first_vertex = first_vertex;
        self
    }

    /// Set the first instance index.
    pub fn with_first_instance(mut self, first_instance: u32) -> Self {
        self.first_instance = first_instance;
        self
    }
}

/// Arguments for an indexed indirect draw call.
///
/// # Memory Layout
///
/// - Total size: 20 bytes
/// - Alignment: 4 bytes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct DrawIndexedIndirectArgs {
    /// Number of indices to draw.
    pub index_count: u32,
    /// Number of instances to draw.
    pub instance_count: u32,
    /// Index of the first index to draw.
    pub first_index: u32,
    /// Value added to each index before reading from the vertex buffer.
    pub vertex_offset: i32,
    /// Instance ID of the first instance to draw.
    pub first_instance: u32,
}

impl DrawIndexedIndirectArgs {
    /// Size of the struct in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Create new indexed indirect draw arguments.
    pub fn new(index_count: u32, instance_count: u32) -> Self {
        Self {
            index_count,
            instance_count,
            first_index: 0,
            vertex_offset: 0,
            first_instance: 0,
        }
    }

    /// Set the first index.
    pub fn with_first_index(mut self, first_index: u32) -> Self {
        self.first_index = first_index;
        self
    }

    /// Set the vertex offset.
    pub fn with_vertex_offset(mut self, vertex_offset: i32) -> Self {
        self.vertex_offset = vertex_offset;
        self
    }

    /// Set the first instance index.
    pub fn with_first_instance(mut self, first_instance: u32) -> Self {
        self.first_instance = first_instance;
        self
    }
}

/// Arguments for an indirect compute dispatch.
///
/// # Memory Layout
///
/// - Total size: 12 bytes
/// - Alignment: 4 bytes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct DispatchIndirectArgs {
    pub groupcount_x: u32,
    pub groupcount_y: u32,
    pub groupcount_z: u32,
}

impl DispatchIndirectArgs {
    /// Size of the struct in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn new(groupcount_x: u32, groupcount_y: u32, groupcount_z: u32) -> Self {
        Self {
            groupcount_x,
            groupcount_y,
            groupcount_z,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indirect_arg_sizes() {
        assert_eq!(DrawIndirectArgs::SIZE, 16);
        assert_eq!(DrawIndexedIndirectArgs::SIZE, 20);
        assert_eq!(DispatchIndirectArgs::SIZE, 12);
    }

    #[test]
    fn test_indirect_args_bytes() {
        let args = DrawIndexedIndirectArgs::new(6, 2).with_vertex_offset(-1);
        let bytes = bytemuck::bytes_of(&args);
        assert_eq!(&bytes[0..4], &6u32.to_ne_bytes());
        assert_eq!(&bytes[12..16], &(-1i32).to_ne_bytes());
    }

    #[test]
    fn test_index_element_size() {
        assert_eq!(IndexElementSize::Sixteen.byte_size(), 2);
        assert_eq!(IndexElementSize::ThirtyTwo.byte_size(), 4);
    }
}
