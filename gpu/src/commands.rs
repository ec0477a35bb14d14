//! Recorded command stream.
//!
//! A [`CommandBuffer`](crate::CommandBuffer) and its passes append [`Command`]s
//! to a [`CommandList`]. On submit the list is handed to the backend, which
//! replays it in recording order.

use crate::handle::{
    BufferHandle, ComputePipelineHandle, GraphicsPipelineHandle, TextureHandle,
    TransferBufferHandle,
};
use crate::types::{
    BlitInfo, BufferBinding, BufferLocation, BufferRegion, Color, ColorTargetInfo,
    DepthStencilTargetInfo, IndexElementSize, Rect, StorageBufferReadWriteBinding,
    StorageTextureReadWriteBinding, TextureLocation, TextureRegion, TextureSamplerBinding,
    TextureTransferInfo, TransferBufferLocation, Viewport,
};

/// Shader stage a binding or uniform push targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Vertex,
    Fragment,
    Compute,
}

impl PipelineStage {
    pub(crate) fn index(&self) -> usize {
        match self {
            Self::Vertex => 0,
            Self::Fragment => 1,
            Self::Compute => 2,
        }
    }
}

/// A single recorded operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Command buffer level
    PushUniformData {
        stage: PipelineStage,
        slot: u32,
        data: Vec<u8>,
    },
    BlitTexture(BlitInfo),
    GenerateMipmaps(TextureHandle),
    InsertDebugLabel(String),
    PushDebugGroup(String),
    PopDebugGroup,

    // Render pass
    BeginRenderPass {
        color_targets: Vec<ColorTargetInfo>,
        depth_stencil: Option<DepthStencilTargetInfo>,
    },
    SetViewport(Viewport),
    SetScissor(Rect),
    SetBlendConstants(Color),
    SetStencilReference(u8),
    BindGraphicsPipeline(GraphicsPipelineHandle),
    BindVertexBuffers {
        first_slot: u32,
        bindings: Vec<BufferBinding>,
    },
    BindIndexBuffer {
        binding: BufferBinding,
        index_size: IndexElementSize,
    },
    BindSamplers {
        stage: PipelineStage,
        first_slot: u32,
        bindings: Vec<TextureSamplerBinding>,
    },
    BindStorageTextures {
        stage: PipelineStage,
        first_slot: u32,
        textures: Vec<TextureHandle>,
    },
    BindStorageBuffers {
        stage: PipelineStage,
        first_slot: u32,
        buffers: Vec<BufferHandle>,
    },
    DrawPrimitives {
        num_vertices: u32,
        num_instances: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    DrawIndexedPrimitives {
        num_indices: u32,
        num_instances: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    },
    DrawPrimitivesIndirect {
        buffer: BufferHandle,
        offset: u64,
        draw_count: u32,
    },
    DrawIndexedPrimitivesIndirect {
        buffer: BufferHandle,
        offset: u64,
        draw_count: u32,
    },
    EndRenderPass,

    // Compute pass
    BeginComputePass {
        storage_textures: Vec<StorageTextureReadWriteBinding>,
        storage_buffers: Vec<StorageBufferReadWriteBinding>,
    },
    BindComputePipeline(ComputePipelineHandle),
    Dispatch {
        groupcount_x: u32,
        groupcount_y: u32,
        groupcount_z: u32,
    },
    DispatchIndirect {
        buffer: BufferHandle,
        offset: u64,
    },
    EndComputePass,

    // Copy pass
    BeginCopyPass,
    UploadToBuffer {
        source: TransferBufferLocation,
        destination: BufferRegion,
        cycle: bool,
    },
    UploadToTexture {
        source: TextureTransferInfo,
        destination: TextureRegion,
        cycle: bool,
    },
    CopyBufferToBuffer {
        source: BufferLocation,
        destination: BufferLocation,
        size: u64,
        cycle: bool,
    },
    CopyTextureToTexture {
        source: TextureLocation,
        destination: TextureLocation,
        width: u32,
        height: u32,
        depth: u32,
        cycle: bool,
    },
    DownloadFromBuffer {
        source: BufferRegion,
        destination: TransferBufferLocation,
    },
    DownloadFromTexture {
        source: TextureRegion,
        destination: TextureTransferInfo,
    },
    EndCopyPass,
}

impl Command {
    /// The transfer buffer this command reads or writes, if any.
    pub fn transfer_buffer(&self) -> Option<TransferBufferHandle> {
        match self {
            Self::UploadToBuffer { source, .. } => Some(source.transfer_buffer),
            Self::UploadToTexture { source, .. } => Some(source.transfer_buffer),
            Self::DownloadFromBuffer { destination, .. } => Some(destination.transfer_buffer),
            Self::DownloadFromTexture { destination, .. } => Some(destination.transfer_buffer),
            _ => None,
        }
    }

    /// Whether this command opens a pass.
    pub fn begins_pass(&self) -> bool {
        matches!(
            self,
            Self::BeginRenderPass { .. } | Self::BeginComputePass { .. } | Self::BeginCopyPass
        )
    }

    /// Whether this command closes a pass.
    pub fn ends_pass(&self) -> bool {
        matches!(
            self,
            Self::EndRenderPass | Self::EndComputePass | Self::EndCopyPass
        )
    }
}

/// Ordered list of recorded commands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandList {
    commands: Vec<Command>,
}

impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Command> {
        self.commands.iter()
    }

    /// Distinct transfer buffers referenced by the list, in first-use order.
    pub fn transfer_buffers(&self) -> Vec<TransferBufferHandle> {
        let mut handles = Vec::new();
        for handle in self.commands.iter().filter_map(Command::transfer_buffer) {
            if !handles.contains(&handle) {
                handles.push(handle);
            }
        }
        handles
    }

    /// Number of draw calls recorded.
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    Command::DrawPrimitives { .. }
                        | Command::DrawIndexedPrimitives { .. }
                        | Command::DrawPrimitivesIndirect { .. }
                        | Command::DrawIndexedPrimitivesIndirect { .. }
                )
            })
            .count()
    }
}

impl<'a> IntoIterator for &'a CommandList {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::RawHandle;

    #[test]
    fn test_transfer_buffers_are_deduplicated() {
        let a = TransferBufferHandle::from_raw(RawHandle::new(0, 0));
        let b = TransferBufferHandle::from_raw(RawHandle::new(1, 0));
        let buffer = BufferHandle::from_raw(RawHandle::new(0, 0));
        let mut list = CommandList::new();
        list.push(Command::BeginCopyPass);
        for tb in [a, b, a] {
            list.push(Command::UploadToBuffer {
                source: TransferBufferLocation {
                    transfer_buffer: tb,
                    offset: 0,
                },
                destination: BufferRegion {
                    buffer,
                    offset: 0,
                    size: 4,
                },
                cycle: false,
            });
        }
        list.push(Command::EndCopyPass);

        assert_eq!(list.transfer_buffers(), vec![a, b]);
        assert_eq!(list.len(), 5);
        assert!(list.commands()[0].begins_pass());
        assert!(list.commands()[4].ends_pass());
    }
}
