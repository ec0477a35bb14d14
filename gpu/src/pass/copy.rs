//! Copy pass recording.

use crate::command_buffer::CommandBuffer;
use crate::commands::Command;
use crate::types::{
    BufferLocation, BufferRegion, TextureLocation, TextureRegion, TextureTransferInfo,
    TransferBufferLocation,
};

/// An open copy pass.
///
/// Created by [`CommandBuffer::begin_copy_pass`]. Uploads read transfer
/// buffer contents when the submission executes, not when they are recorded.
///
/// `cycle` on a destination asks for fresh backing memory when the resource
/// is still in use by earlier submissions, so the copy does not wait for them.
pub struct CopyPass<'a, 'd> {
    cmd: &'a mut CommandBuffer<'d>,
}

impl<'a, 'd> CopyPass<'a, 'd> {
    pub(crate) fn new(cmd: &'a mut CommandBuffer<'d>) -> Self {
        Self { cmd }
    }

    pub fn upload_to_buffer(
        &mut self,
        source: &TransferBufferLocation,
        destination: &BufferRegion,
        cycle: bool,
    ) {
        if destination.end().is_none() {
            self.cmd.reject("upload_to_buffer: destination region overflows");
            return;
        }
        self.cmd.record(Command::UploadToBuffer {
            source: *source,
            destination: *destination,
            cycle,
        });
    }

    pub fn upload_to_texture(
        &mut self,
        source: &TextureTransferInfo,
        destination: &TextureRegion,
        cycle: bool,
    ) {
        self.cmd.record(Command::UploadToTexture {
            source: *source,
            destination: *destination,
            cycle,
        });
    }

    pub fn copy_buffer_to_buffer(
        &mut self,
        source: &BufferLocation,
        destination: &BufferLocation,
        size: u64,
        cycle: bool,
    ) {
        if source.buffer == destination.buffer
            && source.offset < destination.offset.saturating_add(size)
            && destination.offset < source.offset.saturating_add(size)
        {
            self.cmd
                .reject("copy_buffer_to_buffer: source and destination ranges overlap");
            return;
        }
        self.cmd.record(Command::CopyBufferToBuffer {
            source: *source,
            destination: *destination,
            size,
            cycle,
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn copy_texture_to_texture(
        &mut self,
        source: &TextureLocation,
        destination: &TextureLocation,
        width: u32,
        height: u32,
        depth: u32,
        cycle: bool,
    ) {
        self.cmd.record(Command::CopyTextureToTexture {
            source: *source,
            destination: *destination,
            width,
            height,
            depth,
            cycle,
        });
    }

    /// Copy buffer contents into a transfer buffer. The data is readable once
    /// the submission completes.
    pub fn download_from_buffer(
        &mut self,
        source: &BufferRegion,
        destination: &TransferBufferLocation,
    ) {
        if source.end().is_none() {
            self.cmd.reject("download_from_buffer: source region overflows");
            return;
        }
        self.cmd.record(Command::DownloadFromBuffer {
            source: *source,
            destination: *destination,
        });
    }

    pub fn download_from_texture(
        &mut self,
        source: &TextureRegion,
        destination: &TextureTransferInfo,
    ) {
        self.cmd.record(Command::DownloadFromTexture {
            source: *source,
            destination: *destination,
        });
    }

    /// End the pass. Dropping it has the same effect.
    pub fn end(self) {}
}

impl Drop for CopyPass<'_, '_> {
    fn drop(&mut self) {
        self.cmd.record(Command::EndCopyPass);
    }
}
