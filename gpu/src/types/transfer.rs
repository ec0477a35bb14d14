//! Transfer buffer types.

use crate::handle::TransferBufferHandle;
use crate::resources::TransferBuffer;

/// Direction a transfer buffer moves data in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransferBufferUsage {
    /// Host writes, GPU reads.
    #[default]
    Upload,
    /// GPU writes, host reads.
    Download,
}

/// Descriptor for creating a transfer buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct TransferBufferDescriptor {
    /// Debug label for the transfer buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Transfer direction.
    pub usage: TransferBufferUsage,
}

impl TransferBufferDescriptor {
    pub fn new(size: u64, usage: TransferBufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
        }
    }

    /// Shorthand for an upload buffer.
    pub fn upload(size: u64) -> Self {
        Self::new(size, TransferBufferUsage::Upload)
    }

    /// Shorthand for a download buffer.
    pub fn download(size: u64) -> Self {
        Self::new(size, TransferBufferUsage::Download)
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A byte offset inside a transfer buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferBufferLocation {
    pub transfer_buffer: TransferBufferHandle,
    pub offset: u64,
}

impl TransferBufferLocation {
    pub fn new(transfer_buffer: &TransferBuffer, offset: u64) -> Self {
        Self {
            transfer_buffer: transfer_buffer.handle(),
            offset,
        }
    }
}

/// Layout of texel data inside a transfer buffer.
///
/// A zero `pixels_per_row` or `rows_per_layer` means tightly packed to the
/// width or height of the texture region being transferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureTransferInfo {
    pub transfer_buffer: TransferBufferHandle,
    pub offset: u64,
    pub pixels_per_row: u32,
    pub rows_per_layer: u32,
}

impl TextureTransferInfo {
    /// Tightly packed data starting at `offset`.
    pub fn new(transfer_buffer: &TransferBuffer, offset: u64) -> Self {
        Self {
            transfer_buffer: transfer_buffer.handle(),
            offset,
            pixels_per_row: 0,
            rows_per_layer: 0,
        }
    }

    /// Set explicit row and layer pitches, in pixels and rows.
    pub fn with_layout(mut self, pixels_per_row: u32, rows_per_layer: u32) -> Self {
        self.pixels_per_row = pixels_per_row;
        self.rows_per_layer = rows_per_layer;
        self
    }
}
