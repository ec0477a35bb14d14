//! Shared state of the dummy backend.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use super::storage::{HostMemory, TextureStorage};
use crate::commands::CommandList;
use crate::handle::{CommandBufferHandle, HandleTable, TextureHandle, TransferBufferHandle};
use crate::swapchain::{PresentMode, SwapchainComposition, WindowId};
use crate::types::{
    BufferDescriptor, ComputePipelineDescriptor, GraphicsPipelineDescriptor, SamplerDescriptor,
    ShaderDescriptor, TextureDescriptor, TextureFormat, TransferBufferDescriptor,
};

/// Counters of work executed by the dummy queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    /// Submissions fully executed.
    pub submissions_completed: u64,
    /// Draw calls that passed validation, counting each indirect draw.
    pub draw_calls: u64,
    /// Dispatches that passed validation.
    pub dispatches: u64,
    /// Uploads, downloads and copies executed.
    pub copy_operations: u64,
    /// Blits executed, including one per generated mip level.
    pub blits: u64,
    /// Commands skipped because they failed validation.
    pub validation_errors: u64,
    /// Swapchain images presented.
    pub presented_frames: u64,
}

#[derive(Debug)]
pub(crate) struct BufferEntry {
    pub descriptor: BufferDescriptor,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub(crate) struct TransferBufferEntry {
    pub descriptor: TransferBufferDescriptor,
    pub backing: Arc<HostMemory>,
    /// Cloned by each queued submission that reads or writes `backing`.
    pub uses: Arc<()>,
    pub mapped: bool,
}

impl TransferBufferEntry {
    pub fn in_flight(&self) -> bool {
        Arc::strong_count(&self.uses) > 1
    }
}

#[derive(Debug)]
pub(crate) struct TextureEntry {
    pub descriptor: TextureDescriptor,
    pub storage: TextureStorage,
    /// Set for swapchain images.
    pub window: Option<WindowId>,
}

#[derive(Debug)]
pub(crate) struct GraphicsPipelineEntry {
    pub descriptor: GraphicsPipelineDescriptor,
    pub vertex: ShaderDescriptor,
    pub fragment: ShaderDescriptor,
}

#[derive(Debug)]
pub(crate) struct FenceEntry {
    pub submission: u64,
}

#[derive(Debug, Default)]
pub(crate) struct CommandBufferEntry {
    /// Swapchain images acquired while recording.
    pub swapchain_images: Vec<(WindowId, TextureHandle)>,
}

#[derive(Debug)]
pub(crate) struct WindowEntry {
    pub width: u32,
    pub height: u32,
    pub claimed: bool,
    pub composition: SwapchainComposition,
    pub present_mode: PresentMode,
    /// Set by a resize, cleared by the acquire that reports it.
    pub out_of_date: bool,
    /// Images acquired and not yet presented or discarded.
    pub frames_in_flight: u32,
    /// Of those, images whose command buffer is already queued.
    pub frames_queued: u32,
    pub images: Vec<TextureHandle>,
    pub next_image: usize,
    pub presented: u64,
    pub last_presented: Option<Vec<u8>>,
}

impl WindowEntry {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            claimed: false,
            composition: SwapchainComposition::Sdr,
            present_mode: PresentMode::Vsync,
            out_of_date: false,
            frames_in_flight: 0,
            frames_queued: 0,
            images: Vec::new(),
            next_image: 0,
            presented: 0,
            last_presented: None,
        }
    }

    pub fn format(&self) -> TextureFormat {
        match self.composition {
            SwapchainComposition::SdrLinear => TextureFormat::Bgra8UnormSrgb,
            SwapchainComposition::HdrExtendedLinear => TextureFormat::Rgba16Float,
            _ => TextureFormat::Bgra8Unorm,
        }
    }
}

/// A queued unit of work.
#[derive(Debug)]
pub(crate) struct Submission {
    pub id: u64,
    pub commands: CommandList,
    /// Backings resolved at submit time, so cycling after submit is safe.
    pub transfers: HashMap<TransferBufferHandle, Arc<HostMemory>>,
    pub transfer_uses: Vec<Arc<()>>,
    pub swapchain_images: Vec<(WindowId, TextureHandle)>,
}

#[derive(Debug, Default)]
pub(crate) struct State {
    pub buffers: HandleTable<BufferEntry>,
    pub transfer_buffers: HandleTable<TransferBufferEntry>,
    pub textures: HandleTable<TextureEntry>,
    pub samplers: HandleTable<SamplerDescriptor>,
    pub shaders: HandleTable<ShaderDescriptor>,
    pub graphics_pipelines: HandleTable<GraphicsPipelineEntry>,
    pub compute_pipelines: HandleTable<ComputePipelineDescriptor>,
    pub fences: HandleTable<FenceEntry>,
    pub command_buffers: HandleTable<CommandBufferEntry>,
    pub windows: HashMap<WindowId, WindowEntry>,
    pub next_window: u64,

    pub queue: VecDeque<Submission>,
    /// Id of the most recent submission; ids start at 1.
    pub last_submitted: u64,
    /// Id of the most recent completed submission.
    pub completed: u64,
    /// Whether the worker is executing a popped submission.
    pub executing: bool,
    pub suspended: bool,
    pub shutdown: bool,
    pub destroyed: bool,

    pub frames_in_flight: u32,
    pub memory_used: u64,
    pub stats: ExecutionStats,
}

impl State {
    pub fn new() -> Self {
        Self {
            next_window: 1,
            frames_in_flight: 2,
            ..Default::default()
        }
    }

    pub fn is_idle(&self) -> bool {
        self.completed == self.last_submitted
    }

    /// Application-created resources, excluding swapchain images.
    pub fn live_resources(&self) -> usize {
        let textures = self
            .textures
            .iter()
            .filter(|(_, entry)| entry.window.is_none())
            .count();
        self.buffers.len()
            + self.transfer_buffers.len()
            + textures
            + self.samplers.len()
            + self.shaders.len()
            + self.graphics_pipelines.len()
            + self.compute_pipelines.len()
            + self.fences.len()
    }

    pub fn command_buffer(&self, handle: CommandBufferHandle) -> Option<&CommandBufferEntry> {
        self.command_buffers.get(handle.raw())
    }

    /// Drop a window's swapchain images so the next acquire recreates them.
    pub fn drop_swapchain_images(&mut self, window: WindowId) {
        let Some(entry) = self.windows.get_mut(&window) else {
            return;
        };
        let images = std::mem::take(&mut entry.images);
        entry.next_image = 0;
        for image in images {
            self.textures.remove(image.raw());
        }
    }
}
