//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't talk to graphics hardware. Resource contents live in
//! host memory and a single worker thread plays the role of the GPU queue:
//! submissions execute in order, copy work and clears happen for real, and
//! draws and dispatches are validated and counted. Windows are simulated, so
//! swapchain behaviour (frames in flight, out-of-date surfaces, presentation)
//! can be exercised without a display.

mod executor;
mod state;
mod storage;

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};

use self::executor::Executor;
use self::state::{
    BufferEntry, CommandBufferEntry, FenceEntry, GraphicsPipelineEntry, State, Submission,
    TextureEntry, TransferBufferEntry, WindowEntry,
};
use self::storage::{HostMemory, TextureStorage};
use super::{GpuBackend, MappedMemory};
use crate::commands::CommandList;
use crate::error::GpuError;
use crate::handle::{
    BufferHandle, CommandBufferHandle, ComputePipelineHandle, FenceHandle,
    GraphicsPipelineHandle, SamplerHandle, ShaderHandle, TextureHandle, TransferBufferHandle,
};
use crate::limits::{FRAMES_IN_FLIGHT_RANGE, MAX_COLOR_TARGETS, MAX_COMPUTE_WRITE_BINDINGS};
use crate::swapchain::{PresentMode, SwapchainComposition, SwapchainTexture, WindowId};
use crate::types::{
    BufferDescriptor, ComputePipelineDescriptor, GraphicsPipelineDescriptor, SampleCount,
    SamplerDescriptor, ShaderDescriptor, ShaderFormat, ShaderStage, TextureDescriptor,
    TextureFormat, TextureType, TextureUsage, TransferBufferDescriptor,
};

pub use self::state::ExecutionStats;

/// Name under which the dummy backend is selected.
pub const DRIVER_NAME: &str = "dummy";

/// Default size of a window claimed without being registered first.
const DEFAULT_WINDOW_SIZE: (u32, u32) = (640, 480);

/// Swapchain images allocated per window.
const SWAPCHAIN_IMAGES: usize = 3;

/// Configuration of a [`DummyBackend`].
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Shader formats accepted by shader and pipeline creation.
    pub shader_formats: ShaderFormat,
    /// Total bytes of buffer, transfer buffer and texture storage.
    pub memory_budget: u64,
    /// Command buffers that may be recording at once.
    pub max_command_buffers: usize,
    /// Artificial delay before each submission executes.
    pub submit_latency: Duration,
    /// Log validation failures at error level instead of debug.
    pub debug_mode: bool,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            shader_formats: ShaderFormat::SPIRV | ShaderFormat::DXIL | ShaderFormat::MSL,
            memory_budget: 256 * 1024 * 1024,
            max_command_buffers: 64,
            submit_latency: Duration::ZERO,
            debug_mode: true,
        }
    }
}

struct Shared {
    config: DummyConfig,
    state: Mutex<State>,
    /// Signalled when work is queued, execution resumes or shutdown begins.
    queue_cv: Condvar,
    /// Signalled when a submission completes or frames are released.
    done_cv: Condvar,
}

/// Joins the queue worker when the last backend clone goes away.
struct WorkerThread {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        self.shared.state.lock().shutdown = true;
        self.shared.queue_cv.notify_all();
        if let Some(handle) = self.handle.lock().take()
            && handle.join().is_err()
        {
            log::error!("DummyBackend: queue worker panicked");
        }
    }
}

/// CPU-side backend with a simulated queue and simulated windows.
///
/// Cloning yields another handle to the same backend, which lets tests keep
/// access to the simulation helpers ([`add_window`](Self::add_window),
/// [`stats`](Self::stats), ...) after handing the backend to a device.
#[derive(Clone)]
pub struct DummyBackend {
    shared: Arc<Shared>,
    _worker: Arc<WorkerThread>,
}

impl std::fmt::Debug for DummyBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DummyBackend")
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyBackend {
    /// Create a dummy backend with the default configuration.
    pub fn new() -> Self {
        Self::with_config(DummyConfig::default())
    }

    /// Create a dummy backend.
    pub fn with_config(config: DummyConfig) -> Self {
        let shared = Arc::new(Shared {
            config,
            state: Mutex::new(State::new()),
            queue_cv: Condvar::new(),
            done_cv: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("gpu: dummy queue".into())
            .spawn(move || worker_loop(worker_shared));
        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("DummyBackend: failed to spawn queue worker: {e}");
                None
            }
        };
        log::debug!("DummyBackend: created with {:?}", shared.config);
        Self {
            _worker: Arc::new(WorkerThread {
                shared: Arc::clone(&shared),
                handle: Mutex::new(handle),
            }),
            shared,
        }
    }

    pub fn config(&self) -> &DummyConfig {
        &self.shared.config
    }

    /// Register a simulated window.
    pub fn add_window(&self, width: u32, height: u32) -> WindowId {
        let mut state = self.shared.state.lock();
        new_window(&mut state, width, height)
    }

    /// Resize a simulated window. A claimed window reports its swapchain as
    /// out of date on the next acquire.
    pub fn resize_window(&self, window: WindowId, width: u32, height: u32) {
        let mut state = self.shared.state.lock();
        if let Some(entry) = state.windows.get_mut(&window) {
            entry.width = width;
            entry.height = height;
            entry.out_of_date = entry.claimed;
        }
    }

    /// Remove a simulated window, releasing it first if claimed.
    pub fn remove_window(&self, window: WindowId) {
        self.release_window(window);
        self.shared.state.lock().windows.remove(&window);
    }

    /// Texels of the image most recently presented to `window`.
    pub fn presented_frame(&self, window: WindowId) -> Option<Vec<u8>> {
        let state = self.shared.state.lock();
        state.windows.get(&window)?.last_presented.clone()
    }

    /// Number of images presented to `window`.
    pub fn presented_count(&self, window: WindowId) -> u64 {
        let state = self.shared.state.lock();
        state.windows.get(&window).map_or(0, |entry| entry.presented)
    }

    /// Work counters since creation.
    pub fn stats(&self) -> ExecutionStats {
        self.shared.state.lock().stats
    }

    /// Hold queued submissions until [`resume_execution`](Self::resume_execution).
    pub fn suspend_execution(&self) {
        self.shared.state.lock().suspended = true;
    }

    pub fn resume_execution(&self) {
        self.shared.state.lock().suspended = false;
        self.shared.queue_cv.notify_all();
    }

    fn lock_alive(&self) -> Result<MutexGuard<'_, State>, GpuError> {
        let state = self.shared.state.lock();
        if state.destroyed {
            return Err(GpuError::DeviceDestroyed);
        }
        Ok(state)
    }

    fn reserve_memory(&self, state: &mut State, bytes: u64) -> Result<(), GpuError> {
        let used = state.memory_used.saturating_add(bytes);
        if used > self.shared.config.memory_budget {
            log::warn!(
                "DummyBackend: allocation of {bytes} bytes exceeds budget ({} of {} used)",
                state.memory_used,
                self.shared.config.memory_budget
            );
            return Err(GpuError::OutOfMemory);
        }
        state.memory_used = used;
        Ok(())
    }

    fn check_shader_format(&self, format: ShaderFormat) -> Result<(), GpuError> {
        if format.bits().count_ones() != 1 {
            return Err(GpuError::InvalidParameter(format!(
                "shader code must have exactly one format, got {format:?}"
            )));
        }
        if !self.shared.config.shader_formats.contains(format) {
            return Err(GpuError::FeatureNotSupported(format!(
                "shader format {format:?} (accepted: {:?})",
                self.shared.config.shader_formats
            )));
        }
        Ok(())
    }

    fn wait_idle_locked(&self, state: &mut MutexGuard<'_, State>) {
        while !state.is_idle() {
            self.shared.done_cv.wait(state);
        }
    }
}

fn new_window(state: &mut State, width: u32, height: u32) -> WindowId {
    let id = state.next_window;
    state.next_window += 1;
    let window = match WindowId::from_raw(id) {
        Some(window) => window,
        None => unreachable!("window ids start at 1"),
    };
    state.windows.insert(window, WindowEntry::new(width, height));
    window
}

fn texture_storage(descriptor: &TextureDescriptor) -> TextureStorage {
    let level_sizes: Vec<u64> = (0..descriptor.num_levels)
        .map(|level| {
            let (w, h, d) = descriptor.level_extent(level);
            descriptor.format.calculate_size(w, h, d)
        })
        .collect();
    TextureStorage::new(descriptor.array_layers(), &level_sizes)
}

/// Give back the swapchain images held by a command buffer that will never
/// present them.
fn discard_frames(state: &mut State, images: &[(WindowId, TextureHandle)]) {
    for (window, _) in images {
        if let Some(entry) = state.windows.get_mut(window) {
            entry.frames_in_flight = entry.frames_in_flight.saturating_sub(1);
        }
    }
}

fn worker_loop(shared: Arc<Shared>) {
    lumen_core::set_thread_name!("gpu: dummy queue");
    loop {
        let mut state = shared.state.lock();
        while !state.shutdown && (state.suspended || state.queue.is_empty()) {
            shared.queue_cv.wait(&mut state);
        }
        let Some(submission) = state.queue.pop_front() else {
            break;
        };
        lumen_core::profile_plot!("dummy: queued submissions", state.queue.len());
        state.executing = true;
        drop(state);

        if !shared.config.submit_latency.is_zero() {
            std::thread::sleep(shared.config.submit_latency);
        }

        lumen_core::profile_scope!("dummy: execute submission");
        let mut state = shared.state.lock();
        let Submission {
            id,
            commands,
            transfers,
            transfer_uses,
            swapchain_images,
        } = submission;
        log::trace!("DummyBackend: executing submission {id} ({} commands)", commands.len());
        let executed = panic::catch_unwind(AssertUnwindSafe(|| {
            Executor::new(&mut state, &transfers, shared.config.debug_mode).run(&commands);
        }));
        if executed.is_err() {
            state.stats.validation_errors += 1;
            log::error!("DummyBackend: submission {id} aborted during execution");
        }
        present(&mut state, &swapchain_images);

        state.completed = id;
        state.executing = false;
        state.stats.submissions_completed += 1;
        // Uses must be dropped before waiters re-check them.
        drop(transfers);
        drop(transfer_uses);
        drop(state);
        shared.done_cv.notify_all();
    }
    log::debug!("DummyBackend: queue worker stopped");
}

fn present(state: &mut State, images: &[(WindowId, TextureHandle)]) {
    for &(window, image) in images {
        let contents = state
            .textures
            .get(image.raw())
            .and_then(|entry| entry.storage.get(0, 0))
            .map(<[u8]>::to_vec);
        let Some(entry) = state.windows.get_mut(&window) else {
            continue;
        };
        entry.frames_in_flight = entry.frames_in_flight.saturating_sub(1);
        entry.frames_queued = entry.frames_queued.saturating_sub(1);
        if !entry.claimed {
            continue;
        }
        if let Some(contents) = contents {
            entry.last_presented = Some(contents);
            entry.presented += 1;
            state.stats.presented_frames += 1;
            lumen_core::frame_mark!();
        }
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn shader_formats(&self) -> ShaderFormat {
        self.shared.config.shader_formats
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferHandle, GpuError> {
        log::trace!(
            "DummyBackend: creating buffer {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );
        if descriptor.size == 0 {
            return Err(GpuError::InvalidParameter("buffer size must be non-zero".into()));
        }
        let mut state = self.lock_alive()?;
        self.reserve_memory(&mut state, descriptor.size)?;
        let raw = state.buffers.insert(BufferEntry {
            descriptor: descriptor.clone(),
            data: vec![0u8; descriptor.size as usize],
        });
        Ok(BufferHandle::from_raw(raw))
    }

    fn release_buffer(&self, buffer: BufferHandle) {
        let mut state = self.shared.state.lock();
        if let Some(entry) = state.buffers.remove(buffer.raw()) {
            state.memory_used = state.memory_used.saturating_sub(entry.descriptor.size);
        }
    }

    fn set_buffer_name(&self, buffer: BufferHandle, name: &str) {
        if let Some(entry) = self.shared.state.lock().buffers.get_mut(buffer.raw()) {
            entry.descriptor.label = Some(name.to_owned());
        }
    }

    fn create_transfer_buffer(
        &self,
        descriptor: &TransferBufferDescriptor,
    ) -> Result<TransferBufferHandle, GpuError> {
        log::trace!(
            "DummyBackend: creating transfer buffer {:?} (size: {}, {:?})",
            descriptor.label,
            descriptor.size,
            descriptor.usage
        );
        if descriptor.size == 0 {
            return Err(GpuError::InvalidParameter(
                "transfer buffer size must be non-zero".into(),
            ));
        }
        let mut state = self.lock_alive()?;
        self.reserve_memory(&mut state, descriptor.size)?;
        let raw = state.transfer_buffers.insert(TransferBufferEntry {
            descriptor: descriptor.clone(),
            backing: Arc::new(HostMemory::zeroed(descriptor.size as usize)),
            uses: Arc::new(()),
            mapped: false,
        });
        Ok(TransferBufferHandle::from_raw(raw))
    }

    fn release_transfer_buffer(&self, transfer_buffer: TransferBufferHandle) {
        let mut state = self.shared.state.lock();
        if let Some(entry) = state.transfer_buffers.remove(transfer_buffer.raw()) {
            state.memory_used = state.memory_used.saturating_sub(entry.descriptor.size);
        }
    }

    fn map_transfer_buffer(
        &self,
        transfer_buffer: TransferBufferHandle,
        cycle: bool,
    ) -> Result<MappedMemory, GpuError> {
        let mut state = self.lock_alive()?;
        loop {
            let entry = state
                .transfer_buffers
                .get_mut(transfer_buffer.raw())
                .ok_or_else(|| {
                    GpuError::InvalidParameter(format!(
                        "transfer buffer {transfer_buffer:?} is not alive"
                    ))
                })?;
            if entry.mapped {
                return Err(GpuError::InvalidState(
                    "transfer buffer is already mapped".into(),
                ));
            }
            let in_flight = entry.in_flight();
            if in_flight && cycle {
                log::trace!("DummyBackend: cycling transfer buffer {transfer_buffer:?}");
                entry.backing = Arc::new(HostMemory::zeroed(entry.backing.len()));
                entry.uses = Arc::new(());
            }
            if !in_flight || cycle {
                entry.mapped = true;
                let backing = Arc::clone(&entry.backing);
                // SAFETY: the backing is unreferenced by any submission, and
                // the mapping keeps it alive past a release or device teardown.
                let memory = unsafe { MappedMemory::new(backing.as_ptr(), backing.len()) };
                return Ok(memory.with_owner(backing));
            }
            self.shared.done_cv.wait(&mut state);
        }
    }

    fn unmap_transfer_buffer(&self, transfer_buffer: TransferBufferHandle) {
        if let Some(entry) = self
            .shared
            .state
            .lock()
            .transfer_buffers
            .get_mut(transfer_buffer.raw())
        {
            entry.mapped = false;
        }
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureHandle, GpuError> {
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{}x{}, {:?})",
            descriptor.label,
            descriptor.width,
            descriptor.height,
            descriptor.layer_count_or_depth,
            descriptor.format
        );
        if descriptor.width == 0 || descriptor.height == 0 || descriptor.layer_count_or_depth == 0
        {
            return Err(GpuError::InvalidParameter(
                "texture dimensions must be non-zero".into(),
            ));
        }
        if descriptor.num_levels == 0 || descriptor.num_levels > descriptor.max_mip_levels() {
            return Err(GpuError::InvalidParameter(format!(
                "{} mip levels requested, at most {} allowed",
                descriptor.num_levels,
                descriptor.max_mip_levels()
            )));
        }
        if matches!(descriptor.texture_type, TextureType::Cube | TextureType::CubeArray)
            && (descriptor.width != descriptor.height || descriptor.layer_count_or_depth % 6 != 0)
        {
            return Err(GpuError::InvalidParameter(
                "cube textures need square faces and a multiple of 6 layers".into(),
            ));
        }
        if !self.texture_supports_format(descriptor.format, descriptor.texture_type, descriptor.usage)
        {
            return Err(GpuError::FeatureNotSupported(format!(
                "{:?} {:?} with usage {:?}",
                descriptor.texture_type, descriptor.format, descriptor.usage
            )));
        }
        if descriptor.sample_count.is_multisampled()
            && (descriptor.texture_type != TextureType::TwoD
                || descriptor.num_levels != 1
                || !self.texture_supports_sample_count(descriptor.format, descriptor.sample_count))
        {
            return Err(GpuError::InvalidParameter(
                "multisampled textures must be single-level 2D in a supported format".into(),
            ));
        }

        let storage = texture_storage(descriptor);
        let mut state = self.lock_alive()?;
        self.reserve_memory(&mut state, storage.total_size())?;
        let raw = state.textures.insert(TextureEntry {
            descriptor: descriptor.clone(),
            storage,
            window: None,
        });
        Ok(TextureHandle::from_raw(raw))
    }

    fn release_texture(&self, texture: TextureHandle) {
        let mut state = self.shared.state.lock();
        let is_swapchain_image = state
            .textures
            .get(texture.raw())
            .is_some_and(|entry| entry.window.is_some());
        if is_swapchain_image {
            log::warn!("DummyBackend: ignoring release of swapchain texture {texture:?}");
            return;
        }
        if let Some(entry) = state.textures.remove(texture.raw()) {
            state.memory_used = state.memory_used.saturating_sub(entry.storage.total_size());
        }
    }

    fn set_texture_name(&self, texture: TextureHandle, name: &str) {
        if let Some(entry) = self.shared.state.lock().textures.get_mut(texture.raw()) {
            entry.descriptor.label = Some(name.to_owned());
        }
    }

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> Result<SamplerHandle, GpuError> {
        log::trace!("DummyBackend: creating sampler {:?}", descriptor.label);
        if descriptor.min_lod > descriptor.max_lod {
            return Err(GpuError::InvalidParameter(format!(
                "min_lod {} exceeds max_lod {}",
                descriptor.min_lod, descriptor.max_lod
            )));
        }
        if let Some(anisotropy) = descriptor.max_anisotropy
            && !(1.0..=16.0).contains(&anisotropy)
        {
            return Err(GpuError::InvalidParameter(format!(
                "max anisotropy {anisotropy} outside 1..=16"
            )));
        }
        let mut state = self.lock_alive()?;
        Ok(SamplerHandle::from_raw(state.samplers.insert(descriptor.clone())))
    }

    fn release_sampler(&self, sampler: SamplerHandle) {
        self.shared.state.lock().samplers.remove(sampler.raw());
    }

    fn create_shader(&self, descriptor: &ShaderDescriptor) -> Result<ShaderHandle, GpuError> {
        log::trace!(
            "DummyBackend: creating {:?} shader {:?} ({} bytes of {:?})",
            descriptor.stage,
            descriptor.label,
            descriptor.code.len(),
            descriptor.format
        );
        if descriptor.code.is_empty() {
            return Err(GpuError::InvalidParameter("shader code is empty".into()));
        }
        if descriptor.entry_point.is_empty() {
            return Err(GpuError::InvalidParameter("shader entry point is empty".into()));
        }
        self.check_shader_format(descriptor.format)?;
        let mut state = self.lock_alive()?;
        Ok(ShaderHandle::from_raw(state.shaders.insert(descriptor.clone())))
    }

    fn release_shader(&self, shader: ShaderHandle) {
        self.shared.state.lock().shaders.remove(shader.raw());
    }

    fn create_graphics_pipeline(
        &self,
        descriptor: &GraphicsPipelineDescriptor,
    ) -> Result<GraphicsPipelineHandle, GpuError> {
        log::trace!("DummyBackend: creating graphics pipeline {:?}", descriptor.label);
        let targets = &descriptor.target_info.color_target_descriptions;
        if targets.len() > MAX_COLOR_TARGETS {
            return Err(GpuError::InvalidParameter(format!(
                "{} color targets, at most {MAX_COLOR_TARGETS} allowed",
                targets.len()
            )));
        }
        if targets.is_empty() && descriptor.target_info.depth_stencil_format.is_none() {
            return Err(GpuError::InvalidParameter(
                "graphics pipeline has no render targets".into(),
            ));
        }
        if let Some(format) = descriptor.target_info.depth_stencil_format
            && !format.is_depth_stencil()
        {
            return Err(GpuError::InvalidParameter(format!(
                "{format:?} is not a depth format"
            )));
        }
        if let Some(target) = targets.iter().find(|t| t.format.is_depth_stencil()) {
            return Err(GpuError::InvalidParameter(format!(
                "{:?} is not a color format",
                target.format
            )));
        }
        let input = &descriptor.vertex_input_state;
        if let Some(attribute) = input
            .attributes
            .iter()
            .find(|a| !input.buffers.iter().any(|b| b.slot == a.buffer_slot))
        {
            return Err(GpuError::InvalidParameter(format!(
                "vertex attribute {} reads undescribed buffer slot {}",
                attribute.location, attribute.buffer_slot
            )));
        }

        let mut state = self.lock_alive()?;
        let shader = |handle: ShaderHandle, stage: ShaderStage| {
            let desc = state.shaders.get(handle.raw()).ok_or_else(|| {
                GpuError::InvalidParameter(format!("{stage:?} shader {handle:?} is not alive"))
            })?;
            if desc.stage != stage {
                return Err(GpuError::InvalidParameter(format!(
                    "shader {handle:?} is a {:?} shader, expected {stage:?}",
                    desc.stage
                )));
            }
            Ok(desc.clone())
        };
        let vertex = shader(descriptor.vertex_shader, ShaderStage::Vertex)?;
        let fragment = shader(descriptor.fragment_shader, ShaderStage::Fragment)?;
        let raw = state.graphics_pipelines.insert(GraphicsPipelineEntry {
            descriptor: descriptor.clone(),
            vertex,
            fragment,
        });
        Ok(GraphicsPipelineHandle::from_raw(raw))
    }

    fn release_graphics_pipeline(&self, pipeline: GraphicsPipelineHandle) {
        self.shared.state.lock().graphics_pipelines.remove(pipeline.raw());
    }

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> Result<ComputePipelineHandle, GpuError> {
        log::trace!("DummyBackend: creating compute pipeline {:?}", descriptor.label);
        if descriptor.code.is_empty() {
            return Err(GpuError::InvalidParameter("compute shader code is empty".into()));
        }
        self.check_shader_format(descriptor.format)?;
        if descriptor.threadcount_x == 0 || descriptor.threadcount_y == 0 || descriptor.threadcount_z == 0
        {
            return Err(GpuError::InvalidParameter(
                "compute thread counts must be non-zero".into(),
            ));
        }
        let max = MAX_COMPUTE_WRITE_BINDINGS as u32;
        if descriptor.num_readwrite_storage_textures > max
            || descriptor.num_readwrite_storage_buffers > max
        {
            return Err(GpuError::InvalidParameter(format!(
                "at most {max} read-write storage textures and buffers"
            )));
        }
        let mut state = self.lock_alive()?;
        Ok(ComputePipelineHandle::from_raw(
            state.compute_pipelines.insert(descriptor.clone()),
        ))
    }

    fn release_compute_pipeline(&self, pipeline: ComputePipelineHandle) {
        self.shared.state.lock().compute_pipelines.remove(pipeline.raw());
    }

    fn texture_supports_format(
        &self,
        format: TextureFormat,
        texture_type: TextureType,
        usage: TextureUsage,
    ) -> bool {
        let storage = TextureUsage::GRAPHICS_STORAGE_READ
            | TextureUsage::COMPUTE_STORAGE_READ
            | TextureUsage::COMPUTE_STORAGE_WRITE
            | TextureUsage::COMPUTE_STORAGE_SIMULTANEOUS_READ_WRITE;
        if format.is_depth_stencil() {
            !texture_type.is_volume()
                && !usage.intersects(storage | TextureUsage::COLOR_TARGET)
        } else {
            !usage.contains(TextureUsage::DEPTH_STENCIL_TARGET)
                && !(format.is_srgb() && usage.intersects(storage))
        }
    }

    fn texture_supports_sample_count(&self, format: TextureFormat, sample_count: SampleCount) -> bool {
        match sample_count {
            SampleCount::One | SampleCount::Two | SampleCount::Four => true,
            SampleCount::Eight => format.block_size() <= 4,
        }
    }

    fn claim_window(&self, window: WindowId) -> Result<(), GpuError> {
        let mut state = self.lock_alive()?;
        if !state.windows.contains_key(&window) {
            let (width, height) = DEFAULT_WINDOW_SIZE;
            state.windows.insert(window, WindowEntry::new(width, height));
            state.next_window = state.next_window.max(window.raw() + 1);
        }
        let Some(entry) = state.windows.get_mut(&window) else {
            return Err(GpuError::Internal("window vanished while claiming".into()));
        };
        if entry.claimed {
            return Err(GpuError::InvalidState(format!(
                "window {} is already claimed",
                window.raw()
            )));
        }
        entry.claimed = true;
        entry.out_of_date = false;
        log::debug!("DummyBackend: claimed window {} ({}x{})", window.raw(), entry.width, entry.height);
        Ok(())
    }

    fn release_window(&self, window: WindowId) {
        let mut state = self.shared.state.lock();
        if !state.windows.get(&window).is_some_and(|entry| entry.claimed) {
            return;
        }
        self.wait_idle_locked(&mut state);
        state.drop_swapchain_images(window);
        if let Some(entry) = state.windows.get_mut(&window) {
            entry.claimed = false;
            entry.frames_in_flight = 0;
            entry.frames_queued = 0;
            entry.composition = SwapchainComposition::Sdr;
            entry.present_mode = PresentMode::Vsync;
        }
        log::debug!("DummyBackend: released window {}", window.raw());
    }

    fn is_window_claimed(&self, window: WindowId) -> bool {
        let state = self.shared.state.lock();
        state.windows.get(&window).is_some_and(|entry| entry.claimed)
    }

    fn window_supports_swapchain_composition(
        &self,
        window: WindowId,
        composition: SwapchainComposition,
    ) -> bool {
        self.is_window_claimed(window)
            && matches!(
                composition,
                SwapchainComposition::Sdr | SwapchainComposition::SdrLinear
            )
    }

    fn window_supports_present_mode(&self, window: WindowId, present_mode: PresentMode) -> bool {
        self.is_window_claimed(window)
            && matches!(present_mode, PresentMode::Vsync | PresentMode::Immediate)
    }

    fn set_swapchain_parameters(
        &self,
        window: WindowId,
        composition: SwapchainComposition,
        present_mode: PresentMode,
    ) -> Result<(), GpuError> {
        if !self.is_window_claimed(window) {
            return Err(GpuError::WindowNotClaimed);
        }
        if !self.window_supports_swapchain_composition(window, composition) {
            return Err(GpuError::FeatureNotSupported(format!(
                "swapchain composition {composition:?}"
            )));
        }
        if !self.window_supports_present_mode(window, present_mode) {
            return Err(GpuError::FeatureNotSupported(format!(
                "present mode {present_mode:?}"
            )));
        }
        let mut state = self.lock_alive()?;
        self.wait_idle_locked(&mut state);
        let recreate = match state.windows.get_mut(&window) {
            Some(entry) => {
                let changed = entry.composition != composition;
                entry.composition = composition;
                entry.present_mode = present_mode;
                changed
            }
            None => return Err(GpuError::WindowNotClaimed),
        };
        if recreate {
            state.drop_swapchain_images(window);
        }
        Ok(())
    }

    fn set_allowed_frames_in_flight(&self, frames: u32) -> Result<(), GpuError> {
        if !FRAMES_IN_FLIGHT_RANGE.contains(&frames) {
            return Err(GpuError::InvalidParameter(format!(
                "frames in flight must be in {FRAMES_IN_FLIGHT_RANGE:?}, got {frames}"
            )));
        }
        let mut state = self.lock_alive()?;
        self.wait_idle_locked(&mut state);
        state.frames_in_flight = frames;
        Ok(())
    }

    fn swapchain_texture_format(&self, window: WindowId) -> Result<TextureFormat, GpuError> {
        let state = self.lock_alive()?;
        match state.windows.get(&window) {
            Some(entry) if entry.claimed => Ok(entry.format()),
            _ => Err(GpuError::WindowNotClaimed),
        }
    }

    fn wait_for_swapchain(&self, window: WindowId) -> Result<(), GpuError> {
        let mut state = self.lock_alive()?;
        loop {
            let limit = state.frames_in_flight;
            let entry = match state.windows.get(&window) {
                Some(entry) if entry.claimed => entry,
                _ => return Err(GpuError::WindowNotClaimed),
            };
            if entry.frames_in_flight < limit || entry.frames_queued == 0 {
                return Ok(());
            }
            self.shared.done_cv.wait(&mut state);
        }
    }

    fn acquire_command_buffer(&self) -> Result<CommandBufferHandle, GpuError> {
        let mut state = self.lock_alive()?;
        let max = self.shared.config.max_command_buffers;
        if state.command_buffers.len() >= max {
            return Err(GpuError::ResourceExhausted(format!(
                "{max} command buffers are already recording"
            )));
        }
        let raw = state.command_buffers.insert(CommandBufferEntry::default());
        Ok(CommandBufferHandle::from_raw(raw))
    }

    fn acquire_swapchain_texture(
        &self,
        command_buffer: CommandBufferHandle,
        window: WindowId,
        wait: bool,
    ) -> Result<Option<SwapchainTexture>, GpuError> {
        let mut state = self.lock_alive()?;
        loop {
            let holds_window = state
                .command_buffer(command_buffer)
                .ok_or_else(|| {
                    GpuError::InvalidState(format!(
                        "command buffer {command_buffer:?} is not recording"
                    ))
                })?
                .swapchain_images
                .iter()
                .any(|(w, _)| *w == window);
            let limit = state.frames_in_flight;
            let entry = match state.windows.get_mut(&window) {
                Some(entry) if entry.claimed => entry,
                _ => return Err(GpuError::WindowNotClaimed),
            };
            if holds_window {
                return Err(GpuError::InvalidState(format!(
                    "command buffer already acquired a swapchain texture for window {}",
                    window.raw()
                )));
            }
            if entry.out_of_date {
                entry.out_of_date = false;
                state.drop_swapchain_images(window);
                return Err(GpuError::SwapchainOutOfDate);
            }
            if entry.frames_in_flight < limit {
                break;
            }
            if !wait || entry.frames_queued == 0 {
                return Ok(None);
            }
            self.shared.done_cv.wait(&mut state);
        }

        let State {
            windows, textures, ..
        } = &mut *state;
        let Some(entry) = windows.get_mut(&window) else {
            return Err(GpuError::WindowNotClaimed);
        };
        if entry.images.is_empty() {
            let descriptor = TextureDescriptor::new_2d(
                entry.width,
                entry.height,
                entry.format(),
                TextureUsage::COLOR_TARGET,
            )
            .with_label(format!("swapchain {}", window.raw()));
            for _ in 0..SWAPCHAIN_IMAGES {
                let raw = textures.insert(TextureEntry {
                    descriptor: descriptor.clone(),
                    storage: texture_storage(&descriptor),
                    window: Some(window),
                });
                entry.images.push(TextureHandle::from_raw(raw));
            }
        }
        let image = entry.images[entry.next_image % entry.images.len()];
        entry.next_image = (entry.next_image + 1) % entry.images.len();
        entry.frames_in_flight += 1;
        let acquired = SwapchainTexture {
            window,
            texture: image,
            format: entry.format(),
            width: entry.width,
            height: entry.height,
        };
        if let Some(cb) = state.command_buffers.get_mut(command_buffer.raw()) {
            cb.swapchain_images.push((window, image));
        }
        Ok(Some(acquired))
    }

    fn submit(
        &self,
        command_buffer: CommandBufferHandle,
        commands: CommandList,
        signal_fence: bool,
    ) -> Result<Option<FenceHandle>, GpuError> {
        let mut state = self.lock_alive()?;
        let entry = state
            .command_buffers
            .remove(command_buffer.raw())
            .ok_or_else(|| {
                GpuError::InvalidState(format!(
                    "command buffer {command_buffer:?} was already submitted or cancelled"
                ))
            })?;

        let mut transfers = HashMap::new();
        let mut transfer_uses = Vec::new();
        for handle in commands.transfer_buffers() {
            let Some(tb) = state.transfer_buffers.get(handle.raw()) else {
                continue;
            };
            if tb.mapped {
                discard_frames(&mut state, &entry.swapchain_images);
                self.shared.done_cv.notify_all();
                return Err(GpuError::InvalidState(format!(
                    "transfer buffer {handle:?} is mapped at submit"
                )));
            }
            transfers.insert(handle, Arc::clone(&tb.backing));
            transfer_uses.push(Arc::clone(&tb.uses));
        }

        state.last_submitted += 1;
        let id = state.last_submitted;
        for (window, _) in &entry.swapchain_images {
            if let Some(window) = state.windows.get_mut(window) {
                window.frames_queued += 1;
            }
        }
        let fence = signal_fence
            .then(|| FenceHandle::from_raw(state.fences.insert(FenceEntry { submission: id })));
        log::trace!(
            "DummyBackend: queued submission {id} ({} commands, {} draws)",
            commands.len(),
            commands.draw_count()
        );
        state.queue.push_back(Submission {
            id,
            commands,
            transfers,
            transfer_uses,
            swapchain_images: entry.swapchain_images,
        });
        drop(state);
        self.shared.queue_cv.notify_one();
        Ok(fence)
    }

    fn cancel(&self, command_buffer: CommandBufferHandle) -> Result<(), GpuError> {
        let mut state = self.shared.state.lock();
        let entry = state
            .command_buffers
            .remove(command_buffer.raw())
            .ok_or_else(|| {
                GpuError::InvalidState(format!(
                    "command buffer {command_buffer:?} was already submitted or cancelled"
                ))
            })?;
        discard_frames(&mut state, &entry.swapchain_images);
        drop(state);
        self.shared.done_cv.notify_all();
        Ok(())
    }

    fn query_fence(&self, fence: FenceHandle) -> bool {
        let state = self.shared.state.lock();
        state
            .fences
            .get(fence.raw())
            .is_none_or(|entry| state.completed >= entry.submission)
    }

    fn wait_for_fences(&self, fences: &[FenceHandle], wait_all: bool) -> Result<(), GpuError> {
        let mut state = self.shared.state.lock();
        loop {
            let signaled = |fence: &FenceHandle| {
                state
                    .fences
                    .get(fence.raw())
                    .is_none_or(|entry| state.completed >= entry.submission)
            };
            let done = if wait_all {
                fences.iter().all(signaled)
            } else {
                fences.is_empty() || fences.iter().any(signaled)
            };
            if done {
                return Ok(());
            }
            self.shared.done_cv.wait(&mut state);
        }
    }

    fn release_fence(&self, fence: FenceHandle) {
        self.shared.state.lock().fences.remove(fence.raw());
    }

    fn wait_for_idle(&self) -> Result<(), GpuError> {
        let mut state = self.shared.state.lock();
        self.wait_idle_locked(&mut state);
        Ok(())
    }

    fn live_resource_count(&self) -> usize {
        self.shared.state.lock().live_resources()
    }

    fn destroy(&self) {
        let mut state = self.shared.state.lock();
        if state.destroyed {
            return;
        }
        state.suspended = false;
        self.shared.queue_cv.notify_all();
        self.wait_idle_locked(&mut state);

        state.buffers.clear();
        state.transfer_buffers.clear();
        state.textures.clear();
        state.samplers.clear();
        state.shaders.clear();
        state.graphics_pipelines.clear();
        state.compute_pipelines.clear();
        state.fences.clear();
        state.command_buffers.clear();
        for entry in state.windows.values_mut() {
            entry.claimed = false;
            entry.images.clear();
            entry.frames_in_flight = 0;
            entry.frames_queued = 0;
        }
        state.memory_used = 0;
        state.destroyed = true;
        log::debug!("DummyBackend: destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;
    use crate::types::{BufferUsage, TransferBufferUsage};

    fn upload_buffer(backend: &DummyBackend, size: u64) -> TransferBufferHandle {
        backend
            .create_transfer_buffer(&TransferBufferDescriptor::new(size, TransferBufferUsage::Upload))
            .unwrap()
    }

    #[test]
    fn test_memory_budget() {
        let backend = DummyBackend::with_config(DummyConfig {
            memory_budget: 1024,
            ..Default::default()
        });
        let a = backend
            .create_buffer(&BufferDescriptor::new(1000, BufferUsage::VERTEX))
            .unwrap();
        let err = backend.create_buffer(&BufferDescriptor::new(100, BufferUsage::VERTEX));
        assert!(matches!(err, Err(GpuError::OutOfMemory)));
        backend.release_buffer(a);
        assert!(
            backend
                .create_buffer(&BufferDescriptor::new(100, BufferUsage::VERTEX))
                .is_ok()
        );
    }

    #[test]
    fn test_command_buffer_limit() {
        let backend = DummyBackend::with_config(DummyConfig {
            max_command_buffers: 2,
            ..Default::default()
        });
        let a = backend.acquire_command_buffer().unwrap();
        let _b = backend.acquire_command_buffer().unwrap();
        assert!(matches!(
            backend.acquire_command_buffer(),
            Err(GpuError::ResourceExhausted(_))
        ));
        backend.cancel(a).unwrap();
        assert!(backend.acquire_command_buffer().is_ok());
    }

    #[test]
    fn test_double_map_is_rejected() {
        let backend = DummyBackend::new();
        let tb = upload_buffer(&backend, 64);
        let first = backend.map_transfer_buffer(tb, false).unwrap();
        assert!(matches!(
            backend.map_transfer_buffer(tb, false),
            Err(GpuError::InvalidState(_))
        ));
        // The first mapping is still usable.
        unsafe { first.as_ptr().write(7) };
        backend.unmap_transfer_buffer(tb);
        assert!(backend.map_transfer_buffer(tb, false).is_ok());
    }

    #[test]
    fn test_submit_with_mapped_transfer_buffer_fails() {
        let backend = DummyBackend::new();
        let tb = upload_buffer(&backend, 16);
        let buffer = backend
            .create_buffer(&BufferDescriptor::new(16, BufferUsage::VERTEX))
            .unwrap();
        let _mapping = backend.map_transfer_buffer(tb, false).unwrap();

        let mut list = CommandList::new();
        list.push(Command::BeginCopyPass);
        list.push(Command::UploadToBuffer {
            source: crate::types::TransferBufferLocation {
                transfer_buffer: tb,
                offset: 0,
            },
            destination: crate::types::BufferRegion {
                buffer,
                offset: 0,
                size: 16,
            },
            cycle: false,
        });
        list.push(Command::EndCopyPass);

        let cb = backend.acquire_command_buffer().unwrap();
        assert!(matches!(backend.submit(cb, list, false), Err(GpuError::InvalidState(_))));
        // The failed submit still ended the command buffer.
        assert!(matches!(backend.cancel(cb), Err(GpuError::InvalidState(_))));
    }

    #[test]
    fn test_cycle_while_in_flight_gets_fresh_backing() {
        let backend = DummyBackend::new();
        let tb = upload_buffer(&backend, 16);
        let buffer = backend
            .create_buffer(&BufferDescriptor::new(16, BufferUsage::VERTEX))
            .unwrap();
        backend.suspend_execution();

        let mut list = CommandList::new();
        list.push(Command::BeginCopyPass);
        list.push(Command::UploadToBuffer {
            source: crate::types::TransferBufferLocation {
                transfer_buffer: tb,
                offset: 0,
            },
            destination: crate::types::BufferRegion {
                buffer,
                offset: 0,
                size: 16,
            },
            cycle: false,
        });
        list.push(Command::EndCopyPass);
        let cb = backend.acquire_command_buffer().unwrap();
        let fence = backend.submit(cb, list, true).unwrap().unwrap();

        // Cycling returns immediately even though the queue is held.
        let mapping = backend.map_transfer_buffer(tb, true).unwrap();
        assert_eq!(mapping.len(), 16);
        backend.unmap_transfer_buffer(tb);
        assert!(!backend.query_fence(fence));

        backend.resume_execution();
        backend.wait_for_fences(&[fence], true).unwrap();
        assert!(backend.query_fence(fence));
        assert_eq!(backend.stats().copy_operations, 1);
    }

    #[test]
    fn test_destroy_releases_everything() {
        let backend = DummyBackend::new();
        let _ = backend
            .create_buffer(&BufferDescriptor::new(16, BufferUsage::VERTEX))
            .unwrap();
        assert_eq!(backend.live_resource_count(), 1);
        backend.destroy();
        assert_eq!(backend.live_resource_count(), 0);
        assert!(matches!(
            backend.acquire_command_buffer(),
            Err(GpuError::DeviceDestroyed)
        ));
        // Destroying twice is harmless.
        backend.destroy();
    }

    #[test]
    fn test_claim_unknown_window_registers_it() {
        let backend = DummyBackend::new();
        let window = WindowId::from_raw(99).unwrap();
        backend.claim_window(window).unwrap();
        assert!(backend.is_window_claimed(window));
        assert!(matches!(backend.claim_window(window), Err(GpuError::InvalidState(_))));
        let fresh = backend.add_window(10, 10);
        assert!(fresh.raw() > 99);
    }
}
