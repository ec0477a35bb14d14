//! Command buffer recording and submission.

use std::cell::Cell;
use std::marker::PhantomData;

use bytemuck::Pod;

use crate::commands::{Command, CommandList, PipelineStage};
use crate::device::GpuDevice;
use crate::error::GpuError;
use crate::handle::{CommandBufferHandle, FenceHandle};
use crate::limits::{MAX_COMPUTE_WRITE_BINDINGS, MAX_UNIFORM_DATA_SIZE, MAX_UNIFORM_SLOTS};
use crate::pass::{ComputePass, CopyPass, RenderPass, validate_render_targets};
use crate::resources::{DeviceLink, Fence, Texture};
use crate::swapchain::{SwapchainTexture, WindowId};
use crate::types::{
    BlitInfo, BufferUsage, ColorTargetInfo, DepthStencilTargetInfo, StorageBufferReadWriteBinding,
    StorageTextureReadWriteBinding, TextureUsage,
};

/// A list of GPU work being recorded.
///
/// Acquired from [`GpuDevice::acquire_command_buffer`]. Work is recorded
/// through passes and a few buffer-level commands, then handed to the GPU with
/// [`submit`](Self::submit) or [`submit_and_acquire_fence`](Self::submit_and_acquire_fence),
/// or discarded with [`cancel`](Self::cancel). All three consume the command
/// buffer, so it can end only once:
///
/// ```compile_fail
/// # use lumen_gpu::{GpuDevice, ShaderFormat};
/// # let device = GpuDevice::create(ShaderFormat::SPIRV, false, None).unwrap();
/// let cmd = device.acquire_command_buffer().unwrap();
/// cmd.submit().unwrap();
/// cmd.cancel();
/// ```
///
/// An open pass borrows the command buffer, so it cannot be submitted
/// mid-pass:
///
/// ```compile_fail
/// # use lumen_gpu::{GpuDevice, ShaderFormat};
/// # let device = GpuDevice::create(ShaderFormat::SPIRV, false, None).unwrap();
/// let mut cmd = device.acquire_command_buffer().unwrap();
/// let copy = cmd.begin_copy_pass();
/// cmd.submit().unwrap();
/// copy.end();
/// ```
///
/// Dropping a command buffer that was neither submitted nor cancelled cancels
/// it and logs a warning.
pub struct CommandBuffer<'d> {
    device: &'d GpuDevice,
    handle: CommandBufferHandle,
    commands: CommandList,
    /// Windows whose swapchain image this command buffer acquired.
    swapchain_windows: Vec<WindowId>,
    debug_depth: u32,
    finished: bool,
    _not_sync: PhantomData<Cell<()>>,
}

impl<'d> CommandBuffer<'d> {
    pub(crate) fn new(device: &'d GpuDevice, handle: CommandBufferHandle) -> Self {
        log::trace!("CommandBuffer: acquired {handle:?}");
        Self {
            device,
            handle,
            commands: CommandList::new(),
            swapchain_windows: Vec::new(),
            debug_depth: 0,
            finished: false,
            _not_sync: PhantomData,
        }
    }

    pub fn handle(&self) -> CommandBufferHandle {
        self.handle
    }

    pub fn device(&self) -> &'d GpuDevice {
        self.device
    }

    /// Commands recorded so far.
    pub fn commands(&self) -> &CommandList {
        &self.commands
    }

    pub(crate) fn record(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub(crate) fn has_swapchain_image(&self, window: WindowId) -> bool {
        self.swapchain_windows.contains(&window)
    }

    /// Log a call dropped because its preconditions do not hold.
    pub(crate) fn reject(&self, message: impl std::fmt::Display) {
        if self.device.debug_mode() {
            log::error!("CommandBuffer: {message}");
        } else {
            log::debug!("CommandBuffer: {message}");
        }
    }

    // ---------------------------------------------------------------------
    // Swapchain
    // ---------------------------------------------------------------------

    /// Acquire the next swapchain image of `window` without blocking.
    ///
    /// Returns `Ok(None)` when too many frames are in flight; skip rendering
    /// to the window this frame. The image is presented when this command
    /// buffer is submitted.
    ///
    /// # Errors
    ///
    /// [`GpuError::WindowNotClaimed`] for an unclaimed window,
    /// [`GpuError::SwapchainOutOfDate`] after the window was resized (the
    /// swapchain is recreated and the next acquire succeeds),
    /// [`GpuError::InvalidState`] when this command buffer already holds an
    /// image of `window`.
    pub fn acquire_swapchain_texture(
        &mut self,
        window: WindowId,
    ) -> Result<Option<SwapchainTexture>, GpuError> {
        self.acquire_swapchain(window, false)
    }

    /// Like [`acquire_swapchain_texture`](Self::acquire_swapchain_texture), but
    /// blocks until a frame in flight completes instead of returning `None`.
    ///
    /// Still returns `None` when every frame in flight belongs to command
    /// buffers that were never submitted.
    pub fn wait_and_acquire_swapchain_texture(
        &mut self,
        window: WindowId,
    ) -> Result<Option<SwapchainTexture>, GpuError> {
        self.acquire_swapchain(window, true)
    }

    fn acquire_swapchain(
        &mut self,
        window: WindowId,
        wait: bool,
    ) -> Result<Option<SwapchainTexture>, GpuError> {
        let shared = self.device.shared();
        if shared.is_destroyed() {
            return Err(GpuError::DeviceDestroyed);
        }
        let frame = shared
            .backend()
            .acquire_swapchain_texture(self.handle, window, wait)?;
        if frame.is_some() {
            self.swapchain_windows.push(window);
        }
        Ok(frame)
    }

    // ---------------------------------------------------------------------
    // Uniforms
    // ---------------------------------------------------------------------

    pub(crate) fn push_uniform(&mut self, stage: PipelineStage, slot: u32, data: &[u8]) {
        if slot >= MAX_UNIFORM_SLOTS {
            self.reject(format_args!(
                "{stage:?} uniform slot {slot} out of range (max {MAX_UNIFORM_SLOTS})"
            ));
            return;
        }
        if data.len() > MAX_UNIFORM_DATA_SIZE {
            self.reject(format_args!(
                "{stage:?} uniform push of {} bytes exceeds {MAX_UNIFORM_DATA_SIZE}",
                data.len()
            ));
            return;
        }
        self.record(Command::PushUniformData {
            stage,
            slot,
            data: data.to_vec(),
        });
    }

    /// Set uniform data for the vertex stage at `slot` (0..4).
    ///
    /// The value is captured now and applies to draws recorded afterwards.
    pub fn push_vertex_uniform_data(&mut self, slot: u32, data: &[u8]) {
        self.push_uniform(PipelineStage::Vertex, slot, data);
    }

    pub fn push_fragment_uniform_data(&mut self, slot: u32, data: &[u8]) {
        self.push_uniform(PipelineStage::Fragment, slot, data);
    }

    pub fn push_compute_uniform_data(&mut self, slot: u32, data: &[u8]) {
        self.push_uniform(PipelineStage::Compute, slot, data);
    }

    pub fn push_vertex_uniforms<T: Pod>(&mut self, slot: u32, value: &T) {
        self.push_vertex_uniform_data(slot, bytemuck::bytes_of(value));
    }

    pub fn push_fragment_uniforms<T: Pod>(&mut self, slot: u32, value: &T) {
        self.push_fragment_uniform_data(slot, bytemuck::bytes_of(value));
    }

    pub fn push_compute_uniforms<T: Pod>(&mut self, slot: u32, value: &T) {
        self.push_compute_uniform_data(slot, bytemuck::bytes_of(value));
    }

    // ---------------------------------------------------------------------
    // Passes
    // ---------------------------------------------------------------------

    /// Begin a render pass.
    ///
    /// Targets with [`LoadOp::Clear`](crate::LoadOp::Clear) are cleared when the
    /// pass starts; multisampled targets with a resolving store op are
    /// resolved when it ends.
    ///
    /// # Errors
    ///
    /// [`GpuError::InvalidParameter`] for an invalid target set (no targets,
    /// more than four colour targets, wrong usage or format, mismatched sizes,
    /// a resolve without a multisampled source and resolve target),
    /// [`GpuError::WindowNotClaimed`] for a swapchain target whose window was
    /// released, [`GpuError::InvalidState`] for a swapchain image not acquired
    /// by this command buffer.
    pub fn begin_render_pass(
        &mut self,
        color_targets: &[ColorTargetInfo],
        depth_stencil: Option<&DepthStencilTargetInfo>,
    ) -> Result<RenderPass<'_, 'd>, GpuError> {
        validate_render_targets(self, color_targets, depth_stencil)?;
        self.record(Command::BeginRenderPass {
            color_targets: color_targets.to_vec(),
            depth_stencil: depth_stencil.copied(),
        });
        Ok(RenderPass::new(self))
    }

    /// Begin a compute pass writing the given storage textures and buffers.
    ///
    /// # Errors
    ///
    /// [`GpuError::InvalidParameter`] when more than eight of either kind are
    /// given or a binding lacks compute write usage.
    pub fn begin_compute_pass(
        &mut self,
        storage_textures: &[StorageTextureReadWriteBinding],
        storage_buffers: &[StorageBufferReadWriteBinding],
    ) -> Result<ComputePass<'_, 'd>, GpuError> {
        if storage_textures.len() > MAX_COMPUTE_WRITE_BINDINGS
            || storage_buffers.len() > MAX_COMPUTE_WRITE_BINDINGS
        {
            return Err(GpuError::InvalidParameter(format!(
                "compute pass takes at most {MAX_COMPUTE_WRITE_BINDINGS} read-write textures and buffers, got {} and {}",
                storage_textures.len(),
                storage_buffers.len()
            )));
        }
        let writable =
            TextureUsage::COMPUTE_STORAGE_WRITE | TextureUsage::COMPUTE_STORAGE_SIMULTANEOUS_READ_WRITE;
        if let Some(binding) = storage_textures.iter().find(|b| !b.usage.intersects(writable)) {
            return Err(GpuError::InvalidParameter(format!(
                "storage texture {:?} lacks compute write usage",
                binding.texture
            )));
        }
        if let Some(binding) = storage_buffers
            .iter()
            .find(|b| !b.usage.contains(BufferUsage::COMPUTE_STORAGE_WRITE))
        {
            return Err(GpuError::InvalidParameter(format!(
                "storage buffer {:?} lacks COMPUTE_STORAGE_WRITE usage",
                binding.buffer
            )));
        }
        self.record(Command::BeginComputePass {
            storage_textures: storage_textures.to_vec(),
            storage_buffers: storage_buffers.to_vec(),
        });
        Ok(ComputePass::new(self))
    }

    /// Begin a copy pass.
    pub fn begin_copy_pass(&mut self) -> CopyPass<'_, 'd> {
        self.record(Command::BeginCopyPass);
        CopyPass::new(self)
    }

    // ---------------------------------------------------------------------
    // Buffer-level commands
    // ---------------------------------------------------------------------

    /// Scale and copy a region of one texture into another.
    ///
    /// The source needs `SAMPLER` usage and the destination `COLOR_TARGET`.
    pub fn blit_texture(&mut self, info: &BlitInfo) {
        if info.source.width == 0
            || info.source.height == 0
            || info.destination.width == 0
            || info.destination.height == 0
        {
            self.reject("blit with an empty region");
            return;
        }
        self.record(Command::BlitTexture(*info));
    }

    /// Fill every mip level below the first from the level above it.
    pub fn generate_mipmaps(&mut self, texture: &Texture) {
        let required = TextureUsage::SAMPLER | TextureUsage::COLOR_TARGET;
        if !texture.usage().contains(required) {
            self.reject(format_args!(
                "generate_mipmaps needs SAMPLER | COLOR_TARGET usage, texture has {:?}",
                texture.usage()
            ));
            return;
        }
        if texture.num_levels() < 2 {
            self.reject("generate_mipmaps on a texture with a single mip level");
            return;
        }
        self.record(Command::GenerateMipmaps(texture.handle()));
    }

    pub fn insert_debug_label(&mut self, label: &str) {
        self.record(Command::InsertDebugLabel(label.to_owned()));
    }

    pub fn push_debug_group(&mut self, name: &str) {
        self.debug_depth += 1;
        self.record(Command::PushDebugGroup(name.to_owned()));
    }

    pub fn pop_debug_group(&mut self) {
        if self.debug_depth == 0 {
            log::warn!("CommandBuffer: pop_debug_group without a matching push");
            return;
        }
        self.debug_depth -= 1;
        self.record(Command::PopDebugGroup);
    }

    // ---------------------------------------------------------------------
    // Submission
    // ---------------------------------------------------------------------

    /// Submit the recorded work.
    ///
    /// Swapchain images acquired by this command buffer are presented once
    /// the work completes.
    pub fn submit(mut self) -> Result<(), GpuError> {
        self.finish(false).map(|_| ())
    }

    /// Submit the recorded work and return a fence signalled on completion.
    pub fn submit_and_acquire_fence(mut self) -> Result<Fence, GpuError> {
        let handle = self
            .finish(true)?
            .ok_or_else(|| GpuError::Internal("backend returned no fence".into()))?;
        Ok(Fence::new(DeviceLink::new(self.device.shared()), handle))
    }

    /// Discard the recorded work. Acquired swapchain images are returned
    /// without being presented.
    pub fn cancel(mut self) {
        self.cancel_in_place();
    }

    fn finish(&mut self, signal_fence: bool) -> Result<Option<FenceHandle>, GpuError> {
        lumen_core::profile_function!();
        self.finished = true;
        if self.debug_depth > 0 {
            log::warn!(
                "CommandBuffer: submitted with {} unclosed debug group(s)",
                self.debug_depth
            );
        }
        let shared = self.device.shared();
        if shared.is_destroyed() {
            return Err(GpuError::DeviceDestroyed);
        }
        let commands = std::mem::take(&mut self.commands);
        log::trace!(
            "CommandBuffer: submitting {:?} ({} commands)",
            self.handle,
            commands.len()
        );
        shared.backend().submit(self.handle, commands, signal_fence)
    }

    fn cancel_in_place(&mut self) {
        self.finished = true;
        let shared = self.device.shared();
        if shared.is_destroyed() {
            return;
        }
        match shared.backend().cancel(self.handle) {
            Ok(()) => log::trace!("CommandBuffer: cancelled {:?}", self.handle),
            Err(e) => log::error!("CommandBuffer: cancel of {:?} failed: {e}", self.handle),
        }
    }
}

impl Drop for CommandBuffer<'_> {
    fn drop(&mut self) {
        if !self.finished {
            log::warn!(
                "CommandBuffer: {:?} dropped without submit or cancel, cancelling",
                self.handle
            );
            self.cancel_in_place();
        }
    }
}

impl std::fmt::Debug for CommandBuffer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("handle", &self.handle)
            .field("commands", &self.commands.len())
            .field("finished", &self.finished)
            .finish()
    }
}

static_assertions::assert_impl_all!(CommandBuffer<'static>: Send);
static_assertions::assert_not_impl_any!(CommandBuffer<'static>: Sync, Clone);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ShaderFormat;

    fn device() -> GpuDevice {
        GpuDevice::create(ShaderFormat::SPIRV, false, None).unwrap()
    }

    #[test]
    fn test_uniform_slot_out_of_range_is_dropped() {
        let device = device();
        let mut cmd = device.acquire_command_buffer().unwrap();
        cmd.push_vertex_uniform_data(MAX_UNIFORM_SLOTS, &[0; 16]);
        cmd.push_fragment_uniform_data(0, &vec![0; MAX_UNIFORM_DATA_SIZE + 1]);
        assert!(cmd.commands().is_empty());
        cmd.push_compute_uniforms(3, &[1.0f32, 2.0, 3.0, 4.0]);
        assert_eq!(cmd.commands().len(), 1);
        cmd.cancel();
    }

    #[test]
    fn test_debug_groups_balance() {
        let device = device();
        let mut cmd = device.acquire_command_buffer().unwrap();
        cmd.pop_debug_group();
        cmd.push_debug_group("frame");
        cmd.insert_debug_label("marker");
        cmd.pop_debug_group();
        assert_eq!(
            cmd.commands().commands(),
            &[
                Command::PushDebugGroup("frame".into()),
                Command::InsertDebugLabel("marker".into()),
                Command::PopDebugGroup,
            ]
        );
        cmd.submit().unwrap();
    }

    #[test]
    fn test_drop_cancels() {
        let device = device();
        {
            let _cmd = device.acquire_command_buffer().unwrap();
        }
        device.wait_for_idle().unwrap();
        // The backend slot was returned, so acquiring keeps working.
        for _ in 0..100 {
            device.acquire_command_buffer().unwrap().cancel();
        }
    }
}
