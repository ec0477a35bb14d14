//! Compute pass recording.

use bytemuck::Pod;

use super::BindingSlots;
use crate::command_buffer::CommandBuffer;
use crate::commands::{Command, PipelineStage};
use crate::handle::{BufferHandle, TextureHandle};
use crate::limits::{MAX_SAMPLERS, MAX_STORAGE_BUFFERS, MAX_STORAGE_TEXTURES};
use crate::resources::{Buffer, ComputePipeline, Texture};
use crate::types::TextureSamplerBinding;

/// An open compute pass.
///
/// Created by [`CommandBuffer::begin_compute_pass`], which also fixes the
/// read-write storage bindings for the whole pass. A dispatch needs a bound
/// compute pipeline.
pub struct ComputePass<'a, 'd> {
    cmd: &'a mut CommandBuffer<'d>,
    pipeline_bound: bool,
    samplers: BindingSlots<TextureSamplerBinding>,
    storage_textures: BindingSlots<TextureHandle>,
    storage_buffers: BindingSlots<BufferHandle>,
}

impl<'a, 'd> ComputePass<'a, 'd> {
    pub(crate) fn new(cmd: &'a mut CommandBuffer<'d>) -> Self {
        Self {
            cmd,
            pipeline_bound: false,
            samplers: BindingSlots::new(MAX_SAMPLERS),
            storage_textures: BindingSlots::new(MAX_STORAGE_TEXTURES),
            storage_buffers: BindingSlots::new(MAX_STORAGE_BUFFERS),
        }
    }

    pub fn bind_compute_pipeline(&mut self, pipeline: &ComputePipeline) {
        self.pipeline_bound = true;
        self.cmd
            .record(Command::BindComputePipeline(pipeline.handle()));
    }

    pub fn bind_compute_samplers(&mut self, first_slot: u32, bindings: &[TextureSamplerBinding]) {
        if let Err(e) = self.samplers.bind(first_slot, bindings) {
            self.cmd.reject(format_args!("compute sampler bind: {e}"));
            return;
        }
        self.cmd.record(Command::BindSamplers {
            stage: PipelineStage::Compute,
            first_slot,
            bindings: bindings.to_vec(),
        });
    }

    /// Bind read-only storage textures.
    pub fn bind_compute_storage_textures(&mut self, first_slot: u32, textures: &[&Texture]) {
        let handles: Vec<_> = textures.iter().map(|t| t.handle()).collect();
        if let Err(e) = self.storage_textures.bind(first_slot, &handles) {
            self.cmd
                .reject(format_args!("compute storage texture bind: {e}"));
            return;
        }
        self.cmd.record(Command::BindStorageTextures {
            stage: PipelineStage::Compute,
            first_slot,
            textures: handles,
        });
    }

    /// Bind read-only storage buffers.
    pub fn bind_compute_storage_buffers(&mut self, first_slot: u32, buffers: &[&Buffer]) {
        let handles: Vec<_> = buffers.iter().map(|b| b.handle()).collect();
        if let Err(e) = self.storage_buffers.bind(first_slot, &handles) {
            self.cmd
                .reject(format_args!("compute storage buffer bind: {e}"));
            return;
        }
        self.cmd.record(Command::BindStorageBuffers {
            stage: PipelineStage::Compute,
            first_slot,
            buffers: handles,
        });
    }

    pub fn push_compute_uniform_data(&mut self, slot: u32, data: &[u8]) {
        self.cmd.push_compute_uniform_data(slot, data);
    }

    pub fn push_compute_uniforms<T: Pod>(&mut self, slot: u32, value: &T) {
        self.cmd.push_compute_uniforms(slot, value);
    }

    pub fn dispatch(&mut self, groupcount_x: u32, groupcount_y: u32, groupcount_z: u32) {
        if !self.pipeline_bound {
            self.cmd.reject("dispatch without a bound compute pipeline");
            return;
        }
        self.cmd.record(Command::Dispatch {
            groupcount_x,
            groupcount_y,
            groupcount_z,
        });
    }

    /// Dispatch with [`DispatchIndirectArgs`](crate::DispatchIndirectArgs)
    /// read from `buffer` at `offset`.
    pub fn dispatch_indirect(&mut self, buffer: &Buffer, offset: u64) {
        if !self.pipeline_bound {
            self.cmd
                .reject("dispatch_indirect without a bound compute pipeline");
            return;
        }
        self.cmd.record(Command::DispatchIndirect {
            buffer: buffer.handle(),
            offset,
        });
    }

    /// End the pass. Dropping it has the same effect.
    pub fn end(self) {}
}

impl Drop for ComputePass<'_, '_> {
    fn drop(&mut self) {
        self.cmd.record(Command::EndComputePass);
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::Command;
    use crate::device::GpuDevice;
    use crate::types::{
        BufferDescriptor, BufferUsage, ComputePipelineDescriptor, ShaderFormat,
        StorageBufferReadWriteBinding,
    };

    #[test]
    fn test_dispatch_needs_pipeline() {
        let device = GpuDevice::create(ShaderFormat::SPIRV, false, None).unwrap();
        let pipeline = device
            .create_compute_pipeline(
                &ComputePipelineDescriptor::new(ShaderFormat::SPIRV, vec![0x03, 0x02, 0x23, 0x07], "main")
                    .with_threadcount(8, 8, 1),
            )
            .unwrap();
        let mut cmd = device.acquire_command_buffer().unwrap();
        {
            let mut pass = cmd.begin_compute_pass(&[], &[]).unwrap();
            pass.dispatch(1, 1, 1);
            pass.bind_compute_pipeline(&pipeline);
            pass.dispatch(4, 4, 1);
        }
        let dispatches: Vec<_> = cmd
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::Dispatch { .. }))
            .collect();
        assert_eq!(dispatches.len(), 1);
        cmd.submit().unwrap();
        device.wait_for_idle().unwrap();
    }

    #[test]
    fn test_readwrite_buffer_needs_write_usage() {
        let device = GpuDevice::create(ShaderFormat::SPIRV, false, None).unwrap();
        let buffer = device
            .create_buffer(&BufferDescriptor::new(16, BufferUsage::COMPUTE_STORAGE_READ))
            .unwrap();
        let mut cmd = device.acquire_command_buffer().unwrap();
        let bindings = [StorageBufferReadWriteBinding::new(&buffer)];
        assert!(cmd.begin_compute_pass(&[], &bindings).is_err());
        cmd.cancel();
    }
}
