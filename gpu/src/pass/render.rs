//! Render pass recording and target validation.

use bytemuck::Pod;

use super::BindingSlots;
use crate::command_buffer::CommandBuffer;
use crate::commands::{Command, PipelineStage};
use crate::error::GpuError;
use crate::limits::{MAX_COLOR_TARGETS, MAX_SAMPLERS, MAX_STORAGE_BUFFERS, MAX_STORAGE_TEXTURES, MAX_VERTEX_BUFFERS};
use crate::resources::{Buffer, GraphicsPipeline, Texture};
use crate::types::{
    BufferBinding, Color, ColorTargetInfo, DepthStencilTargetInfo, IndexElementSize, Rect,
    RenderTarget, TextureSamplerBinding, TextureUsage, Viewport,
};

/// Check a render pass target set before it is recorded.
pub(crate) fn validate_render_targets(
    cmd: &CommandBuffer<'_>,
    color_targets: &[ColorTargetInfo],
    depth_stencil: Option<&DepthStencilTargetInfo>,
) -> Result<(), GpuError> {
    if color_targets.is_empty() && depth_stencil.is_none() {
        return Err(GpuError::InvalidParameter(
            "render pass needs at least one color or depth-stencil target".into(),
        ));
    }
    if color_targets.len() > MAX_COLOR_TARGETS {
        return Err(GpuError::InvalidParameter(format!(
            "render pass takes at most {MAX_COLOR_TARGETS} color targets, got {}",
            color_targets.len()
        )));
    }

    // Swapchain ownership is checked before any other target property.
    for info in color_targets {
        if let Some(window) = info.target.window {
            if !cmd.device().is_window_claimed(window) {
                return Err(GpuError::WindowNotClaimed);
            }
            if !cmd.has_swapchain_image(window) {
                return Err(GpuError::InvalidState(format!(
                    "swapchain image of {window:?} was not acquired by this command buffer"
                )));
            }
        }
    }

    let mut extent = None;
    let mut sample_count = None;
    let mut check_shape = |target: &RenderTarget, mip_level: u32| -> Result<(), GpuError> {
        let size = target.level_size(mip_level);
        if *extent.get_or_insert(size) != size {
            return Err(GpuError::InvalidParameter(format!(
                "render target {:?} is {}x{}, other targets are {}x{}",
                target.texture,
                size.0,
                size.1,
                extent.map_or(0, |e| e.0),
                extent.map_or(0, |e| e.1)
            )));
        }
        if *sample_count.get_or_insert(target.sample_count) != target.sample_count {
            return Err(GpuError::InvalidParameter(format!(
                "render target {:?} sample count differs from the other targets",
                target.texture
            )));
        }
        Ok(())
    };

    for info in color_targets {
        let target = &info.target;
        if !target.usage.contains(TextureUsage::COLOR_TARGET) {
            return Err(GpuError::InvalidParameter(format!(
                "color target {:?} lacks COLOR_TARGET usage",
                target.texture
            )));
        }
        if target.format.is_depth_stencil() {
            return Err(GpuError::InvalidParameter(format!(
                "color target {:?} has depth format {:?}",
                target.texture, target.format
            )));
        }
        check_subresource(target, info.mip_level, info.layer_or_depth_plane)?;
        check_shape(target, info.mip_level)?;

        if info.store_op.resolves() {
            let Some(resolve) = &info.resolve_target else {
                return Err(GpuError::InvalidParameter(format!(
                    "color target {:?} resolves without a resolve target",
                    target.texture
                )));
            };
            if !target.sample_count.is_multisampled() {
                return Err(GpuError::InvalidParameter(format!(
                    "color target {:?} resolves but is not multisampled",
                    target.texture
                )));
            }
            if resolve.sample_count.is_multisampled() || resolve.format != target.format {
                return Err(GpuError::InvalidParameter(format!(
                    "resolve target {:?} must be single-sampled with format {:?}",
                    resolve.texture, target.format
                )));
            }
            if !resolve.usage.contains(TextureUsage::COLOR_TARGET) {
                return Err(GpuError::InvalidParameter(format!(
                    "resolve target {:?} lacks COLOR_TARGET usage",
                    resolve.texture
                )));
            }
            check_subresource(resolve, info.resolve_mip_level, info.resolve_layer)?;
            if resolve.level_size(info.resolve_mip_level) != target.level_size(info.mip_level) {
                return Err(GpuError::InvalidParameter(format!(
                    "resolve target {:?} size differs from its source",
                    resolve.texture
                )));
            }
        }
    }

    if let Some(info) = depth_stencil {
        let target = &info.target;
        if !target.usage.contains(TextureUsage::DEPTH_STENCIL_TARGET) {
            return Err(GpuError::InvalidParameter(format!(
                "depth target {:?} lacks DEPTH_STENCIL_TARGET usage",
                target.texture
            )));
        }
        if !target.format.is_depth_stencil() {
            return Err(GpuError::InvalidParameter(format!(
                "depth target {:?} has color format {:?}",
                target.texture, target.format
            )));
        }
        if info.store_op.resolves() || info.stencil_store_op.resolves() {
            return Err(GpuError::InvalidParameter(
                "depth-stencil targets cannot resolve".into(),
            ));
        }
        check_shape(target, 0)?;
    }
    Ok(())
}

fn check_subresource(target: &RenderTarget, mip_level: u32, layer: u32) -> Result<(), GpuError> {
    if mip_level >= target.num_levels {
        return Err(GpuError::InvalidParameter(format!(
            "mip level {mip_level} of {:?} out of range ({} levels)",
            target.texture, target.num_levels
        )));
    }
    let layers = if target.texture_type.is_volume() {
        (target.layer_count_or_depth >> mip_level).max(1)
    } else {
        target.layer_count_or_depth
    };
    if layer >= layers {
        return Err(GpuError::InvalidParameter(format!(
            "layer {layer} of {:?} out of range ({layers} layers)",
            target.texture
        )));
    }
    Ok(())
}

/// Per-stage bindings of a render pass.
#[derive(Debug)]
struct StageBindings {
    samplers: BindingSlots<TextureSamplerBinding>,
    storage_textures: BindingSlots<crate::handle::TextureHandle>,
    storage_buffers: BindingSlots<crate::handle::BufferHandle>,
}

impl StageBindings {
    fn new() -> Self {
        Self {
            samplers: BindingSlots::new(MAX_SAMPLERS),
            storage_textures: BindingSlots::new(MAX_STORAGE_TEXTURES),
            storage_buffers: BindingSlots::new(MAX_STORAGE_BUFFERS),
        }
    }
}

/// An open render pass.
///
/// Created by [`CommandBuffer::begin_render_pass`]. Draws need a bound
/// graphics pipeline, and indexed draws a bound index buffer; calls that break
/// these rules are logged and dropped.
pub struct RenderPass<'a, 'd> {
    cmd: &'a mut CommandBuffer<'d>,
    /// Vertex buffer slots the bound pipeline reads.
    pipeline_vertex_slots: Option<Vec<u32>>,
    vertex_buffers: BindingSlots<BufferBinding>,
    index_buffer: Option<IndexElementSize>,
    vertex: StageBindings,
    fragment: StageBindings,
}

impl<'a, 'd> RenderPass<'a, 'd> {
    pub(crate) fn new(cmd: &'a mut CommandBuffer<'d>) -> Self {
        Self {
            cmd,
            pipeline_vertex_slots: None,
            vertex_buffers: BindingSlots::new(MAX_VERTEX_BUFFERS),
            index_buffer: None,
            vertex: StageBindings::new(),
            fragment: StageBindings::new(),
        }
    }

    fn stage(&mut self, stage: PipelineStage) -> &mut StageBindings {
        match stage {
            PipelineStage::Fragment => &mut self.fragment,
            _ => &mut self.vertex,
        }
    }

    pub fn bind_graphics_pipeline(&mut self, pipeline: &GraphicsPipeline) {
        let input = &pipeline.descriptor().vertex_input_state;
        self.pipeline_vertex_slots = Some(input.buffers.iter().map(|b| b.slot).collect());
        self.cmd
            .record(Command::BindGraphicsPipeline(pipeline.handle()));
    }

    pub fn set_viewport(&mut self, viewport: &Viewport) {
        self.cmd.record(Command::SetViewport(*viewport));
    }

    pub fn set_scissor(&mut self, scissor: &Rect) {
        self.cmd.record(Command::SetScissor(*scissor));
    }

    pub fn set_blend_constants(&mut self, color: Color) {
        self.cmd.record(Command::SetBlendConstants(color));
    }

    pub fn set_stencil_reference(&mut self, reference: u8) {
        self.cmd.record(Command::SetStencilReference(reference));
    }

    /// Bind vertex buffers to slots `[first_slot, first_slot + bindings.len())`.
    pub fn bind_vertex_buffers(&mut self, first_slot: u32, bindings: &[BufferBinding]) {
        if let Err(e) = self.vertex_buffers.bind(first_slot, bindings) {
            self.cmd.reject(format_args!("bind_vertex_buffers: {e}"));
            return;
        }
        self.cmd.record(Command::BindVertexBuffers {
            first_slot,
            bindings: bindings.to_vec(),
        });
    }

    pub fn bind_index_buffer(&mut self, binding: BufferBinding, index_size: IndexElementSize) {
        self.index_buffer = Some(index_size);
        self.cmd.record(Command::BindIndexBuffer {
            binding,
            index_size,
        });
    }

    fn bind_samplers(
        &mut self,
        stage: PipelineStage,
        first_slot: u32,
        bindings: &[TextureSamplerBinding],
    ) {
        if let Err(e) = self.stage(stage).samplers.bind(first_slot, bindings) {
            self.cmd
                .reject(format_args!("{stage:?} sampler bind: {e}"));
            return;
        }
        self.cmd.record(Command::BindSamplers {
            stage,
            first_slot,
            bindings: bindings.to_vec(),
        });
    }

    fn bind_storage_textures(&mut self, stage: PipelineStage, first_slot: u32, textures: &[&Texture]) {
        let handles: Vec<_> = textures.iter().map(|t| t.handle()).collect();
        if let Err(e) = self.stage(stage).storage_textures.bind(first_slot, &handles) {
            self.cmd
                .reject(format_args!("{stage:?} storage texture bind: {e}"));
            return;
        }
        self.cmd.record(Command::BindStorageTextures {
            stage,
            first_slot,
            textures: handles,
        });
    }

    fn bind_storage_buffers(&mut self, stage: PipelineStage, first_slot: u32, buffers: &[&Buffer]) {
        let handles: Vec<_> = buffers.iter().map(|b| b.handle()).collect();
        if let Err(e) = self.stage(stage).storage_buffers.bind(first_slot, &handles) {
            self.cmd
                .reject(format_args!("{stage:?} storage buffer bind: {e}"));
            return;
        }
        self.cmd.record(Command::BindStorageBuffers {
            stage,
            first_slot,
            buffers: handles,
        });
    }

    pub fn bind_vertex_samplers(&mut self, first_slot: u32, bindings: &[TextureSamplerBinding]) {
        self.bind_samplers(PipelineStage::Vertex, first_slot, bindings);
    }

    pub fn bind_fragment_samplers(&mut self, first_slot: u32, bindings: &[TextureSamplerBinding]) {
        self.bind_samplers(PipelineStage::Fragment, first_slot, bindings);
    }

    pub fn bind_vertex_storage_textures(&mut self, first_slot: u32, textures: &[&Texture]) {
        self.bind_storage_textures(PipelineStage::Vertex, first_slot, textures);
    }

    pub fn bind_fragment_storage_textures(&mut self, first_slot: u32, textures: &[&Texture]) {
        self.bind_storage_textures(PipelineStage::Fragment, first_slot, textures);
    }

    pub fn bind_vertex_storage_buffers(&mut self, first_slot: u32, buffers: &[&Buffer]) {
        self.bind_storage_buffers(PipelineStage::Vertex, first_slot, buffers);
    }

    pub fn bind_fragment_storage_buffers(&mut self, first_slot: u32, buffers: &[&Buffer]) {
        self.bind_storage_buffers(PipelineStage::Fragment, first_slot, buffers);
    }

    pub fn push_vertex_uniform_data(&mut self, slot: u32, data: &[u8]) {
        self.cmd.push_vertex_uniform_data(slot, data);
    }

    pub fn push_fragment_uniform_data(&mut self, slot: u32, data: &[u8]) {
        self.cmd.push_fragment_uniform_data(slot, data);
    }

    pub fn push_vertex_uniforms<T: Pod>(&mut self, slot: u32, value: &T) {
        self.cmd.push_vertex_uniforms(slot, value);
    }

    pub fn push_fragment_uniforms<T: Pod>(&mut self, slot: u32, value: &T) {
        self.cmd.push_fragment_uniforms(slot, value);
    }

    /// Whether a draw may be recorded; logs the reason when not.
    fn can_draw(&self, what: &str, indexed: bool) -> bool {
        let Some(slots) = &self.pipeline_vertex_slots else {
            self.cmd
                .reject(format_args!("{what} without a bound graphics pipeline"));
            return false;
        };
        if indexed && self.index_buffer.is_none() {
            self.cmd
                .reject(format_args!("{what} without a bound index buffer"));
            return false;
        }
        if let Some(slot) = slots.iter().find(|&&s| self.vertex_buffers.get(s).is_none()) {
            self.cmd.reject(format_args!(
                "{what}: pipeline reads vertex buffer slot {slot}, which is not bound"
            ));
            return false;
        }
        true
    }

    pub fn draw_primitives(
        &mut self,
        num_vertices: u32,
        num_instances: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        if self.can_draw("draw_primitives", false) {
            self.cmd.record(Command::DrawPrimitives {
                num_vertices,
                num_instances,
                first_vertex,
                first_instance,
            });
        }
    }

    pub fn draw_indexed_primitives(
        &mut self,
        num_indices: u32,
        num_instances: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        if self.can_draw("draw_indexed_primitives", true) {
            self.cmd.record(Command::DrawIndexedPrimitives {
                num_indices,
                num_instances,
                first_index,
                vertex_offset,
                first_instance,
            });
        }
    }

    /// Issue `draw_count` draws whose arguments are packed
    /// [`DrawIndirectArgs`](crate::DrawIndirectArgs) in `buffer` at `offset`.
    pub fn draw_primitives_indirect(&mut self, buffer: &Buffer, offset: u64, draw_count: u32) {
        if self.can_draw("draw_primitives_indirect", false) {
            self.cmd.record(Command::DrawPrimitivesIndirect {
                buffer: buffer.handle(),
                offset,
                draw_count,
            });
        }
    }

    /// Like [`draw_primitives_indirect`](Self::draw_primitives_indirect) with
    /// [`DrawIndexedIndirectArgs`](crate::DrawIndexedIndirectArgs).
    pub fn draw_indexed_primitives_indirect(
        &mut self,
        buffer: &Buffer,
        offset: u64,
        draw_count: u32,
    ) {
        if self.can_draw("draw_indexed_primitives_indirect", true) {
            self.cmd.record(Command::DrawIndexedPrimitivesIndirect {
                buffer: buffer.handle(),
                offset,
                draw_count,
            });
        }
    }

    /// End the pass. Dropping it has the same effect.
    pub fn end(self) {}
}

impl Drop for RenderPass<'_, '_> {
    fn drop(&mut self) {
        self.cmd.record(Command::EndRenderPass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::GpuDevice;
    use crate::types::{BufferDescriptor, BufferUsage, ShaderFormat, TextureDescriptor, TextureFormat, SampleCount};

    fn device() -> GpuDevice {
        GpuDevice::create(ShaderFormat::SPIRV, true, None).unwrap()
    }

    fn color_texture(device: &GpuDevice, width: u32, height: u32) -> Texture {
        device
            .create_texture(&TextureDescriptor::new_2d(
                width,
                height,
                TextureFormat::Rgba8Unorm,
                TextureUsage::COLOR_TARGET,
            ))
            .unwrap()
    }

    #[test]
    fn test_pass_requires_a_target() {
        let device = device();
        let mut cmd = device.acquire_command_buffer().unwrap();
        assert!(matches!(
            cmd.begin_render_pass(&[], None),
            Err(GpuError::InvalidParameter(_))
        ));
        assert!(cmd.commands().is_empty());
        cmd.cancel();
    }

    #[test]
    fn test_mismatched_target_sizes_rejected() {
        let device = device();
        let a = color_texture(&device, 64, 64);
        let b = color_texture(&device, 32, 64);
        let mut cmd = device.acquire_command_buffer().unwrap();
        let targets = [ColorTargetInfo::new(&a), ColorTargetInfo::new(&b)];
        assert!(cmd.begin_render_pass(&targets, None).is_err());
        cmd.cancel();
    }

    #[test]
    fn test_resolve_needs_multisampled_source() {
        let device = device();
        let a = color_texture(&device, 16, 16);
        let b = color_texture(&device, 16, 16);
        let mut cmd = device.acquire_command_buffer().unwrap();
        let targets = [ColorTargetInfo::new(&a).with_resolve(&b)];
        assert!(cmd.begin_render_pass(&targets, None).is_err());

        let msaa = device
            .create_texture(
                &TextureDescriptor::new_2d(
                    16,
                    16,
                    TextureFormat::Rgba8Unorm,
                    TextureUsage::COLOR_TARGET,
                )
                .with_sample_count(SampleCount::Four),
            )
            .unwrap();
        let targets = [ColorTargetInfo::new(&msaa).with_resolve(&b)];
        cmd.begin_render_pass(&targets, None).unwrap().end();
        cmd.submit().unwrap();
    }

    #[test]
    fn test_draw_without_pipeline_is_dropped() {
        let device = device();
        let target = color_texture(&device, 8, 8);
        let index = device
            .create_buffer(&BufferDescriptor::new(64, BufferUsage::INDEX))
            .unwrap();
        let mut cmd = device.acquire_command_buffer().unwrap();
        {
            let mut pass = cmd
                .begin_render_pass(&[ColorTargetInfo::new(&target)], None)
                .unwrap();
            pass.draw_primitives(3, 1, 0, 0);
            pass.bind_index_buffer(BufferBinding::new(&index, 0), IndexElementSize::Sixteen);
            pass.draw_indexed_primitives(3, 1, 0, 0, 0);
        }
        assert_eq!(cmd.commands().draw_count(), 0);
        assert_eq!(cmd.commands().commands().last(), Some(&Command::EndRenderPass));
        cmd.submit().unwrap();
    }

    #[test]
    fn test_vertex_buffer_slot_range() {
        let device = device();
        let target = color_texture(&device, 8, 8);
        let vb = device
            .create_buffer(&BufferDescriptor::new(64, BufferUsage::VERTEX))
            .unwrap();
        let mut cmd = device.acquire_command_buffer().unwrap();
        {
            let mut pass = cmd
                .begin_render_pass(&[ColorTargetInfo::new(&target)], None)
                .unwrap();
            let binding = BufferBinding::new(&vb, 0);
            pass.bind_vertex_buffers(MAX_VERTEX_BUFFERS as u32 - 1, &[binding, binding]);
            pass.bind_vertex_buffers(MAX_VERTEX_BUFFERS as u32 - 1, &[binding]);
        }
        let binds = cmd
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::BindVertexBuffers { .. }))
            .count();
        assert_eq!(binds, 1);
        cmd.cancel();
    }
}
