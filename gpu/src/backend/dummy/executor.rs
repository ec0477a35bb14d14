//! Replays a submitted command list against host-memory resources.
//!
//! Copies, uploads, downloads, blits, clears and resolves touch real data.
//! Draws and dispatches are validated against the bound state and counted.
//! A command that fails validation is skipped; a render or compute pass whose
//! begin fails skips everything up to its end.

use std::collections::HashMap;
use std::sync::Arc;

use super::state::{State, TextureEntry};
use super::storage::{HostMemory, encode_color, encode_depth, fill_texels};
use crate::commands::{Command, PipelineStage};
use crate::handle::{
    BufferHandle, ComputePipelineHandle, GraphicsPipelineHandle, TextureHandle,
    TransferBufferHandle,
};
use crate::limits::{
    MAX_COMPUTE_WRITE_BINDINGS, MAX_SAMPLERS, MAX_STORAGE_BUFFERS, MAX_STORAGE_TEXTURES,
    MAX_UNIFORM_SLOTS, MAX_VERTEX_BUFFERS,
};
use crate::pass::BindingSlots;
use crate::types::{
    BlitInfo, BufferBinding, BufferLocation, BufferRegion, BufferUsage, ColorTargetInfo,
    DepthStencilTargetInfo, DispatchIndirectArgs, DrawIndexedIndirectArgs, DrawIndirectArgs,
    IndexElementSize, LoadOp, ShaderDescriptor, StorageBufferReadWriteBinding,
    StorageTextureReadWriteBinding, TextureLocation, TextureRegion, TextureSamplerBinding,
    TextureTransferInfo, TextureUsage, TransferBufferLocation, TransferBufferUsage,
};

/// A box inside one mip level of a texture.
#[derive(Debug, Clone, Copy)]
struct TexelBox {
    mip_level: u32,
    layer: u32,
    x: u32,
    y: u32,
    z: u32,
    width: u32,
    height: u32,
    depth: u32,
}

impl From<&TextureRegion> for TexelBox {
    fn from(r: &TextureRegion) -> Self {
        Self {
            mip_level: r.mip_level,
            layer: r.layer,
            x: r.x,
            y: r.y,
            z: r.z,
            width: r.width,
            height: r.height,
            depth: r.depth,
        }
    }
}

/// Resolved storage location of a texel box.
struct Subresource {
    layer_index: u32,
    level_width: u32,
    level_height: u32,
    bpp: usize,
}

impl Subresource {
    fn resolve(entry: &TextureEntry, region: &TexelBox) -> Result<Self, String> {
        let desc = &entry.descriptor;
        if region.mip_level >= desc.num_levels {
            return Err(format!(
                "mip level {} out of range ({} levels)",
                region.mip_level, desc.num_levels
            ));
        }
        let (lw, lh, ld) = desc.level_extent(region.mip_level);
        let volume = desc.texture_type.is_volume();
        if volume && region.layer != 0 {
            return Err("3D textures have a single layer".to_string());
        }
        if !volume && (region.layer >= desc.array_layers() || region.z != 0 || region.depth != 1) {
            return Err(format!(
                "layer {} / depth {} out of range for {} layers",
                region.layer,
                region.depth,
                desc.array_layers()
            ));
        }
        let fits = |start: u32, len: u32, extent: u32| {
            start.checked_add(len).is_some_and(|end| end <= extent)
        };
        if !fits(region.x, region.width, lw)
            || !fits(region.y, region.height, lh)
            || !fits(region.z, region.depth, ld)
        {
            return Err(format!(
                "region {}x{}x{} at ({}, {}, {}) exceeds level extent {lw}x{lh}x{ld}",
                region.width, region.height, region.depth, region.x, region.y, region.z
            ));
        }
        Ok(Self {
            layer_index: region.layer,
            level_width: lw,
            level_height: lh,
            bpp: desc.format.block_size() as usize,
        })
    }

    fn offset(&self, x: u32, y: u32, z: u32) -> usize {
        ((z as usize * self.level_height as usize + y as usize) * self.level_width as usize
            + x as usize)
            * self.bpp
    }
}

/// Copy a texel box out of a texture, tightly packed.
fn read_box(entry: &TextureEntry, region: &TexelBox) -> Result<Vec<u8>, String> {
    let sub = Subresource::resolve(entry, region)?;
    let data = entry
        .storage
        .get(region.mip_level, sub.layer_index)
        .ok_or("missing subresource")?;
    let row = region.width as usize * sub.bpp;
    let mut out = Vec::with_capacity(box_bytes(region, sub.bpp)?);
    for dz in 0..region.depth {
        for dy in 0..region.height {
            let start = sub.offset(region.x, region.y + dy, region.z + dz);
            out.extend_from_slice(&data[start..start + row]);
        }
    }
    Ok(out)
}

/// Write tightly packed texels into a texture box.
fn write_box(entry: &mut TextureEntry, region: &TexelBox, texels: &[u8]) -> Result<(), String> {
    let sub = Subresource::resolve(entry, region)?;
    let row = region.width as usize * sub.bpp;
    if texels.len() < box_bytes(region, sub.bpp)? {
        return Err("not enough texel data".to_string());
    }
    let data = entry
        .storage
        .get_mut(region.mip_level, sub.layer_index)
        .ok_or("missing subresource")?;
    let mut src = 0;
    for dz in 0..region.depth {
        for dy in 0..region.height {
            let start = sub.offset(region.x, region.y + dy, region.z + dz);
            data[start..start + row].copy_from_slice(&texels[src..src + row]);
            src += row;
        }
    }
    Ok(())
}

/// Size in bytes of a tightly packed texel box.
fn box_bytes(region: &TexelBox, bpp: usize) -> Result<usize, String> {
    (region.width as usize)
        .checked_mul(region.height as usize)
        .and_then(|n| n.checked_mul(region.depth as usize))
        .and_then(|n| n.checked_mul(bpp))
        .ok_or_else(|| {
            format!(
                "region {}x{}x{} is too large",
                region.width, region.height, region.depth
            )
        })
}

/// Fill a whole 2D plane with one encoded texel.
fn clear_plane(entry: &mut TextureEntry, region: &TexelBox, texel: &[u8]) -> Result<(), String> {
    let mut plane = vec![0u8; box_bytes(region, texel.len())?];
    fill_texels(&mut plane, texel);
    write_box(entry, region, &plane)
}

/// Whole 2D plane of a subresource, used for clears and resolves.
fn plane_box(entry: &TextureEntry, mip_level: u32, layer_or_depth_plane: u32) -> TexelBox {
    let (width, height, _) = entry.descriptor.level_extent(mip_level);
    let volume = entry.descriptor.texture_type.is_volume();
    TexelBox {
        mip_level,
        layer: if volume { 0 } else { layer_or_depth_plane },
        x: 0,
        y: 0,
        z: if volume { layer_or_depth_plane } else { 0 },
        width,
        height,
        depth: 1,
    }
}

struct RenderState {
    color_targets: Vec<ColorTargetInfo>,
    depth_stencil: Option<DepthStencilTargetInfo>,
    pipeline: Option<GraphicsPipelineHandle>,
    vertex_buffers: BindingSlots<BufferBinding>,
    index_buffer: Option<(BufferBinding, IndexElementSize)>,
    samplers: [BindingSlots<TextureSamplerBinding>; 2],
    storage_textures: [BindingSlots<TextureHandle>; 2],
    storage_buffers: [BindingSlots<BufferHandle>; 2],
}

struct ComputeState {
    storage_textures: Vec<StorageTextureReadWriteBinding>,
    storage_buffers: Vec<StorageBufferReadWriteBinding>,
    pipeline: Option<ComputePipelineHandle>,
    samplers: BindingSlots<TextureSamplerBinding>,
    readonly_textures: BindingSlots<TextureHandle>,
    readonly_buffers: BindingSlots<BufferHandle>,
}

enum PassState {
    None,
    Render(Box<RenderState>),
    Compute(ComputeState),
    Copy,
    /// A pass whose begin failed validation.
    Skipped,
}

pub(crate) struct Executor<'a> {
    state: &'a mut State,
    transfers: &'a HashMap<TransferBufferHandle, Arc<HostMemory>>,
    debug_mode: bool,
    uniforms: [[bool; MAX_UNIFORM_SLOTS as usize]; 3],
    pass: PassState,
    debug_depth: u32,
}

impl<'a> Executor<'a> {
    pub fn new(
        state: &'a mut State,
        transfers: &'a HashMap<TransferBufferHandle, Arc<HostMemory>>,
        debug_mode: bool,
    ) -> Self {
        Self {
            state,
            transfers,
            debug_mode,
            uniforms: [[false; MAX_UNIFORM_SLOTS as usize]; 3],
            pass: PassState::None,
            debug_depth: 0,
        }
    }

    fn invalid(&mut self, message: impl std::fmt::Display) {
        self.state.stats.validation_errors += 1;
        if self.debug_mode {
            log::error!("DummyBackend: validation failed: {message}");
        } else {
            log::debug!("DummyBackend: validation failed: {message}");
        }
    }

    fn check(&mut self, result: Result<(), String>) -> bool {
        match result {
            Ok(()) => true,
            Err(message) => {
                self.invalid(message);
                false
            }
        }
    }

    pub fn run<'c>(mut self, commands: impl IntoIterator<Item = &'c Command>) {
        for command in commands {
            self.execute(command);
        }
        if !matches!(self.pass, PassState::None) {
            self.invalid("command list ended inside a pass");
        }
        if self.debug_depth != 0 {
            log::warn!(
                "DummyBackend: {} debug group(s) left open at end of command buffer",
                self.debug_depth
            );
        }
    }

    fn execute(&mut self, command: &Command) {
        if matches!(self.pass, PassState::Skipped) {
            if command.ends_pass() {
                self.pass = PassState::None;
            }
            return;
        }

        match command {
            Command::PushUniformData { stage, slot, .. } => {
                match self.uniforms[stage.index()].get_mut(*slot as usize) {
                    Some(pushed) => *pushed = true,
                    None => self.invalid(format!("uniform slot {slot} out of range")),
                }
            }
            Command::InsertDebugLabel(label) => log::trace!("DummyBackend: label {label:?}"),
            Command::PushDebugGroup(name) => {
                log::trace!("DummyBackend: push group {name:?}");
                self.debug_depth += 1;
            }
            Command::PopDebugGroup => {
                self.debug_depth = self.debug_depth.saturating_sub(1);
            }
            Command::BlitTexture(info) => self.blit(info),
            Command::GenerateMipmaps(texture) => self.generate_mipmaps(*texture),

            Command::BeginRenderPass {
                color_targets,
                depth_stencil,
            } => self.begin_render_pass(color_targets, depth_stencil.as_ref()),
            Command::EndRenderPass => self.end_render_pass(),
            Command::BeginComputePass {
                storage_textures,
                storage_buffers,
            } => self.begin_compute_pass(storage_textures, storage_buffers),
            Command::EndComputePass => self.end_pass("compute"),
            Command::BeginCopyPass => self.begin_copy_pass(),
            Command::EndCopyPass => self.end_pass("copy"),

            Command::SetViewport(_)
            | Command::SetScissor(_)
            | Command::SetBlendConstants(_)
            | Command::SetStencilReference(_) => {
                if !matches!(self.pass, PassState::Render(_)) {
                    self.invalid("dynamic state set outside a render pass");
                }
            }
            Command::BindGraphicsPipeline(pipeline) => self.bind_graphics_pipeline(*pipeline),
            Command::BindVertexBuffers {
                first_slot,
                bindings,
            } => {
                let result = match &mut self.pass {
                    PassState::Render(render) => render
                        .vertex_buffers
                        .bind(*first_slot, bindings)
                        .map_err(|e| e.to_string()),
                    _ => Err("vertex buffers bound outside a render pass".to_string()),
                };
                self.check(result);
            }
            Command::BindIndexBuffer {
                binding,
                index_size,
            } => {
                let result = match &mut self.pass {
                    PassState::Render(render) => {
                        render.index_buffer = Some((*binding, *index_size));
                        Ok(())
                    }
                    _ => Err("index buffer bound outside a render pass".to_string()),
                };
                self.check(result);
            }
            Command::BindSamplers {
                stage,
                first_slot,
                bindings,
            } => {
                let result = match (&mut self.pass, stage) {
                    (PassState::Render(render), PipelineStage::Vertex | PipelineStage::Fragment) => {
                        render.samplers[stage.index()].bind(*first_slot, bindings)
                    }
                    (PassState::Compute(compute), PipelineStage::Compute) => {
                        compute.samplers.bind(*first_slot, bindings)
                    }
                    _ => Err(crate::GpuError::InvalidState(format!(
                        "{stage:?} samplers bound outside a matching pass"
                    ))),
                };
                self.check(result.map_err(|e| e.to_string()));
            }
            Command::BindStorageTextures {
                stage,
                first_slot,
                textures,
            } => {
                let result = match (&mut self.pass, stage) {
                    (PassState::Render(render), PipelineStage::Vertex | PipelineStage::Fragment) => {
                        render.storage_textures[stage.index()].bind(*first_slot, textures)
                    }
                    (PassState::Compute(compute), PipelineStage::Compute) => {
                        compute.readonly_textures.bind(*first_slot, textures)
                    }
                    _ => Err(crate::GpuError::InvalidState(format!(
                        "{stage:?} storage textures bound outside a matching pass"
                    ))),
                };
                self.check(result.map_err(|e| e.to_string()));
            }
            Command::BindStorageBuffers {
                stage,
                first_slot,
                buffers,
            } => {
                let result = match (&mut self.pass, stage) {
                    (PassState::Render(render), PipelineStage::Vertex | PipelineStage::Fragment) => {
                        render.storage_buffers[stage.index()].bind(*first_slot, buffers)
                    }
                    (PassState::Compute(compute), PipelineStage::Compute) => {
                        compute.readonly_buffers.bind(*first_slot, buffers)
                    }
                    _ => Err(crate::GpuError::InvalidState(format!(
                        "{stage:?} storage buffers bound outside a matching pass"
                    ))),
                };
                self.check(result.map_err(|e| e.to_string()));
            }
            Command::DrawPrimitives {
                num_vertices,
                num_instances,
                first_vertex,
                ..
            } => {
                let result = self
                    .validate_draw(false)
                    .and_then(|()| self.validate_vertex_range(*first_vertex, *num_vertices, *num_instances));
                if self.check(result) {
                    self.state.stats.draw_calls += 1;
                }
            }
            Command::DrawIndexedPrimitives {
                num_indices,
                first_index,
                ..
            } => {
                let result = self
                    .validate_draw(true)
                    .and_then(|()| self.validate_index_range(*first_index, *num_indices));
                if self.check(result) {
                    self.state.stats.draw_calls += 1;
                }
            }
            Command::DrawPrimitivesIndirect {
                buffer,
                offset,
                draw_count,
            } => {
                let result = self
                    .validate_draw(false)
                    .and_then(|()| self.indirect_draws::<DrawIndirectArgs>(*buffer, *offset, *draw_count))
                    .map(|_| ());
                if self.check(result) {
                    self.state.stats.draw_calls += *draw_count as u64;
                }
            }
            Command::DrawIndexedPrimitivesIndirect {
                buffer,
                offset,
                draw_count,
            } => {
                let result = self.validate_draw(true).and_then(|()| {
                    let draws =
                        self.indirect_draws::<DrawIndexedIndirectArgs>(*buffer, *offset, *draw_count)?;
                    draws
                        .iter()
                        .try_for_each(|args| self.validate_index_range(args.first_index, args.index_count))
                });
                if self.check(result) {
                    self.state.stats.draw_calls += *draw_count as u64;
                }
            }

            Command::BindComputePipeline(pipeline) => {
                let result = if !self.state.compute_pipelines.contains(pipeline.raw()) {
                    Err(format!("compute pipeline {pipeline:?} is not alive"))
                } else if let PassState::Compute(compute) = &mut self.pass {
                    compute.pipeline = Some(*pipeline);
                    Ok(())
                } else {
                    Err("compute pipeline bound outside a compute pass".to_string())
                };
                self.check(result);
            }
            Command::Dispatch { .. } => {
                let result = self.validate_dispatch();
                if self.check(result) {
                    self.state.stats.dispatches += 1;
                }
            }
            Command::DispatchIndirect { buffer, offset } => {
                let result = self.validate_dispatch().and_then(|()| {
                    self.indirect_draws::<DispatchIndirectArgs>(*buffer, *offset, 1)
                        .map(|_| ())
                });
                if self.check(result) {
                    self.state.stats.dispatches += 1;
                }
            }

            Command::UploadToBuffer {
                source,
                destination,
                ..
            } => {
                let result = self.in_copy_pass().and_then(|()| self.upload_to_buffer(source, destination));
                self.count_copy(result);
            }
            Command::UploadToTexture {
                source,
                destination,
                ..
            } => {
                let result = self
                    .in_copy_pass()
                    .and_then(|()| self.upload_to_texture(source, destination));
                self.count_copy(result);
            }
            Command::CopyBufferToBuffer {
                source,
                destination,
                size,
                ..
            } => {
                let result = self
                    .in_copy_pass()
                    .and_then(|()| self.copy_buffer_to_buffer(source, destination, *size));
                self.count_copy(result);
            }
            Command::CopyTextureToTexture {
                source,
                destination,
                width,
                height,
                depth,
                ..
            } => {
                let result = self.in_copy_pass().and_then(|()| {
                    self.copy_texture_to_texture(source, destination, *width, *height, *depth)
                });
                self.count_copy(result);
            }
            Command::DownloadFromBuffer {
                source,
                destination,
            } => {
                let result = self
                    .in_copy_pass()
                    .and_then(|()| self.download_from_buffer(source, destination));
                self.count_copy(result);
            }
            Command::DownloadFromTexture {
                source,
                destination,
            } => {
                let result = self
                    .in_copy_pass()
                    .and_then(|()| self.download_from_texture(source, destination));
                self.count_copy(result);
            }
        }
    }

    fn count_copy(&mut self, result: Result<(), String>) {
        if self.check(result) {
            self.state.stats.copy_operations += 1;
        }
    }

    // ------------------------------------------------------------------
    // Passes
    // ------------------------------------------------------------------

    fn begin_pass_allowed(&mut self) -> bool {
        if matches!(self.pass, PassState::None) {
            true
        } else {
            self.invalid("pass begun while another pass is open");
            false
        }
    }

    fn end_pass(&mut self, kind: &str) {
        let matches = matches!(
            (&self.pass, kind),
            (PassState::Compute(_), "compute") | (PassState::Copy, "copy")
        );
        if !matches {
            self.invalid(format!("end of {kind} pass without matching begin"));
        }
        self.pass = PassState::None;
    }

    fn begin_render_pass(
        &mut self,
        color_targets: &[ColorTargetInfo],
        depth_stencil: Option<&DepthStencilTargetInfo>,
    ) {
        if !self.begin_pass_allowed() {
            return;
        }
        let result = self.validate_render_targets(color_targets, depth_stencil);
        if !self.check(result) {
            self.pass = PassState::Skipped;
            return;
        }

        for target in color_targets {
            if target.load_op != LoadOp::Clear {
                continue;
            }
            if let Some(entry) = self.state.textures.get_mut(target.target.texture.raw()) {
                let texel = encode_color(entry.descriptor.format, target.clear_color);
                let region = plane_box(entry, target.mip_level, target.layer_or_depth_plane);
                let _ = clear_plane(entry, &region, &texel);
            }
        }
        if let Some(ds) = depth_stencil
            && (ds.load_op == LoadOp::Clear || ds.stencil_load_op == LoadOp::Clear)
            && let Some(entry) = self.state.textures.get_mut(ds.target.texture.raw())
        {
            let texel = encode_depth(entry.descriptor.format, ds.clear_depth, ds.clear_stencil);
            let region = plane_box(entry, 0, 0);
            let _ = clear_plane(entry, &region, &texel);
        }

        self.pass = PassState::Render(Box::new(RenderState {
            color_targets: color_targets.to_vec(),
            depth_stencil: depth_stencil.copied(),
            pipeline: None,
            vertex_buffers: BindingSlots::new(MAX_VERTEX_BUFFERS),
            index_buffer: None,
            samplers: [BindingSlots::new(MAX_SAMPLERS), BindingSlots::new(MAX_SAMPLERS)],
            storage_textures: [
                BindingSlots::new(MAX_STORAGE_TEXTURES),
                BindingSlots::new(MAX_STORAGE_TEXTURES),
            ],
            storage_buffers: [
                BindingSlots::new(MAX_STORAGE_BUFFERS),
                BindingSlots::new(MAX_STORAGE_BUFFERS),
            ],
        }));
    }

    fn validate_render_targets(
        &self,
        color_targets: &[ColorTargetInfo],
        depth_stencil: Option<&DepthStencilTargetInfo>,
    ) -> Result<(), String> {
        for target in color_targets {
            let entry = self
                .state
                .textures
                .get(target.target.texture.raw())
                .ok_or_else(|| format!("color target {:?} is not alive", target.target.texture))?;
            if !entry.descriptor.usage.contains(TextureUsage::COLOR_TARGET) {
                return Err("color target lacks COLOR_TARGET usage".to_string());
            }
            Subresource::resolve(entry, &plane_box(entry, target.mip_level, target.layer_or_depth_plane))?;
            if let Some(resolve) = &target.resolve_target {
                let resolve_entry = self
                    .state
                    .textures
                    .get(resolve.texture.raw())
                    .ok_or_else(|| format!("resolve target {:?} is not alive", resolve.texture))?;
                Subresource::resolve(
                    resolve_entry,
                    &plane_box(resolve_entry, target.resolve_mip_level, target.resolve_layer),
                )?;
            }
        }
        if let Some(ds) = depth_stencil {
            let entry = self
                .state
                .textures
                .get(ds.target.texture.raw())
                .ok_or_else(|| format!("depth target {:?} is not alive", ds.target.texture))?;
            if !entry.descriptor.usage.contains(TextureUsage::DEPTH_STENCIL_TARGET) {
                return Err("depth target lacks DEPTH_STENCIL_TARGET usage".to_string());
            }
        }
        Ok(())
    }

    fn end_render_pass(&mut self) {
        let PassState::Render(render) = std::mem::replace(&mut self.pass, PassState::None) else {
            self.invalid("end of render pass without matching begin");
            return;
        };
        for target in &render.color_targets {
            let Some(resolve) = target.resolve_target.filter(|_| target.store_op.resolves()) else {
                continue;
            };
            let texels = self
                .state
                .textures
                .get(target.target.texture.raw())
                .and_then(|entry| {
                    read_box(entry, &plane_box(entry, target.mip_level, target.layer_or_depth_plane))
                        .ok()
                });
            let result = match (texels, self.state.textures.get_mut(resolve.texture.raw())) {
                (Some(texels), Some(entry)) => {
                    let region = plane_box(entry, target.resolve_mip_level, target.resolve_layer);
                    write_box(entry, &region, &texels)
                }
                _ => Err("resolve source or destination vanished".to_string()),
            };
            self.check(result);
        }
    }

    fn begin_compute_pass(
        &mut self,
        storage_textures: &[StorageTextureReadWriteBinding],
        storage_buffers: &[StorageBufferReadWriteBinding],
    ) {
        if !self.begin_pass_allowed() {
            return;
        }
        let result = (|| {
            if storage_textures.len() > MAX_COMPUTE_WRITE_BINDINGS
                || storage_buffers.len() > MAX_COMPUTE_WRITE_BINDINGS
            {
                return Err("too many read-write storage bindings".to_string());
            }
            let writable =
                TextureUsage::COMPUTE_STORAGE_WRITE | TextureUsage::COMPUTE_STORAGE_SIMULTANEOUS_READ_WRITE;
            for binding in storage_textures {
                let entry = self
                    .state
                    .textures
                    .get(binding.texture.raw())
                    .ok_or_else(|| format!("storage texture {:?} is not alive", binding.texture))?;
                if !entry.descriptor.usage.intersects(writable) {
                    return Err("storage texture lacks COMPUTE_STORAGE_WRITE usage".to_string());
                }
            }
            for binding in storage_buffers {
                let entry = self
                    .state
                    .buffers
                    .get(binding.buffer.raw())
                    .ok_or_else(|| format!("storage buffer {:?} is not alive", binding.buffer))?;
                if !entry.descriptor.usage.contains(BufferUsage::COMPUTE_STORAGE_WRITE) {
                    return Err("storage buffer lacks COMPUTE_STORAGE_WRITE usage".to_string());
                }
            }
            Ok(())
        })();
        if !self.check(result) {
            self.pass = PassState::Skipped;
            return;
        }
        self.pass = PassState::Compute(ComputeState {
            storage_textures: storage_textures.to_vec(),
            storage_buffers: storage_buffers.to_vec(),
            pipeline: None,
            samplers: BindingSlots::new(MAX_SAMPLERS),
            readonly_textures: BindingSlots::new(MAX_STORAGE_TEXTURES),
            readonly_buffers: BindingSlots::new(MAX_STORAGE_BUFFERS),
        });
    }

    fn begin_copy_pass(&mut self) {
        if self.begin_pass_allowed() {
            self.pass = PassState::Copy;
        }
    }

    fn in_copy_pass(&self) -> Result<(), String> {
        match self.pass {
            PassState::Copy => Ok(()),
            _ => Err("copy command outside a copy pass".to_string()),
        }
    }

    // ------------------------------------------------------------------
    // Draw validation
    // ------------------------------------------------------------------

    fn bind_graphics_pipeline(&mut self, pipeline: GraphicsPipelineHandle) {
        let result = match (&mut self.pass, self.state.graphics_pipelines.get(pipeline.raw())) {
            (PassState::Render(render), Some(entry)) => {
                let info = &entry.descriptor.target_info;
                let formats_match = info.color_target_descriptions.len() == render.color_targets.len()
                    && info
                        .color_target_descriptions
                        .iter()
                        .zip(&render.color_targets)
                        .all(|(desc, target)| desc.format == target.target.format);
                let depth_matches = match (info.depth_stencil_format, &render.depth_stencil) {
                    (Some(format), Some(ds)) => format == ds.target.format,
                    (Some(_), None) => false,
                    (None, _) => true,
                };
                let samples = entry.descriptor.multisample_state.sample_count;
                let samples_match = render
                    .color_targets
                    .iter()
                    .all(|target| target.target.sample_count == samples);
                if !formats_match {
                    Err("pipeline color target formats do not match the pass".to_string())
                } else if !depth_matches {
                    Err("pipeline depth format does not match the pass".to_string())
                } else if !samples_match {
                    Err("pipeline sample count does not match the pass".to_string())
                } else {
                    render.pipeline = Some(pipeline);
                    Ok(())
                }
            }
            (PassState::Render(_), None) => Err(format!("graphics pipeline {pipeline:?} is not alive")),
            _ => Err("graphics pipeline bound outside a render pass".to_string()),
        };
        self.check(result);
    }

    fn stage_resources_bound(
        &self,
        stage: PipelineStage,
        shader: &ShaderDescriptor,
        render: &RenderState,
    ) -> Result<(), String> {
        let index = stage.index();
        for binding in render.samplers[index].prefix(shader.num_samplers) {
            let texture = self
                .state
                .textures
                .get(binding.texture.raw())
                .ok_or("sampled texture is not alive")?;
            if !texture.descriptor.usage.contains(TextureUsage::SAMPLER) {
                return Err("sampled texture lacks SAMPLER usage".to_string());
            }
            if !self.state.samplers.contains(binding.sampler.raw()) {
                return Err("sampler is not alive".to_string());
            }
        }
        if !render.samplers[index].is_bound_prefix(shader.num_samplers) {
            return Err(format!("{stage:?} shader needs {} samplers", shader.num_samplers));
        }
        if !render.storage_textures[index].is_bound_prefix(shader.num_storage_textures) {
            return Err(format!(
                "{stage:?} shader needs {} storage textures",
                shader.num_storage_textures
            ));
        }
        for texture in render.storage_textures[index].prefix(shader.num_storage_textures) {
            let usage = self
                .state
                .textures
                .get(texture.raw())
                .map(|t| t.descriptor.usage)
                .ok_or("storage texture is not alive")?;
            if !usage.contains(TextureUsage::GRAPHICS_STORAGE_READ) {
                return Err("storage texture lacks GRAPHICS_STORAGE_READ usage".to_string());
            }
        }
        if !render.storage_buffers[index].is_bound_prefix(shader.num_storage_buffers) {
            return Err(format!(
                "{stage:?} shader needs {} storage buffers",
                shader.num_storage_buffers
            ));
        }
        for buffer in render.storage_buffers[index].prefix(shader.num_storage_buffers) {
            let usage = self
                .state
                .buffers
                .get(buffer.raw())
                .map(|b| b.descriptor.usage)
                .ok_or("storage buffer is not alive")?;
            if !usage.contains(BufferUsage::GRAPHICS_STORAGE_READ) {
                return Err("storage buffer lacks GRAPHICS_STORAGE_READ usage".to_string());
            }
        }
        let pushed = &self.uniforms[index];
        if (0..shader.num_uniform_buffers.min(MAX_UNIFORM_SLOTS)).any(|slot| !pushed[slot as usize]) {
            return Err(format!(
                "{stage:?} shader needs {} uniform slots pushed",
                shader.num_uniform_buffers
            ));
        }
        Ok(())
    }

    fn validate_draw(&self, indexed: bool) -> Result<(), String> {
        let PassState::Render(render) = &self.pass else {
            return Err("draw outside a render pass".to_string());
        };
        let pipeline = render.pipeline.ok_or("draw without a bound graphics pipeline")?;
        let entry = self
            .state
            .graphics_pipelines
            .get(pipeline.raw())
            .ok_or("bound graphics pipeline was released")?;

        for description in &entry.descriptor.vertex_input_state.buffers {
            let binding = render
                .vertex_buffers
                .get(description.slot)
                .ok_or_else(|| format!("vertex buffer slot {} is not bound", description.slot))?;
            let buffer = self
                .state
                .buffers
                .get(binding.buffer.raw())
                .ok_or("vertex buffer is not alive")?;
            if !buffer.descriptor.usage.contains(BufferUsage::VERTEX) {
                return Err("vertex buffer lacks VERTEX usage".to_string());
            }
        }
        if indexed {
            let (binding, _) = render.index_buffer.ok_or("indexed draw without an index buffer")?;
            let buffer = self
                .state
                .buffers
                .get(binding.buffer.raw())
                .ok_or("index buffer is not alive")?;
            if !buffer.descriptor.usage.contains(BufferUsage::INDEX) {
                return Err("index buffer lacks INDEX usage".to_string());
            }
        }

        self.stage_resources_bound(PipelineStage::Vertex, &entry.vertex, render)?;
        self.stage_resources_bound(PipelineStage::Fragment, &entry.fragment, render)
    }

    /// Per-vertex buffers must hold every vertex read by a non-indexed draw.
    fn validate_vertex_range(&self, first: u32, count: u32, instances: u32) -> Result<(), String> {
        let PassState::Render(render) = &self.pass else {
            return Ok(());
        };
        let Some(entry) = render
            .pipeline
            .and_then(|p| self.state.graphics_pipelines.get(p.raw()))
        else {
            return Ok(());
        };
        if count == 0 || instances == 0 {
            return Ok(());
        }
        for description in &entry.descriptor.vertex_input_state.buffers {
            let Some(binding) = render.vertex_buffers.get(description.slot) else {
                continue;
            };
            let Some(buffer) = self.state.buffers.get(binding.buffer.raw()) else {
                continue;
            };
            let elements = match description.input_rate {
                crate::types::VertexInputRate::Vertex => first as u64 + count as u64,
                crate::types::VertexInputRate::Instance => instances as u64,
            };
            let needed = binding.offset + elements * description.pitch as u64;
            if needed > buffer.descriptor.size {
                return Err(format!(
                    "vertex buffer slot {} too small: needs {needed} bytes, has {}",
                    description.slot, buffer.descriptor.size
                ));
            }
        }
        Ok(())
    }

    fn validate_index_range(&self, first_index: u32, num_indices: u32) -> Result<(), String> {
        let PassState::Render(render) = &self.pass else {
            return Ok(());
        };
        let Some((binding, size)) = render.index_buffer else {
            return Ok(());
        };
        let Some(buffer) = self.state.buffers.get(binding.buffer.raw()) else {
            return Ok(());
        };
        let end = binding.offset + (first_index as u64 + num_indices as u64) * size.byte_size();
        if end > buffer.descriptor.size {
            return Err(format!(
                "indices [{first_index}, {}) exceed index buffer of {} bytes",
                first_index as u64 + num_indices as u64,
                buffer.descriptor.size
            ));
        }
        Ok(())
    }

    /// Read `count` indirect argument records from a buffer.
    fn indirect_draws<T: bytemuck::Pod>(
        &self,
        buffer: BufferHandle,
        offset: u64,
        count: u32,
    ) -> Result<Vec<T>, String> {
        let entry = self
            .state
            .buffers
            .get(buffer.raw())
            .ok_or("indirect buffer is not alive")?;
        if !entry.descriptor.usage.contains(BufferUsage::INDIRECT) {
            return Err("indirect buffer lacks INDIRECT usage".to_string());
        }
        let stride = std::mem::size_of::<T>() as u64;
        let end = offset
            .checked_add(stride * count as u64)
            .filter(|&end| end <= entry.descriptor.size)
            .ok_or_else(|| {
                format!(
                    "{count} indirect records at offset {offset} exceed buffer of {} bytes",
                    entry.descriptor.size
                )
            })?;
        Ok(entry.data[offset as usize..end as usize]
            .chunks_exact(stride as usize)
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    fn validate_dispatch(&self) -> Result<(), String> {
        let PassState::Compute(compute) = &self.pass else {
            return Err("dispatch outside a compute pass".to_string());
        };
        let pipeline = compute
            .pipeline
            .ok_or("dispatch without a bound compute pipeline")?;
        let desc = self
            .state
            .compute_pipelines
            .get(pipeline.raw())
            .ok_or("bound compute pipeline was released")?;

        if (compute.storage_textures.len() as u32) < desc.num_readwrite_storage_textures {
            return Err(format!(
                "pipeline writes {} storage textures, pass provides {}",
                desc.num_readwrite_storage_textures,
                compute.storage_textures.len()
            ));
        }
        if (compute.storage_buffers.len() as u32) < desc.num_readwrite_storage_buffers {
            return Err(format!(
                "pipeline writes {} storage buffers, pass provides {}",
                desc.num_readwrite_storage_buffers,
                compute.storage_buffers.len()
            ));
        }
        if !compute.samplers.is_bound_prefix(desc.num_samplers) {
            return Err(format!("pipeline needs {} samplers", desc.num_samplers));
        }
        if !compute
            .readonly_textures
            .is_bound_prefix(desc.num_readonly_storage_textures)
        {
            return Err(format!(
                "pipeline needs {} read-only storage textures",
                desc.num_readonly_storage_textures
            ));
        }
        if !compute
            .readonly_buffers
            .is_bound_prefix(desc.num_readonly_storage_buffers)
        {
            return Err(format!(
                "pipeline needs {} read-only storage buffers",
                desc.num_readonly_storage_buffers
            ));
        }
        for buffer in compute.readonly_buffers.prefix(desc.num_readonly_storage_buffers) {
            let usage = self
                .state
                .buffers
                .get(buffer.raw())
                .map(|b| b.descriptor.usage)
                .ok_or("read-only storage buffer is not alive")?;
            if !usage.contains(BufferUsage::COMPUTE_STORAGE_READ) {
                return Err("storage buffer lacks COMPUTE_STORAGE_READ usage".to_string());
            }
        }
        let pushed = &self.uniforms[PipelineStage::Compute.index()];
        if (0..desc.num_uniform_buffers.min(MAX_UNIFORM_SLOTS)).any(|slot| !pushed[slot as usize]) {
            return Err(format!(
                "pipeline needs {} uniform slots pushed",
                desc.num_uniform_buffers
            ));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Copies
    // ------------------------------------------------------------------

    fn transfer(
        &self,
        handle: TransferBufferHandle,
        usage: TransferBufferUsage,
    ) -> Result<&Arc<HostMemory>, String> {
        let entry = self
            .state
            .transfer_buffers
            .get(handle.raw())
            .ok_or_else(|| format!("transfer buffer {handle:?} is not alive"))?;
        if entry.descriptor.usage != usage {
            return Err(format!(
                "transfer buffer is {:?}, expected {usage:?}",
                entry.descriptor.usage
            ));
        }
        self.transfers
            .get(&handle)
            .ok_or_else(|| format!("transfer buffer {handle:?} was not resolved at submit"))
    }

    fn buffer_range(&self, buffer: BufferHandle, offset: u64, size: u64) -> Result<(usize, usize), String> {
        let entry = self
            .state
            .buffers
            .get(buffer.raw())
            .ok_or_else(|| format!("buffer {buffer:?} is not alive"))?;
        let end = offset
            .checked_add(size)
            .filter(|&end| end <= entry.descriptor.size)
            .ok_or_else(|| {
                format!(
                    "range [{offset}, {offset}+{size}) exceeds buffer of {} bytes",
                    entry.descriptor.size
                )
            })?;
        Ok((offset as usize, end as usize))
    }

    fn upload_to_buffer(
        &mut self,
        source: &TransferBufferLocation,
        destination: &BufferRegion,
    ) -> Result<(), String> {
        let memory = Arc::clone(self.transfer(source.transfer_buffer, TransferBufferUsage::Upload)?);
        let (start, end) = self.buffer_range(destination.buffer, destination.offset, destination.size)?;
        check_host_range(&memory, source.offset, destination.size)?;
        let entry = self
            .state
            .buffers
            .get_mut(destination.buffer.raw())
            .ok_or("destination buffer vanished")?;
        // SAFETY: the backing is not mapped while referenced by a submission.
        unsafe { memory.read(source.offset as usize, &mut entry.data[start..end]) };
        Ok(())
    }

    fn download_from_buffer(
        &mut self,
        source: &BufferRegion,
        destination: &TransferBufferLocation,
    ) -> Result<(), String> {
        let memory = Arc::clone(self.transfer(destination.transfer_buffer, TransferBufferUsage::Download)?);
        let (start, end) = self.buffer_range(source.buffer, source.offset, source.size)?;
        check_host_range(&memory, destination.offset, source.size)?;
        let entry = self
            .state
            .buffers
            .get(source.buffer.raw())
            .ok_or("source buffer vanished")?;
        // SAFETY: the backing is not mapped while referenced by a submission.
        unsafe { memory.write(destination.offset as usize, &entry.data[start..end]) };
        Ok(())
    }

    fn copy_buffer_to_buffer(
        &mut self,
        source: &BufferLocation,
        destination: &BufferLocation,
        size: u64,
    ) -> Result<(), String> {
        let (src_start, src_end) = self.buffer_range(source.buffer, source.offset, size)?;
        let (dst_start, dst_end) = self.buffer_range(destination.buffer, destination.offset, size)?;
        let bytes = self
            .state
            .buffers
            .get(source.buffer.raw())
            .map(|entry| entry.data[src_start..src_end].to_vec())
            .ok_or("source buffer vanished")?;
        let entry = self
            .state
            .buffers
            .get_mut(destination.buffer.raw())
            .ok_or("destination buffer vanished")?;
        entry.data[dst_start..dst_end].copy_from_slice(&bytes);
        Ok(())
    }

    fn upload_to_texture(
        &mut self,
        source: &TextureTransferInfo,
        destination: &TextureRegion,
    ) -> Result<(), String> {
        let memory = Arc::clone(self.transfer(source.transfer_buffer, TransferBufferUsage::Upload)?);
        let region = TexelBox::from(destination);
        let entry = self
            .state
            .textures
            .get_mut(destination.texture.raw())
            .ok_or_else(|| format!("texture {:?} is not alive", destination.texture))?;
        let bpp = Subresource::resolve(entry, &region)?.bpp;
        let rows = gather_rows(&memory, source, &region, bpp)?;
        write_box(entry, &region, &rows)
    }

    fn download_from_texture(
        &mut self,
        source: &TextureRegion,
        destination: &TextureTransferInfo,
    ) -> Result<(), String> {
        let memory = Arc::clone(self.transfer(destination.transfer_buffer, TransferBufferUsage::Download)?);
        let region = TexelBox::from(source);
        let entry = self
            .state
            .textures
            .get(source.texture.raw())
            .ok_or_else(|| format!("texture {:?} is not alive", source.texture))?;
        let bpp = entry.descriptor.format.block_size() as usize;
        let texels = read_box(entry, &region)?;
        scatter_rows(&memory, destination, &region, bpp, &texels)
    }

    fn copy_texture_to_texture(
        &mut self,
        source: &TextureLocation,
        destination: &TextureLocation,
        width: u32,
        height: u32,
        depth: u32,
    ) -> Result<(), String> {
        let src_region = TexelBox {
            mip_level: source.mip_level,
            layer: source.layer,
            x: source.x,
            y: source.y,
            z: source.z,
            width,
            height,
            depth,
        };
        let dst_region = TexelBox {
            mip_level: destination.mip_level,
            layer: destination.layer,
            x: destination.x,
            y: destination.y,
            z: destination.z,
            ..src_region
        };
        let src = self
            .state
            .textures
            .get(source.texture.raw())
            .ok_or_else(|| format!("texture {:?} is not alive", source.texture))?;
        let src_bpp = src.descriptor.format.block_size();
        let texels = read_box(src, &src_region)?;
        let dst = self
            .state
            .textures
            .get_mut(destination.texture.raw())
            .ok_or_else(|| format!("texture {:?} is not alive", destination.texture))?;
        if dst.descriptor.format.block_size() != src_bpp {
            return Err("texture copy between formats of different texel size".to_string());
        }
        write_box(dst, &dst_region, &texels)
    }

    // ------------------------------------------------------------------
    // Blits and mipmaps
    // ------------------------------------------------------------------

    fn blit(&mut self, info: &BlitInfo) {
        let result = (|| {
            if !matches!(self.pass, PassState::None) {
                return Err("blit inside a pass".to_string());
            }
            let src = self
                .state
                .textures
                .get(info.source.texture.raw())
                .ok_or("blit source is not alive")?;
            if !src.descriptor.usage.contains(TextureUsage::SAMPLER) {
                return Err("blit source lacks SAMPLER usage".to_string());
            }
            let src_box = TexelBox {
                mip_level: info.source.mip_level,
                layer: 0,
                x: info.source.x,
                y: info.source.y,
                z: 0,
                width: info.source.width,
                height: info.source.height,
                depth: 1,
            };
            let src_plane = plane_box(src, info.source.mip_level, info.source.layer_or_depth_plane);
            let src_box = TexelBox {
                layer: src_plane.layer,
                z: src_plane.z,
                ..src_box
            };
            let format = src.descriptor.format;
            let texels = read_box(src, &src_box)?;

            let dst = self
                .state
                .textures
                .get_mut(info.destination.texture.raw())
                .ok_or("blit destination is not alive")?;
            if !dst.descriptor.usage.contains(TextureUsage::COLOR_TARGET) {
                return Err("blit destination lacks COLOR_TARGET usage".to_string());
            }
            if dst.descriptor.format != format {
                return Err("blit between different formats".to_string());
            }
            let dst_plane = plane_box(dst, info.destination.mip_level, info.destination.layer_or_depth_plane);
            let dst_box = TexelBox {
                x: info.destination.x,
                y: info.destination.y,
                width: info.destination.width,
                height: info.destination.height,
                ..dst_plane
            };
            let bpp = Subresource::resolve(dst, &dst_box)?.bpp;
            let scaled = scale_nearest(
                &texels,
                (src_box.width, src_box.height),
                (dst_box.width, dst_box.height),
                bpp,
                info.flip_mode.flips_horizontally(),
                info.flip_mode.flips_vertically(),
            );
            if info.load_op == LoadOp::Clear {
                let texel = encode_color(format, info.clear_color);
                clear_plane(dst, &dst_plane, &texel)?;
            }
            write_box(dst, &dst_box, &scaled)
        })();
        if self.check(result) {
            self.state.stats.blits += 1;
        }
    }

    fn generate_mipmaps(&mut self, texture: TextureHandle) {
        let result = (|| {
            if !matches!(self.pass, PassState::None) {
                return Err("mipmap generation inside a pass".to_string());
            }
            let entry = self
                .state
                .textures
                .get_mut(texture.raw())
                .ok_or("mipmap texture is not alive")?;
            let desc = entry.descriptor.clone();
            let required = TextureUsage::SAMPLER | TextureUsage::COLOR_TARGET;
            if !desc.usage.contains(required) {
                return Err("mipmap texture needs SAMPLER and COLOR_TARGET usage".to_string());
            }
            if desc.format.is_depth_stencil() {
                return Err("cannot generate mipmaps for depth formats".to_string());
            }
            let bpp = desc.format.block_size() as usize;
            for layer in 0..desc.array_layers() {
                for level in 1..desc.num_levels {
                    let (pw, ph, pd) = desc.level_extent(level - 1);
                    let (w, h, d) = desc.level_extent(level);
                    let parent = read_box(
                        entry,
                        &TexelBox {
                            mip_level: level - 1,
                            layer,
                            x: 0,
                            y: 0,
                            z: 0,
                            width: pw,
                            height: ph,
                            depth: pd,
                        },
                    )?;
                    let mut child = Vec::with_capacity(w as usize * h as usize * d as usize * bpp);
                    for z in 0..d {
                        for y in 0..h {
                            for x in 0..w {
                                let (sx, sy, sz) = ((x * 2).min(pw - 1), (y * 2).min(ph - 1), (z * 2).min(pd - 1));
                                let at = ((sz as usize * ph as usize + sy as usize) * pw as usize + sx as usize) * bpp;
                                child.extend_from_slice(&parent[at..at + bpp]);
                            }
                        }
                    }
                    write_box(
                        entry,
                        &TexelBox {
                            mip_level: level,
                            layer,
                            x: 0,
                            y: 0,
                            z: 0,
                            width: w,
                            height: h,
                            depth: d,
                        },
                        &child,
                    )?;
                }
            }
            Ok(desc.num_levels.saturating_sub(1))
        })();
        match result {
            Ok(levels) => self.state.stats.blits += levels as u64,
            Err(message) => self.invalid(message),
        }
    }
}

fn check_host_range(memory: &HostMemory, offset: u64, size: u64) -> Result<(), String> {
    match offset.checked_add(size) {
        Some(end) if end <= memory.len() as u64 => Ok(()),
        _ => Err(format!(
            "range [{offset}, {offset}+{size}) exceeds transfer buffer of {} bytes",
            memory.len()
        )),
    }
}

/// Effective row and layer pitch, in pixels and rows.
fn transfer_pitch(info: &TextureTransferInfo, region: &TexelBox) -> Result<(u32, u32), String> {
    let pixels_per_row = if info.pixels_per_row == 0 { region.width } else { info.pixels_per_row };
    let rows_per_layer = if info.rows_per_layer == 0 { region.height } else { info.rows_per_layer };
    if pixels_per_row < region.width || rows_per_layer < region.height {
        return Err("transfer pitch smaller than the region".to_string());
    }
    Ok((pixels_per_row, rows_per_layer))
}

fn transfer_row_offsets(
    info: &TextureTransferInfo,
    region: &TexelBox,
    bpp: usize,
    memory_len: usize,
) -> Result<Vec<usize>, String> {
    let (pixels_per_row, rows_per_layer) = transfer_pitch(info, region)?;
    let exceeds = || format!("texel rows exceed transfer buffer of {memory_len} bytes");
    let row = (region.width as usize).checked_mul(bpp).ok_or_else(exceeds)?;
    let row_pitch = (pixels_per_row as usize).checked_mul(bpp).ok_or_else(exceeds)?;
    let rows = (region.height as usize)
        .checked_mul(region.depth as usize)
        .ok_or_else(exceeds)?;
    let base = usize::try_from(info.offset).map_err(|_| exceeds())?;
    // The last row bounds every other row.
    if rows > 0 {
        let last = (region.depth as usize - 1)
            .checked_mul(rows_per_layer as usize)
            .and_then(|r| r.checked_add(region.height as usize - 1))
            .and_then(|r| r.checked_mul(row_pitch))
            .and_then(|r| r.checked_add(base))
            .and_then(|r| r.checked_add(row));
        if last.is_none_or(|end| end > memory_len) {
            return Err(exceeds());
        }
    }
    let mut offsets = Vec::with_capacity(rows);
    for z in 0..region.depth as usize {
        for y in 0..region.height as usize {
            offsets.push(base + (z * rows_per_layer as usize + y) * row_pitch);
        }
    }
    Ok(offsets)
}

fn gather_rows(
    memory: &HostMemory,
    info: &TextureTransferInfo,
    region: &TexelBox,
    bpp: usize,
) -> Result<Vec<u8>, String> {
    let row = region.width as usize * bpp;
    let offsets = transfer_row_offsets(info, region, bpp, memory.len())?;
    let mut out = vec![0u8; row * offsets.len()];
    for (chunk, start) in out.chunks_exact_mut(row.max(1)).zip(offsets) {
        // SAFETY: the backing is not mapped while referenced by a submission.
        unsafe { memory.read(start, chunk) };
    }
    Ok(out)
}

fn scatter_rows(
    memory: &HostMemory,
    info: &TextureTransferInfo,
    region: &TexelBox,
    bpp: usize,
    texels: &[u8],
) -> Result<(), String> {
    let row = region.width as usize * bpp;
    let offsets = transfer_row_offsets(info, region, bpp, memory.len())?;
    for (chunk, start) in texels.chunks_exact(row.max(1)).zip(offsets) {
        // SAFETY: the backing is not mapped while referenced by a submission.
        unsafe { memory.write(start, chunk) };
    }
    Ok(())
}

/// Nearest-neighbour rescale of a tightly packed 2D image.
fn scale_nearest(
    texels: &[u8],
    (sw, sh): (u32, u32),
    (dw, dh): (u32, u32),
    bpp: usize,
    flip_x: bool,
    flip_y: bool,
) -> Vec<u8> {
    let len = dw as usize * dh as usize * bpp;
    let mut out = Vec::with_capacity(len);
    if sw == 0 || sh == 0 {
        out.resize(len, 0);
        return out;
    }
    for y in 0..dh {
        let ty = if flip_y { dh - 1 - y } else { y };
        let sy = (ty as u64 * sh as u64 / dh as u64) as u32;
        for x in 0..dw {
            let tx = if flip_x { dw - 1 - x } else { x };
            let sx = (tx as u64 * sw as u64 / dw as u64) as u32;
            let at = (sy as usize * sw as usize + sx as usize) * bpp;
            out.extend_from_slice(&texels[at..at + bpp]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_nearest_flip() {
        let texels = [1u8, 2, 3, 4];
        assert_eq!(scale_nearest(&texels, (2, 2), (2, 2), 1, true, false), vec![2, 1, 4, 3]);
        assert_eq!(scale_nearest(&texels, (2, 2), (2, 2), 1, false, true), vec![3, 4, 1, 2]);
    }

    #[test]
    fn test_scale_nearest_upscale() {
        let texels = [1u8, 2];
        assert_eq!(scale_nearest(&texels, (2, 1), (4, 1), 1, false, false), vec![1, 1, 2, 2]);
    }

    #[test]
    fn test_transfer_pitch_defaults_to_region() {
        let info = TextureTransferInfo {
            transfer_buffer: TransferBufferHandle::from_raw(crate::handle::RawHandle::new(0, 0)),
            offset: 0,
            pixels_per_row: 0,
            rows_per_layer: 0,
        };
        let region = TexelBox {
            mip_level: 0,
            layer: 0,
            x: 0,
            y: 0,
            z: 0,
            width: 4,
            height: 2,
            depth: 1,
        };
        assert_eq!(transfer_pitch(&info, &region), Ok((4, 2)));
        let offsets = transfer_row_offsets(&info, &region, 4, 32).unwrap();
        assert_eq!(offsets, vec![0, 16]);
        assert!(transfer_row_offsets(&info, &region, 4, 31).is_err());
    }

    #[test]
    fn test_transfer_rows_reject_huge_region() {
        let info = TextureTransferInfo {
            transfer_buffer: TransferBufferHandle::from_raw(crate::handle::RawHandle::new(0, 0)),
            offset: 0,
            pixels_per_row: 0,
            rows_per_layer: 0,
        };
        let region = TexelBox {
            mip_level: 0,
            layer: 0,
            x: 0,
            y: 0,
            z: 0,
            width: 4,
            height: 70_000,
            depth: 70_000,
        };
        assert!(transfer_row_offsets(&info, &region, 4, 64).is_err());
        assert!(box_bytes(&TexelBox { width: u32::MAX, ..region }, 16).is_err());
    }
}
