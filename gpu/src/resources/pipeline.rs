//! Graphics and compute pipeline resources.

use super::DeviceLink;
use crate::handle::{ComputePipelineHandle, GraphicsPipelineHandle};
use crate::types::{ComputePipelineDescriptor, GraphicsPipelineDescriptor};

/// A graphics pipeline: shaders plus fixed-function state and target formats.
pub struct GraphicsPipeline {
    link: DeviceLink,
    handle: GraphicsPipelineHandle,
    descriptor: GraphicsPipelineDescriptor,
}

impl GraphicsPipeline {
    pub(crate) fn new(
        link: DeviceLink,
        handle: GraphicsPipelineHandle,
        descriptor: GraphicsPipelineDescriptor,
    ) -> Self {
        Self {
            link,
            handle,
            descriptor,
        }
    }

    pub fn handle(&self) -> GraphicsPipelineHandle {
        self.handle
    }

    pub fn descriptor(&self) -> &GraphicsPipelineDescriptor {
        &self.descriptor
    }

    pub fn is_released(&self) -> bool {
        self.link.is_released()
    }

    pub fn release(&mut self) {
        let handle = self.handle;
        if self.link.release(|backend| backend.release_graphics_pipeline(handle)) {
            log::trace!("GraphicsPipeline: released {:?} {handle:?}", self.descriptor.label);
        }
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for GraphicsPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsPipeline")
            .field("handle", &self.handle)
            .field("primitive_type", &self.descriptor.primitive_type)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

/// A compute pipeline.
///
/// The compute shader is embedded in the pipeline descriptor; there is no
/// separate compute shader object.
pub struct ComputePipeline {
    link: DeviceLink,
    handle: ComputePipelineHandle,
    descriptor: ComputePipelineDescriptor,
}

impl ComputePipeline {
    pub(crate) fn new(
        link: DeviceLink,
        handle: ComputePipelineHandle,
        descriptor: ComputePipelineDescriptor,
    ) -> Self {
        Self {
            link,
            handle,
            descriptor,
        }
    }

    pub fn handle(&self) -> ComputePipelineHandle {
        self.handle
    }

    pub fn descriptor(&self) -> &ComputePipelineDescriptor {
        &self.descriptor
    }

    /// Workgroup size declared by the shader.
    pub fn threadcount(&self) -> (u32, u32, u32) {
        (
            self.descriptor.threadcount_x,
            self.descriptor.threadcount_y,
            self.descriptor.threadcount_z,
        )
    }

    pub fn is_released(&self) -> bool {
        self.link.is_released()
    }

    pub fn release(&mut self) {
        let handle = self.handle;
        if self.link.release(|backend| backend.release_compute_pipeline(handle)) {
            log::trace!("ComputePipeline: released {:?} {handle:?}", self.descriptor.label);
        }
    }
}

impl Drop for ComputePipeline {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ComputePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputePipeline")
            .field("handle", &self.handle)
            .field("threadcount", &self.threadcount())
            .field("label", &self.descriptor.label)
            .finish()
    }
}

static_assertions::assert_impl_all!(GraphicsPipeline: Send, Sync);
static_assertions::assert_impl_all!(ComputePipeline: Send, Sync);
