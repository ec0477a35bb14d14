//! Shader module resource.

use super::DeviceLink;
use crate::handle::ShaderHandle;
use crate::types::{ShaderFormat, ShaderStage};

/// A compiled shader for one graphics stage.
///
/// Created by [`GpuDevice::create_shader`](crate::GpuDevice::create_shader) and
/// consumed by graphics pipeline creation. Releasing a shader does not affect
/// pipelines already built from it.
pub struct Shader {
    link: DeviceLink,
    handle: ShaderHandle,
    stage: ShaderStage,
    format: ShaderFormat,
    entry_point: String,
    label: Option<String>,
}

impl Shader {
    pub(crate) fn new(
        link: DeviceLink,
        handle: ShaderHandle,
        stage: ShaderStage,
        format: ShaderFormat,
        entry_point: String,
        label: Option<String>,
    ) -> Self {
        Self {
            link,
            handle,
            stage,
            format,
            entry_point,
            label,
        }
    }

    pub fn handle(&self) -> ShaderHandle {
        self.handle
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn format(&self) -> ShaderFormat {
        self.format
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn is_released(&self) -> bool {
        self.link.is_released()
    }

    pub fn release(&mut self) {
        let handle = self.handle;
        if self.link.release(|backend| backend.release_shader(handle)) {
            log::trace!("Shader: released {:?} {handle:?}", self.label);
        }
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Shader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shader")
            .field("handle", &self.handle)
            .field("stage", &self.stage)
            .field("entry_point", &self.entry_point)
            .field("label", &self.label)
            .finish()
    }
}

static_assertions::assert_impl_all!(Shader: Send, Sync);
