//! Fixed binding and payload limits.

/// Maximum color targets of one render pass.
pub const MAX_COLOR_TARGETS: usize = 4;
/// Vertex buffer slots of a render pass.
pub const MAX_VERTEX_BUFFERS: usize = 16;
/// Sampler slots per shader stage.
pub const MAX_SAMPLERS: usize = 16;
/// Read-only storage texture slots per shader stage.
pub const MAX_STORAGE_TEXTURES: usize = 8;
/// Read-only storage buffer slots per shader stage.
pub const MAX_STORAGE_BUFFERS: usize = 8;
/// Read-write storage textures, and separately buffers, of one compute pass.
pub const MAX_COMPUTE_WRITE_BINDINGS: usize = 8;
/// Uniform slots per shader stage.
pub const MAX_UNIFORM_SLOTS: u32 = 4;
/// Largest uniform payload accepted by one push.
pub const MAX_UNIFORM_DATA_SIZE: usize = 32 * 1024;
/// Allowed range of swapchain frames in flight.
pub const FRAMES_IN_FLIGHT_RANGE: std::ops::RangeInclusive<u32> = 1..=3;
