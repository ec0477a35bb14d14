//! Render, compute and copy passes.
//!
//! A pass mutably borrows its [`CommandBuffer`](crate::CommandBuffer) for as
//! long as it is open, so passes cannot nest and the command buffer cannot be
//! submitted mid-pass. Ending a pass (or dropping it) records the end marker.

mod bindings;
mod compute;
mod copy;
mod render;

pub use bindings::BindingSlots;
pub use compute::ComputePass;
pub use copy::CopyPass;
pub use render::RenderPass;

pub(crate) use render::validate_render_targets;
