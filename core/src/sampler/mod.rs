//! CPU-side sampler enums.
//!
//! [`FilterMode`], [`MipmapMode`], [`AddressMode`] and [`CompareFunction`] are
//! shared between sampler descriptors and pipeline depth/stencil state.

mod types;

pub use types::{AddressMode, CompareFunction, FilterMode, MipmapMode};
