//! # Lumen Core
//!
//! Shared utilities for the Lumen GPU crates: sampler enums, property bags and
//! optional Tracy profiling.

pub mod profiling;
pub mod properties;
pub mod sampler;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
