//! Filter, mipmap, address mode and comparison definitions.

/// Texture filtering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Nearest neighbor filtering.
    #[default]
    Nearest,
    /// Linear filtering.
    Linear,
}

/// Filtering between mip levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MipmapMode {
    /// Use the nearest mip level.
    #[default]
    Nearest,
    /// Blend the two closest mip levels.
    Linear,
}

/// Texture address mode (wrapping behavior).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    /// Clamp to edge.
    #[default]
    ClampToEdge,
    /// Repeat.
    Repeat,
    /// Mirrored repeat.
    MirroredRepeat,
}

/// Comparison function for depth/stencil tests and shadow sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    /// Never pass.
    Never,
    /// Pass if less than.
    Less,
    /// Pass if equal.
    Equal,
    /// Pass if less than or equal.
    LessEqual,
    /// Pass if greater than.
    Greater,
    /// Pass if not equal.
    NotEqual,
    /// Pass if greater than or equal.
    GreaterEqual,
    /// Always pass.
    #[default]
    Always,
}

impl CompareFunction {
    /// Evaluate the comparison for a reference value against a stored value.
    pub fn compare<T: PartialOrd>(&self, reference: T, stored: T) -> bool {
        match self {
            Self::Never => false,
            Self::Less => reference < stored,
            Self::Equal => reference == stored,
            Self::LessEqual => reference <= stored,
            Self::Greater => reference > stored,
            Self::NotEqual => reference != stored,
            Self::GreaterEqual => reference >= stored,
            Self::Always => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(FilterMode::default(), FilterMode::Nearest);
        assert_eq!(AddressMode::default(), AddressMode::ClampToEdge);
        assert_eq!(CompareFunction::default(), CompareFunction::Always);
    }

    #[test]
    fn test_compare() {
        assert!(CompareFunction::Less.compare(0.25, 0.5));
        assert!(!CompareFunction::Less.compare(0.5, 0.5));
        assert!(CompareFunction::LessEqual.compare(0.5, 0.5));
        assert!(!CompareFunction::Never.compare(1, 1));
        assert!(CompareFunction::NotEqual.compare(1, 2));
    }
}
