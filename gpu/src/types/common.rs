//! Common types shared across passes and pipelines.

// ============================================================================
// Viewport
// ============================================================================

/// Viewport configuration for rendering.
///
/// Defines the rectangular region of the render target that will be rendered
/// to, along with the depth range mapping. Depth range is `[0, 1]` and the
/// origin is the top-left corner.
///
/// # Example
///
/// ```
/// use lumen_gpu::Viewport;
///
/// let viewport = Viewport::new(0.0, 0.0, 1920.0, 1080.0).with_depth_range(0.0, 0.5);
/// assert_eq!(viewport.max_depth, 0.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// X coordinate of the viewport's top-left corner.
    pub x: f32,
    /// Y coordinate of the viewport's top-left corner.
    pub y: f32,
    /// Width of the viewport.
    pub width: f32,
    /// Height of the viewport.
    pub height: f32,
    /// Minimum depth value (default: 0.0).
    pub min_depth: f32,
    /// Maximum depth value (default: 1.0).
    pub max_depth: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }
}

impl Viewport {
    /// Create a new viewport with standard `[0, 1]` depth range.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    /// Create a viewport from dimensions with origin at (0, 0).
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }

    /// Set the depth range.
    ///
    /// `min > max` (reverse-Z) is allowed.
    pub fn with_depth_range(mut self, min_depth: f32, max_depth: f32) -> Self {
        self.min_depth = min_depth;
        self.max_depth = max_depth;
        self
    }
}

// ============================================================================
// Scissor Rectangle
// ============================================================================

/// Integer rectangle, used for scissor state.
///
/// Pixels outside the scissor rectangle are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    /// X coordinate of the top-left corner.
    pub x: i32,
    /// Y coordinate of the top-left corner.
    pub y: i32,
    /// Width of the rectangle.
    pub width: u32,
    /// Height of the rectangle.
    pub height: u32,
}

impl Rect {
    /// Create a new rectangle.
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle from dimensions with origin at (0, 0).
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }
}

// ============================================================================
// Color
// ============================================================================

/// Linear RGBA color used for clears and blend constants.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    /// Create a color from its components.
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Components as an array.
    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

// ============================================================================
// Load / Store operations
// ============================================================================

/// What happens to a target's contents when a pass begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadOp {
    /// Keep the previous contents.
    #[default]
    Load,
    /// Clear to the target's clear value.
    Clear,
    /// Contents are undefined.
    DontCare,
}

/// What happens to a target's contents when a pass ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreOp {
    /// Write results to the target.
    #[default]
    Store,
    /// Results may be discarded.
    DontCare,
    /// Resolve the multisampled target into the resolve texture and discard
    /// the multisampled contents.
    Resolve,
    /// Resolve and also keep the multisampled contents.
    ResolveAndStore,
}

impl StoreOp {
    /// Whether this store operation writes a resolve target.
    pub fn resolves(&self) -> bool {
        matches!(self, Self::Resolve | Self::ResolveAndStore)
    }
}

/// Mirroring applied by a blit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FlipMode {
    #[default]
    None,
    Horizontal,
    Vertical,
    HorizontalAndVertical,
}

impl FlipMode {
    pub fn flips_horizontally(&self) -> bool {
        matches!(self, Self::Horizontal | Self::HorizontalAndVertical)
    }

    pub fn flips_vertically(&self) -> bool {
        matches!(self, Self::Vertical | Self::HorizontalAndVertical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_defaults() {
        let viewport = Viewport::from_dimensions(800, 600);
        assert_eq!(viewport.width, 800.0);
        assert_eq!(viewport.min_depth, 0.0);
        assert_eq!(viewport.max_depth, 1.0);
    }

    #[test]
    fn test_store_op_resolves() {
        assert!(StoreOp::Resolve.resolves());
        assert!(StoreOp::ResolveAndStore.resolves());
        assert!(!StoreOp::Store.resolves());
    }
}
