use super::color::Color;
use crate::view::RenderFilter;
use glam::Affine2;

/// Derived, non-layout outputs of the compute-style pass for one node.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    pub opacity: f32,
    /// Local transform in the node's own coordinate space.
    pub transform: Option<Affine2>,
    pub filter: RenderFilter,
    pub z_index: i32,
    pub font_size: f32,
    pub line_height: f32,
    pub color: Color,
    pub background_color: Color,
    pub border_color: Color,
    pub border_radius: f32,
    pub overflow_hidden: bool,
}

impl ComputedStyle {
    /// Whether going from `other` to `self` changes what gets rasterized. Opacity,
    /// transform, tint, z-index and clipping are applied at composite time.
    pub fn paint_differs(&self, other: &ComputedStyle) -> bool {
        self.font_size != other.font_size
            || self.line_height != other.line_height
            || self.color != other.color
            || self.background_color != other.background_color
            || self.border_color != other.border_color
            || self.border_radius != other.border_radius
    }
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            transform: None,
            filter: RenderFilter::default(),
            z_index: 0,
            font_size: crate::config::DEFAULT_ROOT_FONT_SIZE,
            line_height: crate::config::DEFAULT_ROOT_FONT_SIZE
                * super::style_context::DEFAULT_LINE_HEIGHT_FACTOR,
            color: Color::BLACK,
            background_color: Color::TRANSPARENT,
            border_color: Color::TRANSPARENT,
            border_radius: 0.0,
            overflow_hidden: false,
        }
    }
}
