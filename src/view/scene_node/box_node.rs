use crate::error::RenderError;
use crate::geometry::{Edges, Rect};
use crate::resource::ImageId;
use crate::style::{Color, ComputedStyle};
use crate::view::layout::LayoutBox;
use crate::view::paintable::{ensure_lockable_texture, layer_size, release_texture};
use crate::view::renderer::{RenderFilter, Renderer, Texture};
use glam::Affine2;
use smol_str::SmolStr;

/// Image requested through the `BackgroundImage` property.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundImage {
    pub uri: SmolStr,
    /// `None` when the URI was rejected.
    pub image: Option<ImageId>,
}

/// State specific to box nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoxNode {
    pub(crate) background: Option<BackgroundImage>,
}

impl BoxNode {
    pub fn background(&self) -> Option<&BackgroundImage> {
        self.background.as_ref()
    }
}

fn border_visible(computed: &ComputedStyle, border: &Edges) -> bool {
    !border.is_zero() && !computed.border_color.is_transparent()
}

/// Rounded decorations are rasterized into a layer; square ones are drawn directly
/// by the renderer at composite time.
pub(crate) fn needs_layer(computed: &ComputedStyle, layout: &LayoutBox) -> bool {
    computed.border_radius > 0.0
        && (!computed.background_color.is_transparent() || border_visible(computed, &layout.border))
}

/// Paints the rounded background and border into `slot`, or releases it when the
/// node no longer needs a layer. Returns whether a layer exists afterwards.
pub(crate) fn paint_decoration(
    renderer: &mut dyn Renderer,
    slot: &mut Option<Texture>,
    computed: &ComputedStyle,
    layout: &LayoutBox,
) -> Result<bool, RenderError> {
    let (width, height) = layer_size(layout.rect.width, layout.rect.height);
    if !needs_layer(computed, layout) || width == 0 || height == 0 {
        release_texture(renderer, slot);
        return Ok(false);
    }

    let texture = ensure_lockable_texture(renderer, slot, width, height)?;
    let bounds = layout.size();
    let stroke = [
        layout.border.top,
        layout.border.right,
        layout.border.bottom,
        layout.border.left,
    ]
    .into_iter()
    .fold(0.0f32, f32::max);
    let radius = computed.border_radius;
    let background = computed.background_color;
    let border_color = computed.border_color;
    let draw_border = border_visible(computed, &layout.border);

    renderer.with_locked_texture(texture, &mut |canvas| {
        canvas.clear(Color::TRANSPARENT);
        if !background.is_transparent() {
            canvas.fill_rounded_rect(bounds, radius, background);
        }
        if draw_border {
            let half = stroke * 0.5;
            let rect = bounds.inset(&Edges::uniform(half));
            canvas.stroke_rounded_rect(rect, (radius - half).max(0.0), stroke, border_color);
        }
    })?;
    Ok(true)
}

/// Draws the node's decoration with the accumulated `transform` and `opacity`.
pub(crate) fn composite_decoration(
    renderer: &mut dyn Renderer,
    transform: &Affine2,
    layer: Option<&Texture>,
    computed: &ComputedStyle,
    layout: &LayoutBox,
    opacity: f32,
) {
    let opacity = computed.opacity * opacity;
    let bounds = layout.size();
    if let Some(layer) = layer {
        let filter = RenderFilter::default().with_opacity(opacity);
        renderer.draw_image(transform, bounds, layer.bounds(), layer, &filter);
        return;
    }
    if !computed.background_color.is_transparent() {
        renderer.fill_rect(
            transform,
            bounds,
            computed.background_color.with_alpha_scaled(opacity),
        );
    }
    if border_visible(computed, &layout.border) {
        renderer.stroke_rect(
            transform,
            bounds,
            layout.border,
            computed.border_color.with_alpha_scaled(opacity),
        );
    }
}

/// Destination of a background image clipped to `clip`; `None` when nothing shows.
pub(crate) fn visible_part(dest: Rect, clip: Rect) -> Option<Rect> {
    let visible = dest.intersect(&clip);
    (!visible.is_empty()).then_some(visible)
}
