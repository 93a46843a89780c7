use super::color::Color;
use super::computed_style::ComputedStyle;
use super::property::{ObjectFit, Overflow, StyleProperty};
use super::style::Style;
use super::value::{StyleFilter, StyleTransform, StyleUnit, StyleValue};
use crate::config::DEFAULT_ROOT_FONT_SIZE;
use crate::geometry::Rect;
use crate::view::RenderFilter;
use glam::{Affine2, Vec2};
use std::f32::consts::PI;

pub const DEFAULT_LINE_HEIGHT_FACTOR: f32 = 1.2;

/// Resolves unit-tagged style values against the environment of the current frame.
///
/// The scene updates the viewport size and root font size once per frame before the
/// compute-style pass; everything else is a pure function of its arguments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleContext {
    viewport_width: f32,
    viewport_height: f32,
    root_font_size: f32,
}

impl Default for StyleContext {
    fn default() -> Self {
        Self::new(0.0, 0.0, DEFAULT_ROOT_FONT_SIZE)
    }
}

impl StyleContext {
    pub const fn new(viewport_width: f32, viewport_height: f32, root_font_size: f32) -> Self {
        Self {
            viewport_width,
            viewport_height,
            root_font_size,
        }
    }

    pub fn viewport_width(&self) -> f32 {
        self.viewport_width
    }

    pub fn viewport_height(&self) -> f32 {
        self.viewport_height
    }

    pub fn root_font_size(&self) -> f32 {
        self.root_font_size
    }

    pub fn set_viewport_size(&mut self, width: f32, height: f32) {
        self.viewport_width = width;
        self.viewport_height = height;
    }

    pub fn set_root_font_size(&mut self, size: f32) {
        self.root_font_size = size;
    }

    pub fn compute_viewport_width_unit(&self, value: f32) -> f32 {
        value * self.viewport_width / 100.0
    }

    pub fn compute_viewport_height_unit(&self, value: f32) -> f32 {
        value * self.viewport_height / 100.0
    }

    pub fn compute_viewport_min_unit(&self, value: f32) -> f32 {
        value * self.viewport_width.min(self.viewport_height) / 100.0
    }

    pub fn compute_viewport_max_unit(&self, value: f32) -> f32 {
        value * self.viewport_width.max(self.viewport_height) / 100.0
    }

    pub fn compute_rem_unit(&self, value: f32) -> f32 {
        self.compute_rem_unit_with(value, self.root_font_size)
    }

    /// Rem against an explicit root size, used when sizing the root font itself.
    pub fn compute_rem_unit_with(&self, value: f32, root_font_size: f32) -> f32 {
        value * root_font_size
    }

    /// Resolves a length. Percent is relative to `percent_basis`; anchors are a fraction
    /// of it. Auto, undefined and angle values have no length.
    pub fn compute_length(&self, value: StyleValue, percent_basis: f32) -> Option<f32> {
        let v = value.value;
        match value.unit {
            StyleUnit::Point => Some(v),
            StyleUnit::Percent => Some(v * percent_basis / 100.0),
            StyleUnit::Anchor => Some(v * percent_basis),
            StyleUnit::ViewportWidth => Some(self.compute_viewport_width_unit(v)),
            StyleUnit::ViewportHeight => Some(self.compute_viewport_height_unit(v)),
            StyleUnit::ViewportMin => Some(self.compute_viewport_min_unit(v)),
            StyleUnit::ViewportMax => Some(self.compute_viewport_max_unit(v)),
            StyleUnit::RootEm => Some(self.compute_rem_unit(v)),
            _ => None,
        }
    }

    /// Normalizes an angle to radians. Non-angle units have no angle.
    pub fn compute_angle(&self, value: StyleValue) -> Option<f32> {
        let v = value.value;
        match value.unit {
            StyleUnit::Radian => Some(v),
            StyleUnit::Degree => Some(v * PI / 180.0),
            StyleUnit::Gradian => Some(v * PI / 200.0),
            StyleUnit::Turn => Some(v * 2.0 * PI),
            _ => None,
        }
    }

    /// Font size of a node. Percentages are relative to the root font size.
    pub fn compute_font_size(&self, style: Option<&Style>) -> f32 {
        let value = style
            .map(|style| style.number(StyleProperty::FontSize))
            .unwrap_or(StyleValue::UNDEFINED);
        self.compute_length(value, self.root_font_size)
            .unwrap_or(self.root_font_size)
            .max(0.0)
    }

    /// Root font size declared by the root style. `rem` here refers to `default_size`.
    pub fn compute_root_font_size(&self, style: Option<&Style>, default_size: f32) -> f32 {
        let Some(value) = style.map(|style| style.number(StyleProperty::FontSize)) else {
            return default_size;
        };
        let size = match value.unit {
            StyleUnit::RootEm => Some(self.compute_rem_unit_with(value.value, default_size)),
            StyleUnit::Percent => Some(value.value * default_size / 100.0),
            _ => self.compute_length(value, default_size),
        };
        size.unwrap_or(default_size).max(0.0)
    }

    pub fn compute_line_height(&self, style: Option<&Style>, font_size: f32) -> f32 {
        let value = style
            .map(|style| style.number(StyleProperty::LineHeight))
            .unwrap_or(StyleValue::UNDEFINED);
        self.compute_length(value, font_size)
            .unwrap_or(font_size * DEFAULT_LINE_HEIGHT_FACTOR)
            .max(0.0)
    }

    pub fn compute_opacity(&self, style: Option<&Style>) -> f32 {
        let value = style
            .map(|style| style.number(StyleProperty::Opacity))
            .unwrap_or(StyleValue::UNDEFINED);
        let opacity = match value.unit {
            StyleUnit::Undefined | StyleUnit::Auto => 1.0,
            StyleUnit::Percent => value.value / 100.0,
            _ => value.value,
        };
        opacity.clamp(0.0, 1.0)
    }

    /// Maps an image of `image_width` x `image_height` into `bounds` following
    /// `ObjectFit` and `ObjectPosition*`. The result may exceed `bounds`.
    pub fn compute_object_fit(
        &self,
        style: Option<&Style>,
        bounds: Rect,
        image_width: f32,
        image_height: f32,
    ) -> Rect {
        self.compute_fit(
            style,
            (
                StyleProperty::ObjectFit,
                StyleProperty::ObjectPositionX,
                StyleProperty::ObjectPositionY,
            ),
            bounds,
            image_width,
            image_height,
        )
    }

    /// Same contract as [`Self::compute_object_fit`] for `BackgroundFit` and
    /// `BackgroundPosition*`.
    pub fn compute_background_fit(
        &self,
        style: Option<&Style>,
        bounds: Rect,
        image_width: f32,
        image_height: f32,
    ) -> Rect {
        self.compute_fit(
            style,
            (
                StyleProperty::BackgroundFit,
                StyleProperty::BackgroundPositionX,
                StyleProperty::BackgroundPositionY,
            ),
            bounds,
            image_width,
            image_height,
        )
    }

    fn compute_fit(
        &self,
        style: Option<&Style>,
        (fit_property, x_property, y_property): (StyleProperty, StyleProperty, StyleProperty),
        bounds: Rect,
        image_width: f32,
        image_height: f32,
    ) -> Rect {
        let fit = style
            .and_then(|style| style.get::<ObjectFit>(fit_property))
            .unwrap_or_default();
        if fit == ObjectFit::Fill || image_width <= 0.0 || image_height <= 0.0 {
            return bounds;
        }

        let contain = (bounds.width / image_width).min(bounds.height / image_height);
        let scale = match fit {
            ObjectFit::Contain => contain,
            ObjectFit::Cover => (bounds.width / image_width).max(bounds.height / image_height),
            ObjectFit::ScaleDown => contain.min(1.0),
            ObjectFit::None | ObjectFit::Fill => 1.0,
        };
        let width = image_width * scale;
        let height = image_height * scale;

        let position = |property: StyleProperty, free: f32| {
            let value = style
                .map(|style| style.number(property))
                .unwrap_or(StyleValue::UNDEFINED);
            match value.unit {
                StyleUnit::Anchor => free * value.value,
                StyleUnit::Percent => free * value.value / 100.0,
                _ => self.compute_length(value, free).unwrap_or(free * 0.5),
            }
        };

        Rect::new(
            bounds.x + position(x_property, bounds.width - width),
            bounds.y + position(y_property, bounds.height - height),
            width,
            height,
        )
    }

    /// Composes the `Transform` list in declaration order around the transform origin
    /// (default: center of `bounds`). `None` when no transform is declared.
    pub fn compute_transform(&self, style: Option<&Style>, bounds: Rect) -> Option<Affine2> {
        let style = style?;
        let entries = style.get::<Vec<StyleTransform>>(StyleProperty::Transform)?;
        if entries.is_empty() {
            return None;
        }

        let origin_value = |property: StyleProperty, basis: f32| {
            self.compute_length(style.number(property), basis)
                .unwrap_or(basis * 0.5)
        };
        let origin = Vec2::new(
            bounds.x + origin_value(StyleProperty::TransformOriginX, bounds.width),
            bounds.y + origin_value(StyleProperty::TransformOriginY, bounds.height),
        );

        let mut matrix = Affine2::from_translation(origin);
        for entry in entries {
            let step = match entry {
                StyleTransform::Identity => Affine2::IDENTITY,
                StyleTransform::Translate(x, y) => Affine2::from_translation(Vec2::new(
                    self.compute_length(x, bounds.width).unwrap_or(0.0),
                    self.compute_length(y, bounds.height).unwrap_or(0.0),
                )),
                StyleTransform::Rotate(angle) => {
                    Affine2::from_angle(self.compute_angle(angle).unwrap_or(0.0))
                }
                StyleTransform::Scale(x, y) => Affine2::from_scale(Vec2::new(x, y)),
            };
            matrix = matrix * step;
        }
        Some(matrix * Affine2::from_translation(-origin))
    }

    /// Tint (alpha scaled by `opacity`) and flip flags as one renderer filter.
    pub fn compute_filter(&self, style: Option<&Style>, opacity: f32) -> RenderFilter {
        let tint = style
            .and_then(|style| style.get::<Color>(StyleProperty::TintColor))
            .unwrap_or(Color::WHITE);
        let mut filter = RenderFilter::tint(tint.with_alpha_scaled(opacity));
        let flips = style
            .and_then(|style| style.get::<Vec<StyleFilter>>(StyleProperty::Filter))
            .unwrap_or_default();
        for flip in flips {
            match flip {
                StyleFilter::FlipHorizontal => filter.flip_h = true,
                StyleFilter::FlipVertical => filter.flip_v = true,
            }
        }
        filter
    }

    pub fn compute_border_radius(&self, style: Option<&Style>, bounds: Rect) -> f32 {
        let value = style
            .map(|style| style.number(StyleProperty::BorderRadius))
            .unwrap_or(StyleValue::UNDEFINED);
        self.compute_length(value, bounds.width.min(bounds.height))
            .unwrap_or(0.0)
            .max(0.0)
    }

    /// Non-layout outputs of the compute-style pass.
    pub fn compute_style(&self, style: Option<&Style>, bounds: Rect) -> ComputedStyle {
        let opacity = self.compute_opacity(style);
        let font_size = self.compute_font_size(style);
        let color_of = |property: StyleProperty| style.and_then(|style| style.get::<Color>(property));

        ComputedStyle {
            opacity,
            transform: self.compute_transform(style, bounds),
            filter: self.compute_filter(style, opacity),
            z_index: style
                .and_then(|style| style.get::<i32>(StyleProperty::ZIndex))
                .unwrap_or(0),
            font_size,
            line_height: self.compute_line_height(style, font_size),
            color: color_of(StyleProperty::Color).unwrap_or(Color::BLACK),
            background_color: color_of(StyleProperty::BackgroundColor).unwrap_or(Color::TRANSPARENT),
            border_color: color_of(StyleProperty::BorderColor).unwrap_or(Color::TRANSPARENT),
            border_radius: self.compute_border_radius(style, bounds),
            overflow_hidden: style
                .and_then(|style| style.get::<Overflow>(StyleProperty::Overflow))
                .is_some_and(|overflow| overflow == Overflow::Hidden),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::StyleContext;
    use crate::geometry::Rect;
    use crate::style::{
        Color, ObjectFit, Style, StyleFilter, StyleProperty, StyleTransform, StyleValue,
    };
    use glam::Vec2;
    use std::f32::consts::PI;

    fn context() -> StyleContext {
        StyleContext::new(1280.0, 720.0, 16.0)
    }

    fn fit(fit: ObjectFit, bounds: Rect, width: f32, height: f32) -> Rect {
        let style = Style::new();
        style.set(StyleProperty::ObjectFit, fit).unwrap();
        context().compute_object_fit(Some(&style), bounds, width, height)
    }

    #[test]
    fn viewport_and_rem_units() {
        let ctx = context();
        assert_eq!(ctx.compute_viewport_width_unit(50.0), 640.0);
        assert_eq!(ctx.compute_viewport_height_unit(50.0), 360.0);
        assert_eq!(ctx.compute_viewport_min_unit(10.0), 72.0);
        assert_eq!(ctx.compute_viewport_max_unit(10.0), 128.0);
        assert_eq!(ctx.compute_rem_unit(2.0), 32.0);
        assert_eq!(ctx.compute_rem_unit_with(2.0, 10.0), 20.0);
    }

    #[test]
    fn point_percent_and_auto_resolve_deterministically() {
        let ctx = context();
        assert_eq!(ctx.compute_length(StyleValue::point(12.0), 200.0), Some(12.0));
        assert_eq!(ctx.compute_length(StyleValue::percent(25.0), 200.0), Some(50.0));
        assert_eq!(ctx.compute_length(StyleValue::AUTO, 200.0), None);
        assert_eq!(ctx.compute_length(StyleValue::UNDEFINED, 200.0), None);
        assert_eq!(ctx.compute_length(StyleValue::degree(90.0), 200.0), None);
    }

    #[test]
    fn angles_normalize_to_radians() {
        let ctx = context();
        let close = |a: Option<f32>, b: f32| (a.unwrap() - b).abs() < 1e-5;
        assert!(close(ctx.compute_angle(StyleValue::degree(180.0)), PI));
        assert!(close(ctx.compute_angle(StyleValue::gradian(100.0)), PI / 2.0));
        assert!(close(ctx.compute_angle(StyleValue::turn(0.5)), PI));
        assert!(close(ctx.compute_angle(StyleValue::radian(1.0)), 1.0));
        assert_eq!(ctx.compute_angle(StyleValue::point(1.0)), None);
    }

    #[test]
    fn object_fit_scenarios() {
        assert_eq!(
            fit(ObjectFit::Contain, Rect::new(0.0, 0.0, 40.0, 40.0), 200.0, 200.0),
            Rect::new(0.0, 0.0, 40.0, 40.0)
        );
        assert_eq!(
            fit(ObjectFit::None, Rect::new(0.0, 0.0, 100.0, 100.0), 200.0, 200.0),
            Rect::new(-50.0, -50.0, 200.0, 200.0)
        );
        assert_eq!(
            fit(ObjectFit::Cover, Rect::new(0.0, 0.0, 100.0, 100.0), 100.0, 200.0),
            Rect::new(0.0, -50.0, 100.0, 200.0)
        );
        assert_eq!(
            fit(ObjectFit::Fill, Rect::new(0.0, 0.0, 100.0, 100.0), 10.0, 10.0),
            Rect::new(0.0, 0.0, 100.0, 100.0)
        );
    }

    #[test]
    fn scale_down_never_enlarges() {
        assert_eq!(
            fit(ObjectFit::ScaleDown, Rect::new(0.0, 0.0, 100.0, 100.0), 10.0, 20.0),
            Rect::new(45.0, 40.0, 10.0, 20.0)
        );
    }

    #[test]
    fn anchor_positions_contained_image() {
        let style = Style::new();
        style.set(StyleProperty::ObjectFit, ObjectFit::Contain).unwrap();
        style.set(StyleProperty::ObjectPositionX, StyleValue::anchor(0.0)).unwrap();
        let rect = context().compute_object_fit(
            Some(&style),
            Rect::new(0.0, 0.0, 200.0, 100.0),
            50.0,
            50.0,
        );
        assert_eq!(rect, Rect::new(0.0, 0.0, 100.0, 100.0));
    }

    #[test]
    fn background_fit_reads_background_properties() {
        let style = Style::new();
        style.set(StyleProperty::BackgroundFit, ObjectFit::None).unwrap();
        style.set(StyleProperty::BackgroundPositionX, StyleValue::point(0.0)).unwrap();
        style.set(StyleProperty::BackgroundPositionY, StyleValue::point(0.0)).unwrap();
        let rect = context().compute_background_fit(
            Some(&style),
            Rect::new(10.0, 10.0, 100.0, 100.0),
            20.0,
            30.0,
        );
        assert_eq!(rect, Rect::new(10.0, 10.0, 20.0, 30.0));
    }

    #[test]
    fn rotation_is_anchored_at_center() {
        let style = Style::new();
        style
            .set(
                StyleProperty::Transform,
                vec![StyleTransform::rotate(StyleValue::degree(90.0))],
            )
            .unwrap();
        let matrix = context()
            .compute_transform(Some(&style), Rect::from_size(100.0, 100.0))
            .unwrap();
        let corner = matrix.transform_point2(Vec2::ZERO);
        assert!((corner.x - 100.0).abs() < 1e-3);
        assert!(corner.y.abs() < 1e-3);
    }

    #[test]
    fn transforms_compose_in_declaration_order() {
        let style = Style::new();
        style
            .set(
                StyleProperty::Transform,
                vec![
                    StyleTransform::translate(StyleValue::percent(50.0), StyleValue::point(0.0)),
                    StyleTransform::scale(2.0, 2.0),
                ],
            )
            .unwrap();
        style.set(StyleProperty::TransformOriginX, StyleValue::point(0.0)).unwrap();
        style.set(StyleProperty::TransformOriginY, StyleValue::point(0.0)).unwrap();
        let matrix = context()
            .compute_transform(Some(&style), Rect::from_size(40.0, 40.0))
            .unwrap();
        assert_eq!(matrix.transform_point2(Vec2::new(1.0, 1.0)), Vec2::new(22.0, 2.0));
    }

    #[test]
    fn no_transform_declared() {
        let style = Style::new();
        assert!(context().compute_transform(Some(&style), Rect::default()).is_none());
        assert!(context().compute_transform(None, Rect::default()).is_none());
    }

    #[test]
    fn filter_merges_tint_opacity_and_flips() {
        let style = Style::new();
        style.set(StyleProperty::TintColor, Color::rgba(255, 0, 0, 200)).unwrap();
        style
            .set(StyleProperty::Filter, vec![StyleFilter::FlipVertical])
            .unwrap();
        let filter = context().compute_filter(Some(&style), 0.5);
        assert_eq!(filter.color, Color::rgba(255, 0, 0, 100));
        assert!(!filter.flip_h);
        assert!(filter.flip_v);
    }

    #[test]
    fn root_font_size_rem_uses_default() {
        let ctx = StyleContext::new(100.0, 100.0, 40.0);
        let style = Style::new();
        style.set(StyleProperty::FontSize, StyleValue::rem(2.0)).unwrap();
        assert_eq!(ctx.compute_root_font_size(Some(&style), 16.0), 32.0);
        assert_eq!(ctx.compute_root_font_size(None, 16.0), 16.0);
    }

    #[test]
    fn font_size_and_line_height() {
        let ctx = context();
        let style = Style::new();
        style.set(StyleProperty::FontSize, StyleValue::percent(150.0)).unwrap();
        assert_eq!(ctx.compute_font_size(Some(&style)), 24.0);
        assert!((ctx.compute_line_height(Some(&style), 24.0) - 28.8).abs() < 1e-4);

        style.set(StyleProperty::LineHeight, StyleValue::point(30.0)).unwrap();
        assert_eq!(ctx.compute_line_height(Some(&style), 24.0), 30.0);
        assert_eq!(ctx.compute_font_size(None), 16.0);
    }

    #[test]
    fn opacity_clamps() {
        let ctx = context();
        let style = Style::new();
        assert_eq!(ctx.compute_opacity(Some(&style)), 1.0);
        style.set(StyleProperty::Opacity, StyleValue::point(3.0)).unwrap();
        assert_eq!(ctx.compute_opacity(Some(&style)), 1.0);
        style.set(StyleProperty::Opacity, StyleValue::percent(25.0)).unwrap();
        assert_eq!(ctx.compute_opacity(Some(&style)), 0.25);
    }
}
