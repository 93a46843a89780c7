#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StyleUnit {
    #[default]
    Undefined,
    Point,
    Percent,
    ViewportWidth,
    ViewportHeight,
    ViewportMin,
    ViewportMax,
    Auto,
    /// Fraction of the free space along an axis (0 = start, 0.5 = center, 1 = end).
    Anchor,
    RootEm,
    Radian,
    Degree,
    Gradian,
    Turn,
}

impl StyleUnit {
    pub const fn is_angle(self) -> bool {
        matches!(
            self,
            StyleUnit::Radian | StyleUnit::Degree | StyleUnit::Gradian | StyleUnit::Turn
        )
    }

    pub const fn is_viewport(self) -> bool {
        matches!(
            self,
            StyleUnit::ViewportWidth
                | StyleUnit::ViewportHeight
                | StyleUnit::ViewportMin
                | StyleUnit::ViewportMax
        )
    }
}

/// A number tagged with its measurement unit. `Undefined` is the "absent" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StyleValue {
    pub unit: StyleUnit,
    pub value: f32,
}

impl StyleValue {
    pub const UNDEFINED: StyleValue = StyleValue::new(StyleUnit::Undefined, 0.0);
    pub const AUTO: StyleValue = StyleValue::new(StyleUnit::Auto, 0.0);

    pub const fn new(unit: StyleUnit, value: f32) -> Self {
        Self { unit, value }
    }

    pub const fn point(value: f32) -> Self {
        Self::new(StyleUnit::Point, value)
    }

    pub const fn percent(value: f32) -> Self {
        Self::new(StyleUnit::Percent, value)
    }

    pub const fn vw(value: f32) -> Self {
        Self::new(StyleUnit::ViewportWidth, value)
    }

    pub const fn vh(value: f32) -> Self {
        Self::new(StyleUnit::ViewportHeight, value)
    }

    pub const fn vmin(value: f32) -> Self {
        Self::new(StyleUnit::ViewportMin, value)
    }

    pub const fn vmax(value: f32) -> Self {
        Self::new(StyleUnit::ViewportMax, value)
    }

    pub const fn rem(value: f32) -> Self {
        Self::new(StyleUnit::RootEm, value)
    }

    pub const fn anchor(value: f32) -> Self {
        Self::new(StyleUnit::Anchor, value)
    }

    pub const fn radian(value: f32) -> Self {
        Self::new(StyleUnit::Radian, value)
    }

    pub const fn degree(value: f32) -> Self {
        Self::new(StyleUnit::Degree, value)
    }

    pub const fn gradian(value: f32) -> Self {
        Self::new(StyleUnit::Gradian, value)
    }

    pub const fn turn(value: f32) -> Self {
        Self::new(StyleUnit::Turn, value)
    }

    pub const fn is_undefined(&self) -> bool {
        matches!(self.unit, StyleUnit::Undefined)
    }

    pub const fn is_auto(&self) -> bool {
        matches!(self.unit, StyleUnit::Auto)
    }
}

/// One entry of a `Transform` declaration. Entries compose in declaration order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StyleTransform {
    Identity,
    /// Translation; percentages are relative to the node's own box.
    Translate(StyleValue, StyleValue),
    Rotate(StyleValue),
    /// Unitless scale factors; an undefined axis scales by 1.
    Scale(f32, f32),
}

impl StyleTransform {
    pub const fn translate(x: StyleValue, y: StyleValue) -> Self {
        StyleTransform::Translate(x, y)
    }

    pub const fn rotate(angle: StyleValue) -> Self {
        StyleTransform::Rotate(angle)
    }

    pub const fn scale(x: f32, y: f32) -> Self {
        StyleTransform::Scale(x, y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleFilter {
    FlipHorizontal,
    FlipVertical,
}
