use super::color::Color;
use super::value::{StyleFilter, StyleTransform, StyleValue};
use smol_str::SmolStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleProperty {
    Display,
    Position,
    Top,
    Right,
    Bottom,
    Left,
    Width,
    Height,
    MinWidth,
    MinHeight,
    MaxWidth,
    MaxHeight,
    MarginTop,
    MarginRight,
    MarginBottom,
    MarginLeft,
    PaddingTop,
    PaddingRight,
    PaddingBottom,
    PaddingLeft,
    BorderTopWidth,
    BorderRightWidth,
    BorderBottomWidth,
    BorderLeftWidth,
    FlexDirection,
    FlexWrap,
    FlexGrow,
    FlexShrink,
    FlexBasis,
    AlignItems,
    JustifyContent,
    Gap,
    BackgroundColor,
    BackgroundImage,
    BackgroundFit,
    BackgroundPositionX,
    BackgroundPositionY,
    BorderColor,
    BorderRadius,
    Color,
    Opacity,
    ObjectFit,
    ObjectPositionX,
    ObjectPositionY,
    Overflow,
    ZIndex,
    Transform,
    TransformOriginX,
    TransformOriginY,
    TintColor,
    Filter,
    FontFamily,
    FontSize,
    FontStyle,
    FontWeight,
    LineHeight,
    MaxLines,
    TextOverflow,
}

/// Shape of the value a property accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Display,
    Position,
    FlexDirection,
    FlexWrap,
    AlignItems,
    JustifyContent,
    ObjectFit,
    Overflow,
    FontStyle,
    TextOverflow,
    Integer,
    Number,
    Color,
    String,
    Transform,
    Filter,
}

impl StyleProperty {
    pub const fn name(self) -> &'static str {
        match self {
            StyleProperty::Display => "display",
            StyleProperty::Position => "position",
            StyleProperty::Top => "top",
            StyleProperty::Right => "right",
            StyleProperty::Bottom => "bottom",
            StyleProperty::Left => "left",
            StyleProperty::Width => "width",
            StyleProperty::Height => "height",
            StyleProperty::MinWidth => "min-width",
            StyleProperty::MinHeight => "min-height",
            StyleProperty::MaxWidth => "max-width",
            StyleProperty::MaxHeight => "max-height",
            StyleProperty::MarginTop => "margin-top",
            StyleProperty::MarginRight => "margin-right",
            StyleProperty::MarginBottom => "margin-bottom",
            StyleProperty::MarginLeft => "margin-left",
            StyleProperty::PaddingTop => "padding-top",
            StyleProperty::PaddingRight => "padding-right",
            StyleProperty::PaddingBottom => "padding-bottom",
            StyleProperty::PaddingLeft => "padding-left",
            StyleProperty::BorderTopWidth => "border-top-width",
            StyleProperty::BorderRightWidth => "border-right-width",
            StyleProperty::BorderBottomWidth => "border-bottom-width",
            StyleProperty::BorderLeftWidth => "border-left-width",
            StyleProperty::FlexDirection => "flex-direction",
            StyleProperty::FlexWrap => "flex-wrap",
            StyleProperty::FlexGrow => "flex-grow",
            StyleProperty::FlexShrink => "flex-shrink",
            StyleProperty::FlexBasis => "flex-basis",
            StyleProperty::AlignItems => "align-items",
            StyleProperty::JustifyContent => "justify-content",
            StyleProperty::Gap => "gap",
            StyleProperty::BackgroundColor => "background-color",
            StyleProperty::BackgroundImage => "background-image",
            StyleProperty::BackgroundFit => "background-fit",
            StyleProperty::BackgroundPositionX => "background-position-x",
            StyleProperty::BackgroundPositionY => "background-position-y",
            StyleProperty::BorderColor => "border-color",
            StyleProperty::BorderRadius => "border-radius",
            StyleProperty::Color => "color",
            StyleProperty::Opacity => "opacity",
            StyleProperty::ObjectFit => "object-fit",
            StyleProperty::ObjectPositionX => "object-position-x",
            StyleProperty::ObjectPositionY => "object-position-y",
            StyleProperty::Overflow => "overflow",
            StyleProperty::ZIndex => "z-index",
            StyleProperty::Transform => "transform",
            StyleProperty::TransformOriginX => "transform-origin-x",
            StyleProperty::TransformOriginY => "transform-origin-y",
            StyleProperty::TintColor => "tint-color",
            StyleProperty::Filter => "filter",
            StyleProperty::FontFamily => "font-family",
            StyleProperty::FontSize => "font-size",
            StyleProperty::FontStyle => "font-style",
            StyleProperty::FontWeight => "font-weight",
            StyleProperty::LineHeight => "line-height",
            StyleProperty::MaxLines => "max-lines",
            StyleProperty::TextOverflow => "text-overflow",
        }
    }

    pub const fn kind(self) -> ValueKind {
        match self {
            StyleProperty::Display => ValueKind::Display,
            StyleProperty::Position => ValueKind::Position,
            StyleProperty::FlexDirection => ValueKind::FlexDirection,
            StyleProperty::FlexWrap => ValueKind::FlexWrap,
            StyleProperty::AlignItems => ValueKind::AlignItems,
            StyleProperty::JustifyContent => ValueKind::JustifyContent,
            StyleProperty::BackgroundFit | StyleProperty::ObjectFit => ValueKind::ObjectFit,
            StyleProperty::Overflow => ValueKind::Overflow,
            StyleProperty::FontStyle => ValueKind::FontStyle,
            StyleProperty::TextOverflow => ValueKind::TextOverflow,
            StyleProperty::ZIndex | StyleProperty::FontWeight | StyleProperty::MaxLines => {
                ValueKind::Integer
            }
            StyleProperty::BackgroundColor
            | StyleProperty::BorderColor
            | StyleProperty::Color
            | StyleProperty::TintColor => ValueKind::Color,
            StyleProperty::BackgroundImage | StyleProperty::FontFamily => ValueKind::String,
            StyleProperty::Transform => ValueKind::Transform,
            StyleProperty::Filter => ValueKind::Filter,
            _ => ValueKind::Number,
        }
    }

    /// Whether a change to this property invalidates flexbox layout.
    pub const fn is_layout(self) -> bool {
        matches!(
            self,
            StyleProperty::Display
                | StyleProperty::Position
                | StyleProperty::Top
                | StyleProperty::Right
                | StyleProperty::Bottom
                | StyleProperty::Left
                | StyleProperty::Width
                | StyleProperty::Height
                | StyleProperty::MinWidth
                | StyleProperty::MinHeight
                | StyleProperty::MaxWidth
                | StyleProperty::MaxHeight
                | StyleProperty::MarginTop
                | StyleProperty::MarginRight
                | StyleProperty::MarginBottom
                | StyleProperty::MarginLeft
                | StyleProperty::PaddingTop
                | StyleProperty::PaddingRight
                | StyleProperty::PaddingBottom
                | StyleProperty::PaddingLeft
                | StyleProperty::BorderTopWidth
                | StyleProperty::BorderRightWidth
                | StyleProperty::BorderBottomWidth
                | StyleProperty::BorderLeftWidth
                | StyleProperty::FlexDirection
                | StyleProperty::FlexWrap
                | StyleProperty::FlexGrow
                | StyleProperty::FlexShrink
                | StyleProperty::FlexBasis
                | StyleProperty::AlignItems
                | StyleProperty::JustifyContent
                | StyleProperty::Gap
                | StyleProperty::FontFamily
                | StyleProperty::FontSize
                | StyleProperty::FontStyle
                | StyleProperty::FontWeight
                | StyleProperty::LineHeight
                | StyleProperty::MaxLines
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Display {
    #[default]
    Flex,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    #[default]
    Relative,
    Absolute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlexDirection {
    Row,
    RowReverse,
    #[default]
    Column,
    ColumnReverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlexWrap {
    #[default]
    NoWrap,
    Wrap,
    WrapReverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignItems {
    Start,
    End,
    Center,
    Stretch,
    Baseline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JustifyContent {
    Start,
    End,
    Center,
    SpaceBetween,
    SpaceAround,
    SpaceEvenly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjectFit {
    #[default]
    Fill,
    Contain,
    Cover,
    None,
    ScaleDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overflow {
    #[default]
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
    Oblique,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextOverflow {
    #[default]
    Clip,
    Ellipsis,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Display(Display),
    Position(Position),
    FlexDirection(FlexDirection),
    FlexWrap(FlexWrap),
    AlignItems(AlignItems),
    JustifyContent(JustifyContent),
    ObjectFit(ObjectFit),
    Overflow(Overflow),
    FontStyle(FontStyle),
    TextOverflow(TextOverflow),
    Integer(i32),
    Number(StyleValue),
    Color(Color),
    String(SmolStr),
    Transform(Vec<StyleTransform>),
    Filter(Vec<StyleFilter>),
}

impl PropertyValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            PropertyValue::Display(_) => ValueKind::Display,
            PropertyValue::Position(_) => ValueKind::Position,
            PropertyValue::FlexDirection(_) => ValueKind::FlexDirection,
            PropertyValue::FlexWrap(_) => ValueKind::FlexWrap,
            PropertyValue::AlignItems(_) => ValueKind::AlignItems,
            PropertyValue::JustifyContent(_) => ValueKind::JustifyContent,
            PropertyValue::ObjectFit(_) => ValueKind::ObjectFit,
            PropertyValue::Overflow(_) => ValueKind::Overflow,
            PropertyValue::FontStyle(_) => ValueKind::FontStyle,
            PropertyValue::TextOverflow(_) => ValueKind::TextOverflow,
            PropertyValue::Integer(_) => ValueKind::Integer,
            PropertyValue::Number(_) => ValueKind::Number,
            PropertyValue::Color(_) => ValueKind::Color,
            PropertyValue::String(_) => ValueKind::String,
            PropertyValue::Transform(_) => ValueKind::Transform,
            PropertyValue::Filter(_) => ValueKind::Filter,
        }
    }

    pub fn string(value: impl AsRef<str>) -> Self {
        PropertyValue::String(SmolStr::new(value))
    }
}

impl From<StyleValue> for PropertyValue {
    fn from(value: StyleValue) -> Self {
        PropertyValue::Number(value)
    }
}

impl From<Color> for PropertyValue {
    fn from(value: Color) -> Self {
        PropertyValue::Color(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::string(value)
    }
}

impl From<Vec<StyleTransform>> for PropertyValue {
    fn from(value: Vec<StyleTransform>) -> Self {
        PropertyValue::Transform(value)
    }
}

impl From<Vec<StyleFilter>> for PropertyValue {
    fn from(value: Vec<StyleFilter>) -> Self {
        PropertyValue::Filter(value)
    }
}

macro_rules! impl_keyword_value {
    ($($ty:ident),* $(,)?) => {
        $(
            impl From<$ty> for PropertyValue {
                fn from(value: $ty) -> Self {
                    PropertyValue::$ty(value)
                }
            }
        )*
    };
}

impl_keyword_value!(
    Display,
    Position,
    FlexDirection,
    FlexWrap,
    AlignItems,
    JustifyContent,
    ObjectFit,
    Overflow,
    FontStyle,
    TextOverflow,
);
