use crate::resource::{DEFAULT_FONT_WEIGHT, FontId};
use crate::style::{ComputedStyle, FontStyle, Style, StyleProperty, TextOverflow};
use crate::view::text_block::{TextBlock, TextStyle};
use smol_str::SmolStr;

/// Face lookup key derived from a node's style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontQuery {
    pub family: SmolStr,
    pub style: FontStyle,
    pub weight: u16,
}

impl FontQuery {
    pub fn from_style(style: Option<&Style>, default_family: &str) -> Self {
        let family = style
            .and_then(|style| style.get::<SmolStr>(StyleProperty::FontFamily))
            .filter(|family| !family.is_empty())
            .unwrap_or_else(|| SmolStr::new(default_family));
        let weight = style
            .and_then(|style| style.get::<i32>(StyleProperty::FontWeight))
            .map_or(DEFAULT_FONT_WEIGHT, |weight| weight.clamp(1, 1000) as u16);
        Self {
            family,
            style: style
                .and_then(|style| style.get::<FontStyle>(StyleProperty::FontStyle))
                .unwrap_or_default(),
            weight,
        }
    }
}

/// State specific to text nodes.
#[derive(Debug, Default)]
pub struct TextNode {
    pub(crate) text: String,
    pub(crate) block: TextBlock,
    pub(crate) font: Option<FontId>,
    /// Face whose load completion this node is waiting for.
    pub(crate) pending_font: Option<FontId>,
    pub(crate) text_style: Option<TextStyle>,
}

impl TextNode {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn block(&self) -> &TextBlock {
        &self.block
    }

    pub fn font(&self) -> Option<FontId> {
        self.font
    }

    /// Returns whether the text changed.
    pub(crate) fn set_text(&mut self, text: &str) -> bool {
        if self.text == text {
            return false;
        }
        self.text.clear();
        self.text.push_str(text);
        self.block.invalidate();
        true
    }

    /// Stores the resolved text style; a different style invalidates the shaped lines.
    pub(crate) fn update_text_style(&mut self, text_style: TextStyle) -> bool {
        if self.text_style == Some(text_style) {
            return false;
        }
        self.text_style = Some(text_style);
        self.block.invalidate();
        true
    }

    pub(crate) fn update_font(&mut self, font: Option<FontId>) -> bool {
        if self.font == font {
            return false;
        }
        self.font = font;
        self.block.invalidate();
        true
    }
}

pub(crate) fn resolve_text_style(style: Option<&Style>, computed: &ComputedStyle) -> TextStyle {
    let max_lines = style
        .and_then(|style| style.get::<i32>(StyleProperty::MaxLines))
        .filter(|lines| *lines > 0)
        .map(|lines| lines as usize);
    TextStyle {
        font_size: computed.font_size,
        line_height: computed.line_height,
        max_lines,
        overflow: style
            .and_then(|style| style.get::<TextOverflow>(StyleProperty::TextOverflow))
            .unwrap_or_default(),
        color: computed.color,
    }
}
