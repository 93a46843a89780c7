use super::paintable::{ensure_lockable_texture, layer_size, release_texture};
use super::renderer::{GlyphRun, Renderer, Texture};
use crate::error::RenderError;
use crate::resource::{FontFace, FontId, from_26_6, to_26_6};
use crate::style::{Color, TextOverflow};

const ELLIPSIS: &str = "\u{2026}";
const ELLIPSIS_FALLBACK: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextBlockState {
    Empty,
    Shaped,
    Invalidated,
}

/// Resolved text properties used for shaping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub font_size: f32,
    pub line_height: f32,
    pub max_lines: Option<usize>,
    pub overflow: TextOverflow,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLine {
    pub text: String,
    /// Advance sum in 26.6 fixed point.
    pub width: i32,
}

impl TextLine {
    pub fn width_px(&self) -> f32 {
        from_26_6(self.width)
    }
}

/// Line geometry for one string in one font, plus the texture it was painted into.
#[derive(Debug)]
pub struct TextBlock {
    state: TextBlockState,
    lines: Vec<TextLine>,
    font: Option<FontId>,
    style: Option<TextStyle>,
    ascent: f32,
    half_leading: f32,
    width: f32,
    height: f32,
    truncated: bool,
    texture: Option<Texture>,
}

impl Default for TextBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBlock {
    pub fn new() -> Self {
        Self {
            state: TextBlockState::Empty,
            lines: Vec::new(),
            font: None,
            style: None,
            ascent: 0.0,
            half_leading: 0.0,
            width: 0.0,
            height: 0.0,
            truncated: false,
            texture: None,
        }
    }

    pub fn state(&self) -> TextBlockState {
        self.state
    }

    pub fn lines(&self) -> &[TextLine] {
        &self.lines
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn texture(&self) -> Option<&Texture> {
        self.texture.as_ref()
    }

    /// Breaks `text` into lines no wider than `max_width` and keeps as many as fit in
    /// `max_height` (and `style.max_lines`). Non-finite or non-positive limits are
    /// unbounded.
    pub fn shape(
        &mut self,
        text: &str,
        face: &FontFace,
        font: FontId,
        style: &TextStyle,
        max_width: f32,
        max_height: f32,
    ) {
        let layout = layout_lines(text, face, style, max_width, max_height);
        let metrics = face.metrics(style.font_size);

        self.lines = layout.lines;
        self.truncated = layout.truncated;
        self.font = Some(font);
        self.style = Some(*style);
        self.ascent = metrics.ascent;
        self.half_leading = (style.line_height - metrics.line_height()) * 0.5;
        self.width = layout.width;
        self.height = layout.height;
        self.state = TextBlockState::Shaped;
    }

    /// Size `text` would shape to, without committing anything.
    pub fn measure(
        text: &str,
        face: &FontFace,
        style: &TextStyle,
        max_width: f32,
        max_height: f32,
    ) -> (f32, f32) {
        let layout = layout_lines(text, face, style, max_width, max_height);
        (layout.width, layout.height)
    }

    pub fn invalidate(&mut self) {
        if self.state == TextBlockState::Shaped {
            self.state = TextBlockState::Invalidated;
        }
    }

    /// Drops all lines and the texture.
    pub fn clear(&mut self, renderer: Option<&mut dyn Renderer>) {
        self.lines.clear();
        self.font = None;
        self.style = None;
        self.width = 0.0;
        self.height = 0.0;
        self.truncated = false;
        self.state = TextBlockState::Empty;
        if let Some(renderer) = renderer {
            release_texture(renderer, &mut self.texture);
        }
    }

    pub fn release_texture(&mut self, renderer: &mut dyn Renderer) {
        release_texture(renderer, &mut self.texture);
    }

    /// Rasterizes the committed lines. The texture is reallocated only when the shaped
    /// bounds change size.
    pub fn paint(&mut self, renderer: &mut dyn Renderer) -> Result<(), RenderError> {
        let (Some(font), Some(style)) = (self.font, self.style) else {
            release_texture(renderer, &mut self.texture);
            return Ok(());
        };
        let (width, height) = layer_size(self.width, self.height);
        if self.state != TextBlockState::Shaped || width == 0 || height == 0 {
            release_texture(renderer, &mut self.texture);
            return Ok(());
        }

        let texture = ensure_lockable_texture(renderer, &mut self.texture, width, height)?;
        let lines = &self.lines;
        let baseline_offset = self.half_leading + self.ascent;
        renderer.with_locked_texture(texture, &mut |canvas| {
            canvas.clear(Color::TRANSPARENT);
            for (index, line) in lines.iter().enumerate() {
                if line.text.is_empty() {
                    continue;
                }
                canvas.fill_text(&GlyphRun {
                    font,
                    font_size: style.font_size,
                    x: 0.0,
                    baseline: index as f32 * style.line_height + baseline_offset,
                    text: &line.text,
                    color: style.color,
                });
            }
        })
    }
}

struct LineLayout {
    lines: Vec<TextLine>,
    width: f32,
    height: f32,
    truncated: bool,
}

fn limit(value: f32) -> Option<f32> {
    (value.is_finite() && value > 0.0).then_some(value)
}

fn layout_lines(
    text: &str,
    face: &FontFace,
    style: &TextStyle,
    max_width: f32,
    max_height: f32,
) -> LineLayout {
    let max_width = limit(max_width).map(to_26_6);
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        break_paragraph(paragraph, face, style.font_size, max_width, &mut lines);
    }

    let by_height = limit(max_height)
        .filter(|_| style.line_height > 0.0)
        .map(|height| ((height / style.line_height).floor() as usize).max(1));
    let cap = match (by_height, style.max_lines.filter(|lines| *lines > 0)) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };

    let mut truncated = false;
    if let Some(cap) = cap {
        if lines.len() > cap {
            lines.truncate(cap);
            truncated = true;
            if style.overflow == TextOverflow::Ellipsis {
                if let Some(last) = lines.last_mut() {
                    append_ellipsis(last, face, style.font_size, max_width);
                }
            }
        }
    }

    let width = lines.iter().map(|line| line.width).max().unwrap_or(0);
    LineLayout {
        width: from_26_6(width),
        height: lines.len() as f32 * style.line_height,
        lines,
        truncated,
    }
}

/// Greedy packing that prefers breaking at whitespace and falls back to codepoint
/// breaks for words longer than the line.
fn break_paragraph(
    paragraph: &str,
    face: &FontFace,
    font_size: f32,
    max_width: Option<i32>,
    lines: &mut Vec<TextLine>,
) {
    let glyphs: Vec<(char, i32)> = paragraph
        .chars()
        .map(|ch| (ch, face.advance_26_6(ch, font_size)))
        .collect();
    let emitted = lines.len();

    let mut start = 0;
    while start < glyphs.len() {
        while start < glyphs.len() && glyphs[start].0.is_whitespace() {
            start += 1;
        }
        if start == glyphs.len() {
            break;
        }

        let mut end = start;
        let mut width = 0;
        let mut last_space = None;
        while end < glyphs.len() {
            let (ch, advance) = glyphs[end];
            if max_width.is_some_and(|max| width + advance > max) && end > start {
                break;
            }
            if ch.is_whitespace() {
                last_space = Some(end);
            }
            width += advance;
            end += 1;
        }

        let overflowed = end < glyphs.len();
        if overflowed && !glyphs[end].0.is_whitespace() {
            if let Some(space) = last_space.filter(|space| *space > start) {
                end = space;
            }
        }

        let mut line_end = end;
        while line_end > start && glyphs[line_end - 1].0.is_whitespace() {
            line_end -= 1;
        }
        let slice = &glyphs[start..line_end];
        lines.push(TextLine {
            text: slice.iter().map(|(ch, _)| *ch).collect(),
            width: slice.iter().map(|(_, advance)| *advance).sum(),
        });
        start = end;
    }

    if lines.len() == emitted {
        lines.push(TextLine {
            text: String::new(),
            width: 0,
        });
    }
}

fn append_ellipsis(line: &mut TextLine, face: &FontFace, font_size: f32, max_width: Option<i32>) {
    let ellipsis = if face.has_glyph('\u{2026}') {
        ELLIPSIS
    } else {
        ELLIPSIS_FALLBACK
    };
    let mut ellipsis = String::from(ellipsis);
    let mut ellipsis_width = face.measure_26_6(&ellipsis, font_size);

    let mut chars: Vec<char> = line.text.chars().collect();
    let mut width = line.width;
    loop {
        let fits = max_width.is_none_or(|max| width + ellipsis_width <= max);
        let trailing_space = chars.last().is_some_and(|ch| ch.is_whitespace());
        if (fits && !trailing_space) || chars.is_empty() {
            break;
        }
        if let Some(ch) = chars.pop() {
            width -= face.advance_26_6(ch, font_size);
        }
    }

    // A line narrower than the ellipsis itself keeps only the marks that fit.
    while max_width.is_some_and(|max| width + ellipsis_width > max) && ellipsis.pop().is_some() {
        ellipsis_width = face.measure_26_6(&ellipsis, font_size);
    }

    line.text = chars.into_iter().collect::<String>() + &ellipsis;
    line.width = width + ellipsis_width;
}
