use crate::error::RenderError;
use crate::geometry::{Edges, Rect};
use crate::resource::FontId;
use crate::style::Color;
use glam::Affine2;
use std::cell::RefCell;
use std::rc::Rc;

pub type TextureId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureType {
    /// Uploaded from CPU pixels (decoded images).
    Updatable,
    /// Written on the CPU through [`Renderer::with_locked_texture`].
    Lockable,
    RenderTarget,
}

/// Pixel buffer owned by the renderer that created it.
///
/// Not `Clone`: the value is handed back to [`Renderer::destroy_texture`] exactly once.
#[derive(Debug, PartialEq, Eq)]
pub struct Texture {
    id: TextureId,
    width: u32,
    height: u32,
    kind: TextureType,
}

impl Texture {
    pub fn new(id: TextureId, width: u32, height: u32, kind: TextureType) -> Self {
        Self {
            id,
            width,
            height,
            kind,
        }
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn kind(&self) -> TextureType {
        self.kind
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_size(self.width as f32, self.height as f32)
    }
}

/// Tint and flips applied when a texture is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderFilter {
    /// Multiplied into every sampled pixel; its alpha carries the node opacity.
    pub color: Color,
    pub flip_h: bool,
    pub flip_v: bool,
}

impl RenderFilter {
    pub const fn tint(color: Color) -> Self {
        Self {
            color,
            flip_h: false,
            flip_v: false,
        }
    }

    pub fn with_opacity(self, opacity: f32) -> Self {
        Self {
            color: self.color.with_alpha_scaled(opacity),
            ..self
        }
    }
}

impl Default for RenderFilter {
    fn default() -> Self {
        Self::tint(Color::WHITE)
    }
}

/// Text drawn onto a [`Canvas`]. Glyph rasterization belongs to the canvas backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphRun<'a> {
    pub font: FontId,
    pub font_size: f32,
    pub x: f32,
    pub baseline: f32,
    pub text: &'a str,
    pub color: Color,
}

/// CPU drawing surface of a locked texture.
pub trait Canvas {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn clear(&mut self, color: Color);
    fn fill_rounded_rect(&mut self, rect: Rect, radius: f32, color: Color);
    fn stroke_rounded_rect(&mut self, rect: Rect, radius: f32, stroke_width: f32, color: Color);
    fn fill_text(&mut self, run: &GlyphRun<'_>);
}

/// Drawing backend consumed by the paint and composite passes.
pub trait Renderer {
    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        kind: TextureType,
    ) -> Result<Texture, RenderError>;

    fn destroy_texture(&mut self, texture: Texture);

    /// Replaces the contents of an updatable texture with tightly packed RGBA8 pixels.
    fn update_texture(&mut self, texture: &Texture, pixels: &[u8]) -> Result<(), RenderError>;

    /// Locks a lockable texture, runs `paint` against it and unlocks it.
    fn with_locked_texture(
        &mut self,
        texture: &Texture,
        paint: &mut dyn FnMut(&mut dyn Canvas),
    ) -> Result<(), RenderError>;

    fn clear(&mut self, color: Color);

    fn enable_clipping(&mut self, rect: Rect);

    fn disable_clipping(&mut self);

    /// Draws `src` of `texture` into `dest`, both in local space, mapped by `transform`.
    fn draw_image(
        &mut self,
        transform: &Affine2,
        dest: Rect,
        src: Rect,
        texture: &Texture,
        filter: &RenderFilter,
    );

    fn fill_rect(&mut self, transform: &Affine2, rect: Rect, color: Color);

    fn stroke_rect(&mut self, transform: &Affine2, rect: Rect, edges: Edges, color: Color);

    fn present(&mut self) {}
}

pub type SharedRenderer = Rc<RefCell<dyn Renderer>>;
