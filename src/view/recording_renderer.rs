use super::renderer::{Canvas, GlyphRun, RenderFilter, Renderer, Texture, TextureId, TextureType};
use crate::error::RenderError;
use crate::geometry::{Edges, Rect};
use crate::resource::FontId;
use crate::style::Color;
use glam::Affine2;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear(Color),
    EnableClipping(Rect),
    DisableClipping,
    DrawImage {
        texture: TextureId,
        transform: Affine2,
        dest: Rect,
        src: Rect,
        filter: RenderFilter,
    },
    FillRect {
        transform: Affine2,
        rect: Rect,
        color: Color,
    },
    StrokeRect {
        transform: Affine2,
        rect: Rect,
        edges: Edges,
        color: Color,
    },
    Present,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CanvasCommand {
    Clear(Color),
    FillRoundedRect {
        rect: Rect,
        radius: f32,
        color: Color,
    },
    StrokeRoundedRect {
        rect: Rect,
        radius: f32,
        stroke_width: f32,
        color: Color,
    },
    FillText {
        font: FontId,
        font_size: f32,
        x: f32,
        baseline: f32,
        text: String,
        color: Color,
    },
}

#[derive(Debug)]
struct TextureRecord {
    width: u32,
    height: u32,
    kind: TextureType,
    uploads: usize,
    canvas: Vec<CanvasCommand>,
}

/// Headless [`Renderer`] that records every call.
///
/// Used by tests and by embedders that want to inspect a frame without a GPU.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    next_texture: TextureId,
    textures: FxHashMap<TextureId, TextureRecord>,
    commands: Vec<DrawCommand>,
    created: usize,
    destroyed: usize,
    fail_texture_creation: bool,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes later `create_texture` calls fail.
    pub fn set_fail_texture_creation(&mut self, fail: bool) {
        self.fail_texture_creation = fail;
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn textures_created(&self) -> usize {
        self.created
    }

    pub fn textures_destroyed(&self) -> usize {
        self.destroyed
    }

    pub fn texture_size(&self, id: TextureId) -> Option<(u32, u32)> {
        self.textures
            .get(&id)
            .map(|record| (record.width, record.height))
    }

    pub fn texture_uploads(&self, id: TextureId) -> usize {
        self.textures.get(&id).map_or(0, |record| record.uploads)
    }

    /// Canvas commands of the most recent lock of `id`.
    pub fn canvas_commands(&self, id: TextureId) -> &[CanvasCommand] {
        self.textures
            .get(&id)
            .map(|record| record.canvas.as_slice())
            .unwrap_or_default()
    }

    pub fn draw_image_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| matches!(command, DrawCommand::DrawImage { .. }))
            .count()
    }
}

struct RecordingCanvas<'a> {
    width: u32,
    height: u32,
    commands: &'a mut Vec<CanvasCommand>,
}

impl Canvas for RecordingCanvas<'_> {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn clear(&mut self, color: Color) {
        self.commands.clear();
        self.commands.push(CanvasCommand::Clear(color));
    }

    fn fill_rounded_rect(&mut self, rect: Rect, radius: f32, color: Color) {
        self.commands
            .push(CanvasCommand::FillRoundedRect { rect, radius, color });
    }

    fn stroke_rounded_rect(&mut self, rect: Rect, radius: f32, stroke_width: f32, color: Color) {
        self.commands.push(CanvasCommand::StrokeRoundedRect {
            rect,
            radius,
            stroke_width,
            color,
        });
    }

    fn fill_text(&mut self, run: &GlyphRun<'_>) {
        self.commands.push(CanvasCommand::FillText {
            font: run.font,
            font_size: run.font_size,
            x: run.x,
            baseline: run.baseline,
            text: run.text.to_string(),
            color: run.color,
        });
    }
}

impl Renderer for RecordingRenderer {
    fn create_texture(
        &mut self,
        width: u32,
        height: u32,
        kind: TextureType,
    ) -> Result<Texture, RenderError> {
        if self.fail_texture_creation {
            return Err(RenderError::TextureCreation("creation disabled".into()));
        }
        if width == 0 || height == 0 {
            return Err(RenderError::TextureCreation(format!(
                "invalid size {width}x{height}"
            )));
        }
        self.next_texture += 1;
        let id = self.next_texture;
        self.textures.insert(
            id,
            TextureRecord {
                width,
                height,
                kind,
                uploads: 0,
                canvas: Vec::new(),
            },
        );
        self.created += 1;
        Ok(Texture::new(id, width, height, kind))
    }

    fn destroy_texture(&mut self, texture: Texture) {
        if self.textures.remove(&texture.id()).is_some() {
            self.destroyed += 1;
        } else {
            log::warn!("destroy of unknown texture {}", texture.id());
        }
    }

    fn update_texture(&mut self, texture: &Texture, pixels: &[u8]) -> Result<(), RenderError> {
        let record = self
            .textures
            .get_mut(&texture.id())
            .ok_or(RenderError::UnknownTexture(texture.id()))?;
        let expected = record.width as usize * record.height as usize * 4;
        if pixels.len() != expected {
            return Err(RenderError::TextureCreation(format!(
                "expected {expected} bytes, got {}",
                pixels.len()
            )));
        }
        record.uploads += 1;
        Ok(())
    }

    fn with_locked_texture(
        &mut self,
        texture: &Texture,
        paint: &mut dyn FnMut(&mut dyn Canvas),
    ) -> Result<(), RenderError> {
        let record = self
            .textures
            .get_mut(&texture.id())
            .ok_or(RenderError::UnknownTexture(texture.id()))?;
        if record.kind != TextureType::Lockable {
            return Err(RenderError::NotLockable(texture.id()));
        }
        record.canvas.clear();
        let mut canvas = RecordingCanvas {
            width: record.width,
            height: record.height,
            commands: &mut record.canvas,
        };
        paint(&mut canvas);
        Ok(())
    }

    fn clear(&mut self, color: Color) {
        self.commands.push(DrawCommand::Clear(color));
    }

    fn enable_clipping(&mut self, rect: Rect) {
        self.commands.push(DrawCommand::EnableClipping(rect));
    }

    fn disable_clipping(&mut self) {
        self.commands.push(DrawCommand::DisableClipping);
    }

    fn draw_image(
        &mut self,
        transform: &Affine2,
        dest: Rect,
        src: Rect,
        texture: &Texture,
        filter: &RenderFilter,
    ) {
        self.commands.push(DrawCommand::DrawImage {
            texture: texture.id(),
            transform: *transform,
            dest,
            src,
            filter: *filter,
        });
    }

    fn fill_rect(&mut self, transform: &Affine2, rect: Rect, color: Color) {
        self.commands.push(DrawCommand::FillRect {
            transform: *transform,
            rect,
            color,
        });
    }

    fn stroke_rect(&mut self, transform: &Affine2, rect: Rect, edges: Edges, color: Color) {
        self.commands.push(DrawCommand::StrokeRect {
            transform: *transform,
            rect,
            edges,
            color,
        });
    }

    fn present(&mut self) {
        self.commands.push(DrawCommand::Present);
    }
}
