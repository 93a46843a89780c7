use super::renderer::{Renderer, Texture, TextureType};
use crate::error::RenderError;

/// Size in whole pixels of a layer covering `width` x `height`.
pub fn layer_size(width: f32, height: f32) -> (u32, u32) {
    (width.max(0.0).ceil() as u32, height.max(0.0).ceil() as u32)
}

/// Reuses the lockable texture in `slot` when it already has the requested size,
/// otherwise destroys it and creates a new one.
pub fn ensure_lockable_texture<'a>(
    renderer: &mut dyn Renderer,
    slot: &'a mut Option<Texture>,
    width: u32,
    height: u32,
) -> Result<&'a Texture, RenderError> {
    let compatible = slot.as_ref().is_some_and(|texture| {
        texture.kind() == TextureType::Lockable
            && texture.width() == width
            && texture.height() == height
    });
    if !compatible {
        if let Some(texture) = slot.take() {
            renderer.destroy_texture(texture);
        }
        let texture = renderer.create_texture(width, height, TextureType::Lockable)?;
        *slot = Some(texture);
    }
    slot.as_ref()
        .ok_or_else(|| RenderError::TextureCreation("layer slot is empty".into()))
}

/// Destroys the texture in `slot`, if any.
pub fn release_texture(renderer: &mut dyn Renderer, slot: &mut Option<Texture>) {
    if let Some(texture) = slot.take() {
        renderer.destroy_texture(texture);
    }
}
