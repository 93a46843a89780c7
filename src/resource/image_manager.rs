use super::ImageId;
use super::manager::{
    ListenerOwner, ResourceListener, ResourceLoader, ResourceManager, ResourceRequest,
    ResourceState,
};
use super::thread_pool::ThreadPool;
use crate::error::{RenderError, ResourceError};
use crate::view::{SharedRenderer, Texture, TextureType};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use image::DynamicImage;
use image::imageops::FilterType;
use slotmap::SecondaryMap;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRequest {
    /// File path or `data:` URI.
    pub uri: String,
    pub resize_width: Option<u32>,
    pub resize_height: Option<u32>,
}

impl ImageRequest {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            resize_width: None,
            resize_height: None,
        }
    }

    pub fn resize(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.resize_width = width;
        self.resize_height = height;
        self
    }
}

impl ResourceRequest for ImageRequest {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn cache_key(&self) -> String {
        match (self.resize_width, self.resize_height) {
            (None, None) => self.uri.clone(),
            (width, height) => format!(
                "{}#{}x{}",
                self.uri,
                width.unwrap_or(0),
                height.unwrap_or(0)
            ),
        }
    }
}

/// Tightly packed RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba.repeat(width as usize * height as usize);
        Self::new(width, height, pixels)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let pixels: &[[u8; 4]] = bytemuck::try_cast_slice(&self.pixels).ok()?;
        pixels.get((y * self.width + x) as usize).copied()
    }

    fn from_dynamic(image: DynamicImage, width: Option<u32>, height: Option<u32>) -> Self {
        let (source_width, source_height) = (image.width().max(1), image.height().max(1));
        let target = match (width, height) {
            (Some(w), Some(h)) => Some((w, h)),
            // A derived side never rounds down to zero.
            (Some(w), None) => Some((w, scale_side(w, source_height, source_width))),
            (None, Some(h)) => Some((scale_side(h, source_width, source_height), h)),
            (None, None) => None,
        };
        let image = match target {
            Some((w, h)) if w > 0 && h > 0 && (w, h) != (source_width, source_height) => {
                image.resize_exact(w, h, FilterType::Triangle)
            }
            _ => image,
        };
        let rgba = image.to_rgba8();
        Self::new(rgba.width(), rgba.height(), rgba.into_raw())
    }
}

fn scale_side(given: u32, numerator: u32, denominator: u32) -> u32 {
    let side = given as u64 * numerator as u64 / denominator as u64;
    side.clamp(1, u32::MAX as u64) as u32
}

/// Turns an [`ImageRequest`] into pixels. Called on a worker thread.
pub trait ImageDecoder: Send + Sync + 'static {
    fn decode(&self, request: &ImageRequest) -> Result<DecodedImage, ResourceError>;
}

impl<F> ImageDecoder for F
where
    F: Fn(&ImageRequest) -> Result<DecodedImage, ResourceError> + Send + Sync + 'static,
{
    fn decode(&self, request: &ImageRequest) -> Result<DecodedImage, ResourceError> {
        self(request)
    }
}

/// Decodes files and base64 `data:` URIs with the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct CodecImageDecoder;

impl CodecImageDecoder {
    fn decode_bytes(bytes: &[u8], request: &ImageRequest) -> Result<DecodedImage, ResourceError> {
        let image = image::load_from_memory(bytes).map_err(|err| match err {
            image::ImageError::Unsupported(err) => ResourceError::Unsupported(err.to_string()),
            err => ResourceError::Decode(err.to_string()),
        })?;
        Ok(DecodedImage::from_dynamic(
            image,
            request.resize_width,
            request.resize_height,
        ))
    }
}

impl ImageDecoder for CodecImageDecoder {
    fn decode(&self, request: &ImageRequest) -> Result<DecodedImage, ResourceError> {
        if let Some(data) = request.uri.strip_prefix("data:") {
            let bytes = decode_data_uri(data)?;
            return Self::decode_bytes(&bytes, request);
        }
        let bytes = std::fs::read(&request.uri)
            .map_err(|err| ResourceError::Io(format!("{}: {err}", request.uri)))?;
        Self::decode_bytes(&bytes, request)
    }
}

fn decode_data_uri(data: &str) -> Result<Vec<u8>, ResourceError> {
    let (header, payload) = data
        .split_once(',')
        .ok_or_else(|| ResourceError::Decode("malformed data URI".into()))?;
    if !header.ends_with(";base64") {
        return Err(ResourceError::Unsupported(format!(
            "data URI without base64 payload ({header})"
        )));
    }
    BASE64_STANDARD
        .decode(payload.trim())
        .map_err(|err| ResourceError::Decode(err.to_string()))
}

pub struct ImageLoader {
    decoder: Box<dyn ImageDecoder>,
}

impl ResourceLoader for ImageLoader {
    type Request = ImageRequest;
    type Output = DecodedImage;

    fn load(&self, request: &ImageRequest) -> Result<DecodedImage, ResourceError> {
        self.decoder.decode(request)
    }
}

fn upload(renderer: &SharedRenderer, image: &DecodedImage) -> Result<Texture, RenderError> {
    let mut renderer = renderer.borrow_mut();
    let texture = renderer.create_texture(image.width, image.height, TextureType::Updatable)?;
    if let Err(err) = renderer.update_texture(&texture, &image.pixels) {
        renderer.destroy_texture(texture);
        return Err(err);
    }
    Ok(texture)
}

/// Image cache. Decoded pixels stay on the CPU side so textures can be recreated when
/// a renderer is attached again.
pub struct ImageManager {
    resources: ResourceManager<ImageId, ImageLoader>,
    textures: SecondaryMap<ImageId, Texture>,
    renderer: Option<SharedRenderer>,
}

impl ImageManager {
    pub fn new(decoder: impl ImageDecoder, pool: Arc<ThreadPool>) -> Self {
        Self {
            resources: ResourceManager::new(
                ImageLoader {
                    decoder: Box::new(decoder),
                },
                pool,
            ),
            textures: SecondaryMap::new(),
            renderer: None,
        }
    }

    pub fn with_codecs(pool: Arc<ThreadPool>) -> Self {
        Self::new(CodecImageDecoder, pool)
    }

    pub fn acquire(&mut self, request: ImageRequest) -> Result<ImageId, ResourceError> {
        self.resources.acquire(request)
    }

    pub fn safe_acquire(
        &mut self,
        request: ImageRequest,
        owner: ListenerOwner,
        listener: ResourceListener<ImageId>,
    ) -> Result<ImageId, ResourceError> {
        self.resources.safe_acquire(request, owner, listener)
    }

    pub fn add_ref(&mut self, id: ImageId) -> bool {
        self.resources.add_ref(id)
    }

    pub fn listen(&mut self, id: ImageId, owner: ListenerOwner, listener: ResourceListener<ImageId>) {
        self.resources.listen(id, owner, listener);
    }

    pub fn remove_listeners(&mut self, id: ImageId, owner: ListenerOwner) {
        self.resources.remove_listeners(id, owner);
    }

    pub fn release(&mut self, id: ImageId, immediate: bool) -> bool {
        let deleted = self.resources.release(id, immediate);
        if deleted {
            self.drop_texture(id);
        }
        deleted
    }

    pub fn compact(&mut self) -> usize {
        let deleted = self.resources.compact();
        for id in &deleted {
            self.drop_texture(*id);
        }
        deleted.len()
    }

    /// Applies finished decodes, uploading textures when a renderer is attached, then
    /// fires listeners.
    pub fn poll(&mut self) -> usize {
        let Self {
            resources,
            textures,
            renderer,
        } = self;
        resources.poll_with(|id, image| {
            if let Some(renderer) = renderer.as_ref() {
                Self::materialize(renderer, textures, id, image);
            }
        })
    }

    pub fn wait_for(&mut self, id: ImageId, timeout: Duration) -> bool {
        let Self {
            resources,
            textures,
            renderer,
        } = self;
        resources.wait_for(id, timeout, |id, image| {
            if let Some(renderer) = renderer.as_ref() {
                Self::materialize(renderer, textures, id, image);
            }
        })
    }

    /// Makes `renderer` the texture owner. Re-attaching the same renderer is a no-op.
    pub fn attach(&mut self, renderer: SharedRenderer) {
        if self
            .renderer
            .as_ref()
            .is_some_and(|current| Rc::ptr_eq(current, &renderer))
        {
            return;
        }
        self.detach();

        let ids: Vec<_> = self.resources.ids().collect();
        for id in ids {
            if let Some(image) = self.resources.get(id) {
                Self::materialize(&renderer, &mut self.textures, id, image);
            }
        }
        log::debug!("image manager attached, {} textures", self.textures.len());
        self.renderer = Some(renderer);
    }

    /// Destroys every texture and forgets the renderer. Idempotent.
    pub fn detach(&mut self) {
        let Some(renderer) = self.renderer.take() else {
            return;
        };
        let mut renderer = renderer.borrow_mut();
        for (_, texture) in self.textures.drain() {
            renderer.destroy_texture(texture);
        }
    }

    pub fn is_attached(&self) -> bool {
        self.renderer.is_some()
    }

    pub fn texture(&self, id: ImageId) -> Option<&Texture> {
        self.textures.get(id)
    }

    pub fn image(&self, id: ImageId) -> Option<&DecodedImage> {
        self.resources.get(id)
    }

    pub fn state(&self, id: ImageId) -> Option<&ResourceState> {
        self.resources.state(id)
    }

    pub fn ref_count(&self, id: ImageId) -> usize {
        self.resources.ref_count(id)
    }

    pub fn has_image(&self, request: &ImageRequest) -> bool {
        self.resources.contains(request)
    }

    pub fn contains_id(&self, id: ImageId) -> bool {
        self.resources.contains_id(id)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn loads_submitted(&self) -> usize {
        self.resources.loads_submitted()
    }

    pub fn destroy(&mut self) {
        self.detach();
        self.resources.destroy();
    }

    fn materialize(
        renderer: &SharedRenderer,
        textures: &mut SecondaryMap<ImageId, Texture>,
        id: ImageId,
        image: &DecodedImage,
    ) {
        if textures.contains_key(id) {
            return;
        }
        match upload(renderer, image) {
            Ok(texture) => {
                textures.insert(id, texture);
            }
            Err(err) => log::warn!("image texture upload failed: {err}"),
        }
    }

    fn drop_texture(&mut self, id: ImageId) {
        if let Some(texture) = self.textures.remove(id) {
            match &self.renderer {
                Some(renderer) => renderer.borrow_mut().destroy_texture(texture),
                None => log::warn!("texture {} outlived its renderer", texture.id()),
            }
        }
    }
}

impl Drop for ImageManager {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for ImageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageManager")
            .field("resources", &self.resources)
            .field("textures", &self.textures.len())
            .field("attached", &self.renderer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{CodecImageDecoder, DecodedImage, ImageDecoder, ImageManager, ImageRequest};
    use crate::error::ResourceError;
    use crate::resource::{ResourceRequest, ResourceState, ThreadPool};
    use crate::view::{RecordingRenderer, SharedRenderer};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::rc::Rc;
    use std::sync::Arc;
    use std::time::Duration;

    fn png_data_uri(width: u32, height: u32) -> String {
        let image = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        format!("data:image/png;base64,{}", BASE64_STANDARD.encode(bytes))
    }

    fn solid_decoder(request: &ImageRequest) -> Result<DecodedImage, ResourceError> {
        if request.uri.ends_with(".missing") {
            return Err(ResourceError::Io("no such file".into()));
        }
        Ok(DecodedImage::solid(8, 4, [255, 255, 255, 255]))
    }

    fn manager() -> ImageManager {
        ImageManager::new(solid_decoder, Arc::new(ThreadPool::new(1)))
    }

    #[test]
    fn cache_key_includes_resize() {
        assert_eq!(ImageRequest::new("a.png").cache_key(), "a.png");
        assert_eq!(
            ImageRequest::new("a.png").resize(Some(10), None).cache_key(),
            "a.png#10x0"
        );
    }

    #[test]
    fn decodes_base64_data_uri() {
        let request = ImageRequest::new(png_data_uri(3, 2));
        let image = CodecImageDecoder.decode(&request).unwrap();
        assert_eq!((image.width, image.height), (3, 2));
        assert_eq!(image.pixel(2, 1), Some([10, 20, 30, 255]));
        assert_eq!(image.pixel(3, 0), None);
    }

    #[test]
    fn resize_keeps_aspect_when_one_side_given() {
        let request = ImageRequest::new(png_data_uri(4, 2)).resize(Some(2), None);
        let image = CodecImageDecoder.decode(&request).unwrap();
        assert_eq!((image.width, image.height), (2, 1));
    }

    #[test]
    fn thin_image_resize_keeps_one_pixel() {
        let request = ImageRequest::new(png_data_uri(40, 2)).resize(Some(10), None);
        let image = CodecImageDecoder.decode(&request).unwrap();
        assert_eq!((image.width, image.height), (10, 1));

        let request = ImageRequest::new(png_data_uri(2, 40)).resize(None, Some(10));
        let image = CodecImageDecoder.decode(&request).unwrap();
        assert_eq!((image.width, image.height), (1, 10));
    }

    #[test]
    fn missing_file_is_io_error() {
        let request = ImageRequest::new("/definitely/not/here.png");
        assert!(matches!(
            CodecImageDecoder.decode(&request),
            Err(ResourceError::Io(_))
        ));
    }

    #[test]
    fn non_base64_data_uri_is_unsupported() {
        let request = ImageRequest::new("data:image/svg+xml,<svg/>");
        assert!(matches!(
            CodecImageDecoder.decode(&request),
            Err(ResourceError::Unsupported(_))
        ));
    }

    #[test]
    fn ready_image_uploads_when_attached() {
        let recorder = Rc::new(RefCell::new(RecordingRenderer::new()));
        let mut images = manager();
        images.attach(recorder.clone() as SharedRenderer);

        let id = images.acquire(ImageRequest::new("a.png")).unwrap();
        assert!(images.wait_for(id, Duration::from_secs(5)));
        assert_eq!(images.state(id), Some(&ResourceState::Ready));
        let texture = images.texture(id).unwrap();
        assert_eq!((texture.width(), texture.height()), (8, 4));
        assert_eq!(recorder.borrow().texture_uploads(texture.id()), 1);

        assert!(images.release(id, true));
        assert_eq!(recorder.borrow().live_textures(), 0);
        assert!(!images.has_image(&ImageRequest::new("a.png")));
    }

    #[test]
    fn attach_and_detach_are_idempotent() {
        let recorder = Rc::new(RefCell::new(RecordingRenderer::new()));
        let shared: SharedRenderer = recorder.clone();
        let mut images = manager();
        let id = images.acquire(ImageRequest::new("b.png")).unwrap();
        assert!(images.wait_for(id, Duration::from_secs(5)));
        assert!(images.texture(id).is_none());

        images.attach(shared.clone());
        images.attach(shared.clone());
        assert_eq!(recorder.borrow().textures_created(), 1);

        images.detach();
        images.detach();
        assert!(images.texture(id).is_none());
        assert_eq!(recorder.borrow().live_textures(), 0);

        images.attach(shared);
        assert!(images.texture(id).is_some());
        assert_eq!(recorder.borrow().textures_created(), 2);
    }

    #[test]
    fn failed_load_has_no_texture() {
        let recorder = Rc::new(RefCell::new(RecordingRenderer::new()));
        let mut images = manager();
        images.attach(recorder.clone() as SharedRenderer);
        let id = images.acquire(ImageRequest::new("c.missing")).unwrap();
        assert!(images.wait_for(id, Duration::from_secs(5)));
        assert!(matches!(images.state(id), Some(ResourceState::Error(_))));
        assert!(images.texture(id).is_none());
        assert_eq!(recorder.borrow().textures_created(), 0);
    }

    #[test]
    fn reserved_uri_is_rejected() {
        let mut images = manager();
        assert_eq!(
            images.acquire(ImageRequest::new("@logo")),
            Err(ResourceError::ReservedUri("@logo".into()))
        );
        assert!(images.is_empty());
    }
}
