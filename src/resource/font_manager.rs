use super::FontId;
use super::lru::LruCache;
use super::manager::{
    ListenerOwner, ResourceListener, ResourceLoader, ResourceManager, ResourceRequest,
    ResourceState,
};
use super::thread_pool::ThreadPool;
use crate::error::ResourceError;
use crate::style::FontStyle;
use rustc_hash::FxHashMap;
use skrifa::MetadataProvider;
use skrifa::instance::{LocationRef, Size};
use skrifa::raw::{FileRef, FontRef};
use smol_str::SmolStr;
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_FONT_WEIGHT: u16 = 400;

/// Glyph used for the advance of codepoints the face does not map.
const FALLBACK_GLYPH: char = '?';

pub fn to_26_6(value: f32) -> i32 {
    (value * 64.0).round() as i32
}

pub fn from_26_6(value: i32) -> f32 {
    value as f32 / 64.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontMetrics {
    pub ascent: f32,
    /// Distance below the baseline, positive.
    pub descent: f32,
    pub line_gap: f32,
}

impl FontMetrics {
    pub fn line_height(&self) -> f32 {
        self.ascent + self.descent + self.line_gap
    }
}

/// Opaque handle to parsed font data.
pub trait FontSource: Send + 'static {
    /// Horizontal advance in pixels, `None` when `ch` has no glyph.
    fn glyph_advance(&self, ch: char, font_size: f32) -> Option<f32>;

    fn metrics(&self, font_size: f32) -> FontMetrics;
}

/// TrueType/OpenType data read through `skrifa`.
pub struct SfntSource {
    data: Vec<u8>,
    index: u32,
}

impl SfntSource {
    pub fn new(data: Vec<u8>, index: u32) -> Result<Self, ResourceError> {
        let source = Self { data, index };
        source
            .font_ref()
            .map_err(|err| ResourceError::Decode(format!("font face {index}: {err}")))?;
        Ok(source)
    }

    fn font_ref(&self) -> Result<FontRef<'_>, skrifa::raw::ReadError> {
        match FileRef::new(&self.data)? {
            FileRef::Font(font) if self.index == 0 => Ok(font),
            FileRef::Font(_) => Err(skrifa::raw::ReadError::InvalidCollectionIndex(self.index)),
            FileRef::Collection(collection) => collection.get(self.index),
        }
    }
}

impl FontSource for SfntSource {
    fn glyph_advance(&self, ch: char, font_size: f32) -> Option<f32> {
        let font = self.font_ref().ok()?;
        let glyph = font.charmap().map(ch)?;
        font.glyph_metrics(Size::new(font_size), LocationRef::default())
            .advance_width(glyph)
    }

    fn metrics(&self, font_size: f32) -> FontMetrics {
        match self.font_ref() {
            Ok(font) => {
                let metrics = font.metrics(Size::new(font_size), LocationRef::default());
                FontMetrics {
                    ascent: metrics.ascent,
                    descent: -metrics.descent,
                    line_gap: metrics.leading,
                }
            }
            Err(_) => FixedPitchSource::default().metrics(font_size),
        }
    }
}

/// Every glyph has the same advance. Deterministic stand-in for real font data.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedPitchSource {
    /// Advance as a fraction of the font size.
    pub advance: f32,
    pub ascent: f32,
    pub descent: f32,
    /// Codepoints reported as unmapped.
    pub missing: Vec<char>,
}

impl FixedPitchSource {
    pub fn new(advance: f32) -> Self {
        Self {
            advance,
            ..Self::default()
        }
    }
}

impl Default for FixedPitchSource {
    fn default() -> Self {
        Self {
            advance: 0.5,
            ascent: 0.8,
            descent: 0.2,
            missing: Vec::new(),
        }
    }
}

impl FontSource for FixedPitchSource {
    fn glyph_advance(&self, ch: char, font_size: f32) -> Option<f32> {
        if self.missing.contains(&ch) {
            None
        } else {
            Some(self.advance * font_size)
        }
    }

    fn metrics(&self, font_size: f32) -> FontMetrics {
        FontMetrics {
            ascent: self.ascent * font_size,
            descent: self.descent * font_size,
            line_gap: 0.0,
        }
    }
}

/// A loaded face plus its glyph advance cache.
pub struct FontFace {
    family: SmolStr,
    style: FontStyle,
    weight: u16,
    source: Box<dyn FontSource>,
    advances: RefCell<LruCache<(char, u32), i32>>,
}

impl FontFace {
    pub fn new(
        family: impl Into<SmolStr>,
        style: FontStyle,
        weight: u16,
        source: Box<dyn FontSource>,
        cache_capacity: usize,
    ) -> Self {
        Self {
            family: family.into(),
            style,
            weight,
            source,
            advances: RefCell::new(LruCache::new(cache_capacity)),
        }
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn style(&self) -> FontStyle {
        self.style
    }

    pub fn weight(&self) -> u16 {
        self.weight
    }

    pub fn metrics(&self, font_size: f32) -> FontMetrics {
        self.source.metrics(font_size)
    }

    pub fn has_glyph(&self, ch: char) -> bool {
        self.source.glyph_advance(ch, 1.0).is_some()
    }

    /// Advance of `ch` in 26.6 fixed point. Unmapped codepoints use the fallback glyph.
    pub fn advance_26_6(&self, ch: char, font_size: f32) -> i32 {
        let key = (ch, font_size.to_bits());
        let cached = self.advances.borrow_mut().find(&key).copied();
        if let Some(advance) = cached {
            return advance;
        }

        let advance = self
            .source
            .glyph_advance(ch, font_size)
            .or_else(|| self.source.glyph_advance(FALLBACK_GLYPH, font_size))
            .unwrap_or(font_size * 0.5);
        let advance = to_26_6(advance);
        self.advances.borrow_mut().insert(key, advance);
        advance
    }

    pub fn measure_26_6(&self, text: &str, font_size: f32) -> i32 {
        text.chars()
            .map(|ch| self.advance_26_6(ch, font_size))
            .sum()
    }

    pub fn cached_advances(&self) -> usize {
        self.advances.borrow().len()
    }
}

impl fmt::Debug for FontFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontFace")
            .field("family", &self.family)
            .field("style", &self.style)
            .field("weight", &self.weight)
            .finish()
    }
}

#[derive(Clone)]
pub struct FontRequest {
    /// File path, or a `memory:` name when `data` is provided.
    pub uri: String,
    pub family: SmolStr,
    pub style: FontStyle,
    pub weight: u16,
    /// Face index inside a collection.
    pub index: u32,
    pub data: Option<Arc<[u8]>>,
}

impl FontRequest {
    pub fn file(uri: impl Into<String>, family: impl Into<SmolStr>) -> Self {
        Self {
            uri: uri.into(),
            family: family.into(),
            style: FontStyle::Normal,
            weight: DEFAULT_FONT_WEIGHT,
            index: 0,
            data: None,
        }
    }

    pub fn memory(name: &str, family: impl Into<SmolStr>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            data: Some(data.into()),
            ..Self::file(format!("memory:{name}"), family)
        }
    }

    pub fn style(mut self, style: FontStyle) -> Self {
        self.style = style;
        self
    }

    pub fn weight(mut self, weight: u16) -> Self {
        self.weight = weight;
        self
    }

    pub fn index(mut self, index: u32) -> Self {
        self.index = index;
        self
    }
}

impl fmt::Debug for FontRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontRequest")
            .field("uri", &self.uri)
            .field("family", &self.family)
            .field("style", &self.style)
            .field("weight", &self.weight)
            .field("index", &self.index)
            .finish()
    }
}

impl ResourceRequest for FontRequest {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn cache_key(&self) -> String {
        format!("{}#{}", self.uri, self.index)
    }
}

/// Parses font data into a [`FontSource`]. Called on a worker thread.
pub trait FontDecoder: Send + Sync + 'static {
    fn load_source(&self, request: &FontRequest) -> Result<Box<dyn FontSource>, ResourceError>;
}

impl<F> FontDecoder for F
where
    F: Fn(&FontRequest) -> Result<Box<dyn FontSource>, ResourceError> + Send + Sync + 'static,
{
    fn load_source(&self, request: &FontRequest) -> Result<Box<dyn FontSource>, ResourceError> {
        self(request)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SfntFontDecoder;

impl FontDecoder for SfntFontDecoder {
    fn load_source(&self, request: &FontRequest) -> Result<Box<dyn FontSource>, ResourceError> {
        let data = match &request.data {
            Some(data) => data.to_vec(),
            None => std::fs::read(&request.uri)
                .map_err(|err| ResourceError::Io(format!("{}: {err}", request.uri)))?,
        };
        Ok(Box::new(SfntSource::new(data, request.index)?))
    }
}

pub struct FontLoader {
    decoder: Box<dyn FontDecoder>,
    glyph_cache_capacity: usize,
}

impl ResourceLoader for FontLoader {
    type Request = FontRequest;
    type Output = FontFace;

    fn load(&self, request: &FontRequest) -> Result<FontFace, ResourceError> {
        let source = self.decoder.load_source(request)?;
        Ok(FontFace::new(
            request.family.clone(),
            request.style,
            request.weight,
            source,
            self.glyph_cache_capacity,
        ))
    }
}

/// Font cache plus a family registry used to resolve `FontFamily` declarations.
pub struct FontManager {
    resources: ResourceManager<FontId, FontLoader>,
    families: FxHashMap<SmolStr, Vec<FontId>>,
}

impl FontManager {
    pub fn new(decoder: impl FontDecoder, pool: Arc<ThreadPool>, glyph_cache_capacity: usize) -> Self {
        Self {
            resources: ResourceManager::new(
                FontLoader {
                    decoder: Box::new(decoder),
                    glyph_cache_capacity,
                },
                pool,
            ),
            families: FxHashMap::default(),
        }
    }

    pub fn with_sfnt(pool: Arc<ThreadPool>, glyph_cache_capacity: usize) -> Self {
        Self::new(SfntFontDecoder, pool, glyph_cache_capacity)
    }

    pub fn acquire(&mut self, request: FontRequest) -> Result<FontId, ResourceError> {
        let family = family_key(&request.family);
        let id = self.resources.acquire(request)?;
        let ids = self.families.entry(family).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
        Ok(id)
    }

    pub fn safe_acquire(
        &mut self,
        request: FontRequest,
        owner: ListenerOwner,
        listener: ResourceListener<FontId>,
    ) -> Result<FontId, ResourceError> {
        let id = self.acquire(request)?;
        self.resources.listen(id, owner, listener);
        Ok(id)
    }

    pub fn add_ref(&mut self, id: FontId) -> bool {
        self.resources.add_ref(id)
    }

    pub fn listen(&mut self, id: FontId, owner: ListenerOwner, listener: ResourceListener<FontId>) {
        self.resources.listen(id, owner, listener);
    }

    pub fn remove_listeners(&mut self, id: FontId, owner: ListenerOwner) {
        self.resources.remove_listeners(id, owner);
    }

    pub fn release(&mut self, id: FontId, immediate: bool) -> bool {
        let deleted = self.resources.release(id, immediate);
        if deleted {
            self.unregister(id);
        }
        deleted
    }

    pub fn compact(&mut self) -> usize {
        let deleted = self.resources.compact();
        for id in &deleted {
            self.unregister(*id);
        }
        deleted.len()
    }

    pub fn poll(&mut self) -> usize {
        self.resources.poll()
    }

    pub fn wait_for(&mut self, id: FontId, timeout: Duration) -> bool {
        self.resources.wait_for(id, timeout, |_, _| {})
    }

    /// Closest registered face of `family` that is still referenced and has not
    /// failed: matching style first, then nearest weight.
    pub fn find(&self, family: &str, style: FontStyle, weight: u16) -> Option<FontId> {
        self.families
            .get(family_key(family).as_str())?
            .iter()
            .copied()
            .filter(|id| self.resources.ref_count(*id) > 0)
            .filter(|id| !matches!(self.resources.state(*id), Some(ResourceState::Error(_)) | None))
            .min_by_key(|id| {
                let request = self.resources.request(*id);
                let style_rank = request.is_none_or(|request| request.style != style) as u8;
                let weight_rank = request.map_or(u16::MAX, |request| request.weight.abs_diff(weight));
                (style_rank, weight_rank)
            })
    }

    pub fn face(&self, id: FontId) -> Option<&FontFace> {
        self.resources.get(id)
    }

    pub fn state(&self, id: FontId) -> Option<&ResourceState> {
        self.resources.state(id)
    }

    pub fn ref_count(&self, id: FontId) -> usize {
        self.resources.ref_count(id)
    }

    pub fn has_font(&self, request: &FontRequest) -> bool {
        self.resources.contains(request)
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
        self.families.clear();
        self.resources.destroy();
    }

    fn unregister(&mut self, id: FontId) {
        self.families.retain(|_, ids| {
            ids.retain(|candidate| *candidate != id);
            !ids.is_empty()
        });
    }
}

impl fmt::Debug for FontManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontManager")
            .field("resources", &self.resources)
            .field("families", &self.families.len())
            .finish()
    }
}

fn family_key(family: &str) -> SmolStr {
    SmolStr::new(family.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_decoder(request: &FontRequest) -> Result<Box<dyn FontSource>, ResourceError> {
        if request.uri.ends_with(".broken") {
            return Err(ResourceError::Decode("bad table".into()));
        }
        Ok(Box::new(FixedPitchSource::default()))
    }

    fn manager() -> FontManager {
        FontManager::new(fixed_decoder, Arc::new(ThreadPool::new(1)), 16)
    }

    fn face(capacity: usize) -> FontFace {
        let source = FixedPitchSource {
            missing: vec!['\u{1F600}'],
            ..FixedPitchSource::new(0.5)
        };
        FontFace::new("Test", FontStyle::Normal, 400, Box::new(source), capacity)
    }

    #[test]
    fn fixed_point_conversion() {
        assert_eq!(to_26_6(1.0), 64);
        assert_eq!(to_26_6(0.5), 32);
        assert_eq!(from_26_6(96), 1.5);
    }

    #[test]
    fn advances_are_fixed_point_and_cached() {
        let face = face(8);
        assert_eq!(face.advance_26_6('a', 16.0), 8 * 64);
        assert_eq!(face.measure_26_6("abc", 16.0), 3 * 8 * 64);
        assert_eq!(face.cached_advances(), 3);
        // Same codepoint at another size is a separate entry.
        face.advance_26_6('a', 20.0);
        assert_eq!(face.cached_advances(), 4);
    }

    #[test]
    fn glyph_cache_is_bounded() {
        let face = face(2);
        face.measure_26_6("abcdef", 10.0);
        assert_eq!(face.cached_advances(), 2);
    }

    #[test]
    fn unmapped_codepoint_uses_fallback_advance() {
        let face = face(8);
        assert!(!face.has_glyph('\u{1F600}'));
        assert_eq!(face.advance_26_6('\u{1F600}', 10.0), face.advance_26_6('?', 10.0));
    }

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        let result = SfntSource::new(vec![0, 1, 2, 3], 0);
        assert!(matches!(result, Err(ResourceError::Decode(_))));

        let request = FontRequest::memory("junk", "Junk", vec![9u8; 12]);
        assert!(matches!(
            SfntFontDecoder.load_source(&request),
            Err(ResourceError::Decode(_))
        ));
    }

    #[test]
    fn find_prefers_style_then_weight() {
        let mut fonts = manager();
        let regular = fonts.acquire(FontRequest::file("sans.ttf", "Sans")).unwrap();
        let bold = fonts
            .acquire(FontRequest::file("sans-bold.ttf", "Sans").weight(700))
            .unwrap();
        let italic = fonts
            .acquire(FontRequest::file("sans-italic.ttf", "Sans").style(FontStyle::Italic))
            .unwrap();

        assert_eq!(fonts.find("sans", FontStyle::Normal, 400), Some(regular));
        assert_eq!(fonts.find("Sans", FontStyle::Normal, 650), Some(bold));
        assert_eq!(fonts.find("SANS", FontStyle::Italic, 900), Some(italic));
        assert_eq!(fonts.find("Serif", FontStyle::Normal, 400), None);
    }

    #[test]
    fn failed_faces_are_not_found() {
        let mut fonts = manager();
        let id = fonts.acquire(FontRequest::file("x.broken", "Broken")).unwrap();
        assert!(fonts.wait_for(id, Duration::from_secs(5)));
        assert_eq!(fonts.find("Broken", FontStyle::Normal, 400), None);
    }

    #[test]
    fn loaded_face_carries_request_attributes() {
        let mut fonts = manager();
        let id = fonts
            .acquire(FontRequest::file("mono.ttf", "Mono").weight(300))
            .unwrap();
        assert!(fonts.wait_for(id, Duration::from_secs(5)));
        let face = fonts.face(id).unwrap();
        assert_eq!(face.family(), "Mono");
        assert_eq!(face.weight(), 300);
        assert_eq!(face.metrics(10.0).line_height(), 10.0);
    }

    #[test]
    fn release_unregisters_family() {
        let mut fonts = manager();
        let request = FontRequest::file("a.ttf", "A");
        let id = fonts.acquire(request.clone()).unwrap();
        assert!(fonts.wait_for(id, Duration::from_secs(5)));
        assert!(fonts.release(id, true));
        assert!(!fonts.has_font(&request));
        assert_eq!(fonts.find("A", FontStyle::Normal, 400), None);
    }

    #[test]
    fn released_faces_are_skipped_before_compaction() {
        let mut fonts = manager();
        let regular = fonts.acquire(FontRequest::file("sans.ttf", "Sans")).unwrap();
        let bold = fonts
            .acquire(FontRequest::file("sans-bold.ttf", "Sans").weight(700))
            .unwrap();
        assert!(fonts.wait_for(regular, Duration::from_secs(5)));

        assert!(!fonts.release(regular, false));
        assert!(fonts.face(regular).is_some());
        assert_eq!(fonts.find("Sans", FontStyle::Normal, 400), Some(bold));

        assert_eq!(fonts.compact(), 1);
        assert!(fonts.face(regular).is_none());
    }
}
