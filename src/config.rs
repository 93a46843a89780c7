use crate::style::Color;

pub const DEFAULT_ROOT_FONT_SIZE: f32 = 16.0;
pub const DEFAULT_GLYPH_CACHE_CAPACITY: usize = 512;

/// Scene configuration. Values are read once when the [`crate::Scene`] is created.
#[derive(Debug, Clone)]
pub struct SceneConfig {
    /// Initial viewport size in pixels.
    pub viewport_width: f32,
    pub viewport_height: f32,
    /// Root font size used when the root style does not set `FontSize`.
    pub root_font_size: f32,
    /// Family used by text nodes without a `FontFamily` declaration.
    pub default_font_family: String,
    /// Clear color used when the root style has no `BackgroundColor`.
    pub clear_color: Color,
    /// Number of decode workers. `None` picks `min(cpu count, 4)`.
    pub worker_threads: Option<usize>,
    /// Entries kept in each font face's glyph advance cache.
    pub glyph_cache_capacity: usize,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            viewport_width: 1280.0,
            viewport_height: 720.0,
            root_font_size: DEFAULT_ROOT_FONT_SIZE,
            default_font_family: "default".to_string(),
            clear_color: Color::rgb(0, 0, 0),
            worker_threads: None,
            glyph_cache_capacity: DEFAULT_GLYPH_CACHE_CAPACITY,
        }
    }
}

impl SceneConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn viewport(mut self, width: f32, height: f32) -> Self {
        self.viewport_width = width.max(0.0);
        self.viewport_height = height.max(0.0);
        self
    }

    pub fn root_font_size(mut self, size: f32) -> Self {
        self.root_font_size = size.max(0.0);
        self
    }

    pub fn default_font_family(mut self, family: impl Into<String>) -> Self {
        self.default_font_family = family.into();
        self
    }

    pub const fn clear_color(mut self, color: Color) -> Self {
        self.clear_color = color;
        self
    }

    pub const fn worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    pub const fn glyph_cache_capacity(mut self, capacity: usize) -> Self {
        self.glyph_cache_capacity = capacity;
        self
    }
}
