use super::NodeId;
use crate::error::ResourceError;
use crate::resource::ImageId;
use smol_str::SmolStr;
use std::fmt;

pub type LoadCallback = Box<dyn FnMut(NodeId)>;
pub type ErrorCallback = Box<dyn FnMut(NodeId, &ResourceError)>;

/// State specific to image nodes.
#[derive(Default)]
pub struct ImageNode {
    pub(crate) src: Option<SmolStr>,
    pub(crate) image: Option<ImageId>,
    /// Pixel size of the decoded image, known once it is ready.
    pub(crate) natural_size: Option<(u32, u32)>,
    pub(crate) on_load: Option<LoadCallback>,
    pub(crate) on_error: Option<ErrorCallback>,
}

impl ImageNode {
    pub fn src(&self) -> Option<&str> {
        self.src.as_deref()
    }

    pub fn image(&self) -> Option<ImageId> {
        self.image
    }

    pub fn natural_size(&self) -> Option<(u32, u32)> {
        self.natural_size
    }

    /// Intrinsic size used by layout; zero until the image is ready.
    pub(crate) fn intrinsic_size(&self) -> (f32, f32) {
        self.natural_size
            .map_or((0.0, 0.0), |(width, height)| (width as f32, height as f32))
    }

    pub(crate) fn fire_load(&mut self, node: NodeId) {
        if let Some(callback) = self.on_load.as_mut() {
            callback(node);
        }
    }

    pub(crate) fn fire_error(&mut self, node: NodeId, error: &ResourceError) {
        if let Some(callback) = self.on_error.as_mut() {
            callback(node, error);
        }
    }
}

impl fmt::Debug for ImageNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageNode")
            .field("src", &self.src)
            .field("image", &self.image)
            .field("natural_size", &self.natural_size)
            .field("on_load", &self.on_load.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Scales an intrinsic size to honor whichever dimension layout already fixed.
pub(crate) fn fit_intrinsic(
    intrinsic: (f32, f32),
    known_width: Option<f32>,
    known_height: Option<f32>,
) -> (f32, f32) {
    let (width, height) = intrinsic;
    match (known_width, known_height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) if width > 0.0 => (w, height * w / width),
        (None, Some(h)) if height > 0.0 => (width * h / height, h),
        (Some(w), None) => (w, height),
        (None, Some(h)) => (width, h),
        (None, None) => (width, height),
    }
}
