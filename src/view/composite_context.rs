use crate::geometry::Rect;
use glam::Affine2;

/// Transform, clip and opacity stacks for one composite pass.
///
/// Every push is relative to the current top: matrices multiply, clips intersect (in
/// device space), opacities multiply. Pushes and pops must balance within a subtree.
#[derive(Debug, Clone)]
pub struct CompositeContext {
    matrices: Vec<Affine2>,
    clips: Vec<Rect>,
    opacities: Vec<f32>,
}

impl Default for CompositeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositeContext {
    pub fn new() -> Self {
        Self {
            matrices: Vec::with_capacity(16),
            clips: Vec::with_capacity(4),
            opacities: Vec::with_capacity(16),
        }
    }

    /// Back to identity, no clip, full opacity.
    pub fn reset(&mut self) {
        self.matrices.clear();
        self.clips.clear();
        self.opacities.clear();
    }

    pub fn matrix(&self) -> Affine2 {
        self.matrices.last().copied().unwrap_or(Affine2::IDENTITY)
    }

    pub fn clip(&self) -> Option<Rect> {
        self.clips.last().copied()
    }

    pub fn opacity(&self) -> f32 {
        self.opacities.last().copied().unwrap_or(1.0)
    }

    pub fn push_matrix(&mut self, local: Affine2) {
        let matrix = self.matrix() * local;
        self.matrices.push(matrix);
    }

    pub fn pop_matrix(&mut self) {
        debug_assert!(!self.matrices.is_empty(), "unbalanced matrix pop");
        self.matrices.pop();
    }

    /// Pushes `local` (in the current coordinate space) as a clip and returns the
    /// resulting device-space clip.
    pub fn push_clip(&mut self, local: Rect) -> Rect {
        let device = local.transform_bounds(&self.matrix());
        let clip = match self.clip() {
            Some(current) => current.intersect(&device),
            None => device,
        };
        self.clips.push(clip);
        clip
    }

    pub fn pop_clip(&mut self) {
        debug_assert!(!self.clips.is_empty(), "unbalanced clip pop");
        self.clips.pop();
    }

    pub fn push_opacity(&mut self, opacity: f32) {
        let opacity = self.opacity() * opacity.clamp(0.0, 1.0);
        self.opacities.push(opacity);
    }

    pub fn pop_opacity(&mut self) {
        debug_assert!(!self.opacities.is_empty(), "unbalanced opacity pop");
        self.opacities.pop();
    }

    pub fn is_balanced(&self) -> bool {
        self.matrices.is_empty() && self.clips.is_empty() && self.opacities.is_empty()
    }

    /// True when nothing drawn now can be visible.
    pub fn is_culled(&self) -> bool {
        self.opacity() <= 0.0 || self.clip().is_some_and(|clip| clip.is_empty())
    }
}
