mod box_node;
mod image_node;
mod root_node;
mod text_node;

pub use box_node::*;
pub use image_node::*;
pub use root_node::*;
pub use text_node::*;

use super::layout::{LayoutBox, LayoutHandle};
use super::renderer::Texture;
use crate::style::{ComputedStyle, Style};
use bitflags::bitflags;
use std::rc::Rc;

slotmap::new_key_type! {
    /// Stable handle of a node inside its [`crate::Scene`].
    pub struct NodeId;
}

bitflags! {
    /// Per-concern staleness of a node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NodeFlags: u8 {
        /// Skipped by paint and composite, `display: none` in layout.
        const HIDDEN = 1 << 0;
        /// Takes part in layout and composites its children but draws nothing itself.
        const LAYOUT_ONLY = 1 << 1;
        const COMPUTE_STYLE_DIRTY = 1 << 2;
        const COMPOSITE_DIRTY = 1 << 3;
        const PAINT_DIRTY = 1 << 4;

        const ALL_DIRTY = Self::COMPUTE_STYLE_DIRTY.bits()
            | Self::COMPOSITE_DIRTY.bits()
            | Self::PAINT_DIRTY.bits();
    }
}

pub enum NodeKind {
    Root(RootNode),
    Box(BoxNode),
    Image(ImageNode),
    Text(TextNode),
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Root(_) => "root",
            NodeKind::Box(_) => "box",
            NodeKind::Image(_) => "image",
            NodeKind::Text(_) => "text",
        }
    }

    /// Only root and box nodes hold children.
    pub fn is_container(&self) -> bool {
        matches!(self, NodeKind::Root(_) | NodeKind::Box(_))
    }
}

impl std::fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Root(root) => f.debug_tuple("Root").field(root).finish(),
            NodeKind::Box(node) => f.debug_tuple("Box").field(node).finish(),
            NodeKind::Image(node) => f.debug_tuple("Image").field(node).finish(),
            NodeKind::Text(node) => f.debug_tuple("Text").field(node).finish(),
        }
    }
}

/// One node of the scene tree. Nodes live in the scene's arena and refer to each
/// other by [`NodeId`].
#[derive(Debug)]
pub struct SceneNode {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) layout: LayoutHandle,
    pub(crate) style: Option<Rc<Style>>,
    pub(crate) flags: NodeFlags,
    pub(crate) computed: ComputedStyle,
    pub(crate) layout_box: LayoutBox,
    /// Rasterized decoration, owned by the attached renderer.
    pub(crate) layer: Option<Texture>,
    pub(crate) z_order: Option<Rc<[NodeId]>>,
    pub(crate) kind: NodeKind,
}

impl SceneNode {
    pub(crate) fn new(kind: NodeKind, layout: LayoutHandle) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            layout,
            style: None,
            flags: NodeFlags::ALL_DIRTY,
            computed: ComputedStyle::default(),
            layout_box: LayoutBox::default(),
            layer: None,
            z_order: None,
            kind,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn style(&self) -> Option<&Rc<Style>> {
        self.style.as_ref()
    }

    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    pub fn is_hidden(&self) -> bool {
        self.flags.contains(NodeFlags::HIDDEN)
    }

    pub fn is_layout_only(&self) -> bool {
        self.flags.contains(NodeFlags::LAYOUT_ONLY)
    }

    pub fn computed(&self) -> &ComputedStyle {
        &self.computed
    }

    /// Box from the last layout, relative to the parent.
    pub fn layout_box(&self) -> &LayoutBox {
        &self.layout_box
    }

    pub fn layer(&self) -> Option<&Texture> {
        self.layer.as_ref()
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn layout_handle(&self) -> LayoutHandle {
        self.layout
    }

    pub(crate) fn mark(&mut self, flags: NodeFlags) {
        self.flags.insert(flags);
    }

    /// Children sorted by z-index, stable for equal values. Rebuilt lazily after a
    /// child is inserted or removed, or changes its z-index.
    pub(crate) fn cached_z_order(&self) -> Option<Rc<[NodeId]>> {
        self.z_order.clone()
    }

    pub(crate) fn invalidate_z_order(&mut self) {
        self.z_order = None;
        self.flags.insert(NodeFlags::COMPOSITE_DIRTY);
    }
}

#[cfg(test)]
mod tests {
    use super::NodeFlags;

    #[test]
    fn all_dirty_excludes_mode_flags() {
        let flags = NodeFlags::ALL_DIRTY;
        assert!(flags.contains(NodeFlags::PAINT_DIRTY));
        assert!(!flags.contains(NodeFlags::HIDDEN));
        assert!(!flags.contains(NodeFlags::LAYOUT_ONLY));
        assert_eq!(std::mem::size_of::<NodeFlags>(), 1);
    }
}
