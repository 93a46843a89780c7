mod frame;
mod resources;

pub use frame::FrameStats;

use self::resources::{EventQueue, font_listener, image_listener};
use super::composite_context::CompositeContext;
use super::layout::LayoutTree;
use super::paintable::release_texture;
use super::renderer::SharedRenderer;
use super::scene_node::{
    BoxNode, ErrorCallback, ImageNode, LoadCallback, NodeFlags, NodeId, NodeKind, RootNode,
    SceneNode, TextNode,
};
use crate::config::SceneConfig;
use crate::error::SceneError;
use crate::resource::{
    FontDecoder, FontId, FontManager, FontRequest, ImageDecoder, ImageManager, ImageRequest,
    ListenerOwner, RESERVED_URI_PREFIX, ThreadPool, default_thread_count,
};
use crate::style::{Color, Style, StyleChangeQueue, StyleContext};
use slotmap::SlotMap;
use smol_str::SmolStr;
use std::rc::Rc;
use std::sync::Arc;

/// Owner of a scene tree, its resource caches and the per-frame pipeline.
///
/// All methods run on the thread that created the scene. Decoding happens on the
/// scene's [`ThreadPool`]; results are applied at the start of the next
/// [`Scene::frame`].
pub struct Scene {
    config: SceneConfig,
    nodes: SlotMap<NodeId, SceneNode>,
    root: NodeId,
    layout: LayoutTree,
    style_context: StyleContext,
    composite: CompositeContext,
    style_changes: Rc<StyleChangeQueue>,
    events: EventQueue,
    pool: Arc<ThreadPool>,
    images: ImageManager,
    fonts: FontManager,
    renderer: Option<SharedRenderer>,
    viewport: (f32, f32),
    frame_count: u64,
    last_stats: FrameStats,
}

impl Scene {
    /// Scene decoding images with the `image` crate and fonts with `skrifa`.
    pub fn new(config: SceneConfig) -> Result<Self, SceneError> {
        let pool = Arc::new(Self::create_pool(&config));
        let images = ImageManager::with_codecs(pool.clone());
        let fonts = FontManager::with_sfnt(pool.clone(), config.glyph_cache_capacity);
        Self::with_managers(config, pool, images, fonts)
    }

    pub fn with_decoders(
        config: SceneConfig,
        image_decoder: impl ImageDecoder,
        font_decoder: impl FontDecoder,
    ) -> Result<Self, SceneError> {
        let pool = Arc::new(Self::create_pool(&config));
        let images = ImageManager::new(image_decoder, pool.clone());
        let fonts = FontManager::new(font_decoder, pool.clone(), config.glyph_cache_capacity);
        Self::with_managers(config, pool, images, fonts)
    }

    fn create_pool(config: &SceneConfig) -> ThreadPool {
        ThreadPool::new(config.worker_threads.unwrap_or_else(default_thread_count))
    }

    fn with_managers(
        config: SceneConfig,
        pool: Arc<ThreadPool>,
        images: ImageManager,
        fonts: FontManager,
    ) -> Result<Self, SceneError> {
        let mut layout = LayoutTree::new();
        let mut nodes = SlotMap::with_key();
        let handle = layout.create()?;
        let root = nodes.insert(SceneNode::new(
            NodeKind::Root(RootNode::new(config.clear_color)),
            handle,
        ));
        layout.set_owner(handle, root)?;

        let viewport = (config.viewport_width, config.viewport_height);
        log::debug!(
            "scene created, viewport {}x{}, {} decode workers",
            viewport.0,
            viewport.1,
            pool.thread_count()
        );
        Ok(Self {
            style_context: StyleContext::new(viewport.0, viewport.1, config.root_font_size),
            config,
            nodes,
            root,
            layout,
            composite: CompositeContext::new(),
            style_changes: Rc::new(StyleChangeQueue::default()),
            events: EventQueue::default(),
            pool,
            images,
            fonts,
            renderer: None,
            viewport,
            frame_count: 0,
            last_stats: FrameStats::default(),
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn style_context(&self) -> &StyleContext {
        &self.style_context
    }

    pub fn viewport_size(&self) -> (f32, f32) {
        self.viewport
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn last_stats(&self) -> FrameStats {
        self.last_stats
    }

    pub fn images(&self) -> &ImageManager {
        &self.images
    }

    pub fn images_mut(&mut self) -> &mut ImageManager {
        &mut self.images
    }

    pub fn fonts(&self) -> &FontManager {
        &self.fonts
    }

    pub fn fonts_mut(&mut self) -> &mut FontManager {
        &mut self.fonts
    }

    pub fn thread_pool(&self) -> &Arc<ThreadPool> {
        &self.pool
    }

    pub fn create_box(&mut self) -> Result<NodeId, SceneError> {
        self.insert_node(NodeKind::Box(BoxNode::default()))
    }

    pub fn create_image(&mut self) -> Result<NodeId, SceneError> {
        self.insert_node(NodeKind::Image(ImageNode::default()))
    }

    pub fn create_text(&mut self, text: &str) -> Result<NodeId, SceneError> {
        let mut node = TextNode::default();
        node.set_text(text);
        self.insert_node(NodeKind::Text(node))
    }

    fn insert_node(&mut self, kind: NodeKind) -> Result<NodeId, SceneError> {
        let handle = self.layout.create()?;
        let id = self.nodes.insert(SceneNode::new(kind, handle));
        self.layout.set_owner(handle, id)?;
        Ok(id)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut SceneNode, SceneError> {
        self.nodes.get_mut(id).ok_or(SceneError::NodeNotFound(id))
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        let len = self.check_attach(parent, child)?;
        self.attach_child(parent, len, child)
    }

    /// Inserts `child` before the child currently at `index`. A child that already
    /// has a parent is moved; `index` then refers to the list without it.
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        index: usize,
        child: NodeId,
    ) -> Result<(), SceneError> {
        let len = self.check_attach(parent, child)?;
        if index > len {
            return Err(SceneError::IndexOutOfRange { index, len });
        }
        self.attach_child(parent, index, child)
    }

    /// Validates an attach and returns the parent's child count without `child`.
    fn check_attach(&self, parent: NodeId, child: NodeId) -> Result<usize, SceneError> {
        let parent_node = self
            .nodes
            .get(parent)
            .ok_or(SceneError::NodeNotFound(parent))?;
        let child_node = self.nodes.get(child).ok_or(SceneError::NodeNotFound(child))?;
        if child == self.root {
            return Err(SceneError::RootNode);
        }
        if !parent_node.kind.is_container() {
            return Err(SceneError::NotAContainer(parent));
        }
        let mut ancestor = Some(parent);
        while let Some(id) = ancestor {
            if id == child {
                return Err(SceneError::CycleDetected { parent, child });
            }
            ancestor = self.nodes.get(id).and_then(|node| node.parent);
        }
        let len = parent_node.children.len();
        Ok(if child_node.parent == Some(parent) {
            len - 1
        } else {
            len
        })
    }

    fn attach_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<(), SceneError> {
        if let Some(previous) = self.nodes.get(child).and_then(|node| node.parent) {
            self.detach_child(previous, child)?;
        }
        let child_handle = self.node_mut(child)?.layout;
        let parent_handle = self.node_mut(parent)?.layout;
        self.layout.insert_child(parent_handle, index, child_handle)?;

        let parent_node = self.node_mut(parent)?;
        parent_node.children.insert(index, child);
        parent_node.invalidate_z_order();
        let child_node = self.node_mut(child)?;
        child_node.parent = Some(parent);
        child_node.mark(NodeFlags::COMPOSITE_DIRTY);
        Ok(())
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        let node = self.nodes.get(child).ok_or(SceneError::NodeNotFound(child))?;
        if node.parent != Some(parent) {
            return Err(SceneError::NotAChild { parent, child });
        }
        self.detach_child(parent, child)
    }

    fn detach_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        let child_handle = self.node_mut(child)?.layout;
        let parent_handle = self.node_mut(parent)?.layout;
        self.layout.remove_child(parent_handle, child_handle)?;

        let parent_node = self.node_mut(parent)?;
        parent_node.children.retain(|id| *id != child);
        parent_node.invalidate_z_order();
        self.node_mut(child)?.parent = None;
        Ok(())
    }

    /// Destroys a detached node and its whole subtree, children first. Styles are
    /// unbound, resource handles released and layer textures destroyed.
    pub fn destroy(&mut self, id: NodeId) -> Result<(), SceneError> {
        let node = self.nodes.get(id).ok_or(SceneError::NodeNotFound(id))?;
        if id == self.root {
            return Err(SceneError::RootNode);
        }
        if node.parent.is_some() {
            log::warn!("destroy of attached node {id:?} refused");
            return Err(SceneError::NodeAttached(id));
        }
        self.destroy_subtree(id);
        Ok(())
    }

    fn destroy_subtree(&mut self, id: NodeId) {
        let children = self
            .nodes
            .get_mut(id)
            .map(|node| std::mem::take(&mut node.children))
            .unwrap_or_default();
        for child in children {
            self.destroy_subtree(child);
        }

        let Some(mut node) = self.nodes.remove(id) else {
            return;
        };
        let owner = ListenerOwner::from(id);
        if let Some(style) = node.style.take() {
            style.unbind(id);
        }
        match &mut node.kind {
            NodeKind::Image(image) => {
                if let Some(image) = image.image.take() {
                    self.images.remove_listeners(image, owner);
                    self.images.release(image, false);
                }
            }
            NodeKind::Box(node) => {
                if let Some(image) = node.background.take().and_then(|bg| bg.image) {
                    self.images.remove_listeners(image, owner);
                    self.images.release(image, false);
                }
            }
            NodeKind::Text(text) => {
                if let Some(font) = text.pending_font.take() {
                    self.fonts.remove_listeners(font, owner);
                }
                if let Some(font) = text.font.take() {
                    self.fonts.release(font, false);
                }
            }
            NodeKind::Root(_) => {}
        }
        if let Some(renderer) = &self.renderer {
            let mut renderer = renderer.borrow_mut();
            release_texture(&mut *renderer, &mut node.layer);
            if let NodeKind::Text(text) = &mut node.kind {
                text.block.clear(Some(&mut *renderer));
            }
        }
        self.layout.remove(node.layout);
    }

    /// Binds `style` to the node, replacing any previous binding. The same style may be
    /// bound to several nodes.
    pub fn set_style(&mut self, id: NodeId, style: Option<Rc<Style>>) -> Result<(), SceneError> {
        let queue = self.style_changes.clone();
        let node = self.node_mut(id)?;
        if let Some(previous) = node.style.take() {
            previous.unbind(id);
        }
        if let Some(style) = &style {
            style.bind(id, &queue);
        }
        node.style = style;
        node.mark(NodeFlags::COMPUTE_STYLE_DIRTY);
        if let NodeKind::Text(text) = &mut node.kind {
            text.block.invalidate();
        }
        Ok(())
    }

    pub fn set_hidden(&mut self, id: NodeId, hidden: bool) -> Result<(), SceneError> {
        self.set_mode_flag(id, NodeFlags::HIDDEN, hidden)
    }

    pub fn set_layout_only(&mut self, id: NodeId, layout_only: bool) -> Result<(), SceneError> {
        self.set_mode_flag(id, NodeFlags::LAYOUT_ONLY, layout_only)
    }

    fn set_mode_flag(&mut self, id: NodeId, flag: NodeFlags, value: bool) -> Result<(), SceneError> {
        let node = self.node_mut(id)?;
        if node.flags.contains(flag) == value {
            return Ok(());
        }
        node.flags.set(flag, value);
        // Hidden feeds into the layout style, which is rebuilt by the style pass.
        node.mark(NodeFlags::ALL_DIRTY);
        if let Some(parent) = node.parent {
            self.node_mut(parent)?.mark(NodeFlags::COMPOSITE_DIRTY);
        }
        Ok(())
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<(), SceneError> {
        let node = self.node_mut(id)?;
        let NodeKind::Text(text_node) = &mut node.kind else {
            return Err(SceneError::WrongNodeKind {
                node: id,
                expected: "text",
            });
        };
        if text_node.set_text(text) {
            node.mark(NodeFlags::PAINT_DIRTY | NodeFlags::COMPOSITE_DIRTY);
            let handle = node.layout;
            self.layout.mark_dirty(handle);
        }
        Ok(())
    }

    /// Points an image node at `src`, releasing the previous image. Load results are
    /// reported through the node's `on_load`/`on_error` callbacks during a later frame.
    pub fn set_image_src(&mut self, id: NodeId, src: Option<&str>) -> Result<(), SceneError> {
        let node = self.nodes.get(id).ok_or(SceneError::NodeNotFound(id))?;
        let NodeKind::Image(image) = &node.kind else {
            return Err(SceneError::WrongNodeKind {
                node: id,
                expected: "image",
            });
        };
        if image.src.as_deref() == src {
            return Ok(());
        }
        if let Some(src) = src.filter(|src| src.starts_with(RESERVED_URI_PREFIX)) {
            return Err(SceneError::ReservedUri(src.to_string()));
        }

        let owner = ListenerOwner::from(id);
        let previous = self.image_node_mut(id)?.image.take();
        if let Some(previous) = previous {
            self.images.remove_listeners(previous, owner);
            self.images.release(previous, false);
        }
        let acquired = match src {
            Some(src) => Some(self.images.safe_acquire(
                ImageRequest::new(src),
                owner,
                image_listener(&self.events, id, false),
            )?),
            None => None,
        };

        let node = self.node_mut(id)?;
        node.mark(NodeFlags::PAINT_DIRTY | NodeFlags::COMPOSITE_DIRTY);
        let handle = node.layout;
        if let NodeKind::Image(image) = &mut node.kind {
            image.src = src.map(SmolStr::new);
            image.image = acquired;
            image.natural_size = None;
        }
        self.layout.mark_dirty(handle);
        Ok(())
    }

    pub fn on_load(&mut self, id: NodeId, callback: Option<LoadCallback>) -> Result<(), SceneError> {
        self.image_node_mut(id)?.on_load = callback;
        Ok(())
    }

    pub fn on_error(&mut self, id: NodeId, callback: Option<ErrorCallback>) -> Result<(), SceneError> {
        self.image_node_mut(id)?.on_error = callback;
        Ok(())
    }

    fn image_node_mut(&mut self, id: NodeId) -> Result<&mut ImageNode, SceneError> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Image(image) => Ok(image),
            _ => Err(SceneError::WrongNodeKind {
                node: id,
                expected: "image",
            }),
        }
    }

    /// Starts loading a font face. Text nodes pick it up once it matches their
    /// `FontFamily`.
    pub fn load_font(&mut self, request: FontRequest) -> Result<FontId, SceneError> {
        let id = self.fonts.acquire(request)?;
        for (node_id, node) in self.nodes.iter_mut() {
            let NodeKind::Text(text) = &mut node.kind else {
                continue;
            };
            if text.font.is_some() {
                continue;
            }
            if text.pending_font.is_none() {
                text.pending_font = Some(id);
                self.fonts
                    .listen(id, ListenerOwner::from(node_id), font_listener(&self.events, node_id));
            }
            node.mark(NodeFlags::COMPUTE_STYLE_DIRTY);
        }
        Ok(id)
    }

    /// Drops the reference taken by [`Self::load_font`]. Once no other caller holds
    /// the face, text nodes using it let go of their own references and resolve their
    /// `FontFamily` again on the next frame. Returns whether `id` was known.
    pub fn release_font(&mut self, id: FontId) -> bool {
        if self.fonts.ref_count(id) == 0 {
            return false;
        }
        let users: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, node)| matches!(&node.kind, NodeKind::Text(text) if text.font == Some(id)))
            .map(|(node_id, _)| node_id)
            .collect();
        self.fonts.release(id, false);
        if self.fonts.ref_count(id) > users.len() {
            return true;
        }

        for node_id in users {
            let Some(node) = self.nodes.get_mut(node_id) else {
                continue;
            };
            let handle = node.layout;
            if let NodeKind::Text(text) = &mut node.kind {
                text.update_font(None);
                if text.pending_font == Some(id) {
                    text.pending_font = None;
                    self.fonts.remove_listeners(id, ListenerOwner::from(node_id));
                }
                self.fonts.release(id, false);
            }
            node.mark(NodeFlags::ALL_DIRTY);
            self.layout.mark_dirty(handle);
        }
        log::debug!("font {id:?} released");
        true
    }

    pub fn set_clear_color(&mut self, color: Color) {
        let root = self.root;
        if let Some(node) = self.nodes.get_mut(root) {
            if let NodeKind::Root(state) = &mut node.kind {
                state.clear_color = color;
            }
            node.mark(NodeFlags::COMPOSITE_DIRTY);
        }
    }

    /// Takes effect at the next frame's media change dispatch.
    pub fn set_viewport_size(&mut self, width: f32, height: f32) {
        self.viewport = (width.max(0.0), height.max(0.0));
    }

    /// Makes `renderer` the target of paint and composite. Image textures are
    /// re-created on it and the whole tree repaints on the next frame.
    pub fn attach_renderer(&mut self, renderer: SharedRenderer) {
        if self
            .renderer
            .as_ref()
            .is_some_and(|current| Rc::ptr_eq(current, &renderer))
        {
            return;
        }
        self.detach_renderer();
        self.images.attach(renderer.clone());
        for node in self.nodes.values_mut() {
            node.mark(NodeFlags::PAINT_DIRTY | NodeFlags::COMPOSITE_DIRTY);
        }
        self.renderer = Some(renderer);
        log::debug!("renderer attached to scene");
    }

    /// Destroys every texture owned on behalf of the current renderer. Idempotent.
    pub fn detach_renderer(&mut self) {
        let Some(renderer) = self.renderer.take() else {
            return;
        };
        {
            let mut renderer = renderer.borrow_mut();
            for node in self.nodes.values_mut() {
                release_texture(&mut *renderer, &mut node.layer);
                if let NodeKind::Text(text) = &mut node.kind {
                    text.block.release_texture(&mut *renderer);
                }
            }
        }
        self.images.detach();
        log::debug!("renderer detached from scene");
    }

    pub fn is_renderer_attached(&self) -> bool {
        self.renderer.is_some()
    }
}

impl Drop for Scene {
    fn drop(&mut self) {
        self.detach_renderer();
        for (id, node) in self.nodes.iter_mut() {
            if let Some(style) = node.style.take() {
                style.unbind(id);
            }
        }
        self.images.destroy();
        self.fonts.destroy();
        self.pool.shutdown_now();
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("nodes", &self.nodes.len())
            .field("viewport", &self.viewport)
            .field("frame_count", &self.frame_count)
            .field("images", &self.images)
            .field("fonts", &self.fonts)
            .field("attached", &self.renderer.is_some())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Scene;
    use crate::config::SceneConfig;
    use crate::error::ResourceError;
    use crate::resource::{DecodedImage, FixedPitchSource, FontRequest, FontSource, ImageRequest};

    pub fn solid_image(request: &ImageRequest) -> Result<DecodedImage, ResourceError> {
        if request.uri.ends_with(".missing") {
            return Err(ResourceError::Io(format!("{} not found", request.uri)));
        }
        Ok(DecodedImage::solid(40, 20, [255, 0, 0, 255]))
    }

    pub fn fixed_font(_: &FontRequest) -> Result<Box<dyn FontSource>, ResourceError> {
        Ok(Box::new(FixedPitchSource::default()))
    }

    pub fn scene() -> Scene {
        let config = SceneConfig::new()
            .viewport(200.0, 100.0)
            .worker_threads(1)
            .default_font_family("Test");
        Scene::with_decoders(config, solid_image, fixed_font).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::scene;
    use crate::error::SceneError;
    use crate::style::Style;

    #[test]
    fn leaves_cannot_hold_children() {
        let mut scene = scene();
        let image = scene.create_image().unwrap();
        let text = scene.create_text("hi").unwrap();
        let child = scene.create_box().unwrap();
        assert_eq!(
            scene.append_child(image, child),
            Err(SceneError::NotAContainer(image))
        );
        assert_eq!(
            scene.append_child(text, child),
            Err(SceneError::NotAContainer(text))
        );
        assert_eq!(
            scene.append_child(child, scene.root()),
            Err(SceneError::RootNode)
        );
    }

    #[test]
    fn cycles_are_rejected() {
        let mut scene = scene();
        let outer = scene.create_box().unwrap();
        let inner = scene.create_box().unwrap();
        scene.append_child(scene.root(), outer).unwrap();
        scene.append_child(outer, inner).unwrap();
        assert_eq!(
            scene.append_child(inner, outer),
            Err(SceneError::CycleDetected {
                parent: inner,
                child: outer
            })
        );
        assert_eq!(
            scene.append_child(outer, outer),
            Err(SceneError::CycleDetected {
                parent: outer,
                child: outer
            })
        );
    }

    #[test]
    fn insert_orders_children_and_checks_range() {
        let mut scene = scene();
        let root = scene.root();
        let a = scene.create_box().unwrap();
        let b = scene.create_box().unwrap();
        let c = scene.create_box().unwrap();
        scene.append_child(root, a).unwrap();
        scene.append_child(root, b).unwrap();
        scene.insert_child(root, 1, c).unwrap();
        assert_eq!(scene.node(root).unwrap().children(), &[a, c, b]);
        assert_eq!(scene.layout.child_count(scene.node(root).unwrap().layout), 3);

        // Moving within the same parent indexes the list without the child.
        scene.insert_child(root, 2, a).unwrap();
        assert_eq!(scene.node(root).unwrap().children(), &[c, b, a]);

        let d = scene.create_box().unwrap();
        assert_eq!(
            scene.insert_child(root, 9, d),
            Err(SceneError::IndexOutOfRange { index: 9, len: 3 })
        );
    }

    #[test]
    fn reparenting_moves_the_layout_node_too() {
        let mut scene = scene();
        let root = scene.root();
        let first = scene.create_box().unwrap();
        let second = scene.create_box().unwrap();
        let child = scene.create_box().unwrap();
        scene.append_child(root, first).unwrap();
        scene.append_child(root, second).unwrap();
        scene.append_child(first, child).unwrap();
        scene.append_child(second, child).unwrap();

        assert!(scene.node(first).unwrap().children().is_empty());
        assert_eq!(scene.node(second).unwrap().children(), &[child]);
        assert_eq!(scene.node(child).unwrap().parent(), Some(second));
        let first_handle = scene.node(first).unwrap().layout;
        let second_handle = scene.node(second).unwrap().layout;
        assert_eq!(scene.layout.child_count(first_handle), 0);
        assert_eq!(scene.layout.child_count(second_handle), 1);
    }

    #[test]
    fn destroy_requires_a_detached_node() {
        let mut scene = scene();
        let root = scene.root();
        let parent = scene.create_box().unwrap();
        let child = scene.create_text("x").unwrap();
        scene.append_child(root, parent).unwrap();
        scene.append_child(parent, child).unwrap();

        assert_eq!(scene.destroy(parent), Err(SceneError::NodeAttached(parent)));
        assert_eq!(scene.destroy(root), Err(SceneError::RootNode));
        assert_eq!(
            scene.remove_child(parent, root),
            Err(SceneError::NotAChild {
                parent,
                child: root
            })
        );

        scene.remove_child(root, parent).unwrap();
        scene.destroy(parent).unwrap();
        assert!(!scene.contains(parent));
        assert!(!scene.contains(child));
        assert_eq!(scene.node_count(), 1);
        assert_eq!(scene.destroy(parent), Err(SceneError::NodeNotFound(parent)));
    }

    #[test]
    fn shared_styles_track_their_nodes() {
        let mut scene = scene();
        let style = Style::new();
        let a = scene.create_box().unwrap();
        let b = scene.create_box().unwrap();
        scene.set_style(a, Some(style.clone())).unwrap();
        scene.set_style(b, Some(style.clone())).unwrap();
        assert_eq!(style.observer_count(), 2);

        scene.destroy(a).unwrap();
        assert_eq!(style.observer_count(), 1);
        scene.set_style(b, None).unwrap();
        assert_eq!(style.observer_count(), 0);
    }

    #[test]
    fn kind_specific_setters_check_the_node() {
        let mut scene = scene();
        let node = scene.create_box().unwrap();
        assert_eq!(
            scene.set_text(node, "x"),
            Err(SceneError::WrongNodeKind {
                node,
                expected: "text"
            })
        );
        assert_eq!(
            scene.set_image_src(node, Some("a.png")),
            Err(SceneError::WrongNodeKind {
                node,
                expected: "image"
            })
        );

        let image = scene.create_image().unwrap();
        assert_eq!(
            scene.set_image_src(image, Some("@alias")),
            Err(SceneError::ReservedUri("@alias".into()))
        );
        assert!(scene.images().is_empty());
    }
}
