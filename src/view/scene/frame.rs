use super::Scene;
use crate::error::SceneError;
use crate::geometry::Rect;
use crate::resource::FontManager;
use crate::view::composite_context::CompositeContext;
use crate::view::layout::{pin_size, to_layout_style};
use crate::view::paintable::release_texture;
use crate::view::renderer::{RenderFilter, Renderer, Texture};
use crate::view::scene_node::{
    NodeFlags, NodeId, NodeKind, SceneNode, composite_decoration, fit_intrinsic, paint_decoration,
    visible_part,
};
use crate::view::text_block::{TextBlock, TextBlockState};
use glam::{Affine2, Vec2};
use slotmap::SlotMap;
use std::rc::Rc;
use taffy::Size;

/// Work done by one [`Scene::frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Resource loads that reached a terminal state.
    pub resources_completed: usize,
    pub media_changed: bool,
    pub style_computed: usize,
    /// Nodes whose layout box moved or resized.
    pub layout_changed: usize,
    pub painted: usize,
    pub composited: usize,
}

impl FrameStats {
    /// No style, layout or paint work was needed.
    pub fn is_idle(&self) -> bool {
        self.style_computed == 0 && self.layout_changed == 0 && self.painted == 0
    }
}

impl Scene {
    /// Runs one frame: resource handoff, style changes, media change, compute-style,
    /// layout, paint, composite, then deferred resource deletion. Paint and composite
    /// are skipped while no renderer is attached.
    pub fn frame(&mut self) -> Result<FrameStats, SceneError> {
        let mut stats = FrameStats {
            resources_completed: self.poll_resources(),
            ..FrameStats::default()
        };
        self.apply_style_changes();
        stats.media_changed = self.dispatch_media_change();
        stats.style_computed = self.compute_style_pass()?;
        stats.layout_changed = self.layout_pass()?;

        if let Some(renderer) = self.renderer.clone() {
            let mut renderer = renderer.borrow_mut();
            stats.painted = self.paint_pass(&mut *renderer)?;
            stats.composited = self.composite_pass(&mut *renderer);
        }

        self.images.compact();
        self.fonts.compact();
        self.frame_count += 1;
        self.last_stats = stats;
        log::trace!("frame {}: {stats:?}", self.frame_count);
        Ok(stats)
    }

    fn apply_style_changes(&mut self) {
        for change in self.style_changes.take() {
            let Some(node) = self.nodes.get_mut(change.node) else {
                continue;
            };
            node.mark(NodeFlags::COMPUTE_STYLE_DIRTY);
            if change.layout {
                if let NodeKind::Text(text) = &mut node.kind {
                    text.block.invalidate();
                }
            }
        }
    }

    /// Pushes viewport and root font size into the style context. A change restyles the
    /// whole tree.
    fn dispatch_media_change(&mut self) -> bool {
        let (width, height) = self.viewport;
        let mut changed = self.style_context.viewport_width() != width
            || self.style_context.viewport_height() != height;
        self.style_context.set_viewport_size(width, height);

        let root_style = self.nodes.get(self.root).and_then(|node| node.style.clone());
        let root_font_size = self
            .style_context
            .compute_root_font_size(root_style.as_deref(), self.config.root_font_size);
        if self.style_context.root_font_size() != root_font_size {
            self.style_context.set_root_font_size(root_font_size);
            changed = true;
        }

        if changed {
            log::debug!("media change: viewport {width}x{height}, root font {root_font_size}");
            if let Some(root) = self.nodes.get_mut(self.root) {
                root.mark(NodeFlags::COMPUTE_STYLE_DIRTY);
            }
        }
        changed
    }

    fn compute_style_pass(&mut self) -> Result<usize, SceneError> {
        fn walk(
            nodes: &SlotMap<NodeId, SceneNode>,
            id: NodeId,
            parent_dirty: bool,
            out: &mut Vec<NodeId>,
        ) {
            let Some(node) = nodes.get(id) else {
                return;
            };
            let dirty = parent_dirty || node.flags.contains(NodeFlags::COMPUTE_STYLE_DIRTY);
            if dirty {
                out.push(id);
            }
            for child in &node.children {
                walk(nodes, *child, dirty, out);
            }
        }

        let mut order = Vec::new();
        walk(&self.nodes, self.root, false, &mut order);
        for id in &order {
            self.compute_node_style(*id)?;
        }
        Ok(order.len())
    }

    fn compute_node_style(&mut self, id: NodeId) -> Result<(), SceneError> {
        let ctx = self.style_context;
        let is_root = id == self.root;
        let Some(node) = self.nodes.get_mut(id) else {
            return Ok(());
        };
        node.flags.remove(NodeFlags::COMPUTE_STYLE_DIRTY);
        let style = node.style.clone();
        let style = style.as_deref();

        let computed = ctx.compute_style(style, node.layout_box.size());
        let z_changed = computed.z_index != node.computed.z_index;
        if computed != node.computed {
            if computed.paint_differs(&node.computed) {
                node.mark(NodeFlags::PAINT_DIRTY);
            }
            node.computed = computed;
            node.mark(NodeFlags::COMPOSITE_DIRTY);
        }

        let mut layout_style = to_layout_style(style, &ctx, node.is_hidden());
        if is_root {
            pin_size(&mut layout_style, ctx.viewport_width(), ctx.viewport_height());
        }
        let handle = node.layout;
        let parent = node.parent;
        let is_box = matches!(node.kind, NodeKind::Box(_));
        let is_text = matches!(node.kind, NodeKind::Text(_));
        if self.layout.style(handle) != Some(&layout_style) {
            self.layout.set_style(handle, layout_style)?;
        }
        if z_changed {
            if let Some(parent) = parent.and_then(|parent| self.nodes.get_mut(parent)) {
                parent.invalidate_z_order();
            }
        }

        if is_box {
            self.update_background(id, style);
        } else if is_text {
            self.update_text(id, style);
        }
        Ok(())
    }

    /// Lays out the tree and copies changed boxes back into the nodes, marking them for
    /// paint and composite.
    fn layout_pass(&mut self) -> Result<usize, SceneError> {
        let root = self
            .nodes
            .get(self.root)
            .ok_or(SceneError::NodeNotFound(self.root))?
            .layout;
        let (width, height) = self.viewport;
        let Self {
            layout,
            nodes,
            fonts,
            ..
        } = self;
        layout.compute(root, width, height, |owner, known, available| {
            measure_node(nodes, fonts, owner, known, available)
        })?;

        let ctx = self.style_context;
        let mut changed = 0;
        for (_, node) in self.nodes.iter_mut() {
            let Some(layout_box) = self.layout.layout(node.layout) else {
                continue;
            };
            if layout_box == node.layout_box {
                continue;
            }
            let resized = layout_box.rect.width != node.layout_box.rect.width
                || layout_box.rect.height != node.layout_box.rect.height;
            node.layout_box = layout_box;
            node.mark(NodeFlags::PAINT_DIRTY | NodeFlags::COMPOSITE_DIRTY);
            if resized {
                let style = node.style.as_deref();
                let bounds = layout_box.size();
                node.computed.transform = ctx.compute_transform(style, bounds);
                node.computed.border_radius = ctx.compute_border_radius(style, bounds);
                if let NodeKind::Text(text) = &mut node.kind {
                    text.block.invalidate();
                }
            }
            changed += 1;
        }
        Ok(changed)
    }

    fn paint_pass(&mut self, renderer: &mut dyn Renderer) -> Result<usize, SceneError> {
        let order = self.visible_nodes();
        let mut painted = 0;
        for id in order {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            if !node.flags.contains(NodeFlags::PAINT_DIRTY) {
                continue;
            }
            node.flags.remove(NodeFlags::PAINT_DIRTY);
            let layout_only = node.is_layout_only();
            match &mut node.kind {
                NodeKind::Root(_) | NodeKind::Box(_) => {
                    if layout_only {
                        release_texture(renderer, &mut node.layer);
                    } else {
                        paint_decoration(renderer, &mut node.layer, &node.computed, &node.layout_box)?;
                    }
                }
                NodeKind::Text(text) => {
                    if layout_only {
                        text.block.release_texture(renderer);
                    } else {
                        if text.block.state() != TextBlockState::Shaped {
                            let face = text.font.zip(text.text_style).and_then(|(font, style)| {
                                self.fonts.face(font).map(|face| (font, face, style))
                            });
                            match face {
                                Some((font, face, style)) => {
                                    // Layout arithmetic can lose a fraction of a pixel.
                                    let content = node.layout_box.content_rect();
                                    text.block.shape(
                                        &text.text,
                                        face,
                                        font,
                                        &style,
                                        content.width + 0.5,
                                        content.height + 0.5,
                                    );
                                }
                                None => text.block.clear(Some(&mut *renderer)),
                            }
                        }
                        text.block.paint(renderer)?;
                    }
                }
                NodeKind::Image(_) => {}
            }
            painted += 1;
        }
        Ok(painted)
    }

    /// Pre-order list of nodes reachable from the root without crossing a hidden node.
    fn visible_nodes(&self) -> Vec<NodeId> {
        fn walk(nodes: &SlotMap<NodeId, SceneNode>, id: NodeId, out: &mut Vec<NodeId>) {
            let Some(node) = nodes.get(id) else {
                return;
            };
            if node.is_hidden() {
                return;
            }
            out.push(id);
            for child in &node.children {
                walk(nodes, *child, out);
            }
        }

        let mut out = Vec::with_capacity(self.nodes.len());
        walk(&self.nodes, self.root, &mut out);
        out
    }

    fn composite_pass(&mut self, renderer: &mut dyn Renderer) -> usize {
        let clear = self
            .nodes
            .get(self.root)
            .and_then(|node| match &node.kind {
                NodeKind::Root(root) => Some(root.effective_clear_color(node.computed.background_color)),
                _ => None,
            })
            .unwrap_or(self.config.clear_color);
        renderer.clear(clear);

        self.composite.reset();
        let mut composited = 0;
        self.composite_node(self.root, renderer, &mut composited);
        debug_assert!(self.composite.is_balanced(), "unbalanced composite stacks");
        renderer.present();
        composited
    }

    fn composite_node(&mut self, id: NodeId, renderer: &mut dyn Renderer, composited: &mut usize) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        if node.is_hidden() {
            return;
        }
        let rect = node.layout_box.rect;
        let local = Affine2::from_translation(Vec2::new(rect.x, rect.y))
            * node.computed.transform.unwrap_or(Affine2::IDENTITY);
        let opacity = node.computed.opacity;
        let clip = node
            .computed
            .overflow_hidden
            .then(|| node.layout_box.padding_rect());
        let draws = !node.is_layout_only();

        self.composite.push_matrix(local);
        if draws && !self.composite.is_culled() {
            self.draw_node(id, renderer);
        }
        self.composite.push_opacity(opacity);
        if let Some(clip) = clip {
            let device = self.composite.push_clip(clip);
            renderer.enable_clipping(device);
        }

        if !self.composite.is_culled() {
            let children = self.z_ordered_children(id);
            for child in children.iter() {
                self.composite_node(*child, renderer, composited);
            }
        }

        if clip.is_some() {
            self.composite.pop_clip();
            restore_clip(&self.composite, renderer);
        }
        self.composite.pop_opacity();
        self.composite.pop_matrix();
        if let Some(node) = self.nodes.get_mut(id) {
            node.flags.remove(NodeFlags::COMPOSITE_DIRTY);
        }
        *composited += 1;
    }

    /// Children of `id` ordered by z-index; equal z-indices keep tree order.
    pub(crate) fn z_ordered_children(&mut self, id: NodeId) -> Rc<[NodeId]> {
        let Some(node) = self.nodes.get(id) else {
            return Rc::from([]);
        };
        if let Some(order) = node.cached_z_order() {
            return order;
        }
        let mut children = node.children.clone();
        children.sort_by_key(|child| self.nodes.get(*child).map_or(0, |node| node.computed.z_index));
        let order: Rc<[NodeId]> = children.into();
        if let Some(node) = self.nodes.get_mut(id) {
            node.z_order = Some(order.clone());
        }
        order
    }

    fn draw_node(&mut self, id: NodeId, renderer: &mut dyn Renderer) {
        let Self {
            nodes,
            images,
            composite,
            style_context,
            ..
        } = self;
        let Some(node) = nodes.get(id) else {
            return;
        };
        let transform = composite.matrix();
        let opacity = composite.opacity();
        let style = node.style.as_deref();
        let filter = node.computed.filter.with_opacity(opacity);

        match &node.kind {
            NodeKind::Root(_) => {}
            NodeKind::Box(state) => {
                composite_decoration(
                    renderer,
                    &transform,
                    node.layer.as_ref(),
                    &node.computed,
                    &node.layout_box,
                    opacity,
                );
                let texture = state
                    .background
                    .as_ref()
                    .and_then(|bg| bg.image)
                    .and_then(|image| images.texture(image));
                if let Some(texture) = texture {
                    let bounds = node.layout_box.padding_rect();
                    let dest = style_context.compute_background_fit(
                        style,
                        bounds,
                        texture.width() as f32,
                        texture.height() as f32,
                    );
                    draw_fitted(composite, renderer, texture, dest, bounds, &filter);
                }
            }
            NodeKind::Image(state) => {
                let Some(texture) = state.image.and_then(|image| images.texture(image)) else {
                    return;
                };
                let bounds = node.layout_box.content_rect();
                let dest = style_context.compute_object_fit(
                    style,
                    bounds,
                    texture.width() as f32,
                    texture.height() as f32,
                );
                draw_fitted(composite, renderer, texture, dest, bounds, &filter);
            }
            NodeKind::Text(text) => {
                let Some(texture) = text.block.texture() else {
                    return;
                };
                let content = node.layout_box.content_rect();
                let dest = Rect::new(
                    content.x,
                    content.y,
                    texture.width() as f32,
                    texture.height() as f32,
                );
                renderer.draw_image(&transform, dest, texture.bounds(), texture, &filter);
            }
        }
    }
}

/// Draws `texture` into `dest`, clipping to `bounds` when the fitted image spills out.
fn draw_fitted(
    composite: &mut CompositeContext,
    renderer: &mut dyn Renderer,
    texture: &Texture,
    dest: Rect,
    bounds: Rect,
    filter: &RenderFilter,
) {
    let Some(visible) = visible_part(dest, bounds) else {
        return;
    };
    let transform = composite.matrix();
    if visible == dest {
        renderer.draw_image(&transform, dest, texture.bounds(), texture, filter);
        return;
    }
    let clip = composite.push_clip(bounds);
    renderer.enable_clipping(clip);
    renderer.draw_image(&transform, dest, texture.bounds(), texture, filter);
    composite.pop_clip();
    restore_clip(composite, renderer);
}

fn restore_clip(composite: &CompositeContext, renderer: &mut dyn Renderer) {
    match composite.clip() {
        Some(clip) => renderer.enable_clipping(clip),
        None => renderer.disable_clipping(),
    }
}

/// Intrinsic size of a leaf for the layout engine.
fn measure_node(
    nodes: &SlotMap<NodeId, SceneNode>,
    fonts: &FontManager,
    owner: NodeId,
    known: Size<Option<f32>>,
    available: Size<f32>,
) -> Size<f32> {
    let Some(node) = nodes.get(owner) else {
        return Size::ZERO;
    };
    let (width, height) = match &node.kind {
        NodeKind::Text(text) => {
            let face = text.font.and_then(|font| fonts.face(font));
            match (face, text.text_style) {
                (Some(face), Some(style)) => {
                    let (width, height) = TextBlock::measure(
                        &text.text,
                        face,
                        &style,
                        known.width.unwrap_or(available.width),
                        known.height.unwrap_or(f32::INFINITY),
                    );
                    (known.width.unwrap_or(width), known.height.unwrap_or(height))
                }
                _ => (known.width.unwrap_or(0.0), known.height.unwrap_or(0.0)),
            }
        }
        NodeKind::Image(image) => fit_intrinsic(image.intrinsic_size(), known.width, known.height),
        NodeKind::Root(_) | NodeKind::Box(_) => {
            (known.width.unwrap_or(0.0), known.height.unwrap_or(0.0))
        }
    };
    Size { width, height }
}

#[cfg(test)]
mod tests {
    use super::super::testing::scene;
    use super::super::Scene;
    use crate::error::ResourceError;
    use crate::geometry::Rect;
    use crate::resource::FontRequest;
    use crate::style::{
        AlignItems, Color, ObjectFit, Overflow, Style, StyleProperty, StyleTransform, StyleValue,
    };
    use crate::view::{DrawCommand, NodeId, NodeKind, RecordingRenderer};
    use glam::Vec2;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    fn attach(scene: &mut Scene) -> Rc<RefCell<RecordingRenderer>> {
        let renderer = Rc::new(RefCell::new(RecordingRenderer::new()));
        scene.attach_renderer(renderer.clone());
        renderer
    }

    fn sized_box(scene: &mut Scene, color: Color) -> (NodeId, Rc<Style>) {
        let style = Style::new();
        style.set(StyleProperty::Width, StyleValue::point(50.0)).unwrap();
        style.set(StyleProperty::Height, StyleValue::point(20.0)).unwrap();
        style.set(StyleProperty::BackgroundColor, color).unwrap();
        let node = scene.create_box().unwrap();
        scene.set_style(node, Some(style.clone())).unwrap();
        scene.append_child(scene.root(), node).unwrap();
        (node, style)
    }

    fn start_aligned_root(scene: &mut Scene) {
        let style = Style::new();
        style.set(StyleProperty::AlignItems, AlignItems::Start).unwrap();
        scene.set_style(scene.root(), Some(style)).unwrap();
    }

    fn fill_colors(commands: &[DrawCommand]) -> Vec<Color> {
        commands
            .iter()
            .filter_map(|command| match command {
                DrawCommand::FillRect { color, .. } => Some(*color),
                _ => None,
            })
            .collect()
    }

    fn image_of(scene: &Scene, node: NodeId) -> crate::resource::ImageId {
        match scene.node(node).unwrap().kind() {
            NodeKind::Image(image) => image.image().unwrap(),
            other => panic!("not an image node: {}", other.name()),
        }
    }

    #[test]
    fn second_frame_is_idle() {
        let mut scene = scene();
        let renderer = attach(&mut scene);
        sized_box(&mut scene, Color::rgb(255, 0, 0));

        let first = scene.frame().unwrap();
        assert_eq!(first.style_computed, 2);
        assert!(first.painted > 0);
        assert_eq!(first.composited, 2);

        let second = scene.frame().unwrap();
        assert!(second.is_idle());
        assert_eq!(second.painted, 0);
        assert_eq!(scene.frame_count(), 2);
        assert_eq!(scene.last_stats(), second);

        // Composite still runs every frame.
        let commands = renderer.borrow_mut().take_commands();
        assert_eq!(fill_colors(&commands).len(), 2);
        assert!(matches!(commands.last(), Some(DrawCommand::Present)));
    }

    #[test]
    fn headless_frames_skip_paint() {
        let mut scene = scene();
        let (node, _) = sized_box(&mut scene, Color::rgb(255, 0, 0));
        let stats = scene.frame().unwrap();
        assert_eq!(stats.painted, 0);
        assert_eq!(stats.composited, 0);
        assert_eq!(
            scene.node(node).unwrap().layout_box().rect,
            Rect::new(0.0, 0.0, 50.0, 20.0)
        );
    }

    #[test]
    fn children_composite_by_z_index() {
        let mut scene = scene();
        let renderer = attach(&mut scene);
        let red = Color::rgb(255, 0, 0);
        let blue = Color::rgb(0, 0, 255);
        let (_, front) = sized_box(&mut scene, red);
        sized_box(&mut scene, blue);
        front.set(StyleProperty::ZIndex, 1).unwrap();

        scene.frame().unwrap();
        assert_eq!(fill_colors(&renderer.borrow_mut().take_commands()), [blue, red]);

        front.set(StyleProperty::ZIndex, 0).unwrap();
        scene.frame().unwrap();
        assert_eq!(fill_colors(&renderer.borrow_mut().take_commands()), [red, blue]);
    }

    #[test]
    fn opacity_changes_only_recomposite() {
        let mut scene = scene();
        let renderer = attach(&mut scene);
        let (_, style) = sized_box(&mut scene, Color::rgb(255, 0, 0));
        scene.frame().unwrap();
        renderer.borrow_mut().take_commands();

        style.set(StyleProperty::Opacity, StyleValue::percent(50.0)).unwrap();
        let stats = scene.frame().unwrap();
        assert_eq!(stats.style_computed, 1);
        assert_eq!(stats.layout_changed, 0);
        assert_eq!(stats.painted, 0);
        let colors = fill_colors(&renderer.borrow_mut().take_commands());
        assert_eq!(colors.len(), 1);
        assert_eq!(colors[0].alpha(), 128);
    }

    #[test]
    fn viewport_change_restyles_everything() {
        let mut scene = scene();
        sized_box(&mut scene, Color::rgb(255, 0, 0));
        scene.frame().unwrap();

        scene.set_viewport_size(300.0, 120.0);
        let stats = scene.frame().unwrap();
        assert!(stats.media_changed);
        assert_eq!(stats.style_computed, 2);
        assert_eq!(scene.viewport_size(), (300.0, 120.0));
        let root = scene.node(scene.root()).unwrap();
        assert_eq!(root.layout_box().rect, Rect::new(0.0, 0.0, 300.0, 120.0));

        assert!(!scene.frame().unwrap().media_changed);
    }

    #[test]
    fn loaded_image_sizes_its_node() {
        let mut scene = scene();
        let renderer = attach(&mut scene);
        start_aligned_root(&mut scene);
        let node = scene.create_image().unwrap();
        scene.append_child(scene.root(), node).unwrap();
        let loaded = Rc::new(Cell::new(None::<NodeId>));
        let seen = loaded.clone();
        scene
            .on_load(node, Some(Box::new(move |id: NodeId| seen.set(Some(id)))))
            .unwrap();
        scene.set_image_src(node, Some("a.png")).unwrap();

        let image = image_of(&scene, node);
        assert!(scene.images_mut().wait_for(image, WAIT));
        scene.frame().unwrap();

        assert_eq!(loaded.get(), Some(node));
        let state = scene.node(node).unwrap();
        assert_eq!(state.layout_box().rect, Rect::new(0.0, 0.0, 40.0, 20.0));
        let commands = renderer.borrow().commands().to_vec();
        assert!(commands.iter().any(|command| matches!(
            command,
            DrawCommand::DrawImage { dest, .. } if dest.width == 40.0 && dest.height == 20.0
        )));
    }

    #[test]
    fn failed_image_reports_its_error() {
        let mut scene = scene();
        let node = scene.create_image().unwrap();
        scene.append_child(scene.root(), node).unwrap();
        let failure = Rc::new(RefCell::new(None::<ResourceError>));
        let seen = failure.clone();
        scene
            .on_error(
                node,
                Some(Box::new(move |_: NodeId, err: &ResourceError| {
                    *seen.borrow_mut() = Some(err.clone());
                })),
            )
            .unwrap();
        scene.set_image_src(node, Some("gone.missing")).unwrap();

        let image = image_of(&scene, node);
        assert!(scene.images_mut().wait_for(image, WAIT));
        scene.frame().unwrap();

        assert!(matches!(&*failure.borrow(), Some(ResourceError::Io(_))));
        assert_eq!(scene.node(node).unwrap().layout_box().rect.height, 0.0);
    }

    #[test]
    fn hidden_nodes_are_not_drawn() {
        let mut scene = scene();
        let renderer = attach(&mut scene);
        let red = Color::rgb(255, 0, 0);
        let blue = Color::rgb(0, 0, 255);
        let (hidden, _) = sized_box(&mut scene, red);
        let (shown, _) = sized_box(&mut scene, blue);
        scene.set_hidden(hidden, true).unwrap();

        scene.frame().unwrap();
        assert_eq!(fill_colors(&renderer.borrow_mut().take_commands()), [blue]);
        // Hidden nodes take no space.
        assert_eq!(scene.node(shown).unwrap().layout_box().rect.y, 0.0);

        scene.set_hidden(hidden, false).unwrap();
        scene.frame().unwrap();
        assert_eq!(fill_colors(&renderer.borrow_mut().take_commands()), [red, blue]);
        assert_eq!(scene.node(shown).unwrap().layout_box().rect.y, 20.0);
    }

    #[test]
    fn overflow_hidden_clips_children() {
        let mut scene = scene();
        let renderer = attach(&mut scene);
        let (parent, style) = sized_box(&mut scene, Color::rgb(255, 0, 0));
        style.set(StyleProperty::Overflow, Overflow::Hidden).unwrap();
        let child = scene.create_box().unwrap();
        let child_style = Style::new();
        child_style.set(StyleProperty::Height, StyleValue::point(80.0)).unwrap();
        child_style
            .set(StyleProperty::BackgroundColor, Color::rgb(0, 255, 0))
            .unwrap();
        scene.set_style(child, Some(child_style)).unwrap();
        scene.append_child(parent, child).unwrap();

        scene.frame().unwrap();
        let commands = renderer.borrow_mut().take_commands();
        let enable = commands
            .iter()
            .position(|command| {
                *command == DrawCommand::EnableClipping(Rect::new(0.0, 0.0, 50.0, 20.0))
            })
            .unwrap();
        let fill = commands
            .iter()
            .rposition(|command| matches!(command, DrawCommand::FillRect { .. }))
            .unwrap();
        let disable = commands
            .iter()
            .position(|command| *command == DrawCommand::DisableClipping)
            .unwrap();
        assert!(enable < fill && fill < disable);
    }

    #[test]
    fn text_paints_once_its_font_is_ready() {
        let mut scene = scene();
        let renderer = attach(&mut scene);
        let node = scene.create_text("hello world").unwrap();
        scene.append_child(scene.root(), node).unwrap();
        let font = scene
            .load_font(FontRequest::memory("test", "Test", vec![0u8; 4]))
            .unwrap();
        assert!(scene.fonts_mut().wait_for(font, WAIT));
        scene.frame().unwrap();

        let NodeKind::Text(text) = scene.node(node).unwrap().kind() else {
            panic!("not a text node");
        };
        assert_eq!(text.font(), Some(font));
        let texture = text.block().texture().unwrap();
        assert_eq!((texture.width(), texture.height()), (88, 20));
        assert_eq!(renderer.borrow().draw_image_count(), 1);

        scene.set_text(node, "hi").unwrap();
        scene.frame().unwrap();
        let NodeKind::Text(text) = scene.node(node).unwrap().kind() else {
            panic!("not a text node");
        };
        assert_eq!(text.block().texture().unwrap().width(), 16);
    }

    #[test]
    fn detach_releases_every_texture() {
        let mut scene = scene();
        let renderer = attach(&mut scene);
        start_aligned_root(&mut scene);
        let (_, style) = sized_box(&mut scene, Color::rgb(255, 0, 0));
        style.set(StyleProperty::FlexShrink, StyleValue::point(0.0)).unwrap();
        style.set(StyleProperty::BorderRadius, StyleValue::point(4.0)).unwrap();
        let image = scene.create_image().unwrap();
        scene.append_child(scene.root(), image).unwrap();
        scene.set_image_src(image, Some("a.png")).unwrap();
        let id = image_of(&scene, image);
        assert!(scene.images_mut().wait_for(id, WAIT));
        scene.frame().unwrap();
        assert_eq!(renderer.borrow().live_textures(), 2);

        scene.detach_renderer();
        assert!(!scene.is_renderer_attached());
        assert_eq!(renderer.borrow().live_textures(), 0);
        scene.detach_renderer();

        let renderer = attach(&mut scene);
        let stats = scene.frame().unwrap();
        assert!(stats.painted > 0);
        assert_eq!(renderer.borrow().live_textures(), 2);
    }

    #[test]
    fn destroyed_images_are_released_after_the_frame() {
        let mut scene = scene();
        let renderer = attach(&mut scene);
        let node = scene.create_image().unwrap();
        scene.append_child(scene.root(), node).unwrap();
        scene.set_image_src(node, Some("a.png")).unwrap();
        let image = image_of(&scene, node);
        assert!(scene.images_mut().wait_for(image, WAIT));
        scene.frame().unwrap();
        assert_eq!(renderer.borrow().live_textures(), 1);

        scene.remove_child(scene.root(), node).unwrap();
        scene.destroy(node).unwrap();
        assert_eq!(scene.images().len(), 1);
        scene.frame().unwrap();
        assert!(scene.images().is_empty());
        assert_eq!(renderer.borrow().live_textures(), 0);
    }

    #[test]
    fn released_font_falls_back_to_another_face() {
        let mut scene = scene();
        let renderer = attach(&mut scene);
        let node = scene.create_text("hello").unwrap();
        scene.append_child(scene.root(), node).unwrap();
        let regular = scene
            .load_font(FontRequest::memory("regular", "Test", vec![0u8; 4]))
            .unwrap();
        let bold = scene
            .load_font(FontRequest::memory("bold", "Test", vec![0u8; 4]).weight(700))
            .unwrap();
        assert!(scene.fonts_mut().wait_for(regular, WAIT));
        assert!(scene.fonts_mut().wait_for(bold, WAIT));
        scene.frame().unwrap();

        let font_of = |scene: &Scene| match scene.node(node).unwrap().kind() {
            NodeKind::Text(text) => text.font(),
            other => panic!("not a text node: {}", other.name()),
        };
        assert_eq!(font_of(&scene), Some(regular));
        // The loader's reference plus the node's.
        assert_eq!(scene.fonts().ref_count(regular), 2);

        assert!(scene.release_font(regular));
        assert!(!scene.release_font(regular));
        assert!(scene.frame().unwrap().style_computed > 0);
        assert_eq!(font_of(&scene), Some(bold));
        assert!(scene.fonts().face(regular).is_none());
        assert_eq!(scene.fonts().ref_count(bold), 2);

        assert_eq!(scene.frame().unwrap().style_computed, 0);
        assert_eq!(font_of(&scene), Some(bold));
        let NodeKind::Text(text) = scene.node(node).unwrap().kind() else {
            panic!("not a text node");
        };
        assert!(text.block().texture().is_some());
        assert!(renderer.borrow().draw_image_count() > 0);
    }

    #[test]
    fn text_nodes_release_their_face_when_destroyed() {
        let mut scene = scene();
        let node = scene.create_text("x").unwrap();
        scene.append_child(scene.root(), node).unwrap();
        let font = scene
            .load_font(FontRequest::memory("regular", "Test", vec![0u8; 4]))
            .unwrap();
        assert!(scene.fonts_mut().wait_for(font, WAIT));
        scene.frame().unwrap();
        assert_eq!(scene.fonts().ref_count(font), 2);

        scene.remove_child(scene.root(), node).unwrap();
        scene.destroy(node).unwrap();
        assert_eq!(scene.fonts().ref_count(font), 1);
    }

    #[test]
    fn shared_image_outlives_one_of_its_nodes() {
        let mut scene = scene();
        let renderer = attach(&mut scene);
        start_aligned_root(&mut scene);
        let first = scene.create_image().unwrap();
        let second = scene.create_image().unwrap();
        for node in [first, second] {
            scene.append_child(scene.root(), node).unwrap();
            scene.set_image_src(node, Some("a.png")).unwrap();
        }
        let image = image_of(&scene, first);
        assert_eq!(image_of(&scene, second), image);
        assert!(scene.images_mut().wait_for(image, WAIT));
        scene.frame().unwrap();
        assert_eq!(scene.images().ref_count(image), 2);

        scene.remove_child(scene.root(), first).unwrap();
        scene.destroy(first).unwrap();
        renderer.borrow_mut().take_commands();
        scene.frame().unwrap();

        assert_eq!(scene.images().ref_count(image), 1);
        assert!(scene.images().texture(image).is_some());
        assert_eq!(renderer.borrow().draw_image_count(), 1);
        assert_eq!(
            scene.node(second).unwrap().layout_box().rect,
            Rect::new(0.0, 0.0, 40.0, 20.0)
        );
    }

    #[test]
    fn fitted_images_follow_a_transformed_clipping_parent() {
        let mut scene = scene();
        let renderer = attach(&mut scene);
        start_aligned_root(&mut scene);

        let parent_style = Style::new();
        for (property, value) in [
            (StyleProperty::Width, 100.0),
            (StyleProperty::Height, 60.0),
            (StyleProperty::MarginLeft, 30.0),
            (StyleProperty::MarginTop, 10.0),
        ] {
            parent_style.set(property, StyleValue::point(value)).unwrap();
        }
        parent_style.set(StyleProperty::Overflow, Overflow::Hidden).unwrap();
        parent_style
            .set(
                StyleProperty::Transform,
                vec![StyleTransform::translate(
                    StyleValue::point(10.0),
                    StyleValue::point(5.0),
                )],
            )
            .unwrap();
        let parent = scene.create_box().unwrap();
        scene.set_style(parent, Some(parent_style)).unwrap();
        scene.append_child(scene.root(), parent).unwrap();

        // Cover-fit image wider than its box, offset inside the parent.
        let image_style = Style::new();
        for (property, value) in [
            (StyleProperty::Width, 20.0),
            (StyleProperty::Height, 20.0),
            (StyleProperty::MarginLeft, 15.0),
            (StyleProperty::MarginTop, 8.0),
        ] {
            image_style.set(property, StyleValue::point(value)).unwrap();
        }
        image_style.set(StyleProperty::ObjectFit, ObjectFit::Cover).unwrap();
        let image = scene.create_image().unwrap();
        scene.set_style(image, Some(image_style)).unwrap();
        scene.append_child(parent, image).unwrap();
        scene.set_image_src(image, Some("a.png")).unwrap();

        let background_style = Style::new();
        for (property, value) in [
            (StyleProperty::Width, 40.0),
            (StyleProperty::Height, 20.0),
            (StyleProperty::MarginLeft, 12.0),
        ] {
            background_style.set(property, StyleValue::point(value)).unwrap();
        }
        background_style
            .set(StyleProperty::BackgroundImage, "a.png")
            .unwrap();
        let background = scene.create_box().unwrap();
        scene.set_style(background, Some(background_style)).unwrap();
        scene.append_child(parent, background).unwrap();

        scene.frame().unwrap();
        let id = image_of(&scene, image);
        assert!(scene.images_mut().wait_for(id, WAIT));
        renderer.borrow_mut().take_commands();
        scene.frame().unwrap();
        let commands = renderer.borrow_mut().take_commands();

        let parent_clip = DrawCommand::EnableClipping(Rect::new(40.0, 15.0, 100.0, 60.0));
        let image_clip = DrawCommand::EnableClipping(Rect::new(55.0, 23.0, 20.0, 20.0));
        let draws: Vec<_> = commands
            .iter()
            .enumerate()
            .filter_map(|(index, command)| match command {
                DrawCommand::DrawImage {
                    transform, dest, ..
                } => Some((index, transform.translation, *dest)),
                _ => None,
            })
            .collect();
        assert_eq!(draws.len(), 2);

        let (image_index, image_offset, image_dest) = draws[0];
        assert!(image_offset.abs_diff_eq(Vec2::new(55.0, 23.0), 1e-4));
        assert_eq!(image_dest, Rect::new(-10.0, 0.0, 40.0, 20.0));
        assert_eq!(commands[image_index - 1], image_clip);
        assert_eq!(commands[image_index + 1], parent_clip);

        let (background_index, background_offset, background_dest) = draws[1];
        assert!(background_offset.abs_diff_eq(Vec2::new(52.0, 43.0), 1e-4));
        assert_eq!(background_dest, Rect::new(0.0, 0.0, 40.0, 20.0));
        assert_eq!(commands[background_index + 1], DrawCommand::DisableClipping);
        assert!(commands[..image_index].contains(&parent_clip));
    }
}
