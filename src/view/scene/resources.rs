use super::Scene;
use crate::resource::{
    FontId, ImageId, ImageRequest, ListenerOwner, ResourceListener, ResourceState,
};
use crate::style::{Style, StyleProperty};
use crate::view::scene_node::{
    BackgroundImage, FontQuery, NodeFlags, NodeId, NodeKind, resolve_text_style,
};
use smol_str::SmolStr;
use std::cell::RefCell;
use std::rc::Rc;

/// Terminal resource transitions observed by node listeners, applied by the scene at
/// the start of the next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResourceEvent {
    Image { node: NodeId, image: ImageId },
    Background { node: NodeId, image: ImageId },
    Font { node: NodeId, font: FontId },
}

pub(crate) type EventQueue = Rc<RefCell<Vec<ResourceEvent>>>;

pub(crate) fn image_listener(
    events: &EventQueue,
    node: NodeId,
    background: bool,
) -> ResourceListener<ImageId> {
    let events = events.clone();
    Box::new(move |image, _| {
        let event = if background {
            ResourceEvent::Background { node, image }
        } else {
            ResourceEvent::Image { node, image }
        };
        events.borrow_mut().push(event);
    })
}

pub(crate) fn font_listener(events: &EventQueue, node: NodeId) -> ResourceListener<FontId> {
    let events = events.clone();
    Box::new(move |font, _| events.borrow_mut().push(ResourceEvent::Font { node, font }))
}

impl Scene {
    /// Applies finished decodes and reacts to the listener events they produced.
    pub(super) fn poll_resources(&mut self) -> usize {
        let completed = self.images.poll() + self.fonts.poll();
        let events = std::mem::take(&mut *self.events.borrow_mut());
        for event in events {
            match event {
                ResourceEvent::Image { node, image } => self.on_image_event(node, image),
                ResourceEvent::Background { node, image } => self.on_background_event(node, image),
                ResourceEvent::Font { node, font } => self.on_font_event(node, font),
            }
        }
        completed
    }

    fn on_image_event(&mut self, id: NodeId, image: ImageId) {
        let state = self.images.state(image).cloned();
        let natural_size = self
            .images
            .image(image)
            .map(|decoded| (decoded.width, decoded.height));
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let handle = node.layout;
        let NodeKind::Image(image_node) = &mut node.kind else {
            return;
        };
        if image_node.image != Some(image) {
            return;
        }
        match state {
            Some(ResourceState::Ready) => {
                image_node.natural_size = natural_size;
                image_node.fire_load(id);
                node.mark(NodeFlags::PAINT_DIRTY | NodeFlags::COMPOSITE_DIRTY);
                self.layout.mark_dirty(handle);
            }
            Some(ResourceState::Error(err)) => {
                log::warn!("image {:?} failed: {err}", image_node.src);
                image_node.fire_error(id, &err);
            }
            _ => {}
        }
    }

    fn on_background_event(&mut self, id: NodeId, image: ImageId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let current = match &node.kind {
            NodeKind::Box(state) => state.background.as_ref().and_then(|bg| bg.image),
            _ => None,
        };
        if current != Some(image) {
            return;
        }
        if let Some(ResourceState::Error(err)) = self.images.state(image) {
            log::warn!("background image failed: {err}");
        }
        node.mark(NodeFlags::COMPOSITE_DIRTY);
    }

    fn on_font_event(&mut self, id: NodeId, font: FontId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let handle = node.layout;
        let NodeKind::Text(text) = &mut node.kind else {
            return;
        };
        if text.pending_font != Some(font) {
            return;
        }
        text.pending_font = None;
        text.block.invalidate();
        node.mark(NodeFlags::ALL_DIRTY);
        self.layout.mark_dirty(handle);
    }

    /// Acquires the image named by `BackgroundImage` when it differs from the one the
    /// box currently holds.
    pub(super) fn update_background(&mut self, id: NodeId, style: Option<&Style>) {
        let uri = style
            .and_then(|style| style.get::<SmolStr>(StyleProperty::BackgroundImage))
            .filter(|uri| !uri.is_empty());
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let NodeKind::Box(state) = &mut node.kind else {
            return;
        };
        if state.background.as_ref().map(|bg| &bg.uri) == uri.as_ref() {
            return;
        }

        let owner = ListenerOwner::from(id);
        if let Some(previous) = state.background.take().and_then(|bg| bg.image) {
            self.images.remove_listeners(previous, owner);
            self.images.release(previous, false);
        }
        state.background = uri.map(|uri| {
            let image = match self.images.safe_acquire(
                ImageRequest::new(uri.as_str()),
                owner,
                image_listener(&self.events, id, true),
            ) {
                Ok(image) => Some(image),
                Err(err) => {
                    log::warn!("background image rejected: {err}");
                    None
                }
            };
            BackgroundImage { uri, image }
        });
        node.mark(NodeFlags::PAINT_DIRTY | NodeFlags::COMPOSITE_DIRTY);
    }

    /// Resolves the text style and the face of a text node, listening for the face when
    /// it is still loading.
    pub(super) fn update_text(&mut self, id: NodeId, style: Option<&Style>) {
        let query = FontQuery::from_style(style, &self.config.default_font_family);
        let font = self.fonts.find(&query.family, query.style, query.weight);
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        let handle = node.layout;
        let text_style = resolve_text_style(style, &node.computed);
        let NodeKind::Text(text) = &mut node.kind else {
            return;
        };

        let mut changed = text.update_text_style(text_style);
        let previous = text.font;
        if text.update_font(font) {
            // Text nodes hold a counted reference on the face they render with.
            if let Some(font) = font {
                self.fonts.add_ref(font);
            }
            if let Some(previous) = previous {
                self.fonts.release(previous, false);
            }
            changed = true;
        }
        let loading = font.filter(|font| {
            matches!(
                self.fonts.state(*font),
                Some(ResourceState::Init | ResourceState::Loading)
            )
        });
        if loading.is_some() && text.pending_font != loading {
            let owner = ListenerOwner::from(id);
            if let Some(previous) = text.pending_font.take() {
                self.fonts.remove_listeners(previous, owner);
            }
            if let Some(font) = loading {
                text.pending_font = Some(font);
                self.fonts.listen(font, owner, font_listener(&self.events, id));
            }
        }
        if changed {
            node.mark(NodeFlags::PAINT_DIRTY | NodeFlags::COMPOSITE_DIRTY);
            self.layout.mark_dirty(handle);
        }
    }
}
