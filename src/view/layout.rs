use super::scene_node::NodeId;
use crate::error::SceneError;
use crate::geometry::{Edges, Rect};
use crate::style::{
    AlignItems, Display, FlexDirection, FlexWrap, JustifyContent, Position, Style, StyleContext,
    StyleProperty, StyleUnit, StyleValue,
};
use taffy::prelude::{AvailableSpace, Dimension, LengthPercentage, LengthPercentageAuto, TaffyTree, auto, length, percent};
use taffy::{Size, TaffyError, TraversePartialTree};

/// Handle of a node inside the flexbox engine.
pub type LayoutHandle = taffy::NodeId;

impl From<TaffyError> for SceneError {
    fn from(err: TaffyError) -> Self {
        SceneError::Layout(err.to_string())
    }
}

/// Computed box of a node, relative to its parent's border box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutBox {
    pub rect: Rect,
    pub padding: Edges,
    pub border: Edges,
}

impl LayoutBox {
    pub fn size(&self) -> Rect {
        Rect::from_size(self.rect.width, self.rect.height)
    }

    /// Content box in the node's own coordinate space.
    pub fn content_rect(&self) -> Rect {
        self.padding_rect().inset(&self.padding)
    }

    /// Padding box in the node's own coordinate space.
    pub fn padding_rect(&self) -> Rect {
        self.size().inset(&self.border)
    }
}

/// Flexbox tree mirroring the scene tree. Every layout node carries the [`NodeId`] of
/// the scene node that owns it.
pub struct LayoutTree {
    tree: TaffyTree<NodeId>,
}

impl Default for LayoutTree {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutTree {
    pub fn new() -> Self {
        let mut tree = TaffyTree::new();
        // Text is shaped against the exact measured box.
        tree.disable_rounding();
        Self { tree }
    }

    pub fn create(&mut self) -> Result<LayoutHandle, SceneError> {
        Ok(self.tree.new_leaf(taffy::Style::default())?)
    }

    /// Stores the back-pointer measurement callbacks use to find the scene node.
    pub fn set_owner(&mut self, handle: LayoutHandle, owner: NodeId) -> Result<(), SceneError> {
        Ok(self.tree.set_node_context(handle, Some(owner))?)
    }

    pub fn remove(&mut self, handle: LayoutHandle) {
        if let Err(err) = self.tree.remove(handle) {
            log::warn!("layout node removal failed: {err}");
        }
    }

    pub fn insert_child(
        &mut self,
        parent: LayoutHandle,
        index: usize,
        child: LayoutHandle,
    ) -> Result<(), SceneError> {
        Ok(self.tree.insert_child_at_index(parent, index, child)?)
    }

    pub fn remove_child(&mut self, parent: LayoutHandle, child: LayoutHandle) -> Result<(), SceneError> {
        self.tree.remove_child(parent, child)?;
        Ok(())
    }

    pub fn child_count(&self, handle: LayoutHandle) -> usize {
        self.tree.child_count(handle)
    }

    pub fn children(&self, handle: LayoutHandle) -> Vec<LayoutHandle> {
        self.tree.children(handle).unwrap_or_default()
    }

    pub fn owner(&self, handle: LayoutHandle) -> Option<NodeId> {
        self.tree.get_node_context(handle).copied()
    }

    pub fn set_style(&mut self, handle: LayoutHandle, style: taffy::Style) -> Result<(), SceneError> {
        Ok(self.tree.set_style(handle, style)?)
    }

    pub fn style(&self, handle: LayoutHandle) -> Option<&taffy::Style> {
        self.tree.style(handle).ok()
    }

    /// Forces re-measurement of an intrinsic-content node.
    pub fn mark_dirty(&mut self, handle: LayoutHandle) {
        if let Err(err) = self.tree.mark_dirty(handle) {
            log::warn!("layout mark_dirty failed: {err}");
        }
    }

    pub fn layout(&self, handle: LayoutHandle) -> Option<LayoutBox> {
        let layout = self.tree.layout(handle).ok()?;
        let edges = |rect: taffy::Rect<f32>| Edges {
            top: rect.top,
            right: rect.right,
            bottom: rect.bottom,
            left: rect.left,
        };
        Some(LayoutBox {
            rect: Rect::new(
                layout.location.x,
                layout.location.y,
                layout.size.width,
                layout.size.height,
            ),
            padding: edges(layout.padding),
            border: edges(layout.border),
        })
    }

    /// Lays out the tree under `root` within `width` x `height`. `measure` sizes leaf
    /// nodes with intrinsic content; it receives the owner, the known dimensions and the
    /// available space (`f32::INFINITY` when unbounded).
    pub fn compute<M>(
        &mut self,
        root: LayoutHandle,
        width: f32,
        height: f32,
        mut measure: M,
    ) -> Result<(), SceneError>
    where
        M: FnMut(NodeId, Size<Option<f32>>, Size<f32>) -> Size<f32>,
    {
        let available = Size {
            width: AvailableSpace::Definite(width),
            height: AvailableSpace::Definite(height),
        };
        self.tree
            .compute_layout_with_measure(root, available, |known, available, _, owner, _| {
                let Some(owner) = owner else {
                    return Size::ZERO;
                };
                if let (Some(width), Some(height)) = (known.width, known.height) {
                    return Size { width, height };
                }
                let space = |space: AvailableSpace| match space {
                    AvailableSpace::Definite(value) => value,
                    AvailableSpace::MinContent => 0.0,
                    AvailableSpace::MaxContent => f32::INFINITY,
                };
                let available = Size {
                    width: space(available.width),
                    height: space(available.height),
                };
                measure(*owner, known, available)
            })?;
        Ok(())
    }
}

impl std::fmt::Debug for LayoutTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutTree")
            .field("nodes", &self.tree.total_node_count())
            .finish()
    }
}

/// Fixes the size of a layout style, used for the root which always spans the viewport.
pub fn pin_size(style: &mut taffy::Style, width: f32, height: f32) {
    style.size = Size {
        width: length(width),
        height: length(height),
    };
}

fn resolve(ctx: &StyleContext, value: StyleValue) -> Option<Result<f32, f32>> {
    match value.unit {
        StyleUnit::Undefined | StyleUnit::Auto => None,
        StyleUnit::Percent => Some(Err(value.value / 100.0)),
        StyleUnit::Anchor => Some(Err(value.value)),
        _ => ctx.compute_length(value, 0.0).map(Ok),
    }
}

fn dimension(ctx: &StyleContext, value: StyleValue) -> Dimension {
    match resolve(ctx, value) {
        Some(Ok(points)) => length(points),
        Some(Err(fraction)) => percent(fraction),
        None => auto(),
    }
}

fn length_percentage(ctx: &StyleContext, value: StyleValue) -> LengthPercentage {
    match resolve(ctx, value) {
        Some(Ok(points)) => length(points),
        Some(Err(fraction)) => percent(fraction),
        None => length(0.0),
    }
}

fn length_percentage_auto(ctx: &StyleContext, value: StyleValue) -> LengthPercentageAuto {
    match resolve(ctx, value) {
        Some(Ok(points)) => length(points),
        Some(Err(fraction)) => percent(fraction),
        None => auto(),
    }
}

/// Converts the layout properties of a scene style into the flexbox engine's style.
/// Viewport and rem units are resolved to points, percentages pass through.
pub fn to_layout_style(style: Option<&Style>, ctx: &StyleContext, hidden: bool) -> taffy::Style {
    let mut out = taffy::Style {
        flex_direction: taffy::FlexDirection::Column,
        ..taffy::Style::default()
    };
    if hidden {
        out.display = taffy::Display::None;
    }
    let Some(style) = style else {
        return out;
    };
    let number = |property| style.number(property);

    if style.get::<Display>(StyleProperty::Display) == Some(Display::None) {
        out.display = taffy::Display::None;
    }
    out.position = match style.get::<Position>(StyleProperty::Position).unwrap_or_default() {
        Position::Relative => taffy::Position::Relative,
        Position::Absolute => taffy::Position::Absolute,
    };
    out.inset = taffy::Rect {
        top: length_percentage_auto(ctx, number(StyleProperty::Top)),
        right: length_percentage_auto(ctx, number(StyleProperty::Right)),
        bottom: length_percentage_auto(ctx, number(StyleProperty::Bottom)),
        left: length_percentage_auto(ctx, number(StyleProperty::Left)),
    };
    out.size = Size {
        width: dimension(ctx, number(StyleProperty::Width)),
        height: dimension(ctx, number(StyleProperty::Height)),
    };
    out.min_size = Size {
        width: dimension(ctx, number(StyleProperty::MinWidth)),
        height: dimension(ctx, number(StyleProperty::MinHeight)),
    };
    out.max_size = Size {
        width: dimension(ctx, number(StyleProperty::MaxWidth)),
        height: dimension(ctx, number(StyleProperty::MaxHeight)),
    };
    out.margin = taffy::Rect {
        top: length_percentage_auto(ctx, number(StyleProperty::MarginTop)),
        right: length_percentage_auto(ctx, number(StyleProperty::MarginRight)),
        bottom: length_percentage_auto(ctx, number(StyleProperty::MarginBottom)),
        left: length_percentage_auto(ctx, number(StyleProperty::MarginLeft)),
    };
    // Undefined margins are zero, not auto.
    for (property, slot) in [
        (StyleProperty::MarginTop, &mut out.margin.top),
        (StyleProperty::MarginRight, &mut out.margin.right),
        (StyleProperty::MarginBottom, &mut out.margin.bottom),
        (StyleProperty::MarginLeft, &mut out.margin.left),
    ] {
        if number(property).is_undefined() {
            *slot = length(0.0);
        }
    }
    out.padding = taffy::Rect {
        top: length_percentage(ctx, number(StyleProperty::PaddingTop)),
        right: length_percentage(ctx, number(StyleProperty::PaddingRight)),
        bottom: length_percentage(ctx, number(StyleProperty::PaddingBottom)),
        left: length_percentage(ctx, number(StyleProperty::PaddingLeft)),
    };
    out.border = taffy::Rect {
        top: length_percentage(ctx, number(StyleProperty::BorderTopWidth)),
        right: length_percentage(ctx, number(StyleProperty::BorderRightWidth)),
        bottom: length_percentage(ctx, number(StyleProperty::BorderBottomWidth)),
        left: length_percentage(ctx, number(StyleProperty::BorderLeftWidth)),
    };

    if let Some(direction) = style.get::<FlexDirection>(StyleProperty::FlexDirection) {
        out.flex_direction = match direction {
            FlexDirection::Row => taffy::FlexDirection::Row,
            FlexDirection::RowReverse => taffy::FlexDirection::RowReverse,
            FlexDirection::Column => taffy::FlexDirection::Column,
            FlexDirection::ColumnReverse => taffy::FlexDirection::ColumnReverse,
        };
    }
    out.flex_wrap = match style.get::<FlexWrap>(StyleProperty::FlexWrap).unwrap_or_default() {
        FlexWrap::NoWrap => taffy::FlexWrap::NoWrap,
        FlexWrap::Wrap => taffy::FlexWrap::Wrap,
        FlexWrap::WrapReverse => taffy::FlexWrap::WrapReverse,
    };
    let grow = number(StyleProperty::FlexGrow);
    if !grow.is_undefined() {
        out.flex_grow = grow.value.max(0.0);
    }
    let shrink = number(StyleProperty::FlexShrink);
    if !shrink.is_undefined() {
        out.flex_shrink = shrink.value.max(0.0);
    }
    out.flex_basis = dimension(ctx, number(StyleProperty::FlexBasis));
    out.align_items = style
        .get::<AlignItems>(StyleProperty::AlignItems)
        .map(|align| match align {
            AlignItems::Start => taffy::AlignItems::FlexStart,
            AlignItems::End => taffy::AlignItems::FlexEnd,
            AlignItems::Center => taffy::AlignItems::Center,
            AlignItems::Stretch => taffy::AlignItems::Stretch,
            AlignItems::Baseline => taffy::AlignItems::Baseline,
        });
    out.justify_content = style
        .get::<JustifyContent>(StyleProperty::JustifyContent)
        .map(|justify| match justify {
            JustifyContent::Start => taffy::JustifyContent::FlexStart,
            JustifyContent::End => taffy::JustifyContent::FlexEnd,
            JustifyContent::Center => taffy::JustifyContent::Center,
            JustifyContent::SpaceBetween => taffy::JustifyContent::SpaceBetween,
            JustifyContent::SpaceAround => taffy::JustifyContent::SpaceAround,
            JustifyContent::SpaceEvenly => taffy::JustifyContent::SpaceEvenly,
        });
    let gap = length_percentage(ctx, number(StyleProperty::Gap));
    out.gap = Size {
        width: gap,
        height: gap,
    };
    out
}

#[cfg(test)]
mod tests {
    use super::{LayoutTree, to_layout_style};
    use crate::geometry::Rect;
    use crate::style::{Display, FlexDirection, Style, StyleContext, StyleProperty, StyleValue};
    use crate::view::NodeId;
    use slotmap::KeyData;
    use taffy::prelude::{auto, length, percent};
    use taffy::Size;

    fn node(id: u64) -> NodeId {
        NodeId::from(KeyData::from_ffi(id))
    }

    #[test]
    fn units_resolve_to_points_or_percent() {
        let ctx = StyleContext::new(1280.0, 720.0, 16.0);
        let style = Style::new();
        style.set(StyleProperty::Width, StyleValue::vw(50.0)).unwrap();
        style.set(StyleProperty::Height, StyleValue::percent(25.0)).unwrap();
        style.set(StyleProperty::PaddingLeft, StyleValue::rem(2.0)).unwrap();
        let out = to_layout_style(Some(&style), &ctx, false);
        assert_eq!(out.size.width, length(640.0));
        assert_eq!(out.size.height, percent(0.25));
        assert_eq!(out.padding.left, length(32.0));
        assert_eq!(out.margin.left, length(0.0));
        assert_eq!(out.inset.top, auto());
    }

    #[test]
    fn hidden_and_display_none_collapse() {
        let ctx = StyleContext::default();
        assert_eq!(to_layout_style(None, &ctx, true).display, taffy::Display::None);

        let style = Style::new();
        style.set(StyleProperty::Display, Display::None).unwrap();
        assert_eq!(
            to_layout_style(Some(&style), &ctx, false).display,
            taffy::Display::None
        );
    }

    #[test]
    fn default_direction_is_column() {
        let ctx = StyleContext::default();
        assert_eq!(
            to_layout_style(None, &ctx, false).flex_direction,
            taffy::FlexDirection::Column
        );
        let style = Style::new();
        style.set(StyleProperty::FlexDirection, FlexDirection::Row).unwrap();
        assert_eq!(
            to_layout_style(Some(&style), &ctx, false).flex_direction,
            taffy::FlexDirection::Row
        );
    }

    #[test]
    fn computes_and_measures_leaves() {
        let ctx = StyleContext::default();
        let mut tree = LayoutTree::new();
        let root = tree.create().unwrap();
        let leaf = tree.create().unwrap();
        tree.set_owner(root, node(1)).unwrap();
        tree.set_owner(leaf, node(2)).unwrap();
        tree.insert_child(root, 0, leaf).unwrap();

        let style = Style::new();
        style.set(StyleProperty::Width, StyleValue::point(200.0)).unwrap();
        style.set(StyleProperty::Height, StyleValue::point(100.0)).unwrap();
        style.set(StyleProperty::PaddingTop, StyleValue::point(10.0)).unwrap();
        tree.set_style(root, to_layout_style(Some(&style), &ctx, false))
            .unwrap();
        tree.set_style(leaf, to_layout_style(None, &ctx, false)).unwrap();

        let mut measured = Vec::new();
        tree.compute(root, 800.0, 600.0, |owner, _, _| {
            measured.push(owner);
            Size {
                width: 30.0,
                height: 12.0,
            }
        })
        .unwrap();

        assert!(measured.contains(&node(2)));
        assert_eq!(tree.owner(leaf), Some(node(2)));
        assert_eq!(tree.layout(root).unwrap().rect, Rect::new(0.0, 0.0, 200.0, 100.0));
        let leaf_box = tree.layout(leaf).unwrap();
        assert_eq!(leaf_box.rect.y, 10.0);
        assert_eq!(leaf_box.rect.height, 12.0);
        assert_eq!(tree.child_count(root), 1);

        tree.remove_child(root, leaf).unwrap();
        assert_eq!(tree.child_count(root), 0);
    }
}
