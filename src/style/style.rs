use super::color::Color;
use super::property::*;
use super::value::{StyleFilter, StyleTransform, StyleValue};
use crate::error::SceneError;
use crate::view::NodeId;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Extracts a typed value from a [`PropertyValue`].
pub trait FromPropertyValue: Sized {
    fn from_property_value(value: &PropertyValue) -> Option<Self>;
}

macro_rules! impl_from_property_value {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl FromPropertyValue for $ty {
                fn from_property_value(value: &PropertyValue) -> Option<Self> {
                    match value {
                        PropertyValue::$variant(inner) => Some(inner.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_from_property_value!(
    Display => Display,
    Position => Position,
    FlexDirection => FlexDirection,
    FlexWrap => FlexWrap,
    AlignItems => AlignItems,
    JustifyContent => JustifyContent,
    ObjectFit => ObjectFit,
    Overflow => Overflow,
    FontStyle => FontStyle,
    TextOverflow => TextOverflow,
    Integer => i32,
    Number => StyleValue,
    Color => Color,
    String => SmolStr,
    Transform => Vec<StyleTransform>,
    Filter => Vec<StyleFilter>,
);

fn validate(property: StyleProperty, value: &PropertyValue) -> Result<(), SceneError> {
    if property.kind() == value.kind() {
        Ok(())
    } else {
        Err(SceneError::InvalidPropertyValue(property.name()))
    }
}

/// Immutable, shareable set of declarations a [`Style`] can delegate to.
#[derive(Clone, Default)]
pub struct StyleClass {
    properties: Rc<FxHashMap<StyleProperty, PropertyValue>>,
}

impl StyleClass {
    pub fn new<I, V>(declarations: I) -> Result<Self, SceneError>
    where
        I: IntoIterator<Item = (StyleProperty, V)>,
        V: Into<PropertyValue>,
    {
        let mut properties = FxHashMap::default();
        for (property, value) in declarations {
            let value = value.into();
            validate(property, &value)?;
            properties.insert(property, value);
        }
        Ok(Self {
            properties: Rc::new(properties),
        })
    }

    /// Snapshot of the local declarations of `style`.
    pub fn from_style(style: &Style) -> Self {
        Self {
            properties: Rc::new(style.properties.borrow().clone()),
        }
    }

    pub fn get_value(&self, property: StyleProperty) -> Option<&PropertyValue> {
        self.properties.get(&property)
    }

    pub fn ptr_eq(&self, other: &StyleClass) -> bool {
        Rc::ptr_eq(&self.properties, &other.properties)
    }
}

impl fmt::Debug for StyleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StyleClass")
            .field("len", &self.properties.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StyleChange {
    pub node: NodeId,
    pub layout: bool,
}

/// Receives change notifications for every node a style is bound to.
#[derive(Debug, Default)]
pub(crate) struct StyleChangeQueue {
    changes: RefCell<Vec<StyleChange>>,
}

impl StyleChangeQueue {
    pub fn push(&self, change: StyleChange) {
        self.changes.borrow_mut().push(change);
    }

    pub fn take(&self) -> Vec<StyleChange> {
        std::mem::take(&mut *self.changes.borrow_mut())
    }
}

/// Mutable per-instance declarations with an optional [`StyleClass`] parent.
///
/// Reads fall through to the parent once when a property is not set locally. A style
/// may be bound to several nodes; every mutation notifies all of them.
#[derive(Default)]
pub struct Style {
    properties: RefCell<FxHashMap<StyleProperty, PropertyValue>>,
    parent: RefCell<Option<StyleClass>>,
    locked: Cell<bool>,
    observers: RefCell<Vec<(Weak<StyleChangeQueue>, NodeId)>>,
}

impl Style {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn with_parent(parent: StyleClass) -> Rc<Self> {
        let style = Self::default();
        *style.parent.borrow_mut() = Some(parent);
        Rc::new(style)
    }

    pub fn set(&self, property: StyleProperty, value: impl Into<PropertyValue>) -> Result<(), SceneError> {
        self.ensure_unlocked()?;
        let value = value.into();
        validate(property, &value)?;
        let changed = self.properties.borrow_mut().insert(property, value.clone()) != Some(value);
        if changed {
            self.notify(property.is_layout());
        }
        Ok(())
    }

    pub fn unset(&self, property: StyleProperty) -> Result<(), SceneError> {
        self.ensure_unlocked()?;
        if self.properties.borrow_mut().remove(&property).is_some() {
            self.notify(property.is_layout());
        }
        Ok(())
    }

    pub fn set_parent(&self, parent: Option<StyleClass>) -> Result<(), SceneError> {
        self.ensure_unlocked()?;
        *self.parent.borrow_mut() = parent;
        self.notify(true);
        Ok(())
    }

    pub fn parent(&self) -> Option<StyleClass> {
        self.parent.borrow().clone()
    }

    /// Makes the style immutable. Later mutations fail with [`SceneError::StyleLocked`].
    pub fn lock(&self) {
        self.locked.set(true);
    }

    pub fn is_locked(&self) -> bool {
        self.locked.get()
    }

    pub fn has_local(&self, property: StyleProperty) -> bool {
        self.properties.borrow().contains_key(&property)
    }

    pub fn get_value(&self, property: StyleProperty) -> Option<PropertyValue> {
        if let Some(value) = self.properties.borrow().get(&property) {
            return Some(value.clone());
        }
        self.parent
            .borrow()
            .as_ref()
            .and_then(|parent| parent.get_value(property).cloned())
    }

    pub fn get<T: FromPropertyValue>(&self, property: StyleProperty) -> Option<T> {
        if let Some(value) = self.properties.borrow().get(&property) {
            return T::from_property_value(value);
        }
        self.parent
            .borrow()
            .as_ref()
            .and_then(|parent| parent.get_value(property))
            .and_then(T::from_property_value)
    }

    /// Numeric property, `StyleValue::UNDEFINED` when absent.
    pub fn number(&self, property: StyleProperty) -> StyleValue {
        self.get(property).unwrap_or(StyleValue::UNDEFINED)
    }

    pub(crate) fn bind(&self, node: NodeId, queue: &Rc<StyleChangeQueue>) {
        self.observers.borrow_mut().push((Rc::downgrade(queue), node));
    }

    pub(crate) fn unbind(&self, node: NodeId) {
        self.observers.borrow_mut().retain(|(_, owner)| *owner != node);
    }

    pub(crate) fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }

    fn ensure_unlocked(&self) -> Result<(), SceneError> {
        if self.locked.get() {
            Err(SceneError::StyleLocked)
        } else {
            Ok(())
        }
    }

    fn notify(&self, layout: bool) {
        let mut observers = self.observers.borrow_mut();
        observers.retain(|(queue, node)| match queue.upgrade() {
            Some(queue) => {
                queue.push(StyleChange { node: *node, layout });
                true
            }
            None => false,
        });
    }
}

impl fmt::Debug for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Style")
            .field("len", &self.properties.borrow().len())
            .field("locked", &self.locked.get())
            .field("has_parent", &self.parent.borrow().is_some())
            .finish()
    }
}
