//! Embeddable scene-graph engine.
//!
//! Application code builds a tree of typed nodes (root, box, image, text) inside a
//! [`Scene`], binds [`Style`] objects to them and calls [`Scene::frame`] once per tick.
//! Each frame runs compute-style, layout, paint and composite in that order, skipping
//! subtrees whose dirty bits are clear. Images and fonts are decoded on a small
//! [`ThreadPool`] and handed back to the UI thread at the start of the next frame.

pub mod config;
pub mod error;
pub mod geometry;
pub mod resource;
pub mod style;
pub mod view;

pub use config::*;
pub use error::*;
pub use geometry::*;
pub use resource::*;
pub use style::*;
pub use view::*;
