mod composite_context;
mod layout;
mod paintable;
mod recording_renderer;
mod renderer;
mod scene;
mod scene_node;
mod text_block;

pub use composite_context::*;
pub use layout::{LayoutBox, LayoutHandle, LayoutTree, pin_size, to_layout_style};
pub use paintable::*;
pub use recording_renderer::*;
pub use renderer::*;
pub use scene::*;
pub use scene_node::*;
pub use text_block::*;
