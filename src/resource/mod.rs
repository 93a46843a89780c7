mod font_manager;
mod image_manager;
mod lru;
mod manager;
mod thread_pool;

pub use font_manager::*;
pub use image_manager::*;
pub use lru::*;
pub use manager::*;
pub use thread_pool::*;

slotmap::new_key_type! {
    pub struct ImageId;
    pub struct FontId;
}

impl From<crate::view::NodeId> for ListenerOwner {
    fn from(node: crate::view::NodeId) -> Self {
        use slotmap::Key;
        ListenerOwner(node.data().as_ffi())
    }
}
