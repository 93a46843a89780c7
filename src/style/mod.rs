mod color;
mod computed_style;
mod property;
#[allow(clippy::module_inception)]
mod style;
mod style_context;
mod value;

pub use color::*;
pub use computed_style::*;
pub use property::*;
pub use style::*;
pub use style_context::*;
pub use value::*;
