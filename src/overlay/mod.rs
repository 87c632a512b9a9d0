mod color;
mod font;
mod render;

pub use color::{parse_color, parse_color_or_white};
pub use font::FontBook;
pub use render::{Compositor, DEFAULT_OUTLINE_RADIUS};
