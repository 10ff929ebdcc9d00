//! 8x8 LED matrix rendering.
//!
//! `frame` is the pixel grid, `font` the scroll glyphs, `render` the
//! compositors (bars, text, icons), `sink` the physical/preview outputs.

pub mod font;
pub mod frame;
pub mod render;
pub mod sink;
