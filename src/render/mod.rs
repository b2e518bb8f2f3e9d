//! Raster rendering of boundary features and winner maps.

pub mod canvas;
pub mod colors;
pub mod contour;

pub use canvas::MapCanvas;
pub use colors::{parse_color, tab10, Color};
pub use contour::ContourLayer;
