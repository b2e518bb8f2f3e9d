//! Core data models for boundary lookup and interpolation.

pub mod boundary;
pub mod sample;

pub use boundary::{BoundarySpec, Version};
pub use sample::SampleTable;
