//! Image processing — pure Rust, zero external dependencies.
//!
//! The module is split the same way at every layer:
//! - **Calculations**: pure functions for dimension math (unit testable)
//! - **Parameters**: data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::{collapse_widths, crop_window, fill_dimensions, scaled_height};
pub use params::{CropWindow, EncodeParams, FocalPoint, OutputFormat, Quality};
pub use rust_backend::RustBackend;
