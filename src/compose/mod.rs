//! Layered compositing renderer.
//!
//! - [`resize`]: contain-fit onto a transparent canvas
//! - [`pattern`]: tiling a swatch across one layer's masked region
//! - [`composer`]: stacking all layers of an item into one PNG

pub mod composer;
pub mod pattern;
pub mod resize;

pub use composer::{ComposeOptions, ComposedImage, ImageComposer, LayerReport, LayerStatus};
pub use pattern::{FillOutcome, PatternApplier, PatternFill};
pub use resize::contain_fit;
