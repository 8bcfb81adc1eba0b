//! # swatchwork
//!
//! Discovers customizable product artwork stored in an object-storage bucket
//! (`<collection>/<item>/<N>.png` layers plus a folder of pattern swatches),
//! caches the resulting catalog, and composites items with patterns tiled into
//! selected layers.
//!
//! Discovery lives in [`scanner`], [`patterns`], [`cache`] and [`discovery`];
//! compositing lives in [`compose`] and [`render`]. Storage backends implement
//! the seams in [`contract`].

pub mod cache;
pub mod cli;
pub mod compose;
pub mod config;
pub mod contract;
pub mod discovery;
pub mod error;
pub mod load_config;
pub mod model;
pub mod patterns;
pub mod render;
pub mod scanner;
pub mod storage;

pub use cli::{run, Cli, Commands};
