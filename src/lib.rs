// src/lib.rs
//! Wavescope - a real-time audio spectrum analyzer and renderer.
//!
//! The library splits into the analysis/rendering core ([`analyzer`]), the
//! audio input seam ([`audio`]), the raster surface ([`canvas`]) and the
//! configuration layer ([`config`]). The [`ui`] module is a terminal
//! front-end demonstrating the whole pipeline.

pub mod analyzer;
pub mod audio;
pub mod canvas;
pub mod config;
pub mod display;
pub mod error;
pub mod ui;

pub use analyzer::Analyzer;
pub use config::{Config, ConfigPatch};
pub use error::{Result, WavescopeError};
