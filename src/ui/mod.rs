// src/ui/mod.rs
//! Terminal interface: the demo front-end around the analyzer.

pub mod keybindings;
pub mod tui;

// Re-export main entry point
pub use tui::run;
