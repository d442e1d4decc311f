//! Command implementations for the TiledAligner CLI

pub mod align;
pub mod config;
