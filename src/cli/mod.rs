//! CLI command handlers

pub mod commands;

pub use commands::{default_output_path, extract, ExtractOptions};
