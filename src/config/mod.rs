//! Configuration Management
//!
//! The library takes a [`HealConfig`] at construction. The binary resolves
//! one from:
//! 1. Built-in defaults
//! 2. Config file (`--config`, else ~/.config/codeheal/config.toml)
//! 3. Environment variables (CODEHEAL_*)

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::*;
