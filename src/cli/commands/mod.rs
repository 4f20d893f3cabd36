//! Command handlers for the `codeheal` binary

pub mod analyze;
pub mod config;
pub mod enhance;
pub mod fix;
