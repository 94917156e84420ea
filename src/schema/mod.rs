//! Schema module - Configuration, environment descriptions and report types.

mod config;
mod environment;
mod evolution;

pub use config::*;
pub use environment::*;
pub use evolution::*;
