//! Caching layer for parsed source files.

pub mod memory;

pub use memory::{CacheStats, LoadCache};
