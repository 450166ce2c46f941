//! dotsync library: Exposes the binary's native adapters for testing.
//!
//! This is a thin layer over dotsync-core, pairing the engine with the local
//! disk and a JSON-file item store.

pub mod config;
pub mod json_store;
pub mod native_fs;
pub mod output;

// Re-export key types for convenience
pub use config::{Config, ConfigError};
pub use json_store::{JsonFileStore, StoredItems};
pub use native_fs::NativeFs;
