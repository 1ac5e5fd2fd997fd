// rust/wds-core/src/lib.rs

//! Indexed archive sample loader - Core Library
//!
//! This crate builds a catalog of samples from archive files and their
//! companion index files, and serves each sample's components as typed byte
//! buffers, zero-copy from memory-mapped archives where possible.

pub mod config;
pub mod error;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::WdsConfig;
pub use error::{Result, WdsError};
pub use storage::{LocalOpener, ShardStream, StreamOpener};

pub mod dataset;
pub use dataset::{
    ElementType, MissingComponentBehavior, OutputMap, ReadStrategy, SampleBuffer, ShardCatalog,
    ShardCursor, SkipOracle,
};

pub mod loader;
pub use loader::WdsLoader;
