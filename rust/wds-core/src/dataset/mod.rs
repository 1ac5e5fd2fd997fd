// rust/wds-core/src/dataset/mod.rs

//! Indexed archive datasets.
//!
//! An archive holds the raw bytes of many samples; its index file lists, per
//! sample, the extension, offset, and size of every component. This module
//! parses index files, matches components to declared outputs, builds the
//! sample catalog, partitions it between readers, and reads samples into
//! typed buffers.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use wds_core::dataset::{build_catalog, BuildDiagnostics, MissingComponentBehavior, OutputMap, SampleReader};
//!
//! let outputs = OutputMap::new(&["jpg;png", "cls"], None)?;
//! let mut diagnostics = BuildDiagnostics::new();
//! let catalog = build_catalog(&shards, &outputs, MissingComponentBehavior::Empty, &mut diagnostics)?;
//!
//! let reader = SampleReader::new(Arc::new(catalog), streams, false)?;
//! let mut buffers = reader.new_buffers();
//! reader.read_sample(0, &mut buffers)?;
//! ```

mod buffer;
mod catalog;
mod index;
mod outputs;
mod parallel;
mod reader;
mod sharding;
mod types;

pub use buffer::SampleBuffer;
pub use catalog::{build_catalog, BuildDiagnostics, CatalogBuilder, ShardCatalog};
pub use index::{parse_index, parse_index_file};
pub use outputs::OutputMap;
pub use parallel::{LoadedSample, ParallelLoadConfig, ParallelSampleLoader};
pub use reader::{ReadStrategy, SampleReader, SkipOracle};
pub use sharding::{shard_range, start_index, ShardCursor};
pub use types::{
    ComponentDesc, ElementType, IndexComponent, IndexSample, MissingComponentBehavior, SampleDesc,
    ShardPaths, BLOCK_SIZE, EXT_DELIMITER, INDEX_VERSION,
};
