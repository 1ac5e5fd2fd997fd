// rust/wds-core/src/storage/mod.rs

//! Archive storage.
//!
//! Archives are opened through a [`StreamOpener`] and read through the
//! [`ShardStream`] it returns. [`LocalOpener`] serves the local filesystem,
//! memory-mapping archives unless copy reads are forced.

mod local;
mod traits;

pub use local::{LocalOpener, MappedShard};
pub use traits::{ShardStream, StreamOpener};
