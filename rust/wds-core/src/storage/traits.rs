// rust/wds-core/src/storage/traits.rs

//! Archive access traits.
//!
//! A [`ShardStream`] is one opened archive. The loader positions it with
//! `Seek` and then either copies bytes out with `Read` or, when the stream
//! is backed by stable memory, takes a zero-copy [`view`](ShardStream::view).

use std::io::{Read, Seek};
use std::path::Path;

use bytes::Bytes;

use crate::error::Result;

/// An opened archive.
pub trait ShardStream: Read + Seek + Send {
    /// Path the stream was opened from.
    fn path(&self) -> &Path;

    /// Returns the current size of the archive in bytes.
    fn size(&self) -> u64;

    /// Whether [`view`](Self::view) can hand out memory that stays valid for
    /// as long as the returned `Bytes` lives.
    fn can_share_data(&self) -> bool;

    /// Returns `length` bytes at the current position without copying and
    /// advances the position past them.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot share data or the range runs
    /// past the end of the archive.
    fn view(&mut self, length: usize) -> Result<Bytes>;
}

/// Opens archives by path.
///
/// # Object Safety
///
/// This trait is object-safe and can be used with `Arc<dyn StreamOpener>`.
pub trait StreamOpener: Send + Sync {
    /// Opens the archive at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive does not exist or cannot be opened.
    fn open(&self, path: &Path) -> Result<Box<dyn ShardStream>>;
}
