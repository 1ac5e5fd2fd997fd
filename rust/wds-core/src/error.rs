// rust/wds-core/src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WdsError {

    #[error("Storage error at '{path}': {message}")]
    Storage {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Configuration mismatch: {message}")]
    ConfigMismatch {
        message: String,
    },

    #[error("Unsupported output dtype '{name}'. Supported types are: {supported}")]
    UnsupportedType {
        name: String,
        supported: String,
    },

    #[error("Malformed index file at \"{path}\" line {line} - {message}")]
    MalformedIndex {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error(
        "Error in index file at \"{path}\" line {line} - component size {size} and dtype of output {output} (element size {element_size}) incompatible"
    )]
    SizeTypeMismatch {
        path: PathBuf,
        line: usize,
        output: usize,
        size: u64,
        element_size: usize,
    },

    #[error("Underfull sample detected at \"{path}\" line {line}")]
    IncompleteSample {
        path: PathBuf,
        line: usize,
    },

    #[error(
        "Malformed index file at \"{index}\" line {line} - offset {offset} is outside of the archive file '{archive}' (size {archive_size})"
    )]
    OffsetOutOfRange {
        archive: PathBuf,
        index: PathBuf,
        line: usize,
        offset: u64,
        archive_size: u64,
    },

    #[error("Error reading from archive '{path}': {message}")]
    ArchiveRead {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Sample index {index} out of range (catalog holds {len} samples)")]
    SampleOutOfRange {
        index: usize,
        len: usize,
    },

    #[error("Shard {shard_id} out of range (total shards: {total_shards})")]
    InvalidShard {
        shard_id: u32,
        total_shards: u32,
    },
}

pub type Result<T> = std::result::Result<T, WdsError>;

// Convenience constructors
impl WdsError {

    pub fn storage(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn storage_with_source(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn config_mismatch(message: impl Into<String>) -> Self {
        Self::ConfigMismatch {
            message: message.into(),
        }
    }

    pub fn malformed_index(
        path: impl Into<PathBuf>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::MalformedIndex {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    pub fn incomplete_sample(path: impl Into<PathBuf>, line: usize) -> Self {
        Self::IncompleteSample {
            path: path.into(),
            line,
        }
    }

    pub fn archive_read(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ArchiveRead {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn archive_read_with_source(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::ArchiveRead {
            path: path.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn invalid_shard(shard_id: u32, total_shards: u32) -> Self {
        Self::InvalidShard { shard_id, total_shards }
    }
}
