// rust/wds-core/src/dataset/types.rs

use std::fmt;
use std::ops::Range;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, WdsError};

/// Alignment of every component offset inside an archive (tar block size).
pub const BLOCK_SIZE: u64 = 512;

/// Version signature expected in the first line of every index file.
pub const INDEX_VERSION: &str = "v1.0";

/// Separator between alternative extensions of one output, e.g. `"jpg;png"`.
pub const EXT_DELIMITER: char = ';';

/// Element type an output buffer is reinterpreted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ElementType {
    #[default]
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float16,
    BFloat16,
    Float32,
    Float64,
    Bool,
}

impl ElementType {
    /// Every type an output may be declared with.
    pub const SUPPORTED: [ElementType; 13] = [
        ElementType::UInt8,
        ElementType::UInt16,
        ElementType::UInt32,
        ElementType::UInt64,
        ElementType::Int8,
        ElementType::Int16,
        ElementType::Int32,
        ElementType::Int64,
        ElementType::Float16,
        ElementType::BFloat16,
        ElementType::Float32,
        ElementType::Float64,
        ElementType::Bool,
    ];

    /// Size of one element in bytes.
    pub fn size(&self) -> usize {
        match self {
            ElementType::UInt8 | ElementType::Int8 | ElementType::Bool => 1,
            ElementType::UInt16
            | ElementType::Int16
            | ElementType::Float16
            | ElementType::BFloat16 => 2,
            ElementType::UInt32 | ElementType::Int32 | ElementType::Float32 => 4,
            ElementType::UInt64 | ElementType::Int64 | ElementType::Float64 => 8,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ElementType::UInt8 => "uint8",
            ElementType::UInt16 => "uint16",
            ElementType::UInt32 => "uint32",
            ElementType::UInt64 => "uint64",
            ElementType::Int8 => "int8",
            ElementType::Int16 => "int16",
            ElementType::Int32 => "int32",
            ElementType::Int64 => "int64",
            ElementType::Float16 => "float16",
            ElementType::BFloat16 => "bfloat16",
            ElementType::Float32 => "float32",
            ElementType::Float64 => "float64",
            ElementType::Bool => "bool",
        }
    }

    /// Comma separated list of the supported type names.
    pub fn supported_list() -> String {
        Self::SUPPORTED
            .iter()
            .map(ElementType::name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElementType {
    type Err = WdsError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::SUPPORTED
            .iter()
            .copied()
            .find(|ty| ty.name() == lowered)
            .ok_or_else(|| WdsError::UnsupportedType {
                name: s.to_string(),
                supported: Self::supported_list(),
            })
    }
}

/// What to do with a sample that lacks a component for some output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingComponentBehavior {
    /// Drop the sample from the catalog.
    Skip,
    /// Keep the sample and serve zero-length buffers for the missing outputs.
    #[default]
    Empty,
    /// Fail the catalog build.
    Error,
}

impl FromStr for MissingComponentBehavior {
    type Err = WdsError;

    /// Case-insensitive; the empty string selects `Empty`.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "" | "empty" => Ok(MissingComponentBehavior::Empty),
            "skip" => Ok(MissingComponentBehavior::Skip),
            "error" => Ok(MissingComponentBehavior::Error),
            _ => Err(WdsError::config(format!(
                "invalid value for missing_component_behavior '{s}', possible values are: skip, error, empty"
            ))),
        }
    }
}

/// One component as read from an index line, before output matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexComponent {
    pub ext: String,
    pub offset: u64,
    pub size: u64,
}

/// One index line: a run of components in the parser's component table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSample {
    pub components: Range<usize>,
    /// 1-based line number inside the index file (the header is line 0).
    pub line_number: usize,
}

/// A component that feeds at least one output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentDesc {
    pub ext: String,
    pub offset: u64,
    pub size: u64,
    /// Range into the catalog's output-index arena.
    pub outputs: Range<usize>,
}

/// A committed sample of the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleDesc {
    /// Range into the catalog's component arena.
    pub components: Range<usize>,
    /// Range into the catalog's empty-output arena.
    pub empty_outputs: Range<usize>,
    pub shard_index: usize,
    pub line_number: usize,
}

/// The archive/index pair backing one shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardPaths {
    pub archive: PathBuf,
    pub index: PathBuf,
}

impl ShardPaths {
    pub fn new(archive: impl Into<PathBuf>, index: impl Into<PathBuf>) -> Self {
        Self {
            archive: archive.into(),
            index: index.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_type_sizes() {
        assert_eq!(ElementType::UInt8.size(), 1);
        assert_eq!(ElementType::Float16.size(), 2);
        assert_eq!(ElementType::Int32.size(), 4);
        assert_eq!(ElementType::Float64.size(), 8);
    }

    #[test]
    fn test_element_type_parse() {
        assert_eq!("uint8".parse::<ElementType>().unwrap(), ElementType::UInt8);
        assert_eq!("FLOAT32".parse::<ElementType>().unwrap(), ElementType::Float32);
    }

    #[test]
    fn test_element_type_unsupported_lists_supported_set() {
        let err = "string".parse::<ElementType>().unwrap_err();
        match err {
            WdsError::UnsupportedType { name, supported } => {
                assert_eq!(name, "string");
                assert!(supported.contains("uint8"));
                assert!(supported.contains("float64"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_component_behavior_parse() {
        assert_eq!(
            "".parse::<MissingComponentBehavior>().unwrap(),
            MissingComponentBehavior::Empty
        );
        assert_eq!(
            "SKIP".parse::<MissingComponentBehavior>().unwrap(),
            MissingComponentBehavior::Skip
        );
        assert_eq!(
            "Error".parse::<MissingComponentBehavior>().unwrap(),
            MissingComponentBehavior::Error
        );

        let err = "ignore".parse::<MissingComponentBehavior>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("skip, error, empty"));
        assert!(matches!(err, WdsError::Config { .. }));
    }
}
