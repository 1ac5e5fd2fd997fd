// rust/wds-core/src/dataset/reader.rs

//! Serving catalog samples into output buffers.
//!
//! Every read validates the component offset against the live archive size
//! before touching the archive, since the archive may have changed since the
//! index was written.

use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Result, WdsError};
use crate::storage::ShardStream;

use super::buffer::SampleBuffer;
use super::catalog::ShardCatalog;
use super::types::{ComponentDesc, SampleDesc};

/// How component bytes reach the output buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStrategy {
    /// Read into the first fed buffer; other fed buffers share that copy.
    Copy,
    /// Hand out views into the mapped archive.
    Share,
}

impl ReadStrategy {
    /// `Share` when copy reads are not forced and every stream can share.
    pub fn select(force_copy_reads: bool, streams: &[Box<dyn ShardStream>]) -> Self {
        if !force_copy_reads && streams.iter().all(|stream| stream.can_share_data()) {
            ReadStrategy::Share
        } else {
            ReadStrategy::Copy
        }
    }
}

/// Decides whether a component was already processed and need not be read.
///
/// The argument is the component's source tag, the same string stored in
/// [`SampleBuffer::source_info`].
pub trait SkipOracle: Send + Sync {
    fn should_skip(&self, source_info: &str) -> bool;
}

impl<F> SkipOracle for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn should_skip(&self, source_info: &str) -> bool {
        self(source_info)
    }
}

/// Reads catalog samples from a fixed set of open archive streams.
pub struct SampleReader {
    catalog: Arc<ShardCatalog>,
    // One per catalog shard, in shard order.
    streams: Vec<Mutex<Box<dyn ShardStream>>>,
    strategy: ReadStrategy,
    skip_oracle: Option<Arc<dyn SkipOracle>>,
}

impl SampleReader {
    /// Creates a reader over `streams`, one per shard of `catalog`.
    ///
    /// Output element types are the ones the catalog was built with.
    ///
    /// # Errors
    ///
    /// Returns `ConfigMismatch` if the number of streams does not match the
    /// catalog.
    pub fn new(
        catalog: Arc<ShardCatalog>,
        streams: Vec<Box<dyn ShardStream>>,
        force_copy_reads: bool,
    ) -> Result<Self> {
        if streams.len() != catalog.shards().len() {
            return Err(WdsError::config_mismatch(format!(
                "{} archive streams provided for {} shards",
                streams.len(),
                catalog.shards().len()
            )));
        }

        let strategy = ReadStrategy::select(force_copy_reads, &streams);
        Ok(Self {
            catalog,
            streams: streams.into_iter().map(Mutex::new).collect(),
            strategy,
            skip_oracle: None,
        })
    }

    pub fn strategy(&self) -> ReadStrategy {
        self.strategy
    }

    pub fn catalog(&self) -> &Arc<ShardCatalog> {
        &self.catalog
    }

    pub fn set_skip_oracle(&mut self, oracle: Option<Arc<dyn SkipOracle>>) {
        self.skip_oracle = oracle;
    }

    /// A fresh buffer for every output, typed by its declared element type.
    pub fn new_buffers(&self) -> Vec<SampleBuffer> {
        self.catalog.dtypes().iter().map(|&dtype| SampleBuffer::new(dtype)).collect()
    }

    /// Fills `buffers` with sample `index`.
    ///
    /// `buffers` must hold one entry per output. Outputs fed by a component
    /// receive its bytes; outputs the sample lacks become zero-length.
    ///
    /// # Errors
    ///
    /// Returns `SampleOutOfRange`, `ConfigMismatch` for a wrong buffer count,
    /// `OffsetOutOfRange` when a component starts past the archive end, or
    /// `ArchiveRead` when the archive cannot deliver the component.
    pub fn read_sample(&self, index: usize, buffers: &mut [SampleBuffer]) -> Result<()> {
        let sample = self.catalog.sample(index).ok_or(WdsError::SampleOutOfRange {
            index,
            len: self.catalog.len(),
        })?;
        if buffers.len() != self.catalog.num_outputs() {
            return Err(WdsError::config_mismatch(format!(
                "expected {} output buffers, got {}",
                self.catalog.num_outputs(),
                buffers.len()
            )));
        }

        for component in self.catalog.components(sample) {
            self.read_component(sample, component, buffers)?;
        }

        for &output in self.catalog.empty_outputs(sample) {
            buffers[output].clear_to(self.catalog.dtypes()[output]);
        }

        Ok(())
    }

    fn read_component(
        &self,
        sample: &SampleDesc,
        component: &ComponentDesc,
        buffers: &mut [SampleBuffer],
    ) -> Result<()> {
        let shard = self.catalog.shard(sample.shard_index);
        let outputs = self.catalog.outputs(component);
        let mut stream = self.lock_stream(sample.shard_index)?;

        let archive_size = stream.size();
        if component.offset >= archive_size {
            return Err(WdsError::OffsetOutOfRange {
                archive: shard.archive.clone(),
                index: shard.index.clone(),
                line: sample.line_number,
                offset: component.offset,
                archive_size,
            });
        }

        let source_info = format!(
            "archive {} index file \"{}\" line {} component offset {}",
            shard.archive.display(),
            shard.index.display(),
            sample.line_number,
            component.offset
        );

        if let Some(oracle) = &self.skip_oracle {
            if oracle.should_skip(&source_info) {
                for &output in outputs {
                    let buffer = &mut buffers[output];
                    buffer.clear_to(self.catalog.dtypes()[output]);
                    buffer.set_skipped(true);
                    buffer.set_source_info(source_info.as_str());
                }
                return Ok(());
            }
        }

        stream.seek(SeekFrom::Start(component.offset)).map_err(|e| {
            WdsError::archive_read_with_source(
                &shard.archive,
                format!("failed to seek to offset {}", component.offset),
                e,
            )
        })?;

        let size = usize::try_from(component.size).map_err(|_| {
            WdsError::archive_read(
                &shard.archive,
                format!("component of {} bytes does not fit in memory", component.size),
            )
        })?;

        let data = match self.strategy {
            ReadStrategy::Share => stream.view(size)?,
            ReadStrategy::Copy => {
                // Catalog construction guarantees at least one fed output.
                let first = outputs[0];
                let dtype = self.catalog.dtypes()[first];
                let buffer = &mut buffers[first];
                let read = read_full(&mut **stream, buffer.resize(size / dtype.size(), dtype))
                    .map_err(|e| {
                        WdsError::archive_read_with_source(
                            &shard.archive,
                            format!("failed to read {} bytes at offset {}", size, component.offset),
                            e,
                        )
                    })?;
                if read != size {
                    return Err(WdsError::archive_read(
                        &shard.archive,
                        format!(
                            "read {} bytes at offset {}, expected {}",
                            read, component.offset, size
                        ),
                    ));
                }

                if outputs.len() == 1 {
                    buffer.set_skipped(false);
                    buffer.set_source_info(source_info);
                    return Ok(());
                }
                buffer.freeze()
            }
        };

        for &output in outputs {
            let buffer = &mut buffers[output];
            buffer.share(data.clone(), self.catalog.dtypes()[output]);
            buffer.set_skipped(false);
            buffer.set_source_info(source_info.as_str());
        }
        Ok(())
    }

    fn lock_stream(&self, shard_index: usize) -> Result<MutexGuard<'_, Box<dyn ShardStream>>> {
        self.streams[shard_index].lock().map_err(|_| {
            WdsError::archive_read(
                &self.catalog.shard(shard_index).archive,
                "archive stream lock poisoned by a failed reader",
            )
        })
    }
}

/// Reads until `buf` is full or the stream ends; returns bytes read.
fn read_full<R: Read + ?Sized>(reader: &mut R, mut buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while !buf.is_empty() {
        match reader.read(buf) {
            Ok(0) => break,
            Ok(n) => {
                total += n;
                buf = &mut buf[n..];
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::Path;

    use bytes::Bytes;

    use super::super::catalog::{BuildDiagnostics, CatalogBuilder};
    use super::super::outputs::OutputMap;
    use super::super::types::{ElementType, MissingComponentBehavior, ShardPaths};
    use crate::storage::MappedShard;

    fn archive_bytes(len: usize) -> Bytes {
        Bytes::from((0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>())
    }

    fn make_reader(
        index: &str,
        outputs: &OutputMap,
        archive: Bytes,
        force_copy_reads: bool,
    ) -> SampleReader {
        let mut diagnostics = BuildDiagnostics::new();
        let mut builder = CatalogBuilder::new(outputs, MissingComponentBehavior::Empty);
        builder
            .add_shard_from_reader(
                ShardPaths::new("a.tar", "a.idx"),
                Cursor::new(index.as_bytes().to_vec()),
                &mut diagnostics,
            )
            .unwrap();
        let catalog = Arc::new(builder.finish());
        let streams: Vec<Box<dyn ShardStream>> = vec![Box::new(MappedShard::new("a.tar", archive))];
        SampleReader::new(catalog, streams, force_copy_reads).unwrap()
    }

    #[test]
    fn test_round_trip_both_strategies() {
        let archive = archive_bytes(4096);
        let outputs = OutputMap::new(&["jpg", "cls", "txt"], None).unwrap();
        let index = "v1.0 2\njpg 512 100 cls 1024 4\ntxt 2048 7 jpg 3072 1\n";

        for force_copy_reads in [false, true] {
            let reader = make_reader(index, &outputs, archive.clone(), force_copy_reads);
            let expected = if force_copy_reads { ReadStrategy::Copy } else { ReadStrategy::Share };
            assert_eq!(reader.strategy(), expected);

            let mut buffers = reader.new_buffers();
            reader.read_sample(0, &mut buffers).unwrap();
            assert_eq!(buffers[0].as_bytes(), &archive[512..612]);
            assert_eq!(buffers[1].as_bytes(), &archive[1024..1028]);
            assert!(buffers[2].is_empty());
            assert_eq!(
                buffers[0].source_info(),
                "archive a.tar index file \"a.idx\" line 1 component offset 512"
            );

            reader.read_sample(1, &mut buffers).unwrap();
            assert_eq!(buffers[0].as_bytes(), &archive[3072..3073]);
            assert!(buffers[1].is_empty());
            assert_eq!(buffers[2].as_bytes(), &archive[2048..2055]);
        }
    }

    #[test]
    fn test_share_strategy_views_archive() {
        let archive = archive_bytes(2048);
        let outputs = OutputMap::new(&["bin"], None).unwrap();
        let reader = make_reader("v1.0 1\nbin 1024 64\n", &outputs, archive.clone(), false);

        let mut buffers = reader.new_buffers();
        reader.read_sample(0, &mut buffers).unwrap();
        assert!(buffers[0].is_shared());
        assert_eq!(buffers[0].as_bytes().as_ptr(), archive[1024..].as_ptr());
    }

    #[test]
    fn test_rereads_are_idempotent() {
        let outputs = OutputMap::new(&["jpg", "cls"], None).unwrap();
        let reader = make_reader("v1.0 1\njpg 0 300 cls 512 2\n", &outputs, archive_bytes(1024), true);

        let mut first = reader.new_buffers();
        let mut second = reader.new_buffers();
        reader.read_sample(0, &mut first).unwrap();
        reader.read_sample(0, &mut second).unwrap();
        reader.read_sample(0, &mut first).unwrap();

        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.as_bytes(), b.as_bytes());
            assert_eq!(a.source_info(), b.source_info());
        }
    }

    #[test]
    fn test_outputs_fed_by_one_component_alias() {
        let outputs = OutputMap::from_parts(
            vec![vec!["bin".into()], vec!["bin".into()]],
            vec![ElementType::UInt8, ElementType::Float32],
        )
        .unwrap();

        for force_copy_reads in [false, true] {
            let reader =
                make_reader("v1.0 1\nbin 512 16\n", &outputs, archive_bytes(1024), force_copy_reads);
            let mut buffers = reader.new_buffers();
            reader.read_sample(0, &mut buffers).unwrap();

            assert!(buffers[0].shares_memory_with(&buffers[1]));
            assert_eq!(buffers[0].num_elements(), 16);
            assert_eq!(buffers[1].num_elements(), 4);
            assert_eq!(buffers[1].dtype(), ElementType::Float32);
        }
    }

    #[test]
    fn test_buffers_take_catalog_types() {
        let outputs = OutputMap::new(&["img", "lbl"], Some(&["float32", "int64"][..])).unwrap();
        let reader = make_reader("v1.0 1\nimg 0 16 lbl 512 8\n", &outputs, archive_bytes(1024), true);

        let buffers = reader.new_buffers();
        let dtypes: Vec<_> = buffers.iter().map(SampleBuffer::dtype).collect();
        assert_eq!(dtypes, reader.catalog().dtypes());
        assert_eq!(dtypes, vec![ElementType::Float32, ElementType::Int64]);
    }

    #[test]
    fn test_skip_oracle_elides_components() {
        let outputs = OutputMap::new(&["jpg", "cls"], None).unwrap();
        let mut reader =
            make_reader("v1.0 1\njpg 0 16 cls 512 4\n", &outputs, archive_bytes(1024), false);
        let oracle: Arc<dyn SkipOracle> =
            Arc::new(|source: &str| source.ends_with("component offset 0"));
        reader.set_skip_oracle(Some(oracle));

        let mut buffers = reader.new_buffers();
        reader.read_sample(0, &mut buffers).unwrap();

        assert!(buffers[0].is_empty());
        assert!(buffers[0].is_skipped());
        assert!(buffers[0].source_info().ends_with("component offset 0"));
        assert!(!buffers[1].is_skipped());
        assert_eq!(buffers[1].len(), 4);
    }

    #[test]
    fn test_offset_beyond_archive() {
        let outputs = OutputMap::new(&["jpg"], None).unwrap();
        let reader = make_reader("v1.0 1\njpg 1024 16\n", &outputs, archive_bytes(1024), false);

        let mut buffers = reader.new_buffers();
        match reader.read_sample(0, &mut buffers) {
            Err(WdsError::OffsetOutOfRange { archive, index, line, offset, archive_size }) => {
                assert_eq!(archive, Path::new("a.tar"));
                assert_eq!(index, Path::new("a.idx"));
                assert_eq!(line, 1);
                assert_eq!(offset, 1024);
                assert_eq!(archive_size, 1024);
            }
            other => panic!("expected OffsetOutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_component() {
        let outputs = OutputMap::new(&["jpg"], None).unwrap();
        for force_copy_reads in [false, true] {
            let reader =
                make_reader("v1.0 1\njpg 512 1024\n", &outputs, archive_bytes(1000), force_copy_reads);
            let mut buffers = reader.new_buffers();
            let result = reader.read_sample(0, &mut buffers);
            assert!(matches!(result, Err(WdsError::ArchiveRead { .. })));
        }
    }

    #[test]
    fn test_bad_sample_index_and_buffer_count() {
        let outputs = OutputMap::new(&["jpg", "cls"], None).unwrap();
        let reader = make_reader("v1.0 1\njpg 0 16\n", &outputs, archive_bytes(1024), false);

        let mut buffers = reader.new_buffers();
        assert!(matches!(
            reader.read_sample(1, &mut buffers),
            Err(WdsError::SampleOutOfRange { index: 1, len: 1 })
        ));
        assert!(matches!(
            reader.read_sample(0, &mut buffers[..1]),
            Err(WdsError::ConfigMismatch { .. })
        ));
    }

    #[test]
    fn test_stream_count_must_match_catalog() {
        let outputs = OutputMap::new(&["jpg"], None).unwrap();
        let catalog = Arc::new(CatalogBuilder::new(&outputs, MissingComponentBehavior::Empty).finish());
        let streams: Vec<Box<dyn ShardStream>> =
            vec![Box::new(MappedShard::new("a.tar", archive_bytes(16)))];

        let result = SampleReader::new(catalog, streams, false);
        assert!(matches!(result, Err(WdsError::ConfigMismatch { .. })));
    }
}
