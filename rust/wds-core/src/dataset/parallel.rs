// rust/wds-core/src/dataset/parallel.rs

//! Parallel sample loading.
//!
//! A loader's shard is split again into contiguous partitions, one per
//! worker. Workers run as blocking tasks, each with its own buffers, and
//! share the reader, whose archive streams are locked per component read.
//! Samples arrive through a bounded channel in completion order.

use std::ops::Range;
use std::sync::Arc;

use tokio::sync::mpsc;

use super::buffer::SampleBuffer;
use super::reader::{ReadStrategy, SampleReader};
use super::sharding::shard_range;
use crate::error::{Result, WdsError};
use crate::loader::WdsLoader;

/// Configuration for parallel sample loading.
#[derive(Debug, Clone)]
pub struct ParallelLoadConfig {
    /// Number of workers reading concurrently.
    pub parallelism: usize,
    /// Channel slots per worker.
    pub channel_buffer: usize,
}

impl Default for ParallelLoadConfig {
    fn default() -> Self {
        Self {
            parallelism: 4,
            channel_buffer: 4,
        }
    }
}

/// A sample read by a worker.
#[derive(Debug, Clone)]
pub struct LoadedSample {
    /// Catalog index of the sample.
    pub index: usize,
    /// The worker that read it.
    pub worker_id: u32,
    /// One buffer per output.
    pub buffers: Vec<SampleBuffer>,
}

/// Reads a range of catalog samples with several workers.
pub struct ParallelSampleLoader {
    reader: Arc<SampleReader>,
    range: Range<usize>,
    config: ParallelLoadConfig,
}

impl ParallelSampleLoader {
    /// Creates a loader over `range` of the reader's catalog.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if `parallelism` or `channel_buffer` is zero
    /// or `range` exceeds the catalog.
    pub fn new(
        reader: Arc<SampleReader>,
        range: Range<usize>,
        config: ParallelLoadConfig,
    ) -> Result<Self> {
        if config.parallelism == 0 {
            return Err(WdsError::config("parallelism must be greater than 0"));
        }
        if config.channel_buffer == 0 {
            return Err(WdsError::config("channel_buffer must be greater than 0"));
        }
        if range.start > range.end || range.end > reader.catalog().len() {
            return Err(WdsError::config(format!(
                "sample range {:?} exceeds catalog of {} samples",
                range,
                reader.catalog().len()
            )));
        }

        Ok(Self {
            reader,
            range,
            config,
        })
    }

    /// Takes over `loader`'s reader and loads its shard.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn from_loader(loader: WdsLoader, config: ParallelLoadConfig) -> Result<Self> {
        let (reader, cursor) = loader.into_parts();
        Self::new(Arc::new(reader), cursor.range(), config)
    }

    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn read_strategy(&self) -> ReadStrategy {
        self.reader.strategy()
    }

    /// Starts the workers and returns the receiving end of their output.
    ///
    /// Every sample of the range is sent exactly once. A worker stops at its
    /// first error, after sending it.
    pub async fn load(&self) -> mpsc::Receiver<Result<LoadedSample>> {
        let workers = self.config.parallelism.min(self.range.len()).max(1);
        let (tx, rx) = mpsc::channel(self.config.channel_buffer * workers);

        for worker_id in 0..workers {
            let partition = match shard_range(worker_id as u32, workers as u32, self.range.len()) {
                Ok(partition) => partition,
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    break;
                }
            };
            let indices = (self.range.start + partition.start)..(self.range.start + partition.end);
            let reader = self.reader.clone();
            let tx = tx.clone();

            tokio::task::spawn_blocking(move || {
                for index in indices {
                    let mut buffers = reader.new_buffers();
                    let result = reader.read_sample(index, &mut buffers).map(|_| LoadedSample {
                        index,
                        worker_id: worker_id as u32,
                        buffers,
                    });
                    let failed = result.is_err();
                    if tx.blocking_send(result).is_err() || failed {
                        return; // Receiver dropped or read failed
                    }
                }
            });
        }

        rx
    }

    /// Loads the whole range and returns the samples in catalog order.
    ///
    /// Use [`load`](Self::load) to stream instead of holding every sample.
    ///
    /// # Errors
    ///
    /// Returns the first error any worker reported.
    pub async fn load_all(&self) -> Result<Vec<LoadedSample>> {
        let mut rx = self.load().await;
        let mut samples = Vec::with_capacity(self.range.len());

        while let Some(result) = rx.recv().await {
            samples.push(result?);
        }

        samples.sort_by_key(|sample| sample.index);
        Ok(samples)
    }
}
