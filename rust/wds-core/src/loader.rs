// rust/wds-core/src/loader.rs

//! The loader: configuration in, typed sample buffers out.
//!
//! [`WdsLoader`] validates its configuration, builds the sample catalog from
//! every index file, opens one stream per archive, picks the read strategy,
//! and positions a cursor at the start of its shard. Construction and
//! [`rebuild`](WdsLoader::rebuild) either succeed completely or leave
//! nothing behind.
//!
//! # Example
//!
//! ```ignore
//! use wds_core::{WdsConfig, WdsLoader};
//!
//! let config = WdsConfig::from_file("loader.toml")?.with_env_overrides();
//! let mut loader = WdsLoader::from_config(config)?;
//!
//! let mut buffers = loader.prepare_buffers();
//! while let Some(index) = loader.read_next(&mut buffers)? {
//!     // buffers[i] holds output i of sample `index`
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use crate::config::WdsConfig;
use crate::dataset::{
    build_catalog, BuildDiagnostics, ReadStrategy, SampleBuffer, SampleReader, ShardCatalog,
    ShardCursor, SkipOracle,
};
use crate::error::Result;
use crate::storage::{LocalOpener, StreamOpener};

/// Loads samples of one shard of an indexed archive dataset.
pub struct WdsLoader {
    config: WdsConfig,
    opener: Arc<dyn StreamOpener>,
    reader: SampleReader,
    cursor: ShardCursor,
    skip_oracle: Option<Arc<dyn SkipOracle>>,
}

impl WdsLoader {
    /// Creates a loader reading archives from the local filesystem.
    ///
    /// # Errors
    ///
    /// Returns any configuration, index, or storage error met while
    /// building.
    pub fn from_config(config: WdsConfig) -> Result<Self> {
        let opener = Arc::new(LocalOpener::new(&config.storage));
        Self::with_opener(config, opener)
    }

    /// Loads configuration from a TOML file, applies `WDS_*` environment
    /// overrides, and builds the loader.
    ///
    /// # Errors
    ///
    /// Same as [`from_config`](Self::from_config), plus file and parse errors.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_config(WdsConfig::from_file(path)?.with_env_overrides())
    }

    /// Creates a loader opening archives through `opener`.
    ///
    /// # Errors
    ///
    /// Same as [`from_config`](Self::from_config).
    pub fn with_opener(config: WdsConfig, opener: Arc<dyn StreamOpener>) -> Result<Self> {
        config.validate()?;
        let (reader, cursor) = build(&config, opener.as_ref())?;

        Ok(Self {
            config,
            opener,
            reader,
            cursor,
            skip_oracle: None,
        })
    }

    /// Number of samples in the catalog.
    pub fn len(&self) -> usize {
        self.reader.catalog().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn config(&self) -> &WdsConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<ShardCatalog> {
        self.reader.catalog()
    }

    pub fn read_strategy(&self) -> ReadStrategy {
        self.reader.strategy()
    }

    pub fn cursor(&self) -> &ShardCursor {
        &self.cursor
    }

    /// Installs or removes the oracle consulted before every component read.
    pub fn set_skip_oracle(&mut self, oracle: Option<Arc<dyn SkipOracle>>) {
        self.skip_oracle = oracle.clone();
        self.reader.set_skip_oracle(oracle);
    }

    /// One empty buffer per output, typed by the declared element types.
    pub fn prepare_buffers(&self) -> Vec<SampleBuffer> {
        self.reader.new_buffers()
    }

    /// Reads sample `index` of the catalog into `buffers`.
    ///
    /// # Errors
    ///
    /// See [`SampleReader::read_sample`].
    pub fn read_sample(&self, index: usize, buffers: &mut [SampleBuffer]) -> Result<()> {
        self.reader.read_sample(index, buffers)
    }

    /// Reads the sample under the cursor and advances it.
    ///
    /// Returns the catalog index read, or `None` if this shard has no
    /// samples to serve. The cursor only moves when the read succeeds.
    ///
    /// # Errors
    ///
    /// See [`SampleReader::read_sample`].
    pub fn read_next(&mut self, buffers: &mut [SampleBuffer]) -> Result<Option<usize>> {
        let Some(index) = self.cursor.peek() else {
            return Ok(None);
        };
        self.reader.read_sample(index, buffers)?;
        self.cursor.commit();
        Ok(Some(index))
    }

    /// Moves the cursor back to the shard start, or to the first sample of
    /// the catalog when `wrap_to_shard` is false.
    pub fn reset(&mut self, wrap_to_shard: bool) {
        self.cursor.rewind(wrap_to_shard);
    }

    /// A cursor for another shard of the same catalog, with this loader's
    /// `stick_to_shard` setting.
    ///
    /// # Errors
    ///
    /// Returns `InvalidShard` for an out of range shard.
    pub fn cursor_for(&self, shard_id: u32, num_shards: u32) -> Result<ShardCursor> {
        ShardCursor::new(
            shard_id,
            num_shards,
            self.len(),
            self.config.sharding.stick_to_shard,
        )
    }

    /// Re-reads every index file and reopens every archive.
    ///
    /// On failure the loader keeps serving the previous catalog.
    ///
    /// # Errors
    ///
    /// Same as [`from_config`](Self::from_config).
    pub fn rebuild(&mut self) -> Result<()> {
        let (mut reader, cursor) = build(&self.config, self.opener.as_ref())?;
        reader.set_skip_oracle(self.skip_oracle.clone());
        self.reader = reader;
        self.cursor = cursor;
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (SampleReader, ShardCursor) {
        (self.reader, self.cursor)
    }
}

fn build(config: &WdsConfig, opener: &dyn StreamOpener) -> Result<(SampleReader, ShardCursor)> {
    let shards = config.dataset.shard_paths()?;
    let outputs = config.dataset.output_map()?;
    let behavior = config.dataset.missing_behavior()?;

    let mut diagnostics = BuildDiagnostics::new();
    let catalog = build_catalog(&shards, &outputs, behavior, &mut diagnostics)?;
    if diagnostics.duplicate_components() > 0 {
        tracing::debug!(
            "ignored {} duplicate component matches",
            diagnostics.duplicate_components()
        );
    }

    let streams = shards
        .iter()
        .map(|paths| opener.open(&paths.archive))
        .collect::<Result<Vec<_>>>()?;

    let len = catalog.len();
    let reader = SampleReader::new(
        Arc::new(catalog),
        streams,
        config.storage.force_copy_reads,
    )?;
    let cursor = ShardCursor::new(
        config.sharding.shard_id,
        config.sharding.num_shards,
        len,
        config.sharding.stick_to_shard,
    )?;

    tracing::info!(
        "indexed {} samples from {} archives, shard {}/{} covers {:?}, read strategy {:?}",
        len,
        shards.len(),
        config.sharding.shard_id,
        config.sharding.num_shards,
        cursor.range(),
        reader.strategy()
    );

    Ok((reader, cursor))
}
