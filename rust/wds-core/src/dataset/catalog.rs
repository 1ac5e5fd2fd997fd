// rust/wds-core/src/dataset/catalog.rs

//! Catalog of samples assembled from index files.
//!
//! Every index line becomes a candidate sample. Its components are matched
//! against the declared outputs; components that feed nothing are dropped,
//! and a sample that leaves outputs unsatisfied is handled according to the
//! [`MissingComponentBehavior`]. Components, output assignments, and empty
//! outputs live in flat arenas that samples address by range, so dropping a
//! sample is a truncation of the arenas back to their length before it.

use std::io::BufRead;
use std::ops::Range;
use std::path::Path;

use crate::error::{Result, WdsError};

use super::index::{parse_index, parse_index_file};
use super::outputs::OutputMap;
use super::types::{
    ComponentDesc, ElementType, IndexComponent, IndexSample, MissingComponentBehavior, SampleDesc,
    ShardPaths,
};

/// Collects non-fatal findings of one catalog build.
///
/// A component claiming an output that an earlier component of the same
/// sample already satisfied is ignored; the first such case is logged and
/// the rest are only counted.
#[derive(Debug, Default)]
pub struct BuildDiagnostics {
    duplicate_components: usize,
    duplicate_warned: bool,
}

impl BuildDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    fn duplicate_component(&mut self, output: usize, line: usize, index_path: &Path) {
        self.duplicate_components += 1;
        if !self.duplicate_warned {
            self.duplicate_warned = true;
            tracing::warn!(
                "Multiple components matching output {} at line {} file \"{}\".",
                output,
                line,
                index_path.display()
            );
        }
    }

    /// Number of ignored duplicate component matches.
    pub fn duplicate_components(&self) -> usize {
        self.duplicate_components
    }

    /// Whether the duplicate warning has been emitted.
    pub fn duplicate_warned(&self) -> bool {
        self.duplicate_warned
    }
}

/// The finished, read-only sample catalog.
#[derive(Debug, Clone, Default)]
pub struct ShardCatalog {
    samples: Vec<SampleDesc>,
    components: Vec<ComponentDesc>,
    output_indices: Vec<usize>,
    empty_outputs: Vec<usize>,
    shards: Vec<ShardPaths>,
    // Element type per output, as validated during the build.
    dtypes: Vec<ElementType>,
}

/// Arena lengths recorded before a shard is committed.
#[derive(Debug, Clone, Copy)]
struct ArenaMark {
    samples: usize,
    components: usize,
    output_indices: usize,
    empty_outputs: usize,
}

impl ShardCatalog {
    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn num_outputs(&self) -> usize {
        self.dtypes.len()
    }

    /// Element type of every output.
    pub fn dtypes(&self) -> &[ElementType] {
        &self.dtypes
    }

    pub fn sample(&self, index: usize) -> Option<&SampleDesc> {
        self.samples.get(index)
    }

    pub fn samples(&self) -> &[SampleDesc] {
        &self.samples
    }

    /// Components of `sample`, in index-line order.
    pub fn components(&self, sample: &SampleDesc) -> &[ComponentDesc] {
        &self.components[sample.components.clone()]
    }

    /// Outputs fed by `component`.
    pub fn outputs(&self, component: &ComponentDesc) -> &[usize] {
        &self.output_indices[component.outputs.clone()]
    }

    /// Outputs of `sample` that must be served as zero-length buffers.
    pub fn empty_outputs(&self, sample: &SampleDesc) -> &[usize] {
        &self.empty_outputs[sample.empty_outputs.clone()]
    }

    pub fn shard(&self, shard_index: usize) -> &ShardPaths {
        &self.shards[shard_index]
    }

    pub fn shards(&self) -> &[ShardPaths] {
        &self.shards
    }

    /// Total stored components across all samples.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Total stored output assignments across all components.
    pub fn output_assignment_count(&self) -> usize {
        self.output_indices.len()
    }

    fn mark(&self) -> ArenaMark {
        ArenaMark {
            samples: self.samples.len(),
            components: self.components.len(),
            output_indices: self.output_indices.len(),
            empty_outputs: self.empty_outputs.len(),
        }
    }

    fn rollback(&mut self, mark: ArenaMark) {
        self.samples.truncate(mark.samples);
        self.components.truncate(mark.components);
        self.output_indices.truncate(mark.output_indices);
        self.empty_outputs.truncate(mark.empty_outputs);
    }
}

/// Builds a [`ShardCatalog`] shard by shard.
///
/// The catalog only becomes visible through [`finish`](Self::finish); a
/// failing shard consumes nothing the caller could observe.
pub struct CatalogBuilder<'a> {
    outputs: &'a OutputMap,
    behavior: MissingComponentBehavior,
    catalog: ShardCatalog,
    // Scratch tables reused for every index file.
    index_samples: Vec<IndexSample>,
    index_components: Vec<IndexComponent>,
    // Which outputs the current sample satisfies; cleared between samples.
    satisfied: Vec<bool>,
}

impl<'a> CatalogBuilder<'a> {
    pub fn new(outputs: &'a OutputMap, behavior: MissingComponentBehavior) -> Self {
        Self {
            outputs,
            behavior,
            catalog: ShardCatalog {
                dtypes: outputs.dtypes().to_vec(),
                ..Default::default()
            },
            index_samples: Vec::new(),
            index_components: Vec::new(),
            satisfied: vec![false; outputs.len()],
        }
    }

    /// Parses the index file of `paths` and adds its samples.
    ///
    /// # Errors
    ///
    /// Returns the parser's errors, `SizeTypeMismatch`, or, under
    /// [`MissingComponentBehavior::Error`], `IncompleteSample`.
    pub fn add_shard(&mut self, paths: ShardPaths, diagnostics: &mut BuildDiagnostics) -> Result<()> {
        self.index_samples.clear();
        self.index_components.clear();
        parse_index_file(&paths.index, &mut self.index_samples, &mut self.index_components)?;
        self.commit_shard(paths, diagnostics)
    }

    /// Like [`add_shard`](Self::add_shard) but reads the index from `reader`.
    ///
    /// # Errors
    ///
    /// Same as [`add_shard`](Self::add_shard).
    pub fn add_shard_from_reader<R: BufRead>(
        &mut self,
        paths: ShardPaths,
        reader: R,
        diagnostics: &mut BuildDiagnostics,
    ) -> Result<()> {
        self.index_samples.clear();
        self.index_components.clear();
        parse_index(reader, &paths.index, &mut self.index_samples, &mut self.index_components)?;
        self.commit_shard(paths, diagnostics)
    }

    pub fn finish(self) -> ShardCatalog {
        self.catalog
    }

    fn commit_shard(&mut self, paths: ShardPaths, diagnostics: &mut BuildDiagnostics) -> Result<()> {
        let shard_index = self.catalog.shards.len();
        let mark = self.catalog.mark();

        let samples = std::mem::take(&mut self.index_samples);
        let result = samples
            .iter()
            .try_for_each(|sample| self.add_sample(sample, shard_index, &paths.index, diagnostics));
        self.index_samples = samples;
        if let Err(e) = result {
            self.catalog.rollback(mark);
            return Err(e);
        }

        tracing::debug!(
            "indexed {} of {} samples from {}",
            self.catalog.samples.len() - mark.samples,
            self.index_samples.len(),
            paths.index.display()
        );
        self.catalog.shards.push(paths);
        Ok(())
    }

    fn add_sample(
        &mut self,
        sample: &IndexSample,
        shard_index: usize,
        index_path: &Path,
        diagnostics: &mut BuildDiagnostics,
    ) -> Result<()> {
        let line = sample.line_number;
        let components_start = self.catalog.components.len();
        let outputs_start = self.catalog.output_indices.len();
        let mut satisfied_count = 0;

        self.satisfied.fill(false);

        for component in &self.index_components[sample.components.clone()] {
            let start = self.catalog.output_indices.len();

            for &output in self.outputs.outputs_for(&component.ext) {
                if self.satisfied[output] {
                    diagnostics.duplicate_component(output, line, index_path);
                    continue;
                }

                let element_size = self.outputs.dtype(output).size();
                if component.size % element_size as u64 != 0 {
                    return Err(WdsError::SizeTypeMismatch {
                        path: index_path.to_path_buf(),
                        line,
                        output,
                        size: component.size,
                        element_size,
                    });
                }

                self.catalog.output_indices.push(output);
                self.satisfied[output] = true;
                satisfied_count += 1;
            }

            let outputs: Range<usize> = start..self.catalog.output_indices.len();
            if !outputs.is_empty() {
                self.catalog.components.push(ComponentDesc {
                    ext: component.ext.clone(),
                    offset: component.offset,
                    size: component.size,
                    outputs,
                });
            }
        }

        let components = components_start..self.catalog.components.len();
        let empty_start = self.catalog.empty_outputs.len();

        if satisfied_count < self.outputs.len() {
            match self.behavior {
                MissingComponentBehavior::Empty => {
                    let missing = self
                        .satisfied
                        .iter()
                        .enumerate()
                        .filter(|(_, satisfied)| !**satisfied)
                        .map(|(output, _)| output);
                    self.catalog.empty_outputs.extend(missing);
                }
                MissingComponentBehavior::Skip => {
                    self.catalog.components.truncate(components_start);
                    self.catalog.output_indices.truncate(outputs_start);
                    return Ok(());
                }
                MissingComponentBehavior::Error => {
                    return Err(WdsError::incomplete_sample(index_path, line));
                }
            }
        }

        self.catalog.samples.push(SampleDesc {
            components,
            empty_outputs: empty_start..self.catalog.empty_outputs.len(),
            shard_index,
            line_number: line,
        });
        Ok(())
    }
}

/// Builds the catalog for all `shards` in order.
///
/// # Errors
///
/// Returns the first error of any shard; no partial catalog is returned.
pub fn build_catalog(
    shards: &[ShardPaths],
    outputs: &OutputMap,
    behavior: MissingComponentBehavior,
    diagnostics: &mut BuildDiagnostics,
) -> Result<ShardCatalog> {
    let mut builder = CatalogBuilder::new(outputs, behavior);
    for paths in shards {
        builder.add_shard(paths.clone(), diagnostics)?;
    }
    Ok(builder.finish())
}
