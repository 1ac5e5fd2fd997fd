// rust/wds-core/src/dataset/outputs.rs

//! Mapping from component extensions to declared output slots.

use std::collections::HashMap;

use crate::error::{Result, WdsError};

use super::types::{ElementType, EXT_DELIMITER};

/// The declared output slots and the extension lookup built from them.
#[derive(Debug, Clone)]
pub struct OutputMap {
    extensions: Vec<Vec<String>>,
    dtypes: Vec<ElementType>,
    ext_map: HashMap<String, Vec<usize>>,
}

impl OutputMap {
    /// Builds the output map from extension bundles and optional type names.
    ///
    /// Each bundle is one output; alternatives inside a bundle are separated
    /// by [`EXT_DELIMITER`]. Without `dtypes` every output is `uint8`.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedType` for an unknown type name and
    /// `ConfigMismatch` if no output is declared or the bundle and type
    /// counts differ.
    pub fn new<S: AsRef<str>>(ext_bundles: &[S], dtypes: Option<&[S]>) -> Result<Self> {
        let extensions: Vec<Vec<String>> = ext_bundles
            .iter()
            .map(|bundle| split_bundle(bundle.as_ref()))
            .collect();

        let dtypes = match dtypes {
            Some(names) => names
                .iter()
                .map(|name| name.as_ref().parse())
                .collect::<Result<Vec<ElementType>>>()?,
            None => vec![ElementType::UInt8; extensions.len()],
        };

        Self::from_parts(extensions, dtypes)
    }

    /// Builds the output map from already split extension sets.
    ///
    /// # Errors
    ///
    /// Returns `ConfigMismatch` if no output is declared or the counts differ.
    pub fn from_parts(extensions: Vec<Vec<String>>, dtypes: Vec<ElementType>) -> Result<Self> {
        if extensions.is_empty() {
            return Err(WdsError::config_mismatch("no outputs declared"));
        }
        if extensions.len() != dtypes.len() {
            return Err(WdsError::config_mismatch(format!(
                "Number of extensions ({}) does not match the number of provided types ({})",
                extensions.len(),
                dtypes.len()
            )));
        }

        let mut ext_map: HashMap<String, Vec<usize>> = HashMap::new();
        for (output, exts) in extensions.iter().enumerate() {
            for ext in exts {
                ext_map.entry(ext.clone()).or_default().push(output);
            }
        }

        Ok(Self {
            extensions,
            dtypes,
            ext_map,
        })
    }

    /// Number of declared outputs.
    pub fn len(&self) -> usize {
        self.dtypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dtypes.is_empty()
    }

    /// Outputs fed by components with extension `ext`, in output order.
    pub fn outputs_for(&self, ext: &str) -> &[usize] {
        self.ext_map.get(ext).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn dtype(&self, output: usize) -> ElementType {
        self.dtypes[output]
    }

    pub fn dtypes(&self) -> &[ElementType] {
        &self.dtypes
    }

    /// Accepted extensions of `output`.
    pub fn extensions(&self, output: usize) -> &[String] {
        &self.extensions[output]
    }
}

/// Splits a bundle on the delimiter, dropping empty tokens and duplicates.
fn split_bundle(bundle: &str) -> Vec<String> {
    let mut exts: Vec<String> = Vec::new();
    for ext in bundle.split(EXT_DELIMITER).filter(|ext| !ext.is_empty()) {
        if !exts.iter().any(|known| known == ext) {
            exts.push(ext.to_string());
        }
    }
    exts
}
