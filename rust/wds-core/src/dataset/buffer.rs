// rust/wds-core/src/dataset/buffer.rs

//! Typed destination buffers for sample outputs.
//!
//! A buffer either owns its bytes (filled by a copy read) or shares a
//! reference-counted byte range with other buffers or with a memory-mapped
//! archive. Sharing never copies: several outputs fed by the same component
//! point at the same `Bytes`, each reinterpreting it with its own element
//! type.

use bytes::{Bytes, BytesMut};

use super::types::ElementType;

/// One output of a sample.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    /// Scratch space for copy reads; retains its capacity across samples.
    owned: BytesMut,
    /// Set when the contents alias memory held elsewhere.
    shared: Option<Bytes>,
    dtype: ElementType,
    source_info: String,
    skipped: bool,
}

impl SampleBuffer {
    /// Creates an empty buffer of the given element type.
    pub fn new(dtype: ElementType) -> Self {
        Self {
            owned: BytesMut::new(),
            shared: None,
            dtype,
            source_info: String::new(),
            skipped: false,
        }
    }

    /// Resizes to `elements` elements of `dtype` and returns the owned bytes.
    ///
    /// A buffer that currently shares memory drops its reference first, so
    /// writes never reach bytes other buffers can observe.
    pub fn resize(&mut self, elements: usize, dtype: ElementType) -> &mut [u8] {
        let len = elements * dtype.size();
        self.dtype = dtype;
        self.shared = None;
        self.owned.resize(len, 0);
        &mut self.owned[..]
    }

    /// Points this buffer at `data`, reinterpreted as `dtype`.
    pub fn share(&mut self, data: Bytes, dtype: ElementType) {
        self.dtype = dtype;
        self.owned.clear();
        self.shared = Some(data);
    }

    /// Converts owned contents into shared storage and returns a handle to it.
    ///
    /// Further buffers can alias the returned bytes with [`share`](Self::share).
    pub fn freeze(&mut self) -> Bytes {
        match &self.shared {
            Some(bytes) => bytes.clone(),
            None => {
                let bytes = self.owned.split().freeze();
                self.shared = Some(bytes.clone());
                bytes
            }
        }
    }

    /// Drops contents, metadata, and the skip flag, keeping the element type.
    pub fn reset(&mut self) {
        self.owned.clear();
        self.shared = None;
        self.source_info.clear();
        self.skipped = false;
    }

    /// Resets to a zero-length buffer of `dtype`.
    pub fn clear_to(&mut self, dtype: ElementType) {
        self.reset();
        self.dtype = dtype;
    }

    pub fn as_bytes(&self) -> &[u8] {
        match &self.shared {
            Some(bytes) => bytes,
            None => &self.owned,
        }
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of elements of the buffer's element type.
    pub fn num_elements(&self) -> usize {
        self.len() / self.dtype.size()
    }

    pub fn dtype(&self) -> ElementType {
        self.dtype
    }

    pub fn element_size(&self) -> usize {
        self.dtype.size()
    }

    /// Whether the contents are shared rather than owned.
    pub fn is_shared(&self) -> bool {
        self.shared.is_some()
    }

    /// Whether this buffer and `other` alias the same memory.
    pub fn shares_memory_with(&self, other: &SampleBuffer) -> bool {
        let (a, b) = (self.as_bytes(), other.as_bytes());
        !a.is_empty() && a.as_ptr() == b.as_ptr() && a.len() == b.len()
    }

    /// Where the bytes came from (archive, index, line, offset).
    pub fn source_info(&self) -> &str {
        &self.source_info
    }

    pub fn set_source_info(&mut self, source_info: impl Into<String>) {
        self.source_info = source_info.into();
    }

    /// Whether the skip oracle elided this output.
    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    pub fn set_skipped(&mut self, skipped: bool) {
        self.skipped = skipped;
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new(ElementType::default())
    }
}
