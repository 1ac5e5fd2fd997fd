// rust/wds-core/src/storage/local.rs

//! Local filesystem archive streams.
//!
//! Archives are memory-mapped when allowed so that sample components can
//! be handed out as zero-copy views. When mapping is disabled or fails the
//! archive is read through a buffered file handle instead.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use memmap2::MmapOptions;

use super::traits::{ShardStream, StreamOpener};
use crate::config::StorageConfig;
use crate::error::{Result, WdsError};

/// Opens archives from the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalOpener {
    /// Buffer size for buffered reads.
    buffer_size: usize,
    /// Whether to memory-map archives.
    use_mmap: bool,
    /// Whether to fault the whole mapping in up front.
    read_ahead: bool,
}

impl LocalOpener {
    /// Creates an opener from configuration.
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            buffer_size: config.buffer_size,
            use_mmap: !config.force_copy_reads,
            read_ahead: config.read_ahead,
        }
    }

    fn map(&self, file: &File) -> std::io::Result<memmap2::Mmap> {
        let mut options = MmapOptions::new();
        if self.read_ahead {
            options.populate();
        }
        // SAFETY: The file is opened read-only and the mapping is owned by the
        // returned `Bytes`, which keeps it alive for every view handed out.
        unsafe { options.map(file) }
    }
}

impl StreamOpener for LocalOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn ShardStream>> {
        let file = File::open(path)
            .map_err(|e| WdsError::storage_with_source(path, "failed to open archive", e))?;

        let size = file
            .metadata()
            .map_err(|e| WdsError::storage_with_source(path, "failed to read archive metadata", e))?
            .len();

        if self.use_mmap {
            match self.map(&file) {
                Ok(mmap) => return Ok(Box::new(MappedShard::new(path, Bytes::from_owner(mmap)))),
                Err(e) => {
                    tracing::debug!(
                        "memory-mapping {} failed, falling back to copy reads: {}",
                        path.display(),
                        e
                    );
                }
            }
        }

        Ok(Box::new(FileShard::new(path, file, size, self.buffer_size)))
    }
}

/// Buffered file stream; cannot share data.
struct FileShard {
    path: PathBuf,
    reader: BufReader<File>,
    size: u64,
}

impl FileShard {
    fn new(path: &Path, file: File, size: u64, buffer_size: usize) -> Self {
        Self {
            path: path.to_path_buf(),
            reader: BufReader::with_capacity(buffer_size, file),
            size,
        }
    }
}

impl Read for FileShard {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Seek for FileShard {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.reader.seek(pos)
    }
}

impl ShardStream for FileShard {
    fn path(&self) -> &Path {
        &self.path
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn can_share_data(&self) -> bool {
        false
    }

    fn view(&mut self, _length: usize) -> Result<Bytes> {
        Err(WdsError::archive_read(
            &self.path,
            "archive is not memory-mapped, zero-copy views are unavailable",
        ))
    }
}

/// Stream over memory whose lifetime is managed by `Bytes`.
///
/// Used for memory-mapped archives and for archives that already live in
/// memory.
pub struct MappedShard {
    path: PathBuf,
    data: Bytes,
    position: u64,
}

impl MappedShard {
    pub fn new(path: impl Into<PathBuf>, data: Bytes) -> Self {
        Self {
            path: path.into(),
            data,
            position: 0,
        }
    }

    fn remaining(&self) -> &[u8] {
        let start = (self.position as usize).min(self.data.len());
        &self.data[start..]
    }
}

impl Read for MappedShard {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = self.remaining();
        let to_read = buf.len().min(remaining.len());

        if to_read == 0 {
            return Ok(0);
        }

        buf[..to_read].copy_from_slice(&remaining[..to_read]);
        self.position += to_read as u64;
        Ok(to_read)
    }
}

impl Seek for MappedShard {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => self.data.len() as i64 + offset,
            SeekFrom::Current(offset) => self.position as i64 + offset,
        };

        if new_pos < 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "seek to negative position",
            ));
        }

        self.position = new_pos as u64;
        Ok(self.position)
    }
}

impl ShardStream for MappedShard {
    fn path(&self) -> &Path {
        &self.path
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn can_share_data(&self) -> bool {
        true
    }

    fn view(&mut self, length: usize) -> Result<Bytes> {
        let start = self.position as usize;
        let end = start.checked_add(length).filter(|end| *end <= self.data.len());

        match end {
            Some(end) => {
                self.position = end as u64;
                Ok(self.data.slice(start..end))
            }
            None => Err(WdsError::archive_read(
                &self.path,
                format!(
                    "view of {} bytes at position {} exceeds archive size {}",
                    length,
                    start,
                    self.data.len()
                ),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_archive(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(data).unwrap();
        path
    }

    fn opener(force_copy_reads: bool) -> LocalOpener {
        LocalOpener::new(&StorageConfig {
            force_copy_reads,
            buffer_size: 64,
            ..Default::default()
        })
    }

    #[test]
    fn test_mapped_stream_shares_data() {
        let temp = TempDir::new().unwrap();
        let data: Vec<u8> = (0..2048).map(|i| (i % 256) as u8).collect();
        let path = write_archive(&temp, "a.tar", &data);

        let mut stream = opener(false).open(&path).unwrap();
        assert!(stream.can_share_data());
        assert_eq!(stream.size(), 2048);
        assert_eq!(stream.path(), path.as_path());

        stream.seek(SeekFrom::Start(512)).unwrap();
        let view = stream.view(16).unwrap();
        assert_eq!(&view[..], &data[512..528]);

        // the view advanced the position
        let mut next = [0u8; 4];
        stream.read_exact(&mut next).unwrap();
        assert_eq!(&next, &data[528..532]);
    }

    #[test]
    fn test_view_past_end_fails() {
        let mut stream = MappedShard::new("mem.tar", Bytes::from_static(b"0123456789"));
        stream.seek(SeekFrom::Start(8)).unwrap();
        let result = stream.view(4);
        assert!(matches!(result, Err(WdsError::ArchiveRead { .. })));
    }

    #[test]
    fn test_forced_copy_reads_use_file_stream() {
        let temp = TempDir::new().unwrap();
        let path = write_archive(&temp, "a.tar", b"hello archive world");

        let mut stream = opener(true).open(&path).unwrap();
        assert!(!stream.can_share_data());
        assert!(stream.view(4).is_err());

        stream.seek(SeekFrom::Start(6)).unwrap();
        let mut buf = [0u8; 7];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"archive");
    }

    #[test]
    fn test_read_ahead_mapping() {
        let temp = TempDir::new().unwrap();
        let path = write_archive(&temp, "a.tar", &[7u8; 1024]);

        let opener = LocalOpener::new(&StorageConfig {
            read_ahead: true,
            ..Default::default()
        });
        let mut stream = opener.open(&path).unwrap();
        assert_eq!(&stream.view(3).unwrap()[..], &[7, 7, 7]);
    }

    #[test]
    fn test_short_read_at_end() {
        let mut stream = MappedShard::new("mem.tar", Bytes::from_static(b"abcdef"));
        stream.seek(SeekFrom::Start(4)).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(stream.read(&mut buf).unwrap(), 2);
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_open_missing_archive() {
        let result = opener(false).open(Path::new("/nonexistent/archive.tar"));
        assert!(matches!(result, Err(WdsError::Storage { .. })));
    }
}
