// rust/wds-core/src/dataset/sharding.rs

use std::ops::Range;

use crate::error::{Result, WdsError};

/// First catalog index of `shard_id`'s partition.
///
/// The catalog is split into `num_shards` contiguous ranges in catalog
/// order. Every range holds `len / num_shards` samples and the first
/// `len % num_shards` ranges hold one more.
///
/// # Errors
///
/// Returns `InvalidShard` if `num_shards` is zero or `shard_id` is not below
/// it.
pub fn start_index(shard_id: u32, num_shards: u32, len: usize) -> Result<usize> {
    check_shard(shard_id, num_shards)?;
    Ok(partition_start(shard_id as usize, num_shards as usize, len))
}

/// The catalog range assigned to `shard_id`.
///
/// # Errors
///
/// Returns `InvalidShard` for an out of range shard.
pub fn shard_range(shard_id: u32, num_shards: u32, len: usize) -> Result<Range<usize>> {
    check_shard(shard_id, num_shards)?;
    let (id, n) = (shard_id as usize, num_shards as usize);
    Ok(partition_start(id, n, len)..partition_start(id + 1, n, len))
}

fn check_shard(shard_id: u32, num_shards: u32) -> Result<()> {
    if num_shards == 0 || shard_id >= num_shards {
        return Err(WdsError::invalid_shard(shard_id, num_shards));
    }
    Ok(())
}

fn partition_start(id: usize, n: usize, len: usize) -> usize {
    let base = len / n;
    let remainder = len % n;
    id * base + id.min(remainder)
}

/// Read position of one reader over the catalog.
///
/// Without `stick_to_shard` the cursor starts at its partition and walks
/// the whole catalog, wrapping back to the partition start when it reaches
/// the catalog end. With `stick_to_shard` it wraps at the partition end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardCursor {
    range: Range<usize>,
    len: usize,
    stick_to_shard: bool,
    position: usize,
}

impl ShardCursor {
    /// Creates a cursor positioned at the start of `shard_id`'s partition.
    ///
    /// # Errors
    ///
    /// Returns `InvalidShard` for an out of range shard.
    pub fn new(shard_id: u32, num_shards: u32, len: usize, stick_to_shard: bool) -> Result<Self> {
        let range = shard_range(shard_id, num_shards, len)?;
        Ok(Self {
            position: range.start,
            range,
            len,
            stick_to_shard,
        })
    }

    /// Catalog index the next read should use.
    pub fn position(&self) -> usize {
        self.position
    }

    /// This reader's partition.
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// Number of samples in this reader's partition.
    pub fn shard_len(&self) -> usize {
        self.range.len()
    }

    /// Returns the index to read next and moves past it.
    ///
    /// Returns `None` only when there is nothing to read (an empty catalog,
    /// or an empty partition with `stick_to_shard`).
    pub fn advance(&mut self) -> Option<usize> {
        let index = self.peek()?;
        self.commit();
        Some(index)
    }

    /// Returns the index to read next without moving past it.
    ///
    /// Wraps first if the cursor sits at its end, so the returned index is
    /// always readable. Call [`commit`](Self::commit) once the read succeeded.
    pub fn peek(&mut self) -> Option<usize> {
        let end = self.end();
        if self.position >= end {
            self.wrap();
        }
        (self.position < end).then_some(self.position)
    }

    /// Moves past the index last returned by [`peek`](Self::peek).
    pub fn commit(&mut self) {
        if self.position < self.end() {
            self.position += 1;
        }
    }

    fn end(&self) -> usize {
        if self.stick_to_shard {
            self.range.end
        } else {
            self.len
        }
    }

    /// Moves back to the start of this reader's partition.
    pub fn wrap(&mut self) {
        self.position = self.range.start;
    }

    /// Moves to the partition start, or to index 0 when `wrap_to_shard` is
    /// false.
    pub fn rewind(&mut self, wrap_to_shard: bool) {
        if wrap_to_shard {
            self.wrap();
        } else {
            self.position = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ten_samples_four_shards() {
        let ranges: Vec<_> = (0..4).map(|id| shard_range(id, 4, 10).unwrap()).collect();
        let sizes: Vec<_> = ranges.iter().map(|r| r.len()).collect();

        assert_eq!(sizes, vec![3, 3, 2, 2]);
        assert_eq!(ranges[0], 0..3);
        assert_eq!(ranges[1], 3..6);
        assert_eq!(ranges[2], 6..8);
        assert_eq!(ranges[3], 8..10);

        let starts: Vec<_> = (0..4).map(|id| start_index(id, 4, 10).unwrap()).collect();
        assert_eq!(starts, vec![0, 3, 6, 8]);
    }

    #[test]
    fn test_partitions_cover_catalog() {
        for len in [0usize, 1, 7, 64, 101] {
            for num_shards in 1..=9u32 {
                let mut covered = 0;
                for shard_id in 0..num_shards {
                    let range = shard_range(shard_id, num_shards, len).unwrap();
                    assert_eq!(range.start, covered, "gap before shard {shard_id}");
                    let expected = len / num_shards as usize;
                    assert!(range.len() == expected || range.len() == expected + 1);
                    covered = range.end;
                }
                assert_eq!(covered, len);
            }
        }
    }

    #[test]
    fn test_more_shards_than_samples() {
        assert_eq!(shard_range(0, 5, 3).unwrap(), 0..1);
        assert_eq!(shard_range(2, 5, 3).unwrap(), 2..3);
        assert_eq!(shard_range(4, 5, 3).unwrap(), 3..3);
    }

    #[test]
    fn test_invalid_shard() {
        assert!(matches!(
            start_index(4, 4, 10),
            Err(WdsError::InvalidShard { shard_id: 4, total_shards: 4 })
        ));
        assert!(shard_range(0, 0, 10).is_err());
        assert!(ShardCursor::new(1, 1, 10, false).is_err());
    }

    #[test]
    fn test_cursor_walks_catalog_and_wraps_to_shard_start() {
        let mut cursor = ShardCursor::new(2, 4, 10, false).unwrap();
        assert_eq!(cursor.position(), 6);

        let visited: Vec<_> = (0..6).map(|_| cursor.advance().unwrap()).collect();
        assert_eq!(visited, vec![6, 7, 8, 9, 6, 7]);
    }

    #[test]
    fn test_cursor_sticks_to_shard() {
        let mut cursor = ShardCursor::new(1, 4, 10, true).unwrap();
        assert_eq!(cursor.shard_len(), 3);

        let visited: Vec<_> = (0..7).map(|_| cursor.advance().unwrap()).collect();
        assert_eq!(visited, vec![3, 4, 5, 3, 4, 5, 3]);
    }

    #[test]
    fn test_cursor_rewind() {
        let mut cursor = ShardCursor::new(3, 4, 10, false).unwrap();
        cursor.advance();
        cursor.advance();

        cursor.rewind(true);
        assert_eq!(cursor.position(), 8);

        cursor.rewind(false);
        assert_eq!(cursor.position(), 0);
        assert_eq!(cursor.advance(), Some(0));
    }

    #[test]
    fn test_peek_does_not_move_until_commit() {
        let mut cursor = ShardCursor::new(1, 2, 4, true).unwrap();
        assert_eq!(cursor.peek(), Some(2));
        assert_eq!(cursor.peek(), Some(2));
        cursor.commit();
        assert_eq!(cursor.peek(), Some(3));
        cursor.commit();

        // wraps on peek, not on commit
        assert_eq!(cursor.position(), 4);
        assert_eq!(cursor.peek(), Some(2));
        assert_eq!(cursor.position(), 2);
    }

    #[test]
    fn test_cursor_on_empty_catalog() {
        let mut cursor = ShardCursor::new(0, 1, 0, false).unwrap();
        assert_eq!(cursor.advance(), None);
    }

    #[test]
    fn test_cursor_empty_partition() {
        let mut sticky = ShardCursor::new(4, 5, 3, true).unwrap();
        assert_eq!(sticky.advance(), None);

        // a non-sticky reader with an empty partition still finds no samples
        // between its start and the catalog end
        let mut roaming = ShardCursor::new(4, 5, 3, false).unwrap();
        assert_eq!(roaming.advance(), None);
    }
}
