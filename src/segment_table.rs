//! §4.B SegmentTable — a logical byte-addressable volume striped across
//! N segment files via [`crate::pool::FileIOPool`].
//!
//! Follows `libsmraw`'s segment-naming rule (single `.raw` vs
//! `.raw.NNN`) for how new segments are named on write-growth, and
//! `ewf::EWF`'s chunk/segment cursor bookkeeping for the "scan
//! cumulative sizes to find which segment owns an offset" approach
//! used here by [`SegmentTable::locate`].

use crate::error::{Error, Result};
use crate::pool::FileIOPool;
use std::io::SeekFrom;
use std::path::PathBuf;

/// Minimum accepted `max_segment_size`, other than the sentinel `0`
/// (uncapped).
pub const MIN_SEGMENT_SIZE: u64 = 32 * 1024;

/// One physical segment: which pool entry backs it, and its current
/// byte size.
#[derive(Debug, Clone)]
pub struct Segment {
    pub pool_entry: usize,
    pub byte_size: u64,
}

/// Callback invoked to name the next segment when a write needs to grow
/// the volume. Takes the 1-based segment number being created.
pub type SegmentNamer<'a> = dyn FnMut(usize) -> Result<PathBuf> + 'a;

/// The logical striped volume itself.
pub struct SegmentTable<'a> {
    segments: Vec<Segment>,
    max_segment_size: u64,
    value_size: u64,
    current_offset: u64,
    /// `None` for read-only volumes (growth is never attempted).
    namer: Option<Box<SegmentNamer<'a>>>,
}

impl<'a> SegmentTable<'a> {
    /// Creates an empty table with no growth callback (read-mode use:
    /// populate via [`SegmentTable::set_segment`]/[`SegmentTable::resize`]).
    pub fn new_read_only(max_segment_size: u64) -> Self {
        SegmentTable {
            segments: Vec::new(),
            max_segment_size,
            value_size: 0,
            current_offset: 0,
            namer: None,
        }
    }

    /// Creates an empty table with a segment-naming callback for
    /// write-mode growth.
    pub fn new_for_write(max_segment_size: u64, namer: Box<SegmentNamer<'a>>) -> Self {
        SegmentTable {
            segments: Vec::new(),
            max_segment_size,
            value_size: 0,
            current_offset: 0,
            namer: Some(namer),
        }
    }

    pub fn max_segment_size(&self) -> u64 {
        self.max_segment_size
    }

    /// Rejects values below [`MIN_SEGMENT_SIZE`] unless `0` (uncapped).
    pub fn set_max_segment_size(&mut self, size: u64) -> Result<()> {
        if size != 0 && size < MIN_SEGMENT_SIZE {
            return Err(Error::argument(format!(
                "maximum segment size {size} is below the minimum of {MIN_SEGMENT_SIZE}"
            )));
        }
        self.max_segment_size = size;
        Ok(())
    }

    /// Cumulative logical size of the volume.
    pub fn value_size(&self) -> u64 {
        self.value_size
    }

    pub fn current_offset(&self) -> u64 {
        self.current_offset
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn segment(&self, i: usize) -> Option<&Segment> {
        self.segments.get(i)
    }

    /// Pre-declares at least `n` segment slots for read-mode
    /// pre-population. Existing slots are left untouched.
    pub fn resize(&mut self, n: usize) {
        // Slots are installed individually via `set_segment`; `resize`
        // only needs to make room so index-based installs don't panic
        // before every slot has been set. We use a sentinel pool_entry
        // (usize::MAX) to mark "not yet installed".
        while self.segments.len() < n {
            self.segments.push(Segment {
                pool_entry: usize::MAX,
                byte_size: 0,
            });
        }
    }

    /// Installs a known segment at index `i` (used when opening an
    /// existing volume for read).
    pub fn set_segment(&mut self, i: usize, pool_entry: usize, byte_size: u64) {
        if i >= self.segments.len() {
            self.resize(i + 1);
        }
        let was_installed = self.segments[i].pool_entry != usize::MAX;
        let old_size = if was_installed {
            self.segments[i].byte_size
        } else {
            0
        };
        self.segments[i] = Segment {
            pool_entry,
            byte_size,
        };
        self.value_size = self.value_size - old_size + byte_size;
    }

    /// Finds which segment owns `offset` and the intra-segment offset
    /// within it. Returns `None` if `offset == value_size` (EOF) or
    /// beyond.
    fn locate(&self, offset: u64) -> Option<(usize, u64)> {
        let mut base = 0u64;
        for (i, seg) in self.segments.iter().enumerate() {
            if offset < base + seg.byte_size {
                return Some((i, offset - base));
            }
            base += seg.byte_size;
        }
        None
    }

    /// Reads up to `buf.len()` bytes starting at `current_offset`,
    /// possibly spanning multiple segments. Returns the number of bytes
    /// actually read; short only at EOF.
    pub fn read(&mut self, pool: &mut FileIOPool, buf: &mut [u8]) -> Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            let Some((seg_idx, intra_offset)) = self.locate(self.current_offset) else {
                break;
            };
            let seg = &self.segments[seg_idx];
            let remaining_in_segment = seg.byte_size - intra_offset;
            let want = (buf.len() - total) as u64;
            let to_read = want.min(remaining_in_segment) as usize;
            let n = pool.read(seg.pool_entry, intra_offset, &mut buf[total..total + to_read])?;
            if n == 0 {
                break;
            }
            total += n;
            self.current_offset += n as u64;
            if n < to_read {
                break;
            }
        }
        Ok(total)
    }

    /// Writes up to `buf.len()` bytes starting at `current_offset`,
    /// growing the volume with new segments as needed. Returns the
    /// number of bytes actually written (always `buf.len()` on success).
    pub fn write(&mut self, pool: &mut FileIOPool, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut total = 0;
        while total < buf.len() {
            self.ensure_current_segment_for_write(pool)?;
            let seg_idx = self.segments.len() - 1;
            let seg_byte_size = self.segments[seg_idx].byte_size;
            let base = self.segment_base_offset(seg_idx);
            let intra_offset = self.current_offset - base;

            // Per §4.B: remaining space in the current
            // segment is measured against its byte_size, i.e. writes are
            // assumed to append at the current growth frontier.
            let remaining = if self.max_segment_size == 0 {
                u64::MAX - seg_byte_size
            } else {
                self.max_segment_size.saturating_sub(seg_byte_size)
            };
            if remaining == 0 {
                // Current segment is full; force a new one next loop.
                self.force_new_segment(pool)?;
                continue;
            }

            let want = (buf.len() - total) as u64;
            let to_write = want.min(remaining) as usize;
            let pool_entry = self.segments[seg_idx].pool_entry;
            pool.write(pool_entry, intra_offset, &buf[total..total + to_write])?;

            let new_intra_end = intra_offset + to_write as u64;
            if new_intra_end > self.segments[seg_idx].byte_size {
                let grown = new_intra_end - self.segments[seg_idx].byte_size;
                self.segments[seg_idx].byte_size = new_intra_end;
                self.value_size += grown;
            }
            self.current_offset += to_write as u64;
            total += to_write;
        }
        Ok(total)
    }

    fn segment_base_offset(&self, idx: usize) -> u64 {
        self.segments[..idx].iter().map(|s| s.byte_size).sum()
    }

    /// Ensures there is at least one segment to write into; creates the
    /// first one lazily on the very first write.
    fn ensure_current_segment_for_write(&mut self, pool: &mut FileIOPool) -> Result<()> {
        if self.segments.is_empty() {
            self.append_segment(pool)?;
        }
        Ok(())
    }

    /// Forces the creation of a brand-new segment because the current
    /// one is at `max_segment_size`.
    fn force_new_segment(&mut self, pool: &mut FileIOPool) -> Result<()> {
        self.append_segment(pool)
    }

    fn append_segment(&mut self, pool: &mut FileIOPool) -> Result<()> {
        let namer = self
            .namer
            .as_mut()
            .ok_or_else(|| Error::argument("segment table has no write-growth namer"))?;
        let next_number = self.segments.len() + 1;
        let path = namer(next_number).map_err(|e| {
            Error::SegmentNameFailed(format!("segment {next_number}: {e}"))
        })?;
        let pool_entry = pool.register(path, crate::pool::OpenMode::ReadWrite);
        self.segments.push(Segment {
            pool_entry,
            byte_size: 0,
        });
        Ok(())
    }

    /// Seeks the logical cursor. For `whence = Start`/`Current`, the
    /// resulting offset must satisfy `0 <= offset <= value_size` on
    /// volumes open for write (seek past end is uniformly an error, per
    /// the resolution of the seek-past-end Open Question);
    /// read-only volumes accept the same bound. Returns the new absolute
    /// offset.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let new_offset = match pos {
            SeekFrom::Start(o) => o as i128,
            SeekFrom::Current(o) => self.current_offset as i128 + o as i128,
            SeekFrom::End(o) => self.value_size as i128 + o as i128,
        };
        if new_offset < 0 {
            return Err(Error::argument("seek before start of volume"));
        }
        let new_offset = new_offset as u64;
        if new_offset > self.value_size {
            return Err(Error::argument(format!(
                "seek to {new_offset} exceeds volume size {}",
                self.value_size
            )));
        }
        self.current_offset = new_offset;
        Ok(self.current_offset)
    }

    /// The pool entry of the segment containing `current_offset` (or the
    /// last segment, if the cursor sits exactly at EOF).
    pub fn current_pool_entry(&self) -> Option<usize> {
        if let Some((idx, _)) = self.locate(self.current_offset) {
            return Some(self.segments[idx].pool_entry);
        }
        self.segments.last().map(|s| s.pool_entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::OpenMode;
    use tempfile::tempdir;

    fn namer(dir: PathBuf) -> Box<SegmentNamer<'static>> {
        Box::new(move |n: usize| Ok(dir.join(format!("seg.{n:03}"))))
    }

    #[test]
    fn single_uncapped_segment_on_write() {
        let dir = tempdir().unwrap();
        let mut pool = FileIOPool::new(None);
        let mut table = SegmentTable::new_for_write(0, namer(dir.path().to_path_buf()));

        let data = vec![7u8; 100_000];
        let n = table.write(&mut pool, &data).unwrap();
        assert_eq!(n, data.len());
        assert_eq!(table.segment_count(), 1);
        assert_eq!(table.value_size(), 100_000);
    }

    #[test]
    fn grows_new_segments_at_max_size() {
        let dir = tempdir().unwrap();
        let mut pool = FileIOPool::new(None);
        let mut table =
            SegmentTable::new_for_write(1_048_576, namer(dir.path().to_path_buf()));

        let data = vec![1u8; 10_000_000];
        let n = table.write(&mut pool, &data).unwrap();
        assert_eq!(n, data.len());
        assert_eq!(table.segment_count(), 10);
        for i in 0..9 {
            assert_eq!(table.segment(i).unwrap().byte_size, 1_048_576);
        }
        assert_eq!(table.segment(9).unwrap().byte_size, 10_000_000 - 9 * 1_048_576);
        assert_eq!(table.value_size(), 10_000_000);
    }

    #[test]
    fn read_spans_segments() {
        let dir = tempdir().unwrap();
        let mut pool = FileIOPool::new(None);
        let mut write_table =
            SegmentTable::new_for_write(4, namer(dir.path().to_path_buf()));
        write_table.write(&mut pool, b"abcdefghij").unwrap(); // 3 segments of 4,4,2

        let mut read_table = SegmentTable::new_read_only(4);
        for i in 0..write_table.segment_count() {
            let seg = write_table.segment(i).unwrap();
            read_table.set_segment(i, seg.pool_entry, seg.byte_size);
        }

        let mut buf = vec![0u8; 10];
        let n = read_table.read(&mut pool, &mut buf).unwrap();
        assert_eq!(n, 10);
        assert_eq!(&buf, b"abcdefghij");
    }

    #[test]
    fn read_at_eof_returns_zero() {
        let dir = tempdir().unwrap();
        let mut pool = FileIOPool::new(None);
        let mut table = SegmentTable::new_for_write(0, namer(dir.path().to_path_buf()));
        table.write(&mut pool, b"hi").unwrap();
        table.seek(SeekFrom::Start(2)).unwrap();

        let mut buf = vec![0u8; 4];
        let n = table.read(&mut pool, &mut buf).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn seek_exactly_to_end_succeeds_past_end_fails() {
        let dir = tempdir().unwrap();
        let mut pool = FileIOPool::new(None);
        let mut table = SegmentTable::new_for_write(0, namer(dir.path().to_path_buf()));
        table.write(&mut pool, b"hello").unwrap();

        assert_eq!(table.seek(SeekFrom::Start(5)).unwrap(), 5);
        assert!(table.seek(SeekFrom::Start(6)).is_err());
    }

    #[test]
    fn zero_length_write_is_noop() {
        let dir = tempdir().unwrap();
        let mut pool = FileIOPool::new(None);
        let mut table = SegmentTable::new_for_write(0, namer(dir.path().to_path_buf()));
        let n = table.write(&mut pool, &[]).unwrap();
        assert_eq!(n, 0);
        assert_eq!(table.segment_count(), 0);
        assert_eq!(table.value_size(), 0);
    }

    #[test]
    fn rejects_segment_size_below_minimum() {
        let mut table = SegmentTable::new_read_only(0);
        assert!(table.set_max_segment_size(1024).is_err());
        assert!(table.set_max_segment_size(0).is_ok());
        assert!(table.set_max_segment_size(MIN_SEGMENT_SIZE).is_ok());
    }

    #[test]
    fn namer_failure_reports_segment_name_failed() {
        let mut pool = FileIOPool::new(None);
        let failing_namer: Box<SegmentNamer<'static>> =
            Box::new(|_n: usize| Err(Error::argument("boom")));
        let mut table = SegmentTable::new_for_write(4, failing_namer);
        let err = table.write(&mut pool, b"hello world").unwrap_err();
        assert!(matches!(err, Error::SegmentNameFailed(_)));
    }
}
