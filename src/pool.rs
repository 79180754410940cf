//! §4.A FileIOPool — an opaque `(pool_entry, offset) → bytes` access
//! layer over a bounded LRU of open OS file handles.
//!
//! Grounded on `libsmraw_handle.c`'s pool-entry indirection (segments
//! are referenced by a small integer index, never by file handle, so
//! the handle can be closed and reopened behind the caller's back) and
//! this crate's own `ewf.rs::Clone for EWF`, which already duplicates
//! `File` handles per segment rather than sharing one cursor across
//! callers.

use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// How a pool entry was (or will be) opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
    ReadWrite,
}

impl OpenMode {
    fn to_options(self) -> OpenOptions {
        let mut opts = OpenOptions::new();
        match self {
            OpenMode::Read => {
                opts.read(true);
            }
            OpenMode::Write => {
                opts.write(true).create(true);
            }
            OpenMode::ReadWrite => {
                opts.read(true).write(true).create(true);
            }
        }
        opts
    }
}

struct Entry {
    path: PathBuf,
    mode: OpenMode,
    file: Option<File>,
    /// Byte size as of the last time we observed it (updated on write;
    /// queried fresh via `size()` for files we didn't just write).
    known_size: Option<u64>,
}

/// Bounded pool of open file handles, addressed by a stable integer
/// `pool_entry` index that outlives any particular physical open/close.
pub struct FileIOPool {
    entries: Vec<Entry>,
    /// Entries currently holding an open `File`, most-recently-used at
    /// the back.
    open_order: VecDeque<usize>,
    /// Soft cap on concurrently open handles. `None` = unlimited.
    max_open: Option<usize>,
}

impl FileIOPool {
    /// Creates an empty pool. `max_open = None` means unlimited
    /// concurrently-open handles.
    pub fn new(max_open: Option<usize>) -> Self {
        FileIOPool {
            entries: Vec::new(),
            open_order: VecDeque::new(),
            max_open,
        }
    }

    /// Registers a new pool entry for `path` without opening it. Returns
    /// the entry's stable index.
    pub fn register(&mut self, path: impl Into<PathBuf>, mode: OpenMode) -> usize {
        self.entries.push(Entry {
            path: path.into(),
            mode,
            file: None,
            known_size: None,
        });
        self.entries.len() - 1
    }

    /// Renames the path backing `entry` (only meaningful before the
    /// entry has been physically opened for the first time).
    pub fn set_name(&mut self, entry: usize, path: impl Into<PathBuf>) -> Result<()> {
        let e = self.entry_mut(entry)?;
        e.path = path.into();
        Ok(())
    }

    /// The path currently backing `entry`.
    pub fn name(&self, entry: usize) -> Result<&Path> {
        Ok(self.entry(entry)?.path.as_path())
    }

    /// True if a file exists at `path`.
    pub fn exists(path: impl AsRef<Path>) -> bool {
        path.as_ref().is_file()
    }

    /// Current size in bytes of `entry`'s backing file.
    pub fn size(&mut self, entry: usize) -> Result<u64> {
        self.ensure_open(entry)?;
        let e = self.entry_mut(entry)?;
        let file = e.file.as_mut().expect("just ensured open");
        let size = file.metadata()?.len();
        e.known_size = Some(size);
        Ok(size)
    }

    /// Explicitly closes the physical handle for `entry`, if open. The
    /// entry remains registered; a later read/write reopens it
    /// transparently.
    pub fn close(&mut self, entry: usize) -> Result<()> {
        let e = self.entry_mut(entry)?;
        if let Some(mut file) = e.file.take() {
            file.flush().ok();
        }
        self.open_order.retain(|&i| i != entry);
        Ok(())
    }

    /// Closes every open handle. Called when the pool itself is dropped
    /// logically (e.g. `RawHandle::close`).
    pub fn close_all(&mut self) -> Result<()> {
        let indices: Vec<usize> = (0..self.entries.len()).collect();
        for i in indices {
            self.close(i)?;
        }
        Ok(())
    }

    /// Reads up to `buf.len()` bytes from `entry` starting at `offset`.
    /// Returns the number of bytes actually read (short only at EOF).
    pub fn read(&mut self, entry: usize, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.ensure_open(entry)?;
        let e = self.entry_mut(entry)?;
        let file = e.file.as_mut().expect("just ensured open");
        file.seek(SeekFrom::Start(offset))?;
        let mut total = 0;
        while total < buf.len() {
            let n = file.read(&mut buf[total..])?;
            if n == 0 {
                break;
            }
            total += n;
        }
        Ok(total)
    }

    /// Writes `buf` to `entry` starting at `offset`. Returns the number
    /// of bytes written (always `buf.len()` unless the underlying file
    /// system rejects the write, which surfaces as an `Io` error).
    pub fn write(&mut self, entry: usize, offset: u64, buf: &[u8]) -> Result<usize> {
        self.ensure_open(entry)?;
        let e = self.entry_mut(entry)?;
        let file = e.file.as_mut().expect("just ensured open");
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;
        let new_min_size = offset + buf.len() as u64;
        e.known_size = Some(e.known_size.map_or(new_min_size, |s| s.max(new_min_size)));
        Ok(buf.len())
    }

    /// Ensures `entry` has an open physical handle, evicting the
    /// least-recently-used open entry if the pool is at capacity.
    fn ensure_open(&mut self, entry: usize) -> Result<()> {
        if self.entries.get(entry).map(|e| e.file.is_some()) == Some(true) {
            // Already open: bump its recency.
            self.open_order.retain(|&i| i != entry);
            self.open_order.push_back(entry);
            return Ok(());
        }

        if let Some(max_open) = self.max_open {
            while self.open_order.len() >= max_open {
                let victim = self
                    .open_order
                    .pop_front()
                    .expect("open_order non-empty while at capacity");
                log::debug!("FileIOPool evicting pool entry {victim} (LRU)");
                if let Some(f) = self.entry_mut(victim)?.file.take() {
                    drop(f);
                }
            }
        }

        let e = self.entry_mut(entry)?;
        let path = e.path.clone();
        let mode = e.mode;
        log::debug!("FileIOPool opening pool entry {entry} at {path:?}");
        let file = mode.to_options().open(&path)?;
        let e = self.entry_mut(entry)?;
        e.file = Some(file);
        self.open_order.push_back(entry);
        Ok(())
    }

    fn entry(&self, entry: usize) -> Result<&Entry> {
        self.entries
            .get(entry)
            .ok_or_else(|| Error::argument(format!("no such pool entry: {entry}")))
    }

    fn entry_mut(&mut self, entry: usize) -> Result<&mut Entry> {
        self.entries
            .get_mut(entry)
            .ok_or_else(|| Error::argument(format!("no such pool entry: {entry}")))
    }

    /// Number of registered entries (open or not).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_then_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seg0");
        let mut pool = FileIOPool::new(None);
        let entry = pool.register(&path, OpenMode::ReadWrite);

        pool.write(entry, 0, b"hello").unwrap();
        pool.write(entry, 5, b" world").unwrap();
        assert_eq!(pool.size(entry).unwrap(), 11);

        let mut buf = vec![0u8; 11];
        let n = pool.read(entry, 0, &mut buf).unwrap();
        assert_eq!(n, 11);
        assert_eq!(&buf, b"hello world");
    }

    #[test]
    fn short_read_at_eof() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seg0");
        let mut pool = FileIOPool::new(None);
        let entry = pool.register(&path, OpenMode::ReadWrite);
        pool.write(entry, 0, b"abc").unwrap();

        let mut buf = vec![0u8; 10];
        let n = pool.read(entry, 0, &mut buf).unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf[..3], b"abc");
    }

    #[test]
    fn lru_eviction_survives_logical_reopen() {
        let dir = tempdir().unwrap();
        let mut pool = FileIOPool::new(Some(1));
        let a = pool.register(dir.path().join("a"), OpenMode::ReadWrite);
        let b = pool.register(dir.path().join("b"), OpenMode::ReadWrite);

        pool.write(a, 0, b"AAAA").unwrap();
        // Opening b while capacity is 1 evicts a's physical handle.
        pool.write(b, 0, b"BBBB").unwrap();

        // a is still logically valid: reading from it reopens
        // transparently instead of erroring.
        let mut buf = [0u8; 4];
        let n = pool.read(a, 0, &mut buf).unwrap();
        assert_eq!(n, 4);
        assert_eq!(&buf, b"AAAA");
    }

    #[test]
    fn unknown_entry_errors() {
        let mut pool = FileIOPool::new(None);
        let mut buf = [0u8; 4];
        assert!(pool.read(42, 0, &mut buf).is_err());
    }

    #[test]
    fn exists_reflects_filesystem() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("present");
        assert!(!FileIOPool::exists(&path));
        std::fs::write(&path, b"x").unwrap();
        assert!(FileIOPool::exists(&path));
    }
}
