//! §4.D RawHandle — the split-raw container: a [`SegmentTable`] of
//! opaque segment files plus an [`InformationFile`] sidecar.
//!
//! Follows `libsmraw`'s open/read/write/seek/close lifecycle and
//! media-value accessor immutability rules, generalized from a single
//! `Read`/`Seek` wrapper to a multi-segment volume.

use crate::error::{Error, Result};
use crate::globber;
use crate::information_file::{
    InformationFile, Mode as InfoMode, SECTION_INFORMATION_VALUES, SECTION_INTEGRITY_HASH_VALUES,
    SECTION_MEDIA_VALUES,
};
use crate::pool::{FileIOPool, OpenMode};
use crate::segment_table::SegmentTable;
use crate::value_table::{Value, ValueTable};
use std::cell::Cell;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Which direction(s) a [`RawHandle`] is opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    fn includes_read(self) -> bool {
        matches!(self, Access::Read | Access::ReadWrite)
    }

    fn includes_write(self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

/// `media_type` values accepted by [`RawHandle::set_media_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Unknown,
    Fixed,
    Memory,
    Optical,
    Removable,
}

impl MediaType {
    fn as_str(self) -> &'static str {
        match self {
            MediaType::Unknown => "unknown",
            MediaType::Fixed => "fixed",
            MediaType::Memory => "memory",
            MediaType::Optical => "optical",
            MediaType::Removable => "removable",
        }
    }
}

/// `media_flags` values accepted by [`RawHandle::set_media_flags`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFlags {
    Logical,
    Physical,
}

impl MediaFlags {
    fn as_str(self) -> &'static str {
        match self {
            MediaFlags::Logical => "logical",
            MediaFlags::Physical => "physical",
        }
    }
}

/// The split-raw container handle: a striped [`SegmentTable`] plus the
/// `<basename>.raw.info` sidecar, following the same basename through
/// both.
pub struct RawHandle {
    basename: PathBuf,
    segment_table: SegmentTable<'static>,
    pool: FileIOPool,
    info_file: InformationFile,
    max_open_handles: Option<usize>,
    read_initialized: bool,
    write_initialized: bool,
    write_info_on_close: bool,
    total_segments_target: Rc<Cell<i64>>,
    media_values: ValueTable,
    information_values: ValueTable,
    integrity_hash_values: ValueTable,
    read_errors: Vec<(u64, u64)>,
}

impl RawHandle {
    /// Creates an empty handle bound to no files yet.
    pub fn new() -> Self {
        RawHandle {
            basename: PathBuf::new(),
            segment_table: SegmentTable::new_read_only(0),
            pool: FileIOPool::new(None),
            info_file: InformationFile::new(PathBuf::new()),
            max_open_handles: None,
            read_initialized: false,
            write_initialized: false,
            write_info_on_close: false,
            total_segments_target: Rc::new(Cell::new(-1)),
            media_values: ValueTable::new(),
            information_values: ValueTable::new(),
            integrity_hash_values: ValueTable::new(),
            read_errors: Vec::new(),
        }
    }

    /// Opens the handle over `paths` for `access`.
    ///
    /// For read access, at least one path must be given; if exactly one
    /// is given, the remaining segments are resolved via
    /// [`globber::glob`]. For write-only access, `paths` must contain
    /// exactly the single basename segment creation will be deferred
    /// from.
    pub fn open(&mut self, paths: &[PathBuf], access: Access) -> Result<()> {
        if access.includes_read() {
            self.open_for_read(paths)?;
            if access.includes_write() {
                self.write_info_on_close = true;
            }
        } else {
            if paths.len() != 1 {
                return Err(Error::argument(
                    "write-only open requires exactly one basename path",
                ));
            }
            self.basename = paths[0].clone();
            self.pool = FileIOPool::new(self.max_open_handles);
            let basename = self.basename.clone();
            let target = self.total_segments_target.clone();
            self.segment_table =
                SegmentTable::new_for_write(0, make_namer(basename, target));
            self.info_file = InformationFile::new(segment_path(&self.basename, "raw.info"));
            self.write_info_on_close = true;
        }
        Ok(())
    }

    /// Resumes a write-mode volume that already has segments on disk:
    /// probes the existing segments via the same path used for read-mode
    /// open, reopens them for read+write, and positions the cursor at
    /// the existing end of data so new writes append rather than
    /// overwrite. Per §4.H's resume contract.
    pub fn open_resume(&mut self, paths: &[PathBuf]) -> Result<()> {
        if paths.is_empty() {
            return Err(Error::argument("resume requires at least one path"));
        }
        let resolved: Vec<PathBuf> = if paths.len() == 1 {
            globber::glob(&paths[0])?
        } else {
            paths.to_vec()
        };

        self.basename = derive_basename(&resolved[0]);
        self.pool = FileIOPool::new(self.max_open_handles);
        let mut table = SegmentTable::new_read_only(0);
        for (i, path) in resolved.iter().enumerate() {
            let entry = self.pool.register(path, OpenMode::ReadWrite);
            let size = self.pool.size(entry)?;
            table.set_segment(i, entry, size);
        }
        let existing_size = table.value_size();

        let basename = self.basename.clone();
        let target = self.total_segments_target.clone();
        target.set(resolved.len().max(1) as i64);
        let namer = make_namer(basename, target.clone());
        let mut write_table = SegmentTable::new_for_write(self.segment_table.max_segment_size(), namer);
        for i in 0..table.segment_count() {
            let seg = table.segment(i).unwrap();
            write_table.set_segment(i, seg.pool_entry, seg.byte_size);
        }
        write_table.seek(SeekFrom::Start(existing_size))?;
        self.segment_table = write_table;

        self.info_file = InformationFile::new(segment_path(&self.basename, "raw.info"));
        if self.info_file.exists() {
            self.info_file.open(InfoMode::Read)?;
            self.info_file
                .read_section(SECTION_MEDIA_VALUES, &mut self.media_values)?;
            self.info_file
                .read_section(SECTION_INFORMATION_VALUES, &mut self.information_values)?;
            self.info_file
                .read_section(SECTION_INTEGRITY_HASH_VALUES, &mut self.integrity_hash_values)?;
            self.info_file.close();
        }
        self.write_initialized = true;
        self.write_info_on_close = true;
        Ok(())
    }

    fn open_for_read(&mut self, paths: &[PathBuf]) -> Result<()> {
        if paths.is_empty() {
            return Err(Error::argument("read-enabled open requires at least one path"));
        }
        let resolved: Vec<PathBuf> = if paths.len() == 1 {
            globber::glob(&paths[0])?
        } else {
            paths.to_vec()
        };

        self.basename = derive_basename(&resolved[0]);
        self.pool = FileIOPool::new(self.max_open_handles);
        let mut table = SegmentTable::new_read_only(0);
        for (i, path) in resolved.iter().enumerate() {
            let entry = self.pool.register(path, OpenMode::Read);
            let size = self.pool.size(entry)?;
            table.set_segment(i, entry, size);
        }
        self.segment_table = table;
        self.read_initialized = true;
        self.media_values
            .set_u64("media_size", self.segment_table.value_size())?;

        self.info_file = InformationFile::new(segment_path(&self.basename, "raw.info"));
        if self.info_file.exists() {
            self.info_file.open(InfoMode::Read)?;
            self.info_file
                .read_section(SECTION_MEDIA_VALUES, &mut self.media_values)?;
            self.info_file
                .read_section(SECTION_INFORMATION_VALUES, &mut self.information_values)?;
            self.info_file
                .read_section(SECTION_INTEGRITY_HASH_VALUES, &mut self.integrity_hash_values)?;
            self.info_file.close();
        }
        Ok(())
    }

    /// Reads up to `buf.len()` bytes at the current offset.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.segment_table.read(&mut self.pool, buf)
    }

    /// Writes `buf` at the current offset, initializing write state
    /// (expected segment count, from `media_size / max_segment_size`) on
    /// the very first call.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if !self.write_initialized {
            let max = self.segment_table.max_segment_size();
            let target: i64 = if max == 0 {
                1
            } else {
                let media_size = self.media_values.u64_value_of("media_size").unwrap_or(0).max(1);
                (((media_size + max - 1) / max) as i64).max(1)
            };
            self.total_segments_target.set(target);
            self.write_initialized = true;
        }
        self.segment_table.write(&mut self.pool, buf)
    }

    /// Seeks the logical cursor; see [`SegmentTable::seek`].
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.segment_table.seek(pos)
    }

    /// Flushes the info file (if this handle was opened for write) and
    /// closes every open segment handle. Idempotent-safe to call once.
    pub fn close(&mut self) -> Result<()> {
        if self.write_info_on_close {
            self.media_values
                .set_u64("media_size", self.segment_table.value_size())?;
            if !self.read_errors.is_empty() {
                let ranges = self
                    .read_errors
                    .iter()
                    .map(|(start, count)| format!("{start}:{count}"))
                    .collect::<Vec<_>>()
                    .join(";");
                self.information_values.set_utf8("read_error_ranges", ranges)?;
            }
            self.info_file.open(InfoMode::Write)?;
            self.info_file
                .write_section(SECTION_MEDIA_VALUES, &self.media_values)?;
            self.info_file
                .write_section(SECTION_INFORMATION_VALUES, &self.information_values)?;
            self.info_file
                .write_section(SECTION_INTEGRITY_HASH_VALUES, &self.integrity_hash_values)?;
            self.info_file.close();
        }
        self.pool.close_all()
    }

    /// Path of the segment file backing the current offset.
    pub fn get_filename_at_current_offset(&mut self) -> Result<PathBuf> {
        let entry = self
            .segment_table
            .current_pool_entry()
            .ok_or_else(|| Error::missing("no current segment (empty volume)"))?;
        Ok(self.pool.name(entry)?.to_path_buf())
    }

    pub fn get_maximum_segment_size(&self) -> u64 {
        self.segment_table.max_segment_size()
    }

    pub fn set_maximum_segment_size(&mut self, size: u64) -> Result<()> {
        self.segment_table.set_max_segment_size(size)
    }

    pub fn get_maximum_number_of_open_handles(&self) -> Option<usize> {
        self.max_open_handles
    }

    pub fn set_maximum_number_of_open_handles(&mut self, max: Option<usize>) {
        self.max_open_handles = max;
    }

    pub fn get_media_size(&self) -> u64 {
        self.media_values.u64_value_of("media_size").unwrap_or(0)
    }

    pub fn set_media_size(&mut self, size: u64) -> Result<()> {
        self.guard_immutable_after_open("media_size")?;
        self.media_values.set_u64("media_size", size)
    }

    pub fn get_bytes_per_sector(&self) -> Option<u64> {
        self.media_values.u64_value_of("bytes_per_sector")
    }

    pub fn set_bytes_per_sector(&mut self, value: u64) -> Result<()> {
        self.guard_immutable_after_open("bytes_per_sector")?;
        self.media_values.set_u64("bytes_per_sector", value)
    }

    pub fn get_media_type(&self) -> Option<String> {
        self.media_values.utf8_value_of("media_type")
    }

    pub fn set_media_type(&mut self, media_type: MediaType) -> Result<()> {
        self.guard_immutable_after_open("media_type")?;
        self.media_values.set_utf8("media_type", media_type.as_str())
    }

    pub fn get_media_flags(&self) -> Option<String> {
        self.media_values.utf8_value_of("media_flags")
    }

    pub fn set_media_flags(&mut self, flags: MediaFlags) -> Result<()> {
        self.guard_immutable_after_open("media_flags")?;
        self.media_values.set_utf8("media_flags", flags.as_str())
    }

    fn guard_immutable_after_open(&self, field: &str) -> Result<()> {
        if self.read_initialized || self.write_initialized {
            return Err(Error::AlreadySet(field.to_string()));
        }
        Ok(())
    }

    /// Number of entries currently stored in `information_values`.
    pub fn information_value_count(&self) -> usize {
        self.information_values.count()
    }

    pub fn information_identifier_at(&self, i: usize) -> Option<&str> {
        self.information_values.identifier_at(i)
    }

    pub fn information_value_of(&self, id: &str) -> Option<String> {
        self.information_values.utf8_value_of(id)
    }

    pub fn set_information_value(&mut self, id: &str, value: impl Into<String>) -> Result<()> {
        self.guard_immutable_after_read()?;
        self.information_values.set_utf8(id, value)
    }

    pub fn integrity_hash_value_count(&self) -> usize {
        self.integrity_hash_values.count()
    }

    pub fn integrity_hash_identifier_at(&self, i: usize) -> Option<&str> {
        self.integrity_hash_values.identifier_at(i)
    }

    pub fn integrity_hash_value_of(&self, id: &str) -> Option<String> {
        self.integrity_hash_values.utf8_value_of(id)
    }

    pub fn set_integrity_hash_value(&mut self, id: &str, value: impl Into<String>) -> Result<()> {
        self.guard_immutable_after_read()?;
        self.integrity_hash_values.set_utf8(id, value)
    }

    fn guard_immutable_after_read(&self) -> Result<()> {
        if self.read_initialized {
            return Err(Error::AlreadySet(
                "information/integrity values are immutable once read from disk".to_string(),
            ));
        }
        Ok(())
    }

    /// Records a sector range that could not be reproduced faithfully in
    /// the output (§4.H read-error masking). There is no dedicated
    /// section for this in the split-raw layout (§6), so ranges are
    /// accumulated and flushed into `information_values["read_error_ranges"]`
    /// on close as `start:count` pairs joined by `;`.
    pub fn append_read_error(&mut self, start_sector: u64, sector_count: u64) {
        self.read_errors.push((start_sector, sector_count));
    }
}

impl Default for RawHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the segment-naming callback for write-growth: single-segment
/// volumes are named `<basename>.raw`; multi-segment volumes are named
/// `<basename>.raw.NNN`, zero-padded to 3 digits starting at `000`.
fn make_namer(basename: PathBuf, target: Rc<Cell<i64>>) -> Box<crate::segment_table::SegmentNamer<'static>> {
    Box::new(move |n: usize| {
        if target.get() == 1 {
            Ok(segment_path(&basename, "raw"))
        } else {
            Ok(segment_path(&basename, &format!("raw.{:03}", n - 1)))
        }
    })
}

/// Appends `.{tail}` to `basename`'s file name, preserving its parent
/// directory.
fn segment_path(basename: &Path, tail: &str) -> PathBuf {
    let mut name = basename
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push('.');
    name.push_str(tail);
    match basename.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(name),
        _ => PathBuf::from(name),
    }
}

/// Strips the split-raw segment suffix (`.raw` or `.raw.NNN`) from a
/// resolved first-segment path, or falls back to stripping whatever
/// trails the last `.` for third-party naming schemas.
fn derive_basename(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let stripped = if let Some(stem) = name.strip_suffix(".raw") {
        stem.to_string()
    } else if let Some(pos) = name.rfind(".raw.") {
        name[..pos].to_string()
    } else if let Some(pos) = name.rfind('.') {
        name[..pos].to_string()
    } else {
        name.clone()
    };

    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(stripped),
        _ => PathBuf::from(stripped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn s1_single_segment_raw_round_trip() {
        // S1 — 1,048,576 bytes, max_segment_size = 0 -> single uncapped
        // segment named `<basename>.raw`.
        let dir = tempdir().unwrap();
        let basename = dir.path().join("B");

        let data = vec![0xABu8; 1_048_576];
        let mut writer = RawHandle::new();
        writer.open(&[basename.clone()], Access::Write).unwrap();
        writer.set_media_size(1_048_576).unwrap();
        writer.set_bytes_per_sector(512).unwrap();
        writer
            .set_integrity_hash_value("MD5", "deadbeefdeadbeefdeadbeefdeadbeef")
            .unwrap();
        writer.write(&data).unwrap();
        writer.close().unwrap();

        let raw_path = dir.path().join("B.raw");
        assert!(raw_path.is_file());
        assert_eq!(std::fs::metadata(&raw_path).unwrap().len(), 1_048_576);

        let info_contents = std::fs::read_to_string(dir.path().join("B.raw.info")).unwrap();
        assert!(info_contents.contains("<media_size>1048576</media_size>"));
        assert!(info_contents.contains("<bytes_per_sector>512</bytes_per_sector>"));

        let mut reader = RawHandle::new();
        reader.open(&[raw_path], Access::Read).unwrap();
        assert_eq!(reader.get_media_size(), 1_048_576);
        let mut buf = vec![0u8; 1_048_576];
        let n = reader.read(&mut buf).unwrap();
        assert_eq!(n, 1_048_576);
        assert_eq!(buf, data);
    }

    #[test]
    fn s2_split_segment_growth() {
        // S2 — 10,000,000 bytes, max_segment_size = 1,048,576 -> ten
        // segments, B.raw.000 .. B.raw.009, last one short.
        let dir = tempdir().unwrap();
        let basename = dir.path().join("B");

        let data = vec![0x11u8; 10_000_000];
        let mut writer = RawHandle::new();
        writer.open(&[basename.clone()], Access::Write).unwrap();
        writer.set_media_size(10_000_000).unwrap();
        writer.set_maximum_segment_size(1_048_576).unwrap();
        writer.write(&data).unwrap();
        writer.close().unwrap();

        for i in 0..10 {
            let seg = dir.path().join(format!("B.raw.{i:03}"));
            assert!(seg.is_file(), "missing {seg:?}");
            let expected_len = if i < 9 { 1_048_576 } else { 10_000_000 - 9 * 1_048_576 };
            assert_eq!(std::fs::metadata(&seg).unwrap().len(), expected_len);
        }
        assert!(!dir.path().join("B.raw").exists());
    }

    #[test]
    fn immutable_after_open_rejects_media_size_change() {
        let dir = tempdir().unwrap();
        let basename = dir.path().join("B");
        let mut writer = RawHandle::new();
        writer.open(&[basename], Access::Write).unwrap();
        writer.write(b"x").unwrap();
        assert!(writer.set_media_size(123).is_err());
    }

    #[test]
    fn information_values_become_immutable_after_read() {
        let dir = tempdir().unwrap();
        let basename = dir.path().join("B");
        let mut writer = RawHandle::new();
        writer.open(&[basename.clone()], Access::Write).unwrap();
        writer.set_information_value("case_number", "CASE-1").unwrap();
        writer.write(b"hello").unwrap();
        writer.close().unwrap();

        let mut reader = RawHandle::new();
        reader.open(&[dir.path().join("B.raw")], Access::Read).unwrap();
        assert_eq!(
            reader.information_value_of("case_number"),
            Some("CASE-1".to_string())
        );
        assert!(reader
            .set_information_value("case_number", "CASE-2")
            .is_err());
    }
}
