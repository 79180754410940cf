//! §4.C InformationFile — the `<basename>.raw.info` sidecar.
//!
//! Format: UTF-8, line-oriented. Sections are delimited by
//! `<section_id>` / `</section_id>` lines; inside a section, value lines
//! look like `<key>value</key>`. A value line that doesn't match this
//! shape is skipped, never an error.
//!
//! Grounded on `libsmraw_information_file.c`'s section/tag shape; the
//! open/read_section/write_section/close entry points mirror that
//! file's `libsmraw_information_file_*` function set.

use crate::error::{Error, Result};
use crate::value_table::{Value, ValueTable};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// The three canonical sections this crate reads and writes, in the
/// order they must appear on disk (§6).
pub const SECTION_MEDIA_VALUES: &str = "media_values";
pub const SECTION_INFORMATION_VALUES: &str = "information_values";
pub const SECTION_INTEGRITY_HASH_VALUES: &str = "integrity_hash_values";

/// Mode an [`InformationFile`] is opened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write,
}

/// The sidecar file itself. Holds only a path and the currently-open
/// file handle (if any); content lives in [`ValueTable`]s the caller
/// supplies.
pub struct InformationFile {
    path: PathBuf,
    mode: Option<Mode>,
    file: Option<File>,
}

impl InformationFile {
    /// Creates a handle for the info file at `path`; does not touch disk
    /// until [`InformationFile::open`] is called.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        InformationFile {
            path: path.into(),
            mode: None,
            file: None,
        }
    }

    /// Path on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True if a file exists at this path.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Opens the file for text I/O. Write mode truncates.
    pub fn open(&mut self, mode: Mode) -> Result<()> {
        let file = match mode {
            Mode::Read => File::open(&self.path)?,
            Mode::Write => OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.path)?,
        };
        self.file = Some(file);
        self.mode = Some(mode);
        Ok(())
    }

    /// Closes the file. Idempotent.
    pub fn close(&mut self) {
        self.file = None;
        self.mode = None;
    }

    /// Rewinds, scans, and populates `out` with every value line between
    /// `<id>`/`</id>`. Returns `true` if the section was found.
    ///
    /// Must be opened in [`Mode::Read`].
    pub fn read_section(&mut self, id: &str, out: &mut ValueTable) -> Result<bool> {
        if self.mode != Some(Mode::Read) {
            return Err(Error::argument(
                "information file must be open for read to read a section",
            ));
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| Error::argument("information file is not open"))?;
        use std::io::Seek;
        file.seek(std::io::SeekFrom::Start(0))?;
        let reader = BufReader::new(file);

        let open_tag = format!("<{id}>");
        let close_tag = format!("</{id}>");

        let mut in_section = false;
        let mut found = false;

        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim_start();
            if trimmed.is_empty() {
                continue;
            }
            if !in_section {
                if trimmed == open_tag {
                    in_section = true;
                    found = true;
                }
                continue;
            }
            if trimmed == close_tag {
                break;
            }
            if let Some((key, value)) = parse_value_line(trimmed) {
                // A malformed identifier inside an otherwise-valid value
                // line is still "not matching the shape" -- skip silently.
                if is_valid_key(key) {
                    out.set(key, Value::Utf8(value.to_string())).ok();
                }
            }
        }

        Ok(found)
    }

    /// Appends `<id>\n` then one `\t<key>value</key>\n` line per entry,
    /// then `</id>\n\n`.
    ///
    /// Must be opened in [`Mode::Write`].
    pub fn write_section(&mut self, id: &str, table: &ValueTable) -> Result<()> {
        if self.mode != Some(Mode::Write) {
            return Err(Error::argument(
                "information file must be open for write to write a section",
            ));
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| Error::argument("information file is not open"))?;
        writeln!(file, "<{id}>")?;
        for (key, value) in table.iter() {
            writeln!(file, "\t<{key}>{}</{key}>", value.render())?;
        }
        writeln!(file, "</{id}>")?;
        writeln!(file)?;
        Ok(())
    }
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Parses a `<key>value</key>` line. `value` may contain any byte except
/// `<`, which also means the closing `</key>` must be the first `<`
/// encountered after the opening tag.
fn parse_value_line(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix('<')?;
    let key_end = rest.find('>')?;
    let key = &rest[..key_end];
    if key.is_empty() {
        return None;
    }
    let after_key = &rest[key_end + 1..];
    // The value runs up to the next '<', which must open "</key>".
    let value_end = after_key.find('<')?;
    let value = &after_key[..value_end];
    let expected_close = format!("</{key}>");
    if &after_key[value_end..] != expected_close.as_str() {
        return None;
    }
    Some((key, value))
}
