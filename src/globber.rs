//! §4.E FilenameGlobber — resolves one user-supplied path into the
//! ordered list of segment files that make up the same image.
//!
//! Grounded on this crate's own `ewf.rs::find_files` (glob-based
//! multi-segment discovery for the EWF `E??` pattern) generalized to
//! the four naming schemas below, and on `libsmraw`'s segment-name
//! generator, which distinguishes a single `.raw` file from a
//! `.raw.NNN` multi-segment run.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Fixed candidate suffixes tried, in order, when the bare path does not
/// exist on disk.
const CANDIDATE_SUFFIXES: &[&str] = &[
    ".raw", ".dmg", ".img", ".dd", ".000", ".001", ".00", ".01", ".0", ".1", "aa", "00", "aaa",
    "000",
];

/// The detected naming convention for a multi-segment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingSchema {
    /// A single file; no further segments follow.
    Single,
    /// Suffix is all ASCII digits; next segment increments the value,
    /// widening by one digit at most once on overflow.
    Numeric,
    /// Suffix is all lowercase ASCII letters; next segment increments
    /// base-26 at fixed width.
    Split,
    /// Suffix is `<digits>o<digits>` (e.g. `1of3`); the trailing number
    /// is a fixed, declared segment count.
    XofN,
}

/// Resolves `path` into the ordered list of segment files belonging to
/// the same image.
pub fn glob(path: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let path = path.as_ref();

    let first = resolve_first_segment(path)?;
    let (stem, suffix) = split_stem_and_suffix(&first)?;
    let schema = classify(&suffix);

    match schema {
        NamingSchema::Single => Ok(vec![first]),
        NamingSchema::Numeric => Ok(collect_numeric(&stem, &suffix, first)),
        NamingSchema::Split => Ok(collect_split(&stem, &suffix, first)),
        NamingSchema::XofN => collect_xofn(&stem, &suffix, first),
    }
}

/// Step 1: find the first segment file, either `path` itself or
/// `path` + one of the fixed candidate suffixes.
fn resolve_first_segment(path: &Path) -> Result<PathBuf> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    for suffix in CANDIDATE_SUFFIXES {
        let candidate = append_to_filename(path, suffix);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(Error::NamingSchema(format!(
        "no segment file found at or derived from {}",
        path.display()
    )))
}

/// Splits a resolved first-segment path into (stem, suffix) where
/// `suffix` is whatever trails the last `.` in the file name, or the
/// whole file name if there is no `.`.
fn split_stem_and_suffix(path: &Path) -> Result<(PathBuf, String)> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::NamingSchema(format!("non-UTF8 file name: {}", path.display())))?;

    let (stem, suffix) = match file_name.rfind('.') {
        Some(idx) if idx > 0 => (&file_name[..idx], &file_name[idx + 1..]),
        _ => ("", file_name),
    };

    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    Ok((parent.join(stem), suffix.to_string()))
}

fn classify(suffix: &str) -> NamingSchema {
    let lower = suffix.to_ascii_lowercase();
    if matches!(lower.as_str(), "dd" | "img" | "dmg" | "raw") {
        return NamingSchema::Single;
    }
    if is_xofn(suffix) {
        return NamingSchema::XofN;
    }
    if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
        return NamingSchema::Numeric;
    }
    if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_lowercase()) {
        return NamingSchema::Split;
    }
    NamingSchema::Single
}

/// Matches `<digits>[oO]<digits>`, e.g. `1of3`, `01of12`.
fn is_xofn(suffix: &str) -> bool {
    let bytes = suffix.as_bytes();
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == 0 || i >= bytes.len() {
        return false;
    }
    // Accept a literal "of" or a single o/O separator.
    let rest = &suffix[i..];
    let after = if let Some(r) = rest.strip_prefix("of").or_else(|| rest.strip_prefix("OF")) {
        r
    } else if let Some(r) = rest.strip_prefix('o').or_else(|| rest.strip_prefix('O')) {
        r
    } else {
        return false;
    };
    !after.is_empty() && after.bytes().all(|b| b.is_ascii_digit())
}

fn append_to_filename(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(suffix);
    match path.parent() {
        Some(parent) if parent.as_os_str().len() > 0 => parent.join(name),
        _ => PathBuf::from(name),
    }
}

fn collect_numeric(stem: &Path, first_suffix: &str, first: PathBuf) -> Vec<PathBuf> {
    let width = first_suffix.len();
    let start_value: u64 = first_suffix.parse().unwrap_or(0);

    // The resolved path may be any member segment, not just the lowest one:
    // rewind to the lowest existing index at this width before collecting
    // forward.
    let mut lowest = start_value;
    while lowest > 0 {
        let prev = lowest - 1;
        let candidate_suffix = format!("{prev:0width$}", width = width);
        if stem_with_suffix(stem, &candidate_suffix).is_file() {
            lowest = prev;
        } else {
            break;
        }
    }

    let mut out = Vec::new();
    for value in lowest..start_value {
        out.push(stem_with_suffix(stem, &format!("{value:0width$}", width = width)));
    }
    out.push(first);

    let mut value = start_value;
    let mut current_width = width;
    let mut widened_once = false;

    loop {
        value += 1;
        let mut candidate_suffix = format!("{value:0width$}", width = current_width);
        if candidate_suffix.len() > current_width {
            if widened_once {
                break;
            }
            widened_once = true;
            current_width += 1;
            candidate_suffix = format!("{value:0width$}", width = current_width);
        }
        let candidate = stem_with_suffix(stem, &candidate_suffix);
        if candidate.is_file() {
            out.push(candidate);
        } else {
            break;
        }
    }
    out
}

fn collect_split(stem: &Path, first_suffix: &str, first: PathBuf) -> Vec<PathBuf> {
    let width = first_suffix.len();
    let start_value = base26_to_value(first_suffix);

    let mut lowest = start_value;
    while lowest > 0 {
        let prev = lowest - 1;
        match value_to_base26(prev, width) {
            Some(candidate_suffix) if stem_with_suffix(stem, &candidate_suffix).is_file() => {
                lowest = prev;
            }
            _ => break,
        }
    }

    let mut out = Vec::new();
    for value in lowest..start_value {
        if let Some(suffix) = value_to_base26(value, width) {
            out.push(stem_with_suffix(stem, &suffix));
        }
    }
    out.push(first);

    let mut value = start_value;
    loop {
        value += 1;
        let candidate_suffix = match value_to_base26(value, width) {
            Some(s) => s,
            None => break, // exhausted this width; Split does not widen.
        };
        let candidate = stem_with_suffix(stem, &candidate_suffix);
        if candidate.is_file() {
            out.push(candidate);
        } else {
            break;
        }
    }
    out
}

fn collect_xofn(stem: &Path, first_suffix: &str, first: PathBuf) -> Result<Vec<PathBuf>> {
    let (index_str, n) = parse_xofn(first_suffix)
        .ok_or_else(|| Error::NamingSchema(format!("malformed XofN suffix: {first_suffix}")))?;
    let width = index_str.len();
    let separator = xofn_separator(first_suffix);

    let mut out = vec![first];
    for index in 2..=n {
        let candidate_suffix = format!("{index:0width$}{separator}{n}", width = width);
        let candidate = stem_with_suffix(stem, &candidate_suffix);
        if candidate.is_file() {
            out.push(candidate);
        } else {
            return Err(Error::NamingSchema(format!(
                "MissingSegments: expected {n} segments, found {} before {candidate_suffix}",
                out.len()
            )));
        }
    }
    Ok(out)
}

fn xofn_separator(suffix: &str) -> &'static str {
    if suffix.to_ascii_lowercase().contains("of") {
        "of"
    } else {
        "o"
    }
}

fn parse_xofn(suffix: &str) -> Option<(String, u64)> {
    let bytes = suffix.as_bytes();
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == 0 {
        return None;
    }
    let index_str = suffix[..i].to_string();
    let rest = &suffix[i..];
    let after = rest
        .strip_prefix("of")
        .or_else(|| rest.strip_prefix("OF"))
        .or_else(|| rest.strip_prefix('o'))
        .or_else(|| rest.strip_prefix('O'))?;
    let n: u64 = after.parse().ok()?;
    Some((index_str, n))
}

fn stem_with_suffix(stem: &Path, suffix: &str) -> PathBuf {
    let mut name = stem
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push('.');
    name.push_str(suffix);
    match stem.parent() {
        Some(parent) if parent.as_os_str().len() > 0 => parent.join(name),
        _ => PathBuf::from(name),
    }
}

fn base26_to_value(s: &str) -> u64 {
    let mut value: u64 = 0;
    for b in s.bytes() {
        value = value * 26 + (b - b'a') as u64;
    }
    value
}

fn value_to_base26(mut value: u64, width: usize) -> Option<String> {
    let mut digits = Vec::new();
    for _ in 0..width {
        digits.push((value % 26) as u8);
        value /= 26;
    }
    if value != 0 {
        return None; // would need to widen; Split schema does not widen.
    }
    digits.reverse();
    Some(digits.into_iter().map(|d| (b'a' + d) as char).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn single_schema_returns_one_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("image.raw");
        fs::write(&path, b"x").unwrap();

        let found = glob(&path).unwrap();
        assert_eq!(found, vec![path]);
    }

    #[test]
    fn numeric_schema_collects_contiguous_run() {
        // S3 — Globber recovery: given B.raw.003 on disk alongside
        // B.raw.000..B.raw.004, glob("B.raw.003") returns all five in order.
        let dir = tempdir().unwrap();
        for i in 0..5 {
            fs::write(dir.path().join(format!("B.raw.{i:03}")), b"x").unwrap();
        }
        let found = glob(dir.path().join("B.raw.003")).unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["B.raw.000", "B.raw.001", "B.raw.002", "B.raw.003", "B.raw.004"]
        );
    }

    #[test]
    fn numeric_schema_widens_width_once_on_overflow() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("B.raw.9"), b"x").unwrap();
        fs::write(dir.path().join("B.raw.10"), b"x").unwrap();
        let found = glob(dir.path().join("B.raw.9")).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].file_name().unwrap().to_str().unwrap(), "B.raw.10");
    }

    #[test]
    fn split_schema_collects_base26_run() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("B.aa"), b"x").unwrap();
        fs::write(dir.path().join("B.ab"), b"x").unwrap();
        fs::write(dir.path().join("B.ac"), b"x").unwrap();
        let found = glob(dir.path().join("B.aa")).unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["B.aa", "B.ab", "B.ac"]);
    }

    #[test]
    fn split_schema_rewinds_from_a_middle_segment() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("B.aa"), b"x").unwrap();
        fs::write(dir.path().join("B.ab"), b"x").unwrap();
        fs::write(dir.path().join("B.ac"), b"x").unwrap();
        let found = glob(dir.path().join("B.ab")).unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["B.aa", "B.ab", "B.ac"]);
    }

    #[test]
    fn numeric_schema_rewinds_from_the_middle_of_the_run() {
        // S3 — glob() resolves from *any* member segment, not just the
        // lowest one: given B.raw.003 on disk, it must still recover the
        // full B.raw.000..004 run.
        let dir = tempdir().unwrap();
        for i in 0..5 {
            fs::write(dir.path().join(format!("B.raw.{i:03}")), b"x").unwrap();
        }
        let found = glob(dir.path().join("B.raw.004")).unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["B.raw.000", "B.raw.001", "B.raw.002", "B.raw.003", "B.raw.004"]
        );
    }

    #[test]
    fn xofn_schema_completes_when_all_segments_present() {
        // S4 — given B.1of3 B.2of3 B.3of3, glob("B.1of3") returns all three.
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("B.1of3"), b"x").unwrap();
        fs::write(dir.path().join("B.2of3"), b"x").unwrap();
        fs::write(dir.path().join("B.3of3"), b"x").unwrap();
        let found = glob(dir.path().join("B.1of3")).unwrap();
        assert_eq!(found.len(), 3);
    }

    #[test]
    fn xofn_schema_fails_with_missing_segments() {
        // S4 — given only B.1of3 B.2of3, glob fails with MissingSegments.
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("B.1of3"), b"x").unwrap();
        fs::write(dir.path().join("B.2of3"), b"x").unwrap();
        let err = glob(dir.path().join("B.1of3")).unwrap_err();
        match err {
            Error::NamingSchema(msg) => assert!(msg.contains("MissingSegments")),
            other => panic!("expected NamingSchema error, got {other:?}"),
        }
    }

    #[test]
    fn candidate_suffix_probing_resolves_bare_path() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("evidence.dd"), b"x").unwrap();
        let found = glob(dir.path().join("evidence")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].file_name().unwrap().to_str().unwrap(),
            "evidence.dd"
        );
    }

    #[test]
    fn missing_path_errors() {
        let dir = tempdir().unwrap();
        assert!(glob(dir.path().join("nope")).is_err());
    }
}
