//! §3 ValueTable — an ordered collection of `(identifier, value, type)`
//! triples, as read from or written to an [`crate::information_file`]
//! section.
//!
//! Grounded on `libsmraw_metadata.c`'s identifier/value storage,
//! expressed as a plain descriptor map the way this crate's other
//! format readers build theirs over `HashMap<String, String>` — except
//! a `ValueTable` must preserve insertion order (the info file is
//! written section-by-section in a stable order), so a `Vec` backs it
//! instead.

use crate::error::{Error, Result};

/// The narrowed set of value types an info-file entry may hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Rendered as decimal ASCII when persisted.
    UInt64(u64),
    /// A UTF-8 string, free of the `<` byte.
    Utf8(String),
}

impl Value {
    /// Renders the value the way it is written into an info-file value
    /// line: decimal ASCII for integers, verbatim for strings.
    pub fn render(&self) -> String {
        match self {
            Value::UInt64(n) => n.to_string(),
            Value::Utf8(s) => s.clone(),
        }
    }

    /// Returns the UTF-8 string form, parsing an integer into decimal if
    /// necessary.
    pub fn as_str_lossy(&self) -> String {
        self.render()
    }

    /// Returns `Some(n)` if this value is (or decimal-parses as) an
    /// unsigned 64-bit integer.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt64(n) => Some(*n),
            Value::Utf8(s) => s.parse().ok(),
        }
    }
}

/// Identifiers are restricted to `[A-Za-z0-9_]+`.
fn is_valid_identifier(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// An ordered `(identifier, value)` table. Lookups are linear, which is
/// fine: these tables hold a handful of well-known media/provenance/hash
/// keys, never an unbounded count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueTable {
    entries: Vec<(String, Value)>,
}

impl ValueTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        ValueTable {
            entries: Vec::new(),
        }
    }

    /// Number of entries currently stored.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Returns the identifier at position `i`, in insertion order.
    pub fn identifier_at(&self, i: usize) -> Option<&str> {
        self.entries.get(i).map(|(id, _)| id.as_str())
    }

    /// Returns the value at position `i`, in insertion order.
    pub fn value_at(&self, i: usize) -> Option<&Value> {
        self.entries.get(i).map(|(_, v)| v)
    }

    /// Looks up a value by identifier.
    pub fn get(&self, identifier: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(id, _)| id == identifier)
            .map(|(_, v)| v)
    }

    /// Convenience: look up and render as a UTF-8 string.
    pub fn utf8_value_of(&self, identifier: &str) -> Option<String> {
        self.get(identifier).map(|v| v.as_str_lossy())
    }

    /// Convenience: look up and parse as `u64`.
    pub fn u64_value_of(&self, identifier: &str) -> Option<u64> {
        self.get(identifier).and_then(|v| v.as_u64())
    }

    /// Inserts or overwrites `identifier`'s value, preserving the
    /// position of an existing entry.
    ///
    /// Rejects identifiers outside `[A-Za-z0-9_]+` and string values
    /// containing `<` (the byte that would break info-file parsing).
    pub fn set(&mut self, identifier: impl Into<String>, value: Value) -> Result<()> {
        let identifier = identifier.into();
        if !is_valid_identifier(&identifier) {
            return Err(Error::argument(format!(
                "invalid value identifier: {identifier:?}"
            )));
        }
        if let Value::Utf8(s) = &value {
            if s.contains('<') {
                return Err(Error::argument(
                    "value text must not contain '<'".to_string(),
                ));
            }
        }
        if let Some(slot) = self.entries.iter_mut().find(|(id, _)| *id == identifier) {
            slot.1 = value;
        } else {
            self.entries.push((identifier, value));
        }
        Ok(())
    }

    /// Convenience wrapper around [`ValueTable::set`] for UTF-8 values.
    pub fn set_utf8(&mut self, identifier: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.set(identifier, Value::Utf8(value.into()))
    }

    /// Convenience wrapper around [`ValueTable::set`] for integer values.
    pub fn set_u64(&mut self, identifier: impl Into<String>, value: u64) -> Result<()> {
        self.set(identifier, Value::UInt64(value))
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(id, v)| (id.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_identifier() {
        let mut t = ValueTable::new();
        assert!(t.set("bad id", Value::Utf8("x".into())).is_err());
        assert!(t.set("bad-id", Value::Utf8("x".into())).is_err());
        assert!(t.set("good_id1", Value::Utf8("x".into())).is_ok());
    }

    #[test]
    fn rejects_angle_bracket_value() {
        let mut t = ValueTable::new();
        assert!(t.set("k", Value::Utf8("a<b".into())).is_err());
    }

    #[test]
    fn preserves_insertion_order_and_overwrites_in_place() {
        let mut t = ValueTable::new();
        t.set_utf8("a", "1").unwrap();
        t.set_utf8("b", "2").unwrap();
        t.set_utf8("a", "3").unwrap();
        assert_eq!(t.count(), 2);
        assert_eq!(t.identifier_at(0), Some("a"));
        assert_eq!(t.utf8_value_of("a"), Some("3".to_string()));
    }

    #[test]
    fn integer_round_trip() {
        let mut t = ValueTable::new();
        t.set_u64("media_size", 1_048_576).unwrap();
        assert_eq!(t.u64_value_of("media_size"), Some(1_048_576));
        assert_eq!(t.utf8_value_of("media_size"), Some("1048576".to_string()));
    }
}
