//! Error taxonomy shared by every component of the acquisition/export engine.
//!
//! Leaf components (the pool, the segment table, the globber, …) return
//! these variants directly; mid-level components add context with
//! [`Error::Missing`]/[`Error::Conversion`] wrappers but never swallow an
//! error: context is added, never discarded, as a failure crosses a
//! component boundary.

use std::fmt;

/// The single error type returned by every fallible public function in
/// this crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A null, zero-or-less, or out-of-bounds argument was supplied.
    #[error("invalid argument: {0}")]
    ArgumentInvalid(String),

    /// An attempt to mutate a field that becomes immutable once a handle
    /// has been opened for read or write.
    #[error("value is immutable once the handle is open: {0}")]
    AlreadySet(String),

    /// Required state (e.g. an info-file section) was absent.
    #[error("missing: {0}")]
    Missing(String),

    /// An I/O failure from the file pool or a segment file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An encoding mismatch (UTF-8, decimal, or hex).
    #[error("conversion error: {0}")]
    Conversion(String),

    /// A short read occurred inside the acquisition window.
    #[error("unexpected end of file after {read} of {expected} requested bytes")]
    UnexpectedEof {
        /// Bytes actually read before the short read.
        read: u64,
        /// Bytes the caller expected.
        expected: u64,
    },

    /// `prepare_read_chunk` reported a chunk-decode failure (e.g. an EWF
    /// checksum mismatch). The engine recovers from this locally per
    /// §4.H; it is surfaced as an error only when no
    /// recovery policy is configured.
    #[error("checksum mismatch in chunk {chunk_number}")]
    ChecksumMismatch {
        /// Global chunk index that failed to validate.
        chunk_number: usize,
    },

    /// The output ran out of space while writing.
    #[error("insufficient space while writing: {0}")]
    InsufficientSpace(String),

    /// The segment-naming callback failed while growing a write volume.
    #[error("could not generate a name for the next segment: {0}")]
    SegmentNameFailed(String),

    /// The filename globber could not classify a resolved suffix into a
    /// known naming schema, or a declared `XofN` total was not satisfied.
    #[error("naming schema error: {0}")]
    NamingSchema(String),

    /// Cooperative cancellation was observed.
    #[error("operation aborted")]
    Aborted,
}

impl Error {
    /// Convenience constructor for [`Error::ArgumentInvalid`].
    pub fn argument(msg: impl Into<String>) -> Self {
        Error::ArgumentInvalid(msg.into())
    }

    /// Convenience constructor for [`Error::Missing`].
    pub fn missing(msg: impl Into<String>) -> Self {
        Error::Missing(msg.into())
    }

    /// Convenience constructor for [`Error::Conversion`].
    pub fn conversion(msg: impl Into<String>) -> Self {
        Error::Conversion(msg.into())
    }

    /// True for the one error kind the acquisition loop is allowed to
    /// recover from locally (see §4.H).
    pub fn is_checksum_mismatch(&self) -> bool {
        matches!(self, Error::ChecksumMismatch { .. })
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The taxonomy "kind", stripped of message payloads, for callers that
/// want to `match` without caring about the human-readable text (e.g. the
/// CLI's exit-code logic, which only needs "did anything fail").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ArgumentInvalid,
    AlreadySet,
    Missing,
    Io,
    Conversion,
    UnexpectedEof,
    ChecksumMismatch,
    InsufficientSpace,
    SegmentNameFailed,
    NamingSchema,
    Aborted,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Error {
    /// Returns the taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ArgumentInvalid(_) => ErrorKind::ArgumentInvalid,
            Error::AlreadySet(_) => ErrorKind::AlreadySet,
            Error::Missing(_) => ErrorKind::Missing,
            Error::Io(_) => ErrorKind::Io,
            Error::Conversion(_) => ErrorKind::Conversion,
            Error::UnexpectedEof { .. } => ErrorKind::UnexpectedEof,
            Error::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            Error::InsufficientSpace(_) => ErrorKind::InsufficientSpace,
            Error::SegmentNameFailed(_) => ErrorKind::SegmentNameFailed,
            Error::NamingSchema(_) => ErrorKind::NamingSchema,
            Error::Aborted => ErrorKind::Aborted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_mismatch_is_recoverable() {
        let e = Error::ChecksumMismatch { chunk_number: 7 };
        assert!(e.is_checksum_mismatch());
        assert_eq!(e.kind(), ErrorKind::ChecksumMismatch);
    }

    #[test]
    fn io_error_converts_via_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "nope");
        let e: Error = io_err.into();
        assert_eq!(e.kind(), ErrorKind::Io);
    }
}
