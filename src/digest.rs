//! §4.G IntegrityDigest — MD5 / SHA-1 / SHA-256 streaming digesters
//! wrapped uniformly.
//!
//! Grounded on the `digest::Digest` trait shape shared by the `md-5`,
//! `sha1`, and `sha2` crates (`new()` / `update()` / `finalize()`), the
//! same RustCrypto family already neighboring this crate's `flate2`
//! compression-codec dependency. The "wrap each algorithm behind the same
//! three calls, create only the ones requested" shape mirrors
//! `ewf.rs`'s uniform handling of compressed/uncompressed chunk reads
//! through one `read_chunk` entry point.

use md5::Digest as _;
use sha1::Digest as _;
use sha2::Digest as _;

/// Which algorithms the engine was asked to compute for a job.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestSelection {
    pub md5: bool,
    pub sha1: bool,
    pub sha256: bool,
}

impl DigestSelection {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        DigestSelection {
            md5: true,
            sha1: true,
            sha256: true,
        }
    }
}

/// A running set of the requested digest contexts. Only the algorithms
/// selected at construction are actually allocated and fed.
pub struct IntegrityDigest {
    md5: Option<md5::Md5>,
    sha1: Option<sha1::Sha1>,
    sha256: Option<sha2::Sha256>,
}

/// Finalized hash values, lowercase-hex-rendered for persistence as
/// info-file / EWF hash values (`MD5`, `SHA1`, `SHA256`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestResult {
    pub md5: Option<String>,
    pub sha1: Option<String>,
    pub sha256: Option<String>,
}

impl IntegrityDigest {
    /// Creates exactly the digesters `selection` asks for.
    pub fn new(selection: DigestSelection) -> Self {
        IntegrityDigest {
            md5: selection.md5.then(md5::Md5::new),
            sha1: selection.sha1.then(sha1::Sha1::new),
            sha256: selection.sha256.then(sha2::Sha256::new),
        }
    }

    /// Feeds `data` into every active digester. Must be called with the
    /// bytes *as stored* in the output image (post byte-swap), per
    /// §4.H's swap-and-hash order.
    pub fn update(&mut self, data: &[u8]) {
        if let Some(ctx) = self.md5.as_mut() {
            ctx.update(data);
        }
        if let Some(ctx) = self.sha1.as_mut() {
            ctx.update(data);
        }
        if let Some(ctx) = self.sha256.as_mut() {
            ctx.update(data);
        }
    }

    /// Consumes the digesters and renders lowercase hex results.
    pub fn finalize(self) -> DigestResult {
        DigestResult {
            md5: self.md5.map(|ctx| hex_lower(&ctx.finalize())),
            sha1: self.sha1.map(|ctx| hex_lower(&ctx.finalize())),
            sha256: self.sha256.map(|ctx| hex_lower(&ctx.finalize())),
        }
    }
}

fn hex_lower(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(s, "{b:02x}").expect("writing to a String cannot fail");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_matches_known_vectors() {
        let mut d = IntegrityDigest::new(DigestSelection::all());
        d.update(b"");
        let r = d.finalize();
        assert_eq!(r.md5.as_deref(), Some("d41d8cd98f00b204e9800998ecf8427e"));
        assert_eq!(
            r.sha1.as_deref(),
            Some("da39a3ee5e6b4b0d3255bfef95601890afd80709")
        );
        assert_eq!(
            r.sha256.as_deref(),
            Some("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
        );
    }

    #[test]
    fn abc_matches_known_vectors() {
        let mut d = IntegrityDigest::new(DigestSelection::all());
        d.update(b"abc");
        let r = d.finalize();
        assert_eq!(r.md5.as_deref(), Some("900150983cd24fb0d6963f7d28e17f72"));
        assert_eq!(
            r.sha1.as_deref(),
            Some("a9993e364706816aba3e25717850c26c9cd0d89d")
        );
        assert_eq!(
            r.sha256.as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }

    #[test]
    fn only_requested_algorithms_are_computed() {
        let mut d = IntegrityDigest::new(DigestSelection {
            md5: true,
            sha1: false,
            sha256: false,
        });
        d.update(b"abc");
        let r = d.finalize();
        assert!(r.md5.is_some());
        assert!(r.sha1.is_none());
        assert!(r.sha256.is_none());
    }

    #[test]
    fn streamed_update_matches_single_update() {
        let mut streamed = IntegrityDigest::new(DigestSelection::all());
        streamed.update(b"ab");
        streamed.update(b"c");
        let streamed_result = streamed.finalize();

        let mut single = IntegrityDigest::new(DigestSelection::all());
        single.update(b"abc");
        let single_result = single.finalize();

        assert_eq!(streamed_result, single_result);
    }
}
