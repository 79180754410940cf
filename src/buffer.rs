//! §3/§4.F StorageMediaBuffer — the chunk-sized scratch region the
//! acquisition/export loop reads into and writes out of.
//!
//! Shaped after this crate's own `ewf::EWF` chunk cache (a single cached
//! chunk with a read pointer, refilled as the cursor crosses chunk
//! boundaries) and `zff-rs`'s `buffer_chunk`/`prepare_chunk` helpers,
//! which also pair a raw read buffer with a second buffer for the
//! processed (there: compressed) form.

use crate::error::{Error, Result};

/// A chunk-sized transfer buffer holding raw and/or compressed bytes.
///
/// Invariant: exactly one of `raw_buffer`/`compression_buffer` holds the
/// currently-valid payload, selected by `data_in_compression_buffer`.
pub struct StorageMediaBuffer {
    raw_buffer: Vec<u8>,
    compression_buffer: Vec<u8>,
    /// Whether the payload currently held is compressed.
    pub is_compressed: bool,
    /// Whether `compression_buffer` (true) or `raw_buffer` (false) holds
    /// the valid payload.
    pub data_in_compression_buffer: bool,
    /// CRC-32-ish checksum carried alongside the chunk (format-specific
    /// meaning; opaque to this buffer).
    pub checksum: u32,
    /// Whether the checksum field above should be processed/verified by
    /// the caller.
    pub process_checksum: bool,
    raw_data_len: usize,
    compressed_data_len: usize,
}

impl StorageMediaBuffer {
    /// Allocates a buffer sized for `chunk_size` raw bytes and
    /// `compressed_capacity` compressed bytes (compressed data can
    /// exceed the raw size for incompressible input plus container
    /// overhead, so the caller picks a headroom multiple).
    pub fn new(chunk_size: usize, compressed_capacity: usize) -> Self {
        StorageMediaBuffer {
            raw_buffer: vec![0u8; chunk_size],
            compression_buffer: vec![0u8; compressed_capacity],
            is_compressed: false,
            data_in_compression_buffer: false,
            checksum: 0,
            process_checksum: false,
            raw_data_len: 0,
            compressed_data_len: 0,
        }
    }

    /// Raw-region capacity.
    pub fn raw_capacity(&self) -> usize {
        self.raw_buffer.len()
    }

    /// Compression-region capacity.
    pub fn compression_capacity(&self) -> usize {
        self.compression_buffer.len()
    }

    /// Mutable access to the raw region, e.g. for a reader to fill
    /// directly.
    pub fn raw_buffer_mut(&mut self) -> &mut [u8] {
        &mut self.raw_buffer
    }

    /// Mutable access to the compression region.
    pub fn compression_buffer_mut(&mut self) -> &mut [u8] {
        &mut self.compression_buffer
    }

    /// Records how many valid bytes now sit in the raw region and
    /// selects it as the active payload.
    pub fn set_raw_data_len(&mut self, len: usize) {
        self.raw_data_len = len;
        self.data_in_compression_buffer = false;
    }

    /// Records how many valid bytes now sit in the compression region and
    /// selects it as the active payload.
    pub fn set_compressed_data_len(&mut self, len: usize) {
        self.compressed_data_len = len;
        self.data_in_compression_buffer = true;
    }

    /// Returns a view of whichever region currently holds the payload,
    /// and its length.
    pub fn get_data(&mut self) -> (&[u8], usize) {
        if self.data_in_compression_buffer {
            (&self.compression_buffer[..self.compressed_data_len], self.compressed_data_len)
        } else {
            (&self.raw_buffer[..self.raw_data_len], self.raw_data_len)
        }
    }

    /// Returns the length of whichever region currently holds the
    /// payload, without borrowing the data.
    pub fn data_len(&self) -> usize {
        if self.data_in_compression_buffer {
            self.compressed_data_len
        } else {
            self.raw_data_len
        }
    }

    /// Zeroes both regions (used by the acquisition loop's
    /// `zero_chunk_on_read_error` path) without changing which region is
    /// "active" -- the caller sets that afterward.
    pub fn zero(&mut self) {
        self.raw_buffer.iter_mut().for_each(|b| *b = 0);
        self.compression_buffer.iter_mut().for_each(|b| *b = 0);
    }

    /// Swaps every adjacent byte pair in the first `len` bytes of
    /// whichever region is active, in place. `len` must be even.
    ///
    /// Used to normalize big-endian SCSI/IDE reads to little-endian
    /// on-disk order; applying it twice is the identity (§8 "Swap
    /// involution").
    pub fn swap_byte_pairs(&mut self, len: usize) -> Result<()> {
        if len % 2 != 0 {
            return Err(Error::argument(format!(
                "swap_byte_pairs requires an even length, got {len}"
            )));
        }
        let buf = if self.data_in_compression_buffer {
            &mut self.compression_buffer[..len]
        } else {
            &mut self.raw_buffer[..len]
        };
        swap_byte_pairs_slice(buf);
        Ok(())
    }
}

/// Swaps every adjacent byte pair of `buf` in place. `buf.len()` must be
/// even; odd-length slices are rejected by callers before reaching here.
pub fn swap_byte_pairs_slice(buf: &mut [u8]) {
    let mut i = 0;
    while i + 1 < buf.len() {
        buf.swap(i, i + 1);
        i += 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_is_involution() {
        let original = vec![0x00u8, 0x01, 0x02, 0x03];
        let mut buf = original.clone();
        swap_byte_pairs_slice(&mut buf);
        assert_eq!(buf, vec![0x01, 0x00, 0x03, 0x02]);
        swap_byte_pairs_slice(&mut buf);
        assert_eq!(buf, original);
    }

    #[test]
    fn swap_rejects_odd_length() {
        let mut smb = StorageMediaBuffer::new(16, 16);
        smb.set_raw_data_len(3);
        assert!(smb.swap_byte_pairs(3).is_err());
    }

    #[test]
    fn get_data_selects_active_region() {
        let mut smb = StorageMediaBuffer::new(16, 16);
        smb.raw_buffer_mut()[..4].copy_from_slice(&[1, 2, 3, 4]);
        smb.set_raw_data_len(4);
        assert_eq!(smb.get_data().0, &[1, 2, 3, 4]);

        smb.compression_buffer_mut()[..2].copy_from_slice(&[9, 9]);
        smb.set_compressed_data_len(2);
        assert_eq!(smb.get_data().0, &[9, 9]);
    }
}
