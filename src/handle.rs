//! §9 "Dynamic dispatch" — the engine's capability boundary over its
//! input and output.
//!
//! Shaped after the `BodyFormat` enum dispatch this crate already used
//! elsewhere: this crate only ever needs two concrete backends, so an
//! enum keeps `Clone`/ownership simple where a trait object would need
//! `Box<dyn Trait>` plumbing for no benefit.

use crate::error::{Error, Result};
use crate::ewf_handle::EwfHandle;
use crate::raw_handle::RawHandle;
use std::io::SeekFrom;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

enum Backend {
    Raw(RawHandle),
    Ewf(EwfHandle),
}

/// Either concrete image backend, exposing the capability set the
/// acquisition/export engines drive: `{ read_chunk, prepare_read,
/// write_chunk, prepare_write, seek, close, signal_abort,
/// write_finalize, set_hash_value, append_read_error }`.
pub struct ImageHandle {
    backend: Backend,
    abort: Arc<AtomicBool>,
}

impl ImageHandle {
    pub fn raw(handle: RawHandle) -> Self {
        ImageHandle {
            backend: Backend::Raw(handle),
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn ewf(handle: EwfHandle) -> Self {
        ImageHandle {
            backend: Backend::Ewf(handle),
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A clone of this handle's cancellation flag, to be shared with an
    /// engine's other handle (source/secondary) so either side aborting
    /// stops the whole job. Per §9 "Global mutable state": the source's
    /// process-wide `abort` singleton becomes an `Arc<AtomicBool>`
    /// owned by the engine and cloned wherever it needs to be observed.
    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    /// Replaces this handle's cancellation flag with one shared by
    /// another party (typically the engine or a paired secondary
    /// output), so `signal_abort` on either observes on both.
    pub fn share_abort_flag(&mut self, flag: Arc<AtomicBool>) {
        self.abort = flag;
    }

    /// Cooperative cancellation: the next chunk operation on this
    /// handle (and anyone sharing its flag) returns `Error::Aborted`.
    pub fn signal_abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    fn check_abort(&self) -> Result<()> {
        if self.abort.load(Ordering::SeqCst) {
            Err(Error::Aborted)
        } else {
            Ok(())
        }
    }

    /// Reads up to `buf.len()` bytes at the current offset. Both
    /// backends already return fully decompressed/decoded bytes from
    /// this call (the EWF reader's checksum/decompression handling
    /// lives inside `ewf::EWF::read`), so `prepare_read` below is a
    /// pass-through rather than a second decode step.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.check_abort()?;
        match &mut self.backend {
            Backend::Raw(h) => h.read(buf),
            Backend::Ewf(h) => h.read(buf),
        }
    }

    /// Identity pass-through: both backends report decode failures
    /// directly from `read_chunk` as an `Err`, so there is no separate
    /// masking step to run here. Kept as its own method to match the
    /// engine's §4.H pipeline shape and give call sites a single place
    /// to extend if a future backend needs post-read validation.
    pub fn prepare_read(&self, len: usize) -> Result<usize> {
        Ok(len)
    }

    /// Prepares `raw` for `write_chunk`: compresses it when the output
    /// is an EWF handle configured for deflate, otherwise passes it
    /// through unchanged. Returns `(payload, is_compressed)`.
    pub fn prepare_write(&self, raw: &[u8]) -> Result<(Vec<u8>, bool)> {
        match &self.backend {
            Backend::Raw(_) => Ok((raw.to_vec(), false)),
            Backend::Ewf(h) => h.prepare_write_chunk(raw),
        }
    }

    /// Writes `payload` (as already prepared by `prepare_write`).
    pub fn write_chunk(&mut self, payload: &[u8], is_compressed: bool) -> Result<usize> {
        self.check_abort()?;
        match &mut self.backend {
            Backend::Raw(h) => h.write(payload),
            Backend::Ewf(h) => h.write_chunk(payload, is_compressed),
        }
    }

    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.check_abort()?;
        match &mut self.backend {
            Backend::Raw(h) => h.seek(pos),
            Backend::Ewf(h) => h.seek(pos),
        }
    }

    /// Stores a finalized digest (`MD5`/`SHA1`/`SHA256`) on the output.
    /// No-op on a read-mode EWF handle (never called in that direction
    /// by either engine).
    pub fn set_hash_value(&mut self, identifier: &str, value: impl Into<String>) -> Result<()> {
        match &mut self.backend {
            Backend::Raw(h) => h.set_integrity_hash_value(identifier, value),
            Backend::Ewf(h) => h.set_hash_value(identifier, value),
        }
    }

    /// Records a byte range that could not be read faithfully from the
    /// source, converting to sector units with ceiling rounding per
    /// §4.H, and appending to the output's error table.
    pub fn append_read_error(&mut self, start_offset: u64, byte_count: u64, bytes_per_sector: u64) -> Result<()> {
        let bps = bytes_per_sector.max(1);
        let start_sector = start_offset / bps;
        let sector_count = (byte_count + bps - 1) / bps;
        match &mut self.backend {
            Backend::Raw(h) => {
                h.append_read_error(start_sector, sector_count);
                Ok(())
            }
            Backend::Ewf(h) => h.append_acquiry_error(start_sector, sector_count),
        }
    }

    /// Finalizes trailing metadata: the info-file sidecar for raw, or
    /// the `disk`/`done` sections for EWF. Idempotent-safe for raw;
    /// EWF refuses a second call internally via its own `finalized` flag.
    pub fn write_finalize(&mut self) -> Result<()> {
        match &mut self.backend {
            Backend::Raw(h) => h.close(),
            Backend::Ewf(h) => h.write_finalize(),
        }
    }

    /// Closes every open handle without finalizing metadata (used on
    /// the abort/failure path, where §7 says digests are not emitted).
    pub fn close(&mut self) -> Result<()> {
        match &mut self.backend {
            Backend::Raw(h) => h.close(),
            Backend::Ewf(_) => Ok(()),
        }
    }

    pub fn as_raw_mut(&mut self) -> Option<&mut RawHandle> {
        match &mut self.backend {
            Backend::Raw(h) => Some(h),
            Backend::Ewf(_) => None,
        }
    }

    pub fn as_ewf_mut(&mut self) -> Option<&mut EwfHandle> {
        match &mut self.backend {
            Backend::Ewf(h) => Some(h),
            Backend::Raw(_) => None,
        }
    }
}
