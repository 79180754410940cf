//! §4.H AcquisitionEngine — read-source → swap → digest → write-output
//! pipeline.
//!
//! Follows libewf's `imaging_handle`/acquire loop shape (read/process/
//! write chunking, error-range accounting) and `zff-rs`'s chunked
//! read/hash/write pipeline, which pairs a read buffer with a digest
//! update and an accumulating writer the same way.

use crate::buffer::StorageMediaBuffer;
use crate::digest::{DigestResult, DigestSelection, IntegrityDigest};
use crate::error::{Error, Result};
use crate::handle::ImageHandle;
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Run status: a small enum rather than boolean flags for job outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Initialized,
    Running,
    Aborted,
    Failed,
    Completed,
}

/// A progress notification emitted at 10% boundaries of `acquire_size`
/// (ambient addition; see §4.H "Progress reporting").
#[derive(Debug, Clone, Copy)]
pub struct ProgressEvent {
    pub bytes_done: u64,
    pub acquire_size: u64,
}

/// One contiguous byte range that could not be read faithfully from
/// the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadErrorRange {
    pub start_offset: u64,
    pub byte_count: u64,
}

/// Configuration and identity of a single acquisition run.
pub struct AcquisitionJob {
    pub acquire_offset: u64,
    pub acquire_size: u64,
    pub bytes_per_sector: u32,
    pub sectors_per_chunk: u32,
    pub process_buffer_size: usize,
    pub swap_byte_pairs: bool,
    pub zero_chunk_on_read_error: bool,
    pub digests: DigestSelection,
    pub run_id: Uuid,
}

impl AcquisitionJob {
    pub fn new(acquire_offset: u64, acquire_size: u64, bytes_per_sector: u32, sectors_per_chunk: u32) -> Self {
        AcquisitionJob {
            acquire_offset,
            acquire_size,
            bytes_per_sector,
            sectors_per_chunk,
            process_buffer_size: 64 * 1024,
            swap_byte_pairs: false,
            zero_chunk_on_read_error: true,
            digests: DigestSelection::all(),
            run_id: Uuid::new_v4(),
        }
    }

    fn chunk_size(&self) -> usize {
        (self.bytes_per_sector as usize) * (self.sectors_per_chunk as usize)
    }
}

/// The outcome of a completed or aborted run.
pub struct AcquisitionResult {
    pub status: Status,
    pub bytes_done: u64,
    pub digests: Option<DigestResult>,
    pub read_errors: Vec<ReadErrorRange>,
}

/// Drives the read → prepare → swap → digest → prepare → write loop of
/// §4.H over a source and primary output, with an optional mirrored
/// secondary output.
pub struct AcquisitionEngine {
    job: AcquisitionJob,
    status: Status,
    abort: Arc<AtomicBool>,
    notify: Box<dyn FnMut(ProgressEvent)>,
}

impl AcquisitionEngine {
    pub fn new(job: AcquisitionJob) -> Self {
        AcquisitionEngine {
            job,
            status: Status::Initialized,
            abort: Arc::new(AtomicBool::new(false)),
            notify: Box::new(default_notify),
        }
    }

    /// Installs a custom progress sink, e.g. a `Vec`-collecting one in
    /// tests, replacing the default `info!`-at-10%-boundaries logger.
    pub fn set_notify(&mut self, notify: Box<dyn FnMut(ProgressEvent)>) {
        self.notify = notify;
    }

    /// A clone of this engine's cancellation flag. Share it with a
    /// caller's own signal handler to support external cancellation.
    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Runs the acquisition to completion, reading from `source` and
    /// writing to `output` (and, if present, mirroring to
    /// `secondary`). On success the primary and secondary outputs both
    /// receive `set_hash_value` calls and `write_finalize`; on failure
    /// every handle is closed without finalizing, per §7.
    pub fn run(
        &mut self,
        source: &mut ImageHandle,
        output: &mut ImageHandle,
        secondary: Option<&mut ImageHandle>,
    ) -> Result<AcquisitionResult> {
        source.share_abort_flag(self.abort.clone());
        output.share_abort_flag(self.abort.clone());

        self.status = Status::Running;
        let result = self.run_inner(source, output, secondary);

        match &result {
            Ok(r) if r.status == Status::Completed => {}
            Ok(r) => self.status = r.status,
            Err(_) => self.status = Status::Failed,
        }
        result
    }

    fn run_inner(
        &mut self,
        source: &mut ImageHandle,
        output: &mut ImageHandle,
        mut secondary: Option<&mut ImageHandle>,
    ) -> Result<AcquisitionResult> {
        if let Some(sec) = secondary.as_deref_mut() {
            sec.share_abort_flag(self.abort.clone());
        }

        let input_chunk_size = self.job.chunk_size().max(1);
        let output_chunk_size = self.job.process_buffer_size.max(input_chunk_size);
        let mut buffer = StorageMediaBuffer::new(input_chunk_size, input_chunk_size + 4096);
        let mut digests = IntegrityDigest::new(self.job.digests);
        let mut accumulator: Vec<u8> = Vec::with_capacity(output_chunk_size);
        let mut read_errors: Vec<ReadErrorRange> = Vec::new();

        let mut bytes_done: u64 = 0;
        let mut last_decile: u64 = 0;

        while bytes_done < self.job.acquire_size {
            if self.abort.load(Ordering::SeqCst) {
                return Ok(AcquisitionResult {
                    status: Status::Aborted,
                    bytes_done,
                    digests: None,
                    read_errors,
                });
            }

            let read_size = std::cmp::min(
                input_chunk_size as u64,
                self.job.acquire_size - bytes_done,
            ) as usize;

            // `read_chunk` carries out what the source pseudocode's two
            // steps (`read_chunk` + `prepare_read`) do together for our
            // backends (decompression/checksum verification happens
            // inside the read itself): a recoverable decode failure
            // (`ChecksumMismatch`) is masked per §4.H; anything else is
            // fatal.
            let proc_count = match source.read_chunk(&mut buffer.raw_buffer_mut()[..read_size]) {
                Ok(0) => {
                    return Err(Error::UnexpectedEof {
                        read: 0,
                        expected: read_size as u64,
                    })
                }
                Ok(n) => {
                    buffer.set_raw_data_len(n);
                    source.prepare_read(n)?
                }
                Err(e) if e.is_checksum_mismatch() => {
                    // Always account a full input chunk, not the
                    // window-clamped `read_size`: the acquisition must
                    // produce a byte-exact output whose length matches
                    // the declared media size (§4.H).
                    if self.job.zero_chunk_on_read_error {
                        buffer.zero();
                    }
                    buffer.set_raw_data_len(input_chunk_size);
                    read_errors.push(ReadErrorRange {
                        start_offset: self.job.acquire_offset + bytes_done,
                        byte_count: input_chunk_size as u64,
                    });
                    output.append_read_error(
                        self.job.acquire_offset + bytes_done,
                        input_chunk_size as u64,
                        self.job.bytes_per_sector as u64,
                    )?;
                    input_chunk_size
                }
                Err(e) => return Err(e),
            };

            // An odd-length final chunk has no trailing partner byte to
            // swap with; left as-is rather than erroring.
            if self.job.swap_byte_pairs && proc_count % 2 == 0 {
                buffer.swap_byte_pairs(proc_count)?;
            }

            {
                let (data, len) = buffer.get_data();
                digests.update(&data[..len.min(proc_count)]);
            }
            bytes_done += proc_count as u64;

            let mut remaining = proc_count;
            let mut consumed = 0usize;
            while remaining > 0 {
                let w = std::cmp::min(remaining, output_chunk_size - accumulator.len());
                {
                    let (data, _) = buffer.get_data();
                    accumulator.extend_from_slice(&data[consumed..consumed + w]);
                }
                consumed += w;
                remaining -= w;

                let window_exhausted = bytes_done >= self.job.acquire_size;
                if !window_exhausted && accumulator.len() < output_chunk_size {
                    break;
                }

                if let Some(sec) = secondary.as_deref_mut() {
                    let mut mirror = accumulator.clone();
                    flush_accumulator(sec, &mut mirror)?;
                }
                flush_accumulator(output, &mut accumulator)?;
            }

            let decile = (bytes_done.saturating_mul(10)) / self.job.acquire_size.max(1);
            if decile > last_decile {
                last_decile = decile;
                (self.notify)(ProgressEvent {
                    bytes_done,
                    acquire_size: self.job.acquire_size,
                });
            }
        }

        let digest_result = digests.finalize();
        store_hash_values(output, &digest_result)?;
        output.write_finalize()?;
        if let Some(sec) = secondary.as_deref_mut() {
            store_hash_values(sec, &digest_result)?;
            sec.write_finalize()?;
        }

        Ok(AcquisitionResult {
            status: Status::Completed,
            bytes_done,
            digests: Some(digest_result),
            read_errors,
        })
    }
}

fn flush_accumulator(output: &mut ImageHandle, accumulator: &mut Vec<u8>) -> Result<()> {
    if accumulator.is_empty() {
        return Ok(());
    }
    let (payload, is_compressed) = output.prepare_write(accumulator)?;
    output.write_chunk(&payload, is_compressed)?;
    accumulator.clear();
    Ok(())
}

fn store_hash_values(output: &mut ImageHandle, digests: &DigestResult) -> Result<()> {
    if let Some(md5) = &digests.md5 {
        output.set_hash_value("MD5", md5.clone())?;
    }
    if let Some(sha1) = &digests.sha1 {
        output.set_hash_value("SHA1", sha1.clone())?;
    }
    if let Some(sha256) = &digests.sha256 {
        output.set_hash_value("SHA256", sha256.clone())?;
    }
    Ok(())
}

fn default_notify(event: ProgressEvent) {
    let pct = if event.acquire_size == 0 {
        100
    } else {
        (event.bytes_done * 100) / event.acquire_size
    };
    info!("acquisition progress: {pct}% ({}/{})", event.bytes_done, event.acquire_size);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw_handle::{Access, RawHandle};
    use tempfile::tempdir;

    fn make_source(dir: &std::path::Path, data: &[u8]) -> ImageHandle {
        let path = dir.join("source.raw");
        std::fs::write(&path, data).unwrap();
        let mut handle = RawHandle::new();
        handle.open(&[path], Access::Read).unwrap();
        ImageHandle::raw(handle)
    }

    fn make_output(dir: &std::path::Path, name: &str) -> (ImageHandle, std::path::PathBuf) {
        let basename = dir.join(name);
        let mut handle = RawHandle::new();
        handle.open(&[basename.clone()], Access::Write).unwrap();
        (ImageHandle::raw(handle), basename)
    }

    #[test]
    fn s5_swap_hash_equivalence() {
        // S5 — acquiring with swap_byte_pairs = true hashes the
        // post-swap bytes, which themselves differ from an
        // un-swapped acquisition's digest for non-palindromic input.
        let dir = tempdir().unwrap();
        let data: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();

        let mut source_a = make_source(dir.path(), &data);
        let (mut out_a, _) = make_output(dir.path(), "A");
        let job_a = AcquisitionJob::new(0, data.len() as u64, 512, 8);
        let mut engine_a = AcquisitionEngine::new(job_a);
        let result_a = engine_a.run(&mut source_a, &mut out_a, None).unwrap();

        let mut source_b = make_source(dir.path(), &data);
        let (mut out_b, _) = make_output(dir.path(), "B");
        let mut job_b = AcquisitionJob::new(0, data.len() as u64, 512, 8);
        job_b.swap_byte_pairs = true;
        let mut engine_b = AcquisitionEngine::new(job_b);
        let result_b = engine_b.run(&mut source_b, &mut out_b, None).unwrap();

        assert_eq!(result_a.status, Status::Completed);
        assert_eq!(result_b.status, Status::Completed);
        assert_ne!(result_a.digests.unwrap().md5, result_b.digests.unwrap().md5);

        let written_b = std::fs::read(dir.path().join("B.raw")).unwrap();
        let mut expected = data.clone();
        crate::buffer::swap_byte_pairs_slice(&mut expected);
        assert_eq!(written_b, expected);
    }

    #[test]
    fn acquisition_preserves_size_and_records_hashes() {
        let dir = tempdir().unwrap();
        let data = vec![0x7Eu8; 10_000];
        let mut source = make_source(dir.path(), &data);
        let (mut output, basename) = make_output(dir.path(), "C");

        let job = AcquisitionJob::new(0, data.len() as u64, 512, 4);
        let mut engine = AcquisitionEngine::new(job);
        let result = engine.run(&mut source, &mut output, None).unwrap();

        assert_eq!(result.status, Status::Completed);
        assert_eq!(result.bytes_done, data.len() as u64);
        let written = std::fs::read(basename.with_extension("raw")).unwrap();
        assert_eq!(written, data);
        assert!(result.digests.unwrap().md5.is_some());
    }

    #[test]
    fn s6_checksum_mismatch_is_masked_into_a_zeroed_chunk() {
        // S6 — a source chunk that fails its checksum must not abort the
        // run: the bad chunk is zeroed in the output, the range is
        // recorded, and acquisition completes over the remaining chunks.
        use crate::ewf_handle::{CompressionLevel, EwfHandle};

        let dir = tempdir().unwrap();
        let basename = dir.path().join("corrupt");
        let bytes_per_sector = 512u32;
        let sectors_per_chunk = 8u32;
        let chunk_size = (bytes_per_sector * sectors_per_chunk) as usize;

        let mut writer =
            EwfHandle::open_write(&basename, bytes_per_sector, sectors_per_chunk, 0, CompressionLevel::Best)
                .unwrap();
        let chunk = vec![0u8; chunk_size];
        let (prepared, compressed) = writer.prepare_write_chunk(&chunk).unwrap();
        assert!(compressed);
        writer.write_chunk(&prepared, compressed).unwrap();
        writer.write_finalize().unwrap();

        let seg_path = dir.path().join("corrupt.E01");
        let mut on_disk = std::fs::read(&seg_path).unwrap();
        let offset = on_disk
            .windows(prepared.len())
            .position(|w| w == prepared.as_slice())
            .unwrap();
        on_disk[offset + prepared.len() - 1] ^= 0xFF;
        std::fs::write(&seg_path, &on_disk).unwrap();

        let mut source = ImageHandle::ewf(EwfHandle::open_read(&seg_path).unwrap());
        let (mut output, out_basename) = make_output(dir.path(), "D");

        let mut job = AcquisitionJob::new(0, chunk_size as u64, bytes_per_sector, sectors_per_chunk);
        job.zero_chunk_on_read_error = true;
        let mut engine = AcquisitionEngine::new(job);
        let result = engine.run(&mut source, &mut output, None).unwrap();

        assert_eq!(result.status, Status::Completed);
        assert_eq!(result.read_errors.len(), 1);
        assert_eq!(result.read_errors[0].start_offset, 0);
        assert_eq!(result.read_errors[0].byte_count, chunk_size as u64);

        let written = std::fs::read(out_basename.with_extension("raw")).unwrap();
        assert_eq!(written, vec![0u8; chunk_size]);
    }
}
