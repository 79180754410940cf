//! Black-box end-to-end scenarios driven entirely through the public
//! `exhume_acquire` API: `AcquisitionEngine` writing through a `RawHandle`,
//! and `globber::glob` recovering a segmented image from any one of its
//! member files.
//!
//! Run with: `cargo test`

use exhume_acquire::acquisition::{AcquisitionEngine, AcquisitionJob};
use exhume_acquire::globber;
use exhume_acquire::handle::ImageHandle;
use exhume_acquire::raw_handle::{Access, RawHandle};
use tempfile::tempdir;

fn acquire_into_raw(dir: &std::path::Path, basename: &str, data: &[u8], max_segment_size: u64) {
    let src_path = dir.join("source.bin");
    std::fs::write(&src_path, data).unwrap();

    let mut source_handle = RawHandle::new();
    source_handle.open(&[src_path], Access::Read).unwrap();
    let mut source = ImageHandle::raw(source_handle);

    let mut output_handle = RawHandle::new();
    output_handle
        .open(&[dir.join(basename)], Access::Write)
        .unwrap();
    output_handle.set_media_size(data.len() as u64).unwrap();
    output_handle.set_bytes_per_sector(512).unwrap();
    output_handle
        .set_maximum_segment_size(max_segment_size)
        .unwrap();
    let mut output = ImageHandle::raw(output_handle);

    let job = AcquisitionJob::new(0, data.len() as u64, 512, 128);
    let mut engine = AcquisitionEngine::new(job);
    let result = engine.run(&mut source, &mut output, None).unwrap();
    assert_eq!(result.bytes_done, data.len() as u64);
}

#[test]
fn s1_single_segment_raw_round_trip() {
    let dir = tempdir().unwrap();
    let data: Vec<u8> = (0..1_048_576u32).map(|i| (i % 256) as u8).collect();
    acquire_into_raw(dir.path(), "B", &data, 0);

    let raw_path = dir.path().join("B.raw");
    assert!(raw_path.is_file());
    assert_eq!(std::fs::metadata(&raw_path).unwrap().len(), 1_048_576);

    let info = std::fs::read_to_string(dir.path().join("B.raw.info")).unwrap();
    assert!(info.contains("<media_size>1048576</media_size>"));
    assert!(info.contains("<bytes_per_sector>512</bytes_per_sector>"));
    assert!(info.contains("MD5"));

    let on_disk = std::fs::read(&raw_path).unwrap();
    assert_eq!(on_disk, data);
}

#[test]
fn s2_split_segment_growth_via_engine() {
    let dir = tempdir().unwrap();
    let data = vec![0x5Au8; 10_000_000];
    acquire_into_raw(dir.path(), "B", &data, 1_048_576);

    for i in 0..10 {
        let seg = dir.path().join(format!("B.raw.{i:03}"));
        assert!(seg.is_file(), "missing {seg:?}");
        let expected_len = if i < 9 {
            1_048_576
        } else {
            10_000_000 - 9 * 1_048_576
        };
        assert_eq!(std::fs::metadata(&seg).unwrap().len(), expected_len);
    }

    // Globber idempotence: any member segment recovers the full, ordered set.
    let recovered = globber::glob(dir.path().join("B.raw.003")).unwrap();
    assert_eq!(recovered.len(), 10);
    for (i, path) in recovered.iter().enumerate() {
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), format!("B.raw.{i:03}"));
    }
}

#[test]
fn s3_globber_recovery_from_a_middle_segment() {
    let dir = tempdir().unwrap();
    for i in 0..5 {
        std::fs::write(dir.path().join(format!("B.raw.{i:03}")), [i as u8]).unwrap();
    }

    let recovered = globber::glob(dir.path().join("B.raw.003")).unwrap();
    let names: Vec<String> = recovered
        .iter()
        .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
        .collect();
    assert_eq!(
        names,
        vec!["B.raw.000", "B.raw.001", "B.raw.002", "B.raw.003", "B.raw.004"]
    );
}

#[test]
fn s4_xofn_naming_schema_completeness_and_missing_segments() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("B.1of3"), b"a").unwrap();
    std::fs::write(dir.path().join("B.2of3"), b"b").unwrap();
    std::fs::write(dir.path().join("B.3of3"), b"c").unwrap();

    let recovered = globber::glob(dir.path().join("B.1of3")).unwrap();
    assert_eq!(recovered.len(), 3);

    let incomplete_dir = tempdir().unwrap();
    std::fs::write(incomplete_dir.path().join("B.1of3"), b"a").unwrap();
    std::fs::write(incomplete_dir.path().join("B.2of3"), b"b").unwrap();
    let err = globber::glob(incomplete_dir.path().join("B.1of3")).unwrap_err();
    match err {
        exhume_acquire::Error::NamingSchema(msg) => assert!(msg.contains("MissingSegments")),
        other => panic!("expected NamingSchema error, got {other:?}"),
    }
}
