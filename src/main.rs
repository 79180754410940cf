use clap::{value_parser, Arg, ArgAction, Command};
use clap_num::si_number;
use exhume_acquire::acquisition::{AcquisitionEngine, AcquisitionJob};
use exhume_acquire::export::{ExportEngine, ExportJob};
use exhume_acquire::ewf_handle::{CompressionLevel, EwfHandle};
use exhume_acquire::handle::ImageHandle;
use exhume_acquire::raw_handle::{Access, RawHandle};
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    let matches = Command::new("exhume_acquire")
        .version("0.1.0")
        .about("Acquires, exports, and verifies forensic storage-media images.")
        .subcommand_required(true)
        .subcommand(
            Command::new("acquire")
                .about("Images a source device or file into a raw or EWF container.")
                .arg(Arg::new("source").short('i').long("input").required(true))
                .arg(Arg::new("output").short('o').long("output").required(true))
                .arg(
                    Arg::new("output-format")
                        .long("format")
                        .value_parser(["raw", "ewf"])
                        .default_value("raw"),
                )
                .arg(
                    Arg::new("bytes-per-sector")
                        .long("bytes-per-sector")
                        .value_parser(value_parser!(u32))
                        .default_value("512"),
                )
                .arg(
                    Arg::new("sectors-per-chunk")
                        .long("sectors-per-chunk")
                        .value_parser(value_parser!(u32))
                        .default_value("64"),
                )
                .arg(
                    Arg::new("maximum-segment-size")
                        .long("maximum-segment-size")
                        .value_parser(si_number::<u64>)
                        .default_value("1400000000")
                        .help("bytes, SI suffixes accepted (e.g. 1.4G)"),
                )
                .arg(
                    Arg::new("compression")
                        .long("compression")
                        .value_parser(["none", "fast", "best"])
                        .default_value("none"),
                )
                .arg(Arg::new("swap-byte-pairs").long("swap-byte-pairs").action(ArgAction::SetTrue))
                .arg(Arg::new("case-number").long("case-number"))
                .arg(Arg::new("examiner-name").long("examiner-name")),
        )
        .subcommand(
            Command::new("export")
                .about("Re-exports an already acquired image into another container.")
                .arg(Arg::new("source").short('i').long("input").required(true))
                .arg(Arg::new("source-format").long("source-format").value_parser(["raw", "ewf"]).default_value("raw"))
                .arg(Arg::new("output").short('o').long("output").required(true))
                .arg(Arg::new("output-format").long("format").value_parser(["raw", "ewf"]).default_value("raw")),
        )
        .subcommand(
            Command::new("verify")
                .about("Re-reads an image and recomputes hashes against its recorded values.")
                .arg(Arg::new("source").short('i').long("input").required(true))
                .arg(Arg::new("source-format").long("format").value_parser(["raw", "ewf"]).default_value("raw")),
        )
        .subcommand(
            Command::new("info")
                .about("Prints media/information/integrity metadata for an image.")
                .arg(Arg::new("source").short('i').long("input").required(true))
                .arg(Arg::new("source-format").long("format").value_parser(["raw", "ewf"]).default_value("raw")),
        )
        .get_matches();

    let outcome = match matches.subcommand() {
        Some(("acquire", sub)) => run_acquire(sub),
        Some(("export", sub)) => run_export(sub),
        Some(("verify", sub)) => run_verify(sub),
        Some(("info", sub)) => run_info(sub),
        _ => unreachable!("subcommand_required enforces one of the above"),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run_acquire(sub: &clap::ArgMatches) -> exhume_acquire::Result<()> {
    let source_path = sub.get_one::<String>("source").unwrap();
    let output_path = sub.get_one::<String>("output").unwrap();
    let output_format = sub.get_one::<String>("output-format").unwrap();
    let bytes_per_sector = *sub.get_one::<u32>("bytes-per-sector").unwrap();
    let sectors_per_chunk = *sub.get_one::<u32>("sectors-per-chunk").unwrap();
    let maximum_segment_size = *sub.get_one::<u64>("maximum-segment-size").unwrap();
    let compression = match sub.get_one::<String>("compression").map(String::as_str) {
        Some("fast") => CompressionLevel::Fast,
        Some("best") => CompressionLevel::Best,
        _ => CompressionLevel::None,
    };
    let swap_byte_pairs = sub.get_flag("swap-byte-pairs");

    let mut source_handle = RawHandle::new();
    source_handle.open(&[PathBuf::from(source_path)], Access::Read)?;
    let media_size = source_handle.get_media_size();
    let mut source = ImageHandle::raw(source_handle);

    let mut output = match output_format.as_str() {
        "ewf" => {
            let handle = EwfHandle::open_write(
                PathBuf::from(output_path),
                bytes_per_sector,
                sectors_per_chunk,
                maximum_segment_size,
                compression,
            )?;
            ImageHandle::ewf(handle)
        }
        _ => {
            let mut handle = RawHandle::new();
            handle.open(&[PathBuf::from(output_path)], Access::Write)?;
            handle.set_media_size(media_size)?;
            handle.set_bytes_per_sector(bytes_per_sector as u64)?;
            handle.set_maximum_segment_size(maximum_segment_size)?;
            if let Some(case) = sub.get_one::<String>("case-number") {
                handle.set_information_value("case_number", case.clone())?;
            }
            if let Some(examiner) = sub.get_one::<String>("examiner-name") {
                handle.set_information_value("examiner_name", examiner.clone())?;
            }
            ImageHandle::raw(handle)
        }
    };

    let mut job = AcquisitionJob::new(0, media_size, bytes_per_sector, sectors_per_chunk);
    job.swap_byte_pairs = swap_byte_pairs;
    let mut engine = AcquisitionEngine::new(job);
    let result = engine.run(&mut source, &mut output, None)?;

    if let Some(digests) = result.digests {
        if let Some(md5) = digests.md5 {
            log::info!("MD5: {md5}");
        }
        if let Some(sha1) = digests.sha1 {
            log::info!("SHA1: {sha1}");
        }
        if let Some(sha256) = digests.sha256 {
            log::info!("SHA256: {sha256}");
        }
    }
    if !result.read_errors.is_empty() {
        for range in &result.read_errors {
            log::info!(
                "read error at offset {} ({} bytes)",
                range.start_offset,
                range.byte_count
            );
        }
    }
    println!("Acquired {} bytes -> {}", result.bytes_done, output_path);
    Ok(())
}

fn run_export(sub: &clap::ArgMatches) -> exhume_acquire::Result<()> {
    let source_path: &String = sub.get_one("source").unwrap();
    let source_format: &String = sub.get_one("source-format").unwrap();
    let output_path: &String = sub.get_one("output").unwrap();
    let output_format: &String = sub.get_one("output-format").unwrap();

    let mut source = open_source(source_path, source_format)?;
    let size = source_size(&mut source)?;

    let mut output = match output_format.as_str() {
        "ewf" => ImageHandle::ewf(EwfHandle::open_write(
            PathBuf::from(output_path),
            512,
            64,
            1_400_000_000,
            CompressionLevel::None,
        )?),
        _ => {
            let mut handle = RawHandle::new();
            handle.open(&[PathBuf::from(output_path)], Access::Write)?;
            handle.set_media_size(size)?;
            ImageHandle::raw(handle)
        }
    };

    let job = ExportJob::new(0, size, 512, 64);
    let mut engine = ExportEngine::new(job);
    let result = engine.run(&mut source, Some(&mut output))?;
    println!("Exported {} bytes -> {}", result.bytes_done, output_path);
    Ok(())
}

fn run_verify(sub: &clap::ArgMatches) -> exhume_acquire::Result<()> {
    let source_path: &String = sub.get_one("source").unwrap();
    let source_format: &String = sub.get_one("source-format").unwrap();

    let mut source = open_source(source_path, source_format)?;
    let size = source_size(&mut source)?;
    let job = ExportJob::new(0, size, 512, 64);
    let mut engine = ExportEngine::new(job);
    let result = engine.run(&mut source, None)?;

    if let Some(digests) = result.digests {
        println!("MD5: {}", digests.md5.unwrap_or_default());
        println!("SHA1: {}", digests.sha1.unwrap_or_default());
        println!("SHA256: {}", digests.sha256.unwrap_or_default());
    }
    Ok(())
}

fn run_info(sub: &clap::ArgMatches) -> exhume_acquire::Result<()> {
    let source_path: &String = sub.get_one("source").unwrap();
    let source_format: &String = sub.get_one("source-format").unwrap();

    match source_format.as_str() {
        "ewf" => {
            let handle = EwfHandle::open_read(source_path)?;
            if let exhume_acquire::ewf_handle::EwfHandle::Read(ewf) = &handle {
                ewf.print_info();
            }
        }
        _ => {
            let mut handle = RawHandle::new();
            handle.open(&[PathBuf::from(source_path)], Access::Read)?;
            println!("media_size: {}", handle.get_media_size());
            println!("bytes_per_sector: {:?}", handle.get_bytes_per_sector());
            for i in 0..handle.integrity_hash_value_count() {
                if let Some(id) = handle.integrity_hash_identifier_at(i) {
                    let id = id.to_string();
                    println!("{}: {}", id, handle.integrity_hash_value_of(&id).unwrap_or_default());
                }
            }
        }
    }
    Ok(())
}

fn open_source(path: &str, format: &str) -> exhume_acquire::Result<ImageHandle> {
    match format {
        "ewf" => Ok(ImageHandle::ewf(EwfHandle::open_read(path)?)),
        _ => {
            let mut handle = RawHandle::new();
            handle.open(&[PathBuf::from(path)], Access::Read)?;
            Ok(ImageHandle::raw(handle))
        }
    }
}

fn source_size(source: &mut ImageHandle) -> exhume_acquire::Result<u64> {
    if let Some(raw) = source.as_raw_mut() {
        return Ok(raw.get_media_size());
    }
    use std::io::SeekFrom;
    if let Some(ewf) = source.as_ewf_mut() {
        let size = ewf.seek(SeekFrom::End(0))?;
        ewf.seek(SeekFrom::Start(0))?;
        return Ok(size);
    }
    Ok(0)
}

