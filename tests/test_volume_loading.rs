//! Loading synthetic DICOM files from disk into volumes.

#[path = "../src/test_support.rs"]
mod test_support;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dicom_stack::tag::tags;
use dicom_stack::{
    DecodeError, DicomHeader, FrameDecoder, FrameOutcome, LoaderConfig, PixelSection, VolumeLoader,
    VolumeLoaderError,
};
use tempfile::TempDir;
use test_support::{EXPLICIT_BE, EXPLICIT_LE, IMPLICIT_LE, StreamWriter};

/// A 2x2 8-bit slice at height `z`, optionally with a temporal position.
fn slice_stream(syntax: &str, time: Option<i64>, z: f64, fill: u8) -> Vec<u8> {
    let mut writer = StreamWriter::new(syntax)
        .u16s(0x0028, 0x0010, &[2])
        .u16s(0x0028, 0x0011, &[2])
        .string(0x0028, 0x0030, b"DS", "0.5\\0.5")
        .string(0x0020, 0x0032, b"DS", &format!("0\\0\\{z}"))
        .string(0x0020, 0x0037, b"DS", "1\\0\\0\\0\\1\\0");
    if let Some(time) = time {
        writer = writer.string(0x0020, 0x0100, b"IS", &time.to_string());
    }
    writer.pixel_data(b"OB", &[fill; 4])
}

fn write(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, data).unwrap();
    path
}

fn titles(volume: &dicom_stack::DicomImage) -> Vec<&str> {
    volume.slices().iter().map(|slice| slice.title()).collect()
}

#[test]
fn test_directory_is_ordered_by_time_and_position() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "s3.dcm", &slice_stream(EXPLICIT_LE, Some(1), 0.0, 30));
    write(dir.path(), "s1.dcm", &slice_stream(IMPLICIT_LE, Some(0), 0.0, 10));
    write(dir.path(), "s2.dcm", &slice_stream(EXPLICIT_BE, Some(0), 1.0, 20));

    let loaded = VolumeLoader::default().load_from_directory(dir.path()).unwrap();
    let volume = loaded.volume;

    assert_eq!(titles(&volume), ["s1.dcm", "s2.dcm", "s3.dcm"]);
    assert_eq!(volume.time_offsets(), [0, 2]);
    assert_eq!(volume.num_times(), 2);
    assert_eq!(volume.num_slices(), 2);
    assert_eq!(volume.value(0, 1, 1, 1), Some(20.0));
    assert_eq!(volume.value_at(0, 0, 0, 1, 0), Some(30.0));
    assert_eq!(volume.row_spacing(), 0.5);
    assert_eq!(volume.slice_spacing(), 1.0);
    assert_eq!(
        volume.title(),
        dir.path().file_name().unwrap().to_string_lossy()
    );
    assert_eq!(loaded.report.accepted, 3);
    assert!(loaded.report.failures.is_empty());
}

#[test]
fn test_bad_file_is_skipped() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "good.dcm", &slice_stream(EXPLICIT_LE, None, 0.0, 1));
    let bad = write(dir.path(), "bad.dcm", b"not a dicom file at all");

    let loaded = VolumeLoader::new(LoaderConfig::default().with_workers(1))
        .load_from_directory(dir.path())
        .unwrap();

    assert_eq!(loaded.volume.len(), 1);
    assert_eq!(loaded.report.failures.len(), 1);
    let failure = &loaded.report.failures[0];
    assert_eq!(failure.path, bad);
    assert!(matches!(failure.source, DecodeError::NotADicomStream));
}

#[test]
fn test_all_files_failing() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.dcm", b"garbage");
    let mut truncated = slice_stream(EXPLICIT_LE, None, 0.0, 1);
    truncated.truncate(150);
    write(dir.path(), "b.dcm", &truncated);

    match VolumeLoader::default().load_from_directory(dir.path()) {
        Err(VolumeLoaderError::AllFilesFailed { failures }) => {
            assert_eq!(failures.len(), 2);
            assert!(
                failures
                    .iter()
                    .any(|f| matches!(f.source, DecodeError::TruncatedStream { .. }))
            );
        }
        other => panic!("expected AllFilesFailed, got {other:?}"),
    }
}

#[test]
fn test_empty_directory() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        VolumeLoader::default().load_from_directory(dir.path()),
        Err(VolumeLoaderError::NoValidImages)
    ));
}

#[test]
fn test_missing_directory() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        VolumeLoader::default().load_from_directory(dir.path().join("absent")),
        Err(VolumeLoaderError::Io(_))
    ));
}

#[test]
fn test_extension_filter_and_recursion() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.DCM", &slice_stream(EXPLICIT_LE, None, 0.0, 1));
    write(dir.path(), "notes.txt", b"ignored");
    let nested = dir.path().join("series");
    fs::create_dir(&nested).unwrap();
    write(&nested, "b.dcm", &slice_stream(EXPLICIT_LE, None, 2.0, 2));

    let flat = VolumeLoader::new(LoaderConfig::default().with_extension("dcm"))
        .load_from_directory(dir.path())
        .unwrap();
    assert_eq!(titles(&flat.volume), ["a.DCM"]);
    assert!(flat.report.failures.is_empty());

    let config = LoaderConfig::default()
        .with_extension("dcm")
        .with_recursive(true)
        .with_title("study");
    let deep = VolumeLoader::new(config).load_from_directory(dir.path()).unwrap();
    assert_eq!(titles(&deep.volume), ["a.DCM", "b.dcm"]);
    assert_eq!(deep.volume.title(), "study");
    assert_eq!(deep.volume.slice_spacing(), 2.0);
}

#[test]
fn test_mismatched_slice_is_rejected() {
    let dir = TempDir::new().unwrap();
    let first = write(dir.path(), "a.dcm", &slice_stream(EXPLICIT_LE, None, 0.0, 1));
    let tall = StreamWriter::new(EXPLICIT_LE)
        .u16s(0x0028, 0x0010, &[3])
        .u16s(0x0028, 0x0011, &[2])
        .string(0x0028, 0x0030, b"DS", "0.5\\0.5")
        .pixel_data(b"OB", &[0; 6]);
    let second = write(dir.path(), "b.dcm", &tall);

    // whichever file completes first fixes the volume's shape
    let loaded = VolumeLoader::default()
        .load_from_file_paths(&[first, second])
        .unwrap();
    assert_eq!(loaded.volume.len(), 1);
    assert_eq!(loaded.report.accepted, 1);
    assert_eq!(loaded.report.rejected, 1);
}

#[test]
fn test_batches_append_time_points() {
    let dir = TempDir::new().unwrap();
    let first = [
        write(dir.path(), "t0_a.dcm", &slice_stream(EXPLICIT_LE, None, 0.0, 1)),
        write(dir.path(), "t0_b.dcm", &slice_stream(EXPLICIT_LE, None, 1.0, 2)),
    ];
    let second = [
        write(dir.path(), "t1_b.dcm", &slice_stream(EXPLICIT_LE, None, 1.0, 4)),
        write(dir.path(), "t1_a.dcm", &slice_stream(EXPLICIT_LE, None, 0.0, 3)),
    ];

    let loader = VolumeLoader::default();
    let mut volume = None;
    loader.load_into(&mut volume, &first).unwrap();
    let report = loader.load_into(&mut volume, &second).unwrap();
    assert_eq!(report.accepted, 2);

    let volume = volume.unwrap();
    assert_eq!(volume.num_times(), 2);
    assert_eq!(titles(&volume), ["t0_a.dcm", "t0_b.dcm", "t1_a.dcm", "t1_b.dcm"]);
    let series = volume.to_array(1, 0).unwrap();
    assert_eq!(series[[0, 0, 0]], 3.0);
    assert_eq!(series[[1, 1, 1]], 4.0);
}

#[test]
fn test_forced_temporal_position() {
    let dir = TempDir::new().unwrap();
    let paths = [
        write(dir.path(), "a.dcm", &slice_stream(EXPLICIT_LE, Some(4), 0.0, 1)),
        write(dir.path(), "b.dcm", &slice_stream(EXPLICIT_LE, Some(9), 1.0, 2)),
    ];

    let loader = VolumeLoader::new(LoaderConfig::default().with_temporal_position(2));
    let loaded = loader.load_from_file_paths(&paths).unwrap();
    assert_eq!(loaded.volume.num_times(), 1);
    assert!(
        loaded
            .volume
            .slices()
            .iter()
            .all(|slice| slice.temporal_position() == 2)
    );
}

#[test]
fn test_loader_config_from_file() {
    let dir = TempDir::new().unwrap();
    let config = write(dir.path(), "loader.toml", b"workers = 2\nrecursive = true\n");
    let loader = VolumeLoader::from_toml_file(&config).unwrap();
    assert_eq!(loader.config().workers, 2);
    assert!(loader.config().recursive);

    let broken = write(dir.path(), "broken.toml", b"workers = [");
    assert!(matches!(
        VolumeLoader::from_toml_file(&broken),
        Err(VolumeLoaderError::Config(_))
    ));
}

/// Panics on 1x1 images and leaves everything else to the raw decoder.
struct FragileDecoder;

impl FrameDecoder for FragileDecoder {
    fn name(&self) -> &str {
        "fragile"
    }

    fn decode_frames(&self, header: &DicomHeader, _: &PixelSection<'_>) -> dicom_stack::error::Result<FrameOutcome> {
        if header.int_value(tags::ROWS) == Some(1) {
            panic!("cannot decode a single pixel");
        }
        Ok(FrameOutcome::NotApplicable)
    }
}

#[test]
fn test_panicking_file_is_reported() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.dcm", &slice_stream(EXPLICIT_LE, None, 0.0, 1));
    write(dir.path(), "b.dcm", &slice_stream(EXPLICIT_LE, None, 1.0, 2));
    let single = StreamWriter::new(EXPLICIT_LE)
        .u16s(0x0028, 0x0010, &[1])
        .u16s(0x0028, 0x0011, &[1])
        .pixel_data(b"OB", &[0, 0]);
    let fragile = write(dir.path(), "c.dcm", &single);

    let mut loader = VolumeLoader::new(LoaderConfig::default().with_workers(2));
    loader.add_decoder_first(Arc::new(FragileDecoder));
    let loaded = loader.load_from_directory(dir.path()).unwrap();

    assert_eq!(titles(&loaded.volume), ["a.dcm", "b.dcm"]);
    assert_eq!(loaded.report.failures.len(), 1);
    let failure = &loaded.report.failures[0];
    assert_eq!(failure.path, fragile);
    assert!(matches!(
        &failure.source,
        DecodeError::ReaderPanicked(message) if message.contains("single pixel")
    ));
}

#[test]
fn test_panicking_files_count_as_failures() {
    let dir = TempDir::new().unwrap();
    let single = StreamWriter::new(EXPLICIT_LE)
        .u16s(0x0028, 0x0010, &[1])
        .u16s(0x0028, 0x0011, &[1])
        .pixel_data(b"OB", &[0, 0]);
    write(dir.path(), "a.dcm", &single);
    write(dir.path(), "b.dcm", &single);

    let mut loader = VolumeLoader::default();
    loader.add_decoder_first(Arc::new(FragileDecoder));
    assert!(matches!(
        loader.load_from_directory(dir.path()),
        Err(VolumeLoaderError::AllFilesFailed { failures }) if failures.len() == 2
    ));
}

#[test]
fn test_non_ascii_date_does_not_fail_the_file() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.dcm", &slice_stream(EXPLICIT_LE, None, 0.0, 1));
    let latin1 = StreamWriter::new(EXPLICIT_LE)
        .element(0x0008, 0x0022, b"DA", b"202\xE9150 ")
        .u16s(0x0028, 0x0010, &[2])
        .u16s(0x0028, 0x0011, &[2])
        .string(0x0028, 0x0030, b"DS", "0.5\\0.5")
        .string(0x0020, 0x0032, b"DS", "0\\0\\1")
        .pixel_data(b"OB", &[2; 4]);
    write(dir.path(), "b.dcm", &latin1);

    let loaded = VolumeLoader::default().load_from_directory(dir.path()).unwrap();
    assert!(loaded.report.failures.is_empty());
    assert_eq!(titles(&loaded.volume), ["a.dcm", "b.dcm"]);
    assert_eq!(loaded.volume.slice(0, 1).unwrap().info().acquisition_time, None);
}
