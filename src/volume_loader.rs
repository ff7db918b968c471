use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::{fs, io};

use rayon::ThreadPoolBuilder;
use thiserror::Error;
use web_time::Instant;

use crate::config::LoaderConfig;
use crate::decoder::StreamDecoder;
use crate::error::{DecodeError, FileError};
use crate::frame::{FrameDecoder, FrameDecoderChain};
use crate::slice::Slice;
use crate::tag::tags;
use crate::transfer_syntax::{TransferSyntax, TransferSyntaxRegistry};
use crate::volume::DicomImage;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("All {} DICOM files failed to decode", .failures.len())]
    AllFilesFailed { failures: Vec<FileError> },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Unable to start reader threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Invalid loader configuration: {0}")]
    Config(#[from] toml::de::Error),
}

/// What happened to the files of one batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Files that could not be decoded, in completion order.
    pub failures: Vec<FileError>,
    /// Slices added to the volume.
    pub accepted: usize,
    /// Slices that did not match the volume's shape or pixel type.
    pub rejected: usize,
}

#[derive(Debug)]
pub struct LoadedVolume {
    pub volume: DicomImage,
    pub report: BatchReport,
}

/// The part of the loader shared with reader threads.
#[derive(Debug, Clone)]
struct SliceReader {
    registry: Arc<TransferSyntaxRegistry>,
    decoders: Arc<FrameDecoderChain>,
}

impl SliceReader {
    fn read(&self, title: &str, data: &[u8], temporal_position: i64) -> Result<Vec<Slice>, DecodeError> {
        let decoded = StreamDecoder::new(&self.registry).decode(data)?;
        let pixels = decoded.pixels.ok_or(DecodeError::MissingAttribute {
            name: "Pixel Data",
            tag: tags::PIXEL_DATA,
        })?;
        let frames = self.decoders.decode(&decoded.header, &pixels)?;

        if frames.len() == 1 {
            let header = Arc::new(decoded.header);
            return frames
                .into_iter()
                .map(|frame| Slice::from_header(title, Arc::clone(&header), frame, temporal_position))
                .collect();
        }
        frames
            .into_iter()
            .enumerate()
            .map(|(i, frame)| {
                let header = Arc::new(decoded.header.frame_header(i));
                Slice::from_header(format!("{title}_{i}"), header, frame, temporal_position)
            })
            .collect()
    }

    fn read_file(&self, path: &Path, temporal_position: i64) -> Result<Vec<Slice>, DecodeError> {
        let data = fs::read(path)?;
        let title = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());
        self.read(&title, &data, temporal_position)
    }
}

/// Reads DICOM files in parallel and assembles their slices into a
/// [`DicomImage`].
#[derive(Debug, Clone, Default)]
pub struct VolumeLoader {
    reader: SliceReader,
    config: LoaderConfig,
}

impl Default for SliceReader {
    fn default() -> Self {
        Self {
            registry: Arc::new(TransferSyntaxRegistry::default()),
            decoders: Arc::new(FrameDecoderChain::default()),
        }
    }
}

impl VolumeLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            reader: SliceReader::default(),
            config,
        }
    }

    /// A loader configured from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not a valid
    /// [`LoaderConfig`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, VolumeLoaderError> {
        let input = fs::read_to_string(path)?;
        Ok(Self::new(LoaderConfig::from_toml_str(&input)?))
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut LoaderConfig {
        &mut self.config
    }

    /// Gives `decoder` precedence over every registered decoder.
    pub fn add_decoder_first(&mut self, decoder: Arc<dyn FrameDecoder>) {
        Arc::make_mut(&mut self.reader.decoders).push_front(decoder);
    }

    /// Tries `decoder` only after every registered decoder declined.
    pub fn add_decoder_last(&mut self, decoder: Arc<dyn FrameDecoder>) {
        Arc::make_mut(&mut self.reader.decoders).push_back(decoder);
    }

    pub fn decoders(&self) -> &FrameDecoderChain {
        &self.reader.decoders
    }

    pub fn register_transfer_syntax(&mut self, syntax: TransferSyntax) {
        Arc::make_mut(&mut self.reader.registry).register(syntax);
    }

    pub fn registry(&self) -> &TransferSyntaxRegistry {
        &self.reader.registry
    }

    /// Decodes one in-memory stream into slices, one per frame. Frames of a
    /// multi-frame stream are titled `{title}_{index}`.
    ///
    /// `temporal_position` applies to slices whose header names none.
    ///
    /// # Errors
    ///
    /// Returns error if the stream cannot be decoded, holds no pixel data, or
    /// no frame decoder handles its transfer syntax.
    pub fn read_slices(&self, title: &str, data: &[u8], temporal_position: i64) -> Result<Vec<Slice>, DecodeError> {
        self.reader.read(title, data, temporal_position)
    }

    /// [`read_slices`](Self::read_slices) for a file, titled by its name.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or decoded.
    pub fn read_file(&self, path: impl AsRef<Path>, temporal_position: i64) -> Result<Vec<Slice>, FileError> {
        let path = path.as_ref();
        self.reader
            .read_file(path, temporal_position)
            .map_err(|source| FileError {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Load a volume from file paths
    ///
    /// Files that fail to decode are logged and reported but do not stop the
    /// batch.
    ///
    /// # Errors
    ///
    /// Returns error if `paths` is empty, every file fails, or the reader
    /// threads cannot be started.
    pub fn load_from_file_paths(&self, paths: &[impl AsRef<Path>]) -> Result<LoadedVolume, VolumeLoaderError> {
        let mut volume = None;
        let report = self.load_into(&mut volume, paths)?;
        let volume = volume.ok_or(VolumeLoaderError::NoValidImages)?;
        Ok(LoadedVolume { volume, report })
    }

    /// Load a volume from the files of a directory
    ///
    /// Subdirectories are searched when the configuration asks for it, and
    /// only files with the configured extension are read. The volume is
    /// named after the directory unless the configuration names it.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be listed or holds no readable
    /// DICOM file.
    pub fn load_from_directory(&self, path: impl AsRef<Path>) -> Result<LoadedVolume, VolumeLoaderError> {
        let path = path.as_ref();
        let paths = self.list_directory(path)?;
        if paths.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }

        let mut volume = None;
        let report = self.load_into(&mut volume, &paths)?;
        let mut volume = volume.ok_or(VolumeLoaderError::NoValidImages)?;
        if self.config.title.is_none() {
            if let Some(name) = path.file_name() {
                volume.set_title(name.to_string_lossy());
            }
        }
        Ok(LoadedVolume { volume, report })
    }

    fn list_directory(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        let mut pending = vec![dir.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.is_dir() {
                    if self.config.recursive {
                        pending.push(path);
                    }
                } else if self.config.accepts_extension(&path) {
                    paths.push(path);
                }
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Reads `paths` on a pool of reader threads and adds their slices to
    /// `volume`, creating it from the first slice if it is `None`.
    ///
    /// Slices without a temporal position in their header are placed at the
    /// next time point after those already in `volume`, so successive
    /// batches stack up in time. A configured temporal position overrides
    /// the header for the whole batch.
    ///
    /// # Errors
    ///
    /// Returns error if `paths` is empty, every file fails, or the reader
    /// threads cannot be started. `volume` keeps whatever it held before.
    pub fn load_into(
        &self,
        volume: &mut Option<DicomImage>,
        paths: &[impl AsRef<Path>],
    ) -> Result<BatchReport, VolumeLoaderError> {
        if paths.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }
        let start = Instant::now();
        let default_time = volume.as_ref().map_or(0, |image| image.num_times() as i64);
        let forced_time = self.config.temporal_position;
        let workers = self.config.resolved_workers().min(paths.len());

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("dicom-reader-{i}"))
            .build()?;
        let (sender, receiver) = mpsc::channel();
        for path in paths {
            let path = path.as_ref().to_path_buf();
            let reader = self.reader.clone();
            let sender = sender.clone();
            pool.spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| reader.read_file(&path, default_time)))
                    .unwrap_or_else(|payload| Err(DecodeError::ReaderPanicked(panic_message(payload.as_ref()))));
                // the receiver outlives every task
                let _ = sender.send((path, result));
            });
        }
        drop(sender);

        let title = self.config.title.clone().unwrap_or_else(|| default_title(paths));
        let mut report = BatchReport::default();
        for (path, result) in receiver {
            let slices = match result {
                Ok(slices) => slices,
                Err(source) => {
                    tracing::warn!(path = %path.display(), error = %source, "skipping file");
                    report.failures.push(FileError { path, source });
                    continue;
                }
            };
            for slice in slices {
                let slice = match forced_time {
                    Some(time) => slice.with_temporal_position(time),
                    None => slice,
                };
                if let Some(image) = volume.as_mut() {
                    if image.try_add(slice) {
                        report.accepted += 1;
                    } else {
                        report.rejected += 1;
                    }
                } else {
                    *volume = Some(DicomImage::new(title.clone(), slice));
                    report.accepted += 1;
                }
            }
        }

        if report.failures.len() == paths.len() {
            return Err(VolumeLoaderError::AllFilesFailed {
                failures: report.failures,
            });
        }
        if let Some(image) = volume.as_mut() {
            image.complete();
        }

        tracing::info!(
            files = paths.len(),
            failed = report.failures.len(),
            accepted = report.accepted,
            rejected = report.rejected,
            workers,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "loaded DICOM batch"
        );
        Ok(report)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}

fn default_title(paths: &[impl AsRef<Path>]) -> String {
    paths
        .first()
        .and_then(|path| path.as_ref().parent())
        .and_then(Path::file_name)
        .map_or_else(|| "volume".to_owned(), |name| name.to_string_lossy().into_owned())
}
