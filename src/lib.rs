//! # DICOM stack library
//!
//! This crate decodes DICOM files and assembles their images into volumes
//! ordered by temporal position and by position along the slice normal.
//!
//! Everything from the byte level up is implemented here:
//!  - A stream decoder for the implicit and explicit little endian and
//!    explicit big endian encodings, including nested sequences of defined
//!    and undefined length
//!  - A prioritized chain of frame decoders. Uncompressed pixel data is
//!    handled by [`RawFrameDecoder`]; other decoders can be plugged in for
//!    compressed transfer syntaxes
//!  - Typed pixel buffers with rescale slope and intercept
//!  - A volume that accepts slices in any order and keeps them sorted
//!
//! Files are read in parallel on a pool of reader threads using rayon, and
//! slices are inserted into the volume as files complete. A file that cannot
//! be decoded is logged and skipped without affecting the others.
//!
//! # Examples
//!
//! ## Reading a directory of DICOM files into a volume
//!
//! Read every `.dcm` file from the dicom/ directory, then render the middle
//! slice of the first time point through the volume's default window.
//!
//! ```no_run
//! # use dicom_stack::{LoaderConfig, VolumeLoader};
//! let loader = VolumeLoader::new(LoaderConfig::default().with_extension("dcm"));
//! let loaded = loader
//!     .load_from_directory("dicom")
//!     .expect("should have loaded files from directory");
//! let volume = loaded.volume;
//! let window = volume.window_interpolator();
//! let image = volume
//!     .slice_image(0, volume.num_slices() / 2, &window)
//!     .expect("should have returned image at center of volume");
//! image.save("result.png").expect("should have saved image");
//! ```

pub mod config;
pub mod cursor;
pub mod datetime;
pub mod decoder;
pub mod enums;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod header;
pub mod interpolator;
pub mod pixel_buffer;
pub mod slice;
pub mod tag;
pub mod transfer_syntax;
pub mod value;
pub mod volume;
pub mod volume_loader;

#[cfg(test)]
mod test_support;

pub use config::LoaderConfig;
pub use decoder::{DecodedStream, PixelSection, StreamDecoder};
pub use error::{DecodeError, FileError, IncompatibleSlice};
pub use frame::{FrameDecoder, FrameDecoderChain, FrameOutcome, RawFrameDecoder};
pub use header::DicomHeader;
pub use interpolator::{PixelInterpolator, RawInterpolator, WindowInterpolator, WindowPreset};
pub use pixel_buffer::{PixelBuffer, PixelData};
pub use slice::{Slice, SliceInfo};
pub use tag::Tag;
pub use transfer_syntax::{TransferSyntax, TransferSyntaxRegistry};
pub use value::{Element, Value, ValueKind};
pub use volume::DicomImage;
pub use volume_loader::{LoadedVolume, VolumeLoader, VolumeLoaderError};
