//! Turning pixel sections into typed frames.
//!
//! Decoders are tried in priority order; one that cannot handle a stream
//! answers [`FrameOutcome::NotApplicable`] and the next one gets a turn.

pub mod encapsulated;
pub mod raw;

use std::fmt;
use std::sync::Arc;

use crate::decoder::PixelSection;
use crate::enums::PhotometricInterpretation;
use crate::error::{DecodeError, Result};
use crate::header::DicomHeader;
use crate::pixel_buffer::PixelBuffer;
use crate::tag::{Tag, tags};

pub use raw::RawFrameDecoder;

#[derive(Debug)]
pub enum FrameOutcome {
    Decoded(Vec<PixelBuffer>),
    NotApplicable,
}

/// Decodes the frames of one pixel section.
pub trait FrameDecoder: Send + Sync {
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// Only for streams this decoder is responsible for but cannot decode;
    /// anything else is [`FrameOutcome::NotApplicable`].
    fn decode_frames(&self, header: &DicomHeader, pixels: &PixelSection<'_>) -> Result<FrameOutcome>;
}

/// The registered frame decoders, highest priority first.
#[derive(Clone)]
pub struct FrameDecoderChain {
    decoders: Vec<Arc<dyn FrameDecoder>>,
}

impl Default for FrameDecoderChain {
    fn default() -> Self {
        Self {
            decoders: vec![Arc::new(RawFrameDecoder)],
        }
    }
}

impl fmt::Debug for FrameDecoderChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.decoders.iter().map(|decoder| decoder.name()))
            .finish()
    }
}

impl FrameDecoderChain {
    pub fn empty() -> Self {
        Self {
            decoders: Vec::new(),
        }
    }

    pub fn push_front(&mut self, decoder: Arc<dyn FrameDecoder>) {
        self.decoders.insert(0, decoder);
    }

    pub fn push_back(&mut self, decoder: Arc<dyn FrameDecoder>) {
        self.decoders.push(decoder);
    }

    pub fn names(&self) -> Vec<&str> {
        self.decoders.iter().map(|decoder| decoder.name()).collect()
    }

    /// Frames from the first decoder that applies.
    ///
    /// # Errors
    ///
    /// [`DecodeError::NoDecoderAvailable`] if every decoder declines, or the
    /// error of the decoder that took the stream on.
    pub fn decode(&self, header: &DicomHeader, pixels: &PixelSection<'_>) -> Result<Vec<PixelBuffer>> {
        for decoder in &self.decoders {
            match decoder.decode_frames(header, pixels)? {
                FrameOutcome::Decoded(frames) => {
                    tracing::debug!(decoder = decoder.name(), frames = frames.len(), "decoded pixel data");
                    return Ok(frames);
                }
                FrameOutcome::NotApplicable => {
                    tracing::debug!(decoder = decoder.name(), "frame decoder not applicable");
                }
            }
        }
        let syntax = header
            .transfer_syntax()
            .map_or_else(|| "<none>".to_owned(), |syntax| syntax.uid.clone());
        Err(DecodeError::NoDecoderAvailable(syntax))
    }
}

/// How samples are laid out in a frame, read from the image pixel module.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelLayout {
    pub samples_per_pixel: u16,
    pub rows: usize,
    pub columns: usize,
    pub bits_allocated: u16,
    pub bits_stored: u16,
    pub high_bit: u16,
    pub signed: bool,
    /// Channel-by-channel rather than interleaved.
    pub planar: bool,
    pub photometric: PhotometricInterpretation,
    pub rescale_slope: f64,
    pub rescale_intercept: f64,
    pub frames: usize,
}

fn critical(header: &DicomHeader, tag: Tag, name: &'static str) -> Result<Option<i64>> {
    match header.find(tag) {
        None => Ok(None),
        Some(element) => element.value.to_int().map(Some).ok_or_else(|| {
            DecodeError::UnsupportedPixelLayout(format!("unreadable {name}: {:?}", element.value.to_text()))
        }),
    }
}

fn required(header: &DicomHeader, tag: Tag, name: &'static str) -> Result<i64> {
    critical(header, tag, name)?.ok_or(DecodeError::MissingAttribute { name, tag })
}

impl PixelLayout {
    /// Reads the layout, applying the usual defaults to absent attributes.
    ///
    /// # Errors
    ///
    /// Rows and Columns are required; any size or bit depth attribute that
    /// is present but unreadable or inconsistent is an error.
    pub fn from_header(header: &DicomHeader) -> Result<Self> {
        let rows = required(header, tags::ROWS, "Rows")?;
        let columns = required(header, tags::COLUMNS, "Columns")?;
        let bits_allocated = critical(header, tags::BITS_ALLOCATED, "Bits Allocated")?.unwrap_or(8);
        let bits_stored = critical(header, tags::BITS_STORED, "Bits Stored")?.unwrap_or(bits_allocated);
        let high_bit = critical(header, tags::HIGH_BIT, "High Bit")?.unwrap_or(bits_stored - 1);
        let samples_per_pixel = critical(header, tags::SAMPLES_PER_PIXEL, "Samples per Pixel")?.unwrap_or(1);

        if rows <= 0 || columns <= 0 {
            return Err(DecodeError::UnsupportedPixelLayout(format!("{rows}x{columns} image")));
        }
        if !(1..=32).contains(&bits_allocated)
            || !(1..=bits_allocated).contains(&bits_stored)
            || high_bit >= bits_allocated
            || high_bit + 1 < bits_stored
        {
            return Err(DecodeError::UnsupportedPixelLayout(format!(
                "bits allocated {bits_allocated}, stored {bits_stored}, high bit {high_bit}"
            )));
        }
        if !(1..=4).contains(&samples_per_pixel) {
            return Err(DecodeError::UnsupportedPixelLayout(format!(
                "{samples_per_pixel} samples per pixel"
            )));
        }

        Ok(Self {
            samples_per_pixel: samples_per_pixel as u16,
            rows: rows as usize,
            columns: columns as usize,
            bits_allocated: bits_allocated as u16,
            bits_stored: bits_stored as u16,
            high_bit: high_bit as u16,
            signed: header.int_value_or(tags::PIXEL_REPRESENTATION, 0) == 1,
            planar: header.int_value_or(tags::PLANAR_CONFIGURATION, 0) == 1,
            photometric: header
                .string_value(tags::PHOTOMETRIC_INTERPRETATION)
                .map(|value| PhotometricInterpretation::parse(&value))
                .unwrap_or_default(),
            rescale_slope: header.decimal_value_or(tags::RESCALE_SLOPE, 1.0),
            rescale_intercept: header.decimal_value_or(tags::RESCALE_INTERCEPT, 0.0),
            frames: header.number_of_frames(),
        })
    }

    pub fn pixels_per_frame(&self) -> usize {
        self.rows * self.columns
    }

    /// Bytes of one native (unencapsulated) frame.
    pub fn frame_length(&self) -> usize {
        self.pixels_per_frame() * self.samples_per_pixel as usize * self.bits_allocated.div_ceil(8) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::Endianness;
    use crate::pixel_buffer::PixelData;
    use crate::value::{Element, Value, ValueKind};

    struct Fixed(&'static str, Option<u8>);

    impl FrameDecoder for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        fn decode_frames(&self, _: &DicomHeader, _: &PixelSection<'_>) -> Result<FrameOutcome> {
            Ok(match self.1 {
                Some(v) => FrameOutcome::Decoded(vec![PixelBuffer::new(PixelData::UByte(vec![v]))]),
                None => FrameOutcome::NotApplicable,
            })
        }
    }

    fn section() -> PixelSection<'static> {
        PixelSection {
            kind: ValueKind::OB,
            encapsulated: false,
            endianness: Endianness::Little,
            data: &[],
        }
    }

    fn header(entries: &[(Tag, u16)]) -> DicomHeader {
        let mut header = DicomHeader::new();
        for &(tag, value) in entries {
            header.insert(Element::new(tag, ValueKind::US, Value::U16(vec![value])));
        }
        header
    }

    #[test]
    fn first_applicable_decoder_wins() {
        let mut chain = FrameDecoderChain::empty();
        chain.push_back(Arc::new(Fixed("skip", None)));
        chain.push_back(Arc::new(Fixed("late", Some(2))));
        chain.push_front(Arc::new(Fixed("early", Some(1))));
        assert_eq!(chain.names(), ["early", "skip", "late"]);

        let frames = chain.decode(&DicomHeader::new(), &section()).unwrap();
        assert_eq!(frames[0].raw_value(0, 0), 1.0);
    }

    #[test]
    fn exhausted_chain_is_an_error() {
        let mut chain = FrameDecoderChain::empty();
        chain.push_back(Arc::new(Fixed("skip", None)));
        assert!(matches!(
            chain.decode(&DicomHeader::new(), &section()),
            Err(DecodeError::NoDecoderAvailable(_))
        ));
    }

    #[test]
    fn layout_defaults() {
        let layout = PixelLayout::from_header(&header(&[(tags::ROWS, 3), (tags::COLUMNS, 2)])).unwrap();
        assert_eq!(layout.bits_allocated, 8);
        assert_eq!(layout.bits_stored, 8);
        assert_eq!(layout.high_bit, 7);
        assert_eq!(layout.samples_per_pixel, 1);
        assert_eq!(layout.photometric, PhotometricInterpretation::Monochrome2);
        assert_eq!((layout.rescale_slope, layout.rescale_intercept), (1.0, 0.0));
        assert_eq!(layout.frame_length(), 6);

        let layout = PixelLayout::from_header(&header(&[
            (tags::ROWS, 2),
            (tags::COLUMNS, 2),
            (tags::BITS_ALLOCATED, 16),
            (tags::BITS_STORED, 12),
        ]))
        .unwrap();
        assert_eq!(layout.high_bit, 11);
        assert_eq!(layout.frame_length(), 8);
    }

    #[test]
    fn critical_attributes() {
        assert!(matches!(
            PixelLayout::from_header(&header(&[(tags::ROWS, 3)])),
            Err(DecodeError::MissingAttribute { name: "Columns", .. })
        ));
        assert!(matches!(
            PixelLayout::from_header(&header(&[
                (tags::ROWS, 3),
                (tags::COLUMNS, 3),
                (tags::BITS_ALLOCATED, 8),
                (tags::BITS_STORED, 12),
            ])),
            Err(DecodeError::UnsupportedPixelLayout(_))
        ));

        let mut bad = header(&[(tags::COLUMNS, 3)]);
        bad.insert(Element::new(tags::ROWS, ValueKind::IS, Value::Text("many".into())));
        assert!(matches!(
            PixelLayout::from_header(&bad),
            Err(DecodeError::UnsupportedPixelLayout(_))
        ));
    }
}
