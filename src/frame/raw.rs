use crate::cursor::Endianness;
use crate::decoder::PixelSection;
use crate::enums::PhotometricInterpretation;
use crate::error::{DecodeError, Result};
use crate::frame::encapsulated::{split_fragments, split_native};
use crate::frame::{FrameDecoder, FrameOutcome, PixelLayout};
use crate::header::DicomHeader;
use crate::pixel_buffer::{PixelBuffer, PixelData};

/// Decodes uncompressed pixel data, native or encapsulated.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawFrameDecoder;

impl FrameDecoder for RawFrameDecoder {
    fn name(&self) -> &str {
        "raw"
    }

    fn decode_frames(&self, header: &DicomHeader, pixels: &PixelSection<'_>) -> Result<FrameOutcome> {
        if header.transfer_syntax().is_some_and(|syntax| syntax.encoded) {
            return Ok(FrameOutcome::NotApplicable);
        }

        let layout = PixelLayout::from_header(header)?;
        let frames = if pixels.encapsulated {
            split_fragments(pixels.cursor(), layout.frames)?
                .iter()
                .map(|frame| decode_frame(&layout, frame, pixels.endianness))
                .collect::<Result<Vec<_>>>()?
        } else {
            split_native(pixels.data, layout.frame_length(), layout.frames)?
                .into_iter()
                .map(|frame| decode_frame(&layout, frame, pixels.endianness))
                .collect::<Result<Vec<_>>>()?
        };
        Ok(FrameOutcome::Decoded(frames))
    }
}

/// Realigns, masks and optionally inverts stored grayscale values.
#[derive(Debug, Clone, Copy)]
struct SampleMask {
    shift: u32,
    mask: u32,
    bits_stored: u32,
    invert: bool,
}

impl SampleMask {
    fn new(layout: &PixelLayout) -> Self {
        let bits_stored = u32::from(layout.bits_stored);
        Self {
            shift: u32::from(layout.high_bit) + 1 - bits_stored,
            mask: if bits_stored >= 32 {
                u32::MAX
            } else {
                (1 << bits_stored) - 1
            },
            bits_stored,
            invert: layout.photometric.is_inverted(),
        }
    }

    #[inline]
    fn unsigned(self, stored: u32) -> u32 {
        let v = (stored >> self.shift) & self.mask;
        if self.invert { self.mask - v } else { v }
    }

    /// Two's complement over `bits_stored` bits.
    #[inline]
    fn signed(self, stored: u32) -> i32 {
        let v = self.unsigned(stored);
        let sign = 1u32 << (self.bits_stored - 1);
        if v & sign != 0 {
            (v as i64 - (1i64 << self.bits_stored)) as i32
        } else {
            v as i32
        }
    }
}

fn check_length(data: &[u8], needed: usize) -> Result<()> {
    if data.len() < needed {
        return Err(DecodeError::TruncatedStream {
            offset: 0,
            needed,
            available: data.len(),
        });
    }
    Ok(())
}

/// Decodes one frame according to `layout`.
///
/// # Errors
///
/// [`DecodeError::UnsupportedPixelLayout`] for anything other than 8/16-bit
/// grayscale or 8-bit three-sample color, and
/// [`DecodeError::TruncatedStream`] if the frame is too short.
pub fn decode_frame(layout: &PixelLayout, data: &[u8], endianness: Endianness) -> Result<PixelBuffer> {
    let pixels = layout.pixels_per_frame();
    let buffer = match (layout.samples_per_pixel, layout.bits_allocated) {
        (1, 8) => {
            check_length(data, pixels)?;
            let mask = SampleMask::new(layout);
            let samples = &data[..pixels];
            if layout.signed {
                PixelData::Byte(samples.iter().map(|&b| mask.signed(u32::from(b)) as i8).collect())
            } else {
                PixelData::UByte(samples.iter().map(|&b| mask.unsigned(u32::from(b)) as u8).collect())
            }
        }
        (1, 16) => {
            check_length(data, pixels * 2)?;
            let mut stored = vec![0u16; pixels];
            endianness.read_u16_into(&data[..pixels * 2], &mut stored);
            let mask = SampleMask::new(layout);
            if layout.signed {
                PixelData::Short(stored.iter().map(|&v| mask.signed(u32::from(v)) as i16).collect())
            } else {
                PixelData::UShort(stored.iter().map(|&v| mask.unsigned(u32::from(v)) as u16).collect())
            }
        }
        (3, 8) => {
            check_length(data, pixels * 3)?;
            let mut rgb = if layout.planar {
                let (r, rest) = data.split_at(pixels);
                let (g, b) = rest.split_at(pixels);
                r.iter()
                    .zip(g)
                    .zip(b)
                    .flat_map(|((&r, &g), &b)| [r, g, b])
                    .collect()
            } else {
                data[..pixels * 3].to_vec()
            };
            match layout.photometric {
                PhotometricInterpretation::Rgb => {}
                PhotometricInterpretation::YbrFull => ybr_full_to_rgb(&mut rgb),
                ref other => {
                    return Err(DecodeError::UnsupportedPixelLayout(format!(
                        "three samples per pixel as {other}"
                    )));
                }
            }
            PixelData::UByteRgb(rgb)
        }
        (samples, bits) => {
            return Err(DecodeError::UnsupportedPixelLayout(format!(
                "{samples} samples per pixel at {bits} bits allocated"
            )));
        }
    };
    Ok(PixelBuffer::new(buffer).with_rescale(layout.rescale_slope, layout.rescale_intercept))
}

fn ybr_full_to_rgb(samples: &mut [u8]) {
    for pixel in samples.chunks_exact_mut(3) {
        let y = pixel[0] as f64;
        let cb = pixel[1] as f64 - 128.0;
        let cr = pixel[2] as f64 - 128.0;
        let to_byte = |v: f64| v.round().clamp(0.0, 255.0) as u8;
        pixel[0] = to_byte(y + 1.402 * cr);
        pixel[1] = to_byte(y - 0.344136 * cb - 0.714136 * cr);
        pixel[2] = to_byte(y + 1.772 * cb);
    }
}
