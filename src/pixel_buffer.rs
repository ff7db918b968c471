use rayon::prelude::*;

use crate::enums::PixelType;
use crate::interpolator::PixelInterpolator;

/// Typed sample storage. RGB samples are interleaved, pixel `i` occupying
/// `3 * i .. 3 * i + 3`.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    Byte(Vec<i8>),
    UByte(Vec<u8>),
    Short(Vec<i16>),
    UShort(Vec<u16>),
    UByteRgb(Vec<u8>),
}

impl PixelData {
    pub fn pixel_type(&self) -> PixelType {
        match self {
            PixelData::Byte(_) => PixelType::Byte,
            PixelData::UByte(_) => PixelType::UByte,
            PixelData::Short(_) => PixelType::Short,
            PixelData::UShort(_) => PixelType::UShort,
            PixelData::UByteRgb(_) => PixelType::UByteRgb,
        }
    }

    /// Number of stored samples, counting each RGB channel.
    pub fn samples(&self) -> usize {
        match self {
            PixelData::Byte(v) => v.len(),
            PixelData::UByte(v) | PixelData::UByteRgb(v) => v.len(),
            PixelData::Short(v) => v.len(),
            PixelData::UShort(v) => v.len(),
        }
    }

    #[inline]
    fn sample(&self, index: usize) -> f64 {
        match self {
            PixelData::Byte(v) => v[index] as f64,
            PixelData::UByte(v) | PixelData::UByteRgb(v) => v[index] as f64,
            PixelData::Short(v) => v[index] as f64,
            PixelData::UShort(v) => v[index] as f64,
        }
    }

    /// The raw storage as native-endian bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            PixelData::Byte(v) => bytemuck::cast_slice(v),
            PixelData::UByte(v) | PixelData::UByteRgb(v) => v,
            PixelData::Short(v) => bytemuck::cast_slice(v),
            PixelData::UShort(v) => bytemuck::cast_slice(v),
        }
    }
}

/// One frame of decoded samples together with the linear transform from
/// stored values to physical ones.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    data: PixelData,
    rescale_slope: f64,
    rescale_intercept: f64,
}

impl PixelBuffer {
    pub fn new(data: PixelData) -> Self {
        Self {
            data,
            rescale_slope: 1.0,
            rescale_intercept: 0.0,
        }
    }

    pub fn with_rescale(mut self, slope: f64, intercept: f64) -> Self {
        self.rescale_slope = slope;
        self.rescale_intercept = intercept;
        self
    }

    pub fn data(&self) -> &PixelData {
        &self.data
    }

    pub fn into_data(self) -> PixelData {
        self.data
    }

    pub fn pixel_type(&self) -> PixelType {
        self.data.pixel_type()
    }

    pub fn channels(&self) -> usize {
        self.pixel_type().channels()
    }

    /// Number of pixels (not samples).
    pub fn len(&self) -> usize {
        self.data.samples() / self.channels()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn rescale_slope(&self) -> f64 {
        self.rescale_slope
    }

    pub fn rescale_intercept(&self) -> f64 {
        self.rescale_intercept
    }

    /// The stored value of `channel` at pixel `index`.
    ///
    /// # Panics
    ///
    /// If `index` or `channel` is out of range.
    #[inline]
    pub fn raw_value(&self, index: usize, channel: usize) -> f64 {
        let channels = self.channels();
        assert!(channel < channels, "channel {channel} out of range");
        self.data.sample(index * channels + channel)
    }

    /// `raw_value * slope + intercept`.
    #[inline]
    pub fn rescaled_value(&self, index: usize, channel: usize) -> f64 {
        self.raw_value(index, channel) * self.rescale_slope + self.rescale_intercept
    }

    /// Rescaled value of the first channel.
    #[inline]
    pub fn value(&self, index: usize) -> f64 {
        self.rescaled_value(index, 0)
    }

    /// Smallest and largest rescaled sample, `None` for an empty buffer.
    pub fn min_max(&self) -> Option<(f64, f64)> {
        (0..self.data.samples())
            .map(|i| self.data.sample(i) * self.rescale_slope + self.rescale_intercept)
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Writes the display value of every sample through `interpolator`.
    ///
    /// `out` receives one byte per sample, so RGB buffers stay interleaved.
    pub fn fill_display(&self, interpolator: &dyn PixelInterpolator, out: &mut [u8]) {
        out.par_iter_mut()
            .take(self.data.samples())
            .enumerate()
            .for_each(|(i, byte)| {
                let rescaled = self.data.sample(i) * self.rescale_slope + self.rescale_intercept;
                *byte = interpolator.display_value(rescaled);
            });
    }

    pub fn to_display(&self, interpolator: &dyn PixelInterpolator) -> Vec<u8> {
        let mut out = vec![0u8; self.data.samples()];
        self.fill_display(interpolator, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolator::{RawInterpolator, WindowInterpolator};

    #[test]
    fn rescale_is_linear() {
        let raw: Vec<u8> = (0..=255).collect();
        let buffer = PixelBuffer::new(PixelData::UByte(raw.clone())).with_rescale(2.0, 10.0);
        for (i, &v) in raw.iter().enumerate() {
            assert_eq!(buffer.rescaled_value(i, 0), v as f64 * 2.0 + 10.0);
        }
        assert_eq!(buffer.min_max(), Some((10.0, 520.0)));
    }

    #[test]
    fn rgb_pixels_address_triplets() {
        let buffer = PixelBuffer::new(PixelData::UByteRgb(vec![1, 2, 3, 4, 5, 6]));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.channels(), 3);
        assert_eq!(buffer.raw_value(1, 0), 4.0);
        assert_eq!(buffer.raw_value(1, 2), 6.0);
        assert_eq!(buffer.to_display(&RawInterpolator), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn signed_storage_and_bytes() {
        let buffer = PixelBuffer::new(PixelData::Short(vec![-1000, 0, 3000])).with_rescale(1.0, -24.0);
        assert_eq!(buffer.pixel_type(), PixelType::Short);
        assert_eq!(buffer.value(0), -1024.0);
        assert_eq!(buffer.data().as_bytes().len(), 6);
        assert_eq!(buffer.min_max(), Some((-1024.0, 2976.0)));
    }

    #[test]
    fn windowed_display() {
        let buffer = PixelBuffer::new(PixelData::UShort(vec![0, 50, 100, 150, 200]));
        let window = WindowInterpolator::new(100.0, 100.0);
        let display = buffer.to_display(&window);
        assert_eq!(display[0], 0);
        assert_eq!(display[1], 0);
        assert_eq!(display[2], 128);
        assert_eq!(display[4], 255);
        assert!(PixelBuffer::new(PixelData::Byte(vec![])).min_max().is_none());
    }
}
