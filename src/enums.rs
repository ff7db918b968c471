use std::fmt;

/// Sample storage of a pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelType {
    Byte,
    #[default]
    UByte,
    Short,
    UShort,
    /// Three interleaved unsigned byte channels.
    UByteRgb,
}

impl PixelType {
    pub fn channels(self) -> usize {
        match self {
            PixelType::UByteRgb => 3,
            _ => 1,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        match self {
            PixelType::Short | PixelType::UShort => 2,
            _ => 1,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, PixelType::Byte | PixelType::Short)
    }

    /// Smallest and largest raw sample value.
    pub fn range(self) -> (f64, f64) {
        match self {
            PixelType::Byte => (i8::MIN as f64, i8::MAX as f64),
            PixelType::UByte | PixelType::UByteRgb => (0.0, u8::MAX as f64),
            PixelType::Short => (i16::MIN as f64, i16::MAX as f64),
            PixelType::UShort => (0.0, u16::MAX as f64),
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelType::Byte => "byte",
            PixelType::UByte => "ubyte",
            PixelType::Short => "short",
            PixelType::UShort => "ushort",
            PixelType::UByteRgb => "ubyte rgb",
        };
        f.write_str(name)
    }
}

/// Photometric Interpretation (0028,0004).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PhotometricInterpretation {
    /// Grayscale where the lowest value is white.
    Monochrome1,
    #[default]
    Monochrome2,
    Rgb,
    YbrFull,
    YbrFull422,
    PaletteColor,
    Other(String),
}

impl PhotometricInterpretation {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "MONOCHROME1" => Self::Monochrome1,
            "MONOCHROME2" | "" => Self::Monochrome2,
            "RGB" => Self::Rgb,
            "YBR_FULL" => Self::YbrFull,
            "YBR_FULL_422" => Self::YbrFull422,
            "PALETTE COLOR" => Self::PaletteColor,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn is_inverted(&self) -> bool {
        matches!(self, Self::Monochrome1)
    }
}

impl fmt::Display for PhotometricInterpretation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Monochrome1 => f.write_str("MONOCHROME1"),
            Self::Monochrome2 => f.write_str("MONOCHROME2"),
            Self::Rgb => f.write_str("RGB"),
            Self::YbrFull => f.write_str("YBR_FULL"),
            Self::YbrFull422 => f.write_str("YBR_FULL_422"),
            Self::PaletteColor => f.write_str("PALETTE COLOR"),
            Self::Other(name) => f.write_str(name),
        }
    }
}
