use crate::header::DicomHeader;
use crate::tag::tags;

/// Maps rescaled sample values to display intensities in `0.0..=255.0`.
pub trait PixelInterpolator: Send + Sync {
    fn interpolate(&self, value: f64) -> f64;

    #[inline]
    fn display_value(&self, value: f64) -> u8 {
        self.interpolate(value).round().clamp(0.0, 255.0) as u8
    }
}

/// Passes values through unchanged; anything outside the byte range is
/// clamped on display.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawInterpolator;

impl PixelInterpolator for RawInterpolator {
    #[inline]
    fn interpolate(&self, value: f64) -> f64 {
        value
    }
}

/// A named window center and width.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowPreset {
    pub name: String,
    pub center: f64,
    pub width: f64,
}

impl WindowPreset {
    pub const FULL_DYNAMIC: &'static str = "FULL DYNAMIC";

    pub fn new(name: impl Into<String>, center: f64, width: f64) -> Self {
        Self {
            name: name.into(),
            center,
            width,
        }
    }

    /// The window spanning the whole value range.
    pub fn full_dynamic(min: f64, max: f64) -> Self {
        Self::new(Self::FULL_DYNAMIC, (min + max) / 2.0, max - min)
    }

    /// Presets from Window Center (0028,1050) and Window Width (0028,1051),
    /// named after their explanation (0028,1055) or `WINDOW{i}` without one.
    pub fn from_header(header: &DicomHeader) -> Vec<Self> {
        let centers = header.multi_decimal_value(tags::WINDOW_CENTER).unwrap_or_default();
        let widths = header.multi_decimal_value(tags::WINDOW_WIDTH).unwrap_or_default();
        let names = header
            .multi_string_value(tags::WINDOW_CENTER_WIDTH_EXPLANATION)
            .unwrap_or_default();

        centers
            .into_iter()
            .zip(widths)
            .enumerate()
            .map(|(i, (center, width))| {
                let name = names
                    .get(i)
                    .filter(|name| !name.is_empty())
                    .cloned()
                    .unwrap_or_else(|| format!("WINDOW{i}"));
                Self::new(name, center, width)
            })
            .collect()
    }
}

/// Linear center/width windowing with a set of selectable presets.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowInterpolator {
    center: f64,
    width: f64,
    presets: Vec<WindowPreset>,
}

impl WindowInterpolator {
    pub fn new(center: f64, width: f64) -> Self {
        Self {
            center,
            width,
            presets: Vec::new(),
        }
    }

    /// Starts at the first preset. Returns `None` if there are none.
    pub fn with_presets(presets: Vec<WindowPreset>) -> Option<Self> {
        let first = presets.first()?;
        Some(Self {
            center: first.center,
            width: first.width,
            presets,
        })
    }

    pub fn center(&self) -> f64 {
        self.center
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn set_window(&mut self, center: f64, width: f64) {
        self.center = center;
        self.width = width;
    }

    pub fn presets(&self) -> &[WindowPreset] {
        &self.presets
    }

    /// Switches to the preset called `name`. Returns whether it exists.
    pub fn apply_preset(&mut self, name: &str) -> bool {
        match self.presets.iter().find(|preset| preset.name == name) {
            Some(preset) => {
                self.center = preset.center;
                self.width = preset.width;
                true
            }
            None => false,
        }
    }
}

impl PixelInterpolator for WindowInterpolator {
    fn interpolate(&self, value: f64) -> f64 {
        let lower = self.center - self.width / 2.0;
        let upper = self.center + self.width / 2.0;
        if value <= lower {
            0.0
        } else if value > upper {
            255.0
        } else {
            (value - lower) / self.width * 255.0
        }
    }
}
