use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use image::{DynamicImage, ImageBuffer, Luma, Rgb};

use crate::enums::PixelType;
use crate::error::{DecodeError, Result};
use crate::geometry::{RigidTransform, Vec3};
use crate::header::DicomHeader;
use crate::interpolator::PixelInterpolator;
use crate::pixel_buffer::PixelBuffer;
use crate::tag::{Tag, tags};
use crate::value::Value;

/// Geometry and acquisition metadata of one image plane.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceInfo {
    pub title: String,
    pub rows: usize,
    pub columns: usize,
    /// Distance between rows, i.e. along a column (mm).
    pub row_spacing: f64,
    /// Distance between columns, i.e. along a row (mm).
    pub column_spacing: f64,
    pub thickness: f64,
    pub pose: RigidTransform,
    pub series_number: i64,
    pub series_time: Option<NaiveDateTime>,
    pub image_number: i64,
    pub image_time: Option<NaiveDateTime>,
    pub acquisition_number: i64,
    pub acquisition_time: Option<NaiveDateTime>,
    pub temporal_position: i64,
}

impl SliceInfo {
    /// A `rows` x `columns` slice with unit spacing at the origin.
    pub fn new(title: impl Into<String>, rows: usize, columns: usize) -> Self {
        Self {
            title: title.into(),
            rows,
            columns,
            row_spacing: 1.0,
            column_spacing: 1.0,
            thickness: 1.0,
            pose: RigidTransform::default(),
            series_number: 0,
            series_time: None,
            image_number: 0,
            image_time: None,
            acquisition_number: 0,
            acquisition_time: None,
            temporal_position: 0,
        }
    }

    /// Reads the slice metadata from a (frame) header.
    ///
    /// `temporal_position` is used when the header names none.
    ///
    /// # Errors
    ///
    /// Rows and Columns must be present.
    pub fn from_header(title: impl Into<String>, header: &DicomHeader, temporal_position: i64) -> Result<Self> {
        let dimension = |tag: Tag, name: &'static str| {
            header
                .int_value(tag)
                .filter(|&v| v > 0)
                .map(|v| v as usize)
                .ok_or(DecodeError::MissingAttribute { name, tag })
        };
        let mut info = Self::new(title, dimension(tags::ROWS, "Rows")?, dimension(tags::COLUMNS, "Columns")?);

        match header.multi_decimal_value(tags::PIXEL_SPACING).as_deref() {
            Some([row, column, ..]) => {
                info.row_spacing = *row;
                info.column_spacing = *column;
            }
            Some([both]) => {
                info.row_spacing = *both;
                info.column_spacing = *both;
            }
            _ => {}
        }
        info.thickness = header.decimal_value_or(tags::SLICE_THICKNESS, 1.0);

        let position = header
            .multi_decimal_value(tags::IMAGE_POSITION_PATIENT)
            .and_then(|values| Vec3::from_slice(&values))
            .unwrap_or_default();
        info.pose = match header.multi_decimal_value(tags::IMAGE_ORIENTATION_PATIENT) {
            Some(cosines) if cosines.len() >= 6 => {
                let mut six = [0.0; 6];
                six.copy_from_slice(&cosines[..6]);
                RigidTransform::from_cosines(six, position)
            }
            Some(cosines) => {
                tracing::warn!(?cosines, "image orientation needs six values, using identity");
                RigidTransform {
                    translation: position,
                    ..RigidTransform::default()
                }
            }
            None => RigidTransform {
                translation: position,
                ..RigidTransform::default()
            },
        };

        info.series_number = header.int_value_or(tags::SERIES_NUMBER, 0);
        info.image_number = header.int_value_or(tags::INSTANCE_NUMBER, 0);
        info.acquisition_number = header.int_value_or(tags::ACQUISITION_NUMBER, 0);
        info.series_time = combined_time(header, tags::SERIES_DATE, tags::SERIES_TIME);
        info.image_time = combined_time(header, tags::CONTENT_DATE, tags::CONTENT_TIME);
        info.acquisition_time = header
            .date_time(tags::ACQUISITION_DATE_TIME)
            .map(|dt| dt.datetime)
            .or_else(|| combined_time(header, tags::ACQUISITION_DATE, tags::ACQUISITION_TIME));

        info.temporal_position = header
            .int_value(tags::TEMPORAL_POSITION_IDENTIFIER)
            .or_else(|| header.int_value(tags::TEMPORAL_POSITION_INDEX))
            .unwrap_or(temporal_position);
        Ok(info)
    }

    pub fn position(&self) -> Vec3 {
        self.pose.translation
    }
}

/// Joins a DA and a TM attribute. A lone time is placed on 1970-01-01.
fn combined_time(header: &DicomHeader, date: Tag, time: Tag) -> Option<NaiveDateTime> {
    let date = match header.find(date).map(|e| &e.value) {
        Some(Value::Dates(dates)) => dates.first().copied(),
        _ => None,
    };
    let time = match header.find(time).map(|e| &e.value) {
        Some(Value::Times(times)) => times.first().copied(),
        _ => None,
    };
    match (date, time) {
        (None, None) => None,
        (date, time) => {
            let date = date.or_else(|| NaiveDate::from_ymd_opt(1970, 1, 1))?;
            let time = time.or_else(|| NaiveTime::from_hms_opt(0, 0, 0))?;
            Some(date.and_time(time))
        }
    }
}

/// One decoded frame with its geometry and the header it came from.
#[derive(Debug, Clone)]
pub struct Slice {
    info: SliceInfo,
    header: Arc<DicomHeader>,
    pixels: PixelBuffer,
}

impl Slice {
    pub fn new(info: SliceInfo, header: Arc<DicomHeader>, pixels: PixelBuffer) -> Self {
        Self { info, header, pixels }
    }

    /// # Errors
    ///
    /// See [`SliceInfo::from_header`]; additionally the frame must hold
    /// exactly `rows * columns` pixels.
    pub fn from_header(
        title: impl Into<String>,
        header: Arc<DicomHeader>,
        pixels: PixelBuffer,
        temporal_position: i64,
    ) -> Result<Self> {
        let info = SliceInfo::from_header(title, &header, temporal_position)?;
        if pixels.len() != info.rows * info.columns {
            return Err(DecodeError::UnsupportedPixelLayout(format!(
                "{} pixels in a {}x{} frame",
                pixels.len(),
                info.rows,
                info.columns
            )));
        }
        Ok(Self::new(info, header, pixels))
    }

    pub fn info(&self) -> &SliceInfo {
        &self.info
    }

    pub fn header(&self) -> &DicomHeader {
        &self.header
    }

    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    pub fn pixel_type(&self) -> PixelType {
        self.pixels.pixel_type()
    }

    pub fn title(&self) -> &str {
        &self.info.title
    }

    pub fn temporal_position(&self) -> i64 {
        self.info.temporal_position
    }

    pub fn set_temporal_position(&mut self, temporal_position: i64) {
        self.info.temporal_position = temporal_position;
    }

    pub fn with_temporal_position(mut self, temporal_position: i64) -> Self {
        self.set_temporal_position(temporal_position);
        self
    }

    /// Rescaled value at (`column`, `row`).
    #[inline]
    pub fn value(&self, column: usize, row: usize, channel: usize) -> f64 {
        self.pixels
            .rescaled_value(row * self.info.columns + column, channel)
    }

    /// Renders the slice through `interpolator`, as grayscale or RGB.
    pub fn to_image(&self, interpolator: &dyn PixelInterpolator) -> Option<DynamicImage> {
        let width = self.info.columns as u32;
        let height = self.info.rows as u32;
        let display = self.pixels.to_display(interpolator);
        match self.pixel_type() {
            PixelType::UByteRgb => {
                ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, display).map(DynamicImage::ImageRgb8)
            }
            _ => ImageBuffer::<Luma<u8>, _>::from_raw(width, height, display).map(DynamicImage::ImageLuma8),
        }
    }
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let info = &self.info;
        write!(
            f,
            "{} [{}x{} {}, t={}, position={:?}]",
            info.title,
            info.columns,
            info.rows,
            self.pixel_type(),
            info.temporal_position,
            info.position().to_array()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolator::RawInterpolator;
    use crate::pixel_buffer::PixelData;
    use crate::value::{Element, ValueKind};

    fn header() -> DicomHeader {
        let mut header = DicomHeader::new();
        let mut put = |tag: Tag, kind: ValueKind, value: Value| {
            header.insert(Element::new(tag, kind, value));
        };
        put(tags::ROWS, ValueKind::US, Value::U16(vec![2]));
        put(tags::COLUMNS, ValueKind::US, Value::U16(vec![3]));
        put(tags::PIXEL_SPACING, ValueKind::DS, Value::Decimals(vec![0.5, 0.8]));
        put(tags::SLICE_THICKNESS, ValueKind::DS, Value::Decimals(vec![2.5]));
        put(tags::IMAGE_POSITION_PATIENT, ValueKind::DS, Value::Decimals(vec![-10.0, 4.0, 7.5]));
        put(
            tags::IMAGE_ORIENTATION_PATIENT,
            ValueKind::DS,
            Value::Decimals(vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
        );
        put(tags::SERIES_NUMBER, ValueKind::IS, Value::Integers(vec![3]));
        put(tags::INSTANCE_NUMBER, ValueKind::IS, Value::Integers(vec![17]));
        put(
            tags::ACQUISITION_DATE,
            ValueKind::DA,
            Value::Dates(vec![NaiveDate::from_ymd_opt(2020, 5, 1).unwrap()]),
        );
        put(
            tags::ACQUISITION_TIME,
            ValueKind::TM,
            Value::Times(vec![NaiveTime::from_hms_opt(8, 30, 0).unwrap()]),
        );
        put(
            tags::CONTENT_TIME,
            ValueKind::TM,
            Value::Times(vec![NaiveTime::from_hms_opt(8, 31, 0).unwrap()]),
        );
        header
    }

    #[test]
    fn metadata_from_header() {
        let info = SliceInfo::from_header("s", &header(), 4).unwrap();
        assert_eq!((info.rows, info.columns), (2, 3));
        assert_eq!((info.row_spacing, info.column_spacing), (0.5, 0.8));
        assert_eq!(info.thickness, 2.5);
        assert_eq!(info.position(), Vec3::new(-10.0, 4.0, 7.5));
        assert_eq!(info.pose.z_axis(), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!((info.series_number, info.image_number), (3, 17));
        assert_eq!(info.temporal_position, 4);
        assert_eq!(
            info.acquisition_time,
            NaiveDate::from_ymd_opt(2020, 5, 1).unwrap().and_hms_opt(8, 30, 0)
        );
        assert_eq!(
            info.image_time,
            NaiveDate::from_ymd_opt(1970, 1, 1).unwrap().and_hms_opt(8, 31, 0)
        );
        assert_eq!(info.series_time, None);
    }

    #[test]
    fn header_temporal_position_wins() {
        let mut header = header();
        header.insert(Element::new(
            tags::TEMPORAL_POSITION_IDENTIFIER,
            ValueKind::IS,
            Value::Integers(vec![2]),
        ));
        assert_eq!(SliceInfo::from_header("s", &header, 9).unwrap().temporal_position, 2);
    }

    #[test]
    fn missing_rows_is_fatal() {
        let mut header = header();
        header.remove(tags::ROWS);
        assert!(matches!(
            SliceInfo::from_header("s", &header, 0),
            Err(DecodeError::MissingAttribute { name: "Rows", .. })
        ));
    }

    #[test]
    fn pixel_count_must_match() {
        let pixels = PixelBuffer::new(PixelData::UByte(vec![0; 5]));
        assert!(Slice::from_header("s", Arc::new(header()), pixels, 0).is_err());

        let pixels = PixelBuffer::new(PixelData::UByte(vec![0, 1, 2, 3, 4, 5])).with_rescale(1.0, 1.0);
        let slice = Slice::from_header("s", Arc::new(header()), pixels, 0).unwrap();
        assert_eq!(slice.value(2, 1, 0), 6.0);
        let image = slice.to_image(&RawInterpolator).unwrap();
        assert_eq!((image.width(), image.height()), (3, 2));
        assert_eq!(image.to_luma8().get_pixel(1, 1).0, [5]);
    }
}
