use std::fmt;

use image::DynamicImage;
use ndarray::{Array2, Array3, s};

use crate::enums::PixelType;
use crate::error::IncompatibleSlice;
use crate::geometry::{AffineTransform, RigidTransform, Vec3};
use crate::interpolator::{PixelInterpolator, WindowInterpolator, WindowPreset};
use crate::slice::Slice;
use crate::tag::tags;

/// A block of voxels, in (column, row, slice) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoxelRegion {
    pub start: [usize; 3],
    pub step: [usize; 3],
    pub count: [usize; 3],
}

impl VoxelRegion {
    /// Every voxel of a `columns` x `rows` x `slices` block from the origin.
    pub fn full(columns: usize, rows: usize, slices: usize) -> Self {
        Self {
            start: [0; 3],
            step: [1; 3],
            count: [columns, rows, slices],
        }
    }
}

/// A stack of compatible slices ordered by temporal position, then by
/// position along the normal of the first slice.
///
/// `time_offsets[t]` is the index of the first slice of the `t`-th temporal
/// group.
#[derive(Debug, Clone)]
pub struct DicomImage {
    title: String,
    slices: Vec<Slice>,
    time_offsets: Vec<usize>,
    pose: RigidTransform,
    z_axis: Vec3,
    rows: usize,
    columns: usize,
    row_spacing: f64,
    column_spacing: f64,
    declared_spacing: f64,
    pixel_type: PixelType,
}

fn same_spacing(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-6 * a.abs().max(b.abs()).max(1.0)
}

impl DicomImage {
    /// Starts a volume whose shape is fixed by `first`.
    pub fn new(title: impl Into<String>, first: Slice) -> Self {
        let info = first.info();
        Self {
            title: title.into(),
            pose: info.pose,
            z_axis: info.pose.z_axis(),
            rows: info.rows,
            columns: info.columns,
            row_spacing: info.row_spacing,
            column_spacing: info.column_spacing,
            declared_spacing: first
                .header()
                .decimal_value_or(tags::SPACING_BETWEEN_SLICES, info.thickness),
            pixel_type: first.pixel_type(),
            time_offsets: vec![0],
            slices: vec![first],
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Why `slice` cannot join this volume, if it cannot.
    pub fn incompatibility(&self, slice: &Slice) -> Option<String> {
        let info = slice.info();
        if (info.rows, info.columns) != (self.rows, self.columns) {
            return Some(format!(
                "size {}x{} differs from {}x{}",
                info.columns, info.rows, self.columns, self.rows
            ));
        }
        if !same_spacing(info.row_spacing, self.row_spacing)
            || !same_spacing(info.column_spacing, self.column_spacing)
        {
            return Some(format!(
                "pixel spacing {}\\{} differs from {}\\{}",
                info.row_spacing, info.column_spacing, self.row_spacing, self.column_spacing
            ));
        }
        if slice.pixel_type() != self.pixel_type {
            return Some(format!(
                "pixel type {} differs from {}",
                slice.pixel_type(),
                self.pixel_type
            ));
        }
        None
    }

    pub fn compatible(&self, slice: &Slice) -> bool {
        self.incompatibility(slice).is_none()
    }

    /// Inserts `slice` in (temporal position, z) order.
    ///
    /// # Errors
    ///
    /// Hands the slice back if its shape or pixel type differs from the
    /// volume's; the volume is left untouched.
    pub fn add_slice(&mut self, slice: Slice) -> Result<(), IncompatibleSlice> {
        if let Some(reason) = self.incompatibility(&slice) {
            return Err(IncompatibleSlice {
                slice: Box::new(slice),
                reason,
            });
        }
        self.insert(slice);
        Ok(())
    }

    /// [`add_slice`](Self::add_slice), logging and dropping rejected slices.
    pub fn try_add(&mut self, slice: Slice) -> bool {
        match self.add_slice(slice) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(volume = %self.title, "{err}");
                false
            }
        }
    }

    fn z_of(&self, slice: &Slice) -> f64 {
        (slice.info().position() - self.pose.translation).dot(self.z_axis)
    }

    fn insert(&mut self, slice: Slice) {
        let t = slice.temporal_position();
        let z = self.z_of(&slice);
        let n = self.slices.len();

        if let Some(last) = self.slices.last() {
            let last_t = last.temporal_position();
            if t > last_t {
                self.time_offsets.push(n);
                self.slices.push(slice);
                return;
            }
            if t == last_t && z >= self.z_of(last) {
                self.slices.push(slice);
                return;
            }
        }

        let mut position = n;
        for group in 0..self.time_offsets.len() {
            let offset = self.time_offsets[group];
            let group_t = self.slices[offset].temporal_position();
            if t < group_t {
                // new temporal group in front of this one
                self.time_offsets.insert(group, offset);
                self.shift_offsets(group + 1);
                position = offset;
                break;
            }
            if t == group_t {
                let end = self.time_offsets.get(group + 1).copied().unwrap_or(n);
                position = (offset..end)
                    .find(|&i| z < self.z_of(&self.slices[i]))
                    .unwrap_or(end);
                self.shift_offsets(group + 1);
                break;
            }
        }

        if position == 0 {
            self.pose = slice.info().pose;
        }
        self.slices.insert(position, slice);
    }

    fn shift_offsets(&mut self, from: usize) {
        for offset in &mut self.time_offsets[from..] {
            *offset += 1;
        }
    }

    /// Releases spare capacity once no more slices will be added.
    pub fn complete(&mut self) {
        self.slices.shrink_to_fit();
        self.time_offsets.shrink_to_fit();
    }

    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    pub fn time_offsets(&self) -> &[usize] {
        &self.time_offsets
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn num_times(&self) -> usize {
        self.time_offsets.len()
    }

    fn group(&self, time: usize) -> Option<&[Slice]> {
        let start = *self.time_offsets.get(time)?;
        let end = self
            .time_offsets
            .get(time + 1)
            .copied()
            .unwrap_or(self.slices.len());
        Some(&self.slices[start..end])
    }

    /// Slices in the first temporal group.
    pub fn num_slices(&self) -> usize {
        self.group(0).map_or(0, <[Slice]>::len)
    }

    pub fn slice(&self, time: usize, index: usize) -> Option<&Slice> {
        self.group(time)?.get(index)
    }

    /// Slice by its index in the whole ordered sequence.
    pub fn slice_at(&self, index: usize) -> Option<&Slice> {
        self.slices.get(index)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    pub fn channels(&self) -> usize {
        self.pixel_type.channels()
    }

    pub fn row_spacing(&self) -> f64 {
        self.row_spacing
    }

    pub fn column_spacing(&self) -> f64 {
        self.column_spacing
    }

    /// The pose of the first slice in the order.
    pub fn pose(&self) -> &RigidTransform {
        &self.pose
    }

    /// Distance between first and last slice of the first temporal group
    /// over the number of gaps.
    ///
    /// A single slice uses Spacing Between Slices of the first slice, or its
    /// thickness. Coincident slices also fall back to the thickness.
    pub fn slice_spacing(&self) -> f64 {
        let spacing = match self.group(0) {
            Some([first, .., last]) => {
                let gaps = self.num_slices() - 1;
                first.info().position().distance(last.info().position()) / gaps as f64
            }
            _ => self.declared_spacing,
        };
        if spacing > 0.0 {
            return spacing;
        }
        self.slices.first().map_or(1.0, |slice| slice.info().thickness)
    }

    /// Maps (column, row, slice) indices to patient coordinates.
    pub fn voxel_transform(&self) -> AffineTransform {
        self.pose
            .scaled(self.column_spacing, self.row_spacing, self.slice_spacing())
    }

    fn min_max(&self) -> Option<(f64, f64)> {
        self.slices
            .iter()
            .filter_map(|slice| slice.pixels().min_max())
            .reduce(|(lo, hi), (a, b)| (lo.min(a), hi.max(b)))
    }

    /// Smallest rescaled value over all slices and times.
    pub fn min_intensity(&self) -> f64 {
        self.min_max().map_or(0.0, |(lo, _)| lo)
    }

    pub fn max_intensity(&self) -> f64 {
        self.min_max().map_or(0.0, |(_, hi)| hi)
    }

    /// Rescaled value of the first temporal group.
    pub fn value(&self, channel: usize, column: usize, row: usize, slice: usize) -> Option<f64> {
        self.value_at(column, row, slice, 0, channel)
    }

    pub fn value_at(&self, column: usize, row: usize, slice: usize, time: usize, channel: usize) -> Option<f64> {
        if column >= self.columns || row >= self.rows || channel >= self.channels() {
            return None;
        }
        Some(self.slice(time, slice)?.value(column, row, channel))
    }

    /// Writes display values of `region` at `time` into `out`, one byte per
    /// channel, columns varying fastest. Voxels outside the volume are zero.
    ///
    /// Returns the number of bytes written.
    pub fn pixels(
        &self,
        region: VoxelRegion,
        time: usize,
        interpolator: &dyn PixelInterpolator,
        out: &mut Vec<u8>,
    ) -> usize {
        let channels = self.channels();
        let before = out.len();
        let [columns, rows, slices] = region.count;
        out.reserve(columns * rows * slices * channels);

        for k in 0..slices {
            let slice = self.slice(time, region.start[2] + k * region.step[2]);
            for j in 0..rows {
                let row = region.start[1] + j * region.step[1];
                for i in 0..columns {
                    let column = region.start[0] + i * region.step[0];
                    for channel in 0..channels {
                        let byte = match slice {
                            Some(slice) if row < self.rows && column < self.columns => {
                                interpolator.display_value(slice.value(column, row, channel))
                            }
                            _ => 0,
                        };
                        out.push(byte);
                    }
                }
            }
        }
        out.len() - before
    }

    /// Rescaled values of one temporal group as (slice, row, column).
    pub fn to_array(&self, time: usize, channel: usize) -> Option<Array3<f64>> {
        let group = self.group(time)?;
        if channel >= self.channels() {
            return None;
        }
        let mut volume = Array3::<f64>::zeros((group.len(), self.rows, self.columns));
        for (i, slice) in group.iter().enumerate() {
            let plane = Array2::from_shape_fn((self.rows, self.columns), |(row, column)| {
                slice.value(column, row, channel)
            });
            volume.slice_mut(s![i, .., ..]).assign(&plane);
        }
        Some(volume)
    }

    /// Windowing with a full-range preset followed by the presets declared
    /// in the header of the first slice.
    pub fn window_interpolator(&self) -> WindowInterpolator {
        let mut presets = vec![WindowPreset::full_dynamic(
            self.min_intensity(),
            self.max_intensity(),
        )];
        if let Some(first) = self.slices.first() {
            presets.extend(WindowPreset::from_header(first.header()));
        }
        let full = presets[0].clone();
        WindowInterpolator::with_presets(presets)
            .unwrap_or_else(|| WindowInterpolator::new(full.center, full.width))
    }

    /// Renders one slice through `interpolator`.
    pub fn slice_image(&self, time: usize, index: usize, interpolator: &dyn PixelInterpolator) -> Option<DynamicImage> {
        self.slice(time, index)?.to_image(interpolator)
    }
}

impl fmt::Display for DicomImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        writeln!(
            f,
            "  size: {} x {} x {} ({} time points, {} slices total)",
            self.columns,
            self.rows,
            self.num_slices(),
            self.num_times(),
            self.slices.len()
        )?;
        writeln!(
            f,
            "  spacing: {} x {} x {} mm",
            self.column_spacing,
            self.row_spacing,
            self.slice_spacing()
        )?;
        writeln!(f, "  pixel type: {}", self.pixel_type)?;
        write!(
            f,
            "  intensity: [{}, {}]",
            self.min_intensity(),
            self.max_intensity()
        )
    }
}
