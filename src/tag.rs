use std::fmt;

use crate::value::ValueKind;

/// Group number of the file meta information header.
pub const FILE_META_GROUP: u16 = 0x0002;

/// A DICOM attribute tag, `(group << 16) | element`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Tag(u32);

impl Tag {
    pub const fn new(group: u16, element: u16) -> Self {
        Self(((group as u32) << 16) | element as u32)
    }

    pub const fn from_value(value: u32) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u32 {
        self.0
    }

    pub const fn group(self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub const fn element(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    /// Rebuilds a tag whose two halves were read with the wrong byte order.
    pub const fn from_swapped_halves(group: u16, element: u16) -> Self {
        Self::new(group.swap_bytes(), element.swap_bytes())
    }

    pub const fn is_private(self) -> bool {
        self.group() % 2 == 1
    }

    pub const fn is_group_length(self) -> bool {
        self.element() == 0
    }
}

impl From<u32> for Tag {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<(u16, u16)> for Tag {
    fn from((group, element): (u16, u16)) -> Self {
        Self::new(group, element)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:04X},{:04X})", self.group(), self.element())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag{self}")
    }
}

/// Tags used by the decoder, taken from the standard data dictionary.
pub mod tags {
    use super::Tag;
    use dicom_dictionary_std::tags as std_tags;

    macro_rules! std_tag {
        ($($name:ident),* $(,)?) => {
            $(pub const $name: Tag = Tag::new(std_tags::$name.0, std_tags::$name.1);)*
        };
    }

    std_tag!(
        TRANSFER_SYNTAX_UID,
        SERIES_DATE,
        ACQUISITION_DATE,
        CONTENT_DATE,
        ACQUISITION_DATE_TIME,
        SERIES_TIME,
        ACQUISITION_TIME,
        CONTENT_TIME,
        SLICE_THICKNESS,
        SPACING_BETWEEN_SLICES,
        SERIES_NUMBER,
        ACQUISITION_NUMBER,
        INSTANCE_NUMBER,
        IMAGE_POSITION_PATIENT,
        IMAGE_ORIENTATION_PATIENT,
        TEMPORAL_POSITION_IDENTIFIER,
        TEMPORAL_POSITION_INDEX,
        SAMPLES_PER_PIXEL,
        PHOTOMETRIC_INTERPRETATION,
        PLANAR_CONFIGURATION,
        NUMBER_OF_FRAMES,
        ROWS,
        COLUMNS,
        PIXEL_SPACING,
        BITS_ALLOCATED,
        BITS_STORED,
        HIGH_BIT,
        PIXEL_REPRESENTATION,
        WINDOW_CENTER,
        WINDOW_WIDTH,
        RESCALE_INTERCEPT,
        RESCALE_SLOPE,
        WINDOW_CENTER_WIDTH_EXPLANATION,
        SHARED_FUNCTIONAL_GROUPS_SEQUENCE,
        PER_FRAME_FUNCTIONAL_GROUPS_SEQUENCE,
        PIXEL_DATA,
    );

    // structural tags of the encoding, not dictionary attributes
    pub const ITEM: Tag = Tag::new(0xFFFE, 0xE000);
    pub const ITEM_DELIMITATION_ITEM: Tag = Tag::new(0xFFFE, 0xE00D);
    pub const SEQUENCE_DELIMITATION_ITEM: Tag = Tag::new(0xFFFE, 0xE0DD);
}

/// Looks up the value representation an implicit-VR stream leaves out.
///
/// Returns `None` for tags outside the built-in table.
pub fn implicit_kind(tag: Tag) -> Option<ValueKind> {
    use ValueKind::*;

    if tag.group() == 0xFFFE {
        return Some(DL);
    }
    if tag.is_group_length() {
        return Some(UL);
    }
    if tag.is_private() && (0x0010..=0x00FF).contains(&tag.element()) {
        // private creator
        return Some(LO);
    }

    let kind = match tag.value() {
        0x0002_0001 => OB,
        0x0002_0002 | 0x0002_0003 | 0x0002_0010 | 0x0002_0012 => UI,
        0x0002_0013 => SH,
        0x0002_0016 => AE,

        0x0008_0005 | 0x0008_0008 | 0x0008_0060 => CS,
        0x0008_0012 | 0x0008_0020..=0x0008_0023 => DA,
        0x0008_0013 | 0x0008_0030..=0x0008_0033 => TM,
        0x0008_0016 | 0x0008_0018 | 0x0008_1150 | 0x0008_1155 => UI,
        0x0008_002A => DT,
        0x0008_0050 => SH,
        0x0008_0070 | 0x0008_0080 | 0x0008_1030 | 0x0008_103E | 0x0008_1090 => LO,
        0x0008_0090 | 0x0008_1050 | 0x0008_1070 => PN,
        0x0008_1140 | 0x0008_2112 => SQ,

        0x0010_0010 => PN,
        0x0010_0020 => LO,
        0x0010_0030 => DA,
        0x0010_0040 => CS,
        0x0010_1010 => AS,
        0x0010_1020 | 0x0010_1030 => DS,

        0x0018_0015 | 0x0018_0020 | 0x0018_0021 | 0x0018_0022 | 0x0018_0023 | 0x0018_5100 => CS,
        0x0018_0050 | 0x0018_0080 | 0x0018_0081 | 0x0018_0082 | 0x0018_0083 | 0x0018_0084 => DS,
        0x0018_0087 | 0x0018_0088 | 0x0018_0090 | 0x0018_1314 => DS,
        0x0018_0060 | 0x0018_1100 | 0x0018_1110 | 0x0018_1111 | 0x0018_1130 => DS,
        0x0018_0086 | 0x0018_1150 | 0x0018_1151 | 0x0018_1152 => IS,
        0x0018_1020 | 0x0018_1030 => LO,
        0x0018_1160 | 0x0018_1210 => SH,

        0x0020_000D | 0x0020_000E | 0x0020_0052 => UI,
        0x0020_0010 => SH,
        0x0020_0011..=0x0020_0013 | 0x0020_0100 | 0x0020_0105 => IS,
        0x0020_0032 | 0x0020_0037 | 0x0020_1041 => DS,
        0x0020_1040 => LO,
        0x0020_9111 | 0x0020_9113 | 0x0020_9116 => SQ,
        0x0020_9128 => UL,

        0x0028_0002 | 0x0028_0006 | 0x0028_0010 | 0x0028_0011 => US,
        0x0028_0100..=0x0028_0103 | 0x0028_0106 | 0x0028_0107 => US,
        0x0028_0004 => CS,
        0x0028_0008 => IS,
        0x0028_0009 => AT,
        0x0028_0030 | 0x0028_1050..=0x0028_1053 => DS,
        0x0028_1054 | 0x0028_1055 => LO,
        0x0028_9110 | 0x0028_9132 | 0x0028_9145 => SQ,

        0x5200_9229 | 0x5200_9230 => SQ,
        0x7FE0_0010 => OW,
        _ => return None,
    };
    Some(kind)
}
