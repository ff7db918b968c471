//! Value representations and the typed values they decode to.

use std::borrow::Cow;
use std::fmt;

use chrono::{NaiveDate, NaiveTime};

use crate::cursor::Endianness;
use crate::datetime::{self, DicomDateTime};
use crate::error::{DecodeError, Result};
use crate::tag::Tag;

/// Separator between the values of a multi-valued string element.
pub const VALUE_SEPARATOR: char = '\\';

/// DICOM value representation.
///
/// `DL` is not part of the standard; it marks item and delimiter entries of
/// sequences.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    AE,
    AS,
    AT,
    CS,
    DA,
    DS,
    DT,
    FL,
    FD,
    IS,
    LO,
    LT,
    OB,
    OD,
    OF,
    OW,
    PN,
    SH,
    SL,
    SQ,
    SS,
    ST,
    TM,
    UI,
    UL,
    UN,
    US,
    UT,
    DL,
}

impl ValueKind {
    pub const ALL: [ValueKind; 29] = [
        Self::AE,
        Self::AS,
        Self::AT,
        Self::CS,
        Self::DA,
        Self::DS,
        Self::DT,
        Self::FL,
        Self::FD,
        Self::IS,
        Self::LO,
        Self::LT,
        Self::OB,
        Self::OD,
        Self::OF,
        Self::OW,
        Self::PN,
        Self::SH,
        Self::SL,
        Self::SQ,
        Self::SS,
        Self::ST,
        Self::TM,
        Self::UI,
        Self::UL,
        Self::UN,
        Self::US,
        Self::UT,
        Self::DL,
    ];

    /// Resolves the two-character code of an explicit-VR element.
    pub fn from_code(code: &[u8]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.code().as_bytes() == code)
    }

    pub fn code(self) -> &'static str {
        use ValueKind::*;
        match self {
            AE => "AE",
            AS => "AS",
            AT => "AT",
            CS => "CS",
            DA => "DA",
            DS => "DS",
            DT => "DT",
            FL => "FL",
            FD => "FD",
            IS => "IS",
            LO => "LO",
            LT => "LT",
            OB => "OB",
            OD => "OD",
            OF => "OF",
            OW => "OW",
            PN => "PN",
            SH => "SH",
            SL => "SL",
            SQ => "SQ",
            SS => "SS",
            ST => "ST",
            TM => "TM",
            UI => "UI",
            UL => "UL",
            UN => "UN",
            US => "US",
            UT => "UT",
            DL => "DL",
        }
    }

    pub fn description(self) -> &'static str {
        use ValueKind::*;
        match self {
            AE => "Application Entity",
            AS => "Age String",
            AT => "Attribute Tag",
            CS => "Code String",
            DA => "Date",
            DS => "Decimal String",
            DT => "Date Time",
            FL => "Floating Point Single",
            FD => "Floating Point Double",
            IS => "Integer String",
            LO => "Long String",
            LT => "Long Text",
            OB => "Other Byte String",
            OD => "Other Double String",
            OF => "Other Float String",
            OW => "Other Word String",
            PN => "Person Name",
            SH => "Short String",
            SL => "Signed Long",
            SQ => "Sequence of Items",
            SS => "Signed Short",
            ST => "Short Text",
            TM => "Time",
            UI => "Unique Identifier",
            UL => "Unsigned Long",
            UN => "Unknown",
            US => "Unsigned Short",
            UT => "Unlimited Text",
            DL => "Delimiter",
        }
    }

    /// Whether an explicit-VR header for this kind carries two reserved bytes
    /// and a 4-byte length instead of a 2-byte length.
    pub fn has_extended_length(self) -> bool {
        use ValueKind::*;
        matches!(self, OB | OD | OF | OW | SQ | UN | UT)
    }

    /// Byte width of one value for binary kinds, `None` for text kinds.
    pub fn binary_width(self) -> Option<usize> {
        use ValueKind::*;
        match self {
            OB | UN => Some(1),
            SS | US | OW => Some(2),
            AT | FL | OF | SL | UL => Some(4),
            FD | OD => Some(8),
            _ => None,
        }
    }

    /// Text kinds whose value may hold several `\`-separated entries.
    pub fn is_multi_valued_text(self) -> bool {
        use ValueKind::*;
        matches!(self, AE | AS | CS | DA | DS | DT | IS | LO | PN | SH | TM | UI)
    }

    pub fn is_text(self) -> bool {
        use ValueKind::*;
        self.is_multi_valued_text() || matches!(self, LT | ST | UT)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// The typed payload of an element.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Empty,
    /// AE, AS, CS, LO, PN, SH, UI
    Strings(Vec<String>),
    /// LT, ST, UT, and text that failed to parse as its declared kind
    Text(String),
    /// IS
    Integers(Vec<i32>),
    /// DS
    Decimals(Vec<f64>),
    Dates(Vec<NaiveDate>),
    Times(Vec<NaiveTime>),
    DateTimes(Vec<DicomDateTime>),
    Tags(Vec<Tag>),
    /// FL, OF
    F32(Vec<f32>),
    /// FD, OD
    F64(Vec<f64>),
    I16(Vec<i16>),
    /// US, OW
    U16(Vec<u16>),
    I32(Vec<i32>),
    U32(Vec<u32>),
    /// OB, UN
    Bytes(Vec<u8>),
    Sequence(Vec<SequenceItem>),
}

/// Decodes raw bytes as ISO-IR 100 text, dropping one trailing NUL.
pub fn decode_text(bytes: &[u8]) -> String {
    let bytes = match bytes.split_last() {
        Some((0, rest)) => rest,
        _ => bytes,
    };
    bytes.iter().map(|&b| b as char).collect()
}

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(VALUE_SEPARATOR).map(str::trim)
}

fn binary<T: Default + Clone>(
    kind: ValueKind,
    bytes: &[u8],
    read_into: impl FnOnce(&[u8], &mut [T]),
) -> Result<Vec<T>> {
    let width = kind.binary_width().unwrap_or(1);
    if bytes.len() % width != 0 {
        return Err(DecodeError::InvalidLength {
            kind,
            length: bytes.len(),
            width,
        });
    }
    let mut out = vec![T::default(); bytes.len() / width];
    read_into(bytes, &mut out);
    Ok(out)
}

fn parse_tokens<T>(
    kind: ValueKind,
    text: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Vec<T>> {
    tokens(text)
        .map(|token| {
            parse(token).ok_or_else(|| DecodeError::InvalidValue {
                kind,
                reason: format!("cannot parse {token:?} in {text:?}"),
            })
        })
        .collect()
}

impl Value {
    /// Decodes the bytes of a defined-length element.
    ///
    /// Sequences are framed by the stream and never reach this function.
    ///
    /// # Errors
    ///
    /// Numeric and date/time text that does not parse, and binary values
    /// whose length is not a multiple of their width.
    pub fn decode(kind: ValueKind, bytes: &[u8], endianness: Endianness) -> Result<Self> {
        use ValueKind::*;

        if bytes.is_empty() {
            return Ok(Value::Empty);
        }

        let value = match kind {
            AT => {
                if bytes.len() % 4 != 0 {
                    return Err(DecodeError::InvalidLength {
                        kind,
                        length: bytes.len(),
                        width: 4,
                    });
                }
                let mut halves = vec![0u16; bytes.len() / 2];
                endianness.read_u16_into(bytes, &mut halves);
                Value::Tags(
                    halves
                        .chunks_exact(2)
                        .map(|pair| Tag::new(pair[0], pair[1]))
                        .collect(),
                )
            }
            FL | OF => Value::F32(binary(kind, bytes, |src, dst| endianness.read_f32_into(src, dst))?),
            FD | OD => Value::F64(binary(kind, bytes, |src, dst| endianness.read_f64_into(src, dst))?),
            SS => Value::I16(binary(kind, bytes, |src, dst| endianness.read_i16_into(src, dst))?),
            US | OW => Value::U16(binary(kind, bytes, |src, dst| endianness.read_u16_into(src, dst))?),
            SL => Value::I32(binary(kind, bytes, |src, dst| endianness.read_i32_into(src, dst))?),
            UL => Value::U32(binary(kind, bytes, |src, dst| endianness.read_u32_into(src, dst))?),
            OB | UN => Value::Bytes(bytes.to_vec()),
            SQ => {
                return Err(DecodeError::InvalidValue {
                    kind,
                    reason: "sequence content must be decoded item by item".into(),
                });
            }
            DL => Value::Empty,
            _ => Self::parse_text(kind, &decode_text(bytes))?,
        };
        Ok(value)
    }

    /// Parses the text form of a text kind.
    pub fn parse_text(kind: ValueKind, text: &str) -> Result<Self> {
        use ValueKind::*;

        let trimmed = text.trim_end_matches(['\0', ' ']);
        if trimmed.trim().is_empty() {
            return Ok(Value::Empty);
        }

        let value = match kind {
            DS => Value::Decimals(parse_tokens(kind, trimmed, |t| t.parse().ok())?),
            IS => Value::Integers(parse_tokens(kind, trimmed, |t| {
                t.strip_prefix('+').unwrap_or(t).parse().ok()
            })?),
            DA => Value::Dates(tokens(trimmed).map(datetime::parse_date).collect::<Result<_>>()?),
            TM => Value::Times(tokens(trimmed).map(datetime::parse_time).collect::<Result<_>>()?),
            DT => Value::DateTimes(
                tokens(trimmed)
                    .map(datetime::parse_date_time)
                    .collect::<Result<_>>()?,
            ),
            LT | ST | UT => Value::Text(trimmed.to_owned()),
            _ => Value::Strings(tokens(trimmed).map(str::to_owned).collect()),
        };
        Ok(value)
    }

    /// Encodes the value as element bytes, padded to even length.
    ///
    /// Sequences encode to nothing; their items are framed by the stream.
    pub fn to_bytes(&self, kind: ValueKind, endianness: Endianness) -> Vec<u8> {
        fn write_all<T: Copy>(
            values: &[T],
            width: usize,
            write: impl Fn(&mut [u8], T),
        ) -> Vec<u8> {
            let mut out = vec![0u8; values.len() * width];
            for (chunk, &v) in out.chunks_exact_mut(width).zip(values) {
                write(chunk, v);
            }
            out
        }

        let mut out = match self {
            Value::Empty | Value::Sequence(_) => Vec::new(),
            Value::Tags(tags) => write_all(tags, 4, |buf, tag| {
                endianness.write_u16(&mut buf[..2], tag.group());
                endianness.write_u16(&mut buf[2..], tag.element());
            }),
            Value::F32(v) => write_all(v, 4, |buf, x| endianness.write_f32(buf, x)),
            Value::F64(v) => write_all(v, 8, |buf, x| endianness.write_f64(buf, x)),
            Value::I16(v) => write_all(v, 2, |buf, x| endianness.write_i16(buf, x)),
            Value::U16(v) => write_all(v, 2, |buf, x| endianness.write_u16(buf, x)),
            Value::I32(v) => write_all(v, 4, |buf, x| endianness.write_i32(buf, x)),
            Value::U32(v) => write_all(v, 4, |buf, x| endianness.write_u32(buf, x)),
            Value::Bytes(b) => b.clone(),
            _ => self.to_text().into_owned().into_bytes(),
        };

        if out.len() % 2 == 1 {
            let pad = if kind == ValueKind::UI || kind.binary_width().is_some() {
                0
            } else {
                b' '
            };
            out.push(pad);
        }
        out
    }

    /// The DICOM text form of the value, multiple values joined by `\`.
    pub fn to_text(&self) -> Cow<'_, str> {
        fn join<T>(values: &[T], f: impl Fn(&T) -> String) -> String {
            values.iter().map(f).collect::<Vec<_>>().join("\\")
        }

        match self {
            Value::Empty | Value::Sequence(_) => Cow::Borrowed(""),
            Value::Text(s) => Cow::Borrowed(s),
            Value::Strings(v) => Cow::Owned(v.join("\\")),
            Value::Integers(v) => Cow::Owned(join(v, i32::to_string)),
            Value::Decimals(v) => Cow::Owned(join(v, f64::to_string)),
            Value::Dates(v) => Cow::Owned(join(v, |d| datetime::format_date(*d))),
            Value::Times(v) => Cow::Owned(join(v, |t| datetime::format_time(*t))),
            Value::DateTimes(v) => Cow::Owned(join(v, DicomDateTime::to_string)),
            Value::Tags(v) => Cow::Owned(join(v, Tag::to_string)),
            Value::F32(v) => Cow::Owned(join(v, f32::to_string)),
            Value::F64(v) => Cow::Owned(join(v, f64::to_string)),
            Value::I16(v) => Cow::Owned(join(v, i16::to_string)),
            Value::U16(v) => Cow::Owned(join(v, u16::to_string)),
            Value::I32(v) => Cow::Owned(join(v, i32::to_string)),
            Value::U32(v) => Cow::Owned(join(v, u32::to_string)),
            Value::Bytes(v) => Cow::Owned(join(v, |b| format!("0x{b:02X}"))),
        }
    }

    /// Number of values held.
    pub fn multiplicity(&self) -> usize {
        match self {
            Value::Empty => 0,
            Value::Text(_) => 1,
            Value::Strings(v) => v.len(),
            Value::Integers(v) => v.len(),
            Value::Decimals(v) => v.len(),
            Value::Dates(v) => v.len(),
            Value::Times(v) => v.len(),
            Value::DateTimes(v) => v.len(),
            Value::Tags(v) => v.len(),
            Value::F32(v) => v.len(),
            Value::F64(v) => v.len(),
            Value::I16(v) => v.len(),
            Value::U16(v) => v.len(),
            Value::I32(v) => v.len(),
            Value::U32(v) => v.len(),
            Value::Bytes(v) => v.len(),
            Value::Sequence(v) => v.len(),
        }
    }

    /// All values as integers.
    ///
    /// Decimals are truncated; free text goes through the lenient
    /// [`parse_int_string`] one token at a time.
    pub fn to_ints(&self) -> Option<Vec<i64>> {
        let out = match self {
            Value::Integers(v) => v.iter().map(|&x| x as i64).collect(),
            Value::I16(v) => v.iter().map(|&x| x as i64).collect(),
            Value::U16(v) => v.iter().map(|&x| x as i64).collect(),
            Value::I32(v) => v.iter().map(|&x| x as i64).collect(),
            Value::U32(v) => v.iter().map(|&x| x as i64).collect(),
            Value::Decimals(v) | Value::F64(v) => v.iter().map(|&x| x as i64).collect(),
            Value::F32(v) => v.iter().map(|&x| x as i64).collect(),
            Value::Text(s) => tokens(s).filter_map(parse_int_string).collect(),
            Value::Strings(v) => v.iter().filter_map(|s| parse_int_string(s)).collect(),
            _ => return None,
        };
        Some(out)
    }

    pub fn to_int(&self) -> Option<i64> {
        self.to_ints().and_then(|v| v.first().copied())
    }

    /// All values as floating point numbers.
    pub fn to_decimals(&self) -> Option<Vec<f64>> {
        let out = match self {
            Value::Decimals(v) | Value::F64(v) => v.clone(),
            Value::F32(v) => v.iter().map(|&x| x as f64).collect(),
            Value::Integers(v) => v.iter().map(|&x| x as f64).collect(),
            Value::I16(v) => v.iter().map(|&x| x as f64).collect(),
            Value::U16(v) => v.iter().map(|&x| x as f64).collect(),
            Value::I32(v) => v.iter().map(|&x| x as f64).collect(),
            Value::U32(v) => v.iter().map(|&x| x as f64).collect(),
            Value::Text(s) => parse_multi_decimal_string(s),
            Value::Strings(v) => v.iter().filter_map(|s| parse_decimal_string(s)).collect(),
            _ => return None,
        };
        Some(out)
    }

    pub fn to_decimal(&self) -> Option<f64> {
        self.to_decimals().and_then(|v| v.first().copied())
    }

    /// All values as strings; numbers are formatted.
    pub fn to_strings(&self) -> Option<Vec<String>> {
        match self {
            Value::Empty | Value::Sequence(_) | Value::Bytes(_) => None,
            Value::Strings(v) => Some(v.clone()),
            Value::Text(s) => Some(vec![s.clone()]),
            other => Some(tokens(&other.to_text()).map(str::to_owned).collect()),
        }
    }

    /// The first date, time or date-time value.
    ///
    /// A bare time is anchored at 1970-01-01 and a bare date at midnight.
    pub fn to_date_time(&self) -> Option<DicomDateTime> {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
        let midnight = NaiveTime::from_hms_opt(0, 0, 0)?;
        match self {
            Value::DateTimes(v) => v.first().copied(),
            Value::Dates(v) => v.first().map(|d| DicomDateTime::new(d.and_time(midnight))),
            Value::Times(v) => v.first().map(|t| DicomDateTime::new(epoch.and_time(*t))),
            Value::Text(s) => datetime::parse_date_time(s).ok(),
            _ => None,
        }
    }

    pub fn items(&self) -> Option<&[SequenceItem]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }
}

/// One item of a sequence: an ordered list of nested elements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SequenceItem {
    elements: Vec<Element>,
}

impl SequenceItem {
    pub fn new(elements: Vec<Element>) -> Self {
        Self { elements }
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn get(&self, tag: Tag) -> Option<&Element> {
        self.elements.iter().find(|e| e.tag == tag)
    }

    /// Depth-first search through this item and its nested sequences.
    pub fn find(&self, tag: Tag) -> Option<&Element> {
        self.get(tag).or_else(|| {
            self.elements
                .iter()
                .filter_map(|e| e.value.items())
                .flatten()
                .find_map(|item| item.find(tag))
        })
    }
}

/// A decoded header element.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: Tag,
    pub kind: ValueKind,
    pub value: Value,
}

impl Element {
    pub fn new(tag: Tag, kind: ValueKind, value: Value) -> Self {
        Self { tag, kind, value }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: ", self.tag, self.kind)?;
        match &self.value {
            Value::Sequence(items) => {
                f.write_str("{ ")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    f.write_str("[")?;
                    for (j, element) in item.elements().iter().enumerate() {
                        if j > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{element}")?;
                    }
                    f.write_str("]")?;
                }
                f.write_str(" }")
            }
            value => f.write_str(&value.to_text()),
        }
    }
}

/// Reads a leading integer, stopping at the first character that cannot
/// belong to it. Returns `None` if there are no digits at all.
pub fn parse_int_string(input: &str) -> Option<i64> {
    let s = input.trim();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    let magnitude: i64 = digits[..end].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Scans the longest prefix of `input` that forms a decimal number.
fn decimal_prefix(input: &str) -> (usize, usize) {
    let bytes = input.as_bytes();
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());

    let mut i = start;
    let mut has_sign = false;
    let mut has_decimal = false;
    let mut has_exponent = false;
    let mut has_exponent_sign = false;

    while i < bytes.len() {
        match bytes[i] {
            b'0'..=b'9' => {
                if has_exponent {
                    has_exponent_sign = true;
                } else {
                    has_sign = true;
                }
            }
            b'.' if !has_decimal && !has_exponent => has_decimal = true,
            b'-' | b'+' if !has_sign && !has_exponent => has_sign = true,
            b'-' | b'+' if has_exponent && !has_exponent_sign => has_exponent_sign = true,
            b'e' | b'E' if !has_exponent && i > start => has_exponent = true,
            _ => break,
        }
        i += 1;
    }
    (start, i)
}

/// Reads a leading decimal number (with optional exponent), ignoring
/// whatever follows it.
pub fn parse_decimal_string(input: &str) -> Option<f64> {
    let (start, mut end) = decimal_prefix(input);
    // back off a dangling exponent marker or sign
    while end > start {
        if let Ok(v) = input[start..end].parse() {
            return Some(v);
        }
        end -= 1;
    }
    None
}

/// Extracts every decimal number from free text, whatever separates them.
pub fn parse_multi_decimal_string(input: &str) -> Vec<f64> {
    let mut out = Vec::new();
    let mut rest = input;
    while !rest.is_empty() {
        let (start, end) = decimal_prefix(rest);
        if end > start {
            if let Some(v) = parse_decimal_string(&rest[start..end]) {
                out.push(v);
            }
            rest = &rest[end..];
        } else {
            let skip = rest[start..].chars().next().map_or(0, char::len_utf8);
            rest = &rest[start + skip..];
        }
    }
    out
}
