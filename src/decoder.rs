//! Walks a DICOM byte stream and splits it into a header and a pixel
//! section.

use crate::cursor::{ByteCursor, Endianness};
use crate::error::{DecodeError, Result};
use crate::header::DicomHeader;
use crate::tag::{self, FILE_META_GROUP, Tag, tags};
use crate::transfer_syntax::{TransferSyntax, TransferSyntaxRegistry};
use crate::value::{self, Element, SequenceItem, Value, ValueKind};

/// Length field value marking a delimiter-terminated sequence, item or
/// encapsulated pixel section.
pub const UNDEFINED_LENGTH: u32 = 0xFFFF_FFFF;

pub const PREAMBLE_LENGTH: usize = 128;
pub const MAGIC: &[u8; 4] = b"DICM";

/// Where a run of sequence items or item elements ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCondition {
    /// At this absolute stream offset.
    ByteCount(usize),
    /// At the matching delimitation tag.
    UntilDelimiter,
}

impl StopCondition {
    fn from_length(position: usize, length: u32) -> Self {
        if length == UNDEFINED_LENGTH {
            StopCondition::UntilDelimiter
        } else {
            StopCondition::ByteCount(position + length as usize)
        }
    }

    fn reached(self, position: usize) -> bool {
        match self {
            StopCondition::ByteCount(end) => position >= end,
            StopCondition::UntilDelimiter => false,
        }
    }
}

/// The raw value of the pixel data element, left undecoded.
#[derive(Debug, Clone, Copy)]
pub struct PixelSection<'a> {
    pub kind: ValueKind,
    /// Fragmented into items, terminated by a sequence delimiter.
    pub encapsulated: bool,
    pub endianness: Endianness,
    /// For encapsulated sections this runs to the end of the stream.
    pub data: &'a [u8],
}

impl<'a> PixelSection<'a> {
    pub fn cursor(&self) -> ByteCursor<'a> {
        ByteCursor::with_endianness(self.data, self.endianness)
    }
}

#[derive(Debug)]
pub struct DecodedStream<'a> {
    pub header: DicomHeader,
    /// `None` if the stream ended without a pixel data element.
    pub pixels: Option<PixelSection<'a>>,
}

/// Decodes DICOM streams against a transfer syntax registry.
#[derive(Debug, Clone, Copy)]
pub struct StreamDecoder<'r> {
    registry: &'r TransferSyntaxRegistry,
}

impl<'r> StreamDecoder<'r> {
    pub fn new(registry: &'r TransferSyntaxRegistry) -> Self {
        Self { registry }
    }

    /// Decodes every element up to the pixel data.
    ///
    /// The file meta group is read as explicit little endian. The first tag
    /// outside it switches to the declared transfer syntax, or to a guess
    /// when the stream declares none.
    ///
    /// # Errors
    ///
    /// Returns error if the magic marker is missing, the stream ends inside
    /// an element, or an element cannot be decoded at all.
    pub fn decode<'a>(&self, data: &'a [u8]) -> Result<DecodedStream<'a>> {
        let mut cursor = ByteCursor::new(data);
        skip_preamble(&mut cursor)?;

        let mut header = DicomHeader::new();
        let mut declared: Option<TransferSyntax> = None;
        let mut explicit = true;
        let mut switched = false;

        while !cursor.is_at_end() {
            let (group, element) = cursor.read_tag_halves()?;
            let mut tag = Tag::new(group, element);

            if !switched && group != FILE_META_GROUP {
                switched = true;
                let syntax = match declared.take() {
                    Some(syntax) => syntax,
                    None => guess_syntax(&cursor),
                };
                if syntax.is_big_endian() {
                    tag = Tag::from_swapped_halves(group, element);
                }
                tracing::debug!(%syntax, "switching to dataset encoding");
                cursor.set_endianness(syntax.endianness);
                explicit = syntax.explicit;
                header.set_transfer_syntax(syntax);
            }

            if tag == tags::PIXEL_DATA {
                let pixels = self.read_pixel_section(&mut cursor, explicit, &header)?;
                return Ok(DecodedStream {
                    header,
                    pixels: Some(pixels),
                });
            }

            if tag.group() == 0xFFFE {
                // stray delimiter outside any sequence
                let length = cursor.read_u32()?;
                tracing::debug!(%tag, length, "ignoring delimiter at top level");
                continue;
            }

            let element = self.read_element(&mut cursor, tag, explicit)?;
            if tag == tags::TRANSFER_SYNTAX_UID {
                let uid = element.value.to_text();
                declared = Some(self.registry.resolve(&uid));
            }
            header.insert(element);
        }

        if !switched {
            if let Some(syntax) = declared {
                header.set_transfer_syntax(syntax);
            }
        }
        Ok(DecodedStream {
            header,
            pixels: None,
        })
    }

    /// Decodes only the header, ignoring any pixel data.
    pub fn decode_header(&self, data: &[u8]) -> Result<DicomHeader> {
        self.decode(data).map(|decoded| decoded.header)
    }

    fn read_element_header(
        &self,
        cursor: &mut ByteCursor<'_>,
        tag: Tag,
        explicit: bool,
    ) -> Result<(ValueKind, u32)> {
        if !explicit {
            let kind = tag::implicit_kind(tag).unwrap_or(ValueKind::UN);
            return Ok((kind, cursor.read_u32()?));
        }

        let code = cursor.peek_bytes(2)?;
        match ValueKind::from_code(code) {
            Some(kind) => {
                cursor.skip(2)?;
                let length = if kind.has_extended_length() {
                    cursor.skip(2)?;
                    cursor.read_u32()?
                } else {
                    u32::from(cursor.read_u16()?)
                };
                Ok((kind, length))
            }
            None => match tag::implicit_kind(tag) {
                Some(kind) => {
                    tracing::debug!(%tag, %kind, "no value representation code, reading implicitly");
                    Ok((kind, cursor.read_u32()?))
                }
                None => Err(DecodeError::UnknownValueKind {
                    tag,
                    code: String::from_utf8_lossy(code).into_owned(),
                }),
            },
        }
    }

    fn read_element(&self, cursor: &mut ByteCursor<'_>, tag: Tag, explicit: bool) -> Result<Element> {
        let (kind, length) = self.read_element_header(cursor, tag, explicit)?;

        if kind == ValueKind::SQ || (length == UNDEFINED_LENGTH && kind.has_extended_length()) {
            let stop = StopCondition::from_length(cursor.position(), length);
            let items = if kind == ValueKind::UN && length == UNDEFINED_LENGTH {
                // unknown content of undefined length is implicit little endian
                let endianness = cursor.endianness();
                cursor.set_endianness(Endianness::Little);
                let items = self.read_sequence(cursor, stop, false);
                cursor.set_endianness(endianness);
                items?
            } else {
                self.read_sequence(cursor, stop, explicit)?
            };
            return Ok(Element::new(tag, ValueKind::SQ, Value::Sequence(items)));
        }

        if length == UNDEFINED_LENGTH {
            return Err(DecodeError::UndefinedLength { tag, kind });
        }

        let bytes = cursor.read_bytes(length as usize)?;
        let value = match Value::decode(kind, bytes, cursor.endianness()) {
            Ok(value) => value,
            Err(err) if kind.is_text() => {
                let text = value::decode_text(bytes).trim().to_owned();
                tracing::warn!(%tag, %kind, error = %err, "keeping unparseable value as text");
                Value::Text(text)
            }
            Err(err) => return Err(err),
        };
        Ok(Element::new(tag, kind, value))
    }

    /// Reads consecutive entries until `stop` or `delimiter`.
    fn read_until<'a, T>(
        cursor: &mut ByteCursor<'a>,
        stop: StopCondition,
        delimiter: Tag,
        mut next: impl FnMut(&mut ByteCursor<'a>, Tag) -> Result<T>,
    ) -> Result<Vec<T>> {
        let mut entries = Vec::new();
        while !stop.reached(cursor.position()) {
            let tag = cursor.read_tag()?;
            if tag == delimiter {
                cursor.read_u32()?;
                break;
            }
            entries.push(next(cursor, tag)?);
        }
        Ok(entries)
    }

    fn read_sequence(
        &self,
        cursor: &mut ByteCursor<'_>,
        stop: StopCondition,
        explicit: bool,
    ) -> Result<Vec<SequenceItem>> {
        Self::read_until(cursor, stop, tags::SEQUENCE_DELIMITATION_ITEM, |cursor, tag| {
            if tag != tags::ITEM {
                return Err(DecodeError::UnexpectedTag {
                    tag,
                    context: "sequence",
                });
            }
            let length = cursor.read_u32()?;
            let item_stop = StopCondition::from_length(cursor.position(), length);
            let elements = Self::read_until(
                cursor,
                item_stop,
                tags::ITEM_DELIMITATION_ITEM,
                |cursor, tag| self.read_element(cursor, tag, explicit),
            )?;
            Ok(SequenceItem::new(elements))
        })
    }

    fn read_pixel_section<'a>(
        &self,
        cursor: &mut ByteCursor<'a>,
        explicit: bool,
        header: &DicomHeader,
    ) -> Result<PixelSection<'a>> {
        let (kind, length) = if explicit {
            self.read_element_header(cursor, tags::PIXEL_DATA, true)?
        } else {
            let kind = if header.int_value_or(tags::BITS_ALLOCATED, 8) > 8 {
                ValueKind::OW
            } else {
                ValueKind::OB
            };
            (kind, cursor.read_u32()?)
        };

        let endianness = cursor.endianness();
        if length == UNDEFINED_LENGTH {
            return Ok(PixelSection {
                kind,
                encapsulated: true,
                endianness,
                data: cursor.rest(),
            });
        }
        Ok(PixelSection {
            kind,
            encapsulated: false,
            endianness,
            data: cursor.read_bytes(length as usize)?,
        })
    }
}

fn skip_preamble(cursor: &mut ByteCursor<'_>) -> Result<()> {
    if cursor.peek_bytes(MAGIC.len()).is_ok_and(|marker| marker == MAGIC) {
        return cursor.skip(MAGIC.len());
    }
    let marker = cursor
        .peek_bytes(PREAMBLE_LENGTH + MAGIC.len())
        .map(|bytes| &bytes[PREAMBLE_LENGTH..]);
    match marker {
        Ok(marker) if marker == MAGIC => cursor.skip(PREAMBLE_LENGTH + MAGIC.len()),
        _ => Err(DecodeError::NotADicomStream),
    }
}

/// Picks an encoding for a stream that never declared its transfer syntax.
///
/// The cursor sits right after the first dataset tag, so the next two bytes
/// are a value representation code if the stream is explicit.
fn guess_syntax(cursor: &ByteCursor<'_>) -> TransferSyntax {
    let explicit = cursor
        .peek_bytes(2)
        .is_ok_and(|code| ValueKind::from_code(code).is_some());
    tracing::warn!(explicit, "no transfer syntax declared, assuming little endian");
    if explicit {
        TransferSyntax::explicit_vr_little_endian()
    } else {
        TransferSyntax::implicit_vr_little_endian()
    }
}
