//! Byte-level reading with a switchable byte order.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{DecodeError, Result};
use crate::tag::Tag;

/// Byte order of the multi-byte values in a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

macro_rules! dispatch {
    ($($read:ident, $read_into:ident, $write:ident => $ty:ty;)*) => {
        $(
            pub fn $read(self, buf: &[u8]) -> $ty {
                match self {
                    Endianness::Little => LittleEndian::$read(buf),
                    Endianness::Big => BigEndian::$read(buf),
                }
            }

            pub fn $read_into(self, src: &[u8], dst: &mut [$ty]) {
                match self {
                    Endianness::Little => LittleEndian::$read_into(src, dst),
                    Endianness::Big => BigEndian::$read_into(src, dst),
                }
            }

            pub fn $write(self, buf: &mut [u8], value: $ty) {
                match self {
                    Endianness::Little => LittleEndian::$write(buf, value),
                    Endianness::Big => BigEndian::$write(buf, value),
                }
            }
        )*
    };
}

impl Endianness {
    dispatch! {
        read_u16, read_u16_into, write_u16 => u16;
        read_i16, read_i16_into, write_i16 => i16;
        read_u32, read_u32_into, write_u32 => u32;
        read_i32, read_i32_into, write_i32 => i32;
        read_f32, read_f32_into, write_f32 => f32;
        read_f64, read_f64_into, write_f64 => f64;
    }
}

/// A read position over an in-memory stream.
///
/// Every read is bounds checked and fails with
/// [`DecodeError::TruncatedStream`] instead of panicking.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
    endianness: Endianness,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_endianness(data, Endianness::Little)
    }

    pub fn with_endianness(data: &'a [u8], endianness: Endianness) -> Self {
        Self {
            data,
            pos: 0,
            endianness,
        }
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    /// The unread part of the stream.
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub fn peek_bytes(&self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(self.truncated(len));
        }
        Ok(&self.data[self.pos..self.pos + len])
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let bytes = self.peek_bytes(len)?;
        self.pos += len;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.read_bytes(len).map(|_| ())
    }

    /// Moves the read position back by `len` bytes.
    pub fn rewind(&mut self, len: usize) {
        self.pos = self.pos.saturating_sub(len);
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let endianness = self.endianness;
        self.read_bytes(2).map(|b| endianness.read_u16(b))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let endianness = self.endianness;
        self.read_bytes(4).map(|b| endianness.read_u32(b))
    }

    /// Reads the two 16-bit halves of a tag.
    pub fn read_tag_halves(&mut self) -> Result<(u16, u16)> {
        Ok((self.read_u16()?, self.read_u16()?))
    }

    pub fn read_tag(&mut self) -> Result<Tag> {
        let (group, element) = self.read_tag_halves()?;
        Ok(Tag::new(group, element))
    }

    fn truncated(&self, needed: usize) -> DecodeError {
        DecodeError::TruncatedStream {
            offset: self.pos,
            needed,
            available: self.remaining(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_follow_byte_order() {
        let data = [0x28, 0x00, 0x10, 0x00, 0x01, 0x02, 0x03, 0x04];
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_tag().unwrap(), Tag::new(0x0028, 0x0010));
        cursor.set_endianness(Endianness::Big);
        assert_eq!(cursor.read_u32().unwrap(), 0x0102_0304);
        assert!(cursor.is_at_end());
    }

    #[test]
    fn short_read_is_truncation() {
        let data = [0x01, 0x02, 0x03];
        let mut cursor = ByteCursor::new(&data);
        cursor.skip(2).unwrap();
        match cursor.read_u16() {
            Err(DecodeError::TruncatedStream {
                offset,
                needed,
                available,
            }) => {
                assert_eq!((offset, needed, available), (2, 2, 1));
            }
            other => panic!("expected truncation, got {other:?}"),
        }
        // failed reads do not advance
        assert_eq!(cursor.position(), 2);
    }

    #[test]
    fn bulk_reads() {
        let mut buf = [0u8; 4];
        Endianness::Big.write_u16(&mut buf[..2], 0xABCD);
        Endianness::Little.write_u16(&mut buf[2..], 0xABCD);
        assert_eq!(buf, [0xAB, 0xCD, 0xCD, 0xAB]);

        let mut out = [0u16; 2];
        Endianness::Little.read_u16_into(&buf, &mut out);
        assert_eq!(out, [0xCDAB, 0xABCD]);
    }
}
