//! Builds small DICOM streams for tests.
//!
//! Only depends on std so integration tests can include it by path.
#![allow(dead_code)]

pub const IMPLICIT_LE: &str = "1.2.840.10008.1.2";
pub const EXPLICIT_LE: &str = "1.2.840.10008.1.2.1";
pub const EXPLICIT_BE: &str = "1.2.840.10008.1.2.2";
pub const JPEG_BASELINE: &str = "1.2.840.10008.1.2.4.50";

const UNDEFINED: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone)]
pub struct StreamWriter {
    buf: Vec<u8>,
    big_endian: bool,
    explicit: bool,
}

fn is_extended(vr: &[u8; 2]) -> bool {
    matches!(vr, b"OB" | b"OD" | b"OF" | b"OW" | b"SQ" | b"UN" | b"UT")
}

impl StreamWriter {
    /// A stream with preamble and a meta group declaring `transfer_syntax`;
    /// later elements follow that syntax.
    pub fn new(transfer_syntax: &str) -> Self {
        let mut meta = Self {
            buf: vec![0; 128],
            big_endian: false,
            explicit: true,
        };
        meta.buf.extend_from_slice(b"DICM");
        let mut writer = meta.string(0x0002, 0x0010, b"UI", transfer_syntax);
        writer.big_endian = transfer_syntax == EXPLICIT_BE;
        writer.explicit = transfer_syntax != IMPLICIT_LE;
        writer
    }

    /// A stream with the marker at offset 0 and no meta group.
    pub fn bare(explicit: bool) -> Self {
        Self {
            buf: b"DICM".to_vec(),
            big_endian: false,
            explicit,
        }
    }

    /// An empty buffer encoded like `self`, for item contents.
    pub fn nested(&self) -> Self {
        Self {
            buf: Vec::new(),
            big_endian: self.big_endian,
            explicit: self.explicit,
        }
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    fn put_u16(&mut self, v: u16) {
        let bytes = if self.big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        };
        self.buf.extend_from_slice(&bytes);
    }

    fn put_u32(&mut self, v: u32) {
        let bytes = if self.big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        };
        self.buf.extend_from_slice(&bytes);
    }

    fn put_header(&mut self, group: u16, element: u16, vr: &[u8; 2], length: u32) {
        self.put_u16(group);
        self.put_u16(element);
        if !self.explicit {
            self.put_u32(length);
        } else if is_extended(vr) {
            self.buf.extend_from_slice(vr);
            self.buf.extend_from_slice(&[0, 0]);
            self.put_u32(length);
        } else {
            self.buf.extend_from_slice(vr);
            self.put_u16(length as u16);
        }
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// An element whose value bytes are already encoded.
    pub fn element(mut self, group: u16, element: u16, vr: &[u8; 2], value: &[u8]) -> Self {
        self.put_header(group, element, vr, value.len() as u32);
        self.buf.extend_from_slice(value);
        self
    }

    /// A text element padded to even length.
    pub fn string(self, group: u16, element: u16, vr: &[u8; 2], text: &str) -> Self {
        let mut value = text.as_bytes().to_vec();
        if value.len() % 2 == 1 {
            value.push(if vr == b"UI" { 0 } else { b' ' });
        }
        self.element(group, element, vr, &value)
    }

    pub fn u16s(self, group: u16, element: u16, values: &[u16]) -> Self {
        let big_endian = self.big_endian;
        let value: Vec<u8> = values
            .iter()
            .flat_map(|v| if big_endian { v.to_be_bytes() } else { v.to_le_bytes() })
            .collect();
        self.element(group, element, b"US", &value)
    }

    /// A sequence of pre-encoded items, with defined or undefined lengths
    /// throughout.
    pub fn sequence(mut self, group: u16, element: u16, items: &[Vec<u8>], defined: bool) -> Self {
        if defined {
            let length: usize = items.iter().map(|item| 8 + item.len()).sum();
            self.put_header(group, element, b"SQ", length as u32);
            for item in items {
                self.put_u16(0xFFFE);
                self.put_u16(0xE000);
                self.put_u32(item.len() as u32);
                self.buf.extend_from_slice(item);
            }
        } else {
            self.put_header(group, element, b"SQ", UNDEFINED);
            for item in items {
                self.put_u16(0xFFFE);
                self.put_u16(0xE000);
                self.put_u32(UNDEFINED);
                self.buf.extend_from_slice(item);
                self.put_u16(0xFFFE);
                self.put_u16(0xE00D);
                self.put_u32(0);
            }
            self.put_u16(0xFFFE);
            self.put_u16(0xE0DD);
            self.put_u32(0);
        }
        self
    }

    /// Native pixel data, ending the stream.
    pub fn pixel_data(mut self, vr: &[u8; 2], bytes: &[u8]) -> Vec<u8> {
        self.put_header(0x7FE0, 0x0010, vr, bytes.len() as u32);
        self.buf.extend_from_slice(bytes);
        self.buf
    }

    /// Encapsulated pixel data with a basic offset table, ending the stream.
    pub fn encapsulated_pixel_data(mut self, offsets: &[u32], fragments: &[&[u8]]) -> Vec<u8> {
        self.put_header(0x7FE0, 0x0010, b"OB", UNDEFINED);
        self.put_u16(0xFFFE);
        self.put_u16(0xE000);
        self.put_u32(4 * offsets.len() as u32);
        for &offset in offsets {
            self.put_u32(offset);
        }
        for fragment in fragments {
            self.put_u16(0xFFFE);
            self.put_u16(0xE000);
            self.put_u32(fragment.len() as u32);
            self.buf.extend_from_slice(fragment);
        }
        self.put_u16(0xFFFE);
        self.put_u16(0xE0DD);
        self.put_u32(0);
        self.buf
    }
}
