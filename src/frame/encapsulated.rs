//! Splitting pixel sections into per-frame byte runs.

use crate::cursor::ByteCursor;
use crate::error::{DecodeError, Result};
use crate::tag::tags;

/// Reassembles the frames of an encapsulated pixel section.
///
/// The first item is the basic offset table: one offset per frame, measured
/// from the first byte after the table. Fragments are appended to the
/// current frame until the next frame's offset is reached. Without an
/// offset table, every fragment is its own frame when more than one frame is
/// expected, otherwise all fragments form a single frame.
///
/// # Errors
///
/// Returns error if the section ends before the sequence delimiter or holds
/// anything other than items.
pub fn split_fragments(mut cursor: ByteCursor<'_>, expected_frames: usize) -> Result<Vec<Vec<u8>>> {
    let table_tag = cursor.read_tag()?;
    if table_tag != tags::ITEM {
        return Err(DecodeError::UnexpectedTag {
            tag: table_tag,
            context: "basic offset table",
        });
    }
    let table_length = cursor.read_u32()? as usize;
    let table = cursor.read_bytes(table_length)?;
    let endianness = cursor.endianness();
    let offsets: Vec<usize> = table
        .chunks_exact(4)
        .map(|chunk| endianness.read_u32(chunk) as usize)
        .collect();
    let start = cursor.position();

    let mut frames = Vec::new();
    let mut current = Vec::new();
    loop {
        let tag = cursor.read_tag()?;
        let length = cursor.read_u32()?;
        if tag == tags::SEQUENCE_DELIMITATION_ITEM {
            break;
        }
        if tag != tags::ITEM {
            return Err(DecodeError::UnexpectedTag {
                tag,
                context: "encapsulated pixel data",
            });
        }
        current.extend_from_slice(cursor.read_bytes(length as usize)?);

        let frame_done = if offsets.is_empty() {
            expected_frames > 1
        } else {
            offsets
                .get(frames.len() + 1)
                .is_some_and(|&next| cursor.position() - start >= next)
        };
        if frame_done {
            frames.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() || frames.is_empty() {
        frames.push(current);
    }

    if frames.len() != expected_frames {
        tracing::warn!(found = frames.len(), expected_frames, "frame count differs from header");
    }
    Ok(frames)
}

/// Cuts a native pixel section into frames of `frame_length` bytes.
///
/// A section too short for every declared frame yields the complete frames
/// it does hold.
///
/// # Errors
///
/// [`DecodeError::TruncatedStream`] if not even one frame is present.
pub fn split_native(data: &[u8], frame_length: usize, expected_frames: usize) -> Result<Vec<&[u8]>> {
    let available = data.len().checked_div(frame_length).unwrap_or(0);
    if available == 0 {
        return Err(DecodeError::TruncatedStream {
            offset: 0,
            needed: frame_length,
            available: data.len(),
        });
    }
    if available < expected_frames {
        tracing::warn!(available, expected_frames, "pixel data holds fewer frames than declared");
    }
    Ok(data
        .chunks_exact(frame_length)
        .take(expected_frames.min(available).max(1))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(out: &mut Vec<u8>, bytes: &[u8]) {
        out.extend_from_slice(&[0xFE, 0xFF, 0x00, 0xE0]);
        out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(bytes);
    }

    fn section(offsets: &[u32], fragments: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        let table: Vec<u8> = offsets.iter().flat_map(|o| o.to_le_bytes()).collect();
        item(&mut out, &table);
        for fragment in fragments {
            item(&mut out, fragment);
        }
        out.extend_from_slice(&[0xFE, 0xFF, 0xDD, 0xE0, 0, 0, 0, 0]);
        out
    }

    #[test]
    fn offset_table_groups_fragments() {
        // frame 0 is two fragments of 8 + 4 and 8 + 2 bytes
        let data = section(&[0, 22], &[&[1, 2, 3, 4], &[5, 6], &[7, 8, 9, 10]]);
        let frames = split_fragments(ByteCursor::new(&data), 2).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(frames[1], vec![7, 8, 9, 10]);
        let lengths: usize = frames.iter().map(|f| f.len()).sum();
        assert_eq!(lengths + 8 * 3, 22 + 12);
    }

    #[test]
    fn empty_table_means_fragment_per_frame() {
        let data = section(&[], &[&[1, 1], &[2, 2], &[3, 3]]);
        let frames = split_fragments(ByteCursor::new(&data), 3).unwrap();
        assert_eq!(frames, vec![vec![1, 1], vec![2, 2], vec![3, 3]]);

        let frames = split_fragments(ByteCursor::new(&data), 1).unwrap();
        assert_eq!(frames, vec![vec![1, 1, 2, 2, 3, 3]]);
    }

    #[test]
    fn missing_delimiter_is_truncation() {
        let mut data = section(&[0], &[&[1, 2]]);
        data.truncate(data.len() - 8);
        assert!(matches!(
            split_fragments(ByteCursor::new(&data), 1),
            Err(DecodeError::TruncatedStream { .. })
        ));
    }

    #[test]
    fn native_frames() {
        let data = [1, 2, 3, 4, 5, 6, 7];
        let frames = split_native(&data, 2, 3).unwrap();
        assert_eq!(frames, [&data[0..2], &data[2..4], &data[4..6]]);
        assert_eq!(split_native(&data, 4, 3).unwrap().len(), 1);
        assert!(split_native(&data, 8, 1).is_err());
    }
}
