//! EXIF orientation lookup for JPEG images.
//!
//! Photos taken on phones often store rotated pixels plus an orientation tag.
//! Images with a non-trivial orientation are re-oriented before any variant
//! is derived from them.

use std::io::Cursor;

/// Read the EXIF orientation tag of a JPEG payload.
///
/// Returns `None` when the data has no readable EXIF block or no
/// orientation field.
pub fn jpeg_orientation(data: &[u8]) -> Option<u32> {
    let mut reader = exif::Reader::new();
    reader.continue_on_error(true);
    let mut cursor = Cursor::new(data);

    let exif = reader
        .read_from_container(&mut cursor)
        .or_else(|e| e.distill_partial_result(|_| {}))
        .ok()?;

    extract_u32_field(&exif, exif::Tag::Orientation)
}

/// True if the orientation value asks for a rotation or a flip.
pub fn needs_reorientation(orientation: Option<u32>) -> bool {
    !matches!(orientation, None | Some(0) | Some(1))
}

fn extract_u32_field(exif: &exif::Exif, tag: exif::Tag) -> Option<u32> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    field.value.get_uint(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_of_garbage_is_none() {
        assert_eq!(jpeg_orientation(b"not an image"), None);
        assert_eq!(jpeg_orientation(&[]), None);
    }

    /// SOI, an APP1 EXIF block with one big-endian Orientation entry, EOI.
    fn jpeg_with_orientation(orientation: u8) -> Vec<u8> {
        let mut data = vec![0xff, 0xd8, 0xff, 0xe1, 0x00, 0x22];
        data.extend_from_slice(b"Exif\x00\x00MM\x00\x2a\x00\x00\x00\x08");
        data.extend_from_slice(&[0x00, 0x01, 0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
        data.extend_from_slice(&[0x00, orientation, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
        data.extend_from_slice(&[0xff, 0xd9]);
        data
    }

    #[test]
    fn test_orientation_is_read() {
        assert_eq!(jpeg_orientation(&jpeg_with_orientation(6)), Some(6));
        assert_eq!(jpeg_orientation(&jpeg_with_orientation(1)), Some(1));
        assert!(needs_reorientation(jpeg_orientation(&jpeg_with_orientation(8))));
    }

    #[test]
    fn test_needs_reorientation() {
        assert!(!needs_reorientation(None));
        assert!(!needs_reorientation(Some(0)));
        assert!(!needs_reorientation(Some(1)));
        assert!(needs_reorientation(Some(6)));
        assert!(needs_reorientation(Some(3)));
    }
}
