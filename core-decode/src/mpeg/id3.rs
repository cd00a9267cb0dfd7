//! Leading ID3v2 tag detection.

/// Length of the fixed ID3v2 header.
pub const ID3_HEADER_LEN: usize = 10;

/// Outcome of inspecting the start of an MPEG stream for an ID3v2 tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Id3Decision {
    /// Not enough bytes buffered to decide; nothing may be consumed yet.
    NeedMoreData,
    /// Drop this many leading bytes (zero when there is no tag).
    Skip(usize),
}

/// Detects and measures a leading ID3v2 tag.
pub struct Id3TagSkipper;

impl Id3TagSkipper {
    /// Inspect the buffered start of a stream.
    ///
    /// The tag header is `"ID3"`, two version bytes, one flags byte and a
    /// four byte synchsafe size. The whole tag (header plus body) must be
    /// buffered before it is dropped.
    pub fn inspect(buffered: &[u8]) -> Id3Decision {
        if buffered.len() < ID3_HEADER_LEN {
            return Id3Decision::NeedMoreData;
        }
        if &buffered[0..3] != b"ID3" {
            return Id3Decision::Skip(0);
        }

        let total = ID3_HEADER_LEN + synchsafe_size(&buffered[6..10]) as usize;
        if buffered.len() < total {
            Id3Decision::NeedMoreData
        } else {
            Id3Decision::Skip(total)
        }
    }
}

/// Decode a 4-byte synchsafe integer (7 significant bits per byte).
pub fn synchsafe_size(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(4)
        .fold(0u32, |acc, b| (acc << 7) | u32::from(b & 0x7F))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(size: [u8; 4], body_len: usize) -> Vec<u8> {
        let mut out = b"ID3\x04\x00\x00".to_vec();
        out.extend_from_slice(&size);
        out.extend(std::iter::repeat(0u8).take(body_len));
        out
    }

    #[test]
    fn test_synchsafe_decoding() {
        assert_eq!(synchsafe_size(&[0x00, 0x00, 0x02, 0x01]), 257);
        assert_eq!(synchsafe_size(&[0x7F, 0x7F, 0x7F, 0x7F]), (1 << 28) - 1);
        // Top bits are ignored
        assert_eq!(synchsafe_size(&[0x80, 0x80, 0x80, 0x81]), 1);
    }

    #[test]
    fn test_needs_full_header() {
        assert_eq!(Id3TagSkipper::inspect(b"ID3\x04"), Id3Decision::NeedMoreData);
        assert_eq!(Id3TagSkipper::inspect(&[0xFF, 0xFB]), Id3Decision::NeedMoreData);
    }

    #[test]
    fn test_no_tag_skips_nothing() {
        let frame_start = [0xFF, 0xFB, 0x90, 0x00, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(Id3TagSkipper::inspect(&frame_start), Id3Decision::Skip(0));
    }

    #[test]
    fn test_waits_for_whole_tag() {
        let partial = tag([0x00, 0x00, 0x02, 0x01], 100);
        assert_eq!(Id3TagSkipper::inspect(&partial), Id3Decision::NeedMoreData);
    }

    #[test]
    fn test_skips_whole_tag() {
        let mut data = tag([0x00, 0x00, 0x02, 0x01], 257);
        data.extend_from_slice(&[0xFF, 0xFB, 0x90, 0x00]);
        assert_eq!(Id3TagSkipper::inspect(&data), Id3Decision::Skip(267));
    }
}
