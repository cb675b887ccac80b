//! Binary record decoders
//!
//! Fixed records are decoded back to back; a trailing partial record is left
//! for the caller. Framed records are located by scanning for the sync
//! marker, and whatever follows the last complete record is returned as
//! residue.

use super::config::NumericFormat;
use super::ParsedChunk;

/// Decode marker-less records; returns the chunk (never with residue)
pub(crate) fn decode_fixed(
    raw: &[u8],
    channel_count: usize,
    format: NumericFormat,
    legacy_u16_wrap: bool,
) -> ParsedChunk {
    let width = format.bytes_per_sample();
    let record_len = channel_count * width;
    let mut chunk = ParsedChunk::with_capacity(channel_count, raw.len() / record_len);

    for record in raw.chunks_exact(record_len) {
        decode_record(record, width, format, legacy_u16_wrap, &mut chunk);
    }

    chunk
}

/// Decode marker-prefixed records; bytes after the last complete record become residue
pub(crate) fn decode_framed(
    raw: &[u8],
    marker: &[u8],
    channel_count: usize,
    format: NumericFormat,
    legacy_u16_wrap: bool,
) -> ParsedChunk {
    let width = format.bytes_per_sample();
    let payload_len = channel_count * width;
    let frame_len = marker.len() + payload_len;
    let mut chunk = ParsedChunk::with_capacity(channel_count, raw.len() / frame_len);

    let mut cursor = 0;
    let mut consumed = 0;

    while cursor + marker.len() <= raw.len() {
        if !raw[cursor..].starts_with(marker) {
            cursor += 1;
            continue;
        }

        if cursor + frame_len > raw.len() {
            // Marker found but its payload has not fully arrived yet
            break;
        }

        let payload = &raw[cursor + marker.len()..cursor + frame_len];
        decode_record(payload, width, format, legacy_u16_wrap, &mut chunk);

        // Skip the payload so marker-like payload bytes never start a frame
        cursor += frame_len;
        consumed = cursor;
    }

    if consumed < raw.len() {
        chunk.residue = Some(raw[consumed..].to_vec());
    }

    chunk
}

/// Where to cut an oversized framed residue so scanning can resynchronize
///
/// Returns the offset of the last marker occurrence past the start, or, when
/// there is none, the offset that keeps just enough bytes to complete a
/// marker split across reads.
pub(crate) fn framed_resync_offset(pending: &[u8], marker: &[u8]) -> usize {
    if marker.is_empty() || pending.len() < marker.len() {
        return 0;
    }

    let last_start = pending.len() - marker.len();
    for start in (1..=last_start).rev() {
        if pending[start..].starts_with(marker) {
            return start;
        }
    }

    pending.len() - (marker.len() - 1)
}

#[inline]
fn decode_record(
    record: &[u8],
    width: usize,
    format: NumericFormat,
    legacy_u16_wrap: bool,
    chunk: &mut ParsedChunk,
) {
    for (channel, field) in record.chunks_exact(width).enumerate() {
        chunk.channel_data[channel].push(format.decode(field, legacy_u16_wrap));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_u16(values: &[u16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_fixed_truncates_partial_record() {
        let mut raw = encode_u16(&[1, 2, 3, 4]);
        raw.extend_from_slice(&[0x05, 0x00, 0x06]);

        let chunk = decode_fixed(&raw, 2, NumericFormat::UInt16, false);
        assert_eq!(chunk.channel_data, vec![vec![1.0, 3.0], vec![2.0, 4.0]]);
        assert!(chunk.residue.is_none());
    }

    #[test]
    fn test_fixed_too_short() {
        let chunk = decode_fixed(&[0x01, 0x00, 0x02], 2, NumericFormat::Int16, false);
        assert_eq!(chunk.frame_count(), 0);
        assert_eq!(chunk.channel_data.len(), 2);
    }

    #[test]
    fn test_framed_two_records_with_trailing_bytes() {
        let marker = [0xAA, 0xAA];
        let mut raw = Vec::new();
        for _ in 0..2 {
            raw.extend_from_slice(&marker);
            raw.extend_from_slice(&encode_u16(&[100, 200]));
        }
        raw.extend_from_slice(&[0x01, 0x02]);

        let chunk = decode_framed(&raw, &marker, 2, NumericFormat::UInt16, false);
        assert_eq!(chunk.frame_count(), 2);
        assert_eq!(chunk.channel_data, vec![vec![100.0, 100.0], vec![200.0, 200.0]]);
        assert_eq!(chunk.residue, Some(vec![0x01, 0x02]));
    }

    #[test]
    fn test_framed_payload_equal_to_marker_is_not_a_frame_start() {
        let marker = [0xAA, 0xAA];
        let mut raw = Vec::new();
        for _ in 0..2 {
            raw.extend_from_slice(&marker);
            raw.extend_from_slice(&encode_u16(&[0xAAAA, 0xAAAA]));
        }

        let chunk = decode_framed(&raw, &marker, 2, NumericFormat::UInt16, false);
        assert_eq!(chunk.frame_count(), 2);
        assert_eq!(chunk.channel_data[0], vec![43690.0, 43690.0]);
        assert!(chunk.residue.is_none());
    }

    #[test]
    fn test_framed_skips_garbage_before_marker() {
        let marker = [0x7E];
        let mut raw = vec![0x00, 0x13, 0x37];
        raw.push(0x7E);
        raw.extend_from_slice(&(-5i16).to_le_bytes());

        let chunk = decode_framed(&raw, &marker, 1, NumericFormat::Int16, false);
        assert_eq!(chunk.channel_data, vec![vec![-5.0]]);
        assert!(chunk.residue.is_none());
    }

    #[test]
    fn test_framed_incomplete_payload_is_residue() {
        let marker = [0xAA, 0x55];
        let mut raw = marker.to_vec();
        raw.extend_from_slice(&encode_u16(&[7, 8]));
        raw.extend_from_slice(&marker);
        raw.push(0x09);

        let chunk = decode_framed(&raw, &marker, 2, NumericFormat::UInt16, false);
        assert_eq!(chunk.frame_count(), 1);
        assert_eq!(chunk.residue, Some(vec![0xAA, 0x55, 0x09]));
    }

    #[test]
    fn test_framed_no_marker_keeps_everything() {
        let raw = [0x01, 0x02, 0x03, 0xAA];
        let chunk = decode_framed(&raw, &[0xAA, 0xAA], 1, NumericFormat::UInt16, false);
        assert_eq!(chunk.frame_count(), 0);
        assert_eq!(chunk.residue, Some(raw.to_vec()));
    }

    #[test]
    fn test_resync_offset() {
        let marker = [0xAA, 0x55];
        assert_eq!(framed_resync_offset(&[1, 2, 0xAA, 0x55, 3], &marker), 2);
        // No marker: keep a possible split marker prefix
        assert_eq!(framed_resync_offset(&[1, 2, 3, 0xAA], &marker), 3);
        // Marker only at the very start does not help
        assert_eq!(framed_resync_offset(&[0xAA, 0x55, 1, 2], &marker), 3);
    }
}
