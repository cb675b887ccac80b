//! Delimited text decoder
//!
//! Lines are split on a single-byte terminator and fields on a single-byte
//! separator. Line classification:
//!
//! - fewer fields than channels: not a frame, carried as residue when it is
//!   the last non-empty line of the chunk
//! - enough fields, all numeric: one frame (extra fields are ignored)
//! - enough fields, any non-numeric: dropped as a whole
//!
//! An unterminated final line is always carried, since the rest of it may
//! still be in flight.

use super::ParsedChunk;

enum Line {
    Frame,
    Short,
    Invalid,
}

pub(crate) fn decode_ascii(
    raw: &[u8],
    channel_count: usize,
    separator: u8,
    terminator: u8,
) -> ParsedChunk {
    let mut chunk = ParsedChunk::with_capacity(channel_count, 0);
    let mut fields = Vec::with_capacity(channel_count);
    let mut residue: Option<(usize, usize)> = None;
    let mut start = 0;

    while start < raw.len() {
        let (end, next, terminated) = match raw[start..].iter().position(|&b| b == terminator) {
            Some(offset) => (start + offset, start + offset + 1, true),
            None => (raw.len(), raw.len(), false),
        };

        let line = &raw[start..end];
        if !is_blank(line) {
            residue = None;
            if !terminated {
                residue = Some((start, next));
            } else {
                match parse_line(line, channel_count, separator, &mut fields) {
                    Line::Frame => chunk.push_frame(&fields),
                    Line::Short => residue = Some((start, next)),
                    Line::Invalid => {
                        tracing::trace!("Dropping malformed line ({} bytes)", line.len());
                    }
                }
            }
        }

        start = next;
    }

    chunk.residue = residue.map(|(from, to)| raw[from..to].to_vec());
    chunk
}

fn parse_line(line: &[u8], channel_count: usize, separator: u8, fields: &mut Vec<f64>) -> Line {
    fields.clear();

    let line = line.strip_suffix(b"\r").unwrap_or(line);
    if line.split(|&b| b == separator).count() < channel_count {
        return Line::Short;
    }

    let Ok(text) = std::str::from_utf8(line) else {
        return Line::Invalid;
    };

    for field in text.split(separator as char).take(channel_count) {
        match field.trim().parse::<f64>() {
            Ok(value) => fields.push(value),
            Err(_) => return Line::Invalid,
        }
    }

    Line::Frame
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(|b| b.is_ascii_whitespace())
}
