//! Frame parser: raw transport bytes to per-channel sample arrays
//!
//! A [`FrameParser`] is built once from a [`ParserConfig`] and then decodes
//! every chunk the transport delivers. Three wire formats are supported:
//!
//! - [`ParseMode::FixedBinary`] - back-to-back little-endian records
//! - [`ParseMode::FramedBinary`] - records preceded by a sync marker
//! - [`ParseMode::Ascii`] - delimited text lines
//!
//! Decoding never fails. Malformed frames or lines are dropped one at a time,
//! and anything that may be the first half of a frame split across two reads
//! comes back as [`ParsedChunk::residue`] for the caller to prepend to the next
//! chunk.
//!
//! # Example
//!
//! ```
//! use sigstream_rs::parser::{FrameParser, NumericFormat, ParserConfig};
//!
//! let parser = FrameParser::new(ParserConfig::fixed_binary(2, NumericFormat::Int16)).unwrap();
//! let raw: Vec<u8> = [1i16, -1, 2, -2].iter().flat_map(|v| v.to_le_bytes()).collect();
//! let chunk = parser.decode(&raw);
//! assert_eq!(chunk.channel_data, vec![vec![1.0, 2.0], vec![-1.0, -2.0]]);
//! ```

mod ascii;
mod binary;
pub mod config;

pub use config::{NumericFormat, ParseMode, ParserConfig, LEGACY_U16_MODULUS};

use crate::error::Result;

/// Result of decoding one raw chunk
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedChunk {
    /// Samples indexed by channel; every channel has the same length
    pub channel_data: Vec<Vec<f64>>,
    /// Undecoded tail to prepend to the next chunk
    pub residue: Option<Vec<u8>>,
}

impl ParsedChunk {
    /// Empty chunk with `channel_count` lanes
    pub fn with_capacity(channel_count: usize, frames: usize) -> Self {
        Self {
            channel_data: (0..channel_count)
                .map(|_| Vec::with_capacity(frames))
                .collect(),
            residue: None,
        }
    }

    /// Append one complete frame; `frame` holds one sample per channel
    pub fn push_frame(&mut self, frame: &[f64]) {
        debug_assert_eq!(frame.len(), self.channel_data.len());
        for (lane, &sample) in self.channel_data.iter_mut().zip(frame) {
            lane.push(sample);
        }
    }

    /// Number of decoded frames
    pub fn frame_count(&self) -> usize {
        self.channel_data.first().map_or(0, Vec::len)
    }

    /// Whether no frame was decoded
    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }
}

/// Stateless decoder for one wire format
#[derive(Debug, Clone)]
pub struct FrameParser {
    config: ParserConfig,
    separator: u8,
    terminator: u8,
}

impl FrameParser {
    /// Validate `config` and build a parser for it
    pub fn new(config: ParserConfig) -> Result<Self> {
        config.validate()?;
        // Both are ASCII after validation
        let separator = config.field_separator as u8;
        let terminator = config.line_terminator as u8;
        Ok(Self {
            config,
            separator,
            terminator,
        })
    }

    /// Decode `raw` into frames plus residue
    pub fn decode(&self, raw: &[u8]) -> ParsedChunk {
        let cfg = &self.config;
        match cfg.mode {
            ParseMode::FixedBinary => binary::decode_fixed(
                raw,
                cfg.channel_count,
                cfg.numeric_format,
                cfg.legacy_u16_wrap,
            ),
            ParseMode::FramedBinary => binary::decode_framed(
                raw,
                &cfg.frame_start_bytes,
                cfg.channel_count,
                cfg.numeric_format,
                cfg.legacy_u16_wrap,
            ),
            ParseMode::Ascii => {
                ascii::decode_ascii(raw, cfg.channel_count, self.separator, self.terminator)
            }
        }
    }

    /// Bytes of carry-over the caller must keep after a fixed-binary decode
    ///
    /// Fixed records report no residue, so the caller keeps the trailing
    /// `raw.len() % record_len` bytes itself. Zero for the other modes.
    pub fn fixed_remainder(&self, raw_len: usize) -> usize {
        match self.config.mode {
            ParseMode::FixedBinary => raw_len % self.config.record_len(),
            _ => 0,
        }
    }

    /// Offset at which an oversized residue should be cut to resynchronize
    ///
    /// Framed mode keeps the tail from the last marker occurrence; the other
    /// modes drop everything.
    pub fn resync_offset(&self, pending: &[u8]) -> usize {
        match self.config.mode {
            ParseMode::FramedBinary => {
                binary::framed_resync_offset(pending, &self.config.frame_start_bytes)
            }
            _ => pending.len(),
        }
    }

    /// Smallest complete frame in bytes, marker included
    pub fn frame_len(&self) -> usize {
        self.config.min_frame_len()
    }

    /// Channels per frame
    pub fn channel_count(&self) -> usize {
        self.config.channel_count
    }

    /// Configured wire framing
    pub fn mode(&self) -> ParseMode {
        self.config.mode
    }

    /// The frozen configuration
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }
}

/// Encode one frame in the wire format described by `config`
///
/// The inverse of [`FrameParser::decode`] for a single frame. Binary values
/// saturate to the target integer range; ASCII values use `f64`'s shortest
/// round-trip formatting.
pub fn encode_frame(config: &ParserConfig, samples: &[f64], out: &mut Vec<u8>) {
    match config.mode {
        ParseMode::FixedBinary | ParseMode::FramedBinary => {
            if config.mode == ParseMode::FramedBinary {
                out.extend_from_slice(&config.frame_start_bytes);
            }
            for &sample in samples {
                config.numeric_format.encode(sample, out);
            }
        }
        ParseMode::Ascii => {
            let mut separator = [0u8; 4];
            let separator = config.field_separator.encode_utf8(&mut separator).as_bytes();
            for (i, sample) in samples.iter().enumerate() {
                if i > 0 {
                    out.extend_from_slice(separator);
                }
                out.extend_from_slice(sample.to_string().as_bytes());
            }
            let mut terminator = [0u8; 4];
            out.extend_from_slice(config.line_terminator.encode_utf8(&mut terminator).as_bytes());
        }
    }
}
