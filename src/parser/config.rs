//! Parser configuration types
//!
//! [`ParserConfig`] is plain serde data so it can live inside an engine
//! configuration file. It is validated once when a
//! [`FrameParser`](super::FrameParser) is built and never changes afterwards.

use crate::error::{Result, StreamError};
use serde::{Deserialize, Serialize};

/// Wire framing used by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ParseMode {
    /// Delimited text lines
    #[default]
    Ascii,
    /// Back-to-back binary records with no marker
    FixedBinary,
    /// Binary records each preceded by a sync marker
    FramedBinary,
}

impl std::fmt::Display for ParseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseMode::Ascii => write!(f, "ASCII"),
            ParseMode::FixedBinary => write!(f, "Fixed binary"),
            ParseMode::FramedBinary => write!(f, "Framed binary"),
        }
    }
}

/// Binary sample encoding, always little-endian
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NumericFormat {
    /// 16-bit signed integer
    #[default]
    Int16,
    /// 16-bit unsigned integer
    UInt16,
    /// 32-bit signed integer
    Int32,
    /// 32-bit unsigned integer
    UInt32,
    /// IEEE-754 single precision
    Float32,
}

/// Modulus applied to unsigned 16-bit samples in legacy-compatible mode
pub const LEGACY_U16_MODULUS: u16 = 4095;

impl NumericFormat {
    /// Returns the size in bytes of one encoded sample
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            NumericFormat::Int16 | NumericFormat::UInt16 => 2,
            NumericFormat::Int32 | NumericFormat::UInt32 | NumericFormat::Float32 => 4,
        }
    }

    /// Decode one sample from the start of `bytes`
    ///
    /// `bytes` must hold at least [`bytes_per_sample`](Self::bytes_per_sample)
    /// bytes; callers slice whole records before decoding.
    #[inline]
    pub fn decode(&self, bytes: &[u8], legacy_u16_wrap: bool) -> f64 {
        match self {
            NumericFormat::Int16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            NumericFormat::UInt16 => {
                let value = u16::from_le_bytes([bytes[0], bytes[1]]);
                if legacy_u16_wrap {
                    (value % LEGACY_U16_MODULUS) as f64
                } else {
                    value as f64
                }
            }
            NumericFormat::Int32 => {
                i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
            NumericFormat::UInt32 => {
                u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
            NumericFormat::Float32 => {
                f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
            }
        }
    }

    /// Encode one sample, saturating out-of-range values
    ///
    /// Used by the synthetic transport and by tests to build wire data.
    pub fn encode(&self, value: f64, out: &mut Vec<u8>) {
        match self {
            NumericFormat::Int16 => out.extend_from_slice(&(value as i16).to_le_bytes()),
            NumericFormat::UInt16 => out.extend_from_slice(&(value as u16).to_le_bytes()),
            NumericFormat::Int32 => out.extend_from_slice(&(value as i32).to_le_bytes()),
            NumericFormat::UInt32 => out.extend_from_slice(&(value as u32).to_le_bytes()),
            NumericFormat::Float32 => out.extend_from_slice(&(value as f32).to_le_bytes()),
        }
    }
}

impl std::fmt::Display for NumericFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NumericFormat::Int16 => write!(f, "i16"),
            NumericFormat::UInt16 => write!(f, "u16"),
            NumericFormat::Int32 => write!(f, "i32"),
            NumericFormat::UInt32 => write!(f, "u32"),
            NumericFormat::Float32 => write!(f, "f32"),
        }
    }
}

/// Frame parser configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Wire framing
    #[serde(default)]
    pub mode: ParseMode,

    /// Samples per frame
    #[serde(default = "default_channel_count")]
    pub channel_count: usize,

    /// Sample encoding for the binary modes
    #[serde(default)]
    pub numeric_format: NumericFormat,

    /// Sync marker preceding each framed binary record
    #[serde(default)]
    pub frame_start_bytes: Vec<u8>,

    /// Field separator for ASCII mode
    #[serde(default = "default_field_separator")]
    pub field_separator: char,

    /// Line terminator for ASCII mode
    #[serde(default = "default_line_terminator")]
    pub line_terminator: char,

    /// Reproduce the historical `value % 4095` unsigned-16 decoding
    #[serde(default)]
    pub legacy_u16_wrap: bool,
}

fn default_channel_count() -> usize {
    1
}

fn default_field_separator() -> char {
    ','
}

fn default_line_terminator() -> char {
    '\n'
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            mode: ParseMode::Ascii,
            channel_count: 1,
            numeric_format: NumericFormat::Int16,
            frame_start_bytes: Vec::new(),
            field_separator: ',',
            line_terminator: '\n',
            legacy_u16_wrap: false,
        }
    }
}

impl ParserConfig {
    /// Delimited text with the given separator and terminator
    pub fn ascii(channel_count: usize, field_separator: char, line_terminator: char) -> Self {
        Self {
            mode: ParseMode::Ascii,
            channel_count,
            field_separator,
            line_terminator,
            ..Default::default()
        }
    }

    /// Marker-less binary records
    pub fn fixed_binary(channel_count: usize, numeric_format: NumericFormat) -> Self {
        Self {
            mode: ParseMode::FixedBinary,
            channel_count,
            numeric_format,
            ..Default::default()
        }
    }

    /// Binary records preceded by `frame_start_bytes`
    pub fn framed_binary(
        channel_count: usize,
        numeric_format: NumericFormat,
        frame_start_bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            mode: ParseMode::FramedBinary,
            channel_count,
            numeric_format,
            frame_start_bytes: frame_start_bytes.into(),
            ..Default::default()
        }
    }

    /// Enable the legacy unsigned-16 modulus
    pub fn with_legacy_u16_wrap(mut self, enabled: bool) -> Self {
        self.legacy_u16_wrap = enabled;
        self
    }

    /// Same configuration with a different channel count
    pub fn with_channel_count(mut self, channel_count: usize) -> Self {
        self.channel_count = channel_count;
        self
    }

    /// Payload bytes of one binary record (excluding any marker)
    pub fn record_len(&self) -> usize {
        self.channel_count * self.numeric_format.bytes_per_sample()
    }

    /// Smallest number of bytes that can hold one complete frame
    ///
    /// For ASCII this is one digit per channel plus a separator or terminator
    /// after each.
    pub fn min_frame_len(&self) -> usize {
        match self.mode {
            ParseMode::FixedBinary => self.record_len(),
            ParseMode::FramedBinary => self.frame_start_bytes.len() + self.record_len(),
            ParseMode::Ascii => 2 * self.channel_count,
        }
    }

    /// Check the configuration for values the parser cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.channel_count == 0 {
            return Err(StreamError::Config(
                "channel_count must be at least 1".to_string(),
            ));
        }

        match self.mode {
            ParseMode::FramedBinary => {
                if self.frame_start_bytes.is_empty() {
                    return Err(StreamError::Config(
                        "framed binary mode needs non-empty frame_start_bytes".to_string(),
                    ));
                }
            }
            ParseMode::Ascii => {
                if !self.field_separator.is_ascii() || !self.line_terminator.is_ascii() {
                    return Err(StreamError::Config(format!(
                        "separator {:?} and terminator {:?} must be ASCII characters",
                        self.field_separator, self.line_terminator
                    )));
                }
                if self.field_separator == self.line_terminator {
                    return Err(StreamError::Config(
                        "field_separator and line_terminator must differ".to_string(),
                    ));
                }
            }
            ParseMode::FixedBinary => {}
        }

        Ok(())
    }
}
