//! Test data builders for capture streams and engines

use sigstream_rs::config::EngineConfig;
use sigstream_rs::parser::{encode_frame, ParserConfig};
use sigstream_rs::transport::{SignalPattern, SyntheticConfig, SyntheticTransport};
use std::io::Write;

/// Builder for raw capture byte streams in any wire format
pub struct CaptureBuilder {
    config: ParserConfig,
    bytes: Vec<u8>,
}

impl CaptureBuilder {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            bytes: Vec::new(),
        }
    }

    /// Append one encoded frame
    pub fn frame(mut self, samples: &[f64]) -> Self {
        encode_frame(&self.config, samples, &mut self.bytes);
        self
    }

    /// Append `count` frames where channel `c` of frame `i` is `i * 10 + c`
    pub fn counting_frames(mut self, count: usize) -> Self {
        let channels = self.config.channel_count;
        for i in 0..count {
            let frame: Vec<f64> = (0..channels).map(|c| (i * 10 + c) as f64).collect();
            encode_frame(&self.config, &frame, &mut self.bytes);
        }
        self
    }

    /// Append raw bytes that are not a frame
    pub fn garbage(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }

    /// Write the capture to a temporary file
    pub fn write_temp(self) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&self.bytes).unwrap();
        file.flush().unwrap();
        file
    }
}

/// Engine config for `parser` with a small buffer and fast timings
pub fn engine_config(parser: ParserConfig, capacity: usize) -> EngineConfig {
    let mut config = EngineConfig::with_parser(parser);
    config.buffer_capacity = capacity;
    config.error_backoff_ms = 1;
    config.stop_timeout_ms = 2000;
    config
}

/// Synthetic source where channel `c` counts up from `c * 1000`
pub fn counter_source(encoding: ParserConfig, rate_hz: f64, frames_per_chunk: usize) -> SyntheticConfig {
    let patterns = (0..encoding.channel_count)
        .map(|c| SignalPattern::Counter {
            step: 1.0,
            min: (c * 1000) as f64,
            max: 1e9,
        })
        .collect();
    SyntheticConfig::new(encoding, rate_hz)
        .with_patterns(patterns)
        .with_frames_per_chunk(frames_per_chunk)
}

pub fn synthetic(config: SyntheticConfig) -> Box<SyntheticTransport> {
    Box::new(SyntheticTransport::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigstream_rs::parser::{FrameParser, NumericFormat};

    #[test]
    fn test_capture_builder() {
        let config = ParserConfig::fixed_binary(2, NumericFormat::Int16);
        let raw = CaptureBuilder::new(config.clone()).counting_frames(3).build();
        assert_eq!(raw.len(), 12);

        let chunk = FrameParser::new(config).unwrap().decode(&raw);
        assert_eq!(chunk.channel_data[0], vec![0.0, 10.0, 20.0]);
        assert_eq!(chunk.channel_data[1], vec![1.0, 11.0, 21.0]);
    }
}
