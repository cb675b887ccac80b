//! Synthetic transport for demos and tests
//!
//! Generates multi-channel waveforms and encodes them in any of the supported
//! wire formats, so the whole pipeline can run without hardware.
//!
//! # Data patterns
//!
//! - [`SignalPattern::Constant`] - fixed value
//! - [`SignalPattern::Sine`] - sinusoid with frequency/amplitude/offset
//! - [`SignalPattern::Counter`] - frame counter, wrapping in `[min, max)`
//! - [`SignalPattern::Sawtooth`] - linear ramp that resets every period
//! - [`SignalPattern::Square`] - alternates between `+amplitude` and `-amplitude`
//! - [`SignalPattern::Triangle`] - triangle wave
//!
//! Patterns are evaluated on the frame index, not the wall clock, so the
//! generated sequence is deterministic: frame `k` always carries the same
//! values regardless of scheduling jitter.
//!
//! # Pacing
//!
//! Each [`read_chunk`](Transport::read_chunk) produces `frames_per_chunk`
//! frames and sleeps until that chunk is due at `frame_rate_hz`, which models a
//! device streaming at a fixed rate.
//!
//! # Failure injection
//!
//! A [`FailurePlan`] makes a run of consecutive reads fail after a number of
//! successful chunks, to exercise the engine's retry and fault handling.

use crate::error::{Result, StreamError};
use crate::parser::{encode_frame, ParserConfig};
use std::time::{Duration, Instant};

use super::{Transport, TransportInfo};

/// Waveform for one synthetic channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalPattern {
    /// Constant value
    Constant(f64),
    /// Sine wave with frequency and amplitude
    Sine {
        frequency: f64,
        amplitude: f64,
        offset: f64,
    },
    /// Frame counter scaled by `step`, wrapping in `[min, max)`
    Counter { step: f64, min: f64, max: f64 },
    /// Sawtooth wave
    Sawtooth { period: f64, amplitude: f64 },
    /// Square wave
    Square { period: f64, amplitude: f64 },
    /// Triangle wave
    Triangle { period: f64, amplitude: f64 },
}

impl Default for SignalPattern {
    fn default() -> Self {
        SignalPattern::Sine {
            frequency: 1.0,
            amplitude: 100.0,
            offset: 0.0,
        }
    }
}

impl SignalPattern {
    /// Value of this pattern at frame `index`, `t` seconds into the stream
    pub fn value_at(&self, index: u64, t: f64) -> f64 {
        match *self {
            SignalPattern::Constant(v) => v,
            SignalPattern::Sine {
                frequency,
                amplitude,
                offset,
            } => offset + amplitude * (2.0 * std::f64::consts::PI * frequency * t).sin(),
            SignalPattern::Counter { step, min, max } => {
                let span = max - min;
                let raw = index as f64 * step;
                if span > 0.0 {
                    min + raw.rem_euclid(span)
                } else {
                    min
                }
            }
            SignalPattern::Sawtooth { period, amplitude } => {
                let phase = t % period;
                amplitude * (phase / period)
            }
            SignalPattern::Square { period, amplitude } => {
                let phase = t % period;
                if phase < period / 2.0 {
                    amplitude
                } else {
                    -amplitude
                }
            }
            SignalPattern::Triangle { period, amplitude } => {
                let phase = t % period;
                let half = period / 2.0;
                if phase < half {
                    amplitude * (2.0 * phase / half - 1.0)
                } else {
                    amplitude * (1.0 - 2.0 * (phase - half) / half)
                }
            }
        }
    }
}

/// When injected read failures happen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePlan {
    /// Successful chunks before the first failure
    pub after_chunks: u64,
    /// Consecutive failing reads (None = fail forever)
    pub failures: Option<u32>,
}

/// Generator configuration
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Wire format to emit; its channel count is the generator's channel count
    pub encoding: ParserConfig,
    /// Per-channel waveforms; missing entries use the default sine
    pub patterns: Vec<SignalPattern>,
    /// Frames per second (0 = unpaced)
    pub frame_rate_hz: f64,
    /// Frames generated per read
    pub frames_per_chunk: usize,
    /// Stop after this many frames (None = endless)
    pub max_frames: Option<u64>,
    /// Injected failures
    pub failure: Option<FailurePlan>,
}

impl SyntheticConfig {
    /// Endless stream in `encoding` at `frame_rate_hz`, 32 frames per read
    pub fn new(encoding: ParserConfig, frame_rate_hz: f64) -> Self {
        Self {
            encoding,
            patterns: Vec::new(),
            frame_rate_hz,
            frames_per_chunk: 32,
            max_frames: None,
            failure: None,
        }
    }

    /// Use `pattern` for every channel
    pub fn with_pattern(mut self, pattern: SignalPattern) -> Self {
        self.patterns = vec![pattern; self.encoding.channel_count];
        self
    }

    /// Per-channel patterns
    pub fn with_patterns(mut self, patterns: Vec<SignalPattern>) -> Self {
        self.patterns = patterns;
        self
    }

    /// Frames generated per read
    pub fn with_frames_per_chunk(mut self, frames: usize) -> Self {
        self.frames_per_chunk = frames.max(1);
        self
    }

    /// Stop after `frames` frames
    pub fn with_max_frames(mut self, frames: u64) -> Self {
        self.max_frames = Some(frames);
        self
    }

    /// Inject read failures
    pub fn with_failure(mut self, plan: FailurePlan) -> Self {
        self.failure = Some(plan);
        self
    }
}

/// Transport that fabricates frames
#[derive(Debug)]
pub struct SyntheticTransport {
    config: SyntheticConfig,
    open: bool,
    started: Option<Instant>,
    frame_index: u64,
    chunks_delivered: u64,
    failures_injected: u32,
    /// Encoded bytes not yet handed out (when the caller's buffer is small)
    pending: Vec<u8>,
    pending_pos: usize,
    scratch: Vec<f64>,
}

impl SyntheticTransport {
    /// Create a generator
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            open: false,
            started: None,
            frame_index: 0,
            chunks_delivered: 0,
            failures_injected: 0,
            pending: Vec::new(),
            pending_pos: 0,
            scratch: Vec::new(),
        }
    }

    fn channel_count(&self) -> usize {
        self.config.encoding.channel_count
    }

    fn should_fail(&mut self) -> bool {
        let Some(plan) = self.config.failure else {
            return false;
        };
        if self.chunks_delivered < plan.after_chunks {
            return false;
        }
        match plan.failures {
            Some(limit) if self.failures_injected >= limit => false,
            _ => {
                self.failures_injected += 1;
                true
            }
        }
    }

    /// Sleep until the next chunk is due
    fn pace(&self) {
        let (Some(started), rate) = (self.started, self.config.frame_rate_hz) else {
            return;
        };
        if rate <= 0.0 {
            return;
        }
        let due = Duration::from_secs_f64(
            (self.frame_index + self.config.frames_per_chunk as u64) as f64 / rate,
        );
        let elapsed = started.elapsed();
        if due > elapsed {
            std::thread::sleep(due - elapsed);
        }
    }

    /// Encode the next chunk of frames into `pending`
    fn generate_chunk(&mut self) {
        let channels = self.channel_count();
        let mut frames = self.config.frames_per_chunk as u64;
        if let Some(max) = self.config.max_frames {
            frames = frames.min(max.saturating_sub(self.frame_index));
        }

        self.pending.clear();
        self.pending_pos = 0;

        let rate = if self.config.frame_rate_hz > 0.0 {
            self.config.frame_rate_hz
        } else {
            1.0
        };

        for _ in 0..frames {
            let t = self.frame_index as f64 / rate;
            self.scratch.clear();
            for channel in 0..channels {
                let pattern = self
                    .config
                    .patterns
                    .get(channel)
                    .copied()
                    .unwrap_or_default();
                self.scratch.push(pattern.value_at(self.frame_index, t));
            }
            encode_frame(&self.config.encoding, &self.scratch, &mut self.pending);
            self.frame_index += 1;
        }
    }
}

impl Transport for SyntheticTransport {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn open(&mut self) -> Result<TransportInfo> {
        self.open = true;
        self.started = Some(Instant::now());
        self.frame_index = 0;
        self.chunks_delivered = 0;
        self.failures_injected = 0;
        self.pending.clear();
        self.pending_pos = 0;

        let mut info = TransportInfo::new(format!(
            "Synthetic {} channel(s), {}",
            self.channel_count(),
            self.config.encoding.mode
        ))
        .with_channel_count(self.channel_count());
        if self.config.frame_rate_hz > 0.0 {
            info = info.with_sample_rate(self.config.frame_rate_hz);
        }
        Ok(info)
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.open {
            return Err(StreamError::Transport("synthetic transport is closed".to_string()));
        }

        if self.pending_pos >= self.pending.len() {
            if self.is_exhausted() {
                return Ok(0);
            }
            if self.should_fail() {
                // Keep failure cadence comparable to a real timeout
                self.pace();
                return Err(StreamError::Transport("injected read failure".to_string()));
            }
            self.pace();
            self.generate_chunk();
            self.chunks_delivered += 1;
        }

        let available = &self.pending[self.pending_pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pending_pos += n;
        Ok(n)
    }

    fn close(&mut self) {
        self.open = false;
        self.started = None;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn is_exhausted(&self) -> bool {
        self.pending_pos >= self.pending.len()
            && self
                .config
                .max_frames
                .is_some_and(|max| self.frame_index >= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{FrameParser, NumericFormat};

    fn drain(transport: &mut SyntheticTransport) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 64];
        while !transport.is_exhausted() {
            let n = transport.read_chunk(&mut buf).unwrap();
            out.extend_from_slice(&buf[..n]);
        }
        out
    }

    #[test]
    fn test_counter_pattern() {
        let p = SignalPattern::Counter {
            step: 1.0,
            min: 0.0,
            max: 5.0,
        };
        let values: Vec<f64> = (0..7).map(|i| p.value_at(i, 0.0)).collect();
        assert_eq!(values, vec![0.0, 1.0, 2.0, 3.0, 4.0, 0.0, 1.0]);
    }

    #[test]
    fn test_square_and_triangle() {
        let square = SignalPattern::Square {
            period: 1.0,
            amplitude: 2.0,
        };
        assert_eq!(square.value_at(0, 0.25), 2.0);
        assert_eq!(square.value_at(0, 0.75), -2.0);

        let triangle = SignalPattern::Triangle {
            period: 2.0,
            amplitude: 1.0,
        };
        assert_eq!(triangle.value_at(0, 0.0), -1.0);
        assert_eq!(triangle.value_at(0, 1.0), 1.0);
    }

    #[test]
    fn test_generates_decodable_frames() {
        let encoding = ParserConfig::framed_binary(2, NumericFormat::Int16, vec![0xAA, 0x55]);
        let config = SyntheticConfig::new(encoding.clone(), 0.0)
            .with_patterns(vec![
                SignalPattern::Counter {
                    step: 1.0,
                    min: 0.0,
                    max: 1000.0,
                },
                SignalPattern::Constant(-7.0),
            ])
            .with_frames_per_chunk(10)
            .with_max_frames(25);

        let mut transport = SyntheticTransport::new(config);
        let info = transport.open().unwrap();
        assert_eq!(info.channel_count, Some(2));

        let raw = drain(&mut transport);
        let chunk = FrameParser::new(encoding).unwrap().decode(&raw);

        assert_eq!(chunk.frame_count(), 25);
        let expected: Vec<f64> = (0..25).map(|i| i as f64).collect();
        assert_eq!(chunk.channel_data[0], expected);
        assert!(chunk.channel_data[1].iter().all(|&v| v == -7.0));
        assert_eq!(transport.read_chunk(&mut [0u8; 8]).unwrap(), 0);
    }

    #[test]
    fn test_failure_plan() {
        let config = SyntheticConfig::new(ParserConfig::ascii(1, ',', '\n'), 0.0)
            .with_frames_per_chunk(1)
            .with_failure(FailurePlan {
                after_chunks: 2,
                failures: Some(2),
            });

        let mut transport = SyntheticTransport::new(config);
        transport.open().unwrap();

        let mut buf = [0u8; 256];
        assert!(transport.read_chunk(&mut buf).is_ok());
        assert!(transport.read_chunk(&mut buf).is_ok());
        assert!(transport.read_chunk(&mut buf).is_err());
        assert!(transport.read_chunk(&mut buf).is_err());
        assert!(transport.read_chunk(&mut buf).is_ok());
    }

    #[test]
    fn test_closed_read_fails() {
        let config = SyntheticConfig::new(ParserConfig::ascii(1, ',', '\n'), 0.0);
        let mut transport = SyntheticTransport::new(config);
        assert!(transport.read_chunk(&mut [0u8; 4]).is_err());
    }

    #[test]
    fn test_pacing() {
        let config = SyntheticConfig::new(ParserConfig::fixed_binary(1, NumericFormat::Int16), 1000.0)
            .with_frames_per_chunk(50);
        let mut transport = SyntheticTransport::new(config);
        transport.open().unwrap();

        let start = Instant::now();
        let mut buf = [0u8; 1024];
        for _ in 0..4 {
            transport.read_chunk(&mut buf).unwrap();
        }
        // 200 frames at 1 kHz
        assert!(start.elapsed() >= Duration::from_millis(190));
    }
}
