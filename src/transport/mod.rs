//! Transport capability: where raw bytes come from
//!
//! The engine does not know about serial ports, audio capture or USB pipes.
//! Everything device-specific sits behind the [`Transport`] trait, and a
//! transport only has to deliver raw bytes. Buffering, decoding, conditioning
//! and locking are shared by all of them.
//!
//! # Implementations
//!
//! - [`FileReplayTransport`] - replays a capture file, optionally paced and looped
//! - [`SyntheticTransport`] - generates waveforms in any wire format, with
//!   failure injection for testing the fault path
//!
//! Hardware transports implement the same trait outside this crate.
//!
//! # Read contract
//!
//! [`Transport::read_chunk`] may block, but only for a bounded time (the
//! transport's own read timeout), so the ingestion loop gets to check its stop
//! flag between calls. Returning `Ok(0)` means "nothing yet"; combined with
//! [`Transport::is_exhausted`] it means end of stream.

pub mod file;
pub mod synthetic;

pub use file::FileReplayTransport;
pub use synthetic::{FailurePlan, SignalPattern, SyntheticConfig, SyntheticTransport};

use crate::error::Result;

/// What a transport reports once it is open
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransportInfo {
    /// Channels per frame, if the device knows it
    pub channel_count: Option<usize>,
    /// Frame rate in Hz, if the device knows it
    pub sample_rate_hz: Option<f64>,
    /// Human-readable description for status displays
    pub description: String,
}

impl TransportInfo {
    /// Info with a description only
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    /// Set the channel count
    pub fn with_channel_count(mut self, channel_count: usize) -> Self {
        self.channel_count = Some(channel_count);
        self
    }

    /// Set the sample rate
    pub fn with_sample_rate(mut self, sample_rate_hz: f64) -> Self {
        self.sample_rate_hz = Some(sample_rate_hz);
        self
    }
}

/// Raw byte source for the streaming engine
///
/// Implementations must be `Send`: the transport moves into the ingestion
/// thread while streaming and comes back when streaming stops.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send {
    /// Short name for logs and status
    fn name(&self) -> &str;

    /// Acquire the device
    ///
    /// Absent devices should map to [`StreamError::NotFound`](crate::StreamError::NotFound),
    /// permission problems to [`StreamError::AccessDenied`](crate::StreamError::AccessDenied).
    fn open(&mut self) -> Result<TransportInfo>;

    /// Read raw bytes into `buf`, blocking for a bounded time
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Release the device
    fn close(&mut self);

    /// Whether the device is currently held
    fn is_open(&self) -> bool;

    /// Whether the source has no more data (file replay end, finite generator)
    fn is_exhausted(&self) -> bool {
        false
    }
}
