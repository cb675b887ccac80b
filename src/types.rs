//! Core data types shared between the engine and its consumers

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifecycle state of a [`StreamEngine`](crate::engine::StreamEngine)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EngineState {
    /// No transport held, no buffers allocated
    #[default]
    Disconnected,
    /// Transport open, buffers allocated, not ingesting
    Connected,
    /// Ingestion thread running
    Streaming,
    /// Ingestion stopped after repeated read errors; transport closed
    Faulted,
}

impl EngineState {
    /// Whether buffers are allocated and readable
    pub fn has_session(&self) -> bool {
        matches!(self, EngineState::Connected | EngineState::Streaming)
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Disconnected => write!(f, "Disconnected"),
            EngineState::Connected => write!(f, "Connected"),
            EngineState::Streaming => write!(f, "Streaming"),
            EngineState::Faulted => write!(f, "Faulted"),
        }
    }
}

/// Snapshot of the engine's ingestion counters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StreamStatistics {
    /// Frames appended per channel since the last reset
    pub total_samples: u64,
    /// Raw bits read from the transport since the last reset
    pub total_bits: u64,
    /// Successful non-empty reads
    pub chunks_read: u64,
    /// Failed reads (transient or fatal)
    pub read_errors: u64,
    /// Times the carry-over exceeded its bound and was resynchronized
    pub residue_overflows: u64,
    /// Events dropped because a subscriber queue was full
    pub dropped_events: u64,
}

impl StreamStatistics {
    /// Average frame rate over `elapsed`
    pub fn sample_rate(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_samples as f64 / secs
        } else {
            0.0
        }
    }

    /// Average raw throughput in bits per second over `elapsed`
    pub fn bit_rate(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_bits as f64 / secs
        } else {
            0.0
        }
    }
}

/// Notification published to engine subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The lifecycle state changed
    StateChanged(EngineState),
    /// The status string changed
    Status(String),
    /// Ingestion stopped after repeated read errors
    Faulted(String),
    /// The transport reported end of stream; the engine is Connected again
    StreamEnded,
}
