//! # sigstream-rs: multi-channel streaming ingestion core
//!
//! Decodes raw transport bytes into per-channel samples, conditions them, and
//! keeps the latest N samples per channel in overwrite-on-full ring buffers.
//! Consumers read "the latest n samples" on their own cadence without ever
//! blocking the producer.
//!
//! ## Architecture
//!
//! - **Transport**: device I/O behind the [`transport::Transport`] trait
//! - **Parser**: fixed binary, framed binary and ASCII wire formats
//! - **Conditioning**: per-channel gain/offset/filter and optional resampling
//! - **Engine**: lifecycle, background ingestion thread, thread-safe handle
//! - **Recorder**: CSV consumer built on the same handle a renderer would use
//!
//! ```text
//! Transport::read_chunk -> FrameParser::decode -> ChannelConditioner::apply
//!     -> Resampler::process -> RingBuffer::append_slice -> copy_latest
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use sigstream_rs::{
//!     config::EngineConfig,
//!     engine::StreamEngine,
//!     parser::ParserConfig,
//!     transport::FileReplayTransport,
//! };
//!
//! let config = EngineConfig::with_parser(ParserConfig::ascii(3, ',', '\n'));
//! let transport = FileReplayTransport::new("capture.txt").with_pacing(115_200 / 10);
//! let mut engine = StreamEngine::new(config, Box::new(transport))?;
//!
//! if engine.connect() {
//!     engine.start_streaming();
//! } else {
//!     eprintln!("{}", engine.status());
//! }
//! # Ok::<(), sigstream_rs::StreamError>(())
//! ```

pub mod conditioning;
pub mod config;
pub mod engine;
pub mod error;
pub mod parser;
pub mod recorder;
pub mod ring_buffer;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use conditioning::{ChannelConditioner, ChannelSettings, SampleFilter};
pub use config::{EngineConfig, RecorderConfig};
pub use engine::{StreamEngine, StreamHandle};
pub use error::{Result, StreamError};
pub use parser::{FrameParser, ParsedChunk, ParserConfig};
pub use recorder::CsvRecorder;
pub use ring_buffer::RingBuffer;
pub use transport::{Transport, TransportInfo};
pub use types::{EngineEvent, EngineState, StreamStatistics};
