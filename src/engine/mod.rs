//! Streaming engine: lifecycle, ingestion thread and consumer surface
//!
//! A [`StreamEngine`] owns one [`Transport`] and drives it through:
//!
//! ```text
//! Disconnected --connect--> Connected --start_streaming--> Streaming
//!      ^                      |  ^                          |  |
//!      +------disconnect------+  +-------stop_streaming-----+  |
//!      |                         +-------end of stream---------+
//!      +--connect-- Faulted <--------repeated read errors------+
//! ```
//!
//! # Threads
//!
//! - The owning thread calls the lifecycle methods (`&mut self`).
//! - One ingestion thread ([`worker::THREAD_NAME`]) reads, decodes, conditions
//!   and stores samples while streaming.
//! - Any number of consumers hold a [`StreamHandle`] and read samples, tweak
//!   channel settings or resize buffers concurrently.
//!
//! Lifecycle calls never return errors. Failures land in [`state`](StreamEngine::state),
//! the [`status`](StreamEngine::status) string and the event stream from
//! [`subscribe`](StreamEngine::subscribe).
//!
//! # Example
//!
//! ```no_run
//! use sigstream_rs::config::EngineConfig;
//! use sigstream_rs::engine::StreamEngine;
//! use sigstream_rs::parser::{NumericFormat, ParserConfig};
//! use sigstream_rs::transport::{SyntheticConfig, SyntheticTransport};
//!
//! let encoding = ParserConfig::fixed_binary(2, NumericFormat::Int16);
//! let transport = SyntheticTransport::new(SyntheticConfig::new(encoding.clone(), 1000.0));
//! let mut engine = StreamEngine::new(EngineConfig::with_parser(encoding), Box::new(transport))?;
//!
//! engine.connect();
//! engine.start_streaming();
//!
//! let handle = engine.handle();
//! let mut latest = vec![0.0; 256];
//! let n = handle.copy_latest(0, &mut latest, 256);
//! println!("{} samples: {:?}", n, &latest[..n]);
//!
//! engine.disconnect();
//! # Ok::<(), sigstream_rs::StreamError>(())
//! ```

mod events;
mod handle;
pub mod worker;

pub use handle::StreamHandle;

use crate::conditioning::ChannelSettings;
use crate::config::EngineConfig;
use crate::error::{Result, ResultExt, StreamError};
use crate::parser::FrameParser;
use crate::ring_buffer::RingBuffer;
use crate::transport::{Transport, TransportInfo};
use crate::types::{EngineEvent, EngineState, StreamStatistics};
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use handle::{Session, Shared};
use std::sync::{Arc, Mutex};
use worker::{IngestWorker, WorkerHandle, WorkerSettings};

/// Multi-channel streaming engine over one transport
pub struct StreamEngine {
    config: EngineConfig,
    handle: StreamHandle,
    /// None while the ingestion thread holds it
    transport: Option<Box<dyn Transport>>,
    worker: Option<WorkerHandle>,
}

impl StreamEngine {
    /// Validate `config` and create a disconnected engine over `transport`
    pub fn new(config: EngineConfig, transport: Box<dyn Transport>) -> Result<Self> {
        config.validate().context("Invalid engine configuration")?;

        let shared = Arc::new(Shared::new(config.buffer_capacity, config.event_queue_size));
        Ok(Self {
            config,
            handle: StreamHandle::new(shared),
            transport: Some(transport),
            worker: None,
        })
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Cloneable thread-safe handle for consumers
    pub fn handle(&self) -> StreamHandle {
        self.handle.clone()
    }

    /// Receive lifecycle events on a bounded queue
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        self.handle.subscribe()
    }

    fn shared(&self) -> &Shared {
        &self.handle.shared
    }

    // ==================== Lifecycle ====================

    /// Open the transport and allocate per-channel buffers and settings
    ///
    /// Allowed from Disconnected and Faulted. Returns whether the engine is
    /// connected afterwards; on failure the reason is in [`status`](Self::status).
    pub fn connect(&mut self) -> bool {
        self.reclaim_worker();

        let state = self.shared().state();
        if state.has_session() {
            return true;
        }

        let capacity = self.shared().buffer_capacity();
        let Some(transport) = self.transport.as_mut() else {
            self.fail_connect("Cannot connect: ingestion thread has not released the transport");
            return false;
        };

        let name = transport.name().to_string();
        tracing::info!("Connecting to {}", name);

        let info = match transport.open() {
            Ok(info) => info,
            Err(e) => {
                self.fail_connect(&format!("Failed to connect to {}: {}", name, e));
                return false;
            }
        };

        let session = match build_session(&self.config, capacity, &info) {
            Ok(session) => session,
            Err(e) => {
                transport.close();
                self.fail_connect(&format!("Failed to connect to {}: {}", name, e));
                return false;
            }
        };

        let channels = session.channel_count();
        self.shared().counters.reset();
        self.shared().install_session(Some(Arc::new(session)));
        self.shared().set_state(EngineState::Connected);
        self.shared().set_status(format!(
            "Connected: {} ({} channels)",
            info.description, channels
        ));
        true
    }

    fn fail_connect(&self, reason: &str) {
        tracing::warn!("{}", reason);
        self.shared().install_session(None);
        self.shared().set_state(EngineState::Disconnected);
        self.shared().set_status(reason);
    }

    /// Spawn the ingestion thread
    ///
    /// No-op unless Connected. Filters and resampler state are reset first so
    /// a new run does not inherit history from the previous one.
    pub fn start_streaming(&mut self) -> bool {
        self.reclaim_worker();

        if self.shared().state() != EngineState::Connected {
            tracing::debug!("start_streaming ignored in state {}", self.shared().state());
            return false;
        }
        let Some(session) = self.shared().session() else {
            return false;
        };
        let Some(transport) = self.transport.take() else {
            self.shared()
                .set_status("Cannot start: previous ingestion thread is still stopping");
            return false;
        };

        session.conditioner.reset_all_filters();
        session.reset_resampler();

        let worker = IngestWorker::new(
            session,
            Arc::clone(&self.handle.shared),
            WorkerSettings::from(&self.config),
        );

        // The worker's own transitions start from Streaming
        self.shared().set_state(EngineState::Streaming);
        self.shared().set_status("Streaming");

        match worker.spawn(transport) {
            Ok(worker) => {
                self.worker = Some(worker);
                true
            }
            Err((transport, e)) => {
                tracing::error!("Failed to spawn ingestion thread: {}", e);
                self.transport = Some(transport);
                self.shared().set_state(EngineState::Connected);
                self.shared()
                    .set_status(format!("Failed to start streaming: {}", e));
                false
            }
        }
    }

    /// Stop the ingestion thread, waiting at most `stop_timeout`
    ///
    /// The transport stays open. When the thread does not acknowledge in time
    /// the engine still returns to Connected and reclaims the transport once
    /// the thread finishes.
    pub fn stop_streaming(&mut self) {
        let Some(mut worker) = self.worker.take() else {
            return;
        };

        worker.request_stop();
        let timeout = self.config.stop_timeout();
        let outcome = worker.wait(timeout);

        if self
            .shared()
            .transition(EngineState::Streaming, EngineState::Connected)
        {
            self.shared().set_status("Stopped");
        }

        match outcome {
            Ok(transport) => {
                self.transport = Some(transport);
                worker.join();
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!("Ingestion thread did not stop within {:?}", timeout);
                self.shared().set_status(format!(
                    "Ingestion thread did not stop within {:?}",
                    timeout
                ));
                self.worker = Some(worker);
            }
            Err(RecvTimeoutError::Disconnected) => {
                worker.join();
                self.transport_lost();
            }
        }
    }

    /// Stop streaming, close the transport and free all buffers
    pub fn disconnect(&mut self) {
        self.stop_streaming();

        if let Some(transport) = self.transport.as_mut() {
            if transport.is_open() {
                transport.close();
            }
        }

        self.shared().install_session(None);
        self.shared().counters.reset();
        if self.shared().state() != EngineState::Disconnected {
            self.shared().set_state(EngineState::Disconnected);
            self.shared().set_status("Disconnected");
        }
    }

    /// Pick up the transport from a worker that already exited
    fn reclaim_worker(&mut self) {
        let Some(worker) = self.worker.as_mut() else {
            return;
        };

        match worker.try_reclaim() {
            Ok(mut transport) => {
                worker.join();
                self.worker = None;
                // A late acknowledgment after disconnect still closes the device
                if self.shared().state() == EngineState::Disconnected && transport.is_open() {
                    transport.close();
                }
                self.transport = Some(transport);
                tracing::debug!("Reclaimed transport from finished ingestion thread");
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                worker.join();
                self.worker = None;
                self.transport_lost();
            }
        }
    }

    fn transport_lost(&self) {
        tracing::error!("Ingestion thread exited without returning the transport");
        self.shared().set_state(EngineState::Faulted);
        self.shared()
            .set_status("Faulted: ingestion thread exited without returning the transport");
    }

    // ==================== Consumer surface ====================

    /// Current lifecycle state
    pub fn state(&self) -> EngineState {
        self.handle.state()
    }

    /// Human-readable status
    pub fn status(&self) -> String {
        self.handle.status()
    }

    /// Whether buffers are allocated (Connected or Streaming)
    pub fn is_connected(&self) -> bool {
        self.handle.is_connected()
    }

    /// Whether the ingestion thread is running
    pub fn is_streaming(&self) -> bool {
        self.handle.is_streaming()
    }

    /// Channels of the current session (0 when not connected)
    pub fn channel_count(&self) -> usize {
        self.handle.channel_count()
    }

    /// Frame rate of the stored samples in Hz (0 when unknown)
    pub fn sample_rate(&self) -> f64 {
        self.handle.sample_rate()
    }

    /// Frames appended per channel since the last reset
    pub fn total_samples(&self) -> u64 {
        self.handle.total_samples()
    }

    /// Raw bits read since the last reset
    pub fn total_bits(&self) -> u64 {
        self.handle.total_bits()
    }

    /// Snapshot of all counters
    pub fn statistics(&self) -> StreamStatistics {
        self.handle.statistics()
    }

    /// See [`StreamHandle::copy_latest`]
    pub fn copy_latest(&self, channel: usize, dest: &mut [f64], requested: usize) -> usize {
        self.handle.copy_latest(channel, dest, requested)
    }

    /// See [`StreamHandle::set_channel_settings`]
    pub fn set_channel_settings(&self, channel: usize, settings: ChannelSettings) -> bool {
        self.handle.set_channel_settings(channel, settings)
    }

    /// Current settings of one channel
    pub fn channel_settings(&self, channel: usize) -> Option<ChannelSettings> {
        self.handle.channel_settings(channel)
    }

    /// Reset every bound filter
    pub fn reset_all_filters(&self) {
        self.handle.reset_all_filters()
    }

    /// See [`StreamHandle::resize_buffers`]
    pub fn resize_buffers(&self, capacity: usize) -> Result<()> {
        self.handle.resize_buffers(capacity)
    }

    /// Clear buffers, statistics, filters and resampler state
    pub fn clear_data(&self) {
        self.handle.clear_data()
    }
}

impl Drop for StreamEngine {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for StreamEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamEngine")
            .field("state", &self.state())
            .field("transport", &self.transport.as_ref().map(|t| t.name().to_string()))
            .field("worker_running", &self.worker.is_some())
            .finish()
    }
}

/// Allocate buffers, settings slots, parser and resampler for a fresh connection
fn build_session(config: &EngineConfig, capacity: usize, info: &TransportInfo) -> Result<Session> {
    let channel_count = info.channel_count.unwrap_or(config.parser.channel_count);
    let parser = FrameParser::new(config.parser.clone().with_channel_count(channel_count))
        .context("Parser configuration")?;
    // The device may report more channels than the config was validated with
    if config.max_residue_bytes < parser.frame_len() {
        return Err(StreamError::Config(format!(
            "max_residue_bytes ({}) is smaller than one {}-channel frame ({} bytes)",
            config.max_residue_bytes,
            channel_count,
            parser.frame_len()
        )));
    }

    let buffers = (0..channel_count)
        .map(|_| RingBuffer::new(capacity).map(Mutex::new))
        .collect::<Result<Vec<_>>>()?;

    let input_rate = info
        .sample_rate_hz
        .or(config.sample_rate_hz)
        .unwrap_or(0.0);

    let mut resampler = config.resampler.map(|r| r.build());
    let sample_rate_hz = match resampler.as_mut() {
        Some(resampler) => {
            resampler.initialize(channel_count);
            resampler.output_rate(input_rate)
        }
        None => input_rate,
    };

    tracing::debug!(
        "Session: {} channels x {} samples, {} Hz, {}",
        channel_count,
        capacity,
        sample_rate_hz,
        parser.mode()
    );

    Ok(Session {
        buffers,
        conditioner: crate::conditioning::ChannelConditioner::new(channel_count),
        resampler: Mutex::new(resampler),
        parser,
        sample_rate_hz,
    })
}
