//! State shared between the engine, its ingestion thread and consumers

use super::events::EventBus;
use crate::conditioning::{ChannelConditioner, ChannelSettings, Resampler};
use crate::error::{Result, StreamError};
use crate::parser::FrameParser;
use crate::ring_buffer::RingBuffer;
use crate::types::{EngineEvent, EngineState, StreamStatistics};
use crossbeam_channel::Receiver;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Everything allocated by one successful connect
pub(crate) struct Session {
    pub(crate) buffers: Vec<Mutex<RingBuffer<f64>>>,
    pub(crate) conditioner: ChannelConditioner,
    pub(crate) resampler: Mutex<Option<Box<dyn Resampler>>>,
    pub(crate) parser: FrameParser,
    pub(crate) sample_rate_hz: f64,
}

impl Session {
    pub(crate) fn channel_count(&self) -> usize {
        self.buffers.len()
    }

    pub(crate) fn reset_resampler(&self) {
        if let Some(resampler) = self
            .resampler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            resampler.reset();
            resampler.initialize(self.buffers.len());
        }
    }

    fn clear_buffers(&self) {
        for buffer in &self.buffers {
            buffer.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }
}

/// Ingestion counters, written by the ingestion thread
#[derive(Default)]
pub(crate) struct Counters {
    pub(crate) total_samples: AtomicU64,
    pub(crate) total_bits: AtomicU64,
    pub(crate) chunks_read: AtomicU64,
    pub(crate) read_errors: AtomicU64,
    pub(crate) residue_overflows: AtomicU64,
}

impl Counters {
    pub(crate) fn reset(&self) {
        self.total_samples.store(0, Ordering::Relaxed);
        self.total_bits.store(0, Ordering::Relaxed);
        self.chunks_read.store(0, Ordering::Relaxed);
        self.read_errors.store(0, Ordering::Relaxed);
        self.residue_overflows.store(0, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

pub(crate) struct Shared {
    session: RwLock<Option<Arc<Session>>>,
    state: Mutex<EngineState>,
    status: Mutex<String>,
    pub(crate) counters: Counters,
    pub(crate) events: EventBus,
    buffer_capacity: AtomicUsize,
}

impl Shared {
    pub(crate) fn new(buffer_capacity: usize, event_queue_size: usize) -> Self {
        Self {
            session: RwLock::new(None),
            state: Mutex::new(EngineState::Disconnected),
            status: Mutex::new("Disconnected".to_string()),
            counters: Counters::default(),
            events: EventBus::new(event_queue_size),
            buffer_capacity: AtomicUsize::new(buffer_capacity),
        }
    }

    pub(crate) fn session(&self) -> Option<Arc<Session>> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn install_session(&self, session: Option<Arc<Session>>) {
        *self
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner) = session;
    }

    pub(crate) fn buffer_capacity(&self) -> usize {
        self.buffer_capacity.load(Ordering::Relaxed)
    }

    pub(crate) fn state(&self) -> EngineState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_state(&self, state: EngineState) {
        let previous = {
            let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *current, state)
        };
        if previous != state {
            tracing::info!("Engine state: {} -> {}", previous, state);
            self.events.publish(EngineEvent::StateChanged(state));
        }
    }

    /// Move to `to` only if currently in `from`
    pub(crate) fn transition(&self, from: EngineState, to: EngineState) -> bool {
        {
            let mut current = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *current != from {
                return false;
            }
            *current = to;
        }
        tracing::info!("Engine state: {} -> {}", from, to);
        self.events.publish(EngineEvent::StateChanged(to));
        true
    }

    pub(crate) fn status(&self) -> String {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_status(&self, status: impl Into<String>) {
        let status = status.into();
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status.clone();
        self.events.publish(EngineEvent::Status(status));
    }
}

/// Thread-safe view of a [`StreamEngine`](super::StreamEngine)
///
/// Cheap to clone. Renderers, recorders and settings panels each hold their
/// own handle and call into it on their own cadence; nothing here waits on the
/// ingestion thread for longer than one channel's append.
#[derive(Clone)]
pub struct StreamHandle {
    pub(crate) shared: Arc<Shared>,
}

impl StreamHandle {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Current lifecycle state
    pub fn state(&self) -> EngineState {
        self.shared.state()
    }

    /// Human-readable status (last transition, failure reason, ...)
    pub fn status(&self) -> String {
        self.shared.status()
    }

    /// Whether buffers are allocated (Connected or Streaming)
    pub fn is_connected(&self) -> bool {
        self.shared.state().has_session()
    }

    /// Whether the ingestion thread is running
    pub fn is_streaming(&self) -> bool {
        self.shared.state() == EngineState::Streaming
    }

    /// Channels of the current session (0 when not connected)
    pub fn channel_count(&self) -> usize {
        self.shared.session().map_or(0, |s| s.channel_count())
    }

    /// Frame rate of the stored samples in Hz (0 when unknown)
    pub fn sample_rate(&self) -> f64 {
        self.shared.session().map_or(0.0, |s| s.sample_rate_hz)
    }

    /// Samples kept per channel
    pub fn buffer_capacity(&self) -> usize {
        self.shared.buffer_capacity()
    }

    /// Frames appended per channel since the last reset
    pub fn total_samples(&self) -> u64 {
        self.shared.counters.total_samples.load(Ordering::Relaxed)
    }

    /// Raw bits read since the last reset
    pub fn total_bits(&self) -> u64 {
        self.shared.counters.total_bits.load(Ordering::Relaxed)
    }

    /// Snapshot of all counters
    pub fn statistics(&self) -> StreamStatistics {
        let c = &self.shared.counters;
        StreamStatistics {
            total_samples: c.total_samples.load(Ordering::Relaxed),
            total_bits: c.total_bits.load(Ordering::Relaxed),
            chunks_read: c.chunks_read.load(Ordering::Relaxed),
            read_errors: c.read_errors.load(Ordering::Relaxed),
            residue_overflows: c.residue_overflows.load(Ordering::Relaxed),
            dropped_events: self.shared.events.dropped(),
        }
    }

    /// Copy up to `requested` of the newest samples of `channel` into `dest`
    ///
    /// Samples land oldest-first in `dest[..n]`. Returns `n`; zero when not
    /// connected, for an unknown channel, or when nothing was stored yet.
    pub fn copy_latest(&self, channel: usize, dest: &mut [f64], requested: usize) -> usize {
        let Some(session) = self.shared.session() else {
            return 0;
        };
        let Some(buffer) = session.buffers.get(channel) else {
            return 0;
        };
        let copied = buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .copy_latest(dest, requested);
        copied
    }

    /// Copy samples of `channel` by sequence number, starting at `seq`
    ///
    /// See [`RingBuffer::copy_since`]. Sequence numbers count every sample
    /// ever stored on the channel during this connection, so a slow poller
    /// gets an exact window plus the number of samples it missed. Returns
    /// `(0, seq)` when not connected or for an unknown channel.
    pub fn copy_since(&self, channel: usize, seq: u64, dest: &mut [f64]) -> (usize, u64) {
        let Some(session) = self.shared.session() else {
            return (0, seq);
        };
        let Some(buffer) = session.buffers.get(channel) else {
            return (0, seq);
        };
        let window = buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .copy_since(seq, dest);
        window
    }

    /// Sequence number the next sample of `channel` will get
    pub fn sequence(&self, channel: usize) -> u64 {
        let Some(session) = self.shared.session() else {
            return 0;
        };
        let Some(buffer) = session.buffers.get(channel) else {
            return 0;
        };
        let next = buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .appended();
        next
    }

    /// Replace one channel's conditioning settings
    ///
    /// Returns `false` when not connected or the channel does not exist.
    pub fn set_channel_settings(&self, channel: usize, settings: ChannelSettings) -> bool {
        self.shared
            .session()
            .is_some_and(|s| s.conditioner.set_channel_settings(channel, settings))
    }

    /// Current settings of one channel
    pub fn channel_settings(&self, channel: usize) -> Option<ChannelSettings> {
        self.shared
            .session()
            .and_then(|s| s.conditioner.channel_settings(channel))
    }

    /// Reset every bound filter
    pub fn reset_all_filters(&self) {
        if let Some(session) = self.shared.session() {
            session.conditioner.reset_all_filters();
        }
    }

    /// Reallocate every channel buffer with `capacity` slots
    ///
    /// Stored samples and statistics are discarded. Safe while streaming. The
    /// capacity also applies to the next connect.
    pub fn resize_buffers(&self, capacity: usize) -> Result<()> {
        if capacity == 0 {
            return Err(StreamError::InvalidCapacity);
        }

        self.shared.buffer_capacity.store(capacity, Ordering::Relaxed);

        if let Some(session) = self.shared.session() {
            for buffer in &session.buffers {
                buffer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .reallocate(capacity)?;
            }
            tracing::debug!(
                "Resized {} channel buffers to {} samples",
                session.channel_count(),
                capacity
            );
        }

        self.shared.counters.reset();
        Ok(())
    }

    /// Clear buffers, statistics, filters and resampler state
    pub fn clear_data(&self) {
        if let Some(session) = self.shared.session() {
            session.clear_buffers();
            session.conditioner.reset_all_filters();
            session.reset_resampler();
        }
        self.shared.counters.reset();
    }

    /// Receive engine events on a bounded queue
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        self.shared.events.subscribe()
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("state", &self.state())
            .field("channels", &self.channel_count())
            .field("total_samples", &self.total_samples())
            .finish()
    }
}
