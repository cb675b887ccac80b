//! Ingestion thread
//!
//! One worker runs per streaming engine. It owns the transport while
//! streaming and hands it back over the acknowledgment channel when it exits,
//! whether it was cancelled, the stream ended, or it faulted.
//!
//! Per read:
//!
//! ```text
//! read_chunk -> prepend carry -> decode -> condition -> resample -> append
//! ```
//!
//! The worker blocks only inside `read_chunk` and in the short waits after a
//! failed or empty read; a stop request cuts those waits short. Buffer and settings locks are taken one channel at a time and
//! never across a read.

use super::handle::{Counters, Session, Shared};
use crate::config::EngineConfig;
use crate::parser::ParsedChunk;
use crate::transport::Transport;
use crate::types::{EngineEvent, EngineState};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

/// Name of the ingestion thread
pub const THREAD_NAME: &str = "sigstream-ingest";

/// Wait after a read that returned nothing
const IDLE_WAIT: Duration = Duration::from_millis(1);

/// Loop tuning taken from [`EngineConfig`]
#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkerSettings {
    pub(crate) read_chunk_size: usize,
    pub(crate) error_backoff: Duration,
    pub(crate) max_consecutive_errors: u32,
    pub(crate) max_residue_bytes: usize,
}

impl From<&EngineConfig> for WorkerSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            read_chunk_size: config.read_chunk_size.max(1),
            error_backoff: config.error_backoff(),
            max_consecutive_errors: config.max_consecutive_errors.max(1),
            max_residue_bytes: config.max_residue_bytes,
        }
    }
}

/// Why the loop stopped
#[derive(Debug)]
enum Exit {
    Cancelled,
    EndOfStream,
    Faulted(String),
}

/// Engine-side handle on a running worker
pub(crate) struct WorkerHandle {
    cancel: Arc<AtomicBool>,
    wake: Sender<()>,
    ack: Receiver<Box<dyn Transport>>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Ask the worker to exit after its current read
    pub(crate) fn request_stop(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        // Full means a wake-up is already queued
        let _ = self.wake.try_send(());
    }

    /// Wait at most `timeout` for the worker to hand the transport back
    pub(crate) fn wait(
        &self,
        timeout: Duration,
    ) -> std::result::Result<Box<dyn Transport>, RecvTimeoutError> {
        self.ack.recv_timeout(timeout)
    }

    /// Take the transport back if the worker already exited
    pub(crate) fn try_reclaim(&self) -> std::result::Result<Box<dyn Transport>, TryRecvError> {
        self.ack.try_recv()
    }

    /// Join the thread; only call once the acknowledgment arrived
    pub(crate) fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Ingestion thread panicked");
            }
        }
    }
}

pub(crate) struct IngestWorker {
    session: Arc<Session>,
    shared: Arc<Shared>,
    cancel: Arc<AtomicBool>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
    settings: WorkerSettings,
    read_buf: Vec<u8>,
    /// Undecoded bytes carried into the next read
    pending: Vec<u8>,
    consecutive_errors: u32,
}

impl IngestWorker {
    pub(crate) fn new(session: Arc<Session>, shared: Arc<Shared>, settings: WorkerSettings) -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            session,
            shared,
            cancel: Arc::new(AtomicBool::new(false)),
            wake_tx,
            wake_rx,
            read_buf: vec![0; settings.read_chunk_size],
            settings,
            pending: Vec::new(),
            consecutive_errors: 0,
        }
    }

    /// Start the worker thread with `transport`
    ///
    /// The transport is handed over only after the thread exists, so it comes
    /// back in the error when spawning fails.
    pub(crate) fn spawn(
        self,
        transport: Box<dyn Transport>,
    ) -> std::result::Result<WorkerHandle, (Box<dyn Transport>, std::io::Error)> {
        let cancel = Arc::clone(&self.cancel);
        let wake = self.wake_tx.clone();
        let (start_tx, start_rx) = bounded::<Box<dyn Transport>>(1);
        let (ack_tx, ack_rx) = bounded::<Box<dyn Transport>>(1);

        let spawned = std::thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                if let Ok(transport) = start_rx.recv() {
                    self.run(transport, ack_tx);
                }
            });

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => return Err((transport, e)),
        };

        if let Err(returned) = start_tx.send(transport) {
            let _ = thread.join();
            return Err((
                returned.into_inner(),
                std::io::Error::other("ingestion thread exited before start"),
            ));
        }

        Ok(WorkerHandle {
            cancel,
            wake,
            ack: ack_rx,
            thread: Some(thread),
        })
    }

    fn run(mut self, mut transport: Box<dyn Transport>, ack: Sender<Box<dyn Transport>>) {
        tracing::info!("Ingestion started on {}", transport.name());

        let exit = self.ingest_loop(transport.as_mut());
        let name = transport.name().to_string();

        if let Exit::Faulted(_) = exit {
            transport.close();
        }

        // Hand the transport back before anyone can observe the new state,
        // so a caller reacting to it finds the transport already returned.
        // Bounded(1) and only sent once: never blocks.
        let _ = ack.send(transport);

        match exit {
            Exit::Cancelled => {
                tracing::info!("Ingestion stopped on request");
            }
            Exit::EndOfStream => {
                if !self.pending.is_empty() {
                    tracing::debug!(
                        "Discarding {} trailing bytes at end of stream",
                        self.pending.len()
                    );
                }
                tracing::info!("{} reached end of stream", name);
                if self
                    .shared
                    .transition(EngineState::Streaming, EngineState::Connected)
                {
                    self.shared.set_status("Stream ended");
                    self.shared.events.publish(EngineEvent::StreamEnded);
                }
            }
            Exit::Faulted(reason) => {
                tracing::error!("Ingestion faulted: {}", reason);
                if self
                    .shared
                    .transition(EngineState::Streaming, EngineState::Faulted)
                {
                    self.shared.set_status(format!("Faulted: {}", reason));
                    self.shared.events.publish(EngineEvent::Faulted(reason));
                }
            }
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Wait up to `duration`; returns whether a stop was requested meanwhile
    fn pause(&self, duration: Duration) -> bool {
        if self.cancelled() {
            return true;
        }
        match self.wake_rx.recv_timeout(duration) {
            Ok(()) => true,
            Err(_) => self.cancelled(),
        }
    }

    fn ingest_loop(&mut self, transport: &mut dyn Transport) -> Exit {
        loop {
            if self.cancelled() {
                return Exit::Cancelled;
            }

            match transport.read_chunk(&mut self.read_buf) {
                Ok(0) if transport.is_exhausted() => return Exit::EndOfStream,
                Ok(0) => {
                    self.consecutive_errors = 0;
                    if self.pause(IDLE_WAIT) {
                        return Exit::Cancelled;
                    }
                }
                Ok(n) => {
                    self.consecutive_errors = 0;
                    // Nothing is appended after a stop request
                    if self.cancelled() {
                        return Exit::Cancelled;
                    }
                    self.ingest(n);
                }
                // A read cut short by a stop is not a device fault
                Err(_) if self.cancelled() => return Exit::Cancelled,
                Err(e) => {
                    self.consecutive_errors += 1;
                    Counters::add(&self.shared.counters.read_errors, 1);

                    if self.consecutive_errors >= self.settings.max_consecutive_errors {
                        return Exit::Faulted(format!(
                            "{} consecutive read errors, last: {}",
                            self.consecutive_errors, e
                        ));
                    }

                    tracing::warn!(
                        "Read error {}/{} on {}: {}",
                        self.consecutive_errors,
                        self.settings.max_consecutive_errors,
                        transport.name(),
                        e
                    );
                    if self.pause(self.settings.error_backoff) {
                        return Exit::Cancelled;
                    }
                }
            }
        }
    }

    /// Decode, condition and store one read of `n` bytes
    fn ingest(&mut self, n: usize) {
        let session = Arc::clone(&self.session);

        self.pending.extend_from_slice(&self.read_buf[..n]);
        let ParsedChunk {
            channel_data,
            residue,
        } = session.parser.decode(&self.pending);
        self.carry(residue);

        let mut frames = 0;
        for (channel, mut samples) in channel_data.into_iter().enumerate() {
            session.conditioner.apply_slice(channel, &mut samples);

            let samples = match session
                .resampler
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .as_mut()
            {
                Some(resampler) => resampler.process(channel, &samples),
                None => samples,
            };

            if channel == 0 {
                frames = samples.len();
            }
            if let Some(buffer) = session.buffers.get(channel) {
                buffer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .append_slice(&samples);
            }
        }

        let counters = &self.shared.counters;
        Counters::add(&counters.total_samples, frames as u64);
        Counters::add(&counters.total_bits, n as u64 * 8);
        Counters::add(&counters.chunks_read, 1);

        tracing::trace!(
            "Read {} bytes, stored {} frames, carrying {} bytes",
            n,
            frames,
            self.pending.len()
        );
    }

    /// Keep the undecoded tail for the next read, bounded by `max_residue_bytes`
    fn carry(&mut self, residue: Option<Vec<u8>>) {
        match residue {
            Some(rest) => {
                self.pending.clear();
                self.pending.extend_from_slice(&rest);
            }
            None => {
                let keep = self.session.parser.fixed_remainder(self.pending.len());
                let consumed = self.pending.len() - keep;
                self.pending.drain(..consumed);
            }
        }

        if self.pending.len() > self.settings.max_residue_bytes {
            let carried = self.pending.len();
            let cut = self
                .session
                .parser
                .resync_offset(&self.pending)
                .min(carried);
            self.pending.drain(..cut);
            Counters::add(&self.shared.counters.residue_overflows, 1);
            tracing::warn!(
                "Carry-over of {} bytes exceeded {} bytes; discarded {} bytes to resynchronize",
                carried,
                self.settings.max_residue_bytes,
                cut
            );
        }
    }
}
