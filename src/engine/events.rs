//! Event fan-out to engine subscribers
//!
//! Each subscriber gets its own bounded queue. Publishing never blocks: a full
//! queue drops the event and bumps a counter, and queues whose receiver was
//! dropped are pruned on the next publish.

use crate::types::EngineEvent;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

pub(crate) struct EventBus {
    subscribers: Mutex<Vec<Sender<EngineEvent>>>,
    queue_size: usize,
    dropped: AtomicU64,
}

impl EventBus {
    pub(crate) fn new(queue_size: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            queue_size: queue_size.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Register a new subscriber
    pub(crate) fn subscribe(&self) -> Receiver<EngineEvent> {
        let (tx, rx) = bounded(self.queue_size);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber without blocking
    pub(crate) fn publish(&self, event: EngineEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    /// Events dropped on full queues
    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
