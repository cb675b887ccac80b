//! Digital filter capability
//!
//! Filter design is not this crate's business; the conditioner only needs a
//! stateful `sample -> sample` transform it can reset. Two small filters are
//! bundled for demos and tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A stateful per-sample filter
#[cfg_attr(test, mockall::automock)]
pub trait SampleFilter: Send {
    /// Filter one sample
    fn filter(&mut self, sample: f64) -> f64;

    /// Drop all internal state
    fn reset(&mut self);
}

/// Filter shared between the settings owner and the conditioner
///
/// Identity (which filter is bound to a channel) is the allocation this `Arc`
/// points to.
pub type SharedFilter = Arc<Mutex<dyn SampleFilter>>;

/// Wrap a filter for binding to a channel
pub fn shared_filter<F: SampleFilter + 'static>(filter: F) -> SharedFilter {
    Arc::new(Mutex::new(filter))
}

/// Whether two optional filter bindings refer to the same filter
pub fn same_filter(a: &Option<SharedFilter>, b: &Option<SharedFilter>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
        (None, None) => true,
        _ => false,
    }
}

/// Boxcar average over the last `window` samples
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: usize,
    history: VecDeque<f64>,
    sum: f64,
}

impl MovingAverage {
    /// Average over `window` samples (at least 1)
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            history: VecDeque::with_capacity(window),
            sum: 0.0,
        }
    }
}

impl SampleFilter for MovingAverage {
    fn filter(&mut self, sample: f64) -> f64 {
        if self.history.len() == self.window {
            if let Some(old) = self.history.pop_front() {
                self.sum -= old;
            }
        }
        self.history.push_back(sample);
        self.sum += sample;
        self.sum / self.history.len() as f64
    }

    fn reset(&mut self) {
        self.history.clear();
        self.sum = 0.0;
    }
}

/// Single-pole IIR low-pass: `y += alpha * (x - y)`
#[derive(Debug, Clone)]
pub struct OnePoleLowPass {
    alpha: f64,
    state: Option<f64>,
}

impl OnePoleLowPass {
    /// Smoothing factor in `(0, 1]`; 1 passes input through
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(f64::EPSILON, 1.0),
            state: None,
        }
    }

    /// Derive alpha from a cutoff frequency and sample rate
    pub fn with_cutoff(cutoff_hz: f64, sample_rate_hz: f64) -> Self {
        let dt = 1.0 / sample_rate_hz;
        let rc = 1.0 / (2.0 * std::f64::consts::PI * cutoff_hz);
        Self::new(dt / (rc + dt))
    }
}

impl SampleFilter for OnePoleLowPass {
    fn filter(&mut self, sample: f64) -> f64 {
        let y = match self.state {
            Some(prev) => prev + self.alpha * (sample - prev),
            // Seed with the first sample to avoid a startup ramp
            None => sample,
        };
        self.state = Some(y);
        y
    }

    fn reset(&mut self) {
        self.state = None;
    }
}
