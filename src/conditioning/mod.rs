//! Per-channel signal conditioning
//!
//! Every decoded sample passes through [`ChannelConditioner::apply`] before it
//! is stored:
//!
//! ```text
//! processed = gain * (raw + offset)
//! processed = filter(processed)        // only if a filter is bound
//! processed = 0.0 if !processed.is_finite()
//! ```
//!
//! Settings are swapped from the UI thread while the ingestion thread is
//! conditioning live data. Each channel slot has its own `Mutex`, held for one
//! channel's processing step or one settings change, so neither side can
//! stall the other for longer than that.
//!
//! When a settings change binds a different filter, the new filter is reset
//! exactly once before it sees its first sample.

pub mod filter;
pub mod resample;

pub use filter::{same_filter, shared_filter, MovingAverage, OnePoleLowPass, SampleFilter, SharedFilter};
pub use resample::{Decimator, Resampler, ResamplerConfig};

use std::sync::{Mutex, PoisonError};

/// Conditioning parameters for one channel
#[derive(Clone)]
pub struct ChannelSettings {
    /// Multiplier applied after the offset
    pub gain: f64,
    /// Added to the raw sample before the gain
    pub offset: f64,
    /// Optional filter applied after gain/offset
    pub filter: Option<SharedFilter>,
    /// Whether consumers should show/record this channel
    pub enabled: bool,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            gain: 1.0,
            offset: 0.0,
            filter: None,
            enabled: true,
        }
    }
}

impl std::fmt::Debug for ChannelSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSettings")
            .field("gain", &self.gain)
            .field("offset", &self.offset)
            .field("filter", &self.filter.as_ref().map(|_| "<filter>"))
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl ChannelSettings {
    /// Settings with the given gain and offset, no filter
    pub fn new(gain: f64, offset: f64) -> Self {
        Self {
            gain,
            offset,
            ..Default::default()
        }
    }

    /// Set the gain
    pub fn with_gain(mut self, gain: f64) -> Self {
        self.gain = gain;
        self
    }

    /// Set the offset
    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    /// Bind a filter
    pub fn with_filter(mut self, filter: SharedFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Set whether the channel is enabled
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Apply gain/offset/filter to one sample, sanitising non-finite output
    #[inline]
    pub fn condition(&self, raw: f64) -> f64 {
        let mut processed = self.gain * (raw + self.offset);

        if let Some(filter) = &self.filter {
            let mut filter = filter.lock().unwrap_or_else(PoisonError::into_inner);
            processed = filter.filter(processed);
        }

        if processed.is_finite() {
            processed
        } else {
            0.0
        }
    }
}

/// Per-channel settings slots with hot-swap support
pub struct ChannelConditioner {
    slots: Vec<Mutex<ChannelSettings>>,
}

impl ChannelConditioner {
    /// Identity settings for `channel_count` channels
    pub fn new(channel_count: usize) -> Self {
        Self {
            slots: (0..channel_count)
                .map(|_| Mutex::new(ChannelSettings::default()))
                .collect(),
        }
    }

    /// Number of channel slots
    pub fn channel_count(&self) -> usize {
        self.slots.len()
    }

    /// Condition one sample; out-of-range channels pass through sanitised
    pub fn apply(&self, channel: usize, raw: f64) -> f64 {
        match self.slots.get(channel) {
            Some(slot) => slot
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .condition(raw),
            None if raw.is_finite() => raw,
            None => 0.0,
        }
    }

    /// Condition a whole channel block in place under one lock acquisition
    pub fn apply_slice(&self, channel: usize, samples: &mut [f64]) {
        let Some(slot) = self.slots.get(channel) else {
            return;
        };
        let settings = slot.lock().unwrap_or_else(PoisonError::into_inner);
        for sample in samples.iter_mut() {
            *sample = settings.condition(*sample);
        }
    }

    /// Replace the settings of one channel
    ///
    /// A newly bound filter (different identity from the previous one) is
    /// reset once, before the slot is published. Returns `false` when the
    /// channel does not exist.
    pub fn set_channel_settings(&self, channel: usize, settings: ChannelSettings) -> bool {
        let Some(slot) = self.slots.get(channel) else {
            return false;
        };

        let mut current = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if !same_filter(&current.filter, &settings.filter) {
            if let Some(filter) = &settings.filter {
                filter
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .reset();
                tracing::debug!("Channel {} bound a new filter", channel);
            }
        }
        *current = settings;
        true
    }

    /// Snapshot of one channel's settings
    pub fn channel_settings(&self, channel: usize) -> Option<ChannelSettings> {
        self.slots
            .get(channel)
            .map(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    /// Reset every bound filter
    pub fn reset_all_filters(&self) {
        for slot in &self.slots {
            let settings = slot.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(filter) = &settings.filter {
                filter
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .reset();
            }
        }
    }
}

impl std::fmt::Debug for ChannelConditioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelConditioner")
            .field("channels", &self.slots.len())
            .finish()
    }
}
