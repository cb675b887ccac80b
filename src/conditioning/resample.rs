//! Resampling capability
//!
//! The engine can pass each channel's conditioned samples through a
//! [`Resampler`] before they are stored. [`Decimator`] is the bundled
//! implementation; anything fancier plugs in through the trait.

use serde::{Deserialize, Serialize};

/// Per-channel sample-rate conversion stage
pub trait Resampler: Send {
    /// Prepare state for `channel_count` channels
    fn initialize(&mut self, channel_count: usize);

    /// Convert one channel's block of samples
    fn process(&mut self, channel: usize, samples: &[f64]) -> Vec<f64>;

    /// Drop all per-channel state
    fn reset(&mut self);

    /// Output rate for a given input rate
    fn output_rate(&self, input_rate_hz: f64) -> f64;
}

/// Resampler selection in the engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ResamplerConfig {
    /// Keep every `factor`-th sample
    Decimate { factor: usize },
}

impl ResamplerConfig {
    /// Build the configured resampler
    pub fn build(&self) -> Box<dyn Resampler> {
        match *self {
            ResamplerConfig::Decimate { factor } => Box::new(Decimator::new(factor)),
        }
    }
}

/// Keeps one sample out of every `factor`, tracking phase across blocks
#[derive(Debug, Clone)]
pub struct Decimator {
    factor: usize,
    /// Samples to skip before the next kept sample, per channel
    phase: Vec<usize>,
}

impl Decimator {
    /// Decimate by `factor` (at least 1)
    pub fn new(factor: usize) -> Self {
        Self {
            factor: factor.max(1),
            phase: Vec::new(),
        }
    }

    /// Decimation factor
    pub fn factor(&self) -> usize {
        self.factor
    }
}

impl Resampler for Decimator {
    fn initialize(&mut self, channel_count: usize) {
        self.phase = vec![0; channel_count];
    }

    fn process(&mut self, channel: usize, samples: &[f64]) -> Vec<f64> {
        if channel >= self.phase.len() {
            self.phase.resize(channel + 1, 0);
        }

        let skip = self.phase[channel];
        let out: Vec<f64> = samples
            .iter()
            .skip(skip)
            .step_by(self.factor)
            .copied()
            .collect();

        // Carry the phase so the next block continues the same stride
        let consumed_after_first = samples.len().saturating_sub(skip);
        self.phase[channel] = if samples.len() <= skip {
            skip - samples.len()
        } else {
            (self.factor - consumed_after_first % self.factor) % self.factor
        };

        out
    }

    fn reset(&mut self) {
        self.phase.iter_mut().for_each(|p| *p = 0);
    }

    fn output_rate(&self, input_rate_hz: f64) -> f64 {
        input_rate_hz / self.factor as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimate_across_blocks() {
        let mut d = Decimator::new(3);
        d.initialize(1);

        let input: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let mut out = Vec::new();
        for block in input.chunks(4) {
            out.extend(d.process(0, block));
        }

        assert_eq!(out, vec![0.0, 3.0, 6.0, 9.0]);
    }

    #[test]
    fn test_decimate_short_blocks() {
        let mut d = Decimator::new(4);
        d.initialize(2);

        let mut out = Vec::new();
        for i in 0..9 {
            out.extend(d.process(1, &[i as f64]));
        }
        assert_eq!(out, vec![0.0, 4.0, 8.0]);
    }

    #[test]
    fn test_reset_restarts_phase() {
        let mut d = Decimator::new(2);
        d.initialize(1);
        assert_eq!(d.process(0, &[1.0, 2.0, 3.0]), vec![1.0, 3.0]);
        d.reset();
        assert_eq!(d.process(0, &[4.0, 5.0]), vec![4.0]);
    }

    #[test]
    fn test_output_rate() {
        let d = ResamplerConfig::Decimate { factor: 4 }.build();
        assert_eq!(d.output_rate(1000.0), 250.0);
    }
}
