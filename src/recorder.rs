//! CSV recorder consuming a running engine
//!
//! The recorder is an ordinary consumer: it polls a [`StreamHandle`] on its
//! own cadence and reads each channel by sequence number
//! ([`StreamHandle::copy_since`]), so every poll picks up exactly where the
//! previous one stopped even while the ingestion thread keeps appending.
//! Rows are written only for frames present on every recorded channel. When
//! it falls more than one buffer capacity behind, the overwritten frames are
//! counted as lost and the sample index skips over them.
//!
//! Output:
//!
//! ```text
//! # sigstream-rs recording started 2024-05-01T12:00:00+02:00
//! # sample_rate_hz=1000
//! sample_index,ch0,ch1
//! 0,1.5,-2
//! 1,1.25,-2
//! ```

use crate::config::RecorderConfig;
use crate::engine::StreamHandle;
use crate::error::{Result, ResultExt, StreamError};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Totals reported when a recording finishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSummary {
    /// Output file
    pub path: PathBuf,
    /// Data rows written
    pub rows_written: u64,
    /// Frames overwritten before they could be recorded
    pub samples_lost: u64,
}

/// Writes new frames from a [`StreamHandle`] to a CSV file
pub struct CsvRecorder {
    handle: StreamHandle,
    config: RecorderConfig,
    writer: BufWriter<File>,
    /// Engine channel indices that get a column
    channels: Vec<usize>,
    /// Sequence number of the next frame to record
    seq: u64,
    next_index: u64,
    rows_written: u64,
    samples_lost: u64,
    rows_since_flush: usize,
    scratch: Vec<Vec<f64>>,
}

impl CsvRecorder {
    /// Create the output file and write the header
    ///
    /// The engine must be connected so the channel layout is known. Only
    /// frames arriving after this call are recorded.
    pub fn create(handle: StreamHandle, config: RecorderConfig) -> Result<Self> {
        if !handle.is_connected() {
            return Err(StreamError::Config(
                "Recorder needs a connected engine".to_string(),
            ));
        }

        let channels: Vec<usize> = (0..handle.channel_count())
            .filter(|&ch| {
                config.include_disabled
                    || handle.channel_settings(ch).map_or(true, |s| s.enabled)
            })
            .collect();

        let file = File::create(&config.path)
            .map_err(StreamError::from)
            .with_context(|| format!("Failed to create recording {:?}", config.path))?;
        let mut writer = BufWriter::new(file);

        writeln!(
            writer,
            "# sigstream-rs recording started {}",
            chrono::Local::now().to_rfc3339()
        )?;
        writeln!(writer, "# sample_rate_hz={}", handle.sample_rate())?;
        write!(writer, "sample_index")?;
        for ch in &channels {
            write!(writer, ",ch{}", ch)?;
        }
        writeln!(writer)?;

        tracing::info!(
            "Recording {} channel(s) to {:?}",
            channels.len(),
            config.path
        );

        let seq = channels
            .iter()
            .map(|&ch| handle.sequence(ch))
            .max()
            .unwrap_or(0);
        Ok(Self {
            scratch: vec![Vec::new(); channels.len()],
            handle,
            config,
            writer,
            channels,
            seq,
            next_index: 0,
            rows_written: 0,
            samples_lost: 0,
            rows_since_flush: 0,
        })
    }

    /// Write every frame that arrived since the last poll; returns rows written
    pub fn poll(&mut self) -> Result<usize> {
        if self.channels.is_empty() {
            return Ok(0);
        }

        let capacity = self.handle.buffer_capacity();
        // (first sequence, count) copied per channel
        let mut windows = Vec::with_capacity(self.channels.len());
        for (slot, &ch) in self.scratch.iter_mut().zip(&self.channels) {
            slot.resize(capacity, 0.0);
            let (n, next) = self.handle.copy_since(ch, self.seq, slot);
            windows.push((next - n as u64, n));
        }

        // Frames present on every channel
        let start = windows.iter().map(|&(first, _)| first).max().unwrap_or(self.seq);
        let end = windows
            .iter()
            .map(|&(first, n)| first + n as u64)
            .min()
            .unwrap_or(self.seq);

        if start < self.seq {
            tracing::debug!("Engine buffers were replaced; recorder resynchronizing");
        } else if start > self.seq {
            let lost = start - self.seq;
            tracing::warn!("Recorder fell behind; {} frames lost", lost);
            self.samples_lost += lost;
            self.next_index += lost;
        }

        let rows = end.saturating_sub(start);
        for seq in start..start + rows {
            write!(self.writer, "{}", self.next_index)?;
            for (column, &(first, _)) in self.scratch.iter().zip(&windows) {
                write!(self.writer, ",{}", column[(seq - first) as usize])?;
            }
            writeln!(self.writer)?;
            self.next_index += 1;
        }

        self.seq = start + rows;
        let rows = rows as usize;
        self.rows_written += rows as u64;
        self.rows_since_flush += rows;
        if self.config.flush_every > 0 && self.rows_since_flush >= self.config.flush_every {
            self.writer.flush()?;
            self.rows_since_flush = 0;
        }

        Ok(rows)
    }

    /// Flush and close the file
    pub fn finish(mut self) -> Result<RecordingSummary> {
        self.writer.flush()?;
        tracing::info!(
            "Recording {:?} finished: {} rows, {} frames lost",
            self.config.path,
            self.rows_written,
            self.samples_lost
        );
        Ok(RecordingSummary {
            path: self.config.path.clone(),
            rows_written: self.rows_written,
            samples_lost: self.samples_lost,
        })
    }

    /// Output file
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Data rows written so far
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Frames lost so far
    pub fn samples_lost(&self) -> u64 {
        self.samples_lost
    }

    /// Engine channels being recorded
    pub fn channels(&self) -> &[usize] {
        &self.channels
    }
}
