//! File replay transport
//!
//! Replays a previously captured raw byte stream. Without pacing the file is
//! delivered as fast as the engine reads it; with pacing, reads are throttled
//! to a byte rate so a capture plays back at its original speed.

use crate::error::{Result, StreamError};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::{Transport, TransportInfo};

/// Longest a paced read waits before returning `Ok(0)`
const MAX_PACING_WAIT: Duration = Duration::from_millis(10);

/// Replays a capture file in chunks
#[derive(Debug)]
pub struct FileReplayTransport {
    path: PathBuf,
    name: String,
    reader: Option<BufReader<File>>,
    channel_count: Option<usize>,
    sample_rate_hz: Option<f64>,
    /// Throttle to this many bytes per second (None = unthrottled)
    bytes_per_second: Option<u64>,
    loop_playback: bool,
    exhausted: bool,
    started: Option<Instant>,
    bytes_delivered: u64,
}

impl FileReplayTransport {
    /// Replay `path` unthrottled, once
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = format!("file:{}", path.display());
        Self {
            path,
            name,
            reader: None,
            channel_count: None,
            sample_rate_hz: None,
            bytes_per_second: None,
            loop_playback: false,
            exhausted: false,
            started: None,
            bytes_delivered: 0,
        }
    }

    /// Throttle delivery to `bytes_per_second`
    pub fn with_pacing(mut self, bytes_per_second: u64) -> Self {
        self.bytes_per_second = Some(bytes_per_second.max(1));
        self
    }

    /// Restart from the beginning at end of file
    pub fn with_loop(mut self, loop_playback: bool) -> Self {
        self.loop_playback = loop_playback;
        self
    }

    /// Report this channel count when opened
    pub fn with_channel_count(mut self, channel_count: usize) -> Self {
        self.channel_count = Some(channel_count);
        self
    }

    /// Report this sample rate when opened
    pub fn with_sample_rate(mut self, sample_rate_hz: f64) -> Self {
        self.sample_rate_hz = Some(sample_rate_hz);
        self
    }

    /// Path being replayed
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes the pacing budget allows right now
    fn pacing_budget(&self, want: usize) -> (usize, Duration) {
        let (Some(rate), Some(started)) = (self.bytes_per_second, self.started) else {
            return (want, Duration::ZERO);
        };

        let due = (started.elapsed().as_secs_f64() * rate as f64) as u64;
        let allowed = due.saturating_sub(self.bytes_delivered) as usize;
        if allowed > 0 {
            return (allowed.min(want), Duration::ZERO);
        }

        // Time until the next byte is due
        let next_due = (self.bytes_delivered + 1) as f64 / rate as f64;
        let wait = Duration::from_secs_f64((next_due - started.elapsed().as_secs_f64()).max(0.0));
        (0, wait.min(MAX_PACING_WAIT))
    }
}

impl Transport for FileReplayTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<TransportInfo> {
        let file = File::open(&self.path)
            .map_err(|e| StreamError::from_open_error(&self.path.display().to_string(), e))?;

        self.reader = Some(BufReader::new(file));
        self.exhausted = false;
        self.started = Some(Instant::now());
        self.bytes_delivered = 0;

        tracing::info!("Opened replay file {:?}", self.path);

        let mut info = TransportInfo::new(format!("Replay of {}", self.path.display()));
        info.channel_count = self.channel_count;
        info.sample_rate_hz = self.sample_rate_hz;
        Ok(info)
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.exhausted || buf.is_empty() {
            return Ok(0);
        }

        let (budget, wait) = self.pacing_budget(buf.len());
        if budget == 0 {
            std::thread::sleep(wait);
            return Ok(0);
        }

        let loop_playback = self.loop_playback;
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| StreamError::Transport("replay file is not open".to_string()))?;

        let mut n = reader.read(&mut buf[..budget])?;
        if n == 0 && loop_playback {
            reader.seek(SeekFrom::Start(0))?;
            n = reader.read(&mut buf[..budget])?;
        }

        if n == 0 {
            tracing::debug!("Replay file {:?} exhausted", self.path);
            self.exhausted = true;
        }

        self.bytes_delivered += n as u64;
        Ok(n)
    }

    fn close(&mut self) {
        if self.reader.take().is_some() {
            tracing::info!("Closed replay file {:?}", self.path);
        }
        self.started = None;
    }

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn capture(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let mut transport = FileReplayTransport::new("/definitely/not/here.bin");
        let err = transport.open().unwrap_err();
        assert!(matches!(err, StreamError::NotFound(_)));
        assert!(!transport.is_open());
    }

    #[test]
    fn test_reads_whole_file_then_exhausts() {
        let file = capture(b"0123456789");
        let mut transport = FileReplayTransport::new(file.path()).with_channel_count(2);
        let info = transport.open().unwrap();
        assert_eq!(info.channel_count, Some(2));

        let mut out = Vec::new();
        let mut buf = [0u8; 4];
        loop {
            let n = transport.read_chunk(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }

        assert_eq!(out, b"0123456789");
        assert!(transport.is_exhausted());
        transport.close();
        assert!(!transport.is_open());
    }

    #[test]
    fn test_loop_playback_never_exhausts() {
        let file = capture(b"abc");
        let mut transport = FileReplayTransport::new(file.path()).with_loop(true);
        transport.open().unwrap();

        let mut out = Vec::new();
        let mut buf = [0u8; 2];
        for _ in 0..6 {
            let n = transport.read_chunk(&mut buf).unwrap();
            out.extend_from_slice(&buf[..n]);
        }

        assert_eq!(out, b"abcabcabc");
        assert!(!transport.is_exhausted());
    }

    #[test]
    fn test_pacing_limits_rate() {
        let file = capture(&[0u8; 10_000]);
        let mut transport = FileReplayTransport::new(file.path()).with_pacing(1_000);
        transport.open().unwrap();

        let start = Instant::now();
        let mut total = 0;
        let mut buf = [0u8; 4096];
        while start.elapsed() < Duration::from_millis(200) {
            total += transport.read_chunk(&mut buf).unwrap();
        }

        // ~200 bytes at 1 kB/s; generous bounds for slow CI
        assert!(total <= 400, "read {} bytes", total);
        assert!(total > 0);
    }
}
