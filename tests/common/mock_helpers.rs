//! Mock construction helpers

use mockall::mock;
use sigstream_rs::conditioning::SampleFilter;
use sigstream_rs::error::{Result, StreamError};
use sigstream_rs::transport::{Transport, TransportInfo};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub ScriptedTransport {}

    impl Transport for ScriptedTransport {
        fn name(&self) -> &str;
        fn open(&mut self) -> Result<TransportInfo>;
        fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize>;
        fn close(&mut self);
        fn is_open(&self) -> bool;
        fn is_exhausted(&self) -> bool;
    }
}

/// Transport whose `open` fails with `error`
pub fn unopenable_transport(error: fn() -> StreamError) -> MockScriptedTransport {
    let mut transport = MockScriptedTransport::new();
    transport.expect_name().return_const("scripted".to_string());
    transport.expect_open().returning(move || Err(error()));
    transport.expect_is_open().return_const(false);
    transport.expect_close().return_const(());
    transport.expect_is_exhausted().return_const(false);
    transport
}

/// Open transport with `channels` channels whose reads block for `read_time`
/// and return nothing
pub fn slow_transport(channels: usize, read_time: Duration) -> MockScriptedTransport {
    let mut transport = MockScriptedTransport::new();
    transport.expect_name().return_const("slow".to_string());
    transport
        .expect_open()
        .returning(move || Ok(TransportInfo::new("slow device").with_channel_count(channels)));
    transport.expect_read_chunk().returning(move |_| {
        std::thread::sleep(read_time);
        Ok(0)
    });
    transport.expect_is_open().return_const(true);
    transport.expect_close().return_const(());
    transport.expect_is_exhausted().return_const(false);
    transport
}

/// Open transport whose reads always fail; counts `close` calls
pub fn broken_transport(channels: usize, closes: Arc<AtomicUsize>) -> MockScriptedTransport {
    let mut transport = MockScriptedTransport::new();
    transport.expect_name().return_const("broken".to_string());
    transport
        .expect_open()
        .returning(move || Ok(TransportInfo::new("broken device").with_channel_count(channels)));
    transport
        .expect_read_chunk()
        .returning(|_| Err(StreamError::Timeout("no data within 10ms".to_string())));
    transport.expect_is_open().return_const(false);
    transport.expect_close().returning(move || {
        closes.fetch_add(1, Ordering::SeqCst);
    });
    transport.expect_is_exhausted().return_const(false);
    transport
}

/// Like [`broken_transport`], but each failing read blocks for `read_time` first
pub fn stalling_broken_transport(
    channels: usize,
    read_time: Duration,
    closes: Arc<AtomicUsize>,
) -> MockScriptedTransport {
    let mut transport = MockScriptedTransport::new();
    transport.expect_name().return_const("stalling".to_string());
    transport
        .expect_open()
        .returning(move || Ok(TransportInfo::new("stalling device").with_channel_count(channels)));
    transport.expect_read_chunk().returning(move |_| {
        std::thread::sleep(read_time);
        Err(StreamError::Timeout("device stalled".to_string()))
    });
    transport.expect_is_open().return_const(false);
    transport.expect_close().returning(move || {
        closes.fetch_add(1, Ordering::SeqCst);
    });
    transport.expect_is_exhausted().return_const(false);
    transport
}

/// Filter that passes samples through and counts resets
#[derive(Debug, Default)]
pub struct CountingFilter {
    pub resets: Arc<AtomicUsize>,
}

impl CountingFilter {
    pub fn new(resets: Arc<AtomicUsize>) -> Self {
        Self { resets }
    }
}

impl SampleFilter for CountingFilter {
    fn filter(&mut self, sample: f64) -> f64 {
        sample
    }

    fn reset(&mut self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}
