use crate::{CaptureBackend, CaptureHandle, CaptureOptions, Error, Frame, PixelFormat, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use time::OffsetDateTime;

/// Something the mock backend was asked to do, in call order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MockEvent {
    Open { ok: bool },
    Read { ok: bool },
    Release,
}

#[derive(Debug, Default)]
struct Counters {
    opens: AtomicU64,
    reads: AtomicU64,
    releases: AtomicU64,
    live_handles: AtomicU64,
    max_live_handles: AtomicU64,
    buffer_depth: AtomicU64,
    events: Mutex<Vec<MockEvent>>,
}

impl Counters {
    fn record(&self, event: MockEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Read-only view of what a [`MockBackend`] has seen.
#[derive(Clone, Debug, Default)]
pub struct MockProbe {
    counters: Arc<Counters>,
}

impl MockProbe {
    pub fn opens(&self) -> u64 {
        self.counters.opens.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> u64 {
        self.counters.reads.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> u64 {
        self.counters.releases.load(Ordering::SeqCst)
    }

    /// Handles currently open.
    pub fn live_handles(&self) -> u64 {
        self.counters.live_handles.load(Ordering::SeqCst)
    }

    /// Highest number of handles that were open at the same time.
    pub fn max_live_handles(&self) -> u64 {
        self.counters.max_live_handles.load(Ordering::SeqCst)
    }

    /// Buffer depth last requested through `configure_buffering`.
    pub fn buffer_depth(&self) -> u64 {
        self.counters.buffer_depth.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<MockEvent> {
        match self.counters.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Scriptable in-process capture backend producing gray ramp frames.
///
/// Failures are scripted by call index across all handles the backend opens,
/// so "the first 15 reads fail" holds even when the stream reopens in between.
#[derive(Clone, Debug)]
pub struct MockBackend {
    width: u32,
    height: u32,
    fail_opens: u64,
    open_limit: Option<u64>,
    fail_reads: u64,
    close_after_reads: Option<u64>,
    panic_on_read: Option<u64>,
    read_delay: Duration,
    counters: Arc<Counters>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new(320, 240)
    }
}

impl MockBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            fail_opens: 0,
            open_limit: None,
            fail_reads: 0,
            close_after_reads: None,
            panic_on_read: None,
            read_delay: Duration::from_millis(1),
            counters: Arc::new(Counters::default()),
        }
    }

    /// The first `n` open calls fail.
    pub fn fail_opens(mut self, n: u64) -> Self {
        self.fail_opens = n;
        self
    }

    /// Every open call fails.
    pub fn unreachable(self) -> Self {
        self.fail_opens(u64::MAX)
    }

    /// Only the first `n` open calls succeed; the source is gone afterwards.
    pub fn vanish_after_opens(mut self, n: u64) -> Self {
        self.open_limit = Some(n);
        self
    }

    /// The first `n` read calls fail.
    pub fn fail_reads(mut self, n: u64) -> Self {
        self.fail_reads = n;
        self
    }

    /// Each handle reports closed after delivering `n` reads.
    pub fn close_after_reads(mut self, n: u64) -> Self {
        self.close_after_reads = Some(n);
        self
    }

    /// Read call number `index` (0-based) panics.
    pub fn panic_on_read(mut self, index: u64) -> Self {
        self.panic_on_read = Some(index);
        self
    }

    /// Time each read blocks for, 1 ms unless set.
    pub fn read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn probe(&self) -> MockProbe {
        MockProbe {
            counters: Arc::clone(&self.counters),
        }
    }
}

impl CaptureBackend for MockBackend {
    type Handle = MockHandle;

    fn open(&mut self, identifier: &str, _options: &CaptureOptions) -> Result<MockHandle> {
        let index = self.counters.opens.fetch_add(1, Ordering::SeqCst);
        let gone = self.open_limit.is_some_and(|limit| index >= limit);
        if index < self.fail_opens || gone {
            self.counters.record(MockEvent::Open { ok: false });
            return Err(Error::Open(format!("mock: {identifier} unreachable")));
        }
        self.counters.record(MockEvent::Open { ok: true });
        let live = self.counters.live_handles.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters
            .max_live_handles
            .fetch_max(live, Ordering::SeqCst);
        Ok(MockHandle {
            open: true,
            released: false,
            delivered: 0,
            script: self.clone(),
        })
    }
}

pub struct MockHandle {
    open: bool,
    released: bool,
    delivered: u64,
    script: MockBackend,
}

impl MockHandle {
    fn ramp(&self, offset: u64) -> Frame {
        let width = self.script.width;
        let height = self.script.height;
        let mut data = vec![0u8; width as usize * height as usize];
        for y in 0..height {
            for x in 0..width {
                let idx = (y * width + x) as usize;
                data[idx] = ((u64::from(x + y) + offset) % 256) as u8;
            }
        }
        Frame {
            width,
            height,
            pixel_format: PixelFormat::Gray8,
            data,
            ts: Some(OffsetDateTime::now_utc()),
        }
    }
}

impl CaptureHandle for MockHandle {
    fn is_open(&self) -> bool {
        self.open
    }

    fn configure_buffering(&mut self, depth: u32) -> Result<()> {
        self.script
            .counters
            .buffer_depth
            .store(u64::from(depth), Ordering::SeqCst);
        Ok(())
    }

    fn width(&self) -> u32 {
        self.script.width
    }

    fn height(&self) -> u32 {
        self.script.height
    }

    fn read(&mut self) -> Result<Frame> {
        if !self.open {
            return Err(Error::NotOpen);
        }
        if !self.script.read_delay.is_zero() {
            std::thread::sleep(self.script.read_delay);
        }
        let counters = Arc::clone(&self.script.counters);
        let index = counters.reads.fetch_add(1, Ordering::SeqCst);
        if self.script.panic_on_read == Some(index) {
            scripted_panic(index);
        }
        if index < self.script.fail_reads {
            counters.record(MockEvent::Read { ok: false });
            return Err(Error::Read(format!("mock: scripted failure {index}")));
        }
        counters.record(MockEvent::Read { ok: true });
        self.delivered += 1;
        if self.script.close_after_reads == Some(self.delivered) {
            self.open = false;
        }
        Ok(self.ramp(index))
    }

    fn release(&mut self) {
        self.open = false;
        if self.released {
            return;
        }
        self.released = true;
        let counters = &self.script.counters;
        counters.live_handles.fetch_sub(1, Ordering::SeqCst);
        counters.releases.fetch_add(1, Ordering::SeqCst);
        counters.record(MockEvent::Release);
    }
}

// the panic is the scripted behaviour under test
#[allow(clippy::panic)]
fn scripted_panic(index: u64) -> ! {
    panic!("mock: scripted panic on read {index}");
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        self.release();
    }
}
