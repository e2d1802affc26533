use crate::snapshot::SnapshotCell;
use crate::{CaptureBackend, CaptureHandle, SourceId, StreamOptions, StreamStats};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn};

/// Open failures in a row are reported at `warn` once, then every this many attempts.
const OPEN_FAILURE_REPORT_EVERY: u64 = 100;

/// State shared between a stream's control side and its acquisition thread.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) id: SourceId,
    pub(crate) identifier: String,
    pub(crate) snapshot: SnapshotCell,
    pub(crate) running: AtomicBool,
    pub(crate) width: AtomicU32,
    pub(crate) height: AtomicU32,
    pub(crate) failures: AtomicU32,
    frames: AtomicU64,
    read_failures: AtomicU64,
    open_attempts: AtomicU64,
    open_failures: AtomicU64,
    reopens: AtomicU64,
    stop: Mutex<bool>,
    wake: Condvar,
}

impl Shared {
    pub(crate) fn new(id: SourceId, identifier: String) -> Self {
        Self {
            id,
            identifier,
            snapshot: SnapshotCell::new(),
            running: AtomicBool::new(false),
            width: AtomicU32::new(0),
            height: AtomicU32::new(0),
            failures: AtomicU32::new(0),
            frames: AtomicU64::new(0),
            read_failures: AtomicU64::new(0),
            open_attempts: AtomicU64::new(0),
            open_failures: AtomicU64::new(0),
            reopens: AtomicU64::new(0),
            stop: Mutex::new(false),
            wake: Condvar::new(),
        }
    }

    pub(crate) fn stop_requested(&self) -> bool {
        match self.stop.lock() {
            Ok(stop) => *stop,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_stop(&self, value: bool) {
        match self.stop.lock() {
            Ok(mut stop) => *stop = value,
            Err(poisoned) => *poisoned.into_inner() = value,
        }
        self.wake.notify_all();
    }

    pub(crate) fn request_stop(&self) {
        self.set_stop(true);
    }

    pub(crate) fn clear_stop(&self) {
        self.set_stop(false);
    }

    /// Sleep for up to `delay`, returning early when a stop is requested.
    fn pause(&self, delay: Duration) {
        if delay.is_zero() {
            return;
        }
        let guard = match self.stop.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = self.wake.wait_timeout_while(guard, delay, |stop| !*stop);
    }

    pub(crate) fn stats(&self) -> StreamStats {
        StreamStats {
            frames: self.frames.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            open_attempts: self.open_attempts.load(Ordering::Relaxed),
            open_failures: self.open_failures.load(Ordering::Relaxed),
            reopens: self.reopens.load(Ordering::Relaxed),
        }
    }
}

/// The acquisition loop and everything it exclusively owns.
pub(crate) struct Worker<B: CaptureBackend> {
    backend: B,
    handle: Option<B::Handle>,
    options: StreamOptions,
    shared: Arc<Shared>,
    open_failure_streak: u64,
}

impl<B: CaptureBackend> Worker<B> {
    pub(crate) fn new(backend: B, options: StreamOptions, shared: Arc<Shared>) -> Self {
        Self {
            backend,
            handle: None,
            options,
            shared,
            open_failure_streak: 0,
        }
    }

    /// Run until a stop is requested, then release the handle and hand the
    /// worker back so the stream can be restarted.
    pub(crate) fn run(mut self) -> Self {
        let span = info_span!("stream", id = %self.shared.id);
        let _enter = span.enter();
        info!(source = %self.shared.identifier, "grabber started");

        while !self.shared.stop_requested() {
            let produced = match panic::catch_unwind(AssertUnwindSafe(|| self.step())) {
                Ok(produced) => produced,
                Err(_) => {
                    error!("capture backend panicked, discarding handle");
                    self.discard_handle();
                    self.record_read_failure();
                    false
                }
            };
            if !produced {
                // a lost source must not leave the last good frame marked fresh
                self.shared.snapshot.publish_miss();
                self.shared.pause(self.options.retry_delay);
            }
        }

        self.release();
        self.shared.running.store(false, Ordering::Release);
        info!("grabber stopped");
        self
    }

    /// One loop iteration. Returns whether a new frame was published.
    fn step(&mut self) -> bool {
        let mut fresh = false;

        let needs_open = match self.handle.as_ref() {
            None => true,
            Some(handle) => !handle.is_open(),
        };
        if needs_open {
            if self.handle.is_some() {
                debug!("handle not open, opening source");
                self.release();
            } else {
                debug!("no handle, opening source");
            }
            fresh = self.open();
        }

        let failures = self.shared.failures.load(Ordering::Acquire);
        if failures > self.options.reopen_threshold && !fresh {
            if failures == self.options.reopen_threshold + 1 {
                warn!(failures, "read failures over threshold, reopening");
            } else {
                debug!(failures, "still failing, reopening");
            }
            self.shared.reopens.fetch_add(1, Ordering::Relaxed);
            self.release();
            self.open();
        }

        let Some(handle) = self.handle.as_mut() else {
            return false;
        };
        if !handle.is_open() {
            return false;
        }

        match handle.read() {
            Ok(frame) => {
                self.shared.failures.store(0, Ordering::Release);
                self.shared.frames.fetch_add(1, Ordering::Relaxed);
                self.shared.snapshot.publish_frame(frame);
                true
            }
            Err(e) => {
                let failures = self.record_read_failure();
                debug!(error = %e, failures, "read failed");
                false
            }
        }
    }

    fn record_read_failure(&self) -> u32 {
        let failures = self.shared.failures.fetch_add(1, Ordering::AcqRel) + 1;
        self.shared.read_failures.fetch_add(1, Ordering::Relaxed);
        self.shared.snapshot.publish_miss();
        failures
    }

    fn open(&mut self) -> bool {
        self.shared.open_attempts.fetch_add(1, Ordering::Relaxed);
        match self
            .backend
            .open(&self.shared.identifier, &self.options.capture)
        {
            Ok(mut handle) => {
                if let Err(e) = handle.configure_buffering(self.options.capture.buffer_depth) {
                    debug!(error = %e, "buffer depth not applied");
                }
                let (width, height) = (handle.width(), handle.height());
                self.shared.width.store(width, Ordering::Release);
                self.shared.height.store(height, Ordering::Release);
                if self.open_failure_streak > 0 {
                    info!(
                        width,
                        height,
                        after_failures = self.open_failure_streak,
                        "source opened"
                    );
                } else {
                    info!(width, height, "source opened");
                }
                self.open_failure_streak = 0;
                self.handle = Some(handle);
                true
            }
            Err(e) => {
                self.shared.open_failures.fetch_add(1, Ordering::Relaxed);
                self.open_failure_streak += 1;
                if self.open_failure_streak == 1
                    || self.open_failure_streak % OPEN_FAILURE_REPORT_EVERY == 0
                {
                    warn!(error = %e, attempts = self.open_failure_streak, "open failed");
                } else {
                    debug!(error = %e, attempts = self.open_failure_streak, "open failed");
                }
                false
            }
        }
    }

    fn release(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.release();
            debug!("handle released");
        }
    }

    /// Drop a handle that may be in an inconsistent state after a panic.
    fn discard_handle(&mut self) {
        if let Some(handle) = self.handle.take() {
            if panic::catch_unwind(AssertUnwindSafe(move || drop(handle))).is_err() {
                error!("capture handle panicked while being dropped");
            }
        }
    }
}
