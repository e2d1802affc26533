use crate::snapshot::FrameSnapshot;
use crate::worker::{Shared, Worker};
use crate::{
    next_source_id, CaptureBackend, Error, Result, SourceId, StreamOptions, StreamStats, TargetSize,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

struct Control<B: CaptureBackend> {
    /// Present while no acquisition thread owns the worker.
    worker: Option<Worker<B>>,
    task: Option<JoinHandle<Option<Worker<B>>>>,
}

/// One live video source with its own acquisition thread.
///
/// The thread keeps the capture handle open, recovers from open and read
/// failures, and publishes the newest decoded frame. Consumers only ever
/// read the published snapshot, so polling never waits on source I/O.
///
/// Dropping the stream stops the thread, waits for it and releases the handle.
pub struct StreamSource<B: CaptureBackend> {
    shared: Arc<Shared>,
    options: StreamOptions,
    control: Mutex<Control<B>>,
    started: AtomicBool,
}

impl<B: CaptureBackend> StreamSource<B> {
    pub fn new(identifier: impl Into<String>, backend: B) -> Self {
        Self::with_options(identifier, backend, StreamOptions::default())
    }

    pub fn with_options(identifier: impl Into<String>, backend: B, options: StreamOptions) -> Self {
        let shared = Arc::new(Shared::new(next_source_id(), identifier.into()));
        let worker = Worker::new(backend, options.clone(), Arc::clone(&shared));
        Self {
            shared,
            options,
            control: Mutex::new(Control {
                worker: Some(worker),
                task: None,
            }),
            started: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> SourceId {
        self.shared.id
    }

    pub fn identifier(&self) -> &str {
        &self.shared.identifier
    }

    pub fn options(&self) -> &StreamOptions {
        &self.options
    }

    /// Whether the acquisition thread is alive.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Whether [`start`](Self::start) has ever succeeded.
    pub fn has_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Native width reported by the last successful open, 0 before that.
    pub fn width(&self) -> u32 {
        self.shared.width.load(Ordering::Acquire)
    }

    /// Native height reported by the last successful open, 0 before that.
    pub fn height(&self) -> u32 {
        self.shared.height.load(Ordering::Acquire)
    }

    /// Read failures since the last successful read.
    pub fn consecutive_failures(&self) -> u32 {
        self.shared.failures.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> StreamStats {
        self.shared.stats()
    }

    fn lock_control(&self) -> MutexGuard<'_, Control<B>> {
        match self.control.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Start the acquisition thread. A no-op while it is already running.
    ///
    /// If an earlier `stop(false)` is still draining, this waits for that
    /// thread to exit before starting a fresh one.
    pub fn start(&self) -> Result<()> {
        let mut control = self.lock_control();

        if let Some(task) = control.task.as_ref() {
            if !self.shared.stop_requested() && !task.is_finished() {
                return Ok(());
            }
            self.reap(&mut control);
        }

        let worker = control
            .worker
            .take()
            .ok_or_else(|| Error::Backend(format!("{} has lost its capture backend", self.id())))?;

        self.shared.clear_stop();
        self.shared.running.store(true, Ordering::Release);

        // The worker is handed over only once the thread exists, so a failed
        // spawn leaves it in place for the next attempt.
        let (tx, rx) = mpsc::sync_channel::<Worker<B>>(1);
        let spawned = thread::Builder::new()
            .name(self.id().to_string())
            .spawn(move || rx.recv().ok().map(Worker::run));

        match spawned {
            Ok(task) => {
                if let Err(mpsc::SendError(worker)) = tx.send(worker) {
                    control.worker = Some(worker);
                }
                control.task = Some(task);
                self.started.store(true, Ordering::Release);
                debug!(id = %self.id(), "acquisition thread spawned");
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                control.worker = Some(worker);
                Err(Error::Spawn(e.to_string()))
            }
        }
    }

    /// Request the acquisition thread to stop.
    ///
    /// With `wait` the call blocks until the thread has exited and the
    /// capture handle has been released.
    pub fn stop(&self, wait: bool) {
        self.shared.request_stop();
        if wait {
            let mut control = self.lock_control();
            self.reap(&mut control);
        }
    }

    /// Stop, wait for the thread and release the capture handle.
    pub fn shutdown(self) {
        self.stop(true);
    }

    fn reap(&self, control: &mut Control<B>) {
        if let Some(task) = control.task.take() {
            match task.join() {
                Ok(Some(worker)) => control.worker = Some(worker),
                Ok(None) => {}
                Err(_) => error!(id = %self.id(), "acquisition thread panicked"),
            }
        }
        self.shared.running.store(false, Ordering::Release);
    }

    /// The current snapshot, without side effects.
    pub fn latest(&self) -> FrameSnapshot {
        FrameSnapshot::clone(&self.shared.snapshot.load())
    }

    /// Poll the newest frame, starting acquisition on the very first call.
    ///
    /// Never blocks on source I/O. With a non-empty `target` the frame is
    /// stretched to that size on the calling thread. A frame that cannot be
    /// resized is reported as `(false, None)`.
    pub fn get_frame(&self, target: TargetSize) -> FrameSnapshot {
        if !self.has_started() {
            debug!(id = %self.id(), "not started, starting on first poll");
            if let Err(e) = self.start() {
                warn!(id = %self.id(), error = %e, "lazy start failed");
            }
        }

        let snapshot = self.shared.snapshot.load();
        let Some(frame) = snapshot.frame.as_ref() else {
            return FrameSnapshot::clone(&snapshot);
        };
        if target.is_empty() {
            return FrameSnapshot::clone(&snapshot);
        }

        // a retained frame is stretched even after a miss so every frame handed
        // out honours the requested size; tiles skip it when `ok` is false
        let (width, height) = target.resolve(frame.width, frame.height);
        match frame.resized(width, height) {
            Ok(resized) => FrameSnapshot {
                ok: snapshot.ok,
                frame: Some(Arc::new(resized)),
            },
            Err(e) => {
                debug!(id = %self.id(), error = %e, "resize failed");
                FrameSnapshot::default()
            }
        }
    }
}

impl<B: CaptureBackend> Drop for StreamSource<B> {
    fn drop(&mut self) {
        self.stop(true);
        debug!(id = %self.id(), "stream destroyed");
    }
}
