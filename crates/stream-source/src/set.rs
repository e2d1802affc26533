use crate::{CaptureBackend, StreamSource};
use std::sync::Arc;
use tracing::{info, warn};

/// A group of independent streams started and shut down together.
///
/// Shutdown signals every stream before waiting on any of them, so a wall
/// of stalled sources takes as long as its slowest source to close.
pub struct StreamSet<B: CaptureBackend> {
    sources: Vec<Arc<StreamSource<B>>>,
}

impl<B: CaptureBackend> Default for StreamSet<B> {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
        }
    }
}

impl<B: CaptureBackend> StreamSet<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, source: StreamSource<B>) -> Arc<StreamSource<B>> {
        let source = Arc::new(source);
        self.sources.push(Arc::clone(&source));
        source
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<StreamSource<B>>> {
        self.sources.iter()
    }

    /// Start every stream, returning how many are running.
    pub fn start_all(&self) -> usize {
        let mut started = 0;
        for source in &self.sources {
            match source.start() {
                Ok(()) => started += 1,
                Err(e) => warn!(id = %source.id(), error = %e, "failed to start stream"),
            }
        }
        started
    }

    /// Stop every stream; with `wait`, return once all threads have exited.
    pub fn stop_all(&self, wait: bool) {
        for source in &self.sources {
            source.stop(false);
        }
        if wait {
            for source in &self.sources {
                source.stop(true);
            }
        }
    }

    pub fn shutdown(self) {
        drop(self);
    }
}

impl<B: CaptureBackend> Drop for StreamSet<B> {
    fn drop(&mut self) {
        if self.sources.is_empty() {
            return;
        }
        self.stop_all(true);
        info!(streams = self.sources.len(), "all streams stopped");
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::{MockBackend, StreamOptions};
    use std::time::{Duration, Instant};

    #[test]
    fn test_shutdown_stops_every_stream() {
        let options = StreamOptions {
            retry_delay: Duration::from_millis(1),
            ..StreamOptions::default()
        };
        let mut set = StreamSet::new();
        let probes: Vec<_> = (0..4)
            .map(|i| {
                let backend = MockBackend::new(16, 16).read_delay(Duration::from_millis(5));
                let probe = backend.probe();
                set.push(StreamSource::with_options(format!("mock://{i}"), backend, options.clone()));
                probe
            })
            .collect();
        let sources: Vec<_> = set.iter().cloned().collect();
        assert_eq!(set.start_all(), 4);
        assert!(sources.iter().all(|s| s.is_running()));

        let started = Instant::now();
        set.shutdown();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(sources.iter().all(|s| !s.is_running()));
        assert!(probes.iter().all(|p| p.live_handles() == 0));
    }

    #[test]
    fn test_ids_are_distinct() {
        let mut set = StreamSet::new();
        let a = set.push(StreamSource::new("a", MockBackend::default()));
        let b = set.push(StreamSource::new("b", MockBackend::default()));
        assert!(a.id() < b.id());
        assert_eq!(set.len(), 2);
    }
}
