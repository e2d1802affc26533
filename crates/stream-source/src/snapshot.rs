use crate::Frame;
use arc_swap::ArcSwap;
use std::sync::Arc;

/// The published result of the most recent acquisition cycle.
#[derive(Clone, Debug, Default)]
pub struct FrameSnapshot {
    /// Whether the last read produced a new frame.
    pub ok: bool,
    /// Most recent decoded frame, kept across failed reads.
    pub frame: Option<Arc<Frame>>,
}

/// Single-writer, many-reader slot holding the current snapshot.
///
/// Writers swap in a whole snapshot, so a reader always sees the flag and
/// the frame of the same cycle. Reads never block the acquisition thread.
#[derive(Debug)]
pub struct SnapshotCell {
    inner: ArcSwap<FrameSnapshot>,
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self {
            inner: ArcSwap::from_pointee(FrameSnapshot::default()),
        }
    }
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self) -> Arc<FrameSnapshot> {
        self.inner.load_full()
    }

    fn store(&self, snapshot: FrameSnapshot) {
        self.inner.store(Arc::new(snapshot));
    }

    /// Publish a successfully decoded frame.
    pub fn publish_frame(&self, frame: Frame) {
        self.store(FrameSnapshot {
            ok: true,
            frame: Some(Arc::new(frame)),
        });
    }

    /// Publish a cycle that produced nothing new, retaining the previous frame.
    pub fn publish_miss(&self) {
        let previous = self.load();
        if !previous.ok {
            return;
        }
        self.store(FrameSnapshot {
            ok: false,
            frame: previous.frame.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PixelFormat;

    #[test]
    fn test_initial_snapshot_is_empty() {
        let cell = SnapshotCell::new();
        let snap = cell.load();
        assert!(!snap.ok);
        assert!(snap.frame.is_none());
    }

    #[test]
    fn test_miss_keeps_previous_frame() {
        let cell = SnapshotCell::new();
        cell.publish_frame(Frame::blank(4, 4, PixelFormat::Gray8));
        cell.publish_miss();
        let snap = cell.load();
        assert!(!snap.ok);
        assert_eq!(snap.frame.as_ref().map(|f| f.width), Some(4));
    }

    #[test]
    fn test_new_frame_replaces_old() {
        let cell = SnapshotCell::new();
        cell.publish_frame(Frame::blank(4, 4, PixelFormat::Gray8));
        let held = cell.load();
        cell.publish_frame(Frame::blank(8, 2, PixelFormat::Gray8));
        // readers holding the old snapshot are unaffected
        assert_eq!(held.frame.as_ref().map(|f| f.width), Some(4));
        let snap = cell.load();
        assert!(snap.ok);
        assert_eq!(snap.frame.as_ref().map(|f| (f.width, f.height)), Some((8, 2)));
    }

    #[test]
    fn test_concurrent_readers_never_see_torn_snapshot() {
        let cell = Arc::new(SnapshotCell::new());
        let writer = {
            let cell = Arc::clone(&cell);
            std::thread::spawn(move || {
                for i in 0..2000u32 {
                    if i % 3 == 0 {
                        cell.publish_miss();
                    } else {
                        cell.publish_frame(Frame::blank(2, 2, PixelFormat::Gray8));
                    }
                }
            })
        };
        for _ in 0..2000 {
            let snap = cell.load();
            if snap.ok {
                assert!(snap.frame.is_some());
            }
        }
        writer.join().unwrap();
    }
}
