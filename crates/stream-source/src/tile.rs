use crate::{CaptureBackend, Frame, StreamSource, TargetSize};
use std::sync::Arc;

/// Text a renderer shows in place of video.
pub const NO_VIDEO_LABEL: &str = "NO VIDEO";

/// What a tile should paint this tick.
#[derive(Clone, Debug)]
pub enum TileView {
    Video(Arc<Frame>),
    NoVideo,
}

impl TileView {
    pub fn is_video(&self) -> bool {
        matches!(self, TileView::Video(_))
    }
}

/// One cell of a video wall, polled on the render tick.
///
/// The first poll starts the underlying stream. Frames are delivered already
/// stretched to the cell size; any cycle without a fresh frame yields
/// [`TileView::NoVideo`].
pub struct Tile<B: CaptureBackend> {
    source: Arc<StreamSource<B>>,
    width: u32,
    height: u32,
    frames_shown: u64,
    placeholders_shown: u64,
}

impl<B: CaptureBackend> Tile<B> {
    pub fn new(source: Arc<StreamSource<B>>, width: u32, height: u32) -> Self {
        Self {
            source,
            width,
            height,
            frames_shown: 0,
            placeholders_shown: 0,
        }
    }

    pub fn source(&self) -> &StreamSource<B> {
        &self.source
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn resize_cell(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn poll(&mut self) -> TileView {
        let snapshot = self
            .source
            .get_frame(TargetSize::exact(self.width, self.height));
        match snapshot.frame {
            Some(frame) if snapshot.ok => {
                self.frames_shown += 1;
                TileView::Video(frame)
            }
            _ => {
                self.placeholders_shown += 1;
                TileView::NoVideo
            }
        }
    }

    /// Ticks that painted video, and ticks that painted the placeholder.
    pub fn counts(&self) -> (u64, u64) {
        (self.frames_shown, self.placeholders_shown)
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::{MockBackend, StreamOptions};
    use std::time::{Duration, Instant};

    fn fast() -> StreamOptions {
        StreamOptions {
            retry_delay: Duration::from_millis(1),
            ..StreamOptions::default()
        }
    }

    #[test]
    fn test_tile_delivers_cell_sized_frames() {
        let source = Arc::new(StreamSource::with_options(
            "mock://cam",
            MockBackend::new(64, 48),
            fast(),
        ));
        let mut tile = Tile::new(Arc::clone(&source), 20, 10);
        let deadline = Instant::now() + Duration::from_secs(5);
        let frame = loop {
            if let TileView::Video(frame) = tile.poll() {
                break frame;
            }
            assert!(Instant::now() < deadline, "no frame within deadline");
            std::thread::sleep(Duration::from_millis(5));
        };
        assert_eq!((frame.width, frame.height), (20, 10));
        assert!(tile.counts().0 >= 1);

        tile.resize_cell(32, 32);
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let TileView::Video(frame) = tile.poll() {
                assert_eq!((frame.width, frame.height), (32, 32));
                break;
            }
            assert!(Instant::now() < deadline, "no frame after resize");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_unreachable_tile_shows_placeholder() {
        let source = Arc::new(StreamSource::with_options(
            "mock://down",
            MockBackend::default().unreachable(),
            fast(),
        ));
        let mut tile = Tile::new(source, 20, 10);
        for _ in 0..10 {
            assert!(!tile.poll().is_video());
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(tile.counts(), (0, 10));
        assert!(tile.source().is_running());
    }
}
