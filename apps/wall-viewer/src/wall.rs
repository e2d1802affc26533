use serde::Serialize;
use std::sync::Arc;
use stream_source::{CaptureBackend, StreamSet, StreamSource, Tile, TileView, NO_VIDEO_LABEL};
use tracing::{info, warn};
use wall_config::{cell_size, grid_for, position, Grid};

struct Slot<B: CaptureBackend> {
    tile: Tile<B>,
    row: u32,
    column: u32,
    showing_video: Option<bool>,
}

/// Per-tile status line, emitted with `--json`.
#[derive(Debug, Serialize)]
pub struct TileStatus {
    pub id: u64,
    pub row: u32,
    pub column: u32,
    pub video: bool,
    pub native_width: u32,
    pub native_height: u32,
    pub consecutive_failures: u32,
    pub frames: u64,
    pub reopens: u64,
    pub open_failures: u64,
    pub ticks_painted: u64,
    pub ticks_placeholder: u64,
}

/// What one render tick produced.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TickSummary {
    pub video: usize,
    pub placeholder: usize,
}

/// Tiles laid out on a grid, each backed by its own stream.
pub struct Wall<B: CaptureBackend> {
    streams: StreamSet<B>,
    slots: Vec<Slot<B>>,
    grid: Grid,
}

impl<B: CaptureBackend> Wall<B> {
    pub fn new(sources: Vec<StreamSource<B>>, surface: (u32, u32)) -> Self {
        let grid = grid_for(sources.len());
        let (width, height) = cell_size(surface.0, surface.1, grid);
        let mut streams = StreamSet::new();
        let slots = sources
            .into_iter()
            .enumerate()
            .map(|(index, source)| {
                let (row, column) = position(index, grid);
                let source = streams.push(source);
                info!(
                    id = %source.id(),
                    row,
                    column,
                    width,
                    height,
                    source = %source.identifier(),
                    "tile added"
                );
                Slot {
                    tile: Tile::new(Arc::clone(&source), width, height),
                    row,
                    column,
                    showing_video: None,
                }
            })
            .collect();
        Self {
            streams,
            slots,
            grid,
        }
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Recompute cell sizes for a new surface size.
    #[cfg(test)]
    pub fn resize(&mut self, surface: (u32, u32)) {
        let (width, height) = cell_size(surface.0, surface.1, self.grid);
        for slot in &mut self.slots {
            slot.tile.resize_cell(width, height);
        }
    }

    /// Poll every tile once. Tiles start their stream on their first poll.
    pub fn tick(&mut self) -> TickSummary {
        let mut summary = TickSummary::default();
        for slot in &mut self.slots {
            let view = slot.tile.poll();
            let video = view.is_video();
            if slot.showing_video != Some(video) {
                let source = slot.tile.source();
                match &view {
                    TileView::Video(frame) => info!(
                        id = %source.id(),
                        width = frame.width,
                        height = frame.height,
                        "video"
                    ),
                    TileView::NoVideo if slot.showing_video.is_some() => {
                        warn!(id = %source.id(), "{}", NO_VIDEO_LABEL)
                    }
                    TileView::NoVideo => info!(id = %source.id(), "{}", NO_VIDEO_LABEL),
                }
                slot.showing_video = Some(video);
            }
            if video {
                summary.video += 1;
            } else {
                summary.placeholder += 1;
            }
        }
        summary
    }

    pub fn status(&self) -> Vec<TileStatus> {
        self.slots
            .iter()
            .map(|slot| {
                let source = slot.tile.source();
                let stats = source.stats();
                let (painted, placeholder) = slot.tile.counts();
                TileStatus {
                    id: source.id().0,
                    row: slot.row,
                    column: slot.column,
                    video: slot.showing_video.unwrap_or(false),
                    native_width: source.width(),
                    native_height: source.height(),
                    consecutive_failures: source.consecutive_failures(),
                    frames: stats.frames,
                    reopens: stats.reopens,
                    open_failures: stats.open_failures,
                    ticks_painted: painted,
                    ticks_placeholder: placeholder,
                }
            })
            .collect()
    }

    /// Stop every stream and release every capture handle.
    pub fn shutdown(self) {
        let Wall { streams, slots, .. } = self;
        drop(slots);
        streams.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use stream_source::{MockBackend, StreamOptions};

    fn sources(n: usize) -> Vec<StreamSource<MockBackend>> {
        let options = StreamOptions {
            retry_delay: Duration::from_millis(1),
            ..StreamOptions::default()
        };
        (0..n)
            .map(|i| {
                let backend = if i == 0 {
                    MockBackend::new(64, 48).unreachable()
                } else {
                    MockBackend::new(64, 48)
                };
                StreamSource::with_options(format!("mock://{i}"), backend, options.clone())
            })
            .collect()
    }

    #[test]
    fn test_layout_and_ticks() {
        let mut wall = Wall::new(sources(3), (200, 100));
        assert_eq!(wall.grid(), Grid { rows: 2, columns: 2 });
        assert_eq!(wall.len(), 3);

        let deadline = Instant::now() + Duration::from_secs(5);
        let summary = loop {
            let summary = wall.tick();
            if summary.video == 2 || Instant::now() > deadline {
                break summary;
            }
            std::thread::sleep(Duration::from_millis(5));
        };
        assert_eq!(summary, TickSummary { video: 2, placeholder: 1 });

        let status = wall.status();
        assert!(!status[0].video);
        assert!(status[1].video);
        assert_eq!((status[2].row, status[2].column), (1, 0));
        assert_eq!(status[1].native_width, 64);

        wall.shutdown();
    }

    #[test]
    fn test_resize_changes_cell_size() {
        let mut wall = Wall::new(sources(2), (200, 100));
        wall.resize((400, 300));
        assert_eq!(wall.slots[1].tile.size(), (200, 300));
        wall.shutdown();
    }
}
