//! stream-source: resilient frame acquisition for live video tiles
//!
//! Each [`StreamSource`] owns one capture handle and a dedicated thread that
//! keeps reading from it, reopening the source when it stops delivering, and
//! publishes only the newest decoded frame. Renderers poll the published
//! snapshot on their own tick and never wait on network I/O. The default build
//! enables a scriptable `mock` backend; the `opencv` feature adds a backend on
//! top of OpenCV `VideoCapture`.

mod types;
pub use types::{CaptureOptions, Frame, PixelFormat, StreamOptions, StreamStats, TargetSize};

mod error;
pub use error::{Error, Result};

mod traits;
pub use traits::{CaptureBackend, CaptureHandle};

mod id;
pub use id::{next_source_id, SourceId};

mod snapshot;
pub use snapshot::{FrameSnapshot, SnapshotCell};

mod worker;

mod source;
pub use source::StreamSource;

mod set;
pub use set::StreamSet;

/// Render-tick helpers for consumers of a stream
pub mod tile;
pub use tile::{Tile, TileView, NO_VIDEO_LABEL};

#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "mock")]
pub use mock::{MockBackend, MockEvent, MockHandle, MockProbe};

#[cfg(feature = "opencv")]
mod opencv_backend;
#[cfg(feature = "opencv")]
pub use opencv_backend::{OpenCvBackend, OpenCvHandle};
