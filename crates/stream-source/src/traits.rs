use crate::{CaptureOptions, Error, Frame, Result};

/// Opens capture handles for source identifiers.
///
/// The backend is moved onto the acquisition thread of the stream that owns it,
/// so every handle it produces is used from exactly one thread.
pub trait CaptureBackend: Send + 'static {
    type Handle: CaptureHandle + 'static;

    /// Open a source by its opaque identifier (device index, path or URL).
    fn open(&mut self, identifier: &str, options: &CaptureOptions) -> Result<Self::Handle>;
}

/// A single opened video source.
pub trait CaptureHandle: Send {
    /// Whether the handle can still deliver frames.
    fn is_open(&self) -> bool;

    /// Limit the number of frames the backend buffers internally.
    fn configure_buffering(&mut self, _depth: u32) -> Result<()> {
        Err(Error::Unsupported("buffering control"))
    }

    /// Native frame width, 0 if unknown.
    fn width(&self) -> u32;

    /// Native frame height, 0 if unknown.
    fn height(&self) -> u32;

    /// Read the next frame (blocking).
    fn read(&mut self) -> Result<Frame>;

    /// Release native resources. Calling it twice is a no-op.
    fn release(&mut self);
}
