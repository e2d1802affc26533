use crate::{Error, Result};
use std::time::Duration;
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PixelFormat {
    Bgr8,
    Rgb8,
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgr8 | PixelFormat::Rgb8 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub data: Vec<u8>,
    pub ts: Option<OffsetDateTime>,
}

impl Frame {
    /// Allocate a zeroed frame of the given size.
    pub fn blank(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        let len = width as usize * height as usize * pixel_format.bytes_per_pixel();
        Self {
            width,
            height,
            pixel_format,
            data: vec![0u8; len],
            ts: None,
        }
    }

    fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.pixel_format.bytes_per_pixel()
    }

    /// Stretch the frame to exactly `width` x `height` (nearest neighbour).
    ///
    /// Aspect ratio is not preserved. The timestamp of the source frame is kept.
    pub fn resized(&self, width: u32, height: u32) -> Result<Frame> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidSize(format!("target {width}x{height}")));
        }
        if self.width == 0 || self.height == 0 || self.data.len() != self.expected_len() {
            return Err(Error::InvalidSize(format!(
                "source {}x{} {:?} with {} bytes",
                self.width,
                self.height,
                self.pixel_format,
                self.data.len()
            )));
        }
        if width == self.width && height == self.height {
            return Ok(self.clone());
        }

        let bpp = self.pixel_format.bytes_per_pixel();
        let src_w = self.width as usize;
        let src_h = self.height as usize;
        let dst_w = width as usize;
        let dst_h = height as usize;

        // Precompute source column offsets, they are shared by every row
        let cols: Vec<usize> = (0..dst_w).map(|x| (x * src_w / dst_w) * bpp).collect();

        let mut data = Vec::with_capacity(dst_w * dst_h * bpp);
        for y in 0..dst_h {
            let sy = y * src_h / dst_h;
            let row = &self.data[sy * src_w * bpp..(sy + 1) * src_w * bpp];
            for &sx in &cols {
                data.extend_from_slice(&row[sx..sx + bpp]);
            }
        }

        Ok(Frame {
            width,
            height,
            pixel_format: self.pixel_format,
            data,
            ts: self.ts,
        })
    }
}

/// Requested output size for a polled frame.
///
/// A missing dimension keeps the native value of the frame.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TargetSize {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl TargetSize {
    pub fn exact(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width.is_none() && self.height.is_none()
    }

    /// Resolve against a native size.
    pub fn resolve(&self, native_width: u32, native_height: u32) -> (u32, u32) {
        (
            self.width.unwrap_or(native_width),
            self.height.unwrap_or(native_height),
        )
    }
}

/// Options handed to a capture backend when a handle is opened.
#[derive(Clone, Debug)]
pub struct CaptureOptions {
    /// Internal frame buffer depth requested from the backend.
    pub buffer_depth: u32,
    /// Native open timeout, for backends that support one.
    pub open_timeout: Option<Duration>,
    /// Native read timeout, for backends that support one.
    pub read_timeout: Option<Duration>,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            buffer_depth: 3,
            open_timeout: None,
            read_timeout: None,
        }
    }
}

/// Tuning for the acquisition loop of a [`crate::StreamSource`].
#[derive(Clone, Debug)]
pub struct StreamOptions {
    pub capture: CaptureOptions,
    /// Consecutive read failures tolerated before the handle is forcibly reopened.
    pub reopen_threshold: u32,
    /// Pause after an iteration that produced no frame.
    pub retry_delay: Duration,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            capture: CaptureOptions::default(),
            reopen_threshold: 10,
            retry_delay: Duration::from_millis(50),
        }
    }
}

/// Counters maintained by the acquisition loop.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StreamStats {
    pub frames: u64,
    pub read_failures: u64,
    pub open_attempts: u64,
    pub open_failures: u64,
    pub reopens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(width: u32, height: u32) -> Frame {
        let mut frame = Frame::blank(width, height, PixelFormat::Gray8);
        for y in 0..height {
            for x in 0..width {
                frame.data[(y * width + x) as usize] = (y * width + x) as u8;
            }
        }
        frame
    }

    #[test]
    fn test_resize_stretches_to_exact_size() {
        let frame = ramp(4, 2);
        let out = frame.resized(8, 6).unwrap();
        assert_eq!((out.width, out.height), (8, 6));
        assert_eq!(out.data.len(), 48);
        // top-left and bottom-right keep the corner pixels
        assert_eq!(out.data[0], 0);
        assert_eq!(out.data[47], 7);
    }

    #[test]
    fn test_resize_downscale_picks_nearest() {
        let frame = ramp(4, 4);
        let out = frame.resized(2, 2).unwrap();
        assert_eq!(out.data, vec![0, 2, 8, 10]);
    }

    #[test]
    fn test_resize_keeps_pixel_groups() {
        let mut frame = Frame::blank(2, 1, PixelFormat::Bgr8);
        frame.data = vec![1, 2, 3, 4, 5, 6];
        let out = frame.resized(4, 1).unwrap();
        assert_eq!(out.data, vec![1, 2, 3, 1, 2, 3, 4, 5, 6, 4, 5, 6]);
        assert_eq!(out.pixel_format, PixelFormat::Bgr8);
    }

    #[test]
    fn test_resize_same_size_is_identity() {
        let frame = ramp(3, 3);
        let out = frame.resized(3, 3).unwrap();
        assert_eq!(out.data, frame.data);
    }

    #[test]
    fn test_resize_rejects_zero_target() {
        let frame = ramp(3, 3);
        assert!(matches!(frame.resized(0, 3), Err(Error::InvalidSize(_))));
    }

    #[test]
    fn test_resize_rejects_inconsistent_buffer() {
        let mut frame = ramp(3, 3);
        frame.data.truncate(4);
        assert!(frame.resized(6, 6).is_err());
    }

    #[test]
    fn test_target_size_partial_keeps_native() {
        let target = TargetSize {
            width: Some(100),
            height: None,
        };
        assert_eq!(target.resolve(640, 480), (100, 480));
        assert!(TargetSize::default().is_empty());
    }
}
