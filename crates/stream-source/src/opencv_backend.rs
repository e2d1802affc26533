use crate::{CaptureBackend, CaptureHandle, CaptureOptions, Error, Frame, PixelFormat, Result};
use opencv::prelude::*;
use opencv::{core, imgproc, videoio};
use time::OffsetDateTime;
use tracing::debug;

fn backend_err(e: opencv::Error) -> Error {
    Error::Backend(e.to_string())
}

/// Capture backend built on OpenCV `VideoCapture` (FFmpeg/GStreamer underneath).
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenCvBackend;

impl OpenCvBackend {
    fn open_params(options: &CaptureOptions) -> core::Vector<i32> {
        let mut params = core::Vector::<i32>::new();
        if let Some(timeout) = options.open_timeout {
            params.push(videoio::CAP_PROP_OPEN_TIMEOUT_MSEC);
            params.push(timeout.as_millis().min(i32::MAX as u128) as i32);
        }
        if let Some(timeout) = options.read_timeout {
            params.push(videoio::CAP_PROP_READ_TIMEOUT_MSEC);
            params.push(timeout.as_millis().min(i32::MAX as u128) as i32);
        }
        params
    }
}

impl CaptureBackend for OpenCvBackend {
    type Handle = OpenCvHandle;

    fn open(&mut self, identifier: &str, options: &CaptureOptions) -> Result<OpenCvHandle> {
        let params = Self::open_params(options);
        // Numeric identifiers select a local device, anything else is a path or URL
        let cap = if let Ok(idx) = identifier.parse::<i32>() {
            videoio::VideoCapture::new_with_params(idx, videoio::CAP_ANY, &params)
                .map_err(backend_err)?
        } else {
            videoio::VideoCapture::from_file_with_params(identifier, videoio::CAP_ANY, &params)
                .map_err(backend_err)?
        };
        let opened = cap.is_opened().map_err(backend_err)?;
        if !opened {
            return Err(Error::Open(identifier.to_string()));
        }
        Ok(OpenCvHandle { cap })
    }
}

pub struct OpenCvHandle {
    cap: videoio::VideoCapture,
}

impl OpenCvHandle {
    fn dimension(&self, prop: i32) -> u32 {
        match self.cap.get(prop) {
            Ok(v) if v.is_finite() && v > 0.0 => v as u32,
            _ => 0,
        }
    }
}

impl CaptureHandle for OpenCvHandle {
    fn is_open(&self) -> bool {
        self.cap.is_opened().unwrap_or(false)
    }

    fn configure_buffering(&mut self, depth: u32) -> Result<()> {
        let applied = self
            .cap
            .set(videoio::CAP_PROP_BUFFERSIZE, f64::from(depth))
            .map_err(backend_err)?;
        if !applied {
            return Err(Error::Unsupported("CAP_PROP_BUFFERSIZE"));
        }
        Ok(())
    }

    fn width(&self) -> u32 {
        self.dimension(videoio::CAP_PROP_FRAME_WIDTH)
    }

    fn height(&self) -> u32 {
        self.dimension(videoio::CAP_PROP_FRAME_HEIGHT)
    }

    fn read(&mut self) -> Result<Frame> {
        let mut mat = core::Mat::default();
        let grabbed = self.cap.read(&mut mat).map_err(backend_err)?;
        if !grabbed || mat.empty() {
            return Err(Error::Read("empty frame".into()));
        }

        let width = mat.cols() as u32;
        let height = mat.rows() as u32;

        let (pixel_format, data) = match mat.channels() {
            3 => {
                let mut rgb = core::Mat::default();
                imgproc::cvt_color(&mat, &mut rgb, imgproc::COLOR_BGR2RGB, 0)
                    .map_err(backend_err)?;
                (PixelFormat::Rgb8, rgb.data_bytes().map_err(backend_err)?.to_vec())
            }
            1 => (PixelFormat::Gray8, mat.data_bytes().map_err(backend_err)?.to_vec()),
            n => return Err(Error::Read(format!("unsupported channel count {n}"))),
        };

        Ok(Frame {
            width,
            height,
            pixel_format,
            data,
            ts: Some(OffsetDateTime::now_utc()),
        })
    }

    fn release(&mut self) {
        if self.cap.is_opened().unwrap_or(false) {
            if let Err(e) = self.cap.release() {
                debug!(error = %e, "capture release failed");
            }
        }
    }
}

impl Drop for OpenCvHandle {
    fn drop(&mut self) {
        self.release();
    }
}
