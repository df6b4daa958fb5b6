//! Generic `Camera` trait and the frame buffer it produces.

use rbcam_types::{Header, Image, PixelEncoding, RbError};

/// A raw image frame returned by a camera driver.
///
/// Pixels are packed row-major with no padding, so a row is exactly
/// `width * bytes_per_pixel` bytes long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Size of one pixel in bytes (1 for greyscale, 3 for BGR24).
    pub bytes_per_pixel: usize,
    /// Raw pixel data.
    pub data: Vec<u8>,
}

impl CameraFrame {
    /// A zero-sized frame, returned when the device delivered nothing.
    pub fn empty() -> Self {
        Self {
            width: 0,
            height: 0,
            bytes_per_pixel: 1,
            data: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() || self.width == 0 || self.height == 0
    }

    pub fn encoding(&self) -> PixelEncoding {
        PixelEncoding::from_bytes_per_pixel(self.bytes_per_pixel)
    }

    /// Row length in bytes.
    pub fn step(&self) -> u32 {
        self.width * self.bytes_per_pixel as u32
    }

    /// Wrap the frame into a `sensor_msgs/Image`, moving the pixel buffer.
    pub fn into_image(self, header: Header) -> Image {
        Image {
            header,
            encoding: self.encoding(),
            is_bigendian: 0,
            height: self.height,
            width: self.width,
            step: self.step(),
            data: self.data,
        }
    }
}

/// A camera or image-capture device.
///
/// The lifecycle is `open` → any number of `capture` calls → `release`.
/// A released camera may be opened again.
pub trait Camera: Send {
    /// Stable identifier for this camera, e.g. `"video0"`.
    fn id(&self) -> &str;

    /// Acquire the device.
    ///
    /// # Errors
    ///
    /// Returns [`RbError::Camera`] if the device cannot be opened.
    fn open(&mut self) -> Result<(), RbError>;

    fn is_opened(&self) -> bool;

    /// Capture and return the next available frame.
    ///
    /// A device that is open but delivered no data yields an empty frame
    /// (see [`CameraFrame::is_empty`]) rather than an error.
    ///
    /// # Errors
    ///
    /// Returns [`RbError::Camera`] if the camera is not open or the read
    /// itself failed.
    fn capture(&mut self) -> Result<CameraFrame, RbError>;

    /// Give the device back.  Releasing a camera that is not open is a no-op.
    fn release(&mut self);
}
