//! Simulated camera for CI and for hosts without a capture device.
//!
//! [`SimCamera`] renders a diagonal gradient that shifts by a few pixels per
//! capture, so consecutive frames differ and a viewer on the ROS side can see
//! the stream moving.
//!
//! # Example
//!
//! ```rust
//! use rbcam_hal::{Camera, SimCamera};
//!
//! let mut cam = SimCamera::new("sim0").with_size(8, 4).mono();
//! cam.open().expect("sim camera always opens");
//! let frame = cam.capture().expect("sim capture");
//! assert_eq!(frame.data.len(), 8 * 4);
//! ```

use rbcam_types::RbError;
use tracing::debug;

use crate::camera::{Camera, CameraFrame};

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;

/// Pixels the pattern advances per captured frame.
const SHIFT_PER_FRAME: u32 = 4;

/// A deterministic test-pattern camera.
pub struct SimCamera {
    id: String,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
    fail_open: bool,
    empty_every: Option<u64>,
    fail_capture_every: Option<u64>,
    opened: bool,
    captured: u64,
}

impl SimCamera {
    /// A 640×480 BGR camera that opens successfully.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            bytes_per_pixel: 3,
            fail_open: false,
            empty_every: None,
            fail_capture_every: None,
            opened: false,
            captured: 0,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Produce single-channel greyscale frames.
    pub fn mono(mut self) -> Self {
        self.bytes_per_pixel = 1;
        self
    }

    /// Make every call to [`Camera::open`] fail, like an unplugged device.
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Deliver an empty frame on every `n`-th capture (1-based).
    pub fn with_empty_every(mut self, n: u64) -> Self {
        self.empty_every = (n > 0).then_some(n);
        self
    }

    /// Fail every `n`-th capture (1-based) with a camera fault, like a read
    /// error on a flaky device.
    pub fn failing_capture_every(mut self, n: u64) -> Self {
        self.fail_capture_every = (n > 0).then_some(n);
        self
    }

    /// Number of `capture` calls on an open camera since construction.
    pub fn captured(&self) -> u64 {
        self.captured
    }

    fn render(&self, tick: u64) -> Vec<u8> {
        let shift = (tick as u32).wrapping_mul(SHIFT_PER_FRAME);
        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * self.bytes_per_pixel);
        for y in 0..self.height {
            for x in 0..self.width {
                let v = x.wrapping_add(y).wrapping_add(shift) as u8;
                if self.bytes_per_pixel == 1 {
                    data.push(v);
                } else {
                    // B, G, R
                    data.push(v);
                    data.push(v.wrapping_add(85));
                    data.push(v.wrapping_add(170));
                }
            }
        }
        data
    }
}

impl Camera for SimCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn open(&mut self) -> Result<(), RbError> {
        if self.fail_open {
            return Err(RbError::camera(&self.id, "simulated device unavailable"));
        }
        self.opened = true;
        debug!(camera = %self.id, width = self.width, height = self.height, "sim camera opened");
        Ok(())
    }

    fn is_opened(&self) -> bool {
        self.opened
    }

    fn capture(&mut self) -> Result<CameraFrame, RbError> {
        if !self.opened {
            return Err(RbError::camera(&self.id, "capture on a camera that is not open"));
        }
        let tick = self.captured;
        self.captured += 1;

        if self.fail_capture_every.is_some_and(|n| self.captured % n == 0) {
            return Err(RbError::camera(&self.id, "simulated read failure"));
        }
        if self.empty_every.is_some_and(|n| self.captured % n == 0) {
            return Ok(CameraFrame::empty());
        }

        Ok(CameraFrame {
            width: self.width,
            height: self.height,
            bytes_per_pixel: self.bytes_per_pixel,
            data: self.render(tick),
        })
    }

    fn release(&mut self) {
        if self.opened {
            debug!(camera = %self.id, captured = self.captured, "sim camera released");
        }
        self.opened = false;
    }
}
