//! OpenCV capture driver.
//!
//! Compiled only with the `opencv-capture` feature.  [`OpenCvCamera`] opens a
//! `videoio::VideoCapture` on a device index and copies every captured `Mat`
//! into an owned [`CameraFrame`], so the buffer stays valid after the next
//! read overwrites the device's internal one.

use ::opencv::core::Mat;
use ::opencv::prelude::*;
use ::opencv::{highgui, videoio};
use rbcam_types::RbError;
use tracing::{debug, warn};

use crate::camera::{Camera, CameraFrame};

/// Name of the HighGUI preview window.
const PREVIEW_WINDOW: &str = "image";

/// Camera backed by `cv::VideoCapture`.
pub struct OpenCvCamera {
    id: String,
    index: i32,
    preview: bool,
    capture: Option<videoio::VideoCapture>,
}

impl OpenCvCamera {
    /// Camera on device `index` (`0` is the first webcam).
    pub fn new(index: i32) -> Self {
        Self {
            id: format!("video{index}"),
            index,
            preview: false,
            capture: None,
        }
    }

    /// Show every captured frame in a HighGUI window.
    pub fn with_preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    fn cv_err(&self, e: ::opencv::Error) -> RbError {
        RbError::camera(&self.id, e.to_string())
    }

    fn show(&self, mat: &Mat) {
        let shown = highgui::imshow(PREVIEW_WINDOW, mat).and_then(|_| highgui::wait_key(1));
        if let Err(e) = shown {
            warn!(camera = %self.id, error = %e, "preview window update failed");
        }
    }
}

impl Camera for OpenCvCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn open(&mut self) -> Result<(), RbError> {
        let cap = videoio::VideoCapture::new(self.index, videoio::CAP_ANY).map_err(|e| self.cv_err(e))?;
        if !cap.is_opened().map_err(|e| self.cv_err(e))? {
            return Err(RbError::camera(&self.id, "could not open video device"));
        }
        debug!(camera = %self.id, "opencv capture opened");
        self.capture = Some(cap);
        Ok(())
    }

    fn is_opened(&self) -> bool {
        self.capture
            .as_ref()
            .is_some_and(|c| c.is_opened().unwrap_or(false))
    }

    fn capture(&mut self) -> Result<CameraFrame, RbError> {
        let Some(cap) = self.capture.as_mut() else {
            return Err(RbError::camera(&self.id, "capture on a camera that is not open"));
        };

        let mut mat = Mat::default();
        let grabbed = cap.read(&mut mat).map_err(|e| RbError::camera(&self.id, e.to_string()))?;
        if !grabbed || mat.empty() {
            return Ok(CameraFrame::empty());
        }

        if self.preview {
            self.show(&mat);
        }

        let bytes_per_pixel = mat.elem_size().map_err(|e| self.cv_err(e))?;
        let data = mat.data_bytes().map_err(|e| self.cv_err(e))?.to_vec();
        Ok(CameraFrame {
            width: mat.cols() as u32,
            height: mat.rows() as u32,
            bytes_per_pixel,
            data,
        })
    }

    fn release(&mut self) {
        if let Some(mut cap) = self.capture.take() {
            if let Err(e) = cap.release() {
                warn!(camera = %self.id, error = %e, "failed to release capture device");
            }
            if self.preview {
                let _ = highgui::destroy_window(PREVIEW_WINDOW);
            }
        }
    }
}
