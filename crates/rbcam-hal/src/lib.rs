//! `rbcam-hal` – camera drivers.
//!
//! # Modules
//!
//! - [`camera`] – the [`Camera`] trait and the owned [`CameraFrame`] buffer
//!   every driver hands back.
//! - [`sim`] – [`SimCamera`], a deterministic test-pattern generator for hosts
//!   without a capture device and for headless tests.
//! - `opencv_camera` – `OpenCvCamera` (feature `opencv-capture`), a
//!   `videoio::VideoCapture` driver with an optional HighGUI preview window.

pub mod camera;
#[cfg(feature = "opencv-capture")]
pub mod opencv_camera;
pub mod sim;

pub use camera::{Camera, CameraFrame};
#[cfg(feature = "opencv-capture")]
pub use opencv_camera::OpenCvCamera;
pub use sim::SimCamera;
