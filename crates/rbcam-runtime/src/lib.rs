//! `rbcam-runtime` – session lifecycle.
//!
//! # Modules
//!
//! - [`session`] – [`CameraSession`]: one connected run of the fixed
//!   advertise → publish N frames → unadvertise sequence.
//! - [`supervisor`] – [`Supervisor`]: connects, runs a session, and on any
//!   failure releases the camera, sleeps a fixed delay and tries again.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber with an optional OTLP span exporter.

pub mod session;
pub mod supervisor;
pub mod telemetry;

pub use session::{CameraSession, SessionConfig, SessionReport};
pub use supervisor::{Supervisor, SupervisorConfig};
pub use telemetry::{TracerProviderGuard, init_tracing};
