//! Reconnect loop around [`CameraSession`].
//!
//! The supervisor keeps trying until one session completes.  Whatever goes
//! wrong (refused connection, handshake timeout, a write failing halfway
//! through the frame loop) is handled the same way: release the camera, log,
//! sleep `retry_delay`, start over with a brand-new connection.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rbcam_bridge::{Connector, RosbridgeClient};
use rbcam_hal::Camera;
use rbcam_types::RbError;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

use crate::session::{CameraSession, SessionConfig, SessionReport, pause_unless_stopped};

/// Reconnect policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Fixed wait between attempts.
    pub retry_delay: Duration,
    /// Give up after this many failed attempts; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_secs(5),
            max_attempts: None,
        }
    }
}

pub struct Supervisor<C: Connector> {
    connector: C,
    session: CameraSession,
    config: SupervisorConfig,
    shutdown: Arc<AtomicBool>,
}

impl<C: Connector> Supervisor<C> {
    pub fn new(connector: C, session: SessionConfig, config: SupervisorConfig, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            connector,
            session: CameraSession::new(session, shutdown.clone()),
            config,
            shutdown,
        }
    }

    /// Retry until one session completes.
    ///
    /// Returns `Ok(Some(report))` after a completed session and `Ok(None)`
    /// when shutdown was requested before that happened.
    ///
    /// # Errors
    ///
    /// Only when `max_attempts` is set and exhausted; the last failure is
    /// returned.
    pub async fn run(&self, camera: &mut dyn Camera) -> Result<Option<SessionReport>, RbError> {
        let mut attempt: u32 = 0;
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                info!("shutdown requested, not reconnecting");
                return Ok(None);
            }
            attempt += 1;

            let session_id = Uuid::new_v4();
            let span = info_span!("session", %session_id, attempt, endpoint = %self.connector.target());
            match self.attempt(camera).instrument(span).await {
                Ok(report) => return Ok(Some(report)),
                Err(e) => {
                    camera.release();
                    if self.config.max_attempts.is_some_and(|max| attempt >= max) {
                        warn!(attempt, error = %e, "giving up");
                        return Err(e);
                    }
                    warn!(
                        attempt,
                        error = %e,
                        "could not connect: waiting {}s to retry",
                        self.config.retry_delay.as_secs()
                    );
                    if pause_unless_stopped(self.config.retry_delay, &self.shutdown).await {
                        info!("shutdown requested during retry wait");
                        return Ok(None);
                    }
                }
            }
        }
    }

    async fn attempt(&self, camera: &mut dyn Camera) -> Result<SessionReport, RbError> {
        let transport = self.connector.connect().await?;
        let codec = self.connector.codec();
        let mut client = RosbridgeClient::new(transport, codec);
        info!(peer = client.peer(), %codec, "connected");

        let report = self.session.run(&mut client, camera).await?;

        // The session already unadvertised; a failed close does not undo it.
        match client.close().await {
            Ok(()) => info!("closed connection"),
            Err(e) => warn!(error = %e, "closing the connection failed"),
        }
        Ok(report)
    }
}
