//! One connected camera session.
//!
//! [`CameraSession::run`] drives the whole conversation with the rosbridge
//! server for a single connection:
//!
//! 1. advertise the image and status topics,
//! 2. open the camera and report the outcome on the status topic,
//! 3. wait the settle delay so subscribers can latch on,
//! 4. announce and then capture and publish `frame_count` images, one status
//!    line each,
//! 5. unadvertise both topics, release the camera, wait the settle delay.
//!
//! Every status line is published on the status topic and echoed to the log.
//! A transport or encoding error aborts the session immediately; the caller
//! decides whether to reconnect.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rbcam_bridge::{ClientStats, RosbridgeClient};
use rbcam_hal::Camera;
use rbcam_types::{
    DEFAULT_FRAME_ID, DEFAULT_IMAGE_TOPIC, DEFAULT_STATUS_TOPIC, Header, IMAGE_MSG_TYPE, RbError,
    STRING_MSG_TYPE,
};
use tracing::{info, warn};

/// Granularity of interruptible waits.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Tunables of a [`CameraSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub image_topic: String,
    pub status_topic: String,
    /// `frame_id` written into every image header.
    pub frame_id: String,
    /// Number of images published per session.
    pub frame_count: u32,
    /// Pause after every published image.
    pub frame_interval: Duration,
    /// Pause after advertising and again before disconnecting.
    pub settle_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            image_topic: DEFAULT_IMAGE_TOPIC.to_string(),
            status_topic: DEFAULT_STATUS_TOPIC.to_string(),
            frame_id: DEFAULT_FRAME_ID.to_string(),
            frame_count: 300,
            frame_interval: Duration::from_millis(50),
            settle_delay: Duration::from_secs(2),
        }
    }
}

/// Outcome of a session that reached the end of its sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReport {
    /// Whether the camera opened.
    pub camera_ok: bool,
    pub frames_published: u32,
    /// Captures that delivered no pixels and were skipped.
    pub empty_frames: u32,
    /// `true` when shutdown was requested before all frames were sent.
    pub interrupted: bool,
    pub stats: ClientStats,
}

pub struct CameraSession {
    config: SessionConfig,
    shutdown: Arc<AtomicBool>,
}

impl CameraSession {
    pub fn new(config: SessionConfig, shutdown: Arc<AtomicBool>) -> Self {
        Self { config, shutdown }
    }

    /// Run the full sequence over `client`, capturing from `camera`.
    ///
    /// The camera is opened here and released before returning `Ok`.  On
    /// `Err` the camera may still be open; the caller must release it.
    ///
    /// # Errors
    ///
    /// Any [`RbError`] raised by the client (transport or encoding).
    pub async fn run(
        &self,
        client: &mut RosbridgeClient,
        camera: &mut dyn Camera,
    ) -> Result<SessionReport, RbError> {
        let cfg = &self.config;
        let mut report = SessionReport::default();

        client.advertise(&cfg.image_topic, IMAGE_MSG_TYPE).await?;
        client.advertise(&cfg.status_topic, STRING_MSG_TYPE).await?;

        report.camera_ok = self.initialize_camera(client, camera).await?;

        self.status(
            client,
            &format!("Advertising both topics... Waiting {} secs", secs(cfg.settle_delay)),
        )
        .await?;
        report.interrupted = self.pause(cfg.settle_delay).await;

        if !report.interrupted {
            self.status(client, &format!("Publishing the image {} times", cfg.frame_count))
                .await?;
            if report.camera_ok {
                self.publish_frames(client, camera, &mut report).await?;
            } else {
                self.status(client, "Camera unavailable, no images will be published")
                    .await?;
            }
        }

        self.status(
            client,
            &format!("Unadvertising... Finishing in {} secs", secs(cfg.settle_delay)),
        )
        .await?;
        client.unadvertise(&cfg.image_topic).await?;
        client.unadvertise(&cfg.status_topic).await?;

        self.stop(client, camera).await?;

        if !report.interrupted {
            report.interrupted = self.pause(cfg.settle_delay).await;
        }

        report.stats = client.stats();
        info!(
            frames = report.frames_published,
            empty = report.empty_frames,
            interrupted = report.interrupted,
            bytes = report.stats.bytes_sent,
            "session finished"
        );
        Ok(report)
    }

    async fn initialize_camera(
        &self,
        client: &mut RosbridgeClient,
        camera: &mut dyn Camera,
    ) -> Result<bool, RbError> {
        match camera.open() {
            Ok(()) => {
                self.status(client, "Camera initialized correctly").await?;
                Ok(true)
            }
            Err(e) => {
                warn!(camera = camera.id(), error = %e, "camera initialization failed");
                self.status(client, "Error while initializing camera").await?;
                Ok(false)
            }
        }
    }

    async fn publish_frames(
        &self,
        client: &mut RosbridgeClient,
        camera: &mut dyn Camera,
        report: &mut SessionReport,
    ) -> Result<(), RbError> {
        let cfg = &self.config;
        let sent_line = format!("Image sent, waiting {}ms", cfg.frame_interval.as_millis());
        for seq in 0..cfg.frame_count {
            if self.stopping() {
                report.interrupted = true;
                break;
            }

            let frame = camera.capture().unwrap_or_else(|e| {
                warn!(camera = camera.id(), seq, error = %e, "capture failed");
                rbcam_hal::CameraFrame::empty()
            });

            if frame.is_empty() {
                report.empty_frames += 1;
                self.status(client, "Empty image").await?;
            } else {
                let image = frame.into_image(Header::stamped(seq, cfg.frame_id.as_str()));
                client.publish_image(&cfg.image_topic, image).await?;
                report.frames_published += 1;
                self.status(client, &sent_line).await?;
            }

            if self.pause(cfg.frame_interval).await {
                report.interrupted = true;
                break;
            }
        }
        Ok(())
    }

    async fn stop(&self, client: &mut RosbridgeClient, camera: &mut dyn Camera) -> Result<(), RbError> {
        camera.release();
        self.status(client, "Camera stopped").await
    }

    async fn status(&self, client: &mut RosbridgeClient, text: &str) -> Result<(), RbError> {
        client.publish_string(&self.config.status_topic, text).await
    }

    fn stopping(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early on shutdown.  Returns `true` if
    /// shutdown was requested.
    async fn pause(&self, duration: Duration) -> bool {
        pause_unless_stopped(duration, &self.shutdown).await
    }
}

pub(crate) async fn pause_unless_stopped(duration: Duration, shutdown: &AtomicBool) -> bool {
    let mut remaining = duration;
    while !remaining.is_zero() {
        if shutdown.load(Ordering::SeqCst) {
            return true;
        }
        let slice = remaining.min(SHUTDOWN_POLL);
        tokio::time::sleep(slice).await;
        remaining -= slice;
    }
    shutdown.load(Ordering::SeqCst)
}

fn secs(d: Duration) -> String {
    if d.subsec_millis() == 0 {
        d.as_secs().to_string()
    } else {
        format!("{:.1}", d.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::Document;
    use rbcam_bridge::{FrameLog, MemoryTransport, WireCodec};
    use rbcam_hal::SimCamera;

    fn quick_config(frames: u32) -> SessionConfig {
        SessionConfig {
            frame_count: frames,
            frame_interval: Duration::ZERO,
            settle_delay: Duration::ZERO,
            ..SessionConfig::default()
        }
    }

    fn decode(log: &FrameLog) -> Vec<Document> {
        log.frames()
            .iter()
            .map(|f| bson::from_slice::<Document>(f).unwrap())
            .collect()
    }

    fn status_lines(docs: &[Document]) -> Vec<String> {
        docs.iter()
            .filter(|d| d.get_str("op").ok() == Some("publish"))
            .filter(|d| d.get_str("topic").ok() == Some(DEFAULT_STATUS_TOPIC))
            .map(|d| d.get_document("msg").unwrap().get_str("data").unwrap().to_string())
            .collect()
    }

    fn memory_client(log: &FrameLog) -> RosbridgeClient {
        RosbridgeClient::new(Box::new(MemoryTransport::new(log.clone())), WireCodec::Bson)
    }

    #[tokio::test]
    async fn full_sequence_in_order() {
        let log = FrameLog::new();
        let mut client = memory_client(&log);
        let mut camera = SimCamera::new("sim").with_size(4, 2);
        let session = CameraSession::new(quick_config(3), Arc::new(AtomicBool::new(false)));

        let report = session.run(&mut client, &mut camera).await.unwrap();
        assert!(report.camera_ok);
        assert_eq!(report.frames_published, 3);
        assert!(!report.interrupted);
        assert!(!camera.is_opened());

        let docs = decode(&log);
        let ops: Vec<(&str, &str)> = docs
            .iter()
            .map(|d| (d.get_str("op").unwrap(), d.get_str("topic").unwrap()))
            .collect();
        assert_eq!(ops[0], ("advertise", DEFAULT_IMAGE_TOPIC));
        assert_eq!(ops[1], ("advertise", DEFAULT_STATUS_TOPIC));
        let n = ops.len();
        assert_eq!(ops[n - 3], ("unadvertise", DEFAULT_IMAGE_TOPIC));
        assert_eq!(ops[n - 2], ("unadvertise", DEFAULT_STATUS_TOPIC));
        assert_eq!(ops[n - 1], ("publish", DEFAULT_STATUS_TOPIC));

        assert_eq!(
            status_lines(&docs),
            vec![
                "Camera initialized correctly",
                "Advertising both topics... Waiting 0 secs",
                "Publishing the image 3 times",
                "Image sent, waiting 0ms",
                "Image sent, waiting 0ms",
                "Image sent, waiting 0ms",
                "Unadvertising... Finishing in 0 secs",
                "Camera stopped",
            ]
        );
    }

    #[tokio::test]
    async fn image_headers_count_up_from_zero() {
        let log = FrameLog::new();
        let mut client = memory_client(&log);
        let mut camera = SimCamera::new("sim").with_size(2, 2).mono();
        let session = CameraSession::new(quick_config(2), Arc::new(AtomicBool::new(false)));
        session.run(&mut client, &mut camera).await.unwrap();

        let images: Vec<Document> = decode(&log)
            .into_iter()
            .filter(|d| d.get_str("topic").ok() == Some(DEFAULT_IMAGE_TOPIC) && d.get_str("op").ok() == Some("publish"))
            .collect();
        assert_eq!(images.len(), 2);
        for (i, doc) in images.iter().enumerate() {
            let msg = doc.get_document("msg").unwrap();
            assert_eq!(msg.get_str("encoding").unwrap(), "mono8");
            let header = msg.get_document("header").unwrap();
            assert_eq!(header.get_str("frame_id").unwrap(), DEFAULT_FRAME_ID);
            let seq = header.get("seq").and_then(|b| b.as_i64().or(b.as_i32().map(i64::from))).unwrap();
            assert_eq!(seq, i as i64);
        }
    }

    #[tokio::test]
    async fn camera_failure_skips_frames_but_finishes() {
        let log = FrameLog::new();
        let mut client = memory_client(&log);
        let mut camera = SimCamera::new("sim").failing_open();
        let session = CameraSession::new(quick_config(5), Arc::new(AtomicBool::new(false)));

        let report = session.run(&mut client, &mut camera).await.unwrap();
        assert!(!report.camera_ok);
        assert_eq!(report.frames_published, 0);

        assert_eq!(
            status_lines(&decode(&log)),
            vec![
                "Error while initializing camera",
                "Advertising both topics... Waiting 0 secs",
                "Publishing the image 5 times",
                "Camera unavailable, no images will be published",
                "Unadvertising... Finishing in 0 secs",
                "Camera stopped",
            ]
        );
    }

    #[tokio::test]
    async fn capture_errors_publish_empty_image() {
        let log = FrameLog::new();
        let mut client = memory_client(&log);
        let mut camera = SimCamera::new("sim").with_size(2, 2).failing_capture_every(3);
        let session = CameraSession::new(quick_config(3), Arc::new(AtomicBool::new(false)));

        let report = session.run(&mut client, &mut camera).await.unwrap();
        assert_eq!(report.frames_published, 2);
        assert_eq!(report.empty_frames, 1);
        assert_eq!(report.stats.images_published, 2);

        let lines = status_lines(&decode(&log));
        assert_eq!(lines[5], "Empty image");
        assert_eq!(lines.iter().filter(|l| *l == "Empty image").count(), 1);
    }

    #[tokio::test]
    async fn empty_frames_are_reported_not_published() {
        let log = FrameLog::new();
        let mut client = memory_client(&log);
        let mut camera = SimCamera::new("sim").with_size(2, 2).with_empty_every(2);
        let session = CameraSession::new(quick_config(4), Arc::new(AtomicBool::new(false)));

        let report = session.run(&mut client, &mut camera).await.unwrap();
        assert_eq!(report.frames_published, 2);
        assert_eq!(report.empty_frames, 2);
        assert_eq!(report.stats.images_published, 2);
        let lines = status_lines(&decode(&log));
        assert_eq!(lines.iter().filter(|l| *l == "Empty image").count(), 2);
    }

    #[tokio::test]
    async fn shutdown_still_unadvertises() {
        let log = FrameLog::new();
        let mut client = memory_client(&log);
        let mut camera = SimCamera::new("sim").with_size(2, 2);
        let session = CameraSession::new(quick_config(100), Arc::new(AtomicBool::new(true)));

        let report = session.run(&mut client, &mut camera).await.unwrap();
        assert!(report.interrupted);
        assert_eq!(report.frames_published, 0);
        assert!(!camera.is_opened());

        let docs = decode(&log);
        let unadvertised = docs
            .iter()
            .filter(|d| d.get_str("op").ok() == Some("unadvertise"))
            .count();
        assert_eq!(unadvertised, 2);
    }

    #[tokio::test]
    async fn transport_error_aborts_session() {
        let log = FrameLog::new();
        let mut client = RosbridgeClient::new(
            Box::new(MemoryTransport::new(log.clone()).fail_after(6)),
            WireCodec::Bson,
        );
        let mut camera = SimCamera::new("sim").with_size(2, 2);
        let session = CameraSession::new(quick_config(10), Arc::new(AtomicBool::new(false)));

        let err = session.run(&mut client, &mut camera).await.unwrap_err();
        assert!(matches!(err, RbError::Transport(_)));
        assert_eq!(log.len(), 6);
        // The caller owns the cleanup after a failed session.
        assert!(camera.is_opened());
    }

    #[tokio::test]
    async fn pause_wakes_on_shutdown() {
        let flag = AtomicBool::new(true);
        let started = std::time::Instant::now();
        assert!(pause_unless_stopped(Duration::from_secs(30), &flag).await);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn secs_formats_whole_and_fractional() {
        assert_eq!(secs(Duration::from_secs(2)), "2");
        assert_eq!(secs(Duration::from_millis(1500)), "1.5");
    }
}
