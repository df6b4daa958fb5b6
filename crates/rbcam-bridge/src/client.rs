//! High-level rosbridge publisher.
//!
//! [`RosbridgeClient`] owns a connected [`Transport`] and exposes the handful
//! of operations a camera publisher needs: advertise, publish a string or an
//! image, unadvertise, close.  It remembers which topics it advertised so
//! that they can all be retracted in order on the way out.

use rbcam_types::{Image, RbError, StringMsg};
use tracing::{debug, info};

use crate::codec::WireCodec;
use crate::protocol::{RosMessage, RosbridgeOp};
use crate::transport::Transport;

/// Counters kept by a [`RosbridgeClient`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStats {
    /// Wire frames handed to the transport.
    pub frames_sent: u64,
    /// Total encoded bytes handed to the transport.
    pub bytes_sent: u64,
    /// `publish` operations carrying an image.
    pub images_published: u64,
}

pub struct RosbridgeClient {
    transport: Box<dyn Transport>,
    codec: WireCodec,
    advertised: Vec<String>,
    stats: ClientStats,
}

impl RosbridgeClient {
    pub fn new(transport: Box<dyn Transport>, codec: WireCodec) -> Self {
        Self {
            transport,
            codec,
            advertised: Vec::new(),
            stats: ClientStats::default(),
        }
    }

    pub fn peer(&self) -> &str {
        self.transport.peer()
    }

    pub fn stats(&self) -> ClientStats {
        self.stats
    }

    /// Topics currently advertised, in advertise order.
    pub fn advertised(&self) -> &[String] {
        &self.advertised
    }

    /// Encode and send one operation.
    pub async fn send(&mut self, op: &RosbridgeOp) -> Result<(), RbError> {
        let frame = self.codec.encode(op)?;
        let len = frame.len() as u64;
        self.transport.send(frame).await?;
        self.stats.frames_sent += 1;
        self.stats.bytes_sent += len;
        debug!(op = op.name(), topic = op.topic(), bytes = len, "rosbridge frame sent");
        Ok(())
    }

    /// Advertise `topic` with `msg_type`.  Advertising the same topic twice
    /// sends the command again but tracks the topic once.
    pub async fn advertise(&mut self, topic: &str, msg_type: &str) -> Result<(), RbError> {
        self.send(&RosbridgeOp::advertise(topic, msg_type)).await?;
        if !self.advertised.iter().any(|t| t == topic) {
            self.advertised.push(topic.to_string());
        }
        info!(topic, msg_type, "topic advertised");
        Ok(())
    }

    /// Unadvertise `topic`.  The command is sent even if this client never
    /// advertised the topic.
    pub async fn unadvertise(&mut self, topic: &str) -> Result<(), RbError> {
        self.send(&RosbridgeOp::unadvertise(topic)).await?;
        self.advertised.retain(|t| t != topic);
        info!(topic, "topic unadvertised");
        Ok(())
    }

    /// Unadvertise every tracked topic in advertise order.
    pub async fn unadvertise_all(&mut self) -> Result<(), RbError> {
        for topic in std::mem::take(&mut self.advertised) {
            self.send(&RosbridgeOp::unadvertise(topic.as_str())).await?;
            info!(topic = %topic, "topic unadvertised");
        }
        Ok(())
    }

    /// Publish a `std_msgs/String`.  The text is echoed to the log as well.
    pub async fn publish_string(&mut self, topic: &str, text: &str) -> Result<(), RbError> {
        let msg = RosMessage::from(StringMsg::new(text));
        self.send(&RosbridgeOp::publish(topic, msg)).await?;
        info!(topic, "{text}");
        Ok(())
    }

    /// Publish a `sensor_msgs/Image`.
    pub async fn publish_image(&mut self, topic: &str, image: Image) -> Result<(), RbError> {
        let seq = image.header.seq;
        self.send(&RosbridgeOp::publish(topic, image.into())).await?;
        self.stats.images_published += 1;
        debug!(topic, seq, "image published");
        Ok(())
    }

    /// Close the underlying transport.
    pub async fn close(&mut self) -> Result<(), RbError> {
        self.transport.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{FrameLog, MemoryTransport};
    use bson::Document;
    use rbcam_types::{Header, PixelEncoding};

    fn client(log: &FrameLog) -> RosbridgeClient {
        RosbridgeClient::new(Box::new(MemoryTransport::new(log.clone())), WireCodec::Bson)
    }

    fn docs(log: &FrameLog) -> Vec<Document> {
        log.frames()
            .iter()
            .map(|f| bson::from_slice::<Document>(f).unwrap())
            .collect()
    }

    fn tiny_image(seq: u32) -> Image {
        Image {
            header: Header::stamped(seq, "webcam"),
            encoding: PixelEncoding::Mono8,
            is_bigendian: 0,
            height: 1,
            width: 2,
            step: 2,
            data: vec![7, 8],
        }
    }

    #[tokio::test]
    async fn advertise_then_unadvertise_all_in_order() {
        let log = FrameLog::new();
        let mut c = client(&log);
        c.advertise("/a", "std_msgs/String").await.unwrap();
        c.advertise("/b", "sensor_msgs/Image").await.unwrap();
        c.advertise("/a", "std_msgs/String").await.unwrap();
        assert_eq!(c.advertised(), ["/a".to_string(), "/b".to_string()]);

        c.unadvertise_all().await.unwrap();
        assert!(c.advertised().is_empty());

        let docs = docs(&log);
        assert_eq!(docs.len(), 5);
        assert_eq!(docs[3].get_str("op").unwrap(), "unadvertise");
        assert_eq!(docs[3].get_str("topic").unwrap(), "/a");
        assert_eq!(docs[4].get_str("topic").unwrap(), "/b");
    }

    #[tokio::test]
    async fn unadvertise_unknown_topic_still_sends() {
        let log = FrameLog::new();
        let mut c = client(&log);
        c.unadvertise("/never").await.unwrap();
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn publish_string_and_image_update_stats() {
        let log = FrameLog::new();
        let mut c = client(&log);
        c.publish_string("/status", "hello").await.unwrap();
        c.publish_image("/image", tiny_image(4)).await.unwrap();

        let stats = c.stats();
        assert_eq!(stats.frames_sent, 2);
        assert_eq!(stats.images_published, 1);
        let total: usize = log.frames().iter().map(Vec::len).sum();
        assert_eq!(stats.bytes_sent, total as u64);

        let docs = docs(&log);
        let msg = docs[1].get_document("msg").unwrap();
        assert_eq!(msg.get_binary_generic("data").unwrap(), &vec![7u8, 8]);
    }

    #[tokio::test]
    async fn transport_failure_is_propagated_and_not_counted() {
        let log = FrameLog::new();
        let mut c = RosbridgeClient::new(Box::new(MemoryTransport::new(log.clone()).fail_after(1)), WireCodec::Json);
        c.publish_string("/status", "first").await.unwrap();
        let err = c.publish_string("/status", "second").await.unwrap_err();
        assert!(matches!(err, RbError::Transport(_)));
        assert_eq!(c.stats().frames_sent, 1);
    }

    #[tokio::test]
    async fn close_closes_transport() {
        let log = FrameLog::new();
        let mut c = client(&log);
        c.close().await.unwrap();
        assert!(log.is_closed());
        assert!(c.publish_string("/status", "late").await.is_err());
    }
}
