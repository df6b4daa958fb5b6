//! rosbridge v2 operations.
//!
//! Only the publisher half of the protocol is modelled.  Every operation
//! serialises to a flat document whose first field is `op`, e.g.
//!
//! ```json
//! {"op": "advertise", "topic": "/webcam/image", "type": "sensor_msgs/Image"}
//! ```

use rbcam_types::{Image, StringMsg};
use serde::Serialize;

/// A single rosbridge command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum RosbridgeOp {
    /// Declare `topic` with the given ROS message type.
    Advertise {
        topic: String,
        #[serde(rename = "type")]
        msg_type: String,
    },
    /// Retract a previously advertised topic.
    Unadvertise { topic: String },
    /// Publish one message on `topic`.
    Publish { topic: String, msg: RosMessage },
}

/// Message bodies this client can publish.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RosMessage {
    String(StringMsg),
    Image(Image),
}

impl RosbridgeOp {
    pub fn advertise(topic: impl Into<String>, msg_type: impl Into<String>) -> Self {
        RosbridgeOp::Advertise {
            topic: topic.into(),
            msg_type: msg_type.into(),
        }
    }

    pub fn unadvertise(topic: impl Into<String>) -> Self {
        RosbridgeOp::Unadvertise {
            topic: topic.into(),
        }
    }

    pub fn publish(topic: impl Into<String>, msg: RosMessage) -> Self {
        RosbridgeOp::Publish {
            topic: topic.into(),
            msg,
        }
    }

    /// The `op` field value.
    pub fn name(&self) -> &'static str {
        match self {
            RosbridgeOp::Advertise { .. } => "advertise",
            RosbridgeOp::Unadvertise { .. } => "unadvertise",
            RosbridgeOp::Publish { .. } => "publish",
        }
    }

    pub fn topic(&self) -> &str {
        match self {
            RosbridgeOp::Advertise { topic, .. }
            | RosbridgeOp::Unadvertise { topic }
            | RosbridgeOp::Publish { topic, .. } => topic,
        }
    }
}

impl From<StringMsg> for RosMessage {
    fn from(msg: StringMsg) -> Self {
        RosMessage::String(msg)
    }
}

impl From<Image> for RosMessage {
    fn from(image: Image) -> Self {
        RosMessage::Image(image)
    }
}
