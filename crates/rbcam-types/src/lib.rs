use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Topic the camera frames are published on.
pub const DEFAULT_IMAGE_TOPIC: &str = "/webcam/image";
/// ROS message type of [`DEFAULT_IMAGE_TOPIC`].
pub const IMAGE_MSG_TYPE: &str = "sensor_msgs/Image";
/// Topic the human-readable progress strings are published on.
pub const DEFAULT_STATUS_TOPIC: &str = "/webcam/image_status";
/// ROS message type of [`DEFAULT_STATUS_TOPIC`].
pub const STRING_MSG_TYPE: &str = "std_msgs/String";
/// `frame_id` stamped into every image header.
pub const DEFAULT_FRAME_ID: &str = "webcam";

/// Pixel layout of a published image.
///
/// Only two layouts exist: single-channel frames are `mono8`, everything else
/// is sent as packed `bgr8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelEncoding {
    Mono8,
    Bgr8,
}

impl PixelEncoding {
    /// Pick the encoding from the size of one pixel in bytes.
    pub fn from_bytes_per_pixel(bytes_per_pixel: usize) -> Self {
        if bytes_per_pixel == 1 {
            PixelEncoding::Mono8
        } else {
            PixelEncoding::Bgr8
        }
    }

    /// The ROS encoding string (`"mono8"` / `"bgr8"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            PixelEncoding::Mono8 => "mono8",
            PixelEncoding::Bgr8 => "bgr8",
        }
    }
}

impl std::fmt::Display for PixelEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ROS `time` primitive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Time {
    pub secs: u32,
    pub nsecs: u32,
}

impl Time {
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Convert a wall-clock timestamp.  Instants before the Unix epoch clamp
    /// to zero.
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self {
            secs: u32::try_from(at.timestamp()).unwrap_or(0),
            nsecs: at.timestamp_subsec_nanos(),
        }
    }
}

/// `std_msgs/Header`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub seq: u32,
    pub stamp: Time,
    pub frame_id: String,
}

impl Header {
    /// Header stamped with the current wall-clock time.
    pub fn stamped(seq: u32, frame_id: impl Into<String>) -> Self {
        Self {
            seq,
            stamp: Time::now(),
            frame_id: frame_id.into(),
        }
    }
}

/// `sensor_msgs/Image`.
///
/// `data` goes over the wire as a BSON binary (subtype generic) and as a
/// plain byte array in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub header: Header,
    pub encoding: PixelEncoding,
    pub is_bigendian: u8,
    pub height: u32,
    pub width: u32,
    /// Row length in bytes.
    pub step: u32,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

/// `std_msgs/String`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringMsg {
    pub data: String,
}

impl StringMsg {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }
}

/// Error type shared by every rbcam crate.
#[derive(Error, Debug)]
pub enum RbError {
    #[error("Camera fault on {device}: {details}")]
    Camera { device: String, details: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not connected to a rosbridge server")]
    NotConnected,
}

impl RbError {
    pub fn camera(device: impl Into<String>, details: impl Into<String>) -> Self {
        RbError::Camera {
            device: device.into(),
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_image() -> Image {
        Image {
            header: Header {
                seq: 7,
                stamp: Time { secs: 10, nsecs: 20 },
                frame_id: DEFAULT_FRAME_ID.to_string(),
            },
            encoding: PixelEncoding::Mono8,
            is_bigendian: 0,
            height: 2,
            width: 3,
            step: 3,
            data: vec![1, 2, 3, 4, 5, 6],
        }
    }

    #[test]
    fn encoding_follows_pixel_size() {
        assert_eq!(PixelEncoding::from_bytes_per_pixel(1), PixelEncoding::Mono8);
        assert_eq!(PixelEncoding::from_bytes_per_pixel(3), PixelEncoding::Bgr8);
        assert_eq!(PixelEncoding::from_bytes_per_pixel(4), PixelEncoding::Bgr8);
        assert_eq!(PixelEncoding::Mono8.as_str(), "mono8");
        assert_eq!(PixelEncoding::Bgr8.to_string(), "bgr8");
    }

    #[test]
    fn image_json_uses_ros_field_names() {
        let json = serde_json::to_value(sample_image()).unwrap();
        assert_eq!(json["encoding"], "mono8");
        assert_eq!(json["header"]["frame_id"], "webcam");
        assert_eq!(json["header"]["stamp"]["secs"], 10);
        assert_eq!(json["step"], 3);
        assert_eq!(json["data"].as_array().unwrap().len(), 6);
    }

    #[test]
    fn image_data_is_bson_binary() {
        let doc = bson::to_document(&sample_image()).unwrap();
        let data = doc.get_binary_generic("data").unwrap();
        assert_eq!(data, &vec![1u8, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn time_clamps_pre_epoch() {
        let at = DateTime::<Utc>::from_timestamp(-5, 0).unwrap();
        assert_eq!(Time::from_datetime(at).secs, 0);
        let at = DateTime::<Utc>::from_timestamp(1_700_000_000, 42).unwrap();
        let t = Time::from_datetime(at);
        assert_eq!(t.secs, 1_700_000_000);
        assert_eq!(t.nsecs, 42);
    }

    #[test]
    fn error_messages_name_the_device() {
        let err = RbError::camera("cam0", "device busy");
        assert_eq!(err.to_string(), "Camera fault on cam0: device busy");
    }
}
