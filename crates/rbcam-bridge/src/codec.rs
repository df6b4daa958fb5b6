//! Wire codecs.
//!
//! rosbridge accepts either JSON text or raw BSON documents.  BSON is
//! self-delimiting (every document starts with its little-endian `i32`
//! length), so over raw TCP documents are simply written back to back.

use std::fmt;
use std::str::FromStr;

use rbcam_types::RbError;
use serde::{Deserialize, Serialize};

use crate::protocol::RosbridgeOp;

/// How operations are turned into bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireCodec {
    /// One BSON document per operation; image data as binary subtype 0x00.
    #[default]
    Bson,
    /// One JSON object per operation; image data as a number array.
    Json,
}

impl WireCodec {
    /// Serialise `op` into a single wire frame.
    ///
    /// # Errors
    ///
    /// Returns [`RbError::Encoding`] if the serializer rejects the value.
    pub fn encode(&self, op: &RosbridgeOp) -> Result<Vec<u8>, RbError> {
        match self {
            WireCodec::Bson => bson::to_vec(op)
                .map_err(|e| RbError::Encoding(format!("bson {} on {}: {e}", op.name(), op.topic()))),
            WireCodec::Json => serde_json::to_vec(op)
                .map_err(|e| RbError::Encoding(format!("json {} on {}: {e}", op.name(), op.topic()))),
        }
    }

    /// `true` when frames must travel as binary (WebSocket binary frames).
    pub fn is_binary(&self) -> bool {
        matches!(self, WireCodec::Bson)
    }
}

impl fmt::Display for WireCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireCodec::Bson => write!(f, "bson"),
            WireCodec::Json => write!(f, "json"),
        }
    }
}

impl FromStr for WireCodec {
    type Err = RbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bson" => Ok(WireCodec::Bson),
            "json" => Ok(WireCodec::Json),
            other => Err(RbError::Config(format!(
                "unknown codec '{other}' (expected 'bson' or 'json')"
            ))),
        }
    }
}
