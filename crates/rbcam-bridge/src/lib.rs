//! `rbcam-bridge` – rosbridge v2 client plumbing.
//!
//! Turns ROS-style advertise / unadvertise / publish commands into wire
//! frames and pushes them to a rosbridge server.
//!
//! # Modules
//!
//! - [`protocol`] – [`RosbridgeOp`], the three operations this client speaks.
//! - [`codec`] – [`WireCodec`]: one BSON document (default) or one JSON object
//!   per operation.
//! - [`transport`] – the [`Transport`] trait with raw TCP, WebSocket and
//!   in-memory implementations.
//! - [`connector`] – [`Endpoint`] parsing and the [`Connector`] that opens a
//!   fresh transport for every connection attempt.
//! - [`client`] – [`RosbridgeClient`], the high-level advertise/publish API.

pub mod client;
pub mod codec;
pub mod connector;
pub mod protocol;
pub mod transport;

pub use client::{ClientStats, RosbridgeClient};
pub use codec::WireCodec;
pub use connector::{Connector, Endpoint, EndpointConnector};
pub use protocol::{RosMessage, RosbridgeOp};
pub use transport::{FrameLog, MemoryTransport, TcpTransport, Transport, WsTransport};
