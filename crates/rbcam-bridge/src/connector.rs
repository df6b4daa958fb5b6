//! Endpoint parsing and connection factories.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use rbcam_types::RbError;

use crate::codec::WireCodec;
use crate::transport::{TcpTransport, Transport, WsTransport};

/// Default time allowed for a TCP connect or WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the rosbridge server lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Raw TCP socket (`rosbridge_tcp`).
    Tcp { host: String, port: u16 },
    /// WebSocket URL (`rosbridge_websocket`), `ws://` or `wss://`.
    WebSocket { url: String },
}

impl Endpoint {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Endpoint::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Parse `ws://…`, `wss://…`, `tcp://host:port` or bare `host:port`.
    pub fn parse(s: &str) -> Result<Self, RbError> {
        let s = s.trim();
        if s.starts_with("ws://") || s.starts_with("wss://") {
            return Ok(Endpoint::WebSocket { url: s.to_string() });
        }
        let addr = s.strip_prefix("tcp://").unwrap_or(s);
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| RbError::Config(format!("endpoint '{s}' has no port")))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| RbError::Config(format!("endpoint '{s}' has an invalid port")))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(RbError::Config(format!("endpoint '{s}' has no host")));
        }
        Ok(Endpoint::tcp(host, port))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            Endpoint::WebSocket { url } => f.write_str(url),
        }
    }
}

/// Produces a fresh [`Transport`] for every connection attempt.
///
/// The connector also owns the wire codec, since a WebSocket transport must
/// know whether its frames are text or binary.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Transport>, RbError>;

    /// Codec the transports handed out by [`Connector::connect`] expect.
    fn codec(&self) -> WireCodec;

    /// Target description for logs.
    fn target(&self) -> String;
}

/// Connects to an [`Endpoint`] with a bounded handshake time.
#[derive(Debug, Clone)]
pub struct EndpointConnector {
    endpoint: Endpoint,
    codec: WireCodec,
    timeout: Duration,
}

impl EndpointConnector {
    pub fn new(endpoint: Endpoint, codec: WireCodec) -> Self {
        Self {
            endpoint,
            codec,
            timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Connector for EndpointConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, RbError> {
        let attempt = async {
            let transport: Box<dyn Transport> = match &self.endpoint {
                Endpoint::Tcp { host, port } => Box::new(TcpTransport::connect(host, *port).await?),
                Endpoint::WebSocket { url } => Box::new(WsTransport::connect(url, !self.codec.is_binary()).await?),
            };
            Ok::<_, RbError>(transport)
        };
        tokio::time::timeout(self.timeout, attempt)
            .await
            .map_err(|_| RbError::Transport(format!("connect to {} timed out after {:?}", self.endpoint, self.timeout)))?
    }

    fn codec(&self) -> WireCodec {
        self.codec
    }

    fn target(&self) -> String {
        self.endpoint.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RosbridgeClient;
    use futures_util::StreamExt;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;

    #[test]
    fn parses_tcp_forms() {
        assert_eq!(Endpoint::parse("127.0.0.1:9090").unwrap(), Endpoint::tcp("127.0.0.1", 9090));
        assert_eq!(Endpoint::parse("tcp://robot:9091").unwrap(), Endpoint::tcp("robot", 9091));
        assert_eq!(Endpoint::parse("[::1]:9090").unwrap(), Endpoint::tcp("::1", 9090));
    }

    #[test]
    fn parses_websocket_urls() {
        assert_eq!(
            Endpoint::parse("ws://localhost:9090").unwrap(),
            Endpoint::WebSocket {
                url: "ws://localhost:9090".to_string()
            }
        );
        assert!(matches!(Endpoint::parse("wss://robot/bridge").unwrap(), Endpoint::WebSocket { .. }));
    }

    #[test]
    fn rejects_bad_endpoints() {
        assert!(Endpoint::parse("localhost").is_err());
        assert!(Endpoint::parse("localhost:http").is_err());
        assert!(Endpoint::parse(":9090").is_err());
    }

    #[test]
    fn display_round_trips() {
        let ep = Endpoint::tcp("10.0.0.2", 9090);
        assert_eq!(ep.to_string(), "tcp://10.0.0.2:9090");
        assert_eq!(Endpoint::parse(&ep.to_string()).unwrap(), ep);
    }

    #[tokio::test]
    async fn endpoint_connector_opens_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            socket.read_to_end(&mut buf).await.unwrap();
            buf
        });

        let connector = EndpointConnector::new(Endpoint::tcp("127.0.0.1", port), WireCodec::Bson);
        let mut transport = connector.connect().await.unwrap();
        transport.send(b"ping".to_vec()).await.unwrap();
        transport.close().await.unwrap();

        assert_eq!(server.await.unwrap(), b"ping".to_vec());
        assert_eq!(connector.target(), format!("tcp://127.0.0.1:{port}"));
    }

    /// Advertise one topic over a real WebSocket and return what the server
    /// received before the close frame.
    async fn advertise_over_websocket(codec: WireCodec) -> Vec<Message> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            let mut received = Vec::new();
            while let Some(Ok(msg)) = ws.next().await {
                if msg.is_close() {
                    break;
                }
                received.push(msg);
            }
            received
        });

        let connector = EndpointConnector::new(
            Endpoint::WebSocket {
                url: format!("ws://127.0.0.1:{port}"),
            },
            codec,
        );
        let mut client = RosbridgeClient::new(connector.connect().await.unwrap(), connector.codec());
        client.advertise("/webcam/image_status", "std_msgs/String").await.unwrap();
        client.close().await.unwrap();
        server.await.unwrap()
    }

    #[tokio::test]
    async fn websocket_json_goes_out_as_text() {
        let received = advertise_over_websocket(WireCodec::Json).await;
        assert_eq!(received.len(), 1);
        let Message::Text(text) = &received[0] else {
            panic!("expected a text frame, got {:?}", received[0]);
        };
        let json: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(json["op"], "advertise");
        assert_eq!(json["type"], "std_msgs/String");
    }

    #[tokio::test]
    async fn websocket_bson_goes_out_as_binary() {
        let received = advertise_over_websocket(WireCodec::Bson).await;
        assert_eq!(received.len(), 1);
        let Message::Binary(data) = &received[0] else {
            panic!("expected a binary frame, got {:?}", received[0]);
        };
        let doc: bson::Document = bson::from_slice(&data[..]).unwrap();
        assert_eq!(doc.get_str("op").unwrap(), "advertise");
        assert_eq!(doc.get_str("topic").unwrap(), "/webcam/image_status");
    }

    #[test]
    fn connector_reports_its_codec() {
        let connector = EndpointConnector::new(Endpoint::tcp("127.0.0.1", 9090), WireCodec::Json);
        assert_eq!(connector.codec(), WireCodec::Json);
    }
}
