use std::net::SocketAddr;
use std::time::Duration;

use tagline_core::Frame;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::transport::{Connector, Transport};

/// Largest frame body accepted from the wire
const MAX_FRAME_LEN: usize = 100 * 1024 * 1024;

const KIND_TEXT: u8 = 0;
const KIND_BINARY: u8 = 1;

/// TCP transport with length-prefix framing
///
/// Each frame is a 4-byte big-endian length, a one-byte kind
/// (text or binary), then the body. Text bodies must be UTF-8.
pub struct TcpTransport {
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
    send_timeout: Option<Duration>,
    receive_timeout: Option<Duration>,
}

impl TcpTransport {
    /// Connect to a remote TCP address with no timeouts
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        Self::builder().address(addr).connect().await
    }

    /// Create a builder for configuring the transport
    pub fn builder() -> TcpTransportBuilder {
        TcpTransportBuilder::new()
    }

    /// Create from an existing TcpStream
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        Self::with_timeouts(stream, None, None)
    }

    fn with_timeouts(
        stream: TcpStream,
        send_timeout: Option<Duration>,
        receive_timeout: Option<Duration>,
    ) -> Result<Self> {
        let peer_addr = stream.peer_addr()?;
        let local_addr = stream.local_addr()?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            peer_addr,
            local_addr,
            send_timeout,
            receive_timeout,
        })
    }

    /// Get the remote address of this connection
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Get the local address of this connection
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

fn closed_on_eof(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::ConnectionClosed
    } else {
        e.into()
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn send(&self, frame: Frame) -> Result<()> {
        let (kind, body) = match frame {
            Frame::Text(text) => (KIND_TEXT, text.into_bytes()),
            Frame::Binary(bytes) => (KIND_BINARY, bytes),
        };

        let send_op = async {
            let mut writer = self.writer.lock().await;

            // Length covers the kind byte plus the body
            let len = u32::try_from(body.len() + 1)
                .map_err(|_| Error::InvalidFrame(format!("Frame too large: {} bytes", body.len())))?;
            writer.write_u32(len).await?;
            writer.write_u8(kind).await?;
            writer.write_all(&body).await?;
            writer.flush().await?;

            Ok::<(), Error>(())
        };

        if let Some(timeout) = self.send_timeout {
            tokio::time::timeout(timeout, send_op)
                .await
                .map_err(|_| Error::Custom("Send timeout exceeded".to_string()))?
        } else {
            send_op.await
        }
    }

    async fn receive(&self) -> Result<Frame> {
        let receive_op = async {
            let mut reader = self.reader.lock().await;

            let len = reader.read_u32().await.map_err(closed_on_eof)? as usize;
            if len == 0 {
                return Err(Error::InvalidFrame("Missing frame kind".to_string()));
            }
            if len > MAX_FRAME_LEN {
                return Err(Error::InvalidFrame(format!("Frame too large: {} bytes", len)));
            }

            let kind = reader.read_u8().await.map_err(closed_on_eof)?;
            let mut body = vec![0u8; len - 1];
            reader.read_exact(&mut body).await.map_err(closed_on_eof)?;

            match kind {
                KIND_TEXT => String::from_utf8(body)
                    .map(Frame::Text)
                    .map_err(|e| Error::InvalidFrame(format!("Text frame is not UTF-8: {}", e))),
                KIND_BINARY => Ok(Frame::Binary(body)),
                other => Err(Error::InvalidFrame(format!("Unknown frame kind: {}", other))),
            }
        };

        if let Some(timeout) = self.receive_timeout {
            tokio::time::timeout(timeout, receive_op)
                .await
                .map_err(|_| Error::Custom("Receive timeout exceeded".to_string()))?
        } else {
            receive_op.await
        }
    }

    async fn close(&self) -> Result<()> {
        self.writer.lock().await.shutdown().await?;
        Ok(())
    }
}

/// TCP listener for accepting incoming connections
pub struct TcpTransportListener {
    listener: TcpListener,
}

impl TcpTransportListener {
    /// Bind to a local address
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// Accept an incoming connection
    pub async fn accept(&self) -> Result<(TcpTransport, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await?;
        Ok((TcpTransport::from_stream(stream)?, addr))
    }

    /// Get the local address this listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(Into::into)
    }
}

/// Builder for configuring TCP transport
#[derive(Debug, Clone, Default)]
pub struct TcpTransportBuilder {
    address: Option<SocketAddr>,
    connect_timeout: Option<Duration>,
    send_timeout: Option<Duration>,
    receive_timeout: Option<Duration>,
}

impl TcpTransportBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the address to connect to
    pub fn address(mut self, addr: SocketAddr) -> Self {
        self.address = Some(addr);
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the send timeout
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    /// Set the receive timeout
    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = Some(timeout);
        self
    }

    /// Connect with the configured settings
    pub async fn connect(&self) -> Result<TcpTransport> {
        let addr = self
            .address
            .ok_or_else(|| Error::Custom("Address not set".to_string()))?;

        let connect_op = TcpStream::connect(addr);

        let stream = if let Some(timeout) = self.connect_timeout {
            tokio::time::timeout(timeout, connect_op)
                .await
                .map_err(|_| Error::Custom("Connect timeout exceeded".to_string()))??
        } else {
            connect_op.await?
        };

        TcpTransport::with_timeouts(stream, self.send_timeout, self.receive_timeout)
    }

    /// Turn the settings into a reusable connector
    pub fn into_connector(self) -> TcpConnector {
        TcpConnector { builder: self }
    }
}

/// Connector that opens a fresh TCP transport per call
#[derive(Debug, Clone)]
pub struct TcpConnector {
    builder: TcpTransportBuilder,
}

impl TcpConnector {
    pub fn new(addr: SocketAddr) -> Self {
        TcpTransport::builder().address(addr).into_connector()
    }
}

#[async_trait::async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>> {
        let transport = self.builder.connect().await?;
        tracing::debug!(peer = %transport.peer_addr(), "tcp transport connected");
        Ok(Box::new(transport))
    }
}
