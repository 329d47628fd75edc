use tagline_core::Frame;

use crate::error::Result;

pub mod intercept;
pub mod memory;
pub mod tcp;

pub use self::intercept::{InterceptedTransport, Interceptor, MessageHook, SendHook};
pub use self::memory::{MemoryAcceptor, MemoryConnector, MemoryTransport};
pub use self::tcp::{TcpConnector, TcpTransport, TcpTransportBuilder, TcpTransportListener};

/// Transport trait for exchanging frames
///
/// Each transport instance represents a single connection. Sending and
/// receiving may run concurrently from different tasks.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send a frame over the transport
    async fn send(&self, frame: Frame) -> Result<()>;

    /// Receive the next frame from the transport
    async fn receive(&self) -> Result<Frame>;

    /// Close the transport connection
    async fn close(&self) -> Result<()>;
}

/// Factory for new transports
///
/// The host registers one of these with the session; every transport is
/// created through it so the interceptor sees all traffic.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Transport>>;
}
