//! In-process transport pair over tokio channels.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex as SyncMutex;
use tagline_core::Frame;
use tokio::sync::{mpsc, Mutex, Notify};

use crate::error::{Error, Result};
use crate::transport::{Connector, Transport};

const CHANNEL_CAPACITY: usize = 64;

/// One end of an in-memory connection
pub struct MemoryTransport {
    tx: SyncMutex<Option<mpsc::Sender<Frame>>>,
    rx: Mutex<mpsc::Receiver<Frame>>,
    closed: AtomicBool,
    shutdown: Notify,
}

impl MemoryTransport {
    /// Two connected ends; what one sends the other receives
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_a) = mpsc::channel(CHANNEL_CAPACITY);
        let (tx_b, rx_b) = mpsc::channel(CHANNEL_CAPACITY);

        (
            Self {
                tx: SyncMutex::new(Some(tx_b)),
                rx: Mutex::new(rx_a),
                closed: AtomicBool::new(false),
                shutdown: Notify::new(),
            },
            Self {
                tx: SyncMutex::new(Some(tx_a)),
                rx: Mutex::new(rx_b),
                closed: AtomicBool::new(false),
                shutdown: Notify::new(),
            },
        )
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, frame: Frame) -> Result<()> {
        let tx = match self.tx.lock().as_ref() {
            Some(tx) if !self.is_closed() => tx.clone(),
            _ => return Err(Error::ConnectionClosed),
        };
        tx.send(frame).await.map_err(|_| Error::ConnectionClosed)
    }

    async fn receive(&self) -> Result<Frame> {
        // armed before the flag check so a concurrent close is not missed
        let shutdown = self.shutdown.notified();
        tokio::pin!(shutdown);
        shutdown.as_mut().enable();

        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        let mut rx = self.rx.lock().await;

        tokio::select! {
            frame = rx.recv() => frame.ok_or(Error::ConnectionClosed),
            _ = &mut shutdown => Err(Error::ConnectionClosed),
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        self.shutdown.notify_waiters();
        // dropping our sender ends the peer's receive
        self.tx.lock().take();
        self.rx.lock().await.close();
        Ok(())
    }
}

/// Connector producing in-memory transports
///
/// The far end of every connection is delivered to the paired
/// [`MemoryAcceptor`].
#[derive(Clone)]
pub struct MemoryConnector {
    accepted: mpsc::UnboundedSender<MemoryTransport>,
}

/// Receives the remote ends created by a [`MemoryConnector`]
pub struct MemoryAcceptor {
    incoming: mpsc::UnboundedReceiver<MemoryTransport>,
}

impl MemoryConnector {
    pub fn new() -> (Self, MemoryAcceptor) {
        let (accepted, incoming) = mpsc::unbounded_channel();
        (Self { accepted }, MemoryAcceptor { incoming })
    }
}

#[async_trait::async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>> {
        let (local, remote) = MemoryTransport::pair();
        self.accepted
            .send(remote)
            .map_err(|_| Error::Custom("Memory acceptor dropped".to_string()))?;
        Ok(Box::new(local))
    }
}

impl MemoryAcceptor {
    /// Wait for the next connection
    pub async fn accept(&mut self) -> Result<MemoryTransport> {
        self.incoming.recv().await.ok_or(Error::ConnectionClosed)
    }
}
