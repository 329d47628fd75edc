//! Transport Interceptor: makes every frame, in both directions, observable.
//!
//! Hooks are installed once per interceptor. From then on every transport
//! created through it gets an inbound pump feeding the message hook, and
//! every outbound frame passes through the send hook, which may rewrite it
//! or suppress it entirely. Created transports are kept in an append-only
//! list; the newest one is the active transport.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::Mutex;
use tagline_core::Frame;

use crate::config::Config;
use crate::error::{Error, Result, TimeoutKind};
use crate::transport::{Connector, Transport};
use crate::wait::wait_for;

/// Receives every inbound frame
pub type MessageHook = Arc<dyn Fn(Frame) + Send + Sync>;

/// Sees every outbound frame; `None` suppresses transmission
pub type SendHook = Arc<dyn Fn(Frame) -> Option<Frame> + Send + Sync>;

#[derive(Clone)]
struct Hooks {
    on_message: MessageHook,
    on_send: SendHook,
}

pub struct Interceptor {
    hooks: OnceLock<Hooks>,
    transports: Mutex<Vec<Arc<InterceptedTransport>>>,
    poll_interval: Duration,
    wait_bound: Duration,
}

impl Interceptor {
    pub fn new(config: &Config) -> Self {
        Self {
            hooks: OnceLock::new(),
            transports: Mutex::new(Vec::new()),
            poll_interval: config.poll_interval,
            wait_bound: config.transport_wait,
        }
    }

    /// Route all future transports through `on_message` and `on_send`.
    ///
    /// Fails if hooks were already installed.
    pub fn install_hook<M, S>(&self, on_message: M, on_send: S) -> Result<()>
    where
        M: Fn(Frame) + Send + Sync + 'static,
        S: Fn(Frame) -> Option<Frame> + Send + Sync + 'static,
    {
        let hooks = Hooks {
            on_message: Arc::new(on_message),
            on_send: Arc::new(on_send),
        };
        self.hooks.set(hooks).map_err(|_| Error::HookAlreadyInstalled)?;
        tracing::debug!("interception hooks installed");
        Ok(())
    }

    pub fn is_installed(&self) -> bool {
        self.hooks.get().is_some()
    }

    /// Create a transport through `connector` and start intercepting it
    pub async fn open(&self, connector: &dyn Connector) -> Result<Arc<InterceptedTransport>> {
        if !self.is_installed() {
            return Err(Error::HookNotInstalled);
        }
        let transport = connector.connect().await?;
        self.adopt_boxed(transport)
    }

    /// Start intercepting an already created transport
    ///
    /// Must be called from within a tokio runtime.
    pub fn adopt(&self, transport: impl Transport + 'static) -> Result<Arc<InterceptedTransport>> {
        self.adopt_boxed(Box::new(transport))
    }

    fn adopt_boxed(&self, transport: Box<dyn Transport>) -> Result<Arc<InterceptedTransport>> {
        let hooks = self.hooks.get().cloned().ok_or(Error::HookNotInstalled)?;
        let inner: Arc<dyn Transport> = Arc::from(transport);

        let mut transports = self.transports.lock();
        let index = transports.len();
        let intercepted = Arc::new(InterceptedTransport {
            index,
            inner: Arc::clone(&inner),
            on_send: hooks.on_send,
        });
        transports.push(Arc::clone(&intercepted));
        drop(transports);

        tokio::spawn(pump(index, inner, hooks.on_message));
        tracing::debug!(index, "transport created");
        Ok(intercepted)
    }

    /// Most recently created transport, if any
    pub fn active_transport(&self) -> Option<Arc<InterceptedTransport>> {
        self.transports.lock().last().cloned()
    }

    /// Wait for a transport to exist, then return the newest one
    pub async fn acquire_active_transport(&self) -> Result<Arc<InterceptedTransport>> {
        wait_for(
            || self.active_transport(),
            self.poll_interval,
            self.wait_bound,
            TimeoutKind::Transport,
        )
        .await
    }

    /// Number of transports created so far
    pub fn transport_count(&self) -> usize {
        self.transports.lock().len()
    }
}

async fn pump(index: usize, transport: Arc<dyn Transport>, on_message: MessageHook) {
    loop {
        match transport.receive().await {
            Ok(frame) => on_message(frame),
            Err(Error::ConnectionClosed) => {
                tracing::debug!(index, "transport closed, inbound pump stopped");
                break;
            }
            Err(e) => {
                tracing::warn!(index, error = %e, "inbound pump stopped");
                break;
            }
        }
    }
}

/// A transport whose sends pass through the installed send hook
pub struct InterceptedTransport {
    index: usize,
    inner: Arc<dyn Transport>,
    on_send: SendHook,
}

impl InterceptedTransport {
    /// Position in the interceptor's creation order
    pub fn index(&self) -> usize {
        self.index
    }

    /// Send through the hook.
    ///
    /// Returns `false` when the hook suppressed the frame.
    pub async fn send(&self, frame: Frame) -> Result<bool> {
        match (self.on_send)(frame) {
            Some(frame) => {
                self.inner.send(frame).await?;
                Ok(true)
            }
            None => {
                tracing::debug!(index = self.index, "outbound frame suppressed");
                Ok(false)
            }
        }
    }

    pub async fn close(&self) -> Result<()> {
        self.inner.close().await
    }
}
