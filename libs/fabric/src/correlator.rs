//! Request Correlator: a synchronous request/response call over the
//! untagged inbound stream.
//!
//! ```text
//! send(payload)
//!   1. next tag from the sequencer        (waits for the first outbound tag)
//!   2. newest transport from interceptor  (waits for creation)
//!   3. register a one-shot listener for that tag
//!   4. transmit "<id>.--<inc>,,<payload>" (sequencer moves to inc + advance)
//!   5. first of { tagged frame with data, timeout } settles the call
//!   6. listener removed either way
//! ```
//!
//! Steps 1 to 4 run under a dispatch lock shared by every correlator of a
//! session, so concurrent requests never draw the same tag.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tagline_core::{Frame, Tag};
use tokio::sync::oneshot;

use crate::codec::{Codec, JsonCodec};
use crate::error::{Error, Result, TimeoutKind};
use crate::registry::ListenerRegistry;
use crate::sequencer::TagSequencer;
use crate::transport::Interceptor;

/// Per-call options for [`Correlator::send_with`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SendOptions {
    /// Request the encrypted path. Always rejected.
    pub encrypted: bool,

    /// Overrides the session's request timeout
    pub timeout: Option<Duration>,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[derive(Clone)]
pub struct Correlator<C = JsonCodec> {
    interceptor: Arc<Interceptor>,
    sequencer: Arc<TagSequencer>,
    registry: Arc<ListenerRegistry>,
    dispatch: Arc<tokio::sync::Mutex<()>>,
    codec: C,
    request_timeout: Duration,
}

impl<C: Codec> Correlator<C> {
    pub(crate) fn new(
        interceptor: Arc<Interceptor>,
        sequencer: Arc<TagSequencer>,
        registry: Arc<ListenerRegistry>,
        dispatch: Arc<tokio::sync::Mutex<()>>,
        codec: C,
        request_timeout: Duration,
    ) -> Self {
        Self {
            interceptor,
            sequencer,
            registry,
            dispatch,
            codec,
            request_timeout,
        }
    }

    /// Send `payload` and wait for the correlated response data
    pub async fn send<T: Serialize>(&self, payload: &T) -> Result<String> {
        self.send_with(payload, SendOptions::default()).await
    }

    pub async fn send_with<T: Serialize>(&self, payload: &T, options: SendOptions) -> Result<String> {
        if options.encrypted {
            return Err(Error::Unsupported("encrypted requests".to_string()));
        }
        let body = self.codec.encode(payload)?;
        let timeout = options.timeout.unwrap_or(self.request_timeout);

        let (tx, rx) = oneshot::channel();
        let (tag, _listener) = {
            let _dispatch = self.dispatch.lock().await;

            let tag = self.sequencer.next_tag().await?;
            let transport = self.interceptor.acquire_active_transport().await?;

            let listener = self.registry.register_scoped(one_shot(tag.clone(), tx));
            if !transport.send(Frame::request(&tag, &body)).await? {
                return Err(Error::Suppressed(tag));
            }
            tracing::debug!(%tag, transport = transport.index(), "request sent");
            (tag, listener)
        };

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(data)) => {
                tracing::debug!(%tag, len = data.len(), "response correlated");
                Ok(data)
            }
            Ok(Err(_)) => Err(Error::Abandoned(tag)),
            Err(_) => {
                tracing::warn!(%tag, ?timeout, "request timed out");
                Err(Error::Timeout(TimeoutKind::Response))
            }
        }
    }

    /// Send `request` and decode the response data with the codec
    pub async fn request<Req, Res>(&self, request: &Req) -> Result<Res>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let data = self.send(request).await?;
        self.codec.decode(&data)
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }
}

/// Listener resolving `tx` with the first frame that correlates with `tag`
fn one_shot(tag: Tag, tx: oneshot::Sender<String>) -> impl Fn(&Frame) + Send + Sync + 'static {
    let slot = Mutex::new(Some(tx));
    move |frame: &Frame| {
        let parsed = frame.parse();
        if !parsed.correlates_with(&tag) {
            return;
        }
        if let (Some(tx), Some(data)) = (slot.lock().take(), parsed.into_data()) {
            let _ = tx.send(data);
        }
    }
}
