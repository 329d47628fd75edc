use std::sync::Arc;

use tagline_core::Frame;

use crate::codec::{Codec, JsonCodec};
use crate::config::Config;
use crate::correlator::Correlator;
use crate::error::Result;
use crate::registry::ListenerRegistry;
use crate::sequencer::TagSequencer;
use crate::transport::{Connector, InterceptedTransport, Interceptor, Transport};

/// Outbound filter applied before the tag sequencer sees a frame
pub type SendFilter = Box<dyn Fn(Frame) -> Option<Frame> + Send + Sync>;

/// Everything one logical connection to the remote side shares
///
/// Owns the interceptor, tag sequencer and listener registry, and wires
/// them together: inbound frames fan out through the registry, outbound
/// frames feed the sequencer. Independent sessions share nothing.
pub struct Session {
    config: Config,
    interceptor: Arc<Interceptor>,
    sequencer: Arc<TagSequencer>,
    registry: Arc<ListenerRegistry>,
    dispatch: Arc<tokio::sync::Mutex<()>>,
}

impl Session {
    pub fn new(config: Config) -> Result<Self> {
        Self::with_send_filter(config, Box::new(Some::<Frame>))
    }

    /// Like [`Session::new`], with a host filter that can rewrite or
    /// suppress outbound frames. Suppressed frames do not move the tag.
    pub fn with_send_filter(config: Config, filter: SendFilter) -> Result<Self> {
        let interceptor = Arc::new(Interceptor::new(&config));
        let sequencer = Arc::new(TagSequencer::new(&config));
        let registry = Arc::new(ListenerRegistry::new());

        let inbound = Arc::clone(&registry);
        let outbound = Arc::clone(&sequencer);
        interceptor.install_hook(
            move |frame| inbound.dispatch(frame),
            move |frame| {
                let frame = filter(frame)?;
                outbound.observe_outbound(&frame);
                Some(frame)
            },
        )?;

        Ok(Self {
            config,
            interceptor,
            sequencer,
            registry,
            dispatch: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// Create a transport through the host's connector
    pub async fn connect(&self, connector: &dyn Connector) -> Result<Arc<InterceptedTransport>> {
        self.interceptor.open(connector).await
    }

    /// Intercept a transport the host created itself
    pub fn adopt(&self, transport: impl Transport + 'static) -> Result<Arc<InterceptedTransport>> {
        self.interceptor.adopt(transport)
    }

    pub fn correlator(&self) -> Correlator<JsonCodec> {
        self.correlator_with(JsonCodec)
    }

    pub fn correlator_with<C: Codec>(&self, codec: C) -> Correlator<C> {
        Correlator::new(
            Arc::clone(&self.interceptor),
            Arc::clone(&self.sequencer),
            Arc::clone(&self.registry),
            Arc::clone(&self.dispatch),
            codec,
            self.config.request_timeout,
        )
    }

    /// Forget the stored tag and drop all listeners.
    ///
    /// Pending requests fail immediately. Created transports are kept.
    pub fn reset(&self) {
        self.sequencer.reset();
        self.registry.clear();
        tracing::debug!("session reset");
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn interceptor(&self) -> &Arc<Interceptor> {
        &self.interceptor
    }

    pub fn sequencer(&self) -> &Arc<TagSequencer> {
        &self.sequencer
    }

    pub fn registry(&self) -> &Arc<ListenerRegistry> {
        &self.registry
    }
}
