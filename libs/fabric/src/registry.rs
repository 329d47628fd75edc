//! Listener Registry: fan-out of inbound frames.
//!
//! Every inbound frame is handed to every listener registered at the moment
//! of dispatch. Each invocation runs as its own spawned task, so a listener
//! that registers or unregisters (itself or others) never touches a list
//! that is being iterated. Invocations are scheduled in registration order;
//! completion order across listeners is unspecified.

use std::sync::Arc;

use parking_lot::Mutex;
use tagline_core::Frame;

/// Callback invoked once per inbound frame
pub type Listener = Arc<dyn Fn(&Frame) + Send + Sync>;

/// Handle returned by [`ListenerRegistry::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct ListenerRegistry {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    listeners: Vec<(ListenerId, Listener)>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Frame) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner.listeners.push((id, Arc::new(listener)));
        tracing::trace!(?id, total = inner.listeners.len(), "listener registered");
        id
    }

    /// Register a listener that is removed when the returned guard drops
    pub fn register_scoped<F>(&self, listener: F) -> ListenerGuard<'_>
    where
        F: Fn(&Frame) + Send + Sync + 'static,
    {
        let id = self.register(listener);
        ListenerGuard { registry: self, id }
    }

    /// Remove a listener. Unknown ids are ignored.
    ///
    /// Returns whether anything was removed.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.lock();
        match inner.listeners.iter().position(|(existing, _)| *existing == id) {
            Some(index) => {
                inner.listeners.remove(index);
                tracing::trace!(?id, total = inner.listeners.len(), "listener unregistered");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every listener
    pub fn clear(&self) {
        self.inner.lock().listeners.clear();
    }

    /// Schedule `frame` for every currently registered listener.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, frame: Frame) {
        let snapshot: Vec<Listener> = self
            .inner
            .lock()
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        tracing::trace!(listeners = snapshot.len(), len = frame.len(), "dispatching frame");

        let frame = Arc::new(frame);
        for listener in snapshot {
            let frame = Arc::clone(&frame);
            tokio::spawn(async move {
                listener(&frame);
            });
        }
    }
}

/// Unregisters its listener on drop
pub struct ListenerGuard<'a> {
    registry: &'a ListenerRegistry,
    id: ListenerId,
}

impl ListenerGuard<'_> {
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl Drop for ListenerGuard<'_> {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}
