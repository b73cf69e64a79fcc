use crate::{link::RequestId, modem::ModemId};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Identifies one context of one modem.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct ContextKey {
    pub modem: ModemId,
    pub context: String,
}

/// Input of the link state machine.
///
/// Every event names the request it was posted for. Events whose request is gone
/// by the time they are dispatched are dropped.
#[derive(Debug, Clone)]
pub enum Event {
    /// The context's active flag flipped to `active`.
    ActiveChanged {
        key: ContextKey,
        request: RequestId,
        active: bool,
    },
    /// The context is being destroyed.
    Destroyed { key: ContextKey, request: RequestId },
    /// The last outstanding property write of a sync attempt completed.
    PropertiesSynced {
        key: ContextKey,
        request: RequestId,
        attempt: u64,
    },
    /// Deferred finalization after the context went active.
    Finalize {
        key: ContextKey,
        request: RequestId,
        task: CancellationToken,
    },
}

/// Sending half of the link manager's event queue.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: flume::Sender<Event>,
}

impl EventSink {
    pub(crate) fn new(tx: flume::Sender<Event>) -> Self {
        Self { tx }
    }

    pub(crate) fn post(&self, event: Event) {
        if let Err(flume::SendError(event)) = self.tx.send(event) {
            debug!(?event, "link manager is gone, dropping event");
        }
    }
}

/// Handler state given to a context when subscribing to one of its
/// notifications.
///
/// Handlers registered through `on_active_changed` are called with
/// [`Self::active_changed`], those registered through `on_destroyed` with
/// [`Self::destroyed`].
#[derive(Debug, Clone)]
pub struct ContextHandler {
    sink: EventSink,
    key: ContextKey,
    request: RequestId,
}

impl ContextHandler {
    pub(crate) fn new(sink: EventSink, key: ContextKey, request: RequestId) -> Self {
        Self { sink, key, request }
    }

    /// Queues the new value of the active flag, as seen by the context when it
    /// changed.
    pub fn active_changed(&self, active: bool) {
        self.sink.post(Event::ActiveChanged {
            key: self.key.clone(),
            request: self.request,
            active,
        });
    }

    /// Queues the context's destruction.
    pub fn destroyed(&self) {
        self.sink.post(Event::Destroyed {
            key: self.key.clone(),
            request: self.request,
        });
    }
}
