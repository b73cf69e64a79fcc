use crate::{
    config::{keys, ConfigStore},
    context::{ConnectionContext, ContextProperty},
    event::{ContextHandler, ContextKey, Event, EventSink},
    modem::{self, ModemDevice, ModemDirectory},
    CloseNotifier, LinkDownCallback, LinkError, LinkStatus, LinkUpCallback,
    LinkUpReply, Network,
};
use bon::bon;
use finalize::IpHints;
use request::{LinkRequest, LinkState};
use std::{collections::HashMap, sync::Arc};
use sync::PendingPropertySync;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod finalize;
mod request;
mod sync;

pub use request::{LinkPhase, RequestId};
pub use sync::PropertyWrite;

/// Why a request is being torn down.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
enum Teardown {
    LinkDown,
    NetworkError,
    Destroyed,
    Replaced,
    Shutdown,
}

/// Owns the link requests of every context and drives their activation.
///
/// Single-threaded: all methods take `&mut self` and are meant to be called from
/// one loop, which also feeds back the [`Event`]s queued by contexts through
/// [`LinkManager::run_pending`] or [`LinkManager::dispatch`].
pub struct LinkManager {
    modems: Arc<dyn ModemDirectory>,
    config: Arc<dyn ConfigStore>,
    close: Arc<dyn CloseNotifier>,
    requests: HashMap<ContextKey, LinkRequest>,
    sink: EventSink,
    inbox: flume::Receiver<Event>,
    next_request: u64,
}

#[bon]
impl LinkManager {
    #[builder]
    pub fn new<M, C, N>(modems: M, config: C, close_notifier: N) -> Self
    where
        M: ModemDirectory + 'static,
        C: ConfigStore + 'static,
        N: CloseNotifier + 'static,
    {
        let (tx, inbox) = flume::unbounded();

        Self {
            modems: Arc::new(modems),
            config: Arc::new(config),
            close: Arc::new(close_notifier),
            requests: HashMap::new(),
            sink: EventSink::new(tx),
            inbox,
            next_request: 0,
        }
    }
}

impl LinkManager {
    /// Starts bringing up the context configured for `network`.
    ///
    /// Configuration problems are reported through `callback` before this
    /// returns. Otherwise `callback` is called once the context is active and
    /// finalized, from a later loop iteration.
    pub fn link_up(&mut self, network: Network, callback: LinkUpCallback) {
        debug!(network_id = %network.id, "link up");

        match self.resolve(&network.id) {
            Ok((key, ctx)) => self.start(network, key, ctx, callback),
            Err(e) => callback(LinkUpReply::error(e)),
        }
    }

    /// Drops the request of `network`'s context and deactivates it.
    ///
    /// Always succeeds, whether or not a context or request was found.
    pub fn link_down(
        &mut self,
        network: Network,
        interface: Option<&str>,
        callback: LinkDownCallback,
    ) {
        debug!(network_id = %network.id, ?interface, "link down");

        if let Some((key, ctx)) = self.lookup(&network.id) {
            self.teardown(&key, Teardown::LinkDown);

            if ctx.is_active() {
                debug!(context = %key.context, "deactivating context");
                ctx.deactivate();
            }
        }

        callback(LinkStatus::Success);
    }

    /// Runs one loop iteration: dispatches the events that were queued when it
    /// was called. Returns how many were dispatched.
    pub fn run_pending(&mut self) -> usize {
        let queued = self.inbox.len();
        let mut dispatched = 0;

        for _ in 0..queued {
            let Ok(event) = self.inbox.try_recv() else {
                break;
            };

            self.dispatch(event);
            dispatched += 1;
        }

        dispatched
    }

    pub fn dispatch(&mut self, event: Event) {
        match event {
            Event::ActiveChanged {
                key,
                request,
                active,
            } => self.on_active_changed(&key, request, active),
            Event::Destroyed { key, request } => self.on_destroyed(&key, request),
            Event::PropertiesSynced {
                key,
                request,
                attempt,
            } => self.on_properties_synced(&key, request, attempt),
            Event::Finalize { key, request, task } => {
                self.on_finalize(&key, request, &task)
            }
        }
    }

    pub fn link_phase(&self, network_id: &str) -> Option<LinkPhase> {
        self.requests
            .values()
            .find(|r| r.network.id == network_id)
            .map(|r| LinkPhase::from(r.state()))
    }

    pub fn is_connected(&self, network_id: &str) -> bool {
        self.link_phase(network_id) == Some(LinkPhase::Connected)
    }

    /// Releases every outstanding request without notifying anyone or touching
    /// the contexts' active state.
    pub fn shutdown(&mut self) {
        let keys: Vec<_> = self.requests.keys().cloned().collect();
        for key in keys {
            self.teardown(&key, Teardown::Shutdown);
        }
    }

    pub(crate) fn inbox(&self) -> flume::Receiver<Event> {
        self.inbox.clone()
    }

    fn resolve(
        &self,
        network_id: &str,
    ) -> Result<(ContextKey, Arc<dyn ConnectionContext>), LinkError> {
        let modem = self.modem_for(network_id)?;

        let context_id = self
            .config
            .get_string(network_id, keys::CONTEXT_ID)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                warn!("no context id found for iap {network_id}");
                LinkError::NoNetwork
            })?;

        debug!("got context id: {context_id}");

        let Some(ctx) = modem.context_by_id(&context_id) else {
            warn!("no context found for id {context_id}, unprovision iap {network_id}");
            self.config.set_string(network_id, keys::CONTEXT_ID, None);

            return Err(LinkError::NoNetwork);
        };

        let key = ContextKey {
            modem: modem.id(),
            context: context_id,
        };

        Ok((key, ctx))
    }

    /// Same lookups as [`Self::resolve`], without the complaints.
    fn lookup(&self, network_id: &str) -> Option<(ContextKey, Arc<dyn ConnectionContext>)> {
        let imsi = self.config.get_string(network_id, keys::SIM_IMSI)?;
        let modem = modem::find_modem_by_sim_identity(self.modems.as_ref(), &imsi)?;
        let context_id = self.config.get_string(network_id, keys::CONTEXT_ID)?;
        debug!("got modem {}, context id {context_id}", modem.id());
        let ctx = modem.context_by_id(&context_id)?;

        let key = ContextKey {
            modem: modem.id(),
            context: context_id,
        };

        Some((key, ctx))
    }

    fn modem_for(&self, network_id: &str) -> Result<Arc<dyn ModemDevice>, LinkError> {
        let Some(imsi) = self.config.get_string(network_id, keys::SIM_IMSI) else {
            warn!("network_id {network_id} is missing imsi configuration");
            return Err(LinkError::NoNetwork);
        };

        debug!("got IMSI: {imsi}");

        modem::find_modem_by_sim_identity(self.modems.as_ref(), &imsi).ok_or_else(|| {
            warn!("no modem found for imsi {imsi}");
            LinkError::NoNetwork
        })
    }

    fn start(
        &mut self,
        network: Network,
        key: ContextKey,
        ctx: Arc<dyn ConnectionContext>,
        callback: LinkUpCallback,
    ) {
        if self.requests.contains_key(&key) {
            warn!(
                network_id = %network.id,
                context = %key.context,
                "context already has an outstanding link request, replacing it"
            );
            self.teardown(&key, Teardown::Replaced);
        }

        let id = RequestId(self.next_request);
        self.next_request += 1;

        let handler = || ContextHandler::new(self.sink.clone(), key.clone(), id);

        let active_changed = ctx.on_active_changed(handler());
        let mut request = LinkRequest::new(id, network, callback, &ctx, active_changed);

        // in case ctx gets destroyed behind our back
        request.set_destroyed_handler(ctx.on_destroyed(handler()));

        self.requests.insert(key.clone(), request);

        let active = ctx.is_active();
        debug!(request = %id, context = %key.context, active, "link request created");

        self.drive(&key, !active);
    }

    /// Deactivates the context, or syncs its properties and activates it.
    fn drive(&mut self, key: &ContextKey, activate: bool) {
        let Some(request) = self.requests.get_mut(key) else {
            return;
        };

        let Some(ctx) = request.context() else {
            debug!(request = %request.id, "context is gone, not driving it");
            return;
        };

        if !activate {
            debug!(context = %key.context, "deactivate ctx");
            request.set_state(LinkState::Deactivating);
            ctx.deactivate();

            return;
        }

        debug!(context = %key.context, "activate ctx");

        let attempt = request.next_attempt();
        let sync = PendingPropertySync::new(
            self.sink.clone(),
            Event::PropertiesSynced {
                key: key.clone(),
                request: request.id,
                attempt,
            },
        );

        for property in ContextProperty::ALL {
            let desired = self
                .config
                .get_string(&request.network.id, property.config_key());

            if ctx.property(property) != desired {
                debug!("setting context property '{property}'");
                ctx.set_property(property, desired.as_deref(), sync.write(property));
            }
        }

        let pending = sync.pending();

        if sync.finish_issuing() {
            request.set_state(LinkState::Activating);
            ctx.activate();
        } else {
            debug!(pending, attempt, "waiting for context property writes");
            request.set_state(LinkState::Syncing { attempt });
        }
    }

    fn on_properties_synced(&mut self, key: &ContextKey, id: RequestId, attempt: u64) {
        let Some(request) = self.request_mut(key, id) else {
            return;
        };

        if !matches!(request.state(), LinkState::Syncing { attempt: a } if *a == attempt)
        {
            debug!(request = %id, attempt, "stale property sync, ignoring");
            return;
        }

        if let Some(ctx) = request.context() {
            debug!(context = %key.context, "context properties synced, activating");
            request.set_state(LinkState::Activating);
            ctx.activate();
        }
    }

    fn on_active_changed(&mut self, key: &ContextKey, id: RequestId, active: bool) {
        let Some(request) = self.request_mut(key, id) else {
            return;
        };

        debug!(context = %key.context, active, "ctx active state changed");

        let connected = request.is_connected();
        let finalizing = matches!(request.state(), LinkState::Finalizing { .. });

        match (connected, active) {
            (true, false) => self.teardown(key, Teardown::NetworkError),
            (true, true) => {}
            // activation rejected or dropped before we got to finalize, retry
            (false, false) => self.drive(key, true),
            (false, true) if finalizing => {}
            (false, true) => {
                let task = CancellationToken::new();
                request.set_state(LinkState::Finalizing { task: task.clone() });

                self.sink.post(Event::Finalize {
                    key: key.clone(),
                    request: id,
                    task,
                });
            }
        }
    }

    fn on_finalize(&mut self, key: &ContextKey, id: RequestId, task: &CancellationToken) {
        if task.is_cancelled() {
            debug!(request = %id, "finalization was cancelled");
            return;
        }

        let Some(request) = self.requests.get_mut(key).filter(|r| r.id == id) else {
            return;
        };

        let Some(ctx) = request.context() else {
            return;
        };

        let settings = ctx.settings();
        let network_id = request.network.id.clone();
        let hints = IpHints::apply(self.config.as_ref(), &network_id, &settings);

        info!(
            network_id = %network_id,
            interface = ?settings.interface,
            "link up, passing on to next layer"
        );

        if let Some(callback) = request.take_callback() {
            callback(LinkUpReply::next_layer(settings.interface.clone()));
        }

        request.connect();

        hints.restore(self.config.as_ref(), &network_id);
    }

    fn on_destroyed(&mut self, key: &ContextKey, id: RequestId) {
        if self.request_mut(key, id).is_none() {
            return;
        }

        debug!(context = %key.context, "ctx is being destroyed");
        self.teardown(key, Teardown::Destroyed);
    }

    fn request_mut(&mut self, key: &ContextKey, id: RequestId) -> Option<&mut LinkRequest> {
        let request = self.requests.get_mut(key).filter(|r| r.id == id);

        if request.is_none() {
            debug!(request = %id, context = %key.context, "no such link request, dropping event");
        }

        request
    }

    /// Releases the request of `key` and removes it. A second call for the same
    /// key is a no-op.
    fn teardown(&mut self, key: &ContextKey, reason: Teardown) {
        let Some(request) = self.requests.get_mut(key) else {
            return;
        };

        debug!(request = %request.id, ?reason, "tearing down link request");

        match reason {
            Teardown::NetworkError | Teardown::Destroyed | Teardown::Replaced
                if request.is_connected() =>
            {
                info!(network_id = %request.network.id, "link lost");
                self.close.report_close(
                    LinkStatus::Error,
                    LinkError::NetworkError,
                    &request.network,
                );
            }
            Teardown::Replaced => {
                if let Some(callback) = request.take_callback() {
                    callback(LinkUpReply::error(LinkError::NetworkError));
                }
            }
            Teardown::LinkDown
            | Teardown::NetworkError
            | Teardown::Destroyed
            | Teardown::Shutdown => {}
        }

        request.release();
        self.requests.remove(key);
    }
}
