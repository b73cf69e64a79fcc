use crate::{
    context::{ConnectionContext, SubscriptionId},
    LinkUpCallback, Network,
};
use derive_more::Display;
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Display, Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub struct RequestId(pub(crate) u64);

#[derive(Debug)]
pub(crate) enum LinkState {
    /// The context was already active; waiting for it to go down before
    /// activating it again with our properties.
    Deactivating,
    /// Property writes of the given attempt are outstanding.
    Syncing { attempt: u64 },
    Activating,
    /// Active, finalization scheduled for the next loop iteration.
    Finalizing { task: CancellationToken },
    Connected,
}

/// Phase of a link request, as seen from outside.
#[derive(Display, Debug, PartialEq, Eq, Copy, Clone)]
pub enum LinkPhase {
    Deactivating,
    Syncing,
    Activating,
    Finalizing,
    Connected,
}

impl From<&LinkState> for LinkPhase {
    fn from(state: &LinkState) -> Self {
        match state {
            LinkState::Deactivating => Self::Deactivating,
            LinkState::Syncing { .. } => Self::Syncing,
            LinkState::Activating => Self::Activating,
            LinkState::Finalizing { .. } => Self::Finalizing,
            LinkState::Connected => Self::Connected,
        }
    }
}

/// The one outstanding link-up of a context.
///
/// [`Self::release`], also run on drop, lets go of everything it holds on the
/// context: the destruction handler, the active-state handler and any scheduled
/// finalization, in that order.
pub(crate) struct LinkRequest {
    pub id: RequestId,
    pub network: Network,
    state: LinkState,
    callback: Option<LinkUpCallback>,
    context: Weak<dyn ConnectionContext>,
    active_changed: SubscriptionId,
    destroyed: Option<SubscriptionId>,
    attempts: u64,
    released: bool,
}

impl LinkRequest {
    pub fn new(
        id: RequestId,
        network: Network,
        callback: LinkUpCallback,
        context: &Arc<dyn ConnectionContext>,
        active_changed: SubscriptionId,
    ) -> Self {
        Self {
            id,
            network,
            state: LinkState::Activating,
            callback: Some(callback),
            context: Arc::downgrade(context),
            active_changed,
            destroyed: None,
            attempts: 0,
            released: false,
        }
    }

    pub fn set_destroyed_handler(&mut self, id: SubscriptionId) {
        self.destroyed = Some(id);
    }

    pub fn context(&self) -> Option<Arc<dyn ConnectionContext>> {
        self.context.upgrade()
    }

    pub fn state(&self) -> &LinkState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, LinkState::Connected)
    }

    /// Moves to `state`, cancelling a scheduled finalization being left behind.
    /// A connected request never moves back.
    pub fn set_state(&mut self, state: LinkState) {
        if self.is_connected() {
            debug!(request = %self.id, "ignoring state change of connected request");
            return;
        }

        if let LinkState::Finalizing { task } = &self.state {
            task.cancel();
        }

        self.state = state;
    }

    /// Marks the request connected once finalization ran.
    pub fn connect(&mut self) {
        self.state = LinkState::Connected;
    }

    pub fn next_attempt(&mut self) -> u64 {
        self.attempts += 1;
        self.attempts
    }

    pub fn take_callback(&mut self) -> Option<LinkUpCallback> {
        self.callback.take()
    }

    /// Only the first call does anything.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        match self.context.upgrade() {
            Some(ctx) => {
                if let Some(id) = self.destroyed.take() {
                    ctx.remove_handler(id);
                }
                ctx.remove_handler(self.active_changed);
            }
            None => debug!(request = %self.id, "context already gone, no handlers to remove"),
        }

        if let LinkState::Finalizing { task } = &self.state {
            task.cancel();
        }

        debug!(request = %self.id, network_id = %self.network.id, "link request released");
    }
}

impl Drop for LinkRequest {
    fn drop(&mut self) {
        self.release();
    }
}
