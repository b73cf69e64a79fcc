//! Bridges link-up/link-down requests for a cellular network to the activation of
//! the PDP context a modem exposes for it.
//!
//! The [`LinkManager`] is a single-threaded state machine. It is driven by calls to
//! [`LinkManager::link_up`]/[`LinkManager::link_down`] and by the [`event::Event`]s
//! contexts post back through the handlers they were given. [`service::spawn`]
//! runs it on a tokio task.

use derive_more::{Display, From};

pub mod config;
pub mod context;
pub mod event;
pub mod link;
pub mod modem;
pub mod service;

mod error;

pub use error::LinkError;
pub use link::{LinkManager, LinkPhase};

/// Status codes reported back to callers of link-up, link-down and to the
/// [`CloseNotifier`].
#[derive(Display, Debug, PartialEq, Eq, Copy, Clone)]
pub enum LinkStatus {
    #[display("SUCCESS")]
    Success,
    /// The link is up at this layer, IP configuration continues in the next one.
    #[display("SUCCESS_NEXT_LAYER")]
    SuccessNextLayer,
    #[display("ERROR")]
    Error,
}

/// Opaque attribute flags of a network, passed through untouched.
#[derive(Display, From, Debug, Default, PartialEq, Eq, Hash, Copy, Clone)]
#[display("{_0:#x}")]
pub struct NetworkAttrs(pub u32);

/// Identity of the network a link request is made for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub kind: String,
    pub attrs: NetworkAttrs,
    pub id: String,
}

impl Network {
    pub fn new(
        kind: impl Into<String>,
        attrs: impl Into<NetworkAttrs>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            attrs: attrs.into(),
            id: id.into(),
        }
    }
}

/// What the link-up callback receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkUpReply {
    pub status: LinkStatus,
    pub error: Option<LinkError>,
    /// Name of the network interface the context brought up.
    pub interface: Option<String>,
}

impl LinkUpReply {
    pub fn next_layer(interface: Option<String>) -> Self {
        Self {
            status: LinkStatus::SuccessNextLayer,
            error: None,
            interface,
        }
    }

    pub fn error(error: LinkError) -> Self {
        Self {
            status: LinkStatus::Error,
            error: Some(error),
            interface: None,
        }
    }
}

pub type LinkUpCallback = Box<dyn FnOnce(LinkUpReply) + Send>;
pub type LinkDownCallback = Box<dyn FnOnce(LinkStatus) + Send>;

/// Told about links that went away after they were reported up.
pub trait CloseNotifier: Send + Sync {
    fn report_close(&self, status: LinkStatus, reason: LinkError, network: &Network);
}
