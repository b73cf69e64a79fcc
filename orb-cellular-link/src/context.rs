//! The PDP context interface the link manager drives.
//!
//! Contexts are owned by the modem service. The link manager only ever keeps a
//! [`std::sync::Weak`] to one and learns about changes through the
//! [`ContextHandler`]s it subscribes.

use crate::{config::keys, event::ContextHandler, link::PropertyWrite};
use derive_more::Display;
use thiserror::Error;

/// String properties synchronized from configuration before activation.
#[derive(Display, Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub enum ContextProperty {
    AccessPointName,
    Username,
    Password,
}

impl ContextProperty {
    pub const ALL: [Self; 3] = [Self::AccessPointName, Self::Username, Self::Password];

    /// Configuration key holding the desired value of this property.
    pub const fn config_key(self) -> &'static str {
        match self {
            Self::AccessPointName => keys::GPRS_ACCESSPOINTNAME,
            Self::Username => keys::GPRS_USERNAME,
            Self::Password => keys::GPRS_PASSWORD,
        }
    }
}

/// How the context obtained its IPv4 settings.
#[derive(Display, Debug, Default, PartialEq, Eq, Copy, Clone)]
pub enum Method {
    #[default]
    Unknown,
    Static,
    Dhcp,
}

/// Settings snapshot of an active context.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct ContextSettings {
    pub interface: Option<String>,
    pub address: Option<String>,
    pub gateway: Option<String>,
    pub netmask: Option<String>,
    /// At most two resolver addresses, primary first.
    pub dns: Vec<String>,
    pub method: Method,
}

impl ContextSettings {
    pub fn dns1(&self) -> Option<&str> {
        self.dns.first().map(String::as_str)
    }

    pub fn dns2(&self) -> Option<&str> {
        self.dns.get(1).map(String::as_str)
    }
}

/// Handle of a registered [`ContextHandler`].
#[derive(Display, Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub struct SubscriptionId(pub u64);

/// Failure of an async property write.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
#[error("{}", .message.as_deref().unwrap_or("Unknown error"))]
pub struct ContextError {
    message: Option<String>,
}

impl ContextError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    pub fn unknown() -> Self {
        Self { message: None }
    }
}

/// One PDP context of a modem.
pub trait ConnectionContext: Send + Sync {
    fn property(&self, property: ContextProperty) -> Option<String>;

    fn is_active(&self) -> bool;

    fn settings(&self) -> ContextSettings;

    /// Starts an async write of `property`. The implementation completes `write`
    /// once the modem service answered.
    fn set_property(
        &self,
        property: ContextProperty,
        value: Option<&str>,
        write: PropertyWrite,
    );

    fn activate(&self);

    fn deactivate(&self);

    /// Every time the active flag flips, `handler` is called with
    /// [`ContextHandler::active_changed`] and the new value.
    fn on_active_changed(&self, handler: ContextHandler) -> SubscriptionId;

    /// [`ContextHandler::destroyed`] is called once, when the context is about to
    /// be destroyed.
    fn on_destroyed(&self, handler: ContextHandler) -> SubscriptionId;

    fn remove_handler(&self, id: SubscriptionId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_maps_properties_to_config_keys() {
        let keys = ContextProperty::ALL.map(ContextProperty::config_key);

        assert_eq!(
            keys,
            ["gprs_accesspointname", "gprs_username", "gprs_password"]
        );
    }

    #[test]
    fn it_reports_unknown_errors() {
        assert_eq!(ContextError::unknown().to_string(), "Unknown error");
        assert_eq!(
            ContextError::new("org.ofono.Error.InProgress").to_string(),
            "org.ofono.Error.InProgress"
        );
    }

    #[test]
    fn it_reads_dns_slots() {
        let settings = ContextSettings {
            dns: vec!["10.0.0.1".into()],
            ..Default::default()
        };

        assert_eq!(settings.dns1(), Some("10.0.0.1"));
        assert_eq!(settings.dns2(), None);
    }
}
