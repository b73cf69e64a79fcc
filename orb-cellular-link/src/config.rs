//! Per-network configuration the link manager reads and writes.

use dashmap::DashMap;
use std::sync::Arc;

/// Keys of the per-network configuration.
pub mod keys {
    /// IMSI of the SIM a network was provisioned for.
    pub const SIM_IMSI: &str = "sim_imsi";
    pub const CONTEXT_ID: &str = "context_id";

    pub const GPRS_ACCESSPOINTNAME: &str = "gprs_accesspointname";
    pub const GPRS_USERNAME: &str = "gprs_username";
    pub const GPRS_PASSWORD: &str = "gprs_password";

    pub const IPV4_TYPE: &str = "ipv4_type";
    pub const IPV4_AUTODNS: &str = "ipv4_autodns";
    pub const IPV4_ADDRESS: &str = "ipv4_address";
    pub const IPV4_GATEWAY: &str = "ipv4_gateway";
    pub const IPV4_NETMASK: &str = "ipv4_netmask";
    pub const IPV4_DNS1: &str = "ipv4_dns1";
    pub const IPV4_DNS2: &str = "ipv4_dns2";

    /// Values of [`IPV4_TYPE`].
    pub const IPV4_TYPE_AUTO: &str = "AUTO";
    pub const IPV4_TYPE_STATIC: &str = "STATIC";
}

/// String and boolean settings keyed by network id.
///
/// Setting a string to `None` unsets it.
pub trait ConfigStore: Send + Sync {
    fn get_string(&self, network_id: &str, key: &str) -> Option<String>;

    fn set_string(&self, network_id: &str, key: &str, value: Option<&str>);

    fn get_bool(&self, network_id: &str, key: &str, default: bool) -> bool;

    fn set_bool(&self, network_id: &str, key: &str, value: bool);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    String(String),
    Bool(bool),
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// In-memory [`ConfigStore`]. Clones share the same values.
#[derive(Debug, Default, Clone)]
pub struct MemoryConfigStore {
    values: Arc<DashMap<(String, String), ConfigValue>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        self,
        network_id: &str,
        key: &str,
        value: impl Into<ConfigValue>,
    ) -> Self {
        self.insert(network_id, key, value);
        self
    }

    pub fn insert(&self, network_id: &str, key: &str, value: impl Into<ConfigValue>) {
        self.values
            .insert((network_id.to_owned(), key.to_owned()), value.into());
    }

    pub fn get(&self, network_id: &str, key: &str) -> Option<ConfigValue> {
        self.values
            .get(&(network_id.to_owned(), key.to_owned()))
            .map(|v| v.value().clone())
    }

    pub fn remove(&self, network_id: &str, key: &str) -> Option<ConfigValue> {
        self.values
            .remove(&(network_id.to_owned(), key.to_owned()))
            .map(|(_, v)| v)
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get_string(&self, network_id: &str, key: &str) -> Option<String> {
        match self.get(network_id, key)? {
            ConfigValue::String(s) => Some(s),
            ConfigValue::Bool(_) => None,
        }
    }

    fn set_string(&self, network_id: &str, key: &str, value: Option<&str>) {
        match value {
            Some(value) => self.insert(network_id, key, value),
            None => {
                self.remove(network_id, key);
            }
        }
    }

    fn get_bool(&self, network_id: &str, key: &str, default: bool) -> bool {
        match self.get(network_id, key) {
            Some(ConfigValue::Bool(b)) => b,
            _ => default,
        }
    }

    fn set_bool(&self, network_id: &str, key: &str, value: bool) {
        self.insert(network_id, key, value);
    }
}
