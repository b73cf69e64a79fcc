use crate::{
    config::{keys, ConfigStore},
    context::{ContextSettings, Method},
};
use tracing::debug;

/// IPv4 hints the next configuration layer reads right after link-up.
///
/// [`IpHints::apply`] rewrites the stored address and DNS values from the
/// context's settings and remembers `ipv4_type`/`ipv4_autodns` as they were;
/// [`IpHints::restore`] puts those two back once the next layer was called.
#[derive(Debug)]
pub(crate) struct IpHints {
    ipv4_type: String,
    autodns: bool,
}

impl IpHints {
    pub fn apply(
        config: &dyn ConfigStore,
        network_id: &str,
        settings: &ContextSettings,
    ) -> Self {
        let ipv4_type = config
            .get_string(network_id, keys::IPV4_TYPE)
            .unwrap_or_else(|| {
                config.set_string(
                    network_id,
                    keys::IPV4_TYPE,
                    Some(keys::IPV4_TYPE_AUTO),
                );
                keys::IPV4_TYPE_AUTO.to_owned()
            });
        let autodns = config.get_bool(network_id, keys::IPV4_AUTODNS, true);

        debug!("calling next layer, ipv4_type: {ipv4_type}");
        debug!(
            "ipv4 settings: {:?} {:?} (gw {:?}) (nm {:?}) (dns {:?} {:?})",
            settings.interface,
            settings.address,
            settings.gateway,
            settings.netmask,
            settings.dns1(),
            settings.dns2(),
        );

        if ipv4_type == keys::IPV4_TYPE_AUTO {
            if settings.method != Method::Dhcp {
                let set = |key, value: &Option<String>| {
                    config.set_string(network_id, key, value.as_deref())
                };

                set(keys::IPV4_ADDRESS, &settings.address);
                set(keys::IPV4_GATEWAY, &settings.gateway);
                set(keys::IPV4_NETMASK, &settings.netmask);
                config.set_string(
                    network_id,
                    keys::IPV4_TYPE,
                    Some(keys::IPV4_TYPE_STATIC),
                );
            } else {
                debug!("ipv4 settings: dhcp");
            }
        }

        if autodns {
            debug!("using modem provided DNS addresses");
            config.set_bool(network_id, keys::IPV4_AUTODNS, false);

            match settings.dns1() {
                Some(dns1) => {
                    config.set_string(network_id, keys::IPV4_DNS1, Some(dns1));
                    config.set_string(network_id, keys::IPV4_DNS2, settings.dns2());
                }
                None => {
                    config.set_string(network_id, keys::IPV4_DNS1, None);
                    config.set_string(network_id, keys::IPV4_DNS2, None);
                }
            }
        } else {
            debug!("using manual DNS addresses");
        }

        Self { ipv4_type, autodns }
    }

    pub fn restore(self, config: &dyn ConfigStore, network_id: &str) {
        config.set_bool(network_id, keys::IPV4_AUTODNS, self.autodns);
        config.set_string(network_id, keys::IPV4_TYPE, Some(self.ipv4_type.as_str()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigValue, MemoryConfigStore};
    use test_log::test;

    const IAP: &str = "iap0";

    fn static_settings() -> ContextSettings {
        ContextSettings {
            interface: Some("rmnet0".into()),
            address: Some("10.1.2.3".into()),
            gateway: Some("10.1.2.1".into()),
            netmask: Some("255.255.255.0".into()),
            dns: vec!["8.8.8.8".into(), "8.8.4.4".into()],
            method: Method::Static,
        }
    }

    #[test]
    fn it_defaults_to_auto_and_rewrites_static_settings() {
        // Arrange
        let config = MemoryConfigStore::new();

        // Act
        let hints = IpHints::apply(&config, IAP, &static_settings());

        // Assert
        let get = |k| config.get_string(IAP, k);
        assert_eq!(get(keys::IPV4_TYPE).as_deref(), Some("STATIC"));
        assert_eq!(get(keys::IPV4_ADDRESS).as_deref(), Some("10.1.2.3"));
        assert_eq!(get(keys::IPV4_GATEWAY).as_deref(), Some("10.1.2.1"));
        assert_eq!(get(keys::IPV4_NETMASK).as_deref(), Some("255.255.255.0"));
        assert_eq!(get(keys::IPV4_DNS1).as_deref(), Some("8.8.8.8"));
        assert_eq!(get(keys::IPV4_DNS2).as_deref(), Some("8.8.4.4"));
        assert!(!config.get_bool(IAP, keys::IPV4_AUTODNS, true));

        // Act
        hints.restore(&config, IAP);

        // Assert
        assert_eq!(get(keys::IPV4_TYPE).as_deref(), Some("AUTO"));
        assert_eq!(
            config.get(IAP, keys::IPV4_AUTODNS),
            Some(ConfigValue::Bool(true))
        );
        assert_eq!(get(keys::IPV4_ADDRESS).as_deref(), Some("10.1.2.3"));
    }

    #[test]
    fn it_leaves_addresses_alone_for_dhcp() {
        // Arrange
        let config = MemoryConfigStore::new()
            .with(IAP, keys::IPV4_TYPE, "AUTO")
            .with(IAP, keys::IPV4_ADDRESS, "192.168.0.10");
        let settings = ContextSettings {
            method: Method::Dhcp,
            ..static_settings()
        };

        // Act
        let hints = IpHints::apply(&config, IAP, &settings);

        // Assert
        assert_eq!(config.get_string(IAP, keys::IPV4_TYPE).as_deref(), Some("AUTO"));
        assert_eq!(
            config.get_string(IAP, keys::IPV4_ADDRESS).as_deref(),
            Some("192.168.0.10")
        );
        hints.restore(&config, IAP);
    }

    #[test]
    fn it_keeps_manual_configuration() {
        // Arrange
        let config = MemoryConfigStore::new()
            .with(IAP, keys::IPV4_TYPE, "STATIC")
            .with(IAP, keys::IPV4_AUTODNS, false)
            .with(IAP, keys::IPV4_ADDRESS, "192.168.0.10")
            .with(IAP, keys::IPV4_DNS1, "1.1.1.1");

        // Act
        let hints = IpHints::apply(&config, IAP, &static_settings());
        hints.restore(&config, IAP);

        // Assert
        let get = |k| config.get_string(IAP, k);
        assert_eq!(get(keys::IPV4_TYPE).as_deref(), Some("STATIC"));
        assert_eq!(get(keys::IPV4_ADDRESS).as_deref(), Some("192.168.0.10"));
        assert_eq!(get(keys::IPV4_DNS1).as_deref(), Some("1.1.1.1"));
        assert!(!config.get_bool(IAP, keys::IPV4_AUTODNS, true));
    }

    #[test]
    fn it_clears_dns_slots_the_context_does_not_fill() {
        // Arrange
        let config = MemoryConfigStore::new()
            .with(IAP, keys::IPV4_DNS1, "1.1.1.1")
            .with(IAP, keys::IPV4_DNS2, "1.0.0.1");

        // Act
        let one = ContextSettings {
            dns: vec!["9.9.9.9".into()],
            ..static_settings()
        };
        IpHints::apply(&config, IAP, &one).restore(&config, IAP);

        // Assert
        assert_eq!(config.get_string(IAP, keys::IPV4_DNS1).as_deref(), Some("9.9.9.9"));
        assert_eq!(config.get_string(IAP, keys::IPV4_DNS2), None);

        // Act
        let none = ContextSettings {
            dns: vec![],
            ..static_settings()
        };
        IpHints::apply(&config, IAP, &none).restore(&config, IAP);

        // Assert
        assert_eq!(config.get_string(IAP, keys::IPV4_DNS1), None);
        assert_eq!(config.get_string(IAP, keys::IPV4_DNS2), None);
    }
}
