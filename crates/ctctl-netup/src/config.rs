//! Matching the triggering device to its declared network entry.
//!
//! The runtime only passes the host-side veth name, never the declared
//! network index, so the entry is found by its up script: the one whose
//! `script.up` points at this program. LXC has renamed the network keys
//! once; each naming is a [`KeyScheme`] and the schemes are tried in order.

use std::net::IpAddr;

use ctctl_common::{CtctlError, CtctlResult};
use ctctl_network::IpFamily;

use crate::context::InvocationContext;
use crate::lxc::LxcConfig;

/// One naming of the per-network config keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyScheme {
    /// Scheme name for logs.
    pub name: &'static str,
    /// Key prefix before the network index.
    pub prefix: &'static str,
    /// Key suffix of the IPv4 address list.
    pub ipv4: &'static str,
    /// Key suffix of the IPv6 address list.
    pub ipv6: &'static str,
}

/// LXC 2.1+ keys.
pub const CURRENT_SCHEME: KeyScheme = KeyScheme {
    name: "current",
    prefix: "lxc.net",
    ipv4: "ipv4.address",
    ipv6: "ipv6.address",
};

/// Pre-2.1 keys.
pub const LEGACY_SCHEME: KeyScheme = KeyScheme {
    name: "legacy",
    prefix: "lxc.network",
    ipv4: "ipv4",
    ipv6: "ipv6",
};

/// Schemes in the order they are tried.
pub const KEY_SCHEMES: [KeyScheme; 2] = [CURRENT_SCHEME, LEGACY_SCHEME];

impl KeyScheme {
    fn key(&self, index: u32, suffix: &str) -> String {
        format!("{}.{}.{}", self.prefix, index, suffix)
    }

    /// Find the network entry whose up script ends with `hook`.
    #[must_use]
    pub fn find(&self, config: &LxcConfig, hook: &str) -> Option<NetworkDeviceConfig> {
        if hook.is_empty() {
            return None;
        }

        config.indices(self.prefix).into_iter().find_map(|index| {
            let up_script = config.first(&self.key(index, "script.up"))?;
            if !up_script.ends_with(hook) {
                return None;
            }

            Some(NetworkDeviceConfig {
                scheme: self.name,
                index,
                up_script: up_script.to_string(),
                ipv4: config.get(&self.key(index, self.ipv4)).to_vec(),
                ipv6: config.get(&self.key(index, self.ipv6)).to_vec(),
                ipv4_gateway: gateway(config, &self.key(index, "ipv4.gateway"), IpFamily::V4),
                ipv6_gateway: gateway(config, &self.key(index, "ipv6.gateway"), IpFamily::V6),
            })
        })
    }
}

/// Gateway value, when it is a literal address of the right family.
///
/// LXC also accepts keywords such as `auto` and `dev`; those give the
/// container no address the host could proxy for.
fn gateway(config: &LxcConfig, key: &str, family: IpFamily) -> Option<IpAddr> {
    let value = config.first(key)?;
    match value.parse::<IpAddr>() {
        Ok(addr) if IpFamily::of(&addr) == family => Some(addr),
        _ => {
            tracing::warn!(
                key,
                value,
                "Ignoring gateway that is not an {} address",
                family
            );
            None
        }
    }
}

/// A declared container network device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkDeviceConfig {
    /// Key scheme the entry was found under.
    pub scheme: &'static str,
    /// Declared network index.
    pub index: u32,
    /// Configured up script.
    pub up_script: String,
    /// Declared IPv4 CIDRs.
    pub ipv4: Vec<String>,
    /// Declared IPv6 CIDRs.
    pub ipv6: Vec<String>,
    /// IPv4 gateway.
    pub ipv4_gateway: Option<IpAddr>,
    /// IPv6 gateway.
    pub ipv6_gateway: Option<IpAddr>,
}

impl NetworkDeviceConfig {
    /// Declared gateways, IPv4 first.
    #[must_use]
    pub fn gateways(&self) -> Vec<IpAddr> {
        self.ipv4_gateway
            .into_iter()
            .chain(self.ipv6_gateway)
            .collect()
    }
}

/// Resolves the declared network device for an invocation.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    hook: String,
    schemes: Vec<KeyScheme>,
}

impl ConfigResolver {
    /// Match entries whose up script ends with `hook`.
    pub fn new(hook: impl Into<String>) -> Self {
        Self {
            hook: hook.into(),
            schemes: KEY_SCHEMES.to_vec(),
        }
    }

    /// Try only the given schemes, in order.
    #[must_use]
    pub fn with_schemes(mut self, schemes: &[KeyScheme]) -> Self {
        self.schemes = schemes.to_vec();
        self
    }

    /// Resolve the device entry for `ctx`, validating it before anything
    /// touches the host.
    pub fn resolve(
        &self,
        ctx: &InvocationContext,
        config: &LxcConfig,
    ) -> CtctlResult<NetworkDeviceConfig> {
        ctx.ensure_supported_device()?;

        let device = self
            .schemes
            .iter()
            .find_map(|scheme| scheme.find(config, &self.hook))
            .ok_or_else(|| CtctlError::NoMatchingDevice {
                container: ctx.container.clone(),
                hook: self.hook.clone(),
            })?;

        tracing::debug!(
            container = %ctx.container,
            scheme = device.scheme,
            index = device.index,
            "Matched network device"
        );

        if device.ipv4.is_empty() && device.ipv6.is_empty() {
            return Err(CtctlError::NoAddresses {
                container: ctx.container.clone(),
            });
        }
        if device.gateways().is_empty() {
            return Err(CtctlError::NoGateways {
                container: ctx.container.clone(),
            });
        }

        Ok(device)
    }
}
