//! Proxy neighbour and host route state.
//!
//! An "up" advances through [`ProxyStage`] in order: NDP proxying is enabled
//! host-wide, the gateway proxy entries are placed on the container's
//! device, and only then are per-address routes and proxy entries added.
//! Teardown is best-effort and has no ordering requirements.

use std::net::IpAddr;

use ctctl_common::{CtctlError, CtctlResult};
use ctctl_network::{AddressRecord, HostNetwork, IpFamily};

use crate::resolver::RouteBinding;

/// Interface name that applies a parameter to every interface.
pub const ALL_INTERFACES: &str = "all";

/// Progress of an "up" invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProxyStage {
    /// Nothing changed yet.
    Idle,
    /// NDP proxying enabled on all interfaces.
    NdpGloballyEnabled,
    /// Gateway proxy entries present on the container's device.
    GatewayProxiesInstalled,
    /// At least one address routed and proxied.
    RoutesAndProxiesInstalled,
}

/// A gateway answered for on the container-facing device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayProxyBinding {
    /// Container-facing host device.
    pub device: String,
    /// Gateway address the container was configured with.
    pub gateway: IpAddr,
}

/// Outcome of tearing down one address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Removal {
    /// Upstream interfaces whose proxy entry was deleted.
    pub proxies_removed: Vec<String>,
    /// Deletions that failed.
    pub failures: usize,
}

/// Applies proxy and route changes in order.
pub struct ProxyStateManager<'a, H> {
    host: &'a H,
    stage: ProxyStage,
}

impl<'a, H: HostNetwork> ProxyStateManager<'a, H> {
    /// Start from [`ProxyStage::Idle`].
    pub const fn new(host: &'a H) -> Self {
        Self {
            host,
            stage: ProxyStage::Idle,
        }
    }

    /// Current stage.
    pub const fn stage(&self) -> ProxyStage {
        self.stage
    }

    fn require(&self, stage: ProxyStage, operation: &str) -> CtctlResult<()> {
        if self.stage < stage {
            return Err(CtctlError::Internal {
                message: format!("{operation} attempted in stage {:?}", self.stage),
            });
        }
        Ok(())
    }

    fn advance(&mut self, stage: ProxyStage) {
        self.stage = self.stage.max(stage);
    }

    /// Enable NDP proxying on every interface. The setting is host-wide and
    /// is left enabled by teardown.
    pub fn enable_global_proxy_ndp(&mut self) -> CtctlResult<()> {
        self.host.enable_proxy_ndp(ALL_INTERFACES)?;
        tracing::debug!("Activated proxy ndp on all interfaces");
        self.advance(ProxyStage::NdpGloballyEnabled);
        Ok(())
    }

    /// Allow local services to bind container addresses of `family`.
    pub fn enable_nonlocal_bind(&mut self, family: IpFamily) -> CtctlResult<()> {
        self.require(ProxyStage::NdpGloballyEnabled, "enabling non-local bind")?;
        self.host.enable_nonlocal_bind(family)?;
        tracing::debug!(%family, "Enabled non-local bind");
        Ok(())
    }

    /// Answer for the container's gateway on its host device.
    pub fn install_gateway_proxy(&mut self, binding: &GatewayProxyBinding) -> CtctlResult<()> {
        self.require(ProxyStage::NdpGloballyEnabled, "installing gateway proxy")?;
        self.host.replace_proxy(binding.gateway, &binding.device)?;
        tracing::info!(
            gateway = %binding.gateway,
            device = %binding.device,
            "Added proxy for gateway"
        );
        self.advance(ProxyStage::GatewayProxiesInstalled);
        Ok(())
    }

    /// Route the address to the container and answer for it upstream.
    pub fn install_route_and_proxy(
        &mut self,
        binding: &RouteBinding,
        host_device: &str,
    ) -> CtctlResult<()> {
        self.require(ProxyStage::GatewayProxiesInstalled, "installing route")?;

        let address = binding.address.address;
        self.host.replace_route(address, host_device)?;
        tracing::info!(%address, device = host_device, "Added static route");

        self.host.replace_proxy(address, &binding.upstream)?;
        tracing::info!(%address, device = %binding.upstream, "Added proxy");

        self.advance(ProxyStage::RoutesAndProxiesInstalled);
        Ok(())
    }

    /// Delete the host route, then the proxy entries on the interfaces
    /// `upstreams` reports once the route is gone.
    pub fn remove_route_and_proxy(
        &mut self,
        record: &AddressRecord,
        host_device: &str,
        upstreams: impl FnOnce() -> Vec<String>,
    ) -> Removal {
        let mut removal = Removal::default();

        match self.host.delete_route(record.address, host_device) {
            Ok(()) => {
                tracing::info!(address = %record, device = host_device, "Deleted static route");
            }
            Err(e) => {
                tracing::warn!(address = %record, device = host_device, "{e}");
                removal.failures += 1;
            }
        }

        let upstreams = upstreams();
        if upstreams.is_empty() {
            tracing::warn!(address = %record, "No proxy entry found to remove");
        }
        for device in upstreams {
            match self.host.delete_proxy(record.address, &device) {
                Ok(()) => {
                    tracing::info!(address = %record, device = %device, "Deleted proxy");
                    removal.proxies_removed.push(device);
                }
                Err(e) => {
                    tracing::warn!(address = %record, device = %device, "{e}");
                    removal.failures += 1;
                }
            }
        }

        removal
    }

    /// Stop answering for the gateway. Returns whether the deletion worked.
    pub fn remove_gateway_proxy(&mut self, binding: &GatewayProxyBinding) -> bool {
        match self.host.delete_proxy(binding.gateway, &binding.device) {
            Ok(()) => {
                tracing::info!(
                    gateway = %binding.gateway,
                    device = %binding.device,
                    "Deleted proxy for gateway"
                );
                true
            }
            Err(e) => {
                tracing::warn!(gateway = %binding.gateway, device = %binding.device, "{e}");
                false
            }
        }
    }
}
