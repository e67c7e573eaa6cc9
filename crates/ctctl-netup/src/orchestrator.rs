//! Up and down handlers.

use ctctl_common::{CtctlError, CtctlResult};
use ctctl_network::{AddressRecord, Advertiser, HostNetwork, IpFamily, normalize};

use crate::config::{ConfigResolver, NetworkDeviceConfig};
use crate::context::{HookContext, InvocationContext};
use crate::lxc::LxcConfig;
use crate::proxy::{GatewayProxyBinding, ProxyStateManager};
use crate::resolver::{RouteBinding, RouteResolver};

/// What an invocation did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    /// Addresses routed (up), or proxy entries actually removed (down).
    pub bindings: Vec<RouteBinding>,
    /// Addresses with no upstream interface (up) or no proxy entry
    /// removed (down).
    pub skipped: Vec<AddressRecord>,
    /// Gateway proxies installed (up) or removed (down).
    pub gateways: Vec<GatewayProxyBinding>,
    /// Teardown steps that failed.
    pub failures: usize,
}

/// Runs one hook invocation against the host.
pub struct Orchestrator<'a, H, A> {
    host: &'a H,
    advertiser: &'a A,
    resolver: ConfigResolver,
    nonlocal_bind: bool,
}

impl<'a, H: HostNetwork, A: Advertiser> Orchestrator<'a, H, A> {
    /// Create an orchestrator matching devices with `resolver`.
    pub const fn new(host: &'a H, advertiser: &'a A, resolver: ConfigResolver) -> Self {
        Self {
            host,
            advertiser,
            resolver,
            nonlocal_bind: false,
        }
    }

    /// Also enable non-local bind for the families being routed.
    #[must_use]
    pub const fn with_nonlocal_bind(mut self, enabled: bool) -> Self {
        self.nonlocal_bind = enabled;
        self
    }

    /// Handle the event described by `ctx`.
    ///
    /// Configuration problems are reported before the host is touched.
    pub fn run(&self, ctx: &InvocationContext, config: &LxcConfig) -> CtctlResult<Report> {
        let device = self.resolver.resolve(ctx, config)?;
        let records = normalize(&device.ipv4, &device.ipv6);
        if records.is_empty() {
            return Err(CtctlError::NoAddresses {
                container: ctx.container.clone(),
            });
        }

        match ctx.hook {
            HookContext::Up => self.up(ctx, &device, &records),
            HookContext::Down => Ok(self.down(ctx, &device, &records)),
        }
    }

    fn up(
        &self,
        ctx: &InvocationContext,
        device: &NetworkDeviceConfig,
        records: &[AddressRecord],
    ) -> CtctlResult<Report> {
        tracing::info!(
            container = %ctx.container,
            device = %ctx.host_device,
            addresses = ?records.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "LXC Net UP"
        );

        let resolver = RouteResolver::new(self.host, &ctx.host_device);
        let (bindings, skipped) = resolver.resolve_all(records)?;
        if bindings.is_empty() {
            return Err(CtctlError::NoRoutableAddresses {
                container: ctx.container.clone(),
            });
        }

        let mut proxy = ProxyStateManager::new(self.host);
        proxy.enable_global_proxy_ndp()?;

        if self.nonlocal_bind {
            for family in [IpFamily::V4, IpFamily::V6] {
                if bindings.iter().any(|b| b.address.family() == family) {
                    proxy.enable_nonlocal_bind(family)?;
                }
            }
        }

        let gateways = gateway_bindings(ctx, device);
        for gateway in &gateways {
            proxy.install_gateway_proxy(gateway)?;
        }

        for binding in &bindings {
            proxy.install_route_and_proxy(binding, &ctx.host_device)?;
            self.advertiser
                .announce(&binding.upstream, binding.address.address)?;
            tracing::info!(
                address = %binding.address,
                device = %binding.upstream,
                "Advertised NDP/ARP"
            );
        }

        tracing::debug!(
            stage = ?proxy.stage(),
            routed = bindings.len(),
            skipped = skipped.len(),
            "Up complete"
        );
        Ok(Report {
            bindings,
            skipped,
            gateways,
            failures: 0,
        })
    }

    fn down(
        &self,
        ctx: &InvocationContext,
        device: &NetworkDeviceConfig,
        records: &[AddressRecord],
    ) -> Report {
        tracing::info!(
            container = %ctx.container,
            device = %ctx.host_device,
            addresses = ?records.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "LXC Net Down"
        );

        let resolver = RouteResolver::new(self.host, &ctx.host_device);
        let mut proxy = ProxyStateManager::new(self.host);
        let mut report = Report::default();

        for record in records {
            let upstreams = || resolver.cleanup_upstreams(record);
            let removal = proxy.remove_route_and_proxy(record, &ctx.host_device, upstreams);
            report.failures += removal.failures;

            if removal.proxies_removed.is_empty() {
                report.skipped.push(*record);
            }
            for upstream in removal.proxies_removed {
                report.bindings.push(RouteBinding {
                    address: *record,
                    upstream,
                });
            }
        }

        for gateway in gateway_bindings(ctx, device) {
            if proxy.remove_gateway_proxy(&gateway) {
                report.gateways.push(gateway);
            } else {
                report.failures += 1;
            }
        }

        if report.failures > 0 {
            tracing::warn!(failures = report.failures, "Teardown incomplete");
        }
        report
    }
}

fn gateway_bindings(
    ctx: &InvocationContext,
    device: &NetworkDeviceConfig,
) -> Vec<GatewayProxyBinding> {
    device
        .gateways()
        .into_iter()
        .map(|gateway| GatewayProxyBinding {
            device: ctx.host_device.clone(),
            gateway,
        })
        .collect()
}
