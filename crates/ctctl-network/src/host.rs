//! Host network control.
//!
//! Routing, neighbour and interface parameter state is host-wide and has no
//! owner inside the process. Everything that reads or mutates it goes through
//! [`HostNetwork`], one method per kernel primitive.

use std::net::IpAddr;

use ctctl_common::CtctlResult;

use crate::address::IpFamily;

/// Kernel routing, neighbour and parameter primitives.
pub trait HostNetwork {
    /// Interface the kernel currently uses to reach `address`.
    ///
    /// Returns `Ok(None)` when the address is unroutable.
    fn route_device(&self, address: IpAddr) -> CtctlResult<Option<String>>;

    /// Interfaces holding a proxy neighbour entry for `address`.
    fn proxy_devices(&self, address: IpAddr) -> CtctlResult<Vec<String>>;

    /// Add (or replace) a host route for `address` out of `device`.
    fn replace_route(&self, address: IpAddr, device: &str) -> CtctlResult<()>;

    /// Delete the host route for `address` out of `device`.
    fn delete_route(&self, address: IpAddr, device: &str) -> CtctlResult<()>;

    /// Add (or replace) a proxy neighbour entry for `address` on `device`.
    fn replace_proxy(&self, address: IpAddr, device: &str) -> CtctlResult<()>;

    /// Delete the proxy neighbour entry for `address` on `device`.
    fn delete_proxy(&self, address: IpAddr, device: &str) -> CtctlResult<()>;

    /// Turn on NDP proxying for `interface` (`all` for every interface).
    fn enable_proxy_ndp(&self, interface: &str) -> CtctlResult<()>;

    /// Allow binding to addresses of `family` not configured on the host.
    fn enable_nonlocal_bind(&self, family: IpFamily) -> CtctlResult<()>;
}
