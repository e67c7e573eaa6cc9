//! Upstream interface resolution.

use ctctl_common::{CtctlError, CtctlResult};
use ctctl_network::{AddressRecord, HostNetwork};

/// An address paired with the interface it is reached through from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteBinding {
    /// Container address.
    pub address: AddressRecord,
    /// Host interface currently facing the address.
    pub upstream: String,
}

/// Finds the upstream interface of container addresses.
///
/// The kernel is asked how it reaches the address today. Once an "up" has
/// installed the host route, that answer is the container's own device, so
/// the interface already holding the proxy entry is used instead.
pub struct RouteResolver<'a, H> {
    host: &'a H,
    host_device: &'a str,
}

impl<'a, H: HostNetwork> RouteResolver<'a, H> {
    /// Resolve on behalf of the container behind `host_device`.
    pub const fn new(host: &'a H, host_device: &'a str) -> Self {
        Self { host, host_device }
    }

    /// Upstream interface of `record`.
    ///
    /// # Errors
    ///
    /// [`CtctlError::RouteNotFound`] when neither the routing table nor an
    /// existing proxy entry names an interface.
    pub fn upstream(&self, record: &AddressRecord) -> CtctlResult<String> {
        let not_found = || CtctlError::RouteNotFound {
            address: record.to_string(),
        };

        match self.host.route_device(record.address)? {
            Some(device) if device != self.host_device => Ok(device),
            Some(_) => self
                .host
                .proxy_devices(record.address)?
                .into_iter()
                .find(|device| device != self.host_device)
                .ok_or_else(not_found),
            None => Err(not_found()),
        }
    }

    /// Resolve every record, returning the bindings and the records that
    /// could not be resolved.
    ///
    /// Kernel query failures are fatal; unresolvable addresses are not.
    pub fn resolve_all(
        &self,
        records: &[AddressRecord],
    ) -> CtctlResult<(Vec<RouteBinding>, Vec<AddressRecord>)> {
        let mut bindings = Vec::with_capacity(records.len());
        let mut skipped = Vec::new();

        for record in records {
            match self.upstream(record) {
                Ok(upstream) => {
                    tracing::debug!(address = %record, upstream = %upstream, "Resolved upstream");
                    bindings.push(RouteBinding {
                        address: *record,
                        upstream,
                    });
                }
                Err(e @ CtctlError::RouteNotFound { .. }) => {
                    tracing::warn!(address = %record, "{e}, skipping");
                    skipped.push(*record);
                }
                Err(e) => return Err(e),
            }
        }

        Ok((bindings, skipped))
    }

    /// Interfaces that may hold state for `record` during teardown.
    ///
    /// Best-effort: query failures are logged and yield fewer candidates.
    pub fn cleanup_upstreams(&self, record: &AddressRecord) -> Vec<String> {
        let mut devices = Vec::new();

        match self.host.route_device(record.address) {
            Ok(Some(device)) => devices.push(device),
            Ok(None) => {}
            Err(e) => tracing::warn!(address = %record, "{e}"),
        }
        match self.host.proxy_devices(record.address) {
            Ok(found) => devices.extend(found),
            Err(e) => tracing::warn!(address = %record, "{e}"),
        }

        let mut upstreams: Vec<String> = Vec::with_capacity(devices.len());
        for device in devices {
            if device != self.host_device && !upstreams.contains(&device) {
                upstreams.push(device);
            }
        }
        upstreams
    }
}
