//! Recording fakes of the host network and advertiser.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::net::IpAddr;

use ctctl_common::{CtctlError, CtctlResult};
use ctctl_netup::config::ConfigResolver;
use ctctl_netup::lxc::LxcConfig;
use ctctl_netup::{InvocationContext, Orchestrator, Report};
use ctctl_network::{Advertiser, HostNetwork, IpFamily};

pub const HOOK: &str = "/usr/sbin/ctctl-netup";

/// A kernel mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    ProxyNdp(String),
    NonlocalBind(IpFamily),
    ReplaceRoute(IpAddr, String),
    DeleteRoute(IpAddr, String),
    ReplaceProxy(IpAddr, String),
    DeleteProxy(IpAddr, String),
}

/// Host that keeps route and proxy tables in memory and records every mutation.
#[derive(Default)]
pub struct RecordingHost {
    /// Routes the host had before any hook ran.
    upstream: HashMap<IpAddr, String>,
    routes: RefCell<HashMap<IpAddr, String>>,
    proxies: RefCell<Vec<(IpAddr, String)>>,
    ops: RefCell<Vec<Op>>,
    failing: RefCell<Vec<Op>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `address` reachable through `device`.
    pub fn with_upstream(mut self, address: &str, device: &str) -> Self {
        self.upstream.insert(ip(address), device.to_string());
        self
    }

    /// Make `op` fail when attempted.
    pub fn fail_on(&self, op: Op) {
        self.failing.borrow_mut().push(op);
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.borrow().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.borrow_mut().clear();
    }

    pub fn routes(&self) -> HashMap<IpAddr, String> {
        self.routes.borrow().clone()
    }

    pub fn proxies(&self) -> Vec<(IpAddr, String)> {
        let mut proxies = self.proxies.borrow().clone();
        proxies.sort();
        proxies
    }

    fn record(&self, op: Op) -> CtctlResult<()> {
        self.ops.borrow_mut().push(op.clone());
        if self.failing.borrow().contains(&op) {
            let message = "Operation not permitted";
            return Err(CtctlError::kernel(format!("{op:?}"), "fake", message));
        }
        Ok(())
    }
}

impl HostNetwork for RecordingHost {
    fn route_device(&self, address: IpAddr) -> CtctlResult<Option<String>> {
        let routes = self.routes.borrow();
        let device = routes.get(&address).or_else(|| self.upstream.get(&address));
        Ok(device.cloned())
    }

    fn proxy_devices(&self, address: IpAddr) -> CtctlResult<Vec<String>> {
        let proxies = self.proxies.borrow();
        let devices = proxies.iter().filter(|(a, _)| *a == address);
        Ok(devices.map(|(_, d)| d.clone()).collect())
    }

    fn replace_route(&self, address: IpAddr, device: &str) -> CtctlResult<()> {
        self.record(Op::ReplaceRoute(address, device.to_string()))?;
        self.routes.borrow_mut().insert(address, device.to_string());
        Ok(())
    }

    fn delete_route(&self, address: IpAddr, device: &str) -> CtctlResult<()> {
        self.record(Op::DeleteRoute(address, device.to_string()))?;
        let mut routes = self.routes.borrow_mut();
        if routes.get(&address).map(String::as_str) != Some(device) {
            let target = format!("{address} dev {device}");
            return Err(CtctlError::kernel(
                "deleting static route",
                target,
                "No such process",
            ));
        }
        routes.remove(&address);
        Ok(())
    }

    fn replace_proxy(&self, address: IpAddr, device: &str) -> CtctlResult<()> {
        self.record(Op::ReplaceProxy(address, device.to_string()))?;
        let entry = (address, device.to_string());
        let mut proxies = self.proxies.borrow_mut();
        if !proxies.contains(&entry) {
            proxies.push(entry);
        }
        Ok(())
    }

    fn delete_proxy(&self, address: IpAddr, device: &str) -> CtctlResult<()> {
        self.record(Op::DeleteProxy(address, device.to_string()))?;
        let mut proxies = self.proxies.borrow_mut();
        let before = proxies.len();
        proxies.retain(|(a, d)| !(*a == address && d == device));
        if proxies.len() == before {
            let target = format!("{address} dev {device}");
            return Err(CtctlError::kernel(
                "removing proxy",
                target,
                "No such file or directory",
            ));
        }
        Ok(())
    }

    fn enable_proxy_ndp(&self, interface: &str) -> CtctlResult<()> {
        self.record(Op::ProxyNdp(interface.to_string()))
    }

    fn enable_nonlocal_bind(&self, family: IpFamily) -> CtctlResult<()> {
        self.record(Op::NonlocalBind(family))
    }
}

/// Advertiser that records announcements.
#[derive(Default)]
pub struct RecordingAdvertiser {
    sent: RefCell<Vec<(String, IpAddr)>>,
    fail: bool,
}

impl RecordingAdvertiser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(String, IpAddr)> {
        self.sent.borrow().clone()
    }
}

impl Advertiser for RecordingAdvertiser {
    fn announce(&self, device: &str, address: IpAddr) -> CtctlResult<()> {
        if self.fail {
            return Err(CtctlError::Transmission {
                address: address.to_string(),
                device: device.to_string(),
                message: "Network is down".to_string(),
            });
        }
        self.sent.borrow_mut().push((device.to_string(), address));
        Ok(())
    }
}

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// Config of a single veth device using this hook.
pub fn device_config(lines: &str) -> LxcConfig {
    let text = format!("lxc.net.0.type = veth\nlxc.net.0.script.up = {HOOK}\n{lines}");
    LxcConfig::parse_str(&text).unwrap()
}

pub fn context(hook: &str) -> InvocationContext {
    InvocationContext::new("web1", hook, "veth", "vethABC123").unwrap()
}

pub fn run(
    host: &RecordingHost,
    advertiser: &RecordingAdvertiser,
    hook: &str,
    config: &LxcConfig,
) -> CtctlResult<Report> {
    let orchestrator = Orchestrator::new(host, advertiser, ConfigResolver::new(HOOK));
    orchestrator.run(&context(hook), config)
}
