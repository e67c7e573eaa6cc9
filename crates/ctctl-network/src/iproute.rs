//! [`HostNetwork`] backed by iproute2 and `/proc/sys`.

use std::net::IpAddr;
use std::path::PathBuf;
use std::process::{Command, Output};

use ctctl_common::{CtctlError, CtctlPaths, CtctlResult};

use crate::address::IpFamily;
use crate::host::HostNetwork;
use crate::interface::validate_interface_name;

/// Host network control through the `ip` command.
#[derive(Debug, Clone)]
pub struct IpRoute2 {
    program: PathBuf,
    paths: CtctlPaths,
}

impl IpRoute2 {
    /// Use `ip` from `PATH` and the given kernel parameter tree.
    #[must_use]
    pub fn new(paths: CtctlPaths) -> Self {
        Self {
            program: PathBuf::from("ip"),
            paths,
        }
    }

    /// Use a specific `ip` binary.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn run(&self, operation: &str, target: &str, args: &[&str]) -> CtctlResult<Output> {
        tracing::trace!(?args, "Running ip");

        Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| {
                CtctlError::kernel(operation, target, format!("Failed to execute ip: {e}"))
            })
    }

    /// Run `ip` and return stdout; a non-zero exit becomes a kernel error
    /// carrying the combined output.
    fn ip(&self, operation: &str, target: &str, args: &[&str]) -> CtctlResult<String> {
        let output = self.run(operation, target, args)?;
        if !output.status.success() {
            return Err(CtctlError::kernel(
                operation,
                target,
                format!("{}: {}", output.status, combined(&output)),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn write_param(&self, operation: &str, target: &str, path: PathBuf) -> CtctlResult<()> {
        std::fs::write(&path, "1").map_err(|e| {
            CtctlError::kernel(operation, target, format!("{}: {e}", path.display()))
        })?;
        tracing::debug!(path = %path.display(), "Kernel parameter set");
        Ok(())
    }
}

impl HostNetwork for IpRoute2 {
    fn route_device(&self, address: IpAddr) -> CtctlResult<Option<String>> {
        let target = address.to_string();
        let output = self.run("querying route", &target, &["-o", "route", "get", &target])?;

        // `ip route get` exits non-zero for unreachable destinations.
        if !output.status.success() {
            tracing::debug!(address = %address, output = %combined(&output), "No route");
            return Ok(None);
        }

        Ok(parse_route_device(&String::from_utf8_lossy(&output.stdout)))
    }

    fn proxy_devices(&self, address: IpAddr) -> CtctlResult<Vec<String>> {
        let target = address.to_string();
        let output = self.ip(
            "listing proxy entries",
            &target,
            &["neigh", "show", "proxy", "to", &target],
        )?;
        Ok(parse_proxy_devices(&output))
    }

    fn replace_route(&self, address: IpAddr, device: &str) -> CtctlResult<()> {
        validate_interface_name(device)?;
        let address = address.to_string();
        self.ip(
            "adding static route",
            &format!("{address} dev {device}"),
            &["route", "replace", &address, "dev", device],
        )?;
        Ok(())
    }

    fn delete_route(&self, address: IpAddr, device: &str) -> CtctlResult<()> {
        validate_interface_name(device)?;
        let address = address.to_string();
        self.ip(
            "deleting static route",
            &format!("{address} dev {device}"),
            &["route", "del", &address, "dev", device],
        )?;
        Ok(())
    }

    fn replace_proxy(&self, address: IpAddr, device: &str) -> CtctlResult<()> {
        validate_interface_name(device)?;
        let address = address.to_string();
        self.ip(
            "adding proxy",
            &format!("{address} dev {device}"),
            &["neigh", "replace", "proxy", &address, "dev", device],
        )?;
        Ok(())
    }

    fn delete_proxy(&self, address: IpAddr, device: &str) -> CtctlResult<()> {
        validate_interface_name(device)?;
        let address = address.to_string();
        self.ip(
            "removing proxy",
            &format!("{address} dev {device}"),
            &["neigh", "del", "proxy", &address, "dev", device],
        )?;
        Ok(())
    }

    fn enable_proxy_ndp(&self, interface: &str) -> CtctlResult<()> {
        validate_interface_name(interface)?;
        self.write_param(
            "activating proxy ndp",
            interface,
            self.paths.ipv6_conf(interface, "proxy_ndp"),
        )
    }

    fn enable_nonlocal_bind(&self, family: IpFamily) -> CtctlResult<()> {
        self.write_param(
            "enabling non-local bind",
            family.proc_name(),
            self.paths
                .sysctl(format!("net/{}/ip_nonlocal_bind", family.proc_name())),
        )
    }
}

/// Device named in `ip -o route get` output.
#[must_use]
pub fn parse_route_device(output: &str) -> Option<String> {
    device_after_dev(output)
}

/// Devices named in `ip neigh show proxy` output, one entry per line.
#[must_use]
pub fn parse_proxy_devices(output: &str) -> Vec<String> {
    output.lines().filter_map(device_after_dev).collect()
}

fn combined(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(stderr.trim());
    }
    text
}

fn device_after_dev(line: &str) -> Option<String> {
    let mut fields = line.split_whitespace();
    fields.find(|field| *field == "dev")?;
    fields.next().map(str::to_string)
}
