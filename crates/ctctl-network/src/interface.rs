//! Network interface names and link-layer details.

use std::fmt;
use std::path::Path;

use ctctl_common::{CtctlError, CtctlPaths, CtctlResult};

/// Longest interface name the kernel accepts (IFNAMSIZ minus the NUL).
pub const MAX_INTERFACE_NAME: usize = 15;

/// Check that `name` is usable as a Linux interface name.
///
/// Names end up in `/proc/sys` paths and `ip` arguments, so path separators
/// and whitespace are refused along with anything the kernel would reject.
pub fn validate_interface_name(name: &str) -> CtctlResult<()> {
    let reason = if name.is_empty() {
        Some("empty name")
    } else if name.len() > MAX_INTERFACE_NAME {
        Some("longer than 15 bytes")
    } else if name == "." || name == ".." {
        Some("reserved name")
    } else if name
        .chars()
        .any(|c| c == '/' || c == ':' || c == '\0' || c.is_whitespace())
    {
        Some("contains '/', ':', NUL or whitespace")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(CtctlError::InvalidInterfaceName {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Ethernet hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Parse the colon separated form used by sysfs (`52:54:00:12:34:56`).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let mut octets = [0u8; 6];
        let mut parts = value.trim().split(':');
        for octet in &mut octets {
            let part = parts.next()?;
            if part.len() != 2 {
                return None;
            }
            *octet = u8::from_str_radix(part, 16).ok()?;
        }
        if parts.next().is_some() {
            return None;
        }
        Some(Self(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// Kernel index and hardware address of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkInfo {
    /// Interface index.
    pub index: u32,
    /// Hardware address.
    pub mac: MacAddress,
}

impl LinkInfo {
    /// Read link details for `name` from sysfs.
    pub fn lookup(paths: &CtctlPaths, name: &str) -> CtctlResult<Self> {
        validate_interface_name(name)?;
        let dir = paths.interface(name);

        let index = read_attr(&dir, "ifindex", name)?;
        let index = index.parse::<u32>().map_err(|e| {
            CtctlError::kernel("reading ifindex", name, format!("'{index}': {e}"))
        })?;

        let mac = read_attr(&dir, "address", name)?;
        let mac = MacAddress::parse(&mac).ok_or_else(|| {
            CtctlError::kernel(
                "reading hardware address",
                name,
                format!("'{mac}' is not an Ethernet address"),
            )
        })?;

        tracing::debug!(interface = name, index, %mac, "Resolved link");
        Ok(Self { index, mac })
    }
}

fn read_attr(dir: &Path, attr: &str, name: &str) -> CtctlResult<String> {
    std::fs::read_to_string(dir.join(attr))
        .map(|s| s.trim().to_string())
        .map_err(|e| CtctlError::kernel(format!("reading {attr}"), name, e.to_string()))
}
