//! Hook invocation context.

use std::fmt;
use std::str::FromStr;

use ctctl_common::{CtctlError, CtctlResult};
use ctctl_network::validate_interface_name;

/// Device type the hook can route.
pub const SUPPORTED_DEVICE_TYPE: &str = "veth";

/// Lifecycle transition that triggered the hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookContext {
    /// The host side of the device came up.
    Up,
    /// The device is going down.
    Down,
}

impl FromStr for HookContext {
    type Err = CtctlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(CtctlError::UnknownContext {
                context: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for HookContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Up => "up",
            Self::Down => "down",
        })
    }
}

/// Everything the container runtime told us about this event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationContext {
    /// Container name.
    pub container: String,
    /// Up or down.
    pub hook: HookContext,
    /// Device type, e.g. `veth`.
    pub device_type: String,
    /// Host-side device name, e.g. `vethABC123`.
    pub host_device: String,
}

impl InvocationContext {
    /// Build a context from the raw hook arguments.
    pub fn new(
        container: impl Into<String>,
        context: &str,
        device_type: impl Into<String>,
        host_device: impl Into<String>,
    ) -> CtctlResult<Self> {
        let host_device = host_device.into();
        validate_interface_name(&host_device)?;

        Ok(Self {
            container: container.into(),
            hook: context.parse()?,
            device_type: device_type.into(),
            host_device,
        })
    }

    /// Fail unless the device is a veth.
    pub fn ensure_supported_device(&self) -> CtctlResult<()> {
        if self.device_type == SUPPORTED_DEVICE_TYPE {
            Ok(())
        } else {
            Err(CtctlError::UnsupportedDeviceType {
                device_type: self.device_type.clone(),
            })
        }
    }
}
