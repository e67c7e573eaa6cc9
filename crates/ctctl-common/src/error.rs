//! Common error types for the ctctl hooks.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using [`CtctlError`].
pub type CtctlResult<T> = Result<T, CtctlError>;

/// Broad failure classes used to decide how an error is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or invalid declared data. Always raised before any kernel mutation.
    Configuration,
    /// The kernel has no route for an address.
    Resolution,
    /// A route, neighbour or interface parameter mutation failed.
    KernelOperation,
    /// An address advertisement could not be transmitted.
    Transmission,
    /// Local I/O, locking or programming errors.
    System,
}

/// Common errors across the ctctl hooks.
#[derive(Error, Diagnostic, Debug)]
pub enum CtctlError {
    /// Container has no configuration in the store.
    #[error("Container {name} not defined")]
    #[diagnostic(
        code(ctctl::config::container_not_defined),
        help("Check the container name and the --lxcpath option")
    )]
    ContainerNotDefined {
        /// The container name.
        name: String,
    },

    /// The hook fired for a device type that cannot be routed.
    #[error("Unsupported dev type: {device_type}")]
    #[diagnostic(
        code(ctctl::config::unsupported_device_type),
        help("Only veth devices are supported")
    )]
    UnsupportedDeviceType {
        /// The device type passed by the container runtime.
        device_type: String,
    },

    /// Hook context is neither `up` nor `down`.
    #[error("Unknown context: {context}")]
    #[diagnostic(code(ctctl::config::unknown_context))]
    UnknownContext {
        /// The context argument.
        context: String,
    },

    /// Interface name is not usable as a Linux interface name.
    #[error("Invalid interface name '{name}': {reason}")]
    #[diagnostic(code(ctctl::config::invalid_interface))]
    InvalidInterfaceName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// No declared network device uses this program as its up script.
    #[error("No network device of container {container} uses {hook} as its up script")]
    #[diagnostic(
        code(ctctl::config::no_matching_device),
        help("Set lxc.net.<i>.script.up to the path of this hook")
    )]
    NoMatchingDevice {
        /// The container name.
        container: String,
        /// The hook path that was searched for.
        hook: String,
    },

    /// The matched device declares no addresses.
    #[error("No IPs defined for CT Dev Ref: {container}")]
    #[diagnostic(code(ctctl::config::no_addresses))]
    NoAddresses {
        /// The container name.
        container: String,
    },

    /// The matched device declares no gateway for either family.
    #[error("No Gateways defined for CT Dev Ref: {container}")]
    #[diagnostic(code(ctctl::config::no_gateways))]
    NoGateways {
        /// The container name.
        container: String,
    },

    /// A container configuration file could not be read.
    #[error("Failed to read config file '{path}': {source}")]
    #[diagnostic(code(ctctl::config::read))]
    ConfigRead {
        /// The file that failed to read.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// A container configuration line could not be parsed.
    #[error("Failed to parse '{path}' line {line}: {message}")]
    #[diagnostic(code(ctctl::config::parse))]
    ConfigParse {
        /// The file being parsed.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// The error message.
        message: String,
    },

    /// No route to the address exists.
    #[error("Can't find route device for IP '{address}'")]
    #[diagnostic(code(ctctl::resolve::route_not_found))]
    RouteNotFound {
        /// The unroutable address.
        address: String,
    },

    /// None of the declared addresses could be resolved to an upstream device.
    #[error("No routable IPs for container {container}")]
    #[diagnostic(
        code(ctctl::resolve::nothing_routable),
        help("Check that the host has a default route for each declared address family")
    )]
    NoRoutableAddresses {
        /// The container name.
        container: String,
    },

    /// A route, neighbour or interface parameter operation failed.
    #[error("Error {operation} for '{target}': {message}")]
    #[diagnostic(code(ctctl::kernel))]
    KernelOperation {
        /// What was attempted, e.g. "adding static route".
        operation: String,
        /// The address or interface the operation applied to.
        target: String,
        /// The OS error text.
        message: String,
    },

    /// Sending an ARP or NDP advertisement failed.
    #[error("Error sending advertisement for IP '{address}' on iface {device}: {message}")]
    #[diagnostic(code(ctctl::transmit))]
    Transmission {
        /// The advertised address.
        address: String,
        /// The interface the frame was sent on.
        device: String,
        /// The OS error text.
        message: String,
    },

    /// The invocation lock could not be taken.
    #[error("Failed to lock '{path}': {source}")]
    #[diagnostic(code(ctctl::lock))]
    Lock {
        /// The lock file.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// Internal error (should not happen).
    #[error("Internal error: {message}")]
    #[diagnostic(code(ctctl::internal), help("This is a bug, please report it"))]
    Internal {
        /// The error message.
        message: String,
    },
}

impl CtctlError {
    /// Build a [`CtctlError::KernelOperation`].
    pub fn kernel(
        operation: impl Into<String>,
        target: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::KernelOperation {
            operation: operation.into(),
            target: target.into(),
            message: message.into(),
        }
    }

    /// The failure class this error belongs to.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::ContainerNotDefined { .. }
            | Self::UnsupportedDeviceType { .. }
            | Self::UnknownContext { .. }
            | Self::InvalidInterfaceName { .. }
            | Self::NoMatchingDevice { .. }
            | Self::NoAddresses { .. }
            | Self::NoGateways { .. }
            | Self::ConfigRead { .. }
            | Self::ConfigParse { .. } => ErrorCategory::Configuration,
            Self::RouteNotFound { .. } | Self::NoRoutableAddresses { .. } => {
                ErrorCategory::Resolution
            }
            Self::KernelOperation { .. } => ErrorCategory::KernelOperation,
            Self::Transmission { .. } => ErrorCategory::Transmission,
            Self::Lock { .. } | Self::Internal { .. } => ErrorCategory::System,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CtctlError::ContainerNotDefined {
            name: "web1".to_string(),
        };
        assert_eq!(err.to_string(), "Container web1 not defined");
    }

    #[test]
    fn kernel_error_carries_target_and_os_text() {
        let err = CtctlError::kernel(
            "adding static route",
            "203.0.113.5",
            "RTNETLINK answers: File exists",
        );
        assert_eq!(
            err.to_string(),
            "Error adding static route for '203.0.113.5': RTNETLINK answers: File exists"
        );
        assert_eq!(err.category(), ErrorCategory::KernelOperation);
    }

    #[test]
    fn categories() {
        assert_eq!(
            CtctlError::NoGateways {
                container: "c".into()
            }
            .category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            CtctlError::RouteNotFound {
                address: "2001:db8::1".into()
            }
            .category(),
            ErrorCategory::Resolution
        );
        assert_eq!(
            CtctlError::Transmission {
                address: "203.0.113.5".into(),
                device: "eth0".into(),
                message: "Network is down".into(),
            }
            .category(),
            ErrorCategory::Transmission
        );
    }

    #[test]
    fn lock_error_is_a_system_error() {
        let err = CtctlError::Lock {
            path: PathBuf::from("/run/lock/ctctl-netup.lock"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().starts_with("Failed to lock"));
        assert_eq!(err.category(), ErrorCategory::System);
    }
}
