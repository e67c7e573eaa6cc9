//! Standard filesystem paths for ctctl.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;

/// Default LXC container store.
pub static LXC_PATH: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("CTCTL_LXC_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/var/lib/lxc"))
});

/// Default lock file serialising hook invocations.
pub static LOCK_FILE: Lazy<PathBuf> = Lazy::new(|| {
    std::env::var("CTCTL_LOCK_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/run/lock/ctctl-netup.lock"))
});

/// Standard paths used by the hooks.
#[derive(Debug, Clone)]
pub struct CtctlPaths {
    /// LXC container store (default: /var/lib/lxc).
    pub lxc_path: PathBuf,
    /// Invocation lock file (default: /run/lock/ctctl-netup.lock).
    pub lock_file: PathBuf,
    /// Kernel parameter tree (default: /proc/sys).
    pub proc_sys: PathBuf,
    /// Network interface tree (default: /sys/class/net).
    pub sys_class_net: PathBuf,
}

impl CtctlPaths {
    /// Create paths with default locations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create paths with a custom container store.
    #[must_use]
    pub fn with_lxc_path(mut self, lxc_path: impl Into<PathBuf>) -> Self {
        self.lxc_path = lxc_path.into();
        self
    }

    /// Create paths with a custom lock file.
    #[must_use]
    pub fn with_lock_file(mut self, lock_file: impl Into<PathBuf>) -> Self {
        self.lock_file = lock_file.into();
        self
    }

    /// Directory of a specific container.
    #[must_use]
    pub fn container(&self, name: &str) -> PathBuf {
        self.lxc_path.join(name)
    }

    /// Container config file.
    #[must_use]
    pub fn container_config(&self, name: &str) -> PathBuf {
        self.container(name).join("config")
    }

    /// IPv6 per-interface parameter file, e.g. `proxy_ndp` for `all`.
    #[must_use]
    pub fn ipv6_conf(&self, interface: &str, param: &str) -> PathBuf {
        self.proc_sys
            .join("net/ipv6/conf")
            .join(interface)
            .join(param)
    }

    /// Protocol-wide parameter file, e.g. `net/ipv4/ip_nonlocal_bind`.
    #[must_use]
    pub fn sysctl(&self, key: impl AsRef<Path>) -> PathBuf {
        self.proc_sys.join(key)
    }

    /// Sysfs directory of a network interface.
    #[must_use]
    pub fn interface(&self, name: &str) -> PathBuf {
        self.sys_class_net.join(name)
    }
}

impl Default for CtctlPaths {
    fn default() -> Self {
        Self {
            lxc_path: LXC_PATH.clone(),
            lock_file: LOCK_FILE.clone(),
            proc_sys: PathBuf::from("/proc/sys"),
            sys_class_net: PathBuf::from("/sys/class/net"),
        }
    }
}
