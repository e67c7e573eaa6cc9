//! Command line of the network hook.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::Result;
use ctctl_common::CtctlPaths;
use ctctl_network::{IpRoute2, RawSocketAdvertiser};

use crate::config::ConfigResolver;
use crate::context::InvocationContext;
use crate::lock::InvocationLock;
use crate::lxc::LxcConfig;
use crate::orchestrator::Orchestrator;

/// ctctl-netup - routed veth networking for LXC containers
///
/// Run by LXC as a network up/down script. Routes the container's
/// addresses to its host-side veth and answers ARP/NDP for them upstream.
#[derive(Parser, Debug)]
#[command(name = "ctctl-netup")]
#[command(author, version, about)]
pub struct Cli {
    /// Container name
    pub container: String,

    /// Hook section (LXC passes `net`)
    pub section: String,

    /// Hook context: up or down
    pub context: String,

    /// Network device type
    pub device_type: String,

    /// Host-side device name
    pub host_device: String,

    /// Further arguments from the runtime, ignored
    #[arg(hide = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub extra: Vec<String>,

    /// LXC container store
    #[arg(long, env = "CTCTL_LXC_PATH", default_value = "/var/lib/lxc")]
    pub lxcpath: PathBuf,

    /// Lock file serialising concurrent invocations
    #[arg(
        long,
        env = "CTCTL_LOCK_FILE",
        default_value = "/run/lock/ctctl-netup.lock"
    )]
    pub lock_file: PathBuf,

    /// Up script path to match in the container config (default: argv[0])
    #[arg(long)]
    pub hook_path: Option<String>,

    /// Also enable ip_nonlocal_bind for the routed families
    #[arg(long)]
    pub nonlocal_bind: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Path the matching up script must end with.
    #[must_use]
    pub fn hook_identity(&self) -> String {
        self.hook_path.clone().unwrap_or_else(|| {
            std::env::args_os()
                .next()
                .map(|arg0| arg0.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }

    /// Execute the hook.
    pub fn execute(self) -> Result<()> {
        if self.section != "net" {
            tracing::debug!(section = %self.section, "Unexpected hook section");
        }

        let ctx = InvocationContext::new(
            &*self.container,
            &self.context,
            &*self.device_type,
            &*self.host_device,
        )
        .inspect_err(|e| tracing::error!("{e}"))?;

        let paths = CtctlPaths::new()
            .with_lxc_path(&self.lxcpath)
            .with_lock_file(&self.lock_file);

        let config = LxcConfig::load_container(&paths, &ctx.container)
            .inspect_err(|e| tracing::error!("{e}"))?;

        let _lock = InvocationLock::acquire(&paths.lock_file)
            .inspect_err(|e| tracing::error!("{e}"))?;

        let host = IpRoute2::new(paths.clone());
        let advertiser = RawSocketAdvertiser::new(paths);
        let resolver = ConfigResolver::new(self.hook_identity());
        let orchestrator =
            Orchestrator::new(&host, &advertiser, resolver).with_nonlocal_bind(self.nonlocal_bind);

        let report = orchestrator
            .run(&ctx, &config)
            .inspect_err(|e| tracing::error!(category = ?e.category(), "{e}"))?;

        tracing::info!(
            container = %ctx.container,
            context = %ctx.hook,
            addresses = report.bindings.len(),
            skipped = report.skipped.len(),
            gateways = report.gateways.len(),
            "Done"
        );
        Ok(())
    }
}
