//! ctctl-netup entry point.

use clap::Parser;
use color_eyre::eyre::Result;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use ctctl_netup::cli::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // LXC captures stderr into the container log
    let directive = if cli.debug {
        "ctctl=debug"
    } else {
        "ctctl=info"
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    cli.execute()
}
