//! # ctctl-netup
//!
//! LXC network hook giving veth containers routed, publicly addressed
//! networking without a bridge.
//!
//! On `up` the hook resolves which host interface currently reaches each
//! declared container address, then:
//!
//! - enables NDP proxying host-wide,
//! - answers for the container's gateways on its host-side veth,
//! - routes each address to the veth and answers for it upstream,
//! - announces the move with a gratuitous ARP or unsolicited NA.
//!
//! On `down` the routes and proxy entries are removed again, best-effort.
//!
//! ## Usage
//!
//! ```text
//! lxc.net.0.type = veth
//! lxc.net.0.script.up = /usr/sbin/ctctl-netup
//! lxc.net.0.script.down = /usr/sbin/ctctl-netup
//! lxc.net.0.ipv4.address = 203.0.113.5/24
//! lxc.net.0.ipv4.gateway = 203.0.113.1
//! ```

#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod context;
pub mod lock;
pub mod lxc;
pub mod orchestrator;
pub mod proxy;
pub mod resolver;

pub use context::{HookContext, InvocationContext};
pub use orchestrator::{Orchestrator, Report};
