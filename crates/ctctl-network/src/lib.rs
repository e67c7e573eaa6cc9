//! # ctctl-network
//!
//! Host network primitives for routed container networking.
//!
//! This crate wraps the kernel state the hooks touch: routes, proxy
//! neighbour entries, interface parameters and raw link-layer announcements.
//! Callers work against the [`HostNetwork`] and [`Advertiser`] traits so the
//! sequencing logic can run against a fake host.

#![warn(missing_docs)]

pub mod address;
pub mod advert;
pub mod host;
pub mod interface;
pub mod iproute;

pub use address::{AddressRecord, IpFamily, normalize};
pub use advert::{Advertiser, RawSocketAdvertiser};
pub use host::HostNetwork;
pub use interface::{LinkInfo, MacAddress, validate_interface_name};
pub use iproute::IpRoute2;
