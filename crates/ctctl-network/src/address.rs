//! Declared container addresses.
//!
//! Container configs declare addresses with their prefix length
//! (`203.0.113.5/24`). Host routes and proxy entries are per address, so the
//! prefix is dropped here. Malformed entries are skipped one at a time; a bad
//! entry never aborts the rest of the batch.

use std::fmt;
use std::net::IpAddr;

use ipnet::IpNet;
use thiserror::Error;

/// Address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpFamily {
    /// IPv4.
    V4,
    /// IPv6.
    V6,
}

impl IpFamily {
    /// Family of an address.
    #[must_use]
    pub const fn of(address: &IpAddr) -> Self {
        match address {
            IpAddr::V4(_) => Self::V4,
            IpAddr::V6(_) => Self::V6,
        }
    }

    /// Protocol directory name under `/proc/sys/net`.
    #[must_use]
    pub const fn proc_name(self) -> &'static str {
        match self {
            Self::V4 => "ipv4",
            Self::V6 => "ipv6",
        }
    }
}

impl fmt::Display for IpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.proc_name())
    }
}

/// A declared container address with its prefix length removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressRecord {
    /// The host address.
    pub address: IpAddr,
}

impl AddressRecord {
    /// Whether this is an IPv6 address.
    #[must_use]
    pub const fn is_v6(&self) -> bool {
        self.address.is_ipv6()
    }

    /// Address family.
    #[must_use]
    pub const fn family(&self) -> IpFamily {
        IpFamily::of(&self.address)
    }
}

impl fmt::Display for AddressRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.address.fmt(f)
    }
}

/// Why a declared CIDR entry was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CidrError {
    /// No `/` separator.
    #[error("Invalid IP/mask supplied: {0}")]
    MissingPrefix(String),

    /// Address or prefix length does not parse.
    #[error("Invalid IP/mask supplied: {0}: {1}")]
    Malformed(String, String),

    /// An IPv6 entry in the IPv4 list or the other way round.
    #[error("Address {entry} declared as {expected}")]
    WrongFamily {
        /// The offending entry.
        entry: String,
        /// The list it was declared in.
        expected: IpFamily,
    },
}

/// Strip the prefix length from one declared entry.
///
/// Legacy configs may append a broadcast address after the CIDR
/// (`10.0.0.2/24 10.0.0.255`); only the first token is considered.
pub fn strip_prefix(entry: &str) -> Result<IpAddr, CidrError> {
    let cidr = entry.split_whitespace().next().unwrap_or_default();
    if !cidr.contains('/') {
        return Err(CidrError::MissingPrefix(entry.to_string()));
    }

    let net: IpNet = cidr
        .parse()
        .map_err(|e: ipnet::AddrParseError| {
            CidrError::Malformed(entry.to_string(), e.to_string())
        })?;
    Ok(net.addr())
}

/// Normalize the declared IPv4 and IPv6 lists into address records.
///
/// IPv4 entries come first, in declaration order, followed by IPv6.
#[must_use]
pub fn normalize(ipv4: &[String], ipv6: &[String]) -> Vec<AddressRecord> {
    let mut records = Vec::with_capacity(ipv4.len() + ipv6.len());
    collect(ipv4, IpFamily::V4, &mut records);
    collect(ipv6, IpFamily::V6, &mut records);
    records
}

fn collect(entries: &[String], family: IpFamily, out: &mut Vec<AddressRecord>) {
    for entry in entries {
        let parsed = strip_prefix(entry).and_then(|address| {
            if IpFamily::of(&address) == family {
                Ok(address)
            } else {
                Err(CidrError::WrongFamily {
                    entry: entry.clone(),
                    expected: family,
                })
            }
        });

        match parsed {
            Ok(address) => out.push(AddressRecord { address }),
            Err(e) => tracing::warn!(%family, "{}", e),
        }
    }
}
