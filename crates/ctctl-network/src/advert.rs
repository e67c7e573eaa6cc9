//! Address ownership announcements.
//!
//! After a container address moves behind this host, peers on the upstream
//! segment may still cache the old link-layer owner. A gratuitous ARP reply
//! (IPv4) or an unsolicited Neighbor Advertisement (IPv6) carrying the
//! upstream interface's MAC updates those caches immediately.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
#[cfg(target_os = "linux")]
use std::os::fd::AsRawFd;

use ctctl_common::{CtctlError, CtctlPaths, CtctlResult};
use smoltcp::phy::ChecksumCapabilities;
use smoltcp::wire::{
    ArpOperation, ArpPacket, ArpRepr, EthernetAddress, EthernetFrame, EthernetProtocol,
    EthernetRepr, Icmpv6Packet, Icmpv6Repr, IpAddress, IpProtocol, Ipv4Address, Ipv6Address,
    Ipv6Packet, Ipv6Repr, NdiscNeighborFlags, NdiscRepr,
};
#[cfg(target_os = "linux")]
use socket2::{Domain, Protocol, Socket, Type};

use crate::interface::{LinkInfo, MacAddress};

const ETH_P_ARP: u16 = 0x0806;
const ETH_P_IPV6: u16 = 0x86dd;

/// Ethernet group address for ff02::1.
const ALL_NODES_MAC: EthernetAddress = EthernetAddress([0x33, 0x33, 0x00, 0x00, 0x00, 0x01]);

/// Sends address ownership announcements.
pub trait Advertiser {
    /// Announce on `device` that `address` is reachable at the device's MAC.
    fn announce(&self, device: &str, address: IpAddr) -> CtctlResult<()>;
}

/// Build a broadcast gratuitous ARP reply for `address` owned by `mac`.
#[must_use]
pub fn gratuitous_arp(mac: MacAddress, address: Ipv4Addr) -> Vec<u8> {
    let ip = Ipv4Address::from_bytes(&address.octets());
    let arp = ArpRepr::EthernetIpv4 {
        operation: ArpOperation::Reply,
        source_hardware_addr: EthernetAddress(mac.0),
        source_protocol_addr: ip,
        target_hardware_addr: EthernetAddress::BROADCAST,
        target_protocol_addr: ip,
    };
    let eth = EthernetRepr {
        src_addr: EthernetAddress(mac.0),
        dst_addr: EthernetAddress::BROADCAST,
        ethertype: EthernetProtocol::Arp,
    };

    let mut buf = vec![0u8; eth.buffer_len() + arp.buffer_len()];
    let mut frame = EthernetFrame::new_unchecked(&mut buf);
    eth.emit(&mut frame);
    arp.emit(&mut ArpPacket::new_unchecked(frame.payload_mut()));
    buf
}

/// Build an unsolicited Neighbor Advertisement for `address` owned by `mac`,
/// sent to all nodes with only the override flag set.
#[must_use]
pub fn unsolicited_neighbor_advert(mac: MacAddress, address: Ipv6Addr) -> Vec<u8> {
    let target = Ipv6Address::from_bytes(&address.octets());
    let icmp = Icmpv6Repr::Ndisc(NdiscRepr::NeighborAdvert {
        flags: NdiscNeighborFlags::OVERRIDE,
        target_addr: target,
        lladdr: Some(EthernetAddress(mac.0).into()),
    });
    let ipv6 = Ipv6Repr {
        src_addr: target,
        dst_addr: Ipv6Address::LINK_LOCAL_ALL_NODES,
        next_header: IpProtocol::Icmpv6,
        payload_len: icmp.buffer_len(),
        hop_limit: 255,
    };
    let eth = EthernetRepr {
        src_addr: EthernetAddress(mac.0),
        dst_addr: ALL_NODES_MAC,
        ethertype: EthernetProtocol::Ipv6,
    };

    let mut buf = vec![0u8; eth.buffer_len() + ipv6.buffer_len() + icmp.buffer_len()];
    let mut frame = EthernetFrame::new_unchecked(&mut buf);
    eth.emit(&mut frame);

    let mut packet = Ipv6Packet::new_unchecked(frame.payload_mut());
    ipv6.emit(&mut packet);

    icmp.emit(
        &IpAddress::Ipv6(ipv6.src_addr),
        &IpAddress::Ipv6(ipv6.dst_addr),
        &mut Icmpv6Packet::new_unchecked(packet.payload_mut()),
        &ChecksumCapabilities::default(),
    );
    buf
}

/// Sends announcements on an `AF_PACKET` socket bound to the device.
#[derive(Debug, Clone, Default)]
pub struct RawSocketAdvertiser {
    paths: CtctlPaths,
}

impl RawSocketAdvertiser {
    /// Look up interfaces under the given sysfs tree.
    #[must_use]
    pub fn new(paths: CtctlPaths) -> Self {
        Self { paths }
    }
}

impl Advertiser for RawSocketAdvertiser {
    fn announce(&self, device: &str, address: IpAddr) -> CtctlResult<()> {
        let transmission = |message: String| CtctlError::Transmission {
            address: address.to_string(),
            device: device.to_string(),
            message,
        };

        let link = LinkInfo::lookup(&self.paths, device)
            .map_err(|e| transmission(e.to_string()))?;
        let (ethertype, frame) = match address {
            IpAddr::V4(v4) => (ETH_P_ARP, gratuitous_arp(link.mac, v4)),
            IpAddr::V6(v6) => (ETH_P_IPV6, unsolicited_neighbor_advert(link.mac, v6)),
        };

        send_frame(link.index, ethertype, &frame)
            .map_err(|e| transmission(e.to_string()))?;
        tracing::debug!(%address, device, mac = %link.mac, len = frame.len(), "Advertisement sent");
        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn send_frame(ifindex: u32, ethertype: u16, frame: &[u8]) -> io::Result<()> {
    let ifindex = i32::try_from(ifindex)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "ifindex out of range"))?;
    let socket = Socket::new(
        Domain::PACKET,
        Type::RAW,
        Some(Protocol::from(i32::from(ethertype.to_be()))),
    )?;

    let addr = libc::sockaddr_ll {
        sll_family: libc::AF_PACKET as u16,
        sll_protocol: ethertype.to_be(),
        sll_ifindex: ifindex,
        sll_hatype: 0,
        sll_pkttype: 0,
        sll_halen: 0,
        sll_addr: [0; 8],
    };

    // SAFETY: `addr` is a fully initialised sockaddr_ll and the length matches it.
    #[allow(unsafe_code)]
    let ret = unsafe {
        libc::bind(
            socket.as_raw_fd(),
            (&raw const addr).cast::<libc::sockaddr>(),
            std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }

    let sent = socket.send(frame)?;
    if sent != frame.len() {
        return Err(io::Error::new(
            io::ErrorKind::WriteZero,
            format!("short write: {sent} of {} bytes", frame.len()),
        ));
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn send_frame(_ifindex: u32, _ethertype: u16, _frame: &[u8]) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "raw link-layer sockets require Linux",
    ))
}
