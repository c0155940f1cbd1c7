//! Resolve this device's own LAN address, used to pick the subnet to sweep.

use std::net::{IpAddr, Ipv4Addr};

use crate::error::{DiscoveryError, Result};

pub trait LocalAddress: Send + Sync {
    fn local_ip(&self) -> Result<IpAddr>;
}

/// Reads the address from the host's network interfaces.
#[derive(Debug, Default, Clone, Copy)]
pub struct InterfaceAddress;

impl LocalAddress for InterfaceAddress {
    fn local_ip(&self) -> Result<IpAddr> {
        let interfaces = if_addrs::get_if_addrs()
            .map_err(|e| DiscoveryError::Network(format!("failed to list interfaces: {e}")))?;
        let candidates: Vec<Ipv4Addr> = interfaces
            .iter()
            .filter(|iface| !iface.is_loopback())
            .filter_map(|iface| match iface.ip() {
                IpAddr::V4(ip) if is_lan_ipv4(ip) => Some(ip),
                _ => None,
            })
            .collect();
        // Wi-Fi and Ethernet sit on private ranges; tunnels often do not.
        candidates
            .iter()
            .find(|ip| ip.is_private())
            .or_else(|| candidates.first())
            .map(|ip| IpAddr::V4(*ip))
            .ok_or_else(|| DiscoveryError::Network("no IPv4 interface is up".to_string()))
    }
}

/// An address handed in by the embedding platform (e.g. a mobile shell that
/// already knows its Wi-Fi address). `None` means the platform could not tell.
#[derive(Debug, Clone, Copy)]
pub struct StaticAddress(pub Option<IpAddr>);

impl LocalAddress for StaticAddress {
    fn local_ip(&self) -> Result<IpAddr> {
        self.0
            .ok_or_else(|| DiscoveryError::Network("local address unavailable".to_string()))
    }
}

/// A unicast IPv4 address whose /24 is worth sweeping.
pub fn is_lan_ipv4(ip: Ipv4Addr) -> bool {
    !(ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_multicast()
        || ip.octets()[3] == 0)
}
