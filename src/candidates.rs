//! Local candidate discovery.
//!
//! Lists the addresses of this host that could plausibly be reachable
//! from outside: addresses on interfaces that are up and not loopback,
//! excluding loopback, wildcard, multicast, link-local and broadcast
//! addresses. Private ranges are kept; whether they are reachable is
//! exactly what a probe finds out.

use pnet::datalink::{self, NetworkInterface};
use std::net::{IpAddr, Ipv6Addr};

/// Check whether an address may be used as a probe candidate.
pub fn is_candidate(ip: &IpAddr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() || ip.is_multicast() {
        return false;
    }
    match ip {
        IpAddr::V4(v4) => !v4.is_link_local() && !v4.is_broadcast(),
        IpAddr::V6(v6) => !is_unicast_link_local(v6),
    }
}

/// `fe80::/10`.
fn is_unicast_link_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}

/// Collect candidate addresses from a set of interfaces.
///
/// IPv4 addresses come first, then IPv6, each in interface order, with
/// duplicates removed.
pub fn from_interfaces(interfaces: &[NetworkInterface]) -> Vec<IpAddr> {
    let ips: Vec<IpAddr> = interfaces
        .iter()
        .filter(|iface| iface.is_up() && !iface.is_loopback())
        .flat_map(|iface| iface.ips.iter().map(|net| net.ip()))
        .filter(is_candidate)
        .collect();

    let mut ordered: Vec<IpAddr> = ips.iter().copied().filter(IpAddr::is_ipv4).collect();
    ordered.extend(ips.iter().copied().filter(IpAddr::is_ipv6));
    let mut seen = std::collections::HashSet::new();
    ordered.retain(|ip| seen.insert(*ip));
    ordered
}

/// Discover candidate addresses on this host.
pub fn discover() -> Vec<IpAddr> {
    from_interfaces(&datalink::interfaces())
}
