//! Scan target generation and address policy.
//!
//! The invariant enforced here: in mainnet mode a target is valid exactly
//! when its address is publicly routable. Private, reserved, multicast,
//! and link-local space is never probed on mainnet, and mainnet targets
//! only ever come from external sources — there is no brute-force
//! enumeration of public space.

use ember_peer::NetworkMode;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Ports swept during a testnet scan.
pub const SCAN_PORTS: &[u16] = &[8330, 8331, 8332];

/// Whether an address is publicly routable.
#[must_use]
pub fn is_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => is_public_v6(v6),
    }
}

fn is_public_v4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    if ip.is_unspecified()
        || ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_multicast()
    {
        return false;
    }
    // 100.64.0.0/10 (carrier-grade NAT)
    if octets[0] == 100 && (octets[1] & 0xc0) == 64 {
        return false;
    }
    // 198.18.0.0/15 (benchmarking)
    if octets[0] == 198 && (octets[1] & 0xfe) == 18 {
        return false;
    }
    // 240.0.0.0/4 (reserved)
    if octets[0] >= 240 {
        return false;
    }
    true
}

fn is_public_v6(ip: Ipv6Addr) -> bool {
    let segments = ip.segments();
    if ip.is_unspecified() || ip.is_loopback() || ip.is_multicast() {
        return false;
    }
    // fc00::/7 (unique local)
    if (segments[0] & 0xfe00) == 0xfc00 {
        return false;
    }
    // fe80::/10 (link local)
    if (segments[0] & 0xffc0) == 0xfe80 {
        return false;
    }
    true
}

/// Whether an address may be probed in the given mode.
///
/// Mainnet: public addresses only. Testnet: anything unicast — private
/// ranges are the whole point, but multicast/broadcast/unspecified are
/// never connectable.
#[must_use]
pub fn is_valid_target(ip: IpAddr, mode: NetworkMode) -> bool {
    match mode {
        NetworkMode::Mainnet => is_public(ip),
        NetworkMode::Testnet => match ip {
            IpAddr::V4(v4) => !v4.is_multicast() && !v4.is_broadcast() && !v4.is_unspecified(),
            IpAddr::V6(v6) => !v6.is_multicast() && !v6.is_unspecified(),
        },
    }
}

/// Generate testnet targets: representative /24s of each private range
/// plus loopback, crossed with `ports`, capped at `max_targets`.
///
/// A full sweep of 10.0.0.0/8 is 16M hosts — nowhere near bounded-time.
/// The first /24 of each range covers the common home/lab layouts.
#[must_use]
pub fn testnet_targets(ports: &[u16], max_targets: usize) -> Vec<SocketAddr> {
    let mut hosts: Vec<IpAddr> = vec![IpAddr::V4(Ipv4Addr::LOCALHOST)];
    for host in 1..=254u8 {
        hosts.push(IpAddr::V4(Ipv4Addr::new(192, 168, 0, host)));
    }
    for host in 1..=254u8 {
        hosts.push(IpAddr::V4(Ipv4Addr::new(192, 168, 1, host)));
    }
    for host in 1..=254u8 {
        hosts.push(IpAddr::V4(Ipv4Addr::new(172, 16, 0, host)));
    }
    for host in 1..=254u8 {
        hosts.push(IpAddr::V4(Ipv4Addr::new(10, 0, 0, host)));
    }

    let mut targets = Vec::new();
    'outer: for host in hosts {
        for &port in ports {
            if targets.len() >= max_targets {
                break 'outer;
            }
            targets.push(SocketAddr::new(host, port));
        }
    }
    targets
}

/// Filter externally-supplied mainnet seeds down to valid public targets,
/// deduplicated, order preserved.
#[must_use]
pub fn mainnet_targets(seeds: &[SocketAddr]) -> Vec<SocketAddr> {
    let mut seen = HashSet::new();
    seeds
        .iter()
        .copied()
        .filter(|addr| is_valid_target(addr.ip(), NetworkMode::Mainnet))
        .filter(|addr| seen.insert(*addr))
        .collect()
}
