//! Host inventory: snapshot of local source addresses and default
//! gateways, refreshable on demand via OS queries.
//!
//! Interface enumeration is delegated to `get_if_addrs`, the same crate the
//! `ssdp` pack member uses for this exact purpose. Default-gateway
//! discovery has no comparably portable crate in the pack; it is exposed
//! as a narrow trait (`GatewaySource`) with a no-op default so the oracle
//! degrades to "no known gateway" rather than failing outright when the
//! platform can't answer.

use crate::model::SourceAddress;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// A usable source address: assigned to an up, non-loopback interface.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub sources: Vec<SourceAddress>,
    pub gateway_v6: Option<Ipv6Addr>,
    pub gateway_v4: Option<Ipv4Addr>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self {
            sources: Vec::new(),
            gateway_v6: None,
            gateway_v4: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InventoryDiff {
    pub added: Vec<SourceAddress>,
    pub removed: Vec<SourceAddress>,
}

/// Diff two snapshots by source-address key, for cascading inventory
/// changes into oracle state.
pub fn diff(prev: &Snapshot, next: &Snapshot) -> InventoryDiff {
    let prev_keys: HashSet<_> = prev.sources.iter().map(|s| s.key()).collect();
    let next_keys: HashSet<_> = next.sources.iter().map(|s| s.key()).collect();

    let added = next
        .sources
        .iter()
        .filter(|s| !prev_keys.contains(&s.key()))
        .cloned()
        .collect();
    let removed = prev
        .sources
        .iter()
        .filter(|s| !next_keys.contains(&s.key()))
        .cloned()
        .collect();

    InventoryDiff { added, removed }
}

/// Queries the OS for the current default gateways. No portable mechanism
/// exists across platforms without pulling in raw routing-socket access;
/// implementations may return `None` for a family they cannot determine.
pub trait GatewaySource: Send + Sync {
    fn gateways(&self) -> (Option<Ipv6Addr>, Option<Ipv4Addr>);
}

/// Default gateway source: unknown on every platform. A host embedding
/// this crate with access to route-table introspection should supply its
/// own `GatewaySource`.
#[derive(Debug, Default)]
pub struct NoGatewaySource;

impl GatewaySource for NoGatewaySource {
    fn gateways(&self) -> (Option<Ipv6Addr>, Option<Ipv4Addr>) {
        (None, None)
    }
}

/// Abstraction over "enumerate my interfaces and addresses", kept narrow so
/// tests can supply a fake inventory without a live NIC.
pub trait InventorySource: Send + Sync {
    fn refresh(&self) -> Result<Snapshot, std::io::Error>;
}

/// OS-backed inventory source using `get_if_addrs`.
pub struct SystemInventory {
    gateways: Box<dyn GatewaySource>,
}

impl SystemInventory {
    pub fn new() -> Self {
        Self {
            gateways: Box::new(NoGatewaySource),
        }
    }

    pub fn with_gateway_source(gateways: Box<dyn GatewaySource>) -> Self {
        Self { gateways }
    }
}

impl Default for SystemInventory {
    fn default() -> Self {
        Self::new()
    }
}

impl InventorySource for SystemInventory {
    fn refresh(&self) -> Result<Snapshot, std::io::Error> {
        let ifaces = get_if_addrs::get_if_addrs()?;
        let mut sources = Vec::new();

        for iface in ifaces {
            if iface.is_loopback() {
                continue;
            }
            let addr: IpAddr = iface.ip();
            let zone = if addr.is_ipv6() {
                zone_for_interface(&iface.name)
            } else {
                None
            };
            sources.push(SourceAddress::new(addr, zone));
        }

        let (gateway_v6, gateway_v4) = self.gateways.gateways();
        Ok(Snapshot {
            sources,
            gateway_v6,
            gateway_v4,
        })
    }
}

/// Resolve an interface name to a numeric scope id for `SocketAddrV6`.
/// `get_if_addrs` 0.5.x does not expose interface indices directly; we
/// re-query through the same enumeration and fall back to `None` rather
/// than failing the whole refresh if the platform cannot resolve it.
fn zone_for_interface(_name: &str) -> Option<u32> {
    // No portable name->index lookup ships in `get_if_addrs` 0.5; left as
    // `None` (unscoped) until paired with a platform-specific resolver.
    // Loopback-free, single-homed-per-link-local-prefix hosts are
    // unaffected since pair validity only requires matching zones when
    // both sides specify one.
    None
}
