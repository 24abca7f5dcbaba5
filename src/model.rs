//! Shared data model: source/destination addresses, confirmed pairs, and
//! connectivity flags. Mirrors the teacher's `net::types` role — the
//! vocabulary every other module speaks in — scoped to this oracle's
//! domain instead of P2P peer metadata.

use crate::classify::{classify, AddressFamily, ScopeClass};
use std::net::IpAddr;
use std::time::Instant;

/// Key identifying a source address in the inventory and pair table.
/// Addresses alone do not disambiguate link-locals reused across
/// interfaces, hence the zone component.
pub type SaKey = (IpAddr, Option<u32>);

/// Key identifying a destination address, per spec keyed by (family, addr).
pub type DaKey = (AddressFamily, IpAddr);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAddress {
    pub family: AddressFamily,
    pub addr: IpAddr,
    pub scope: ScopeClass,
    /// IPv6 link-local zone, as an interface index. `None` for all
    /// non-link-local addresses.
    pub zone: Option<u32>,
}

impl SourceAddress {
    pub fn new(addr: IpAddr, zone: Option<u32>) -> Self {
        Self {
            family: AddressFamily::of(&addr),
            addr,
            scope: classify(&addr),
            zone,
        }
    }

    pub fn key(&self) -> SaKey {
        (self.addr, self.zone)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaRole {
    ProbeTarget,
    LocalGateway,
    User,
}

impl DaRole {
    /// Relative priority; higher must never be overwritten by lower
    /// (`add_da` is idempotent and role-monotonic).
    fn priority(self) -> u8 {
        match self {
            DaRole::ProbeTarget => 2,
            DaRole::LocalGateway => 2,
            DaRole::User => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DestinationAddress {
    pub family: AddressFamily,
    pub addr: IpAddr,
    pub scope: ScopeClass,
    pub role: DaRole,
    /// IPv6 zone, when the caller specified one for a link-local target.
    pub zone: Option<u32>,
    pub first_seen: Instant,
    pub last_used: Instant,
}

impl DestinationAddress {
    pub fn new(addr: IpAddr, role: DaRole, zone: Option<u32>, now: Instant) -> Self {
        Self {
            family: AddressFamily::of(&addr),
            addr,
            scope: classify(&addr),
            role,
            zone,
            first_seen: now,
            last_used: now,
        }
    }

    pub fn key(&self) -> DaKey {
        (self.family, self.addr)
    }

    /// Whether `other`'s role may replace this entry's role (`add_da` never
    /// demotes an existing higher-priority DA).
    pub fn may_be_overwritten_by(&self, other_role: DaRole) -> bool {
        other_role.priority() > self.role.priority()
    }
}

/// Rolling-average sample cap: latency responsiveness to path changes is
/// capped at N=16 samples so old measurements decay within roughly a
/// minute of polling at the default cadence.
pub const MAX_ROLLING_SAMPLES: u32 = 16;

#[derive(Debug, Clone)]
pub struct Pair {
    pub sa_key: SaKey,
    pub da_key: DaKey,
    pub avg_latency_ms: f64,
    pub sample_count: u32,
    pub last_success_at: Instant,
}

impl Pair {
    pub fn new(sa_key: SaKey, da_key: DaKey, latency_ms: u64, now: Instant) -> Self {
        Self {
            sa_key,
            da_key,
            avg_latency_ms: latency_ms as f64,
            sample_count: 1,
            last_success_at: now,
        }
    }

    /// Exponential rolling average with weight 1/N, N capped at
    /// [`MAX_ROLLING_SAMPLES`].
    pub fn record(&mut self, latency_ms: u64, now: Instant) {
        self.sample_count = (self.sample_count + 1).min(MAX_ROLLING_SAMPLES);
        let n = self.sample_count as f64;
        self.avg_latency_ms += (latency_ms as f64 - self.avg_latency_ms) / n;
        self.last_success_at = now;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectivityFlags {
    pub gua_ok: bool,
    pub ula_ok: bool,
    pub lla_ok: bool,
    pub nptv6: bool,
    pub ipv4_ok: bool,
    pub nat44: bool,
    // One-shot inference bookkeeping, not part of the public status map's
    // documented core but exposed via `status()` per the external
    // interface's recognized keys.
    pub nptv6_tried: bool,
    pub nat44_tried: bool,
    pub ula_present: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_average_caps_weight() {
        let now = Instant::now();
        let mut pair = Pair::new((("10.0.0.1".parse().unwrap()), None), (AddressFamily::V4, "203.0.113.1".parse().unwrap()), 100, now);
        for _ in 0..100 {
            pair.record(100, now);
        }
        assert_eq!(pair.sample_count, MAX_ROLLING_SAMPLES);
        assert!((pair.avg_latency_ms - 100.0).abs() < 1e-6);
    }

    #[test]
    fn da_role_priority_is_monotonic() {
        let now = Instant::now();
        let mut da = DestinationAddress::new("203.0.113.1".parse().unwrap(), DaRole::ProbeTarget, None, now);
        assert!(!da.may_be_overwritten_by(DaRole::User));
        da.role = DaRole::User;
        assert!(da.may_be_overwritten_by(DaRole::ProbeTarget));
    }
}
