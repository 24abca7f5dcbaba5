//! `get_addr_pairs`: merges measured oracle evidence with a policy table
//! to answer callers, per the rule-based source-address selection spec.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use crate::classify::{classify, AddressFamily, ScopeClass};
use crate::error::OracleError;
use crate::model::{DaRole, DestinationAddress};
use crate::oracle::state::OracleState;
use crate::resolver::Resolver;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AddrPair {
    pub family: AddressFamily,
    pub source: SocketAddr,
    pub destination: SocketAddr,
    /// Measured (from the pair table) or a policy-assigned synthetic value.
    pub latency_ms: f64,
    /// `true` when `latency_ms` came from the pair table, `false` when it's
    /// a policy-assigned synthetic guess. Breaks ordering ties: a measured
    /// value beats a synthetic guess of the same latency.
    pub measured: bool,
}

/// Synthetic latencies assigned to rule-based guesses, per the policy
/// table. Ties among synthetic suggestions of the same value are broken by
/// the order rules fire in, below.
mod synthetic {
    pub const LLA: f64 = 1.0;
    pub const V4_LL: f64 = 2.0;
    pub const ULA_TO_ULA: f64 = 199.0;
    pub const GUA_TO_GUA: f64 = 200.0;
    pub const NPTV6: f64 = 201.0;
    pub const V4_RFC1918_OR_NAT44: f64 = 250.0;
}

pub async fn get_addr_pairs<R: Resolver + ?Sized>(
    state: &Arc<Mutex<OracleState>>,
    resolver: &R,
    target: &str,
    port: u16,
) -> Result<Vec<AddrPair>, OracleError> {
    // ResolutionFailed is "no addresses", not an exception: any resolver
    // that reports it this way still yields an empty result sequence.
    let destinations = match resolver.resolve(target).await {
        Ok(destinations) => destinations,
        Err(OracleError::ResolutionFailed { .. }) => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    if destinations.is_empty() {
        return Ok(Vec::new());
    }

    let now = Instant::now();
    let mut results = Vec::new();

    let mut guard = state.lock().await;
    for (addr, da_zone) in destinations {
        let da_key = (AddressFamily::of(&addr), addr);

        if guard.destination(&da_key).is_some() {
            for pair in guard.pairs_for_da(&da_key).cloned().collect::<Vec<_>>() {
                if let Some(sa) = guard.source(&pair.sa_key) {
                    results.push(AddrPair {
                        family: sa.family,
                        source: socket_addr(sa.addr, 0, sa.zone),
                        destination: socket_addr(addr, port, da_zone),
                        latency_ms: pair.avg_latency_ms,
                        measured: true,
                    });
                }
            }
        } else {
            let scope = classify(&addr);
            guard.add_da(DestinationAddress::new(addr, DaRole::User, da_zone, now));

            let flags = guard.flags();
            let mut suggestions: Vec<(Option<u32>, IpAddr, f64)> = Vec::new();

            match AddressFamily::of(&addr) {
                AddressFamily::V6 => {
                    if scope == ScopeClass::Gua && flags.gua_ok {
                        suggestions.extend(sa_suggestions(&guard, ScopeClass::Gua, synthetic::GUA_TO_GUA));
                    }
                    if scope == ScopeClass::Ula {
                        suggestions.extend(sa_suggestions(&guard, ScopeClass::Ula, synthetic::ULA_TO_ULA));
                    }
                    if scope == ScopeClass::Gua && flags.nptv6 {
                        suggestions.extend(sa_suggestions(&guard, ScopeClass::Ula, synthetic::NPTV6));
                    }
                    if scope == ScopeClass::Lla && flags.lla_ok {
                        suggestions.extend(
                            sa_suggestions(&guard, ScopeClass::Lla, synthetic::LLA)
                                .into_iter()
                                .filter(|(sa_zone, _, _)| da_zone.is_none() || *sa_zone == da_zone),
                        );
                    }
                }
                AddressFamily::V4 => {
                    if (scope == ScopeClass::V4Global && flags.nat44) || scope == ScopeClass::Rfc1918 {
                        suggestions.extend(sa_suggestions(&guard, ScopeClass::Rfc1918, synthetic::V4_RFC1918_OR_NAT44));
                    }
                    if scope == ScopeClass::V4Global && flags.ipv4_ok {
                        suggestions.extend(sa_suggestions(&guard, ScopeClass::V4Global, synthetic::V4_RFC1918_OR_NAT44));
                    }
                    if scope == ScopeClass::V4Ll {
                        suggestions.extend(sa_suggestions(&guard, ScopeClass::V4Ll, synthetic::V4_LL));
                    }
                }
            }

            // Union across rules that both fired, deduplicated by SA key.
            let mut seen = std::collections::HashSet::new();
            for (sa_zone, sa_addr, latency) in suggestions {
                if !seen.insert((sa_addr, sa_zone)) {
                    continue;
                }
                results.push(AddrPair {
                    family: AddressFamily::of(&addr),
                    source: socket_addr(sa_addr, 0, sa_zone),
                    destination: socket_addr(addr, port, da_zone),
                    latency_ms: latency,
                    measured: false,
                });
            }
        }

        if let Some(da) = guard.destination_mut(&da_key) {
            da.last_used = now;
        }
    }
    drop(guard);

    results.sort_by(|a, b| {
        let fam_rank = |f: AddressFamily| if f == AddressFamily::V6 { 0 } else { 1 };
        // Measured evidence outranks a synthetic guess at the same latency.
        let measured_rank = |m: bool| if m { 0 } else { 1 };
        fam_rank(a.family)
            .cmp(&fam_rank(b.family))
            .then(a.latency_ms.partial_cmp(&b.latency_ms).unwrap_or(std::cmp::Ordering::Equal))
            .then(measured_rank(a.measured).cmp(&measured_rank(b.measured)))
    });

    Ok(results)
}

fn sa_suggestions(state: &OracleState, scope: ScopeClass, latency: f64) -> Vec<(Option<u32>, IpAddr, f64)> {
    state
        .sources()
        .filter(|sa| sa.scope == scope)
        .map(|sa| (sa.zone, sa.addr, latency))
        .collect()
}

fn socket_addr(ip: IpAddr, port: u16, zone: Option<u32>) -> SocketAddr {
    match ip {
        IpAddr::V4(v4) => SocketAddr::V4(std::net::SocketAddrV4::new(v4, port)),
        IpAddr::V6(v6) => SocketAddr::V6(std::net::SocketAddrV6::new(v6, port, 0, zone.unwrap_or(0))),
    }
}
