//! Target resolution: IP literal or FQDN to a set of destination
//! addresses. DNS name resolution itself is an external collaborator
//! (spec'd as a black-box call); this module only decides whether to take
//! that path or short-circuit on a literal.
//!
//! Link-local literals may carry a numeric zone suffix (`fe80::2%3`) since
//! `std`'s `IpAddr` parser has no notion of zones at all. Named zones
//! (`fe80::2%eth0`) require resolving the interface name to a numeric
//! scope id, which this crate's inventory source cannot portably do (see
//! `inventory::zone_for_interface`) — callers on such a path are expected
//! to pre-resolve the name themselves.

use std::net::IpAddr;

use crate::error::OracleError;

/// A destination address together with its IPv6 zone, if the caller's
/// target specified one.
pub type ResolvedTarget = (IpAddr, Option<u32>);

#[async_trait::async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, target: &str) -> Result<Vec<ResolvedTarget>, OracleError>;
}

/// Default resolver: literal IPs (optionally `%<numeric-zone>`) resolve
/// instantly; anything else goes through tokio's async `lookup_host`,
/// reusing the runtime already driving the oracle's workers instead of
/// pulling in a separate DNS crate.
#[derive(Debug, Default)]
pub struct TokioResolver;

fn parse_literal(target: &str) -> Option<ResolvedTarget> {
    if let Some((addr_part, zone_part)) = target.split_once('%') {
        let addr: IpAddr = addr_part.parse().ok()?;
        if !addr.is_ipv6() {
            return None;
        }
        let zone: u32 = zone_part.parse().ok()?;
        return Some((addr, Some(zone)));
    }
    target.parse::<IpAddr>().ok().map(|addr| (addr, None))
}

#[async_trait::async_trait]
impl Resolver for TokioResolver {
    async fn resolve(&self, target: &str) -> Result<Vec<ResolvedTarget>, OracleError> {
        if let Some(resolved) = parse_literal(target) {
            return Ok(vec![resolved]);
        }

        // DNS returning no addresses, or the lookup itself failing, are both
        // "nothing to connect to" from the caller's point of view — not an
        // exception. `resolve` returns an empty sequence either way; a
        // resolver is never expected to surface `ResolutionFailed` for this.
        let lookup_target = format!("{target}:0");
        match tokio::net::lookup_host(&lookup_target).await {
            Ok(iter) => Ok(iter.map(|s| (s.ip(), None)).collect()),
            Err(e) => {
                tracing::debug!(%target, error = %e, "DNS lookup failed, returning empty sequence");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn literal_v4_resolves_without_dns() {
        let r = TokioResolver;
        let addrs = r.resolve("203.0.113.5").await.unwrap();
        assert_eq!(addrs, vec![("203.0.113.5".parse::<IpAddr>().unwrap(), None)]);
    }

    #[tokio::test]
    async fn literal_v6_resolves_without_dns() {
        let r = TokioResolver;
        let addrs = r.resolve("2001:db8::1").await.unwrap();
        assert_eq!(addrs, vec![("2001:db8::1".parse::<IpAddr>().unwrap(), None)]);
    }

    #[tokio::test]
    async fn literal_v6_with_numeric_zone_resolves() {
        let r = TokioResolver;
        let addrs = r.resolve("fe80::2%3").await.unwrap();
        assert_eq!(addrs, vec![("fe80::2".parse::<IpAddr>().unwrap(), Some(3))]);
    }
}
