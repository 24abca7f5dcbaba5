//! Pure address classification: scope class assignment and pair validity.
//!
//! No I/O, no shared state. Every function here is total over syntactically
//! valid addresses, by construction of the enum match below.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeClass {
    Gua,
    Ula,
    Lla,
    V6Loopback,
    V6Mcast,
    Unspecified,
    V4Global,
    Rfc1918,
    V4Ll,
    V4Loopback,
    V4Mcast,
}

impl ScopeClass {
    pub fn family(self) -> AddressFamily {
        use ScopeClass::*;
        match self {
            Gua | Ula | Lla | V6Loopback | V6Mcast | Unspecified => AddressFamily::V6,
            V4Global | Rfc1918 | V4Ll | V4Loopback | V4Mcast => AddressFamily::V4,
        }
    }
}

/// Classify an address into a scope class. Total: every `IpAddr` maps to
/// exactly one `ScopeClass`.
pub fn classify(addr: &IpAddr) -> ScopeClass {
    match addr {
        IpAddr::V4(v4) => classify_v4(*v4),
        IpAddr::V6(v6) => classify_v6(*v6),
    }
}

fn classify_v4(addr: Ipv4Addr) -> ScopeClass {
    if addr.is_loopback() {
        ScopeClass::V4Loopback
    } else if addr.is_multicast() {
        ScopeClass::V4Mcast
    } else if is_link_local_v4(addr) {
        ScopeClass::V4Ll
    } else if is_rfc1918(addr) {
        ScopeClass::Rfc1918
    } else {
        ScopeClass::V4Global
    }
}

fn classify_v6(addr: Ipv6Addr) -> ScopeClass {
    if addr.is_unspecified() {
        ScopeClass::Unspecified
    } else if addr.is_loopback() {
        ScopeClass::V6Loopback
    } else if addr.is_multicast() {
        ScopeClass::V6Mcast
    } else if is_link_local_v6(addr) {
        ScopeClass::Lla
    } else if is_unique_local_v6(addr) {
        ScopeClass::Ula
    } else {
        // Default prefix list treats the remainder of the address space as
        // global unicast. This mirrors 2000::/3 minus the carved-out ULA
        // block, without maintaining a separate "is this really assigned"
        // registry.
        ScopeClass::Gua
    }
}

/// fc00::/7
fn is_unique_local_v6(addr: Ipv6Addr) -> bool {
    (addr.segments()[0] & 0xfe00) == 0xfc00
}

/// fe80::/10
fn is_link_local_v6(addr: Ipv6Addr) -> bool {
    (addr.segments()[0] & 0xffc0) == 0xfe80
}

/// 169.254.0.0/16
fn is_link_local_v4(addr: Ipv4Addr) -> bool {
    let o = addr.octets();
    o[0] == 169 && o[1] == 254
}

/// 10/8, 172.16/12, 192.168/16
fn is_rfc1918(addr: Ipv4Addr) -> bool {
    let o = addr.octets();
    o[0] == 10
        || (o[0] == 172 && (16..=31).contains(&o[1]))
        || (o[0] == 192 && o[1] == 168)
}

/// Rejects family mismatch, zone mismatch for LLA pairs, loopback/mcast/
/// unspecified endpoints, and v4-LL sources paired with non-v4-LL
/// destinations. Everything else is candidate-valid.
pub fn intrinsically_valid(
    sa_family: AddressFamily,
    sa_scope: ScopeClass,
    sa_zone: Option<u32>,
    da_family: AddressFamily,
    da_scope: ScopeClass,
    da_zone: Option<u32>,
) -> bool {
    if sa_family != da_family {
        return false;
    }

    let forbidden = |s: ScopeClass| {
        matches!(
            s,
            ScopeClass::V6Loopback
                | ScopeClass::V6Mcast
                | ScopeClass::Unspecified
                | ScopeClass::V4Loopback
                | ScopeClass::V4Mcast
        )
    };
    if forbidden(sa_scope) || forbidden(da_scope) {
        return false;
    }

    if sa_scope == ScopeClass::Lla || da_scope == ScopeClass::Lla {
        // An LLA pair is only valid between matching zones, or when the
        // destination carries no zone of its own (the host's own link).
        if sa_scope == ScopeClass::Lla && da_scope == ScopeClass::Lla {
            if let Some(dz) = da_zone {
                if Some(dz) != sa_zone {
                    return false;
                }
            }
        }
    }

    if sa_scope == ScopeClass::V4Ll && da_scope != ScopeClass::V4Ll {
        return false;
    }

    true
}

/// Heuristic off-site check: every GUA and every v4-global address is
/// considered off-site. A longest-prefix match against the host's own
/// assigned prefixes is the natural upgrade, left as a future extension
/// point rather than implemented here.
pub fn is_off_site(scope: ScopeClass) -> bool {
    matches!(scope, ScopeClass::Gua | ScopeClass::V4Global)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_is_total_and_deterministic() {
        let samples: &[IpAddr] = &[
            "2001:db8::1".parse().unwrap(),
            "fc00::1".parse().unwrap(),
            "fe80::1".parse().unwrap(),
            "::1".parse().unwrap(),
            "ff02::1".parse().unwrap(),
            "::".parse().unwrap(),
            "203.0.113.5".parse().unwrap(),
            "10.0.0.1".parse().unwrap(),
            "172.16.0.1".parse().unwrap(),
            "192.168.1.1".parse().unwrap(),
            "169.254.1.1".parse().unwrap(),
            "127.0.0.1".parse().unwrap(),
            "224.0.0.1".parse().unwrap(),
        ];
        for addr in samples {
            assert_eq!(classify(addr), classify(addr));
        }
    }

    #[test]
    fn classify_scope_representatives() {
        assert_eq!(classify(&"2001:db8::1".parse().unwrap()), ScopeClass::Gua);
        assert_eq!(classify(&"fc00::1".parse().unwrap()), ScopeClass::Ula);
        assert_eq!(classify(&"fe80::1".parse().unwrap()), ScopeClass::Lla);
        assert_eq!(classify(&"::1".parse().unwrap()), ScopeClass::V6Loopback);
        assert_eq!(classify(&"ff02::1".parse().unwrap()), ScopeClass::V6Mcast);
        assert_eq!(classify(&"::".parse().unwrap()), ScopeClass::Unspecified);
        assert_eq!(classify(&"203.0.113.5".parse().unwrap()), ScopeClass::V4Global);
        assert_eq!(classify(&"10.1.2.3".parse().unwrap()), ScopeClass::Rfc1918);
        assert_eq!(classify(&"172.20.0.1".parse().unwrap()), ScopeClass::Rfc1918);
        assert_eq!(classify(&"192.168.0.1".parse().unwrap()), ScopeClass::Rfc1918);
        assert_eq!(classify(&"169.254.1.1".parse().unwrap()), ScopeClass::V4Ll);
        assert_eq!(classify(&"127.0.0.1".parse().unwrap()), ScopeClass::V4Loopback);
        assert_eq!(classify(&"224.0.0.1".parse().unwrap()), ScopeClass::V4Mcast);
    }

    #[test]
    fn rejects_family_mismatch() {
        let v6 = "2001:db8::1".parse().unwrap();
        let v4 = "203.0.113.5".parse().unwrap();
        assert!(!intrinsically_valid(
            AddressFamily::of(&v6),
            classify(&v6),
            None,
            AddressFamily::of(&v4),
            classify(&v4),
            None,
        ));
    }

    #[test]
    fn rejects_lla_zone_mismatch() {
        let sa: IpAddr = "fe80::1".parse().unwrap();
        let da: IpAddr = "fe80::2".parse().unwrap();
        assert!(!intrinsically_valid(
            AddressFamily::of(&sa),
            classify(&sa),
            Some(1),
            AddressFamily::of(&da),
            classify(&da),
            Some(2),
        ));
        assert!(intrinsically_valid(
            AddressFamily::of(&sa),
            classify(&sa),
            Some(1),
            AddressFamily::of(&da),
            classify(&da),
            Some(1),
        ));
    }

    #[test]
    fn rejects_loopback_and_mcast_and_unspecified() {
        let sa: IpAddr = "2001:db8::1".parse().unwrap();
        for bad in ["::1", "ff02::1", "::"] {
            let da: IpAddr = bad.parse().unwrap();
            assert!(!intrinsically_valid(
                AddressFamily::of(&sa),
                classify(&sa),
                None,
                AddressFamily::of(&da),
                classify(&da),
                None,
            ));
        }
    }

    #[test]
    fn v4_ll_source_requires_v4_ll_destination() {
        let sa: IpAddr = "169.254.1.1".parse().unwrap();
        let da_global: IpAddr = "203.0.113.5".parse().unwrap();
        let da_ll: IpAddr = "169.254.1.2".parse().unwrap();
        assert!(!intrinsically_valid(
            AddressFamily::of(&sa),
            classify(&sa),
            None,
            AddressFamily::of(&da_global),
            classify(&da_global),
            None,
        ));
        assert!(intrinsically_valid(
            AddressFamily::of(&sa),
            classify(&sa),
            None,
            AddressFamily::of(&da_ll),
            classify(&da_ll),
            None,
        ));
    }

    #[test]
    fn off_site_heuristic() {
        assert!(is_off_site(ScopeClass::Gua));
        assert!(is_off_site(ScopeClass::V4Global));
        assert!(!is_off_site(ScopeClass::Ula));
        assert!(!is_off_site(ScopeClass::Rfc1918));
    }
}
