//! End-to-end lifecycle tests against the real `tokio` networking stack.
//!
//! Real connectivity tests can't assume an external network in CI, so these
//! drive probes against the test host's own non-loopback interface instead
//! of a public target: intrinsic validity forbids loopback scope outright
//! (see `classify::intrinsically_valid`), so a loopback listener can't stand
//! in for "the real thing" here the way it can in `probe`'s own unit tests.
//! Tests that need such an interface skip themselves when none is found
//! rather than failing a CI runner with no non-loopback NIC.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;

use connoracle::inventory::{GatewaySource, InventorySource, Snapshot};
use connoracle::model::SourceAddress;
use connoracle::resolver::{Resolver, ResolvedTarget};
use connoracle::{Oracle, OracleConfig, OracleError, ProbeTargetCandidate, StatusValue};

struct FixedInventory(Snapshot);

impl InventorySource for FixedInventory {
    fn refresh(&self) -> Result<Snapshot, std::io::Error> {
        Ok(self.0.clone())
    }
}

struct LiteralResolver(Vec<ResolvedTarget>);

#[async_trait]
impl Resolver for LiteralResolver {
    async fn resolve(&self, _target: &str) -> Result<Vec<ResolvedTarget>, OracleError> {
        Ok(self.0.clone())
    }
}

/// Finds a non-loopback IPv4 address assigned to this host, if any.
fn own_v4_addr() -> Option<Ipv4Addr> {
    get_if_addrs::get_if_addrs().ok()?.into_iter().find_map(|iface| {
        if iface.is_loopback() {
            return None;
        }
        match iface.ip() {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        }
    })
}

fn quick_config(probe_port: u16, v4_target: Ipv4Addr) -> OracleConfig {
    OracleConfig {
        poll_period: Duration::from_millis(200),
        probe_timeout: Duration::from_secs(1),
        probe_port,
        probe_target_pool: vec![ProbeTargetCandidate {
            v6: Ipv6Addr::UNSPECIFIED,
            v4: v4_target,
        }],
        ..OracleConfig::default()
    }
}

#[tokio::test]
async fn probing_own_interface_marks_ipv4_ok_and_surfaces_in_status() {
    let Some(addr) = own_v4_addr() else {
        eprintln!("skipping: host has no non-loopback IPv4 interface");
        return;
    };

    let listener = TcpListener::bind((addr, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            if listener.accept().await.is_err() {
                break;
            }
        }
    });

    let inventory = Arc::new(FixedInventory(Snapshot {
        sources: vec![SourceAddress::new(addr.into(), None)],
        gateway_v6: None,
        gateway_v4: None,
    }));
    let resolver = Arc::new(LiteralResolver(vec![]));

    let oracle = Oracle::init_with(quick_config(port, addr), inventory, resolver)
        .await
        .unwrap();

    let status = oracle.status().await;
    assert_eq!(status["IPv4_ok"], StatusValue::Bool(true));

    oracle.shutdown().await;
}

#[tokio::test]
async fn known_destination_query_returns_measured_pair() {
    let Some(addr) = own_v4_addr() else {
        eprintln!("skipping: host has no non-loopback IPv4 interface");
        return;
    };

    let listener = TcpListener::bind((addr, 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            if listener.accept().await.is_err() {
                break;
            }
        }
    });

    let inventory = Arc::new(FixedInventory(Snapshot {
        sources: vec![SourceAddress::new(addr.into(), None)],
        gateway_v6: None,
        gateway_v4: None,
    }));
    // The probe-target pool seeds `addr` itself as a `ProbeTarget` destination,
    // so after the blocking first sweep it should already carry evidence.
    let resolver = Arc::new(LiteralResolver(vec![(addr.into(), None)]));

    let oracle = Oracle::init_with(quick_config(port, addr), inventory, resolver)
        .await
        .unwrap();

    let pairs = oracle.get_addr_pairs("self", port).await.unwrap();
    assert!(
        pairs.iter().any(|p| p.source.ip() == IpAddr::V4(addr) && p.destination.ip() == IpAddr::V4(addr)),
        "expected a measured pair back to the probed interface, got {pairs:?}"
    );

    oracle.shutdown().await;
}

#[tokio::test]
async fn empty_inventory_yields_all_flags_false_and_no_pairs() {
    let inventory = Arc::new(FixedInventory(Snapshot::empty()));
    let resolver = Arc::new(LiteralResolver(vec![("203.0.113.5".parse().unwrap(), None)]));

    let config = OracleConfig {
        poll_period: Duration::from_millis(200),
        ..OracleConfig::default()
    };
    let oracle = Oracle::init_with(config, inventory, resolver).await.unwrap();

    let status = oracle.status().await;
    for key in ["NPTv6", "NAT44", "ULA_ok", "LLA_ok", "GUA_ok", "IPv4_ok"] {
        assert_eq!(status[key], StatusValue::Bool(false), "flag {key} should start false");
    }
    assert_eq!(status["def_gateway4"], StatusValue::None);

    let pairs = oracle.get_addr_pairs("target", 443).await.unwrap();
    assert!(pairs.is_empty());

    oracle.shutdown().await;
}

#[tokio::test]
async fn discovered_gateway_is_reflected_in_status() {
    struct FakeGateway;
    impl GatewaySource for FakeGateway {
        fn gateways(&self) -> (Option<Ipv6Addr>, Option<Ipv4Addr>) {
            (None, Some(Ipv4Addr::new(192, 168, 1, 1)))
        }
    }

    struct GatewayInventory;
    impl InventorySource for GatewayInventory {
        fn refresh(&self) -> Result<Snapshot, std::io::Error> {
            let (gateway_v6, gateway_v4) = FakeGateway.gateways();
            Ok(Snapshot {
                sources: vec![],
                gateway_v6,
                gateway_v4,
            })
        }
    }

    let inventory = Arc::new(GatewayInventory);
    let resolver = Arc::new(LiteralResolver(vec![]));
    let config = OracleConfig {
        poll_period: Duration::from_millis(200),
        ..OracleConfig::default()
    };
    let oracle = Oracle::init_with(config, inventory, resolver).await.unwrap();

    let status = oracle.status().await;
    assert_eq!(status["def_gateway4"], StatusValue::Address("192.168.1.1".to_string()));
    assert_eq!(status["def_gateway6"], StatusValue::None);

    oracle.shutdown().await;
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let inventory = Arc::new(FixedInventory(Snapshot::empty()));
    let resolver = Arc::new(LiteralResolver(vec![]));
    let config = OracleConfig {
        poll_period: Duration::from_millis(200),
        ..OracleConfig::default()
    };
    let oracle = Oracle::init_with(config, inventory, resolver).await.unwrap();

    oracle.shutdown().await;
    oracle.shutdown().await;
}
