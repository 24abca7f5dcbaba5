//! Tunables recognized by the oracle, per the external interface contract.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

/// A candidate pair of probe-target destinations, one per family, from which
/// [`OracleConfig::probe_target_pool`] draws two at `init()`.
#[derive(Debug, Clone, Copy)]
pub struct ProbeTargetCandidate {
    pub v6: Ipv6Addr,
    pub v4: Ipv4Addr,
}

#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Sweep cadence for the poll worker.
    pub poll_period: Duration,
    /// Per-probe wall-clock deadline.
    pub probe_timeout: Duration,
    /// Transport port used for probes.
    pub probe_port: u16,
    /// Soft cap on user-role destination addresses.
    pub da_max_user: usize,
    /// Garbage-collection age threshold for user-role destination addresses.
    pub da_max_age: Duration,
    /// Minimum most-recent user-role entries preserved by GC regardless of age.
    pub da_keep_floor: usize,
    /// Candidate probe targets; two (one per family) are chosen at random on init.
    pub probe_target_pool: Vec<ProbeTargetCandidate>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            poll_period: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(1),
            probe_port: 80,
            da_max_user: 256,
            da_max_age: Duration::from_secs(600),
            da_keep_floor: 8,
            probe_target_pool: default_probe_target_pool(),
        }
    }
}

/// A small pool of well-known, highly-available dual-stack hosts used as
/// baseline reachability probe targets. Operators embedding this crate are
/// expected to override this with targets appropriate to their network.
fn default_probe_target_pool() -> Vec<ProbeTargetCandidate> {
    vec![
        ProbeTargetCandidate {
            v6: "2606:4700:4700::1111".parse().unwrap(),
            v4: Ipv4Addr::new(1, 1, 1, 1),
        },
        ProbeTargetCandidate {
            v6: "2001:4860:4860::8888".parse().unwrap(),
            v4: Ipv4Addr::new(8, 8, 8, 8),
        },
    ]
}
