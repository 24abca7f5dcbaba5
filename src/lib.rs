//! Continuously-maintained connectivity oracle: a user-space replacement
//! for "resolve a name, get a list of destinations" that instead returns
//! ranked `(family, source, destination)` triples an upper layer can feed
//! straight into bind/connect.
//!
//! The oracle actively probes plausible source/destination combinations,
//! remembers which ones work and how fast, and uses that evidence — plus
//! a small policy table for pairs it hasn't had time to probe yet — to
//! answer [`Oracle::get_addr_pairs`].

pub mod classify;
pub mod config;
pub mod error;
pub mod inventory;
pub mod model;
pub mod oracle;
pub mod probe;
pub mod resolver;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

pub use config::{OracleConfig, ProbeTargetCandidate};
pub use error::OracleError;
pub use model::{ConnectivityFlags, DaRole};
pub use oracle::query::AddrPair;

use inventory::{InventorySource, SystemInventory};
use oracle::state::OracleState;
use oracle::workers::{monitor_worker, poll_worker, run_poll_sweep, seed_immortal_destinations, CancelToken};
use resolver::{Resolver, TokioResolver};

/// A single key/value entry in [`Oracle::status`]'s output.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusValue {
    Bool(bool),
    Address(String),
    None,
}

/// A live handle to the connectivity oracle: shared state plus the two
/// background worker tasks. Dropping it does not stop the workers — call
/// [`Oracle::shutdown`] explicitly, mirroring the spec's explicit
/// lifecycle rather than relying on ambient global state.
pub struct Oracle {
    state: Arc<Mutex<OracleState>>,
    resolver: Arc<dyn Resolver>,
    config: OracleConfig,
    cancel: CancelToken,
    poll_handle: Mutex<Option<JoinHandle<()>>>,
    monitor_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Oracle {
    /// Builds a fresh oracle with the system inventory and DNS resolver.
    /// Blocks until the first poll sweep completes (per the lifecycle
    /// contract, typically >= `config.poll_period`).
    pub async fn init(config: OracleConfig) -> Result<Self, OracleError> {
        Self::init_with(config, Arc::new(SystemInventory::new()), Arc::new(TokioResolver)).await
    }

    /// Same as [`Oracle::init`] but with injectable inventory/resolver
    /// collaborators, for tests and for hosts with a platform-specific
    /// gateway source.
    pub async fn init_with(
        config: OracleConfig,
        inventory: Arc<dyn InventorySource>,
        resolver: Arc<dyn Resolver>,
    ) -> Result<Self, OracleError> {
        let state = Arc::new(Mutex::new(OracleState::new()));

        let snapshot = inventory.refresh()?;
        {
            let mut guard = state.lock().await;
            guard.set_sources(snapshot.sources);
            guard.set_gateways(snapshot.gateway_v6, snapshot.gateway_v4);
        }

        seed_immortal_destinations(&state, &config).await;

        let cancel = CancelToken::new();

        // Block until the first sweep completes, per the lifecycle contract.
        run_poll_sweep(&state, &config, &cancel).await;

        let poll_handle = tokio::spawn(poll_worker(state.clone(), config.clone(), cancel.clone()));
        let monitor_handle = tokio::spawn(monitor_worker(state.clone(), inventory, config.clone(), cancel.clone()));

        info!("oracle initialized");

        Ok(Self {
            state,
            resolver,
            config,
            cancel,
            poll_handle: Mutex::new(Some(poll_handle)),
            monitor_handle: Mutex::new(Some(monitor_handle)),
        })
    }

    /// Resolves `target` (IP literal or FQDN) and `port` to an ordered
    /// sequence of `(family, source, destination)` triples, merging
    /// measured pairs with rule-based guesses for destinations not yet
    /// probed. May be empty.
    pub async fn get_addr_pairs(&self, target: &str, port: u16) -> Result<Vec<AddrPair>, OracleError> {
        oracle::query::get_addr_pairs(&self.state, self.resolver.as_ref(), target, port).await
    }

    /// Snapshot of connectivity flags and discovered gateways.
    pub async fn status(&self) -> HashMap<&'static str, StatusValue> {
        let guard = self.state.lock().await;
        let flags = guard.flags();
        let (gw6, gw4) = guard.gateways();
        drop(guard);

        let addr_or_none = |s: Option<String>| s.map(StatusValue::Address).unwrap_or(StatusValue::None);

        HashMap::from([
            ("NPTv6", StatusValue::Bool(flags.nptv6)),
            ("NAT44", StatusValue::Bool(flags.nat44)),
            ("ULA_ok", StatusValue::Bool(flags.ula_ok)),
            ("LLA_ok", StatusValue::Bool(flags.lla_ok)),
            ("GUA_ok", StatusValue::Bool(flags.gua_ok)),
            ("IPv4_ok", StatusValue::Bool(flags.ipv4_ok)),
            ("ULA_present", StatusValue::Bool(flags.ula_present)),
            ("NPTv6_tried", StatusValue::Bool(flags.nptv6_tried)),
            ("NAT44_tried", StatusValue::Bool(flags.nat44_tried)),
            ("def_gateway6", addr_or_none(gw6.map(|a| a.to_string()))),
            ("def_gateway4", addr_or_none(gw4.map(|a| a.to_string()))),
        ])
    }

    /// Signals both workers and joins them. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.poll_handle.lock().await.take() {
            let _ = handle.await;
        }
        if let Some(handle) = self.monitor_handle.lock().await.take() {
            let _ = handle.await;
        }
        info!("oracle shut down");
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }
}
