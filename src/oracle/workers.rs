//! Poll and monitor workers: the two long-lived background loops that keep
//! oracle state fresh. Grounded on the `tokio::spawn`-ed status-printer
//! loop in the teacher's `main.rs` and the shutdown-flag idiom used for
//! retry bookkeeping in `net/connection.rs`, generalized to the
//! cooperative-cancellation contract this oracle's workers require.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::classify::intrinsically_valid;
use crate::config::OracleConfig;
use crate::inventory::InventorySource;
use crate::model::{DaRole, DestinationAddress};
use crate::oracle::state::OracleState;
use crate::probe::{probe, ProbeOutcome};

/// Shared cancellation flag checked between units of work by both workers.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sweeps the cross product of sources and destinations each period,
/// probing every pair that passes `intrinsically_valid`, and committing
/// results back to the shared state. Ordering within a sweep is
/// deterministic (sources then destinations, in the order retrieved from
/// the snapshot) for reproducibility.
pub async fn poll_worker(state: Arc<Mutex<OracleState>>, config: OracleConfig, cancel: CancelToken) {
    loop {
        if cancel.is_cancelled() {
            return;
        }
        let sweep_start = Instant::now();
        run_poll_sweep(&state, &config, &cancel).await;

        let elapsed = sweep_start.elapsed();
        if elapsed < config.poll_period {
            tokio::time::sleep(config.poll_period - elapsed).await;
        }
    }
}

pub(crate) async fn run_poll_sweep(state: &Arc<Mutex<OracleState>>, config: &OracleConfig, cancel: &CancelToken) {
    let (sources, destinations) = {
        let guard = state.lock().await;
        (
            guard.sources().cloned().collect::<Vec<_>>(),
            guard.destinations().cloned().collect::<Vec<_>>(),
        )
    };

    for sa in &sources {
        for da in &destinations {
            if cancel.is_cancelled() {
                return;
            }
            if !intrinsically_valid(sa.family, sa.scope, sa.zone, da.family, da.scope, da.zone) {
                continue;
            }

            let outcome = probe(sa.addr, da.addr, config.probe_port, config.probe_timeout).await;
            let now = Instant::now();
            let mut guard = state.lock().await;
            guard.mark_attempted(sa, da);
            match outcome {
                ProbeOutcome::Success { latency_ms } => {
                    debug!(sa = %sa.addr, da = %da.addr, latency_ms, "probe succeeded");
                    guard.upsert_pair(sa.key(), da.key(), latency_ms, now);
                    guard.classify_success(sa, da);
                }
                ProbeOutcome::Failure { reason } => {
                    debug!(sa = %sa.addr, da = %da.addr, %reason, "probe failed");
                    guard.remove_pair(&sa.key(), &da.key());
                }
            }
        }
    }
}

/// Refreshes host inventory, cascades removals into oracle state, garbage
/// collects stale user destinations, and emits an observability record —
/// every ~10s, until cancelled.
pub async fn monitor_worker(
    state: Arc<Mutex<OracleState>>,
    inventory: Arc<dyn InventorySource>,
    config: OracleConfig,
    cancel: CancelToken,
) {
    loop {
        if cancel.is_cancelled() {
            return;
        }
        let tick_start = Instant::now();
        run_monitor_tick(&state, inventory.as_ref(), &config).await;

        let elapsed = tick_start.elapsed();
        if elapsed < config.poll_period {
            tokio::time::sleep(config.poll_period - elapsed).await;
        }
    }
}

async fn run_monitor_tick(state: &Arc<Mutex<OracleState>>, inventory: &dyn InventorySource, config: &OracleConfig) {
    match inventory.refresh() {
        Ok(snapshot) => {
            let mut guard = state.lock().await;
            let before = guard.sources().count();
            guard.set_sources(snapshot.sources);
            guard.set_gateways(snapshot.gateway_v6, snapshot.gateway_v4);
            let after = guard.sources().count();
            info!(before, after, "inventory refreshed");
        }
        Err(e) => {
            warn!(error = %e, "inventory refresh failed, retaining previous snapshot");
        }
    }

    let now = Instant::now();
    let mut guard = state.lock().await;
    guard.gc_user_das(config.da_max_age, config.da_keep_floor, config.da_max_user, now);
    info!(
        gua_ok = guard.flags().gua_ok,
        ula_ok = guard.flags().ula_ok,
        lla_ok = guard.flags().lla_ok,
        nptv6 = guard.flags().nptv6,
        ipv4_ok = guard.flags().ipv4_ok,
        nat44 = guard.flags().nat44,
        "monitor tick complete"
    );
}

/// Installs the two immortal probe-target destinations and any discovered
/// default gateways, used once by `init()`.
pub async fn seed_immortal_destinations(
    state: &Arc<Mutex<OracleState>>,
    config: &OracleConfig,
) {
    use rand::seq::SliceRandom;
    let mut rng = rand::thread_rng();
    let chosen = config
        .probe_target_pool
        .choose(&mut rng)
        .copied()
        .unwrap_or_else(|| config.probe_target_pool[0]);

    let now = Instant::now();
    let mut guard = state.lock().await;
    guard.add_da(DestinationAddress::new(
        chosen.v6.into(),
        DaRole::ProbeTarget,
        None,
        now,
    ));
    guard.add_da(DestinationAddress::new(
        chosen.v4.into(),
        DaRole::ProbeTarget,
        None,
        now,
    ));

    let (gw6, gw4) = guard.gateways();
    if let Some(gw6) = gw6 {
        guard.add_da(DestinationAddress::new(gw6.into(), DaRole::LocalGateway, None, now));
    }
    if let Some(gw4) = gw4 {
        guard.add_da(DestinationAddress::new(gw4.into(), DaRole::LocalGateway, None, now));
    }
}
