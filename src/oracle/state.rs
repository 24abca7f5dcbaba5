//! Oracle state: the shared, mutable data the poll and monitor workers
//! maintain and the query resolver reads. Guarded by a single coarse lock
//! at the call site (see `oracle::Oracle`); every method here assumes
//! exclusive access and is a bounded, non-blocking critical section —
//! mirroring how the teacher's `AddrMan` is always mutated from behind one
//! `tokio::sync::Mutex`, never concurrently.

use std::collections::HashMap;
use std::time::Instant;

use crate::classify::{is_off_site, AddressFamily, ScopeClass};
use crate::model::{ConnectivityFlags, DaKey, DaRole, DestinationAddress, Pair, SaKey, SourceAddress};

pub struct OracleState {
    sources: HashMap<SaKey, SourceAddress>,
    destinations: HashMap<DaKey, DestinationAddress>,
    pairs: HashMap<(SaKey, DaKey), Pair>,
    flags: ConnectivityFlags,
    gateway_v6: Option<std::net::Ipv6Addr>,
    gateway_v4: Option<std::net::Ipv4Addr>,
}

impl OracleState {
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
            destinations: HashMap::new(),
            pairs: HashMap::new(),
            flags: ConnectivityFlags::default(),
            gateway_v6: None,
            gateway_v4: None,
        }
    }

    pub fn set_gateways(&mut self, v6: Option<std::net::Ipv6Addr>, v4: Option<std::net::Ipv4Addr>) {
        self.gateway_v6 = v6;
        self.gateway_v4 = v4;
    }

    pub fn gateways(&self) -> (Option<std::net::Ipv6Addr>, Option<std::net::Ipv4Addr>) {
        (self.gateway_v6, self.gateway_v4)
    }

    pub fn sources(&self) -> impl Iterator<Item = &SourceAddress> {
        self.sources.values()
    }

    pub fn source(&self, key: &SaKey) -> Option<&SourceAddress> {
        self.sources.get(key)
    }

    pub fn destinations(&self) -> impl Iterator<Item = &DestinationAddress> {
        self.destinations.values()
    }

    pub fn destination(&self, key: &DaKey) -> Option<&DestinationAddress> {
        self.destinations.get(key)
    }

    pub fn destination_mut(&mut self, key: &DaKey) -> Option<&mut DestinationAddress> {
        self.destinations.get_mut(key)
    }

    pub fn pairs_for_da<'a>(&'a self, da_key: &'a DaKey) -> impl Iterator<Item = &'a Pair> + 'a {
        self.pairs.values().filter(move |p| &p.da_key == da_key)
    }

    pub fn flags(&self) -> ConnectivityFlags {
        self.flags
    }

    /// Replace the current SA set wholesale. Cascades pair removal for any
    /// SA that dropped out, and recomputes `ula_present` + flags that lost
    /// their justifying scope class.
    pub fn set_sources(&mut self, sources: Vec<SourceAddress>) {
        let new_keys: std::collections::HashSet<SaKey> = sources.iter().map(|s| s.key()).collect();
        let removed_keys: Vec<SaKey> = self
            .sources
            .keys()
            .filter(|k| !new_keys.contains(*k))
            .cloned()
            .collect();

        self.sources = sources.into_iter().map(|s| (s.key(), s)).collect();

        for key in removed_keys {
            self.remove_pairs_for_sa(&key);
        }

        self.flags.ula_present = self.sources.values().any(|s| s.scope == ScopeClass::Ula);
        self.recompute_flags();
    }

    /// Inserts or updates a pair; rolling average per [`Pair::record`].
    pub fn upsert_pair(&mut self, sa_key: SaKey, da_key: DaKey, latency_ms: u64, now: Instant) {
        self.pairs
            .entry((sa_key, da_key))
            .and_modify(|p| p.record(latency_ms, now))
            .or_insert_with(|| Pair::new(sa_key, da_key, latency_ms, now));
    }

    /// Erases an entry if present; no-op otherwise.
    pub fn remove_pair(&mut self, sa_key: &SaKey, da_key: &DaKey) {
        self.pairs.remove(&(*sa_key, *da_key));
    }

    /// Cascade on inventory shrink: removes every pair referencing `sa_key`,
    /// atomically from the caller's point of view (single critical section).
    pub fn remove_pairs_for_sa(&mut self, sa_key: &SaKey) {
        self.pairs.retain(|(sa, _), _| sa != sa_key);
        self.recompute_flags();
    }

    /// Idempotent; never overwrites an existing DA with a lower-priority
    /// role. Returns `true` if a new entry was created.
    pub fn add_da(&mut self, da: DestinationAddress) -> bool {
        let key = da.key();
        match self.destinations.get_mut(&key) {
            Some(existing) => {
                if existing.may_be_overwritten_by(da.role) {
                    existing.role = da.role;
                }
                false
            }
            None => {
                self.destinations.insert(key, da);
                true
            }
        }
    }

    /// Removes user-role DAs older than `max_age` and enforces the soft
    /// `max_user` cap by evicting the oldest-`last_used` entries beyond it,
    /// both while preserving at least `keep_floor` most-recent entries
    /// unconditionally. A DA with role != user is never touched. Cascades
    /// into pair removal for any DA it deletes.
    pub fn gc_user_das(&mut self, max_age: std::time::Duration, keep_floor: usize, max_user: usize, now: Instant) {
        let mut user_keys: Vec<DaKey> = self
            .destinations
            .iter()
            .filter(|(_, da)| da.role == DaRole::User)
            .map(|(k, _)| *k)
            .collect();

        // Most-recently-used first, so the floor keeps the freshest entries
        // and rank directly reflects position against the cap.
        user_keys.sort_by_key(|k| std::cmp::Reverse(self.destinations[k].last_used));

        let to_remove: Vec<DaKey> = user_keys
            .iter()
            .enumerate()
            .skip(keep_floor)
            .filter(|(rank, k)| {
                let stale = now.duration_since(self.destinations[k].last_used) > max_age;
                let over_cap = *rank >= max_user;
                stale || over_cap
            })
            .map(|(_, k)| *k)
            .collect();

        for key in to_remove {
            self.destinations.remove(&key);
            self.pairs.retain(|(_, da), _| da != &key);
        }
    }

    /// Updates connectivity flags per the successful-probe table. Flags are
    /// monotonic within the lifetime of the justifying SA scope — never
    /// cleared here.
    pub fn classify_success(&mut self, sa: &SourceAddress, da: &DestinationAddress) {
        apply_flag_for_pair(&mut self.flags, sa, da);
    }

    /// Marks that a sweep attempted (successfully or not) a pair shaped
    /// like the NPTv6 / NAT44 inference target, independent of outcome.
    pub fn mark_attempted(&mut self, sa: &SourceAddress, da: &DestinationAddress) {
        if sa.scope == ScopeClass::Ula && da.scope == ScopeClass::Gua && is_off_site(da.scope) {
            self.flags.nptv6_tried = true;
        }
        if sa.scope == ScopeClass::Rfc1918 && da.scope == ScopeClass::V4Global {
            self.flags.nat44_tried = true;
        }
    }

    /// Recomputes flags that may have lost their justification: a flag
    /// clears only when the SA scope class that justifies it has entirely
    /// disappeared from inventory *and* no remaining pair re-justifies it.
    fn recompute_flags(&mut self) {
        let scope_present = |scope: ScopeClass| self.sources.values().any(|s| s.scope == scope);
        let family_present = |fam: AddressFamily| self.sources.values().any(|s| s.family == fam);

        let pair_justifies = |pred: &dyn Fn(&SourceAddress, &DestinationAddress) -> bool| {
            self.pairs.keys().any(|(sa_key, da_key)| {
                match (self.sources.get(sa_key), self.destinations.get(da_key)) {
                    (Some(sa), Some(da)) => pred(sa, da),
                    _ => false,
                }
            })
        };

        if !scope_present(ScopeClass::Gua)
            && !pair_justifies(&|sa, da| sa.scope == ScopeClass::Gua && da.family == AddressFamily::V6)
        {
            self.flags.gua_ok = false;
        }
        if !scope_present(ScopeClass::Ula)
            && !pair_justifies(&|sa, da| sa.scope == ScopeClass::Ula && da.scope == ScopeClass::Ula)
        {
            self.flags.ula_ok = false;
        }
        if !scope_present(ScopeClass::Lla)
            && !pair_justifies(&|sa, da| sa.scope == ScopeClass::Lla && da.scope == ScopeClass::Lla)
        {
            self.flags.lla_ok = false;
        }
        if !scope_present(ScopeClass::Ula)
            && !pair_justifies(&|sa, da| sa.scope == ScopeClass::Ula && is_off_site(da.scope) && da.family == AddressFamily::V6)
        {
            self.flags.nptv6 = false;
        }
        if !family_present(AddressFamily::V4)
            && !pair_justifies(&|sa, da| sa.family == AddressFamily::V4 && da.family == AddressFamily::V4)
        {
            self.flags.ipv4_ok = false;
        }
        if !scope_present(ScopeClass::Rfc1918)
            && !pair_justifies(&|sa, da| sa.scope == ScopeClass::Rfc1918 && da.scope == ScopeClass::V4Global)
        {
            self.flags.nat44 = false;
        }
    }
}

impl Default for OracleState {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_flag_for_pair(flags: &mut ConnectivityFlags, sa: &SourceAddress, da: &DestinationAddress) {
    match (sa.scope, da.scope) {
        (ScopeClass::Ula, da_scope) if is_off_site(da_scope) && da.family == AddressFamily::V6 => {
            flags.nptv6 = true;
        }
        (ScopeClass::Ula, ScopeClass::Ula) => flags.ula_ok = true,
        (ScopeClass::Lla, ScopeClass::Lla) => flags.lla_ok = true,
        (ScopeClass::Gua, _) if da.family == AddressFamily::V6 => flags.gua_ok = true,
        _ => {}
    }
    if sa.family == AddressFamily::V4 && da.family == AddressFamily::V4 {
        flags.ipv4_ok = true;
    }
    if sa.scope == ScopeClass::Rfc1918 && da.scope == ScopeClass::V4Global {
        flags.nat44 = true;
    }
}
