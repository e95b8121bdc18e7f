//! Local First Random algorithm.

use std::collections::BTreeMap;

use rand::prelude::*;
use rand_pcg::Pcg64;

use crate::core::allocation_policies::{is_eligible, HostPools};
use crate::core::allocation_policy::{HostSearch, HostSearchResult};
use crate::core::eligibility::PlacementEligibility;
use crate::core::state::FederationState;
use crate::core::vm::VirtualMachine;

/// Random draws over local hosts, then over external hosts, each phase bounded by its pool size.
///
/// Each pool has its own generator, so external draws do not depend on how many local draws came before.
pub struct LocalFirstRandom {
    local_rand: Pcg64,
    external_rand: Pcg64,
    pools: BTreeMap<u32, HostPools>,
}

impl LocalFirstRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            local_rand: Pcg64::seed_from_u64(seed),
            external_rand: Pcg64::seed_from_u64(seed.wrapping_add(1)),
            pools: BTreeMap::new(),
        }
    }

    fn draw(
        rand: &mut Pcg64,
        hosts: &[u32],
        vm: &VirtualMachine,
        state: &FederationState,
        eligibility: &dyn PlacementEligibility,
        latency: &mut f64,
    ) -> Option<u32> {
        for _ in 0..hosts.len() {
            let host = hosts[rand.gen_range(0..hosts.len())];
            *latency += state.hop_latency(vm.member_id, host);
            if is_eligible(host, vm, state, eligibility) {
                return Some(host);
            }
        }
        None
    }
}

impl HostSearch for LocalFirstRandom {
    fn find_host(
        &mut self,
        vm: &VirtualMachine,
        state: &FederationState,
        eligibility: &dyn PlacementEligibility,
    ) -> HostSearchResult {
        let pools = self
            .pools
            .entry(vm.member_id)
            .or_insert_with(|| HostPools::build(state, vm.member_id));
        let mut latency = 0.;
        if let Some(host) = Self::draw(&mut self.local_rand, &pools.local, vm, state, eligibility, &mut latency) {
            return HostSearchResult::found(host, latency);
        }
        match Self::draw(&mut self.external_rand, &pools.external, vm, state, eligibility, &mut latency) {
            Some(host) => HostSearchResult::found(host, latency),
            None => HostSearchResult::not_found(latency),
        }
    }

    fn reset(&mut self) {
        self.pools.clear();
    }
}
