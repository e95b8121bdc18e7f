//! Dual Layer Round Robin algorithm.

use std::collections::BTreeMap;

use crate::core::allocation_policies::{is_eligible, HostPools};
use crate::core::allocation_policy::{HostSearch, HostSearchResult};
use crate::core::eligibility::PlacementEligibility;
use crate::core::state::FederationState;
use crate::core::vm::VirtualMachine;

#[derive(Default)]
struct RoundRobinState {
    pools: HostPools,
    local_cursor: usize,
    external_cursor: usize,
}

fn probe(
    hosts: &[u32],
    cursor: &mut usize,
    vm: &VirtualMachine,
    state: &FederationState,
    eligibility: &dyn PlacementEligibility,
    latency: &mut f64,
) -> Option<u32> {
    for _ in 0..hosts.len() {
        let host = hosts[*cursor];
        *cursor = (*cursor + 1) % hosts.len();
        *latency += state.hop_latency(vm.member_id, host);
        if is_eligible(host, vm, state, eligibility) {
            return Some(host);
        }
    }
    None
}

/// Round robin over local hosts, then over external hosts, with an independent cursor per pool.
///
/// Host lists and cursors are kept per VM owner member and built on the first request of that member.
pub struct DualLayerRoundRobin {
    members: BTreeMap<u32, RoundRobinState>,
}

impl DualLayerRoundRobin {
    pub fn new() -> Self {
        Self {
            members: BTreeMap::new(),
        }
    }

    /// Returns local and external cursors of the member, if it has already requested a host.
    pub fn cursors(&self, member_id: u32) -> Option<(usize, usize)> {
        self.members
            .get(&member_id)
            .map(|s| (s.local_cursor, s.external_cursor))
    }
}

impl HostSearch for DualLayerRoundRobin {
    fn find_host(
        &mut self,
        vm: &VirtualMachine,
        state: &FederationState,
        eligibility: &dyn PlacementEligibility,
    ) -> HostSearchResult {
        let rr = self.members.entry(vm.member_id).or_insert_with(|| RoundRobinState {
            pools: HostPools::build(state, vm.member_id),
            ..Default::default()
        });
        let mut latency = 0.;
        if let Some(host) = probe(&rr.pools.local, &mut rr.local_cursor, vm, state, eligibility, &mut latency) {
            return HostSearchResult::found(host, latency);
        }
        match probe(
            &rr.pools.external,
            &mut rr.external_cursor,
            vm,
            state,
            eligibility,
            &mut latency,
        ) {
            Some(host) => HostSearchResult::found(host, latency),
            None => HostSearchResult::not_found(latency),
        }
    }

    fn reset(&mut self) {
        self.members.clear();
    }
}
