//! Worst Fit algorithm.

use crate::core::allocation_policies::{eligible_hosts, HostPools};
use crate::core::allocation_policy::{HostSearch, HostSearchResult};
use crate::core::eligibility::PlacementEligibility;
use crate::core::host::Host;
use crate::core::state::FederationState;
use crate::core::vm::VirtualMachine;

/// Picks the eligible host with the minimum number of free PEs, local hosts first.
pub struct WorstFit;

impl WorstFit {
    pub fn new() -> Self {
        Self {}
    }
}

fn min_free_pes(hosts: Vec<&Host>) -> Option<u32> {
    let mut result: Option<&Host> = None;
    for host in hosts {
        if result.map_or(true, |best| host.free_pes() < best.free_pes()) {
            result = Some(host);
        }
    }
    result.map(|host| host.id)
}

impl HostSearch for WorstFit {
    fn find_host(
        &mut self,
        vm: &VirtualMachine,
        state: &FederationState,
        eligibility: &dyn PlacementEligibility,
    ) -> HostSearchResult {
        let pools = HostPools::build(state, vm.member_id);
        if let Some(host) = min_free_pes(eligible_hosts(&pools.local, vm, state, eligibility)) {
            return HostSearchResult::found(host, 0.);
        }
        match min_free_pes(eligible_hosts(&pools.external, vm, state, eligibility)) {
            Some(host) => HostSearchResult::found(host, state.hop_latency(vm.member_id, host)),
            None => HostSearchResult::not_found(0.),
        }
    }
}
