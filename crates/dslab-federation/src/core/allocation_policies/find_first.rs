//! Find First algorithm.

use crate::core::allocation_policies::{is_eligible, HostPools};
use crate::core::allocation_policy::{HostSearch, HostSearchResult};
use crate::core::eligibility::PlacementEligibility;
use crate::core::state::FederationState;
use crate::core::vm::VirtualMachine;

/// Returns the first eligible local host, otherwise probes external hosts in order.
///
/// The reported cost of an external search is the largest single-hop latency among probed hosts.
pub struct FindFirst;

impl FindFirst {
    pub fn new() -> Self {
        Self {}
    }
}

impl HostSearch for FindFirst {
    fn find_host(
        &mut self,
        vm: &VirtualMachine,
        state: &FederationState,
        eligibility: &dyn PlacementEligibility,
    ) -> HostSearchResult {
        let pools = HostPools::build(state, vm.member_id);
        if let Some(host) = pools.local.iter().find(|h| is_eligible(**h, vm, state, eligibility)) {
            return HostSearchResult::found(*host, 0.);
        }
        let mut latency: f64 = 0.;
        for host in pools.external {
            latency = latency.max(state.hop_latency(vm.member_id, host));
            if is_eligible(host, vm, state, eligibility) {
                return HostSearchResult::found(host, latency);
            }
        }
        HostSearchResult::not_found(latency)
    }
}
