//! First Fit algorithm.

use crate::core::allocation_policies::{eligible_datacenters, eligible_hosts};
use crate::core::allocation_policy::{HostSearch, HostSearchResult};
use crate::core::eligibility::PlacementEligibility;
use crate::core::resource_pool::DatacenterInfo;
use crate::core::state::FederationState;
use crate::core::vm::VirtualMachine;

/// Uses the first eligible host of the first eligible datacenter, owner datacenters first.
pub struct FirstFit;

impl FirstFit {
    pub fn new() -> Self {
        Self {}
    }
}

impl HostSearch for FirstFit {
    fn find_host(
        &mut self,
        vm: &VirtualMachine,
        state: &FederationState,
        eligibility: &dyn PlacementEligibility,
    ) -> HostSearchResult {
        first_eligible_host(vm, state, eligibility)
    }
}

/// Only the first datacenter of each ordered eligible list is inspected. A host found in another member's
/// datacenter costs one hop of latency to that member.
pub(crate) fn first_eligible_host(
    vm: &VirtualMachine,
    state: &FederationState,
    eligibility: &dyn PlacementEligibility,
) -> HostSearchResult {
    let local = eligible_datacenters(&state.member_datacenters(vm.member_id), vm, state, eligibility);
    if let Some(host) = best_host_of_first_datacenter(&local, vm, state, eligibility) {
        return HostSearchResult::found(host, 0.);
    }
    let external = eligible_datacenters(
        &state.datacenters_from_other_members(vm.member_id),
        vm,
        state,
        eligibility,
    );
    match best_host_of_first_datacenter(&external, vm, state, eligibility) {
        Some(host) => HostSearchResult::found(host, state.hop_latency(vm.member_id, host)),
        None => HostSearchResult::not_found(0.),
    }
}

fn best_host_of_first_datacenter(
    datacenters: &[&DatacenterInfo],
    vm: &VirtualMachine,
    state: &FederationState,
    eligibility: &dyn PlacementEligibility,
) -> Option<u32> {
    let datacenter = datacenters.first()?;
    let mut hosts = eligible_hosts(datacenter.hosts(), vm, state, eligibility);
    hosts.sort_by(|a, b| eligibility.compare_hosts(a, b));
    hosts.first().map(|host| host.id)
}
