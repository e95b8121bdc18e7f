//! Host search algorithms.

pub mod best_fit;
pub mod dual_layer_round_robin;
pub mod find_first;
pub mod first_fit;
pub mod local_first_random;
pub mod random;
pub mod single_layer_round_robin;
pub mod worst_fit;

use crate::core::eligibility::PlacementEligibility;
use crate::core::host::Host;
use crate::core::resource_pool::DatacenterInfo;
use crate::core::state::FederationState;
use crate::core::vm::VirtualMachine;

/// Hosts of the member's own datacenters and of datacenters owned by other members.
#[derive(Clone, Debug, Default)]
pub(crate) struct HostPools {
    pub local: Vec<u32>,
    pub external: Vec<u32>,
}

impl HostPools {
    pub fn build(state: &FederationState, member_id: u32) -> Self {
        Self {
            local: state.local_hosts(member_id),
            external: state.external_hosts(member_id),
        }
    }
}

pub(crate) fn is_eligible(
    host_id: u32,
    vm: &VirtualMachine,
    state: &FederationState,
    eligibility: &dyn PlacementEligibility,
) -> bool {
    state
        .pool
        .host(host_id)
        .map(|host| eligibility.host_eligible(host, vm))
        .unwrap_or(false)
}

/// Returns eligible hosts from the list, keeping the list order.
pub(crate) fn eligible_hosts<'a>(
    host_ids: &[u32],
    vm: &VirtualMachine,
    state: &'a FederationState,
    eligibility: &dyn PlacementEligibility,
) -> Vec<&'a Host> {
    host_ids
        .iter()
        .filter_map(|id| state.pool.host(*id))
        .filter(|host| eligibility.host_eligible(host, vm))
        .collect()
}

/// Returns eligible datacenters from the list, stable sorted by the datacenter ordering.
pub(crate) fn eligible_datacenters<'a>(
    datacenter_ids: &[u32],
    vm: &VirtualMachine,
    state: &'a FederationState,
    eligibility: &dyn PlacementEligibility,
) -> Vec<&'a DatacenterInfo> {
    let mut datacenters: Vec<&DatacenterInfo> = datacenter_ids
        .iter()
        .filter_map(|id| state.pool.datacenter(*id))
        .filter(|dc| eligibility.datacenter_eligible(dc, vm, &state.pool))
        .collect();
    datacenters.sort_by(|a, b| eligibility.compare_datacenters(a, b, &state.pool));
    datacenters
}
