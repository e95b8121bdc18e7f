//! Single Layer Round Robin algorithm.

use crate::core::allocation_policies::is_eligible;
use crate::core::allocation_policy::{HostSearch, HostSearchResult};
use crate::core::eligibility::PlacementEligibility;
use crate::core::state::FederationState;
use crate::core::vm::VirtualMachine;

/// Probes hosts of the whole federation with one cursor that persists between calls.
///
/// The cursor advances on every probe, eligible or not, and wraps around the host list.
pub struct SingleLayerRoundRobin {
    hosts: Option<Vec<u32>>,
    cursor: usize,
}

impl SingleLayerRoundRobin {
    pub fn new() -> Self {
        Self {
            hosts: None,
            cursor: 0,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl HostSearch for SingleLayerRoundRobin {
    fn find_host(
        &mut self,
        vm: &VirtualMachine,
        state: &FederationState,
        eligibility: &dyn PlacementEligibility,
    ) -> HostSearchResult {
        let hosts = self.hosts.get_or_insert_with(|| state.all_hosts());
        let mut latency = 0.;
        for _ in 0..hosts.len() {
            let host = hosts[self.cursor];
            self.cursor = (self.cursor + 1) % hosts.len();
            latency += state.hop_latency(vm.member_id, host);
            if is_eligible(host, vm, state, eligibility) {
                return HostSearchResult::found(host, latency);
            }
        }
        HostSearchResult::not_found(latency)
    }

    fn reset(&mut self) {
        self.hosts = None;
        self.cursor = 0;
    }
}
