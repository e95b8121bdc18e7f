//! Random algorithm.

use rand::prelude::*;
use rand_pcg::Pcg64;

use crate::core::allocation_policies::is_eligible;
use crate::core::allocation_policy::{HostSearch, HostSearchResult};
use crate::core::eligibility::PlacementEligibility;
use crate::core::state::FederationState;
use crate::core::vm::VirtualMachine;

/// Draws hosts uniformly from the whole federation, at most one draw per host.
///
/// Draws may repeat, so the search can fail even if an eligible host exists. Every draw costs the latency
/// between the VM owner and the drawn host's member.
pub struct RandomSearch {
    rand: Pcg64,
    hosts: Option<Vec<u32>>,
}

impl RandomSearch {
    pub fn new(seed: u64) -> Self {
        Self {
            rand: Pcg64::seed_from_u64(seed),
            hosts: None,
        }
    }
}

impl HostSearch for RandomSearch {
    fn find_host(
        &mut self,
        vm: &VirtualMachine,
        state: &FederationState,
        eligibility: &dyn PlacementEligibility,
    ) -> HostSearchResult {
        let hosts = self.hosts.get_or_insert_with(|| state.all_hosts());
        let mut latency = 0.;
        for _ in 0..hosts.len() {
            let host = hosts[self.rand.gen_range(0..hosts.len())];
            latency += state.hop_latency(vm.member_id, host);
            if is_eligible(host, vm, state, eligibility) {
                return HostSearchResult::found(host, latency);
            }
        }
        HostSearchResult::not_found(latency)
    }

    fn reset(&mut self) {
        self.hosts = None;
    }
}
