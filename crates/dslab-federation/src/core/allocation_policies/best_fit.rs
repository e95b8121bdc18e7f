//! Best Fit algorithm.

use crate::core::allocation_policies::first_fit::first_eligible_host;
use crate::core::allocation_policy::{HostSearch, HostSearchResult};
use crate::core::eligibility::PlacementEligibility;
use crate::core::state::FederationState;
use crate::core::vm::VirtualMachine;

/// Same candidate generation as First Fit, the choice is made by the host ordering of the eligibility rules.
///
/// Created through the resolver, it orders hosts by ascending free PEs, i.e. picks the most loaded host
/// that still fits.
pub struct BestFit;

impl BestFit {
    pub fn new() -> Self {
        Self {}
    }
}

impl HostSearch for BestFit {
    fn find_host(
        &mut self,
        vm: &VirtualMachine,
        state: &FederationState,
        eligibility: &dyn PlacementEligibility,
    ) -> HostSearchResult {
        first_eligible_host(vm, state, eligibility)
    }
}
