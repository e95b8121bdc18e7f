//! VM allocation policies of federated datacenters.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::core::allocation_policies::best_fit::BestFit;
use crate::core::allocation_policies::dual_layer_round_robin::DualLayerRoundRobin;
use crate::core::allocation_policies::find_first::FindFirst;
use crate::core::allocation_policies::first_fit::FirstFit;
use crate::core::allocation_policies::local_first_random::LocalFirstRandom;
use crate::core::allocation_policies::random::RandomSearch;
use crate::core::allocation_policies::single_layer_round_robin::SingleLayerRoundRobin;
use crate::core::allocation_policies::worst_fit::WorstFit;
use crate::core::common::AllocationVerdict;
use crate::core::config::{parse_config_value, parse_options};
use crate::core::eligibility::{DefaultEligibility, MostLoadedHostFirst, PlacementEligibility};
use crate::core::state::FederationState;
use crate::core::vm::VirtualMachine;

/// Expected placement failure.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum AllocationError {
    /// Every datacenter of the federation has an empty host list.
    NoHostInFederation,
    VmAlreadyCreated,
    NoSuitableHost,
    UnknownVm(u32),
}

impl Display for AllocationError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            AllocationError::NoHostInFederation => write!(f, "there is no host in the federation"),
            AllocationError::VmAlreadyCreated => write!(f, "vm is already created"),
            AllocationError::NoSuitableHost => write!(f, "no host can run the vm at this moment"),
            AllocationError::UnknownVm(id) => write!(f, "vm {} is not registered", id),
        }
    }
}

impl std::error::Error for AllocationError {}

/// Host found by a search algorithm and the network latency accumulated while searching.
#[derive(Clone, Debug, PartialEq)]
pub struct HostSearchResult {
    pub host: Option<u32>,
    pub latency: f64,
}

impl HostSearchResult {
    pub fn found(host: u32, latency: f64) -> Self {
        Self {
            host: Some(host),
            latency,
        }
    }

    pub fn not_found(latency: f64) -> Self {
        Self { host: None, latency }
    }
}

/// Host search strategy.
///
/// The search sees a snapshot of the federation state and must not change it, apart from its own cursors and
/// cached host lists.
pub trait HostSearch {
    fn find_host(
        &mut self,
        vm: &VirtualMachine,
        state: &FederationState,
        eligibility: &dyn PlacementEligibility,
    ) -> HostSearchResult;

    /// Drops cached host lists, e.g. after the federation topology has changed.
    fn reset(&mut self) {}
}

pub enum HostSearchAlgorithm {
    FirstFit(FirstFit),
    BestFit(BestFit),
    WorstFit(WorstFit),
    FindFirst(FindFirst),
    Random(RandomSearch),
    LocalFirstRandom(LocalFirstRandom),
    SingleLayerRoundRobin(SingleLayerRoundRobin),
    DualLayerRoundRobin(DualLayerRoundRobin),
}

impl HostSearchAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            HostSearchAlgorithm::FirstFit(_) => "FirstFit",
            HostSearchAlgorithm::BestFit(_) => "BestFit",
            HostSearchAlgorithm::WorstFit(_) => "WorstFit",
            HostSearchAlgorithm::FindFirst(_) => "FindFirst",
            HostSearchAlgorithm::Random(_) => "Random",
            HostSearchAlgorithm::LocalFirstRandom(_) => "LocalFirstRandom",
            HostSearchAlgorithm::SingleLayerRoundRobin(_) => "SingleLayerRoundRobin",
            HostSearchAlgorithm::DualLayerRoundRobin(_) => "DualLayerRoundRobin",
        }
    }

    fn search(&mut self) -> &mut dyn HostSearch {
        match self {
            HostSearchAlgorithm::FirstFit(alg) => alg,
            HostSearchAlgorithm::BestFit(alg) => alg,
            HostSearchAlgorithm::WorstFit(alg) => alg,
            HostSearchAlgorithm::FindFirst(alg) => alg,
            HostSearchAlgorithm::Random(alg) => alg,
            HostSearchAlgorithm::LocalFirstRandom(alg) => alg,
            HostSearchAlgorithm::SingleLayerRoundRobin(alg) => alg,
            HostSearchAlgorithm::DualLayerRoundRobin(alg) => alg,
        }
    }

    pub fn find_host(
        &mut self,
        vm: &VirtualMachine,
        state: &FederationState,
        eligibility: &dyn PlacementEligibility,
    ) -> HostSearchResult {
        self.search().find_host(vm, state, eligibility)
    }

    pub fn reset(&mut self) {
        self.search().reset()
    }
}

/// Time spent searching for a host, accumulated per VM.
#[derive(Clone, Debug, Default)]
pub struct SearchTimeLedger {
    entries: BTreeMap<u32, f64>,
}

impl SearchTimeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, vm_id: u32, time: f64) {
        *self.entries.entry(vm_id).or_insert(0.) += time;
    }

    pub fn time_spent(&self, vm_id: u32) -> Option<f64> {
        self.entries.get(&vm_id).copied()
    }

    pub fn total(&self) -> f64 {
        self.entries.values().sum()
    }

    /// Mean search time per VM, zero if nothing was recorded.
    pub fn mean(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.;
        }
        self.total() / self.entries.len() as f64
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &BTreeMap<u32, f64> {
        &self.entries
    }
}

/// Allocation policy of a single datacenter: search algorithm plus eligibility rules.
pub struct VmAllocationPolicy {
    algorithm: HostSearchAlgorithm,
    eligibility: Box<dyn PlacementEligibility>,
}

impl VmAllocationPolicy {
    /// Creates policy with the default eligibility rules of the algorithm.
    pub fn new(algorithm: HostSearchAlgorithm) -> Self {
        let eligibility: Box<dyn PlacementEligibility> = match algorithm {
            HostSearchAlgorithm::BestFit(_) => Box::new(MostLoadedHostFirst::new()),
            _ => Box::new(DefaultEligibility::new()),
        };
        Self { algorithm, eligibility }
    }

    pub fn with_eligibility(algorithm: HostSearchAlgorithm, eligibility: Box<dyn PlacementEligibility>) -> Self {
        Self { algorithm, eligibility }
    }

    pub fn name(&self) -> &'static str {
        self.algorithm.name()
    }

    pub fn algorithm(&self) -> &HostSearchAlgorithm {
        &self.algorithm
    }

    pub fn reset(&mut self) {
        self.algorithm.reset();
    }

    /// Selects host for the VM and places the VM on it.
    ///
    /// Latency accumulated by the search is added to the ledger whether a host was found or not.
    pub fn allocate_host_for_vm(
        &mut self,
        vm_id: u32,
        state: &mut FederationState,
        ledger: &mut SearchTimeLedger,
    ) -> Result<u32, AllocationError> {
        if state.federation_has_no_hosts() {
            return Err(AllocationError::NoHostInFederation);
        }
        let result = {
            let vm = state.workload.vm(vm_id).ok_or(AllocationError::UnknownVm(vm_id))?;
            if vm.host().is_some() {
                return Err(AllocationError::VmAlreadyCreated);
            }
            self.algorithm.find_host(vm, state, self.eligibility.as_ref())
        };
        ledger.record(vm_id, result.latency);

        let host = result.host.ok_or(AllocationError::NoSuitableHost)?;
        match state.place_vm(vm_id, host) {
            AllocationVerdict::Success => Ok(host),
            _ => Err(AllocationError::NoSuitableHost),
        }
    }
}

/// Resolves allocation policy from config string, randomized policies get seed 123 unless set.
pub fn allocation_policy_resolver(config_str: &str) -> VmAllocationPolicy {
    allocation_policy_resolver_with_seed(config_str, 123)
}

/// Resolves allocation policy from config string, e.g. `FirstFit` or `Random[seed=7]`.
pub fn allocation_policy_resolver_with_seed(config_str: &str, default_seed: u64) -> VmAllocationPolicy {
    let (policy_name, options) = parse_config_value(config_str);
    let seed = match options {
        Some(options) => match parse_options(&options).get("seed") {
            Some(seed) => seed
                .parse::<u64>()
                .unwrap_or_else(|_| panic!("Can't resolve: {}", config_str)),
            None => default_seed,
        },
        None => default_seed,
    };
    let algorithm = match policy_name.as_str() {
        "FirstFit" => HostSearchAlgorithm::FirstFit(FirstFit::new()),
        "BestFit" => HostSearchAlgorithm::BestFit(BestFit::new()),
        "WorstFit" => HostSearchAlgorithm::WorstFit(WorstFit::new()),
        "FindFirst" => HostSearchAlgorithm::FindFirst(FindFirst::new()),
        "Random" => HostSearchAlgorithm::Random(RandomSearch::new(seed)),
        "LocalFirstRandom" => HostSearchAlgorithm::LocalFirstRandom(LocalFirstRandom::new(seed)),
        "SingleLayerRoundRobin" | "SingleLayerRR" => {
            HostSearchAlgorithm::SingleLayerRoundRobin(SingleLayerRoundRobin::new())
        }
        "DualLayerRoundRobin" | "DualLayerRR" => HostSearchAlgorithm::DualLayerRoundRobin(DualLayerRoundRobin::new()),
        _ => panic!("Can't resolve: {}", config_str),
    };
    VmAllocationPolicy::new(algorithm)
}
