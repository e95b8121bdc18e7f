//! Pluggable eligibility predicates and orderings.

use std::cmp::Ordering;

use dyn_clone::{clone_trait_object, DynClone};

use crate::core::host::Host;
use crate::core::resource_pool::{DatacenterInfo, ResourcePool};
use crate::core::state::FederationState;
use crate::core::task::Task;
use crate::core::vm::VirtualMachine;

/// Decides which datacenters and hosts may receive a VM and in which order they are considered.
///
/// Orderings are applied with a stable sort, so the default `Equal` keeps the federation order.
pub trait PlacementEligibility: DynClone {
    /// Datacenter is eligible if at least one of its hosts is eligible.
    fn datacenter_eligible(&self, datacenter: &DatacenterInfo, vm: &VirtualMachine, pool: &ResourcePool) -> bool {
        datacenter
            .hosts()
            .iter()
            .filter_map(|id| pool.host(*id))
            .any(|host| self.host_eligible(host, vm))
    }

    fn host_eligible(&self, host: &Host, vm: &VirtualMachine) -> bool {
        host.is_suitable_for_vm(vm)
    }

    fn compare_datacenters(&self, _a: &DatacenterInfo, _b: &DatacenterInfo, _pool: &ResourcePool) -> Ordering {
        Ordering::Equal
    }

    fn compare_hosts(&self, _a: &Host, _b: &Host) -> Ordering {
        Ordering::Equal
    }
}

clone_trait_object!(PlacementEligibility);

/// Any host with enough free resources, in federation order.
#[derive(Clone)]
pub struct DefaultEligibility;

impl DefaultEligibility {
    pub fn new() -> Self {
        Self {}
    }
}

impl PlacementEligibility for DefaultEligibility {}

/// Orders suitable hosts by ascending free PEs, i.e. the most loaded host that still fits comes first.
#[derive(Clone)]
pub struct MostLoadedHostFirst;

impl MostLoadedHostFirst {
    pub fn new() -> Self {
        Self {}
    }
}

impl PlacementEligibility for MostLoadedHostFirst {
    fn compare_hosts(&self, a: &Host, b: &Host) -> Ordering {
        a.free_pes().cmp(&b.free_pes())
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Decides which VMs may run a task and which of them is preferred.
pub trait TaskVmMatcher: DynClone {
    fn vm_eligible_for_task(&self, vm: &VirtualMachine, task: &Task, state: &FederationState) -> bool;

    /// Default ordering: ascending CPU utilization of the VM host, then VM ID.
    fn compare_vms(&self, a: &VirtualMachine, b: &VirtualMachine, state: &FederationState) -> Ordering {
        let load = |vm: &VirtualMachine| vm.host().map(|h| state.host_cpu_utilization(h)).unwrap_or(0.);
        load(a).total_cmp(&load(b)).then(a.id.cmp(&b.id))
    }
}

clone_trait_object!(TaskVmMatcher);

/// Each task runs only on the VM created for it: same owner, job ID and task index.
#[derive(Clone)]
pub struct DedicatedVmMatcher;

impl DedicatedVmMatcher {
    pub fn new() -> Self {
        Self {}
    }
}

impl TaskVmMatcher for DedicatedVmMatcher {
    fn vm_eligible_for_task(&self, vm: &VirtualMachine, task: &Task, _state: &FederationState) -> bool {
        vm.is_dedicated_to(task)
    }
}

/// Any VM of the task owner whose host is not fully loaded.
#[derive(Clone)]
pub struct SharedVmMatcher;

impl SharedVmMatcher {
    pub fn new() -> Self {
        Self {}
    }
}

impl TaskVmMatcher for SharedVmMatcher {
    fn vm_eligible_for_task(&self, vm: &VirtualMachine, task: &Task, state: &FederationState) -> bool {
        vm.owner == task.owner && vm.host().map(|h| state.host_cpu_utilization(h) < 1.).unwrap_or(false)
    }
}
