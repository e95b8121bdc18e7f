//! Shared federation state.

use std::collections::BTreeMap;

use crate::core::common::AllocationVerdict;
use crate::core::federation::{CloudFederation, FederationError};
use crate::core::member::Member;
use crate::core::resource_pool::ResourcePool;
use crate::core::vm::VmStatus;
use crate::core::workload::Workload;

/// State shared by datacenters, brokers and allocation policies: federation registry, resource pool and
/// submitted workload.
///
/// Federation-wide views (local and external pools, running VMs) follow the member registration order, then
/// the order in which each member added its datacenters and hosts.
pub struct FederationState {
    pub federation: CloudFederation,
    pub pool: ResourcePool,
    pub workload: Workload,
    /// Times at which requested VM destructions take effect.
    pending_destructions: BTreeMap<u32, f64>,
}

impl FederationState {
    pub fn new(federation: CloudFederation) -> Self {
        Self {
            federation,
            pool: ResourcePool::new(),
            workload: Workload::new(),
            pending_destructions: BTreeMap::new(),
        }
    }

    pub fn add_member(&mut self, member: Member) -> bool {
        self.federation.add_member(member)
    }

    /// Registers datacenter owned by the member.
    pub fn add_datacenter(&mut self, member_id: u32, datacenter_id: u32, name: &str) -> Result<(), FederationError> {
        let member = self
            .federation
            .member_mut(member_id)
            .ok_or(FederationError::MemberNotRegistered(member_id))?;
        member.add_datacenter(datacenter_id);
        self.pool.add_datacenter(datacenter_id, name, member_id);
        Ok(())
    }

    /// Moves datacenter to another member, so that it keeps exactly one owner.
    pub fn transfer_datacenter(&mut self, datacenter_id: u32, new_owner: u32) -> Result<(), FederationError> {
        if !self.federation.has_member(new_owner) {
            return Err(FederationError::MemberNotRegistered(new_owner));
        }
        let previous = self
            .pool
            .set_owner(datacenter_id, new_owner)
            .unwrap_or_else(|| panic!("Datacenter {} is not registered", datacenter_id));
        if let Some(member) = self.federation.member_mut(previous) {
            member.remove_datacenter(datacenter_id);
        }
        if let Some(member) = self.federation.member_mut(new_owner) {
            member.add_datacenter(datacenter_id);
        }
        Ok(())
    }

    /// Returns datacenters owned by the member.
    pub fn member_datacenters(&self, member_id: u32) -> Vec<u32> {
        self.federation
            .member(member_id)
            .map(|m| m.datacenters().to_vec())
            .unwrap_or_default()
    }

    /// Returns datacenters of every other registered member.
    pub fn datacenters_from_other_members(&self, member_id: u32) -> Vec<u32> {
        self.federation
            .members()
            .filter(|m| m.id != member_id)
            .flat_map(|m| m.datacenters().iter().copied())
            .collect()
    }

    pub fn all_datacenters(&self) -> Vec<u32> {
        self.federation
            .members()
            .flat_map(|m| m.datacenters().iter().copied())
            .collect()
    }

    /// Hosts of the member's own datacenters.
    pub fn local_hosts(&self, member_id: u32) -> Vec<u32> {
        self.pool.hosts_of(&self.member_datacenters(member_id))
    }

    /// Hosts of datacenters owned by other members.
    pub fn external_hosts(&self, member_id: u32) -> Vec<u32> {
        self.pool.hosts_of(&self.datacenters_from_other_members(member_id))
    }

    pub fn all_hosts(&self) -> Vec<u32> {
        self.pool.hosts_of(&self.all_datacenters())
    }

    pub fn federation_has_no_hosts(&self) -> bool {
        self.all_datacenters()
            .iter()
            .filter_map(|id| self.pool.datacenter(*id))
            .all(|dc| dc.hosts().is_empty())
    }

    /// Returns member owning the datacenter of the host.
    pub fn host_owner(&self, host_id: u32) -> Option<u32> {
        let host = self.pool.host(host_id)?;
        self.pool.datacenter(host.datacenter_id).map(|dc| dc.owner)
    }

    /// Latency of probing the host on behalf of the member, zero for own hosts.
    ///
    /// Panics if either member is not registered.
    pub fn hop_latency(&self, member_id: u32, host_id: u32) -> f64 {
        let owner = self
            .host_owner(host_id)
            .unwrap_or_else(|| panic!("Host {} does not belong to any datacenter", host_id));
        if owner == member_id {
            return 0.;
        }
        self.federation
            .latency_between(member_id, owner)
            .unwrap_or_else(|e| panic!("Can't compute latency to host {}: {}", host_id, e))
    }

    pub fn datacenter_of_vm(&self, vm_id: u32) -> Option<u32> {
        let host = self.workload.vm(vm_id)?.host()?;
        self.pool.host(host).map(|h| h.datacenter_id)
    }

    pub fn broker_of_member(&self, member_id: u32) -> Option<u32> {
        self.federation.member(member_id)?.broker()
    }

    /// Fraction of host MIPS used by tasks running on its VMs.
    pub fn host_cpu_utilization(&self, host_id: u32) -> f64 {
        let host = match self.pool.host(host_id) {
            Some(host) => host,
            None => return 0.,
        };
        let total = host.total_mips();
        if total <= 0. {
            return 0.;
        }
        let used: f64 = host
            .vms()
            .filter_map(|vm_id| self.workload.vm(vm_id))
            .map(|vm| vm.scheduler().cpu_utilization() * vm.total_mips())
            .sum();
        (used / total).min(1.)
    }

    /// Mean CPU utilization of datacenter hosts.
    pub fn datacenter_cpu_utilization(&self, datacenter_id: u32) -> f64 {
        let hosts = match self.pool.datacenter(datacenter_id) {
            Some(dc) if !dc.hosts().is_empty() => dc.hosts(),
            _ => return 0.,
        };
        hosts.iter().map(|h| self.host_cpu_utilization(*h)).sum::<f64>() / hosts.len() as f64
    }

    /// Returns VMs placed on hosts of the datacenter.
    pub fn datacenter_vms(&self, datacenter_id: u32) -> Vec<u32> {
        self.pool
            .hosts_of(&[datacenter_id])
            .into_iter()
            .filter_map(|h| self.pool.host(h))
            .flat_map(|h| h.vms())
            .collect()
    }

    /// Returns VMs running in datacenters of registered members.
    pub fn federation_vms(&self) -> Vec<u32> {
        self.all_datacenters()
            .into_iter()
            .flat_map(|dc| self.datacenter_vms(dc))
            .collect()
    }

    /// Reserves host resources for the VM and binds it to the host.
    pub(crate) fn place_vm(&mut self, vm_id: u32, host_id: u32) -> AllocationVerdict {
        let vm = match self.workload.vm_mut(vm_id) {
            Some(vm) => vm,
            None => return AllocationVerdict::NotEnoughPes,
        };
        let host = match self.pool.host_mut(host_id) {
            Some(host) => host,
            None => return AllocationVerdict::NotEnoughPes,
        };
        let verdict = host.allocate(vm);
        if verdict == AllocationVerdict::Success {
            host.set_active(true);
            vm.place_on(host_id);
        }
        verdict
    }

    /// Binds task to VM, returns false if the task is already bound.
    pub(crate) fn bind_task_to_vm(&mut self, task_id: u32, vm_id: u32) -> bool {
        let bound = match self.workload.task_mut(task_id) {
            Some(task) => task.bind_vm(vm_id),
            None => false,
        };
        if bound {
            if let Some(vm) = self.workload.vm_mut(vm_id) {
                vm.add_task(task_id);
            }
        }
        bound
    }

    /// Releases host resources of the VM, returns false if the VM was not running.
    pub(crate) fn destroy_vm(&mut self, vm_id: u32, time: f64) -> bool {
        self.pending_destructions.remove(&vm_id);
        let vm = match self.workload.vm_mut(vm_id) {
            Some(vm) if vm.status() == VmStatus::Placed => vm,
            _ => return false,
        };
        if let Some(host) = vm.host().and_then(|h| self.pool.host_mut(h)) {
            host.release(vm);
            if host.vm_count() == 0 {
                host.set_active(false);
            }
        }
        vm.destroy(time);
        true
    }

    /// Remembers that the VM resources are released at `time`.
    pub(crate) fn schedule_destruction(&mut self, vm_id: u32, time: f64) {
        self.pending_destructions.insert(vm_id, time);
    }

    /// Earliest time at which a requested VM destruction frees host resources.
    pub fn next_destruction_time(&self) -> Option<f64> {
        self.pending_destructions.values().copied().reduce(f64::min)
    }

    /// Delay before the next federation-wide retry of failed placements.
    ///
    /// Resources are freed either when a running VM completes a task or when a requested destruction takes
    /// effect, whichever comes first.
    pub fn wait_time_before_retry(&mut self, now: f64) -> f64 {
        let min_time = self.federation.min_time_between_events();
        let mut estimates: Vec<f64> = self
            .federation_vms()
            .into_iter()
            .filter_map(|vm_id| self.workload.vm(vm_id))
            .map(|vm| vm.scheduler().estimated_finish_time(now, min_time))
            .collect();
        estimates.extend(self.pending_destructions.values().map(|time| time - now));
        self.federation.wait_time_before_retry(now, estimates)
    }
}
