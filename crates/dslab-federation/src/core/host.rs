//! Host resource bookkeeping.

use std::collections::BTreeSet;

use crate::core::common::AllocationVerdict;
use crate::core::config::HostConfig;
use crate::core::vm::VirtualMachine;

/// Physical host of a datacenter: capacity, free resources and hosted VMs.
#[derive(Clone, Debug)]
pub struct Host {
    pub id: u32,
    pub name: String,
    pub datacenter_id: u32,
    pub pes_total: u32,
    pub mips_per_pe: f64,
    pub ram_total: u64,
    pub bw_total: u64,
    pub storage_total: u64,

    pes_available: u32,
    ram_available: u64,
    bw_available: u64,
    storage_available: u64,

    active: bool,
    vms: BTreeSet<u32>,
}

impl Host {
    pub fn new(id: u32, name: &str, datacenter_id: u32, config: &HostConfig) -> Self {
        Self {
            id,
            name: name.to_string(),
            datacenter_id,
            pes_total: config.pes,
            mips_per_pe: config.mips,
            ram_total: config.ram,
            bw_total: config.bw,
            storage_total: config.storage,
            pes_available: config.pes,
            ram_available: config.ram,
            bw_available: config.bw,
            storage_available: config.storage,
            active: false,
            vms: BTreeSet::new(),
        }
    }

    /// Checks if the VM fits into the free capacity of this host.
    pub fn can_allocate(&self, vm: &VirtualMachine) -> AllocationVerdict {
        let capacity = &vm.capacity;
        if self.pes_available < capacity.pes || self.mips_per_pe < capacity.mips {
            return AllocationVerdict::NotEnoughPes;
        }
        if self.ram_available < capacity.ram {
            return AllocationVerdict::NotEnoughRam;
        }
        if self.bw_available < capacity.bw {
            return AllocationVerdict::NotEnoughBandwidth;
        }
        if self.storage_available < capacity.storage {
            return AllocationVerdict::NotEnoughStorage;
        }
        AllocationVerdict::Success
    }

    pub fn is_suitable_for_vm(&self, vm: &VirtualMachine) -> bool {
        self.can_allocate(vm) == AllocationVerdict::Success
    }

    pub fn free_pes(&self) -> u32 {
        self.pes_available
    }

    pub fn available_ram(&self) -> u64 {
        self.ram_available
    }

    pub fn available_bw(&self) -> u64 {
        self.bw_available
    }

    pub fn available_storage(&self) -> u64 {
        self.storage_available
    }

    pub fn total_mips(&self) -> f64 {
        self.mips_per_pe * self.pes_total as f64
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Sets active flag, returns true if it has changed.
    pub(crate) fn set_active(&mut self, active: bool) -> bool {
        let changed = self.active != active;
        self.active = active;
        changed
    }

    /// Returns IDs of VMs currently placed on this host.
    pub fn vms(&self) -> impl Iterator<Item = u32> + '_ {
        self.vms.iter().copied()
    }

    pub fn vm_count(&self) -> usize {
        self.vms.len()
    }

    /// Reserves resources for the VM if it fits.
    pub(crate) fn allocate(&mut self, vm: &VirtualMachine) -> AllocationVerdict {
        let verdict = self.can_allocate(vm);
        if verdict == AllocationVerdict::Success {
            let capacity = &vm.capacity;
            self.pes_available -= capacity.pes;
            self.ram_available -= capacity.ram;
            self.bw_available -= capacity.bw;
            self.storage_available -= capacity.storage;
            self.vms.insert(vm.id);
        }
        verdict
    }

    /// Releases resources of the VM, returns false if it was not placed here.
    pub(crate) fn release(&mut self, vm: &VirtualMachine) -> bool {
        if !self.vms.remove(&vm.id) {
            return false;
        }
        let capacity = &vm.capacity;
        self.pes_available += capacity.pes;
        self.ram_available += capacity.ram;
        self.bw_available += capacity.bw;
        self.storage_available += capacity.storage;
        true
    }
}
