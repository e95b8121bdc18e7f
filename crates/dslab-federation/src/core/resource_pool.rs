//! Datacenters and hosts of the federation.

use std::collections::BTreeMap;

use crate::core::config::HostConfig;
use crate::core::host::Host;

/// Datacenter as seen by allocation policies: owner and ordered host list.
#[derive(Clone, Debug)]
pub struct DatacenterInfo {
    pub id: u32,
    pub name: String,
    /// Owning member.
    pub owner: u32,
    hosts: Vec<u32>,
}

impl DatacenterInfo {
    pub fn hosts(&self) -> &[u32] {
        &self.hosts
    }
}

#[derive(Clone, Default)]
pub struct ResourcePool {
    datacenters: BTreeMap<u32, DatacenterInfo>,
    hosts: BTreeMap<u32, Host>,
    next_host_id: u32,
}

impl ResourcePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_datacenter(&mut self, id: u32, name: &str, owner: u32) {
        self.datacenters.insert(
            id,
            DatacenterInfo {
                id,
                name: name.to_string(),
                owner,
                hosts: Vec::new(),
            },
        );
    }

    pub(crate) fn set_owner(&mut self, datacenter_id: u32, owner: u32) -> Option<u32> {
        let datacenter = self.datacenters.get_mut(&datacenter_id)?;
        let previous = datacenter.owner;
        datacenter.owner = owner;
        Some(previous)
    }

    /// Adds host to datacenter and returns its ID.
    pub fn add_host(&mut self, datacenter_id: u32, name: &str, config: &HostConfig) -> u32 {
        let datacenter = self
            .datacenters
            .get_mut(&datacenter_id)
            .unwrap_or_else(|| panic!("Datacenter {} is not registered", datacenter_id));
        let id = self.next_host_id;
        self.next_host_id += 1;
        datacenter.hosts.push(id);
        self.hosts.insert(id, Host::new(id, name, datacenter_id, config));
        id
    }

    pub fn datacenter(&self, datacenter_id: u32) -> Option<&DatacenterInfo> {
        self.datacenters.get(&datacenter_id)
    }

    pub fn datacenters(&self) -> impl Iterator<Item = &DatacenterInfo> {
        self.datacenters.values()
    }

    pub fn host(&self, host_id: u32) -> Option<&Host> {
        self.hosts.get(&host_id)
    }

    pub(crate) fn host_mut(&mut self, host_id: u32) -> Option<&mut Host> {
        self.hosts.get_mut(&host_id)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values()
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Returns hosts of the given datacenters, flattened in datacenter order.
    pub fn hosts_of(&self, datacenter_ids: &[u32]) -> Vec<u32> {
        datacenter_ids
            .iter()
            .filter_map(|id| self.datacenters.get(id))
            .flat_map(|dc| dc.hosts.iter().copied())
            .collect()
    }
}
