//! Federation member.

use crate::core::latency::Coordinates;

/// Organization that owns datacenters and users and shares its spare capacity with the federation.
#[derive(Clone, Debug)]
pub struct Member {
    pub id: u32,
    pub name: String,
    pub abbreviation: String,
    pub coordinates: Coordinates,
    federation: Option<u32>,
    datacenters: Vec<u32>,
    users: Vec<u32>,
    bots_per_user: u64,
    broker: Option<u32>,
}

impl Member {
    pub fn new(id: u32, name: &str, abbreviation: &str, coordinates: Coordinates) -> Self {
        Self {
            id,
            name: name.to_string(),
            abbreviation: abbreviation.to_string(),
            coordinates,
            federation: None,
            datacenters: Vec::new(),
            users: Vec::new(),
            bots_per_user: 0,
            broker: None,
        }
    }

    /// Returns ID of the federation this member is registered in.
    pub fn federation(&self) -> Option<u32> {
        self.federation
    }

    pub(crate) fn set_federation(&mut self, federation: Option<u32>) {
        self.federation = federation;
    }

    /// Returns IDs of owned datacenters in the order they were added.
    pub fn datacenters(&self) -> &[u32] {
        &self.datacenters
    }

    pub(crate) fn add_datacenter(&mut self, datacenter_id: u32) -> bool {
        if self.datacenters.contains(&datacenter_id) {
            return false;
        }
        self.datacenters.push(datacenter_id);
        true
    }

    pub(crate) fn remove_datacenter(&mut self, datacenter_id: u32) -> bool {
        let len = self.datacenters.len();
        self.datacenters.retain(|id| *id != datacenter_id);
        self.datacenters.len() != len
    }

    pub fn users(&self) -> &[u32] {
        &self.users
    }

    /// Registers user, returns false if it is already registered.
    pub fn add_user(&mut self, user_id: u32) -> bool {
        if self.users.contains(&user_id) {
            return false;
        }
        self.users.push(user_id);
        true
    }

    pub fn bots_per_user(&self) -> u64 {
        self.bots_per_user
    }

    pub fn set_bots_per_user(&mut self, bots_per_user: u64) {
        self.bots_per_user = bots_per_user;
    }

    /// Returns ID of the broker component submitting workload of this member.
    pub fn broker(&self) -> Option<u32> {
        self.broker
    }

    pub fn set_broker(&mut self, broker_id: u32) {
        self.broker = Some(broker_id);
    }
}
