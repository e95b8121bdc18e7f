//! Federation registry.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use indexmap::IndexMap;

use crate::core::latency::LatencyModel;
use crate::core::member::Member;

#[derive(Clone, Debug, PartialEq)]
pub enum FederationError {
    MemberNotRegistered(u32),
}

impl Display for FederationError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            FederationError::MemberNotRegistered(id) => write!(f, "member {} is not registered in the federation", id),
        }
    }
}

impl std::error::Error for FederationError {}

/// Cloud federation: registered members, pairwise latency between them and the federation-wide
/// retry horizon for failed placements.
///
/// Members are kept in registration order, which is the order used for every federation-wide
/// traversal (datacenters of other members, flattened host lists).
pub struct CloudFederation {
    pub id: u32,
    pub name: String,
    latency_model: LatencyModel,
    min_time_between_events: f64,
    members: IndexMap<u32, Member>,
    latency: BTreeMap<u32, BTreeMap<u32, f64>>,
    next_retry_at: f64,
}

impl CloudFederation {
    pub fn new(id: u32, name: &str, latency_model: LatencyModel, min_time_between_events: f64) -> Self {
        Self {
            id,
            name: name.to_string(),
            latency_model,
            min_time_between_events,
            members: IndexMap::new(),
            latency: BTreeMap::new(),
            next_retry_at: 0.,
        }
    }

    /// Registers member and computes its latency to every registered member.
    ///
    /// Returns false if a member with the same ID is already registered.
    pub fn add_member(&mut self, mut member: Member) -> bool {
        if self.members.contains_key(&member.id) {
            return false;
        }
        let mut row = BTreeMap::new();
        row.insert(member.id, 0.);
        for other in self.members.values() {
            let latency = self.latency_model.latency(&member.coordinates, &other.coordinates);
            row.insert(other.id, latency);
            self.latency.entry(other.id).or_default().insert(member.id, latency);
        }
        self.latency.insert(member.id, row);
        member.set_federation(Some(self.id));
        self.members.insert(member.id, member);
        true
    }

    /// Detaches member from the federation and returns it.
    ///
    /// Removing a member that was never registered is a no-op returning `None`, which plays the role of a
    /// `false` result. Latency entries of the removed member stay in the table.
    pub fn remove_member(&mut self, member_id: u32) -> Option<Member> {
        let mut member = self.members.shift_remove(&member_id)?;
        member.set_federation(None);
        Some(member)
    }

    /// Returns delay of a single hop between two registered members.
    pub fn latency_between(&self, a: u32, b: u32) -> Result<f64, FederationError> {
        for id in [a, b] {
            if !self.members.contains_key(&id) {
                return Err(FederationError::MemberNotRegistered(id));
            }
        }
        self.latency
            .get(&a)
            .and_then(|row| row.get(&b))
            .copied()
            .ok_or(FederationError::MemberNotRegistered(b))
    }

    pub fn latency_table(&self) -> &BTreeMap<u32, BTreeMap<u32, f64>> {
        &self.latency
    }

    pub fn has_member(&self, member_id: u32) -> bool {
        self.members.contains_key(&member_id)
    }

    pub fn member(&self, member_id: u32) -> Option<&Member> {
        self.members.get(&member_id)
    }

    pub fn member_mut(&mut self, member_id: u32) -> Option<&mut Member> {
        self.members.get_mut(&member_id)
    }

    /// Returns registered members in registration order.
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    pub fn member_ids(&self) -> Vec<u32> {
        self.members.keys().copied().collect()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn min_time_between_events(&self) -> f64 {
        self.min_time_between_events
    }

    pub fn next_retry_at(&self) -> f64 {
        self.next_retry_at
    }

    /// Returns delay before the next federation-wide placement retry.
    ///
    /// `finish_estimates` are the estimated times left until the running VMs complete their next task.
    /// Once the stored deadline has passed it is moved to `now` plus the smallest estimate, or plus the
    /// minimum time between events if no VM is running.
    pub fn wait_time_before_retry<I>(&mut self, now: f64, finish_estimates: I) -> f64
    where
        I: IntoIterator<Item = f64>,
    {
        if now >= self.next_retry_at {
            let next_finish = finish_estimates
                .into_iter()
                .filter(|t| t.is_finite() && *t > 0.)
                .fold(f64::INFINITY, f64::min);
            let delay = if next_finish.is_finite() {
                next_finish
            } else {
                self.min_time_between_events
            };
            self.next_retry_at = now + delay;
        }
        self.next_retry_at - now
    }
}
