//! Federation simulation.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::Serialize;
use sugars::{rc, refcell};

use dslab_core::context::SimulationContext;
use dslab_core::log_info;
use dslab_core::simulation::Simulation;

use crate::core::allocation_policy::{allocation_policy_resolver_with_seed, VmAllocationPolicy};
use crate::core::bot::BagOfTasks;
use crate::core::broker::FederatedBroker;
use crate::core::config::{FederationConfig, HostConfig};
use crate::core::datacenter::FederatedDatacenter;
use crate::core::federation::CloudFederation;
use crate::core::latency::Coordinates;
use crate::core::member::Member;
use crate::core::state::FederationState;
use crate::core::task::TaskStatus;
use crate::core::vm::{VmCapacity, VmStatus};

/// Aggregated outcome of a simulation run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunSummary {
    pub finished_tasks: usize,
    pub failed_tasks: usize,
    /// Failed tasks that were never bound to a VM.
    pub never_placed_tasks: usize,
    pub unfinished_tasks: usize,
    pub vms_placed: usize,
    pub vms_failed: usize,
    /// Finish time of the last task.
    pub makespan: f64,
    pub mean_search_time: f64,
    pub mean_datacenter_cpu_utilization: f64,
}

pub struct FederatedSimulation {
    state: Rc<RefCell<FederationState>>,
    datacenters: BTreeMap<u32, Rc<RefCell<FederatedDatacenter>>>,
    brokers: BTreeMap<u32, Rc<RefCell<FederatedBroker>>>,
    next_member_id: u32,
    sim: Simulation,
    ctx: SimulationContext,
    config: Rc<FederationConfig>,
}

impl FederatedSimulation {
    pub fn new(mut sim: Simulation, config: FederationConfig) -> Self {
        let ctx = sim.create_context(&config.name);
        let federation = CloudFederation::new(
            ctx.id(),
            &config.name,
            config.latency_model(),
            config.min_time_between_events,
        );
        Self {
            state: rc!(refcell!(FederationState::new(federation))),
            datacenters: BTreeMap::new(),
            brokers: BTreeMap::new(),
            next_member_id: 0,
            sim,
            ctx,
            config: rc!(config),
        }
    }

    /// Builds federation described by the config and submits bags of tasks taken from the trace.
    ///
    /// Member at position `p` out of `M` receives trace rows `M * k + p` for its k-th bag.
    pub fn from_config(sim: Simulation, config: FederationConfig, trace: &[BagOfTasks]) -> Self {
        let mut fed_sim = Self::new(sim, config.clone());
        let member_count = config.members.len();
        let mut members = Vec::new();
        for member_config in &config.members {
            let member_id = fed_sim.add_member(
                &member_config.name,
                &member_config.abbreviation,
                member_config.coordinates(),
            );
            let policy_str = member_config
                .allocation_policy
                .as_deref()
                .unwrap_or(&config.allocation_policy);
            for i in 0..member_config.datacenters {
                let dc_name = format!("{}_dc_{}", member_config.abbreviation, i);
                let policy = allocation_policy_resolver_with_seed(policy_str, config.seed);
                let dc_id = fed_sim.add_datacenter(member_id, &dc_name, policy);
                for j in 0..member_config.hosts_per_datacenter {
                    fed_sim.add_host(dc_id, &format!("{}_host_{}", dc_name, j), &config.host);
                }
            }
            let users: Vec<u32> = (0..member_config.users).map(|_| fed_sim.create_user(member_id)).collect();
            if let Some(member) = fed_sim.state.borrow_mut().federation.member_mut(member_id) {
                member.set_bots_per_user(member_config.bots_per_user as u64);
            }
            members.push((member_id, users, member_config.bots_per_user as usize));
        }

        for (position, (_, users, bots_per_user)) in members.into_iter().enumerate() {
            let mut k = 0;
            for user_id in users {
                for _ in 0..bots_per_user {
                    let index = member_count * k + position;
                    let bag = trace.get(index).unwrap_or_else(|| {
                        panic!(
                            "Trace has {} bags of tasks, bag {} was requested",
                            trace.len(),
                            index
                        )
                    });
                    fed_sim.submit_bot(user_id, bag.clone());
                    k += 1;
                }
            }
        }
        fed_sim
    }

    /// Registers member and creates its broker.
    pub fn add_member(&mut self, name: &str, abbreviation: &str, coordinates: Coordinates) -> u32 {
        let member_id = self.next_member_id;
        self.next_member_id += 1;
        self.state
            .borrow_mut()
            .add_member(Member::new(member_id, name, abbreviation, coordinates));

        let broker_name = format!("broker_{}", abbreviation);
        let broker = rc!(refcell!(FederatedBroker::new(
            member_id,
            self.state.clone(),
            self.config.clone(),
            self.sim.create_context(&broker_name),
        )));
        let broker_id = self.sim.add_handler(&broker_name, broker.clone());
        if let Some(member) = self.state.borrow_mut().federation.member_mut(member_id) {
            member.set_broker(broker_id);
        }
        self.brokers.insert(member_id, broker);
        log_info!(self.ctx, "member {} joined the federation at {}", abbreviation, coordinates);
        member_id
    }

    /// Creates datacenter owned by the member and returns its ID.
    pub fn add_datacenter(&mut self, member_id: u32, name: &str, policy: VmAllocationPolicy) -> u32 {
        let datacenter = rc!(refcell!(FederatedDatacenter::new(
            policy,
            self.state.clone(),
            self.config.clone(),
            self.sim.create_context(name),
        )));
        let id = self.sim.add_handler(name, datacenter.clone());
        self.state
            .borrow_mut()
            .add_datacenter(member_id, id, name)
            .unwrap_or_else(|e| panic!("Can't add datacenter {}: {}", name, e));
        self.datacenters.insert(id, datacenter);
        id
    }

    pub fn add_host(&mut self, datacenter_id: u32, name: &str, config: &HostConfig) -> u32 {
        self.state.borrow_mut().pool.add_host(datacenter_id, name, config)
    }

    /// Creates user of the member, local IDs are assigned in creation order.
    pub fn create_user(&mut self, member_id: u32) -> u32 {
        let mut state = self.state.borrow_mut();
        let (local_id, abbreviation) = match state.federation.member(member_id) {
            Some(member) => (member.users().len() as u32, member.abbreviation.clone()),
            None => panic!("Member {} is not registered", member_id),
        };
        let user_id = state.workload.add_user(member_id, local_id, &abbreviation);
        if let Some(member) = state.federation.member_mut(member_id) {
            member.add_user(user_id);
        }
        user_id
    }

    /// Converts bag of tasks into tasks with dedicated VMs and submits them to the broker of the user member.
    pub fn submit_bot(&mut self, user_id: u32, bag: BagOfTasks) -> u32 {
        let (bot_id, vms, tasks) = {
            let mut state = self.state.borrow_mut();
            let bot_id = state.workload.materialize_bot(user_id, bag, &self.config.host);
            let vms = state.workload.spawn_dedicated_vms(bot_id, &self.config.host);
            let tasks = state.workload.bot(bot_id).map(|b| b.tasks().to_vec()).unwrap_or_default();
            (bot_id, vms, tasks)
        };
        self.submit_vms(&vms);
        self.submit_tasks(&tasks);
        bot_id
    }

    pub fn create_vm(&mut self, user_id: u32, capacity: VmCapacity) -> u32 {
        let mut state = self.state.borrow_mut();
        let member_id = self.user_member(&state, user_id);
        state.workload.create_vm(user_id, member_id, capacity)
    }

    pub fn create_task(&mut self, user_id: u32, length: f64, pes: u32) -> u32 {
        let mut state = self.state.borrow_mut();
        let member_id = self.user_member(&state, user_id);
        state.workload.create_task(user_id, member_id, length, pes)
    }

    fn user_member(&self, state: &FederationState, user_id: u32) -> u32 {
        state
            .workload
            .user(user_id)
            .unwrap_or_else(|| panic!("User {} is not registered", user_id))
            .member_id
    }

    /// Submits VMs to the brokers of their owners.
    pub fn submit_vms(&mut self, vm_ids: &[u32]) {
        let mut by_member: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        for vm_id in vm_ids {
            if let Some(vm) = self.state.borrow().workload.vm(*vm_id) {
                by_member.entry(vm.member_id).or_default().push(*vm_id);
            }
        }
        for (member_id, vms) in by_member {
            self.broker(member_id).borrow_mut().submit_vm_list(&vms);
        }
    }

    /// Submits tasks to the brokers of their owners.
    pub fn submit_tasks(&mut self, task_ids: &[u32]) {
        let mut by_member: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
        for task_id in task_ids {
            if let Some(task) = self.state.borrow().workload.task(*task_id) {
                by_member.entry(task.member_id).or_default().push(*task_id);
            }
        }
        for (member_id, tasks) in by_member {
            self.broker(member_id).borrow_mut().submit_task_list(&tasks);
        }
    }

    pub fn state(&self) -> Rc<RefCell<FederationState>> {
        self.state.clone()
    }

    pub fn config(&self) -> Rc<FederationConfig> {
        self.config.clone()
    }

    pub fn datacenter(&self, datacenter_id: u32) -> Rc<RefCell<FederatedDatacenter>> {
        self.datacenters
            .get(&datacenter_id)
            .unwrap_or_else(|| panic!("Datacenter {} is not registered", datacenter_id))
            .clone()
    }

    pub fn datacenter_ids(&self) -> Vec<u32> {
        self.datacenters.keys().copied().collect()
    }

    /// Returns broker of the member.
    pub fn broker(&self, member_id: u32) -> Rc<RefCell<FederatedBroker>> {
        self.brokers
            .get(&member_id)
            .unwrap_or_else(|| panic!("Member {} has no broker", member_id))
            .clone()
    }

    pub fn member_ids(&self) -> Vec<u32> {
        self.state.borrow().federation.member_ids()
    }

    pub fn context(&self) -> &SimulationContext {
        &self.ctx
    }

    pub fn step(&mut self) -> bool {
        self.sim.step()
    }

    pub fn steps(&mut self, step_count: u64) -> bool {
        self.sim.steps(step_count)
    }

    pub fn step_until_no_events(&mut self) {
        self.sim.step_until_no_events();
    }

    pub fn step_for_duration(&mut self, time: f64) {
        self.sim.step_for_duration(time);
    }

    pub fn event_count(&self) -> u64 {
        self.sim.event_count()
    }

    pub fn current_time(&self) -> f64 {
        self.sim.time()
    }

    pub fn summary(&self) -> RunSummary {
        let state = self.state.borrow();
        let mut summary = RunSummary::default();
        for task in state.workload.tasks() {
            match task.status() {
                TaskStatus::Finished => {
                    summary.finished_tasks += 1;
                    summary.makespan = summary.makespan.max(task.finish_time().unwrap_or(0.));
                }
                TaskStatus::Failed => {
                    summary.failed_tasks += 1;
                    if task.is_never_placed() {
                        summary.never_placed_tasks += 1;
                    }
                }
                _ => summary.unfinished_tasks += 1,
            }
        }
        for vm in state.workload.vms() {
            match vm.status() {
                VmStatus::Placed | VmStatus::Destroyed => summary.vms_placed += 1,
                VmStatus::FailedToAllocate => summary.vms_failed += 1,
                VmStatus::Unplaced => {}
            }
        }
        drop(state);

        let mut searched_vms = 0;
        let mut search_time = 0.;
        let mut utilization = 0.;
        for datacenter in self.datacenters.values() {
            let datacenter = datacenter.borrow();
            searched_vms += datacenter.search_time_ledger().len();
            search_time += datacenter.search_time_ledger().total();
            utilization += datacenter.average_cpu_utilization();
        }
        if searched_vms > 0 {
            summary.mean_search_time = search_time / searched_vms as f64;
        }
        if !self.datacenters.is_empty() {
            summary.mean_datacenter_cpu_utilization = utilization / self.datacenters.len() as f64;
        }
        summary
    }
}
