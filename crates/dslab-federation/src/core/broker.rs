//! Broker submitting workload of a federation member.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexSet;

use dslab_core::cast;
use dslab_core::context::SimulationContext;
use dslab_core::event::Event;
use dslab_core::handler::EventHandler;
use dslab_core::{log_debug, log_error, log_warn};

use crate::core::allocation_policy::AllocationError;
use crate::core::config::FederationConfig;
use crate::core::eligibility::{DedicatedVmMatcher, TaskVmMatcher};
use crate::core::events::task::{DispatchWaitingTasks, TaskArrived, TaskReturned, TaskSubmitRequest};
use crate::core::events::vm::{VmCreateRequest, VmCreated, VmCreationFailed, VmDestroyRequest, VmSubmitted};
use crate::core::state::FederationState;
use crate::core::task::TaskStatus;
use crate::core::vm::VmStatus;

/// Broker maps VMs of member users to datacenters and tasks to VMs.
///
/// VMs are requested from the owner's datacenters first. Tasks wait until an eligible VM is running,
/// failed VM placements are retried at the federation-wide retry horizon.
pub struct FederatedBroker {
    pub id: u32,
    member_id: u32,
    matcher: Box<dyn TaskVmMatcher>,
    submitted_vms: Vec<u32>,
    waiting_tasks: IndexSet<u32>,
    finished_tasks: IndexSet<u32>,
    failed_tasks: IndexSet<u32>,
    dispatch_scheduled: bool,
    state: Rc<RefCell<FederationState>>,
    config: Rc<FederationConfig>,
    ctx: SimulationContext,
}

impl FederatedBroker {
    pub fn new(
        member_id: u32,
        state: Rc<RefCell<FederationState>>,
        config: Rc<FederationConfig>,
        ctx: SimulationContext,
    ) -> Self {
        Self {
            id: ctx.id(),
            member_id,
            matcher: Box::new(DedicatedVmMatcher::new()),
            submitted_vms: Vec::new(),
            waiting_tasks: IndexSet::new(),
            finished_tasks: IndexSet::new(),
            failed_tasks: IndexSet::new(),
            dispatch_scheduled: false,
            state,
            config,
            ctx,
        }
    }

    pub fn member_id(&self) -> u32 {
        self.member_id
    }

    pub fn set_task_vm_matcher(&mut self, matcher: Box<dyn TaskVmMatcher>) {
        self.matcher = matcher;
    }

    /// Submits VMs, each one is requested from a datacenter after its submission delay.
    pub fn submit_vm_list(&mut self, vm_ids: &[u32]) {
        for vm_id in vm_ids {
            let delay = match self.state.borrow().workload.vm(*vm_id) {
                Some(vm) => vm.submission_delay,
                None => {
                    log_error!(self.ctx, "can't submit unknown vm {}", vm_id);
                    continue;
                }
            };
            self.submitted_vms.push(*vm_id);
            self.ctx.emit_self(VmSubmitted { vm_id: *vm_id }, delay);
        }
    }

    /// Submits tasks, each one starts waiting for a VM after its submission delay.
    pub fn submit_task_list(&mut self, task_ids: &[u32]) {
        for task_id in task_ids {
            let delay = match self.state.borrow().workload.task(*task_id) {
                Some(task) => task.submission_delay,
                None => {
                    log_error!(self.ctx, "can't submit unknown task {}", task_id);
                    continue;
                }
            };
            self.ctx.emit_self(TaskArrived { task_id: *task_id }, delay);
        }
    }

    /// Returns the first datacenter of the VM owner, otherwise the first datacenter of another member.
    pub fn map_vm_to_datacenter(&self, vm_id: u32) -> Option<u32> {
        let state = self.state.borrow();
        let member_id = state.workload.vm(vm_id)?.member_id;
        state
            .member_datacenters(member_id)
            .first()
            .or_else(|| state.datacenters_from_other_members(member_id).first())
            .copied()
    }

    /// Returns VM for the task and binds the task to it.
    ///
    /// A bound task keeps its VM. Otherwise the running VMs of the whole federation eligible for the task are
    /// ordered with the matcher and the first one is chosen.
    pub fn map_task_to_vm(&mut self, task_id: u32) -> Option<u32> {
        let mut state = self.state.borrow_mut();
        let task = state.workload.task(task_id)?;
        if let Some(vm_id) = task.vm() {
            return Some(vm_id);
        }
        let mut candidates: Vec<_> = state
            .workload
            .vms()
            .filter(|vm| vm.is_created() && self.matcher.vm_eligible_for_task(vm, task, &state))
            .collect();
        candidates.sort_by(|a, b| self.matcher.compare_vms(a, b, &state));
        let vm_id = candidates.first()?.id;
        state.bind_task_to_vm(task_id, vm_id);
        Some(vm_id)
    }

    /// Mean CPU utilization of the member datacenters.
    pub fn average_datacenter_cpu_utilization(&self) -> f64 {
        let state = self.state.borrow();
        let datacenters = state.member_datacenters(self.member_id);
        if datacenters.is_empty() {
            return 0.;
        }
        datacenters
            .iter()
            .map(|dc| state.datacenter_cpu_utilization(*dc))
            .sum::<f64>()
            / datacenters.len() as f64
    }

    pub fn submitted_vms(&self) -> &[u32] {
        &self.submitted_vms
    }

    pub fn waiting_tasks(&self) -> Vec<u32> {
        self.waiting_tasks.iter().copied().collect()
    }

    /// Returns finished tasks in completion order.
    pub fn finished_tasks(&self) -> Vec<u32> {
        self.finished_tasks.iter().copied().collect()
    }

    pub fn failed_tasks(&self) -> Vec<u32> {
        self.failed_tasks.iter().copied().collect()
    }

    fn on_vm_submitted(&mut self, vm_id: u32) {
        let status = self.state.borrow().workload.vm(vm_id).map(|vm| vm.status());
        if status != Some(VmStatus::Unplaced) {
            return;
        }
        match self.map_vm_to_datacenter(vm_id) {
            Some(datacenter_id) => {
                log_debug!(
                    self.ctx,
                    "requesting vm {} from {}",
                    vm_id,
                    self.ctx.lookup_name(datacenter_id)
                );
                self.ctx.emit_now(VmCreateRequest { vm_id }, datacenter_id);
            }
            None => {
                log_warn!(self.ctx, "no datacenter can be requested for vm {}", vm_id);
                self.retry_vm(vm_id);
            }
        }
    }

    fn on_vm_created(&mut self, vm_id: u32, host_id: u32) {
        log_debug!(self.ctx, "vm {} is running on host {}", vm_id, host_id);
        let tasks: Vec<u32> = {
            let state = self.state.borrow();
            match state.workload.vm(vm_id) {
                Some(vm) => self
                    .waiting_tasks
                    .iter()
                    .copied()
                    .filter(|t| {
                        state
                            .workload
                            .task(*t)
                            .map_or(false, |task| self.matcher.vm_eligible_for_task(vm, task, &state))
                    })
                    .collect(),
                None => Vec::new(),
            }
        };
        for task_id in tasks {
            self.try_dispatch(task_id);
        }
        self.settle_waiting_tasks();
    }

    fn on_vm_creation_failed(&mut self, vm_id: u32, error: AllocationError) {
        match error {
            AllocationError::VmAlreadyCreated => {
                log_debug!(self.ctx, "vm {} is already created", vm_id);
            }
            AllocationError::UnknownVm(_) => {
                log_error!(self.ctx, "datacenter does not know vm {}", vm_id);
            }
            AllocationError::NoHostInFederation | AllocationError::NoSuitableHost => {
                self.retry_vm(vm_id);
            }
        }
    }

    /// Schedules another placement attempt or gives up on the VM after too many attempts.
    fn retry_vm(&mut self, vm_id: u32) {
        let now = self.ctx.time();
        let attempts = match self.state.borrow_mut().workload.vm_mut(vm_id) {
            Some(vm) => vm.register_allocation_attempt(),
            None => return,
        };
        if attempts >= self.config.max_allocation_attempts {
            log_warn!(self.ctx, "giving up on vm {} after {} attempts", vm_id, attempts);
            self.fail_vm(vm_id);
            return;
        }
        let delay = self.state.borrow_mut().wait_time_before_retry(now);
        log_debug!(self.ctx, "retrying vm {} in {:.6}", vm_id, delay);
        self.ctx.emit_self(VmSubmitted { vm_id }, delay);
    }

    fn fail_vm(&mut self, vm_id: u32) {
        let abandoned: Vec<u32> = {
            let mut state = self.state.borrow_mut();
            if let Some(vm) = state.workload.vm_mut(vm_id) {
                vm.mark_failed();
            }
            let vm = match state.workload.vm(vm_id) {
                Some(vm) => vm,
                None => return,
            };
            self.waiting_tasks
                .iter()
                .copied()
                .filter(|t| state.workload.task(*t).map_or(false, |task| vm.is_dedicated_to(task)))
                .collect()
        };
        for task_id in abandoned {
            self.fail_task(task_id);
        }
        self.settle_waiting_tasks();
    }

    fn fail_task(&mut self, task_id: u32) {
        if let Some(task) = self.state.borrow_mut().workload.task_mut(task_id) {
            task.set_status(TaskStatus::Failed);
        }
        self.waiting_tasks.shift_remove(&task_id);
        self.failed_tasks.insert(task_id);
        log_warn!(self.ctx, "task {} failed: no vm can run it", task_id);
    }

    fn on_task_arrived(&mut self, task_id: u32) {
        let dedicated_vm_failed = {
            let state = self.state.borrow();
            match state.workload.task(task_id) {
                Some(task) => self.submitted_vms.iter().any(|vm_id| {
                    state
                        .workload
                        .vm(*vm_id)
                        .map_or(false, |vm| vm.status() == VmStatus::FailedToAllocate && vm.is_dedicated_to(task))
                }),
                None => return,
            }
        };
        if let Some(task) = self.state.borrow_mut().workload.task_mut(task_id) {
            task.set_status(TaskStatus::Queued);
        }
        self.waiting_tasks.insert(task_id);
        if dedicated_vm_failed {
            self.fail_task(task_id);
            return;
        }
        self.try_dispatch(task_id);
        self.settle_waiting_tasks();
    }

    /// Sends the task to the datacenter hosting its VM, returns false if there is no VM for it yet.
    fn try_dispatch(&mut self, task_id: u32) -> bool {
        let vm_id = match self.map_task_to_vm(task_id) {
            Some(vm_id) => vm_id,
            None => return false,
        };
        let datacenter_id = self.state.borrow().datacenter_of_vm(vm_id);
        match datacenter_id {
            Some(datacenter_id) => {
                log_debug!(self.ctx, "sending task {} to vm {}", task_id, vm_id);
                self.waiting_tasks.shift_remove(&task_id);
                self.ctx.emit_now(TaskSubmitRequest { task_id }, datacenter_id);
                true
            }
            None => {
                log_error!(self.ctx, "vm {} of task {} is not running", vm_id, task_id);
                false
            }
        }
    }

    fn on_dispatch_waiting_tasks(&mut self) {
        self.dispatch_scheduled = false;
        for task_id in self.waiting_tasks() {
            self.try_dispatch(task_id);
        }
        self.settle_waiting_tasks();
    }

    /// Fails tasks that can no longer be placed and schedules the next dispatch of the rest.
    ///
    /// Tasks are hopeless when this broker has no VM waiting for placement and no VM of the federation is
    /// running tasks, since nothing can free capacity for them.
    fn settle_waiting_tasks(&mut self) {
        if self.waiting_tasks.is_empty() {
            return;
        }
        let (pending_vms, running_work) = {
            let state = self.state.borrow();
            let pending_vms = self.submitted_vms.iter().any(|vm_id| {
                state
                    .workload
                    .vm(*vm_id)
                    .map_or(false, |vm| vm.status() == VmStatus::Unplaced)
            });
            let running_work = state
                .federation_vms()
                .into_iter()
                .filter_map(|vm_id| state.workload.vm(vm_id))
                .any(|vm| !vm.scheduler().is_empty());
            (pending_vms, running_work)
        };
        if running_work {
            if !self.dispatch_scheduled {
                let now = self.ctx.time();
                let delay = self.state.borrow_mut().wait_time_before_retry(now);
                self.ctx.emit_self(DispatchWaitingTasks {}, delay);
                self.dispatch_scheduled = true;
            }
        } else if !pending_vms {
            for task_id in self.waiting_tasks() {
                self.fail_task(task_id);
            }
        }
    }

    fn on_task_returned(&mut self, task_id: u32) {
        log_debug!(self.ctx, "task {} is finished", task_id);
        self.waiting_tasks.shift_remove(&task_id);
        self.finished_tasks.insert(task_id);

        let (vm_id, datacenter_id, idle) = {
            let state = self.state.borrow();
            let vm = match state.workload.task(task_id).and_then(|t| t.vm()).and_then(|v| state.workload.vm(v)) {
                Some(vm) => vm,
                None => return,
            };
            let bound_finished = vm
                .tasks()
                .iter()
                .all(|t| state.workload.task(*t).map_or(true, |task| task.is_finished()));
            let still_needed = self.waiting_tasks.iter().any(|t| {
                state
                    .workload
                    .task(*t)
                    .map_or(false, |task| self.matcher.vm_eligible_for_task(vm, task, &state))
            });
            (vm.id, state.datacenter_of_vm(vm.id), vm.is_created() && bound_finished && !still_needed)
        };
        if idle {
            if let Some(datacenter_id) = datacenter_id {
                let delay = self.config.vm_destruction_delay;
                self.state
                    .borrow_mut()
                    .schedule_destruction(vm_id, self.ctx.time() + delay);
                self.ctx.emit(VmDestroyRequest { vm_id }, datacenter_id, delay);
            }
        }
        self.settle_waiting_tasks();
    }
}

impl EventHandler for FederatedBroker {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            VmSubmitted { vm_id } => {
                self.on_vm_submitted(vm_id);
            }
            VmCreated { vm_id, host_id } => {
                self.on_vm_created(vm_id, host_id);
            }
            VmCreationFailed { vm_id, error } => {
                self.on_vm_creation_failed(vm_id, error);
            }
            TaskArrived { task_id } => {
                self.on_task_arrived(task_id);
            }
            DispatchWaitingTasks {} => {
                self.on_dispatch_waiting_tasks();
            }
            TaskReturned { task_id } => {
                self.on_task_returned(task_id);
            }
        })
    }
}
