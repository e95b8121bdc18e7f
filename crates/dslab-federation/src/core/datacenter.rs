//! Federation-aware datacenter component.

use std::cell::RefCell;
use std::rc::Rc;

use dslab_core::cast;
use dslab_core::context::SimulationContext;
use dslab_core::event::Event;
use dslab_core::handler::EventHandler;
use dslab_core::{log_debug, log_error, log_warn};

use crate::core::allocation_policy::{AllocationError, SearchTimeLedger, VmAllocationPolicy};
use crate::core::config::FederationConfig;
use crate::core::events::datacenter::UpdateTaskProcessing;
use crate::core::events::task::{TaskReturned, TaskSubmitRequest};
use crate::core::events::vm::{VmCreateRequest, VmCreated, VmCreationFailed, VmDestroyRequest};
use crate::core::state::FederationState;
use crate::core::task::TaskStatus;

/// Time-weighted average of a piecewise constant value.
#[derive(Clone, Debug, Default)]
pub struct UtilizationTracker {
    last_time: f64,
    last_value: f64,
    weighted_sum: f64,
    total_time: f64,
}

impl UtilizationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes the interval since the previous record and starts a new one with the given value.
    pub fn record(&mut self, time: f64, value: f64) {
        if time > self.last_time {
            let elapsed = time - self.last_time;
            self.weighted_sum += self.last_value * elapsed;
            self.total_time += elapsed;
            self.last_time = time;
        }
        self.last_value = value;
    }

    pub fn average(&self) -> f64 {
        if self.total_time > 0. {
            self.weighted_sum / self.total_time
        } else {
            self.last_value
        }
    }
}

/// Datacenter of a federation member.
///
/// Places VMs with its allocation policy, which may pick a host of another member when the owner's hosts
/// are full, and runs tasks on the VMs hosted here. Migrations are never performed.
pub struct FederatedDatacenter {
    pub id: u32,
    policy: VmAllocationPolicy,
    ledger: SearchTimeLedger,
    utilization: UtilizationTracker,
    next_update: Option<(u64, f64)>,
    state: Rc<RefCell<FederationState>>,
    config: Rc<FederationConfig>,
    ctx: SimulationContext,
}

impl FederatedDatacenter {
    pub fn new(
        policy: VmAllocationPolicy,
        state: Rc<RefCell<FederationState>>,
        config: Rc<FederationConfig>,
        ctx: SimulationContext,
    ) -> Self {
        Self {
            id: ctx.id(),
            policy,
            ledger: SearchTimeLedger::new(),
            utilization: UtilizationTracker::new(),
            next_update: None,
            state,
            config,
            ctx,
        }
    }

    pub fn name(&self) -> &str {
        self.ctx.name()
    }

    /// Returns ID of the member owning this datacenter.
    pub fn owner(&self) -> Option<u32> {
        self.state.borrow().pool.datacenter(self.id).map(|dc| dc.owner)
    }

    pub fn is_migrations_enabled(&self) -> bool {
        false
    }

    pub fn policy(&self) -> &VmAllocationPolicy {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut VmAllocationPolicy {
        &mut self.policy
    }

    /// Time spent searching for hosts per VM placed by this datacenter.
    pub fn search_time_ledger(&self) -> &SearchTimeLedger {
        &self.ledger
    }

    /// Time-weighted average of host CPU utilization.
    pub fn average_cpu_utilization(&self) -> f64 {
        self.utilization.average()
    }

    /// Places VM with the allocation policy of this datacenter.
    pub fn allocate_host_for_vm(&mut self, vm_id: u32) -> Result<u32, AllocationError> {
        let now = self.ctx.time();
        let mut state = self.state.borrow_mut();
        let host = self.policy.allocate_host_for_vm(vm_id, &mut state, &mut self.ledger)?;
        if let Some(vm) = state.workload.vm_mut(vm_id) {
            vm.set_creation_time(now);
        }
        Ok(host)
    }

    fn record_utilization(&mut self) {
        let value = self.state.borrow().datacenter_cpu_utilization(self.id);
        self.utilization.record(self.ctx.time(), value);
    }

    fn on_vm_create_request(&mut self, vm_id: u32, broker_id: u32) {
        match self.allocate_host_for_vm(vm_id) {
            Ok(host_id) => {
                let host_name = self
                    .state
                    .borrow()
                    .pool
                    .host(host_id)
                    .map(|h| h.name.clone())
                    .unwrap_or_default();
                log_debug!(self.ctx, "placed vm {} on host {}", vm_id, host_name);
                self.record_utilization();
                self.ctx.emit_now(VmCreated { vm_id, host_id }, broker_id);
            }
            Err(error) => {
                match error {
                    AllocationError::UnknownVm(_) => log_error!(self.ctx, "can't place vm {}: {}", vm_id, error),
                    _ => log_warn!(self.ctx, "can't place vm {}: {}", vm_id, error),
                }
                self.ctx.emit_now(VmCreationFailed { vm_id, error }, broker_id);
            }
        }
    }

    fn on_task_submit_request(&mut self, task_id: u32, broker_id: u32) {
        self.update_task_processing();

        let now = self.ctx.time();
        let min_time = self.config.min_time_between_events;
        let estimate = {
            let mut state = self.state.borrow_mut();
            let task = match state.workload.task(task_id) {
                Some(task) => task,
                None => {
                    log_error!(self.ctx, "task {} is not registered", task_id);
                    return;
                }
            };
            if task.is_finished() {
                drop(state);
                self.ctx.emit_now(TaskReturned { task_id }, broker_id);
                return;
            }
            let (length, pes, file_size) = (task.length, task.pes, task.file_size);
            let vm_id = match task.vm() {
                Some(vm_id) => vm_id,
                None => {
                    log_error!(self.ctx, "task {} is not bound to any vm", task_id);
                    return;
                }
            };
            let transfer_time = match self.config.storage_read_rate {
                Some(rate) if rate > 0. => file_size / rate,
                _ => 0.,
            };
            let estimate = match state.workload.vm_mut(vm_id) {
                Some(vm) if vm.is_created() => {
                    vm.scheduler_mut()
                        .submit(task_id, length, pes, transfer_time, now, min_time)
                }
                _ => {
                    log_error!(self.ctx, "task {} is bound to vm {} which is not running", task_id, vm_id);
                    return;
                }
            };
            if let Some(task) = state.workload.task_mut(task_id) {
                task.set_datacenter(self.id);
                task.set_status(TaskStatus::InExecution);
                task.set_exec_start_time(now + transfer_time);
            }
            estimate
        };
        log_debug!(self.ctx, "started task {}", task_id);
        self.record_utilization();
        if estimate.is_finite() && estimate > 0. {
            self.schedule_update(estimate);
        }
    }

    /// Advances schedulers of VMs hosted here and returns finished tasks to their brokers.
    fn update_task_processing(&mut self) {
        let now = self.ctx.time();
        let min_time = self.config.min_time_between_events;
        let mut returned = Vec::new();
        let mut next_estimate = f64::INFINITY;
        {
            let mut state = self.state.borrow_mut();
            for vm_id in state.datacenter_vms(self.id) {
                let finished = match state.workload.vm_mut(vm_id) {
                    Some(vm) => {
                        let finished = vm.scheduler_mut().update_processing(now);
                        next_estimate = next_estimate.min(vm.scheduler().estimated_finish_time(now, min_time));
                        finished
                    }
                    None => continue,
                };
                for task_id in finished {
                    if let Some(task) = state.workload.task_mut(task_id) {
                        task.set_status(TaskStatus::Finished);
                        task.set_finish_time(now);
                        returned.push((task_id, task.member_id));
                    }
                }
            }
            for (task_id, member_id) in returned {
                match state.broker_of_member(member_id) {
                    Some(broker_id) => {
                        self.ctx.emit_now(TaskReturned { task_id }, broker_id);
                    }
                    None => log_error!(self.ctx, "member {} has no broker to return task {}", member_id, task_id),
                }
            }
        }
        self.record_utilization();
        if next_estimate.is_finite() {
            self.schedule_update(next_estimate);
        }
    }

    /// Keeps a single pending processing update, moving it earlier when needed.
    fn schedule_update(&mut self, delay: f64) {
        let delay = delay.max(self.config.min_time_between_events);
        let time = self.ctx.time() + delay;
        if let Some((event_id, scheduled_at)) = self.next_update {
            if scheduled_at <= time {
                return;
            }
            self.ctx.cancel_event(event_id);
        }
        let event_id = self.ctx.emit_self(UpdateTaskProcessing {}, delay);
        self.next_update = Some((event_id, time));
    }

    fn on_vm_destroy_request(&mut self, vm_id: u32) {
        self.update_task_processing();
        let now = self.ctx.time();
        if self.state.borrow_mut().destroy_vm(vm_id, now) {
            log_debug!(self.ctx, "destroyed vm {}", vm_id);
            self.record_utilization();
        } else {
            log_warn!(self.ctx, "can't destroy vm {}: it is not running", vm_id);
        }
    }
}

impl EventHandler for FederatedDatacenter {
    fn on(&mut self, event: Event) {
        cast!(match event.data {
            VmCreateRequest { vm_id } => {
                self.on_vm_create_request(vm_id, event.src);
            }
            TaskSubmitRequest { task_id } => {
                self.on_task_submit_request(task_id, event.src);
            }
            UpdateTaskProcessing {} => {
                self.next_update = None;
                self.update_task_processing();
            }
            VmDestroyRequest { vm_id } => {
                self.on_vm_destroy_request(vm_id);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utilization_tracker() {
        let mut tracker = UtilizationTracker::new();
        assert_eq!(tracker.average(), 0.);
        tracker.record(0., 1.);
        assert_eq!(tracker.average(), 1.);
        tracker.record(2., 0.5);
        tracker.record(4., 0.);
        // 1 for two seconds, 0.5 for two seconds
        assert_eq!(tracker.average(), 0.75);
    }
}
