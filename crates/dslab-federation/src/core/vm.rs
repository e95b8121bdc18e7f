//! Virtual machines.

use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::core::task::Task;
use crate::core::task_scheduler::TaskScheduler;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VmStatus {
    Unplaced,
    Placed,
    Destroyed,
    FailedToAllocate,
}

impl Display for VmStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            VmStatus::Unplaced => write!(f, "unplaced"),
            VmStatus::Placed => write!(f, "placed"),
            VmStatus::Destroyed => write!(f, "destroyed"),
            VmStatus::FailedToAllocate => write!(f, "failed_to_allocate"),
        }
    }
}

/// Resources requested by a VM.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VmCapacity {
    /// MIPS of each PE.
    pub mips: f64,
    pub pes: u32,
    /// RAM in MB.
    pub ram: u64,
    /// Bandwidth in Mbps.
    pub bw: u64,
    /// Storage in MB.
    pub storage: u64,
}

#[derive(Clone, Debug)]
pub struct VirtualMachine {
    pub id: u32,
    /// Owning user.
    pub owner: u32,
    pub member_id: u32,
    pub bot_id: Option<u32>,
    /// Job ID and task index of the task this VM was created for.
    pub job_id: Option<String>,
    pub task_index: Option<u64>,
    pub capacity: VmCapacity,
    pub submission_delay: f64,
    status: VmStatus,
    host: Option<u32>,
    creation_time: Option<f64>,
    stop_time: Option<f64>,
    allocation_attempts: u32,
    tasks: Vec<u32>,
    scheduler: TaskScheduler,
}

impl VirtualMachine {
    pub fn new(id: u32, owner: u32, member_id: u32, capacity: VmCapacity) -> Self {
        let scheduler = TaskScheduler::new(capacity.pes, capacity.mips);
        Self {
            id,
            owner,
            member_id,
            bot_id: None,
            job_id: None,
            task_index: None,
            capacity,
            submission_delay: 0.,
            status: VmStatus::Unplaced,
            host: None,
            creation_time: None,
            stop_time: None,
            allocation_attempts: 0,
            tasks: Vec::new(),
            scheduler,
        }
    }

    pub fn status(&self) -> VmStatus {
        self.status
    }

    /// Returns true if the VM is running on a host.
    pub fn is_created(&self) -> bool {
        self.status == VmStatus::Placed
    }

    pub fn host(&self) -> Option<u32> {
        self.host
    }

    pub fn creation_time(&self) -> Option<f64> {
        self.creation_time
    }

    pub fn stop_time(&self) -> Option<f64> {
        self.stop_time
    }

    pub fn allocation_attempts(&self) -> u32 {
        self.allocation_attempts
    }

    /// Returns IDs of tasks bound to this VM.
    pub fn tasks(&self) -> &[u32] {
        &self.tasks
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    pub(crate) fn scheduler_mut(&mut self) -> &mut TaskScheduler {
        &mut self.scheduler
    }

    pub fn total_mips(&self) -> f64 {
        self.capacity.mips * self.capacity.pes as f64
    }

    /// Returns true if this VM was created for the given task (same owner, job ID and task index).
    pub fn is_dedicated_to(&self, task: &Task) -> bool {
        self.owner == task.owner
            && self.job_id.is_some()
            && self.job_id == task.job_id
            && self.task_index == task.task_index
    }

    pub(crate) fn place_on(&mut self, host_id: u32) {
        self.host = Some(host_id);
        self.status = VmStatus::Placed;
    }

    pub(crate) fn set_creation_time(&mut self, time: f64) {
        self.creation_time = Some(time);
    }

    pub(crate) fn destroy(&mut self, time: f64) {
        self.status = VmStatus::Destroyed;
        self.stop_time = Some(time);
    }

    pub(crate) fn mark_failed(&mut self) {
        self.status = VmStatus::FailedToAllocate;
    }

    pub(crate) fn register_allocation_attempt(&mut self) -> u32 {
        self.allocation_attempts += 1;
        self.allocation_attempts
    }

    pub(crate) fn add_task(&mut self, task_id: u32) {
        if !self.tasks.contains(&task_id) {
            self.tasks.push(task_id);
        }
    }
}
