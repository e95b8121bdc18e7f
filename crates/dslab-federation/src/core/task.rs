//! Tasks executed on VMs.

use std::fmt::{Display, Formatter};

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TaskStatus {
    Created,
    Queued,
    InExecution,
    Finished,
    Failed,
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            TaskStatus::Created => write!(f, "created"),
            TaskStatus::Queued => write!(f, "queued"),
            TaskStatus::InExecution => write!(f, "in_execution"),
            TaskStatus::Finished => write!(f, "finished"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Unit of work with CPU length demand, executed on exactly one VM.
#[derive(Clone, Debug, Serialize)]
pub struct Task {
    pub id: u32,
    /// Owning user.
    pub owner: u32,
    pub member_id: u32,
    pub bot_id: Option<u32>,
    pub job_id: Option<String>,
    pub task_index: Option<u64>,
    /// Length in MI.
    pub length: f64,
    pub pes: u32,
    pub ram_utilization: f64,
    /// Input file size in MB.
    pub file_size: f64,
    pub submission_delay: f64,
    status: TaskStatus,
    vm: Option<u32>,
    datacenter: Option<u32>,
    exec_start_time: Option<f64>,
    finish_time: Option<f64>,
}

impl Task {
    pub fn new(id: u32, owner: u32, member_id: u32, length: f64, pes: u32) -> Self {
        Self {
            id,
            owner,
            member_id,
            bot_id: None,
            job_id: None,
            task_index: None,
            length,
            pes,
            ram_utilization: 1.,
            file_size: 0.,
            submission_delay: 0.,
            status: TaskStatus::Created,
            vm: None,
            datacenter: None,
            exec_start_time: None,
            finish_time: None,
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
    }

    pub fn is_finished(&self) -> bool {
        self.status == TaskStatus::Finished
    }

    /// Returns the VM this task is bound to.
    pub fn vm(&self) -> Option<u32> {
        self.vm
    }

    /// Binds task to VM. A bound task keeps its VM.
    pub(crate) fn bind_vm(&mut self, vm_id: u32) -> bool {
        if self.vm.is_some() {
            return false;
        }
        self.vm = Some(vm_id);
        true
    }

    pub fn datacenter(&self) -> Option<u32> {
        self.datacenter
    }

    pub(crate) fn set_datacenter(&mut self, datacenter_id: u32) {
        self.datacenter = Some(datacenter_id);
    }

    pub fn exec_start_time(&self) -> Option<f64> {
        self.exec_start_time
    }

    pub(crate) fn set_exec_start_time(&mut self, time: f64) {
        self.exec_start_time = Some(time);
    }

    pub fn finish_time(&self) -> Option<f64> {
        self.finish_time
    }

    pub(crate) fn set_finish_time(&mut self, time: f64) {
        self.finish_time = Some(time);
    }

    /// Time between the start of execution and completion.
    pub fn actual_cpu_time(&self) -> Option<f64> {
        Some(self.finish_time? - self.exec_start_time?)
    }

    /// True if the task failed before it was ever bound to a VM.
    pub fn is_never_placed(&self) -> bool {
        self.status == TaskStatus::Failed && self.vm.is_none()
    }
}
