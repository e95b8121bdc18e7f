//! Bags of tasks.

use serde::{Deserialize, Serialize};

/// Bag of tasks as recorded in a workload trace.
///
/// Times are in seconds, disk and RAM usage are fractions of host capacity.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BagOfTasks {
    pub user_id: String,
    pub job_id: String,
    pub task_count: u64,
    /// Length of each task in MI.
    pub task_length: f64,
    pub task_time: f64,
    pub task_disk_usage: f64,
    pub task_ram_usage: f64,
    pub average_task_cpu: f64,
    pub task_cores: f64,
    pub scheduling_class: u64,
    pub job_creation_time: f64,
    pub job_start_time: f64,
    pub job_end_time: f64,
    pub execution_attempts: u64,
}

/// Bag of tasks bound to a federation user, with the tasks and VMs created for it.
#[derive(Clone, Debug)]
pub struct ConvertedBot {
    pub id: u32,
    /// Owning user.
    pub owner: u32,
    pub original: BagOfTasks,
    tasks: Vec<u32>,
    vms: Vec<u32>,
}

impl ConvertedBot {
    pub fn new(id: u32, owner: u32, original: BagOfTasks) -> Self {
        Self {
            id,
            owner,
            original,
            tasks: Vec::new(),
            vms: Vec::new(),
        }
    }

    /// Returns IDs of materialized tasks ordered by task index.
    pub fn tasks(&self) -> &[u32] {
        &self.tasks
    }

    pub fn vms(&self) -> &[u32] {
        &self.vms
    }

    pub(crate) fn add_task(&mut self, task_id: u32) {
        self.tasks.push(task_id);
    }

    pub(crate) fn add_vm(&mut self, vm_id: u32) {
        self.vms.push(vm_id);
    }
}
