//! Users, bags of tasks, tasks and VMs of the federation.

use std::collections::BTreeMap;

use crate::core::bot::{BagOfTasks, ConvertedBot};
use crate::core::config::HostConfig;
use crate::core::task::Task;
use crate::core::user::User;
use crate::core::vm::{VirtualMachine, VmCapacity};

/// Size in MB added to every task input file.
const BASE_FILE_SIZE: f64 = 1.;

/// Store of the submitted workload, keyed by IDs assigned at creation.
#[derive(Default)]
pub struct Workload {
    users: BTreeMap<u32, User>,
    bots: BTreeMap<u32, ConvertedBot>,
    tasks: BTreeMap<u32, Task>,
    vms: BTreeMap<u32, VirtualMachine>,
    next_user_id: u32,
    next_bot_id: u32,
    next_task_id: u32,
    next_vm_id: u32,
}

impl Workload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&mut self, member_id: u32, local_id: u32, member_abbreviation: &str) -> u32 {
        let id = self.next_user_id;
        self.next_user_id += 1;
        self.users
            .insert(id, User::new(id, member_id, local_id, member_abbreviation));
        id
    }

    pub fn create_task(&mut self, owner: u32, member_id: u32, length: f64, pes: u32) -> u32 {
        let id = self.next_task_id;
        self.next_task_id += 1;
        self.tasks.insert(id, Task::new(id, owner, member_id, length, pes));
        id
    }

    pub fn create_vm(&mut self, owner: u32, member_id: u32, capacity: VmCapacity) -> u32 {
        let id = self.next_vm_id;
        self.next_vm_id += 1;
        self.vms
            .insert(id, VirtualMachine::new(id, owner, member_id, capacity));
        id
    }

    /// Converts bag of tasks into tasks of the given user, one task per bag entry.
    ///
    /// Task file size and RAM utilization are derived from the bag's disk and RAM fractions of the host capacity.
    pub fn materialize_bot(&mut self, owner: u32, bag: BagOfTasks, host: &HostConfig) -> u32 {
        let member_id = self
            .users
            .get(&owner)
            .unwrap_or_else(|| panic!("User {} is not registered", owner))
            .member_id;
        let bot_id = self.next_bot_id;
        self.next_bot_id += 1;

        let mut converted = ConvertedBot::new(bot_id, owner, bag.clone());
        for index in 0..bag.task_count {
            let task_id = self.next_task_id;
            self.next_task_id += 1;
            let mut task = Task::new(task_id, owner, member_id, bag.task_length, 1);
            task.bot_id = Some(bot_id);
            task.job_id = Some(bag.job_id.clone());
            task.task_index = Some(index);
            task.ram_utilization = bag.task_ram_usage.clamp(0., 1.);
            task.file_size = bag.task_disk_usage * host.storage as f64 + BASE_FILE_SIZE;
            task.submission_delay = bag.job_start_time;
            self.tasks.insert(task_id, task);
            converted.add_task(task_id);
        }
        self.bots.insert(bot_id, converted);
        if let Some(user) = self.users.get_mut(&owner) {
            user.add_bot(bot_id);
        }
        bot_id
    }

    /// Creates one VM per task of the bag, each one dedicated to its task.
    pub fn spawn_dedicated_vms(&mut self, bot_id: u32, host: &HostConfig) -> Vec<u32> {
        let task_ids = self
            .bots
            .get(&bot_id)
            .unwrap_or_else(|| panic!("Bag of tasks {} is not registered", bot_id))
            .tasks()
            .to_vec();
        let ram_fraction = self.bots[&bot_id].original.task_ram_usage;
        let pes = host.pes.max(1) as u64;

        let mut vm_ids = Vec::with_capacity(task_ids.len());
        for task_id in task_ids {
            let task = self.tasks[&task_id].clone();
            let capacity = VmCapacity {
                mips: host.mips,
                pes: 1,
                ram: (host.ram / 4).min((ram_fraction.max(0.) * host.ram as f64) as u64),
                bw: host.bw / pes,
                storage: host.storage / pes,
            };
            let vm_id = self.next_vm_id;
            self.next_vm_id += 1;
            let mut vm = VirtualMachine::new(vm_id, task.owner, task.member_id, capacity);
            vm.bot_id = Some(bot_id);
            vm.job_id = task.job_id.clone();
            vm.task_index = task.task_index;
            vm.submission_delay = task.submission_delay;
            self.vms.insert(vm_id, vm);
            if let Some(bot) = self.bots.get_mut(&bot_id) {
                bot.add_vm(vm_id);
            }
            vm_ids.push(vm_id);
        }
        vm_ids
    }

    pub fn user(&self, user_id: u32) -> Option<&User> {
        self.users.get(&user_id)
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    pub fn bot(&self, bot_id: u32) -> Option<&ConvertedBot> {
        self.bots.get(&bot_id)
    }

    pub fn bots(&self) -> impl Iterator<Item = &ConvertedBot> {
        self.bots.values()
    }

    pub fn task(&self, task_id: u32) -> Option<&Task> {
        self.tasks.get(&task_id)
    }

    pub(crate) fn task_mut(&mut self, task_id: u32) -> Option<&mut Task> {
        self.tasks.get_mut(&task_id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn vm(&self, vm_id: u32) -> Option<&VirtualMachine> {
        self.vms.get(&vm_id)
    }

    pub(crate) fn vm_mut(&mut self, vm_id: u32) -> Option<&mut VirtualMachine> {
        self.vms.get_mut(&vm_id)
    }

    pub fn vms(&self) -> impl Iterator<Item = &VirtualMachine> {
        self.vms.values()
    }
}
