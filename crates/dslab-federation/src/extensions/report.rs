//! Run reports written as CSV tables.

use serde::Serialize;

use crate::simulation::FederatedSimulation;

#[derive(Clone, Debug, Serialize)]
pub struct TaskRow {
    pub member: String,
    pub user: String,
    pub job_id: Option<String>,
    pub task_index: Option<u64>,
    pub submission_delay: f64,
    pub task_id: u32,
    pub status: String,
    pub datacenter: Option<String>,
    pub host: Option<String>,
    pub vm: Option<u32>,
    pub length: f64,
    pub pes: u32,
    pub exec_start: Option<f64>,
    pub finish: Option<f64>,
    pub cpu_time: Option<f64>,
    pub vm_creation: Option<f64>,
    pub vm_destruction: Option<f64>,
    pub vm_lifetime: Option<f64>,
    /// VM lifetime divided by task CPU time.
    pub slowdown: Option<f64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct JobRow {
    pub member: String,
    pub user: String,
    pub job_id: String,
    pub task_count: u64,
    pub task_length: f64,
    /// Time to run all tasks one after another on a single PE.
    pub optimal_time: f64,
    pub job_start: f64,
    pub job_finish: Option<f64>,
    pub total_time: Option<f64>,
    pub average_task_time: Option<f64>,
    pub slowdown: Option<f64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DatacenterRow {
    pub member: String,
    pub datacenter: String,
    pub hosts: usize,
    pub pes_per_host: u32,
    pub average_cpu_utilization: f64,
    pub total_search_time: f64,
    pub vms_placed: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct TopologyRow {
    pub member: String,
    pub coordinates: String,
    pub datacenters: usize,
    pub hosts_per_datacenter: usize,
    pub users: usize,
    pub bots_per_user: u64,
}

pub fn task_rows(sim: &FederatedSimulation) -> Vec<TaskRow> {
    let state = sim.state();
    let state = state.borrow();
    let mut rows = Vec::new();
    for task in state.workload.tasks() {
        let vm = task.vm().and_then(|id| state.workload.vm(id));
        let host = vm.and_then(|vm| vm.host()).and_then(|h| state.pool.host(h));
        let vm_lifetime = vm.and_then(|vm| Some(vm.stop_time()? - vm.creation_time()?));
        let cpu_time = task.actual_cpu_time();
        let slowdown = match (vm_lifetime, cpu_time) {
            (Some(lifetime), Some(cpu)) if cpu > 0. => Some(lifetime / cpu),
            _ => None,
        };
        rows.push(TaskRow {
            member: state
                .federation
                .member(task.member_id)
                .map(|m| m.abbreviation.clone())
                .unwrap_or_default(),
            user: state.workload.user(task.owner).map(|u| u.name.clone()).unwrap_or_default(),
            job_id: task.job_id.clone(),
            task_index: task.task_index,
            submission_delay: task.submission_delay,
            task_id: task.id,
            status: task.status().to_string(),
            datacenter: task
                .datacenter()
                .and_then(|dc| state.pool.datacenter(dc))
                .map(|dc| dc.name.clone()),
            host: host.map(|h| h.name.clone()),
            vm: task.vm(),
            length: task.length,
            pes: task.pes,
            exec_start: task.exec_start_time(),
            finish: task.finish_time(),
            cpu_time,
            vm_creation: vm.and_then(|vm| vm.creation_time()),
            vm_destruction: vm.and_then(|vm| vm.stop_time()),
            vm_lifetime,
            slowdown,
        });
    }
    rows
}

pub fn job_rows(sim: &FederatedSimulation) -> Vec<JobRow> {
    let mips = sim.config().host.mips;
    let state = sim.state();
    let state = state.borrow();
    let mut rows = Vec::new();
    for bot in state.workload.bots() {
        let tasks: Vec<_> = bot.tasks().iter().filter_map(|t| state.workload.task(*t)).collect();
        let member_id = tasks.first().map(|t| t.member_id);
        let finished = !tasks.is_empty() && tasks.iter().all(|t| t.is_finished());
        let job_finish = if finished {
            tasks.iter().filter_map(|t| t.finish_time()).reduce(f64::max)
        } else {
            None
        };
        let job_start = bot.original.job_start_time;
        let total_time = job_finish.map(|finish| finish - job_start);
        let cpu_times: Vec<f64> = tasks.iter().filter_map(|t| t.actual_cpu_time()).collect();
        let average_task_time = if cpu_times.is_empty() {
            None
        } else {
            Some(cpu_times.iter().sum::<f64>() / cpu_times.len() as f64)
        };
        let optimal_time = bot.original.task_length * bot.original.task_count as f64 / mips;
        rows.push(JobRow {
            member: member_id
                .and_then(|m| state.federation.member(m))
                .map(|m| m.abbreviation.clone())
                .unwrap_or_default(),
            user: bot.original.user_id.clone(),
            job_id: bot.original.job_id.clone(),
            task_count: bot.original.task_count,
            task_length: bot.original.task_length,
            optimal_time,
            job_start,
            job_finish,
            total_time,
            average_task_time,
            slowdown: total_time.filter(|_| optimal_time > 0.).map(|t| t / optimal_time),
        });
    }
    rows
}

pub fn datacenter_rows(sim: &FederatedSimulation) -> Vec<DatacenterRow> {
    let pes_per_host = sim.config().host.pes;
    let mut rows = Vec::new();
    for datacenter_id in sim.datacenter_ids() {
        let datacenter = sim.datacenter(datacenter_id);
        let datacenter = datacenter.borrow();
        let state = sim.state();
        let state = state.borrow();
        let info = match state.pool.datacenter(datacenter_id) {
            Some(info) => info,
            None => continue,
        };
        let vms_placed = state
            .workload
            .vms()
            .filter(|vm| {
                vm.host()
                    .and_then(|h| state.pool.host(h))
                    .map_or(false, |h| h.datacenter_id == datacenter_id)
            })
            .count();
        rows.push(DatacenterRow {
            member: state
                .federation
                .member(info.owner)
                .map(|m| m.abbreviation.clone())
                .unwrap_or_default(),
            datacenter: info.name.clone(),
            hosts: info.hosts().len(),
            pes_per_host,
            average_cpu_utilization: datacenter.average_cpu_utilization(),
            total_search_time: datacenter.search_time_ledger().total(),
            vms_placed,
        });
    }
    rows
}

pub fn topology_rows(sim: &FederatedSimulation) -> Vec<TopologyRow> {
    let state = sim.state();
    let state = state.borrow();
    state
        .federation
        .members()
        .map(|member| TopologyRow {
            member: member.abbreviation.clone(),
            coordinates: member.coordinates.to_string(),
            datacenters: member.datacenters().len(),
            hosts_per_datacenter: member
                .datacenters()
                .first()
                .and_then(|dc| state.pool.datacenter(*dc))
                .map_or(0, |dc| dc.hosts().len()),
            users: member.users().len(),
            bots_per_user: member.bots_per_user(),
        })
        .collect()
}

pub fn write_csv<T: Serialize>(path: &str, rows: &[T]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes task, job, datacenter and topology tables of the run to `dir`, file names start with `prefix`.
pub fn write_reports(sim: &FederatedSimulation, dir: &str, prefix: &str) -> Result<(), csv::Error> {
    write_csv(&format!("{}/{}_tasks.csv", dir, prefix), &task_rows(sim))?;
    write_csv(&format!("{}/{}_jobs.csv", dir, prefix), &job_rows(sim))?;
    write_csv(&format!("{}/{}_datacenters.csv", dir, prefix), &datacenter_rows(sim))?;
    write_csv(&format!("{}/{}_topology.csv", dir, prefix), &topology_rows(sim))?;
    Ok(())
}

