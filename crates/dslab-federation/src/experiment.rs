//! Tools for comparing allocation policies over multiple simulation runs.

use std::fs;
use std::fs::File;
use std::sync::{Arc, Mutex};

use dyn_clone::{clone_trait_object, DynClone};
use indexmap::map::IndexMap;
use serde::Serialize;
use threadpool::ThreadPool;

use dslab_core::simulation::Simulation;

use crate::core::bot::BagOfTasks;
use crate::core::config::FederationConfig;
use crate::extensions::report::write_reports;
use crate::simulation::{FederatedSimulation, RunSummary};

/// Allocation policies compared by default.
pub const DEFAULT_POLICIES: [&str; 7] = [
    "FirstFit",
    "BestFit",
    "WorstFit",
    "DualLayerRoundRobin",
    "SingleLayerRoundRobin",
    "LocalFirstRandom",
    "Random",
];

/// Named allocation policy applied to every datacenter of a run.
#[derive(Clone, Debug, Serialize)]
pub struct ExecutionPlan {
    pub name: String,
    pub allocation_policy: String,
}

impl ExecutionPlan {
    pub fn new(allocation_policy: &str) -> Self {
        Self {
            name: allocation_policy.to_string(),
            allocation_policy: allocation_policy.to_string(),
        }
    }
}

/// Trait for implementing custom callbacks for simulation runs within an experiment.
pub trait SimulationCallbacks: DynClone + Send {
    /// Runs before starting a simulation run.
    fn on_simulation_start(&mut self, _sim: &mut FederatedSimulation) {}

    /// Runs on each step of a simulation run, returns false if the simulation must be stopped.
    fn on_step(&mut self, _sim: &mut FederatedSimulation) -> bool {
        true
    }

    /// Runs upon the completion of a simulation run, returns results of this run.
    fn on_simulation_finish(&mut self, sim: &mut FederatedSimulation) -> IndexMap<String, String> {
        summary_to_map(&sim.summary())
    }
}

clone_trait_object!(SimulationCallbacks);

/// Callbacks reporting the run summary.
#[derive(Clone)]
pub struct SummaryCallbacks;

impl SimulationCallbacks for SummaryCallbacks {}

pub fn summary_to_map(summary: &RunSummary) -> IndexMap<String, String> {
    let mut map = IndexMap::new();
    map.insert("finished_tasks".to_string(), summary.finished_tasks.to_string());
    map.insert("failed_tasks".to_string(), summary.failed_tasks.to_string());
    map.insert("never_placed_tasks".to_string(), summary.never_placed_tasks.to_string());
    map.insert("unfinished_tasks".to_string(), summary.unfinished_tasks.to_string());
    map.insert("vms_placed".to_string(), summary.vms_placed.to_string());
    map.insert("vms_failed".to_string(), summary.vms_failed.to_string());
    map.insert("makespan".to_string(), format!("{:.3}", summary.makespan));
    map.insert("mean_search_time".to_string(), format!("{:.6}", summary.mean_search_time));
    map.insert(
        "mean_datacenter_cpu_utilization".to_string(),
        format!("{:.4}", summary.mean_datacenter_cpu_utilization),
    );
    map
}

#[derive(Clone, Debug, Serialize)]
pub struct ExperimentRun {
    pub id: usize,
    pub plan: ExecutionPlan,
    pub results: IndexMap<String, String>,
}

/// Runs the same federation and trace once per execution plan.
pub struct Experiment {
    pub config: FederationConfig,
    pub trace: Arc<Vec<BagOfTasks>>,
    pub plans: Vec<ExecutionPlan>,
    pub callbacks: Box<dyn SimulationCallbacks>,
    pub output_dir: Option<String>,
}

impl Experiment {
    pub fn new(
        config: FederationConfig,
        trace: Vec<BagOfTasks>,
        plans: Vec<ExecutionPlan>,
        callbacks: Box<dyn SimulationCallbacks>,
        output_dir: Option<String>,
    ) -> Self {
        if let Some(dir) = output_dir.clone() {
            fs::create_dir_all(&dir).unwrap_or_else(|e| panic!("Can't create directory {}: {}", dir, e));
        }
        Self {
            config,
            trace: Arc::new(trace),
            plans,
            callbacks,
            output_dir,
        }
    }

    /// Runs the experiment using the specified number of threads, returns runs ordered by ID.
    pub fn run(&mut self, num_threads: usize) -> Vec<ExperimentRun> {
        let results = Arc::new(Mutex::new(Vec::new()));
        let pool = ThreadPool::new(num_threads.max(1));

        for (run_id, plan) in self.plans.iter().enumerate() {
            let run_id = run_id + 1;
            let mut config = self.config.clone();
            config.allocation_policy = plan.allocation_policy.clone();
            for member in config.members.iter_mut() {
                member.allocation_policy = None;
            }
            let plan = plan.clone();
            let trace = self.trace.clone();
            let mut callbacks = self.callbacks.clone();
            let output_dir = self.output_dir.clone();
            let results = results.clone();

            pool.execute(move || {
                println!("RUN {}: {}", run_id, plan.name);
                let run_results = run_simulation(&plan, config, &trace, &mut callbacks, output_dir);
                results.lock().unwrap().push(ExperimentRun {
                    id: run_id,
                    plan,
                    results: run_results,
                });
            });
        }

        pool.join();
        let mut results = Arc::try_unwrap(results)
            .unwrap_or_else(|_| panic!("Experiment runs are still holding results"))
            .into_inner()
            .unwrap_or_else(|_| panic!("Experiment run panicked"));
        results.sort_by_key(|run| run.id);

        if let Some(dir) = self.output_dir.clone() {
            let path = format!("{}/results.json", dir);
            let mut file = File::create(&path).unwrap_or_else(|e| panic!("Can't create file {}: {}", path, e));
            serde_json::to_writer_pretty(&mut file, &results)
                .unwrap_or_else(|e| panic!("Can't write results to {}: {}", path, e));
        }
        results
    }
}

fn run_simulation(
    plan: &ExecutionPlan,
    config: FederationConfig,
    trace: &[BagOfTasks],
    callbacks: &mut Box<dyn SimulationCallbacks>,
    output_dir: Option<String>,
) -> IndexMap<String, String> {
    let sim = Simulation::new(config.seed);
    let mut fed_sim = FederatedSimulation::from_config(sim, config, trace);
    callbacks.on_simulation_start(&mut fed_sim);

    while fed_sim.step() {
        if !callbacks.on_step(&mut fed_sim) {
            break;
        }
    }

    if let Some(dir) = output_dir {
        if let Err(e) = write_reports(&fed_sim, &dir, &plan.name) {
            println!("Error while saving reports for {}: {}", plan.name, e);
        }
    }

    callbacks.on_simulation_finish(&mut fed_sim)
}
