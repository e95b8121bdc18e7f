use std::time::Instant;

use clap::Parser;
use indexmap::IndexMap;

use dslab_core::log_info;
use dslab_federation::core::config::FederationConfig;
use dslab_federation::experiment::{summary_to_map, Experiment, ExecutionPlan, SimulationCallbacks, DEFAULT_POLICIES};
use dslab_federation::extensions::bot_trace_reader::BotTraceReader;
use dslab_federation::simulation::FederatedSimulation;

fn init_logger() {
    use env_logger::Builder;
    use std::io::Write;
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to federation config
    #[clap(short, long)]
    config: String,

    /// Path to bag-of-tasks trace (overrides the trace from config)
    #[clap(long)]
    trace: Option<String>,

    /// Directory for results and per-run reports
    #[clap(short, long)]
    output: Option<String>,

    /// Comma-separated allocation policies to compare
    #[clap(short, long)]
    policies: Option<String>,

    /// Number of threads to use (default - use all available cores)
    #[clap(short, long, default_value_t = std::thread::available_parallelism().unwrap().get())]
    threads: usize,
}

#[derive(Clone)]
struct ProgressCallbacks {
    step: u64,
}

impl ProgressCallbacks {
    fn new() -> Self {
        Self { step: 0 }
    }
}

impl SimulationCallbacks for ProgressCallbacks {
    fn on_simulation_start(&mut self, _sim: &mut FederatedSimulation) {
        self.step = 0;
    }

    fn on_step(&mut self, sim: &mut FederatedSimulation) -> bool {
        self.step += 1;
        if self.step % 100000 == 0 {
            let summary = sim.summary();
            log_info!(
                sim.context(),
                "Step = {}, finished tasks = {}, failed tasks = {}",
                self.step,
                summary.finished_tasks,
                summary.failed_tasks
            );
        }
        true
    }

    fn on_simulation_finish(&mut self, sim: &mut FederatedSimulation) -> IndexMap<String, String> {
        let summary = sim.summary();
        log_info!(
            sim.context(),
            "Finished after {} steps, makespan = {:.2}",
            self.step,
            summary.makespan
        );
        summary_to_map(&summary)
    }
}

fn main() {
    init_logger();

    let args = Args::parse();
    let simulation_start = Instant::now();

    let config = FederationConfig::from_file(&args.config);
    let trace_path = args
        .trace
        .clone()
        .or_else(|| config.trace.as_ref().map(|t| t.path.clone()))
        .unwrap_or_else(|| panic!("Trace is set neither in {} nor with --trace", args.config));
    let trace = BotTraceReader::new(Some(config.trace_line_limit()))
        .parse_file(&trace_path)
        .unwrap_or_else(|e| panic!("Can't read trace {}: {}", trace_path, e));

    let plans: Vec<ExecutionPlan> = match &args.policies {
        Some(policies) => policies.split(',').map(|p| ExecutionPlan::new(p.trim())).collect(),
        None => DEFAULT_POLICIES.iter().map(|p| ExecutionPlan::new(p)).collect(),
    };

    let mut experiment = Experiment::new(
        config,
        trace,
        plans,
        Box::new(ProgressCallbacks::new()),
        args.output.clone(),
    );
    for run in experiment.run(args.threads) {
        println!("\nRUN {}: {}", run.id, run.plan.name);
        for (key, value) in run.results {
            println!("  {} = {}", key, value);
        }
    }

    println!("Simulation process time {:.2?}", simulation_start.elapsed());
}
