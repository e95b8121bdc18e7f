mod common;
use common::assert_float_eq;

use dslab_core::simulation::Simulation;

use dslab_federation::core::allocation_policy::allocation_policy_resolver;
use dslab_federation::core::bot::BagOfTasks;
use dslab_federation::core::config::FederationConfig;
use dslab_federation::core::eligibility::SharedVmMatcher;
use dslab_federation::core::latency::Coordinates;
use dslab_federation::core::task::TaskStatus;
use dslab_federation::core::vm::{VmCapacity, VmStatus};
use dslab_federation::simulation::FederatedSimulation;

/// Creates members at the given longitudes on the equator, each with one datacenter of `hosts` hosts.
/// Returns member and datacenter IDs.
fn build(sim: &mut FederatedSimulation, longitudes: &[f64], hosts: u32) -> Vec<(u32, u32)> {
    let host_config = sim.config().host.clone();
    let policy = sim.config().allocation_policy.clone();
    let mut result = Vec::new();
    for (i, longitude) in longitudes.iter().enumerate() {
        let abbreviation = format!("M{}", i);
        let member = sim.add_member(&abbreviation, &abbreviation, Coordinates::new(0., *longitude));
        let dc_name = format!("{}_dc_0", abbreviation);
        let dc = sim.add_datacenter(member, &dc_name, allocation_policy_resolver(&policy));
        for j in 0..hosts {
            sim.add_host(dc, &format!("{}_host_{}", dc_name, j), &host_config);
        }
        result.push((member, dc));
    }
    result
}

/// Bag of tasks running 10 seconds each on a 3450 MIPS PE.
fn bag(job_id: &str, task_count: u64, start: f64) -> BagOfTasks {
    BagOfTasks {
        user_id: "u1".to_string(),
        job_id: job_id.to_string(),
        task_count,
        task_length: 34500.,
        task_ram_usage: 0.1,
        job_start_time: start,
        ..Default::default()
    }
}

#[test]
fn test_bag_of_tasks_lifecycle() {
    let mut sim = FederatedSimulation::new(Simulation::new(123), FederationConfig::default());
    let ids = build(&mut sim, &[0.], 1);
    let (member, dc) = ids[0];
    let user = sim.create_user(member);
    let bot = sim.submit_bot(user, bag("job", 2, 0.));
    sim.step_until_no_events();

    let state = sim.state();
    let state = state.borrow();
    let converted = state.workload.bot(bot).unwrap();
    assert_eq!(converted.vms().len(), 2);
    for task_id in converted.tasks() {
        let task = state.workload.task(*task_id).unwrap();
        assert_eq!(task.status(), TaskStatus::Finished);
        assert_eq!(task.datacenter(), Some(dc));
        assert_float_eq(task.exec_start_time().unwrap(), 0., 1e-9);
        assert_float_eq(task.finish_time().unwrap(), 10., 1e-6);
        assert_float_eq(task.actual_cpu_time().unwrap(), 10., 1e-6);

        let vm = state.workload.vm(task.vm().unwrap()).unwrap();
        assert!(vm.is_dedicated_to(task));
        assert_eq!(vm.status(), VmStatus::Destroyed);
        assert_float_eq(vm.stop_time().unwrap(), 10., 1e-6);
    }
    let host = state.pool.hosts_of(&[dc])[0];
    let host = state.pool.host(host).unwrap();
    assert_eq!(host.free_pes(), 4);
    assert!(!host.is_active());
    drop(state);

    let broker = sim.broker(member);
    assert_eq!(broker.borrow().finished_tasks().len(), 2);
    assert!(broker.borrow().waiting_tasks().is_empty());
    assert!(broker.borrow().failed_tasks().is_empty());

    let summary = sim.summary();
    assert_eq!(summary.finished_tasks, 2);
    assert_eq!(summary.failed_tasks, 0);
    assert_eq!(summary.vms_placed, 2);
    assert_float_eq(summary.makespan, 10., 1e-6);
    assert_eq!(summary.mean_search_time, 0.);
}

#[test]
fn test_submission_delay_and_transfer_time() {
    let mut config = FederationConfig::default();
    config.storage_read_rate = Some(100.);
    let mut sim = FederatedSimulation::new(Simulation::new(123), config);
    let ids = build(&mut sim, &[0.], 1);
    let user = sim.create_user(ids[0].0);
    let bot = sim.submit_bot(user, bag("job", 1, 5.));
    sim.step_until_no_events();

    let state = sim.state();
    let state = state.borrow();
    let task = state.workload.task(state.workload.bot(bot).unwrap().tasks()[0]).unwrap();
    // 1 MB input file read at 100 MB/s
    assert_float_eq(task.exec_start_time().unwrap(), 5.01, 1e-6);
    assert_float_eq(task.finish_time().unwrap(), 15.01, 1e-6);
    let vm = state.workload.vm(task.vm().unwrap()).unwrap();
    assert_float_eq(vm.creation_time().unwrap(), 5., 1e-9);
}

#[test]
// The owner has 4 PEs, the remaining two dedicated VMs go to the other member.
fn test_overflow_to_other_member() {
    let mut sim = FederatedSimulation::new(Simulation::new(123), FederationConfig::default());
    let ids = build(&mut sim, &[0., 10.], 1);
    let (owner, owner_dc) = ids[0];
    let (other, other_dc) = ids[1];
    let user = sim.create_user(owner);
    let bot = sim.submit_bot(user, bag("job", 6, 0.));
    sim.step_until_no_events();

    let latency = sim.state().borrow().federation.latency_between(owner, other).unwrap();
    let state = sim.state();
    let state = state.borrow();
    let tasks = state.workload.bot(bot).unwrap().tasks().to_vec();
    let placed_at: Vec<u32> = tasks
        .iter()
        .map(|t| state.workload.task(*t).unwrap().datacenter().unwrap())
        .collect();
    assert_eq!(placed_at, vec![owner_dc, owner_dc, owner_dc, owner_dc, other_dc, other_dc]);
    assert!(tasks.iter().all(|t| state.workload.task(*t).unwrap().is_finished()));
    drop(state);

    // every VM of the owner is requested from its own datacenter
    let datacenter = sim.datacenter(owner_dc);
    let ledger = datacenter.borrow().search_time_ledger().clone();
    assert_eq!(ledger.len(), 6);
    assert_float_eq(ledger.total(), 2. * latency, 1e-12);
    assert!(sim.datacenter(other_dc).borrow().search_time_ledger().is_empty());

    let summary = sim.summary();
    assert_eq!(summary.finished_tasks, 6);
    assert_float_eq(summary.mean_search_time, 2. * latency / 6., 1e-12);
}

#[test]
// Fifth VM does not fit until the first tasks finish and their VMs are destroyed.
fn test_failed_placement_is_retried() {
    let mut sim = FederatedSimulation::new(Simulation::new(123), FederationConfig::default());
    let ids = build(&mut sim, &[0.], 1);
    let user = sim.create_user(ids[0].0);
    let bot = sim.submit_bot(user, bag("job", 5, 0.));
    sim.step_until_no_events();

    let state = sim.state();
    let state = state.borrow();
    let last_vm = *state.workload.bot(bot).unwrap().vms().last().unwrap();
    let vm = state.workload.vm(last_vm).unwrap();
    assert!(vm.allocation_attempts() >= 2);
    let created = vm.creation_time().unwrap();
    assert!((10. ..10.001).contains(&created), "created at {}", created);
    assert!(state.federation.next_retry_at() >= 10.);
    drop(state);

    let summary = sim.summary();
    assert_eq!(summary.finished_tasks, 5);
    assert_eq!(summary.vms_placed, 5);
    assert!(summary.makespan >= 20. && summary.makespan < 20.001);
}

#[test]
// The fifth VM waits for the destruction of an idle VM instead of exhausting its attempts.
fn test_retry_waits_for_vm_destruction() {
    let mut config = FederationConfig::default();
    config.vm_destruction_delay = 1.;
    let mut sim = FederatedSimulation::new(Simulation::new(123), config);
    let ids = build(&mut sim, &[0.], 1);
    let user = sim.create_user(ids[0].0);
    let bot = sim.submit_bot(user, bag("job", 5, 0.));
    let last_vm = *sim.state().borrow().workload.bot(bot).unwrap().vms().last().unwrap();

    sim.step_for_duration(10.5);
    {
        let state = sim.state();
        let state = state.borrow();
        assert_eq!(state.workload.vm(last_vm).unwrap().status(), VmStatus::Unplaced);
        let destruction = state.next_destruction_time().unwrap();
        assert!((11. ..11.001).contains(&destruction), "destruction at {}", destruction);
    }

    sim.step_until_no_events();
    let state = sim.state();
    let state = state.borrow();
    assert!(state.next_destruction_time().is_none());
    let vm = state.workload.vm(last_vm).unwrap();
    assert_eq!(vm.status(), VmStatus::Destroyed);
    assert!(vm.allocation_attempts() < 100);
    let created = vm.creation_time().unwrap();
    assert!((11. ..11.001).contains(&created), "created at {}", created);
    drop(state);

    let summary = sim.summary();
    assert_eq!(summary.finished_tasks, 5);
    assert_eq!(summary.vms_failed, 0);
    assert!(summary.makespan >= 21. && summary.makespan < 21.001);
}

#[test]
fn test_vm_fails_after_max_attempts() {
    let mut config = FederationConfig::default();
    config.max_allocation_attempts = 3;
    let mut sim = FederatedSimulation::new(Simulation::new(123), config);
    let ids = build(&mut sim, &[0.], 0);
    let member = ids[0].0;
    let user = sim.create_user(member);
    let bot = sim.submit_bot(user, bag("job", 1, 0.));
    sim.step_until_no_events();

    let state = sim.state();
    let state = state.borrow();
    let converted = state.workload.bot(bot).unwrap();
    let vm = state.workload.vm(converted.vms()[0]).unwrap();
    assert_eq!(vm.status(), VmStatus::FailedToAllocate);
    assert_eq!(vm.allocation_attempts(), 3);
    let task = state.workload.task(converted.tasks()[0]).unwrap();
    assert_eq!(task.status(), TaskStatus::Failed);
    assert!(task.is_never_placed());
    drop(state);

    assert_eq!(sim.broker(member).borrow().failed_tasks(), vec![task_id_of(&sim, bot)]);
    let summary = sim.summary();
    assert_eq!(summary.failed_tasks, 1);
    assert_eq!(summary.never_placed_tasks, 1);
    assert_eq!(summary.vms_failed, 1);
    assert_eq!(summary.vms_placed, 0);
}

fn task_id_of(sim: &FederatedSimulation, bot: u32) -> u32 {
    sim.state().borrow().workload.bot(bot).unwrap().tasks()[0]
}

#[test]
// A task arriving after its VM has failed is failed right away.
fn test_task_of_failed_vm() {
    let mut config = FederationConfig::default();
    config.max_allocation_attempts = 1;
    let mut sim = FederatedSimulation::new(Simulation::new(123), config);
    let ids = build(&mut sim, &[0.], 0);
    let member = ids[0].0;
    let user = sim.create_user(member);

    let bot = {
        let state = sim.state();
        let mut state = state.borrow_mut();
        let host = sim.config().host.clone();
        let bot = state.workload.materialize_bot(user, bag("job", 1, 0.), &host);
        state.workload.spawn_dedicated_vms(bot, &host);
        bot
    };
    let (vms, tasks) = {
        let state = sim.state();
        let state = state.borrow();
        let converted = state.workload.bot(bot).unwrap();
        (converted.vms().to_vec(), converted.tasks().to_vec())
    };
    sim.submit_vms(&vms);
    sim.step_until_no_events();
    assert_eq!(
        sim.state().borrow().workload.vm(vms[0]).unwrap().status(),
        VmStatus::FailedToAllocate
    );

    sim.submit_tasks(&tasks);
    sim.step_until_no_events();
    assert_eq!(sim.broker(member).borrow().failed_tasks(), tasks);
    assert!(sim.state().borrow().workload.task(tasks[0]).unwrap().is_never_placed());
}

#[test]
fn test_task_binding_is_sticky() {
    let mut sim = FederatedSimulation::new(Simulation::new(123), FederationConfig::default());
    let ids = build(&mut sim, &[0.], 1);
    let member = ids[0].0;
    let user = sim.create_user(member);
    let bot = sim.submit_bot(user, bag("job", 1, 0.));
    sim.step_until_no_events();

    let task_id = task_id_of(&sim, bot);
    let vm_id = sim.state().borrow().workload.task(task_id).unwrap().vm().unwrap();
    let broker = sim.broker(member);
    // the VM is destroyed by now, but the binding is kept
    assert_eq!(broker.borrow_mut().map_task_to_vm(task_id), Some(vm_id));
    assert_eq!(broker.borrow_mut().map_task_to_vm(task_id), Some(vm_id));
}

#[test]
fn test_task_without_eligible_vm_stays_unbound() {
    let mut sim = FederatedSimulation::new(Simulation::new(123), FederationConfig::default());
    let ids = build(&mut sim, &[0.], 1);
    let member = ids[0].0;
    let user = sim.create_user(member);
    let task = sim.create_task(user, 1000., 1);
    assert_eq!(sim.broker(member).borrow_mut().map_task_to_vm(task), None);
    assert_eq!(sim.state().borrow().workload.task(task).unwrap().vm(), None);
}

#[test]
fn test_map_vm_to_datacenter() {
    let mut sim = FederatedSimulation::new(Simulation::new(123), FederationConfig::default());
    let ids = build(&mut sim, &[0., 10.], 1);
    let (owner, owner_dc) = ids[0];
    let other = sim.add_member("NODC", "NODC", Coordinates::new(0., 20.));
    let capacity = VmCapacity {
        mips: 1000.,
        pes: 1,
        ram: 1,
        bw: 1,
        storage: 1,
    };

    let owner_user = sim.create_user(owner);
    let vm = sim.create_vm(owner_user, capacity.clone());
    assert_eq!(sim.broker(owner).borrow().map_vm_to_datacenter(vm), Some(owner_dc));

    // member without datacenters uses the first datacenter of another member
    let other_user = sim.create_user(other);
    let vm = sim.create_vm(other_user, capacity);
    assert_eq!(sim.broker(other).borrow().map_vm_to_datacenter(vm), Some(owner_dc));
    assert_eq!(sim.broker(other).borrow().map_vm_to_datacenter(999), None);
}

#[test]
fn test_no_datacenter_for_vm() {
    let mut config = FederationConfig::default();
    config.max_allocation_attempts = 2;
    let mut sim = FederatedSimulation::new(Simulation::new(123), config);
    let member = sim.add_member("A", "A", Coordinates::new(0., 0.));
    let user = sim.create_user(member);
    let vm = sim.create_vm(
        user,
        VmCapacity {
            mips: 1000.,
            pes: 1,
            ram: 1,
            bw: 1,
            storage: 1,
        },
    );
    assert_eq!(sim.broker(member).borrow().map_vm_to_datacenter(vm), None);
    sim.submit_vms(&[vm]);
    sim.step_until_no_events();
    assert_eq!(
        sim.state().borrow().workload.vm(vm).unwrap().status(),
        VmStatus::FailedToAllocate
    );
}

#[test]
// Two tasks share one 2-PE VM of their owner.
fn test_shared_vm_matcher() {
    let mut sim = FederatedSimulation::new(Simulation::new(123), FederationConfig::default());
    let ids = build(&mut sim, &[0.], 1);
    let member = ids[0].0;
    sim.broker(member)
        .borrow_mut()
        .set_task_vm_matcher(Box::new(SharedVmMatcher::new()));
    let user = sim.create_user(member);
    let vm = sim.create_vm(
        user,
        VmCapacity {
            mips: 3450.,
            pes: 2,
            ram: 1024,
            bw: 100,
            storage: 100,
        },
    );
    let tasks = vec![sim.create_task(user, 34500., 1), sim.create_task(user, 34500., 1)];
    sim.submit_vms(&[vm]);
    sim.submit_tasks(&tasks);
    sim.step_until_no_events();

    let state = sim.state();
    let state = state.borrow();
    for task_id in &tasks {
        let task = state.workload.task(*task_id).unwrap();
        assert_eq!(task.vm(), Some(vm));
        assert_float_eq(task.finish_time().unwrap(), 10., 1e-6);
    }
    let vm = state.workload.vm(vm).unwrap();
    assert_eq!(vm.tasks(), tasks.as_slice());
    assert_eq!(vm.status(), VmStatus::Destroyed);
}

#[test]
fn test_vm_destruction_delay() {
    let mut config = FederationConfig::default();
    config.vm_destruction_delay = 2.5;
    let mut sim = FederatedSimulation::new(Simulation::new(123), config);
    let ids = build(&mut sim, &[0.], 1);
    let user = sim.create_user(ids[0].0);
    let bot = sim.submit_bot(user, bag("job", 1, 0.));
    sim.step_until_no_events();

    let state = sim.state();
    let state = state.borrow();
    let vm = state.workload.vm(state.workload.bot(bot).unwrap().vms()[0]).unwrap();
    assert_float_eq(vm.stop_time().unwrap(), 12.5, 1e-6);
    assert_float_eq(sim.current_time(), 12.5, 1e-6);
}

#[test]
// Hosts are fully loaded for 10 seconds, then idle until the last VM is destroyed.
fn test_datacenter_utilization() {
    let mut config = FederationConfig::default();
    config.vm_destruction_delay = 10.;
    let mut sim = FederatedSimulation::new(Simulation::new(123), config);
    let ids = build(&mut sim, &[0.], 1);
    let (member, dc) = ids[0];
    let user = sim.create_user(member);
    sim.submit_bot(user, bag("job", 4, 0.));
    sim.step_until_no_events();

    let utilization = sim.datacenter(dc).borrow().average_cpu_utilization();
    assert_float_eq(utilization, 0.5, 1e-6);
    assert_eq!(sim.broker(member).borrow().average_datacenter_cpu_utilization(), 0.);
    assert!(!sim.datacenter(dc).borrow().is_migrations_enabled());
    assert_eq!(sim.datacenter(dc).borrow().owner(), Some(member));
}
