//! Time-shared task scheduler of a single VM.

/// Remaining length (in MI) below which a task is considered complete.
const LENGTH_EPSILON: f64 = 1e-6;

#[derive(Clone, Debug)]
struct ScheduledTask {
    task_id: u32,
    pes: u32,
    remaining: f64,
    ready_at: f64,
}

/// Runs all submitted tasks of a VM concurrently.
///
/// A task becomes ready once its input files are transferred. Ready tasks share the VM capacity:
/// each requested PE gets `mips_per_pe * min(1, vm_pes / ready_pes)` MIPS.
#[derive(Clone, Debug)]
pub struct TaskScheduler {
    vm_pes: u32,
    mips_per_pe: f64,
    tasks: Vec<ScheduledTask>,
    last_update: f64,
}

impl TaskScheduler {
    pub fn new(vm_pes: u32, mips_per_pe: f64) -> Self {
        Self {
            vm_pes,
            mips_per_pe,
            tasks: Vec::new(),
            last_update: 0.,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn task_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.tasks.iter().map(|t| t.task_id)
    }

    /// Time of the last processing update.
    pub fn last_update(&self) -> f64 {
        self.last_update
    }

    /// Submits task and returns the estimated time until the next completion or readiness change.
    pub fn submit(
        &mut self,
        task_id: u32,
        length: f64,
        pes: u32,
        transfer_time: f64,
        now: f64,
        min_time_between_events: f64,
    ) -> f64 {
        self.update_processing(now);
        self.tasks.push(ScheduledTask {
            task_id,
            pes: pes.max(1),
            remaining: length.max(0.),
            ready_at: now + transfer_time.max(0.),
        });
        self.estimated_finish_time(now, min_time_between_events)
    }

    fn ready_pes(&self, time: f64) -> u32 {
        self.tasks.iter().filter(|t| t.ready_at <= time).map(|t| t.pes).sum()
    }

    fn mips_per_requested_pe(&self, ready_pes: u32) -> f64 {
        if ready_pes == 0 {
            return 0.;
        }
        self.mips_per_pe * (self.vm_pes as f64 / ready_pes as f64).min(1.)
    }

    /// Advances task progress up to `now` and returns IDs of completed tasks.
    pub fn update_processing(&mut self, now: f64) -> Vec<u32> {
        let mut time = self.last_update;
        while time < now {
            let segment_end = self
                .tasks
                .iter()
                .map(|t| t.ready_at)
                .filter(|ready_at| *ready_at > time && *ready_at < now)
                .fold(now, f64::min);
            let rate = self.mips_per_requested_pe(self.ready_pes(time));
            let elapsed = segment_end - time;
            for task in self.tasks.iter_mut().filter(|t| t.ready_at <= time) {
                task.remaining -= rate * task.pes as f64 * elapsed;
            }
            time = segment_end;
        }
        if now > self.last_update {
            self.last_update = now;
        }

        let mut finished = Vec::new();
        self.tasks.retain(|t| {
            if t.ready_at <= now && t.remaining <= LENGTH_EPSILON {
                finished.push(t.task_id);
                false
            } else {
                true
            }
        });
        finished
    }

    /// Returns time left from `now` until the next task completes or becomes ready,
    /// never less than `min_time_between_events`, or infinity if there are no tasks.
    pub fn estimated_finish_time(&self, now: f64, min_time_between_events: f64) -> f64 {
        if self.tasks.is_empty() {
            return f64::INFINITY;
        }
        let base = self.last_update;
        let rate = self.mips_per_requested_pe(self.ready_pes(base));
        let mut next = f64::INFINITY;
        for task in &self.tasks {
            if task.ready_at > base {
                next = next.min(task.ready_at);
            } else if rate > 0. {
                next = next.min(base + task.remaining.max(0.) / (rate * task.pes as f64));
            }
        }
        (next - now).max(min_time_between_events)
    }

    /// Fraction of VM PEs requested by ready tasks.
    pub fn cpu_utilization(&self) -> f64 {
        if self.vm_pes == 0 {
            return 0.;
        }
        (self.ready_pes(self.last_update) as f64 / self.vm_pes as f64).min(1.)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN_TIME: f64 = 0.00001;

    #[test]
    fn test_empty_scheduler() {
        let scheduler = TaskScheduler::new(1, 1000.);
        assert!(scheduler.estimated_finish_time(0., MIN_TIME).is_infinite());
        assert_eq!(scheduler.cpu_utilization(), 0.);
    }

    #[test]
    fn test_zero_pe_vm_is_idle() {
        let mut scheduler = TaskScheduler::new(0, 1000.);
        scheduler.submit(1, 1000., 1, 0., 0., MIN_TIME);
        assert_eq!(scheduler.cpu_utilization(), 0.);
    }

    #[test]
    fn test_single_task() {
        let mut scheduler = TaskScheduler::new(1, 3450.);
        let estimate = scheduler.submit(1, 6900., 1, 0., 0., MIN_TIME);
        assert_eq!(estimate, 2.);
        assert_eq!(scheduler.cpu_utilization(), 1.);
        assert!(scheduler.update_processing(1.).is_empty());
        assert_eq!(scheduler.estimated_finish_time(1., MIN_TIME), 1.);
        assert_eq!(scheduler.update_processing(2.), vec![1]);
        assert!(scheduler.is_empty());
    }

    #[test]
    // Two tasks on a single PE share it, so each one runs at half speed.
    fn test_time_sharing() {
        let mut scheduler = TaskScheduler::new(1, 1000.);
        scheduler.submit(1, 1000., 1, 0., 0., MIN_TIME);
        let estimate = scheduler.submit(2, 1000., 1, 0., 0., MIN_TIME);
        assert_eq!(estimate, 2.);
        let mut finished = scheduler.update_processing(2.);
        finished.sort();
        assert_eq!(finished, vec![1, 2]);
    }

    #[test]
    // The second task arrives at time 1 when the first one has 500 MI left.
    fn test_late_submission() {
        let mut scheduler = TaskScheduler::new(1, 1000.);
        scheduler.submit(1, 1500., 1, 0., 0., MIN_TIME);
        let estimate = scheduler.submit(2, 2000., 1, 0., 1., MIN_TIME);
        // both run at 500 MIPS, the first one completes after one more second
        assert_eq!(estimate, 1.);
        assert_eq!(scheduler.update_processing(2.), vec![1]);
        // the second one has 1500 MI left and runs alone
        assert_eq!(scheduler.estimated_finish_time(2., MIN_TIME), 1.5);
        assert_eq!(scheduler.update_processing(3.5), vec![2]);
    }

    #[test]
    fn test_transfer_time_delays_execution() {
        let mut scheduler = TaskScheduler::new(1, 1000.);
        let estimate = scheduler.submit(1, 1000., 1, 0.5, 0., MIN_TIME);
        assert_eq!(estimate, 0.5);
        assert_eq!(scheduler.cpu_utilization(), 0.);
        assert!(scheduler.update_processing(0.5).is_empty());
        assert_eq!(scheduler.estimated_finish_time(0.5, MIN_TIME), 1.);
        assert_eq!(scheduler.update_processing(1.5), vec![1]);
    }

    #[test]
    fn test_estimate_is_clamped() {
        let mut scheduler = TaskScheduler::new(1, 1000.);
        let estimate = scheduler.submit(1, 0., 1, 0., 0., MIN_TIME);
        assert_eq!(estimate, MIN_TIME);
        assert_eq!(scheduler.update_processing(0.), vec![1]);
    }
}
