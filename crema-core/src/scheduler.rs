//! Tick scheduler
//!
//! The control loop is driven by a single 1 ms tick. Slower work declares a
//! period and a phase offset here; the scheduler reports which of it is due
//! on each tick, always in the same order. Offsets keep the 100 ms jobs from
//! all landing on the same tick.

/// Periodic jobs of the control loop, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Task {
    /// Work sequencer and recipe execution
    Sequence,
    /// Pending-action resolution
    Action,
    /// Zero-cross watchdog
    Mains,
    /// Pump PID
    Pumps,
    /// Heater PID
    Heaters,
    /// Milk temperature and steam wand switches
    Milk,
}

/// When a task runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cadence {
    pub period_ms: u32,
    /// Tick within the period on which the task runs
    pub phase_ms: u32,
}

impl Cadence {
    pub const fn new(period_ms: u32, phase_ms: u32) -> Self {
        Self {
            period_ms,
            phase_ms,
        }
    }

    pub const fn is_due(&self, now_ms: u32) -> bool {
        now_ms % self.period_ms == self.phase_ms
    }
}

/// The schedule of the control loop
pub const SCHEDULE: [(Task, Cadence); 6] = [
    (Task::Sequence, Cadence::new(100, 70)),
    (Task::Action, Cadence::new(100, 90)),
    (Task::Mains, Cadence::new(100, 60)),
    (Task::Pumps, Cadence::new(100, 50)),
    (Task::Heaters, Cadence::new(50, 43)),
    (Task::Milk, Cadence::new(100, 20)),
];

/// Millisecond clock and due-task selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Scheduler {
    now_ms: u32,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self { now_ms: 0 }
    }

    /// Time of the current tick
    pub fn now_ms(&self) -> u32 {
        self.now_ms
    }

    /// Advance one tick and return the tasks due on it
    pub fn tick(&mut self) -> impl Iterator<Item = Task> {
        self.now_ms = self.now_ms.wrapping_add(1);
        let now = self.now_ms;
        SCHEDULE
            .into_iter()
            .filter(move |(_, cadence)| cadence.is_due(now))
            .map(|(task, _)| task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(task: Task, ticks: u32) -> usize {
        let mut scheduler = Scheduler::new();
        (0..ticks)
            .map(|_| scheduler.tick().filter(|&t| t == task).count())
            .sum()
    }

    #[test]
    fn test_periods() {
        assert_eq!(count(Task::Sequence, 1000), 10);
        assert_eq!(count(Task::Action, 1000), 10);
        assert_eq!(count(Task::Heaters, 1000), 20);
        assert_eq!(count(Task::Pumps, 1000), 10);
    }

    #[test]
    fn test_phase_offsets_spread_work() {
        let mut scheduler = Scheduler::new();
        for _ in 0..1000 {
            let due = scheduler.tick().count();
            assert!(due <= 1, "more than one task on tick {}", scheduler.now_ms());
        }
    }

    #[test]
    fn test_first_run_at_phase() {
        let mut scheduler = Scheduler::new();
        let first = (0..200)
            .find_map(|_| {
                let now = scheduler.now_ms() + 1;
                scheduler
                    .tick()
                    .any(|t| t == Task::Sequence)
                    .then_some(now)
            })
            .unwrap();
        assert_eq!(first, 70);
    }

    #[test]
    fn test_order_is_fixed() {
        let order: heapless::Vec<Task, 6> = SCHEDULE.iter().map(|(t, _)| *t).collect();
        assert_eq!(
            order,
            [
                Task::Sequence,
                Task::Action,
                Task::Mains,
                Task::Pumps,
                Task::Heaters,
                Task::Milk
            ]
        );
    }
}
