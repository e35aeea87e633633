//! Driving tasks, either inline or on worker threads.

use crate::task::{DataSignal, SharedTask, Task, TaskState, Watchable};
use crate::util::lock;
use log::{debug, trace};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long a worker waits for a data signal before it checks again whether
/// its task was stopped or resumed.
const WORKER_WAIT: Duration = Duration::from_millis(50);

/// Type-erased access to a watchable task.
trait Runnable: Send {
    fn step(&mut self) -> TaskState;
    fn state(&self) -> TaskState;
    fn signal(&self) -> Option<DataSignal>;
    fn pause(&mut self);
    fn resume(&mut self);
}

impl<T: Task + Send> Runnable for Watchable<T>
where
    T::Error: Send,
{
    fn step(&mut self) -> TaskState {
        Self::step(self)
    }

    fn state(&self) -> TaskState {
        Self::state(self)
    }

    fn signal(&self) -> Option<DataSignal> {
        self.task().data_signal()
    }

    fn pause(&mut self) {
        Self::pause(self);
    }

    fn resume(&mut self) {
        Self::resume(self);
    }
}

impl<T: Task + Send> Runnable for SharedTask<T>
where
    T::Error: Send,
{
    fn step(&mut self) -> TaskState {
        lock(self).step()
    }

    fn state(&self) -> TaskState {
        lock(self).state()
    }

    fn signal(&self) -> Option<DataSignal> {
        lock(self).task().data_signal()
    }

    fn pause(&mut self) {
        lock(self).pause();
    }

    fn resume(&mut self) {
        lock(self).resume();
    }
}

/// Identifies a task within a [`Scheduler`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(usize);

struct Slot {
    task: Box<dyn Runnable>,
    // The signal generation observed before the step that returned
    // `NeedsData`.
    parked: Option<(Option<DataSignal>, u64)>,
}

impl Slot {
    fn is_runnable(&self) -> bool {
        match self.task.state() {
            TaskState::Idle | TaskState::Running => true,
            TaskState::NeedsData => match &self.parked {
                Some((Some(signal), generation)) => signal.generation() != *generation,
                // Without a signal, only an explicit wake-up helps.
                Some((None, _)) => false,
                None => true,
            },
            TaskState::Paused | TaskState::Completed | TaskState::Stopped => false,
        }
    }
}

/// A single-threaded scheduler that steps tasks round-robin.
///
/// Tasks that need data are parked until the signal they depend on is
/// notified; paused and finished tasks are skipped.
#[derive(Default)]
pub struct Scheduler {
    slots: Vec<Option<Slot>>,
    cursor: usize,
}

impl Scheduler {
    /// Create a new, empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task owned by the scheduler.
    pub fn add<T>(&mut self, task: Watchable<T>) -> TaskId
    where
        T: Task + Send + 'static,
        T::Error: Send,
    {
        self.insert(Box::new(task))
    }

    /// Add a task that is shared with other parties.
    pub fn add_shared<T>(&mut self, task: SharedTask<T>) -> TaskId
    where
        T: Task + Send + 'static,
        T::Error: Send,
    {
        self.insert(Box::new(task))
    }

    fn insert(&mut self, task: Box<dyn Runnable>) -> TaskId {
        let slot = Slot { task, parked: None };

        if let Some(free) = self.slots.iter().position(Option::is_none) {
            self.slots[free] = Some(slot);
            TaskId(free)
        } else {
            self.slots.push(Some(slot));
            TaskId(self.slots.len() - 1)
        }
    }

    /// Remove a task. Returns `false` if the id is unknown.
    pub fn remove(&mut self, id: TaskId) -> bool {
        self.slots
            .get_mut(id.0)
            .and_then(Option::take)
            .is_some()
    }

    /// The state of a task.
    pub fn state(&self, id: TaskId) -> Option<TaskState> {
        self.slot(id).map(|s| s.task.state())
    }

    /// The number of tasks.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Whether the scheduler holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pause a task.
    pub fn pause(&mut self, id: TaskId) {
        if let Some(slot) = self.slot_mut(id) {
            slot.task.pause();
        }
    }

    /// Resume a paused task.
    pub fn resume(&mut self, id: TaskId) {
        if let Some(slot) = self.slot_mut(id) {
            slot.task.resume();
        }
    }

    /// Make a task that waits for data runnable again.
    pub fn wake(&mut self, id: TaskId) {
        if let Some(slot) = self.slot_mut(id) {
            slot.parked = None;
        }
    }

    /// Step the next runnable task once. Returns `false` if no task was
    /// runnable.
    pub fn tick(&mut self) -> bool {
        let n = self.slots.len();

        for offset in 0..n {
            let idx = (self.cursor + offset) % n;

            let Some(slot) = self.slots[idx].as_mut() else {
                continue;
            };

            if !slot.is_runnable() {
                continue;
            }

            let signal = slot.task.signal();
            let generation = signal.as_ref().map_or(0, DataSignal::generation);
            let state = slot.task.step();
            trace!("task {idx} stepped to {state:?}");

            slot.parked = (state == TaskState::NeedsData).then_some((signal, generation));
            self.cursor = idx + 1;

            return true;
        }

        false
    }

    /// Step tasks until none of them is runnable.
    pub fn run_until_idle(&mut self) {
        while self.tick() {}
    }

    fn slot(&self, id: TaskId) -> Option<&Slot> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, id: TaskId) -> Option<&mut Slot> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("tasks", &self.len())
            .finish_non_exhaustive()
    }
}

/// Run a shared task on a dedicated thread until it reaches a final state.
///
/// While the task needs data, the worker blocks on the task's data signal
/// instead of polling. The task is only locked for the duration of a single
/// step.
pub fn spawn_worker<T>(task: SharedTask<T>) -> JoinHandle<TaskState>
where
    T: Task + Send + 'static,
    T::Error: Send,
{
    thread::spawn(move || {
        loop {
            let signal = lock(&task).task().data_signal();
            let generation = signal.as_ref().map_or(0, DataSignal::generation);
            let state = lock(&task).step();

            match state {
                TaskState::Idle | TaskState::Running => {}
                TaskState::NeedsData => match &signal {
                    Some(signal) => {
                        signal.wait_past(generation, WORKER_WAIT);
                    }
                    None => thread::sleep(WORKER_WAIT),
                },
                TaskState::Paused => thread::sleep(WORKER_WAIT),
                TaskState::Completed | TaskState::Stopped => {
                    debug!("worker finished with {state:?}");

                    return state;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Step;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Consumes items that become available through a shared counter.
    struct Consumer {
        consumed: usize,
        available: Arc<AtomicUsize>,
        total: usize,
        signal: DataSignal,
    }

    impl Task for Consumer {
        type Error = ();

        fn iterate(&mut self) -> Result<Step, ()> {
            if self.consumed == self.total {
                return Ok(Step::Completed);
            }

            if self.consumed == self.available.load(Ordering::SeqCst) {
                return Ok(Step::NeedsData);
            }

            self.consumed += 1;
            Ok(Step::Running)
        }

        fn data_signal(&self) -> Option<DataSignal> {
            Some(self.signal.clone())
        }
    }

    fn consumer(total: usize, available: usize) -> (Consumer, Arc<AtomicUsize>, DataSignal) {
        let counter = Arc::new(AtomicUsize::new(available));
        let signal = DataSignal::new();

        let task = Consumer {
            consumed: 0,
            available: counter.clone(),
            total,
            signal: signal.clone(),
        };

        (task, counter, signal)
    }

    #[test]
    fn parks_until_signal() {
        let (task, counter, signal) = consumer(5, 2);
        let mut scheduler = Scheduler::new();
        let id = scheduler.add(Watchable::new(task));

        scheduler.run_until_idle();
        assert_eq!(scheduler.state(id), Some(TaskState::NeedsData));

        // More data without a notification does not wake the task.
        counter.store(5, Ordering::SeqCst);
        assert!(!scheduler.tick());

        signal.notify();
        scheduler.run_until_idle();
        assert_eq!(scheduler.state(id), Some(TaskState::Completed));
    }

    #[test]
    fn round_robin() {
        let mut scheduler = Scheduler::new();
        let a = scheduler.add(Watchable::new(consumer(3, 3).0));
        let b = scheduler.add(Watchable::new(consumer(3, 3).0));

        scheduler.tick();
        scheduler.tick();
        assert_eq!(scheduler.state(a), Some(TaskState::Running));
        assert_eq!(scheduler.state(b), Some(TaskState::Running));

        scheduler.run_until_idle();
        assert_eq!(scheduler.state(a), Some(TaskState::Completed));
        assert_eq!(scheduler.state(b), Some(TaskState::Completed));
        assert!(scheduler.remove(a));
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn paused_tasks_are_skipped() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.add(Watchable::new(consumer(3, 3).0));

        scheduler.tick();
        scheduler.pause(id);
        assert!(!scheduler.tick());

        scheduler.resume(id);
        scheduler.run_until_idle();
        assert_eq!(scheduler.state(id), Some(TaskState::Completed));
    }

    #[test]
    fn worker_waits_for_data() {
        let (task, counter, signal) = consumer(10, 0);
        let shared = Watchable::shared(task);
        let worker = spawn_worker(shared.clone());

        for i in 1..=10 {
            counter.store(i, Ordering::SeqCst);
            signal.notify();
        }

        assert_eq!(worker.join().unwrap(), TaskState::Completed);
        assert_eq!(lock(&shared).task().consumed, 10);
    }

    #[test]
    fn worker_stops_on_request() {
        let (task, _, _) = consumer(10, 0);
        let shared = Watchable::shared(task);
        let stop = lock(&shared).stop_handle();
        let worker = spawn_worker(shared);

        stop.stop();
        assert_eq!(worker.join().unwrap(), TaskState::Stopped);
    }
}
