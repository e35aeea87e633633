//! Cooperative, resumable units of work.
//!
//! Both the interpreter and the renderer are [`Task`]s: they make progress in
//! small steps, one call to [`Task::iterate`] at a time. A [`Watchable`]
//! wraps a task together with its [`TaskState`] and performs setup and
//! cleanup at the right transitions, so that a scheduler only ever needs to
//! call [`Watchable::step`].

use crate::util::lock;
use log::debug;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// The outcome of a single step of a task.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Step {
    /// The task made progress and can be stepped again right away.
    Running,
    /// The task ran out of input, but its producer is not finished yet.
    NeedsData,
    /// The task finished its work.
    Completed,
    /// The task cannot continue, for example because its target is gone.
    Stopped,
}

/// The state of a task as seen by its scheduler.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TaskState {
    /// The task has not been stepped yet.
    Idle,
    /// The task is making progress.
    Running,
    /// The task waits for more input.
    NeedsData,
    /// The task was paused and must be resumed before it continues.
    Paused,
    /// The task finished its work.
    Completed,
    /// The task was stopped or failed. This state is final.
    Stopped,
}

impl TaskState {
    /// Whether the task will never make progress again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Stopped)
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::NeedsData,
            3 => Self::Paused,
            4 => Self::Completed,
            _ => Self::Stopped,
        }
    }
}

/// A unit of work that is executed step by step.
pub trait Task {
    /// The error that makes the task fail.
    type Error;

    /// Prepare the task. Called once, before the first call to
    /// [`Task::iterate`].
    fn setup(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Perform one step of work.
    fn iterate(&mut self) -> Result<Step, Self::Error>;

    /// Release resources. Called exactly once, after the task reached a
    /// final state, including after failures.
    fn cleanup(&mut self) {}

    /// The signal that is notified when a task that returned
    /// [`Step::NeedsData`] may be able to continue.
    fn data_signal(&self) -> Option<DataSignal> {
        None
    }
}

/// A notification mechanism for tasks waiting for more data.
///
/// Each notification increments a generation counter, so that waiters can
/// detect notifications that happened between checking for data and starting
/// to wait.
#[derive(Debug, Clone, Default)]
pub struct DataSignal(Arc<(Mutex<u64>, Condvar)>);

impl DataSignal {
    /// Create a new signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake up all waiters.
    pub fn notify(&self) {
        let (generation, cvar) = &*self.0;
        *lock(generation) += 1;
        cvar.notify_all();
    }

    /// The current generation.
    pub fn generation(&self) -> u64 {
        *lock(&self.0.0)
    }

    /// Block until the generation differs from `generation` or the timeout
    /// elapses. Returns whether the generation changed.
    pub fn wait_past(&self, generation: u64, timeout: Duration) -> bool {
        let (current, cvar) = &*self.0;
        let guard = lock(current);

        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |g| *g == generation)
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        *guard != generation
    }
}

/// A handle that requests a task to stop.
///
/// The request takes effect at the next step boundary; a step that is in
/// progress always completes.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Request the task to stop.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether stopping was requested.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A read-only view of the state of a task that can be queried without
/// access to the task itself.
#[derive(Debug, Clone)]
pub struct StatusHandle(Arc<AtomicU8>);

impl StatusHandle {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(TaskState::Idle as u8)))
    }

    /// The last state the task was in.
    pub fn get(&self) -> TaskState {
        TaskState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: TaskState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// A task together with its execution state.
pub struct Watchable<T: Task> {
    task: T,
    state: TaskState,
    started: bool,
    error: Option<T::Error>,
    stop: StopHandle,
    status: StatusHandle,
}

/// A task that is shared between a scheduler and other parties.
pub type SharedTask<T> = Arc<Mutex<Watchable<T>>>;

impl<T: Task> Watchable<T> {
    /// Wrap a task. The task starts out [`TaskState::Idle`].
    pub fn new(task: T) -> Self {
        Self {
            task,
            state: TaskState::Idle,
            started: false,
            error: None,
            stop: StopHandle::default(),
            status: StatusHandle::new(),
        }
    }

    /// Wrap a task so that it can be shared between threads.
    pub fn shared(task: T) -> SharedTask<T> {
        Arc::new(Mutex::new(Self::new(task)))
    }

    /// The current state.
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// A handle to stop the task from any thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// A handle to observe the state of the task from any thread.
    pub fn status(&self) -> StatusHandle {
        self.status.clone()
    }

    /// Request the task to stop at the next step.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// The wrapped task.
    pub fn task(&self) -> &T {
        &self.task
    }

    /// The wrapped task, mutably.
    pub fn task_mut(&mut self) -> &mut T {
        &mut self.task
    }

    /// The error the task failed with, if any.
    pub fn error(&self) -> Option<&T::Error> {
        self.error.as_ref()
    }

    /// Take the error the task failed with, if any.
    pub fn take_error(&mut self) -> Option<T::Error> {
        self.error.take()
    }

    /// Pause the task. Has no effect on tasks in a final state.
    pub fn pause(&mut self) {
        if !self.state.is_terminal() {
            self.set_state(TaskState::Paused);
        }
    }

    /// Resume a paused task.
    pub fn resume(&mut self) {
        if self.state == TaskState::Paused {
            let state = if self.started {
                TaskState::Running
            } else {
                TaskState::Idle
            };

            self.set_state(state);
        }
    }

    /// Advance the task by one step and return its new state.
    ///
    /// The first call runs [`Task::setup`]. Once the task completes, is
    /// stopped or fails, [`Task::cleanup`] is run and all further calls are
    /// no-ops.
    pub fn step(&mut self) -> TaskState {
        if matches!(
            self.state,
            TaskState::Completed | TaskState::Stopped | TaskState::Paused
        ) {
            return self.state;
        }

        if self.stop.is_stopped() {
            debug!("task stopped on request");

            return self.finish(TaskState::Stopped);
        }

        if !self.started {
            self.started = true;

            if let Err(e) = self.task.setup() {
                self.error = Some(e);
                return self.finish(TaskState::Stopped);
            }

            self.set_state(TaskState::Running);
        }

        match self.task.iterate() {
            Ok(Step::Running) => self.set_state(TaskState::Running),
            Ok(Step::NeedsData) => self.set_state(TaskState::NeedsData),
            Ok(Step::Completed) => self.finish(TaskState::Completed),
            Ok(Step::Stopped) => self.finish(TaskState::Stopped),
            Err(e) => {
                self.error = Some(e);
                self.finish(TaskState::Stopped)
            }
        }
    }

    /// Step the task until it is no longer [`TaskState::Running`], i.e. until
    /// it finished, was paused or needs more data.
    pub fn run(&mut self) -> TaskState {
        loop {
            let state = self.step();

            if state != TaskState::Running {
                return state;
            }
        }
    }

    fn finish(&mut self, state: TaskState) -> TaskState {
        self.task.cleanup();
        self.set_state(state)
    }

    fn set_state(&mut self, state: TaskState) -> TaskState {
        self.state = state;
        self.status.set(state);

        state
    }
}

impl<T: Task> std::fmt::Debug for Watchable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watchable")
            .field("state", &self.state)
            .field("failed", &self.error.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        steps: u32,
        limit: u32,
        available: u32,
        setups: u32,
        cleanups: u32,
        fail_at: Option<u32>,
    }

    impl Task for Counter {
        type Error = &'static str;

        fn setup(&mut self) -> Result<(), Self::Error> {
            self.setups += 1;
            Ok(())
        }

        fn iterate(&mut self) -> Result<Step, Self::Error> {
            if self.fail_at == Some(self.steps) {
                return Err("boom");
            }

            if self.steps == self.limit {
                return Ok(Step::Completed);
            }

            if self.steps == self.available {
                return Ok(Step::NeedsData);
            }

            self.steps += 1;
            Ok(Step::Running)
        }

        fn cleanup(&mut self) {
            self.cleanups += 1;
        }
    }

    #[test]
    fn runs_to_completion() {
        let mut w = Watchable::new(Counter {
            limit: 3,
            available: 10,
            ..Counter::default()
        });

        assert_eq!(w.state(), TaskState::Idle);
        assert_eq!(w.run(), TaskState::Completed);
        assert_eq!(w.task().steps, 3);
        assert_eq!(w.task().setups, 1);
        assert_eq!(w.task().cleanups, 1);

        // Further steps are no-ops.
        assert_eq!(w.step(), TaskState::Completed);
        assert_eq!(w.task().cleanups, 1);
    }

    #[test]
    fn needs_data_then_resumes() {
        let mut w = Watchable::new(Counter {
            limit: 4,
            available: 2,
            ..Counter::default()
        });

        assert_eq!(w.run(), TaskState::NeedsData);
        assert_eq!(w.task().steps, 2);

        w.task_mut().available = 4;
        assert_eq!(w.run(), TaskState::Completed);
        assert_eq!(w.task().setups, 1);
    }

    #[test]
    fn stop_takes_effect_at_next_step() {
        let mut w = Watchable::new(Counter {
            limit: 10,
            available: 10,
            ..Counter::default()
        });
        let handle = w.stop_handle();
        let status = w.status();

        assert_eq!(w.step(), TaskState::Running);
        handle.stop();
        assert_eq!(w.step(), TaskState::Stopped);
        assert_eq!(w.task().steps, 1);
        assert_eq!(w.task().cleanups, 1);
        assert_eq!(status.get(), TaskState::Stopped);
    }

    #[test]
    fn failure_stops_and_keeps_error() {
        let mut w = Watchable::new(Counter {
            limit: 10,
            available: 10,
            fail_at: Some(2),
            ..Counter::default()
        });

        assert_eq!(w.run(), TaskState::Stopped);
        assert_eq!(w.error(), Some(&"boom"));
        assert_eq!(w.task().cleanups, 1);
        assert_eq!(w.take_error(), Some("boom"));
    }

    #[test]
    fn pause_and_resume() {
        let mut w = Watchable::new(Counter {
            limit: 2,
            available: 2,
            ..Counter::default()
        });

        w.step();
        w.pause();
        assert_eq!(w.step(), TaskState::Paused);
        assert_eq!(w.task().steps, 1);

        w.resume();
        assert_eq!(w.run(), TaskState::Completed);
    }

    #[test]
    fn signal_generations() {
        let signal = DataSignal::new();
        let generation = signal.generation();

        assert!(!signal.wait_past(generation, Duration::from_millis(1)));

        let other = signal.clone();
        let waiter = std::thread::spawn(move || other.wait_past(generation, Duration::from_secs(5)));
        signal.notify();

        assert!(waiter.join().unwrap());
        assert_eq!(signal.generation(), generation + 1);
    }
}
