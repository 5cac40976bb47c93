//! Cooperative, single-threaded task scheduler.
//!
//! Tasks are resumable routines advanced at most once per [`Scheduler::tick`].
//! A routine suspends by returning a [`Yield`]: a delay, a predicate wait or a
//! plain next-tick requeue. All tasks processed in one tick observe the same
//! `now`, and tasks scheduled during a tick first run on the following tick.

mod sequence;
mod yields;

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, warn};

pub use sequence::{Sequence, SequenceOp};
pub use yields::{
    from_fn, Predicate, Routine, RoutineError, RoutineResult, Step, Yield,
    WAIT_UNTIL_RETRY_SECONDS,
};

use yields::sanitize_delay;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

impl TaskHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub resumed: usize,
    pub completed: usize,
    pub faulted: usize,
    /// Predicate waits that were polled and still false.
    pub retried: usize,
}

struct Task<C: ?Sized> {
    handle: TaskHandle,
    tag: Option<String>,
    routine: Box<dyn Routine<C>>,
    next_eligible_time: f32,
    paused: bool,
    paused_remaining: f32,
    waiting_on: Option<Predicate<C>>,
    finished: bool,
}

enum Poll {
    Retry,
    Resumed,
    Completed,
    Faulted(String),
}

impl<C: ?Sized> Task<C> {
    fn new(handle: TaskHandle, tag: Option<String>, routine: Box<dyn Routine<C>>, now: f32) -> Self {
        Self {
            handle,
            tag,
            routine,
            next_eligible_time: now,
            paused: false,
            paused_remaining: 0.0,
            waiting_on: None,
            finished: false,
        }
    }

    fn is_due(&self, now: f32) -> bool {
        !self.paused && !self.finished && now >= self.next_eligible_time
    }

    fn poll(&mut self, now: f32, ctx: &mut C, spawner: &mut Spawner<C>) -> Poll {
        if let Some(predicate) = self.waiting_on.as_mut() {
            let ready = catch_unwind(AssertUnwindSafe(|| predicate(&*ctx)));
            match ready {
                Ok(true) => self.waiting_on = None,
                Ok(false) => {
                    self.next_eligible_time = now + WAIT_UNTIL_RETRY_SECONDS;
                    return Poll::Retry;
                }
                Err(payload) => return Poll::Faulted(panic_message(payload.as_ref())),
            }
        }

        let routine = &mut self.routine;
        let step = catch_unwind(AssertUnwindSafe(|| routine.resume(ctx, spawner)));
        match step {
            Ok(Ok(Step::Done)) => Poll::Completed,
            Ok(Ok(Step::Yield(yielded))) => {
                self.next_eligible_time = match yielded {
                    Yield::Delay(seconds) => now + sanitize_delay(seconds),
                    Yield::WaitUntil(predicate) => {
                        self.waiting_on = Some(predicate);
                        now
                    }
                    Yield::NextTick => now,
                };
                Poll::Resumed
            }
            Ok(Err(error)) => Poll::Faulted(error.to_string()),
            Err(payload) => Poll::Faulted(panic_message(payload.as_ref())),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

/// Queue for tasks created while a tick is in progress.
pub struct Spawner<C: ?Sized> {
    next_handle: u64,
    pending: Vec<(TaskHandle, Option<String>, Box<dyn Routine<C>>)>,
}

impl<C: ?Sized> Spawner<C> {
    fn new() -> Self {
        Self {
            next_handle: 1,
            pending: Vec::new(),
        }
    }

    fn allocate(&mut self) -> TaskHandle {
        let handle = TaskHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    pub fn schedule(&mut self, routine: impl Routine<C> + 'static) -> TaskHandle {
        self.push(None, Box::new(routine))
    }

    pub fn schedule_tagged(
        &mut self,
        tag: impl Into<String>,
        routine: impl Routine<C> + 'static,
    ) -> TaskHandle {
        self.push(Some(tag.into()), Box::new(routine))
    }

    fn push(&mut self, tag: Option<String>, routine: Box<dyn Routine<C>>) -> TaskHandle {
        let handle = self.allocate();
        self.pending.push((handle, tag, routine));
        handle
    }
}

pub struct Scheduler<C: ?Sized> {
    tasks: Vec<Task<C>>,
    spawner: Spawner<C>,
    now: f32,
}

impl<C: ?Sized> Default for Scheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized> Scheduler<C> {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            spawner: Spawner::new(),
            now: 0.0,
        }
    }

    /// Time of the latest tick, pause or resume.
    pub fn now(&self) -> f32 {
        self.now
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, handle: TaskHandle) -> bool {
        self.tasks.iter().any(|task| task.handle == handle)
    }

    pub fn tagged_count(&self, tag: &str) -> usize {
        self.tasks
            .iter()
            .filter(|task| task.tag.as_deref() == Some(tag))
            .count()
    }

    pub fn is_paused(&self, handle: TaskHandle) -> bool {
        self.tasks
            .iter()
            .any(|task| task.handle == handle && task.paused)
    }

    /// Registers a task due at the current scheduler time. It first runs on the next tick.
    pub fn schedule(&mut self, routine: impl Routine<C> + 'static) -> TaskHandle {
        self.register(None, Box::new(routine))
    }

    pub fn schedule_tagged(
        &mut self,
        tag: impl Into<String>,
        routine: impl Routine<C> + 'static,
    ) -> TaskHandle {
        self.register(Some(tag.into()), Box::new(routine))
    }

    fn register(&mut self, tag: Option<String>, routine: Box<dyn Routine<C>>) -> TaskHandle {
        let handle = self.spawner.allocate();
        self.tasks.push(Task::new(handle, tag, routine, self.now));
        handle
    }

    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.handle != handle);
        before != self.tasks.len()
    }

    pub fn cancel_by_tag(&mut self, tag: &str) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.tag.as_deref() != Some(tag));
        let removed = before - self.tasks.len();
        if removed > 0 {
            debug!(tag, removed, "tasks_cancelled_by_tag");
        }
        removed
    }

    pub fn cancel_all(&mut self) -> usize {
        let removed = self.tasks.len();
        self.tasks.clear();
        self.spawner.pending.clear();
        if removed > 0 {
            debug!(removed, "tasks_cancelled_all");
        }
        removed
    }

    /// Freezes every running task, remembering how long it still had to wait.
    /// Tasks already paused keep their recorded remaining time.
    pub fn pause_all(&mut self, now: f32) {
        let now = self.advance_clock(now);
        let mut paused = 0usize;
        for task in self.tasks.iter_mut().filter(|task| !task.paused) {
            task.paused_remaining = (task.next_eligible_time - now).max(0.0);
            task.paused = true;
            paused += 1;
        }
        debug!(paused, "tasks_paused");
    }

    pub fn resume_all(&mut self, now: f32) {
        let now = self.advance_clock(now);
        let mut resumed = 0usize;
        for task in self.tasks.iter_mut().filter(|task| task.paused) {
            task.next_eligible_time = now + task.paused_remaining;
            task.paused_remaining = 0.0;
            task.paused = false;
            resumed += 1;
        }
        debug!(resumed, "tasks_resumed");
    }

    /// Resumes every due task once, in registration order.
    pub fn tick(&mut self, now: f32, ctx: &mut C) -> TickReport {
        let now = self.advance_clock(now);
        let mut report = TickReport::default();

        let Self { tasks, spawner, .. } = self;
        for task in tasks.iter_mut() {
            if !task.is_due(now) {
                continue;
            }
            match task.poll(now, ctx, spawner) {
                Poll::Retry => report.retried += 1,
                Poll::Resumed => report.resumed += 1,
                Poll::Completed => {
                    report.resumed += 1;
                    report.completed += 1;
                    task.finished = true;
                }
                Poll::Faulted(error) => {
                    warn!(
                        task = task.handle.raw(),
                        tag = task.tag.as_deref().unwrap_or("-"),
                        error = %error,
                        "task_faulted"
                    );
                    report.faulted += 1;
                    task.finished = true;
                }
            }
        }
        tasks.retain(|task| !task.finished);

        for (handle, tag, routine) in spawner.pending.drain(..) {
            tasks.push(Task::new(handle, tag, routine, now));
        }

        report
    }

    fn advance_clock(&mut self, now: f32) -> f32 {
        if now.is_finite() && now > self.now {
            self.now = now;
        }
        self.now
    }
}
