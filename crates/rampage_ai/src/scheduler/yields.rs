use thiserror::Error;

use crate::host::EntityId;

use super::Spawner;

/// Re-poll interval for a `WaitUntil` whose predicate is still false.
pub const WAIT_UNTIL_RETRY_SECONDS: f32 = 0.1;

pub type Predicate<C> = Box<dyn FnMut(&C) -> bool>;

/// How a suspended routine wants to be requeued.
pub enum Yield<C: ?Sized> {
    /// Resume no earlier than `now + seconds`.
    Delay(f32),
    /// Resume once the predicate holds; the routine does not advance before that.
    WaitUntil(Predicate<C>),
    /// Resume on the next tick.
    NextTick,
}

impl<C: ?Sized> std::fmt::Debug for Yield<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delay(seconds) => f.debug_tuple("Delay").field(seconds).finish(),
            Self::WaitUntil(_) => f.write_str("WaitUntil(..)"),
            Self::NextTick => f.write_str("NextTick"),
        }
    }
}

#[derive(Debug)]
pub enum Step<C: ?Sized> {
    Yield(Yield<C>),
    Done,
}

impl<C: ?Sized> Step<C> {
    pub fn delay(seconds: f32) -> Self {
        Self::Yield(Yield::Delay(seconds))
    }

    pub fn wait_until(predicate: impl FnMut(&C) -> bool + 'static) -> Self {
        Self::Yield(Yield::WaitUntil(Box::new(predicate)))
    }

    pub fn next_tick() -> Self {
        Self::Yield(Yield::NextTick)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RoutineError {
    #[error("routine fault: {0}")]
    Fault(String),
    #[error("entity {0} no longer exists")]
    MissingEntity(EntityId),
}

pub type RoutineResult<C> = Result<Step<C>, RoutineError>;

/// A resumable computation driven by the scheduler.
///
/// Each call runs the routine up to its next suspension point. Follow-up work
/// goes through `spawner`, which queues it for the next tick.
pub trait Routine<C: ?Sized> {
    fn resume(&mut self, ctx: &mut C, spawner: &mut Spawner<C>) -> RoutineResult<C>;
}

impl<C, F> Routine<C> for F
where
    C: ?Sized,
    F: FnMut(&mut C, &mut Spawner<C>) -> RoutineResult<C>,
{
    fn resume(&mut self, ctx: &mut C, spawner: &mut Spawner<C>) -> RoutineResult<C> {
        self(ctx, spawner)
    }
}

/// Pins a closure's signature so it can be scheduled as a routine.
pub fn from_fn<C, F>(step: F) -> F
where
    C: ?Sized,
    F: FnMut(&mut C, &mut Spawner<C>) -> RoutineResult<C>,
{
    step
}

pub(crate) fn sanitize_delay(seconds: f32) -> f32 {
    if seconds.is_finite() {
        seconds.max(0.0)
    } else {
        0.0
    }
}
