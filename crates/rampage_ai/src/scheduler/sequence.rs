use std::collections::VecDeque;

use super::{Predicate, Routine, RoutineError, RoutineResult, Spawner, Step, Yield};

pub type Action<C> = Box<dyn FnMut(&mut C) -> Result<(), RoutineError>>;

pub enum SequenceOp<C: ?Sized> {
    Action(Action<C>),
    Delay(f32),
    WaitUntil(Predicate<C>),
}

/// A fixed list of steps run as one task.
///
/// Consecutive actions run in the same resume; every `Delay` or `WaitUntil`
/// hands control back to the scheduler.
pub struct Sequence<C: ?Sized> {
    ops: VecDeque<SequenceOp<C>>,
}

impl<C: ?Sized> Default for Sequence<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized> Sequence<C> {
    pub fn new() -> Self {
        Self {
            ops: VecDeque::new(),
        }
    }

    pub fn then(mut self, action: impl FnMut(&mut C) -> Result<(), RoutineError> + 'static) -> Self {
        self.ops.push_back(SequenceOp::Action(Box::new(action)));
        self
    }

    pub fn delay(mut self, seconds: f32) -> Self {
        self.ops.push_back(SequenceOp::Delay(seconds));
        self
    }

    pub fn wait_until(mut self, predicate: impl FnMut(&C) -> bool + 'static) -> Self {
        self.ops.push_back(SequenceOp::WaitUntil(Box::new(predicate)));
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl<C: ?Sized> Routine<C> for Sequence<C> {
    fn resume(&mut self, ctx: &mut C, _spawner: &mut Spawner<C>) -> RoutineResult<C> {
        while let Some(op) = self.ops.pop_front() {
            match op {
                SequenceOp::Action(mut action) => action(&mut *ctx)?,
                SequenceOp::Delay(seconds) => return Ok(Step::Yield(Yield::Delay(seconds))),
                SequenceOp::WaitUntil(predicate) => {
                    return Ok(Step::Yield(Yield::WaitUntil(predicate)))
                }
            }
        }
        Ok(Step::Done)
    }
}
