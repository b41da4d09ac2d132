use alloc::boxed::Box;

use crate::error::Error;
use crate::platform::Platform;

use super::name::TaskName;
use super::protothread::{Pt, PtPoll};
use super::scheduler::{Scheduler, TaskCtx, TaskFn, TaskHandle};

/// Helper for registering a new task, created with [`Task::new`](super::Task::new).
pub struct TaskBuilder<'n> {
  name: &'n str,
  on_remove: Option<Box<dyn FnMut()>>,
}

impl TaskBuilder<'_> {
  pub(crate) const fn new() -> TaskBuilder<'static> {
    TaskBuilder { name: "", on_remove: None }
  }
}

impl TaskBuilder<'_> {
  /// Set the diagnostic task name.
  pub fn name<'n>(self, name: &'n str) -> TaskBuilder<'n> {
    TaskBuilder { name, on_remove: self.on_remove }
  }

  /// Set a cleanup hook that runs whenever the task leaves the list.
  pub fn on_remove(mut self, hook: impl FnMut() + 'static) -> Self {
    self.on_remove = Some(Box::new(hook));
    self
  }

  /// Register a callback task and schedule it immediately.
  pub fn start<P, F>(self, sched: &mut Scheduler<P>, f: F) -> Result<TaskHandle, Error>
  where
    P: Platform,
    F: FnMut(&mut TaskCtx<'_, P>) + 'static,
  {
    sched.register(TaskName::new(self.name), TaskFn::Callback(Box::new(f)), self.on_remove, true)
  }

  /// Register a callback task without scheduling it.
  pub fn create<P, F>(self, sched: &mut Scheduler<P>, f: F) -> Result<TaskHandle, Error>
  where
    P: Platform,
    F: FnMut(&mut TaskCtx<'_, P>) + 'static,
  {
    sched.register(TaskName::new(self.name), TaskFn::Callback(Box::new(f)), self.on_remove, false)
  }

  /// Register a protothread task and schedule it immediately.
  pub fn start_proto<P, F>(self, sched: &mut Scheduler<P>, f: F) -> Result<TaskHandle, Error>
  where
    P: Platform,
    F: FnMut(&mut Pt<'_>, &mut TaskCtx<'_, P>) -> PtPoll + 'static,
  {
    sched.register(TaskName::new(self.name), TaskFn::Proto(Box::new(f)), self.on_remove, true)
  }

  /// Register a protothread task without scheduling it.
  pub fn create_proto<P, F>(self, sched: &mut Scheduler<P>, f: F) -> Result<TaskHandle, Error>
  where
    P: Platform,
    F: FnMut(&mut Pt<'_>, &mut TaskCtx<'_, P>) -> PtPoll + 'static,
  {
    sched.register(TaskName::new(self.name), TaskFn::Proto(Box::new(f)), self.on_remove, false)
  }
}
