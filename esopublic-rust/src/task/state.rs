/// How the scheduler drives a task on each pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Discipline {
  /// Plain callback, invoked unconditionally every tick until removed.
  Callback,
  /// Resumable protothread; removed automatically once it finishes.
  Protothread,
}

/// Scheduling state of a registered task.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TaskState {
  /// Linked into the scheduler's active list.
  Scheduled,
  /// Registered but not currently scheduled.
  Detached,
}
