use core::fmt;

use alloc::vec::Vec;

use super::{Discipline, TaskHandle, TaskName, TaskState};

/// Diagnostic snapshot of one scheduled task.
#[derive(Debug)]
pub struct TaskStatus {
  pub(crate) handle: TaskHandle,
  pub(crate) name: TaskName,
  pub(crate) discipline: Discipline,
  pub(crate) state: TaskState,
  pub(crate) points: Vec<u16>,
}

impl TaskStatus {
  /// Get the task handle.
  #[inline]
  pub fn handle(&self) -> TaskHandle {
    self.handle
  }

  /// Get the task name.
  #[inline]
  pub fn name(&self) -> &str {
    self.name.as_str()
  }

  /// Get the task discipline.
  #[inline]
  pub fn discipline(&self) -> Discipline {
    self.discipline
  }

  /// Get the task state.
  #[inline]
  pub fn state(&self) -> TaskState {
    self.state
  }

  /// Resume points of the protothread chain, outermost first.
  ///
  /// Empty for callback tasks.
  #[inline]
  pub fn resume_points(&self) -> &[u16] {
    &self.points
  }
}

/// Snapshot of every scheduled task, for field debugging.
#[derive(Debug)]
pub struct SystemState {
  pub(crate) tasks: Vec<TaskStatus>,
}

impl SystemState {
  /// The tasks, in visitation order.
  pub fn tasks(&self) -> &[TaskStatus] {
    &self.tasks
  }
}

impl fmt::Display for SystemState {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    f.write_str("scheduled tasks\r\n")?;

    writeln!(
      f,
      "{id: <6} | {name: <16} | {kind: <11} | {state: <9} | {points}",
      id = "ID",
      name = "Name",
      kind = "Kind",
      state = "State",
      points = "Resume points"
    )?;

    for task in &self.tasks {
      write!(
        f,
        "{id: <6} | {name: <16} | {kind: <11} | {state: <9} | ",
        id = task.handle.index,
        name = task.name(),
        kind = match task.discipline {
          Discipline::Callback => "callback",
          Discipline::Protothread => "protothread",
        },
        state = match task.state {
          TaskState::Scheduled => "scheduled",
          TaskState::Detached => "detached",
        },
      )?;

      for (depth, point) in task.points.iter().enumerate() {
        if depth > 0 {
          f.write_str(" -> ")?;
        }
        write!(f, "{}", point)?;
      }
      f.write_str("\r\n")?;
    }

    writeln!(f, "{} task(s)", self.tasks.len())
  }
}
