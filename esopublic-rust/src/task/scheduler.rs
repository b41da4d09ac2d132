use alloc::boxed::Box;
use alloc::vec::Vec;
use core::mem;

use crate::error::Error;
use crate::platform::Platform;
use crate::power::PowerPolicy;
use crate::ticks::Ticks;

use super::name::TaskName;
use super::protothread::{Pt, PtPoll, PtState};
use super::state::{Discipline, TaskState};
use super::system_state::{SystemState, TaskStatus};

/// Identity of a registered task.
///
/// Handles are generational: once the task record is destroyed, every
/// operation through an old handle becomes a defensive no-op, even if the
/// slot has been reused for a new task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskHandle {
  pub(crate) index: u32,
  pub(crate) generation: u32,
}

pub(crate) enum TaskFn<P: Platform> {
  Callback(Box<dyn FnMut(&mut TaskCtx<'_, P>)>),
  Proto(Box<dyn FnMut(&mut Pt<'_>, &mut TaskCtx<'_, P>) -> PtPoll>),
  /// Placeholder while the function is out being executed.
  Vacant,
}

struct TaskData<P: Platform> {
  name: TaskName,
  func: TaskFn<P>,
  state: PtState,
  on_remove: Option<Box<dyn FnMut()>>,
  active: bool,
  next: Option<u32>,
  /// Bumped on every removal, so a tick in flight can tell that the task
  /// re-initialized itself while its function was out being executed.
  epoch: u32,
}

struct Slot<P: Platform> {
  generation: u32,
  task: Option<TaskData<P>>,
}

/// The cooperative task scheduler.
///
/// Keeps registered tasks in a slot arena and schedules the active ones in a
/// singly linked list, in insertion order. [`tick`](Scheduler::tick) is the
/// single driving loop of the firmware: it visits every scheduled task
/// exactly once per pass and afterwards consults the attached
/// [`PowerPolicy`] to decide whether to enter a low-power wait.
///
/// There is no preemption and no priority: a task body runs until it
/// returns, and list order is visitation order.
pub struct Scheduler<P: Platform> {
  platform: P,
  slots: Vec<Slot<P>>,
  head: Option<u32>,
  /// Next task the running pass will visit; kept valid by `remove`.
  cursor: Option<u32>,
  in_tick: bool,
  now: Ticks,
  power: Option<&'static PowerPolicy>,
}

impl<P: Platform> Scheduler<P> {
  /// Create a scheduler on top of the given platform.
  pub fn new(platform: P) -> Self {
    Self {
      platform,
      slots: Vec::new(),
      head: None,
      cursor: None,
      in_tick: false,
      now: Ticks::ZERO,
      power: None,
    }
  }

  /// Attach the sleep policy consulted after every pass.
  pub fn attach_power_policy(&mut self, policy: &'static PowerPolicy) {
    self.power = Some(policy);
  }

  /// The platform clock, read directly.
  pub fn now(&mut self) -> Ticks {
    self.platform.now()
  }

  /// Access the underlying platform.
  pub fn platform_mut(&mut self) -> &mut P {
    &mut self.platform
  }

  fn resolve(&self, handle: TaskHandle) -> Option<usize> {
    let slot = self.slots.get(handle.index as usize)?;
    if slot.generation == handle.generation && slot.task.is_some() {
      Some(handle.index as usize)
    } else {
      None
    }
  }

  pub(crate) fn register(
    &mut self,
    name: TaskName,
    func: TaskFn<P>,
    on_remove: Option<Box<dyn FnMut()>>,
    enqueue: bool,
  ) -> Result<TaskHandle, Error> {
    let data = TaskData {
      name,
      func,
      state: PtState::new(),
      on_remove,
      active: false,
      next: None,
      epoch: 0,
    };

    let index = match self.slots.iter().position(|slot| slot.task.is_none()) {
      Some(index) => {
        let slot = &mut self.slots[index];
        slot.generation = slot.generation.wrapping_add(1);
        slot.task = Some(data);
        index
      }
      None => {
        self.slots.try_reserve(1).map_err(|_| Error::OutOfMemory)?;
        self.slots.push(Slot { generation: 0, task: Some(data) });
        self.slots.len() - 1
      }
    };

    let handle = TaskHandle { index: index as u32, generation: self.slots[index].generation };

    #[cfg(feature = "log")]
    log::trace!("task '{}' registered as {:?}", name.as_str(), handle);

    if enqueue {
      self.add(handle);
    }

    Ok(handle)
  }

  /// Schedule the task. No-op if the handle is stale or the task is already
  /// scheduled; resets protothread state to its initial resume point.
  pub fn add(&mut self, handle: TaskHandle) {
    let Some(idx) = self.resolve(handle) else { return };
    let Some(task) = self.slots[idx].task.as_mut() else { return };
    if task.active {
      return;
    }

    task.active = true;
    task.next = None;
    task.state.reset();

    // Tail append: task counts are small, the linear walk is fine. The walk
    // doubles as a duplicate check.
    match self.head {
      None => self.head = Some(idx as u32),
      Some(first) => {
        let mut cur = first as usize;
        loop {
          if cur == idx {
            return;
          }
          match self.slots[cur].task.as_ref().and_then(|t| t.next) {
            Some(next) => cur = next as usize,
            None => {
              if let Some(tail) = self.slots[cur].task.as_mut() {
                tail.next = Some(idx as u32);
              }
              return;
            }
          }
        }
      }
    }
  }

  /// Unschedule the task: unlink it, run the owner's cleanup hook and
  /// release the protothread state chain. Removing a task that is not
  /// scheduled only releases the state chain; a stale handle is a no-op.
  /// The record itself stays registered and may be re-added.
  pub fn remove(&mut self, handle: TaskHandle) {
    if let Some(idx) = self.resolve(handle) {
      self.remove_index(idx);
    }
  }

  fn remove_index(&mut self, idx: usize) {
    let Some(task) = self.slots[idx].task.as_ref() else { return };
    let was_active = task.active;
    let next = task.next;

    if was_active {
      // Keep a running pass pointed at a live entry.
      if self.cursor == Some(idx as u32) {
        self.cursor = next;
      }

      if self.head == Some(idx as u32) {
        self.head = next;
      } else if let Some(first) = self.head {
        let mut cur = first as usize;
        loop {
          let Some(cur_next) = self.slots[cur].task.as_ref().and_then(|t| t.next) else {
            break;
          };
          if cur_next == idx as u32 {
            if let Some(prev) = self.slots[cur].task.as_mut() {
              prev.next = next;
            }
            break;
          }
          cur = cur_next as usize;
        }
      }
    }

    let Some(task) = self.slots[idx].task.as_mut() else { return };
    task.active = false;
    task.next = None;
    task.state.reset();
    task.epoch = task.epoch.wrapping_add(1);

    #[cfg(feature = "log")]
    log::trace!("task '{}' removed (was_active: {})", task.name.as_str(), was_active);

    // The cleanup hook only runs when the task actually left the list.
    let cleanup = if was_active { task.on_remove.take() } else { None };
    if let Some(mut hook) = cleanup {
      hook();
      if let Some(task) = self.slots[idx].task.as_mut() {
        task.on_remove = Some(hook);
      }
    }
  }

  /// Drop the task record entirely, unscheduling it first if needed.
  ///
  /// Afterwards the handle is stale and the slot may be reused.
  pub fn destroy(&mut self, handle: TaskHandle) {
    let Some(idx) = self.resolve(handle) else { return };
    if self.slots[idx].task.as_ref().map_or(false, |t| t.active) {
      self.remove_index(idx);
    }
    let slot = &mut self.slots[idx];
    slot.task = None;
    slot.generation = slot.generation.wrapping_add(1);
  }

  /// Whether the task is currently scheduled. Stale handles answer `false`.
  pub fn is_active(&self, handle: TaskHandle) -> bool {
    self
      .resolve(handle)
      .and_then(|idx| self.slots[idx].task.as_ref())
      .map_or(false, |task| task.active)
  }

  /// Rebind the task to a new callback function.
  ///
  /// Defensive re-init: the task is first taken through the removal path
  /// (unlink, cleanup hook, state release), then rebound detached. Re-add it
  /// with [`add`](Scheduler::add).
  pub fn rebind_callback<F>(&mut self, handle: TaskHandle, f: F)
  where
    F: FnMut(&mut TaskCtx<'_, P>) + 'static,
  {
    self.rebind(handle, TaskFn::Callback(Box::new(f)));
  }

  /// Rebind the task to a new protothread resume function.
  ///
  /// Same removal-first semantics as [`rebind_callback`](Self::rebind_callback).
  pub fn rebind_proto<F>(&mut self, handle: TaskHandle, f: F)
  where
    F: FnMut(&mut Pt<'_>, &mut TaskCtx<'_, P>) -> PtPoll + 'static,
  {
    self.rebind(handle, TaskFn::Proto(Box::new(f)));
  }

  fn rebind(&mut self, handle: TaskHandle, func: TaskFn<P>) {
    let Some(idx) = self.resolve(handle) else { return };
    self.remove_index(idx);
    if let Some(task) = self.slots[idx].task.as_mut() {
      task.func = func;
    }
  }

  /// Number of registered task records, scheduled or not.
  pub fn task_count(&self) -> usize {
    self.slots.iter().filter(|slot| slot.task.is_some()).count()
  }

  /// Number of currently scheduled tasks.
  pub fn active_count(&self) -> usize {
    let mut count = 0;
    let mut cur = self.head;
    while let Some(idx) = cur {
      count += 1;
      cur = self.slots[idx as usize].task.as_ref().and_then(|t| t.next);
    }
    count
  }

  /// One full scheduling pass.
  ///
  /// Visits every scheduled task once, in list order. Callback tasks are
  /// invoked unconditionally; protothread tasks are resumed and removed
  /// automatically when they report [`PtPoll::Finished`]. A task may remove
  /// itself, remove other tasks or register new ones while the pass runs
  /// without corrupting the walk: removals of not-yet-visited tasks skip
  /// them, new tasks are appended at the tail.
  ///
  /// After the pass, if the attached power policy allows it, the platform's
  /// bounded low-power wait is entered for up to the configured budget.
  pub fn tick(&mut self) {
    if self.in_tick {
      return;
    }
    self.in_tick = true;
    self.now = self.platform.now();

    self.cursor = self.head;
    while let Some(idx) = self.cursor {
      let idx = idx as usize;
      self.cursor = self.slots[idx].task.as_ref().and_then(|t| t.next);
      self.run_one(idx);
    }

    self.in_tick = false;

    if let Some(policy) = self.power {
      if let Some(budget) = policy.sleep_allowance() {
        let _slept = self.platform.sleep(budget);
      }
    }
  }

  fn run_one(&mut self, idx: usize) {
    let generation = self.slots[idx].generation;
    let (mut func, mut state, epoch) = {
      let Some(task) = self.slots[idx].task.as_mut() else { return };
      (mem::replace(&mut task.func, TaskFn::Vacant), mem::take(&mut task.state), task.epoch)
    };

    let handle = TaskHandle { index: idx as u32, generation };
    let finished = match &mut func {
      TaskFn::Callback(f) => {
        let mut ctx = TaskCtx { sched: self, handle };
        f(&mut ctx);
        false
      }
      TaskFn::Proto(f) => {
        let now = self.now;
        let mut pt = Pt::new(&mut state, now);
        let mut ctx = TaskCtx { sched: self, handle };
        f(&mut pt, &mut ctx) == PtPoll::Finished
      }
      TaskFn::Vacant => false,
    };

    if self.slots[idx].generation != generation {
      // The record was destroyed (and possibly replaced) during the call;
      // the taken function and state die here.
      return;
    }
    let Some(task) = self.slots[idx].task.as_mut() else { return };
    task.func = func;
    if task.epoch != epoch {
      // The body removed or re-initialized itself; its fresh state stands.
      return;
    }
    task.state = state;
    if finished {
      self.remove_index(idx);
    }
  }

  /// Read-only diagnostic walk over the scheduled tasks, in list order.
  pub fn system_state(&self) -> SystemState {
    let mut tasks = Vec::new();
    let mut cur = self.head;
    while let Some(idx) = cur {
      let Some(task) = self.slots[idx as usize].task.as_ref() else { break };
      let mut points = Vec::new();
      let discipline = match task.func {
        TaskFn::Proto(_) => {
          task.state.collect_points(&mut points);
          Discipline::Protothread
        }
        _ => Discipline::Callback,
      };
      tasks.push(TaskStatus {
        handle: TaskHandle { index: idx, generation: self.slots[idx as usize].generation },
        name: task.name,
        discipline,
        state: TaskState::Scheduled,
        points,
      });
      cur = task.next;
    }
    SystemState { tasks }
  }
}

/// Execution context handed to every task body.
///
/// Carries the pass-snapshot clock and the task's own handle, and gives
/// access back to the scheduler so a task can manage other tasks mid-pass.
pub struct TaskCtx<'a, P: Platform> {
  sched: &'a mut Scheduler<P>,
  handle: TaskHandle,
}

impl<'a, P: Platform> TaskCtx<'a, P> {
  /// The running task's own handle.
  pub fn handle(&self) -> TaskHandle {
    self.handle
  }

  /// The clock snapshot taken at the start of this pass.
  pub fn now(&self) -> Ticks {
    self.sched.now
  }

  /// The scheduler, for add/remove/rebind/spawn from within a task.
  pub fn scheduler(&mut self) -> &mut Scheduler<P> {
    self.sched
  }

  /// Unschedule the running task.
  pub fn remove_self(&mut self) {
    let handle = self.handle;
    self.sched.remove(handle);
  }
}
