//! Cooperative tasks: registration, scheduling, protothreads, diagnostics.
//!
//! A task is registered through [`Task::new`] and driven by
//! [`Scheduler::tick`]. Two disciplines exist: plain callbacks, invoked on
//! every pass until removed, and protothreads, resumable state machines the
//! scheduler removes automatically once they finish.

mod builder;
pub use builder::TaskBuilder;
mod name;
pub use name::{TaskName, MAX_TASK_NAME_LEN};
mod protothread;
pub use protothread::{Pt, PtPoll, Wait};
mod scheduler;
pub use scheduler::{Scheduler, TaskCtx, TaskHandle};
mod state;
pub use state::{Discipline, TaskState};
mod system_state;
pub use system_state::{SystemState, TaskStatus};

/// Entry point for registering a task.
#[non_exhaustive]
pub struct Task;

impl Task {
  /// Prepare a builder object for the new task.
  pub const fn new() -> TaskBuilder<'static> {
    TaskBuilder::new()
  }
}

#[cfg(test)]
mod tests {
  use alloc::rc::Rc;
  use alloc::vec::Vec;
  use core::cell::{Cell, RefCell};

  use crate::platform::testing::FakePlatform;
  use crate::power::PowerPolicy;
  use crate::ticks::Ticks;

  use super::*;

  fn scheduler() -> Scheduler<FakePlatform> {
    Scheduler::new(FakePlatform::new())
  }

  #[test]
  fn add_is_idempotent() {
    let mut sched = scheduler();
    let hits = Rc::new(Cell::new(0));

    let h = {
      let hits = hits.clone();
      Task::new()
        .name("counter")
        .create(&mut sched, move |_| hits.set(hits.get() + 1))
        .unwrap()
    };

    sched.add(h);
    sched.add(h);
    assert_eq!(sched.active_count(), 1);

    sched.tick();
    assert_eq!(hits.get(), 1);
  }

  #[test]
  fn remove_of_unscheduled_task_is_a_noop() {
    let mut sched = scheduler();
    let cleanups = Rc::new(Cell::new(0));

    let h = {
      let cleanups = cleanups.clone();
      Task::new()
        .name("idle")
        .on_remove(move || cleanups.set(cleanups.get() + 1))
        .create(&mut sched, |_| {})
        .unwrap()
    };

    sched.remove(h);
    assert_eq!(cleanups.get(), 0);
    assert_eq!(sched.active_count(), 0);

    sched.add(h);
    sched.remove(h);
    assert_eq!(cleanups.get(), 1);
  }

  #[test]
  fn tick_visits_tasks_in_insertion_order() {
    let mut sched = scheduler();
    let order = Rc::new(RefCell::new(Vec::new()));

    for name in ["a", "b", "c"] {
      let order = order.clone();
      Task::new()
        .name(name)
        .start(&mut sched, move |_| order.borrow_mut().push(name))
        .unwrap();
    }

    sched.tick();
    assert_eq!(*order.borrow(), ["a", "b", "c"]);

    sched.tick();
    assert_eq!(*order.borrow(), ["a", "b", "c", "a", "b", "c"]);
  }

  #[test]
  fn finishing_protothread_is_removed_without_disturbing_the_pass() {
    let mut sched = scheduler();
    let proto_runs = Rc::new(Cell::new(0));
    let callback_runs = Rc::new(Cell::new(0));

    let a = {
      let proto_runs = proto_runs.clone();
      Task::new()
        .name("one-shot")
        .start_proto(&mut sched, move |_, _| {
          proto_runs.set(proto_runs.get() + 1);
          PtPoll::Finished
        })
        .unwrap()
    };
    {
      let callback_runs = callback_runs.clone();
      Task::new()
        .name("steady")
        .start(&mut sched, move |_| callback_runs.set(callback_runs.get() + 1))
        .unwrap();
    }

    sched.tick();
    assert_eq!(proto_runs.get(), 1);
    assert_eq!(callback_runs.get(), 1);
    assert_eq!(sched.active_count(), 1);
    assert!(!sched.is_active(a));

    // The record survives auto-removal and can be restarted.
    sched.add(a);
    sched.tick();
    assert_eq!(proto_runs.get(), 2);
  }

  #[test]
  fn sleep_is_vetoed_until_the_flag_clears() {
    let policy: &'static PowerPolicy = alloc::boxed::Box::leak(Default::default());
    policy.enable(Ticks::from_millis(50));
    let flag = policy.register_flag().unwrap();

    let mut sched = scheduler();
    sched.attach_power_policy(policy);
    Task::new().name("noop").start(&mut sched, |_| {}).unwrap();

    policy.set(flag);
    sched.tick();
    assert!(sched.platform_mut().slept.is_empty());

    policy.clear(flag);
    sched.tick();
    assert_eq!(sched.platform_mut().slept, [Ticks::from_millis(50)]);
  }

  #[test]
  fn task_can_remove_its_successor_mid_pass() {
    let mut sched = scheduler();
    let order = Rc::new(RefCell::new(Vec::new()));

    let slot: Rc<Cell<Option<TaskHandle>>> = Rc::new(Cell::new(None));
    {
      let order = order.clone();
      let slot = slot.clone();
      Task::new()
        .name("a")
        .start(&mut sched, move |ctx| {
          order.borrow_mut().push("a");
          if let Some(b) = slot.get() {
            ctx.scheduler().remove(b);
          }
        })
        .unwrap();
    }
    let b = {
      let order = order.clone();
      Task::new().name("b").start(&mut sched, move |_| order.borrow_mut().push("b")).unwrap()
    };
    {
      let order = order.clone();
      Task::new().name("c").start(&mut sched, move |_| order.borrow_mut().push("c")).unwrap();
    }
    slot.set(Some(b));

    sched.tick();
    // "b" was unlinked while the walk stood on it; "c" still ran.
    assert_eq!(*order.borrow(), ["a", "c"]);
    assert_eq!(sched.active_count(), 2);
  }

  #[test]
  fn task_spawned_mid_pass_joins_at_the_tail() {
    let mut sched = scheduler();
    let order = Rc::new(RefCell::new(Vec::new()));

    {
      let order = order.clone();
      let spawned = Cell::new(false);
      Task::new()
        .name("spawner")
        .start(&mut sched, move |ctx| {
          order.borrow_mut().push("spawner");
          if !spawned.replace(true) {
            let order = order.clone();
            Task::new()
              .name("late")
              .start(ctx.scheduler(), move |_| order.borrow_mut().push("late"))
              .unwrap();
          }
        })
        .unwrap();
    }

    sched.tick();
    assert_eq!(*order.borrow(), ["spawner", "late"]);
  }

  #[test]
  fn protothread_self_removal_mid_resume_is_safe() {
    let mut sched = scheduler();
    let runs = Rc::new(Cell::new(0));

    {
      let runs = runs.clone();
      Task::new()
        .name("quitter")
        .start_proto(&mut sched, move |_, ctx| {
          runs.set(runs.get() + 1);
          ctx.remove_self();
          PtPoll::Yielded
        })
        .unwrap();
    }

    sched.tick();
    sched.tick();
    assert_eq!(runs.get(), 1);
    assert_eq!(sched.active_count(), 0);
  }

  #[test]
  fn timed_wait_is_driven_by_the_platform_clock() {
    let mut sched = scheduler();
    let outcome = Rc::new(Cell::new(None));

    {
      let outcome = outcome.clone();
      Task::new()
        .name("rx-timeout")
        .start_proto(&mut sched, move |pt, _| loop {
          match pt.point() {
            0 => match pt.wait_timeout(false, Ticks::from_millis(30)) {
              Wait::Pending => return PtPoll::Yielded,
              result => {
                outcome.set(Some(result));
                pt.advance(1);
              }
            },
            _ => return PtPoll::Finished,
          }
        })
        .unwrap();
    }

    sched.tick();
    assert_eq!(outcome.get(), None);

    sched.platform_mut().now = Ticks::from_millis(29);
    sched.tick();
    assert_eq!(outcome.get(), None);

    sched.platform_mut().now = Ticks::from_millis(30);
    sched.tick();
    assert_eq!(outcome.get(), Some(Wait::TimedOut));
    assert_eq!(sched.active_count(), 0);
  }

  #[test]
  fn stale_handles_never_touch_the_slot_reuser() {
    let mut sched = scheduler();

    let old = Task::new().name("old").start(&mut sched, |_| {}).unwrap();
    sched.destroy(old);
    assert!(!sched.is_active(old));

    // The slot is reused; the stale handle must stay inert.
    let new = Task::new().name("new").start(&mut sched, |_| {}).unwrap();
    assert_eq!(old.index, new.index);

    sched.remove(old);
    assert!(sched.is_active(new));
    sched.add(old);
    assert_eq!(sched.active_count(), 1);
  }

  #[test]
  fn rebind_goes_through_the_removal_path() {
    let mut sched = scheduler();
    let cleanups = Rc::new(Cell::new(0));
    let second_runs = Rc::new(Cell::new(0));

    let h = {
      let cleanups = cleanups.clone();
      Task::new()
        .name("reinit")
        .on_remove(move || cleanups.set(cleanups.get() + 1))
        .start(&mut sched, |_| {})
        .unwrap()
    };

    {
      let second_runs = second_runs.clone();
      sched.rebind_callback(h, move |_| second_runs.set(second_runs.get() + 1));
    }
    assert_eq!(cleanups.get(), 1);
    assert!(!sched.is_active(h));

    sched.add(h);
    sched.tick();
    assert_eq!(second_runs.get(), 1);
  }

  #[test]
  fn system_state_reports_names_and_resume_points() {
    let mut sched = scheduler();

    Task::new().name("console").start(&mut sched, |_| {}).unwrap();
    Task::new()
      .name("uplink")
      .start_proto(&mut sched, |pt, _| loop {
        match pt.point() {
          0 => pt.advance(4),
          4 => {
            pt.sub().advance(2);
            pt.advance(5);
            return PtPoll::Yielded;
          }
          _ => return PtPoll::Finished,
        }
      })
      .unwrap();

    sched.tick();

    let state = sched.system_state();
    let tasks = state.tasks();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].name(), "console");
    assert_eq!(tasks[0].discipline(), Discipline::Callback);
    assert_eq!(tasks[1].name(), "uplink");
    assert_eq!(tasks[1].resume_points(), [5, 2]);

    let rendered = alloc::format!("{}", state);
    assert!(rendered.contains("uplink"));
    assert!(rendered.contains("5 -> 2"));
  }
}
