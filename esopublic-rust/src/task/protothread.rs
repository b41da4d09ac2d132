use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::ticks::Ticks;

/// Result of one protothread resume.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[must_use = "the scheduler needs this to know whether the task is done"]
pub enum PtPoll {
  /// The protothread yielded and wants to be resumed on the next tick.
  Yielded,
  /// The protothread reached its terminal point; the scheduler removes it.
  Finished,
}

/// Outcome of a timed conditional wait.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[must_use = "a pending wait must make the protothread yield"]
pub enum Wait {
  /// Neither the condition nor the deadline has been met yet.
  Pending,
  /// The condition came true before the deadline.
  Ready,
  /// The deadline passed with the condition still false.
  TimedOut,
}

/// Saved execution state of a protothread: the resume point, an optional
/// armed deadline and an optional child protothread state.
///
/// The child link forms a chain, so a protothread can drive nested
/// sub-state-machines without extra task records; the whole chain is
/// released whenever the state is reset.
#[derive(Default)]
pub(crate) struct PtState {
  point: u16,
  deadline: Option<Ticks>,
  sub: Option<Box<PtState>>,
}

impl PtState {
  pub(crate) const fn new() -> Self {
    Self { point: 0, deadline: None, sub: None }
  }

  /// Back to the initial resume point, deadline disarmed, child chain freed.
  pub(crate) fn reset(&mut self) {
    self.point = 0;
    self.deadline = None;
    self.sub = None;
  }

  /// Resume points of this state and every nested child, outermost first.
  pub(crate) fn collect_points(&self, out: &mut Vec<u16>) {
    out.push(self.point);
    if let Some(sub) = &self.sub {
      sub.collect_points(out);
    }
  }
}

/// Handle to a protothread's resumable state, passed to its resume function
/// on every tick.
///
/// A protothread body is written as a dispatch over [`point`](Pt::point):
///
/// ```ignore
/// |pt, _ctx| loop {
///   match pt.point() {
///     0 => {
///       start_transfer();
///       pt.advance(1);
///     }
///     1 => {
///       // Conditional yield: re-polled once per tick.
///       if !pt.wait_until(transfer_done()) {
///         return PtPoll::Yielded;
///       }
///       pt.advance(2);
///     }
///     _ => return PtPoll::Finished,
///   }
/// }
/// ```
///
/// Running past a `match` arm without returning continues on the same tick;
/// returning [`PtPoll::Yielded`] hands control back to the scheduler and the
/// body re-enters at the saved point on the task's next turn.
pub struct Pt<'a> {
  state: &'a mut PtState,
  now: Ticks,
}

impl<'a> Pt<'a> {
  pub(crate) fn new(state: &'a mut PtState, now: Ticks) -> Self {
    Self { state, now }
  }

  /// The saved resume point.
  pub fn point(&self) -> u16 {
    self.state.point
  }

  /// Move the resume point, disarming any pending deadline.
  pub fn advance(&mut self, point: u16) {
    self.state.point = point;
    self.state.deadline = None;
  }

  /// The pass-snapshot clock of the current tick.
  pub fn now(&self) -> Ticks {
    self.now
  }

  /// Conditional wait: returns whether the protothread may proceed.
  ///
  /// On `false` the body must return [`PtPoll::Yielded`]; the condition is
  /// then re-evaluated once per tick.
  pub fn wait_until(&self, cond: bool) -> bool {
    cond
  }

  /// Conditional wait with a timeout.
  ///
  /// The deadline is armed the first time the wait is evaluated at the
  /// current resume point and disarmed once the wait completes either way.
  /// Timeout granularity is the tick rate, not wall-clock precision.
  pub fn wait_timeout(&mut self, cond: bool, timeout: impl Into<Ticks>) -> Wait {
    let deadline = match self.state.deadline {
      Some(deadline) => deadline,
      None => {
        let deadline = self.now.saturating_add(timeout.into());
        self.state.deadline = Some(deadline);
        deadline
      }
    };

    if cond {
      self.state.deadline = None;
      Wait::Ready
    } else if self.now >= deadline {
      self.state.deadline = None;
      Wait::TimedOut
    } else {
      Wait::Pending
    }
  }

  /// State of the child protothread, allocated on first use.
  ///
  /// Lets one task drive a nested sub-state-machine; the child's chain is
  /// freed with the parent.
  pub fn sub(&mut self) -> Pt<'_> {
    let sub: &mut PtState = self.state.sub.get_or_insert_with(Default::default);
    Pt { state: sub, now: self.now }
  }

  /// Drop the child protothread state (and everything below it).
  pub fn clear_sub(&mut self) {
    self.state.sub = None;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timed_wait_arms_once_and_times_out() {
    let mut state = PtState::new();

    let mut pt = Pt::new(&mut state, Ticks::from_millis(100));
    assert_eq!(pt.wait_timeout(false, Ticks::from_millis(50)), Wait::Pending);

    // Deadline stays anchored at the first evaluation.
    let mut pt = Pt::new(&mut state, Ticks::from_millis(149));
    assert_eq!(pt.wait_timeout(false, Ticks::from_millis(50)), Wait::Pending);

    let mut pt = Pt::new(&mut state, Ticks::from_millis(150));
    assert_eq!(pt.wait_timeout(false, Ticks::from_millis(50)), Wait::TimedOut);
    assert!(state.deadline.is_none());
  }

  #[test]
  fn timed_wait_completes_early_on_condition() {
    let mut state = PtState::new();

    let mut pt = Pt::new(&mut state, Ticks::from_millis(0));
    assert_eq!(pt.wait_timeout(false, Ticks::from_millis(50)), Wait::Pending);

    let mut pt = Pt::new(&mut state, Ticks::from_millis(10));
    assert_eq!(pt.wait_timeout(true, Ticks::from_millis(50)), Wait::Ready);
    assert!(state.deadline.is_none());
  }

  #[test]
  fn advance_disarms_deadline() {
    let mut state = PtState::new();
    let mut pt = Pt::new(&mut state, Ticks::ZERO);
    let _ = pt.wait_timeout(false, Ticks::from_millis(5));
    pt.advance(3);
    assert_eq!(pt.point(), 3);
    assert!(state.deadline.is_none());
  }

  #[test]
  fn sub_chain_is_reported_and_released() {
    let mut state = PtState::new();
    let mut pt = Pt::new(&mut state, Ticks::ZERO);
    pt.advance(2);
    pt.sub().advance(7);

    let mut points = Vec::new();
    state.collect_points(&mut points);
    assert_eq!(points, [2, 7]);

    state.reset();
    let mut points = Vec::new();
    state.collect_points(&mut points);
    assert_eq!(points, [0]);
  }
}
