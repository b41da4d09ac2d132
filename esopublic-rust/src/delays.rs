use crate::ticks::Ticks;

/// Periodic interval timer.
///
/// Use inside a polling task: the task polls this instance every tick and
/// [`should_run`](Periodic::should_run) returns true once the period has
/// elapsed, resetting the timer for the next round. Time is passed in
/// explicitly, normally the pass-snapshot clock from the task context.
pub struct Periodic {
  last_run: Ticks,
  period: Ticks,
}

impl Periodic {
  /// Create a new timer with the set period, starting now.
  pub fn new(now: Ticks, period: impl Into<Ticks>) -> Periodic {
    Periodic { last_run: now, period: period.into() }
  }

  /// Has the set period passed? If it has, resets the internal timer.
  pub fn should_run(&mut self, now: Ticks) -> bool {
    if now.saturating_sub(self.last_run) < self.period {
      false
    } else {
      self.last_run = now;
      true
    }
  }

  /// Set a new period.
  pub fn set_period(&mut self, period: impl Into<Ticks>) {
    self.period = period.into();
  }

  /// Reset the internal timer to start counting from `now`.
  pub fn reset(&mut self, now: Ticks) {
    self.last_run = now;
  }
}
