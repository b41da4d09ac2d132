use core::ops::{Add, Sub};
use core::time::Duration;

/// Duration or point in time, in milliseconds.
///
/// The scheduler keeps all of its timing in whole milliseconds, which is the
/// granularity the platform clock provides. All blocking helpers accept any
/// type convertible to `Ticks`; in particular a [`Duration`] converts
/// seamlessly, saturating at [`Ticks::MAX`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Ticks {
  ms: u32,
}

impl Ticks {
  /// Zero milliseconds.
  pub const ZERO: Ticks = Ticks { ms: 0 };
  /// The largest representable duration.
  pub const MAX: Ticks = Ticks { ms: u32::MAX };

  /// Create `Ticks` from milliseconds.
  pub const fn from_millis(ms: u32) -> Self {
    Self { ms }
  }

  /// The raw millisecond count.
  pub const fn as_millis(self) -> u32 {
    self.ms
  }

  /// Saturating addition, for deadline arithmetic near the clock limit.
  pub const fn saturating_add(self, rhs: Ticks) -> Ticks {
    Ticks { ms: self.ms.saturating_add(rhs.ms) }
  }

  /// Saturating subtraction.
  pub const fn saturating_sub(self, rhs: Ticks) -> Ticks {
    Ticks { ms: self.ms.saturating_sub(rhs.ms) }
  }
}

impl From<u32> for Ticks {
  fn from(ms: u32) -> Self {
    Self::from_millis(ms)
  }
}

impl From<Ticks> for u32 {
  fn from(ticks: Ticks) -> Self {
    ticks.ms
  }
}

impl From<Duration> for Ticks {
  /// Convert a `Duration` to `Ticks`, saturating at [`Ticks::MAX`].
  fn from(duration: Duration) -> Self {
    Self { ms: duration.as_millis().try_into().unwrap_or(u32::MAX) }
  }
}

impl Add for Ticks {
  type Output = Ticks;

  fn add(self, rhs: Ticks) -> Ticks {
    self.saturating_add(rhs)
  }
}

impl Sub for Ticks {
  type Output = Ticks;

  fn sub(self, rhs: Ticks) -> Ticks {
    self.saturating_sub(rhs)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn duration_max_saturates() {
    assert_eq!(Ticks::from(Duration::MAX), Ticks::MAX);
    assert_eq!(Ticks::from(Duration::from_millis(250)), Ticks::from_millis(250));
  }

  #[test]
  fn deadline_arithmetic_saturates() {
    assert_eq!(Ticks::MAX + Ticks::from_millis(1), Ticks::MAX);
    assert_eq!(Ticks::ZERO - Ticks::from_millis(1), Ticks::ZERO);
  }
}
