use crate::ticks::Ticks;

/// Timing services the host platform supplies to the scheduler.
///
/// Every port of the library provides exactly two primitives: a millisecond
/// clock and a bounded low-power wait. On MCUs the clock usually comes from a
/// hardware timer; ports without one keep a software counter instead (see
/// [`DelayPlatform`]). The sleep primitive is allowed to wake early; it
/// reports how long it actually slept so software clocks stay accurate.
pub trait Platform {
  /// Milliseconds since an arbitrary epoch (typically boot).
  fn now(&mut self) -> Ticks;

  /// Enter a low-power wait for at most `max`, returning the time actually
  /// spent sleeping.
  fn sleep(&mut self, max: Ticks) -> Ticks;
}

/// Platform backed by an [`embedded_hal`] millisecond delay.
///
/// For ports without a free-running hardware timer: the millisecond clock is
/// maintained in software. Time spent in [`Platform::sleep`] is accounted
/// automatically; time spent elsewhere must be reported by the port (e.g.
/// from a periodic timer interrupt) via [`DelayPlatform::advance`].
pub struct DelayPlatform<D> {
  delay: D,
  clock_ms: u32,
}

impl<D> DelayPlatform<D>
where
  D: embedded_hal::blocking::delay::DelayMs<u32>,
{
  /// Wrap a delay implementation, starting the software clock at zero.
  pub fn new(delay: D) -> Self {
    Self { delay, clock_ms: 0 }
  }

  /// Credit externally elapsed time to the software clock.
  pub fn advance(&mut self, elapsed: impl Into<Ticks>) {
    self.clock_ms = self.clock_ms.saturating_add(elapsed.into().as_millis());
  }
}

impl<D> Platform for DelayPlatform<D>
where
  D: embedded_hal::blocking::delay::DelayMs<u32>,
{
  fn now(&mut self) -> Ticks {
    Ticks::from_millis(self.clock_ms)
  }

  fn sleep(&mut self, max: Ticks) -> Ticks {
    // DelayMs blocks for the full request, so the whole budget is consumed.
    self.delay.delay_ms(max.as_millis());
    self.clock_ms = self.clock_ms.saturating_add(max.as_millis());
    max
  }
}

/// Host platform for PC emulation, backed by `std::time` and `std::thread`.
#[cfg(feature = "std")]
pub struct StdPlatform {
  epoch: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdPlatform {
  /// Create a platform whose clock starts now.
  pub fn new() -> Self {
    Self { epoch: std::time::Instant::now() }
  }
}

#[cfg(feature = "std")]
impl Default for StdPlatform {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(feature = "std")]
impl Platform for StdPlatform {
  fn now(&mut self) -> Ticks {
    Ticks::from_millis(self.epoch.elapsed().as_millis().try_into().unwrap_or(u32::MAX))
  }

  fn sleep(&mut self, max: Ticks) -> Ticks {
    let before = self.now();
    std::thread::sleep(core::time::Duration::from_millis(max.as_millis() as u64));
    self.now() - before
  }
}
