use core::cell::Cell;

use critical_section::Mutex;

use crate::ticks::Ticks;

/// One registered "keep awake" vote bit.
///
/// Obtained from [`PowerPolicy::register_flag`] and owned by the subsystem
/// that wants veto power over low-power sleep. The token is `Copy` so it can
/// be stashed in interrupt handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreventionFlag {
  bit: u32,
}

/// Sleep policy for the scheduler: a per-cycle sleep budget plus a 32-entry
/// registry of sleep-prevention flags.
///
/// Subsystems that must keep the MCU awake (an active UART transfer, a
/// pending console line, ...) register a flag once and then set/clear it to
/// vote against sleeping. The scheduler enters its low-power wait only when
/// sleeping is enabled and no vote is outstanding.
///
/// All state lives behind [`critical_section::Mutex`], so flags may be set
/// and cleared from interrupt context. `new` is `const`, the intended use is
/// a `static`:
///
/// ```
/// use esopublic_rust::PowerPolicy;
///
/// static POWER: PowerPolicy = PowerPolicy::new();
///
/// let uart_busy = POWER.register_flag().unwrap();
/// POWER.set(uart_busy);
/// ```
pub struct PowerPolicy {
  registered: Mutex<Cell<u32>>,
  voted: Mutex<Cell<u32>>,
  budget_ms: Mutex<Cell<u32>>,
}

impl PowerPolicy {
  /// Create a policy with sleep disabled and no flags registered.
  pub const fn new() -> Self {
    Self {
      registered: Mutex::new(Cell::new(0)),
      voted: Mutex::new(Cell::new(0)),
      budget_ms: Mutex::new(Cell::new(0)),
    }
  }

  /// Enable sleep-seeking with the given per-cycle budget.
  ///
  /// A zero budget disables sleeping entirely.
  pub fn enable(&self, budget: impl Into<Ticks>) {
    let ms = budget.into().as_millis();
    critical_section::with(|cs| self.budget_ms.borrow(cs).set(ms));
  }

  /// Allocate an unused prevention flag, or `None` once all 32 are taken.
  pub fn register_flag(&self) -> Option<PreventionFlag> {
    critical_section::with(|cs| {
      let registered = self.registered.borrow(cs);
      let taken = registered.get();
      if taken == u32::MAX {
        return None;
      }
      // Lowest free bit.
      let bit = 1u32 << taken.trailing_ones();
      registered.set(taken | bit);
      Some(PreventionFlag { bit })
    })
  }

  /// Release a flag registration, clearing any outstanding vote.
  pub fn unregister_flag(&self, flag: PreventionFlag) {
    critical_section::with(|cs| {
      let registered = self.registered.borrow(cs);
      registered.set(registered.get() & !flag.bit);
      let voted = self.voted.borrow(cs);
      voted.set(voted.get() & !flag.bit);
    });
  }

  /// Assert this flag's "keep awake" vote. Ignored unless registered.
  pub fn set(&self, flag: PreventionFlag) {
    critical_section::with(|cs| {
      if self.registered.borrow(cs).get() & flag.bit != 0 {
        let voted = self.voted.borrow(cs);
        voted.set(voted.get() | flag.bit);
      }
    });
  }

  /// Retract this flag's vote. Ignored unless registered.
  pub fn clear(&self, flag: PreventionFlag) {
    critical_section::with(|cs| {
      if self.registered.borrow(cs).get() & flag.bit != 0 {
        let voted = self.voted.borrow(cs);
        voted.set(voted.get() & !flag.bit);
      }
    });
  }

  /// The currently outstanding vote mask.
  pub fn votes(&self) -> u32 {
    critical_section::with(|cs| self.voted.borrow(cs).get())
  }

  /// The sleep budget the scheduler may spend right now.
  ///
  /// `None` while sleeping is disabled or any vote is outstanding.
  pub fn sleep_allowance(&self) -> Option<Ticks> {
    critical_section::with(|cs| {
      let budget = self.budget_ms.borrow(cs).get();
      if budget == 0 || self.voted.borrow(cs).get() != 0 {
        None
      } else {
        Some(Ticks::from_millis(budget))
      }
    })
  }
}

impl Default for PowerPolicy {
  fn default() -> Self {
    Self::new()
  }
}
