//! # esopublic-rust
//!
//! Firmware foundation for small MCUs: a cooperative task scheduler with a
//! protothread concurrency model, a sleep/power policy overlay and a
//! fixed-chunk memory pool. The same code runs on embedded targets
//! (`no_std` + `alloc`) and on the PC (`std` feature) for emulation and
//! testing.
//!
//! The scheduler tick is the single driving loop of the firmware; every
//! subsystem registers a task and is visited once per pass. There is no
//! preemption: a task body runs until it returns, and protothreads are the
//! one mechanism for blocking-style waits.
//!
//! # Samples
//!
//! A periodic callback task (on the PC, [`StdPlatform`] would be the
//! platform of choice):
//!
//! ```rust
//! use esopublic_rust::*;
//! # struct Port(u32);
//! # impl Platform for Port {
//! #   fn now(&mut self) -> Ticks { self.0 += 1; Ticks::from_millis(self.0) }
//! #   fn sleep(&mut self, max: Ticks) -> Ticks { max }
//! # }
//!
//! let mut sched = Scheduler::new(Port(0));
//!
//! Task::new().name("heartbeat").start(&mut sched, |ctx| {
//!   let _ = ctx.now();
//! }).unwrap();
//!
//! sched.tick();
//! ```
//!
//! A protothread with a timed wait:
//!
//! ```rust
//! use esopublic_rust::*;
//! # struct Port(u32);
//! # impl Platform for Port {
//! #   fn now(&mut self) -> Ticks { self.0 += 1; Ticks::from_millis(self.0) }
//! #   fn sleep(&mut self, max: Ticks) -> Ticks { max }
//! # }
//!
//! let mut sched = Scheduler::new(Port(0));
//!
//! Task::new().name("rx").start_proto(&mut sched, |pt, _ctx| loop {
//!   match pt.point() {
//!     0 => match pt.wait_timeout(false, Ticks::from_millis(100)) {
//!       Wait::Pending => return PtPoll::Yielded,
//!       _ => pt.advance(1),
//!     },
//!     _ => return PtPoll::Finished,
//!   }
//! }).unwrap();
//!
//! sched.tick();
//! ```
//!
//! Chunked frame buffering:
//!
//! ```rust
//! use esopublic_rust::*;
//!
//! let mut pool = MemPool::new(12, 512).unwrap();
//! let frame = pool.alloc(600).unwrap();
//! pool.append(frame, b"payload", true).unwrap();
//! pool.free_chain(frame).unwrap();
//! ```

#![no_std]

#[cfg(feature = "std")]
extern crate std;

#[cfg(feature = "alloc")]
extern crate alloc;

mod delays;
mod error;
mod platform;
mod power;
mod ticks;

#[cfg(feature = "alloc")]
mod pool;
#[cfg(feature = "alloc")]
mod task;

pub use crate::delays::Periodic;
pub use crate::error::Error;
pub use crate::platform::{DelayPlatform, Platform};
#[cfg(feature = "std")]
pub use crate::platform::StdPlatform;
pub use crate::power::{PowerPolicy, PreventionFlag};
pub use crate::ticks::Ticks;

#[cfg(feature = "alloc")]
pub use crate::pool::{Chain, MemPool};
#[cfg(feature = "alloc")]
pub use crate::task::{
  Discipline, Pt, PtPoll, Scheduler, SystemState, Task, TaskBuilder, TaskCtx, TaskHandle, TaskName,
  TaskState, TaskStatus, Wait, MAX_TASK_NAME_LEN,
};
