//! PC emulation of the firmware main loop.
//!
//! Runs the cooperative scheduler on the host: a periodic heartbeat task, a
//! protothread assembling an outbound frame in the chunk pool, and the sleep
//! policy idling the "MCU" between passes once nothing vetoes it.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use esopublic_rust::*;

static POWER: PowerPolicy = PowerPolicy::new();

fn main() {
  let mut sched = Scheduler::new(StdPlatform::new());

  POWER.enable(Duration::from_millis(5));
  sched.attach_power_policy(&POWER);

  let pool = Rc::new(RefCell::new(MemPool::new(12, 512).unwrap()));

  let heartbeat = {
    let mut every = Periodic::new(Ticks::ZERO, Duration::from_millis(20));
    let mut beats = 0;
    Task::new()
      .name("heartbeat")
      .start(&mut sched, move |ctx| {
        if every.should_run(ctx.now()) {
          beats += 1;
          println!("[{:>5} ms] heartbeat #{}", ctx.now().as_millis(), beats);
          if beats == 5 {
            ctx.remove_self();
          }
        }
      })
      .unwrap()
  };

  // While the frame builder works, it vetoes sleeping.
  let busy = POWER.register_flag().unwrap();
  POWER.set(busy);

  {
    let pool = pool.clone();
    let mut frame: Option<Chain> = None;
    let mut pieces = 0;
    Task::new()
      .name("frame-builder")
      .on_remove(|| println!("frame-builder cleaned up"))
      .start_proto(&mut sched, move |pt, ctx| loop {
        match pt.point() {
          0 => {
            let chain = pool.borrow_mut().alloc(600).unwrap();
            println!(
              "[{:>5} ms] frame allocated ({} bytes)",
              ctx.now().as_millis(),
              pool.borrow().total_size(chain).unwrap()
            );
            frame = Some(chain);
            pt.advance(1);
          }
          1 => {
            let Some(chain) = frame else { return PtPoll::Finished };
            // Simulated slow producer: one piece of payload per tick.
            let mut pool = pool.borrow_mut();
            pool.append(chain, b"sensor-sample;", true).unwrap();
            pieces += 1;
            if pieces < 8 {
              return PtPoll::Yielded;
            }
            println!(
              "[{:>5} ms] frame holds {} byte(s)",
              ctx.now().as_millis(),
              pool.used_size(chain).unwrap()
            );
            pt.advance(2);
          }
          _ => {
            if let Some(chain) = frame.take() {
              pool.borrow_mut().free_chain(chain).unwrap();
            }
            POWER.clear(busy);
            println!("[{:>5} ms] frame sent, sleep permitted", ctx.now().as_millis());
            return PtPoll::Finished;
          }
        }
      })
      .unwrap();
  }

  println!("starting scheduler loop");
  for _ in 0..40 {
    sched.tick();
  }

  println!("{}", sched.system_state());
  sched.destroy(heartbeat);
  println!("done after {} ms", sched.now().as_millis());
}
