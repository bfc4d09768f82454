//! Deterministic discrete-event kernel for verifying clocked devices.
//!
//! Test agents are ordinary `async` tasks multiplexed on one simulated
//! timeline. They suspend only on timers, signal edges, events or each
//! other, and the kernel advances time only when every task is suspended, so
//! a run is fully determined by its inputs.
//!
//! # Usage
//!
//! ```ignore
//! use uartbench_sim::{Simulator, SimTime};
//!
//! let sim = Simulator::with_device(Box::new(my_device))?;
//! let h = sim.handle();
//! let run = sim.run(async move {
//!     let rx = h.signal("uart_rx_i")?;
//!     rx.set(0);
//!     h.timer(SimTime::from_us(8)).await;
//!     Ok::<_, uartbench_sim::SimError>(())
//! })?;
//! println!("finished at {}", run.final_time);
//! ```
//!
//! # Modules
//!
//! - `time`: femtosecond simulation time and duration parsing
//! - `signal`: named signals and their handles
//! - `trigger`: timers, edge waits and events
//! - `device`: the boundary a clocked device implements
//! - `kernel`: the timer queue, delta loop and task executor

#![warn(missing_docs)]

pub mod device;
pub mod error;
pub mod kernel;
pub mod signal;
pub mod time;
pub mod trigger;

pub use device::{Device, DeviceIo, Port, PortDirection};
pub use error::SimError;
pub use kernel::{SimHandle, SimRun, Simulator, TaskHandle};
pub use signal::{EdgeKind, Signal, SignalId};
pub use time::{ParseTimeError, SimTime};
pub use trigger::{EdgeWait, Event, EventWait, Timer};
