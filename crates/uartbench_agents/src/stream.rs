//! Ready/valid streaming bus agents.
//!
//! A beat transfers on a rising clock edge at which `tvalid` is high and
//! `tready` is high. Buses without a `tready` signal accept every valid beat.

use std::rc::Rc;

use uartbench_sim::{SimError, SimHandle, Signal, TaskHandle};

use crate::error::AgentError;
use crate::queue::{Capture, TxQueue};
use crate::AgentPhase;

/// The signals of one streaming bus.
#[derive(Clone, Debug)]
pub struct StreamBus {
    /// Byte being presented.
    pub tdata: Signal,
    /// Driven high by the producer while `tdata` is meaningful.
    pub tvalid: Signal,
    /// Driven high by the consumer while it can accept a beat.
    pub tready: Option<Signal>,
}

impl StreamBus {
    /// Finds `{prefix}_tdata`, `{prefix}_tvalid` and, if present,
    /// `{prefix}_tready`.
    pub fn from_prefix(sim: &SimHandle, prefix: &str) -> Result<Self, AgentError> {
        let tdata = sim.signal(&format!("{prefix}_tdata"))?;
        let tvalid = sim.signal(&format!("{prefix}_tvalid"))?;
        let tready = match sim.signal(&format!("{prefix}_tready")) {
            Ok(signal) => Some(signal),
            Err(SimError::UnknownSignal(_)) => None,
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            tdata,
            tvalid,
            tready,
        })
    }

    /// Whether the consumer side is ready, as last sampled.
    fn ready(&self) -> bool {
        self.tready.as_ref().map_or(true, Signal::is_high)
    }

    fn name(&self) -> String {
        let name = self.tdata.name();
        name.strip_suffix("_tdata").unwrap_or(&name).to_string()
    }
}

/// Presents queued bytes on a streaming bus, one beat per transfer.
pub struct StreamSource {
    sim: SimHandle,
    bus: StreamBus,
    clock: Signal,
    queue: Rc<TxQueue>,
    task: TaskHandle,
}

impl StreamSource {
    /// Creates a source driving `bus`, synchronous to `clock`.
    pub fn new(sim: &SimHandle, bus: StreamBus, clock: Signal) -> Result<Self, AgentError> {
        bus.tvalid.set_immediate(0);
        let queue = Rc::new(TxQueue::new());
        let task = spawn_driver(sim, &bus, &clock, &queue)?;
        tracing::debug!(bus = %bus.name(), "stream source ready");
        Ok(Self {
            sim: sim.clone(),
            bus,
            clock,
            queue,
            task,
        })
    }

    /// Queues bytes, one beat each. Never suspends.
    pub fn write(&self, data: &[u8]) {
        self.queue.push(data);
    }

    /// Suspends until every queued byte has been accepted by the consumer.
    pub async fn wait(&self) {
        self.queue.wait_idle().await;
    }

    /// Drops the presented beat and everything queued, and deasserts `tvalid`.
    pub fn restart(&mut self) -> Result<(), AgentError> {
        self.task.cancel();
        self.queue.reset();
        self.bus.tvalid.set(0);
        self.task = spawn_driver(&self.sim, &self.bus, &self.clock, &self.queue)?;
        tracing::debug!(bus = %self.bus.name(), "stream source restarted");
        Ok(())
    }

    /// Whether nothing is queued or presented.
    pub fn is_idle(&self) -> bool {
        self.queue.is_idle()
    }

    /// Bytes queued and not yet presented.
    pub fn count(&self) -> usize {
        self.queue.len()
    }

    /// Whether a beat is currently presented and not yet accepted.
    pub fn phase(&self) -> AgentPhase {
        self.queue.phase()
    }
}

fn spawn_driver(
    sim: &SimHandle,
    bus: &StreamBus,
    clock: &Signal,
    queue: &Rc<TxQueue>,
) -> Result<TaskHandle, AgentError> {
    let task = drive(bus.clone(), clock.clone(), queue.clone());
    Ok(sim.spawn(task)?)
}

async fn drive(bus: StreamBus, clock: Signal, queue: Rc<TxQueue>) {
    let mut presented = None;
    loop {
        if presented.is_none() {
            queue.wait_queued().await;
        }
        clock.rising_edge().await;
        if let Some(byte) = presented {
            if !bus.ready() {
                continue;
            }
            tracing::debug!(bus = %bus.name(), byte, "beat accepted");
            presented = None;
            queue.set_phase(AgentPhase::FrameComplete);
        }
        match queue.pop() {
            Some(byte) => {
                bus.tdata.set(u64::from(byte));
                bus.tvalid.set(1);
                presented = Some(byte);
                queue.set_phase(AgentPhase::MidFrame);
            }
            None => {
                bus.tvalid.set(0);
                queue.mark_idle();
            }
        }
    }
}

/// Records every beat transferred on a streaming bus.
pub struct StreamMonitor {
    sim: SimHandle,
    bus: StreamBus,
    clock: Signal,
    capture: Rc<Capture<u8>>,
    task: TaskHandle,
}

impl StreamMonitor {
    /// Creates a monitor on `bus`, sampling on rising edges of `clock`.
    pub fn new(sim: &SimHandle, bus: StreamBus, clock: Signal) -> Result<Self, AgentError> {
        let capture = Rc::new(Capture::new());
        let task = spawn_monitor(sim, &bus, &clock, &capture)?;
        tracing::debug!(bus = %bus.name(), "stream monitor ready");
        Ok(Self {
            sim: sim.clone(),
            bus,
            clock,
            capture,
            task,
        })
    }

    /// Returns the oldest recorded byte, suspending until one arrives.
    pub async fn read(&self) -> u8 {
        self.capture.pop().await
    }

    /// Takes everything recorded so far without suspending.
    pub fn read_nowait(&self) -> Vec<u8> {
        self.capture.drain()
    }

    /// Reads exactly `n` bytes, suspending as needed.
    ///
    /// Bytes stay buffered until all `n` have been recorded; a read dropped
    /// before then takes nothing.
    pub async fn read_exact(&self, n: usize) -> Vec<u8> {
        self.capture.wait_until(|bytes| bytes.len() >= n).await;
        self.capture.take(n)
    }

    /// Discards everything recorded and starts observing afresh.
    pub fn restart(&mut self) -> Result<(), AgentError> {
        self.task.cancel();
        self.capture.clear();
        self.task = spawn_monitor(&self.sim, &self.bus, &self.clock, &self.capture)?;
        Ok(())
    }

    /// Bytes recorded and not yet read.
    pub fn count(&self) -> usize {
        self.capture.len()
    }
}

fn spawn_monitor(
    sim: &SimHandle,
    bus: &StreamBus,
    clock: &Signal,
    capture: &Rc<Capture<u8>>,
) -> Result<TaskHandle, AgentError> {
    let task = observe(bus.clone(), clock.clone(), capture.clone());
    Ok(sim.spawn(task)?)
}

async fn observe(bus: StreamBus, clock: Signal, capture: Rc<Capture<u8>>) {
    loop {
        clock.rising_edge().await;
        if bus.tvalid.is_high() && bus.ready() {
            let byte = (bus.tdata.get() & 0xff) as u8;
            tracing::debug!(bus = %bus.name(), byte, "beat observed");
            capture.push(byte);
        }
    }
}
