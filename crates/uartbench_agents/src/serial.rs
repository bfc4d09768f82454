//! Asynchronous serial line agents.
//!
//! A frame is one start bit (0), eight data bits LSB first and one stop bit
//! (1). Bit `k` of a frame begins `round(k * 1e15 / baud)` femtoseconds after
//! the frame's start edge, so rounding never accumulates across a frame.

use std::cell::Cell;
use std::rc::Rc;

use uartbench_common::Frequency;
use uartbench_sim::{SimHandle, SimTime, Signal, TaskHandle};

use crate::error::{AgentError, FramingError};
use crate::queue::{Capture, TxQueue};
use crate::AgentPhase;

/// Bits in one frame: start, eight data, stop.
pub const BITS_PER_FRAME: u32 = 10;

/// Bit timing at one baud rate.
#[derive(Clone, Copy, Debug)]
struct BitClock {
    rate: Frequency,
}

impl BitClock {
    fn new(baud: u64) -> Self {
        Self {
            rate: Frequency::from_hz(baud),
        }
    }

    /// Offset of `bits` bit periods from a frame's start edge.
    fn offset(&self, bits: f64) -> SimTime {
        SimTime::from_fs(self.rate.periods_fs(bits))
    }

    fn frame(&self) -> SimTime {
        self.offset(f64::from(BITS_PER_FRAME))
    }
}

/// Line levels of one frame carrying `byte`, in transmission order.
fn frame_bits(byte: u8) -> [u64; BITS_PER_FRAME as usize] {
    let mut bits = [1u64; BITS_PER_FRAME as usize];
    bits[0] = 0;
    for i in 0..8 {
        bits[i + 1] = u64::from((byte >> i) & 1);
    }
    bits
}

/// Drives UART frames onto a line.
pub struct UartSource {
    sim: SimHandle,
    line: Signal,
    bit: BitClock,
    queue: Rc<TxQueue>,
    task: TaskHandle,
}

impl UartSource {
    /// Creates a source on `line` and starts its driving task.
    ///
    /// The line is put at its idle level (1) before any time passes.
    pub fn new(sim: &SimHandle, line: Signal, baud: u64) -> Result<Self, AgentError> {
        line.set_immediate(1);
        let bit = BitClock::new(baud);
        let queue = Rc::new(TxQueue::new());
        let task = spawn_driver(sim, &line, bit, &queue)?;
        tracing::debug!(line = %line.name(), baud, "serial source ready");
        Ok(Self {
            sim: sim.clone(),
            line,
            bit,
            queue,
            task,
        })
    }

    /// Queues bytes for transmission. Never suspends.
    pub fn write(&self, data: &[u8]) {
        self.queue.push(data);
    }

    /// Suspends until every queued byte has been sent, including the full
    /// stop bit of the last frame.
    pub async fn wait(&self) {
        self.queue.wait_idle().await;
    }

    /// Abandons the frame in flight and everything queued.
    ///
    /// The line returns to idle at the end of the current pass and a fresh
    /// driving task waits for new writes. Calling this twice in a row has
    /// the same effect as calling it once.
    pub fn restart(&mut self) -> Result<(), AgentError> {
        self.task.cancel();
        self.queue.reset();
        self.line.set(1);
        self.task = spawn_driver(&self.sim, &self.line, self.bit, &self.queue)?;
        tracing::debug!(line = %self.line.name(), "serial source restarted");
        Ok(())
    }

    /// Whether nothing is queued or in flight.
    pub fn is_idle(&self) -> bool {
        self.queue.is_idle()
    }

    /// Bytes queued and not yet started.
    pub fn count(&self) -> usize {
        self.queue.len()
    }

    /// Where the driving task is within its current frame.
    pub fn phase(&self) -> AgentPhase {
        self.queue.phase()
    }

    /// Duration of one frame at this source's baud rate.
    pub fn frame_period(&self) -> SimTime {
        self.bit.frame()
    }
}

fn spawn_driver(
    sim: &SimHandle,
    line: &Signal,
    bit: BitClock,
    queue: &Rc<TxQueue>,
) -> Result<TaskHandle, AgentError> {
    let task = drive(sim.clone(), line.clone(), bit, queue.clone());
    Ok(sim.spawn(task)?)
}

async fn drive(sim: SimHandle, line: Signal, bit: BitClock, queue: Rc<TxQueue>) {
    loop {
        queue.wait_queued().await;
        if !line.is_high() {
            // A restart cut a frame short: hold one idle bit so the next
            // start bit is a real falling edge.
            line.set(1);
            sim.timer(bit.offset(1.0)).await;
        }
        while let Some(byte) = queue.pop() {
            queue.set_phase(AgentPhase::MidFrame);
            let start = sim.now();
            tracing::debug!(line = %line.name(), byte, %start, "tx frame");
            for (k, level) in frame_bits(byte).into_iter().enumerate() {
                line.set(level);
                sim.timer_until(start + bit.offset((k + 1) as f64)).await;
            }
            queue.set_phase(AgentPhase::FrameComplete);
        }
        queue.mark_idle();
    }
}

type Received = Result<u8, FramingError>;

/// Reconstructs UART frames from a line.
///
/// Each bit is sampled once at its nominal center. Received bytes and
/// framing errors are buffered in arrival order until read.
pub struct UartSink {
    sim: SimHandle,
    line: Signal,
    bit: BitClock,
    capture: Rc<Capture<Received>>,
    phase: Rc<Cell<AgentPhase>>,
    task: TaskHandle,
}

impl UartSink {
    /// Creates a sink on `line` and starts its sampling task.
    pub fn new(sim: &SimHandle, line: Signal, baud: u64) -> Result<Self, AgentError> {
        let bit = BitClock::new(baud);
        let capture = Rc::new(Capture::new());
        let phase = Rc::new(Cell::new(AgentPhase::Idle));
        let task = spawn_sampler(sim, &line, bit, &capture, &phase)?;
        tracing::debug!(line = %line.name(), baud, "serial sink ready");
        Ok(Self {
            sim: sim.clone(),
            line,
            bit,
            capture,
            phase,
            task,
        })
    }

    /// Returns the oldest received byte, suspending until one arrives.
    ///
    /// A frame whose stop bit was low is returned as
    /// [`AgentError::Framing`] in its place.
    pub async fn read(&self) -> Result<u8, AgentError> {
        Ok(self.capture.pop().await?)
    }

    /// Takes everything buffered without suspending.
    ///
    /// If the buffer holds a framing error, the buffer is still emptied and
    /// the first error is returned.
    pub fn read_nowait(&self) -> Result<Vec<u8>, AgentError> {
        let mut bytes = Vec::new();
        let mut first_error = None;
        for entry in self.capture.drain() {
            match entry {
                Ok(byte) => bytes.push(byte),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(bytes),
        }
    }

    /// Reads exactly `n` bytes, suspending as needed.
    ///
    /// Nothing is taken from the buffer until all `n` entries (or a framing
    /// error among them) are present, so a read abandoned by a timeout
    /// leaves the partial data for [`read_nowait`](Self::read_nowait).
    pub async fn read_exact(&self, n: usize) -> Result<Vec<u8>, AgentError> {
        self.capture
            .wait_until(|entries| {
                entries.len() >= n || entries.iter().take(n).any(Result::is_err)
            })
            .await;
        let mut bytes = Vec::with_capacity(n);
        while bytes.len() < n {
            match self.capture.try_pop() {
                Some(entry) => bytes.push(entry?),
                None => break,
            }
        }
        Ok(bytes)
    }

    /// Drops any partial frame and everything buffered.
    ///
    /// The new sampling task ignores the line until it is high, so a restart
    /// in the middle of a frame never mistakes a data bit for a start bit
    /// edge while the line is low.
    pub fn restart(&mut self) -> Result<(), AgentError> {
        self.task.cancel();
        self.capture.clear();
        self.phase.set(AgentPhase::Idle);
        self.task = spawn_sampler(&self.sim, &self.line, self.bit, &self.capture, &self.phase)?;
        tracing::debug!(line = %self.line.name(), "serial sink restarted");
        Ok(())
    }

    /// Entries buffered and not yet read.
    pub fn count(&self) -> usize {
        self.capture.len()
    }

    /// Where the sampling task is within its current frame.
    pub fn phase(&self) -> AgentPhase {
        self.phase.get()
    }
}

fn spawn_sampler(
    sim: &SimHandle,
    line: &Signal,
    bit: BitClock,
    capture: &Rc<Capture<Received>>,
    phase: &Rc<Cell<AgentPhase>>,
) -> Result<TaskHandle, AgentError> {
    let task = sample(
        sim.clone(),
        line.clone(),
        bit,
        capture.clone(),
        phase.clone(),
    );
    Ok(sim.spawn(task)?)
}

async fn sample(
    sim: SimHandle,
    line: Signal,
    bit: BitClock,
    capture: Rc<Capture<Received>>,
    phase: Rc<Cell<AgentPhase>>,
) {
    loop {
        while !line.is_high() {
            line.rising_edge().await;
        }
        line.falling_edge().await;
        let start = sim.now();
        phase.set(AgentPhase::MidFrame);

        sim.timer_until(start + bit.offset(0.5)).await;
        if line.is_high() {
            tracing::debug!(line = %line.name(), %start, "start bit glitch ignored");
            phase.set(AgentPhase::Idle);
            continue;
        }

        let mut data = 0u8;
        for i in 0..8 {
            sim.timer_until(start + bit.offset(i as f64 + 1.5)).await;
            if line.is_high() {
                data |= 1 << i;
            }
        }

        sim.timer_until(start + bit.offset(9.5)).await;
        phase.set(AgentPhase::FrameComplete);
        if line.is_high() {
            tracing::debug!(line = %line.name(), byte = data, %start, "rx frame");
            capture.push(Ok(data));
        } else {
            tracing::warn!(line = %line.name(), data, %start, "stop bit low");
            capture.push(Err(FramingError { time: start, data }));
        }
    }
}
