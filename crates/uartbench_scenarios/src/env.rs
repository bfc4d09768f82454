//! Test environments: a device's clock, reset and agents wired to its pins.

use std::future::Future;

use uartbench_agents::{
    Clock, ResetDriver, ResetPolarity, StreamBus, StreamMonitor, StreamSource, UartSink,
    UartSource,
};
use uartbench_common::Frequency;
use uartbench_sim::{SimError, SimHandle, SimTime, TaskHandle};

use crate::error::ScenarioError;

/// Awaits `fut` for at most `budget` of simulated time.
pub async fn within<F: Future>(
    sim: &SimHandle,
    budget: SimTime,
    waiting_for: &str,
    fut: F,
) -> Result<F::Output, ScenarioError> {
    sim.with_timeout(budget, fut).await.map_err(|e| match e {
        SimError::Timeout { after } => ScenarioError::Timeout {
            waiting_for: waiting_for.to_string(),
            after,
        },
        other => other.into(),
    })
}

/// Clock and baud rate the attached device was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceTiming {
    /// `CLK_FREQ` in hertz.
    pub clock_hz: u64,
    /// `BAUD_RATE` in bits per second.
    pub baud: u64,
}

impl DeviceTiming {
    /// Reads the `CLK_FREQ` and `BAUD_RATE` parameters back from the device.
    pub fn read(sim: &SimHandle) -> Result<Self, ScenarioError> {
        Ok(Self {
            clock_hz: sim.parameter("CLK_FREQ")?,
            baud: sim.parameter("BAUD_RATE")?,
        })
    }
}

/// Environment around the bare UART core.
///
/// - `rx_source` drives `uart_rx_i`; `rx_monitor` observes `m_axis_rx`.
/// - `tx_source` feeds `s_axis_tx`; `tx_sink` samples `uart_tx_o`.
pub struct UartEnv {
    sim: SimHandle,
    clock: Clock,
    clock_task: Option<TaskHandle>,
    reset: ResetDriver,
    timing: DeviceTiming,
    timeout: SimTime,
    /// Serial source on the receive pin.
    pub rx_source: UartSource,
    /// Monitor on the received-byte bus.
    pub rx_monitor: StreamMonitor,
    /// Bus source feeding the transmitter.
    pub tx_source: StreamSource,
    /// Serial sink on the transmit pin.
    pub tx_sink: UartSink,
}

impl UartEnv {
    /// Binds agents to every port of the attached core.
    ///
    /// `timeout` bounds each wait made through [`within`](Self::within).
    pub fn new(sim: &SimHandle, timeout: SimTime) -> Result<Self, ScenarioError> {
        let timing = DeviceTiming::read(sim)?;
        let clk = sim.signal("clk_i")?;
        let clock = Clock::new(sim, clk.clone(), Frequency::from_hz(timing.clock_hz));
        let reset = ResetDriver::new(sim.signal("rst_i")?, clk.clone(), ResetPolarity::ActiveHigh);

        let rx_source = UartSource::new(sim, sim.signal("uart_rx_i")?, timing.baud)?;
        let tx_sink = UartSink::new(sim, sim.signal("uart_tx_o")?, timing.baud)?;
        let tx_source = StreamSource::new(sim, StreamBus::from_prefix(sim, "s_axis_tx")?, clk.clone())?;
        let rx_monitor = StreamMonitor::new(sim, StreamBus::from_prefix(sim, "m_axis_rx")?, clk)?;

        tracing::info!(
            clock_hz = timing.clock_hz,
            baud = timing.baud,
            "uart environment ready"
        );
        Ok(Self {
            sim: sim.clone(),
            clock,
            clock_task: None,
            reset,
            timing,
            timeout,
            rx_source,
            rx_monitor,
            tx_source,
            tx_sink,
        })
    }

    /// Starts the clock and resets the device.
    pub async fn start(&mut self) -> Result<(), ScenarioError> {
        if self.clock_task.is_none() {
            self.clock_task = Some(self.clock.start()?);
        }
        self.reset_dut().await;
        Ok(())
    }

    /// Holds reset for one rising clock edge.
    pub async fn reset_dut(&self) {
        self.reset.assert_reset().await;
    }

    /// Device clock and baud.
    pub fn timing(&self) -> DeviceTiming {
        self.timing
    }

    /// One clock period.
    pub fn clock_period(&self) -> SimTime {
        self.clock.period()
    }

    /// One serial frame at the device's baud rate.
    pub fn frame_period(&self) -> SimTime {
        self.rx_source.frame_period()
    }

    /// The kernel handle the agents run on.
    pub fn sim(&self) -> &SimHandle {
        &self.sim
    }

    /// Awaits `fut`, failing with a timeout after the per-wait budget.
    pub async fn within<F: Future>(
        &self,
        waiting_for: &str,
        fut: F,
    ) -> Result<F::Output, ScenarioError> {
        within(&self.sim, self.timeout, waiting_for, fut).await
    }
}

/// Environment around the board-level wrapper, which has serial pins only.
pub struct TopEnv {
    sim: SimHandle,
    clock: Clock,
    clock_task: Option<TaskHandle>,
    reset: ResetDriver,
    timing: DeviceTiming,
    timeout: SimTime,
    /// Serial source on `uart_rx`.
    pub source: UartSource,
    /// Serial sink on `uart_tx`.
    pub sink: UartSink,
}

impl TopEnv {
    /// Binds agents to the wrapper's pins.
    pub fn new(sim: &SimHandle, timeout: SimTime) -> Result<Self, ScenarioError> {
        let timing = DeviceTiming::read(sim)?;
        let clk = sim.signal("clk")?;
        let clock = Clock::new(sim, clk.clone(), Frequency::from_hz(timing.clock_hz));
        let reset = ResetDriver::new(sim.signal("rst_n")?, clk, ResetPolarity::ActiveLow);
        let source = UartSource::new(sim, sim.signal("uart_rx")?, timing.baud)?;
        let sink = UartSink::new(sim, sim.signal("uart_tx")?, timing.baud)?;

        tracing::info!(
            clock_hz = timing.clock_hz,
            baud = timing.baud,
            "top environment ready"
        );
        Ok(Self {
            sim: sim.clone(),
            clock,
            clock_task: None,
            reset,
            timing,
            timeout,
            source,
            sink,
        })
    }

    /// Starts the clock and resets the device.
    pub async fn start(&mut self) -> Result<(), ScenarioError> {
        if self.clock_task.is_none() {
            self.clock_task = Some(self.clock.start()?);
        }
        self.reset_dut().await;
        Ok(())
    }

    /// Holds `rst_n` low for one rising clock edge.
    pub async fn reset_dut(&self) {
        self.reset.assert_reset().await;
    }

    /// Device clock and baud.
    pub fn timing(&self) -> DeviceTiming {
        self.timing
    }

    /// One serial frame at the device's baud rate.
    pub fn frame_period(&self) -> SimTime {
        self.source.frame_period()
    }

    /// The kernel handle the agents run on.
    pub fn sim(&self) -> &SimHandle {
        &self.sim
    }

    /// Awaits `fut`, failing with a timeout after the per-wait budget.
    pub async fn within<F: Future>(
        &self,
        waiting_for: &str,
        fut: F,
    ) -> Result<F::Output, ScenarioError> {
        within(&self.sim, self.timeout, waiting_for, fut).await
    }
}
