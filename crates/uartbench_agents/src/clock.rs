//! Clock generation and synchronous reset.

use uartbench_common::Frequency;
use uartbench_sim::{SimHandle, SimTime, Signal, TaskHandle};

use crate::error::AgentError;

/// Drives a free-running clock on a signal.
///
/// Each period starts with the high half. Edges are placed at
/// `start + n * period` so the clock never drifts from its own origin.
pub struct Clock {
    sim: SimHandle,
    signal: Signal,
    period: SimTime,
}

impl Clock {
    /// A clock at `frequency`, period rounded to the nearest femtosecond.
    pub fn new(sim: &SimHandle, signal: Signal, frequency: Frequency) -> Self {
        Self::from_period(sim, signal, SimTime::from_fs(frequency.period_fs()))
    }

    /// A clock with an explicit period.
    pub fn from_period(sim: &SimHandle, signal: Signal, period: SimTime) -> Self {
        Self {
            sim: sim.clone(),
            signal,
            period,
        }
    }

    /// The clock period.
    pub fn period(&self) -> SimTime {
        self.period
    }

    /// The driven signal.
    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    /// Starts toggling. The task runs until the simulation ends.
    pub fn start(&self) -> Result<TaskHandle, AgentError> {
        let sim = self.sim.clone();
        let signal = self.signal.clone();
        let period = self.period;
        let high = SimTime::from_fs(period.fs / 2);
        tracing::debug!(clock = %signal.name(), %period, "starting clock");
        let task = self.sim.spawn(async move {
            let origin = sim.now();
            let mut cycle = 0u64;
            loop {
                let start = origin + SimTime::from_fs(period.fs * cycle);
                signal.set(1);
                sim.timer_until(start + high).await;
                signal.set(0);
                cycle += 1;
                sim.timer_until(origin + SimTime::from_fs(period.fs * cycle)).await;
            }
        })?;
        Ok(task)
    }

    /// Waits for `n` rising edges.
    pub async fn cycles(&self, n: u32) {
        for _ in 0..n {
            self.signal.rising_edge().await;
        }
    }
}

/// Level at which a reset input is active.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetPolarity {
    /// Reset while the line is 1 (e.g. `rst_i`).
    ActiveHigh,
    /// Reset while the line is 0 (e.g. `rst_n`).
    ActiveLow,
}

impl ResetPolarity {
    fn active(self) -> u64 {
        match self {
            ResetPolarity::ActiveHigh => 1,
            ResetPolarity::ActiveLow => 0,
        }
    }

    fn inactive(self) -> u64 {
        self.active() ^ 1
    }
}

/// Pulses a synchronous reset for one clock edge.
pub struct ResetDriver {
    reset: Signal,
    clock: Signal,
    polarity: ResetPolarity,
}

impl ResetDriver {
    /// Creates a driver for `reset`, synchronised to `clock`.
    pub fn new(reset: Signal, clock: Signal, polarity: ResetPolarity) -> Self {
        Self {
            reset,
            clock,
            polarity,
        }
    }

    /// Asserts reset, waits for one rising clock edge, then releases it.
    ///
    /// When this returns the device has sampled reset active on at least
    /// one edge.
    pub async fn assert_reset(&self) {
        self.reset.set(self.polarity.active());
        self.clock.rising_edge().await;
        self.reset.set(self.polarity.inactive());
        tracing::info!(reset = %self.reset.name(), "device reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use uartbench_sim::Simulator;

    #[test]
    fn clock_toggles_at_period() {
        let sim = Simulator::new();
        let h = sim.handle();
        let run = sim
            .run(async move {
                let clk = h.add_signal("clk", 1, 0).unwrap();
                let clock = Clock::from_period(&h, clk.clone(), SimTime::from_ns(100));
                clock.start().unwrap();
                let mut rises = Vec::new();
                let mut falls = Vec::new();
                for _ in 0..3 {
                    clk.rising_edge().await;
                    rises.push(h.now());
                    clk.falling_edge().await;
                    falls.push(h.now());
                }
                (rises, falls)
            })
            .unwrap();
        let (rises, falls) = run.output;
        assert_eq!(
            rises,
            vec![SimTime::ZERO, SimTime::from_ns(100), SimTime::from_ns(200)]
        );
        assert_eq!(
            falls,
            vec![
                SimTime::from_ns(50),
                SimTime::from_ns(150),
                SimTime::from_ns(250)
            ]
        );
    }

    #[test]
    fn clock_period_from_frequency() {
        let sim = Simulator::new();
        let h = sim.handle();
        let clk = h.add_signal("clk", 1, 0).unwrap();
        let clock = Clock::new(&h, clk, Frequency::from_hz(27_000_000));
        assert_eq!(clock.period(), SimTime::from_fs(37_037_037));
    }

    #[test]
    fn cycles_waits_for_rising_edges() {
        let sim = Simulator::new();
        let h = sim.handle();
        let run = sim
            .run(async move {
                let clk = h.add_signal("clk", 1, 0).unwrap();
                let clock = Clock::from_period(&h, clk, SimTime::from_ns(10));
                clock.start().unwrap();
                clock.cycles(1).await;
                let first = h.now();
                clock.cycles(4).await;
                (first, h.now())
            })
            .unwrap();
        assert_eq!(run.output, (SimTime::ZERO, SimTime::from_ns(40)));
    }

    #[test]
    fn reset_is_held_across_one_rising_edge() {
        let sim = Simulator::new();
        let h = sim.handle();
        let run = sim
            .run(async move {
                let clk = h.add_signal("clk", 1, 0).unwrap();
                let rst = h.add_signal("rst_n", 1, 1).unwrap();
                let clock = Clock::from_period(&h, clk.clone(), SimTime::from_ns(10));
                let seen = Rc::new(RefCell::new(Vec::new()));
                let log = seen.clone();
                let (watch_clk, watch_rst) = (clk.clone(), rst.clone());
                h.spawn(async move {
                    loop {
                        watch_clk.rising_edge().await;
                        log.borrow_mut().push(watch_rst.get());
                    }
                })
                .unwrap();
                clock.start().unwrap();
                clock.cycles(2).await;
                let reset = ResetDriver::new(rst.clone(), clk, ResetPolarity::ActiveLow);
                reset.assert_reset().await;
                clock.cycles(2).await;
                let levels = seen.borrow().clone();
                (levels, rst.get())
            })
            .unwrap();
        let (levels, final_level) = run.output;
        assert_eq!(final_level, 1);
        assert_eq!(levels.iter().filter(|&&v| v == 0).count(), 1);
    }
}
