//! The bare UART core with streaming-bus interfaces.

use uartbench_sim::{Device, DeviceIo, Port};

use crate::engine::{BitTiming, EngineInput, UartEngine};
use crate::error::ModelError;

// Port indices, in `ports()` order; clk_i is 0.
const RST: usize = 1;
const RX: usize = 2;
const TX: usize = 3;
const S_TDATA: usize = 4;
const S_TVALID: usize = 5;
const S_TREADY: usize = 6;
const M_TDATA: usize = 7;
const M_TVALID: usize = 8;

/// UART core: bytes arriving on `uart_rx_i` are emitted on `m_axis_rx`, and
/// bytes accepted on `s_axis_tx` are sent on `uart_tx_o`.
///
/// Reset (`rst_i`) is synchronous and active high. `s_axis_tx_tready` is low
/// in reset and while a frame is being sent. `m_axis_rx_tvalid` pulses for
/// one cycle per received byte.
pub struct UartCore {
    clock_hz: u64,
    baud: u64,
    engine: UartEngine,
}

impl UartCore {
    /// A core built for a `clock_hz` clock at `baud`.
    pub fn new(clock_hz: u64, baud: u64) -> Result<Self, ModelError> {
        let timing = checked_timing(clock_hz, baud)?;
        Ok(Self {
            clock_hz,
            baud,
            engine: UartEngine::new(timing),
        })
    }
}

/// Rejects rates the engine cannot represent with at least four clocks per bit.
pub(crate) fn checked_timing(clock_hz: u64, baud: u64) -> Result<BitTiming, ModelError> {
    if baud == 0 {
        return Err(ModelError::InvalidTiming { clock_hz, baud });
    }
    let timing = BitTiming::new(clock_hz, baud);
    if timing.clocks_per_bit < 4 {
        return Err(ModelError::InvalidTiming { clock_hz, baud });
    }
    Ok(timing)
}

impl Device for UartCore {
    fn name(&self) -> &str {
        "uart"
    }

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::input("clk_i", 0),
            Port::input("rst_i", 0),
            Port::input("uart_rx_i", 1),
            Port::output("uart_tx_o", 1),
            Port::input("s_axis_tx_tdata", 0).with_width(8),
            Port::input("s_axis_tx_tvalid", 0),
            Port::output("s_axis_tx_tready", 0),
            Port::output("m_axis_rx_tdata", 0).with_width(8),
            Port::output("m_axis_rx_tvalid", 0),
        ]
    }

    fn clock_port(&self) -> &'static str {
        "clk_i"
    }

    fn parameters(&self) -> Vec<(&'static str, u64)> {
        vec![("CLK_FREQ", self.clock_hz), ("BAUD_RATE", self.baud)]
    }

    fn on_clock_edge(&mut self, io: &mut DeviceIo<'_>) {
        let offer = io
            .is_high(S_TVALID)
            .then(|| (io.get(S_TDATA) & 0xff) as u8);
        let out = self.engine.step(EngineInput {
            reset: io.is_high(RST),
            rx: io.is_high(RX),
            offer,
        });
        io.set(TX, u64::from(out.tx));
        io.set(S_TREADY, u64::from(out.ready));
        match out.received {
            Some(byte) => {
                io.set(M_TDATA, u64::from(byte));
                io.set(M_TVALID, 1);
            }
            None => io.set(M_TVALID, 0),
        }
    }
}
