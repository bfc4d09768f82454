//! Top-level wrapper: the UART core behind a small command responder.

use std::collections::VecDeque;

use uartbench_sim::{Device, DeviceIo, Port};

use crate::engine::{EngineInput, UartEngine};
use crate::error::ModelError;
use crate::uart_core::checked_timing;

/// Fixed clock of the wrapper's board.
pub const TOP_CLOCK_HZ: u64 = 27_000_000;
/// Fixed baud rate of the wrapper's serial port.
pub const TOP_BAUD: u64 = 250_000;
/// Byte sent back for commands the wrapper does not recognise (ASCII BEL).
pub const NAK: u8 = 0x07;
/// Depth of the response queue in front of the transmitter.
pub const RESPONSE_DEPTH: usize = 16;

const RST_N: usize = 1;
const RX: usize = 2;
const TX: usize = 3;

/// Replies to each received command byte: `'6'` and `'7'` are echoed, any
/// other byte is answered with [`NAK`].
///
/// Reset (`rst_n`) is synchronous and active low; it clears pending replies.
pub struct TopWrapper {
    engine: UartEngine,
    responses: VecDeque<u8>,
}

impl TopWrapper {
    /// A wrapper at its fixed 27 MHz / 250000 baud.
    pub fn new() -> Result<Self, ModelError> {
        let timing = checked_timing(TOP_CLOCK_HZ, TOP_BAUD)?;
        Ok(Self {
            engine: UartEngine::new(timing),
            responses: VecDeque::with_capacity(RESPONSE_DEPTH),
        })
    }

    fn respond(command: u8) -> u8 {
        match command {
            b'6' | b'7' => command,
            _ => NAK,
        }
    }
}

impl Device for TopWrapper {
    fn name(&self) -> &str {
        "top"
    }

    fn ports(&self) -> Vec<Port> {
        vec![
            Port::input("clk", 0),
            Port::input("rst_n", 1),
            Port::input("uart_rx", 1),
            Port::output("uart_tx", 1),
        ]
    }

    fn clock_port(&self) -> &'static str {
        "clk"
    }

    fn parameters(&self) -> Vec<(&'static str, u64)> {
        vec![("CLK_FREQ", TOP_CLOCK_HZ), ("BAUD_RATE", TOP_BAUD)]
    }

    fn on_clock_edge(&mut self, io: &mut DeviceIo<'_>) {
        let reset = !io.is_high(RST_N);
        if reset {
            self.responses.clear();
        }
        let offer = if self.engine.ready() {
            self.responses.front().copied()
        } else {
            None
        };
        let out = self.engine.step(EngineInput {
            reset,
            rx: io.is_high(RX),
            offer,
        });
        if out.accepted {
            self.responses.pop_front();
        }
        if let Some(command) = out.received {
            if self.responses.len() < RESPONSE_DEPTH {
                self.responses.push_back(Self::respond(command));
            } else {
                tracing::warn!(command, "response queue full, command dropped");
            }
        }
        io.set(TX, u64::from(out.tx));
    }
}
