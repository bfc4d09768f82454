//! Cycle-level UART receiver and transmitter shared by both models.
//!
//! The engine is evaluated once per rising clock edge with the inputs sampled
//! at that edge and returns the registered outputs to present after it.

/// Bit timing in clock cycles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitTiming {
    /// Clock cycles per bit, rounded to nearest.
    pub clocks_per_bit: u32,
}

impl BitTiming {
    /// Timing for a `clock_hz` clock at `baud`.
    pub fn new(clock_hz: u64, baud: u64) -> Self {
        let clocks = (clock_hz + baud / 2) / baud.max(1);
        Self {
            clocks_per_bit: u32::try_from(clocks).unwrap_or(u32::MAX),
        }
    }

    fn half(&self) -> u32 {
        (self.clocks_per_bit / 2).saturating_sub(1)
    }

    fn last(&self) -> u32 {
        self.clocks_per_bit.saturating_sub(1)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
enum RxState {
    #[default]
    Idle,
    Start {
        count: u32,
    },
    Data {
        count: u32,
        bit: u8,
        shift: u8,
    },
    Stop {
        count: u32,
        shift: u8,
    },
}

/// Oversampling receiver behind a two-flop synchronizer.
#[derive(Clone, Debug)]
struct Receiver {
    timing: BitTiming,
    sync: [bool; 2],
    state: RxState,
}

impl Receiver {
    fn new(timing: BitTiming) -> Self {
        Self {
            timing,
            sync: [true; 2],
            state: RxState::Idle,
        }
    }

    fn reset(&mut self) {
        self.sync = [true; 2];
        self.state = RxState::Idle;
    }

    /// Advances one cycle; returns a byte when its stop bit checks out.
    fn step(&mut self, pin: bool) -> Option<u8> {
        let rx = self.sync[1];
        self.sync = [pin, self.sync[0]];

        let (next, received) = match self.state {
            RxState::Idle if !rx => (RxState::Start { count: 0 }, None),
            RxState::Idle => (RxState::Idle, None),
            RxState::Start { count } if count < self.timing.half() => {
                (RxState::Start { count: count + 1 }, None)
            }
            // Middle of the start bit: a high line means it was a glitch.
            RxState::Start { .. } if rx => (RxState::Idle, None),
            RxState::Start { .. } => (
                RxState::Data {
                    count: 0,
                    bit: 0,
                    shift: 0,
                },
                None,
            ),
            RxState::Data { count, bit, shift } if count < self.timing.last() => (
                RxState::Data {
                    count: count + 1,
                    bit,
                    shift,
                },
                None,
            ),
            RxState::Data { bit, shift, .. } => {
                let shift = shift | (u8::from(rx) << bit);
                if bit == 7 {
                    (RxState::Stop { count: 0, shift }, None)
                } else {
                    (
                        RxState::Data {
                            count: 0,
                            bit: bit + 1,
                            shift,
                        },
                        None,
                    )
                }
            }
            RxState::Stop { count, shift } if count < self.timing.last() => (
                RxState::Stop {
                    count: count + 1,
                    shift,
                },
                None,
            ),
            RxState::Stop { shift, .. } => (RxState::Idle, rx.then_some(shift)),
        };
        self.state = next;
        received
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
enum TxState {
    #[default]
    Idle,
    Busy {
        frame: u16,
        bit: u8,
        count: u32,
    },
}

/// Shift-register transmitter with a one-deep input handshake.
#[derive(Clone, Debug)]
struct Transmitter {
    timing: BitTiming,
    state: TxState,
    line: bool,
    ready: bool,
}

impl Transmitter {
    fn new(timing: BitTiming) -> Self {
        Self {
            timing,
            state: TxState::Idle,
            line: true,
            ready: false,
        }
    }

    fn reset(&mut self) {
        self.state = TxState::Idle;
        self.line = true;
        self.ready = false;
    }

    /// Advances one cycle. `offer` is the byte presented with `tvalid` high.
    /// Returns whether the offer was taken at this edge.
    fn step(&mut self, offer: Option<u8>) -> bool {
        match self.state {
            TxState::Idle => match offer {
                Some(byte) if self.ready => {
                    // Start bit, data LSB first, stop bit.
                    let frame = (u16::from(byte) << 1) | (1 << 9);
                    self.state = TxState::Busy {
                        frame,
                        bit: 0,
                        count: 0,
                    };
                    self.line = false;
                    self.ready = false;
                    true
                }
                _ => {
                    self.ready = true;
                    false
                }
            },
            TxState::Busy { frame, bit, count } => {
                if count < self.timing.last() {
                    self.state = TxState::Busy {
                        frame,
                        bit,
                        count: count + 1,
                    };
                } else if bit == 9 {
                    self.state = TxState::Idle;
                    self.line = true;
                    self.ready = true;
                } else {
                    let bit = bit + 1;
                    self.line = (frame >> bit) & 1 == 1;
                    self.state = TxState::Busy {
                        frame,
                        bit,
                        count: 0,
                    };
                }
                false
            }
        }
    }
}

/// Inputs sampled at one clock edge.
#[derive(Clone, Copy, Debug, Default)]
pub struct EngineInput {
    /// Reset is active.
    pub reset: bool,
    /// Serial receive pin.
    pub rx: bool,
    /// Byte offered for transmission, if `tvalid` is high.
    pub offer: Option<u8>,
}

/// Registered outputs after one clock edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineOutput {
    /// Serial transmit pin.
    pub tx: bool,
    /// Transmitter can take a byte at the next edge.
    pub ready: bool,
    /// Whether the offer was taken at this edge.
    pub accepted: bool,
    /// Byte received this cycle (a one-cycle valid pulse).
    pub received: Option<u8>,
}

/// A full-duplex UART: receiver plus transmitter sharing one bit timing.
#[derive(Clone, Debug)]
pub struct UartEngine {
    receiver: Receiver,
    transmitter: Transmitter,
}

impl UartEngine {
    /// An engine in its reset state.
    pub fn new(timing: BitTiming) -> Self {
        Self {
            receiver: Receiver::new(timing),
            transmitter: Transmitter::new(timing),
        }
    }

    /// Whether the transmitter would accept an offer at the next edge.
    pub fn ready(&self) -> bool {
        self.transmitter.ready
    }

    /// Evaluates one rising clock edge.
    pub fn step(&mut self, input: EngineInput) -> EngineOutput {
        if input.reset {
            self.receiver.reset();
            self.transmitter.reset();
            return EngineOutput {
                tx: true,
                ready: false,
                accepted: false,
                received: None,
            };
        }
        let received = self.receiver.step(input.rx);
        let accepted = self.transmitter.step(input.offer);
        EngineOutput {
            tx: self.transmitter.line,
            ready: self.transmitter.ready,
            accepted,
            received,
        }
    }
}
