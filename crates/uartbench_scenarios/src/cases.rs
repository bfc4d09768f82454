//! The scenario catalogue and the body of each case.
//!
//! Every case starts the clock and resets the device, drives one or both
//! data paths, and compares what the far-side agent captured against what
//! was sent. Waits on the device are bounded by the environment's per-wait
//! timeout.

use rand::rngs::StdRng;
use rand::Rng;
use uartbench_config::VariantKind;
use uartbench_sim::SimTime;

use crate::env::{TopEnv, UartEnv};
use crate::error::ScenarioError;
use crate::report::Mismatch;

/// Payload of the basic and reset cases on the bare UART.
pub const GREETING: &[u8] = b"Hello, UART!";

/// Word repeated to build the jittered payload.
pub const JITTER_WORD: &[u8] = b"Hello World! ";

/// Repetitions of [`JITTER_WORD`] in the jittered payload.
pub const JITTER_REPEATS: usize = 5;

/// Commands sent through the wrapper in `basic_loopback`.
pub const LOOPBACK_COMMANDS: &[u8] = b"5678";

/// Replies the wrapper gives to [`LOOPBACK_COMMANDS`].
pub const LOOPBACK_REPLIES: &[u8] = b"\x0767\x07";

/// Commands the wrapper echoes unchanged.
pub const ECHOED_COMMANDS: &[u8] = b"67";

/// Frames of quiet line after the expected bytes before a case checks
/// that nothing else followed.
const SETTLE_FRAMES: f64 = 2.0;

/// Point within the first frame at which a reset case interrupts it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResetPoint {
    /// Label used in case names, e.g. `1/3`.
    pub label: &'static str,
    /// The frame is interrupted after `1 / divisor` of its duration.
    pub divisor: f64,
}

impl ResetPoint {
    /// Share of a frame elapsed before the reset.
    pub fn fraction(&self) -> f64 {
        1.0 / self.divisor
    }
}

/// Interruption points every reset case runs at.
pub const RESET_POINTS: [ResetPoint; 4] = [
    ResetPoint {
        label: "1/1.5",
        divisor: 1.5,
    },
    ResetPoint {
        label: "1/2",
        divisor: 2.0,
    },
    ResetPoint {
        label: "1/3",
        divisor: 3.0,
    },
    ResetPoint {
        label: "1/10",
        divisor: 10.0,
    },
];

/// A case against the bare UART core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UartCase {
    /// Serial in, bus out.
    BasicRx,
    /// Interrupt a serial frame with a reset, then receive cleanly.
    ResetRx(ResetPoint),
    /// Serial in one byte at a time with sub-clock gaps.
    RandomDelayRx,
    /// Bus in, serial out.
    BasicTx,
    /// Interrupt a transmitted frame with a reset, then transmit cleanly.
    ResetTx(ResetPoint),
    /// Bus in one byte at a time with gaps of up to ten frames.
    RandomDelayTx,
}

impl UartCase {
    fn name(self) -> String {
        match self {
            UartCase::BasicRx => "basic_rx".to_string(),
            UartCase::ResetRx(p) => format!("reset_rx[{}]", p.label),
            UartCase::RandomDelayRx => "random_delay_rx".to_string(),
            UartCase::BasicTx => "basic_tx".to_string(),
            UartCase::ResetTx(p) => format!("reset_tx[{}]", p.label),
            UartCase::RandomDelayTx => "random_delay_tx".to_string(),
        }
    }
}

/// A case against the board-level wrapper.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TopCase {
    /// Commands through the wrapper and its replies back.
    BasicLoopback,
    /// Interrupt a command with a reset, then loop back cleanly.
    ResetLoopback(ResetPoint),
}

impl TopCase {
    fn name(self) -> String {
        match self {
            TopCase::BasicLoopback => "basic_loopback".to_string(),
            TopCase::ResetLoopback(p) => format!("reset_loopback[{}]", p.label),
        }
    }
}

/// What a case does, and so which device it needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaseKind {
    /// Runs in a [`UartEnv`].
    Uart(UartCase),
    /// Runs in a [`TopEnv`].
    Top(TopCase),
}

impl CaseKind {
    /// The device variant the case runs against.
    pub fn variant(self) -> VariantKind {
        match self {
            CaseKind::Uart(_) => VariantKind::Uart,
            CaseKind::Top(_) => VariantKind::Top,
        }
    }

    /// Name as reported, with the reset point in brackets where there is one.
    pub fn name(self) -> String {
        match self {
            CaseKind::Uart(case) => case.name(),
            CaseKind::Top(case) => case.name(),
        }
    }
}

/// A named case.
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    /// Name as reported.
    pub name: String,
    /// What the case does.
    pub kind: CaseKind,
}

impl Case {
    fn new(kind: CaseKind) -> Self {
        Self {
            name: kind.name(),
            kind,
        }
    }
}

/// Every case for `variant`, in run order.
pub fn catalogue(variant: VariantKind) -> Vec<Case> {
    let kinds: Vec<CaseKind> = match variant {
        VariantKind::Uart => {
            let mut cases = vec![UartCase::BasicRx];
            cases.extend(RESET_POINTS.map(UartCase::ResetRx));
            cases.push(UartCase::RandomDelayRx);
            cases.push(UartCase::BasicTx);
            cases.extend(RESET_POINTS.map(UartCase::ResetTx));
            cases.push(UartCase::RandomDelayTx);
            cases.into_iter().map(CaseKind::Uart).collect()
        }
        VariantKind::Top => std::iter::once(TopCase::BasicLoopback)
            .chain(RESET_POINTS.map(TopCase::ResetLoopback))
            .map(CaseKind::Top)
            .collect(),
    };
    kinds.into_iter().map(Case::new).collect()
}

/// The jittered payload, [`JITTER_WORD`] repeated [`JITTER_REPEATS`] times.
pub fn jitter_payload() -> Vec<u8> {
    JITTER_WORD.repeat(JITTER_REPEATS)
}

/// A uniformly drawn gap in `[0, max]`.
fn random_gap(rng: &mut StdRng, max: SimTime) -> SimTime {
    SimTime::from_fs(rng.gen_range(0..=max.fs))
}

/// Runs a bare-UART case in `env`.
pub async fn run_uart_case(
    case: UartCase,
    env: &mut UartEnv,
    rng: &mut StdRng,
) -> Result<(), ScenarioError> {
    env.start().await?;
    match case {
        UartCase::BasicRx => receive(env, GREETING).await,
        UartCase::ResetRx(point) => {
            env.rx_source.write(b"X");
            env.sim()
                .timer(env.frame_period().mul_f64(point.fraction()))
                .await;
            env.reset_dut().await;
            env.rx_source.restart()?;
            // A beat the device presented on the reset edge is dropped too.
            let discarded = env.rx_monitor.count();
            env.rx_monitor.restart()?;
            tracing::debug!(discarded, "receive path cleared");
            receive(env, GREETING).await
        }
        UartCase::RandomDelayRx => {
            let payload = jitter_payload();
            for &byte in &payload {
                env.rx_source.write(&[byte]);
                env.within("serial source to drain", env.rx_source.wait())
                    .await?;
                let gap = random_gap(rng, env.clock_period());
                env.sim().timer(gap).await;
            }
            expect_on_bus(env, &payload).await
        }
        UartCase::BasicTx => transmit(env, GREETING).await,
        UartCase::ResetTx(point) => {
            // The reset point is measured from the byte's acceptance, which
            // is when the transmitter starts its frame.
            env.tx_source.write(b"X");
            env.within("transmitter to accept", env.tx_source.wait())
                .await?;
            env.sim()
                .timer(env.frame_period().mul_f64(point.fraction()))
                .await;
            env.reset_dut().await;
            env.tx_source.restart()?;
            env.tx_sink.restart()?;
            transmit(env, GREETING).await
        }
        UartCase::RandomDelayTx => {
            let payload = jitter_payload();
            let max_gap = env.frame_period().mul_f64(10.0);
            for &byte in &payload {
                env.tx_source.write(&[byte]);
                env.within("transmitter to accept", env.tx_source.wait())
                    .await?;
                let gap = random_gap(rng, max_gap);
                env.sim().timer(gap).await;
            }
            expect_on_line(env, &payload).await
        }
    }
}

/// Sends `data` on the serial pin and expects it, alone, on the bus.
async fn receive(env: &UartEnv, data: &[u8]) -> Result<(), ScenarioError> {
    env.rx_source.write(data);
    env.within("serial source to drain", env.rx_source.wait())
        .await?;
    expect_on_bus(env, data).await
}

/// Sends `data` on the bus and expects it, alone, on the serial pin.
async fn transmit(env: &UartEnv, data: &[u8]) -> Result<(), ScenarioError> {
    env.tx_source.write(data);
    env.within("transmitter to accept", env.tx_source.wait())
        .await?;
    expect_on_line(env, data).await
}

async fn expect_on_bus(env: &UartEnv, expected: &[u8]) -> Result<(), ScenarioError> {
    let what = format!("{} bytes on m_axis_rx", expected.len());
    let mut received = match env
        .within(&what, env.rx_monitor.read_exact(expected.len()))
        .await
    {
        Ok(bytes) => bytes,
        Err(timeout @ ScenarioError::Timeout { .. }) => {
            let partial = env.rx_monitor.read_nowait();
            return Err(short_read(expected, partial, timeout));
        }
        Err(other) => return Err(other),
    };
    env.sim()
        .timer(env.frame_period().mul_f64(SETTLE_FRAMES))
        .await;
    received.extend(env.rx_monitor.read_nowait());
    Ok(Mismatch::check(expected, &received)?)
}

async fn expect_on_line(env: &UartEnv, expected: &[u8]) -> Result<(), ScenarioError> {
    let what = format!("{} bytes on uart_tx_o", expected.len());
    let mut received = match env
        .within(&what, env.tx_sink.read_exact(expected.len()))
        .await
    {
        Ok(read) => read?,
        Err(timeout @ ScenarioError::Timeout { .. }) => {
            let partial = env.tx_sink.read_nowait()?;
            return Err(short_read(expected, partial, timeout));
        }
        Err(other) => return Err(other),
    };
    env.sim()
        .timer(env.frame_period().mul_f64(SETTLE_FRAMES))
        .await;
    received.extend(env.tx_sink.read_nowait()?);
    Ok(Mismatch::check(expected, &received)?)
}

/// Reports a read that ran out of time as a mismatch against what did arrive.
fn short_read(expected: &[u8], partial: Vec<u8>, timeout: ScenarioError) -> ScenarioError {
    match Mismatch::check(expected, &partial) {
        Err(mismatch) => {
            tracing::debug!(%timeout, received = partial.len(), "read ran out of time");
            mismatch.into()
        }
        Ok(()) => timeout,
    }
}

/// Runs a wrapper case in `env`.
pub async fn run_top_case(case: TopCase, env: &mut TopEnv) -> Result<(), ScenarioError> {
    env.start().await?;
    match case {
        TopCase::BasicLoopback => loopback(env, LOOPBACK_COMMANDS, LOOPBACK_REPLIES).await,
        TopCase::ResetLoopback(point) => {
            env.source.write(b"7");
            env.sim()
                .timer(env.frame_period().mul_f64(point.fraction()))
                .await;
            env.reset_dut().await;
            env.source.restart()?;
            env.sink.restart()?;
            loopback(env, ECHOED_COMMANDS, ECHOED_COMMANDS).await
        }
    }
}

async fn loopback(env: &TopEnv, commands: &[u8], replies: &[u8]) -> Result<(), ScenarioError> {
    env.source.write(commands);
    env.within("serial source to drain", env.source.wait())
        .await?;
    let what = format!("{} replies on uart_tx", replies.len());
    let mut received = match env
        .within(&what, env.sink.read_exact(replies.len()))
        .await
    {
        Ok(read) => read?,
        Err(timeout @ ScenarioError::Timeout { .. }) => {
            let partial = env.sink.read_nowait()?;
            return Err(short_read(replies, partial, timeout));
        }
        Err(other) => return Err(other),
    };
    env.sim()
        .timer(env.frame_period().mul_f64(SETTLE_FRAMES))
        .await;
    received.extend(env.sink.read_nowait()?);
    Ok(Mismatch::check(replies, &received)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn uart_catalogue_names() {
        let names: Vec<String> = catalogue(VariantKind::Uart)
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(
            names,
            [
                "basic_rx",
                "reset_rx[1/1.5]",
                "reset_rx[1/2]",
                "reset_rx[1/3]",
                "reset_rx[1/10]",
                "random_delay_rx",
                "basic_tx",
                "reset_tx[1/1.5]",
                "reset_tx[1/2]",
                "reset_tx[1/3]",
                "reset_tx[1/10]",
                "random_delay_tx",
            ]
        );
    }

    #[test]
    fn top_catalogue_names() {
        let cases = catalogue(VariantKind::Top);
        assert_eq!(cases.len(), 5);
        assert_eq!(cases[0].name, "basic_loopback");
        assert_eq!(cases[4].name, "reset_loopback[1/10]");
        assert!(cases.iter().all(|c| c.kind.variant() == VariantKind::Top));
    }

    #[test]
    fn reset_fractions() {
        let fractions: Vec<f64> = RESET_POINTS.iter().map(ResetPoint::fraction).collect();
        assert!((fractions[0] - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(fractions[1], 0.5);
        assert!((fractions[2] - 1.0 / 3.0).abs() < 1e-12);
        assert!((fractions[3] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn jitter_payload_is_sixty_five_bytes() {
        let payload = jitter_payload();
        assert_eq!(payload.len(), 65);
        assert!(payload.starts_with(b"Hello World! Hello"));
    }

    #[test]
    fn random_gaps_are_bounded_and_seeded() {
        let max = SimTime::from_ns(100);
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let gap = random_gap(&mut a, max);
            assert!(gap <= max);
            assert_eq!(gap, random_gap(&mut b, max));
        }
    }

    fn short_delivery(to_bus: bool) -> Result<(), ScenarioError> {
        use uartbench_models::UartCore;
        use uartbench_sim::Simulator;

        let core = UartCore::new(10_000_000, 115_200).unwrap();
        let sim = Simulator::with_device(Box::new(core)).unwrap();
        let h = sim.handle();
        sim.run(async move {
            let mut env = UartEnv::new(&h, SimTime::from_ms(1)).unwrap();
            env.start().await.unwrap();
            if to_bus {
                env.rx_source.write(b"ab");
                expect_on_bus(&env, b"abc").await
            } else {
                env.tx_source.write(b"ab");
                expect_on_line(&env, b"abc").await
            }
        })
        .unwrap()
        .output
    }

    #[test]
    fn missing_byte_reports_what_arrived() {
        for to_bus in [true, false] {
            match short_delivery(to_bus) {
                Err(ScenarioError::Mismatch(m)) => {
                    assert_eq!(m.expected, b"abc".to_vec());
                    assert_eq!(m.received, b"ab".to_vec());
                    assert_eq!(m.first_difference, 2);
                }
                other => panic!("expected a mismatch, got {other:?}"),
            }
        }
    }

    #[test]
    fn short_read_without_data_keeps_the_timeout() {
        let timeout = ScenarioError::Timeout {
            waiting_for: "0 bytes".to_string(),
            after: SimTime::from_ms(1),
        };
        assert_eq!(short_read(b"", Vec::new(), timeout.clone()), timeout);
        assert!(matches!(
            short_read(b"x", Vec::new(), timeout),
            ScenarioError::Mismatch(_)
        ));
    }
}
