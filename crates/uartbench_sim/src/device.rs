//! The device-under-test boundary.
//!
//! A [`Device`] is a clocked circuit the kernel treats as a black box: it
//! declares its ports and parameters once, and is evaluated on every rising
//! edge of its clock port. Agents never see the device itself, only the
//! signals the kernel creates for its ports.

/// Direction of a device port, seen from the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortDirection {
    /// Driven by the test environment, read by the device.
    Input,
    /// Driven by the device.
    Output,
}

/// A declared device port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Port {
    /// Signal name the kernel registers for this port.
    pub name: &'static str,
    /// Port direction.
    pub direction: PortDirection,
    /// Width in bits (1..=64).
    pub width: u32,
    /// Value the signal holds before anything drives it.
    pub init: u64,
}

impl Port {
    /// A 1-bit input port initialised to `init`.
    pub const fn input(name: &'static str, init: u64) -> Self {
        Self {
            name,
            direction: PortDirection::Input,
            width: 1,
            init,
        }
    }

    /// A 1-bit output port initialised to `init`.
    pub const fn output(name: &'static str, init: u64) -> Self {
        Self {
            name,
            direction: PortDirection::Output,
            width: 1,
            init,
        }
    }

    /// Returns the port with a different width.
    pub const fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }
}

/// Port values sampled at a clock edge, plus the outputs the device drives
/// in response.
///
/// Ports are addressed by their index in [`Device::ports`]. Output writes do
/// not take effect until one delta cycle after the edge, so every task woken
/// by the same edge still observes the values the device sampled.
pub struct DeviceIo<'a> {
    sampled: &'a [u64],
    writes: Vec<(usize, u64)>,
}

impl<'a> DeviceIo<'a> {
    pub(crate) fn new(sampled: &'a [u64]) -> Self {
        Self {
            sampled,
            writes: Vec::new(),
        }
    }

    /// Value of port `port` at the edge.
    pub fn get(&self, port: usize) -> u64 {
        self.sampled[port]
    }

    /// Whether 1-bit port `port` was high at the edge.
    pub fn is_high(&self, port: usize) -> bool {
        self.sampled[port] & 1 == 1
    }

    /// Drives output port `port` to `value` after the edge.
    pub fn set(&mut self, port: usize, value: u64) {
        self.writes.push((port, value));
    }

    pub(crate) fn into_writes(self) -> Vec<(usize, u64)> {
        self.writes
    }
}

/// A synchronous circuit attached to the kernel.
pub trait Device {
    /// Name used in log output.
    fn name(&self) -> &str;

    /// The ports the device exposes, in the order [`DeviceIo`] indexes them.
    fn ports(&self) -> Vec<Port>;

    /// Name of the port whose rising edge triggers [`Device::on_clock_edge`].
    fn clock_port(&self) -> &'static str;

    /// Build-time parameters agents may read back, e.g. `BAUD_RATE`.
    fn parameters(&self) -> Vec<(&'static str, u64)> {
        Vec::new()
    }

    /// Evaluates one rising clock edge.
    fn on_clock_edge(&mut self, io: &mut DeviceIo<'_>);
}
