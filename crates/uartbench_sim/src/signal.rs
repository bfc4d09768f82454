//! Named signals and the handles tasks use to read and drive them.
//!
//! Each signal has a flat [`SignalId`], a width of at most 64 bits, a current
//! value and a list of tasks waiting for it to change. Writes through
//! [`Signal::set`] are queued and applied together at the end of the current
//! evaluation pass, so every reader in a pass sees the same value.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::kernel::Kernel;
use crate::trigger::{EdgeWait, WaitSlot};

/// Opaque index of a signal in the kernel.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct SignalId(u32);

impl SignalId {
    /// Creates a `SignalId` from a raw index.
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub fn as_raw(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which value change wakes a waiting task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeKind {
    /// Bit 0 goes from 0 to 1.
    Rising,
    /// Bit 0 goes from 1 to 0.
    Falling,
    /// Any change of value.
    Any,
}

impl EdgeKind {
    fn matches(self, old: u64, new: u64) -> bool {
        match self {
            EdgeKind::Rising => old & 1 == 0 && new & 1 == 1,
            EdgeKind::Falling => old & 1 == 1 && new & 1 == 0,
            EdgeKind::Any => old != new,
        }
    }
}

/// Runtime state of one signal.
pub(crate) struct SignalState {
    pub(crate) name: String,
    pub(crate) width: u32,
    pub(crate) value: u64,
    pub(crate) waiters: Vec<(EdgeKind, Rc<WaitSlot>)>,
}

impl SignalState {
    pub(crate) fn new(name: String, width: u32, init: u64) -> Self {
        let mut state = Self {
            name,
            width,
            value: 0,
            waiters: Vec::new(),
        };
        state.value = state.mask(init);
        state
    }

    pub(crate) fn mask(&self, value: u64) -> u64 {
        if self.width >= 64 {
            value
        } else {
            value & ((1u64 << self.width) - 1)
        }
    }

    /// Removes and returns the waiters a change from `old` to `new` releases.
    pub(crate) fn take_released(&mut self, old: u64, new: u64) -> Vec<Rc<WaitSlot>> {
        let mut released = Vec::new();
        self.waiters.retain(|(kind, slot)| {
            if kind.matches(old, new) {
                released.push(slot.clone());
                false
            } else {
                true
            }
        });
        released
    }
}

/// A handle to a named signal.
///
/// Handles are cheap to clone; all clones refer to the same signal.
#[derive(Clone)]
pub struct Signal {
    kernel: Rc<Kernel>,
    id: SignalId,
}

impl Signal {
    pub(crate) fn new(kernel: Rc<Kernel>, id: SignalId) -> Self {
        Self { kernel, id }
    }

    /// The signal's flat ID.
    pub fn id(&self) -> SignalId {
        self.id
    }

    /// The signal's name.
    pub fn name(&self) -> String {
        self.kernel.signals.borrow()[self.id.index()].name.clone()
    }

    /// Width in bits.
    pub fn width(&self) -> u32 {
        self.kernel.signals.borrow()[self.id.index()].width
    }

    /// Current value.
    pub fn get(&self) -> u64 {
        self.kernel.signals.borrow()[self.id.index()].value
    }

    /// Whether bit 0 is currently 1.
    pub fn is_high(&self) -> bool {
        self.get() & 1 == 1
    }

    /// Drives a new value, applied at the end of the current evaluation pass.
    pub fn set(&self, value: u64) {
        self.kernel.pending.borrow_mut().push((self.id, value));
    }

    /// Overwrites the value at once without waking any waiter.
    ///
    /// Meant for establishing a line's rest level before time starts moving.
    pub fn set_immediate(&self, value: u64) {
        let mut signals = self.kernel.signals.borrow_mut();
        let state = &mut signals[self.id.index()];
        state.value = state.mask(value);
    }

    /// Completes on the next 0 to 1 transition of bit 0.
    pub fn rising_edge(&self) -> EdgeWait {
        EdgeWait::new(self.kernel.clone(), self.id, EdgeKind::Rising)
    }

    /// Completes on the next 1 to 0 transition of bit 0.
    pub fn falling_edge(&self) -> EdgeWait {
        EdgeWait::new(self.kernel.clone(), self.id, EdgeKind::Falling)
    }

    /// Completes on the next change of value.
    pub fn edge(&self) -> EdgeWait {
        EdgeWait::new(self.kernel.clone(), self.id, EdgeKind::Any)
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.name())
            .field("value", &self.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_id_roundtrip() {
        let id = SignalId::from_raw(7);
        assert_eq!(id.as_raw(), 7);
        assert_eq!(id.index(), 7);
    }

    #[test]
    fn init_value_is_masked_to_width() {
        let s = SignalState::new("data".into(), 8, 0x1ff);
        assert_eq!(s.value, 0xff);
        let wide = SignalState::new("wide".into(), 64, u64::MAX);
        assert_eq!(wide.value, u64::MAX);
    }

    #[test]
    fn edge_kinds() {
        assert!(EdgeKind::Rising.matches(0, 1));
        assert!(!EdgeKind::Rising.matches(1, 0));
        assert!(EdgeKind::Falling.matches(1, 0));
        assert!(!EdgeKind::Falling.matches(0, 0));
        assert!(EdgeKind::Any.matches(0x41, 0x42));
        assert!(!EdgeKind::Any.matches(3, 3));
    }

    #[test]
    fn released_waiters_are_removed() {
        let mut s = SignalState::new("clk".into(), 1, 0);
        s.waiters.push((EdgeKind::Rising, WaitSlot::new()));
        s.waiters.push((EdgeKind::Falling, WaitSlot::new()));
        let released = s.take_released(0, 1);
        assert_eq!(released.len(), 1);
        assert_eq!(s.waiters.len(), 1);
        assert_eq!(s.waiters[0].0, EdgeKind::Falling);
    }
}
