//! Per-agent byte queues and capture buffers.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use uartbench_sim::Event;

use crate::AgentPhase;

/// Pending bytes of a source plus the state its driving task reports back.
pub(crate) struct TxQueue {
    bytes: RefCell<VecDeque<u8>>,
    phase: Cell<AgentPhase>,
    /// Set while nothing is queued or in flight.
    idle: Event,
    /// Set when bytes are queued; the driving task clears it before sleeping.
    queued: Event,
}

impl TxQueue {
    pub(crate) fn new() -> Self {
        let queue = Self {
            bytes: RefCell::new(VecDeque::new()),
            phase: Cell::new(AgentPhase::Idle),
            idle: Event::new(),
            queued: Event::new(),
        };
        queue.idle.set();
        queue
    }

    pub(crate) fn push(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.bytes.borrow_mut().extend(data.iter().copied());
        self.idle.clear();
        self.queued.set();
    }

    pub(crate) fn pop(&self) -> Option<u8> {
        self.bytes.borrow_mut().pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.borrow().len()
    }

    pub(crate) fn phase(&self) -> AgentPhase {
        self.phase.get()
    }

    pub(crate) fn set_phase(&self, phase: AgentPhase) {
        self.phase.set(phase);
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.len() == 0 && self.phase.get() != AgentPhase::MidFrame
    }

    /// Records that the driver found nothing to send.
    pub(crate) fn mark_idle(&self) {
        self.phase.set(AgentPhase::Idle);
        self.idle.set();
    }

    /// Suspends until something is queued.
    pub(crate) async fn wait_queued(&self) {
        while self.len() == 0 {
            self.queued.clear();
            self.queued.wait().await;
        }
    }

    /// Suspends until the queue is drained and the last unit has finished.
    pub(crate) async fn wait_idle(&self) {
        while !self.is_idle() {
            self.idle.wait().await;
        }
    }

    /// Drops everything queued and returns to idle.
    pub(crate) fn reset(&self) {
        self.bytes.borrow_mut().clear();
        self.mark_idle();
    }
}

/// Received items awaiting a reader, oldest first.
pub(crate) struct Capture<T> {
    items: RefCell<VecDeque<T>>,
    ready: Event,
}

impl<T> Capture<T> {
    pub(crate) fn new() -> Self {
        Self {
            items: RefCell::new(VecDeque::new()),
            ready: Event::new(),
        }
    }

    pub(crate) fn push(&self, item: T) {
        self.items.borrow_mut().push_back(item);
        self.ready.set();
    }

    /// Removes the oldest item, suspending until one exists.
    pub(crate) async fn pop(&self) -> T {
        loop {
            if let Some(item) = self.items.borrow_mut().pop_front() {
                return item;
            }
            self.ready.clear();
            self.ready.wait().await;
        }
    }

    /// Removes the oldest item if there is one.
    pub(crate) fn try_pop(&self) -> Option<T> {
        self.items.borrow_mut().pop_front()
    }

    /// Suspends until `ready` holds for the buffered items. Removes nothing,
    /// so a reader dropped while waiting leaves the buffer intact.
    pub(crate) async fn wait_until(&self, ready: impl Fn(&VecDeque<T>) -> bool) {
        while !ready(&self.items.borrow()) {
            self.ready.clear();
            self.ready.wait().await;
        }
    }

    /// Removes up to `n` of the oldest items.
    pub(crate) fn take(&self, n: usize) -> Vec<T> {
        let mut items = self.items.borrow_mut();
        let n = n.min(items.len());
        items.drain(..n).collect()
    }

    pub(crate) fn drain(&self) -> Vec<T> {
        self.items.borrow_mut().drain(..).collect()
    }

    pub(crate) fn clear(&self) {
        self.items.borrow_mut().clear();
        self.ready.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.items.borrow().len()
    }
}
