//! Suspension points: timers, signal edges and events.
//!
//! Every future here is backed by a [`WaitSlot`] that the kernel (or an
//! [`Event`]) fires. A fired slot wakes its task; the task's next poll then
//! completes. A timer or edge wait dropped before its slot fires leaves the
//! slot with the kernel, where firing it later is harmless; an event wait
//! removes its slot from the event when dropped.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::kernel::Kernel;
use crate::signal::{EdgeKind, SignalId};
use crate::time::SimTime;

/// One-shot wakeup shared between a suspended future and whoever releases it.
pub(crate) struct WaitSlot {
    fired: Cell<bool>,
    waker: RefCell<Option<Waker>>,
}

impl WaitSlot {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            fired: Cell::new(false),
            waker: RefCell::new(None),
        })
    }

    pub(crate) fn fire(&self) {
        self.fired.set(true);
        if let Some(waker) = self.waker.borrow_mut().take() {
            waker.wake();
        }
    }

    fn poll(&self, cx: &mut Context<'_>) -> Poll<()> {
        if self.fired.get() {
            return Poll::Ready(());
        }
        let mut waker = self.waker.borrow_mut();
        match waker.as_ref() {
            Some(w) if w.will_wake(cx.waker()) => {}
            _ => *waker = Some(cx.waker().clone()),
        }
        Poll::Pending
    }
}

/// Completes once simulated time reaches a fixed point.
///
/// A timer whose deadline is not in the future completes on first poll
/// without yielding.
#[must_use = "timers do nothing unless awaited"]
pub struct Timer {
    kernel: Rc<Kernel>,
    at: SimTime,
    slot: Option<Rc<WaitSlot>>,
}

impl Timer {
    pub(crate) fn new(kernel: Rc<Kernel>, at: SimTime) -> Self {
        Self {
            kernel,
            at,
            slot: None,
        }
    }

    /// The absolute time at which the timer completes.
    pub fn deadline(&self) -> SimTime {
        self.at
    }
}

impl Future for Timer {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if let Some(slot) = &this.slot {
            return slot.poll(cx);
        }
        if this.at <= this.kernel.now() {
            return Poll::Ready(());
        }
        let slot = WaitSlot::new();
        let poll = slot.poll(cx);
        this.kernel.schedule_timer(this.at, slot.clone());
        this.slot = Some(slot);
        poll
    }
}

/// Completes on the next matching transition of a signal.
#[must_use = "edge triggers do nothing unless awaited"]
pub struct EdgeWait {
    kernel: Rc<Kernel>,
    signal: SignalId,
    kind: EdgeKind,
    slot: Option<Rc<WaitSlot>>,
}

impl EdgeWait {
    pub(crate) fn new(kernel: Rc<Kernel>, signal: SignalId, kind: EdgeKind) -> Self {
        Self {
            kernel,
            signal,
            kind,
            slot: None,
        }
    }
}

impl Future for EdgeWait {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if let Some(slot) = &this.slot {
            return slot.poll(cx);
        }
        let slot = WaitSlot::new();
        let poll = slot.poll(cx);
        this.kernel.add_waiter(this.signal, this.kind, slot.clone());
        this.slot = Some(slot);
        poll
    }
}

#[derive(Default)]
struct EventInner {
    set: Cell<bool>,
    waiters: RefCell<Vec<Rc<WaitSlot>>>,
}

/// A level-triggered flag tasks can wait on.
///
/// [`set`](Event::set) releases every current waiter and makes later waits
/// complete at once until [`clear`](Event::clear) is called.
#[derive(Clone, Default)]
pub struct Event {
    inner: Rc<EventInner>,
}

impl Event {
    /// Creates a cleared event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag and wakes all waiters.
    pub fn set(&self) {
        self.inner.set.set(true);
        let waiters = std::mem::take(&mut *self.inner.waiters.borrow_mut());
        for slot in waiters {
            slot.fire();
        }
    }

    /// Clears the flag.
    pub fn clear(&self) {
        self.inner.set.set(false);
    }

    /// Whether the flag is set.
    pub fn is_set(&self) -> bool {
        self.inner.set.get()
    }

    /// Completes once the flag is set.
    pub fn wait(&self) -> EventWait {
        EventWait {
            event: self.clone(),
            slot: None,
        }
    }
}

/// Future returned by [`Event::wait`].
#[must_use = "event waits do nothing unless awaited"]
pub struct EventWait {
    event: Event,
    slot: Option<Rc<WaitSlot>>,
}

impl Future for EventWait {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if let Some(slot) = &this.slot {
            return slot.poll(cx);
        }
        if this.event.is_set() {
            return Poll::Ready(());
        }
        let slot = WaitSlot::new();
        let poll = slot.poll(cx);
        this.event.inner.waiters.borrow_mut().push(slot.clone());
        this.slot = Some(slot);
        poll
    }
}

impl Drop for EventWait {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            if !slot.fired.get() {
                self.event
                    .inner
                    .waiters
                    .borrow_mut()
                    .retain(|w| !Rc::ptr_eq(w, &slot));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::task::noop_waker;

    #[test]
    fn slot_fires_once_polled() {
        let slot = WaitSlot::new();
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        assert!(slot.poll(&mut cx).is_pending());
        slot.fire();
        assert!(slot.poll(&mut cx).is_ready());
    }

    #[test]
    fn event_set_releases_waiter() {
        let event = Event::new();
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut wait = event.wait();
        assert!(Pin::new(&mut wait).poll(&mut cx).is_pending());
        event.set();
        assert!(Pin::new(&mut wait).poll(&mut cx).is_ready());
    }

    #[test]
    fn event_wait_after_set_is_immediate() {
        let event = Event::new();
        event.set();
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        assert!(Pin::new(&mut event.wait()).poll(&mut cx).is_ready());
        event.clear();
        assert!(!event.is_set());
        assert!(Pin::new(&mut event.wait()).poll(&mut cx).is_pending());
    }

    #[test]
    fn dropped_wait_leaves_no_waiter() {
        let event = Event::new();
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        for _ in 0..10 {
            let mut wait = event.wait();
            assert!(Pin::new(&mut wait).poll(&mut cx).is_pending());
        }
        assert!(event.inner.waiters.borrow().is_empty());

        let mut kept = event.wait();
        assert!(Pin::new(&mut kept).poll(&mut cx).is_pending());
        drop(event.wait());
        assert_eq!(event.inner.waiters.borrow().len(), 1);
        event.set();
        assert!(Pin::new(&mut kept).poll(&mut cx).is_ready());
    }
}
