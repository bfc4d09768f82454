//! Simulation kernel: timer queue, delta-cycle loop and cooperative executor.
//!
//! [`Simulator`] owns a single-threaded task pool and the shared [`Kernel`]
//! state. A time step runs in passes: every runnable task is polled until
//! none can make progress, then the signal writes they queued are applied.
//! Applying writes may trigger the attached device (on a rising edge of its
//! clock) and wake tasks waiting on edges, which starts another pass. When a
//! pass applies nothing, the kernel jumps to the earliest pending timer.
//!
//! Device outputs computed at a clock edge are queued behind the edge, so
//! tasks released by that edge observe the values the device sampled, as a
//! registered circuit would present them.

use std::cell::{Cell, RefCell};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::future::Future;
use std::rc::Rc;

use futures::executor::{LocalPool, LocalSpawner};
use futures::future::{self, AbortHandle, Either};
use futures::task::LocalSpawnExt;

use crate::device::{Device, DeviceIo};
use crate::error::SimError;
use crate::signal::{EdgeKind, Signal, SignalId, SignalState};
use crate::time::SimTime;
use crate::trigger::{Timer, WaitSlot};

/// A pending timer in the kernel's queue.
struct TimerEntry {
    at: SimTime,
    /// Insertion order, so timers sharing a deadline fire first-in first-out.
    seq: u64,
    slot: Rc<WaitSlot>,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        (self.at, self.seq) == (other.at, other.seq)
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.at, self.seq).cmp(&(other.at, other.seq))
    }
}

/// The device attached to the kernel together with its port bindings.
struct AttachedDevice {
    device: Box<dyn Device>,
    clock: SignalId,
    ports: Vec<SignalId>,
}

/// Shared kernel state, reachable from every task through [`SimHandle`].
pub(crate) struct Kernel {
    now: Cell<SimTime>,
    seq: Cell<u64>,
    timers: RefCell<BinaryHeap<Reverse<TimerEntry>>>,
    pub(crate) signals: RefCell<Vec<SignalState>>,
    names: RefCell<HashMap<String, SignalId>>,
    pub(crate) pending: RefCell<Vec<(SignalId, u64)>>,
    device: RefCell<Option<AttachedDevice>>,
    parameters: RefCell<BTreeMap<String, u64>>,
    spawner: LocalSpawner,
}

impl Kernel {
    fn new(spawner: LocalSpawner) -> Self {
        Self {
            now: Cell::new(SimTime::ZERO),
            seq: Cell::new(0),
            timers: RefCell::new(BinaryHeap::new()),
            signals: RefCell::new(Vec::new()),
            names: RefCell::new(HashMap::new()),
            pending: RefCell::new(Vec::new()),
            device: RefCell::new(None),
            parameters: RefCell::new(BTreeMap::new()),
            spawner,
        }
    }

    pub(crate) fn now(&self) -> SimTime {
        self.now.get()
    }

    pub(crate) fn schedule_timer(&self, at: SimTime, slot: Rc<WaitSlot>) {
        let seq = self.seq.get();
        self.seq.set(seq + 1);
        self.timers
            .borrow_mut()
            .push(Reverse(TimerEntry { at, seq, slot }));
    }

    pub(crate) fn add_waiter(&self, id: SignalId, kind: EdgeKind, slot: Rc<WaitSlot>) {
        self.signals.borrow_mut()[id.index()]
            .waiters
            .push((kind, slot));
    }

    fn declare(&self, name: &str, width: u32, init: u64) -> Result<SignalId, SimError> {
        let mut names = self.names.borrow_mut();
        if names.contains_key(name) {
            return Err(SimError::DuplicateSignal(name.to_string()));
        }
        let mut signals = self.signals.borrow_mut();
        let id = SignalId::from_raw(signals.len() as u32);
        signals.push(SignalState::new(name.to_string(), width.clamp(1, 64), init));
        names.insert(name.to_string(), id);
        Ok(id)
    }

    fn lookup(&self, name: &str) -> Option<SignalId> {
        self.names.borrow().get(name).copied()
    }

    fn attach(&self, device: Box<dyn Device>) -> Result<(), SimError> {
        let mut ports = Vec::new();
        for port in device.ports() {
            ports.push(self.declare(port.name, port.width, port.init)?);
        }
        let clock_name = device.clock_port();
        let clock = self
            .lookup(clock_name)
            .ok_or_else(|| SimError::MissingClock(clock_name.to_string()))?;
        {
            let mut parameters = self.parameters.borrow_mut();
            for (name, value) in device.parameters() {
                parameters.insert(name.to_string(), value);
            }
        }
        tracing::debug!(
            device = device.name(),
            ports = ports.len(),
            clock = clock_name,
            "attached device"
        );
        *self.device.borrow_mut() = Some(AttachedDevice {
            device,
            clock,
            ports,
        });
        Ok(())
    }

    /// Applies all queued writes. Returns `false` when there was nothing to apply.
    fn apply_pending(&self) -> bool {
        let writes = std::mem::take(&mut *self.pending.borrow_mut());
        if writes.is_empty() {
            return false;
        }

        // Last write to a signal within a pass wins.
        let mut order = Vec::new();
        let mut last: HashMap<SignalId, u64> = HashMap::new();
        for (id, value) in writes {
            if last.insert(id, value).is_none() {
                order.push(id);
            }
        }

        let mut changes = Vec::new();
        {
            let mut signals = self.signals.borrow_mut();
            for id in order {
                let state = &mut signals[id.index()];
                let new = state.mask(last[&id]);
                if new != state.value {
                    changes.push((id, state.value, new));
                    state.value = new;
                }
            }
        }

        self.evaluate_device(&changes);

        let mut released = Vec::new();
        {
            let mut signals = self.signals.borrow_mut();
            for &(id, old, new) in &changes {
                released.extend(signals[id.index()].take_released(old, new));
            }
        }
        for slot in released {
            slot.fire();
        }
        true
    }

    fn evaluate_device(&self, changes: &[(SignalId, u64, u64)]) {
        let mut device = self.device.borrow_mut();
        let Some(attached) = device.as_mut() else {
            return;
        };
        let clock_rose = changes
            .iter()
            .any(|&(id, old, new)| id == attached.clock && old & 1 == 0 && new & 1 == 1);
        if !clock_rose {
            return;
        }
        let sampled: Vec<u64> = {
            let signals = self.signals.borrow();
            attached
                .ports
                .iter()
                .map(|id| signals[id.index()].value)
                .collect()
        };
        let mut io = DeviceIo::new(&sampled);
        attached.device.on_clock_edge(&mut io);
        let mut pending = self.pending.borrow_mut();
        for (port, value) in io.into_writes() {
            pending.push((attached.ports[port], value));
        }
    }

    fn next_deadline(&self) -> Option<SimTime> {
        self.timers.borrow().peek().map(|Reverse(entry)| entry.at)
    }

    /// Moves time forward to `at` and fires every timer due then.
    fn advance_to(&self, at: SimTime) {
        self.now.set(at);
        let mut due = Vec::new();
        {
            let mut timers = self.timers.borrow_mut();
            while let Some(Reverse(entry)) = timers.peek() {
                if entry.at > at {
                    break;
                }
                if let Some(Reverse(entry)) = timers.pop() {
                    due.push(entry.slot);
                }
            }
        }
        for slot in due {
            slot.fire();
        }
    }

    /// Drops every registered waker so abandoned tasks can be freed.
    fn shutdown(&self) {
        self.timers.borrow_mut().clear();
        for state in self.signals.borrow_mut().iter_mut() {
            state.waiters.clear();
        }
        self.pending.borrow_mut().clear();
    }
}

/// Handle to a spawned task.
///
/// Dropping the handle leaves the task running; [`cancel`](TaskHandle::cancel)
/// stops it at its current suspension point without running any more of it.
#[derive(Debug)]
pub struct TaskHandle {
    abort: AbortHandle,
    done: Rc<Cell<bool>>,
}

impl TaskHandle {
    /// Aborts the task. Its future is dropped the next time the pool runs.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    /// Whether the task ran to completion or was cancelled.
    pub fn is_finished(&self) -> bool {
        self.done.get() || self.abort.is_aborted()
    }
}

/// Cloneable access to the kernel for tasks and agents.
#[derive(Clone)]
pub struct SimHandle {
    kernel: Rc<Kernel>,
}

impl SimHandle {
    /// Current simulated time.
    pub fn now(&self) -> SimTime {
        self.kernel.now()
    }

    /// A timer completing `delay` from now.
    ///
    /// Delays reaching past the end of the timeline complete at its end.
    pub fn timer(&self, delay: SimTime) -> Timer {
        Timer::new(self.kernel.clone(), self.kernel.now().saturating_add(delay))
    }

    /// A timer completing at the absolute time `at`.
    pub fn timer_until(&self, at: SimTime) -> Timer {
        Timer::new(self.kernel.clone(), at)
    }

    /// Looks up a signal by name.
    pub fn signal(&self, name: &str) -> Result<Signal, SimError> {
        self.kernel
            .lookup(name)
            .map(|id| Signal::new(self.kernel.clone(), id))
            .ok_or_else(|| SimError::UnknownSignal(name.to_string()))
    }

    /// Declares a free-standing signal not bound to any device port.
    pub fn add_signal(&self, name: &str, width: u32, init: u64) -> Result<Signal, SimError> {
        let id = self.kernel.declare(name, width, init)?;
        Ok(Signal::new(self.kernel.clone(), id))
    }

    /// Reads back a parameter the attached device was built with.
    pub fn parameter(&self, name: &str) -> Result<u64, SimError> {
        self.kernel
            .parameters
            .borrow()
            .get(name)
            .copied()
            .ok_or_else(|| SimError::UnknownParameter(name.to_string()))
    }

    /// Starts a task running concurrently with the caller.
    pub fn spawn<F>(&self, task: F) -> Result<TaskHandle, SimError>
    where
        F: Future<Output = ()> + 'static,
    {
        let (task, abort) = future::abortable(task);
        let done = Rc::new(Cell::new(false));
        let flag = done.clone();
        self.kernel
            .spawner
            .spawn_local(async move {
                if task.await.is_ok() {
                    flag.set(true);
                }
            })
            .map_err(|e| SimError::Spawn {
                reason: e.to_string(),
            })?;
        Ok(TaskHandle { abort, done })
    }

    /// Awaits `fut`, giving up after `limit` of simulated time.
    pub async fn with_timeout<F>(&self, limit: SimTime, fut: F) -> Result<F::Output, SimError>
    where
        F: Future,
    {
        let timer = self.timer(limit);
        futures::pin_mut!(fut);
        match future::select(fut, timer).await {
            Either::Left((output, _)) => Ok(output),
            Either::Right(((), _)) => Err(SimError::Timeout { after: limit }),
        }
    }
}

/// The result of a completed simulation run.
#[derive(Debug, Clone)]
pub struct SimRun<T> {
    /// Value returned by the main task.
    pub output: T,
    /// Simulated time when the main task finished.
    pub final_time: SimTime,
    /// Total number of delta passes executed.
    pub total_deltas: u64,
}

/// The simulation engine: task pool plus kernel state.
///
/// Build one per scenario, attach at most one device, then hand the main
/// task to [`run`](Simulator::run).
pub struct Simulator {
    kernel: Rc<Kernel>,
    pool: LocalPool,
    time_limit: Option<SimTime>,
    max_delta_per_step: u32,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    /// Creates an empty simulator with no device attached.
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let kernel = Rc::new(Kernel::new(pool.spawner()));
        Self {
            kernel,
            pool,
            time_limit: None,
            max_delta_per_step: 10_000,
        }
    }

    /// Creates a simulator with `device` attached and its ports declared.
    pub fn with_device(device: Box<dyn Device>) -> Result<Self, SimError> {
        let sim = Self::new();
        sim.kernel.attach(device)?;
        Ok(sim)
    }

    /// Returns a handle for looking up signals and spawning tasks.
    pub fn handle(&self) -> SimHandle {
        SimHandle {
            kernel: self.kernel.clone(),
        }
    }

    /// Sets the absolute time past which the run is abandoned.
    pub fn set_time_limit(&mut self, limit: SimTime) {
        self.time_limit = Some(limit);
    }

    /// Sets the maximum number of delta passes per time step.
    pub fn set_max_delta(&mut self, max: u32) {
        self.max_delta_per_step = max;
    }

    /// Runs until `main` completes, returning its output.
    ///
    /// Other tasks still suspended when `main` finishes are dropped with the
    /// simulator.
    pub fn run<F, T>(mut self, main: F) -> Result<SimRun<T>, SimError>
    where
        F: Future<Output = T> + 'static,
        T: 'static,
    {
        let slot: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
        let out = slot.clone();
        self.kernel
            .spawner
            .spawn_local(async move {
                let value = main.await;
                *out.borrow_mut() = Some(value);
            })
            .map_err(|e| SimError::Spawn {
                reason: e.to_string(),
            })?;

        let mut total_deltas = 0u64;
        loop {
            let mut deltas = 0u32;
            loop {
                self.pool.run_until_stalled();
                if let Some(output) = slot.borrow_mut().take() {
                    let final_time = self.kernel.now();
                    tracing::debug!(%final_time, total_deltas, "simulation finished");
                    return Ok(SimRun {
                        output,
                        final_time,
                        total_deltas,
                    });
                }
                if !self.kernel.apply_pending() {
                    break;
                }
                deltas += 1;
                total_deltas += 1;
                if deltas > self.max_delta_per_step {
                    return Err(SimError::DeltaCycleLimit {
                        time: self.kernel.now(),
                        max_deltas: self.max_delta_per_step,
                    });
                }
            }

            let Some(next) = self.kernel.next_deadline() else {
                return Err(SimError::Stalled {
                    time: self.kernel.now(),
                });
            };
            if let Some(limit) = self.time_limit {
                if next > limit {
                    return Err(SimError::TimeLimitExceeded { limit });
                }
            }
            self.kernel.advance_to(next);
        }
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        self.kernel.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Port;
    use crate::trigger::Event;

    #[test]
    fn run_returns_main_output() {
        let sim = Simulator::new();
        let run = sim.run(async { 42 }).unwrap();
        assert_eq!(run.output, 42);
        assert_eq!(run.final_time, SimTime::ZERO);
    }

    #[test]
    fn timers_advance_time() {
        let sim = Simulator::new();
        let h = sim.handle();
        let run = sim
            .run(async move {
                h.timer(SimTime::from_ns(10)).await;
                h.timer(SimTime::from_ns(5)).await;
                h.now()
            })
            .unwrap();
        assert_eq!(run.output, SimTime::from_ns(15));
        assert_eq!(run.final_time, SimTime::from_ns(15));
    }

    #[test]
    fn unbounded_timeout_does_not_overflow() {
        let sim = Simulator::new();
        let h = sim.handle();
        let run = sim
            .run(async move {
                h.timer(SimTime::from_ns(3)).await;
                let forever = SimTime::from_fs(u64::MAX);
                assert_eq!(h.timer(forever).deadline(), forever);
                h.with_timeout(forever, h.timer(SimTime::from_ns(2)))
                    .await
                    .map(|()| h.now())
            })
            .unwrap();
        assert_eq!(run.output, Ok(SimTime::from_ns(5)));
    }

    #[test]
    fn zero_timer_does_not_yield() {
        let sim = Simulator::new();
        let h = sim.handle();
        let run = sim
            .run(async move {
                h.timer(SimTime::ZERO).await;
                h.now()
            })
            .unwrap();
        assert_eq!(run.output, SimTime::ZERO);
    }

    #[test]
    fn writes_apply_after_the_pass() {
        let sim = Simulator::new();
        let h = sim.handle();
        let run = sim
            .run(async move {
                let s = h.add_signal("line", 1, 0).unwrap();
                s.set(1);
                let before = s.get();
                h.timer(SimTime::from_ns(1)).await;
                (before, s.get())
            })
            .unwrap();
        assert_eq!(run.output, (0, 1));
    }

    #[test]
    fn edge_waits_see_transitions() {
        let sim = Simulator::new();
        let h = sim.handle();
        let run = sim
            .run(async move {
                let s = h.add_signal("line", 1, 1).unwrap();
                let driver = s.clone();
                let th = h.clone();
                h.spawn(async move {
                    th.timer(SimTime::from_ns(7)).await;
                    driver.set(0);
                    th.timer(SimTime::from_ns(3)).await;
                    driver.set(1);
                })
                .unwrap();
                s.falling_edge().await;
                let fell = h.now();
                s.rising_edge().await;
                (fell, h.now())
            })
            .unwrap();
        assert_eq!(run.output, (SimTime::from_ns(7), SimTime::from_ns(10)));
    }

    #[test]
    fn same_pass_writes_coalesce() {
        let sim = Simulator::new();
        let h = sim.handle();
        let run = sim
            .run(async move {
                let s = h.add_signal("bus", 8, 0).unwrap();
                let watcher = s.clone();
                let th = h.clone();
                let changes = Rc::new(Cell::new(0));
                let seen = changes.clone();
                h.spawn(async move {
                    loop {
                        watcher.edge().await;
                        seen.set(seen.get() + 1);
                    }
                })
                .unwrap();
                th.timer(SimTime::from_ns(1)).await;
                s.set(0x10);
                s.set(0x41);
                th.timer(SimTime::from_ns(1)).await;
                (s.get(), changes.get())
            })
            .unwrap();
        assert_eq!(run.output, (0x41, 1));
    }

    #[test]
    fn values_are_masked_to_width() {
        let sim = Simulator::new();
        let h = sim.handle();
        let run = sim
            .run(async move {
                let s = h.add_signal("byte", 8, 0).unwrap();
                s.set(0x1_41);
                h.timer(SimTime::from_ns(1)).await;
                s.get()
            })
            .unwrap();
        assert_eq!(run.output, 0x41);
    }

    #[test]
    fn stalled_main_is_an_error() {
        let sim = Simulator::new();
        let event = Event::new();
        let err = sim.run(async move { event.wait().await }).unwrap_err();
        assert_eq!(
            err,
            SimError::Stalled {
                time: SimTime::ZERO
            }
        );
    }

    #[test]
    fn time_limit_stops_runaway() {
        let mut sim = Simulator::new();
        sim.set_time_limit(SimTime::from_us(1));
        let h = sim.handle();
        let err = sim
            .run(async move {
                loop {
                    h.timer(SimTime::from_ns(100)).await;
                }
            })
            .unwrap_err();
        assert_eq!(
            err,
            SimError::TimeLimitExceeded {
                limit: SimTime::from_us(1)
            }
        );
    }

    #[test]
    fn combinational_loop_hits_delta_limit() {
        let mut sim = Simulator::new();
        sim.set_max_delta(50);
        let h = sim.handle();
        let err = sim
            .run(async move {
                let s = h.add_signal("osc", 1, 0).unwrap();
                let toggler = s.clone();
                h.spawn(async move {
                    loop {
                        toggler.set(toggler.get() ^ 1);
                        toggler.edge().await;
                    }
                })
                .unwrap();
                h.timer(SimTime::from_ns(1)).await;
            })
            .unwrap_err();
        assert!(matches!(err, SimError::DeltaCycleLimit { max_deltas: 50, .. }));
    }

    #[test]
    fn with_timeout_reports_elapsed_bound() {
        let sim = Simulator::new();
        let h = sim.handle();
        let run = sim
            .run(async move {
                let never = Event::new();
                let timed_out = h.with_timeout(SimTime::from_ns(50), never.wait()).await;
                let quick = h
                    .with_timeout(SimTime::from_ns(50), h.timer(SimTime::from_ns(10)))
                    .await;
                (timed_out, quick, h.now())
            })
            .unwrap();
        assert_eq!(
            run.output.0,
            Err(SimError::Timeout {
                after: SimTime::from_ns(50)
            })
        );
        assert_eq!(run.output.1, Ok(()));
        assert_eq!(run.output.2, SimTime::from_ns(60));
    }

    #[test]
    fn cancelled_task_stops_driving() {
        let sim = Simulator::new();
        let h = sim.handle();
        let run = sim
            .run(async move {
                let s = h.add_signal("count", 8, 0).unwrap();
                let driver = s.clone();
                let th = h.clone();
                let task = h
                    .spawn(async move {
                        loop {
                            th.timer(SimTime::from_ns(10)).await;
                            driver.set(driver.get() + 1);
                        }
                    })
                    .unwrap();
                h.timer(SimTime::from_ns(35)).await;
                task.cancel();
                h.timer(SimTime::from_ns(100)).await;
                (s.get(), task.is_finished())
            })
            .unwrap();
        assert_eq!(run.output, (3, true));
    }

    #[test]
    fn unknown_names_are_errors() {
        let sim = Simulator::new();
        let h = sim.handle();
        assert!(matches!(
            h.signal("missing"),
            Err(SimError::UnknownSignal(_))
        ));
        assert!(matches!(
            h.parameter("BAUD_RATE"),
            Err(SimError::UnknownParameter(_))
        ));
        h.add_signal("dup", 1, 0).unwrap();
        assert!(matches!(
            h.add_signal("dup", 1, 0),
            Err(SimError::DuplicateSignal(_))
        ));
    }

    /// Registers its input on every rising clock edge.
    struct Flop {
        edges: Rc<Cell<u32>>,
    }

    impl Device for Flop {
        fn name(&self) -> &str {
            "flop"
        }

        fn ports(&self) -> Vec<Port> {
            vec![
                Port::input("clk", 0),
                Port::input("d", 0),
                Port::output("q", 0),
            ]
        }

        fn clock_port(&self) -> &'static str {
            "clk"
        }

        fn parameters(&self) -> Vec<(&'static str, u64)> {
            vec![("WIDTH", 1)]
        }

        fn on_clock_edge(&mut self, io: &mut DeviceIo<'_>) {
            self.edges.set(self.edges.get() + 1);
            io.set(2, io.get(1));
        }
    }

    #[test]
    fn device_outputs_lag_the_edge_by_one_delta() {
        let edges = Rc::new(Cell::new(0));
        let sim = Simulator::with_device(Box::new(Flop {
            edges: edges.clone(),
        }))
        .unwrap();
        let h = sim.handle();
        let run = sim
            .run(async move {
                let clk = h.signal("clk").unwrap();
                let d = h.signal("d").unwrap();
                let q = h.signal("q").unwrap();
                d.set(1);
                h.timer(SimTime::from_ns(5)).await;
                clk.set(1);
                clk.rising_edge().await;
                // Released by the same edge: q still shows its pre-edge value.
                let at_edge = q.get();
                h.timer(SimTime::from_ns(1)).await;
                (at_edge, q.get(), h.parameter("WIDTH").unwrap())
            })
            .unwrap();
        assert_eq!(run.output, (0, 1, 1));
        assert_eq!(edges.get(), 1);
    }

    struct Clockless;

    impl Device for Clockless {
        fn name(&self) -> &str {
            "clockless"
        }

        fn ports(&self) -> Vec<Port> {
            vec![Port::input("a", 0)]
        }

        fn clock_port(&self) -> &'static str {
            "clk"
        }

        fn on_clock_edge(&mut self, _io: &mut DeviceIo<'_>) {}
    }

    #[test]
    fn device_without_its_clock_is_rejected() {
        let err = Simulator::with_device(Box::new(Clockless)).err();
        assert_eq!(err, Some(SimError::MissingClock("clk".into())));
    }
}
