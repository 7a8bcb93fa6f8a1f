//! The scheduler engine: queues, dispatch policy, and token handoff

use crate::config::{SchedulerConfig, MAX_PRIORITY};
use crate::error::{SchedulerError, SchedulerResult};
use crate::queue::RunQueue;
use crate::record::{ThreadId, ThreadRecord, ThreadState};
use crossbeam_channel::{bounded, Receiver};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::thread;

/// Handler executed by a logical thread, invoked once with the thread's priority
pub type Handler = Box<dyn FnOnce(u32) + Send + 'static>;

/// Shared scheduling state: the four queues, the arena, and the running slot
///
/// Only the token holder mutates this (carriers touch it once during
/// registration and once during termination, both of which are serialized by
/// the handoff protocol). The lock exists so carriers can reach the state at
/// all; it is never held across a blocking receive.
struct SchedState {
    /// Arena of every thread ever created, keyed by identity
    threads: FxHashMap<ThreadId, ThreadRecord>,

    /// Threads eligible for dispatch
    ready: RunQueue,

    /// Threads blocked on an I/O event class
    waiting: RunQueue,

    /// Threads whose handler has returned
    terminated: Vec<ThreadId>,

    /// The thread currently holding the run token, if any
    running: Option<ThreadId>,
}

impl SchedState {
    fn new() -> Self {
        Self {
            threads: FxHashMap::default(),
            ready: RunQueue::new(),
            waiting: RunQueue::new(),
            terminated: Vec::new(),
            running: None,
        }
    }

    /// Re-admit a thread to READY with a fresh quantum
    fn requeue_ready(&mut self, id: ThreadId, time_quantum: u32) {
        if let Some(record) = self.threads.get_mut(&id) {
            record.remaining = time_quantum;
            record.state = ThreadState::Ready;
            let priority = record.priority();
            self.ready.push(id, priority);
        }
    }

    /// Remove a thread from READY, install it in the running slot, and grant
    /// it the token
    fn dispatch(&mut self, id: ThreadId) {
        self.ready.remove(id);
        self.running = Some(id);
        if let Some(record) = self.threads.get_mut(&id) {
            record.state = ThreadState::Running;
            // Single-slot channel with at most one grant outstanding: the
            // send never blocks. A closed channel means the carrier already
            // exited, which only happens after termination bookkeeping.
            let _ = record.run_tx.send(());
        }
    }

    /// The token-handoff receiver for a thread, used to park the caller
    fn run_rx_of(&self, id: ThreadId) -> Option<Receiver<()>> {
        self.threads.get(&id).map(|record| record.run_rx.clone())
    }
}

/// Engine internals shared between the public handle and the carriers
struct Engine {
    config: SchedulerConfig,
    state: Mutex<SchedState>,

    /// Join handle of every carrier ever spawned, taken out at shutdown
    carriers: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl Engine {
    fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(SchedState::new()),
            carriers: Mutex::new(Vec::new()),
        }
    }

    /// Park the calling thread until the engine grants it the token again
    fn park(&self, run_rx: Receiver<()>) -> SchedulerResult<()> {
        run_rx.recv().map_err(|_| SchedulerError::Disconnected)
    }

    /// Spawn a logical thread and apply the fork dispatch decision
    fn fork(self: &Arc<Self>, handler: Handler, priority: u32) -> SchedulerResult<ThreadId> {
        if priority > MAX_PRIORITY {
            return Err(SchedulerError::InvalidPriority(priority));
        }

        let id = ThreadId::new();
        let record = ThreadRecord::new(id, priority, self.config.time_quantum);
        let run_rx = record.run_rx.clone();
        self.state.lock().threads.insert(id, record);

        let (registered_tx, registered_rx) = bounded::<()>(1);
        let engine = Arc::clone(self);
        let carrier = thread::Builder::new()
            .name(format!("threadmill-{}", id.as_u64()))
            .spawn(move || carrier_main(engine, id, priority, run_rx, registered_tx, handler));
        let carrier = match carrier {
            Ok(handle) => handle,
            Err(err) => {
                self.state.lock().threads.remove(&id);
                return Err(SchedulerError::CarrierSpawn(err));
            }
        };
        self.carriers.lock().push(carrier);

        // Registration handshake: the carrier must be visible in READY
        // before any scheduling decision below can run.
        registered_rx
            .recv()
            .map_err(|_| SchedulerError::Disconnected)?;

        let parked_rx = {
            let mut state = self.state.lock();
            let s = &mut *state;
            let runner = match s.running {
                None => {
                    // Bootstrap handoff: nothing holds the token, so the new
                    // thread takes it and the caller returns unblocked.
                    s.dispatch(id);
                    return Ok(id);
                }
                Some(runner) => runner,
            };
            let runner_priority = match s.threads.get(&runner) {
                Some(record) => record.priority(),
                None => return Err(SchedulerError::NoRunningThread),
            };
            match s.ready.peek_max_priority() {
                Some((max_id, max_priority)) if max_priority > runner_priority => {
                    // Strictly higher priority preempts immediately. The
                    // dispatched thread is READY's max member, which is not
                    // necessarily the one just forked.
                    let rx = s.run_rx_of(runner);
                    s.requeue_ready(runner, self.config.time_quantum);
                    s.dispatch(max_id);
                    rx
                }
                _ => None,
            }
        };

        match parked_rx {
            Some(rx) => self.park(rx)?,
            // Equal or lower priority: the caller pays one tick instead.
            None => self.tick()?,
        }
        Ok(id)
    }

    /// Block the calling thread on an I/O event class
    fn wait(&self, io_event: u32) -> SchedulerResult<()> {
        if io_event >= self.config.io_events {
            return Err(SchedulerError::InvalidIoEvent(io_event));
        }

        let parked_rx = {
            let mut state = self.state.lock();
            let s = &mut *state;
            let runner = s.running.ok_or(SchedulerError::NoRunningThread)?;
            let (rx, priority) = match s.threads.get_mut(&runner) {
                Some(record) => {
                    record.io = Some(io_event);
                    record.remaining = self.config.time_quantum;
                    record.state = ThreadState::Waiting;
                    (record.run_rx.clone(), record.priority())
                }
                None => return Err(SchedulerError::NoRunningThread),
            };
            s.waiting.push(runner, priority);
            s.running = None;
            if let Some((next, _)) = s.ready.peek_max_priority() {
                s.dispatch(next);
            }
            // READY empty: the engine idles with no token holder until a
            // signal or a bootstrap-context fork restarts dispatch.
            rx
        };

        self.park(parked_rx)
    }

    /// Wake every thread blocked on an I/O event class
    fn signal(&self, io_event: u32) -> SchedulerResult<usize> {
        if io_event >= self.config.io_events {
            return Err(SchedulerError::InvalidIoEvent(io_event));
        }

        let woken = {
            let mut state = self.state.lock();
            let s = &mut *state;
            let tagged: Vec<ThreadId> = s
                .waiting
                .iter()
                .filter(|id| {
                    s.threads
                        .get(id)
                        .map_or(false, |record| record.io == Some(io_event))
                })
                .collect();
            for id in &tagged {
                s.waiting.remove(*id);
                if let Some(record) = s.threads.get_mut(id) {
                    record.io = None;
                    record.state = ThreadState::Ready;
                    let priority = record.priority();
                    s.ready.push(*id, priority);
                }
            }
            tagged.len()
        };

        // Woken threads do not preempt outright; they only win if this tick
        // exhausts the caller's quantum (or the engine is idle).
        self.tick()?;
        Ok(woken)
    }

    /// Report one unit of CPU work and run the quantum check
    fn tick(&self) -> SchedulerResult<()> {
        let parked_rx = {
            let mut state = self.state.lock();
            let s = &mut *state;
            let runner = match s.running {
                Some(runner) => runner,
                None => {
                    // Idle engine: a tick from the bootstrap context (e.g.
                    // right after a signal) dispatches the best READY thread.
                    if let Some((next, _)) = s.ready.peek_max_priority() {
                        s.dispatch(next);
                    }
                    return Ok(());
                }
            };
            let (remaining, runner_priority) = match s.threads.get_mut(&runner) {
                Some(record) => {
                    record.remaining = record.remaining.saturating_sub(1);
                    (record.remaining, record.priority())
                }
                None => return Err(SchedulerError::NoRunningThread),
            };
            if remaining > 0 {
                return Ok(());
            }
            match s.ready.peek_max_priority() {
                Some((max_id, max_priority)) if max_priority >= runner_priority => {
                    let rx = s.run_rx_of(runner);
                    s.requeue_ready(runner, self.config.time_quantum);
                    s.dispatch(max_id);
                    rx
                }
                _ => {
                    // No eligible contender: fresh quantum, keep running.
                    if let Some(record) = s.threads.get_mut(&runner) {
                        record.remaining = self.config.time_quantum;
                    }
                    return Ok(());
                }
            }
        };

        match parked_rx {
            Some(rx) => self.park(rx),
            None => Ok(()),
        }
    }
}

/// Carrier bootstrap: register, wait for the token, run the handler, then
/// perform termination bookkeeping and yield the token unconditionally
fn carrier_main(
    engine: Arc<Engine>,
    id: ThreadId,
    priority: u32,
    run_rx: Receiver<()>,
    registered_tx: crossbeam_channel::Sender<()>,
    handler: Handler,
) {
    {
        let mut state = engine.state.lock();
        let s = &mut *state;
        if let Some(record) = s.threads.get_mut(&id) {
            record.state = ThreadState::Ready;
            let priority = record.priority();
            s.ready.push(id, priority);
        }
    }
    if registered_tx.send(()).is_err() {
        return;
    }
    if run_rx.recv().is_err() {
        return;
    }

    handler(priority);

    let mut state = engine.state.lock();
    let s = &mut *state;
    if let Some(record) = s.threads.get_mut(&id) {
        record.state = ThreadState::Terminated;
    }
    s.terminated.push(id);
    if s.running == Some(id) {
        s.running = None;
    }
    // Termination always yields the token: no quantum comparison.
    if let Some((next, _)) = s.ready.peek_max_priority() {
        s.dispatch(next);
    }
}

/// A user-level cooperative scheduler engine
///
/// The engine starts uninitialized; `initialize` fixes the configuration and
/// `shutdown` joins every carrier and returns it to the uninitialized state.
/// Instances are independent, so tests can run several side by side.
///
/// Token-holder contract: after the first `fork`, the state-mutating
/// operations (`fork`, `wait`, `signal`, `tick`) must only be called by the
/// thread currently holding the token, except when the engine is idle (no
/// runner), in which case the bootstrap context may call them.
pub struct Scheduler {
    engine: Mutex<Option<Arc<Engine>>>,
}

impl Scheduler {
    /// Create an uninitialized engine handle
    pub fn new() -> Self {
        Self {
            engine: Mutex::new(None),
        }
    }

    /// Initialize the engine with a time quantum and I/O event class count
    pub fn initialize(&self, time_quantum: u32, io_events: u32) -> SchedulerResult<()> {
        let mut slot = self.engine.lock();
        if slot.is_some() {
            return Err(SchedulerError::AlreadyInitialized);
        }
        let config = SchedulerConfig::new(time_quantum, io_events)?;
        *slot = Some(Arc::new(Engine::new(config)));
        Ok(())
    }

    fn engine(&self) -> SchedulerResult<Arc<Engine>> {
        self.engine
            .lock()
            .as_ref()
            .cloned()
            .ok_or(SchedulerError::NotInitialized)
    }

    /// Spawn a new logical thread running `handler` at `priority`
    ///
    /// Blocks until the new thread has registered itself in READY. If no
    /// thread holds the token the new one is dispatched immediately; a
    /// strictly higher-priority READY thread preempts the caller; otherwise
    /// one tick is charged to the caller.
    pub fn fork<F>(&self, handler: F, priority: u32) -> SchedulerResult<ThreadId>
    where
        F: FnOnce(u32) + Send + 'static,
    {
        self.engine()?.fork(Box::new(handler), priority)
    }

    /// Block the calling thread until `io_event` is signaled
    pub fn wait(&self, io_event: u32) -> SchedulerResult<()> {
        self.engine()?.wait(io_event)
    }

    /// Wake every thread waiting on `io_event`; returns the count woken
    pub fn signal(&self, io_event: u32) -> SchedulerResult<usize> {
        self.engine()?.signal(io_event)
    }

    /// Report one unit of CPU work on behalf of the calling thread
    pub fn tick(&self) -> SchedulerResult<()> {
        self.engine()?.tick()
    }

    /// Join every carrier ever spawned and reset to uninitialized
    ///
    /// Blocks until all logical threads have terminated; a permanently
    /// blocked thread deadlocks shutdown, by contract.
    pub fn shutdown(&self) -> SchedulerResult<()> {
        let engine = {
            let mut slot = self.engine.lock();
            slot.take().ok_or(SchedulerError::NotInitialized)?
        };
        let handles = std::mem::take(&mut *engine.carriers.lock());
        for handle in handles {
            let _ = handle.join();
        }
        Ok(())
    }

    /// Whether the engine is initialized
    pub fn is_initialized(&self) -> bool {
        self.engine.lock().is_some()
    }

    /// The active configuration, if initialized
    pub fn config(&self) -> Option<SchedulerConfig> {
        self.engine.lock().as_ref().map(|engine| engine.config)
    }

    /// The thread currently holding the token, if any
    pub fn running_thread(&self) -> Option<ThreadId> {
        self.engine().ok()?.state.lock().running
    }

    /// A thread's current state
    pub fn thread_state(&self, id: ThreadId) -> Option<ThreadState> {
        let engine = self.engine().ok()?;
        let state = engine.state.lock();
        state.threads.get(&id).map(|record| record.state())
    }

    /// A thread's remaining quantum
    pub fn remaining_quantum(&self, id: ThreadId) -> Option<u32> {
        let engine = self.engine().ok()?;
        let state = engine.state.lock();
        state
            .threads
            .get(&id)
            .map(|record| record.remaining_quantum())
    }

    /// Number of READY threads
    pub fn ready_count(&self) -> usize {
        self.engine()
            .map(|engine| engine.state.lock().ready.len())
            .unwrap_or(0)
    }

    /// Number of WAITING threads
    pub fn waiting_count(&self) -> usize {
        self.engine()
            .map(|engine| engine.state.lock().waiting.len())
            .unwrap_or(0)
    }

    /// Number of TERMINATED threads
    pub fn terminated_count(&self) -> usize {
        self.engine()
            .map(|engine| engine.state.lock().terminated.len())
            .unwrap_or(0)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}
