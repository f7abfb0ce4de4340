//! # Worker Pool Scheduler
//!
//! A fixed set of worker threads, each with its own FIFO queue guarded by a
//! mutex and condition variable. Tasks are placed on a queue chosen by the
//! [`LoadBalancer`]; there is no stealing. A thread that waits for a result
//! keeps executing tasks from its own queue, which is what keeps nested
//! calls from deadlocking.
//!
//! ## Worker states
//!
//! ```text
//! Idle --(task queued)--> Draining --(queue empty)--> Idle
//! Idle --(shutdown set, queue empty)--> Terminated
//! ```
//!
//! ## Teardown
//!
//! 1. Block until no task is in flight.
//! 2. Take the admission lock exclusively; if a task slipped in meanwhile,
//!    release it and go back to 1.
//! 3. Set the shutdown flag and wake every worker.
//! 4. Each worker leaves once its queue is empty; all are joined.
//!
//! `enqueue` checks the flag and counts the task while holding the admission
//! lock shared, so a task is either rejected or counted before the flag is
//! set.

use super::balancer::LoadBalancer;
use super::globals::{GlobalsGuard, GlobalsLock};
use super::RuntimeError;
use crate::config::SchedulerConfig;
use parking_lot::{Condvar, Mutex, RwLock};
use std::any::Any;
use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::ops::Deref;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, error, trace};

thread_local! {
    /// Tasks this thread is currently executing inline inside a wait.
    static INLINE_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Thread on whose behalf code runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerSlot {
    Worker(usize),
    /// The entry-point thread. It owns no queue.
    External,
}

impl WorkerSlot {
    /// C ABI value: the worker index, or any negative number for external.
    pub fn from_raw(raw: i32) -> Self {
        if raw < 0 {
            WorkerSlot::External
        } else {
            WorkerSlot::Worker(raw as usize)
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            WorkerSlot::Worker(i) => i as i32,
            WorkerSlot::External => -1,
        }
    }

    pub fn worker(self) -> Option<usize> {
        match self {
            WorkerSlot::Worker(i) => Some(i),
            WorkerSlot::External => None,
        }
    }
}

impl fmt::Display for WorkerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerSlot::Worker(i) => write!(f, "worker-{}", i),
            WorkerSlot::External => write!(f, "external"),
        }
    }
}

/// `(function, record)` pair placed on a worker queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Task {
    pub function: usize,
    pub record: usize,
}

/// Runs the function a task names.
pub trait TaskTable: Send + Sync {
    fn execute(&self, core: &SchedulerCore, slot: WorkerSlot, task: Task);
}

impl<F> TaskTable for F
where
    F: Fn(&SchedulerCore, WorkerSlot, Task) + Send + Sync,
{
    fn execute(&self, core: &SchedulerCore, slot: WorkerSlot, task: Task) {
        self(core, slot, task)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub enqueued: u64,
    pub executed: u64,
    /// Executed by a waiting thread instead of its worker loop.
    pub executed_inline: u64,
    pub in_flight: usize,
    pub loads: Vec<u64>,
}

#[derive(Debug, Default)]
struct WorkerQueue {
    tasks: Mutex<VecDeque<Task>>,
    available: Condvar,
}

/// State shared by the workers and every thread submitting tasks.
pub struct SchedulerCore {
    config: SchedulerConfig,
    queues: Box<[WorkerQueue]>,
    balancer: LoadBalancer,
    globals: GlobalsLock,
    table: Box<dyn TaskTable>,
    in_flight: AtomicUsize,
    /// Held shared by `enqueue`, exclusively while shutdown is set.
    admission: RwLock<()>,
    quiescence: Mutex<()>,
    quiescent: Condvar,
    shutdown: AtomicBool,
    enqueued: AtomicU64,
    executed: AtomicU64,
    executed_inline: AtomicU64,
}

impl fmt::Debug for SchedulerCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerCore")
            .field("config", &self.config)
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .field("shutdown", &self.shutdown.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl SchedulerCore {
    fn new(config: SchedulerConfig, table: Box<dyn TaskTable>) -> Self {
        let workers = config.num_workers;
        Self {
            queues: (0..workers).map(|_| WorkerQueue::default()).collect(),
            balancer: LoadBalancer::new(workers, config.seed),
            globals: GlobalsLock::new(config.global_lock, workers),
            config,
            table,
            in_flight: AtomicUsize::new(0),
            admission: RwLock::new(()),
            quiescence: Mutex::new(()),
            quiescent: Condvar::new(),
            shutdown: AtomicBool::new(false),
            enqueued: AtomicU64::new(0),
            executed: AtomicU64::new(0),
            executed_inline: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn num_workers(&self) -> usize {
        self.queues.len()
    }

    pub fn balancer(&self) -> &LoadBalancer {
        &self.balancer
    }

    pub fn globals(&self) -> &GlobalsLock {
        &self.globals
    }

    /// Tasks enqueued and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            executed_inline: self.executed_inline.load(Ordering::Relaxed),
            in_flight: self.in_flight(),
            loads: self.balancer.loads(),
        }
    }

    /// Queue `task` on a worker picked by the load balancer and charge that
    /// worker `weight`. Returns the worker index.
    pub fn enqueue(&self, task: Task, weight: u64) -> Result<usize, RuntimeError> {
        let _admitted = self.admission.read();
        if self.is_shut_down() {
            return Err(RuntimeError::ShutDown {
                function: task.function,
            });
        }

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let worker = self.balancer.dispatch(weight);
        self.enqueued.fetch_add(1, Ordering::Relaxed);

        let queue = &self.queues[worker];
        queue.tasks.lock().push_back(task);
        queue.available.notify_one();

        trace!(function = task.function, record = task.record, worker, weight, "enqueued");
        Ok(worker)
    }

    /// Run one task from `slot`'s own queue, if it has one.
    pub fn drain_one_if_available(&self, slot: WorkerSlot) -> bool {
        let Some(worker) = slot.worker() else {
            return false;
        };
        let Some(queue) = self.queues.get(worker) else {
            return false;
        };
        let task = queue.tasks.lock().pop_front();
        match task {
            Some(task) => {
                self.run_task(slot, task, true);
                true
            }
            None => false,
        }
    }

    /// Busy-wait until `done` holds, draining `slot`'s queue meanwhile.
    ///
    /// Any globals lock the thread holds is released for the duration of
    /// the wait. Inline execution stops nesting past `max_inline_depth`;
    /// from there the thread only spins.
    pub fn wait_until(&self, slot: WorkerSlot, mut done: impl FnMut() -> bool) {
        if done() {
            return;
        }

        let held = self.globals.suspend(slot.worker());
        while !done() {
            let depth = INLINE_DEPTH.with(Cell::get);
            if depth < self.config.max_inline_depth {
                INLINE_DEPTH.with(|d| d.set(depth + 1));
                let ran = self.drain_one_if_available(slot);
                INLINE_DEPTH.with(|d| d.set(depth));
                if ran {
                    continue;
                }
            }
            std::hint::spin_loop();
            thread::yield_now();
        }
        self.globals.resume(slot.worker(), held);
    }

    /// Enter the critical section guarding globals.
    pub fn lock_globals(&self, slot: WorkerSlot) -> GlobalsGuard<'_> {
        self.globals.guard(slot.worker())
    }

    fn run_task(&self, slot: WorkerSlot, task: Task, inline: bool) {
        trace!(function = task.function, record = task.record, %slot, inline, "executing");

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.table.execute(self, slot, task)));
        if let Err(payload) = result {
            error!(
                function = task.function,
                record = task.record,
                %slot,
                "task panicked: {}; aborting",
                panic_message(payload.as_ref())
            );
            std::process::abort();
        }

        self.executed.fetch_add(1, Ordering::Relaxed);
        if inline {
            self.executed_inline.fetch_add(1, Ordering::Relaxed);
        }
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _lock = self.quiescence.lock();
            self.quiescent.notify_all();
        }
    }

    fn wait_quiescent(&self) {
        let mut lock = self.quiescence.lock();
        while self.in_flight.load(Ordering::SeqCst) != 0 {
            self.quiescent.wait(&mut lock);
        }
    }

    fn worker_loop(&self, index: usize) {
        debug!(worker = index, "worker started");
        let queue = &self.queues[index];
        loop {
            let task = {
                let mut tasks = queue.tasks.lock();
                loop {
                    if let Some(task) = tasks.pop_front() {
                        break Some(task);
                    }
                    if self.is_shut_down() {
                        break None;
                    }
                    queue.available.wait(&mut tasks);
                }
            };
            match task {
                Some(task) => self.run_task(WorkerSlot::Worker(index), task, false),
                None => break,
            }
        }
        debug!(worker = index, "worker terminated");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Owns the worker threads. Dereferences to the shared [`SchedulerCore`].
///
/// Dropping a scheduler that was not torn down tears it down.
pub struct Scheduler {
    core: Arc<SchedulerCore>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    thread_ids: Vec<ThreadId>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler").field("core", &self.core).finish()
    }
}

impl Scheduler {
    /// Spawn `config.num_workers` workers executing tasks through `table`.
    pub fn start(config: SchedulerConfig, table: impl TaskTable + 'static) -> Result<Self, RuntimeError> {
        config.validate()?;
        let workers = config.num_workers;
        let core = Arc::new(SchedulerCore::new(config, Box::new(table)));

        let mut threads = Vec::with_capacity(workers);
        for index in 0..workers {
            let worker_core = Arc::clone(&core);
            let spawned = thread::Builder::new()
                .name(format!("taskfog-worker-{}", index))
                .spawn(move || worker_core.worker_loop(index));
            match spawned {
                Ok(handle) => threads.push(handle),
                Err(err) => {
                    core.shutdown.store(true, Ordering::Release);
                    for queue in core.queues.iter() {
                        let _tasks = queue.tasks.lock();
                        queue.available.notify_all();
                    }
                    for handle in threads {
                        let _ = handle.join();
                    }
                    return Err(RuntimeError::SpawnFailed {
                        worker: index,
                        message: err.to_string(),
                    });
                }
            }
        }

        debug!(workers, "scheduler started");
        let thread_ids = threads.iter().map(|h| h.thread().id()).collect();
        Ok(Self {
            core,
            threads: Mutex::new(threads),
            thread_ids,
        })
    }

    pub fn core(&self) -> &Arc<SchedulerCore> {
        &self.core
    }

    /// Wait for quiescence, stop every worker and join them.
    ///
    /// Concurrent callers block until the first one finishes; later calls
    /// return immediately. Calling this from a worker of this scheduler is
    /// an error.
    pub fn teardown(&self) -> Result<(), RuntimeError> {
        let current = thread::current().id();
        if let Some(worker) = self.thread_ids.iter().position(|id| *id == current) {
            return Err(RuntimeError::TeardownFromWorker { worker });
        }

        let mut threads = self.threads.lock();
        if self.core.is_shut_down() {
            return Ok(());
        }

        loop {
            self.core.wait_quiescent();
            let _closed = self.core.admission.write();
            if self.core.in_flight.load(Ordering::SeqCst) == 0 {
                self.core.shutdown.store(true, Ordering::SeqCst);
                break;
            }
        }
        for queue in self.core.queues.iter() {
            let _tasks = queue.tasks.lock();
            queue.available.notify_all();
        }

        for (index, handle) in threads.drain(..).enumerate() {
            if handle.join().is_err() {
                error!(worker = index, "worker thread panicked");
            }
        }

        let stats = self.core.stats();
        debug!(
            enqueued = stats.enqueued,
            executed = stats.executed,
            inline = stats.executed_inline,
            "scheduler torn down"
        );
        Ok(())
    }
}

impl Deref for Scheduler {
    type Target = SchedulerCore;

    fn deref(&self) -> &SchedulerCore {
        &self.core
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Err(err) = self.teardown() {
            error!("teardown on drop failed: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn config(workers: usize) -> SchedulerConfig {
        SchedulerConfig::builder().num_workers(workers).seed(1).build()
    }

    #[test]
    fn test_slot_raw_values() {
        assert_eq!(WorkerSlot::from_raw(-1), WorkerSlot::External);
        assert_eq!(WorkerSlot::from_raw(3), WorkerSlot::Worker(3));
        assert_eq!(WorkerSlot::External.as_raw(), -1);
        assert_eq!(WorkerSlot::Worker(2).to_string(), "worker-2");
    }

    #[test]
    fn test_tasks_run_and_teardown_is_quiescent() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let scheduler = Scheduler::start(config(3), move |_: &SchedulerCore, _: WorkerSlot, _: Task| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        for record in 0..100 {
            scheduler.enqueue(Task { function: 0, record }, 1).unwrap();
        }
        scheduler.teardown().unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 100);
        assert_eq!(scheduler.in_flight(), 0);
        let stats = scheduler.stats();
        assert_eq!(stats.enqueued, 100);
        assert_eq!(stats.executed, 100);
        assert_eq!(stats.loads.iter().sum::<u64>(), 100);
    }

    #[test]
    fn test_enqueue_after_teardown_is_rejected() {
        let scheduler = Scheduler::start(config(1), |_: &SchedulerCore, _: WorkerSlot, _: Task| {}).unwrap();
        scheduler.teardown().unwrap();
        scheduler.teardown().unwrap();
        assert_eq!(
            scheduler.enqueue(Task { function: 4, record: 0 }, 1),
            Err(RuntimeError::ShutDown { function: 4 })
        );
    }

    #[test]
    fn test_external_slot_never_drains() {
        let scheduler = Scheduler::start(config(1), |_: &SchedulerCore, _: WorkerSlot, _: Task| {}).unwrap();
        assert!(!scheduler.drain_one_if_available(WorkerSlot::External));
        assert!(!scheduler.drain_one_if_available(WorkerSlot::Worker(7)));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = Scheduler::start(
            SchedulerConfig::builder().num_workers(0).build(),
            |_: &SchedulerCore, _: WorkerSlot, _: Task| {},
        );
        assert!(matches!(result, Err(RuntimeError::InvalidConfig(_))));
    }
}
