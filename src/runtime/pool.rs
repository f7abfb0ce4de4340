//! Call records and the call-and-wait idiom
//!
//! Each task-converted function owns one pool. A call site takes a free
//! index (or appends a fresh record), fills in the arguments, enqueues the
//! task and, when the callee returns a value, waits for the record's `done`
//! flag before reading `return_var` and handing the index back.

use super::scheduler::{SchedulerCore, Task, WorkerSlot};
use super::RuntimeError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::trace;

/// One in-flight invocation.
#[derive(Debug)]
pub struct CallRecord<A, R> {
    args: Mutex<Option<A>>,
    return_var: Mutex<Option<R>>,
    done: AtomicBool,
}

impl<A, R> CallRecord<A, R> {
    fn new(args: A) -> Self {
        Self {
            args: Mutex::new(Some(args)),
            return_var: Mutex::new(None),
            done: AtomicBool::new(false),
        }
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
struct Slots<A, R> {
    records: Vec<Arc<CallRecord<A, R>>>,
    in_use: Vec<bool>,
    free: VecDeque<usize>,
}

/// Records of one function, indexed by the record index carried in a task.
///
/// An allocated index is always either free or in use. Pools never shrink.
#[derive(Debug)]
pub struct CallRecordPool<A, R> {
    slots: Mutex<Slots<A, R>>,
}

impl<A, R> Default for CallRecordPool<A, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, R> CallRecordPool<A, R> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Slots {
                records: Vec::new(),
                in_use: Vec::new(),
                free: VecDeque::new(),
            }),
        }
    }

    /// Reserve a record holding `args`, reusing a free index first.
    pub fn acquire(&self, args: A) -> usize {
        let mut slots = self.slots.lock();
        match slots.free.pop_front() {
            Some(index) => {
                slots.records[index] = Arc::new(CallRecord::new(args));
                slots.in_use[index] = true;
                index
            }
            None => {
                slots.records.push(Arc::new(CallRecord::new(args)));
                slots.in_use.push(true);
                slots.records.len() - 1
            }
        }
    }

    pub fn record(&self, index: usize) -> Result<Arc<CallRecord<A, R>>, RuntimeError> {
        let slots = self.slots.lock();
        match slots.in_use.get(index) {
            Some(true) => Ok(Arc::clone(&slots.records[index])),
            Some(false) => Err(RuntimeError::NotInUse { index }),
            None => Err(RuntimeError::UnknownRecord { index }),
        }
    }

    /// Move the arguments out; the callee does this once.
    pub fn take_args(&self, index: usize) -> Result<A, RuntimeError> {
        self.record(index)?
            .args
            .lock()
            .take()
            .ok_or(RuntimeError::MissingArguments { index })
    }

    pub fn peek_args(&self, index: usize) -> Result<A, RuntimeError>
    where
        A: Clone,
    {
        self.record(index)?
            .args
            .lock()
            .clone()
            .ok_or(RuntimeError::MissingArguments { index })
    }

    /// Store the return value and raise `done`.
    pub fn complete(&self, index: usize, value: R) -> Result<(), RuntimeError> {
        let record = self.record(index)?;
        *record.return_var.lock() = Some(value);
        record.done.store(true, Ordering::Release);
        Ok(())
    }

    pub fn is_done(&self, index: usize) -> bool {
        self.record(index).map(|r| r.is_done()).unwrap_or(false)
    }

    pub fn take_return(&self, index: usize) -> Result<R, RuntimeError> {
        self.record(index)?
            .return_var
            .lock()
            .take()
            .ok_or(RuntimeError::MissingReturn { index })
    }

    /// Return `index` to the free queue. Releasing a free index is an error.
    pub fn release(&self, index: usize) -> Result<(), RuntimeError> {
        let mut slots = self.slots.lock();
        match slots.in_use.get(index).copied() {
            Some(true) => {
                slots.in_use[index] = false;
                slots.free.push_back(index);
                Ok(())
            }
            Some(false) => Err(RuntimeError::NotInUse { index }),
            None => Err(RuntimeError::UnknownRecord { index }),
        }
    }

    /// Indices currently in use.
    pub fn outstanding(&self) -> usize {
        let slots = self.slots.lock();
        slots.records.len() - slots.free.len()
    }

    /// Records ever allocated.
    pub fn capacity(&self) -> usize {
        self.slots.lock().records.len()
    }
}

/// Enqueue `function` with `args` and wait for its result.
///
/// While waiting, the caller executes tasks from its own queue.
pub fn call_and_wait<A, R>(
    core: &SchedulerCore,
    pool: &CallRecordPool<A, R>,
    function: usize,
    weight: u64,
    slot: WorkerSlot,
    args: A,
) -> Result<R, RuntimeError> {
    let index = pool.acquire(args);
    let record = pool.record(index)?;
    if let Err(err) = core.enqueue(Task { function, record: index }, weight) {
        pool.release(index)?;
        return Err(err);
    }

    core.wait_until(slot, || record.is_done());
    trace!(function, record = index, "result ready");

    let value = pool.take_return(index);
    pool.release(index)?;
    value
}

/// Enqueue a void `function` without waiting. The task releases its record.
pub fn call_detached<A, R>(
    core: &SchedulerCore,
    pool: &CallRecordPool<A, R>,
    function: usize,
    weight: u64,
    args: A,
) -> Result<usize, RuntimeError> {
    let index = pool.acquire(args);
    if let Err(err) = core.enqueue(Task { function, record: index }, weight) {
        pool.release(index)?;
        return Err(err);
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_are_reused_after_release() {
        let pool: CallRecordPool<i32, i32> = CallRecordPool::new();
        let a = pool.acquire(1);
        let b = pool.acquire(2);
        assert_eq!((a, b), (0, 1));
        assert_eq!(pool.outstanding(), 2);

        pool.release(a).unwrap();
        assert_eq!(pool.outstanding(), 1);
        assert_eq!(pool.acquire(3), a);
        assert_eq!(pool.capacity(), 2);
        assert_eq!(pool.peek_args(a).unwrap(), 3);
    }

    #[test]
    fn test_double_release_is_an_error() {
        let pool: CallRecordPool<(), ()> = CallRecordPool::new();
        let index = pool.acquire(());
        pool.release(index).unwrap();
        assert_eq!(pool.release(index), Err(RuntimeError::NotInUse { index }));
        assert_eq!(pool.release(9), Err(RuntimeError::UnknownRecord { index: 9 }));
    }

    #[test]
    fn test_complete_then_take_return() {
        let pool: CallRecordPool<i32, i32> = CallRecordPool::new();
        let index = pool.acquire(5);
        assert!(!pool.is_done(index));

        let x = pool.take_args(index).unwrap();
        pool.complete(index, x + 1).unwrap();
        assert!(pool.is_done(index));
        assert_eq!(pool.take_return(index), Ok(6));
        assert_eq!(pool.take_return(index), Err(RuntimeError::MissingReturn { index }));
    }

    #[test]
    fn test_reused_record_starts_not_done() {
        let pool: CallRecordPool<i32, i32> = CallRecordPool::new();
        let index = pool.acquire(1);
        pool.complete(index, 2).unwrap();
        pool.release(index).unwrap();

        let again = pool.acquire(3);
        assert_eq!(again, index);
        assert!(!pool.is_done(again));
    }
}
