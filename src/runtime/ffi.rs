//! # C ABI
//!
//! Entry points called by the generated `taskfog_runtime.hpp` glue. The
//! scheduler handle is an opaque pointer created by
//! [`taskfog_runtime_start`] and destroyed by [`taskfog_runtime_teardown`].
//! Every function tolerates a null handle by logging and doing nothing.
//!
//! Worker slots cross the boundary as `int`: a worker index, or `-1` for the
//! entry-point thread.

use super::scheduler::{Scheduler, SchedulerCore, Task, WorkerSlot};
use crate::config::SchedulerConfig;
use std::ffi::c_void;
use std::os::raw::c_int;
use tracing::{error, warn};

/// `void taskfog_dispatch(int function, int slot, int record)`
pub type DispatchFn = extern "C" fn(function: c_int, slot: c_int, record: c_int);

/// Polled by [`taskfog_wait`] until it returns true.
pub type PollFn = unsafe extern "C" fn(ctx: *mut c_void) -> bool;

unsafe fn scheduler<'a>(handle: *mut Scheduler, caller: &str) -> Option<&'a Scheduler> {
    if handle.is_null() {
        warn!("{} called with a null scheduler", caller);
        return None;
    }
    // SAFETY: non-null handles come from `taskfog_runtime_start` and stay
    // valid until `taskfog_runtime_teardown`.
    Some(&*handle)
}

/// Start a scheduler with `workers` threads (environment configuration when
/// `workers <= 0`). Returns null on failure.
#[no_mangle]
pub extern "C" fn taskfog_runtime_start(workers: c_int, dispatch: Option<DispatchFn>) -> *mut Scheduler {
    let Some(dispatch) = dispatch else {
        error!("taskfog_runtime_start called without a dispatch function");
        return std::ptr::null_mut();
    };

    let mut config = SchedulerConfig::from_env();
    if workers > 0 {
        config.num_workers = workers as usize;
    }

    let table = move |_: &SchedulerCore, slot: WorkerSlot, task: Task| {
        dispatch(task.function as c_int, slot.as_raw(), task.record as c_int);
    };
    match Scheduler::start(config, table) {
        Ok(scheduler) => Box::into_raw(Box::new(scheduler)),
        Err(err) => {
            error!("failed to start scheduler: {}", err);
            std::ptr::null_mut()
        }
    }
}

/// Tear down and free the scheduler.
///
/// # Safety
/// `handle` must be null or a pointer returned by [`taskfog_runtime_start`]
/// that has not been torn down yet.
#[no_mangle]
pub unsafe extern "C" fn taskfog_runtime_teardown(handle: *mut Scheduler) {
    if handle.is_null() {
        warn!("taskfog_runtime_teardown called with a null scheduler");
        return;
    }
    let scheduler = Box::from_raw(handle);
    match scheduler.teardown() {
        Ok(()) => drop(scheduler),
        Err(err) => {
            // Workers still reference the core; leave it alive.
            error!("teardown failed: {}", err);
            let _ = Box::into_raw(scheduler);
        }
    }
}

/// Queue `(function, record)`. Returns the chosen worker, or -1.
///
/// # Safety
/// `handle` must be null or a live scheduler handle.
#[no_mangle]
pub unsafe extern "C" fn taskfog_enqueue(handle: *mut Scheduler, function: c_int, weight: u64, record: c_int) -> c_int {
    let Some(scheduler) = scheduler(handle, "taskfog_enqueue") else {
        return -1;
    };
    let (Ok(function), Ok(record)) = (usize::try_from(function), usize::try_from(record)) else {
        error!(function, record, "taskfog_enqueue called with a negative function id or record index");
        return -1;
    };
    let task = Task { function, record };
    match scheduler.enqueue(task, weight) {
        Ok(worker) => worker as c_int,
        Err(err) => {
            error!("{}", err);
            -1
        }
    }
}

/// # Safety
/// `handle` must be null or a live scheduler handle.
#[no_mangle]
pub unsafe extern "C" fn taskfog_drain_one_if_available(handle: *mut Scheduler, slot: c_int) -> bool {
    match scheduler(handle, "taskfog_drain_one_if_available") {
        Some(scheduler) => scheduler.drain_one_if_available(WorkerSlot::from_raw(slot)),
        None => false,
    }
}

/// Busy-wait until `poll(ctx)` returns true, executing tasks from `slot`'s
/// queue meanwhile.
///
/// # Safety
/// `handle` must be null or a live scheduler handle; `poll` must be safe to
/// call with `ctx` from this thread.
#[no_mangle]
pub unsafe extern "C" fn taskfog_wait(handle: *mut Scheduler, slot: c_int, poll: Option<PollFn>, ctx: *mut c_void) {
    let Some(poll) = poll else {
        warn!("taskfog_wait called without a poll function");
        return;
    };
    match scheduler(handle, "taskfog_wait") {
        Some(scheduler) => scheduler.wait_until(WorkerSlot::from_raw(slot), || poll(ctx)),
        // No scheduler to drain; spin on the flag alone.
        None => {
            while !poll(ctx) {
                std::hint::spin_loop();
            }
        }
    }
}

/// # Safety
/// `handle` must be null or a live scheduler handle.
#[no_mangle]
pub unsafe extern "C" fn taskfog_globals_lock(handle: *mut Scheduler, slot: c_int) {
    if let Some(scheduler) = scheduler(handle, "taskfog_globals_lock") {
        scheduler.globals().acquire(WorkerSlot::from_raw(slot).worker());
    }
}

/// # Safety
/// `handle` must be null or a live scheduler handle.
#[no_mangle]
pub unsafe extern "C" fn taskfog_globals_unlock(handle: *mut Scheduler, slot: c_int) {
    if let Some(scheduler) = scheduler(handle, "taskfog_globals_unlock") {
        scheduler.globals().release(WorkerSlot::from_raw(slot).worker());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

    static DISPATCHED: AtomicUsize = AtomicUsize::new(0);
    static LAST_RECORD: AtomicI32 = AtomicI32::new(-1);

    extern "C" fn count_dispatch(_function: c_int, _slot: c_int, record: c_int) {
        LAST_RECORD.store(record, Ordering::SeqCst);
        DISPATCHED.fetch_add(1, Ordering::SeqCst);
    }

    unsafe extern "C" fn dispatched_once(_ctx: *mut c_void) -> bool {
        DISPATCHED.load(Ordering::SeqCst) >= 1
    }

    #[test]
    fn test_round_trip_through_c_abi() {
        let handle = taskfog_runtime_start(2, Some(count_dispatch));
        assert!(!handle.is_null());
        unsafe {
            assert!(taskfog_enqueue(handle, 0, 3, 11) >= 0);
            taskfog_wait(handle, -1, Some(dispatched_once), std::ptr::null_mut());
            taskfog_globals_lock(handle, -1);
            taskfog_globals_unlock(handle, -1);
            taskfog_runtime_teardown(handle);
        }
        assert_eq!(DISPATCHED.load(Ordering::SeqCst), 1);
        assert_eq!(LAST_RECORD.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn test_null_handles_are_ignored() {
        unsafe {
            assert_eq!(taskfog_enqueue(std::ptr::null_mut(), 0, 1, 0), -1);
            assert!(!taskfog_drain_one_if_available(std::ptr::null_mut(), 0));
            taskfog_globals_lock(std::ptr::null_mut(), 0);
            taskfog_runtime_teardown(std::ptr::null_mut());
        }
        assert!(taskfog_runtime_start(1, None).is_null());
    }

    extern "C" fn ignore_dispatch(_function: c_int, _slot: c_int, _record: c_int) {}

    #[test]
    fn test_negative_ids_are_rejected() {
        let handle = taskfog_runtime_start(1, Some(ignore_dispatch));
        assert!(!handle.is_null());
        unsafe {
            assert_eq!(taskfog_enqueue(handle, -1, 1, 0), -1);
            assert_eq!(taskfog_enqueue(handle, 0, 1, -5), -1);
            assert_eq!((*handle).stats().enqueued, 0);
            taskfog_runtime_teardown(handle);
        }
    }
}
