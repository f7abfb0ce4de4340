use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use taskfog::config::{GlobalLockStrategy, SchedulerConfig};
use taskfog::runtime::{call_and_wait, CallRecordPool, RuntimeError, Scheduler, SchedulerCore, Task, WorkerSlot};

const FUNC_A: usize = 0;
const SUM_TO: usize = 1;

fn config(workers: usize) -> SchedulerConfig {
    SchedulerConfig::builder().num_workers(workers).seed(7).build()
}

#[derive(Default)]
struct Pools {
    func_a: CallRecordPool<i32, i32>,
    sum_to: CallRecordPool<u64, u64>,
    seen_args: Mutex<Vec<i32>>,
}

/// Hand-written equivalent of the generated dispatch switch for
/// `int funcA(int x) { return x + 1; }` and a recursive `sum_to`.
fn dispatch(pools: &Pools, core: &SchedulerCore, slot: WorkerSlot, task: Task) {
    match task.function {
        FUNC_A => {
            let x = pools.func_a.take_args(task.record).unwrap();
            pools.seen_args.lock().push(x);
            pools.func_a.complete(task.record, x + 1).unwrap();
        }
        SUM_TO => {
            let n = pools.sum_to.take_args(task.record).unwrap();
            let value = if n == 0 {
                0
            } else {
                n + call_and_wait(core, &pools.sum_to, SUM_TO, 1, slot, n - 1).unwrap()
            };
            pools.sum_to.complete(task.record, value).unwrap();
        }
        other => panic!("unknown function {}", other),
    }
}

fn start(workers: usize) -> (Scheduler, Arc<Pools>) {
    let pools = Arc::new(Pools::default());
    let table = Arc::clone(&pools);
    let scheduler = Scheduler::start(config(workers), move |core: &SchedulerCore, slot: WorkerSlot, task: Task| {
        dispatch(&table, core, slot, task)
    })
    .unwrap();
    (scheduler, pools)
}

#[test]
fn test_call_and_wait_reads_return_value() {
    let (scheduler, pools) = start(2);

    let result = call_and_wait(&scheduler, &pools.func_a, FUNC_A, 1, WorkerSlot::External, 5).unwrap();

    assert_eq!(result, 6);
    assert_eq!(*pools.seen_args.lock(), vec![5]);
    assert_eq!(pools.func_a.outstanding(), 0);
    scheduler.teardown().unwrap();
    assert_eq!(scheduler.in_flight(), 0);
}

#[test]
fn test_sequential_calls_reuse_one_record() {
    let (scheduler, pools) = start(2);

    for x in 0..50 {
        let result = call_and_wait(&scheduler, &pools.func_a, FUNC_A, 1, WorkerSlot::External, x).unwrap();
        assert_eq!(result, x + 1);
    }

    assert_eq!(pools.func_a.capacity(), 1);
    assert_eq!(pools.func_a.outstanding(), 0);
}

#[test]
fn test_recursive_calls_use_distinct_records() {
    let (scheduler, pools) = start(2);

    let result = call_and_wait(&scheduler, &pools.sum_to, SUM_TO, 1, WorkerSlot::External, 20).unwrap();

    assert_eq!(result, 210);
    assert_eq!(pools.sum_to.capacity(), 21);
    assert_eq!(pools.sum_to.outstanding(), 0);
    scheduler.teardown().unwrap();
}

#[test]
fn test_globals_lock_makes_increments_exact() {
    let counter = Arc::new(AtomicU64::new(0));
    let shared = Arc::clone(&counter);
    let config = SchedulerConfig::builder()
        .num_workers(2)
        .global_lock(GlobalLockStrategy::Shared)
        .seed(3)
        .build();
    let scheduler = Scheduler::start(config, move |core: &SchedulerCore, slot: WorkerSlot, _: Task| {
        for _ in 0..1000 {
            let _guard = core.lock_globals(slot);
            // counter = counter + 1, as a separate read and write
            let value = shared.load(Ordering::Relaxed);
            thread::yield_now();
            shared.store(value + 1, Ordering::Relaxed);
        }
    })
    .unwrap();

    // The second task always goes to the worker the first one skipped.
    scheduler.enqueue(Task { function: 0, record: 0 }, 1).unwrap();
    scheduler.enqueue(Task { function: 0, record: 1 }, 1).unwrap();
    scheduler.teardown().unwrap();

    assert_eq!(counter.load(Ordering::Relaxed), 2000);
    assert_eq!(scheduler.stats().loads, vec![1, 1]);
}

#[test]
fn test_teardown_waits_for_every_task() {
    const TASKS: usize = 16;
    let runs: Arc<Vec<AtomicUsize>> = Arc::new((0..TASKS).map(|_| AtomicUsize::new(0)).collect());
    let seen = Arc::clone(&runs);
    let scheduler = Arc::new(
        Scheduler::start(config(3), move |_: &SchedulerCore, _: WorkerSlot, task: Task| {
            thread::sleep(Duration::from_millis(5));
            seen[task.record].fetch_add(1, Ordering::SeqCst);
        })
        .unwrap(),
    );

    for record in 0..TASKS {
        scheduler.enqueue(Task { function: 0, record }, 1).unwrap();
    }
    let closer = {
        let scheduler = Arc::clone(&scheduler);
        thread::spawn(move || scheduler.teardown())
    };
    scheduler.teardown().unwrap();
    closer.join().unwrap().unwrap();

    for run in runs.iter() {
        assert_eq!(run.load(Ordering::SeqCst), 1);
    }
    assert_eq!(scheduler.in_flight(), 0);
    assert_eq!(scheduler.stats().executed, TASKS as u64);
    assert_eq!(
        scheduler.enqueue(Task { function: 0, record: 0 }, 1),
        Err(RuntimeError::ShutDown { function: 0 })
    );
}

#[test]
fn test_teardown_from_worker_is_rejected() {
    let slot_for_teardown: Arc<Mutex<Option<Arc<Scheduler>>>> = Arc::new(Mutex::new(None));
    let outcome: Arc<Mutex<Option<Result<(), RuntimeError>>>> = Arc::new(Mutex::new(None));
    let (handle, result) = (Arc::clone(&slot_for_teardown), Arc::clone(&outcome));

    let scheduler = Arc::new(
        Scheduler::start(config(1), move |_: &SchedulerCore, _: WorkerSlot, _: Task| {
            if let Some(scheduler) = handle.lock().take() {
                *result.lock() = Some(scheduler.teardown());
            }
        })
        .unwrap(),
    );
    *slot_for_teardown.lock() = Some(Arc::clone(&scheduler));

    scheduler.enqueue(Task { function: 0, record: 0 }, 1).unwrap();
    scheduler.teardown().unwrap();

    assert_eq!(*outcome.lock(), Some(Err(RuntimeError::TeardownFromWorker { worker: 0 })));
}

#[test]
fn test_teardown_racing_enqueue_drops_nothing() {
    for _ in 0..200 {
        let ran = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&ran);
        let scheduler = Arc::new(
            Scheduler::start(config(2), move |_: &SchedulerCore, _: WorkerSlot, _: Task| {
                counted.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap(),
        );

        let accepted = Arc::new(AtomicUsize::new(0));
        let producer = {
            let (scheduler, accepted) = (Arc::clone(&scheduler), Arc::clone(&accepted));
            thread::spawn(move || {
                let mut record = 0;
                while scheduler.enqueue(Task { function: 0, record }, 1).is_ok() {
                    accepted.fetch_add(1, Ordering::SeqCst);
                    record += 1;
                }
            })
        };

        while accepted.load(Ordering::SeqCst) < 50 {
            thread::yield_now();
        }
        scheduler.teardown().unwrap();
        producer.join().unwrap();

        assert_eq!(scheduler.in_flight(), 0);
        assert_eq!(ran.load(Ordering::SeqCst), accepted.load(Ordering::SeqCst));
    }
}
