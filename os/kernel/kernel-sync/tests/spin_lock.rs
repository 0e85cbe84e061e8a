use kernel_sync::{SpinLock, SyncOnceCell};
use std::{panic, thread};

#[test]
fn basic_lock_and_raii() {
    let l = SpinLock::new(0_u32);

    {
        let mut g = l.lock();
        *g = 41;
    }

    // the previous guard must have unlocked
    {
        let mut g = l.lock();
        *g += 1;
        assert_eq!(*g, 42);
    }
}

#[test]
fn try_lock_fails_while_held() {
    let l = SpinLock::new(1u8);

    let g1 = l.try_lock();
    assert!(g1.is_some());
    assert!(l.try_lock().is_none());

    drop(g1);
    assert!(l.try_lock().is_some());
}

#[test]
fn get_mut_allows_direct_mutation() {
    let mut l = SpinLock::new(vec![0x1000_u64, 0x2000]);
    l.get_mut().push(0x3000);
    assert_eq!(l.lock().as_slice(), &[0x1000, 0x2000, 0x3000]);
}

#[test]
fn contended_pushes_and_pops_keep_a_consistent_pool() {
    use std::sync::{Arc, Barrier};

    let threads = 8;
    let iters = 2_000;

    // a shared pool of "frames": each thread takes one and gives it back
    let pool = Arc::new(SpinLock::new((0..threads as u64).map(|i| i << 12).collect::<Vec<_>>()));
    let start = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for _ in 0..iters {
                    let frame = pool.with_lock(Vec::pop).expect("pool never runs dry");
                    thread::yield_now();
                    pool.with_lock(|p| p.push(frame));
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    let mut frames = pool.with_lock(|p| p.clone());
    frames.sort_unstable();
    assert_eq!(frames, (0..threads as u64).map(|i| i << 12).collect::<Vec<_>>());
}

#[test]
fn lock_is_released_on_panic() {
    let l = SpinLock::new(0u32);

    let res = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        l.with_lock(|v| {
            *v = 123;
            panic!("boom");
        });
    }));
    assert!(res.is_err());
    assert_eq!(l.with_lock(|v| *v), 123);
}

#[test]
fn spinlock_is_sync_for_send_t() {
    fn takes_sync<S: Sync>(_s: &S) {}
    let l = SpinLock::new(0u8);
    takes_sync(&l);
}

#[test]
fn once_cell_runs_initializer_once() {
    let cell = SyncOnceCell::new();
    assert!(cell.get().is_none());

    assert_eq!(*cell.get_or_init(|| 7), 7);
    assert_eq!(*cell.get_or_init(|| 8), 7);
    assert_eq!(cell.set(9), Err(9));
    assert_eq!(cell.get(), Some(&7));
}

#[test]
fn once_cell_set_publishes_value() {
    let cell = SyncOnceCell::new();
    assert_eq!(cell.set(SpinLock::new(5u8)).ok(), Some(()));
    assert_eq!(cell.get().map(|l| *l.lock()), Some(5));
}
