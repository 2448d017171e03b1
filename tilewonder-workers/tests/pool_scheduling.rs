mod common;

use common::{tagged_request, GatedComputer, PanickingComputer, POISON_ITERATIONS};
use futures::executor::block_on;
use std::time::Duration;
use test_log::test;
use tilewonder_compute::{compute_tile, MandelbrotComputer, TileComputer};
use tilewonder_core::{PoolConfig, TileRequest};
use tilewonder_workers::{PoolError, TileHandle, WorkerPool};

fn single_worker(stages: u32) -> PoolConfig {
    PoolConfig {
        worker_count: 1,
        refinement_stages: stages,
        liveness_interval_ms: 10,
    }
}

fn drain_previews(handle: &mut TileHandle) -> usize {
    std::iter::from_fn(|| handle.try_preview()).count()
}

#[test]
fn end_to_end_non_pipelined_tile_is_reproducible() {
    let request = TileRequest::new(0.0, 0.0, 0.002, 50, 100);

    let run = || {
        let mut pool = WorkerPool::new(PoolConfig::non_pipelined(3)).unwrap();
        let handle = pool.submit(request).unwrap();
        pool.run_until_idle().unwrap();
        block_on(handle)
    };

    let first = run();
    let second = run();

    assert_eq!(first.len(), 10_000);
    assert!(!first.is_cancelled());
    assert_eq!(first, second);
    assert_eq!(first, compute_tile(0.0, 0.0, 0.002, 50, 100, 1));

    let pixels = first.into_bytes();
    assert_eq!(pixels.len(), 10_000);
    assert_eq!(pixels, second.as_bytes());
}

#[test]
fn every_request_gets_previews_then_exactly_one_final() {
    let mut pool = WorkerPool::new(PoolConfig::default()).unwrap();
    let requests: Vec<TileRequest> = (0..6)
        .map(|i| TileRequest::new(-2.0 + 0.4 * i as f64, -0.6, 0.004, 16, 200))
        .collect();
    let mut handles: Vec<TileHandle> = requests
        .iter()
        .map(|r| pool.submit(*r).unwrap())
        .collect();

    pool.run_until_idle().unwrap();
    assert_eq!(pool.pending_count(), 0);

    for (request, handle) in requests.iter().zip(handles.iter_mut()) {
        let coarsest = handle.try_preview().expect("stage 0 preview");
        assert_eq!(coarsest, MandelbrotComputer.compute(request, 8));
        assert_eq!(drain_previews(handle), 2);

        let result = handle.try_result().expect("final result");
        assert_eq!(result, MandelbrotComputer.compute(request, 1));
    }

    let stats = pool.stats();
    assert_eq!(stats.submitted, 6);
    assert_eq!(stats.completed, 6);
    assert_eq!(stats.previews_delivered, 18);
    assert_eq!(stats.stale_results, 0);
    assert_eq!(stats.per_worker_finals, vec![2, 2, 2]);
    assert!(stats.average_compute_ms(0).is_some());
    assert!(stats.average_compute_ms(3).is_some());
}

#[test]
fn results_come_back_from_round_robin_worker() {
    let mut pool = WorkerPool::new(PoolConfig::non_pipelined(3)).unwrap();
    let handles: Vec<TileHandle> = (0..7)
        .map(|i| pool.submit(tagged_request(i as f64 * 0.1)).unwrap())
        .collect();

    for handle in &handles {
        assert_eq!(handle.worker() as u64, handle.id() % 3);
    }

    pool.run_until_idle().unwrap();
    assert_eq!(pool.stats().per_worker_finals, vec![3, 2, 2]);
}

#[test]
fn breadth_first_refinement_across_requests() {
    let (computer, entered) = GatedComputer::new();
    let mut pool = WorkerPool::with_computer(single_worker(4), computer.clone()).unwrap();

    let _a = pool.submit(tagged_request(0.0)).unwrap();
    // A's first stage is now running and blocked on the gate
    entered.recv().unwrap();
    let _b = pool.submit(tagged_request(1.0)).unwrap();
    computer.open();

    pool.run_until_idle().unwrap();

    assert_eq!(
        computer.calls(),
        vec![
            (0.0, 8),
            (1.0, 8),
            (0.0, 4),
            (1.0, 4),
            (0.0, 2),
            (1.0, 2),
            (0.0, 1),
            (1.0, 1),
        ]
    );
}

#[test]
fn cancel_all_resolves_every_pending_handle() {
    let (computer, entered) = GatedComputer::new();
    let mut pool = WorkerPool::with_computer(single_worker(2), computer.clone()).unwrap();

    let mut cancelled: Vec<TileHandle> = (0..3)
        .map(|i| pool.submit(tagged_request(i as f64)).unwrap())
        .collect();
    entered.recv().unwrap();

    pool.cancel_all();

    assert_eq!(pool.pending_count(), 0);
    for handle in &mut cancelled {
        assert!(!pool.is_pending(handle.id()));
        assert!(handle.try_result().expect("resolved").is_cancelled());
    }

    let later = pool.submit(tagged_request(9.0)).unwrap();
    computer.open();
    pool.run_until_idle().unwrap();

    let result = block_on(later);
    assert!(!result.is_cancelled());
    assert_eq!(result.len(), 8 * 8 * 4);

    // Only the tile already running finished; the rest of the backlog was dropped
    assert_eq!(computer.calls(), vec![(0.0, 2), (9.0, 2), (9.0, 1)]);

    let stats = pool.stats();
    assert_eq!(stats.cancelled, 3);
    assert_eq!(stats.stale_results, 1);
    assert_eq!(stats.completed, 1);
}

#[test]
fn submissions_after_cancel_complete_on_every_worker() {
    let mut pool = WorkerPool::new(PoolConfig::default()).unwrap();
    let early: Vec<TileHandle> = (0..6)
        .map(|i| pool.submit(tagged_request(i as f64 * 0.1)).unwrap())
        .collect();
    pool.cancel_all();

    let late: Vec<TileHandle> = (0..3)
        .map(|i| pool.submit(tagged_request(-1.0 - i as f64 * 0.1)).unwrap())
        .collect();
    pool.run_until_idle().unwrap();

    for handle in early {
        assert!(block_on(handle).is_cancelled());
    }
    for handle in late {
        assert_eq!(block_on(handle).len(), 8 * 8 * 4);
    }
    assert_eq!(pool.stats().completed, 3);
}

#[test]
fn dead_worker_is_reported_not_hung() {
    let config = PoolConfig {
        worker_count: 2,
        refinement_stages: 1,
        liveness_interval_ms: 10,
    };
    let mut pool = WorkerPool::with_computer(config, PanickingComputer).unwrap();

    let poisoned = TileRequest {
        max_iterations: POISON_ITERATIONS,
        ..tagged_request(0.0)
    };
    let mut doomed = pool.submit(poisoned).unwrap();
    let _healthy = pool.submit(tagged_request(1.0)).unwrap();

    let err = pool.run_until_idle().unwrap_err();
    assert!(matches!(err, PoolError::WorkerDied { worker: 0 }));
    assert!(doomed.try_result().expect("resolved").is_cancelled());

    // id 2 routes to the dead worker, id 3 to the live one
    assert!(matches!(
        pool.submit(tagged_request(2.0)),
        Err(PoolError::WorkerDisconnected { worker: 0 })
    ));
    let survivor = pool.submit(tagged_request(3.0)).unwrap();
    assert_eq!(survivor.worker(), 1);

    // The dead worker is reported once; the survivor keeps serving
    pool.run_until_idle().unwrap();
    assert!(!pool.wait_for_result(Duration::from_millis(20)).unwrap());
    let result = block_on(survivor);
    assert!(!result.is_cancelled());
    assert_eq!(result, MandelbrotComputer.compute(&tagged_request(3.0), 1));
}

#[test]
fn dead_worker_is_detected_while_results_keep_arriving() {
    let config = PoolConfig {
        worker_count: 2,
        refinement_stages: 4,
        liveness_interval_ms: 1,
    };
    let mut pool = WorkerPool::with_computer(config, PanickingComputer).unwrap();

    let busy = |i: u32| TileRequest::new(-0.78 + 0.002 * i as f64, 0.1, 0.00005, 64, 5000);
    let mut live = Vec::new();
    for i in 0..40 {
        // Last tile routed to worker 0 kills it once its coarse stage runs
        let request = if i == 38 {
            TileRequest {
                max_iterations: POISON_ITERATIONS,
                ..busy(i)
            }
        } else {
            busy(i)
        };
        let handle = pool.submit(request).unwrap();
        if handle.worker() == 1 {
            live.push(handle);
        }
    }

    // A long timeout only expires if detection waits for the result stream to go quiet
    let err = loop {
        match pool.wait_for_result(Duration::from_secs(60)) {
            Ok(_) => continue,
            Err(err) => break err,
        }
    };
    assert!(matches!(err, PoolError::WorkerDied { worker: 0 }));
    assert!(live.iter().any(|handle| pool.is_pending(handle.id())));

    pool.run_until_idle().unwrap();
    for handle in live {
        assert!(!block_on(handle).is_cancelled());
    }
}

#[test]
fn pool_from_json_config() {
    let config = PoolConfig::from_json(r#"{"worker_count": 2, "refinement_stages": 2}"#).unwrap();
    let mut pool = WorkerPool::new(config).unwrap();
    assert_eq!(pool.worker_count(), 2);
    assert_eq!(pool.refinement_stages(), 2);

    let mut handle = pool.submit(tagged_request(0.5)).unwrap();
    pool.run_until_idle().unwrap();
    assert_eq!(drain_previews(&mut handle), 1);
    assert!(!block_on(handle).is_cancelled());
}
