use crate::handle::{pending_pair, PendingTile};
use crate::{PoolError, PoolStats, TileHandle};
use log::*;
use std::collections::HashMap;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use tilewonder_compute::{spawn_worker, MandelbrotComputer, TileComputer, WorkerHandle};
use tilewonder_core::{
    MainToWorker, PoolConfig, TileBuffer, TileId, TileRequest, WorkerToMain,
};

/// Fixed-size pool of compute workers.
///
/// Request `id` always goes to worker `id % worker_count`. The pool itself is
/// single-threaded: the id counter, the pending-request table and the result
/// receiver are only touched through `&mut self`. Worker results are dispatched
/// when the owner calls `dispatch_results`, `wait_for_result` or `run_until_idle`.
pub struct WorkerPool {
    workers: Vec<WorkerHandle>,
    results: Receiver<WorkerToMain>,
    pending: HashMap<TileId, PendingTile>,
    next_id: TileId,
    config: PoolConfig,
    stats: PoolStats,
    /// Workers already reported through `PoolError::WorkerDied`.
    reported_dead: Vec<bool>,
    last_liveness_check: Instant,
}

impl WorkerPool {
    /// Pool computing Mandelbrot tiles.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        Self::with_computer(config, MandelbrotComputer)
    }

    /// Pool whose workers each run a clone of `computer`.
    pub fn with_computer<C>(config: PoolConfig, computer: C) -> Result<Self, PoolError>
    where
        C: TileComputer + Clone,
    {
        if config.worker_count == 0 {
            return Err(PoolError::NoWorkers);
        }
        config.validate()?;

        info!(
            "Creating WorkerPool with {} workers, {} refinement stages",
            config.worker_count, config.refinement_stages
        );

        let (results_tx, results_rx) = channel();
        let mut workers = Vec::with_capacity(config.worker_count);
        for index in 0..config.worker_count {
            let worker = spawn_worker(
                index,
                config.refinement_stages,
                computer.clone(),
                results_tx.clone(),
            )?;
            workers.push(worker);
        }

        Ok(Self {
            workers,
            results: results_rx,
            pending: HashMap::new(),
            next_id: 0,
            stats: PoolStats::new(config.worker_count, config.refinement_stages),
            reported_dead: vec![false; config.worker_count],
            last_liveness_check: Instant::now(),
            config,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn refinement_stages(&self) -> u32 {
        self.config.refinement_stages
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    /// Number of submitted requests not yet resolved.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: TileId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Queue a tile on worker `id % worker_count` and return its handle.
    ///
    /// The handle receives one preview per non-final refinement stage, then the
    /// full-resolution buffer. Every accepted request consumes an id, including
    /// one that fails because its worker has stopped.
    pub fn submit(&mut self, request: TileRequest) -> Result<TileHandle, PoolError> {
        if self.workers.is_empty() {
            return Err(PoolError::NoWorkers);
        }
        request.validate()?;

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let worker = self.route(id);

        if self.workers[worker]
            .send(MainToWorker::Task { id, request })
            .is_err()
        {
            warn!("Worker {} is gone, rejecting tile {}", worker, id);
            return Err(PoolError::WorkerDisconnected { worker });
        }

        let (pending, handle) = pending_pair(id, worker);
        self.pending.insert(id, pending);
        self.stats.submitted += 1;
        trace!("Submitted tile {} to worker {}", id, worker);

        Ok(handle)
    }

    /// Drop all queued work on every worker and resolve every pending handle with
    /// the cancellation sentinel.
    ///
    /// Tasks submitted after this call are queued behind the `Clear` on each
    /// worker and are never discarded by it. Results still arriving for cancelled
    /// ids are ignored.
    pub fn cancel_all(&mut self) {
        for worker in &self.workers {
            if worker.send(MainToWorker::Clear).is_err() {
                warn!("Worker {} is gone, cannot clear its queue", worker.index());
            }
        }

        let cancelled = self.pending.len();
        for (_, pending) in self.pending.drain() {
            pending.resolve(TileBuffer::cancelled());
        }
        self.stats.cancelled += cancelled as u64;

        debug!("Cancelled {} pending tiles", cancelled);
    }

    /// Deliver every worker result that has already arrived, without blocking.
    /// Returns the number of messages handled.
    pub fn dispatch_results(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(msg) = self.results.try_recv() {
            self.handle_worker_message(msg);
            handled += 1;
        }
        handled
    }

    /// Block up to `timeout` for one worker result and deliver it.
    ///
    /// Returns `Ok(false)` on timeout. Workers are checked on timeout and at least
    /// once per liveness interval while results keep arriving. The first time a
    /// worker is found stopped, the requests routed to it are resolved with the
    /// cancellation sentinel and `WorkerDied` is returned; the pool keeps running
    /// on the remaining workers.
    pub fn wait_for_result(&mut self, timeout: Duration) -> Result<bool, PoolError> {
        match self.results.recv_timeout(timeout) {
            Ok(msg) => {
                self.handle_worker_message(msg);
                if self.last_liveness_check.elapsed() >= self.config.liveness_interval() {
                    self.check_workers()?;
                }
                Ok(true)
            }
            Err(RecvTimeoutError::Timeout) => {
                self.check_workers()?;
                Ok(false)
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.check_workers()?;
                self.fail_all_pending();
                Err(PoolError::AllWorkersStopped)
            }
        }
    }

    /// Block until every pending request has been resolved.
    pub fn run_until_idle(&mut self) -> Result<(), PoolError> {
        let interval = self.config.liveness_interval();
        while !self.pending.is_empty() {
            self.wait_for_result(interval)?;
        }
        Ok(())
    }

    /// Terminate and join every worker. Pending handles get the cancellation sentinel.
    /// Later submissions fail with `NoWorkers`.
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }

        info!("Shutting down WorkerPool ({} workers)", self.workers.len());
        for worker in &self.workers {
            worker.send(MainToWorker::Terminate).ok();
        }

        self.fail_all_pending();

        for mut worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("Worker {} panicked before shutdown", worker.index());
            }
        }
    }

    fn route(&self, id: TileId) -> usize {
        (id % self.workers.len() as u64) as usize
    }

    fn handle_worker_message(&mut self, msg: WorkerToMain) {
        match msg {
            WorkerToMain::TileComplete {
                worker,
                id,
                stage,
                buffer,
                is_final_stage,
                compute_time_ms,
            } => {
                debug_assert!(
                    self.workers.is_empty() || worker == self.route(id),
                    "tile {id} came from wrong worker {worker}"
                );
                self.stats
                    .record_result(worker, stage, is_final_stage, compute_time_ms);

                if is_final_stage {
                    match self.pending.remove(&id) {
                        Some(pending) => {
                            pending.resolve(buffer);
                            self.stats.completed += 1;
                            trace!(
                                "Worker {} completed tile {} in {:.2}ms",
                                worker,
                                id,
                                compute_time_ms
                            );
                        }
                        None => self.record_stale(worker, id, stage),
                    }
                } else {
                    match self.pending.get(&id) {
                        Some(pending) => {
                            pending.preview(buffer);
                            self.stats.previews_delivered += 1;
                        }
                        None => self.record_stale(worker, id, stage),
                    }
                }
            }
        }
    }

    fn record_stale(&mut self, worker: usize, id: TileId, stage: u32) {
        self.stats.stale_results += 1;
        trace!(
            "Worker {} delivered stale tile {} (stage {})",
            worker,
            id,
            stage
        );
    }

    /// Resolve the requests of the first newly stopped worker and report it.
    /// A worker is reported once.
    fn check_workers(&mut self) -> Result<(), PoolError> {
        self.last_liveness_check = Instant::now();

        // Results sent just before a worker stopped still count
        self.dispatch_results();

        let Some(dead) = self
            .workers
            .iter()
            .find(|w| !self.reported_dead[w.index()] && w.is_finished())
            .map(|w| w.index())
        else {
            return Ok(());
        };
        self.reported_dead[dead] = true;

        let orphaned: Vec<TileId> = self
            .pending
            .iter()
            .filter(|(_, pending)| pending.worker == dead)
            .map(|(id, _)| *id)
            .collect();
        for id in &orphaned {
            if let Some(pending) = self.pending.remove(id) {
                pending.resolve(TileBuffer::cancelled());
            }
        }
        self.stats.cancelled += orphaned.len() as u64;

        error!(
            "Worker {} stopped unexpectedly, resolved {} pending tiles as cancelled",
            dead,
            orphaned.len()
        );
        Err(PoolError::WorkerDied { worker: dead })
    }

    fn fail_all_pending(&mut self) {
        let count = self.pending.len();
        for (_, pending) in self.pending.drain() {
            pending.resolve(TileBuffer::cancelled());
        }
        self.stats.cancelled += count as u64;
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
