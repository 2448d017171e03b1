//! Compute worker - dedicated thread running one refinement pipeline.
//!
//! Threading model:
//! - Owns: RefinementPipeline, TileComputer, ComputeStats
//! - Inbox: `MainToWorker` messages from the pool, FIFO
//! - Outbox: `WorkerToMain` results on a channel shared by all workers
//!
//! Between tasks the worker drains its whole inbox before computing the next
//! stage, so `Clear` and new tasks are seen after at most one tile computation.

use crate::{ComputeStats, RefinementPipeline, TileComputer};
use log::*;
use std::io;
use std::ops::ControlFlow;
use std::sync::mpsc::{channel, Receiver, SendError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use tilewonder_core::{MainToWorker, TileTask, WorkerToMain};

/// Pool-side handle to a running worker thread.
pub struct WorkerHandle {
    index: usize,
    inbox: Sender<MainToWorker>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Post a message to the worker. Fails once the worker thread has exited.
    pub fn send(&self, msg: MainToWorker) -> Result<(), SendError<MainToWorker>> {
        self.inbox.send(msg)
    }

    /// True once the thread has exited (normally or by panic) or was joined.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the thread to exit. Returns `Err` with the panic payload if it panicked.
    /// Joining twice is a no-op.
    pub fn join(&mut self) -> thread::Result<()> {
        match self.thread.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        }
    }
}

/// Spawn worker `index` with a `stage_count`-stage pipeline. Results are sent on `results`.
pub fn spawn_worker<C: TileComputer>(
    index: usize,
    stage_count: u32,
    computer: C,
    results: Sender<WorkerToMain>,
) -> io::Result<WorkerHandle> {
    let (inbox_tx, inbox_rx) = channel();
    let worker = Worker {
        index,
        pipeline: RefinementPipeline::new(stage_count),
        computer,
        stats: ComputeStats::new(stage_count),
        results,
    };

    let thread = thread::Builder::new()
        .name(format!("tilewonder-worker-{index}"))
        .spawn(move || worker.run(inbox_rx))?;

    Ok(WorkerHandle {
        index,
        inbox: inbox_tx,
        thread: Some(thread),
    })
}

struct Worker<C> {
    index: usize,
    pipeline: RefinementPipeline,
    computer: C,
    stats: ComputeStats,
    results: Sender<WorkerToMain>,
}

impl<C: TileComputer> Worker<C> {
    fn run(mut self, inbox: Receiver<MainToWorker>) {
        info!("Worker {}: thread started", self.index);

        'run: loop {
            // Drain everything that arrived while the last tile was computing
            loop {
                match inbox.try_recv() {
                    Ok(msg) => {
                        if self.handle_message(msg).is_break() {
                            break 'run;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        info!("Worker {}: inbox closed, exiting", self.index);
                        break 'run;
                    }
                }
            }

            if self.pipeline.is_empty() {
                match inbox.recv() {
                    Ok(msg) => {
                        if self.handle_message(msg).is_break() {
                            break;
                        }
                    }
                    Err(_) => {
                        info!("Worker {}: inbox closed, exiting", self.index);
                        break;
                    }
                }
                continue;
            }

            if self.process_next().is_break() {
                break;
            }
        }

        info!("Worker {}: thread stopped", self.index);
    }

    fn handle_message(&mut self, msg: MainToWorker) -> ControlFlow<()> {
        match msg {
            MainToWorker::Task { id, request } => {
                trace!("Worker {}: queued tile {}", self.index, id);
                self.pipeline.enqueue(TileTask::new(id, request));
            }
            MainToWorker::Clear => {
                let discarded = self.pipeline.clear();
                debug!(
                    "Worker {}: cleared {} queued stage entries",
                    self.index, discarded
                );
            }
            MainToWorker::Terminate => {
                info!("Worker {}: terminate requested", self.index);
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Run one pipeline step and post its result.
    fn process_next(&mut self) -> ControlFlow<()> {
        let Some(output) = self.pipeline.step(&self.computer) else {
            return ControlFlow::Continue(());
        };

        let stage = output.stage.index();
        let compute_time_ms = output.compute_time_ms();
        self.stats.record(stage, compute_time_ms);
        debug!(
            "Worker {}: tile {} stage {} in {:.2}ms (avg {:.2}ms over {})",
            self.index,
            output.id,
            stage,
            compute_time_ms,
            self.stats.average_ms(stage).unwrap_or(compute_time_ms),
            self.stats.count(stage)
        );

        let msg = WorkerToMain::TileComplete {
            worker: self.index,
            id: output.id,
            stage,
            is_final_stage: output.is_final_stage(),
            buffer: output.buffer,
            compute_time_ms,
        };

        if let Err(e) = self.results.send(msg) {
            warn!(
                "Worker {}: failed to send result (pool closed): {}",
                self.index, e
            );
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }
}
