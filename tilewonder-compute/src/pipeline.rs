//! Coarse-to-fine refinement of tiles inside one worker.
//!
//! Every tile passes through K stages. Stage `i` computes at downsample factor
//! `2^(K-1-i)`, so stage 0 is the coarsest preview and stage K-1 is full
//! resolution. The pipeline always runs the lowest non-empty stage first: every
//! queued tile gets its coarse preview before any tile is refined further.

use crate::TileComputer;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tilewonder_core::{TileBuffer, TileId, TileTask, MAX_REFINEMENT_STAGES};

/// One stage of a K-stage refinement pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefinementStage {
    index: u32,
    stage_count: u32,
}

impl RefinementStage {
    /// Panics unless `1 <= stage_count <= MAX_REFINEMENT_STAGES` and `index < stage_count`.
    pub fn new(index: u32, stage_count: u32) -> Self {
        assert!(
            (1..=MAX_REFINEMENT_STAGES).contains(&stage_count),
            "stage count must be 1-{MAX_REFINEMENT_STAGES}, got {stage_count}"
        );
        assert!(
            index < stage_count,
            "stage index {index} out of range for {stage_count} stages"
        );
        Self { index, stage_count }
    }

    /// All stages in processing order.
    pub fn all(stage_count: u32) -> impl Iterator<Item = RefinementStage> {
        (0..stage_count).map(move |index| Self::new(index, stage_count))
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn stage_count(&self) -> u32 {
        self.stage_count
    }

    /// Downsample factor: `2^(K-1-index)`.
    pub fn scale(&self) -> u32 {
        1 << (self.stage_count - 1 - self.index)
    }

    /// True for the full-resolution stage.
    pub fn is_final(&self) -> bool {
        self.index + 1 == self.stage_count
    }

    pub fn next(&self) -> Option<RefinementStage> {
        if self.is_final() {
            None
        } else {
            Some(Self::new(self.index + 1, self.stage_count))
        }
    }
}

/// Result of running one task through one stage.
#[derive(Debug)]
pub struct StageOutput {
    pub id: TileId,
    pub stage: RefinementStage,
    pub buffer: TileBuffer,
    pub compute_time: Duration,
}

impl StageOutput {
    pub fn is_final_stage(&self) -> bool {
        self.stage.is_final()
    }

    pub fn compute_time_ms(&self) -> f64 {
        self.compute_time.as_secs_f64() * 1000.0
    }
}

/// K FIFO queues of tasks, one per refinement stage.
#[derive(Debug)]
pub struct RefinementPipeline {
    stages: Vec<VecDeque<TileTask>>,
}

impl RefinementPipeline {
    /// Panics unless `1 <= stage_count <= MAX_REFINEMENT_STAGES`.
    pub fn new(stage_count: u32) -> Self {
        assert!(
            (1..=MAX_REFINEMENT_STAGES).contains(&stage_count),
            "stage count must be 1-{MAX_REFINEMENT_STAGES}, got {stage_count}"
        );
        Self {
            stages: (0..stage_count).map(|_| VecDeque::new()).collect(),
        }
    }

    pub fn stage_count(&self) -> u32 {
        self.stages.len() as u32
    }

    /// Queue a task at stage 0.
    pub fn enqueue(&mut self, task: TileTask) {
        self.stages[0].push_back(task);
    }

    /// Drop every queued task at every stage. Returns how many entries were discarded.
    pub fn clear(&mut self) -> usize {
        self.stages
            .iter_mut()
            .map(|queue| {
                let discarded = queue.len();
                queue.clear();
                discarded
            })
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.iter().all(VecDeque::is_empty)
    }

    /// Total queued entries across all stages.
    pub fn len(&self) -> usize {
        self.stages.iter().map(VecDeque::len).sum()
    }

    /// Entries queued at one stage.
    pub fn queued_at(&self, stage: u32) -> usize {
        self.stages.get(stage as usize).map_or(0, VecDeque::len)
    }

    /// Pop the head of the lowest non-empty stage.
    fn next_task(&mut self) -> Option<(RefinementStage, TileTask)> {
        let stage_count = self.stage_count();
        self.stages
            .iter_mut()
            .enumerate()
            .find_map(|(index, queue)| {
                queue
                    .pop_front()
                    .map(|task| (RefinementStage::new(index as u32, stage_count), task))
            })
    }

    /// Run one task through its current stage.
    ///
    /// The task is re-queued at the next stage unless this was the final one.
    /// Returns `None` when nothing is queued.
    pub fn step<C: TileComputer + ?Sized>(&mut self, computer: &C) -> Option<StageOutput> {
        let (stage, task) = self.next_task()?;

        let start = Instant::now();
        let buffer = computer.compute(&task.request, stage.scale());
        let compute_time = start.elapsed();

        if let Some(next) = stage.next() {
            self.stages[next.index() as usize].push_back(task);
        }

        Some(StageOutput {
            id: task.id,
            stage,
            buffer,
            compute_time,
        })
    }
}
