use tilewonder_compute::ComputeStats;

/// Counters kept by the pool as it dispatches worker results.
#[derive(Clone, Debug, Default)]
pub struct PoolStats {
    /// Requests accepted by `submit`.
    pub submitted: u64,
    /// Requests resolved with a real final-stage buffer.
    pub completed: u64,
    /// Intermediate stage buffers handed to callers.
    pub previews_delivered: u64,
    /// Requests resolved with the cancellation sentinel.
    pub cancelled: u64,
    /// Worker results whose request was already resolved.
    pub stale_results: u64,
    /// Final-stage results produced by each worker, stale or not.
    pub per_worker_finals: Vec<u64>,
    timing: ComputeStats,
}

impl PoolStats {
    pub(crate) fn new(worker_count: usize, stage_count: u32) -> Self {
        Self {
            per_worker_finals: vec![0; worker_count],
            timing: ComputeStats::new(stage_count),
            ..Self::default()
        }
    }

    pub(crate) fn record_result(
        &mut self,
        worker: usize,
        stage: u32,
        is_final_stage: bool,
        compute_time_ms: f64,
    ) {
        self.timing.record(stage, compute_time_ms);
        if is_final_stage {
            if let Some(count) = self.per_worker_finals.get_mut(worker) {
                *count += 1;
            }
        }
    }

    /// Mean worker compute time at `stage` across all workers.
    pub fn average_compute_ms(&self, stage: u32) -> Option<f64> {
        self.timing.average_ms(stage)
    }

    /// Stage results received from workers, stale or not.
    pub fn results_received(&self) -> u64 {
        self.timing.total_count()
    }
}
