/// Running per-stage compute-time averages for one worker.
///
/// Instrumentation only; nothing in the scheduling path reads these values.
#[derive(Clone, Debug, Default)]
pub struct ComputeStats {
    stages: Vec<StageTiming>,
}

#[derive(Clone, Copy, Debug, Default)]
struct StageTiming {
    count: u64,
    total_ms: f64,
}

impl ComputeStats {
    pub fn new(stage_count: u32) -> Self {
        Self {
            stages: vec![StageTiming::default(); stage_count as usize],
        }
    }

    /// Record one computation at `stage`, growing the table if needed.
    pub fn record(&mut self, stage: u32, compute_time_ms: f64) {
        let index = stage as usize;
        if index >= self.stages.len() {
            self.stages.resize(index + 1, StageTiming::default());
        }
        let timing = &mut self.stages[index];
        timing.count += 1;
        timing.total_ms += compute_time_ms;
    }

    /// Mean compute time at `stage`, or `None` before the first sample.
    pub fn average_ms(&self, stage: u32) -> Option<f64> {
        self.stages
            .get(stage as usize)
            .filter(|t| t.count > 0)
            .map(|t| t.total_ms / t.count as f64)
    }

    pub fn count(&self, stage: u32) -> u64 {
        self.stages.get(stage as usize).map_or(0, |t| t.count)
    }

    pub fn total_count(&self) -> u64 {
        self.stages.iter().map(|t| t.count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_is_none_without_samples() {
        let stats = ComputeStats::new(2);
        assert_eq!(stats.average_ms(0), None);
        assert_eq!(stats.average_ms(5), None);
    }

    #[test]
    fn averages_per_stage() {
        let mut stats = ComputeStats::new(2);
        stats.record(0, 2.0);
        stats.record(0, 4.0);
        stats.record(1, 10.0);

        assert_eq!(stats.average_ms(0), Some(3.0));
        assert_eq!(stats.average_ms(1), Some(10.0));
        assert_eq!(stats.count(0), 2);
        assert_eq!(stats.total_count(), 3);
    }

    #[test]
    fn record_grows_for_unknown_stage() {
        let mut stats = ComputeStats::default();
        stats.record(3, 1.0);
        assert_eq!(stats.count(3), 1);
        assert_eq!(stats.count(2), 0);
    }
}
