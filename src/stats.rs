use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, Default)]
pub struct StageStats {
    pub samples: u64,
    pub total_ns: u128,
    pub max_ns: u64,
}

impl StageStats {
    pub fn record(&mut self, duration_ns: u64) {
        self.samples += 1;
        self.total_ns += duration_ns as u128;
        self.max_ns = self.max_ns.max(duration_ns);
    }

    pub fn avg_ns(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            self.total_ns as f64 / self.samples as f64
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RuntimeStats {
    pub chunks_in: u64,
    pub samples_in: u64,
    pub chunks_rejected: u64,

    pub matches_scheduled: u64,
    pub matches_coalesced: u64,
    pub matches_run: u64,
    pub matches_cancelled: u64,
    pub triggers: u64,
    pub errors: u64,

    pub backend_fallbacks: u64,
    pub pool_misses: u64,

    pub last_score: f32,
    pub best_score: f32,
    pub match_time: StageStats,
}

#[derive(Clone, Debug)]
pub struct RuntimeStatsHandle {
    inner: Arc<Mutex<RuntimeStats>>,
}

impl Default for RuntimeStatsHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeStatsHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RuntimeStats::default())),
        }
    }

    pub fn update<F>(&self, update_fn: F)
    where
        F: FnOnce(&mut RuntimeStats),
    {
        if let Ok(mut stats) = self.inner.lock() {
            update_fn(&mut stats);
        }
    }

    pub fn snapshot(&self) -> RuntimeStats {
        if let Ok(stats) = self.inner.lock() {
            stats.clone()
        } else {
            RuntimeStats::default()
        }
    }
}

/// Flattened view of [`RuntimeStats`] with timings in milliseconds
#[derive(Clone, Debug, PartialEq)]
pub struct DetectorStats {
    pub chunks_in: u64,
    pub samples_in: u64,
    pub chunks_rejected: u64,
    pub matches_scheduled: u64,
    pub matches_coalesced: u64,
    pub matches_run: u64,
    pub matches_cancelled: u64,
    pub triggers: u64,
    pub errors: u64,
    pub backend_fallbacks: u64,
    pub pool_misses: u64,
    pub last_score: f32,
    pub best_score: f32,
    pub match_avg_ms: f64,
    pub match_max_ms: f64,
}

impl DetectorStats {
    pub fn from_runtime(s: RuntimeStats) -> Self {
        Self {
            chunks_in: s.chunks_in,
            samples_in: s.samples_in,
            chunks_rejected: s.chunks_rejected,
            matches_scheduled: s.matches_scheduled,
            matches_coalesced: s.matches_coalesced,
            matches_run: s.matches_run,
            matches_cancelled: s.matches_cancelled,
            triggers: s.triggers,
            errors: s.errors,
            backend_fallbacks: s.backend_fallbacks,
            pool_misses: s.pool_misses,
            last_score: s.last_score,
            best_score: s.best_score,
            match_avg_ms: s.match_time.avg_ns() / 1_000_000.0,
            match_max_ms: s.match_time.max_ns as f64 / 1_000_000.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_updates_and_snapshot() {
        let h = RuntimeStatsHandle::new();
        h.update(|s| {
            s.chunks_in += 2;
            s.match_time.record(1_000_000);
        });
        let snap = h.snapshot();
        assert_eq!(snap.chunks_in, 2);
        assert_eq!(snap.match_time.samples, 1);
        assert_eq!(snap.match_time.max_ns, 1_000_000);
    }

    #[test]
    fn detector_stats_conversion_uses_ms_units() {
        let mut r = RuntimeStats::default();
        r.match_time.record(2_000_000);
        r.match_time.record(4_000_000);
        r.triggers = 1;
        let d = DetectorStats::from_runtime(r);

        assert_eq!(d.match_avg_ms, 3.0);
        assert_eq!(d.match_max_ms, 4.0);
        assert_eq!(d.triggers, 1);
    }
}
