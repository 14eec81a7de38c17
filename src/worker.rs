use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use crate::error::Error;
use crate::matcher::WakeWordMatcher;
use crate::messages::{DetectionResult, DetectorEvent, DetectorState, SharedState};
use crate::ring::SampleRing;
use crate::stats::RuntimeStatsHandle;

/// Runs every match sequentially on the detector's dedicated thread
pub(crate) struct MatchWorker {
    pub(crate) matcher: WakeWordMatcher,
    pub(crate) ring: Arc<SampleRing>,
    pub(crate) state: Arc<SharedState>,
    pub(crate) cancel: Arc<AtomicBool>,
    pub(crate) schedule_rx: Receiver<()>,
    pub(crate) stop_rx: Receiver<()>,
    pub(crate) events_tx: Sender<DetectorEvent>,
    pub(crate) stats: RuntimeStatsHandle,
    pub(crate) window_samples: usize,
}

/// Leaves the shared state idle however the worker exits
struct ExitGuard(Arc<SharedState>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.0.set(DetectorState::Idle);
        if std::thread::panicking() {
            tracing::error!("match worker panicked");
        } else {
            tracing::debug!("match worker stopped");
        }
    }
}

impl MatchWorker {
    pub(crate) fn run(mut self) {
        let _guard = ExitGuard(self.state.clone());
        let mut window = Vec::with_capacity(self.window_samples);

        loop {
            let scheduled = crossbeam_channel::select! {
                recv(self.stop_rx) -> _ => false,
                recv(self.schedule_rx) -> msg => msg.is_ok(),
            };
            if !scheduled {
                break;
            }
            self.run_match(&mut window);
        }
    }

    fn run_match(&mut self, window: &mut Vec<i16>) {
        if self.cancel.load(Ordering::Acquire) {
            return;
        }
        // Triggered or shut down: nothing to do until resume
        if !self.state.transition(DetectorState::Listening, DetectorState::Matching) {
            return;
        }

        self.ring.recent_into(self.window_samples, window);
        let start = Instant::now();
        let outcome = self.matcher.score_cancellable(window, &self.cancel);
        let elapsed = start.elapsed().as_nanos() as u64;

        let fallbacks = self.matcher.extractor().fallback_count();
        let pool_misses = self.matcher.extractor().pool_misses();
        self.stats.update(|s| {
            s.backend_fallbacks = fallbacks;
            s.pool_misses = pool_misses;
        });

        match outcome {
            Ok(confidence) => {
                self.stats.update(|s| {
                    s.matches_run += 1;
                    s.last_score = confidence;
                    s.best_score = s.best_score.max(confidence);
                    s.match_time.record(elapsed);
                });

                match DetectionResult::from_confidence(confidence, self.matcher.threshold()) {
                    DetectionResult::Triggered { confidence } => {
                        if self.state.transition(DetectorState::Matching, DetectorState::Triggered) {
                            tracing::info!(confidence, "wake word detected");
                            self.stats.update(|s| s.triggers += 1);
                            let _ = self.events_tx.send(DetectorEvent::WakeWordDetected { confidence });
                        }
                    }
                    DetectionResult::NoTrigger { .. } => {
                        self.state.transition(DetectorState::Matching, DetectorState::Listening);
                    }
                }
            }
            Err(Error::Cancelled) => {
                tracing::debug!("match cancelled by shutdown");
                self.stats.update(|s| s.matches_cancelled += 1);
            }
            Err(e) => {
                tracing::error!(error = %e, "match failed");
                self.stats.update(|s| s.errors += 1);
                let _ = self.events_tx.send(DetectorEvent::Error {
                    message: e.to_string(),
                });
                self.state.transition(DetectorState::Matching, DetectorState::Listening);
            }
        }
    }
}
