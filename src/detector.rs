//! Owned detector: accepts PCM chunks from the capture side, keeps the recent
//! history in a ring and hands matching to one worker thread. Results arrive
//! as [`DetectorEvent`]s on a channel.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::config::DetectorConfig;
use crate::error::{Error, Result};
use crate::matcher::WakeWordMatcher;
use crate::messages::{DetectorEvent, DetectorState, SharedState};
use crate::pattern::{PatternProvider, SyntheticPatternProvider};
use crate::ring::SampleRing;
use crate::stats::{DetectorStats, RuntimeStatsHandle};
use crate::worker::MatchWorker;

pub struct WakeWordDetector {
    config: DetectorConfig,
    ring: Option<Arc<SampleRing>>,
    state: Arc<SharedState>,
    cancel: Arc<AtomicBool>,
    since_schedule: AtomicUsize,
    decode_buf: Mutex<Vec<i16>>,
    schedule_tx: Option<Sender<()>>,
    stop_tx: Option<Sender<()>>,
    events_rx: Receiver<DetectorEvent>,
    thread: Option<JoinHandle<()>>,
    stats: RuntimeStatsHandle,
}

impl WakeWordDetector {
    /// Detector for `phrase` using synthetic reference patterns
    pub fn new(phrase: &str, config: DetectorConfig) -> Result<Self> {
        Self::with_provider(phrase, config, &SyntheticPatternProvider)
    }

    pub fn with_provider(phrase: &str, config: DetectorConfig, provider: &dyn PatternProvider) -> Result<Self> {
        config.validate()?;
        let matcher = WakeWordMatcher::with_provider(phrase, &config, provider)?;
        let ring = Arc::new(SampleRing::new(config.buffer_capacity())?);
        let state = Arc::new(SharedState::new(DetectorState::Idle));
        let cancel = Arc::new(AtomicBool::new(false));
        let stats = RuntimeStatsHandle::new();

        // one pending request at most; extra requests are coalesced
        let (schedule_tx, schedule_rx) = crossbeam_channel::bounded(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let (events_tx, events_rx) = crossbeam_channel::unbounded();

        let worker = MatchWorker {
            matcher,
            ring: ring.clone(),
            state: state.clone(),
            cancel: cancel.clone(),
            schedule_rx,
            stop_rx,
            events_tx,
            stats: stats.clone(),
            window_samples: config.match_window_samples(),
        };
        let thread = std::thread::Builder::new()
            .name("wakeloop-match".into())
            .spawn(move || worker.run())?;

        tracing::debug!(
            phrase,
            frame_size = config.frame_size,
            hop_size = config.hop_size,
            threshold = config.threshold,
            "wake-word detector started"
        );

        Ok(Self {
            decode_buf: Mutex::new(Vec::new()),
            config,
            ring: Some(ring),
            state,
            cancel,
            since_schedule: AtomicUsize::new(0),
            schedule_tx: Some(schedule_tx),
            stop_tx: Some(stop_tx),
            events_rx,
            thread: Some(thread),
            stats,
        })
    }

    /// Feeds little-endian 16-bit PCM. Never waits for matching.
    ///
    /// Chunks outside `min_chunk_bytes..=max_chunk_bytes` are rejected and
    /// should be discarded by the caller.
    pub fn process_audio(&self, bytes: &[u8]) -> Result<()> {
        let (Some(schedule_tx), Some(ring)) = (self.schedule_tx.as_ref(), self.ring.as_ref()) else {
            return Err(Error::ShutDown);
        };
        if self.cancel.load(Ordering::Acquire) {
            return Err(Error::ShutDown);
        }

        if let Err(e) = self.check_chunk(bytes.len()) {
            tracing::warn!(error = %e, "rejected audio chunk");
            self.stats.update(|s| s.chunks_rejected += 1);
            return Err(e);
        }

        let appended = match self.decode_buf.lock() {
            Ok(mut scratch) => ring.append_pcm_le(bytes, &mut scratch),
            Err(_) => ring.append_pcm_le(bytes, &mut Vec::new()),
        };
        self.stats.update(|s| {
            s.chunks_in += 1;
            s.samples_in += appended as u64;
        });

        self.state.transition(DetectorState::Idle, DetectorState::Listening);
        if self.state.get() == DetectorState::Triggered {
            return Ok(());
        }

        let pending = self.since_schedule.fetch_add(appended, Ordering::AcqRel) + appended;
        if pending < self.config.hop_size {
            return Ok(());
        }
        self.since_schedule.store(0, Ordering::Release);

        match schedule_tx.try_send(()) {
            Ok(()) => self.stats.update(|s| s.matches_scheduled += 1),
            Err(TrySendError::Full(())) => self.stats.update(|s| s.matches_coalesced += 1),
            Err(TrySendError::Disconnected(())) => return Err(Error::ShutDown),
        }
        Ok(())
    }

    fn check_chunk(&self, len: usize) -> Result<()> {
        if len < self.config.min_chunk_bytes {
            return Err(Error::AudioTooShort {
                len,
                min: self.config.min_chunk_bytes,
            });
        }
        if len > self.config.max_chunk_bytes {
            return Err(Error::AudioTooLong {
                len,
                max: self.config.max_chunk_bytes,
            });
        }
        Ok(())
    }

    /// Leaves the triggered state and starts matching fresh audio.
    /// Returns false when the detector was not triggered.
    pub fn resume(&self) -> bool {
        if !self.state.transition(DetectorState::Triggered, DetectorState::Listening) {
            return false;
        }
        // the ring still holds the burst that triggered
        if let Some(ring) = &self.ring {
            ring.clear();
        }
        self.since_schedule.store(0, Ordering::Release);
        tracing::debug!("detector resumed");
        true
    }

    /// Stops the worker and releases buffers. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.cancel.store(true, Ordering::Release);

        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        self.schedule_tx.take();

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("match worker exited by panic");
            }
            // the worker's handle is gone with the thread, so this frees the ring
            self.ring.take();
            if let Ok(mut scratch) = self.decode_buf.lock() {
                *scratch = Vec::new();
            }
            self.state.set(DetectorState::Idle);
            tracing::debug!("wake-word detector shut down");
        }
    }

    /// Receiver for trigger and error events. Clones share one queue.
    pub fn events(&self) -> Receiver<DetectorEvent> {
        self.events_rx.clone()
    }

    pub fn state(&self) -> DetectorState {
        self.state.get()
    }

    pub fn is_shut_down(&self) -> bool {
        self.thread.is_none()
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Samples currently held in the ring, 0 once shut down
    pub fn buffered_samples(&self) -> usize {
        self.ring.as_ref().map_or(0, |ring| ring.len())
    }

    pub fn stats(&self) -> DetectorStats {
        DetectorStats::from_runtime(self.stats.snapshot())
    }
}

impl Drop for WakeWordDetector {
    fn drop(&mut self) {
        self.shutdown();
    }
}
