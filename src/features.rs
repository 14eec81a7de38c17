//! Per-frame MFCC extraction and frame similarity.
//!
//! A frame goes window → FFT → power → Mel → log → DCT-II and keeps the first
//! `num_coefficients` coefficients. Scratch buffers come from a [`BufferPool`]
//! keyed by length. When the vectorized backend rejects a frame the extractor
//! recomputes it on the scalar backend and counts the fallback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::DetectorConfig;
use crate::error::{Error, Result};
use crate::pool::BufferPool;
use crate::preprocess;
use crate::transform::{self, BackendKind, MelFilterBank, ScalarBackend, TransformBackend};

/// MFCC coefficients of one frame
pub type FeatureVector = Vec<f32>;

pub struct FeatureExtractor {
    frame_size: usize,
    sample_rate: u32,
    num_coefficients: usize,
    pre_emphasis: f32,
    silence_floor: f32,
    bank: MelFilterBank,
    backend: Arc<dyn TransformBackend>,
    pool: BufferPool,
    fallbacks: AtomicU64,
}

impl FeatureExtractor {
    /// Extractor on the backend picked by `config.backend` and CPU probing
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        config.validate()?;
        let backend = transform::select_backend(
            config.backend,
            config.frame_size,
            config.num_filters,
            config.num_coefficients,
        );
        Self::with_backend(config, backend)
    }

    pub fn with_backend(config: &DetectorConfig, backend: Arc<dyn TransformBackend>) -> Result<Self> {
        config.validate()?;
        let n = config.frame_size;
        let bank = MelFilterBank::new(config.num_filters, n, config.sample_rate)?;
        let pool = BufferPool::with_sizes(&[n, 2 * n, n / 2 + 1, config.num_filters], config.pool_slots);

        tracing::debug!(
            frame_size = n,
            num_filters = config.num_filters,
            num_coefficients = config.num_coefficients,
            backend = ?backend.kind(),
            "feature extractor ready"
        );

        Ok(Self {
            frame_size: n,
            sample_rate: config.sample_rate,
            num_coefficients: config.num_coefficients,
            pre_emphasis: config.pre_emphasis,
            silence_floor: config.silence_floor,
            bank,
            backend,
            pool,
            fallbacks: AtomicU64::new(0),
        })
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn num_coefficients(&self) -> usize {
        self.num_coefficients
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Frames recomputed on the scalar backend
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    /// Scratch acquisitions that had to allocate
    pub fn pool_misses(&self) -> u64 {
        self.pool.misses()
    }

    /// Normalises and pre-emphasises a buffer of raw samples
    pub fn condition(&self, samples: &[i16], out: &mut Vec<f32>) {
        preprocess::condition(samples, self.pre_emphasis, out);
    }

    /// Whether a conditioned frame is too quiet to carry a match
    pub fn is_silent(&self, frame: &[f32]) -> bool {
        preprocess::mean_square(frame) < self.silence_floor
    }

    pub fn extract_features(&self, frame: &[f32]) -> Result<FeatureVector> {
        let mut out = vec![0.0f32; self.num_coefficients];
        self.extract_into(frame, &mut out)?;
        Ok(out)
    }

    /// Writes the MFCCs of one conditioned frame into `out`
    pub fn extract_into(&self, frame: &[f32], out: &mut [f32]) -> Result<()> {
        if frame.len() != self.frame_size {
            return Err(Error::FrameLength {
                expected: self.frame_size,
                actual: frame.len(),
            });
        }
        if out.len() != self.num_coefficients {
            return Err(Error::BufferLength {
                what: "mfcc",
                expected: self.num_coefficients,
                actual: out.len(),
            });
        }

        match self.run(self.backend.as_ref(), frame, out) {
            Ok(()) => Ok(()),
            Err(e) if self.backend.kind() == BackendKind::Vectorized => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "vectorized transform failed, recomputing frame on scalar path");
                self.run(&ScalarBackend, frame, out)
            }
            Err(e) => Err(e),
        }
    }

    fn run(&self, backend: &dyn TransformBackend, frame: &[f32], out: &mut [f32]) -> Result<()> {
        let n = self.frame_size;
        let mut windowed = self.pool.acquire(n);
        let mut spectrum = self.pool.acquire(2 * n);
        let mut power = self.pool.acquire(n / 2 + 1);
        let mut mel = self.pool.acquire(self.bank.num_filters());

        windowed.copy_from_slice(frame);
        backend.apply_hamming_window(&mut windowed)?;
        backend.fft(&windowed, &mut spectrum, n)?;
        backend.power_spectrum(&spectrum, &mut power, n)?;
        backend.apply_mel_filter_bank(&power, &self.bank, &mut mel)?;
        backend.dct2(&mel, out)?;

        if out.iter().any(|c| !c.is_finite()) {
            return Err(Error::Computation("non-finite MFCC coefficient".into()));
        }
        Ok(())
    }
}

/// Cosine similarity in `[-1, 1]`. Zero when either vector has zero norm.
/// Vectors of different length are compared over the shorter one.
pub fn similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        tracing::debug!(left = a.len(), right = b.len(), "feature length mismatch, truncating");
    }
    let len = a.len().min(b.len());

    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (&x, &y) in a[..len].iter().zip(&b[..len]) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }

    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na.sqrt() * nb.sqrt())).clamp(-1.0, 1.0)
}
