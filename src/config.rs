use serde::Deserialize;

use crate::error::{Error, Result};
use crate::{
    BUFFER_SECONDS, DETECTION_THRESHOLD, FRAME_SIZE, HOP_SIZE, MATCH_WINDOW_SECONDS, MEL_FILTERS,
    MFCC_COEFFICIENTS, SAMPLE_RATE, WINDOW_STEP,
};

/// Which transform implementation the feature extractor runs on
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// Probe the CPU and pick the vectorized backend when supported
    #[default]
    Auto,
    Scalar,
    Vectorized,
}

impl std::str::FromStr for BackendPreference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "scalar" => Ok(Self::Scalar),
            "vectorized" => Ok(Self::Vectorized),
            other => Err(Error::Config(format!("unknown backend '{other}'"))),
        }
    }
}

/// Detector settings. Fixed at construction; there is no live reconfiguration.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub sample_rate: u32,
    pub frame_size: usize, // FFT size, power of two
    pub hop_size: usize,   // new samples required before another match is scheduled
    pub num_filters: usize,
    pub num_coefficients: usize,
    pub threshold: f32,
    pub buffer_secs: f32,       // ring capacity
    pub match_window_secs: f32, // most recent audio handed to the matcher
    pub window_step: usize,     // frames between sliding-window offsets
    pub pre_emphasis: f32,
    pub silence_floor: f32, // mean-square energy below which a frame never matches
    pub min_chunk_bytes: usize,
    pub max_chunk_bytes: usize,
    pub pool_slots: usize, // free buffers kept per size
    pub backend: BackendPreference,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            frame_size: FRAME_SIZE,
            hop_size: HOP_SIZE,
            num_filters: MEL_FILTERS,
            num_coefficients: MFCC_COEFFICIENTS,
            threshold: DETECTION_THRESHOLD,
            buffer_secs: BUFFER_SECONDS,
            match_window_secs: MATCH_WINDOW_SECONDS,
            window_step: WINDOW_STEP,
            pre_emphasis: 0.97,
            silence_floor: 1.0e-7,
            min_chunk_bytes: 2,
            max_chunk_bytes: (SAMPLE_RATE as f32 * BUFFER_SECONDS) as usize * 2,
            pool_slots: 4,
            backend: BackendPreference::Auto,
        }
    }
}

impl DetectorConfig {
    /// Ring capacity in samples
    pub fn buffer_capacity(&self) -> usize {
        (self.buffer_secs * self.sample_rate as f32) as usize
    }

    /// Number of samples handed to each match
    pub fn match_window_samples(&self) -> usize {
        (self.match_window_secs * self.sample_rate as f32) as usize
    }

    pub fn validate(&self) -> Result<()> {
        fn fail<T>(msg: String) -> Result<T> {
            Err(Error::Config(msg))
        }

        if self.sample_rate == 0 {
            return fail("sample_rate must be positive".into());
        }
        if self.frame_size < 2 || !self.frame_size.is_power_of_two() {
            return Err(Error::InvalidSize(self.frame_size));
        }
        if self.hop_size == 0 || self.hop_size > self.frame_size {
            return fail(format!(
                "hop_size {} must be in 1..={}",
                self.hop_size, self.frame_size
            ));
        }
        if self.num_filters == 0 {
            return fail("num_filters must be positive".into());
        }
        if self.num_coefficients == 0 || self.num_coefficients > self.num_filters {
            return fail(format!(
                "num_coefficients {} must be in 1..={}",
                self.num_coefficients, self.num_filters
            ));
        }
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return fail(format!("threshold {} must be in (0, 1]", self.threshold));
        }
        if self.buffer_capacity() < self.frame_size {
            return fail(format!(
                "buffer of {}s holds fewer samples than one frame",
                self.buffer_secs
            ));
        }
        if self.match_window_samples() < self.frame_size || self.match_window_secs > self.buffer_secs {
            return fail(format!(
                "match_window_secs {} must cover one frame and fit in buffer_secs {}",
                self.match_window_secs, self.buffer_secs
            ));
        }
        if self.window_step == 0 {
            return fail("window_step must be positive".into());
        }
        if !(0.0..1.0).contains(&self.pre_emphasis) {
            return fail(format!("pre_emphasis {} must be in [0, 1)", self.pre_emphasis));
        }
        if !(self.silence_floor >= 0.0) {
            return fail("silence_floor must be non-negative".into());
        }
        if self.min_chunk_bytes == 0 || self.min_chunk_bytes > self.max_chunk_bytes {
            return fail(format!(
                "chunk limits {}..={} are empty",
                self.min_chunk_bytes, self.max_chunk_bytes
            ));
        }
        // a larger chunk would overwrite the whole ring on its own
        if self.max_chunk_bytes > self.buffer_capacity() * 2 {
            return fail(format!(
                "max_chunk_bytes {} exceeds the {}-byte ring",
                self.max_chunk_bytes,
                self.buffer_capacity() * 2
            ));
        }
        Ok(())
    }
}
