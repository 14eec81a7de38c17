//! Streaming MFCC feature extraction and wake-word matching.
//!
//! Raw 16 kHz PCM goes into a [`WakeWordDetector`], which keeps the last few
//! seconds in a ring and scores them on a worker thread against a phonetic
//! pattern of the trigger phrase. Triggers and failures are published as
//! [`DetectorEvent`]s.

pub mod config;
pub mod detector;
pub mod error;
pub mod features;
pub mod matcher;
pub mod messages;
pub mod pattern;
pub mod pool;
pub mod preprocess;
pub mod ring;
pub mod stats;
pub mod transform;
#[cfg(feature = "cli-tester")]
pub mod wav;
mod worker;

pub use config::{BackendPreference, DetectorConfig};
pub use detector::WakeWordDetector;
pub use error::{Error, Result};
pub use features::{similarity, FeatureExtractor, FeatureVector};
pub use matcher::WakeWordMatcher;
pub use messages::{DetectionResult, DetectorEvent, DetectorState};
pub use pattern::{PatternProvider, PhoneticPattern, SyntheticPatternProvider};
pub use ring::SampleRing;
pub use stats::DetectorStats;
pub use transform::{BackendKind, MelFilterBank, ScalarBackend, TransformBackend, VectorizedBackend};

pub const SAMPLE_RATE: u32 = 16_000;
pub const FRAME_SIZE: usize = 1024;
pub const HOP_SIZE: usize = 512;
pub const MEL_FILTERS: usize = 26;
pub const MFCC_COEFFICIENTS: usize = 13;
pub const DETECTION_THRESHOLD: f32 = 0.7;
pub const BUFFER_SECONDS: f32 = 5.0;
pub const MATCH_WINDOW_SECONDS: f32 = 3.0;
/// Frames between sliding-window offsets
pub const WINDOW_STEP: usize = 5;
/// Floor added to power bins and Mel energies before the logarithm
pub const EPSILON: f32 = 1e-10;
