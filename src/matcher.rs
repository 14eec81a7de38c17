//! Sliding-window comparison of recent audio against a phonetic pattern.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::DetectorConfig;
use crate::error::{Error, Result};
use crate::features::{similarity, FeatureExtractor};
use crate::messages::DetectionResult;
use crate::pattern::{PatternProvider, PhoneticPattern, SyntheticPatternProvider};

/// Per-match working set, reused between calls
#[derive(Debug, Default)]
struct Scratch {
    conditioned: Vec<f32>,
    features: Vec<f32>, // frames × coefficients
    silent: Vec<bool>,
}

pub struct WakeWordMatcher {
    extractor: FeatureExtractor,
    pattern: PhoneticPattern,
    threshold: f32,
    window_step: usize,
    scratch: Scratch,
}

impl WakeWordMatcher {
    /// Matcher with synthetic reference patterns
    pub fn new(phrase: &str, config: &DetectorConfig) -> Result<Self> {
        Self::with_provider(phrase, config, &SyntheticPatternProvider)
    }

    pub fn with_provider(phrase: &str, config: &DetectorConfig, provider: &dyn PatternProvider) -> Result<Self> {
        let extractor = FeatureExtractor::new(config)?;
        Self::with_extractor(phrase, config, extractor, provider)
    }

    pub fn with_extractor(
        phrase: &str,
        config: &DetectorConfig,
        extractor: FeatureExtractor,
        provider: &dyn PatternProvider,
    ) -> Result<Self> {
        config.validate()?;
        let pattern = PhoneticPattern::build(phrase, provider, &extractor)?;

        Ok(Self {
            extractor,
            pattern,
            threshold: config.threshold,
            window_step: config.window_step,
            scratch: Scratch::default(),
        })
    }

    pub fn pattern(&self) -> &PhoneticPattern {
        &self.pattern
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Best mean similarity of any aligned window, in `[0, 1]`
    pub fn score(&mut self, samples: &[i16]) -> Result<f32> {
        self.score_inner(samples, None)
    }

    /// Like [`score`](Self::score) but gives up with `Error::Cancelled` once
    /// `cancel` is raised. The flag is checked before every frame.
    pub fn score_cancellable(&mut self, samples: &[i16], cancel: &AtomicBool) -> Result<f32> {
        self.score_inner(samples, Some(cancel))
    }

    pub fn detect(&mut self, samples: &[i16]) -> Result<DetectionResult> {
        let confidence = self.score(samples)?;
        Ok(DetectionResult::from_confidence(confidence, self.threshold))
    }

    fn score_inner(&mut self, samples: &[i16], cancel: Option<&AtomicBool>) -> Result<f32> {
        let n = self.extractor.frame_size();
        let m = self.extractor.num_coefficients();
        let p = self.pattern.len();

        let frames = samples.len() / n;
        if frames < p {
            return Ok(0.0);
        }

        let Scratch {
            conditioned,
            features,
            silent,
        } = &mut self.scratch;

        self.extractor.condition(&samples[..frames * n], conditioned);
        features.clear();
        features.resize(frames * m, 0.0);
        silent.clear();

        for (frame, out) in conditioned.chunks_exact(n).zip(features.chunks_exact_mut(m)) {
            if cancel.is_some_and(|c| c.load(Ordering::Relaxed)) {
                return Err(Error::Cancelled);
            }
            let quiet = self.extractor.is_silent(frame);
            if !quiet {
                self.extractor.extract_into(frame, out)?;
            }
            silent.push(quiet);
        }

        let reference = self.pattern.features();
        let mut best = 0.0f32;
        for offset in (0..frames - p + 1).step_by(self.window_step) {
            let total: f32 = (0..p)
                .map(|j| {
                    let t = offset + j;
                    if silent[t] {
                        0.0
                    } else {
                        similarity(&features[t * m..(t + 1) * m], &reference[j])
                    }
                })
                .sum();
            best = best.max(total / p as f32);
        }

        let best = best.clamp(0.0, 1.0);
        tracing::trace!(frames, score = best, "match scored");
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const N: usize = 1024;

    fn matcher(phrase: &str) -> WakeWordMatcher {
        WakeWordMatcher::new(phrase, &DetectorConfig::default()).unwrap()
    }

    /// `lead` silent frames followed by the reference audio of the phrase
    fn burst(phrase: &str, lead: usize) -> Vec<i16> {
        let mut audio = vec![0i16; lead * N];
        audio.extend(SyntheticPatternProvider.phrase_audio(phrase, N, 16_000));
        audio
    }

    #[test]
    fn silence_is_rejected() {
        let mut m = matcher("hey wake");
        let silence = vec![0i16; 5 * 16_000];
        assert_eq!(m.score(&silence).unwrap(), 0.0);
        assert!(!m.detect(&silence).unwrap().is_trigger());
    }

    #[test]
    fn reference_audio_matches_itself() {
        let mut m = matcher("hey wake");
        let audio = burst("hey wake", 5);
        let score = m.score(&audio).unwrap();
        assert!(score >= 0.95, "score {score}");
        assert!(m.detect(&audio).unwrap().is_trigger());
    }

    #[test]
    fn misaligned_offsets_are_not_visited() {
        // offsets advance by 5 frames, so a burst starting at frame 3 is never aligned
        let mut m = matcher("hey wake");
        let aligned = m.score(&burst("hey wake", 5)).unwrap();
        let skewed = m.score(&burst("hey wake", 3)).unwrap();
        assert!(skewed < aligned);
    }

    #[test]
    fn too_few_frames_scores_zero() {
        let mut m = matcher("hey wake up");
        let audio = SyntheticPatternProvider.phrase_audio("hey wake", N, 16_000);
        assert_eq!(m.score(&audio).unwrap(), 0.0);
        assert_eq!(m.score(&[]).unwrap(), 0.0);
    }

    #[test]
    fn tail_shorter_than_a_frame_is_dropped() {
        let mut m = matcher("hey");
        let mut audio = burst("hey", 0);
        let full = m.score(&audio).unwrap();
        audio.extend(std::iter::repeat(1000).take(N - 1));
        assert_eq!(m.score(&audio).unwrap(), full);
    }

    #[test]
    fn raised_flag_cancels_match() {
        let mut m = matcher("hey wake");
        let cancel = AtomicBool::new(true);
        let err = m.score_cancellable(&burst("hey wake", 5), &cancel).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
